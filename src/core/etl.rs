use crate::domain::model::ResolutionReport;
use crate::domain::ports::Pipeline;
use crate::utils::error::Result;

#[derive(Debug, Clone)]
pub struct RunSummary {
    pub artifacts: Vec<String>,
    pub report: ResolutionReport,
}

pub struct EtlEngine<P: Pipeline> {
    pipeline: P,
}

impl<P: Pipeline> EtlEngine<P> {
    pub fn new(pipeline: P) -> Self {
        Self { pipeline }
    }

    pub fn pipeline(&self) -> &P {
        &self.pipeline
    }

    pub async fn run(&self) -> Result<RunSummary> {
        tracing::info!("🚀 Starting geocoding run");

        // Extract
        let table = self.pipeline.extract().await?;
        tracing::info!(
            "📥 Loaded {} rows with {} columns",
            table.len(),
            table.headers.len()
        );

        // Transform
        let result = self.pipeline.transform(table).await?;
        let report = result.report.clone();
        tracing::info!(
            "🧭 Resolved {} of {} rows ({} already had coordinates, {} unresolved)",
            report.resolved(),
            report.total,
            report.skipped,
            report.unresolved
        );

        // Load
        let artifacts = self.pipeline.load(result).await?;
        for artifact in &artifacts {
            tracing::info!("📁 Wrote {}", artifact);
        }

        Ok(RunSummary { artifacts, report })
    }
}
