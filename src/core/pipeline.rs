use crate::config::Settings;
use crate::core::resolution::ResolutionPipeline;
use crate::core::table::{self, delimiter_for_path};
use crate::domain::model::{InputRecord, Strategy, Table, TransformResult};
use crate::domain::ports::{Pipeline, Storage};
use crate::utils::error::{EtlError, Result};
use std::io::Write;
use zip::write::{SimpleFileOptions, ZipWriter};

/// Table in, table with coordinates out.
pub struct GeocodePipeline<S: Storage> {
    storage: S,
    settings: Settings,
    resolution: ResolutionPipeline,
}

struct Columns {
    url: usize,
    latitude: usize,
    longitude: usize,
}

impl<S: Storage> GeocodePipeline<S> {
    pub fn new(storage: S, settings: Settings, resolution: ResolutionPipeline) -> Self {
        Self {
            storage,
            settings,
            resolution,
        }
    }

    pub fn resolution(&self) -> &ResolutionPipeline {
        &self.resolution
    }

    fn columns(&self, table: &Table) -> Result<Columns> {
        let lookup = |name: &str| {
            table
                .column_index(name)
                .ok_or_else(|| EtlError::MissingColumnError {
                    column: name.to_string(),
                })
        };
        Ok(Columns {
            url: lookup(&self.settings.input.url_column)?,
            latitude: lookup(&self.settings.input.latitude_column)?,
            longitude: lookup(&self.settings.input.longitude_column)?,
        })
    }

    fn artifact_name(&self, suffix: &str) -> String {
        format!("{}{}", self.settings.output.file_stem, suffix)
    }

    fn output_file(&self, name: &str) -> String {
        format!("{}/{}", self.settings.output.path.trim_end_matches('/'), name)
    }

    fn archive(files: &[(String, Vec<u8>)]) -> Result<Vec<u8>> {
        let mut zip = ZipWriter::new(std::io::Cursor::new(Vec::new()));
        for (name, data) in files {
            zip.start_file(name.as_str(), SimpleFileOptions::default())?;
            zip.write_all(data)?;
        }
        let cursor = zip.finish()?;
        Ok(cursor.into_inner())
    }
}

#[async_trait::async_trait]
impl<S: Storage> Pipeline for GeocodePipeline<S> {
    async fn extract(&self) -> Result<Table> {
        let path = &self.settings.input.path;
        tracing::debug!("Reading input table from {}", path);

        let data = self.storage.read_file(path).await?;
        let mut table = table::read_table(&data, delimiter_for_path(path))?;

        if table.column_index(&self.settings.input.url_column).is_none() {
            return Err(EtlError::MissingColumnError {
                column: self.settings.input.url_column.clone(),
            });
        }
        // 缺少經緯度欄位時補上空欄
        table.ensure_column(&self.settings.input.latitude_column);
        table.ensure_column(&self.settings.input.longitude_column);

        Ok(table)
    }

    async fn transform(&self, mut table: Table) -> Result<TransformResult> {
        let columns = self.columns(&table)?;

        let records: Vec<InputRecord> = (0..table.len())
            .map(|row| {
                InputRecord::new(
                    row,
                    table.cell(row, columns.url),
                    table.cell(row, columns.latitude),
                    table.cell(row, columns.longitude),
                )
            })
            .collect();

        let batch = self.resolution.run(&records).await;

        let mut processed = vec![false; records.len()];
        for outcome in &batch.outcomes {
            processed[outcome.index] = true;
            if outcome.strategy != Some(Strategy::Provided) {
                table::set_coordinate(
                    &mut table,
                    outcome.index,
                    columns.latitude,
                    columns.longitude,
                    outcome.coordinate,
                );
            }
            if self.settings.output.expand_urls {
                if let Some(expanded) = &outcome.expanded_url {
                    table.set_cell(outcome.index, columns.url, expanded.clone());
                }
            }
        }

        // 中斷後未處理的列：半組或無效的經緯度一律清空
        for record in &records {
            if !processed[record.index] && record.existing.is_none() {
                table::set_coordinate(
                    &mut table,
                    record.index,
                    columns.latitude,
                    columns.longitude,
                    None,
                );
            }
        }

        Ok(TransformResult {
            table,
            report: batch.report,
        })
    }

    async fn load(&self, result: TransformResult) -> Result<Vec<String>> {
        let mut files: Vec<(String, Vec<u8>)> = Vec::new();

        if self.settings.wants("csv") {
            files.push((
                self.artifact_name(".csv"),
                table::write_table(&result.table, b',', true)?,
            ));
        }
        if self.settings.wants("tsv") {
            files.push((
                self.artifact_name(".tsv"),
                table::write_table(&result.table, b'\t', false)?,
            ));
        }
        if self.settings.wants("gis") {
            let columns = self.columns(&result.table)?;
            let gis = table::to_gis_table(&result.table, columns.latitude, columns.longitude);
            files.push((self.artifact_name("_gis.csv"), table::write_table(&gis, b',', false)?));
        }
        if self.settings.wants("report") {
            files.push((
                self.artifact_name("_report.json"),
                serde_json::to_vec_pretty(&result.report)?,
            ));
        }

        let mut written = Vec::new();
        for (name, data) in &files {
            let path = self.output_file(name);
            tracing::debug!("Writing {} ({} bytes)", path, data.len());
            self.storage.write_file(&path, data).await?;
            written.push(path);
        }

        if self.settings.output.archive {
            let zip_data = Self::archive(&files)?;
            let path = self.output_file(&self.artifact_name(".zip"));
            tracing::debug!("Writing ZIP file ({} bytes) to {}", zip_data.len(), path);
            self.storage.write_file(&path, &zip_data).await?;
            written.push(path);
        }

        Ok(written)
    }
}
