use clap::Parser;
use maplink_geocoder::domain::ports::Pipeline;
use maplink_geocoder::utils::error::{ErrorSeverity, EtlError};
use maplink_geocoder::utils::{logger, validation::Validate};
use maplink_geocoder::{app, CliConfig, EtlEngine};
use std::sync::atomic::Ordering;

fn exit_on_config_error(e: EtlError) -> ! {
    tracing::error!("❌ Configuration validation failed: {}", e);
    tracing::error!("💡 Suggestion: {}", e.recovery_suggestion());
    eprintln!("❌ {}", e.user_friendly_message());
    std::process::exit(1);
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = CliConfig::parse();

    // 初始化日誌
    if cli.json_logs {
        logger::init_json_logger(cli.verbose);
    } else {
        logger::init_cli_logger(cli.verbose);
    }

    tracing::info!("Starting maplink-geocoder");
    if cli.verbose {
        tracing::debug!("CLI config: {:?}", cli);
    }

    let dry_run = cli.dry_run;
    let settings = cli.into_settings().unwrap_or_else(|e| exit_on_config_error(e));

    // 驗證配置
    if let Err(e) = settings.validate() {
        exit_on_config_error(e);
    }

    let pipeline = app::build_pipeline(settings).unwrap_or_else(|e| exit_on_config_error(e));

    if dry_run {
        match pipeline.extract().await {
            Ok(table) => {
                println!(
                    "✅ Input OK: {} rows, {} columns ({})",
                    table.len(),
                    table.headers.len(),
                    table.headers.join(", ")
                );
                return Ok(());
            }
            Err(e) => {
                eprintln!("❌ {}", e.user_friendly_message());
                std::process::exit(1);
            }
        }
    }

    // Ctrl-C: 處理完目前這一筆後停止，已解析的結果照常輸出
    let cancel = pipeline.resolution().cancel_flag();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("⏹️ Interrupt received, stopping after the current record");
            cancel.store(true, Ordering::SeqCst);
        }
    });

    let engine = EtlEngine::new(pipeline);

    match engine.run().await {
        Ok(summary) => {
            let report = &summary.report;
            tracing::info!("✅ Geocoding completed");
            println!(
                "✅ Resolved {} of {} rows ({} already had coordinates, {} unresolved)",
                report.resolved(),
                report.total,
                report.skipped,
                report.unresolved
            );
            if report.interrupted {
                println!("⏹️ Run was interrupted; unprocessed rows keep their stored coordinates (half pairs cleared)");
            }
            for artifact in &summary.artifacts {
                println!("📁 {}", artifact);
            }
            println!("🗺️ GIS import: X = longitude, Y = latitude, CRS = EPSG:4326");
        }
        Err(e) => {
            // 記錄詳細錯誤信息
            tracing::error!(
                "❌ Geocoding failed: {} (Category: {:?}, Severity: {:?})",
                e,
                e.category(),
                e.severity()
            );
            tracing::error!("💡 Recovery suggestion: {}", e.recovery_suggestion());

            eprintln!("❌ {}", e.user_friendly_message());
            eprintln!("💡 建議: {}", e.recovery_suggestion());

            // 根據錯誤嚴重程度決定退出碼
            let exit_code = match e.severity() {
                ErrorSeverity::Low => 0,
                ErrorSeverity::Medium => 2,
                ErrorSeverity::High => 1,
                ErrorSeverity::Critical => 3,
            };

            if exit_code > 0 {
                std::process::exit(exit_code);
            }
        }
    }

    Ok(())
}
