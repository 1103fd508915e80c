use crate::config::settings::{ResolverKind, Settings};
use crate::utils::error::Result;
use clap::Parser;
use std::path::PathBuf;

#[derive(Debug, Clone, Parser)]
#[command(name = "maplink-geocoder")]
#[command(about = "Resolve short map-search links in a table to latitude/longitude")]
pub struct CliConfig {
    /// TOML configuration file; flags below override it
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Input CSV/TSV with a column of map links
    #[arg(short, long)]
    pub input: Option<String>,

    /// Output directory
    #[arg(short, long)]
    pub output: Option<String>,

    #[arg(long)]
    pub url_column: Option<String>,

    /// Per-request timeout in seconds
    #[arg(long)]
    pub timeout: Option<u64>,

    /// Pause between records in seconds
    #[arg(long)]
    pub delay: Option<f64>,

    #[arg(long)]
    pub max_retries: Option<u32>,

    /// Appended to the search text for the fallback geocoder
    #[arg(long)]
    pub region_hint: Option<String>,

    #[arg(long, value_enum)]
    pub resolver: Option<ResolverKind>,

    #[arg(long)]
    pub webdriver_url: Option<String>,

    /// Skip the free-text geocoding fallback
    #[arg(long)]
    pub no_geocode: bool,

    /// Write the resolved place URL back into the URL column
    #[arg(long)]
    pub expand_urls: bool,

    /// Bundle all outputs into a zip archive
    #[arg(long)]
    pub archive: bool,

    /// Emit JSON log lines instead of the compact format
    #[arg(long)]
    pub json_logs: bool,

    #[arg(short, long, help = "Enable verbose output")]
    pub verbose: bool,

    /// Read and validate the input, then stop before any network call
    #[arg(long)]
    pub dry_run: bool,
}

impl CliConfig {
    /// Loads the TOML file (if any) and applies command-line overrides.
    pub fn into_settings(self) -> Result<Settings> {
        let mut settings = match &self.config {
            Some(path) => Settings::from_file(path)?,
            None => Settings::default(),
        };

        if let Some(input) = self.input {
            settings.input.path = input;
        }
        if let Some(output) = self.output {
            settings.output.path = output;
        }
        if let Some(url_column) = self.url_column {
            settings.input.url_column = url_column;
        }
        if let Some(timeout) = self.timeout {
            settings.resolver.timeout_seconds = timeout;
        }
        if let Some(delay) = self.delay {
            settings.resolver.record_delay_seconds = delay;
        }
        if let Some(max_retries) = self.max_retries {
            settings.resolver.max_retries = max_retries;
        }
        if let Some(region_hint) = self.region_hint {
            settings.geocoder.region_hint = region_hint;
        }
        if let Some(kind) = self.resolver {
            settings.resolver.kind = kind;
        }
        if let Some(webdriver_url) = self.webdriver_url {
            settings.resolver.webdriver_url = webdriver_url;
        }
        if self.no_geocode {
            settings.geocoder.enabled = false;
        }
        if self.expand_urls {
            settings.output.expand_urls = true;
        }
        if self.archive {
            settings.output.archive = true;
        }

        Ok(settings)
    }
}
