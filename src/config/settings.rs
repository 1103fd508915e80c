use crate::domain::model::RegionBounds;
use crate::utils::error::{EtlError, Result};
use crate::utils::validation::{self, Validate};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::LazyLock;
use std::time::Duration;

pub const OUTPUT_FORMATS: [&str; 4] = ["csv", "tsv", "gis", "report"];

const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
     AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0 Safari/537.36";

static ENV_VAR_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$\{([^}]+)\}").expect("valid regex"));

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub input: InputConfig,
    pub output: OutputConfig,
    pub resolver: ResolverConfig,
    pub geocoder: GeocoderConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InputConfig {
    pub path: String,
    pub url_column: String,
    pub latitude_column: String,
    pub longitude_column: String,
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            path: String::new(),
            url_column: "google_maps_url".to_string(),
            latitude_column: "latitud".to_string(),
            longitude_column: "longitud".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub path: String,
    pub file_stem: String,
    pub formats: Vec<String>,
    pub archive: bool,
    /// Replace the source URL with the decoded final URL when it carries `@lat,lon`.
    pub expand_urls: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            path: "./output".to_string(),
            file_stem: "geocoded".to_string(),
            formats: vec!["csv".to_string(), "gis".to_string(), "report".to_string()],
            archive: false,
            expand_urls: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[cfg_attr(feature = "cli", derive(clap::ValueEnum))]
pub enum ResolverKind {
    /// Plain HTTP client following redirects.
    Http,
    /// Headless browser driven over WebDriver.
    Browser,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolverConfig {
    pub kind: ResolverKind,
    pub timeout_seconds: u64,
    pub max_retries: u32,
    pub retry_backoff_seconds: f64,
    pub record_delay_seconds: f64,
    pub min_interval_ms: u64,
    pub user_agent: String,
    pub webdriver_url: String,
    pub poll_interval_ms: u64,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            kind: ResolverKind::Http,
            timeout_seconds: 15,
            max_retries: 2,
            retry_backoff_seconds: 3.0,
            record_delay_seconds: 1.0,
            min_interval_ms: 1000,
            user_agent: BROWSER_USER_AGENT.to_string(),
            webdriver_url: "http://localhost:9515".to_string(),
            poll_interval_ms: 500,
        }
    }
}

impl ResolverConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }

    pub fn retry_backoff(&self) -> Duration {
        Duration::from_secs_f64(self.retry_backoff_seconds)
    }

    pub fn record_delay(&self) -> Duration {
        Duration::from_secs_f64(self.record_delay_seconds)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeocoderConfig {
    pub enabled: bool,
    pub endpoint: String,
    pub user_agent: String,
    pub region_hint: String,
    pub min_interval_ms: u64,
    pub bounds: Option<RegionBounds>,
}

impl Default for GeocoderConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            endpoint: "https://nominatim.openstreetmap.org".to_string(),
            user_agent: concat!("maplink-geocoder/", env!("CARGO_PKG_VERSION")).to_string(),
            region_hint: "CDMX, México".to_string(),
            min_interval_ms: 1000,
            bounds: None,
        }
    }
}

impl Settings {
    /// 從 TOML 檔案載入配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path).map_err(EtlError::IoError)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed_content = Self::substitute_env_vars(content);

        toml::from_str(&processed_content).map_err(|e| EtlError::ConfigError {
            message: format!("TOML parsing error: {}", e),
        })
    }

    /// 替換環境變數 (例如 ${NOMINATIM_URL})；未定義的保持原樣
    fn substitute_env_vars(content: &str) -> String {
        ENV_VAR_PATTERN
            .replace_all(content, |caps: &regex::Captures| {
                let var_name = &caps[1];
                std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
            })
            .into_owned()
    }

    pub fn wants(&self, format: &str) -> bool {
        self.output.formats.iter().any(|f| f == format)
    }
}

impl Validate for Settings {
    fn validate(&self) -> Result<()> {
        validation::validate_path("input.path", &self.input.path)?;
        validation::validate_path("output.path", &self.output.path)?;
        validation::validate_non_empty_string("output.file_stem", &self.output.file_stem)?;

        validation::validate_non_empty_string("input.url_column", &self.input.url_column)?;
        validation::validate_non_empty_string("input.latitude_column", &self.input.latitude_column)?;
        validation::validate_non_empty_string(
            "input.longitude_column",
            &self.input.longitude_column,
        )?;
        validation::validate_distinct(
            "input columns",
            &[
                self.input.url_column.as_str(),
                self.input.latitude_column.as_str(),
                self.input.longitude_column.as_str(),
            ],
        )?;

        if self.output.formats.is_empty() {
            return Err(EtlError::MissingConfigError {
                field: "output.formats".to_string(),
            });
        }
        validation::validate_one_of("output.formats", &self.output.formats, &OUTPUT_FORMATS)?;

        validation::validate_positive_number(
            "resolver.timeout_seconds",
            self.resolver.timeout_seconds,
            1,
        )?;
        validation::validate_positive_number(
            "resolver.max_retries",
            u64::from(self.resolver.max_retries),
            1,
        )?;
        validation::validate_seconds(
            "resolver.retry_backoff_seconds",
            self.resolver.retry_backoff_seconds,
        )?;
        validation::validate_seconds(
            "resolver.record_delay_seconds",
            self.resolver.record_delay_seconds,
        )?;
        validation::validate_positive_number(
            "resolver.poll_interval_ms",
            self.resolver.poll_interval_ms,
            1,
        )?;
        if self.resolver.kind == ResolverKind::Browser {
            validation::validate_url("resolver.webdriver_url", &self.resolver.webdriver_url)?;
        }

        if self.geocoder.enabled {
            validation::validate_url("geocoder.endpoint", &self.geocoder.endpoint)?;
            validation::validate_non_empty_string("geocoder.user_agent", &self.geocoder.user_agent)?;
        }
        if let Some(bounds) = &self.geocoder.bounds {
            validation::validate_range("geocoder.bounds.min_lat", bounds.min_lat, -90.0, 90.0)?;
            validation::validate_range("geocoder.bounds.max_lat", bounds.max_lat, bounds.min_lat, 90.0)?;
            validation::validate_range("geocoder.bounds.min_lon", bounds.min_lon, -180.0, 180.0)?;
            validation::validate_range(
                "geocoder.bounds.max_lon",
                bounds.max_lon,
                bounds.min_lon,
                180.0,
            )?;
        }

        Ok(())
    }
}
