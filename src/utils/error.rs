use thiserror::Error;

#[derive(Error, Debug)]
pub enum EtlError {
    #[error("Zip operation failed: {0}")]
    ZipError(#[from] zip::result::ZipError),

    #[error("HTTP request failed: {0}")]
    ApiError(#[from] reqwest::Error),

    #[error("CSV processing error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Invalid value for '{field}': '{value}' ({reason})")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Missing required configuration: {field}")]
    MissingConfigError { field: String },

    #[error("Input table has no column named '{column}'")]
    MissingColumnError { column: String },

    #[error("Transient fetch error for {url}: {message}")]
    TransientFetch { url: String, message: String },

    #[error("Redirect target never matched a coordinate pattern within {timeout_secs}s: {url}")]
    RedirectTimeout { url: String, timeout_secs: u64 },

    #[error("WebDriver error: {message}")]
    WebDriverError { message: String },

    #[error("Geocoding service error: {message}")]
    GeocodeService { message: String },

    #[error("Data processing error: {message}")]
    ProcessingError { message: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Configuration,
    Network,
    Data,
    Geocoding,
    System,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl EtlError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            EtlError::ConfigError { .. }
            | EtlError::InvalidConfigValueError { .. }
            | EtlError::MissingConfigError { .. }
            | EtlError::MissingColumnError { .. } => ErrorCategory::Configuration,
            EtlError::ApiError(_)
            | EtlError::TransientFetch { .. }
            | EtlError::RedirectTimeout { .. }
            | EtlError::WebDriverError { .. } => ErrorCategory::Network,
            EtlError::CsvError(_)
            | EtlError::SerializationError(_)
            | EtlError::ProcessingError { .. } => ErrorCategory::Data,
            EtlError::GeocodeService { .. } => ErrorCategory::Geocoding,
            EtlError::ZipError(_) | EtlError::IoError(_) => ErrorCategory::System,
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self.category() {
            ErrorCategory::Geocoding => ErrorSeverity::Low,
            ErrorCategory::Network => ErrorSeverity::Medium,
            ErrorCategory::Configuration | ErrorCategory::Data => ErrorSeverity::High,
            ErrorCategory::System => ErrorSeverity::Critical,
        }
    }

    /// 可重試的錯誤：網路逾時、連線失敗、重新導向未出現座標
    pub fn is_retryable(&self) -> bool {
        match self {
            EtlError::ApiError(e) => e.is_timeout() || e.is_connect() || e.is_request(),
            EtlError::TransientFetch { .. }
            | EtlError::RedirectTimeout { .. }
            | EtlError::WebDriverError { .. } => true,
            _ => false,
        }
    }

    /// Fatal errors abort the run before any record is processed.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self.category(),
            ErrorCategory::Configuration | ErrorCategory::System
        )
    }

    pub fn recovery_suggestion(&self) -> &'static str {
        match self {
            EtlError::MissingColumnError { .. } => {
                "Check the header row of the input file or pass --url-column"
            }
            EtlError::ConfigError { .. }
            | EtlError::InvalidConfigValueError { .. }
            | EtlError::MissingConfigError { .. } => {
                "Review the configuration file and command-line flags"
            }
            EtlError::RedirectTimeout { .. } => {
                "Increase --timeout or try the browser resolver (--resolver browser)"
            }
            EtlError::WebDriverError { .. } => {
                "Make sure chromedriver is running and --webdriver-url points at it"
            }
            EtlError::ApiError(_) | EtlError::TransientFetch { .. } => {
                "Check network connectivity; the service may be rate limiting, raise --delay"
            }
            EtlError::GeocodeService { .. } => {
                "The fallback geocoder is unavailable; rerun later to fill the remaining rows"
            }
            EtlError::CsvError(_) => "Make sure the input is a valid CSV/TSV file with a header row",
            EtlError::IoError(_) | EtlError::ZipError(_) => {
                "Check that the input exists and the output directory is writable"
            }
            EtlError::SerializationError(_) | EtlError::ProcessingError { .. } => {
                "Run again with --verbose and inspect the log"
            }
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self.category() {
            ErrorCategory::Configuration => format!("Configuration problem: {}", self),
            ErrorCategory::Network => format!("Network problem: {}", self),
            ErrorCategory::Data => format!("Could not process the data: {}", self),
            ErrorCategory::Geocoding => format!("Geocoding problem: {}", self),
            ErrorCategory::System => format!("System error: {}", self),
        }
    }
}

pub type Result<T> = std::result::Result<T, EtlError>;
