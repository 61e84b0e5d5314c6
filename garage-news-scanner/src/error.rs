use thiserror::Error;

/// Why a single URL could not be turned into usable content.
///
/// Every variant is recoverable: the caller logs it, skips the URL and keeps
/// going with the rest of the run.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchFailure {
    #[error("network failure: {0}")]
    Network(String),

    #[error("HTTP status {status}")]
    HttpStatus { status: u16 },

    #[error("unexpected content type: {0}")]
    ContentType(String),

    #[error("parse failure: {0}")]
    Parse(String),
}

impl FetchFailure {
    /// Short machine-friendly label, used in reports.
    pub fn kind(&self) -> &'static str {
        match self {
            FetchFailure::Network(_) => "network",
            FetchFailure::HttpStatus { .. } => "http_status",
            FetchFailure::ContentType(_) => "content_type",
            FetchFailure::Parse(_) => "parse",
        }
    }
}

impl From<reqwest::Error> for FetchFailure {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            FetchFailure::Network(format!("request timed out: {}", err))
        } else if let Some(status) = err.status() {
            FetchFailure::HttpStatus {
                status: status.as_u16(),
            }
        } else {
            FetchFailure::Network(err.to_string())
        }
    }
}

/// Errors that stop the scanner from being set up at all.
#[derive(Error, Debug)]
pub enum ScanError {
    #[error("HTTP client error: {0}")]
    HttpClient(#[from] reqwest::Error),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),
}

pub type Result<T> = std::result::Result<T, ScanError>;
