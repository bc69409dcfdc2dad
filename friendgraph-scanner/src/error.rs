use thiserror::Error;

#[derive(Error, Debug)]
pub enum ScanError {
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("Upstream returned HTTP {status} for {endpoint}")]
    Upstream { endpoint: String, status: u16 },

    #[error("Upstream still failing after {attempts} attempts ({operation}): {last_error}")]
    RetriesExhausted {
        operation: String,
        attempts: u32,
        last_error: String,
    },

    #[error("Invalid steam id: {0}")]
    InvalidSteamId(String),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Other error: {0}")]
    Other(String),
}

impl ScanError {
    /// Whether retrying the same request later could succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            ScanError::HttpError(e) => e.is_timeout() || e.is_connect(),
            ScanError::Upstream { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }

    /// Whether the error means the upstream identity provider could not be reached.
    pub fn is_upstream_failure(&self) -> bool {
        matches!(
            self,
            ScanError::HttpError(_) | ScanError::Upstream { .. } | ScanError::RetriesExhausted { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, ScanError>;
