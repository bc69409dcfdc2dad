use friendgraph_scanner::ScanError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Profile {0} is private")]
    PrivateProfile(String),

    #[error("Not ready: {0}")]
    NotReady(String),

    #[error("Upstream unavailable: {0}")]
    UpstreamUnavailable(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Task failed: {0}")]
    Join(#[from] tokio::task::JoinError),

    #[error("{0}")]
    Other(String),
}

impl From<ScanError> for CoreError {
    fn from(error: ScanError) -> Self {
        match error {
            ScanError::InvalidSteamId(id) => {
                CoreError::InvalidInput(format!("'{}' is not a 17 digit steam id", id))
            }
            e if e.is_upstream_failure() => CoreError::UpstreamUnavailable(e.to_string()),
            e => CoreError::Other(e.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, CoreError>;
