use crate::store::StoreError;

#[derive(Debug, thiserror::Error)]
pub enum DocumentError {
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("failed to serialize document: {0}")]
    Serialization(serde_json::Error),
    #[error("storage error: {0}")]
    Store(#[from] StoreError),
    #[error("comparison unavailable: version '{0}' not found in the loaded history")]
    ComparisonUnavailable(String),
    #[error("operation not valid while the edit session is {0}")]
    InvalidSessionState(&'static str),
    #[error("stashed changes not found for key '{0}'")]
    HandoffNotFound(String),
}

pub type DocumentResult<T> = std::result::Result<T, DocumentError>;
