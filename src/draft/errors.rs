use thiserror::Error;

/// 存储介质错误
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Invalid storage key: {0}")]
    InvalidKey(String),

    #[error("Storage unavailable: {0}")]
    Unavailable(String),
}

#[derive(Error, Debug)]
pub enum DraftError {
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Serialize error: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("Draft record must serialize to a JSON object, got {0}")]
    NotAnObject(&'static str),
}

/// Error alias
pub type Result<T, E = DraftError> = std::result::Result<T, E>;
