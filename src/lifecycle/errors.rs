use thiserror::Error;

#[derive(Error, Debug)]
pub enum LifecycleError {
    #[error("Lifecycle worker shut down")]
    ManagerShutdown,

    #[error("Internal error: {0}")]
    InternalError(String),
}

impl LifecycleError {
    pub fn internal_error(message: impl Into<String>) -> Self {
        Self::InternalError(message.into())
    }
}

/// Error alias
pub type Result<T, E = LifecycleError> = std::result::Result<T, E>;
