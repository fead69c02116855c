use thiserror::Error;

pub type Result<T> = std::result::Result<T, StorageError>;

/// Failure taxonomy shared by every storage backend and the policy adapter.
///
/// The driver layer never retries or recovers; the first error surfaces
/// verbatim to the caller.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("storage backend has no credentials")]
    Unauthenticated,

    #[error("invalid remote path")]
    InvalidPath,

    #[error("invalid backend configuration: {0}")]
    InvalidConfig(String),

    #[error("no configuration for backend '{0}'")]
    MissingConfig(String),

    #[error("unsupported backend '{0}'")]
    UnsupportedBackend(String),

    #[error("{method} {path} returned {status}")]
    UnexpectedStatus {
        method: &'static str,
        path: String,
        status: String,
    },

    #[error("malformed multistatus response: {0}")]
    Protocol(String),

    #[error(transparent)]
    Transport(#[from] reqwest::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl StorageError {
    /// True for errors a configuration change fixes, as opposed to transient
    /// transport or protocol failures.
    pub fn is_configuration_error(&self) -> bool {
        matches!(
            self,
            StorageError::InvalidConfig(_)
                | StorageError::MissingConfig(_)
                | StorageError::UnsupportedBackend(_)
        )
    }
}
