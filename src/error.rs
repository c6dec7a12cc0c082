use thiserror::Error;

/// Application-wide error types.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Authentication error: {0}")]
    Auth(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Helper conversion from anyhow::Error
impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::Internal(err.to_string())
    }
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        AppError::Configuration(err.to_string())
    }
}

/// Boolean/sentinel view of a store result for callers that only care
/// whether an operation went through.
///
/// The cause is logged before it is dropped, so collapsing a failure
/// never loses it entirely.
pub trait Outcome<T> {
    /// `true` on success, `false` on any failure.
    fn succeeded(self) -> bool;

    /// The success value, or `None` on any failure.
    fn value(self) -> Option<T>;
}

impl<T> Outcome<T> for Result<T, AppError> {
    fn succeeded(self) -> bool {
        self.value().is_some()
    }

    fn value(self) -> Option<T> {
        match self {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::warn!("Store operation failed: {e}");
                None
            }
        }
    }
}
