//! Error types for the similarity engine

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    /// Missing or invalid variant descriptor, weights or engine configuration
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("artifact missing: {0}")]
    ArtifactMissing(String),

    #[error("artifact corrupt: {artifact}: {reason}")]
    ArtifactCorrupt { artifact: String, reason: String },

    /// A handle was requested for a variant that has not been loaded
    #[error("model not loaded: {0}")]
    NotLoaded(String),

    /// Encoder and index disagree on dimensionality (artifact version skew)
    #[error("dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Persistence layer failure
    #[error("store error: {0}")]
    Store(String),
}

impl Error {
    pub(crate) fn corrupt(artifact: impl Into<String>, reason: impl std::fmt::Display) -> Self {
        Error::ArtifactCorrupt {
            artifact: artifact.into(),
            reason: reason.to_string(),
        }
    }

    /// Errors the caller caused and should not retry.
    pub fn is_client_error(&self) -> bool {
        matches!(self, Error::InvalidRequest(_))
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Store(e.to_string())
    }
}

impl From<bincode::Error> for Error {
    fn from(e: bincode::Error) -> Self {
        Error::Store(e.to_string())
    }
}
