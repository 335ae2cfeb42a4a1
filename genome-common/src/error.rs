//! Error types for GenomeGPT services.

use thiserror::Error;

/// Result type alias using the common error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Unified error type for GenomeGPT services.
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Invalid input or request
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Upstream service error (network, auth, quota, bad response)
    #[error("Upstream error: {0}")]
    Upstream(String),

    /// Upstream call exceeded its time budget
    #[error("Upstream call timed out after {0}s")]
    Timeout(u64),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Check if this is a client-side input error.
    pub const fn is_client_error(&self) -> bool {
        matches!(self, Self::InvalidInput(_))
    }

    /// Check if this error came from an upstream dependency, timeouts included.
    pub const fn is_upstream(&self) -> bool {
        matches!(self, Self::Upstream(_) | Self::Timeout(_))
    }

    /// Get HTTP status code for this error.
    pub const fn status_code(&self) -> u16 {
        match self {
            Self::InvalidInput(_) => 400,
            _ => 500,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_status_codes() {
        assert_eq!(Error::InvalidInput("test".into()).status_code(), 400);
        assert_eq!(Error::Upstream("test".into()).status_code(), 500);
        assert_eq!(Error::Timeout(30).status_code(), 500);
        assert_eq!(Error::Internal("test".into()).status_code(), 500);
    }

    #[test]
    fn test_error_classification() {
        assert!(Error::InvalidInput("x".into()).is_client_error());
        assert!(!Error::InvalidInput("x".into()).is_upstream());
        assert!(Error::Upstream("x".into()).is_upstream());
        assert!(Error::Timeout(5).is_upstream());
        assert!(!Error::Config("x".into()).is_upstream());
    }
}
