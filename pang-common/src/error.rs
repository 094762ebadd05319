//! Error types shared by Pang crates.

use thiserror::Error;

/// Result type alias using the Pang error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Unified error type for Pang services.
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// External service error
    #[error("External service error: {0}")]
    External(String),
}

impl Error {
    /// Check if this is a configuration error.
    pub const fn is_config(&self) -> bool {
        matches!(self, Self::Config(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::Config("ttl must be positive".into());
        assert_eq!(err.to_string(), "Configuration error: ttl must be positive");
        assert!(err.is_config());
    }

    #[test]
    fn test_external_error_display() {
        let err = Error::External("Image fetch failed: 404".into());
        assert_eq!(err.to_string(), "External service error: Image fetch failed: 404");
        assert!(!err.is_config());
    }
}
