//! Core error type.
//!
//! Error messages describe what went wrong without echoing secret material
//! such as key passwords or key bytes.

use thiserror::Error;

/// Result type alias using the core error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type.
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration is missing, malformed, or inconsistent.
    #[error("configuration error: {0}")]
    Config(String),

    /// Filesystem error while loading configuration.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Audit sink failed to accept an event.
    #[error("audit error: {0}")]
    Audit(String),
}

impl Error {
    /// Returns whether this error is caused by operator misconfiguration.
    #[must_use]
    pub const fn is_configuration_error(&self) -> bool {
        matches!(self, Self::Config(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_error_is_classified() {
        let err = Error::Config("missing entity id".to_string());
        assert!(err.is_configuration_error());
        assert_eq!(err.to_string(), "configuration error: missing entity id");
    }

    #[test]
    fn io_error_converts() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err: Error = io.into();
        assert!(!err.is_configuration_error());
        assert!(err.to_string().contains("gone"));
    }
}
