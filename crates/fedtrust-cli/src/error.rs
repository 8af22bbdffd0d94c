//! CLI error types.

use thiserror::Error;

/// CLI error type.
#[derive(Debug, Error)]
pub enum CliError {
    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// Engine error.
    #[error(transparent)]
    Saml(#[from] fedtrust_saml::SamlError),

    /// Key material error.
    #[error("crypto error: {0}")]
    Crypto(#[from] fedtrust_crypto::CryptoError),

    /// Core error.
    #[error(transparent)]
    Core(#[from] fedtrust_core::Error),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Invalid argument.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

/// CLI result type.
pub type CliResult<T> = Result<T, CliError>;
