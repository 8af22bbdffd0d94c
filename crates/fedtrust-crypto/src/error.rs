//! Cryptographic error types.

use thiserror::Error;

/// Result type for cryptographic operations.
pub type CryptoResult<T> = Result<T, CryptoError>;

/// Error type for cryptographic operations.
#[derive(Debug, Error)]
pub enum CryptoError {
    /// Key material could not be parsed or does not fit the operation.
    #[error("invalid key: {0}")]
    InvalidKey(String),

    /// Algorithm is unknown or refused.
    #[error("algorithm not supported: {0}")]
    UnsupportedAlgorithm(String),

    /// Envelope encryption failed.
    #[error("encryption failed: {0}")]
    Encryption(String),

    /// Envelope decryption failed.
    ///
    /// Carries no detail so callers cannot tell which stage failed.
    #[error("decryption failed")]
    Decryption,

    /// Signature creation failed.
    #[error("signing failed: {0}")]
    Signing(String),

    /// Key store lookup or load failed.
    #[error("key store error: {0}")]
    KeyStore(String),
}
