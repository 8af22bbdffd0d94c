//! SAML error types.
//!
//! Every variant maps to one stable audit code and to a SAML top-level
//! status URI. All of them are fail-closed: the pipelines never recover from
//! one silently.

use fedtrust_core::AuditCode;
use fedtrust_crypto::CryptoError;
use thiserror::Error;

/// Result type for SAML operations.
pub type SamlResult<T> = Result<T, SamlError>;

/// SAML engine errors.
#[derive(Debug, Error)]
pub enum SamlError {
    /// Metadata lacks a required entity, descriptor, or endpoint.
    #[error("trust resolution failed: {0}")]
    TrustResolution(String),

    /// Fatal misconfiguration, such as missing mandatory signing material.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Assertion encryption failed.
    #[error("encryption failed: {0}")]
    Encryption(String),

    /// Assertion decryption failed.
    ///
    /// Carries no detail so callers cannot tell which stage failed.
    #[error("decryption failed")]
    Decryption,

    /// The signature is structurally unusable.
    #[error("signature error: {0}")]
    SignatureEngine(String),

    /// A structurally sound signature did not verify.
    #[error("signature rejected: {0}")]
    SignatureRejected(String),

    /// The assertion is malformed or has the wrong version or destination.
    #[error("invalid assertion: {0}")]
    InvalidAssertion(String),

    /// The issuer is absent or not trusted.
    #[error("unknown issuer: {0}")]
    UnknownIssuer(String),

    /// The assertion carries no validity window.
    #[error("assertion has no validity window")]
    MissingTimeframe,

    /// The current time lies outside the validity window.
    #[error("assertion expired or not yet valid: {0}")]
    ExpiredOrPremature(String),

    /// The assertion carries no subject or subject identifier.
    #[error("assertion has no subject")]
    MissingSubject,

    /// The assertion identifier was seen before within the retention window.
    #[error("replay detected: {0}")]
    ReplayDetected(String),

    /// XML could not be parsed.
    #[error("XML parsing error: {0}")]
    XmlParse(String),

    /// Key store failure.
    #[error("key store error: {0}")]
    KeyStore(String),

    /// Metadata could not be loaded or parsed.
    #[error("metadata error: {0}")]
    Metadata(String),

    /// Any other internal failure.
    #[error("internal error: {0}")]
    Internal(String),
}

impl SamlError {
    /// Returns the audit code reported for this error.
    #[must_use]
    pub const fn audit_code(&self) -> AuditCode {
        match self {
            Self::TrustResolution(_) | Self::Metadata(_) => AuditCode::TrustResolutionFailed,
            Self::Configuration(_) | Self::KeyStore(_) => AuditCode::ConfigurationInvalid,
            Self::Encryption(_) => AuditCode::EncryptionFailed,
            Self::Decryption => AuditCode::DecryptionFailed,
            Self::SignatureEngine(_) => AuditCode::SignatureStructureInvalid,
            Self::SignatureRejected(_) => AuditCode::SignatureInvalid,
            Self::InvalidAssertion(_) | Self::XmlParse(_) => AuditCode::AssertionInvalid,
            Self::UnknownIssuer(_) => AuditCode::UnknownIssuer,
            Self::MissingTimeframe => AuditCode::MissingTimeframe,
            Self::ExpiredOrPremature(_) => AuditCode::ExpiredOrPremature,
            Self::MissingSubject => AuditCode::MissingSubject,
            Self::ReplayDetected(_) => AuditCode::ReplayDetected,
            Self::Internal(_) => AuditCode::InternalError,
        }
    }

    /// Returns the SAML 2.0 top-level status code for this error.
    #[must_use]
    pub const fn status_code(&self) -> &'static str {
        match self {
            Self::InvalidAssertion(_)
            | Self::XmlParse(_)
            | Self::SignatureEngine(_)
            | Self::SignatureRejected(_)
            | Self::MissingTimeframe
            | Self::ExpiredOrPremature(_)
            | Self::MissingSubject
            | Self::ReplayDetected(_)
            | Self::Decryption => "urn:oasis:names:tc:SAML:2.0:status:Requester",
            Self::UnknownIssuer(_) => "urn:oasis:names:tc:SAML:2.0:status:RequestDenied",
            _ => "urn:oasis:names:tc:SAML:2.0:status:Responder",
        }
    }
}

impl From<CryptoError> for SamlError {
    fn from(err: CryptoError) -> Self {
        match err {
            CryptoError::Decryption => Self::Decryption,
            CryptoError::Encryption(msg) => Self::Encryption(msg),
            CryptoError::KeyStore(msg) => Self::KeyStore(msg),
            CryptoError::Signing(msg) => Self::SignatureEngine(msg),
            CryptoError::UnsupportedAlgorithm(msg) => {
                Self::SignatureEngine(format!("algorithm not supported: {msg}"))
            }
            CryptoError::InvalidKey(msg) => Self::Configuration(format!("invalid key: {msg}")),
        }
    }
}

impl From<quick_xml::Error> for SamlError {
    fn from(err: quick_xml::Error) -> Self {
        Self::XmlParse(err.to_string())
    }
}

impl From<quick_xml::events::attributes::AttrError> for SamlError {
    fn from(err: quick_xml::events::attributes::AttrError) -> Self {
        Self::XmlParse(err.to_string())
    }
}

impl From<base64::DecodeError> for SamlError {
    fn from(err: base64::DecodeError) -> Self {
        Self::XmlParse(format!("base64 decode error: {err}"))
    }
}

impl From<fedtrust_core::Error> for SamlError {
    fn from(err: fedtrust_core::Error) -> Self {
        if err.is_configuration_error() {
            Self::Configuration(err.to_string())
        } else {
            Self::Internal(err.to_string())
        }
    }
}
