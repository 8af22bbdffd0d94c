//! Algorithm identifiers.
//!
//! Each enum maps to the W3C XML-DSig / XML-Enc algorithm URI used on the
//! wire. Legacy algorithms are recognized so they can be refused with a clear
//! error instead of being reported as unknown.

use serde::{Deserialize, Serialize};

use crate::error::{CryptoError, CryptoResult};

/// Key family of an asymmetric credential.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum KeyFamily {
    /// RSA key of any supported modulus size.
    Rsa,
    /// ECDSA key on NIST P-256.
    EcP256,
    /// ECDSA key on NIST P-384.
    EcP384,
}

impl KeyFamily {
    /// Returns the signature algorithm used for keys of this family.
    #[must_use]
    pub const fn signature_algorithm(self) -> SignatureAlgorithm {
        match self {
            Self::Rsa => SignatureAlgorithm::RsaSha256,
            Self::EcP256 => SignatureAlgorithm::EcdsaSha256,
            Self::EcP384 => SignatureAlgorithm::EcdsaSha384,
        }
    }

    /// Returns true if keys of this family can wrap session keys.
    #[must_use]
    pub const fn supports_key_transport(self) -> bool {
        matches!(self, Self::Rsa)
    }
}

/// Digest algorithms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DigestAlgorithm {
    /// SHA-256.
    Sha256,
    /// SHA-384.
    Sha384,
    /// SHA-512.
    Sha512,
}

impl DigestAlgorithm {
    /// Returns the XML-DSig URI.
    #[must_use]
    pub const fn uri(self) -> &'static str {
        match self {
            Self::Sha256 => "http://www.w3.org/2001/04/xmlenc#sha256",
            Self::Sha384 => "http://www.w3.org/2001/04/xmldsig-more#sha384",
            Self::Sha512 => "http://www.w3.org/2001/04/xmlenc#sha512",
        }
    }

    /// Parses a digest algorithm from its URI.
    #[must_use]
    pub fn from_uri(uri: &str) -> Option<Self> {
        match uri {
            "http://www.w3.org/2001/04/xmlenc#sha256" => Some(Self::Sha256),
            "http://www.w3.org/2001/04/xmldsig-more#sha384" => Some(Self::Sha384),
            "http://www.w3.org/2001/04/xmlenc#sha512" => Some(Self::Sha512),
            _ => None,
        }
    }

    /// Returns the output length in bytes.
    #[must_use]
    pub const fn output_len(self) -> usize {
        match self {
            Self::Sha256 => 32,
            Self::Sha384 => 48,
            Self::Sha512 => 64,
        }
    }
}

/// Signature algorithms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SignatureAlgorithm {
    /// RSA PKCS#1 v1.5 with SHA-256.
    RsaSha256,
    /// RSA PKCS#1 v1.5 with SHA-384.
    RsaSha384,
    /// RSA PKCS#1 v1.5 with SHA-512.
    RsaSha512,
    /// ECDSA on P-256 with SHA-256.
    EcdsaSha256,
    /// ECDSA on P-384 with SHA-384.
    EcdsaSha384,
}

/// Legacy RSA-SHA1 URI, recognized only to be refused.
const RSA_SHA1_URI: &str = "http://www.w3.org/2000/09/xmldsig#rsa-sha1";

impl SignatureAlgorithm {
    /// Returns the XML-DSig URI.
    #[must_use]
    pub const fn uri(self) -> &'static str {
        match self {
            Self::RsaSha256 => "http://www.w3.org/2001/04/xmldsig-more#rsa-sha256",
            Self::RsaSha384 => "http://www.w3.org/2001/04/xmldsig-more#rsa-sha384",
            Self::RsaSha512 => "http://www.w3.org/2001/04/xmldsig-more#rsa-sha512",
            Self::EcdsaSha256 => "http://www.w3.org/2001/04/xmldsig-more#ecdsa-sha256",
            Self::EcdsaSha384 => "http://www.w3.org/2001/04/xmldsig-more#ecdsa-sha384",
        }
    }

    /// Parses a signature algorithm from its URI.
    ///
    /// # Errors
    ///
    /// Returns `UnsupportedAlgorithm` for unknown URIs and for SHA-1.
    pub fn from_uri(uri: &str) -> CryptoResult<Self> {
        match uri {
            "http://www.w3.org/2001/04/xmldsig-more#rsa-sha256" => Ok(Self::RsaSha256),
            "http://www.w3.org/2001/04/xmldsig-more#rsa-sha384" => Ok(Self::RsaSha384),
            "http://www.w3.org/2001/04/xmldsig-more#rsa-sha512" => Ok(Self::RsaSha512),
            "http://www.w3.org/2001/04/xmldsig-more#ecdsa-sha256" => Ok(Self::EcdsaSha256),
            "http://www.w3.org/2001/04/xmldsig-more#ecdsa-sha384" => Ok(Self::EcdsaSha384),
            RSA_SHA1_URI => Err(CryptoError::UnsupportedAlgorithm(
                "RSA-SHA1 signatures are refused".to_string(),
            )),
            other => Err(CryptoError::UnsupportedAlgorithm(other.to_string())),
        }
    }

    /// Returns the digest algorithm paired with this signature algorithm.
    #[must_use]
    pub const fn digest(self) -> DigestAlgorithm {
        match self {
            Self::RsaSha256 | Self::EcdsaSha256 => DigestAlgorithm::Sha256,
            Self::RsaSha384 | Self::EcdsaSha384 => DigestAlgorithm::Sha384,
            Self::RsaSha512 => DigestAlgorithm::Sha512,
        }
    }

    /// Returns true if this algorithm can be used with keys of `family`.
    #[must_use]
    pub const fn matches_family(self, family: KeyFamily) -> bool {
        matches!(
            (self, family),
            (Self::RsaSha256 | Self::RsaSha384 | Self::RsaSha512, KeyFamily::Rsa)
                | (Self::EcdsaSha256, KeyFamily::EcP256)
                | (Self::EcdsaSha384, KeyFamily::EcP384)
        )
    }
}

/// Key transport algorithms (asymmetric wrapping of a session key).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum KeyTransportAlgorithm {
    /// RSA-OAEP with SHA-1 digest and MGF1-SHA1.
    RsaOaepMgf1p,
    /// RSA-OAEP with SHA-256 digest and MGF1-SHA256.
    RsaOaep,
}

/// Legacy RSA PKCS#1 v1.5 key transport URI, recognized only to be refused.
const RSA_1_5_URI: &str = "http://www.w3.org/2001/04/xmlenc#rsa-1_5";

impl KeyTransportAlgorithm {
    /// Returns the XML-Enc URI.
    #[must_use]
    pub const fn uri(self) -> &'static str {
        match self {
            Self::RsaOaepMgf1p => "http://www.w3.org/2001/04/xmlenc#rsa-oaep-mgf1p",
            Self::RsaOaep => "http://www.w3.org/2009/xmlenc11#rsa-oaep",
        }
    }

    /// Parses a key transport algorithm from its URI.
    ///
    /// # Errors
    ///
    /// Returns `UnsupportedAlgorithm` for unknown URIs and for RSA PKCS#1 v1.5.
    pub fn from_uri(uri: &str) -> CryptoResult<Self> {
        match uri {
            "http://www.w3.org/2001/04/xmlenc#rsa-oaep-mgf1p" => Ok(Self::RsaOaepMgf1p),
            "http://www.w3.org/2009/xmlenc11#rsa-oaep" => Ok(Self::RsaOaep),
            RSA_1_5_URI => Err(CryptoError::UnsupportedAlgorithm(
                "RSA PKCS#1 v1.5 key transport is refused".to_string(),
            )),
            other => Err(CryptoError::UnsupportedAlgorithm(other.to_string())),
        }
    }

    /// Returns true if `uri` names a key transport algorithm, supported or not.
    #[must_use]
    pub fn is_key_transport_uri(uri: &str) -> bool {
        uri == RSA_1_5_URI || Self::from_uri(uri).is_ok()
    }
}

/// Block cipher algorithms for the bulk payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DataEncryptionAlgorithm {
    /// AES-128 in GCM mode.
    Aes128Gcm,
    /// AES-256 in GCM mode.
    Aes256Gcm,
}

impl DataEncryptionAlgorithm {
    /// Returns the XML-Enc URI.
    #[must_use]
    pub const fn uri(self) -> &'static str {
        match self {
            Self::Aes128Gcm => "http://www.w3.org/2009/xmlenc11#aes128-gcm",
            Self::Aes256Gcm => "http://www.w3.org/2009/xmlenc11#aes256-gcm",
        }
    }

    /// Parses a block cipher algorithm from its URI.
    ///
    /// # Errors
    ///
    /// Returns `UnsupportedAlgorithm` for unknown URIs.
    pub fn from_uri(uri: &str) -> CryptoResult<Self> {
        match uri {
            "http://www.w3.org/2009/xmlenc11#aes128-gcm" => Ok(Self::Aes128Gcm),
            "http://www.w3.org/2009/xmlenc11#aes256-gcm" => Ok(Self::Aes256Gcm),
            other => Err(CryptoError::UnsupportedAlgorithm(other.to_string())),
        }
    }

    /// Returns the session key length in bytes.
    #[must_use]
    pub const fn key_len(self) -> usize {
        match self {
            Self::Aes128Gcm => 16,
            Self::Aes256Gcm => 32,
        }
    }
}
