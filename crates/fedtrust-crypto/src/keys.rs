//! Public and private credentials.
//!
//! ## Supported key families
//!
//! - RSA (2048 bits and up): signing and key transport
//! - ECDSA P-256 and P-384: signing only
//!
//! Private keys are held as PKCS#8 DER and zeroized on drop. Key objects used
//! by aws-lc-rs are rebuilt from the DER on every operation, so credentials
//! can be shared freely between tasks.

use std::fmt;

use aws_lc_rs::{
    encoding::{AsDer, Pkcs8V1Der, PublicKeyX509Der},
    rand::SystemRandom,
    rsa::{KeySize, PrivateDecryptingKey},
    signature::{
        EcdsaKeyPair, KeyPair, RsaKeyPair, ECDSA_P256_SHA256_FIXED_SIGNING,
        ECDSA_P384_SHA384_FIXED_SIGNING,
    },
};
use base64::Engine;
use x509_parser::prelude::FromDer;
use x509_parser::x509::SubjectPublicKeyInfo;
use zeroize::Zeroizing;

use crate::algorithm::{KeyFamily, SignatureAlgorithm};
use crate::error::{CryptoError, CryptoResult};

const OID_RSA_ENCRYPTION: &str = "1.2.840.113549.1.1.1";
const OID_EC_PUBLIC_KEY: &str = "1.2.840.10045.2.1";
const OID_CURVE_P256: &str = "1.2.840.10045.3.1.7";
const OID_CURVE_P384: &str = "1.3.132.0.34";

// ============================================================================
// Public Credential
// ============================================================================

/// A public key with optional certificate and key name.
#[derive(Clone, PartialEq, Eq)]
pub struct PublicCredential {
    family: KeyFamily,
    spki_der: Vec<u8>,
    raw_key: Vec<u8>,
    certificate_der: Option<Vec<u8>>,
    key_name: Option<String>,
}

impl PublicCredential {
    /// Creates a credential from a DER-encoded `SubjectPublicKeyInfo`.
    ///
    /// # Errors
    ///
    /// Returns `InvalidKey` if the DER is malformed or the key family is not
    /// supported.
    pub fn from_spki_der(spki_der: &[u8]) -> CryptoResult<Self> {
        let (family, raw_key) = parse_spki(spki_der)?;
        Ok(Self {
            family,
            spki_der: spki_der.to_vec(),
            raw_key,
            certificate_der: None,
            key_name: None,
        })
    }

    /// Creates a credential from a DER-encoded X.509 certificate.
    ///
    /// # Errors
    ///
    /// Returns `InvalidKey` if the certificate cannot be parsed.
    pub fn from_certificate_der(certificate_der: &[u8]) -> CryptoResult<Self> {
        let spki = certificate_spki(certificate_der)?;
        let mut credential = Self::from_spki_der(&spki)?;
        credential.certificate_der = Some(certificate_der.to_vec());
        Ok(credential)
    }

    /// Creates a credential from a PEM `CERTIFICATE` or `PUBLIC KEY` block.
    ///
    /// # Errors
    ///
    /// Returns `InvalidKey` for malformed PEM or an unexpected label.
    pub fn from_pem(pem: &str) -> CryptoResult<Self> {
        let (label, der) = decode_pem(pem)?;
        match label.as_str() {
            "CERTIFICATE" => Self::from_certificate_der(&der),
            "PUBLIC KEY" => Self::from_spki_der(&der),
            other => Err(CryptoError::InvalidKey(format!(
                "unexpected PEM label for a public key: {other}"
            ))),
        }
    }

    /// Attaches a key name.
    #[must_use]
    pub fn with_key_name(mut self, name: impl Into<String>) -> Self {
        self.key_name = Some(name.into());
        self
    }

    /// Returns the key family.
    #[must_use]
    pub const fn family(&self) -> KeyFamily {
        self.family
    }

    /// Returns the `SubjectPublicKeyInfo` DER.
    #[must_use]
    pub fn spki_der(&self) -> &[u8] {
        &self.spki_der
    }

    /// Returns the certificate DER, if the key came from a certificate.
    #[must_use]
    pub fn certificate_der(&self) -> Option<&[u8]> {
        self.certificate_der.as_deref()
    }

    /// Returns the key name, if any.
    #[must_use]
    pub fn key_name(&self) -> Option<&str> {
        self.key_name.as_deref()
    }

    /// Returns a short identifier derived from the public key, for logs.
    #[must_use]
    pub fn key_id(&self) -> String {
        let hash = crate::sha256(&self.spki_der);
        base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(&hash[..8])
    }

    /// Returns true if both credentials hold the same public key.
    #[must_use]
    pub fn same_key(&self, other: &Self) -> bool {
        self.family == other.family && self.raw_key == other.raw_key
    }

    /// Encodes the public key as a PEM `PUBLIC KEY` block.
    #[must_use]
    pub fn to_pem(&self) -> String {
        encode_pem("PUBLIC KEY", &self.spki_der)
    }

    /// Returns the key in the form aws-lc-rs verification expects: the
    /// PKCS#1 `RSAPublicKey` for RSA, the uncompressed point for EC.
    pub(crate) fn raw_public_key(&self) -> &[u8] {
        &self.raw_key
    }
}

impl fmt::Debug for PublicCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PublicCredential")
            .field("family", &self.family)
            .field("key_id", &self.key_id())
            .field("has_certificate", &self.certificate_der.is_some())
            .field("key_name", &self.key_name)
            .finish()
    }
}

// ============================================================================
// Private Credential
// ============================================================================

/// A private key with its public half.
#[derive(Clone)]
pub struct PrivateCredential {
    pkcs8: Zeroizing<Vec<u8>>,
    family: KeyFamily,
    public: PublicCredential,
}

impl PrivateCredential {
    /// Creates a credential from PKCS#8 DER.
    ///
    /// The key family is detected from the key itself.
    ///
    /// # Errors
    ///
    /// Returns `InvalidKey` if the key is not an RSA, P-256, or P-384 key.
    pub fn from_pkcs8_der(pkcs8_der: &[u8]) -> CryptoResult<Self> {
        let (family, spki) = if RsaKeyPair::from_pkcs8(pkcs8_der).is_ok() {
            let key = PrivateDecryptingKey::from_pkcs8(pkcs8_der)
                .map_err(|e| CryptoError::InvalidKey(format!("RSA key rejected: {e}")))?;
            let spki: PublicKeyX509Der<'static> = key
                .public_key()
                .as_der()
                .map_err(|_| CryptoError::InvalidKey("cannot encode RSA public key".into()))?;
            (KeyFamily::Rsa, spki.as_ref().to_vec())
        } else if let Ok(key) = EcdsaKeyPair::from_pkcs8(&ECDSA_P256_SHA256_FIXED_SIGNING, pkcs8_der)
        {
            (KeyFamily::EcP256, ec_spki(&key)?)
        } else if let Ok(key) = EcdsaKeyPair::from_pkcs8(&ECDSA_P384_SHA384_FIXED_SIGNING, pkcs8_der)
        {
            (KeyFamily::EcP384, ec_spki(&key)?)
        } else {
            return Err(CryptoError::InvalidKey(
                "PKCS#8 key is not RSA, P-256, or P-384".to_string(),
            ));
        };

        Ok(Self {
            pkcs8: Zeroizing::new(pkcs8_der.to_vec()),
            family,
            public: PublicCredential::from_spki_der(&spki)?,
        })
    }

    /// Creates a credential from a PEM `PRIVATE KEY` block.
    ///
    /// # Errors
    ///
    /// Returns `InvalidKey` for encrypted PEM, legacy PKCS#1 PEM, or any
    /// other label.
    pub fn from_pem(pem: &str) -> CryptoResult<Self> {
        let (label, der) = decode_pem(pem)?;
        let der = Zeroizing::new(der);
        match label.as_str() {
            "PRIVATE KEY" => Self::from_pkcs8_der(&der),
            "ENCRYPTED PRIVATE KEY" => Err(CryptoError::InvalidKey(
                "encrypted private keys are not supported".to_string(),
            )),
            other => Err(CryptoError::InvalidKey(format!(
                "expected a PKCS#8 PRIVATE KEY block, found {other}"
            ))),
        }
    }

    /// Generates a new RSA key.
    ///
    /// # Errors
    ///
    /// Returns `InvalidKey` for sizes other than 2048, 3072, or 4096 bits.
    pub fn generate_rsa(bits: u32) -> CryptoResult<Self> {
        let size = match bits {
            2048 => KeySize::Rsa2048,
            3072 => KeySize::Rsa3072,
            4096 => KeySize::Rsa4096,
            other => {
                return Err(CryptoError::InvalidKey(format!(
                    "unsupported RSA key size: {other}"
                )))
            }
        };
        let key = RsaKeyPair::generate(size)
            .map_err(|_| CryptoError::InvalidKey("RSA key generation failed".to_string()))?;
        let der: Pkcs8V1Der<'static> = key
            .as_der()
            .map_err(|_| CryptoError::InvalidKey("cannot encode RSA key".to_string()))?;
        Self::from_pkcs8_der(der.as_ref())
    }

    /// Generates a new key of the given family, using 2048 bits for RSA.
    ///
    /// # Errors
    ///
    /// Returns `InvalidKey` if generation fails.
    pub fn generate(family: KeyFamily) -> CryptoResult<Self> {
        let alg = match family {
            KeyFamily::Rsa => return Self::generate_rsa(2048),
            KeyFamily::EcP256 => &ECDSA_P256_SHA256_FIXED_SIGNING,
            KeyFamily::EcP384 => &ECDSA_P384_SHA384_FIXED_SIGNING,
        };
        let document = EcdsaKeyPair::generate_pkcs8(alg, &SystemRandom::new())
            .map_err(|_| CryptoError::InvalidKey("EC key generation failed".to_string()))?;
        Self::from_pkcs8_der(document.as_ref())
    }

    /// Attaches the certificate for this key.
    ///
    /// # Errors
    ///
    /// Returns `InvalidKey` if the certificate holds a different public key.
    pub fn with_certificate(mut self, certificate_der: &[u8]) -> CryptoResult<Self> {
        let from_cert = PublicCredential::from_certificate_der(certificate_der)?;
        if !from_cert.same_key(&self.public) {
            return Err(CryptoError::InvalidKey(
                "certificate does not match the private key".to_string(),
            ));
        }
        self.public = match self.public.key_name.take() {
            Some(name) => from_cert.with_key_name(name),
            None => from_cert,
        };
        Ok(self)
    }

    /// Attaches a key name to the public half.
    #[must_use]
    pub fn with_key_name(mut self, name: impl Into<String>) -> Self {
        self.public = self.public.with_key_name(name);
        self
    }

    /// Returns the key family.
    #[must_use]
    pub const fn family(&self) -> KeyFamily {
        self.family
    }

    /// Returns the signature algorithm this key signs with.
    #[must_use]
    pub const fn signature_algorithm(&self) -> SignatureAlgorithm {
        self.family.signature_algorithm()
    }

    /// Returns the public half.
    #[must_use]
    pub const fn public_credential(&self) -> &PublicCredential {
        &self.public
    }

    /// Returns the certificate DER, if one is attached.
    #[must_use]
    pub fn certificate_der(&self) -> Option<&[u8]> {
        self.public.certificate_der()
    }

    /// Encodes the key as a PEM `PRIVATE KEY` block.
    #[must_use]
    pub fn to_pem(&self) -> Zeroizing<String> {
        Zeroizing::new(encode_pem("PRIVATE KEY", &self.pkcs8))
    }

    pub(crate) fn pkcs8_der(&self) -> &[u8] {
        &self.pkcs8
    }
}

impl fmt::Debug for PrivateCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PrivateCredential")
            .field("family", &self.family)
            .field("public", &self.public)
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Helpers
// ============================================================================

fn ec_spki(key: &EcdsaKeyPair) -> CryptoResult<Vec<u8>> {
    let spki: PublicKeyX509Der<'static> = key
        .public_key()
        .as_der()
        .map_err(|_| CryptoError::InvalidKey("cannot encode EC public key".to_string()))?;
    Ok(spki.as_ref().to_vec())
}

/// Detects the key family and extracts the raw key bits from an SPKI.
fn parse_spki(spki_der: &[u8]) -> CryptoResult<(KeyFamily, Vec<u8>)> {
    let (_, spki) = SubjectPublicKeyInfo::from_der(spki_der)
        .map_err(|e| CryptoError::InvalidKey(format!("malformed SubjectPublicKeyInfo: {e}")))?;

    let family = match spki.algorithm.algorithm.to_id_string().as_str() {
        OID_RSA_ENCRYPTION => KeyFamily::Rsa,
        OID_EC_PUBLIC_KEY => {
            let curve = spki
                .algorithm
                .parameters
                .as_ref()
                .and_then(|p| p.as_oid().ok())
                .map(|oid| oid.to_id_string())
                .ok_or_else(|| CryptoError::InvalidKey("EC key without named curve".into()))?;
            match curve.as_str() {
                OID_CURVE_P256 => KeyFamily::EcP256,
                OID_CURVE_P384 => KeyFamily::EcP384,
                other => {
                    return Err(CryptoError::InvalidKey(format!(
                        "unsupported EC curve: {other}"
                    )))
                }
            }
        }
        other => {
            return Err(CryptoError::InvalidKey(format!(
                "unsupported public key algorithm: {other}"
            )))
        }
    };

    Ok((family, spki.subject_public_key.data.to_vec()))
}

fn certificate_spki(certificate_der: &[u8]) -> CryptoResult<Vec<u8>> {
    let (_, cert) = x509_parser::parse_x509_certificate(certificate_der)
        .map_err(|e| CryptoError::InvalidKey(format!("malformed certificate: {e}")))?;
    Ok(cert.tbs_certificate.subject_pki.raw.to_vec())
}

/// Decodes the first PEM block, returning its label and DER contents.
fn decode_pem(pem: &str) -> CryptoResult<(String, Vec<u8>)> {
    let (_, block) = x509_parser::pem::parse_x509_pem(pem.as_bytes())
        .map_err(|e| CryptoError::InvalidKey(format!("malformed PEM: {e}")))?;
    Ok((block.label, block.contents))
}

/// Encodes DER as a PEM block with 64-column lines.
pub(crate) fn encode_pem(label: &str, der: &[u8]) -> String {
    let body = base64::engine::general_purpose::STANDARD.encode(der);
    let mut out = format!("-----BEGIN {label}-----\n");
    for chunk in body.as_bytes().chunks(64) {
        out.push_str(&String::from_utf8_lossy(chunk));
        out.push('\n');
    }
    out.push_str(&format!("-----END {label}-----\n"));
    out
}
