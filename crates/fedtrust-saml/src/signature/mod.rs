//! Enveloped XML signatures over SAML objects.
//!
//! A signature covers the canonical form of the codec's own serialization of
//! the signed object with its signature removed. Validation recomputes that
//! form from the decoded object, so the layout of the received document does
//! not affect the outcome.

mod engine;

pub use engine::SignatureEngine;

use fedtrust_crypto::PublicCredential;

use crate::codec;
use crate::error::SamlResult;
use crate::metadata::KeyUse;
use crate::types::{Assertion, EntityRole, Response};

// ============================================================================
// Signature Record
// ============================================================================

/// Key material embedded in a signature's `KeyInfo`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignatureKeyInfo {
    /// DER-encoded X.509 certificate of the signer.
    Certificate(Vec<u8>),
    /// DER-encoded SubjectPublicKeyInfo of the signer.
    PublicKey(Vec<u8>),
}

/// A decoded `ds:Signature` element.
///
/// Algorithm identifiers are kept as URIs so that unknown values surface as
/// structural errors at validation time rather than as parse failures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureRecord {
    /// `SignatureMethod` algorithm URI.
    pub algorithm: String,
    /// `CanonicalizationMethod` algorithm URI.
    pub canonicalization: String,
    /// `Reference` URI, `#` followed by the signed element's ID.
    pub reference_uri: String,
    /// `DigestMethod` algorithm URI.
    pub digest_algorithm: String,
    /// Digest of the canonical signed element.
    pub digest_value: Vec<u8>,
    /// Signature over the canonical `SignedInfo`.
    pub signature_value: Vec<u8>,
    /// Signer key material, if embedded.
    pub key_info: Option<SignatureKeyInfo>,
}

impl SignatureRecord {
    /// Returns the canonical `SignedInfo` bytes the signature value covers.
    #[must_use]
    pub fn signed_info(&self) -> Vec<u8> {
        crate::xml::canonicalize(&codec::signed_info_xml(self)).into_bytes()
    }

    /// Returns the credential embedded in `KeyInfo`, if it parses.
    #[must_use]
    pub fn embedded_credential(&self) -> Option<PublicCredential> {
        match self.key_info.as_ref()? {
            SignatureKeyInfo::Certificate(der) => PublicCredential::from_certificate_der(der).ok(),
            SignatureKeyInfo::PublicKey(der) => PublicCredential::from_spki_der(der).ok(),
        }
    }
}

// ============================================================================
// Signable Objects
// ============================================================================

/// An object that can carry an enveloped signature.
pub trait Signable {
    /// Returns the ID the signature reference points at.
    fn signable_id(&self) -> &str;

    /// Returns the canonical bytes covered by the digest.
    ///
    /// # Errors
    ///
    /// Returns an error if the object cannot be serialized.
    fn canonical_content(&self) -> SamlResult<Vec<u8>>;

    /// Returns the attached signature.
    fn signature(&self) -> Option<&SignatureRecord>;

    /// Attaches or replaces the signature.
    fn set_signature(&mut self, signature: SignatureRecord);
}

impl Signable for Assertion {
    fn signable_id(&self) -> &str {
        &self.id
    }

    fn canonical_content(&self) -> SamlResult<Vec<u8>> {
        let xml = codec::assertion_xml(self, false)?;
        Ok(crate::xml::canonicalize(&xml).into_bytes())
    }

    fn signature(&self) -> Option<&SignatureRecord> {
        self.signature.as_ref()
    }

    fn set_signature(&mut self, signature: SignatureRecord) {
        self.signature = Some(signature);
    }
}

impl Signable for Response {
    fn signable_id(&self) -> &str {
        &self.id
    }

    fn canonical_content(&self) -> SamlResult<Vec<u8>> {
        let xml = codec::response_xml(self, false)?;
        Ok(crate::xml::canonicalize(&xml).into_bytes())
    }

    fn signature(&self) -> Option<&SignatureRecord> {
        self.signature.as_ref()
    }

    fn set_signature(&mut self, signature: SignatureRecord) {
        self.signature = Some(signature);
    }
}

// ============================================================================
// Trust
// ============================================================================

/// Query for trusted key material.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CredentialCriteria {
    /// Entity ID of the signer.
    pub entity_id: String,
    /// Role descriptor the key must be published under.
    pub role: EntityRole,
    /// Required key usage.
    pub usage: KeyUse,
}

impl CredentialCriteria {
    /// Criteria for the signing keys of `entity_id` in `role`.
    #[must_use]
    pub fn signing(entity_id: impl Into<String>, role: EntityRole) -> Self {
        Self {
            entity_id: entity_id.into(),
            role,
            usage: KeyUse::Signing,
        }
    }
}

/// Source of trusted credentials keyed by entity, role, and usage.
///
/// Resolution never looks at key material carried by the message itself.
pub trait CredentialResolver: Send + Sync {
    /// Returns every credential matching `criteria`, in publication order.
    ///
    /// # Errors
    ///
    /// Returns `TrustResolution` if the entity or role is unknown.
    fn resolve_credentials(&self, criteria: &CredentialCriteria)
        -> SamlResult<Vec<PublicCredential>>;
}

/// What a signature is validated against.
#[derive(Clone, Copy)]
pub enum TrustAnchor<'a> {
    /// A single explicitly trusted credential.
    Credential(&'a PublicCredential),
    /// Credentials looked up from a resolver.
    Resolver(&'a dyn CredentialResolver, &'a CredentialCriteria),
}

impl std::fmt::Debug for TrustAnchor<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Credential(credential) => f
                .debug_tuple("Credential")
                .field(&credential.key_id())
                .finish(),
            Self::Resolver(_, criteria) => f.debug_tuple("Resolver").field(criteria).finish(),
        }
    }
}
