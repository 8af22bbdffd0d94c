//! Producer and consumer pipelines.
//!
//! A pipeline is composed from four capabilities rather than subclassed.
//! Peers needing nonstandard behavior register their own implementation of
//! a capability in the [`ImplementationRegistry`]; everything else uses the
//! standard one.

mod consumer;
mod producer;
mod registry;

use std::sync::Arc;

use fedtrust_crypto::{PrivateCredential, PublicCredential};

pub use consumer::{AssertionConsumer, ConsumerSettings, StandardConsumer};
pub use producer::{
    AssertionProducer, AssertionRequest, ProducedResponse, ProducerSettings, ProductionContext,
    StandardProducer,
};
pub use registry::{Implementation, ImplementationRegistry};

use crate::encryption::AssertionEncrypter;
use crate::error::SamlResult;
use crate::signature::{SignatureEngine, TrustAnchor};
use crate::types::{Assertion, EncryptedAssertion, Response};

// ============================================================================
// Capabilities
// ============================================================================

/// Builds the assertion for a request.
pub trait Produces: Send + Sync {
    /// Builds an unsigned, unencrypted assertion.
    ///
    /// # Errors
    ///
    /// Returns `InvalidAssertion` if the request cannot form a valid
    /// assertion.
    fn build_assertion(
        &self,
        request: &AssertionRequest,
        context: &ProductionContext<'_>,
    ) -> SamlResult<Assertion>;
}

/// Final acceptance hook, run after every lifecycle check passed.
pub trait Consumes: Send + Sync {
    /// Accepts or rejects a validated assertion.
    ///
    /// # Errors
    ///
    /// Returns the error that rejects the assertion.
    fn accept(&self, assertion: &Assertion) -> SamlResult<()>;
}

/// Assertion-level hybrid encryption.
pub trait Encrypts: Send + Sync {
    /// Encrypts `assertion` for `recipient`.
    ///
    /// # Errors
    ///
    /// Returns `Encryption` on failure.
    fn encrypt(
        &self,
        assertion: &Assertion,
        recipient: &PublicCredential,
        key_transport: &str,
        recipient_entity_id: Option<&str>,
    ) -> SamlResult<EncryptedAssertion>;

    /// Decrypts an assertion.
    ///
    /// # Errors
    ///
    /// Returns `Decryption` on failure.
    fn decrypt(
        &self,
        encrypted: &EncryptedAssertion,
        credential: &PrivateCredential,
        local_entity_id: Option<&str>,
    ) -> SamlResult<Assertion>;
}

/// Signature creation and validation.
pub trait Signs: Send + Sync {
    /// Signs an assertion in place.
    ///
    /// # Errors
    ///
    /// Returns `SignatureEngine` on failure.
    fn sign_assertion(&self, assertion: &mut Assertion, credential: &PrivateCredential)
        -> SamlResult<()>;

    /// Signs a response in place.
    ///
    /// # Errors
    ///
    /// Returns `SignatureEngine` on failure.
    fn sign_response(&self, response: &mut Response, credential: &PrivateCredential)
        -> SamlResult<()>;

    /// Validates the signature of an assertion.
    ///
    /// # Errors
    ///
    /// Returns `SignatureEngine` for structural problems.
    fn validate_assertion(&self, assertion: &Assertion, anchor: TrustAnchor<'_>)
        -> SamlResult<bool>;

    /// Validates the signature of a response.
    ///
    /// # Errors
    ///
    /// Returns `SignatureEngine` for structural problems.
    fn validate_response(&self, response: &Response, anchor: TrustAnchor<'_>) -> SamlResult<bool>;
}

impl Encrypts for AssertionEncrypter {
    fn encrypt(
        &self,
        assertion: &Assertion,
        recipient: &PublicCredential,
        key_transport: &str,
        recipient_entity_id: Option<&str>,
    ) -> SamlResult<EncryptedAssertion> {
        Self::encrypt(self, assertion, recipient, key_transport, recipient_entity_id)
    }

    fn decrypt(
        &self,
        encrypted: &EncryptedAssertion,
        credential: &PrivateCredential,
        local_entity_id: Option<&str>,
    ) -> SamlResult<Assertion> {
        Self::decrypt(self, encrypted, credential, local_entity_id)
    }
}

impl Signs for SignatureEngine {
    fn sign_assertion(
        &self,
        assertion: &mut Assertion,
        credential: &PrivateCredential,
    ) -> SamlResult<()> {
        self.sign_in_place(assertion, credential)
    }

    fn sign_response(&self, response: &mut Response, credential: &PrivateCredential) -> SamlResult<()> {
        self.sign_in_place(response, credential)
    }

    fn validate_assertion(&self, assertion: &Assertion, anchor: TrustAnchor<'_>) -> SamlResult<bool> {
        self.validate(assertion, anchor)
    }

    fn validate_response(&self, response: &Response, anchor: TrustAnchor<'_>) -> SamlResult<bool> {
        self.validate(response, anchor)
    }
}

/// Names a capability for registry lookups.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CapabilityKind {
    /// [`Produces`]
    Produces,
    /// [`Consumes`]
    Consumes,
    /// [`Encrypts`]
    Encrypts,
    /// [`Signs`]
    Signs,
}

impl CapabilityKind {
    /// All capability kinds.
    pub const ALL: [Self; 4] = [Self::Produces, Self::Consumes, Self::Encrypts, Self::Signs];

    /// Returns the capability name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Produces => "produces",
            Self::Consumes => "consumes",
            Self::Encrypts => "encrypts",
            Self::Signs => "signs",
        }
    }
}

impl std::fmt::Display for CapabilityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// The capability implementations a pipeline runs with.
#[derive(Clone)]
pub struct CapabilitySet {
    /// Assertion builder.
    pub producer: Arc<dyn Produces>,
    /// Acceptance hook.
    pub consumer: Arc<dyn Consumes>,
    /// Encryption.
    pub encrypter: Arc<dyn Encrypts>,
    /// Signatures.
    pub signer: Arc<dyn Signs>,
}

impl CapabilitySet {
    /// The standard implementations.
    #[must_use]
    pub fn standard() -> Self {
        Self {
            producer: Arc::new(StandardProducer),
            consumer: Arc::new(StandardConsumer),
            encrypter: Arc::new(AssertionEncrypter::default()),
            signer: Arc::new(SignatureEngine::new()),
        }
    }

    /// Replaces the encrypter.
    #[must_use]
    pub fn with_encrypter(mut self, encrypter: Arc<dyn Encrypts>) -> Self {
        self.encrypter = encrypter;
        self
    }
}

impl Default for CapabilitySet {
    fn default() -> Self {
        Self::standard()
    }
}

impl std::fmt::Debug for CapabilitySet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CapabilitySet").finish_non_exhaustive()
    }
}
