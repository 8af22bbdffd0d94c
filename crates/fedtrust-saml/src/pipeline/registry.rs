//! Registry of peer-specific capability implementations.

use std::sync::Arc;

use dashmap::DashMap;

use super::{
    CapabilityKind, CapabilitySet, Consumes, Encrypts, Produces, Signs, StandardConsumer,
    StandardProducer,
};
use crate::encryption::AssertionEncrypter;
use crate::signature::SignatureEngine;

/// One capability implementation.
#[derive(Clone)]
pub enum Implementation {
    /// An assertion builder.
    Producer(Arc<dyn Produces>),
    /// An acceptance hook.
    Consumer(Arc<dyn Consumes>),
    /// An encrypter.
    Encrypter(Arc<dyn Encrypts>),
    /// A signer.
    Signer(Arc<dyn Signs>),
}

impl Implementation {
    /// Returns the standard implementation of `kind`.
    #[must_use]
    pub fn standard(kind: CapabilityKind) -> Self {
        match kind {
            CapabilityKind::Produces => Self::Producer(Arc::new(StandardProducer)),
            CapabilityKind::Consumes => Self::Consumer(Arc::new(StandardConsumer)),
            CapabilityKind::Encrypts => Self::Encrypter(Arc::new(AssertionEncrypter::default())),
            CapabilityKind::Signs => Self::Signer(Arc::new(SignatureEngine::new())),
        }
    }

    /// Returns the capability this implements.
    #[must_use]
    pub const fn kind(&self) -> CapabilityKind {
        match self {
            Self::Producer(_) => CapabilityKind::Produces,
            Self::Consumer(_) => CapabilityKind::Consumes,
            Self::Encrypter(_) => CapabilityKind::Encrypts,
            Self::Signer(_) => CapabilityKind::Signs,
        }
    }
}

impl std::fmt::Debug for Implementation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Implementation").field(&self.kind()).finish()
    }
}

type Factory = Arc<dyn Fn() -> Implementation + Send + Sync>;

/// Maps `(peer code, capability)` to an implementation factory.
///
/// Populated at start-up. Peer codes compare case-insensitively. A lookup
/// with no registered override yields the standard implementation.
#[derive(Default)]
pub struct ImplementationRegistry {
    factories: DashMap<(String, CapabilityKind), Factory>,
}

impl std::fmt::Debug for ImplementationRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImplementationRegistry")
            .field("overrides", &self.factories.len())
            .finish()
    }
}

impl ImplementationRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn insert(&self, peer_code: &str, kind: CapabilityKind, factory: Factory) {
        let key = (peer_code.to_ascii_lowercase(), kind);
        if self.factories.insert(key, factory).is_some() {
            tracing::warn!(peer_code, capability = %kind, "implementation override replaced");
        }
    }

    /// Registers a producer for `peer_code`.
    pub fn register_producer<F>(&self, peer_code: &str, factory: F)
    where
        F: Fn() -> Arc<dyn Produces> + Send + Sync + 'static,
    {
        self.insert(
            peer_code,
            CapabilityKind::Produces,
            Arc::new(move || Implementation::Producer(factory())),
        );
    }

    /// Registers an acceptance hook for `peer_code`.
    pub fn register_consumer<F>(&self, peer_code: &str, factory: F)
    where
        F: Fn() -> Arc<dyn Consumes> + Send + Sync + 'static,
    {
        self.insert(
            peer_code,
            CapabilityKind::Consumes,
            Arc::new(move || Implementation::Consumer(factory())),
        );
    }

    /// Registers an encrypter for `peer_code`.
    pub fn register_encrypter<F>(&self, peer_code: &str, factory: F)
    where
        F: Fn() -> Arc<dyn Encrypts> + Send + Sync + 'static,
    {
        self.insert(
            peer_code,
            CapabilityKind::Encrypts,
            Arc::new(move || Implementation::Encrypter(factory())),
        );
    }

    /// Registers a signer for `peer_code`.
    pub fn register_signer<F>(&self, peer_code: &str, factory: F)
    where
        F: Fn() -> Arc<dyn Signs> + Send + Sync + 'static,
    {
        self.insert(
            peer_code,
            CapabilityKind::Signs,
            Arc::new(move || Implementation::Signer(factory())),
        );
    }

    /// Returns the override registered for `peer_code`, if any.
    #[must_use]
    pub fn lookup(&self, peer_code: &str, kind: CapabilityKind) -> Option<Implementation> {
        let key = (peer_code.to_ascii_lowercase(), kind);
        let factory = self.factories.get(&key).map(|f| Arc::clone(f.value()))?;
        Some(factory())
    }

    /// Returns the override for `peer_code`, or the standard implementation.
    #[must_use]
    pub fn resolve_implementation(
        &self,
        peer_code: Option<&str>,
        kind: CapabilityKind,
    ) -> Implementation {
        match peer_code.and_then(|code| self.lookup(code, kind)) {
            Some(found) => {
                tracing::debug!(peer_code, capability = %kind, "using peer-specific implementation");
                found
            }
            None => Implementation::standard(kind),
        }
    }

    /// Assembles the full capability set for `peer_code`.
    #[must_use]
    pub fn capabilities_for(&self, peer_code: Option<&str>) -> CapabilitySet {
        let mut set = CapabilitySet::standard();
        for kind in CapabilityKind::ALL {
            match self.resolve_implementation(peer_code, kind) {
                Implementation::Producer(p) => set.producer = p,
                Implementation::Consumer(c) => set.consumer = c,
                Implementation::Encrypter(e) => set.encrypter = e,
                Implementation::Signer(s) => set.signer = s,
            }
        }
        set
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{SamlError, SamlResult};
    use crate::types::Assertion;

    struct RejectAll;

    impl Consumes for RejectAll {
        fn accept(&self, _assertion: &Assertion) -> SamlResult<()> {
            Err(SamlError::InvalidAssertion("peer rejects everything".into()))
        }
    }

    #[test]
    fn falls_back_to_standard() {
        let registry = ImplementationRegistry::new();
        assert!(registry.lookup("acme", CapabilityKind::Consumes).is_none());
        let found = registry.resolve_implementation(Some("acme"), CapabilityKind::Consumes);
        assert_eq!(found.kind(), CapabilityKind::Consumes);
        let found = registry.resolve_implementation(None, CapabilityKind::Signs);
        assert_eq!(found.kind(), CapabilityKind::Signs);
    }

    #[test]
    fn peer_codes_are_case_insensitive() {
        let registry = ImplementationRegistry::new();
        registry.register_consumer("ACME", || Arc::new(RejectAll));
        assert!(registry.lookup("acme", CapabilityKind::Consumes).is_some());
        assert!(registry.lookup("Acme", CapabilityKind::Consumes).is_some());
        assert!(registry.lookup("acme", CapabilityKind::Produces).is_none());
        assert!(registry.lookup("other", CapabilityKind::Consumes).is_none());
    }

    #[test]
    fn capability_set_uses_override() {
        let registry = ImplementationRegistry::new();
        registry.register_consumer("acme", || Arc::new(RejectAll));

        let assertion = Assertion::new("https://idp.example.com", crate::types::ProtocolVersion::Saml20);
        let custom = registry.capabilities_for(Some("acme"));
        assert!(custom.consumer.accept(&assertion).is_err());

        let standard = registry.capabilities_for(Some("other"));
        assert!(standard.consumer.accept(&assertion).is_ok());
    }
}
