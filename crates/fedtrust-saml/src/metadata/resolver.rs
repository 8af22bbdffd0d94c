//! Trust resolution over a cached metadata snapshot.
//!
//! Readers take the current snapshot under a short read lock and never wait
//! for a load in progress. Refreshes are serialized by a separate async lock
//! and swap the snapshot only once a new document has loaded; a failed or
//! timed-out refresh leaves the previous snapshot in place.
//!
//! Resolved entities are cached inside the snapshot they were derived from,
//! so a resolution racing a refresh can only populate the snapshot being
//! replaced.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use fedtrust_crypto::{KeyTransportAlgorithm, PublicCredential};
use parking_lot::RwLock;

use super::{KeyUse, MetadataDocument, MetadataSource, RoleDescriptor};
use crate::error::{SamlError, SamlResult};
use crate::signature::{CredentialCriteria, CredentialResolver};
use crate::types::{EntityRole, ProtocolVersion, SamlBinding};

/// Default bound on a single metadata load.
pub const DEFAULT_LOAD_TIMEOUT: Duration = Duration::from_secs(10);

/// Shortest period of the background refresh task.
const MIN_REFRESH_PERIOD: Duration = Duration::from_millis(100);

// ============================================================================
// Trusted Entity
// ============================================================================

/// Trust facts about one entity in one role, derived from a metadata load.
///
/// Immutable; a refresh produces new values instead of changing these.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrustedEntity {
    entity_id: String,
    role: EntityRole,
    protocol: ProtocolVersion,
    endpoints: HashMap<SamlBinding, String>,
    signing_credentials: Vec<PublicCredential>,
    encryption_credential: Option<PublicCredential>,
    encryption_algorithm: Option<String>,
}

impl TrustedEntity {
    fn from_descriptor(
        entity_id: &str,
        protocol: ProtocolVersion,
        descriptor: &RoleDescriptor,
        default_key_transport: KeyTransportAlgorithm,
    ) -> Self {
        let mut endpoints = HashMap::new();
        for endpoint in &descriptor.endpoints {
            if endpoints.contains_key(&endpoint.binding) {
                tracing::warn!(
                    entity_id,
                    binding = endpoint.binding.uri(),
                    ignored = %endpoint.location,
                    "more than one endpoint for binding, the first listed is used"
                );
                continue;
            }
            endpoints.insert(endpoint.binding, endpoint.location.clone());
        }

        let signing_credentials = descriptor
            .keys
            .iter()
            .filter(|k| k.usage.permits(KeyUse::Signing))
            .map(|k| k.credential.clone())
            .collect();

        let encryption_key = descriptor.keys.iter().find(|k| {
            k.usage.permits(KeyUse::Encryption) && k.credential.family().supports_key_transport()
        });
        let encryption_algorithm = encryption_key.map(|k| {
            k.encryption_methods
                .iter()
                .find(|m| KeyTransportAlgorithm::is_key_transport_uri(m))
                .cloned()
                .unwrap_or_else(|| default_key_transport.uri().to_string())
        });

        Self {
            entity_id: entity_id.to_string(),
            role: descriptor.role,
            protocol,
            endpoints,
            signing_credentials,
            encryption_credential: encryption_key.map(|k| k.credential.clone()),
            encryption_algorithm,
        }
    }

    /// Returns the entity ID.
    #[must_use]
    pub fn entity_id(&self) -> &str {
        &self.entity_id
    }

    /// Returns the role.
    #[must_use]
    pub const fn role(&self) -> EntityRole {
        self.role
    }

    /// Returns the protocol the entity was resolved for.
    #[must_use]
    pub const fn protocol(&self) -> ProtocolVersion {
        self.protocol
    }

    /// Returns the endpoint for `binding`.
    #[must_use]
    pub fn endpoint(&self, binding: SamlBinding) -> Option<&str> {
        self.endpoints.get(&binding).map(String::as_str)
    }

    /// Returns all endpoints by binding.
    #[must_use]
    pub const fn endpoints(&self) -> &HashMap<SamlBinding, String> {
        &self.endpoints
    }

    /// Returns the authoritative signing key: the first one published.
    #[must_use]
    pub fn signing_credential(&self) -> Option<&PublicCredential> {
        self.signing_credentials.first()
    }

    /// Returns every key usable for signature validation.
    #[must_use]
    pub fn signing_credentials(&self) -> &[PublicCredential] {
        &self.signing_credentials
    }

    /// Returns the key to encrypt for, if the entity accepts encryption.
    #[must_use]
    pub const fn encryption_credential(&self) -> Option<&PublicCredential> {
        self.encryption_credential.as_ref()
    }

    /// Returns the key transport algorithm URI to encrypt with.
    #[must_use]
    pub fn encryption_algorithm(&self) -> Option<&str> {
        self.encryption_algorithm.as_deref()
    }
}

// ============================================================================
// Resolver
// ============================================================================

/// When the resolver reloads metadata.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RefreshPolicy {
    /// Only when [`MetadataTrustResolver::refresh`] is called.
    #[default]
    OnDemand,
    /// Whenever the snapshot is older than the interval.
    Interval(Duration),
}

impl RefreshPolicy {
    /// Builds a policy from an interval, where `None` means on demand.
    #[must_use]
    pub fn from_interval(interval: Option<Duration>) -> Self {
        interval.map_or(Self::OnDemand, Self::Interval)
    }
}

type CacheKey = (String, EntityRole, ProtocolVersion);

#[derive(Debug)]
struct Snapshot {
    document: Arc<MetadataDocument>,
    loaded_at: Instant,
    cache: DashMap<CacheKey, Arc<TrustedEntity>>,
}

/// Resolves trusted entities, endpoints, and credentials from metadata.
pub struct MetadataTrustResolver {
    source: Arc<dyn MetadataSource>,
    policy: RefreshPolicy,
    load_timeout: Duration,
    default_key_transport: KeyTransportAlgorithm,
    snapshot: RwLock<Option<Arc<Snapshot>>>,
    refresh_lock: tokio::sync::Mutex<()>,
}

impl std::fmt::Debug for MetadataTrustResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MetadataTrustResolver")
            .field("source", &self.source.describe())
            .field("policy", &self.policy)
            .field("load_timeout", &self.load_timeout)
            .field(
                "cached_entities",
                &self.snapshot.read().as_ref().map_or(0, |s| s.cache.len()),
            )
            .finish_non_exhaustive()
    }
}

impl MetadataTrustResolver {
    /// Creates a resolver with no document loaded yet.
    #[must_use]
    pub fn new(source: Arc<dyn MetadataSource>) -> Self {
        Self {
            source,
            policy: RefreshPolicy::OnDemand,
            load_timeout: DEFAULT_LOAD_TIMEOUT,
            default_key_transport: KeyTransportAlgorithm::RsaOaepMgf1p,
            snapshot: RwLock::new(None),
            refresh_lock: tokio::sync::Mutex::new(()),
        }
    }

    /// Creates a resolver and performs the initial load.
    ///
    /// # Errors
    ///
    /// Returns `Metadata` if the initial load fails or times out.
    pub async fn load(source: Arc<dyn MetadataSource>) -> SamlResult<Self> {
        let resolver = Self::new(source);
        resolver.refresh().await?;
        Ok(resolver)
    }

    /// Sets the refresh policy.
    #[must_use]
    pub const fn with_refresh_policy(mut self, policy: RefreshPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Sets the bound on a single load.
    #[must_use]
    pub const fn with_load_timeout(mut self, timeout: Duration) -> Self {
        self.load_timeout = timeout;
        self
    }

    /// Sets the key transport algorithm used when metadata names none.
    #[must_use]
    pub const fn with_default_key_transport(mut self, algorithm: KeyTransportAlgorithm) -> Self {
        self.default_key_transport = algorithm;
        self
    }

    /// Reloads metadata from the source.
    ///
    /// # Errors
    ///
    /// Returns `Metadata` if the load fails or exceeds the load timeout. The
    /// previous snapshot stays in use.
    pub async fn refresh(&self) -> SamlResult<()> {
        let _guard = self.refresh_lock.lock().await;
        let source = self.source.describe();

        let loaded = tokio::time::timeout(self.load_timeout, self.source.load())
            .await
            .map_err(|_| {
                SamlError::Metadata(format!(
                    "loading {source} exceeded {}s",
                    self.load_timeout.as_secs()
                ))
            })
            .and_then(|result| result);

        match loaded {
            Ok(document) => {
                let entities = document.entities.len();
                *self.snapshot.write() = Some(Arc::new(Snapshot {
                    document: Arc::new(document),
                    loaded_at: Instant::now(),
                    cache: DashMap::new(),
                }));
                tracing::info!(%source, entities, "metadata loaded");
                Ok(())
            }
            Err(err) => {
                let kept = self.snapshot.read().is_some();
                tracing::warn!(%source, error = %err, kept_previous = kept, "metadata refresh failed");
                Err(err)
            }
        }
    }

    /// Reloads metadata when none is loaded or the refresh interval elapsed.
    ///
    /// Returns whether a new document was loaded. With a previous snapshot
    /// available, a failed reload is logged and reported as `false`.
    ///
    /// # Errors
    ///
    /// Returns `Metadata` only when no document has ever been loaded.
    pub async fn refresh_if_stale(&self) -> SamlResult<bool> {
        let stale = match &*self.snapshot.read() {
            None => true,
            Some(snapshot) => match self.policy {
                RefreshPolicy::OnDemand => false,
                RefreshPolicy::Interval(interval) => snapshot.loaded_at.elapsed() >= interval,
            },
        };
        if !stale {
            return Ok(false);
        }

        match self.refresh().await {
            Ok(()) => Ok(true),
            Err(_) if self.snapshot.read().is_some() => Ok(false),
            Err(err) => Err(err),
        }
    }

    /// Spawns a task reloading metadata every refresh interval, for hosts
    /// that resolve from synchronous code and so never reach
    /// [`MetadataTrustResolver::refresh_if_stale`].
    ///
    /// Returns `None` under [`RefreshPolicy::OnDemand`]. The task ends once
    /// the resolver is dropped.
    pub fn spawn_refresh_task(self: &Arc<Self>) -> Option<tokio::task::JoinHandle<()>> {
        let RefreshPolicy::Interval(interval) = self.policy else {
            return None;
        };
        let resolver = Arc::downgrade(self);
        Some(tokio::spawn(async move {
            let mut ticks = tokio::time::interval(interval.max(MIN_REFRESH_PERIOD));
            ticks.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            // The first tick completes immediately.
            ticks.tick().await;
            loop {
                ticks.tick().await;
                let Some(resolver) = resolver.upgrade() else {
                    break;
                };
                // Failures are logged by refresh and the previous snapshot stays.
                let _ = resolver.refresh().await;
            }
            tracing::debug!("metadata refresh task stopped");
        }))
    }

    /// Returns the current document.
    ///
    /// # Errors
    ///
    /// Returns `TrustResolution` if nothing has been loaded.
    pub fn document(&self) -> SamlResult<Arc<MetadataDocument>> {
        self.current().map(|s| Arc::clone(&s.document))
    }

    fn current(&self) -> SamlResult<Arc<Snapshot>> {
        self.snapshot
            .read()
            .clone()
            .ok_or_else(|| SamlError::TrustResolution("metadata has not been loaded".to_string()))
    }

    /// Resolves an identity provider supporting `protocol`.
    ///
    /// # Errors
    ///
    /// Returns `TrustResolution` if the entity or its `IDPSSODescriptor` for
    /// the protocol is absent.
    pub fn resolve_identity_provider(
        &self,
        entity_id: &str,
        protocol: ProtocolVersion,
    ) -> SamlResult<Arc<TrustedEntity>> {
        self.resolve(entity_id, EntityRole::IdentityProvider, protocol)
    }

    /// Resolves a service provider supporting `protocol`.
    ///
    /// # Errors
    ///
    /// Returns `TrustResolution` if the entity or its `SPSSODescriptor` for
    /// the protocol is absent.
    pub fn resolve_service_provider(
        &self,
        entity_id: &str,
        protocol: ProtocolVersion,
    ) -> SamlResult<Arc<TrustedEntity>> {
        self.resolve(entity_id, EntityRole::ServiceProvider, protocol)
    }

    fn resolve(
        &self,
        entity_id: &str,
        role: EntityRole,
        protocol: ProtocolVersion,
    ) -> SamlResult<Arc<TrustedEntity>> {
        let snapshot = self.current()?;
        self.resolve_in(&snapshot, entity_id, role, protocol)
    }

    fn resolve_in(
        &self,
        snapshot: &Snapshot,
        entity_id: &str,
        role: EntityRole,
        protocol: ProtocolVersion,
    ) -> SamlResult<Arc<TrustedEntity>> {
        let key = (entity_id.to_string(), role, protocol);
        if let Some(entity) = snapshot.cache.get(&key) {
            return Ok(Arc::clone(entity.value()));
        }

        let entity = snapshot.document.entity(entity_id).ok_or_else(|| {
            SamlError::TrustResolution(format!("entity {entity_id} is not in metadata"))
        })?;
        let descriptor = entity.role(role, protocol).ok_or_else(|| {
            SamlError::TrustResolution(format!(
                "{entity_id} has no {} supporting {protocol}",
                role.descriptor_name()
            ))
        })?;

        let trusted = Arc::new(TrustedEntity::from_descriptor(
            entity_id,
            protocol,
            descriptor,
            self.default_key_transport,
        ));
        tracing::debug!(entity_id, %role, %protocol, "trusted entity resolved");
        snapshot.cache.insert(key, Arc::clone(&trusted));
        Ok(trusted)
    }

    /// Returns the endpoint of `entity` for `binding`.
    ///
    /// # Errors
    ///
    /// Returns `TrustResolution` if the entity publishes no such endpoint.
    pub fn resolve_endpoint(&self, entity: &TrustedEntity, binding: SamlBinding) -> SamlResult<String> {
        entity.endpoint(binding).map(str::to_string).ok_or_else(|| {
            SamlError::TrustResolution(format!(
                "{} has no endpoint for binding {}",
                entity.entity_id(),
                binding.uri()
            ))
        })
    }

    /// Returns the key and key transport algorithm to encrypt for `entity`.
    ///
    /// `None` means the entity does not want encrypted assertions.
    #[must_use]
    pub fn resolve_encryption_credential(
        &self,
        entity: &TrustedEntity,
    ) -> Option<(PublicCredential, String)> {
        let credential = entity.encryption_credential()?.clone();
        let algorithm = entity
            .encryption_algorithm()
            .map_or_else(|| self.default_key_transport.uri().to_string(), str::to_string);
        Some((credential, algorithm))
    }

    /// Returns true if `entity` publishes a signing key and so is expected to
    /// sign what it sends.
    #[must_use]
    pub fn resolve_signing_requirement(&self, entity: &TrustedEntity) -> bool {
        entity.signing_credential().is_some()
    }
}

impl CredentialResolver for MetadataTrustResolver {
    fn resolve_credentials(
        &self,
        criteria: &CredentialCriteria,
    ) -> SamlResult<Vec<PublicCredential>> {
        let document = self.document()?;
        let entity = document.entity(&criteria.entity_id).ok_or_else(|| {
            SamlError::TrustResolution(format!("entity {} is not in metadata", criteria.entity_id))
        })?;

        let mut roles = entity.roles_of(criteria.role).peekable();
        if roles.peek().is_none() {
            return Err(SamlError::TrustResolution(format!(
                "{} has no {}",
                criteria.entity_id,
                criteria.role.descriptor_name()
            )));
        }

        let mut credentials: Vec<PublicCredential> = Vec::new();
        for key in roles.flat_map(|r| r.keys.iter()) {
            if key.usage.permits(criteria.usage)
                && !credentials.iter().any(|c| c.same_key(&key.credential))
            {
                credentials.push(key.credential.clone());
            }
        }
        Ok(credentials)
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use fedtrust_crypto::{KeyFamily, PrivateCredential};

    use super::*;
    use crate::metadata::{EntityDescriptor, InMemoryMetadataSource, KeyDescriptor};

    fn document(idp_signing: &PublicCredential, sp_encryption: &PublicCredential) -> MetadataDocument {
        MetadataDocument::default()
            .with_entity(
                EntityDescriptor::new("https://idp.example.com").with_role(
                    RoleDescriptor::new(EntityRole::IdentityProvider, ProtocolVersion::Saml20)
                        .with_key(KeyDescriptor::new(KeyUse::Signing, idp_signing.clone()))
                        .with_endpoint(SamlBinding::HttpPost, "https://idp.example.com/sso"),
                ),
            )
            .with_entity(
                EntityDescriptor::new("https://sp.example.com").with_role(
                    RoleDescriptor::new(EntityRole::ServiceProvider, ProtocolVersion::Saml20)
                        .with_key(
                            KeyDescriptor::new(KeyUse::Encryption, sp_encryption.clone())
                                .with_encryption_method("http://www.w3.org/2009/xmlenc11#aes128-gcm")
                                .with_encryption_method("http://www.w3.org/2009/xmlenc11#rsa-oaep"),
                        )
                        .with_endpoint(SamlBinding::HttpPost, "https://sp.example.com/acs")
                        .with_endpoint(SamlBinding::HttpPost, "https://sp.example.com/acs2")
                        .with_endpoint(SamlBinding::HttpArtifact, "https://sp.example.com/art"),
                ),
            )
    }

    struct Keys {
        idp: PrivateCredential,
        sp: PrivateCredential,
    }

    fn keys() -> Keys {
        Keys {
            idp: PrivateCredential::generate(KeyFamily::EcP256).unwrap(),
            sp: PrivateCredential::generate_rsa(2048).unwrap(),
        }
    }

    async fn resolver(keys: &Keys) -> (Arc<InMemoryMetadataSource>, MetadataTrustResolver) {
        let source = Arc::new(InMemoryMetadataSource::from_document(document(
            keys.idp.public_credential(),
            keys.sp.public_credential(),
        )));
        let resolver = MetadataTrustResolver::load(source.clone()).await.unwrap();
        (source, resolver)
    }

    async fn resolver_with_interval(
        keys: &Keys,
    ) -> (Arc<InMemoryMetadataSource>, MetadataTrustResolver) {
        let source = Arc::new(InMemoryMetadataSource::from_document(document(
            keys.idp.public_credential(),
            keys.sp.public_credential(),
        )));
        let resolver = MetadataTrustResolver::new(source.clone())
            .with_refresh_policy(RefreshPolicy::Interval(Duration::ZERO));
        resolver.refresh().await.unwrap();
        (source, resolver)
    }

    #[tokio::test]
    async fn resolves_roles_endpoints_and_keys() {
        let keys = keys();
        let (_, resolver) = resolver(&keys).await;

        let sp = resolver
            .resolve_service_provider("https://sp.example.com", ProtocolVersion::Saml20)
            .unwrap();
        assert_eq!(
            resolver.resolve_endpoint(&sp, SamlBinding::HttpPost).unwrap(),
            "https://sp.example.com/acs"
        );
        assert!(matches!(
            resolver.resolve_endpoint(&sp, SamlBinding::Soap),
            Err(SamlError::TrustResolution(_))
        ));

        let (credential, algorithm) = resolver.resolve_encryption_credential(&sp).unwrap();
        assert!(credential.same_key(keys.sp.public_credential()));
        assert_eq!(algorithm, "http://www.w3.org/2009/xmlenc11#rsa-oaep");
        assert!(!resolver.resolve_signing_requirement(&sp));

        let idp = resolver
            .resolve_identity_provider("https://idp.example.com", ProtocolVersion::Saml20)
            .unwrap();
        assert!(resolver.resolve_signing_requirement(&idp));
        assert!(resolver.resolve_encryption_credential(&idp).is_none());
    }

    #[tokio::test]
    async fn missing_entity_or_descriptor_fails() {
        let keys = keys();
        let (_, resolver) = resolver(&keys).await;
        assert!(matches!(
            resolver.resolve_identity_provider("https://rogue.example.com", ProtocolVersion::Saml20),
            Err(SamlError::TrustResolution(_))
        ));
        assert!(matches!(
            resolver.resolve_identity_provider("https://sp.example.com", ProtocolVersion::Saml20),
            Err(SamlError::TrustResolution(_))
        ));
        assert!(matches!(
            resolver.resolve_identity_provider("https://idp.example.com", ProtocolVersion::Saml11),
            Err(SamlError::TrustResolution(_))
        ));
    }

    #[tokio::test]
    async fn credential_resolution_by_usage() {
        let keys = keys();
        let (_, resolver) = resolver(&keys).await;
        let signing = resolver
            .resolve_credentials(&CredentialCriteria::signing(
                "https://idp.example.com",
                EntityRole::IdentityProvider,
            ))
            .unwrap();
        assert_eq!(signing.len(), 1);

        let sp_signing = resolver
            .resolve_credentials(&CredentialCriteria::signing(
                "https://sp.example.com",
                EntityRole::ServiceProvider,
            ))
            .unwrap();
        assert!(sp_signing.is_empty());

        assert!(resolver
            .resolve_credentials(&CredentialCriteria::signing(
                "https://sp.example.com",
                EntityRole::IdentityProvider,
            ))
            .is_err());
    }

    #[tokio::test]
    async fn refresh_replaces_cached_entities() {
        let keys = keys();
        let (source, resolver) = resolver(&keys).await;
        let before = resolver
            .resolve_service_provider("https://sp.example.com", ProtocolVersion::Saml20)
            .unwrap();

        source.replace(MetadataDocument::default().with_entity(
            EntityDescriptor::new("https://sp.example.com").with_role(
                RoleDescriptor::new(EntityRole::ServiceProvider, ProtocolVersion::Saml20)
                    .with_endpoint(SamlBinding::HttpPost, "https://sp.example.com/new"),
            ),
        ));
        let still_cached = resolver
            .resolve_service_provider("https://sp.example.com", ProtocolVersion::Saml20)
            .unwrap();
        assert!(Arc::ptr_eq(&before, &still_cached));

        resolver.refresh().await.unwrap();
        let after = resolver
            .resolve_service_provider("https://sp.example.com", ProtocolVersion::Saml20)
            .unwrap();
        assert_eq!(after.endpoint(SamlBinding::HttpPost), Some("https://sp.example.com/new"));
        assert!(after.encryption_credential().is_none());
    }

    #[tokio::test]
    async fn resolution_racing_a_refresh_is_not_kept() {
        let keys = keys();
        let (source, resolver) = resolver(&keys).await;
        let in_flight = resolver.current().unwrap();

        source.replace(MetadataDocument::default().with_entity(
            EntityDescriptor::new("https://sp.example.com").with_role(RoleDescriptor::new(
                EntityRole::ServiceProvider,
                ProtocolVersion::Saml20,
            )),
        ));
        resolver.refresh().await.unwrap();

        // A reader that took the old snapshot finishes after the swap.
        resolver
            .resolve_in(
                &in_flight,
                "https://idp.example.com",
                EntityRole::IdentityProvider,
                ProtocolVersion::Saml20,
            )
            .unwrap();
        assert!(matches!(
            resolver.resolve_identity_provider("https://idp.example.com", ProtocolVersion::Saml20),
            Err(SamlError::TrustResolution(_))
        ));
    }

    #[tokio::test]
    async fn refresh_task_follows_the_source() {
        let keys = keys();
        let (_, on_demand) = resolver(&keys).await;
        assert!(Arc::new(on_demand).spawn_refresh_task().is_none());

        let (source, resolver) = resolver_with_interval(&keys).await;
        let resolver = Arc::new(resolver);
        let task = resolver.spawn_refresh_task().unwrap();
        source.replace(MetadataDocument::default().with_entity(
            EntityDescriptor::new("https://sp.example.com").with_role(RoleDescriptor::new(
                EntityRole::ServiceProvider,
                ProtocolVersion::Saml20,
            )),
        ));

        tokio::time::sleep(MIN_REFRESH_PERIOD * 4).await;
        assert!(matches!(
            resolver.resolve_identity_provider("https://idp.example.com", ProtocolVersion::Saml20),
            Err(SamlError::TrustResolution(_))
        ));

        drop(resolver);
        tokio::time::timeout(MIN_REFRESH_PERIOD * 4, task)
            .await
            .unwrap()
            .unwrap();
    }

    struct StalledSource;

    #[async_trait]
    impl MetadataSource for StalledSource {
        async fn load(&self) -> SamlResult<MetadataDocument> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(MetadataDocument::default())
        }

        fn describe(&self) -> String {
            "stalled".to_string()
        }
    }

    #[tokio::test]
    async fn load_is_bounded_by_timeout() {
        let resolver = MetadataTrustResolver::new(Arc::new(StalledSource))
            .with_load_timeout(Duration::from_millis(20));
        let err = resolver.refresh().await.unwrap_err();
        assert!(matches!(err, SamlError::Metadata(_)));
        assert!(resolver.refresh_if_stale().await.is_err());
        assert!(matches!(
            resolver.document(),
            Err(SamlError::TrustResolution(_))
        ));
    }

    #[tokio::test]
    async fn interval_policy_reloads_when_stale() {
        let keys = keys();
        let source = Arc::new(InMemoryMetadataSource::from_document(document(
            keys.idp.public_credential(),
            keys.sp.public_credential(),
        )));
        let resolver = MetadataTrustResolver::new(source)
            .with_refresh_policy(RefreshPolicy::Interval(Duration::ZERO));
        assert!(resolver.refresh_if_stale().await.unwrap());
        assert!(resolver.refresh_if_stale().await.unwrap());

        let on_demand = MetadataTrustResolver::load(Arc::new(
            InMemoryMetadataSource::from_document(document(
                keys.idp.public_credential(),
                keys.sp.public_credential(),
            )),
        ))
        .await
        .unwrap();
        assert!(!on_demand.refresh_if_stale().await.unwrap());
    }
}
