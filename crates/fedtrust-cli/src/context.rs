//! Engine components assembled from configuration.

use std::sync::Arc;

use fedtrust_core::event::TracingAuditSink;
use fedtrust_core::{AuditSink, Config};
use fedtrust_crypto::{
    DataEncryptionAlgorithm, KeyStore, KeyTransportAlgorithm, PemDirectoryKeyStore,
    PrivateCredential,
};
use fedtrust_saml::metadata::{
    FileMetadataSource, HttpMetadataSource, MetadataSource, MetadataTrustResolver, RefreshPolicy,
};
use fedtrust_saml::pipeline::{CapabilityKind, CapabilitySet, ImplementationRegistry};
use fedtrust_saml::{AssertionEncrypter, KeyPlacement, ProtocolVersion};

use crate::{CliError, CliResult};

/// Everything a command needs, built from one configuration.
pub struct EngineContext {
    /// The loaded configuration.
    pub config: Config,
    /// Key store over the configured directory.
    pub keystore: PemDirectoryKeyStore,
    /// Peer-specific implementation overrides.
    pub registry: ImplementationRegistry,
    /// Audit destination.
    pub audit: Arc<dyn AuditSink>,
}

impl EngineContext {
    /// Creates a context. Metadata is loaded separately, on first need.
    #[must_use]
    pub fn new(config: Config) -> Self {
        let keystore = PemDirectoryKeyStore::new(
            config.keystore.directory.clone(),
            config.keystore.load_timeout(),
        );
        Self {
            config,
            keystore,
            registry: ImplementationRegistry::new(),
            audit: Arc::new(TracingAuditSink::new()),
        }
    }

    /// Returns the configured protocol version.
    pub fn protocol(&self) -> CliResult<ProtocolVersion> {
        let name = &self.config.identity_provider.protocol;
        ProtocolVersion::from_config(name)
            .ok_or_else(|| CliError::Config(format!("unknown protocol: {name}")))
    }

    /// Loads metadata from the configured source and returns the resolver.
    pub async fn resolver(&self) -> CliResult<Arc<MetadataTrustResolver>> {
        let metadata = &self.config.metadata;
        let source: Arc<dyn MetadataSource> = match (&metadata.path, &metadata.url) {
            (Some(path), _) => Arc::new(FileMetadataSource::new(path.clone())),
            (None, Some(url)) => Arc::new(HttpMetadataSource::new(url)?),
            (None, None) => {
                return Err(CliError::Config(
                    "metadata.path or metadata.url must be set".to_string(),
                ))
            }
        };

        let key_transport =
            KeyTransportAlgorithm::from_uri(&self.config.crypto.key_transport_algorithm)?;
        let resolver = MetadataTrustResolver::new(source)
            .with_refresh_policy(RefreshPolicy::from_interval(metadata.refresh_interval()))
            .with_load_timeout(metadata.load_timeout())
            .with_default_key_transport(key_transport);
        resolver.refresh().await?;
        Ok(Arc::new(resolver))
    }

    /// Capabilities for the configured peer, with the configured encrypter
    /// unless the peer overrides it.
    pub fn capabilities(&self) -> CliResult<CapabilitySet> {
        let peer_code = self.config.identity_provider.peer_code.as_deref();
        let capabilities = self.registry.capabilities_for(peer_code);
        let overridden =
            peer_code.is_some_and(|code| self.registry.lookup(code, CapabilityKind::Encrypts).is_some());
        if overridden {
            return Ok(capabilities);
        }

        let crypto = &self.config.crypto;
        let data_encryption = DataEncryptionAlgorithm::from_uri(&crypto.data_encryption_algorithm)?;
        let encrypter =
            AssertionEncrypter::new(data_encryption, KeyPlacement::from(crypto.key_placement));
        Ok(capabilities.with_encrypter(Arc::new(encrypter)))
    }

    /// Loads the identity provider's signing key, if one is configured.
    pub async fn signing_credential(&self) -> CliResult<Option<PrivateCredential>> {
        let idp = &self.config.identity_provider;
        self.load_private(idp.signing_key_alias.as_deref(), idp.signing_key_password.as_deref())
            .await
    }

    /// Loads the service provider's decryption key, if one is configured.
    pub async fn decryption_credential(&self) -> CliResult<Option<PrivateCredential>> {
        let sp = &self.config.service_provider;
        self.load_private(
            sp.decryption_key_alias.as_deref(),
            sp.decryption_key_password.as_deref(),
        )
        .await
    }

    async fn load_private(
        &self,
        alias: Option<&str>,
        password: Option<&str>,
    ) -> CliResult<Option<PrivateCredential>> {
        let Some(alias) = alias else {
            return Ok(None);
        };
        let credential = self.keystore.load_private_credential(alias, password).await?;
        tracing::debug!(alias, family = ?credential.family(), "private key loaded");
        Ok(Some(credential))
    }
}
