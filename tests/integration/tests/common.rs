//! Common test utilities and fixtures.

use std::path::PathBuf;
use std::sync::Arc;

use fedtrust_cli::{load_config, EngineContext};
use fedtrust_core::event::{InMemoryAuditSink, TracingAuditSink};
use fedtrust_core::AuditSink;
use fedtrust_crypto::{KeyFamily, PemDirectoryKeyStore, PrivateCredential};
use fedtrust_saml::metadata::{
    EntityDescriptor, InMemoryMetadataSource, KeyDescriptor, KeyUse, MetadataDocument,
    MetadataTrustResolver, RoleDescriptor,
};
use fedtrust_saml::pipeline::{
    AssertionConsumer, AssertionProducer, CapabilitySet, ConsumerSettings, ProducerSettings,
};
use fedtrust_saml::{EntityRole, LifecycleValidator, ProtocolVersion};
use tempfile::TempDir;

pub const IDP: &str = "https://idp.example.com";
pub const SP: &str = "https://sp.example.com";
pub const ACS: &str = "https://sp.example.com/acs";
pub const ROGUE_IDP: &str = "https://rogue.example.com";
pub const PARTNER_IDP: &str = "https://partner.example.com";

pub const IDP_SIGNING_ALIAS: &str = "idp-signing";
pub const SP_ENCRYPTION_ALIAS: &str = "sp-encryption";

/// A configured deployment on disk: key store, metadata file, and config.
pub struct TestEnv {
    /// Keeps the directory alive for the test.
    _dir: TempDir,
    /// Path of the metadata file.
    pub metadata_path: PathBuf,
    /// Engine context loaded from the written config file.
    pub context: EngineContext,
    /// Audit events of consumers built by this environment.
    pub audit: Arc<InMemoryAuditSink>,
    /// Identity provider signing key.
    pub idp_key: PrivateCredential,
    /// Service provider decryption key.
    pub sp_key: PrivateCredential,
}

impl TestEnv {
    /// Creates an environment for `protocol`, with an encrypting service
    /// provider when `encrypt` is set.
    pub async fn new(protocol: ProtocolVersion, encrypt: bool) -> anyhow::Result<Self> {
        let _ = tracing_subscriber::fmt()
            .with_env_filter("fedtrust_saml=debug")
            .with_test_writer()
            .try_init();

        let dir = tempfile::tempdir()?;
        let key_dir = dir.path().join("keys");
        let metadata_path = dir.path().join("metadata.xml");

        let idp_key = PrivateCredential::generate(KeyFamily::EcP256)?;
        let sp_key = PrivateCredential::generate_rsa(2048)?;
        let keystore = PemDirectoryKeyStore::new(&key_dir, std::time::Duration::from_secs(5));
        keystore.store_private(IDP_SIGNING_ALIAS, &idp_key).await?;
        keystore.store_private(SP_ENCRYPTION_ALIAS, &sp_key).await?;

        let document = metadata(protocol, &idp_key, encrypt.then_some(&sp_key));
        tokio::fs::write(&metadata_path, document.to_xml()).await?;

        let config_path = dir.path().join("fedtrust.toml");
        let protocol_name = match protocol {
            ProtocolVersion::Saml20 => "saml2.0",
            ProtocolVersion::Saml11 => "saml1.1",
        };
        let config = format!(
            r#"
[metadata]
path = "{metadata}"

[keystore]
directory = "{keys}"

[identity_provider]
entity_id = "{IDP}"
signing_key_alias = "{IDP_SIGNING_ALIAS}"
protocol = "{protocol_name}"
binding = "{binding}"
assertion_validity_secs = 1800

[service_provider]
entity_id = "{SP}"
decryption_key_alias = "{SP_ENCRYPTION_ALIAS}"
assertion_consumer_url = "{ACS}"
"#,
            metadata = metadata_path.display(),
            keys = key_dir.display(),
            binding = protocol.default_binding().uri(),
        );
        tokio::fs::write(&config_path, config).await?;

        let audit = Arc::new(InMemoryAuditSink::new());
        let mut context = EngineContext::new(load_config(Some(config_path.as_path()))?);
        context.audit = Arc::clone(&audit) as Arc<dyn AuditSink>;

        Ok(Self {
            _dir: dir,
            metadata_path,
            context,
            audit,
            idp_key,
            sp_key,
        })
    }

    /// Rewrites the metadata file so that it also trusts [`PARTNER_IDP`], and
    /// returns the partner's signing key.
    pub async fn add_partner_idp(
        &self,
        protocol: ProtocolVersion,
    ) -> anyhow::Result<PrivateCredential> {
        let partner_key = PrivateCredential::generate(KeyFamily::EcP256)?;
        let partner_role = RoleDescriptor::new(EntityRole::IdentityProvider, protocol).with_key(
            KeyDescriptor::new(KeyUse::Signing, partner_key.public_credential().clone()),
        );
        let document = metadata(protocol, &self.idp_key, None)
            .with_entity(EntityDescriptor::new(PARTNER_IDP).with_role(partner_role));
        tokio::fs::write(&self.metadata_path, document.to_xml()).await?;
        Ok(partner_key)
    }

    /// Builds a producer from the configuration, with its own audit sink.
    pub async fn producer(&self) -> anyhow::Result<AssertionProducer> {
        let settings = ProducerSettings::from_config(&self.context.config)?;
        let producer = AssertionProducer::new(
            settings,
            self.context.resolver().await?,
            self.context.signing_credential().await?,
            self.context.capabilities()?,
            Arc::new(TracingAuditSink::new()),
        )?;
        Ok(producer)
    }

    /// Builds a consumer from the configuration.
    pub async fn consumer(&self) -> anyhow::Result<AssertionConsumer> {
        let key = self.context.decryption_credential().await?;
        self.consumer_with_key(key).await
    }

    /// Builds a consumer holding `key` as its decryption key.
    pub async fn consumer_with_key(
        &self,
        key: Option<PrivateCredential>,
    ) -> anyhow::Result<AssertionConsumer> {
        let settings = ConsumerSettings::from_config(&self.context.config)?;
        let resolver = self.context.resolver().await?;
        let validator = LifecycleValidator::new(settings.protocol, Arc::clone(&resolver))
            .with_config(&self.context.config.validation);
        let consumer = AssertionConsumer::new(
            settings,
            resolver,
            key,
            validator,
            self.context.capabilities()?,
            Arc::clone(&self.context.audit),
        )?;
        Ok(consumer)
    }
}

/// Metadata naming the identity provider and the service provider.
pub fn metadata(
    protocol: ProtocolVersion,
    idp_key: &PrivateCredential,
    sp_encryption_key: Option<&PrivateCredential>,
) -> MetadataDocument {
    let idp_role = RoleDescriptor::new(EntityRole::IdentityProvider, protocol).with_key(
        KeyDescriptor::new(KeyUse::Signing, idp_key.public_credential().clone()),
    );
    let mut sp_role = RoleDescriptor::new(EntityRole::ServiceProvider, protocol)
        .with_endpoint(protocol.default_binding(), ACS);
    if let Some(key) = sp_encryption_key {
        sp_role = sp_role.with_key(KeyDescriptor::new(
            KeyUse::Encryption,
            key.public_credential().clone(),
        ));
    }
    MetadataDocument::default()
        .with_entity(EntityDescriptor::new(IDP).with_role(idp_role))
        .with_entity(EntityDescriptor::new(SP).with_role(sp_role))
}

/// A producer for an identity provider the service provider's metadata does
/// not know about.
pub async fn rogue_producer(env: &TestEnv) -> anyhow::Result<AssertionProducer> {
    let rogue_key = PrivateCredential::generate(KeyFamily::EcP256)?;
    let document = metadata(ProtocolVersion::Saml20, &rogue_key, Some(&env.sp_key));
    let mut entities = document.entities;
    if let Some(idp) = entities.iter_mut().find(|e| e.entity_id == IDP) {
        idp.entity_id = ROGUE_IDP.to_string();
    }
    let document = MetadataDocument::new(entities);
    let resolver =
        MetadataTrustResolver::load(Arc::new(InMemoryMetadataSource::from_document(document)))
            .await?;

    let settings = ProducerSettings::new(ROGUE_IDP, SP, ProtocolVersion::Saml20);
    let producer = AssertionProducer::new(
        settings,
        Arc::new(resolver),
        Some(rogue_key),
        CapabilitySet::standard(),
        Arc::new(TracingAuditSink::new()),
    )?;
    Ok(producer)
}
