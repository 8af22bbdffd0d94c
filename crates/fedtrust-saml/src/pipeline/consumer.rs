//! Consumer pipeline: verifies, decrypts, and validates inbound responses.
//!
//! Every call emits exactly one audit event: a success when the assertion is
//! accepted, or an error carrying the code of the failure that stopped it.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use fedtrust_core::{AuditCode, AuditEvent, AuditSink, Config};
use fedtrust_crypto::PrivateCredential;

use super::{CapabilitySet, Consumes};
use crate::codec::{AssertionCodec, XmlAssertionCodec};
use crate::error::{SamlError, SamlResult};
use crate::metadata::{MetadataTrustResolver, TrustedEntity};
use crate::signature::{CredentialCriteria, TrustAnchor};
use crate::types::{Assertion, AssertionPayload, EntityRole, ProtocolVersion, Response, StatusCode};
use crate::validation::LifecycleValidator;

/// Standard acceptance hook: accepts every validated assertion.
#[derive(Debug, Clone, Copy, Default)]
pub struct StandardConsumer;

impl Consumes for StandardConsumer {
    fn accept(&self, _assertion: &Assertion) -> SamlResult<()> {
        Ok(())
    }
}

/// Consumer settings.
#[derive(Debug, Clone)]
pub struct ConsumerSettings {
    /// Local service provider entity ID.
    pub service_provider: String,
    /// Protocol version.
    pub protocol: ProtocolVersion,
    /// Endpoint responses must be addressed to. Defaults to the service
    /// provider's published endpoint for the protocol's default binding.
    pub expected_destination: Option<String>,
    /// Reject unsigned messages even when the issuer publishes no signing key.
    pub require_signed: bool,
    /// Peer code selecting peer-specific implementations.
    pub peer_code: Option<String>,
}

impl ConsumerSettings {
    /// Creates settings requiring signed messages.
    #[must_use]
    pub fn new(service_provider: impl Into<String>, protocol: ProtocolVersion) -> Self {
        Self {
            service_provider: service_provider.into(),
            protocol,
            expected_destination: None,
            require_signed: true,
            peer_code: None,
        }
    }

    /// Reads settings from configuration.
    ///
    /// # Errors
    ///
    /// Returns `Configuration` for an unknown protocol.
    pub fn from_config(config: &Config) -> SamlResult<Self> {
        let protocol = ProtocolVersion::from_config(&config.identity_provider.protocol)
            .ok_or_else(|| {
                SamlError::Configuration(format!(
                    "unknown protocol: {}",
                    config.identity_provider.protocol
                ))
            })?;
        let sp = &config.service_provider;
        Ok(Self {
            service_provider: sp.entity_id.clone(),
            protocol,
            expected_destination: sp.assertion_consumer_url.clone(),
            require_signed: sp.require_signed_assertions,
            peer_code: config.identity_provider.peer_code.clone(),
        })
    }
}

/// Accepts responses for one service provider.
pub struct AssertionConsumer {
    settings: ConsumerSettings,
    resolver: Arc<MetadataTrustResolver>,
    service_provider: Arc<TrustedEntity>,
    expected_destination: Option<String>,
    decryption_credential: Option<PrivateCredential>,
    validator: LifecycleValidator,
    capabilities: CapabilitySet,
    codec: Arc<dyn AssertionCodec>,
    audit: Arc<dyn AuditSink>,
}

impl std::fmt::Debug for AssertionConsumer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AssertionConsumer")
            .field("settings", &self.settings)
            .field("expected_destination", &self.expected_destination)
            .field("decryption", &self.decryption_credential.is_some())
            .field("validator", &self.validator)
            .finish_non_exhaustive()
    }
}

impl AssertionConsumer {
    /// Creates a consumer, resolving the local service provider.
    ///
    /// The validator is handed the expected destination as well.
    ///
    /// # Errors
    ///
    /// Returns `TrustResolution` if the service provider is missing from
    /// metadata, and `Configuration` if the validator expects another
    /// protocol.
    pub fn new(
        settings: ConsumerSettings,
        resolver: Arc<MetadataTrustResolver>,
        decryption_credential: Option<PrivateCredential>,
        validator: LifecycleValidator,
        capabilities: CapabilitySet,
        audit: Arc<dyn AuditSink>,
    ) -> SamlResult<Self> {
        if validator.protocol() != settings.protocol {
            return Err(SamlError::Configuration(format!(
                "validator expects {} but consumer runs {}",
                validator.protocol(),
                settings.protocol
            )));
        }
        let service_provider =
            resolver.resolve_service_provider(&settings.service_provider, settings.protocol)?;
        let expected_destination = settings.expected_destination.clone().or_else(|| {
            service_provider
                .endpoint(settings.protocol.default_binding())
                .map(str::to_string)
        });
        let validator = match &expected_destination {
            Some(destination) => validator.with_expected_destination(destination.as_str()),
            None => validator,
        };

        tracing::info!(
            sp = %settings.service_provider,
            protocol = %settings.protocol,
            destination = expected_destination.as_deref().unwrap_or("-"),
            "consumer ready"
        );

        Ok(Self {
            settings,
            resolver,
            service_provider,
            expected_destination,
            decryption_credential,
            validator,
            capabilities,
            codec: Arc::new(XmlAssertionCodec),
            audit,
        })
    }

    /// Uses another codec for parsing.
    #[must_use]
    pub fn with_codec(mut self, codec: Arc<dyn AssertionCodec>) -> Self {
        self.codec = codec;
        self
    }

    /// Parses and consumes a serialized response.
    ///
    /// # Errors
    ///
    /// See [`AssertionConsumer::consume`]; parse failures are reported as
    /// `XmlParse` or `InvalidAssertion`.
    pub async fn consume_xml(&self, xml: &str) -> SamlResult<Assertion> {
        match self.codec.decode_response(xml) {
            Ok(response) => self.consume(&response).await,
            Err(e) => {
                self.emit(None, Err(&e));
                Err(e)
            }
        }
    }

    /// Consumes a response at the current time.
    ///
    /// # Errors
    ///
    /// Returns the typed error of the first failing stage.
    pub async fn consume(&self, response: &Response) -> SamlResult<Assertion> {
        self.consume_at(response, Utc::now()).await
    }

    /// Consumes a response as of `now`.
    ///
    /// # Errors
    ///
    /// Returns `SignatureRejected` when a signature does not verify,
    /// `SignatureEngine` when a required signature is missing or malformed,
    /// `Decryption` when the payload cannot be decrypted, and the lifecycle
    /// errors of [`LifecycleValidator`].
    ///
    /// Metadata is reloaded first when the resolver's refresh interval has
    /// elapsed.
    pub async fn consume_at(&self, response: &Response, now: DateTime<Utc>) -> SamlResult<Assertion> {
        if let Err(err) = self.resolver.refresh_if_stale().await {
            tracing::warn!(error = %err, "metadata unavailable before consuming response");
        }
        let result = self.process(response, now).await;
        let issuer = match &result {
            Ok(assertion) => assertion.issuer.clone(),
            Err(_) => response.effective_issuer().map(str::to_string),
        };
        self.emit(issuer.as_deref(), result.as_ref().map(|_| ()));
        result
    }

    async fn process(&self, response: &Response, now: DateTime<Utc>) -> SamlResult<Assertion> {
        let protocol = self.settings.protocol;
        if response.protocol != protocol {
            return Err(SamlError::InvalidAssertion(format!(
                "expected {protocol} but response is {}",
                response.protocol
            )));
        }

        if response.signature.is_some() {
            self.verify(response.effective_issuer(), |anchor| {
                self.capabilities.signer.validate_response(response, anchor)
            })?;
        }

        if let (Some(expected), Some(destination)) =
            (self.expected_destination.as_deref(), response.destination.as_deref())
        {
            if expected != destination {
                return Err(SamlError::InvalidAssertion(format!(
                    "response addressed to {destination}, expected {expected}"
                )));
            }
        }

        if response.status != StatusCode::Success {
            return Err(SamlError::InvalidAssertion(format!(
                "response status is {}",
                response.status.value(protocol)
            )));
        }

        let assertion = match &response.payload {
            Some(AssertionPayload::Plain(assertion)) => (**assertion).clone(),
            Some(AssertionPayload::Encrypted(encrypted)) => {
                let credential = self.decryption_credential.as_ref().ok_or_else(|| {
                    SamlError::Configuration("no decryption credential is configured".to_string())
                })?;
                self.capabilities.encrypter.decrypt(
                    encrypted,
                    credential,
                    Some(self.service_provider.entity_id()),
                )?
            }
            None => {
                return Err(SamlError::InvalidAssertion(
                    "response carries no assertion".to_string(),
                ))
            }
        };

        if assertion.signature.is_some() {
            self.verify(assertion.issuer.as_deref(), |anchor| {
                self.capabilities.signer.validate_assertion(&assertion, anchor)
            })?;
        }

        if assertion.signature.is_none() {
            if response.signature.is_some() {
                Self::require_same_issuer(response, &assertion)?;
            } else {
                self.require_unsigned_allowed(&assertion)?;
            }
        }

        self.validator.validate_at(&assertion, now).await?;
        self.capabilities.consumer.accept(&assertion)?;
        Ok(assertion)
    }

    /// Validates a signature against the signing keys the issuer publishes.
    fn verify<F>(&self, issuer: Option<&str>, validate: F) -> SamlResult<()>
    where
        F: FnOnce(TrustAnchor<'_>) -> SamlResult<bool>,
    {
        let issuer = issuer
            .ok_or_else(|| SamlError::UnknownIssuer("signed message names no issuer".to_string()))?;
        let criteria = CredentialCriteria::signing(issuer, EntityRole::IdentityProvider);
        if validate(TrustAnchor::Resolver(self.resolver.as_ref(), &criteria))? {
            Ok(())
        } else {
            Err(SamlError::SignatureRejected(format!(
                "signature from {issuer} does not verify"
            )))
        }
    }

    /// An unsigned assertion is only vouched for by the response signer, so
    /// it must name the same issuer.
    fn require_same_issuer(response: &Response, assertion: &Assertion) -> SamlResult<()> {
        let signer = response.effective_issuer();
        let issuer = assertion.issuer.as_deref();
        if signer.is_some() && signer == issuer {
            return Ok(());
        }
        Err(SamlError::UnknownIssuer(format!(
            "assertion issued by {} inside a response signed by {}",
            issuer.unwrap_or("-"),
            signer.unwrap_or("-")
        )))
    }

    fn require_unsigned_allowed(&self, assertion: &Assertion) -> SamlResult<()> {
        let issuer = assertion
            .issuer
            .as_deref()
            .ok_or_else(|| SamlError::UnknownIssuer("assertion has no issuer".to_string()))?;
        let identity_provider = self
            .resolver
            .resolve_identity_provider(issuer, self.settings.protocol)
            .map_err(|e| SamlError::UnknownIssuer(format!("{issuer}: {e}")))?;
        if self.settings.require_signed
            || self.resolver.resolve_signing_requirement(&identity_provider)
        {
            return Err(SamlError::SignatureEngine(format!(
                "message from {issuer} is not signed"
            )));
        }
        Ok(())
    }

    fn emit(&self, issuer: Option<&str>, outcome: Result<(), &SamlError>) {
        let idp = issuer.unwrap_or("-");
        let sp = self.service_provider.entity_id();
        let protocol = self.settings.protocol.name();
        let event = match outcome {
            Ok(()) => AuditEvent::success(AuditCode::ValidAssertionAccepted, idp, protocol, sp),
            Err(e) => AuditEvent::error(e.audit_code(), idp, protocol, sp, e.to_string()),
        };
        self.audit.emit(event);
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;
    use fedtrust_core::event::InMemoryAuditSink;
    use fedtrust_core::AuditOutcome;
    use fedtrust_crypto::KeyFamily;

    use super::*;
    use crate::metadata::{
        EntityDescriptor, InMemoryMetadataSource, KeyDescriptor, KeyUse, MetadataDocument,
        RefreshPolicy, RoleDescriptor,
    };
    use crate::pipeline::{AssertionProducer, AssertionRequest, ProducerSettings};

    const IDP: &str = "https://idp.example.com";
    const SP: &str = "https://sp.example.com";
    const ACS: &str = "https://sp.example.com/acs";
    const OTHER_IDP: &str = "https://idp-b.example.com";

    struct Fixture {
        producer: AssertionProducer,
        consumer: AssertionConsumer,
        audit: Arc<InMemoryAuditSink>,
        idp_key: PrivateCredential,
        source: Arc<InMemoryMetadataSource>,
    }

    async fn fixture(encrypt: bool) -> Fixture {
        fixture_with(encrypt, RefreshPolicy::OnDemand).await
    }

    async fn fixture_with(encrypt: bool, policy: RefreshPolicy) -> Fixture {
        let idp_key = PrivateCredential::generate(KeyFamily::EcP256).unwrap();
        let sp_key = PrivateCredential::generate_rsa(2048).unwrap();

        let mut sp_role = RoleDescriptor::new(EntityRole::ServiceProvider, ProtocolVersion::Saml20)
            .with_endpoint(ProtocolVersion::Saml20.default_binding(), ACS);
        if encrypt {
            sp_role = sp_role.with_key(KeyDescriptor::new(
                KeyUse::Encryption,
                sp_key.public_credential().clone(),
            ));
        }
        let idp_role = RoleDescriptor::new(EntityRole::IdentityProvider, ProtocolVersion::Saml20)
            .with_key(KeyDescriptor::new(
                KeyUse::Signing,
                idp_key.public_credential().clone(),
            ));
        let other_key = PrivateCredential::generate(KeyFamily::EcP256).unwrap();
        let other_role =
            RoleDescriptor::new(EntityRole::IdentityProvider, ProtocolVersion::Saml20).with_key(
                KeyDescriptor::new(KeyUse::Signing, other_key.public_credential().clone()),
            );
        let document = MetadataDocument::default()
            .with_entity(EntityDescriptor::new(IDP).with_role(idp_role))
            .with_entity(EntityDescriptor::new(OTHER_IDP).with_role(other_role))
            .with_entity(EntityDescriptor::new(SP).with_role(sp_role));
        let source = Arc::new(InMemoryMetadataSource::from_document(document));
        let resolver = MetadataTrustResolver::new(source.clone()).with_refresh_policy(policy);
        resolver.refresh().await.unwrap();
        let resolver = Arc::new(resolver);

        let audit = Arc::new(InMemoryAuditSink::new());
        let producer = AssertionProducer::new(
            ProducerSettings::new(IDP, SP, ProtocolVersion::Saml20),
            Arc::clone(&resolver),
            Some(idp_key.clone()),
            CapabilitySet::standard(),
            Arc::new(InMemoryAuditSink::new()),
        )
        .unwrap();
        let consumer = AssertionConsumer::new(
            ConsumerSettings::new(SP, ProtocolVersion::Saml20),
            Arc::clone(&resolver),
            Some(sp_key),
            LifecycleValidator::new(ProtocolVersion::Saml20, resolver),
            CapabilitySet::standard(),
            Arc::clone(&audit) as Arc<dyn AuditSink>,
        )
        .unwrap();
        Fixture {
            producer,
            consumer,
            audit,
            idp_key,
            source,
        }
    }

    fn request() -> AssertionRequest {
        AssertionRequest::new("189502").with_window(Utc::now(), Duration::minutes(30))
    }

    #[tokio::test]
    async fn plain_round_trip() {
        let f = fixture(false).await;
        let produced = f.producer.produce(&request()).unwrap();
        let accepted = f.consumer.consume_xml(&produced.xml).await.unwrap();
        assert_eq!(accepted, produced.assertion);

        let events = f.audit.events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].code, AuditCode::ValidAssertionAccepted);
        assert_eq!(events[0].detail, "valid assertion accepted");
        assert_eq!(events[0].actor_idp, IDP);
    }

    #[tokio::test]
    async fn encrypted_round_trip() {
        let f = fixture(true).await;
        let produced = f.producer.produce(&request()).unwrap();
        assert!(matches!(
            produced.response.payload,
            Some(AssertionPayload::Encrypted(_))
        ));
        let accepted = f.consumer.consume_xml(&produced.xml).await.unwrap();
        assert_eq!(accepted, produced.assertion);
    }

    #[tokio::test]
    async fn expired_assertion_is_audited() {
        let f = fixture(true).await;
        let produced = f.producer.produce(&request()).unwrap();
        let later = Utc::now() + Duration::minutes(31);
        let err = f
            .consumer
            .consume_at(&produced.response, later)
            .await
            .unwrap_err();
        assert!(matches!(err, SamlError::ExpiredOrPremature(_)));

        let events = f.audit.events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].code, AuditCode::ExpiredOrPremature);
        assert_eq!(events[0].outcome, AuditOutcome::Error);
    }

    #[tokio::test]
    async fn tampered_response_is_rejected() {
        let f = fixture(false).await;
        let mut response = f.producer.produce(&request()).unwrap().response;
        if let Some(AssertionPayload::Plain(assertion)) = &mut response.payload {
            assertion.attributes.push(("role".into(), "admin".into()));
        }
        let err = f.consumer.consume(&response).await.unwrap_err();
        assert!(matches!(err, SamlError::SignatureRejected(_)));
        assert_eq!(f.audit.events()[0].code, AuditCode::SignatureInvalid);
    }

    #[tokio::test]
    async fn unsigned_response_is_rejected() {
        let f = fixture(false).await;
        let mut response = f.producer.produce(&request()).unwrap().response;
        response.signature = None;
        if let Some(AssertionPayload::Plain(assertion)) = &mut response.payload {
            assertion.signature = None;
        }
        let err = f.consumer.consume(&response).await.unwrap_err();
        assert!(matches!(err, SamlError::SignatureEngine(_)));
    }

    #[tokio::test]
    async fn wrong_destination_is_rejected() {
        let f = fixture(false).await;
        let mut response = f.producer.produce(&request()).unwrap().response;
        response.destination = Some("https://evil.example.com/acs".into());
        let err = f.consumer.consume(&response).await.unwrap_err();
        // The destination is covered by the response signature.
        assert!(matches!(err, SamlError::SignatureRejected(_)));

        let mut response = f.producer.produce(&request()).unwrap().response;
        response.destination = Some("https://evil.example.com/acs".into());
        response.signature = None;
        let err = f.consumer.consume(&response).await.unwrap_err();
        assert!(matches!(err, SamlError::InvalidAssertion(_)));
    }

    #[tokio::test]
    async fn replayed_response_is_rejected() {
        let f = fixture(false).await;
        let produced = f.producer.produce(&request()).unwrap();
        f.consumer.consume(&produced.response).await.unwrap();
        let err = f.consumer.consume(&produced.response).await.unwrap_err();
        assert!(matches!(err, SamlError::ReplayDetected(_)));
        assert_eq!(f.audit.len(), 2);
    }

    #[tokio::test]
    async fn malformed_xml_is_audited_once() {
        let f = fixture(false).await;
        let err = f.consumer.consume_xml("<samlp:Response").await.unwrap_err();
        assert!(matches!(err, SamlError::XmlParse(_)));
        let events = f.audit.events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].code, AuditCode::AssertionInvalid);
    }

    #[tokio::test]
    async fn missing_decryption_key_is_configuration_error() {
        let f = fixture(true).await;
        let produced = f.producer.produce(&request()).unwrap();
        let consumer = AssertionConsumer {
            decryption_credential: None,
            ..f.consumer
        };
        let err = consumer.consume(&produced.response).await.unwrap_err();
        assert!(matches!(err, SamlError::Configuration(_)));
    }

    #[tokio::test]
    async fn unsigned_assertion_must_name_the_response_signer() {
        let f = fixture(false).await;
        let mut response = f.producer.produce(&request()).unwrap().response;
        if let Some(AssertionPayload::Plain(assertion)) = &mut response.payload {
            assertion.issuer = Some(OTHER_IDP.to_string());
            assertion.signature = None;
        }
        CapabilitySet::standard()
            .signer
            .sign_response(&mut response, &f.idp_key)
            .unwrap();

        let err = f.consumer.consume(&response).await.unwrap_err();
        assert!(matches!(err, SamlError::UnknownIssuer(_)));
        assert_eq!(f.audit.events()[0].code, err.audit_code());
    }

    #[tokio::test]
    async fn unsigned_assertion_from_the_response_signer_is_accepted() {
        let f = fixture(false).await;
        let mut response = f.producer.produce(&request()).unwrap().response;
        if let Some(AssertionPayload::Plain(assertion)) = &mut response.payload {
            assertion.signature = None;
        }
        CapabilitySet::standard()
            .signer
            .sign_response(&mut response, &f.idp_key)
            .unwrap();

        let accepted = f.consumer.consume(&response).await.unwrap();
        assert_eq!(accepted.issuer.as_deref(), Some(IDP));
    }

    #[tokio::test]
    async fn stale_metadata_is_reloaded_before_consuming() {
        let f = fixture_with(false, RefreshPolicy::Interval(std::time::Duration::ZERO)).await;
        let produced = f.producer.produce(&request()).unwrap();

        let sp_role = RoleDescriptor::new(EntityRole::ServiceProvider, ProtocolVersion::Saml20)
            .with_endpoint(ProtocolVersion::Saml20.default_binding(), ACS);
        f.source.replace(
            MetadataDocument::default().with_entity(EntityDescriptor::new(SP).with_role(sp_role)),
        );

        assert!(f.consumer.consume(&produced.response).await.is_err());
        let events = f.audit.events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].outcome, AuditOutcome::Error);
    }
}
