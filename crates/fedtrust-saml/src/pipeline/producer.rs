//! Producer pipeline: builds, protects, and emits responses.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use fedtrust_core::{AuditCode, AuditEvent, AuditSink, Config};
use fedtrust_crypto::PrivateCredential;

use super::{CapabilitySet, Produces};
use crate::codec::{AssertionCodec, XmlAssertionCodec};
use crate::error::{SamlError, SamlResult};
use crate::metadata::{MetadataTrustResolver, TrustedEntity};
use crate::types::{
    Assertion, AssertionPayload, NameIdFormat, ProtocolVersion, Response, SamlBinding, Subject,
    Validity,
};

// ============================================================================
// Requests
// ============================================================================

/// What the caller asks an assertion to state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssertionRequest {
    /// Subject identifier.
    pub subject: String,
    /// Subject identifier format.
    pub format: NameIdFormat,
    /// Start of the validity window; the time of the call when absent.
    pub not_before: Option<DateTime<Utc>>,
    /// Length of the validity window; the configured lifetime when absent.
    pub lifetime: Option<Duration>,
    /// Authentication context class reference.
    pub authn_context_class: Option<String>,
    /// Attributes, in order.
    pub attributes: Vec<(String, String)>,
    /// Identifier of the request being answered.
    pub in_response_to: Option<String>,
}

impl AssertionRequest {
    /// Creates a request for `subject`.
    #[must_use]
    pub fn new(subject: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
            format: NameIdFormat::default(),
            not_before: None,
            lifetime: None,
            authn_context_class: None,
            attributes: Vec::new(),
            in_response_to: None,
        }
    }

    /// Sets the subject identifier format.
    #[must_use]
    pub const fn with_format(mut self, format: NameIdFormat) -> Self {
        self.format = format;
        self
    }

    /// Sets the validity window to `[not_before, not_before + lifetime)`.
    #[must_use]
    pub const fn with_window(mut self, not_before: DateTime<Utc>, lifetime: Duration) -> Self {
        self.not_before = Some(not_before);
        self.lifetime = Some(lifetime);
        self
    }

    /// Sets the authentication context class.
    #[must_use]
    pub fn with_authn_context_class(mut self, class: impl Into<String>) -> Self {
        self.authn_context_class = Some(class.into());
        self
    }

    /// Appends an attribute.
    #[must_use]
    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.push((name.into(), value.into()));
        self
    }

    /// Sets the identifier of the request being answered.
    #[must_use]
    pub fn in_response_to(mut self, request_id: impl Into<String>) -> Self {
        self.in_response_to = Some(request_id.into());
        self
    }
}

/// Facts the producer resolved before building an assertion.
#[derive(Debug, Clone, Copy)]
pub struct ProductionContext<'a> {
    /// Issuing identity provider.
    pub issuer: &'a str,
    /// Receiving service provider.
    pub service_provider: &'a str,
    /// Protocol version.
    pub protocol: ProtocolVersion,
    /// Resolved assertion consumer endpoint.
    pub destination: &'a str,
    /// Time of the call.
    pub now: DateTime<Utc>,
    /// Configured assertion lifetime.
    pub lifetime: Duration,
}

/// Standard assertion builder: a bearer subject addressed to the
/// destination, one authentication context, and the requested attributes.
#[derive(Debug, Clone, Copy, Default)]
pub struct StandardProducer;

impl Produces for StandardProducer {
    fn build_assertion(
        &self,
        request: &AssertionRequest,
        context: &ProductionContext<'_>,
    ) -> SamlResult<Assertion> {
        let not_before = request.not_before.unwrap_or(context.now);
        let lifetime = request.lifetime.unwrap_or(context.lifetime);
        let not_on_or_after = not_before.checked_add_signed(lifetime).ok_or_else(|| {
            SamlError::InvalidAssertion(format!("lifetime {lifetime} from {not_before} is out of range"))
        })?;
        let validity = Validity::new(not_before, not_on_or_after)?;

        let mut subject =
            Subject::bearer(&request.subject, context.protocol).with_destination(context.destination);
        subject.format = request.format;

        let mut assertion = Assertion::new(context.issuer, context.protocol)
            .with_subject(subject)
            .with_validity(validity);
        assertion.issue_instant = context.now;
        assertion.authn_context_class.clone_from(&request.authn_context_class);
        assertion.attributes.clone_from(&request.attributes);
        Ok(assertion)
    }
}

// ============================================================================
// Producer
// ============================================================================

/// Producer settings.
#[derive(Debug, Clone)]
pub struct ProducerSettings {
    /// Local identity provider entity ID.
    pub identity_provider: String,
    /// Remote service provider entity ID.
    pub service_provider: String,
    /// Protocol version.
    pub protocol: ProtocolVersion,
    /// Binding used to pick the destination endpoint.
    pub binding: SamlBinding,
    /// Whether a signing credential is mandatory.
    pub require_signing: bool,
    /// Default assertion lifetime.
    pub assertion_lifetime: Duration,
    /// Peer code selecting peer-specific implementations.
    pub peer_code: Option<String>,
}

impl ProducerSettings {
    /// Creates settings with the protocol's default binding.
    #[must_use]
    pub fn new(
        identity_provider: impl Into<String>,
        service_provider: impl Into<String>,
        protocol: ProtocolVersion,
    ) -> Self {
        Self {
            identity_provider: identity_provider.into(),
            service_provider: service_provider.into(),
            protocol,
            binding: protocol.default_binding(),
            require_signing: true,
            assertion_lifetime: Duration::minutes(5),
            peer_code: None,
        }
    }

    /// Reads settings from configuration.
    ///
    /// # Errors
    ///
    /// Returns `Configuration` for an unknown protocol or binding.
    pub fn from_config(config: &Config) -> SamlResult<Self> {
        let idp = &config.identity_provider;
        let protocol = ProtocolVersion::from_config(&idp.protocol).ok_or_else(|| {
            SamlError::Configuration(format!("unknown protocol: {}", idp.protocol))
        })?;
        let binding = SamlBinding::from_uri(&idp.binding)
            .ok_or_else(|| SamlError::Configuration(format!("unknown binding: {}", idp.binding)))?;
        let lifetime = i64::try_from(idp.assertion_validity_secs)
            .ok()
            .and_then(Duration::try_seconds)
            .ok_or_else(|| {
                SamlError::Configuration(format!(
                    "assertion validity too large: {}",
                    idp.assertion_validity_secs
                ))
            })?;

        Ok(Self {
            identity_provider: idp.entity_id.clone(),
            service_provider: config.service_provider.entity_id.clone(),
            protocol,
            binding,
            require_signing: idp.require_signing,
            assertion_lifetime: lifetime,
            peer_code: idp.peer_code.clone(),
        })
    }
}

/// A response ready to be delivered.
#[derive(Debug, Clone)]
pub struct ProducedResponse {
    /// The response object.
    pub response: Response,
    /// The assertion before encryption, signed when it was signed.
    pub assertion: Assertion,
    /// Serialized response.
    pub xml: String,
    /// Endpoint the response is addressed to.
    pub destination: String,
}

/// Builds responses for one service provider.
pub struct AssertionProducer {
    settings: ProducerSettings,
    resolver: Arc<MetadataTrustResolver>,
    identity_provider: Arc<TrustedEntity>,
    service_provider: Arc<TrustedEntity>,
    signing_credential: Option<PrivateCredential>,
    capabilities: CapabilitySet,
    codec: Arc<dyn AssertionCodec>,
    audit: Arc<dyn AuditSink>,
}

impl std::fmt::Debug for AssertionProducer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AssertionProducer")
            .field("settings", &self.settings)
            .field("signing", &self.signing_credential.is_some())
            .finish_non_exhaustive()
    }
}

impl AssertionProducer {
    /// Creates a producer, resolving both parties from metadata.
    ///
    /// # Errors
    ///
    /// Returns `TrustResolution` if either party is missing from metadata,
    /// and `Configuration` if signing is required but no signing credential
    /// is given.
    pub fn new(
        settings: ProducerSettings,
        resolver: Arc<MetadataTrustResolver>,
        signing_credential: Option<PrivateCredential>,
        capabilities: CapabilitySet,
        audit: Arc<dyn AuditSink>,
    ) -> SamlResult<Self> {
        if settings.require_signing && signing_credential.is_none() {
            return Err(SamlError::Configuration(format!(
                "{} requires signing but no signing credential is configured",
                settings.protocol
            )));
        }

        let identity_provider =
            resolver.resolve_identity_provider(&settings.identity_provider, settings.protocol)?;
        let service_provider =
            resolver.resolve_service_provider(&settings.service_provider, settings.protocol)?;

        tracing::info!(
            idp = %settings.identity_provider,
            sp = %settings.service_provider,
            protocol = %settings.protocol,
            signing = signing_credential.is_some(),
            "producer ready"
        );

        Ok(Self {
            settings,
            resolver,
            identity_provider,
            service_provider,
            signing_credential,
            capabilities,
            codec: Arc::new(XmlAssertionCodec),
            audit,
        })
    }

    /// Uses another codec for serialization.
    #[must_use]
    pub fn with_codec(mut self, codec: Arc<dyn AssertionCodec>) -> Self {
        self.codec = codec;
        self
    }

    /// Returns the settings.
    #[must_use]
    pub const fn settings(&self) -> &ProducerSettings {
        &self.settings
    }

    /// Produces a response for `request`.
    ///
    /// Emits one audit event for the call.
    ///
    /// # Errors
    ///
    /// Returns `TrustResolution` if the service provider has no endpoint for
    /// the binding, and `Encryption` or `SignatureEngine` if protecting the
    /// assertion fails.
    pub fn produce(&self, request: &AssertionRequest) -> SamlResult<ProducedResponse> {
        let result = self.produce_inner(request);
        let idp = self.identity_provider.entity_id();
        let sp = self.service_provider.entity_id();
        let protocol = self.settings.protocol.name();
        let event = match &result {
            Ok(_) => AuditEvent::success(AuditCode::AssertionProduced, idp, protocol, sp),
            Err(e) => AuditEvent::error(e.audit_code(), idp, protocol, sp, e.to_string()),
        };
        self.audit.emit(event);
        result
    }

    fn produce_inner(&self, request: &AssertionRequest) -> SamlResult<ProducedResponse> {
        let protocol = self.settings.protocol;
        let destination = self
            .resolver
            .resolve_endpoint(&self.service_provider, self.settings.binding)?;

        let context = ProductionContext {
            issuer: self.identity_provider.entity_id(),
            service_provider: self.service_provider.entity_id(),
            protocol,
            destination: &destination,
            now: Utc::now(),
            lifetime: self.settings.assertion_lifetime,
        };
        let mut assertion = self.capabilities.producer.build_assertion(request, &context)?;

        let encryption = match self.resolver.resolve_encryption_credential(&self.service_provider) {
            Some(_) if protocol == ProtocolVersion::Saml11 => {
                tracing::debug!("SAML 1.1 assertions are not encrypted");
                None
            }
            other => other,
        };

        let payload = if let Some((credential, algorithm)) = encryption {
            let encrypted = self.capabilities.encrypter.encrypt(
                &assertion,
                &credential,
                &algorithm,
                Some(self.service_provider.entity_id()),
            )?;
            AssertionPayload::Encrypted(encrypted)
        } else {
            if let Some(credential) = &self.signing_credential {
                self.capabilities.signer.sign_assertion(&mut assertion, credential)?;
            }
            AssertionPayload::Plain(Box::new(assertion.clone()))
        };

        let mut response = Response::success(
            protocol,
            (protocol == ProtocolVersion::Saml20).then(|| context.issuer.to_string()),
        )
        .with_destination(destination.as_str())
        .with_payload(payload);
        response.in_response_to.clone_from(&request.in_response_to);
        if let Some(credential) = &self.signing_credential {
            self.capabilities.signer.sign_response(&mut response, credential)?;
        }

        let xml = self.codec.encode_response(&response)?;
        tracing::debug!(
            response_id = %response.id,
            assertion_id = %assertion.id,
            destination = %destination,
            "response produced"
        );

        Ok(ProducedResponse {
            response,
            assertion,
            xml,
            destination,
        })
    }
}
