//! Producer to consumer flows across both protocol versions.

use std::sync::Arc;

use chrono::{Duration, Utc};
use fedtrust_core::{AuditCode, AuditOutcome};
use fedtrust_crypto::{DataEncryptionAlgorithm, PrivateCredential};
use fedtrust_saml::pipeline::{AssertionRequest, CapabilitySet, Encrypts};
use fedtrust_saml::{AssertionEncrypter, AssertionPayload, KeyPlacement, ProtocolVersion, SamlError};

use crate::common::{rogue_producer, TestEnv, ACS, IDP, PARTNER_IDP, SP};

fn request() -> AssertionRequest {
    AssertionRequest::new("189502")
        .with_window(Utc::now(), Duration::minutes(30))
        .with_attribute("mail", "jane@example.com")
}

/// An encrypted SAML 2.0 response is accepted once and audited once.
#[tokio::test]
async fn test_encrypted_round_trip() -> anyhow::Result<()> {
    let env = TestEnv::new(ProtocolVersion::Saml20, true).await?;
    let producer = env.producer().await?;
    let consumer = env.consumer().await?;

    let produced = producer.produce(&request())?;
    assert_eq!(produced.destination, ACS);
    assert!(matches!(
        produced.response.payload,
        Some(AssertionPayload::Encrypted(_))
    ));
    assert!(!produced.xml.contains("jane@example.com"));

    let accepted = consumer.consume_xml(&produced.xml).await?;
    assert_eq!(accepted.issuer.as_deref(), Some(IDP));
    assert_eq!(
        accepted.subject.as_ref().map(|s| s.identifier.as_str()),
        Some("189502")
    );
    assert_eq!(accepted.attribute("mail"), Some("jane@example.com"));

    let events = env.audit.events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].code, AuditCode::ValidAssertionAccepted);
    assert_eq!(events[0].outcome, AuditOutcome::Success);
    assert_eq!(events[0].detail, "valid assertion accepted");
    assert_eq!(events[0].actor_idp, IDP);
    assert_eq!(events[0].actor_sp, SP);
    Ok(())
}

/// The same response presented after its window has closed is rejected.
#[tokio::test]
async fn test_expired_response_is_rejected() -> anyhow::Result<()> {
    let env = TestEnv::new(ProtocolVersion::Saml20, true).await?;
    let produced = env.producer().await?.produce(&request())?;
    let consumer = env.consumer().await?;

    let later = Utc::now() + Duration::minutes(31);
    let err = consumer
        .consume_at(&produced.response, later)
        .await
        .unwrap_err();
    assert!(matches!(err, SamlError::ExpiredOrPremature(_)));

    let events = env.audit.events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].code, AuditCode::ExpiredOrPremature);
    assert_eq!(events[0].outcome, AuditOutcome::Error);
    Ok(())
}

/// A consumer holding the wrong private key cannot open the assertion.
#[tokio::test]
async fn test_wrong_decryption_key() -> anyhow::Result<()> {
    let env = TestEnv::new(ProtocolVersion::Saml20, true).await?;
    let produced = env.producer().await?.produce(&request())?;

    let other_key = PrivateCredential::generate_rsa(2048)?;
    let consumer = env.consumer_with_key(Some(other_key)).await?;
    let err = consumer.consume_xml(&produced.xml).await.unwrap_err();
    assert!(matches!(err, SamlError::Decryption));
    assert_eq!(env.audit.events()[0].code, AuditCode::DecryptionFailed);
    Ok(())
}

/// A response from an identity provider absent from metadata is refused.
#[tokio::test]
async fn test_unknown_issuer() -> anyhow::Result<()> {
    let env = TestEnv::new(ProtocolVersion::Saml20, true).await?;
    let produced = rogue_producer(&env).await?.produce(&request())?;

    let consumer = env.consumer().await?;
    let err = consumer.consume_xml(&produced.xml).await.unwrap_err();
    assert!(matches!(err, SamlError::UnknownIssuer(_)));

    let events = env.audit.events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].outcome, AuditOutcome::Error);
    Ok(())
}

/// A response is accepted once; presenting it again is a replay.
#[tokio::test]
async fn test_replayed_response() -> anyhow::Result<()> {
    let env = TestEnv::new(ProtocolVersion::Saml20, false).await?;
    let produced = env.producer().await?.produce(&request())?;
    let consumer = env.consumer().await?;

    consumer.consume_xml(&produced.xml).await?;
    let err = consumer.consume_xml(&produced.xml).await.unwrap_err();
    assert!(matches!(err, SamlError::ReplayDetected(_)));
    assert_eq!(env.audit.len(), 2);
    Ok(())
}

/// SAML 1.1 responses are signed but never encrypted, even when the
/// service provider publishes an encryption key.
#[tokio::test]
async fn test_saml11_round_trip() -> anyhow::Result<()> {
    let env = TestEnv::new(ProtocolVersion::Saml11, true).await?;
    let produced = env.producer().await?.produce(&request())?;
    assert!(matches!(
        produced.response.payload,
        Some(AssertionPayload::Plain(_))
    ));
    assert!(produced.assertion.signature.is_some());

    let accepted = env.consumer().await?.consume_xml(&produced.xml).await?;
    assert_eq!(accepted.protocol, ProtocolVersion::Saml11);
    assert_eq!(accepted, produced.assertion);
    Ok(())
}

/// A SAML 1.1 consumer refuses a SAML 2.0 response.
#[tokio::test]
async fn test_protocol_mismatch() -> anyhow::Result<()> {
    let saml20 = TestEnv::new(ProtocolVersion::Saml20, false).await?;
    let produced = saml20.producer().await?.produce(&request())?;

    let saml11 = TestEnv::new(ProtocolVersion::Saml11, false).await?;
    let err = saml11
        .consumer()
        .await?
        .consume(&produced.response)
        .await
        .unwrap_err();
    assert!(matches!(err, SamlError::InvalidAssertion(_)));
    Ok(())
}

/// A peer code selects a registered encrypter in place of the configured one.
#[tokio::test]
async fn test_peer_specific_encrypter() -> anyhow::Result<()> {
    let mut env = TestEnv::new(ProtocolVersion::Saml20, true).await?;
    env.context.config.identity_provider.peer_code = Some("acme".to_string());
    env.context.registry.register_encrypter("ACME", || {
        Arc::new(AssertionEncrypter::new(
            DataEncryptionAlgorithm::Aes256Gcm,
            KeyPlacement::Peer,
        )) as Arc<dyn Encrypts>
    });

    let produced = env.producer().await?.produce(&request())?;
    let Some(AssertionPayload::Encrypted(encrypted)) = &produced.response.payload else {
        panic!("expected an encrypted assertion");
    };
    assert_eq!(encrypted.encrypted_keys.len(), 1);
    assert_eq!(
        encrypted.encrypted_data.algorithm,
        DataEncryptionAlgorithm::Aes256Gcm.uri()
    );

    let accepted = env.consumer().await?.consume_xml(&produced.xml).await?;
    assert_eq!(accepted, produced.assertion);
    Ok(())
}

/// A trusted identity provider cannot vouch for an unsigned assertion that
/// names another trusted identity provider.
#[tokio::test]
async fn test_assertion_issuer_bound_to_response_signer() -> anyhow::Result<()> {
    let env = TestEnv::new(ProtocolVersion::Saml20, false).await?;
    env.add_partner_idp(ProtocolVersion::Saml20).await?;
    let mut response = env.producer().await?.produce(&request())?.response;
    if let Some(AssertionPayload::Plain(assertion)) = &mut response.payload {
        assertion.issuer = Some(PARTNER_IDP.to_string());
        assertion.signature = None;
    }
    CapabilitySet::standard()
        .signer
        .sign_response(&mut response, &env.idp_key)?;

    let err = env.consumer().await?.consume(&response).await.unwrap_err();
    assert!(matches!(err, SamlError::UnknownIssuer(_)));

    let events = env.audit.events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].code, err.audit_code());
    assert_eq!(events[0].outcome, AuditOutcome::Error);
    Ok(())
}

/// Attribute values survive signing and parsing byte for byte.
#[tokio::test]
async fn test_attribute_values_round_trip_exactly() -> anyhow::Result<()> {
    for encrypt in [false, true] {
        let env = TestEnv::new(ProtocolVersion::Saml20, encrypt).await?;
        let request = AssertionRequest::new(" 189502 ")
            .with_window(Utc::now(), Duration::minutes(30))
            .with_attribute("displayName", "Jane Doe ")
            .with_attribute("nickname", " ")
            .with_attribute("note", "")
            .with_attribute("motto", "<a & b> \"quoted\" 'single'")
            .with_attribute("city", "Zürich 東京")
            .with_attribute("lines", "first\n  second\n");
        let produced = env.producer().await?.produce(&request)?;

        let accepted = env.consumer().await?.consume_xml(&produced.xml).await?;
        assert_eq!(accepted, produced.assertion);
        assert_eq!(accepted.attribute("displayName"), Some("Jane Doe "));
        assert_eq!(accepted.attribute("nickname"), Some(" "));
        assert_eq!(accepted.attribute("note"), Some(""));
        assert_eq!(
            accepted.subject.as_ref().map(|s| s.identifier.as_str()),
            Some(" 189502 ")
        );
    }
    Ok(())
}
