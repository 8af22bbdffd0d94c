//! Signature validation of produced messages.

use chrono::{Duration, Utc};
use fedtrust_saml::codec::{AssertionCodec, XmlAssertionCodec};
use fedtrust_saml::pipeline::AssertionRequest;
use fedtrust_saml::signature::{CredentialCriteria, TrustAnchor};
use fedtrust_saml::{EntityRole, ProtocolVersion, SamlError, SignatureEngine};

use crate::common::{TestEnv, IDP, ROGUE_IDP};

/// A signed assertion validates against the published key and fails once a
/// single bit of its signature value is flipped.
#[tokio::test]
async fn test_flipped_signature_bit() -> anyhow::Result<()> {
    let env = TestEnv::new(ProtocolVersion::Saml20, false).await?;
    let produced = env
        .producer()
        .await?
        .produce(&AssertionRequest::new("189502").with_window(Utc::now(), Duration::minutes(30)))?;
    let engine = SignatureEngine::new();
    let trusted = env.idp_key.public_credential();

    let assertion = produced.assertion;
    assert!(engine.validate(&assertion, TrustAnchor::Credential(trusted))?);

    let mut tampered = assertion.clone();
    if let Some(signature) = tampered.signature.as_mut() {
        signature.signature_value[0] ^= 0x01;
    }
    assert!(!engine.validate(&tampered, TrustAnchor::Credential(trusted))?);

    let mut altered = assertion;
    altered.attributes.push(("role".into(), "admin".into()));
    assert!(!engine.validate(&altered, TrustAnchor::Credential(trusted))?);
    Ok(())
}

/// A response decoded from XML validates against keys resolved from the
/// metadata file.
#[tokio::test]
async fn test_response_validates_against_metadata() -> anyhow::Result<()> {
    let env = TestEnv::new(ProtocolVersion::Saml20, true).await?;
    let produced = env
        .producer()
        .await?
        .produce(&AssertionRequest::new("189502"))?;
    let response = XmlAssertionCodec.decode_response(&produced.xml)?;

    let resolver = env.context.resolver().await?;
    let engine = SignatureEngine::new();
    let criteria = CredentialCriteria::signing(IDP, EntityRole::IdentityProvider);
    assert!(engine.validate(&response, TrustAnchor::Resolver(resolver.as_ref(), &criteria))?);

    let rogue = CredentialCriteria::signing(ROGUE_IDP, EntityRole::IdentityProvider);
    let err = engine
        .validate(&response, TrustAnchor::Resolver(resolver.as_ref(), &rogue))
        .unwrap_err();
    assert!(matches!(err, SamlError::UnknownIssuer(_)));
    Ok(())
}

/// A key that is not published for the issuer does not validate its
/// signatures.
#[tokio::test]
async fn test_unpublished_key_is_not_trusted() -> anyhow::Result<()> {
    let env = TestEnv::new(ProtocolVersion::Saml20, false).await?;
    let produced = env
        .producer()
        .await?
        .produce(&AssertionRequest::new("189502"))?;

    let other = fedtrust_crypto::PrivateCredential::generate(fedtrust_crypto::KeyFamily::EcP256)?;
    let engine = SignatureEngine::new();
    assert!(!engine.validate(
        &produced.response,
        TrustAnchor::Credential(other.public_credential())
    )?);
    Ok(())
}
