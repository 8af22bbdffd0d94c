//! Trust resolution from a metadata file.

use fedtrust_core::Config;
use fedtrust_saml::metadata::{FileMetadataSource, MetadataTrustResolver};
use fedtrust_saml::{ProtocolVersion, SamlBinding, SamlError};

use crate::common::{metadata, TestEnv, ACS, IDP, SP};

/// Entities, endpoints, and keys come from the configured metadata file.
#[tokio::test]
async fn test_resolves_from_file() -> anyhow::Result<()> {
    let env = TestEnv::new(ProtocolVersion::Saml20, true).await?;
    let resolver = env.context.resolver().await?;

    let sp = resolver.resolve_service_provider(SP, ProtocolVersion::Saml20)?;
    assert_eq!(resolver.resolve_endpoint(&sp, SamlBinding::HttpPost)?, ACS);
    let (credential, algorithm) = resolver
        .resolve_encryption_credential(&sp)
        .expect("service provider publishes an encryption key");
    assert!(credential.same_key(env.sp_key.public_credential()));
    assert_eq!(algorithm, env.context.config.crypto.key_transport_algorithm);

    let idp = resolver.resolve_identity_provider(IDP, ProtocolVersion::Saml20)?;
    assert!(resolver.resolve_signing_requirement(&idp));
    assert!(resolver.resolve_encryption_credential(&idp).is_none());

    assert!(matches!(
        resolver.resolve_identity_provider(IDP, ProtocolVersion::Saml11),
        Err(SamlError::TrustResolution(_))
    ));
    assert!(matches!(
        resolver.resolve_service_provider(IDP, ProtocolVersion::Saml20),
        Err(SamlError::TrustResolution(_))
    ));
    Ok(())
}

/// A refresh picks up a changed file; a broken file leaves the previous
/// snapshot in place.
#[tokio::test]
async fn test_refresh_from_file() -> anyhow::Result<()> {
    let env = TestEnv::new(ProtocolVersion::Saml20, false).await?;
    let resolver = env.context.resolver().await?;
    let sp = resolver.resolve_service_provider(SP, ProtocolVersion::Saml20)?;
    assert!(sp.encryption_credential().is_none());

    let updated = metadata(ProtocolVersion::Saml20, &env.idp_key, Some(&env.sp_key));
    tokio::fs::write(&env.metadata_path, updated.to_xml()).await?;
    resolver.refresh().await?;
    let sp = resolver.resolve_service_provider(SP, ProtocolVersion::Saml20)?;
    assert!(sp.encryption_credential().is_some());

    tokio::fs::write(&env.metadata_path, "<EntityDescriptor").await?;
    assert!(resolver.refresh().await.is_err());
    let sp = resolver.resolve_service_provider(SP, ProtocolVersion::Saml20)?;
    assert!(sp.encryption_credential().is_some());
    Ok(())
}

/// A missing metadata file fails the first load.
#[tokio::test]
async fn test_missing_metadata_file() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let source = FileMetadataSource::new(dir.path().join("absent.xml"));
    let err = MetadataTrustResolver::load(std::sync::Arc::new(source))
        .await
        .unwrap_err();
    assert!(matches!(err, SamlError::Metadata(_)));
    Ok(())
}

/// Conflicting metadata sources are rejected when the config is loaded.
#[test]
fn test_conflicting_metadata_sources() {
    let err = Config::from_toml_str(
        r#"
[metadata]
path = "metadata.xml"
url = "https://federation.example.com/metadata.xml"
"#,
    )
    .unwrap_err();
    assert!(err.to_string().contains("mutually exclusive"));
}
