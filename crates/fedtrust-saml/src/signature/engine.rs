use fedtrust_crypto::{hash, DigestAlgorithm, PrivateCredential, PublicCredential, SignatureAlgorithm};

use super::{Signable, SignatureKeyInfo, SignatureRecord, TrustAnchor};
use crate::error::{SamlError, SamlResult};
use crate::types::EXCLUSIVE_C14N;

/// Creates and validates enveloped signatures.
///
/// The engine holds no state. Every call builds its own key objects, so one
/// value can be shared freely between concurrent callers.
#[derive(Debug, Clone, Copy, Default)]
pub struct SignatureEngine;

impl SignatureEngine {
    /// Creates an engine.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Computes a signature over `target` without attaching it.
    ///
    /// The algorithm follows the key family of `credential`. `KeyInfo`
    /// carries the signer's certificate, or its public key when no
    /// certificate is attached.
    ///
    /// # Errors
    ///
    /// Returns `SignatureEngine` if the target cannot be serialized or the
    /// key cannot sign.
    pub fn sign<S: Signable + ?Sized>(
        &self,
        target: &S,
        credential: &PrivateCredential,
    ) -> SamlResult<SignatureRecord> {
        let algorithm = credential.signature_algorithm();
        let digest_algorithm = algorithm.digest();
        let content = target.canonical_content()?;

        let key_info = match credential.certificate_der() {
            Some(der) => SignatureKeyInfo::Certificate(der.to_vec()),
            None => SignatureKeyInfo::PublicKey(credential.public_credential().spki_der().to_vec()),
        };

        let mut record = SignatureRecord {
            algorithm: algorithm.uri().to_string(),
            canonicalization: EXCLUSIVE_C14N.to_string(),
            reference_uri: format!("#{}", target.signable_id()),
            digest_algorithm: digest_algorithm.uri().to_string(),
            digest_value: hash::digest(digest_algorithm, &content),
            signature_value: Vec::new(),
            key_info: Some(key_info),
        };
        record.signature_value =
            fedtrust_crypto::signature::sign(credential, algorithm, &record.signed_info())?;

        tracing::debug!(
            reference = %record.reference_uri,
            algorithm = %record.algorithm,
            "signature created"
        );
        Ok(record)
    }

    /// Signs `target` and attaches the signature, replacing any existing one.
    ///
    /// # Errors
    ///
    /// See [`SignatureEngine::sign`].
    pub fn sign_in_place<S: Signable + ?Sized>(
        &self,
        target: &mut S,
        credential: &PrivateCredential,
    ) -> SamlResult<()> {
        let record = self.sign(&*target, credential)?;
        target.set_signature(record);
        Ok(())
    }

    /// Validates the signature attached to `target` against trusted keys.
    ///
    /// Returns `Ok(false)` when the digest or the signature value does not
    /// match, or when no trusted key verifies it. Key material embedded in
    /// the signature is never trusted by itself.
    ///
    /// # Errors
    ///
    /// Returns `SignatureEngine` when the target carries no signature or the
    /// signature is structurally unusable, and `UnknownIssuer` when the
    /// resolver does not know the signer.
    pub fn validate<S: Signable + ?Sized>(
        &self,
        target: &S,
        anchor: TrustAnchor<'_>,
    ) -> SamlResult<bool> {
        let record = target.signature().ok_or_else(|| {
            SamlError::SignatureEngine(format!(
                "{} claims to be signed but carries no signature",
                target.signable_id()
            ))
        })?;
        let (algorithm, digest_algorithm) = check_structure(target, record)?;

        let credentials = trusted_credentials(anchor)?;
        if credentials.is_empty() {
            tracing::debug!(reference = %record.reference_uri, "no trusted signing key");
            return Ok(false);
        }

        let content = target.canonical_content()?;
        let digest = hash::digest(digest_algorithm, &content);
        if !hash::digests_equal(&digest, &record.digest_value) {
            tracing::debug!(reference = %record.reference_uri, "digest mismatch");
            return Ok(false);
        }

        let signed_info = record.signed_info();
        let valid = credentials.iter().any(|credential| {
            fedtrust_crypto::signature::verify(
                credential,
                algorithm,
                &signed_info,
                &record.signature_value,
            )
        });

        if valid {
            if let Some(embedded) = record.embedded_credential() {
                if !credentials.iter().any(|c| c.same_key(&embedded)) {
                    tracing::debug!(
                        key_id = %embedded.key_id(),
                        "embedded key differs from the trusted key"
                    );
                }
            }
        } else {
            tracing::debug!(reference = %record.reference_uri, "signature value mismatch");
        }
        Ok(valid)
    }
}

fn check_structure<S: Signable + ?Sized>(
    target: &S,
    record: &SignatureRecord,
) -> SamlResult<(SignatureAlgorithm, DigestAlgorithm)> {
    if record.signature_value.is_empty() {
        return Err(SamlError::SignatureEngine("signature has no value".to_string()));
    }
    if record.canonicalization != EXCLUSIVE_C14N {
        return Err(SamlError::SignatureEngine(format!(
            "unsupported canonicalization: {}",
            record.canonicalization
        )));
    }
    let expected = format!("#{}", target.signable_id());
    if record.reference_uri != expected {
        return Err(SamlError::SignatureEngine(format!(
            "reference {} does not point at {expected}",
            record.reference_uri
        )));
    }
    let algorithm = SignatureAlgorithm::from_uri(&record.algorithm)?;
    let digest_algorithm = DigestAlgorithm::from_uri(&record.digest_algorithm).ok_or_else(|| {
        SamlError::SignatureEngine(format!(
            "unsupported digest algorithm: {}",
            record.digest_algorithm
        ))
    })?;
    Ok((algorithm, digest_algorithm))
}

fn trusted_credentials(anchor: TrustAnchor<'_>) -> SamlResult<Vec<PublicCredential>> {
    match anchor {
        TrustAnchor::Credential(credential) => Ok(vec![credential.clone()]),
        TrustAnchor::Resolver(resolver, criteria) => {
            resolver
                .resolve_credentials(criteria)
                .map_err(|err| match err {
                    SamlError::TrustResolution(msg) => SamlError::UnknownIssuer(msg),
                    other => other,
                })
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};
    use fedtrust_crypto::KeyFamily;

    use super::*;
    use crate::codec::{AssertionCodec, XmlAssertionCodec};
    use crate::metadata::KeyUse;
    use crate::signature::{CredentialCriteria, CredentialResolver};
    use crate::types::{
        Assertion, AssertionPayload, EntityRole, ProtocolVersion, Response, Subject, Validity,
    };

    struct StaticResolver(Vec<PublicCredential>);

    impl CredentialResolver for StaticResolver {
        fn resolve_credentials(
            &self,
            criteria: &CredentialCriteria,
        ) -> SamlResult<Vec<PublicCredential>> {
            if criteria.entity_id == "https://idp.example.com" && criteria.usage == KeyUse::Signing
            {
                Ok(self.0.clone())
            } else {
                Err(SamlError::TrustResolution(criteria.entity_id.clone()))
            }
        }
    }

    fn assertion() -> Assertion {
        let now = Utc::now();
        Assertion::new("https://idp.example.com", ProtocolVersion::Saml20)
            .with_subject(Subject::bearer("189502", ProtocolVersion::Saml20))
            .with_validity(Validity::new(now, now + Duration::minutes(30)).unwrap())
            .with_attribute("role", "admin")
    }

    fn rsa_key() -> PrivateCredential {
        PrivateCredential::generate_rsa(2048).unwrap()
    }

    #[test]
    fn sign_then_validate_rsa() {
        let engine = SignatureEngine::new();
        let key = rsa_key();
        let mut target = assertion();
        engine.sign_in_place(&mut target, &key).unwrap();

        let record = target.signature.as_ref().unwrap();
        assert_eq!(record.algorithm, SignatureAlgorithm::RsaSha256.uri());
        assert_eq!(record.reference_uri, format!("#{}", target.id));
        assert!(matches!(record.key_info, Some(SignatureKeyInfo::PublicKey(_))));

        let trusted = key.public_credential();
        assert!(engine.validate(&target, TrustAnchor::Credential(trusted)).unwrap());
    }

    #[test]
    fn algorithm_follows_key_family() {
        let engine = SignatureEngine::new();
        for (family, expected) in [
            (KeyFamily::EcP256, SignatureAlgorithm::EcdsaSha256),
            (KeyFamily::EcP384, SignatureAlgorithm::EcdsaSha384),
        ] {
            let key = PrivateCredential::generate(family).unwrap();
            let mut target = assertion();
            engine.sign_in_place(&mut target, &key).unwrap();
            assert_eq!(target.signature.as_ref().unwrap().algorithm, expected.uri());
            assert!(engine
                .validate(&target, TrustAnchor::Credential(key.public_credential()))
                .unwrap());
        }
    }

    #[test]
    fn tampered_content_is_invalid_not_error() {
        let engine = SignatureEngine::new();
        let key = PrivateCredential::generate(KeyFamily::EcP256).unwrap();
        let mut target = assertion();
        engine.sign_in_place(&mut target, &key).unwrap();

        target.attributes[0].1 = "root".to_string();
        assert!(!engine
            .validate(&target, TrustAnchor::Credential(key.public_credential()))
            .unwrap());
    }

    #[test]
    fn flipped_bit_in_wire_form_is_invalid() {
        let engine = SignatureEngine::new();
        let codec = XmlAssertionCodec;
        let key = PrivateCredential::generate(KeyFamily::EcP256).unwrap();
        let mut target = assertion();
        engine.sign_in_place(&mut target, &key).unwrap();

        let xml = codec.encode_assertion(&target).unwrap();
        let tampered = xml.replacen("189502", "189503", 1);
        let decoded = codec.decode_assertion(&tampered).unwrap();
        assert!(!engine
            .validate(&decoded, TrustAnchor::Credential(key.public_credential()))
            .unwrap());

        let untouched = codec.decode_assertion(&xml).unwrap();
        assert!(engine
            .validate(&untouched, TrustAnchor::Credential(key.public_credential()))
            .unwrap());
    }

    #[test]
    fn wrong_key_is_invalid() {
        let engine = SignatureEngine::new();
        let signer = PrivateCredential::generate(KeyFamily::EcP256).unwrap();
        let other = PrivateCredential::generate(KeyFamily::EcP256).unwrap();
        let mut target = assertion();
        engine.sign_in_place(&mut target, &signer).unwrap();
        assert!(!engine
            .validate(&target, TrustAnchor::Credential(other.public_credential()))
            .unwrap());
    }

    #[test]
    fn missing_signature_is_structural() {
        let engine = SignatureEngine::new();
        let key = PrivateCredential::generate(KeyFamily::EcP256).unwrap();
        let err = engine
            .validate(&assertion(), TrustAnchor::Credential(key.public_credential()))
            .unwrap_err();
        assert!(matches!(err, SamlError::SignatureEngine(_)));
    }

    #[test]
    fn structural_defects_are_errors() {
        let engine = SignatureEngine::new();
        let key = PrivateCredential::generate(KeyFamily::EcP256).unwrap();
        let mut signed = assertion();
        engine.sign_in_place(&mut signed, &key).unwrap();
        let anchor = TrustAnchor::Credential(key.public_credential());

        let mut moved = signed.clone();
        moved.id = "_elsewhere".to_string();
        assert!(matches!(
            engine.validate(&moved, anchor),
            Err(SamlError::SignatureEngine(_))
        ));

        let mut sha1 = signed.clone();
        if let Some(sig) = sha1.signature.as_mut() {
            sig.algorithm = "http://www.w3.org/2000/09/xmldsig#rsa-sha1".to_string();
        }
        assert!(matches!(
            engine.validate(&sha1, anchor),
            Err(SamlError::SignatureEngine(_))
        ));

        let mut inclusive = signed.clone();
        if let Some(sig) = inclusive.signature.as_mut() {
            sig.canonicalization = "http://www.w3.org/TR/2001/REC-xml-c14n-20010315".to_string();
        }
        assert!(matches!(
            engine.validate(&inclusive, anchor),
            Err(SamlError::SignatureEngine(_))
        ));

        let mut empty = signed;
        if let Some(sig) = empty.signature.as_mut() {
            sig.signature_value.clear();
        }
        assert!(matches!(
            engine.validate(&empty, anchor),
            Err(SamlError::SignatureEngine(_))
        ));
    }

    #[test]
    fn resolver_trust_allows_key_rollover() {
        let engine = SignatureEngine::new();
        let old = PrivateCredential::generate(KeyFamily::EcP256).unwrap();
        let new = PrivateCredential::generate(KeyFamily::EcP256).unwrap();
        let resolver = StaticResolver(vec![
            old.public_credential().clone(),
            new.public_credential().clone(),
        ]);
        let mut target = assertion();
        engine.sign_in_place(&mut target, &new).unwrap();

        let criteria = CredentialCriteria::signing("https://idp.example.com", EntityRole::IdentityProvider);
        assert!(engine
            .validate(&target, TrustAnchor::Resolver(&resolver, &criteria))
            .unwrap());

        let unknown = CredentialCriteria::signing("https://rogue.example.com", EntityRole::IdentityProvider);
        assert!(matches!(
            engine.validate(&target, TrustAnchor::Resolver(&resolver, &unknown)),
            Err(SamlError::UnknownIssuer(_))
        ));
    }

    #[test]
    fn response_signature_covers_nested_assertion() {
        let engine = SignatureEngine::new();
        let key = PrivateCredential::generate(KeyFamily::EcP256).unwrap();
        let mut response = Response::success(
            ProtocolVersion::Saml20,
            Some("https://idp.example.com".to_string()),
        )
        .with_payload(AssertionPayload::Plain(Box::new(assertion())));
        engine.sign_in_place(&mut response, &key).unwrap();
        let anchor = TrustAnchor::Credential(key.public_credential());
        assert!(engine.validate(&response, anchor).unwrap());

        if let Some(AssertionPayload::Plain(inner)) = response.payload.as_mut() {
            inner.subject = None;
        }
        assert!(!engine.validate(&response, anchor).unwrap());
    }
}
