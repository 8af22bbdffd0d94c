//! Raw signature creation and verification.
//!
//! These functions operate on bytes that the caller has already
//! canonicalized. ECDSA signatures use the fixed-width `r || s` encoding
//! XML-DSig requires.

use aws_lc_rs::{
    rand::SystemRandom,
    signature::{self, EcdsaKeyPair, RsaKeyPair, UnparsedPublicKey, VerificationAlgorithm},
};

use crate::algorithm::{KeyFamily, SignatureAlgorithm};
use crate::error::{CryptoError, CryptoResult};
use crate::keys::{PrivateCredential, PublicCredential};

/// Signs `data` with `credential` using `algorithm`.
///
/// # Errors
///
/// Returns `UnsupportedAlgorithm` if the algorithm does not fit the key
/// family, and `Signing` if the key cannot be loaded or signing fails.
pub fn sign(
    credential: &PrivateCredential,
    algorithm: SignatureAlgorithm,
    data: &[u8],
) -> CryptoResult<Vec<u8>> {
    if !algorithm.matches_family(credential.family()) {
        return Err(CryptoError::UnsupportedAlgorithm(format!(
            "{algorithm:?} cannot be used with a {:?} key",
            credential.family()
        )));
    }

    let rng = SystemRandom::new();
    match credential.family() {
        KeyFamily::Rsa => {
            let key_pair = RsaKeyPair::from_pkcs8(credential.pkcs8_der())
                .map_err(|e| CryptoError::Signing(format!("RSA key rejected: {e}")))?;
            let padding = match algorithm {
                SignatureAlgorithm::RsaSha384 => &signature::RSA_PKCS1_SHA384,
                SignatureAlgorithm::RsaSha512 => &signature::RSA_PKCS1_SHA512,
                _ => &signature::RSA_PKCS1_SHA256,
            };
            let mut sig = vec![0u8; key_pair.public_modulus_len()];
            key_pair
                .sign(padding, &rng, data, &mut sig)
                .map_err(|_| CryptoError::Signing("RSA signing failed".to_string()))?;
            Ok(sig)
        }
        KeyFamily::EcP256 | KeyFamily::EcP384 => {
            let alg = if credential.family() == KeyFamily::EcP256 {
                &signature::ECDSA_P256_SHA256_FIXED_SIGNING
            } else {
                &signature::ECDSA_P384_SHA384_FIXED_SIGNING
            };
            let key_pair = EcdsaKeyPair::from_pkcs8(alg, credential.pkcs8_der())
                .map_err(|e| CryptoError::Signing(format!("EC key rejected: {e}")))?;
            let sig = key_pair
                .sign(&rng, data)
                .map_err(|_| CryptoError::Signing("ECDSA signing failed".to_string()))?;
            Ok(sig.as_ref().to_vec())
        }
    }
}

/// Verifies `sig` over `data` with `credential`.
///
/// Returns `false` for a bad signature and for an algorithm that does not
/// fit the key family; neither is an error.
#[must_use]
pub fn verify(
    credential: &PublicCredential,
    algorithm: SignatureAlgorithm,
    data: &[u8],
    sig: &[u8],
) -> bool {
    if !algorithm.matches_family(credential.family()) {
        tracing::debug!(
            ?algorithm,
            family = ?credential.family(),
            "signature algorithm does not match key family"
        );
        return false;
    }

    let alg: &'static dyn VerificationAlgorithm = match algorithm {
        SignatureAlgorithm::RsaSha256 => &signature::RSA_PKCS1_2048_8192_SHA256,
        SignatureAlgorithm::RsaSha384 => &signature::RSA_PKCS1_2048_8192_SHA384,
        SignatureAlgorithm::RsaSha512 => &signature::RSA_PKCS1_2048_8192_SHA512,
        SignatureAlgorithm::EcdsaSha256 => &signature::ECDSA_P256_SHA256_FIXED,
        SignatureAlgorithm::EcdsaSha384 => &signature::ECDSA_P384_SHA384_FIXED,
    };

    UnparsedPublicKey::new(alg, credential.raw_public_key())
        .verify(data, sig)
        .is_ok()
}
