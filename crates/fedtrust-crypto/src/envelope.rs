//! Hybrid envelope encryption.
//!
//! A fresh AES-GCM session key encrypts the payload; the session key is then
//! wrapped with the recipient's RSA public key using OAEP.
//!
//! Payload ciphertext layout: `IV (12 bytes) || ciphertext || tag (16 bytes)`.
//!
//! ## Decryption
//!
//! [`EncryptedEnvelope::decrypt`] never reveals which stage failed. When the
//! session key cannot be unwrapped, a random substitute key of the right
//! length is used and payload decryption runs anyway, so every failure ends
//! in the same [`CryptoError::Decryption`].

use aws_lc_rs::{
    aead::{Aad, LessSafeKey, Nonce, UnboundKey, AES_128_GCM, AES_256_GCM, NONCE_LEN},
    rsa::{
        OaepAlgorithm, OaepPrivateDecryptingKey, OaepPublicEncryptingKey, PrivateDecryptingKey,
        PublicEncryptingKey, OAEP_SHA1_MGF1SHA1, OAEP_SHA256_MGF1SHA256,
    },
};
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

use crate::algorithm::{DataEncryptionAlgorithm, KeyFamily, KeyTransportAlgorithm};
use crate::error::{CryptoError, CryptoResult};
use crate::keys::{PrivateCredential, PublicCredential};
use crate::random::secure_bytes;

const TAG_LEN: usize = 16;

/// An encrypted payload with its wrapped session key.
#[derive(Debug, Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct EncryptedEnvelope {
    /// Algorithm that wrapped the session key.
    #[zeroize(skip)]
    pub key_transport: KeyTransportAlgorithm,
    /// The wrapped session key.
    pub wrapped_key: Vec<u8>,
    /// Algorithm that encrypted the payload.
    #[zeroize(skip)]
    pub data_encryption: DataEncryptionAlgorithm,
    /// `IV || ciphertext || tag`.
    pub ciphertext: Vec<u8>,
}

impl EncryptedEnvelope {
    /// Encrypts `plaintext` for `recipient`.
    ///
    /// # Errors
    ///
    /// Returns `Encryption` if the recipient key cannot transport keys or any
    /// cryptographic step fails.
    pub fn encrypt(
        plaintext: &[u8],
        recipient: &PublicCredential,
        key_transport: KeyTransportAlgorithm,
        data_encryption: DataEncryptionAlgorithm,
    ) -> CryptoResult<Self> {
        let session_key = Zeroizing::new(secure_bytes(data_encryption.key_len())?);
        let ciphertext = seal_payload(data_encryption, &session_key, plaintext)?;
        let wrapped_key = wrap_key(recipient, key_transport, &session_key)?;

        tracing::debug!(
            recipient = %recipient.key_id(),
            key_transport = key_transport.uri(),
            data_encryption = data_encryption.uri(),
            "payload encrypted"
        );

        Ok(Self {
            key_transport,
            wrapped_key,
            data_encryption,
            ciphertext,
        })
    }

    /// Decrypts the envelope with `recipient`'s private key.
    ///
    /// The envelope is consumed and its buffers zeroized.
    ///
    /// # Errors
    ///
    /// Returns the opaque `Decryption` error on any failure.
    pub fn decrypt(self, recipient: &PrivateCredential) -> CryptoResult<Zeroizing<Vec<u8>>> {
        let key_len = self.data_encryption.key_len();
        let session_key = match unwrap_key(recipient, self.key_transport, &self.wrapped_key) {
            Some(key) if key.len() == key_len => key,
            _ => Zeroizing::new(secure_bytes(key_len).map_err(|_| CryptoError::Decryption)?),
        };
        open_payload(self.data_encryption, &session_key, &self.ciphertext)
    }
}

fn oaep_algorithm(key_transport: KeyTransportAlgorithm) -> &'static OaepAlgorithm {
    match key_transport {
        KeyTransportAlgorithm::RsaOaepMgf1p => &OAEP_SHA1_MGF1SHA1,
        KeyTransportAlgorithm::RsaOaep => &OAEP_SHA256_MGF1SHA256,
    }
}

fn aead_key(algorithm: DataEncryptionAlgorithm, key: &[u8]) -> Option<LessSafeKey> {
    let alg = match algorithm {
        DataEncryptionAlgorithm::Aes128Gcm => &AES_128_GCM,
        DataEncryptionAlgorithm::Aes256Gcm => &AES_256_GCM,
    };
    UnboundKey::new(alg, key).ok().map(LessSafeKey::new)
}

/// Encrypts `plaintext` with a session key.
///
/// # Errors
///
/// Returns `Encryption` if the key length is wrong or sealing fails.
pub fn seal_payload(
    algorithm: DataEncryptionAlgorithm,
    session_key: &[u8],
    plaintext: &[u8],
) -> CryptoResult<Vec<u8>> {
    let key = aead_key(algorithm, session_key)
        .ok_or_else(|| CryptoError::Encryption("invalid session key".to_string()))?;
    let iv = secure_bytes(NONCE_LEN)?;
    let nonce = Nonce::try_assume_unique_for_key(&iv)
        .map_err(|_| CryptoError::Encryption("invalid IV".to_string()))?;

    let mut in_out = plaintext.to_vec();
    key.seal_in_place_append_tag(nonce, Aad::empty(), &mut in_out)
        .map_err(|_| CryptoError::Encryption("payload encryption failed".to_string()))?;

    let mut out = Vec::with_capacity(NONCE_LEN + in_out.len());
    out.extend_from_slice(&iv);
    out.extend_from_slice(&in_out);
    Ok(out)
}

/// Decrypts `IV || ciphertext || tag` with a session key.
///
/// # Errors
///
/// Returns the opaque `Decryption` error on any failure.
pub fn open_payload(
    algorithm: DataEncryptionAlgorithm,
    session_key: &[u8],
    ciphertext: &[u8],
) -> CryptoResult<Zeroizing<Vec<u8>>> {
    if ciphertext.len() < NONCE_LEN + TAG_LEN {
        return Err(CryptoError::Decryption);
    }
    let key = aead_key(algorithm, session_key).ok_or(CryptoError::Decryption)?;
    let (iv, body) = ciphertext.split_at(NONCE_LEN);
    let nonce = Nonce::try_assume_unique_for_key(iv).map_err(|_| CryptoError::Decryption)?;

    let mut in_out = Zeroizing::new(body.to_vec());
    let plaintext_len = key
        .open_in_place(nonce, Aad::empty(), &mut in_out)
        .map_err(|_| CryptoError::Decryption)?
        .len();
    in_out.truncate(plaintext_len);
    Ok(in_out)
}

/// Wraps a session key with the recipient's RSA public key.
///
/// # Errors
///
/// Returns `Encryption` if the recipient is not an RSA key or wrapping fails.
pub fn wrap_key(
    recipient: &PublicCredential,
    key_transport: KeyTransportAlgorithm,
    session_key: &[u8],
) -> CryptoResult<Vec<u8>> {
    if recipient.family() != KeyFamily::Rsa {
        return Err(CryptoError::Encryption(format!(
            "{:?} keys cannot wrap session keys",
            recipient.family()
        )));
    }
    let public = PublicEncryptingKey::from_der(recipient.spki_der())
        .map_err(|_| CryptoError::Encryption("recipient key rejected".to_string()))?;
    let oaep = OaepPublicEncryptingKey::new(public)
        .map_err(|_| CryptoError::Encryption("recipient key rejected".to_string()))?;

    let mut out = vec![0u8; oaep.ciphertext_size()];
    let len = oaep
        .encrypt(oaep_algorithm(key_transport), session_key, &mut out, None)
        .map_err(|_| CryptoError::Encryption("key transport failed".to_string()))?
        .len();
    out.truncate(len);
    Ok(out)
}

/// Unwraps a session key. Returns `None` on any failure.
fn unwrap_key(
    recipient: &PrivateCredential,
    key_transport: KeyTransportAlgorithm,
    wrapped: &[u8],
) -> Option<Zeroizing<Vec<u8>>> {
    if recipient.family() != KeyFamily::Rsa {
        return None;
    }
    let private = PrivateDecryptingKey::from_pkcs8(recipient.pkcs8_der()).ok()?;
    let oaep = OaepPrivateDecryptingKey::new(private).ok()?;

    let mut out = Zeroizing::new(vec![0u8; oaep.min_output_size()]);
    let len = oaep
        .decrypt(oaep_algorithm(key_transport), wrapped, &mut out, None)
        .ok()?
        .len();
    out.truncate(len);
    Some(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rsa() -> PrivateCredential {
        PrivateCredential::generate(KeyFamily::Rsa).unwrap()
    }

    #[test]
    fn encrypt_then_decrypt_restores_payload() {
        let key = rsa();
        for (kt, de) in [
            (KeyTransportAlgorithm::RsaOaepMgf1p, DataEncryptionAlgorithm::Aes128Gcm),
            (KeyTransportAlgorithm::RsaOaep, DataEncryptionAlgorithm::Aes256Gcm),
        ] {
            let envelope =
                EncryptedEnvelope::encrypt(b"<Assertion/>", key.public_credential(), kt, de)
                    .unwrap();
            assert_eq!(envelope.ciphertext.len(), NONCE_LEN + 12 + TAG_LEN);
            let plaintext = envelope.decrypt(&key).unwrap();
            assert_eq!(plaintext.as_slice(), b"<Assertion/>");
        }
    }

    #[test]
    fn wrong_key_fails_opaquely() {
        let sp = rsa();
        let idp = rsa();
        let envelope = EncryptedEnvelope::encrypt(
            b"secret",
            sp.public_credential(),
            KeyTransportAlgorithm::RsaOaepMgf1p,
            DataEncryptionAlgorithm::Aes128Gcm,
        )
        .unwrap();
        let err = envelope.decrypt(&idp).unwrap_err();
        assert!(matches!(err, CryptoError::Decryption));
    }

    #[test]
    fn tampered_payload_fails_with_same_error() {
        let key = rsa();
        let mut envelope = EncryptedEnvelope::encrypt(
            b"secret",
            key.public_credential(),
            KeyTransportAlgorithm::RsaOaepMgf1p,
            DataEncryptionAlgorithm::Aes128Gcm,
        )
        .unwrap();
        let last = envelope.ciphertext.len() - 1;
        envelope.ciphertext[last] ^= 0x01;
        assert_eq!(
            envelope.decrypt(&key).unwrap_err().to_string(),
            CryptoError::Decryption.to_string()
        );
    }

    #[test]
    fn algorithm_mismatch_fails() {
        let key = rsa();
        let mut envelope = EncryptedEnvelope::encrypt(
            b"secret",
            key.public_credential(),
            KeyTransportAlgorithm::RsaOaepMgf1p,
            DataEncryptionAlgorithm::Aes128Gcm,
        )
        .unwrap();
        envelope.key_transport = KeyTransportAlgorithm::RsaOaep;
        assert!(matches!(envelope.decrypt(&key), Err(CryptoError::Decryption)));
    }

    #[test]
    fn ec_recipient_cannot_receive() {
        let key = PrivateCredential::generate(KeyFamily::EcP256).unwrap();
        let err = EncryptedEnvelope::encrypt(
            b"x",
            key.public_credential(),
            KeyTransportAlgorithm::RsaOaepMgf1p,
            DataEncryptionAlgorithm::Aes128Gcm,
        )
        .unwrap_err();
        assert!(matches!(err, CryptoError::Encryption(_)));
    }

    #[test]
    fn truncated_ciphertext_is_rejected() {
        assert!(open_payload(DataEncryptionAlgorithm::Aes128Gcm, &[0u8; 16], &[0u8; 10]).is_err());
    }
}
