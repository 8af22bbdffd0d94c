//! Assertion-level hybrid encryption.
//!
//! The serialized assertion is sealed with a fresh session key and the
//! session key is wrapped for the recipient. On the way back the wrapped key
//! is located through a chain of resolvers, since peers place it
//! differently. Every decryption failure surfaces as the same opaque
//! [`SamlError::Decryption`].

use fedtrust_core::config::KeyPlacementConfig;
use fedtrust_crypto::{
    random::generate_xml_id, DataEncryptionAlgorithm, EncryptedEnvelope, KeyTransportAlgorithm,
    PrivateCredential, PublicCredential,
};
use zeroize::Zeroizing;

use crate::codec;
use crate::error::{SamlError, SamlResult};
use crate::types::{Assertion, DataKeyInfo, EncryptedAssertion, EncryptedData, EncryptedKey};
use crate::xml::XmlElement;

// ============================================================================
// Key Placement
// ============================================================================

/// Where the producer puts the wrapped session key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum KeyPlacement {
    /// Inside `EncryptedData/KeyInfo`.
    #[default]
    Inline,
    /// In a sibling `EncryptedKey` referenced by `RetrievalMethod`.
    Peer,
}

impl From<KeyPlacementConfig> for KeyPlacement {
    fn from(config: KeyPlacementConfig) -> Self {
        match config {
            KeyPlacementConfig::Inline => Self::Inline,
            KeyPlacementConfig::Peer => Self::Peer,
        }
    }
}

/// Locates the `EncryptedKey` that wraps the session key.
pub trait EncryptedKeyResolver: Send + Sync {
    /// Returns the key meant for `recipient`, if this resolver finds one.
    fn resolve<'a>(
        &self,
        encrypted: &'a EncryptedAssertion,
        recipient: Option<&str>,
    ) -> Option<&'a EncryptedKey>;
}

/// Finds a key placed inline in `EncryptedData/KeyInfo`.
#[derive(Debug, Clone, Copy, Default)]
pub struct InlineKeyResolver;

impl EncryptedKeyResolver for InlineKeyResolver {
    fn resolve<'a>(
        &self,
        encrypted: &'a EncryptedAssertion,
        _recipient: Option<&str>,
    ) -> Option<&'a EncryptedKey> {
        match &encrypted.encrypted_data.key_info {
            Some(DataKeyInfo::Inline(key)) => Some(key),
            _ => None,
        }
    }
}

/// Follows a `RetrievalMethod` reference to a sibling key.
#[derive(Debug, Clone, Copy, Default)]
pub struct RetrievalMethodKeyResolver;

impl EncryptedKeyResolver for RetrievalMethodKeyResolver {
    fn resolve<'a>(
        &self,
        encrypted: &'a EncryptedAssertion,
        _recipient: Option<&str>,
    ) -> Option<&'a EncryptedKey> {
        let Some(DataKeyInfo::RetrievalMethod { uri }) = &encrypted.encrypted_data.key_info else {
            return None;
        };
        let id = uri.strip_prefix('#')?;
        encrypted
            .encrypted_keys
            .iter()
            .find(|k| k.id.as_deref() == Some(id))
    }
}

/// Picks a sibling key without an explicit reference: by `Recipient`, then
/// by `CarriedKeyName` against the data's `KeyName`, then the sole key.
#[derive(Debug, Clone, Copy, Default)]
pub struct SiblingKeyResolver;

impl EncryptedKeyResolver for SiblingKeyResolver {
    fn resolve<'a>(
        &self,
        encrypted: &'a EncryptedAssertion,
        recipient: Option<&str>,
    ) -> Option<&'a EncryptedKey> {
        let keys = &encrypted.encrypted_keys;
        if let Some(recipient) = recipient {
            if let Some(key) = keys.iter().find(|k| k.recipient.as_deref() == Some(recipient)) {
                return Some(key);
            }
        }
        if let Some(DataKeyInfo::KeyName(name)) = &encrypted.encrypted_data.key_info {
            if let Some(key) = keys
                .iter()
                .find(|k| k.carried_key_name.as_deref() == Some(name.as_str()))
            {
                return Some(key);
            }
        }
        match keys.as_slice() {
            [only] => Some(only),
            _ => None,
        }
    }
}

/// Tries resolvers in order and returns the first key found.
pub struct ChainingKeyResolver {
    resolvers: Vec<Box<dyn EncryptedKeyResolver>>,
}

impl ChainingKeyResolver {
    /// Creates an empty chain.
    #[must_use]
    pub fn new() -> Self {
        Self {
            resolvers: Vec::new(),
        }
    }

    /// Appends a resolver.
    #[must_use]
    pub fn with(mut self, resolver: impl EncryptedKeyResolver + 'static) -> Self {
        self.resolvers.push(Box::new(resolver));
        self
    }
}

impl Default for ChainingKeyResolver {
    /// Inline, then retrieval reference, then sibling matching.
    fn default() -> Self {
        Self::new()
            .with(InlineKeyResolver)
            .with(RetrievalMethodKeyResolver)
            .with(SiblingKeyResolver)
    }
}

impl std::fmt::Debug for ChainingKeyResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChainingKeyResolver")
            .field("resolvers", &self.resolvers.len())
            .finish()
    }
}

impl EncryptedKeyResolver for ChainingKeyResolver {
    fn resolve<'a>(
        &self,
        encrypted: &'a EncryptedAssertion,
        recipient: Option<&str>,
    ) -> Option<&'a EncryptedKey> {
        self.resolvers
            .iter()
            .find_map(|r| r.resolve(encrypted, recipient))
    }
}

// ============================================================================
// Encrypter
// ============================================================================

/// Encrypts and decrypts assertions.
#[derive(Debug)]
pub struct AssertionEncrypter {
    data_encryption: DataEncryptionAlgorithm,
    placement: KeyPlacement,
    key_resolver: ChainingKeyResolver,
}

impl Default for AssertionEncrypter {
    fn default() -> Self {
        Self::new(DataEncryptionAlgorithm::Aes128Gcm, KeyPlacement::Inline)
    }
}

impl AssertionEncrypter {
    /// Creates an encrypter.
    #[must_use]
    pub fn new(data_encryption: DataEncryptionAlgorithm, placement: KeyPlacement) -> Self {
        Self {
            data_encryption,
            placement,
            key_resolver: ChainingKeyResolver::default(),
        }
    }

    /// Replaces the resolver chain used when decrypting.
    #[must_use]
    pub fn with_key_resolver(mut self, resolver: ChainingKeyResolver) -> Self {
        self.key_resolver = resolver;
        self
    }

    /// Encrypts `assertion`, signature included, for `recipient`.
    ///
    /// `recipient_entity_id` is written as the `Recipient` of the wrapped key.
    ///
    /// # Errors
    ///
    /// Returns `Encryption` if the key transport algorithm is refused or the
    /// recipient key cannot wrap keys.
    pub fn encrypt(
        &self,
        assertion: &Assertion,
        recipient: &PublicCredential,
        key_transport: &str,
        recipient_entity_id: Option<&str>,
    ) -> SamlResult<EncryptedAssertion> {
        let key_transport = KeyTransportAlgorithm::from_uri(key_transport)
            .map_err(|e| SamlError::Encryption(e.to_string()))?;
        let plaintext = Zeroizing::new(codec::assertion_xml(assertion, true)?.into_bytes());

        let envelope =
            EncryptedEnvelope::encrypt(&plaintext, recipient, key_transport, self.data_encryption)
                .map_err(|e| SamlError::Encryption(e.to_string()))?;

        let key = EncryptedKey {
            id: Some(generate_xml_id()),
            recipient: recipient_entity_id.map(str::to_string),
            algorithm: key_transport.uri().to_string(),
            key_name: recipient.key_name().map(str::to_string),
            carried_key_name: None,
            cipher_value: envelope.wrapped_key.clone(),
        };

        let (key_info, encrypted_keys) = match self.placement {
            KeyPlacement::Inline => (DataKeyInfo::Inline(Box::new(key)), Vec::new()),
            KeyPlacement::Peer => {
                let uri = format!("#{}", key.id.as_deref().unwrap_or_default());
                (DataKeyInfo::RetrievalMethod { uri }, vec![key])
            }
        };

        tracing::debug!(
            assertion_id = %assertion.id,
            placement = ?self.placement,
            "assertion encrypted"
        );

        Ok(EncryptedAssertion {
            encrypted_data: EncryptedData {
                id: Some(generate_xml_id()),
                algorithm: self.data_encryption.uri().to_string(),
                key_info: Some(key_info),
                cipher_value: envelope.ciphertext.clone(),
            },
            encrypted_keys,
        })
    }

    /// Decrypts an assertion with the local private key.
    ///
    /// `local_entity_id` helps pick among several wrapped keys.
    ///
    /// # Errors
    ///
    /// Returns `Decryption` for a missing key, a refused or mismatched
    /// algorithm, a wrong private key, tampered ciphertext, or a plaintext
    /// that is not XML. Semantic errors in a well-formed decrypted assertion
    /// are reported as they are.
    pub fn decrypt(
        &self,
        encrypted: &EncryptedAssertion,
        credential: &PrivateCredential,
        local_entity_id: Option<&str>,
    ) -> SamlResult<Assertion> {
        let Some(key) = self.key_resolver.resolve(encrypted, local_entity_id) else {
            tracing::debug!("no encrypted key found for this recipient");
            return Err(SamlError::Decryption);
        };

        let key_transport = KeyTransportAlgorithm::from_uri(&key.algorithm);
        let data_encryption = DataEncryptionAlgorithm::from_uri(&encrypted.encrypted_data.algorithm);
        let (Ok(key_transport), Ok(data_encryption)) = (key_transport, data_encryption) else {
            tracing::debug!("unsupported encryption algorithm");
            return Err(SamlError::Decryption);
        };

        let envelope = EncryptedEnvelope {
            key_transport,
            wrapped_key: key.cipher_value.clone(),
            data_encryption,
            ciphertext: encrypted.encrypted_data.cipher_value.clone(),
        };
        let plaintext = envelope
            .decrypt(credential)
            .map_err(|_| SamlError::Decryption)?;

        let xml = std::str::from_utf8(&plaintext).map_err(|_| SamlError::Decryption)?;
        let element = XmlElement::parse(xml).map_err(|_| SamlError::Decryption)?;
        match codec::read_assertion(&element) {
            Err(SamlError::XmlParse(_)) => Err(SamlError::Decryption),
            other => other,
        }
    }
}
