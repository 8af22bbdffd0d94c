//! Encrypted assertion types (XML Encryption structure).
//!
//! The wrapped session key can sit in one of three places: inline in the
//! `EncryptedData` key info, in a peer `EncryptedKey` referenced by
//! `RetrievalMethod`, or in a peer `EncryptedKey` with no explicit link.

/// An `EncryptedAssertion` element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncryptedAssertion {
    /// The encrypted payload.
    pub encrypted_data: EncryptedData,
    /// `EncryptedKey` elements that are siblings of `EncryptedData`.
    pub encrypted_keys: Vec<EncryptedKey>,
}

/// An `EncryptedData` element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncryptedData {
    /// Optional `Id` attribute.
    pub id: Option<String>,
    /// Block cipher algorithm URI.
    pub algorithm: String,
    /// Pointer to the wrapped session key.
    pub key_info: Option<DataKeyInfo>,
    /// `IV || ciphertext || tag`.
    pub cipher_value: Vec<u8>,
}

/// Content of the `KeyInfo` of an `EncryptedData` element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DataKeyInfo {
    /// The `EncryptedKey` itself.
    Inline(Box<EncryptedKey>),
    /// A `RetrievalMethod` whose URI is `#<EncryptedKey Id>`.
    RetrievalMethod {
        /// The reference URI.
        uri: String,
    },
    /// A `KeyName` matched against `CarriedKeyName`.
    KeyName(String),
}

/// An `EncryptedKey` element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncryptedKey {
    /// Optional `Id` attribute.
    pub id: Option<String>,
    /// Optional `Recipient` attribute (entity ID of the intended reader).
    pub recipient: Option<String>,
    /// Key transport algorithm URI.
    pub algorithm: String,
    /// Name of the recipient key that wrapped the session key.
    pub key_name: Option<String>,
    /// Name carried for the wrapped session key.
    pub carried_key_name: Option<String>,
    /// The wrapped session key.
    pub cipher_value: Vec<u8>,
}
