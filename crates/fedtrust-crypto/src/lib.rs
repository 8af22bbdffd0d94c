//! # fedtrust-crypto
//!
//! Cryptographic building blocks for the fedtrust federation engine, using
//! aws-lc-rs.
//!
//! - [`keys`] - Public and private credentials, PEM helpers, key generation
//! - [`keystore`] - Key store collaborator interface and implementations
//! - [`signature`] - Raw signature creation and verification
//! - [`envelope`] - Hybrid (key transport + block cipher) envelope encryption
//! - [`hash`] - Digest functions
//! - [`random`] - Secure random identifiers
//!
//! Nothing in this crate knows about XML or SAML; the protocol crate feeds it
//! canonical bytes and algorithm identifiers.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod algorithm;
pub mod envelope;
pub mod error;
pub mod hash;
pub mod keys;
pub mod keystore;
pub mod random;
pub mod signature;

pub use algorithm::{
    DataEncryptionAlgorithm, DigestAlgorithm, KeyFamily, KeyTransportAlgorithm,
    SignatureAlgorithm,
};
pub use envelope::EncryptedEnvelope;
pub use error::{CryptoError, CryptoResult};
pub use hash::{digest, sha256, sha384, sha512};
pub use keys::{PrivateCredential, PublicCredential};
pub use keystore::{InMemoryKeyStore, KeyStore, PemDirectoryKeyStore};
