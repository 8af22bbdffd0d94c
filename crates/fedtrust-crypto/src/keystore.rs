//! Key store collaborator.
//!
//! The engine never reads key files itself; it asks a [`KeyStore`] for
//! credentials by alias. Two implementations are provided:
//!
//! - [`InMemoryKeyStore`] for tests and embedding applications
//! - [`PemDirectoryKeyStore`] reading PEM files from a directory
//!
//! ## Directory layout
//!
//! ```text
//! keys/
//!   idp-signing.key.pem   PKCS#8 private key
//!   idp-signing.crt.pem   optional certificate
//!   sp-encryption.pub.pem optional bare public key
//! ```

use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::RwLock;
use zeroize::Zeroizing;

use crate::error::{CryptoError, CryptoResult};
use crate::keys::{encode_pem, PrivateCredential, PublicCredential};

const PRIVATE_SUFFIX: &str = ".key.pem";
const CERTIFICATE_SUFFIX: &str = ".crt.pem";
const PUBLIC_SUFFIX: &str = ".pub.pem";

/// Source of private and public credentials.
#[async_trait]
pub trait KeyStore: Send + Sync {
    /// Loads the private credential stored under `alias`.
    async fn load_private_credential(
        &self,
        alias: &str,
        password: Option<&str>,
    ) -> CryptoResult<PrivateCredential>;

    /// Loads the public credential stored under `alias`.
    async fn load_public_credential(&self, alias: &str) -> CryptoResult<PublicCredential>;

    /// Lists all aliases, sorted.
    async fn list_aliases(&self) -> CryptoResult<Vec<String>>;
}

// ============================================================================
// In-Memory Key Store
// ============================================================================

struct Entry {
    private: Option<PrivateCredential>,
    public: PublicCredential,
    password: Option<Zeroizing<String>>,
}

/// Key store held in memory.
#[derive(Default)]
pub struct InMemoryKeyStore {
    entries: RwLock<HashMap<String, Entry>>,
}

impl InMemoryKeyStore {
    /// Creates an empty key store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores a private credential, optionally protected by a password.
    pub fn insert_private(
        &self,
        alias: impl Into<String>,
        credential: PrivateCredential,
        password: Option<&str>,
    ) {
        let public = credential.public_credential().clone();
        self.entries.write().insert(
            alias.into(),
            Entry {
                private: Some(credential),
                public,
                password: password.map(|p| Zeroizing::new(p.to_string())),
            },
        );
    }

    /// Stores a public credential.
    pub fn insert_public(&self, alias: impl Into<String>, credential: PublicCredential) {
        self.entries.write().insert(
            alias.into(),
            Entry {
                private: None,
                public: credential,
                password: None,
            },
        );
    }
}

#[async_trait]
impl KeyStore for InMemoryKeyStore {
    async fn load_private_credential(
        &self,
        alias: &str,
        password: Option<&str>,
    ) -> CryptoResult<PrivateCredential> {
        let entries = self.entries.read();
        let entry = entries
            .get(alias)
            .ok_or_else(|| CryptoError::KeyStore(format!("unknown alias: {alias}")))?;

        if let Some(expected) = &entry.password {
            let supplied = password.unwrap_or_default();
            if aws_lc_rs::constant_time::verify_slices_are_equal(
                expected.as_bytes(),
                supplied.as_bytes(),
            )
            .is_err()
            {
                return Err(CryptoError::KeyStore(format!("wrong password for alias: {alias}")));
            }
        }

        entry
            .private
            .clone()
            .ok_or_else(|| CryptoError::KeyStore(format!("no private key under alias: {alias}")))
    }

    async fn load_public_credential(&self, alias: &str) -> CryptoResult<PublicCredential> {
        self.entries
            .read()
            .get(alias)
            .map(|e| e.public.clone())
            .ok_or_else(|| CryptoError::KeyStore(format!("unknown alias: {alias}")))
    }

    async fn list_aliases(&self) -> CryptoResult<Vec<String>> {
        let mut aliases: Vec<String> = self.entries.read().keys().cloned().collect();
        aliases.sort();
        Ok(aliases)
    }
}

// ============================================================================
// PEM Directory Key Store
// ============================================================================

/// Key store reading PEM files from a directory.
///
/// Private keys must be unencrypted PKCS#8; the password argument is not
/// used. Every file read is bounded by the configured timeout.
#[derive(Debug, Clone)]
pub struct PemDirectoryKeyStore {
    directory: PathBuf,
    load_timeout: Duration,
}

impl PemDirectoryKeyStore {
    /// Creates a key store over `directory`.
    #[must_use]
    pub fn new(directory: impl Into<PathBuf>, load_timeout: Duration) -> Self {
        Self {
            directory: directory.into(),
            load_timeout,
        }
    }

    /// Returns the directory.
    #[must_use]
    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// Writes `credential` as `<alias>.key.pem` and `<alias>.pub.pem`, plus
    /// `<alias>.crt.pem` when a certificate is attached.
    ///
    /// # Errors
    ///
    /// Returns `KeyStore` for an invalid alias or a write failure.
    pub async fn store_private(
        &self,
        alias: &str,
        credential: &PrivateCredential,
    ) -> CryptoResult<()> {
        check_alias(alias)?;
        tokio::fs::create_dir_all(&self.directory)
            .await
            .map_err(|e| CryptoError::KeyStore(format!("cannot create key directory: {e}")))?;

        self.write(alias, PRIVATE_SUFFIX, credential.to_pem().as_bytes())
            .await?;
        self.write(alias, PUBLIC_SUFFIX, credential.public_credential().to_pem().as_bytes())
            .await?;
        if let Some(cert) = credential.certificate_der() {
            self.write(alias, CERTIFICATE_SUFFIX, encode_pem("CERTIFICATE", cert).as_bytes())
                .await?;
        }

        tracing::info!(alias, directory = %self.directory.display(), "stored key pair");
        Ok(())
    }

    fn path(&self, alias: &str, suffix: &str) -> PathBuf {
        self.directory.join(format!("{alias}{suffix}"))
    }

    async fn write(&self, alias: &str, suffix: &str, contents: &[u8]) -> CryptoResult<()> {
        let path = self.path(alias, suffix);
        tokio::fs::write(&path, contents)
            .await
            .map_err(|e| CryptoError::KeyStore(format!("cannot write {}: {e}", path.display())))
    }

    /// Reads a file, returning `None` when it does not exist.
    async fn read_optional(&self, path: &Path) -> CryptoResult<Option<Zeroizing<String>>> {
        let read = tokio::time::timeout(self.load_timeout, tokio::fs::read_to_string(path))
            .await
            .map_err(|_| {
                CryptoError::KeyStore(format!("timed out reading {}", path.display()))
            })?;
        match read {
            Ok(contents) => Ok(Some(Zeroizing::new(contents))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(CryptoError::KeyStore(format!(
                "cannot read {}: {e}",
                path.display()
            ))),
        }
    }
}

#[async_trait]
impl KeyStore for PemDirectoryKeyStore {
    async fn load_private_credential(
        &self,
        alias: &str,
        _password: Option<&str>,
    ) -> CryptoResult<PrivateCredential> {
        check_alias(alias)?;
        let key_path = self.path(alias, PRIVATE_SUFFIX);
        let pem = self.read_optional(&key_path).await?.ok_or_else(|| {
            CryptoError::KeyStore(format!("no private key under alias: {alias}"))
        })?;
        let mut credential = PrivateCredential::from_pem(&pem)?.with_key_name(alias);

        if let Some(cert_pem) = self.read_optional(&self.path(alias, CERTIFICATE_SUFFIX)).await? {
            let cert = PublicCredential::from_pem(&cert_pem)?;
            if let Some(der) = cert.certificate_der() {
                credential = credential.with_certificate(der)?;
            }
        }

        tracing::debug!(alias, key_id = %credential.public_credential().key_id(), "loaded private key");
        Ok(credential)
    }

    async fn load_public_credential(&self, alias: &str) -> CryptoResult<PublicCredential> {
        check_alias(alias)?;
        for suffix in [CERTIFICATE_SUFFIX, PUBLIC_SUFFIX] {
            if let Some(pem) = self.read_optional(&self.path(alias, suffix)).await? {
                return Ok(PublicCredential::from_pem(&pem)?.with_key_name(alias));
            }
        }
        if let Some(pem) = self.read_optional(&self.path(alias, PRIVATE_SUFFIX)).await? {
            let private = PrivateCredential::from_pem(&pem)?;
            return Ok(private.public_credential().clone().with_key_name(alias));
        }
        Err(CryptoError::KeyStore(format!("unknown alias: {alias}")))
    }

    async fn list_aliases(&self) -> CryptoResult<Vec<String>> {
        let mut dir = tokio::fs::read_dir(&self.directory)
            .await
            .map_err(|e| CryptoError::KeyStore(format!("cannot list key directory: {e}")))?;

        let mut aliases = BTreeSet::new();
        while let Some(entry) = dir
            .next_entry()
            .await
            .map_err(|e| CryptoError::KeyStore(format!("cannot list key directory: {e}")))?
        {
            let name = entry.file_name().to_string_lossy().into_owned();
            for suffix in [PRIVATE_SUFFIX, CERTIFICATE_SUFFIX, PUBLIC_SUFFIX] {
                if let Some(alias) = name.strip_suffix(suffix) {
                    aliases.insert(alias.to_string());
                }
            }
        }
        Ok(aliases.into_iter().collect())
    }
}

fn check_alias(alias: &str) -> CryptoResult<()> {
    let valid = !alias.is_empty()
        && alias
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
        && !alias.starts_with('.');
    if valid {
        Ok(())
    } else {
        Err(CryptoError::KeyStore(format!("invalid alias: {alias:?}")))
    }
}
