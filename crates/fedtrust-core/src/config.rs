//! Configuration management for the federation engine.
//!
//! Configuration is read from a TOML file. Every section has defaults so a
//! minimal file only needs the entity identifiers and the metadata source.
//!
//! ```toml
//! [metadata]
//! path = "/etc/fedtrust/metadata.xml"
//! refresh_interval_secs = 3600
//!
//! [keystore]
//! directory = "/etc/fedtrust/keys"
//!
//! [identity_provider]
//! entity_id = "https://idp.example.com"
//! signing_key_alias = "idp-signing"
//!
//! [service_provider]
//! entity_id = "https://sp.example.com"
//! assertion_consumer_url = "https://sp.example.com/acs"
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Environment variable naming the configuration file.
pub const CONFIG_ENV_VAR: &str = "FEDTRUST_CONFIG";

/// Main configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Where peer metadata comes from and how often it is refreshed.
    pub metadata: MetadataConfig,
    /// Key store location.
    pub keystore: KeyStoreConfig,
    /// Identity provider side settings.
    pub identity_provider: IdentityProviderConfig,
    /// Service provider side settings.
    pub service_provider: ServiceProviderConfig,
    /// Assertion lifecycle validation settings.
    pub validation: ValidationConfig,
    /// Encryption algorithm defaults.
    pub crypto: CryptoConfig,
}

/// Metadata source configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MetadataConfig {
    /// Filesystem path of a metadata document.
    pub path: Option<PathBuf>,
    /// URL of a metadata document.
    pub url: Option<String>,
    /// Refresh interval in seconds; `0` means refresh on demand only.
    pub refresh_interval_secs: u64,
    /// Upper bound for a single metadata load.
    pub load_timeout_secs: u64,
}

impl Default for MetadataConfig {
    fn default() -> Self {
        Self {
            path: None,
            url: None,
            refresh_interval_secs: 0,
            load_timeout_secs: 10,
        }
    }
}

impl MetadataConfig {
    /// Returns the refresh interval, or `None` for on-demand refresh.
    #[must_use]
    pub const fn refresh_interval(&self) -> Option<Duration> {
        if self.refresh_interval_secs == 0 {
            None
        } else {
            Some(Duration::from_secs(self.refresh_interval_secs))
        }
    }

    /// Returns the load timeout.
    #[must_use]
    pub const fn load_timeout(&self) -> Duration {
        Duration::from_secs(self.load_timeout_secs)
    }
}

/// Key store configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct KeyStoreConfig {
    /// Directory holding `<alias>.key.pem` / `<alias>.crt.pem` files.
    pub directory: PathBuf,
    /// Upper bound for a single key load.
    pub load_timeout_secs: u64,
}

impl Default for KeyStoreConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("keys"),
            load_timeout_secs: 5,
        }
    }
}

impl KeyStoreConfig {
    /// Returns the load timeout.
    #[must_use]
    pub const fn load_timeout(&self) -> Duration {
        Duration::from_secs(self.load_timeout_secs)
    }
}

/// Identity provider settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IdentityProviderConfig {
    /// Entity ID of the identity provider.
    pub entity_id: String,
    /// Key store alias of the signing key.
    pub signing_key_alias: Option<String>,
    /// Password protecting the signing key entry.
    #[serde(skip_serializing)]
    pub signing_key_password: Option<String>,
    /// Whether outbound messages must be signed (production setting).
    pub require_signing: bool,
    /// Protocol name: `saml2.0` or `saml1.1`.
    pub protocol: String,
    /// Binding URI used to select the destination endpoint.
    pub binding: String,
    /// Assertion validity window in seconds.
    pub assertion_validity_secs: u64,
    /// Peer code used to select peer-specific implementations.
    pub peer_code: Option<String>,
}

impl Default for IdentityProviderConfig {
    fn default() -> Self {
        Self {
            entity_id: String::new(),
            signing_key_alias: None,
            signing_key_password: None,
            require_signing: true,
            protocol: "saml2.0".to_string(),
            binding: "urn:oasis:names:tc:SAML:2.0:bindings:HTTP-POST".to_string(),
            assertion_validity_secs: 300,
            peer_code: None,
        }
    }
}

/// Service provider settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceProviderConfig {
    /// Entity ID of the service provider.
    pub entity_id: String,
    /// Key store alias of the decryption key.
    pub decryption_key_alias: Option<String>,
    /// Password protecting the decryption key entry.
    #[serde(skip_serializing)]
    pub decryption_key_password: Option<String>,
    /// URL the assertions must be addressed to.
    pub assertion_consumer_url: Option<String>,
    /// Reject unsigned messages even when the issuer publishes no signing key.
    pub require_signed_assertions: bool,
}

impl Default for ServiceProviderConfig {
    fn default() -> Self {
        Self {
            entity_id: String::new(),
            decryption_key_alias: None,
            decryption_key_password: None,
            assertion_consumer_url: None,
            require_signed_assertions: true,
        }
    }
}

/// Lifecycle validation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationConfig {
    /// Symmetric clock skew allowance in seconds.
    pub clock_skew_secs: u64,
    /// Minimum time a seen assertion ID is remembered.
    pub replay_retention_secs: u64,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            clock_skew_secs: 0,
            replay_retention_secs: 3600,
        }
    }
}

impl ValidationConfig {
    /// Returns the clock skew allowance.
    #[must_use]
    pub const fn clock_skew(&self) -> Duration {
        Duration::from_secs(self.clock_skew_secs)
    }

    /// Returns the replay retention window.
    #[must_use]
    pub const fn replay_retention(&self) -> Duration {
        Duration::from_secs(self.replay_retention_secs)
    }
}

/// Where the wrapped session key is placed in an encrypted assertion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyPlacementConfig {
    /// Inside the encrypted data's key info.
    #[default]
    Inline,
    /// As a peer element referenced by a retrieval method.
    Peer,
}

/// Encryption defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CryptoConfig {
    /// Key transport algorithm URI used when metadata names none.
    pub key_transport_algorithm: String,
    /// Block cipher algorithm URI for assertion payloads.
    pub data_encryption_algorithm: String,
    /// Placement of the wrapped key.
    pub key_placement: KeyPlacementConfig,
}

impl Default for CryptoConfig {
    fn default() -> Self {
        Self {
            key_transport_algorithm: "http://www.w3.org/2001/04/xmlenc#rsa-oaep-mgf1p"
                .to_string(),
            data_encryption_algorithm: "http://www.w3.org/2009/xmlenc11#aes128-gcm".to_string(),
            key_placement: KeyPlacementConfig::Inline,
        }
    }
}

impl Config {
    /// Loads and validates configuration from a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        let config = Self::from_toml_str(&content)?;
        tracing::debug!(path = %path.display(), "configuration loaded");
        Ok(config)
    }

    /// Parses and validates configuration from TOML text.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)
            .map_err(|e| Error::Config(format!("failed to parse config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Loads configuration from the file named by [`CONFIG_ENV_VAR`].
    pub fn from_env() -> Result<Self> {
        let path = std::env::var(CONFIG_ENV_VAR)
            .map_err(|_| Error::Config(format!("{CONFIG_ENV_VAR} is not set")))?;
        Self::from_file(path)
    }

    /// Checks cross-field consistency.
    pub fn validate(&self) -> Result<()> {
        if self.metadata.path.is_some() && self.metadata.url.is_some() {
            return Err(Error::Config(
                "metadata.path and metadata.url are mutually exclusive".to_string(),
            ));
        }
        if self.metadata.load_timeout_secs == 0 {
            return Err(Error::Config(
                "metadata.load_timeout_secs must be positive".to_string(),
            ));
        }
        if self.keystore.load_timeout_secs == 0 {
            return Err(Error::Config(
                "keystore.load_timeout_secs must be positive".to_string(),
            ));
        }
        match self.identity_provider.protocol.as_str() {
            "saml2.0" | "saml1.1" => {}
            other => {
                return Err(Error::Config(format!("unknown protocol: {other}")));
            }
        }
        if self.identity_provider.assertion_validity_secs == 0 {
            return Err(Error::Config(
                "identity_provider.assertion_validity_secs must be positive".to_string(),
            ));
        }
        if self.identity_provider.require_signing
            && !self.identity_provider.entity_id.is_empty()
            && self.identity_provider.signing_key_alias.is_none()
        {
            return Err(Error::Config(
                "identity_provider.require_signing is set but no signing_key_alias is configured"
                    .to_string(),
            ));
        }
        Ok(())
    }
}
