//! SAML constants and URIs.
//!
//! Namespace URIs, binding URIs, name ID formats, and the protocol and role
//! enums shared by every component.

use serde::{Deserialize, Serialize};

/// SAML 2.0 assertion namespace URI.
pub const SAML2_ASSERTION_NS: &str = "urn:oasis:names:tc:SAML:2.0:assertion";

/// SAML 2.0 protocol namespace URI.
pub const SAML2_PROTOCOL_NS: &str = "urn:oasis:names:tc:SAML:2.0:protocol";

/// SAML 1.x assertion namespace URI.
pub const SAML1_ASSERTION_NS: &str = "urn:oasis:names:tc:SAML:1.0:assertion";

/// SAML 1.x protocol namespace URI.
pub const SAML1_PROTOCOL_NS: &str = "urn:oasis:names:tc:SAML:1.0:protocol";

/// SAML 2.0 metadata namespace URI.
pub const METADATA_NS: &str = "urn:oasis:names:tc:SAML:2.0:metadata";

/// XML Digital Signature namespace URI.
pub const XMLDSIG_NS: &str = "http://www.w3.org/2000/09/xmldsig#";

/// XML Digital Signature 1.1 namespace URI.
pub const XMLDSIG11_NS: &str = "http://www.w3.org/2009/xmldsig11#";

/// XML Encryption namespace URI.
pub const XMLENC_NS: &str = "http://www.w3.org/2001/04/xmlenc#";

/// Exclusive XML canonicalization without comments.
pub const EXCLUSIVE_C14N: &str = "http://www.w3.org/2001/10/xml-exc-c14n#";

/// Enveloped signature transform.
pub const ENVELOPED_SIGNATURE_TRANSFORM: &str =
    "http://www.w3.org/2000/09/xmldsig#enveloped-signature";

/// `EncryptedData` type for an encrypted element.
pub const XMLENC_ELEMENT_TYPE: &str = "http://www.w3.org/2001/04/xmlenc#Element";

/// `RetrievalMethod` type pointing at an `EncryptedKey`.
pub const XMLENC_ENCRYPTED_KEY_TYPE: &str = "http://www.w3.org/2001/04/xmlenc#EncryptedKey";

/// Bearer subject confirmation (SAML 2.0).
pub const CM_BEARER: &str = "urn:oasis:names:tc:SAML:2.0:cm:bearer";

/// Bearer subject confirmation (SAML 1.x).
pub const CM_BEARER_SAML1: &str = "urn:oasis:names:tc:SAML:1.0:cm:bearer";

/// Unspecified authentication method (SAML 1.x).
pub const AM_UNSPECIFIED_SAML1: &str = "urn:oasis:names:tc:SAML:1.0:am:unspecified";

// ============================================================================
// Protocol
// ============================================================================

/// Supported SAML protocol versions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProtocolVersion {
    /// SAML 1.1.
    Saml11,
    /// SAML 2.0.
    Saml20,
}

impl ProtocolVersion {
    /// Returns the protocol name used in audit records.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Saml11 => "SAML1.1",
            Self::Saml20 => "SAML2.0",
        }
    }

    /// Returns the protocol support URI advertised in metadata.
    #[must_use]
    pub const fn protocol_uri(self) -> &'static str {
        match self {
            Self::Saml11 => "urn:oasis:names:tc:SAML:1.1:protocol",
            Self::Saml20 => SAML2_PROTOCOL_NS,
        }
    }

    /// Parses a `protocolSupportEnumeration` entry.
    ///
    /// The SAML 1.0 protocol URI is accepted as part of the 1.x family.
    #[must_use]
    pub fn from_protocol_uri(uri: &str) -> Option<Self> {
        match uri {
            SAML2_PROTOCOL_NS => Some(Self::Saml20),
            "urn:oasis:names:tc:SAML:1.1:protocol" | SAML1_PROTOCOL_NS => Some(Self::Saml11),
            _ => None,
        }
    }

    /// Parses the configuration form (`saml2.0`, `saml1.1`).
    #[must_use]
    pub fn from_config(value: &str) -> Option<Self> {
        match value.to_ascii_lowercase().as_str() {
            "saml2.0" | "saml2" => Some(Self::Saml20),
            "saml1.1" | "saml1" => Some(Self::Saml11),
            _ => None,
        }
    }

    /// Returns the default binding for assertion delivery.
    #[must_use]
    pub const fn default_binding(self) -> SamlBinding {
        match self {
            Self::Saml11 => SamlBinding::Saml1BrowserPost,
            Self::Saml20 => SamlBinding::HttpPost,
        }
    }
}

impl std::fmt::Display for ProtocolVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Federation role of an entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntityRole {
    /// Identity provider.
    IdentityProvider,
    /// Service provider.
    ServiceProvider,
}

impl EntityRole {
    /// Returns the metadata role descriptor element name.
    #[must_use]
    pub const fn descriptor_name(self) -> &'static str {
        match self {
            Self::IdentityProvider => "IDPSSODescriptor",
            Self::ServiceProvider => "SPSSODescriptor",
        }
    }
}

impl std::fmt::Display for EntityRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::IdentityProvider => f.write_str("IdP"),
            Self::ServiceProvider => f.write_str("SP"),
        }
    }
}

// ============================================================================
// Binding URIs
// ============================================================================

/// SAML binding types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SamlBinding {
    /// HTTP POST binding.
    HttpPost,
    /// HTTP Redirect binding.
    HttpRedirect,
    /// HTTP Artifact binding.
    HttpArtifact,
    /// SOAP binding.
    Soap,
    /// SAML 1.x browser/POST profile.
    Saml1BrowserPost,
    /// SAML 1.x browser/artifact profile.
    Saml1BrowserArtifact,
}

impl SamlBinding {
    /// Returns the URI for this binding.
    #[must_use]
    pub const fn uri(&self) -> &'static str {
        match self {
            Self::HttpPost => "urn:oasis:names:tc:SAML:2.0:bindings:HTTP-POST",
            Self::HttpRedirect => "urn:oasis:names:tc:SAML:2.0:bindings:HTTP-Redirect",
            Self::HttpArtifact => "urn:oasis:names:tc:SAML:2.0:bindings:HTTP-Artifact",
            Self::Soap => "urn:oasis:names:tc:SAML:2.0:bindings:SOAP",
            Self::Saml1BrowserPost => "urn:oasis:names:tc:SAML:1.0:profiles:browser-post",
            Self::Saml1BrowserArtifact => "urn:oasis:names:tc:SAML:1.0:profiles:artifact-01",
        }
    }

    /// Parses a binding from its URI.
    #[must_use]
    pub fn from_uri(uri: &str) -> Option<Self> {
        match uri {
            "urn:oasis:names:tc:SAML:2.0:bindings:HTTP-POST" => Some(Self::HttpPost),
            "urn:oasis:names:tc:SAML:2.0:bindings:HTTP-Redirect" => Some(Self::HttpRedirect),
            "urn:oasis:names:tc:SAML:2.0:bindings:HTTP-Artifact" => Some(Self::HttpArtifact),
            "urn:oasis:names:tc:SAML:2.0:bindings:SOAP" => Some(Self::Soap),
            "urn:oasis:names:tc:SAML:1.0:profiles:browser-post" => Some(Self::Saml1BrowserPost),
            "urn:oasis:names:tc:SAML:1.0:profiles:artifact-01" => {
                Some(Self::Saml1BrowserArtifact)
            }
            _ => None,
        }
    }
}

// ============================================================================
// Name ID Formats
// ============================================================================

/// SAML Name ID formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum NameIdFormat {
    /// Unspecified name ID format.
    #[default]
    Unspecified,
    /// Email address format.
    Email,
    /// X.509 subject name format.
    X509SubjectName,
    /// Windows domain qualified name format.
    WindowsDomainQualifiedName,
    /// Kerberos principal name format.
    Kerberos,
    /// Entity identifier format.
    Entity,
    /// Persistent identifier format.
    Persistent,
    /// Transient identifier format.
    Transient,
}

impl NameIdFormat {
    /// Returns the URI for this name ID format.
    #[must_use]
    pub const fn uri(&self) -> &'static str {
        match self {
            Self::Unspecified => "urn:oasis:names:tc:SAML:1.1:nameid-format:unspecified",
            Self::Email => "urn:oasis:names:tc:SAML:1.1:nameid-format:emailAddress",
            Self::X509SubjectName => "urn:oasis:names:tc:SAML:1.1:nameid-format:X509SubjectName",
            Self::WindowsDomainQualifiedName => {
                "urn:oasis:names:tc:SAML:1.1:nameid-format:WindowsDomainQualifiedName"
            }
            Self::Kerberos => "urn:oasis:names:tc:SAML:2.0:nameid-format:kerberos",
            Self::Entity => "urn:oasis:names:tc:SAML:2.0:nameid-format:entity",
            Self::Persistent => "urn:oasis:names:tc:SAML:2.0:nameid-format:persistent",
            Self::Transient => "urn:oasis:names:tc:SAML:2.0:nameid-format:transient",
        }
    }

    /// Parses a name ID format from its URI.
    #[must_use]
    pub fn from_uri(uri: &str) -> Option<Self> {
        match uri {
            "urn:oasis:names:tc:SAML:1.1:nameid-format:unspecified" => Some(Self::Unspecified),
            "urn:oasis:names:tc:SAML:1.1:nameid-format:emailAddress" => Some(Self::Email),
            "urn:oasis:names:tc:SAML:1.1:nameid-format:X509SubjectName" => {
                Some(Self::X509SubjectName)
            }
            "urn:oasis:names:tc:SAML:1.1:nameid-format:WindowsDomainQualifiedName" => {
                Some(Self::WindowsDomainQualifiedName)
            }
            "urn:oasis:names:tc:SAML:2.0:nameid-format:kerberos" => Some(Self::Kerberos),
            "urn:oasis:names:tc:SAML:2.0:nameid-format:entity" => Some(Self::Entity),
            "urn:oasis:names:tc:SAML:2.0:nameid-format:persistent" => Some(Self::Persistent),
            "urn:oasis:names:tc:SAML:2.0:nameid-format:transient" => Some(Self::Transient),
            _ => None,
        }
    }
}
