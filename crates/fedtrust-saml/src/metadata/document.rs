//! SAML metadata document model.

use fedtrust_crypto::PublicCredential;
use serde::{Deserialize, Serialize};

use crate::error::{SamlError, SamlResult};
use crate::types::{
    EntityRole, ProtocolVersion, SamlBinding, METADATA_NS, XMLDSIG11_NS, XMLDSIG_NS,
};
use crate::xml::{decode_base64, encode_base64, XmlElement, XmlWriter};

// ============================================================================
// Key Descriptors
// ============================================================================

/// The `use` attribute of a `KeyDescriptor`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyUse {
    /// Signing only.
    Signing,
    /// Encryption only.
    Encryption,
    /// No `use` attribute: usable for both.
    #[default]
    Unspecified,
}

impl KeyUse {
    /// Parses the `use` attribute value.
    ///
    /// # Errors
    ///
    /// Returns `Metadata` for values other than `signing` and `encryption`.
    pub fn from_attribute(value: Option<&str>) -> SamlResult<Self> {
        match value {
            None => Ok(Self::Unspecified),
            Some("signing") => Ok(Self::Signing),
            Some("encryption") => Ok(Self::Encryption),
            Some(other) => Err(SamlError::Metadata(format!("unknown key use: {other}"))),
        }
    }

    /// Returns the attribute value, or `None` when unspecified.
    #[must_use]
    pub const fn attribute(self) -> Option<&'static str> {
        match self {
            Self::Signing => Some("signing"),
            Self::Encryption => Some("encryption"),
            Self::Unspecified => None,
        }
    }

    /// Returns true if a key with this use may serve `wanted`.
    #[must_use]
    pub fn permits(self, wanted: Self) -> bool {
        self == Self::Unspecified || wanted == Self::Unspecified || self == wanted
    }
}

/// A published key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyDescriptor {
    /// Declared usage.
    pub usage: KeyUse,
    /// The key, with its certificate and name when published.
    pub credential: PublicCredential,
    /// `EncryptionMethod` algorithm URIs in document order.
    pub encryption_methods: Vec<String>,
}

impl KeyDescriptor {
    /// Creates a descriptor with no encryption methods.
    #[must_use]
    pub const fn new(usage: KeyUse, credential: PublicCredential) -> Self {
        Self {
            usage,
            credential,
            encryption_methods: Vec::new(),
        }
    }

    /// Adds an `EncryptionMethod`.
    #[must_use]
    pub fn with_encryption_method(mut self, algorithm: impl Into<String>) -> Self {
        self.encryption_methods.push(algorithm.into());
        self
    }
}

/// A protocol endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Endpoint {
    /// Binding of the endpoint.
    pub binding: SamlBinding,
    /// Endpoint URL.
    pub location: String,
}

// ============================================================================
// Descriptors
// ============================================================================

/// An `IDPSSODescriptor` or `SPSSODescriptor`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleDescriptor {
    /// Role described.
    pub role: EntityRole,
    /// Supported protocol versions.
    pub protocols: Vec<ProtocolVersion>,
    /// Published keys in document order.
    pub keys: Vec<KeyDescriptor>,
    /// Endpoints in document order.
    pub endpoints: Vec<Endpoint>,
}

impl RoleDescriptor {
    /// Creates a descriptor supporting one protocol.
    #[must_use]
    pub fn new(role: EntityRole, protocol: ProtocolVersion) -> Self {
        Self {
            role,
            protocols: vec![protocol],
            keys: Vec::new(),
            endpoints: Vec::new(),
        }
    }

    /// Adds a supported protocol.
    #[must_use]
    pub fn with_protocol(mut self, protocol: ProtocolVersion) -> Self {
        if !self.protocols.contains(&protocol) {
            self.protocols.push(protocol);
        }
        self
    }

    /// Adds a key.
    #[must_use]
    pub fn with_key(mut self, key: KeyDescriptor) -> Self {
        self.keys.push(key);
        self
    }

    /// Adds an endpoint.
    #[must_use]
    pub fn with_endpoint(mut self, binding: SamlBinding, location: impl Into<String>) -> Self {
        self.endpoints.push(Endpoint {
            binding,
            location: location.into(),
        });
        self
    }

    /// Returns true if the descriptor supports `protocol`.
    #[must_use]
    pub fn supports(&self, protocol: ProtocolVersion) -> bool {
        self.protocols.contains(&protocol)
    }
}

/// An `EntityDescriptor`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityDescriptor {
    /// Entity ID.
    pub entity_id: String,
    /// Role descriptors in document order.
    pub roles: Vec<RoleDescriptor>,
}

impl EntityDescriptor {
    /// Creates an entity with no roles.
    #[must_use]
    pub fn new(entity_id: impl Into<String>) -> Self {
        Self {
            entity_id: entity_id.into(),
            roles: Vec::new(),
        }
    }

    /// Adds a role descriptor.
    #[must_use]
    pub fn with_role(mut self, role: RoleDescriptor) -> Self {
        self.roles.push(role);
        self
    }

    /// Returns the first descriptor of `role` that supports `protocol`.
    #[must_use]
    pub fn role(&self, role: EntityRole, protocol: ProtocolVersion) -> Option<&RoleDescriptor> {
        self.roles
            .iter()
            .find(|r| r.role == role && r.supports(protocol))
    }

    /// Returns every descriptor of `role`, whatever the protocol.
    pub fn roles_of(&self, role: EntityRole) -> impl Iterator<Item = &RoleDescriptor> {
        self.roles.iter().filter(move |r| r.role == role)
    }
}

// ============================================================================
// Document
// ============================================================================

/// A parsed metadata document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetadataDocument {
    /// Entities in document order, nested groups flattened.
    pub entities: Vec<EntityDescriptor>,
}

impl MetadataDocument {
    /// Creates a document from entities.
    #[must_use]
    pub const fn new(entities: Vec<EntityDescriptor>) -> Self {
        Self { entities }
    }

    /// Adds an entity.
    #[must_use]
    pub fn with_entity(mut self, entity: EntityDescriptor) -> Self {
        self.entities.push(entity);
        self
    }

    /// Returns the entity with the given ID.
    #[must_use]
    pub fn entity(&self, entity_id: &str) -> Option<&EntityDescriptor> {
        self.entities.iter().find(|e| e.entity_id == entity_id)
    }

    /// Parses metadata XML with an `EntityDescriptor` or `EntitiesDescriptor`
    /// root.
    ///
    /// Keys that cannot be decoded are skipped with a warning. Unknown
    /// bindings and protocols are ignored.
    ///
    /// # Errors
    ///
    /// Returns `Metadata` for malformed XML or an unexpected root.
    pub fn parse(xml: &str) -> SamlResult<Self> {
        let root = XmlElement::parse(xml).map_err(|e| SamlError::Metadata(e.to_string()))?;
        let mut entities = Vec::new();
        collect_entities(&root, &mut entities)?;
        if entities.is_empty() {
            return Err(SamlError::Metadata("document contains no entities".to_string()));
        }
        tracing::debug!(entities = entities.len(), "metadata parsed");
        Ok(Self { entities })
    }

    /// Serializes the document.
    #[must_use]
    pub fn to_xml(&self) -> String {
        let mut w = XmlWriter::new();
        if let [entity] = self.entities.as_slice() {
            write_entity(&mut w, entity, true);
        } else {
            w.start("md:EntitiesDescriptor", &[("xmlns:md", METADATA_NS)]);
            for entity in &self.entities {
                write_entity(&mut w, entity, false);
            }
            w.end();
        }
        w.finish()
    }
}

fn collect_entities(element: &XmlElement, out: &mut Vec<EntityDescriptor>) -> SamlResult<()> {
    if element.is(METADATA_NS, "EntitiesDescriptor") {
        for child in &element.children {
            if child.namespace.as_deref() == Some(METADATA_NS) {
                collect_entities(child, out)?;
            }
        }
        Ok(())
    } else if element.is(METADATA_NS, "EntityDescriptor") {
        out.push(read_entity(element)?);
        Ok(())
    } else if out.is_empty() && element.namespace.as_deref() != Some(METADATA_NS) {
        Err(SamlError::Metadata(format!(
            "unexpected metadata root: {}",
            element.name
        )))
    } else {
        Ok(())
    }
}

const fn endpoint_element(role: EntityRole) -> &'static str {
    match role {
        EntityRole::IdentityProvider => "SingleSignOnService",
        EntityRole::ServiceProvider => "AssertionConsumerService",
    }
}

fn read_entity(element: &XmlElement) -> SamlResult<EntityDescriptor> {
    let entity_id = element
        .attribute("entityID")
        .ok_or_else(|| SamlError::Metadata("EntityDescriptor has no entityID".to_string()))?;

    let mut roles = Vec::new();
    for child in &element.children {
        let role = if child.is(METADATA_NS, "IDPSSODescriptor") {
            EntityRole::IdentityProvider
        } else if child.is(METADATA_NS, "SPSSODescriptor") {
            EntityRole::ServiceProvider
        } else {
            continue;
        };
        roles.push(read_role(entity_id, role, child)?);
    }

    Ok(EntityDescriptor {
        entity_id: entity_id.to_string(),
        roles,
    })
}

fn read_role(entity_id: &str, role: EntityRole, element: &XmlElement) -> SamlResult<RoleDescriptor> {
    let protocols = element
        .attribute("protocolSupportEnumeration")
        .unwrap_or_default()
        .split_whitespace()
        .filter_map(ProtocolVersion::from_protocol_uri)
        .fold(Vec::new(), |mut acc, p| {
            if !acc.contains(&p) {
                acc.push(p);
            }
            acc
        });

    let mut keys = Vec::new();
    for descriptor in element.children_named("KeyDescriptor") {
        let usage = KeyUse::from_attribute(descriptor.attribute("use"))?;
        match descriptor.child("KeyInfo").map(read_key_info).transpose() {
            Ok(Some(credential)) => keys.push(KeyDescriptor {
                usage,
                credential,
                encryption_methods: descriptor
                    .children_named("EncryptionMethod")
                    .filter_map(|m| m.attribute("Algorithm"))
                    .map(str::to_string)
                    .collect(),
            }),
            Ok(None) => {
                tracing::warn!(entity_id, %role, "key descriptor without key info skipped");
            }
            Err(err) => {
                tracing::warn!(entity_id, %role, error = %err, "undecodable key skipped");
            }
        }
    }

    let mut endpoints = Vec::new();
    for endpoint in element.children_named(endpoint_element(role)) {
        let (Some(binding), Some(location)) =
            (endpoint.attribute("Binding"), endpoint.attribute("Location"))
        else {
            tracing::warn!(entity_id, %role, "endpoint without Binding or Location skipped");
            continue;
        };
        match SamlBinding::from_uri(binding) {
            Some(binding) => endpoints.push(Endpoint {
                binding,
                location: location.to_string(),
            }),
            None => tracing::debug!(entity_id, binding, "unsupported binding ignored"),
        }
    }

    Ok(RoleDescriptor {
        role,
        protocols,
        keys,
        endpoints,
    })
}

fn read_key_info(key_info: &XmlElement) -> SamlResult<PublicCredential> {
    let credential = if let Some(cert) = key_info
        .child("X509Data")
        .and_then(|d| d.child_text("X509Certificate"))
    {
        PublicCredential::from_certificate_der(&decode_base64(cert)?)?
    } else if let Some(value) = key_info.child_text("DEREncodedKeyValue") {
        PublicCredential::from_spki_der(&decode_base64(value)?)?
    } else {
        return Err(SamlError::Metadata("KeyInfo carries no usable key".to_string()));
    };

    Ok(match key_info.child_text("KeyName") {
        Some(name) => credential.with_key_name(name.trim()),
        None => credential,
    })
}

fn write_entity(w: &mut XmlWriter, entity: &EntityDescriptor, declare_namespace: bool) {
    let mut attrs = Vec::new();
    if declare_namespace {
        attrs.push(("xmlns:md", METADATA_NS));
    }
    attrs.push(("entityID", entity.entity_id.as_str()));
    w.start("md:EntityDescriptor", &attrs);

    for role in &entity.roles {
        let protocols = role
            .protocols
            .iter()
            .map(|p| p.protocol_uri())
            .collect::<Vec<_>>()
            .join(" ");
        let name = format!("md:{}", role.role.descriptor_name());
        w.start(&name, &[("protocolSupportEnumeration", protocols.as_str())]);

        for key in &role.keys {
            write_key_descriptor(w, key);
        }

        let endpoint_name = format!("md:{}", endpoint_element(role.role));
        for endpoint in &role.endpoints {
            w.empty(
                &endpoint_name,
                &[
                    ("Binding", endpoint.binding.uri()),
                    ("Location", endpoint.location.as_str()),
                ],
            );
        }
        w.end();
    }
    w.end();
}

fn write_key_descriptor(w: &mut XmlWriter, key: &KeyDescriptor) {
    match key.usage.attribute() {
        Some(usage) => w.start("md:KeyDescriptor", &[("use", usage)]),
        None => w.start("md:KeyDescriptor", &[]),
    };

    w.start("ds:KeyInfo", &[("xmlns:ds", XMLDSIG_NS)]);
    if let Some(name) = key.credential.key_name() {
        w.text_element("ds:KeyName", &[], name);
    }
    match key.credential.certificate_der() {
        Some(der) => {
            w.start("ds:X509Data", &[])
                .text_element("ds:X509Certificate", &[], &encode_base64(der))
                .end();
        }
        None => {
            w.text_element(
                "dsig11:DEREncodedKeyValue",
                &[("xmlns:dsig11", XMLDSIG11_NS)],
                &encode_base64(key.credential.spki_der()),
            );
        }
    }
    w.end();

    for method in &key.encryption_methods {
        w.empty("md:EncryptionMethod", &[("Algorithm", method.as_str())]);
    }
    w.end();
}
