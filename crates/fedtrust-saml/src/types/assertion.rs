//! Assertion types.
//!
//! An assertion is created by the producer pipeline and never mutated by the
//! consumer pipeline; the consumer only validates it.

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use super::{NameIdFormat, ProtocolVersion, CM_BEARER, CM_BEARER_SAML1};
use crate::error::{SamlError, SamlResult};
use crate::signature::SignatureRecord;

/// A statement by an identity provider about an authenticated subject.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Assertion {
    /// Unique identifier, also the signature reference target.
    pub id: String,
    /// Protocol version the assertion was issued under.
    pub protocol: ProtocolVersion,
    /// Time of issue.
    pub issue_instant: DateTime<Utc>,
    /// Entity ID of the issuing identity provider.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub issuer: Option<String>,
    /// The subject the assertion is about.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subject: Option<Subject>,
    /// Validity window.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub validity: Option<Validity>,
    /// Authentication context class reference.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub authn_context_class: Option<String>,
    /// Attributes, in document order. Names may repeat.
    pub attributes: Vec<(String, String)>,
    /// Enveloped signature, if the assertion is signed.
    #[serde(skip)]
    pub signature: Option<SignatureRecord>,
}

impl Assertion {
    /// Creates an unsigned assertion with a fresh identifier.
    #[must_use]
    pub fn new(issuer: impl Into<String>, protocol: ProtocolVersion) -> Self {
        Self {
            id: fedtrust_crypto::random::generate_xml_id(),
            protocol,
            issue_instant: Utc::now(),
            issuer: Some(issuer.into()),
            subject: None,
            validity: None,
            authn_context_class: None,
            attributes: Vec::new(),
            signature: None,
        }
    }

    /// Sets the subject.
    #[must_use]
    pub fn with_subject(mut self, subject: Subject) -> Self {
        self.subject = Some(subject);
        self
    }

    /// Sets the validity window.
    #[must_use]
    pub const fn with_validity(mut self, validity: Validity) -> Self {
        self.validity = Some(validity);
        self
    }

    /// Sets the authentication context class.
    #[must_use]
    pub fn with_authn_context_class(mut self, class: impl Into<String>) -> Self {
        self.authn_context_class = Some(class.into());
        self
    }

    /// Appends an attribute.
    #[must_use]
    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.push((name.into(), value.into()));
        self
    }

    /// Returns true if the assertion carries a signature.
    #[must_use]
    pub const fn is_signed(&self) -> bool {
        self.signature.is_some()
    }

    /// Returns the first value of the named attribute.
    #[must_use]
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }
}

/// Subject of an assertion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Subject {
    /// Subject identifier (name ID value).
    pub identifier: String,
    /// Name ID format.
    pub format: NameIdFormat,
    /// Subject confirmation method URI.
    pub confirmation_method: String,
    /// Name qualifier (security domain of the identifier).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_domain: Option<String>,
    /// Endpoint the assertion is intended for.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub destination: Option<String>,
}

impl Subject {
    /// Creates a subject with an explicit confirmation method.
    #[must_use]
    pub fn new(identifier: impl Into<String>, confirmation_method: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
            format: NameIdFormat::default(),
            confirmation_method: confirmation_method.into(),
            source_domain: None,
            destination: None,
        }
    }

    /// Creates a subject confirmed by the bearer method of `protocol`.
    #[must_use]
    pub fn bearer(identifier: impl Into<String>, protocol: ProtocolVersion) -> Self {
        let method = match protocol {
            ProtocolVersion::Saml11 => CM_BEARER_SAML1,
            ProtocolVersion::Saml20 => CM_BEARER,
        };
        Self::new(identifier, method)
    }

    /// Sets the name ID format.
    #[must_use]
    pub const fn with_format(mut self, format: NameIdFormat) -> Self {
        self.format = format;
        self
    }

    /// Sets the name qualifier.
    #[must_use]
    pub fn with_source_domain(mut self, domain: impl Into<String>) -> Self {
        self.source_domain = Some(domain.into());
        self
    }

    /// Sets the intended destination.
    #[must_use]
    pub fn with_destination(mut self, destination: impl Into<String>) -> Self {
        self.destination = Some(destination.into());
        self
    }
}

/// Validity window `[not_before, not_on_or_after)`.
///
/// Both bounds are always present and `not_before < not_on_or_after`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Validity {
    not_before: DateTime<Utc>,
    not_on_or_after: DateTime<Utc>,
}

impl Validity {
    /// Creates a window.
    ///
    /// # Errors
    ///
    /// Returns `InvalidAssertion` if `not_before` is not strictly earlier than
    /// `not_on_or_after`.
    pub fn new(not_before: DateTime<Utc>, not_on_or_after: DateTime<Utc>) -> SamlResult<Self> {
        if not_before >= not_on_or_after {
            return Err(SamlError::InvalidAssertion(format!(
                "NotBefore {not_before} is not earlier than NotOnOrAfter {not_on_or_after}"
            )));
        }
        Ok(Self {
            not_before,
            not_on_or_after,
        })
    }

    /// Creates a window from optional bounds, which must be both set or both
    /// absent.
    ///
    /// # Errors
    ///
    /// Returns `InvalidAssertion` when only one bound is set or the bounds are
    /// out of order.
    pub fn from_bounds(
        not_before: Option<DateTime<Utc>>,
        not_on_or_after: Option<DateTime<Utc>>,
    ) -> SamlResult<Option<Self>> {
        match (not_before, not_on_or_after) {
            (Some(nb), Some(noa)) => Self::new(nb, noa).map(Some),
            (None, None) => Ok(None),
            _ => Err(SamlError::InvalidAssertion(
                "NotBefore and NotOnOrAfter must be set together".to_string(),
            )),
        }
    }

    /// Returns the start of the window (inclusive).
    #[must_use]
    pub const fn not_before(&self) -> DateTime<Utc> {
        self.not_before
    }

    /// Returns the end of the window (exclusive).
    #[must_use]
    pub const fn not_on_or_after(&self) -> DateTime<Utc> {
        self.not_on_or_after
    }

    /// Returns true if `now` lies in the window widened by `skew` on both
    /// sides. A bound widened past the representable range is open.
    #[must_use]
    pub fn contains(&self, now: DateTime<Utc>, skew: Duration) -> bool {
        let skew = skew.abs();
        let started = self
            .not_before
            .checked_sub_signed(skew)
            .map_or(true, |start| start <= now);
        let open = self
            .not_on_or_after
            .checked_add_signed(skew)
            .map_or(true, |end| now < end);
        started && open
    }
}
