//! Response envelope.

use chrono::{DateTime, Utc};

use super::{Assertion, EncryptedAssertion, ProtocolVersion};
use crate::signature::SignatureRecord;

/// Top-level status of a response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatusCode {
    /// The request succeeded.
    Success,
    /// The request could not be performed due to an error on the requester side.
    Requester,
    /// The request could not be performed due to an error on the responder side.
    Responder,
    /// Any other status value, kept verbatim.
    Other(String),
}

impl StatusCode {
    /// Returns the status value written for `protocol`.
    #[must_use]
    pub fn value(&self, protocol: ProtocolVersion) -> &str {
        match (self, protocol) {
            (Self::Success, ProtocolVersion::Saml20) => "urn:oasis:names:tc:SAML:2.0:status:Success",
            (Self::Requester, ProtocolVersion::Saml20) => {
                "urn:oasis:names:tc:SAML:2.0:status:Requester"
            }
            (Self::Responder, ProtocolVersion::Saml20) => {
                "urn:oasis:names:tc:SAML:2.0:status:Responder"
            }
            (Self::Success, ProtocolVersion::Saml11) => "samlp:Success",
            (Self::Requester, ProtocolVersion::Saml11) => "samlp:Requester",
            (Self::Responder, ProtocolVersion::Saml11) => "samlp:Responder",
            (Self::Other(value), _) => value,
        }
    }

    /// Parses a status value of either protocol.
    #[must_use]
    pub fn from_value(value: &str) -> Self {
        match value {
            "urn:oasis:names:tc:SAML:2.0:status:Success" | "samlp:Success" => Self::Success,
            "urn:oasis:names:tc:SAML:2.0:status:Requester" | "samlp:Requester" => Self::Requester,
            "urn:oasis:names:tc:SAML:2.0:status:Responder" | "samlp:Responder" => Self::Responder,
            other => Self::Other(other.to_string()),
        }
    }
}

/// The assertion carried by a response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssertionPayload {
    /// A plaintext assertion.
    Plain(Box<Assertion>),
    /// An encrypted assertion.
    Encrypted(EncryptedAssertion),
}

/// A response envelope delivering one assertion to a service provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    /// Unique identifier, also the signature reference target.
    pub id: String,
    /// Protocol version.
    pub protocol: ProtocolVersion,
    /// Time of issue.
    pub issue_instant: DateTime<Utc>,
    /// Issuer entity ID. SAML 1.1 responses carry none.
    pub issuer: Option<String>,
    /// Destination (SAML 2.0) or recipient (SAML 1.1) URL.
    pub destination: Option<String>,
    /// Identifier of the request this responds to.
    pub in_response_to: Option<String>,
    /// Top-level status.
    pub status: StatusCode,
    /// The carried assertion.
    pub payload: Option<AssertionPayload>,
    /// Enveloped signature over the whole response.
    pub signature: Option<SignatureRecord>,
}

impl Response {
    /// Creates a successful, unsigned response.
    #[must_use]
    pub fn success(protocol: ProtocolVersion, issuer: Option<String>) -> Self {
        Self {
            id: fedtrust_crypto::random::generate_xml_id(),
            protocol,
            issue_instant: Utc::now(),
            issuer,
            destination: None,
            in_response_to: None,
            status: StatusCode::Success,
            payload: None,
            signature: None,
        }
    }

    /// Sets the destination.
    #[must_use]
    pub fn with_destination(mut self, destination: impl Into<String>) -> Self {
        self.destination = Some(destination.into());
        self
    }

    /// Sets the payload.
    #[must_use]
    pub fn with_payload(mut self, payload: AssertionPayload) -> Self {
        self.payload = Some(payload);
        self
    }

    /// Returns the issuer of the response, falling back to the issuer of a
    /// plaintext assertion.
    #[must_use]
    pub fn effective_issuer(&self) -> Option<&str> {
        self.issuer.as_deref().or(match &self.payload {
            Some(AssertionPayload::Plain(assertion)) => assertion.issuer.as_deref(),
            _ => None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_values_per_protocol() {
        assert_eq!(
            StatusCode::Success.value(ProtocolVersion::Saml11),
            "samlp:Success"
        );
        assert_eq!(
            StatusCode::from_value("urn:oasis:names:tc:SAML:2.0:status:Success"),
            StatusCode::Success
        );
        assert_eq!(
            StatusCode::from_value("urn:x"),
            StatusCode::Other("urn:x".to_string())
        );
    }

    #[test]
    fn effective_issuer_falls_back_to_assertion() {
        let assertion = Assertion::new("https://idp.example.com", ProtocolVersion::Saml11);
        let response = Response::success(ProtocolVersion::Saml11, None)
            .with_payload(AssertionPayload::Plain(Box::new(assertion)));
        assert_eq!(response.effective_issuer(), Some("https://idp.example.com"));
    }
}
