//! Audit events for assertion production and consumption.
//!
//! Audit records are write-once and append-only: the engine emits them to an
//! [`AuditSink`] and never reads them back. Every record carries:
//! - Timestamp (ISO 8601)
//! - Stable audit code
//! - Issuing IdP and receiving SP entity IDs
//! - Protocol name
//! - Outcome (success/error) and a human-readable detail

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Stable audit codes.
///
/// The string form returned by [`AuditCode::as_str`] is part of the audit
/// contract and must not change between releases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditCode {
    // Success codes
    /// An inbound assertion passed every check and was accepted.
    ValidAssertionAccepted,
    /// An outbound assertion was built and emitted.
    AssertionProduced,

    // Error codes
    /// Metadata lacked a required entity, descriptor, or endpoint.
    TrustResolutionFailed,
    /// Fatal misconfiguration.
    ConfigurationInvalid,
    /// Assertion encryption failed.
    EncryptionFailed,
    /// Assertion decryption failed.
    DecryptionFailed,
    /// The signature structure was unusable.
    SignatureStructureInvalid,
    /// The signature did not verify.
    SignatureInvalid,
    /// The assertion was malformed or had the wrong version or destination.
    AssertionInvalid,
    /// The issuer is not a trusted entity.
    UnknownIssuer,
    /// The assertion carried no validity window.
    MissingTimeframe,
    /// The current time is outside the validity window.
    ExpiredOrPremature,
    /// The assertion carried no subject.
    MissingSubject,
    /// The assertion identifier was already seen.
    ReplayDetected,
    /// Any other internal failure.
    InternalError,
}

impl AuditCode {
    /// Returns the stable string form of this code.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::ValidAssertionAccepted => "VALID_ASSERTION_ACCEPTED",
            Self::AssertionProduced => "ASSERTION_PRODUCED",
            Self::TrustResolutionFailed => "TRUST_RESOLUTION_FAILED",
            Self::ConfigurationInvalid => "CONFIGURATION_INVALID",
            Self::EncryptionFailed => "ENCRYPTION_FAILED",
            Self::DecryptionFailed => "DECRYPTION_FAILED",
            Self::SignatureStructureInvalid => "SIGNATURE_STRUCTURE_INVALID",
            Self::SignatureInvalid => "SIGNATURE_INVALID",
            Self::AssertionInvalid => "ASSERTION_INVALID",
            Self::UnknownIssuer => "UNKNOWN_ISSUER",
            Self::MissingTimeframe => "MISSING_TIMEFRAME",
            Self::ExpiredOrPremature => "EXPIRED_OR_PREMATURE",
            Self::MissingSubject => "MISSING_SUBJECT",
            Self::ReplayDetected => "REPLAY_DETECTED",
            Self::InternalError => "INTERNAL_ERROR",
        }
    }

    /// Returns the default human-readable description of this code.
    #[must_use]
    pub const fn description(&self) -> &'static str {
        match self {
            Self::ValidAssertionAccepted => "valid assertion accepted",
            Self::AssertionProduced => "assertion produced",
            Self::TrustResolutionFailed => "trust resolution failed",
            Self::ConfigurationInvalid => "invalid configuration",
            Self::EncryptionFailed => "assertion encryption failed",
            Self::DecryptionFailed => "assertion decryption failed",
            Self::SignatureStructureInvalid => "signature structure invalid",
            Self::SignatureInvalid => "signature invalid",
            Self::AssertionInvalid => "assertion invalid",
            Self::UnknownIssuer => "unknown issuer",
            Self::MissingTimeframe => "assertion timeframe missing",
            Self::ExpiredOrPremature => "assertion expired or not yet valid",
            Self::MissingSubject => "assertion subject missing",
            Self::ReplayDetected => "assertion replay detected",
            Self::InternalError => "internal error",
        }
    }

    /// Returns true for codes reported on the success path.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self, Self::ValidAssertionAccepted | Self::AssertionProduced)
    }
}

impl std::fmt::Display for AuditCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of an audited operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuditOutcome {
    /// Operation succeeded.
    Success,
    /// Operation failed.
    Error,
}

/// A single audit record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEvent {
    /// Unique event identifier.
    pub id: Uuid,
    /// Timestamp of the event.
    pub timestamp: DateTime<Utc>,
    /// Stable audit code.
    pub code: AuditCode,
    /// Entity ID of the identity provider involved.
    pub actor_idp: String,
    /// Protocol name (for example `SAML2.0`).
    pub protocol: String,
    /// Entity ID of the service provider involved.
    pub actor_sp: String,
    /// Human-readable detail.
    pub detail: String,
    /// Outcome of the operation.
    pub outcome: AuditOutcome,
}

impl AuditEvent {
    /// Creates a success event with the code's default description.
    #[must_use]
    pub fn success(
        code: AuditCode,
        actor_idp: impl Into<String>,
        protocol: impl Into<String>,
        actor_sp: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            code,
            actor_idp: actor_idp.into(),
            protocol: protocol.into(),
            actor_sp: actor_sp.into(),
            detail: code.description().to_string(),
            outcome: AuditOutcome::Success,
        }
    }

    /// Creates an error event.
    #[must_use]
    pub fn error(
        code: AuditCode,
        actor_idp: impl Into<String>,
        protocol: impl Into<String>,
        actor_sp: impl Into<String>,
        detail: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            code,
            actor_idp: actor_idp.into(),
            protocol: protocol.into(),
            actor_sp: actor_sp.into(),
            detail: detail.into(),
            outcome: AuditOutcome::Error,
        }
    }
}

/// Destination for audit events.
///
/// Implementations may write to log files, consoles, mail relays, or queues.
/// `emit` must not fail the calling operation; sinks handle their own
/// delivery errors.
pub trait AuditSink: Send + Sync {
    /// Records one event.
    fn emit(&self, event: AuditEvent);
}

// ============================================================================
// Tracing Sink
// ============================================================================

/// Audit sink that writes to the tracing framework under the
/// `fedtrust::audit` target.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingAuditSink;

impl TracingAuditSink {
    /// Creates a new tracing sink.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl AuditSink for TracingAuditSink {
    fn emit(&self, event: AuditEvent) {
        match event.outcome {
            AuditOutcome::Success => tracing::info!(
                target: "fedtrust::audit",
                event_id = %event.id,
                code = %event.code,
                actor_idp = %event.actor_idp,
                protocol = %event.protocol,
                actor_sp = %event.actor_sp,
                detail = %event.detail,
                "audit"
            ),
            AuditOutcome::Error => tracing::warn!(
                target: "fedtrust::audit",
                event_id = %event.id,
                code = %event.code,
                actor_idp = %event.actor_idp,
                protocol = %event.protocol,
                actor_sp = %event.actor_sp,
                detail = %event.detail,
                "audit"
            ),
        }
    }
}

// ============================================================================
// In-Memory Sink (for testing)
// ============================================================================

/// In-memory audit sink for testing.
#[derive(Debug, Default)]
pub struct InMemoryAuditSink {
    events: RwLock<Vec<AuditEvent>>,
}

impl InMemoryAuditSink {
    /// Creates a new in-memory sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns all recorded events.
    #[must_use]
    pub fn events(&self) -> Vec<AuditEvent> {
        self.events.read().clone()
    }

    /// Returns the number of recorded events.
    #[must_use]
    pub fn len(&self) -> usize {
        self.events.read().len()
    }

    /// Returns true when no event was recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.read().is_empty()
    }

    /// Clears all recorded events.
    pub fn clear(&self) {
        self.events.write().clear();
    }
}

impl AuditSink for InMemoryAuditSink {
    fn emit(&self, event: AuditEvent) {
        self.events.write().push(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn success_event_uses_code_description() {
        let event = AuditEvent::success(
            AuditCode::ValidAssertionAccepted,
            "https://idp.example.com",
            "SAML2.0",
            "https://sp.example.com",
        );
        assert_eq!(event.outcome, AuditOutcome::Success);
        assert_eq!(event.detail, "valid assertion accepted");
    }

    #[test]
    fn error_event_keeps_detail() {
        let event = AuditEvent::error(
            AuditCode::ExpiredOrPremature,
            "idp",
            "SAML2.0",
            "sp",
            "assertion expired",
        );
        assert_eq!(event.outcome, AuditOutcome::Error);
        assert_eq!(event.code.as_str(), "EXPIRED_OR_PREMATURE");
        assert_eq!(event.detail, "assertion expired");
    }

    #[test]
    fn code_serializes_to_stable_form() {
        let json = serde_json::to_string(&AuditCode::ReplayDetected).unwrap();
        assert_eq!(json, "\"REPLAY_DETECTED\"");
        assert!(AuditCode::AssertionProduced.is_success());
        assert!(!AuditCode::UnknownIssuer.is_success());
    }

    #[test]
    fn in_memory_sink_records_in_order() {
        let sink = InMemoryAuditSink::new();
        assert!(sink.is_empty());
        sink.emit(AuditEvent::success(AuditCode::AssertionProduced, "a", "p", "b"));
        sink.emit(AuditEvent::error(AuditCode::MissingSubject, "a", "p", "b", "x"));

        let events = sink.events();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].code, AuditCode::AssertionProduced);
        assert_eq!(events[1].code, AuditCode::MissingSubject);

        sink.clear();
        assert_eq!(sink.len(), 0);
    }
}
