//! Assertion lifecycle validation.
//!
//! Checks run in a fixed order and stop at the first failure: version,
//! issuer, timeframe, subject, destination, then replay. A failed check is
//! terminal for the assertion.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use fedtrust_core::config::ValidationConfig;

use crate::error::{SamlError, SamlResult};
use crate::metadata::MetadataTrustResolver;
use crate::replay::{InMemoryReplayStore, ReplayStore};
use crate::types::{Assertion, ProtocolVersion};

/// Default replay retention when the assertion window ends sooner.
const DEFAULT_RETENTION_SECS: i64 = 3600;

/// Validates inbound assertions against trust and time.
pub struct LifecycleValidator {
    protocol: ProtocolVersion,
    resolver: Arc<MetadataTrustResolver>,
    replay_store: Arc<dyn ReplayStore>,
    clock_skew: Duration,
    retention: Duration,
    expected_destination: Option<String>,
}

impl std::fmt::Debug for LifecycleValidator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LifecycleValidator")
            .field("protocol", &self.protocol)
            .field("clock_skew", &self.clock_skew)
            .field("retention", &self.retention)
            .field("expected_destination", &self.expected_destination)
            .finish_non_exhaustive()
    }
}

impl LifecycleValidator {
    /// Creates a validator with no clock skew and an in-memory replay store.
    #[must_use]
    pub fn new(protocol: ProtocolVersion, resolver: Arc<MetadataTrustResolver>) -> Self {
        Self {
            protocol,
            resolver,
            replay_store: Arc::new(InMemoryReplayStore::new()),
            clock_skew: Duration::zero(),
            retention: Duration::seconds(DEFAULT_RETENTION_SECS),
            expected_destination: None,
        }
    }

    /// Applies skew and retention from configuration. Values beyond the
    /// representable range saturate.
    #[must_use]
    pub fn with_config(self, config: &ValidationConfig) -> Self {
        let skew = Duration::from_std(config.clock_skew()).unwrap_or(Duration::MAX);
        let retention = Duration::from_std(config.replay_retention()).unwrap_or(Duration::MAX);
        self.with_clock_skew(skew).with_retention(retention)
    }

    /// Sets the symmetric clock skew allowance.
    #[must_use]
    pub fn with_clock_skew(mut self, skew: Duration) -> Self {
        self.clock_skew = skew.abs();
        self
    }

    /// Sets the minimum time an identifier is remembered.
    #[must_use]
    pub const fn with_retention(mut self, retention: Duration) -> Self {
        self.retention = retention;
        self
    }

    /// Sets the endpoint the subject confirmation must name, if it names one.
    #[must_use]
    pub fn with_expected_destination(mut self, destination: impl Into<String>) -> Self {
        self.expected_destination = Some(destination.into());
        self
    }

    /// Uses a shared replay store.
    #[must_use]
    pub fn with_replay_store(mut self, store: Arc<dyn ReplayStore>) -> Self {
        self.replay_store = store;
        self
    }

    /// Returns the protocol version assertions must carry.
    #[must_use]
    pub const fn protocol(&self) -> ProtocolVersion {
        self.protocol
    }

    /// Validates `assertion` at the current time.
    ///
    /// # Errors
    ///
    /// Returns the error of the first failing check.
    pub async fn validate(&self, assertion: &Assertion) -> SamlResult<()> {
        self.validate_at(assertion, Utc::now()).await
    }

    /// Validates `assertion` as of `now`.
    ///
    /// # Errors
    ///
    /// Returns `InvalidAssertion` for a version or destination mismatch,
    /// `UnknownIssuer`, `MissingTimeframe`, `ExpiredOrPremature`,
    /// `MissingSubject`, or `ReplayDetected`.
    pub async fn validate_at(&self, assertion: &Assertion, now: DateTime<Utc>) -> SamlResult<()> {
        self.check_version(assertion)?;
        self.check_issuer(assertion)?;
        let not_on_or_after = self.check_timeframe(assertion, now)?;
        Self::check_subject(assertion)?;
        self.check_destination(assertion)?;

        let expiry = saturating_add(not_on_or_after, self.clock_skew)
            .max(saturating_add(now, self.retention));
        self.replay_store
            .check_and_record(&assertion.id, expiry)
            .await?;

        tracing::debug!(assertion_id = %assertion.id, "assertion passed lifecycle checks");
        Ok(())
    }

    fn check_version(&self, assertion: &Assertion) -> SamlResult<()> {
        if assertion.protocol == self.protocol {
            Ok(())
        } else {
            Err(SamlError::InvalidAssertion(format!(
                "expected {} but assertion is {}",
                self.protocol, assertion.protocol
            )))
        }
    }

    fn check_issuer(&self, assertion: &Assertion) -> SamlResult<()> {
        let issuer = assertion
            .issuer
            .as_deref()
            .filter(|i| !i.is_empty())
            .ok_or_else(|| SamlError::UnknownIssuer("assertion has no issuer".to_string()))?;
        self.resolver
            .resolve_identity_provider(issuer, self.protocol)
            .map_err(|e| SamlError::UnknownIssuer(format!("{issuer}: {e}")))?;
        Ok(())
    }

    fn check_timeframe(
        &self,
        assertion: &Assertion,
        now: DateTime<Utc>,
    ) -> SamlResult<DateTime<Utc>> {
        let validity = assertion.validity.ok_or(SamlError::MissingTimeframe)?;
        if !validity.contains(now, self.clock_skew) {
            return Err(SamlError::ExpiredOrPremature(format!(
                "window [{}, {}) does not contain {now}",
                validity.not_before(),
                validity.not_on_or_after()
            )));
        }
        Ok(validity.not_on_or_after())
    }

    fn check_subject(assertion: &Assertion) -> SamlResult<()> {
        match &assertion.subject {
            Some(subject) if !subject.identifier.is_empty() => Ok(()),
            _ => Err(SamlError::MissingSubject),
        }
    }

    fn check_destination(&self, assertion: &Assertion) -> SamlResult<()> {
        let (Some(expected), Some(destination)) = (
            self.expected_destination.as_deref(),
            assertion.subject.as_ref().and_then(|s| s.destination.as_deref()),
        ) else {
            return Ok(());
        };
        if expected == destination {
            Ok(())
        } else {
            Err(SamlError::InvalidAssertion(format!(
                "assertion addressed to {destination}, expected {expected}"
            )))
        }
    }
}

fn saturating_add(instant: DateTime<Utc>, span: Duration) -> DateTime<Utc> {
    instant.checked_add_signed(span).unwrap_or(if span < Duration::zero() {
        DateTime::<Utc>::MIN_UTC
    } else {
        DateTime::<Utc>::MAX_UTC
    })
}
