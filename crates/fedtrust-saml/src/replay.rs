//! Replay detection.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use parking_lot::Mutex;

use crate::error::{SamlError, SamlResult};

/// Entry count above which claims start purging expired entries.
const PURGE_THRESHOLD: usize = 10_000;

/// Minimum time between two purges.
const PURGE_INTERVAL_SECS: i64 = 60;

/// Remembers message identifiers until they expire.
///
/// Implementations backed by shared storage may retry internally.
#[async_trait]
pub trait ReplayStore: Send + Sync {
    /// Returns true if `id` was recorded and has not expired.
    async fn seen(&self, id: &str) -> SamlResult<bool>;

    /// Records `id` until `expiry`.
    async fn record(&self, id: &str, expiry: DateTime<Utc>) -> SamlResult<()>;

    /// Records `id`, failing if it was already seen.
    ///
    /// The default is not atomic; stores that can do better override it.
    ///
    /// # Errors
    ///
    /// Returns `ReplayDetected` if `id` is still recorded.
    async fn check_and_record(&self, id: &str, expiry: DateTime<Utc>) -> SamlResult<()> {
        if self.seen(id).await? {
            return Err(SamlError::ReplayDetected(id.to_string()));
        }
        self.record(id, expiry).await
    }
}

/// Process-local replay store.
///
/// Expired entries are purged by claims once the store holds more than a
/// threshold of entries, at most once per purge interval.
#[derive(Debug)]
pub struct InMemoryReplayStore {
    entries: DashMap<String, DateTime<Utc>>,
    purge_threshold: usize,
    purge_interval: Duration,
    next_purge: Mutex<DateTime<Utc>>,
}

impl Default for InMemoryReplayStore {
    fn default() -> Self {
        Self {
            entries: DashMap::new(),
            purge_threshold: PURGE_THRESHOLD,
            purge_interval: Duration::seconds(PURGE_INTERVAL_SECS),
            next_purge: Mutex::new(DateTime::<Utc>::MIN_UTC),
        }
    }
}

impl InMemoryReplayStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the entry count that enables purging and the minimum time
    /// between purges.
    #[must_use]
    pub fn with_purge_policy(mut self, threshold: usize, interval: Duration) -> Self {
        self.purge_threshold = threshold;
        self.purge_interval = interval.abs();
        self
    }

    /// Drops expired entries and returns how many were removed.
    pub fn purge_expired(&self, now: DateTime<Utc>) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, expiry| *expiry > now);
        before.saturating_sub(self.entries.len())
    }

    /// Returns the number of recorded identifiers, expired ones included.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if nothing is recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn purge_if_due(&self, now: DateTime<Utc>) {
        if self.entries.len() <= self.purge_threshold {
            return;
        }
        // Another claim holding the lock is already purging.
        let Some(mut next_purge) = self.next_purge.try_lock() else {
            return;
        };
        if now < *next_purge {
            return;
        }
        *next_purge = now
            .checked_add_signed(self.purge_interval)
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        let purged = self.purge_expired(now);
        tracing::debug!(purged, remaining = self.entries.len(), "expired replay entries purged");
    }

    fn check_and_record_at(
        &self,
        id: &str,
        expiry: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> SamlResult<()> {
        self.purge_if_due(now);
        match self.entries.entry(id.to_string()) {
            Entry::Occupied(mut entry) => {
                if *entry.get() > now {
                    return Err(SamlError::ReplayDetected(id.to_string()));
                }
                entry.insert(expiry);
            }
            Entry::Vacant(entry) => {
                entry.insert(expiry);
            }
        }
        Ok(())
    }
}

#[async_trait]
impl ReplayStore for InMemoryReplayStore {
    async fn seen(&self, id: &str) -> SamlResult<bool> {
        let now = Utc::now();
        Ok(self.entries.get(id).is_some_and(|expiry| *expiry > now))
    }

    async fn record(&self, id: &str, expiry: DateTime<Utc>) -> SamlResult<()> {
        self.entries.insert(id.to_string(), expiry);
        Ok(())
    }

    async fn check_and_record(&self, id: &str, expiry: DateTime<Utc>) -> SamlResult<()> {
        self.check_and_record_at(id, expiry, Utc::now())
    }
}
