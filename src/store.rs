// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Correlation Store
//!
//! In-process table mapping a correlation key to its decoded envelope.
//! The ingestion task is the only writer; retrieval requests are readers.
//!
//! ## Retention
//!
//! The table is bounded by an entry count (least-recently-used eviction) and
//! a per-entry time-to-live. Entries are not persisted across restarts.
//!
//! ## Blocking Lookup
//!
//! [`CorrelationStore::get_blocking`] polls on a tokio timer and is bounded by
//! an explicit timeout. Dropping the returned future (for example when the
//! HTTP client disconnects) cancels the wait.

use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use lru::LruCache;
use tokio::time::MissedTickBehavior;

use crate::envelope::DecodedEnvelope;
use crate::models::CorrelationKey;

/// Default maximum number of retained envelopes.
pub const DEFAULT_CAPACITY: usize = 10_000;

/// Default time-to-live for a retained envelope.
pub const DEFAULT_TTL: Duration = Duration::from_secs(3600);

/// Shortest poll interval accepted by [`CorrelationStore::get_blocking`].
const MIN_POLL_INTERVAL: Duration = Duration::from_millis(1);

struct StoredEnvelope {
    envelope: Arc<DecodedEnvelope>,
    inserted_at: Instant,
}

/// Returned by [`CorrelationStore::get_blocking`] when the key did not appear
/// in time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("timed out after {waited:?}")]
pub struct TimedOut {
    pub waited: Duration,
}

/// Concurrency-safe correlation table.
pub struct CorrelationStore {
    entries: Mutex<LruCache<CorrelationKey, StoredEnvelope>>,
    ttl: Duration,
}

impl CorrelationStore {
    /// Create a store holding at most `capacity` envelopes for `ttl` each.
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
            ttl,
        }
    }

    /// Insert or replace the envelope for `key` (last write wins).
    pub fn put(&self, key: CorrelationKey, envelope: DecodedEnvelope) {
        let evicted = self.lock().push(
            key.clone(),
            StoredEnvelope {
                envelope: Arc::new(envelope),
                inserted_at: Instant::now(),
            },
        );

        match evicted {
            Some((old_key, _)) if old_key == key => {
                tracing::warn!(correlation_key = %key, "Correlation key written twice; keeping latest");
            }
            Some((old_key, _)) => {
                tracing::debug!(correlation_key = %old_key, "Evicted least recently used envelope");
            }
            None => {}
        }
    }

    /// Look up `key` without waiting.
    ///
    /// Returns `None` if the key is absent or its entry has expired.
    pub fn get(&self, key: &CorrelationKey) -> Option<Arc<DecodedEnvelope>> {
        let mut entries = self.lock();
        if let Some(stored) = entries.get(key) {
            if stored.inserted_at.elapsed() < self.ttl {
                return Some(Arc::clone(&stored.envelope));
            }
            // Expired
            entries.pop(key);
        }
        None
    }

    /// Wait until `key` is present, checking every `poll_interval`, for at
    /// most `timeout`.
    pub async fn get_blocking(
        &self,
        key: &CorrelationKey,
        poll_interval: Duration,
        timeout: Duration,
    ) -> Result<Arc<DecodedEnvelope>, TimedOut> {
        let poll = async {
            let mut ticker = tokio::time::interval(poll_interval.max(MIN_POLL_INTERVAL));
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                if let Some(envelope) = self.get(key) {
                    return envelope;
                }
            }
        };

        tokio::time::timeout(timeout, poll)
            .await
            .map_err(|_| TimedOut { waited: timeout })
    }

    /// Number of retained entries, including expired ones not yet removed.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    // The guarded map is never left half-updated, so a poisoned lock is
    // still safe to use.
    fn lock(&self) -> MutexGuard<'_, LruCache<CorrelationKey, StoredEnvelope>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for CorrelationStore {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY, DEFAULT_TTL)
    }
}
