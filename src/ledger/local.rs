// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! In-process append-only log.
//!
//! Behaves like a single consensus topic: appends are queued and only become
//! visible to subscribers after `finality_delay`, each committed entry gets
//! the next sequence number (starting at 1) and a strictly increasing
//! consensus timestamp. New subscribers replay the committed log before
//! receiving live entries.

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{TimeDelta, Utc};
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::sync::mpsc;

use super::types::*;
use super::{LogAppender, LogSource};
use crate::models::CorrelationKey;

/// Live entries buffered per subscriber before it is considered lagging.
const LIVE_BUFFER: usize = 1024;

/// Capacity of the channel handed to each subscriber.
const SUBSCRIPTION_BUFFER: usize = 256;

const NANOS_PER_SEC: i64 = 1_000_000_000;

/// Single-topic in-memory ledger.
#[derive(Clone)]
pub struct LocalLedger {
    inner: Arc<Inner>,
}

struct Inner {
    topic: TopicId,
    operator: String,
    finality_delay: Duration,
    log: Mutex<Vec<LogEntry>>,
    live: broadcast::Sender<LogEntry>,
    last_valid_start: AtomicI64,
}

impl LocalLedger {
    /// Create a ledger for `topic`. Correlation ids are minted on behalf of
    /// `operator` (an account id such as `0.0.2`).
    pub fn new(topic: TopicId, operator: impl Into<String>, finality_delay: Duration) -> Self {
        let (live, _) = broadcast::channel(LIVE_BUFFER);
        Self {
            inner: Arc::new(Inner {
                topic,
                operator: operator.into(),
                finality_delay,
                log: Mutex::new(Vec::new()),
                live,
                last_valid_start: AtomicI64::new(i64::MIN),
            }),
        }
    }

    pub fn topic(&self) -> &TopicId {
        &self.inner.topic
    }

    /// Number of entries that have reached consensus.
    pub fn len(&self) -> usize {
        self.inner.lock_log().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock_log().is_empty()
    }
}

impl Inner {
    fn lock_log(&self) -> MutexGuard<'_, Vec<LogEntry>> {
        self.log.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Assign sequence number and consensus time, then publish.
    fn commit(&self, contents: Vec<u8>) -> LogEntry {
        let mut log = self.lock_log();

        let now = Utc::now();
        let consensus_timestamp = match log.last() {
            Some(previous) if previous.consensus_timestamp >= now => {
                previous.consensus_timestamp + TimeDelta::nanoseconds(1)
            }
            _ => now,
        };

        let entry = LogEntry {
            contents,
            sequence_number: log.len() as u64 + 1,
            consensus_timestamp,
        };
        log.push(entry.clone());

        // Published under the log lock so a concurrent subscribe never sees
        // an entry both in its backlog and on the live channel.
        let _ = self.live.send(entry.clone());
        entry
    }
}

#[async_trait]
impl LogAppender for LocalLedger {
    /// Transaction-id style key: `<operator>@<seconds>.<nanoseconds>`, with
    /// the valid-start instant forced to be strictly increasing.
    fn reserve_id(&self) -> CorrelationKey {
        let now = Utc::now().timestamp_nanos_opt().unwrap_or(i64::MAX);
        let (Ok(previous) | Err(previous)) = self.inner.last_valid_start.fetch_update(
            Ordering::SeqCst,
            Ordering::SeqCst,
            |previous| Some(now.max(previous.saturating_add(1))),
        );
        let valid_start = now.max(previous.saturating_add(1));

        CorrelationKey(format!(
            "{}@{}.{:09}",
            self.inner.operator,
            valid_start.div_euclid(NANOS_PER_SEC),
            valid_start.rem_euclid(NANOS_PER_SEC)
        ))
    }

    async fn append(&self, id: &CorrelationKey, contents: Vec<u8>) -> Result<(), AppendError> {
        if contents.len() > MAX_MESSAGE_BYTES {
            return Err(AppendError::MessageTooLarge {
                size: contents.len(),
                limit: MAX_MESSAGE_BYTES,
            });
        }

        let inner = Arc::clone(&self.inner);
        let id = id.clone();
        tokio::spawn(async move {
            if !inner.finality_delay.is_zero() {
                tokio::time::sleep(inner.finality_delay).await;
            }
            let entry = inner.commit(contents);
            tracing::debug!(
                correlation_key = %id,
                topic = %inner.topic,
                sequence_number = entry.sequence_number,
                "Entry reached consensus"
            );
        });

        Ok(())
    }
}

#[async_trait]
impl LogSource for LocalLedger {
    async fn subscribe(&self, topic: &TopicId) -> Result<LogStream, LedgerError> {
        if *topic != self.inner.topic {
            return Err(LedgerError::UnknownTopic(topic.to_string()));
        }

        let (backlog, mut live) = {
            let log = self.inner.lock_log();
            (log.clone(), self.inner.live.subscribe())
        };

        let (tx, rx) = mpsc::channel(SUBSCRIPTION_BUFFER);
        tokio::spawn(async move {
            for entry in backlog {
                if tx.send(Ok(entry)).await.is_err() {
                    return;
                }
            }

            loop {
                let next = tokio::select! {
                    next = live.recv() => next,
                    _ = tx.closed() => return,
                };

                let item = match next {
                    Ok(entry) => Ok(entry),
                    Err(RecvError::Lagged(missed)) => Err(LedgerError::Lagged(missed)),
                    Err(RecvError::Closed) => Err(LedgerError::Closed),
                };
                let terminal = item.is_err();
                if tx.send(item).await.is_err() || terminal {
                    return;
                }
            }
        });

        Ok(rx)
    }
}
