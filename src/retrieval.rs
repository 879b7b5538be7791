// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Retrieval of ingested envelopes by correlation key.
//!
//! A key that is not yet in the store is waited on for at most the configured
//! timeout. [`RetrieveError::TimedOut`] means "not yet available": the log
//! may still be catching up, so callers should retry rather than treat the
//! key as unknown. Once ingestion has stopped no absent key can ever arrive,
//! which is reported as [`RetrieveError::IngestionUnavailable`] instead.

use std::sync::Arc;
use std::time::Duration;

use tracing::debug;

use crate::envelope::DecodedEnvelope;
use crate::ingestion::IngestionStatus;
use crate::ledger::TopicId;
use crate::models::CorrelationKey;
use crate::store::CorrelationStore;

/// Default bound on how long a retrieval waits for ingestion.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Default interval between store checks while waiting.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(250);

/// A decoded envelope and its viewer link.
#[derive(Debug, Clone)]
pub struct Retrieval {
    pub url: String,
    pub envelope: Arc<DecodedEnvelope>,
}

#[derive(Debug, thiserror::Error)]
pub enum RetrieveError {
    #[error("correlation key {key} not ingested within {waited:?}; the log may still be catching up")]
    TimedOut { key: CorrelationKey, waited: Duration },

    #[error("correlation key {key} is not ingested and ingestion is not running")]
    IngestionUnavailable { key: CorrelationKey },
}

pub struct RetrievalService {
    store: Arc<CorrelationStore>,
    ingestion: IngestionStatus,
    explorer_url: String,
    topic: TopicId,
    poll_interval: Duration,
    timeout: Duration,
}

impl RetrievalService {
    pub fn new(
        store: Arc<CorrelationStore>,
        ingestion: IngestionStatus,
        explorer_url: impl Into<String>,
        topic: TopicId,
    ) -> Self {
        Self {
            store,
            ingestion,
            explorer_url: explorer_url.into(),
            topic,
            poll_interval: DEFAULT_POLL_INTERVAL,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub async fn retrieve(&self, key: &CorrelationKey) -> Result<Retrieval, RetrieveError> {
        let envelope = match self.store.get(key) {
            Some(envelope) => envelope,
            None => {
                self.ensure_ingesting(key)?;
                debug!(correlation_key = %key, "Waiting for ingestion");
                match self
                    .store
                    .get_blocking(key, self.poll_interval, self.timeout)
                    .await
                {
                    Ok(envelope) => envelope,
                    Err(timed_out) => {
                        // Ingestion may have stopped while we waited.
                        self.ensure_ingesting(key)?;
                        return Err(RetrieveError::TimedOut {
                            key: key.clone(),
                            waited: timed_out.waited,
                        });
                    }
                }
            }
        };

        Ok(Retrieval {
            url: self.viewer_url(envelope.sequence_number()),
            envelope,
        })
    }

    fn ensure_ingesting(&self, key: &CorrelationKey) -> Result<(), RetrieveError> {
        if self.ingestion.accepts_submissions() {
            Ok(())
        } else {
            Err(RetrieveError::IngestionUnavailable { key: key.clone() })
        }
    }

    /// External explorer link for the entry at `sequence_number`.
    pub fn viewer_url(&self, sequence_number: u64) -> String {
        format!(
            "{}/topic/{}/message/{}",
            self.explorer_url.trim_end_matches('/'),
            self.topic,
            sequence_number
        )
    }
}
