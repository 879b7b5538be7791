// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Log Ingestion
//!
//! Background task that drains the log subscription, decodes each entry and
//! publishes it into the [`CorrelationStore`].
//!
//! ## Failure Policy
//!
//! - **Undecodable entry** (malformed document, bad hex, failed
//!   authentication): logged at `error` with its sequence number and counted.
//!   The entry is skipped; a retrieval for its key will time out, so the log
//!   line is the only record of why.
//! - **Subscription error or end of stream**: fatal to ingestion. The task
//!   marks [`IngestionStatus`] as failed and exits. Submissions are refused
//!   from then on and the health endpoint reports `degraded`.
//!
//! ## Shutdown
//!
//! Uses `tokio_util::sync::CancellationToken`, following the same pattern as
//! the HTTP server's graceful shutdown.

mod status;

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

pub use status::{IngestionSnapshot, IngestionState, IngestionStatus};

use crate::cipher::CipherKey;
use crate::envelope::{decode_ingested_envelope, EnvelopeError};
use crate::ledger::{LogEntry, LogStream};
use crate::models::CorrelationKey;
use crate::store::CorrelationStore;

/// Consumes a log subscription into the correlation store.
pub struct Ingestor {
    store: Arc<CorrelationStore>,
    cipher_key: CipherKey,
    status: IngestionStatus,
}

impl Ingestor {
    pub fn new(store: Arc<CorrelationStore>, cipher_key: CipherKey, status: IngestionStatus) -> Self {
        Self {
            store,
            cipher_key,
            status,
        }
    }

    /// Run until the stream fails or the cancellation token is triggered.
    ///
    /// This should be spawned as a background task:
    /// ```rust,ignore
    /// tokio::spawn(ingestor.run(stream, shutdown.clone()));
    /// ```
    pub async fn run(self, mut stream: LogStream, shutdown: CancellationToken) {
        info!("Log ingestion starting");
        self.status.set_state(IngestionState::Running);

        loop {
            let delivery = tokio::select! {
                biased;
                _ = shutdown.cancelled() => {
                    info!("Log ingestion shutting down");
                    self.status.set_state(IngestionState::Stopped);
                    return;
                }
                delivery = stream.recv() => delivery,
            };

            match delivery {
                Some(Ok(entry)) => {
                    // Failures are logged and counted inside.
                    let _ = self.ingest_entry(entry);
                }
                Some(Err(e)) => {
                    error!(
                        error = %e,
                        last_sequence_number = self.status.snapshot().last_sequence_number,
                        "Log subscription failed; ingestion halted, new submissions will be refused"
                    );
                    self.status.set_state(IngestionState::Failed);
                    return;
                }
                None => {
                    error!("Log subscription ended unexpectedly; ingestion halted");
                    self.status.set_state(IngestionState::Failed);
                    return;
                }
            }
        }
    }

    /// Decode one entry and store it under its correlation key.
    pub fn ingest_entry(&self, entry: LogEntry) -> Result<CorrelationKey, EnvelopeError> {
        let sequence_number = entry.sequence_number;

        match decode_ingested_envelope(
            &entry.contents,
            sequence_number,
            entry.consensus_timestamp,
            &self.cipher_key,
        ) {
            Ok(envelope) => {
                let key = envelope.correlation_key().clone();
                self.store.put(key.clone(), envelope);
                self.status.record_ingested(sequence_number);
                debug!(
                    correlation_key = %key,
                    sequence_number,
                    "Ingested log entry"
                );
                Ok(key)
            }
            Err(e) => {
                self.status.record_rejected(sequence_number);
                error!(
                    sequence_number,
                    consensus_timestamp = %entry.consensus_timestamp,
                    error = %e,
                    "Rejected log entry; its correlation key will never become retrievable"
                );
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use chrono::{TimeZone, Utc};
    use tokio::sync::mpsc;

    use crate::cipher::CipherError;
    use crate::envelope::{build_submission_envelope, PrivateFields, PublicFields};
    use crate::ledger::LedgerError;

    fn key() -> CipherKey {
        CipherKey::new(b"0123456789abcdef".to_vec()).unwrap()
    }

    fn entry(correlation_key: &str, sequence_number: u64, cipher_key: &CipherKey) -> LogEntry {
        let raw = build_submission_envelope(
            PublicFields {
                event: "play".into(),
                timestamp: "t1".into(),
                tz_offset: "+0".into(),
            },
            &PrivateFields {
                secret_message: "note".into(),
                video_current_time: "10".into(),
                video_duration: "100".into(),
                video_url: "u".into(),
                user_agent: "ua".into(),
            },
            correlation_key.into(),
            cipher_key,
        )
        .unwrap();

        LogEntry {
            contents: raw.into_bytes(),
            sequence_number,
            consensus_timestamp: Utc.timestamp_opt(1_700_000_000, 0).unwrap(),
        }
    }

    fn ingestor() -> (Ingestor, Arc<CorrelationStore>, IngestionStatus) {
        let store = Arc::new(CorrelationStore::default());
        let status = IngestionStatus::default();
        (
            Ingestor::new(Arc::clone(&store), key(), status.clone()),
            store,
            status,
        )
    }

    #[test]
    fn ingest_entry_stores_decoded_envelope() {
        let (ingestor, store, status) = ingestor();

        let stored_key = ingestor.ingest_entry(entry("k1", 5, &key())).unwrap();

        assert_eq!(stored_key.as_str(), "k1");
        let envelope = store.get(&"k1".into()).unwrap();
        assert_eq!(envelope.private.secret_message, "note");
        assert_eq!(envelope.sequence_number(), 5);
        assert_eq!(status.snapshot().ingested, 1);
        assert_eq!(status.snapshot().last_sequence_number, Some(5));
    }

    #[test]
    fn foreign_key_entry_is_rejected_and_counted() {
        let (ingestor, store, status) = ingestor();
        let foreign = CipherKey::new(b"another-key-1234".to_vec()).unwrap();

        let err = ingestor.ingest_entry(entry("k1", 1, &foreign)).unwrap_err();

        assert!(matches!(
            err,
            EnvelopeError::Cipher(CipherError::AuthenticationFailure)
        ));
        assert!(store.is_empty());
        assert_eq!(status.snapshot().rejected, 1);
    }

    #[tokio::test]
    async fn run_continues_past_bad_entries() {
        let (ingestor, store, status) = ingestor();
        let (tx, rx) = mpsc::channel(8);
        let shutdown = CancellationToken::new();
        let task = tokio::spawn(ingestor.run(rx, shutdown.clone()));

        tx.send(Ok(LogEntry {
            contents: b"garbage".to_vec(),
            sequence_number: 1,
            consensus_timestamp: Utc::now(),
        }))
        .await
        .unwrap();
        tx.send(Ok(entry("k2", 2, &key()))).await.unwrap();

        let found = store
            .get_blocking(&"k2".into(), Duration::from_millis(10), Duration::from_secs(2))
            .await
            .unwrap();
        assert_eq!(found.sequence_number(), 2);

        shutdown.cancel();
        task.await.unwrap();
        let snapshot = status.snapshot();
        assert_eq!(snapshot.state, IngestionState::Stopped);
        assert_eq!(snapshot.ingested, 1);
        assert_eq!(snapshot.rejected, 1);
    }

    #[tokio::test]
    async fn stream_error_halts_ingestion() {
        let (ingestor, _store, status) = ingestor();
        let (tx, rx) = mpsc::channel(8);

        tx.send(Err(LedgerError::Lagged(3))).await.unwrap();
        ingestor.run(rx, CancellationToken::new()).await;

        assert_eq!(status.snapshot().state, IngestionState::Failed);
        assert!(!status.accepts_submissions());
    }

    #[tokio::test]
    async fn closed_stream_halts_ingestion() {
        let (ingestor, _store, status) = ingestor();
        let (tx, rx) = mpsc::channel::<Result<LogEntry, LedgerError>>(1);
        drop(tx);

        ingestor.run(rx, CancellationToken::new()).await;

        assert_eq!(status.snapshot().state, IngestionState::Failed);
    }
}
