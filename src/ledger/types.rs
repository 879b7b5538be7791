// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Ledger types and constants.

use chrono::{DateTime, Utc};
use tokio::sync::mpsc;

/// Maximum size of a single log message in bytes.
///
/// Matches the consensus service's transaction size limit; the relay does not
/// split envelopes into chunks.
pub const MAX_MESSAGE_BYTES: usize = 6 * 1024;

/// Identifier of the log topic entries are appended to (e.g. `0.0.48213`).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TopicId(pub String);

impl TopicId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for TopicId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for TopicId {
    fn from(value: &str) -> Self {
        TopicId(value.to_string())
    }
}

impl From<String> for TopicId {
    fn from(value: String) -> Self {
        TopicId(value)
    }
}

/// One entry delivered by a log subscription.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEntry {
    /// Raw message bytes as appended.
    pub contents: Vec<u8>,
    /// Position in the topic, starting at 1.
    pub sequence_number: u64,
    /// Time at which the entry reached consensus.
    pub consensus_timestamp: DateTime<Utc>,
}

/// Stream of entries (in log order) and out-of-band subscription errors.
///
/// An `Err` item ends the subscription; no further items follow it.
pub type LogStream = mpsc::Receiver<Result<LogEntry, LedgerError>>;

/// Errors raised when handing an entry to the log.
#[derive(Debug, thiserror::Error)]
pub enum AppendError {
    #[error("message of {size} bytes exceeds the {limit} byte limit")]
    MessageTooLarge { size: usize, limit: usize },

    #[error("ledger unavailable: {0}")]
    Unavailable(String),
}

/// Errors on the subscription side of the log.
#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    #[error("unknown topic: {0}")]
    UnknownTopic(String),

    #[error("subscriber fell behind and missed {0} entries")]
    Lagged(u64),

    #[error("log subscription closed")]
    Closed,
}
