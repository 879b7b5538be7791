// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Shared ingestion health, written by the ingestion task and read by the
//! submission pipeline and the health endpoints.

use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;

use serde::Serialize;
use utoipa::ToSchema;

/// Lifecycle of the ingestion task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum IngestionState {
    /// Subscribed but the task has not started consuming yet.
    Starting,
    Running,
    /// The subscription failed; nothing more will be ingested.
    Failed,
    /// Shut down on request.
    Stopped,
}

impl IngestionState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => IngestionState::Starting,
            1 => IngestionState::Running,
            2 => IngestionState::Failed,
            _ => IngestionState::Stopped,
        }
    }

    fn as_u8(self) -> u8 {
        match self {
            IngestionState::Starting => 0,
            IngestionState::Running => 1,
            IngestionState::Failed => 2,
            IngestionState::Stopped => 3,
        }
    }
}

/// Point-in-time view of [`IngestionStatus`].
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct IngestionSnapshot {
    pub state: IngestionState,
    /// Entries decoded and stored.
    pub ingested: u64,
    /// Entries that could not be decoded.
    pub rejected: u64,
    /// Sequence number of the last entry seen (stored or rejected).
    pub last_sequence_number: Option<u64>,
}

#[derive(Default)]
struct Counters {
    state: AtomicU8,
    ingested: AtomicU64,
    rejected: AtomicU64,
    // 0 means no entry seen yet; sequence numbers start at 1.
    last_sequence_number: AtomicU64,
}

/// Cheaply cloneable handle to the ingestion task's health.
#[derive(Clone, Default)]
pub struct IngestionStatus {
    counters: Arc<Counters>,
}

impl IngestionStatus {
    pub fn state(&self) -> IngestionState {
        IngestionState::from_u8(self.counters.state.load(Ordering::Acquire))
    }

    pub fn set_state(&self, state: IngestionState) {
        self.counters.state.store(state.as_u8(), Ordering::Release);
    }

    /// Whether newly submitted entries can still be ingested.
    pub fn accepts_submissions(&self) -> bool {
        matches!(
            self.state(),
            IngestionState::Starting | IngestionState::Running
        )
    }

    pub fn record_ingested(&self, sequence_number: u64) {
        self.counters.ingested.fetch_add(1, Ordering::Relaxed);
        self.counters
            .last_sequence_number
            .store(sequence_number, Ordering::Relaxed);
    }

    pub fn record_rejected(&self, sequence_number: u64) {
        self.counters.rejected.fetch_add(1, Ordering::Relaxed);
        self.counters
            .last_sequence_number
            .store(sequence_number, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> IngestionSnapshot {
        let last = self.counters.last_sequence_number.load(Ordering::Relaxed);
        IngestionSnapshot {
            state: self.state(),
            ingested: self.counters.ingested.load(Ordering::Relaxed),
            rejected: self.counters.rejected.load(Ordering::Relaxed),
            last_sequence_number: (last != 0).then_some(last),
        }
    }
}

impl std::fmt::Debug for IngestionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("IngestionStatus")
            .field(&self.snapshot())
            .finish()
    }
}
