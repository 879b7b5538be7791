// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Consensus log integration.
//!
//! This module defines the two collaborator seams the relay depends on:
//! - [`LogAppender`]: reserves correlation ids and queues appends
//! - [`LogSource`]: subscribes to a topic and streams entries in log order
//!
//! [`LocalLedger`] implements both in-process.

pub mod local;
pub mod types;

use async_trait::async_trait;

pub use local::LocalLedger;
pub use types::*;

use crate::models::CorrelationKey;

/// Write side of the log.
#[async_trait]
pub trait LogAppender: Send + Sync {
    /// Mint an id that is unique and usable as a correlation key before the
    /// append that carries it is durable.
    fn reserve_id(&self) -> CorrelationKey;

    /// Queue `contents` for appending under `id`.
    ///
    /// Returns once the entry has been handed off; consensus is not awaited.
    async fn append(&self, id: &CorrelationKey, contents: Vec<u8>) -> Result<(), AppendError>;
}

/// Read side of the log.
#[async_trait]
pub trait LogSource: Send + Sync {
    /// Subscribe to `topic`, receiving entries in log order.
    async fn subscribe(&self, topic: &TopicId) -> Result<LogStream, LedgerError>;
}
