// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Consensus Relay - Encrypted tracking events over an append-only log
//!
//! Browser tracking events are split into public and private fields, the
//! private part is sealed with AES-GCM, and the envelope is appended to a
//! consensus-ordered log. A background task consumes the log, decrypts each
//! entry and indexes it by correlation key so that `/retrieve` can return it.
//!
//! ## Modules
//!
//! - `api` - HTTP API handlers (Axum)
//! - `cipher` - AES-GCM sealing of the private section
//! - `envelope` - Wire format of submitted and ingested envelopes
//! - `ingestion` - Log subscriber feeding the correlation store
//! - `ledger` - Log collaborator traits and the in-process ledger
//! - `retrieval` - Bounded wait for ingested envelopes
//! - `store` - In-memory correlation store
//! - `submission` - Validation, encryption and append

pub mod api;
pub mod cipher;
pub mod config;
pub mod envelope;
pub mod error;
pub mod ingestion;
pub mod ledger;
pub mod models;
pub mod retrieval;
pub mod state;
pub mod store;
pub mod submission;
pub mod telemetry;
