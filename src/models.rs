// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # API Data Models
//!
//! Request and response structures used by the HTTP API, plus the
//! [`CorrelationKey`] newtype shared by every layer.
//!
//! ## Correlation Key
//!
//! The key is minted by the log appender before the append is durable (for a
//! consensus ledger this is the transaction id, e.g.
//! `0.0.2@1700000000.000000001`). It is returned to the client immediately and
//! later used to look up the decoded envelope.

use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::envelope::DecodedEnvelope;

// =============================================================================
// Correlation Key
// =============================================================================

/// Identifier joining a submission to its later ingestion.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CorrelationKey(pub String);

impl CorrelationKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for CorrelationKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for CorrelationKey {
    fn from(value: String) -> Self {
        CorrelationKey(value)
    }
}

impl From<&str> for CorrelationKey {
    fn from(value: &str) -> Self {
        CorrelationKey(value.to_string())
    }
}

impl From<CorrelationKey> for String {
    fn from(value: CorrelationKey) -> Self {
        value.0
    }
}

// =============================================================================
// Tracking Submission
// =============================================================================

/// Raw tracking fields as sent by the browser client.
///
/// Every field is optional at the extractor level so that a missing field is
/// reported by name instead of as a generic query rejection.
#[derive(Debug, Clone, Default, Serialize, Deserialize, IntoParams, ToSchema)]
#[into_params(parameter_in = Query)]
pub struct TrackingForm {
    /// Event name (e.g. `play`, `pause`).
    pub event: Option<String>,
    /// Client-side timestamp of the event.
    #[serde(rename = "localTimestamp")]
    pub local_timestamp: Option<String>,
    /// Client timezone offset.
    #[serde(rename = "tzOffset")]
    pub tz_offset: Option<String>,
    /// Free-text note (encrypted).
    #[serde(rename = "additionalInfo")]
    pub additional_info: Option<String>,
    /// Current video position (encrypted).
    #[serde(rename = "videoCT")]
    pub video_current_time: Option<String>,
    /// Video duration (encrypted).
    #[serde(rename = "videoDuration")]
    pub video_duration: Option<String>,
    /// Video URL (encrypted).
    #[serde(rename = "videoUrl")]
    pub video_url: Option<String>,
    /// Client user agent (encrypted).
    #[serde(rename = "userAgent")]
    pub user_agent: Option<String>,
}

// =============================================================================
// Retrieval
// =============================================================================

/// Query parameters accepted by `GET /retrieve`.
///
/// The original browser client sends the key as the bare query string
/// (`/retrieve?0.0.2%401700000000.000000001`); `?key=` is accepted as well.
#[derive(Debug, Clone, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct RetrieveQuery {
    /// Correlation key returned by `/track`.
    pub key: Option<String>,
}

/// A decoded envelope together with its external viewer link.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct RetrieveResponse {
    /// Explorer URL for the log entry.
    pub url: String,
    /// The decoded envelope (public, decrypted private, log metadata).
    pub message: DecodedEnvelope,
}
