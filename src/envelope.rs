// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Envelope Codec
//!
//! Builds the JSON document appended to the log and decodes it again on the
//! ingestion side.
//!
//! ## Submission Form
//!
//! ```json
//! {
//!   "public":  { "event": "play", "timestamp": "t1", "tzOffset": "+0",
//!                "transactionId": "0.0.2@1700000000.000000001" },
//!   "private": "<hex(nonce || ciphertext || tag)>"
//! }
//! ```
//!
//! ## Ingested Form
//!
//! ```json
//! {
//!   "public":  { ... },
//!   "private": { "secretMessage": "note", "videoCurrentTime": "10", ... },
//!   "logMetadata": { "consensusTimestamp": 1700000000000000000,
//!                    "consensusTimestampReadable": "2023-11-14 22:13:20",
//!                    "sequenceNumber": 7 }
//! }
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::cipher::{self, CipherError, CipherKey};
use crate::models::CorrelationKey;

/// Whole-second part of `consensusTimestampReadable`.
const READABLE_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Fractional digits kept in `consensusTimestampReadable`.
const READABLE_FRACTION_DIGITS: usize = 8;

/// Cleartext fields visible on the ledger.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
pub struct PublicFields {
    pub event: String,
    pub timestamp: String,
    #[serde(rename = "tzOffset")]
    pub tz_offset: String,
}

/// Sensitive fields, encrypted end-to-end between submission and ingestion.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PrivateFields {
    pub secret_message: String,
    pub video_current_time: String,
    pub video_duration: String,
    pub video_url: String,
    pub user_agent: String,
}

/// The `public` section: cleartext fields plus the correlation key.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
pub struct PublicSection {
    #[serde(flatten)]
    pub fields: PublicFields,
    #[serde(rename = "transactionId")]
    pub correlation_key: CorrelationKey,
}

/// Envelope as written to the log.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
pub struct SubmissionEnvelope {
    pub public: PublicSection,
    /// Hex-encoded `nonce || ciphertext || tag` of the JSON private fields.
    pub private: String,
}

/// Metadata assigned by the log, attached only on ingestion.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct LogMetadata {
    /// Consensus timestamp in nanoseconds since the Unix epoch.
    pub consensus_timestamp: i64,
    pub consensus_timestamp_readable: String,
    pub sequence_number: u64,
}

impl LogMetadata {
    pub fn new(sequence_number: u64, consensus_instant: DateTime<Utc>) -> Self {
        Self {
            // Saturates outside the i64 nanosecond range (years 1677..2262).
            consensus_timestamp: consensus_instant.timestamp_nanos_opt().unwrap_or(i64::MAX),
            consensus_timestamp_readable: readable_timestamp(consensus_instant),
            sequence_number,
        }
    }
}

/// UTC `YYYY-MM-DD HH:MM:SS` followed by up to eight truncated fractional
/// digits with trailing zeros removed (no dot for a whole second).
fn readable_timestamp(instant: DateTime<Utc>) -> String {
    let mut readable = instant.format(READABLE_TIMESTAMP_FORMAT).to_string();

    // Leap seconds report nanos >= 1e9.
    let nanos = instant.timestamp_subsec_nanos() % 1_000_000_000;
    let fraction = format!("{:0width$}", nanos / 10, width = READABLE_FRACTION_DIGITS);
    let fraction = fraction.trim_end_matches('0');
    if !fraction.is_empty() {
        readable.push('.');
        readable.push_str(fraction);
    }
    readable
}

/// Fully decoded envelope held by the correlation store.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
pub struct DecodedEnvelope {
    pub public: PublicSection,
    pub private: PrivateFields,
    #[serde(rename = "logMetadata")]
    pub log_metadata: LogMetadata,
}

impl DecodedEnvelope {
    pub fn correlation_key(&self) -> &CorrelationKey {
        &self.public.correlation_key
    }

    pub fn sequence_number(&self) -> u64 {
        self.log_metadata.sequence_number
    }
}

#[derive(Debug, thiserror::Error)]
pub enum EnvelopeError {
    #[error("malformed envelope: {0}")]
    MalformedEnvelope(String),

    #[error("undecodable ciphertext: {0}")]
    UndecodableCiphertext(#[from] hex::FromHexError),

    #[error(transparent)]
    Cipher(#[from] CipherError),

    #[error("envelope serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Encrypt the private fields and serialize the envelope for the log.
///
/// `correlation_key` is embedded under `public.transactionId` so that the
/// ingestion side can recover it from the entry itself.
pub fn build_submission_envelope(
    public: PublicFields,
    private: &PrivateFields,
    correlation_key: CorrelationKey,
    key: &CipherKey,
) -> Result<String, EnvelopeError> {
    let plaintext = serde_json::to_vec(private)?;
    let sealed = cipher::encrypt(&plaintext, key.as_bytes())?;

    let envelope = SubmissionEnvelope {
        public: PublicSection {
            fields: public,
            correlation_key,
        },
        private: hex::encode(sealed),
    };

    Ok(serde_json::to_string(&envelope)?)
}

/// Parse a raw log entry, attach log metadata and decrypt the private section.
pub fn decode_ingested_envelope(
    raw: &[u8],
    sequence_number: u64,
    consensus_instant: DateTime<Utc>,
    key: &CipherKey,
) -> Result<DecodedEnvelope, EnvelopeError> {
    let submitted: SubmissionEnvelope = serde_json::from_slice(raw)
        .map_err(|e| EnvelopeError::MalformedEnvelope(e.to_string()))?;
    let log_metadata = LogMetadata::new(sequence_number, consensus_instant);

    let sealed = hex::decode(submitted.private.trim())?;
    let plaintext = cipher::decrypt(&sealed, key.as_bytes())?;
    let private: PrivateFields = serde_json::from_slice(&plaintext)
        .map_err(|e| EnvelopeError::MalformedEnvelope(format!("private section: {e}")))?;

    Ok(DecodedEnvelope {
        public: submitted.public,
        private,
        log_metadata,
    })
}
