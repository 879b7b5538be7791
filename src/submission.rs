// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Submission Pipeline
//!
//! Turns raw tracking fields into an encrypted envelope and hands it to the
//! log appender.
//!
//! ## Steps
//!
//! 1. Check all eight fields are present (empty values are allowed).
//! 2. Refuse the submission if ingestion has failed, since the entry could
//!    never be retrieved.
//! 3. Reserve a correlation id from the appender.
//! 4. Encrypt the private fields and serialize the envelope.
//! 5. Queue the append and return without waiting for consensus.

use std::sync::Arc;

use tracing::info;

use crate::cipher::CipherKey;
use crate::envelope::{build_submission_envelope, EnvelopeError, PrivateFields, PublicFields};
use crate::ingestion::IngestionStatus;
use crate::ledger::{AppendError, LogAppender};
use crate::models::{CorrelationKey, TrackingForm};

/// Result of a successful submission.
#[derive(Debug, Clone)]
pub struct Submission {
    pub correlation_key: CorrelationKey,
    /// The exact document handed to the log.
    pub envelope: String,
}

#[derive(Debug, thiserror::Error)]
pub enum SubmitError {
    #[error("missing required field `{0}`")]
    MissingField(&'static str),

    #[error("ingestion is not running; the submission could never be retrieved")]
    IngestionUnavailable,

    #[error(transparent)]
    Envelope(#[from] EnvelopeError),

    #[error("append failed: {0}")]
    Append(#[from] AppendError),
}

pub struct SubmissionPipeline {
    appender: Arc<dyn LogAppender>,
    cipher_key: CipherKey,
    ingestion: IngestionStatus,
}

impl SubmissionPipeline {
    pub fn new(
        appender: Arc<dyn LogAppender>,
        cipher_key: CipherKey,
        ingestion: IngestionStatus,
    ) -> Self {
        Self {
            appender,
            cipher_key,
            ingestion,
        }
    }

    pub async fn submit(&self, form: TrackingForm) -> Result<Submission, SubmitError> {
        let (public, private) = split_fields(form)?;

        if !self.ingestion.accepts_submissions() {
            return Err(SubmitError::IngestionUnavailable);
        }

        let correlation_key = self.appender.reserve_id();
        let event = public.event.clone();
        let envelope =
            build_submission_envelope(public, &private, correlation_key.clone(), &self.cipher_key)?;

        self.appender
            .append(&correlation_key, envelope.clone().into_bytes())
            .await?;

        info!(
            correlation_key = %correlation_key,
            event = %event,
            bytes = envelope.len(),
            "Tracking event submitted"
        );

        Ok(Submission {
            correlation_key,
            envelope,
        })
    }
}

/// Split the raw form into its public and private sections.
fn split_fields(form: TrackingForm) -> Result<(PublicFields, PrivateFields), SubmitError> {
    let public = PublicFields {
        event: require(form.event, "event")?,
        timestamp: require(form.local_timestamp, "localTimestamp")?,
        tz_offset: require(form.tz_offset, "tzOffset")?,
    };
    let private = PrivateFields {
        secret_message: require(form.additional_info, "additionalInfo")?,
        video_current_time: require(form.video_current_time, "videoCT")?,
        video_duration: require(form.video_duration, "videoDuration")?,
        video_url: require(form.video_url, "videoUrl")?,
        user_agent: require(form.user_agent, "userAgent")?,
    };
    Ok((public, private))
}

fn require(value: Option<String>, name: &'static str) -> Result<String, SubmitError> {
    value.ok_or(SubmitError::MissingField(name))
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::sync::Mutex;

    use async_trait::async_trait;
    use chrono::Utc;

    use crate::envelope::decode_ingested_envelope;
    use crate::ingestion::IngestionState;

    /// Appender that records appends instead of sending them anywhere.
    #[derive(Default)]
    pub(crate) struct RecordingAppender {
        pub appended: Mutex<Vec<(CorrelationKey, Vec<u8>)>>,
        pub reserved: Mutex<u64>,
    }

    impl RecordingAppender {
        pub fn appended(&self) -> Vec<(CorrelationKey, Vec<u8>)> {
            self.appended.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl LogAppender for RecordingAppender {
        fn reserve_id(&self) -> CorrelationKey {
            let mut reserved = self.reserved.lock().unwrap();
            *reserved += 1;
            CorrelationKey(format!("0.0.2@1700000000.{:09}", *reserved))
        }

        async fn append(&self, id: &CorrelationKey, contents: Vec<u8>) -> Result<(), AppendError> {
            self.appended.lock().unwrap().push((id.clone(), contents));
            Ok(())
        }
    }

    pub(crate) fn full_form() -> TrackingForm {
        TrackingForm {
            event: Some("play".into()),
            local_timestamp: Some("t1".into()),
            tz_offset: Some("+0".into()),
            additional_info: Some("note".into()),
            video_current_time: Some("10".into()),
            video_duration: Some("100".into()),
            video_url: Some("u".into()),
            user_agent: Some("ua".into()),
        }
    }

    fn key() -> CipherKey {
        CipherKey::new(b"0123456789abcdef0123456789abcdef".to_vec()).unwrap()
    }

    fn pipeline() -> (SubmissionPipeline, Arc<RecordingAppender>, IngestionStatus) {
        let appender = Arc::new(RecordingAppender::default());
        let status = IngestionStatus::default();
        (
            SubmissionPipeline::new(appender.clone(), key(), status.clone()),
            appender,
            status,
        )
    }

    #[tokio::test]
    async fn submit_appends_encrypted_envelope_under_reserved_key() {
        let (pipeline, appender, _) = pipeline();

        let submission = pipeline.submit(full_form()).await.unwrap();

        let appended = appender.appended();
        assert_eq!(appended.len(), 1);
        let (id, contents) = &appended[0];
        assert_eq!(id, &submission.correlation_key);
        assert_eq!(contents, submission.envelope.as_bytes());

        let decoded = decode_ingested_envelope(contents, 1, Utc::now(), &key()).unwrap();
        assert_eq!(decoded.correlation_key(), &submission.correlation_key);
        assert_eq!(decoded.public.fields.timestamp, "t1");
        assert_eq!(decoded.private.secret_message, "note");
        assert_eq!(decoded.private.video_current_time, "10");
    }

    #[tokio::test]
    async fn each_submission_gets_a_distinct_key() {
        let (pipeline, _, _) = pipeline();
        let a = pipeline.submit(full_form()).await.unwrap();
        let b = pipeline.submit(full_form()).await.unwrap();
        assert_ne!(a.correlation_key, b.correlation_key);
    }

    #[tokio::test]
    async fn missing_field_is_reported_and_nothing_is_appended() {
        let (pipeline, appender, _) = pipeline();
        let mut form = full_form();
        form.video_url = None;

        let err = pipeline.submit(form).await.unwrap_err();

        assert!(matches!(err, SubmitError::MissingField("videoUrl")));
        assert!(appender.appended().is_empty());
        assert_eq!(*appender.reserved.lock().unwrap(), 0);
    }

    #[tokio::test]
    async fn empty_values_count_as_present() {
        let (pipeline, appender, _) = pipeline();
        let mut form = full_form();
        form.additional_info = Some(String::new());

        pipeline.submit(form).await.unwrap();
        assert_eq!(appender.appended().len(), 1);
    }

    #[tokio::test]
    async fn refuses_submissions_after_ingestion_failure() {
        let (pipeline, appender, status) = pipeline();
        status.set_state(IngestionState::Failed);

        let err = pipeline.submit(full_form()).await.unwrap_err();

        assert!(matches!(err, SubmitError::IngestionUnavailable));
        assert!(appender.appended().is_empty());
    }

    #[test]
    fn split_fields_names_first_missing_field() {
        let mut form = full_form();
        form.event = None;
        form.user_agent = None;
        assert!(matches!(
            split_fields(form),
            Err(SubmitError::MissingField("event"))
        ));
    }
}
