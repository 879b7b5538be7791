// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::sync::Arc;

use crate::config::AppConfig;
use crate::ingestion::IngestionStatus;
use crate::ledger::LogAppender;
use crate::retrieval::RetrievalService;
use crate::store::CorrelationStore;
use crate::submission::SubmissionPipeline;

#[derive(Clone)]
pub struct AppState {
    pub submission: Arc<SubmissionPipeline>,
    pub retrieval: Arc<RetrievalService>,
    pub store: Arc<CorrelationStore>,
    pub ingestion: IngestionStatus,
}

impl AppState {
    /// Wire the request-side components from configuration.
    ///
    /// `store` and `ingestion` are shared with the ingestion task.
    pub fn new(
        config: &AppConfig,
        appender: Arc<dyn LogAppender>,
        store: Arc<CorrelationStore>,
        ingestion: IngestionStatus,
    ) -> Self {
        let submission =
            SubmissionPipeline::new(appender, config.cipher_key.clone(), ingestion.clone());
        let retrieval = RetrievalService::new(
            Arc::clone(&store),
            ingestion.clone(),
            config.explorer_url.clone(),
            config.topic_id.clone(),
        )
        .with_poll_interval(config.retrieve_poll_interval)
        .with_timeout(config.retrieve_timeout);

        Self {
            submission: Arc::new(submission),
            retrieval: Arc::new(retrieval),
            store,
            ingestion,
        }
    }
}
