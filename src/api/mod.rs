// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{routing::get, Router};
use tower::ServiceBuilder;
use tower_http::{
    cors::CorsLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::{
    envelope::{DecodedEnvelope, LogMetadata, PrivateFields, PublicFields, PublicSection},
    error::ErrorBody,
    ingestion::{IngestionSnapshot, IngestionState},
    models::{CorrelationKey, RetrieveResponse, TrackingForm},
    state::AppState,
};

pub mod health;
pub mod retrieve;
pub mod track;

pub fn router(state: AppState) -> Router {
    let routes = Router::new()
        .route("/track", get(track::track_event).post(track::track_event))
        .route("/retrieve", get(retrieve::retrieve_by_query))
        .route(
            "/retrieve/{correlation_key}",
            get(retrieve::retrieve_by_path),
        )
        .route("/health", get(health::health))
        .route("/health/live", get(health::liveness))
        .route("/health/ready", get(health::readiness))
        .with_state(state);

    Router::new()
        .merge(routes)
        .merge(SwaggerUi::new("/docs").url("/api-doc/openapi.json", ApiDoc::openapi()))
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
                .layer(TraceLayer::new_for_http())
                .layer(PropagateRequestIdLayer::x_request_id()),
        )
        .layer(CorsLayer::permissive())
}

#[derive(OpenApi)]
#[openapi(
    paths(
        track::track_event,
        retrieve::retrieve_by_query,
        retrieve::retrieve_by_path,
        health::health,
        health::liveness,
        health::readiness
    ),
    components(
        schemas(
            CorrelationKey,
            TrackingForm,
            RetrieveResponse,
            DecodedEnvelope,
            PublicSection,
            PublicFields,
            PrivateFields,
            LogMetadata,
            IngestionSnapshot,
            IngestionState,
            ErrorBody,
            health::ReadyResponse,
            health::HealthChecks,
            health::HealthResponse
        )
    ),
    tags(
        (name = "Tracking", description = "Encrypted event submission and retrieval"),
        (name = "Health", description = "Liveness and readiness probes")
    )
)]
struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use axum::{
        body::{to_bytes, Body},
        http::{Request, StatusCode},
    };
    use chrono::{TimeZone, Utc};
    use serde_json::Value;
    use tower::ServiceExt;

    use crate::ingestion::Ingestor;
    use crate::ledger::LogEntry;
    use crate::state::test_support::{test_config, test_state, TEST_TOPIC};

    const PLAY_QUERY: &str = "/track?event=play&localTimestamp=t1&tzOffset=%2B0\
        &additionalInfo=note&videoCT=10&videoDuration=100&videoUrl=u&userAgent=ua";

    async fn body_json(response: axum::response::Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn router_builds_with_all_routes() {
        let (state, _) = test_state();
        let _ = router(state).into_make_service();
    }

    #[tokio::test]
    async fn track_then_retrieve_after_ingestion() {
        let (state, appender) = test_state();
        let app = router(state.clone());

        let response = app
            .clone()
            .oneshot(Request::get(PLAY_QUERY).body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().contains_key("x-request-id"));

        let envelope = body_json(response).await;
        let key = envelope["public"]["transactionId"].as_str().unwrap().to_string();
        assert_eq!(envelope["public"]["event"], "play");
        assert!(envelope["private"].as_str().is_some());

        let appended = appender.appended();
        assert_eq!(appended.len(), 1);

        let ingestor = Ingestor::new(
            Arc::clone(&state.store),
            test_config().cipher_key,
            state.ingestion.clone(),
        );
        ingestor
            .ingest_entry(LogEntry {
                contents: appended[0].1.clone(),
                sequence_number: 7,
                consensus_timestamp: Utc.timestamp_opt(1_700_000_000, 0).unwrap(),
            })
            .unwrap();

        let response = app
            .oneshot(
                Request::get(format!("/retrieve/{key}"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = body_json(response).await;
        assert_eq!(body["message"]["private"]["secretMessage"], "note");
        assert_eq!(body["message"]["public"]["transactionId"], key.as_str());
        assert_eq!(body["message"]["logMetadata"]["sequenceNumber"], 7);
        let url = body["url"].as_str().unwrap();
        assert!(url.ends_with(&format!("/topic/{TEST_TOPIC}/message/7")));
    }

    #[tokio::test]
    async fn retrieve_accepts_bare_query_key() {
        let (state, appender) = test_state();
        let app = router(state.clone());

        app.clone()
            .oneshot(Request::post(PLAY_QUERY).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let (key, contents) = appender.appended().remove(0);

        Ingestor::new(
            Arc::clone(&state.store),
            test_config().cipher_key,
            state.ingestion.clone(),
        )
        .ingest_entry(LogEntry {
            contents,
            sequence_number: 1,
            consensus_timestamp: Utc::now(),
        })
        .unwrap();

        let encoded: String = url::form_urlencoded::byte_serialize(key.as_str().as_bytes()).collect();
        let response = app
            .oneshot(
                Request::get(format!("/retrieve?{encoded}"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert!(body_json(response).await["url"]
            .as_str()
            .unwrap()
            .ends_with("/message/1"));
    }

    #[tokio::test]
    async fn track_with_missing_field_is_rejected() {
        let (state, appender) = test_state();

        let response = router(state)
            .oneshot(
                Request::get("/track?event=play&localTimestamp=t1&tzOffset=0")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            body_json(response).await["error"],
            "missing required field `additionalInfo`"
        );
        assert!(appender.appended().is_empty());
    }

    #[tokio::test]
    async fn retrieve_unknown_key_times_out() {
        let (state, _) = test_state();

        let response = router(state)
            .oneshot(
                Request::get("/retrieve?key=unknown")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::GATEWAY_TIMEOUT);
    }

    #[tokio::test]
    async fn retrieve_without_key_is_bad_request() {
        let (state, _) = test_state();

        let response = router(state)
            .oneshot(Request::get("/retrieve").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn track_is_refused_when_ingestion_failed() {
        let (state, appender) = test_state();
        state.ingestion.set_state(IngestionState::Failed);

        let response = router(state)
            .oneshot(Request::get(PLAY_QUERY).body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert!(appender.appended().is_empty());
    }

    #[tokio::test]
    async fn malformed_track_query_gets_json_error() {
        let (state, appender) = test_state();

        let response = router(state)
            .oneshot(
                Request::get(format!("{PLAY_QUERY}&event=pause"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let error = body_json(response).await["error"].as_str().unwrap().to_string();
        assert!(error.contains("duplicate field"), "{error}");
        assert!(appender.appended().is_empty());
    }

    #[tokio::test]
    async fn retrieve_after_ingestion_failure_is_unavailable_not_timeout() {
        let (state, _) = test_state();
        state.ingestion.set_state(IngestionState::Failed);

        let started = std::time::Instant::now();
        let response = router(state)
            .oneshot(
                Request::get("/retrieve?key=0.0.2%401.000000001")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        // test_state waits up to 300 ms on a timeout; this must not.
        assert!(started.elapsed() < std::time::Duration::from_millis(250));
        let error = body_json(response).await["error"].as_str().unwrap().to_string();
        assert!(!error.contains("catching up"), "{error}");
    }
}
