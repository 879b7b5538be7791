// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{
    extract::{rejection::QueryRejection, Query, State},
    http::header,
    response::IntoResponse,
};

use crate::{error::ApiError, models::TrackingForm, state::AppState};

/// Encrypt a tracking event and append it to the log.
///
/// The response body is the exact envelope handed to the log, including the
/// correlation key under `public.transactionId`.
#[utoipa::path(
    get,
    path = "/track",
    params(TrackingForm),
    tag = "Tracking",
    responses(
        (status = 200, description = "Envelope queued for the log", body = String, content_type = "application/json"),
        (status = 400, description = "A required field is missing or the query is malformed", body = crate::error::ErrorBody),
        (status = 502, description = "The log rejected the append", body = crate::error::ErrorBody),
        (status = 503, description = "Ingestion is not running", body = crate::error::ErrorBody)
    )
)]
pub async fn track_event(
    State(state): State<AppState>,
    form: Result<Query<TrackingForm>, QueryRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Query(form) = form.map_err(|rejection| ApiError::bad_request(rejection.body_text()))?;
    let submission = state.submission.submit(form).await?;
    Ok((
        [(header::CONTENT_TYPE, "application/json")],
        submission.envelope,
    ))
}
