// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{
    extract::{Path, RawQuery, State},
    Json,
};

use crate::{
    error::ApiError,
    models::{CorrelationKey, RetrieveQuery, RetrieveResponse},
    state::AppState,
};

/// Fetch the decoded envelope for a correlation key.
///
/// Waits for ingestion up to the configured timeout; 504 means the entry has
/// not been ingested yet and the request can be retried.
#[utoipa::path(
    get,
    path = "/retrieve",
    params(RetrieveQuery),
    tag = "Tracking",
    responses(
        (status = 200, body = RetrieveResponse),
        (status = 400, description = "No key given", body = crate::error::ErrorBody),
        (status = 504, description = "Not ingested yet", body = crate::error::ErrorBody)
    )
)]
pub async fn retrieve_by_query(
    State(state): State<AppState>,
    RawQuery(query): RawQuery,
) -> Result<Json<RetrieveResponse>, ApiError> {
    let key = query
        .as_deref()
        .and_then(key_from_query)
        .ok_or_else(|| ApiError::bad_request("missing correlation key"))?;
    retrieve(&state, key).await
}

#[utoipa::path(
    get,
    path = "/retrieve/{correlation_key}",
    params(("correlation_key" = String, Path, description = "Key returned by /track")),
    tag = "Tracking",
    responses(
        (status = 200, body = RetrieveResponse),
        (status = 504, description = "Not ingested yet", body = crate::error::ErrorBody)
    )
)]
pub async fn retrieve_by_path(
    State(state): State<AppState>,
    Path(correlation_key): Path<String>,
) -> Result<Json<RetrieveResponse>, ApiError> {
    retrieve(&state, CorrelationKey(correlation_key)).await
}

async fn retrieve(state: &AppState, key: CorrelationKey) -> Result<Json<RetrieveResponse>, ApiError> {
    let retrieval = state.retrieval.retrieve(&key).await?;
    Ok(Json(RetrieveResponse {
        url: retrieval.url,
        message: (*retrieval.envelope).clone(),
    }))
}

/// Accepts `key=<id>` or the id as the whole query (`?0.0.2@1700000000.1`).
fn key_from_query(query: &str) -> Option<CorrelationKey> {
    let mut bare = None;
    for (name, value) in url::form_urlencoded::parse(query.as_bytes()) {
        if name == "key" {
            return Some(CorrelationKey(value.into_owned())).filter(|k| !k.as_str().is_empty());
        }
        if bare.is_none() && value.is_empty() && !name.is_empty() {
            bare = Some(CorrelationKey(name.into_owned()));
        }
    }
    bare
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_parameter_is_used() {
        assert_eq!(
            key_from_query("key=0.0.2%401700000000.000000001"),
            Some(CorrelationKey::from("0.0.2@1700000000.000000001"))
        );
    }

    #[test]
    fn bare_query_is_the_key() {
        assert_eq!(
            key_from_query("0.0.2%401700000000.000000001"),
            Some(CorrelationKey::from("0.0.2@1700000000.000000001"))
        );
        assert_eq!(
            key_from_query("0.0.2@1700000000.000000001"),
            Some(CorrelationKey::from("0.0.2@1700000000.000000001"))
        );
    }

    #[test]
    fn empty_query_has_no_key() {
        assert_eq!(key_from_query(""), None);
        assert_eq!(key_from_query("key="), None);
        assert_eq!(key_from_query("other=1"), None);
    }
}
