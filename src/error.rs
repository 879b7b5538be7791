// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use utoipa::ToSchema;

use crate::retrieval::RetrieveError;
use crate::submission::SubmitError;

#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

#[derive(Serialize, ToSchema)]
pub struct ErrorBody {
    error: String,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message)
    }

    pub fn bad_gateway(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_GATEWAY, message)
    }

    pub fn service_unavailable(message: impl Into<String>) -> Self {
        Self::new(StatusCode::SERVICE_UNAVAILABLE, message)
    }

    pub fn gateway_timeout(message: impl Into<String>) -> Self {
        Self::new(StatusCode::GATEWAY_TIMEOUT, message)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(ErrorBody {
            error: self.message,
        });
        (self.status, body).into_response()
    }
}

impl From<SubmitError> for ApiError {
    fn from(err: SubmitError) -> Self {
        match err {
            SubmitError::MissingField(_) => ApiError::bad_request(err.to_string()),
            SubmitError::IngestionUnavailable => ApiError::service_unavailable(err.to_string()),
            SubmitError::Append(_) => {
                tracing::warn!(error = %err, "Log append failed");
                ApiError::bad_gateway(err.to_string())
            }
            SubmitError::Envelope(_) => {
                tracing::error!(error = %err, "Failed to build envelope");
                ApiError::internal("failed to build envelope")
            }
        }
    }
}

impl From<RetrieveError> for ApiError {
    fn from(err: RetrieveError) -> Self {
        match err {
            // Not yet available, as opposed to unknown: the client should retry.
            RetrieveError::TimedOut { .. } => ApiError::gateway_timeout(err.to_string()),
            RetrieveError::IngestionUnavailable { .. } => {
                ApiError::service_unavailable(err.to_string())
            }
        }
    }
}
