// Copyright (c) 2025-2026 The Legion Project Authors
//
// SPDX-License-Identifier: Apache-2.0
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use legion_bus::LegionError;
use serde_json::json;

/// Maps the runtime core's closed error taxonomy onto HTTP status codes.
/// Locally-recoverable kinds never reach this layer — callers either
/// retried internally or the condition is a true failure.
pub struct ApiError(pub LegionError);

impl From<LegionError> for ApiError {
    fn from(e: LegionError) -> Self {
        Self(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            LegionError::NotFound(_) => StatusCode::NOT_FOUND,
            LegionError::NotAuthorized(_) => StatusCode::FORBIDDEN,
            LegionError::ValidationFailed(_) => StatusCode::BAD_REQUEST,
            LegionError::ConcurrencyConflict(_) => StatusCode::CONFLICT,
            LegionError::ModelTransient(_) => StatusCode::SERVICE_UNAVAILABLE,
            LegionError::ModelFatal(_) => StatusCode::BAD_GATEWAY,
            LegionError::ToolFailed(_) => StatusCode::BAD_GATEWAY,
            LegionError::Cancelled => StatusCode::GONE,
            LegionError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let body = Json(json!({ "error": self.0.to_string() }));
        (status, body).into_response()
    }
}
