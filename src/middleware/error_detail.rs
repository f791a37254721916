// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Catch-all handling for internal failures.
//!
//! Unhandled errors and panics always answer with a generic 500 envelope.
//! In development mode the envelope message is replaced by the error text.

use crate::error::ErrorDetail;
use crate::models::ApiResponse;
use crate::AppState;
use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use std::any::Any;
use std::sync::Arc;

/// Expose [`ErrorDetail`] in the response body when running in development.
pub async fn expose_error_detail(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Response {
    let response = next.run(request).await;

    if !state.config.environment.is_development() {
        return response;
    }

    match response.extensions().get::<ErrorDetail>().cloned() {
        Some(ErrorDetail(detail)) => {
            let (mut parts, _) = response.into_parts();
            parts.headers.remove(axum::http::header::CONTENT_LENGTH);
            let body = Json(ApiResponse::failure(detail, None)).into_response().into_body();
            Response::from_parts(parts, body)
        }
        None => response,
    }
}

/// Convert a handler panic into the generic 500 envelope.
pub fn handle_panic(payload: Box<dyn Any + Send + 'static>) -> Response {
    let detail = if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else {
        "unknown panic".to_string()
    };

    tracing::error!(panic = %detail, "Unhandled panic in request handler");

    let mut response = (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ApiResponse::failure("Internal server error", None)),
    )
        .into_response();
    response.extensions_mut().insert(ErrorDetail(detail));
    response
}
