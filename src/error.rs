// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Application error types with consistent API responses.

use crate::models::ApiResponse;
use crate::services::ProviderError;
use axum::{
    extract::rejection::{JsonRejection, PathRejection, QueryRejection},
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};

/// Internal error text attached to 500 responses.
///
/// The error-detail middleware swaps it into the body in development mode.
#[derive(Debug, Clone)]
pub struct ErrorDetail(pub String);

/// Application error type that converts to HTTP responses.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Invalid request: {0}")]
    BadRequest(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("Token has expired")]
    TokenExpired,

    #[error("Token has been revoked")]
    TokenRevoked,

    #[error("{0}")]
    InvalidToken(&'static str),

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    NotFound(String),

    #[error("Request body too large")]
    PayloadTooLarge,

    #[error("Too many requests, please try again later.")]
    RateLimited { retry_after_secs: u64 },

    /// A provider call failed; `message` is what the client sees.
    #[error("{message}: {source}")]
    Provider {
        message: &'static str,
        source: ProviderError,
    },

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    pub const TOKEN_EXPIRED: &'static str = "TOKEN_EXPIRED";
    pub const TOKEN_REVOKED: &'static str = "TOKEN_REVOKED";
    pub const INVALID_TOKEN: &'static str = "INVALID_TOKEN";

    /// Wrap a provider failure behind a fixed client-facing message.
    ///
    /// Argument errors raised by the provider stay client errors.
    pub fn provider(message: &'static str, source: ProviderError) -> Self {
        match source {
            ProviderError::InvalidArgument(reason) => AppError::BadRequest(reason),
            source => AppError::Provider { message, source },
        }
    }

    /// Map a token verification failure onto the discriminating 401 codes.
    pub fn from_token_error(source: ProviderError, invalid_message: &'static str) -> Self {
        match source {
            ProviderError::TokenExpired => AppError::TokenExpired,
            ProviderError::TokenRevoked => AppError::TokenRevoked,
            _ => AppError::InvalidToken(invalid_message),
        }
    }

    /// Machine-readable code for the response envelope.
    pub fn code(&self) -> Option<&'static str> {
        match self {
            AppError::TokenExpired => Some(Self::TOKEN_EXPIRED),
            AppError::TokenRevoked => Some(Self::TOKEN_REVOKED),
            AppError::InvalidToken(_) => Some(Self::INVALID_TOKEN),
            _ => None,
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthorized(_)
            | AppError::TokenExpired
            | AppError::TokenRevoked
            | AppError::InvalidToken(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            AppError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            AppError::Provider { .. } | AppError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
            AppError::PayloadTooLarge
        } else {
            AppError::BadRequest(rejection.body_text())
        }
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        AppError::BadRequest(rejection.body_text())
    }
}

impl From<PathRejection> for AppError {
    fn from(rejection: PathRejection) -> Self {
        AppError::BadRequest(rejection.body_text())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let code = self.code();

        let (message, detail) = match &self {
            AppError::BadRequest(msg) => (msg.clone(), None),
            AppError::Provider { message, source } => {
                tracing::error!(error = %source, "{message}");
                (message.to_string(), None)
            }
            AppError::Internal(err) => {
                tracing::error!(error = ?err, "Internal server error");
                ("Internal server error".to_string(), Some(format!("{err:#}")))
            }
            other => (other.to_string(), None),
        };

        let mut response = (status, Json(ApiResponse::failure(message, code))).into_response();

        if let AppError::RateLimited { retry_after_secs } = self {
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from(retry_after_secs));
        }
        if let Some(detail) = detail {
            response.extensions_mut().insert(ErrorDetail(detail));
        }

        response
    }
}

/// Result type alias for handlers
pub type Result<T> = std::result::Result<T, AppError>;
