// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Bearer-token authentication middleware.
//!
//! Verification is delegated to the identity provider; the token itself is
//! never parsed here beyond stripping the `Bearer ` prefix.

use crate::error::AppError;
use crate::models::{CustomClaims, DecodedToken};
use crate::services::token_verifier::bearer_token;
use crate::AppState;
use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::Response,
};
use std::sync::Arc;

/// Authenticated principal extracted from a verified ID token.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub uid: String,
    pub email: Option<String>,
    pub email_verified: bool,
    pub name: Option<String>,
    pub picture: Option<String>,
    /// Every claim of the verified token.
    pub claims: CustomClaims,
}

impl From<DecodedToken> for AuthUser {
    fn from(token: DecodedToken) -> Self {
        Self {
            uid: token.uid,
            email: token.email,
            email_verified: token.email_verified.unwrap_or(false),
            name: token.name,
            picture: token.picture,
            claims: token.claims,
        }
    }
}

fn request_bearer(request: &Request) -> Option<String> {
    request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(bearer_token)
        .map(str::to_string)
}

/// Middleware that requires a valid bearer ID token.
pub async fn require_auth(
    State(state): State<Arc<AppState>>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let token = request_bearer(&request).ok_or_else(|| {
        AppError::Unauthorized("Authorization header with Bearer token required".to_string())
    })?;

    let decoded = state
        .provider
        .verify_id_token(&token, state.config.check_revoked)
        .await
        .map_err(|err| {
            tracing::warn!(error = %err, "Bearer token verification failed");
            AppError::from_token_error(err, "Invalid or expired token")
        })?;

    tracing::debug!(uid = %decoded.uid, "Request authenticated");
    request.extensions_mut().insert(AuthUser::from(decoded));

    Ok(next.run(request).await)
}

/// Middleware that authenticates when a bearer token is present and valid,
/// and otherwise lets the request through anonymously.
pub async fn optional_auth(
    State(state): State<Arc<AppState>>,
    mut request: Request,
    next: Next,
) -> Response {
    if let Some(token) = request_bearer(&request) {
        match state
            .provider
            .verify_id_token(&token, state.config.check_revoked)
            .await
        {
            Ok(decoded) => {
                request.extensions_mut().insert(AuthUser::from(decoded));
            }
            Err(err) => {
                tracing::warn!(error = %err, "Optional authentication failed");
            }
        }
    }

    next.run(request).await
}

/// Middleware that requires the authenticated user to hold `admin: true`.
///
/// Must run after [`require_auth`]. The user's current record is re-fetched
/// so claim changes take effect without waiting for a token refresh.
pub async fn require_admin(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let uid = request
        .extensions()
        .get::<AuthUser>()
        .map(|user| user.uid.clone())
        .ok_or_else(|| AppError::Unauthorized("Authentication required".to_string()))?;

    let record = state
        .provider
        .get_user(&uid)
        .await
        .map_err(|err| AppError::Provider {
            message: "Error checking admin privileges",
            source: err,
        })?;

    if !record.is_admin() {
        tracing::warn!(uid = %uid, "Admin privileges required");
        return Err(AppError::Forbidden("Admin privileges required".to_string()));
    }

    Ok(next.run(request).await)
}
