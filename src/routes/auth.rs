// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Token and session routes.

use axum::{
    body::Bytes,
    extract::{rejection::JsonRejection, State},
    http::{header, HeaderMap},
    middleware,
    routing::post,
    Extension, Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

use crate::config::DEFAULT_SESSION_COOKIE_LIFETIME;
use crate::error::{AppError, Result};
use crate::middleware::auth::{require_auth, AuthUser};
use crate::models::{ApiResponse, CustomClaims, UserRecord};
use crate::services::token_verifier::bearer_token;
use crate::services::ProviderError;
use crate::AppState;

pub fn routes(state: Arc<AppState>) -> Router<Arc<AppState>> {
    let protected = Router::new()
        .route("/logout", post(logout))
        .route_layer(middleware::from_fn_with_state(state, require_auth));

    Router::new()
        .route("/verify-token", post(verify_token))
        .route("/custom-token", post(create_custom_token))
        .route("/session-cookie", post(create_session_cookie))
        .route("/verify-session", post(verify_session))
        .merge(protected)
}

/// Reject a missing or empty required string field.
pub(crate) fn required(value: Option<String>, message: &str) -> Result<String> {
    value
        .filter(|v| !v.is_empty())
        .ok_or_else(|| AppError::BadRequest(message.to_string()))
}

// ─── Token Introspection ─────────────────────────────────────

/// User projection returned by token introspection.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenUserResponse {
    pub uid: String,
    pub email: Option<String>,
    pub email_verified: bool,
    pub display_name: Option<String>,
    #[serde(rename = "photoURL")]
    pub photo_url: Option<String>,
    pub disabled: bool,
    pub custom_claims: CustomClaims,
    pub last_sign_in_time: Option<String>,
    pub creation_time: Option<String>,
}

impl From<UserRecord> for TokenUserResponse {
    fn from(user: UserRecord) -> Self {
        Self {
            custom_claims: user.claims_or_empty(),
            uid: user.uid,
            email: user.email,
            email_verified: user.email_verified,
            display_name: user.display_name,
            photo_url: user.photo_url,
            disabled: user.disabled,
            last_sign_in_time: user.metadata.last_sign_in_time,
            creation_time: user.metadata.creation_time,
        }
    }
}

/// Token from the Authorization header, else from an `idToken` body field.
fn introspection_token(headers: &HeaderMap, body: &[u8]) -> Option<String> {
    let from_header = headers
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(bearer_token)
        .map(str::to_string);

    from_header.or_else(|| {
        serde_json::from_slice::<serde_json::Value>(body)
            .ok()?
            .get("idToken")?
            .as_str()
            .filter(|token| !token.is_empty())
            .map(str::to_string)
    })
}

/// Verify any caller-supplied ID token and return its user.
///
/// Shared by the public and service-facing introspection routes.
pub async fn verify_token(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<ApiResponse<TokenUserResponse>>> {
    let token = introspection_token(&headers, &body).ok_or_else(|| {
        AppError::BadRequest("Authorization header with Bearer token required".to_string())
    })?;

    let rejected = |err: ProviderError| {
        tracing::warn!(error = %err, "Token introspection failed");
        AppError::from_token_error(err, "Invalid token")
    };

    let decoded = state
        .provider
        .verify_id_token(&token, state.config.check_revoked)
        .await
        .map_err(rejected)?;

    let user = state.provider.get_user(&decoded.uid).await.map_err(rejected)?;

    Ok(Json(ApiResponse::ok_with_message(
        "Token is valid",
        TokenUserResponse::from(user),
    )))
}

// ─── Logout ──────────────────────────────────────────────────

/// Revoke every refresh token of the caller.
async fn logout(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<ApiResponse<()>>> {
    state
        .provider
        .revoke_refresh_tokens(&user.uid)
        .await
        .map_err(|e| AppError::provider("Failed to revoke tokens", e))?;

    tracing::info!(uid = %user.uid, "User logged out, tokens revoked");

    Ok(Json(ApiResponse::message("All tokens revoked successfully")))
}

// ─── Custom Tokens ───────────────────────────────────────────

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomTokenRequest {
    uid: Option<String>,
    additional_claims: Option<CustomClaims>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomTokenResponse {
    pub custom_token: String,
}

/// Mint a custom token for an arbitrary uid.
pub async fn create_custom_token(
    State(state): State<Arc<AppState>>,
    payload: std::result::Result<Json<CustomTokenRequest>, JsonRejection>,
) -> Result<Json<ApiResponse<CustomTokenResponse>>> {
    let Json(request) = payload?;
    let uid = required(request.uid, "User UID is required")?;

    let custom_token = state
        .provider
        .create_custom_token(&uid, request.additional_claims)
        .await
        .map_err(|e| AppError::provider("Failed to create custom token", e))?;

    tracing::info!(uid = %uid, "Custom token created");

    Ok(Json(ApiResponse::ok(CustomTokenResponse { custom_token })))
}

// ─── Session Cookies ─────────────────────────────────────────

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionCookieRequest {
    id_token: Option<String>,
    /// Lifetime in milliseconds
    expires_in: Option<u64>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionCookieResponse {
    pub session_cookie: String,
}

/// Exchange an ID token for a session cookie.
async fn create_session_cookie(
    State(state): State<Arc<AppState>>,
    payload: std::result::Result<Json<SessionCookieRequest>, JsonRejection>,
) -> Result<Json<ApiResponse<SessionCookieResponse>>> {
    let Json(request) = payload?;
    let id_token = required(request.id_token, "ID token is required")?;
    let lifetime = request
        .expires_in
        .map(Duration::from_millis)
        .unwrap_or(DEFAULT_SESSION_COOKIE_LIFETIME);

    let session_cookie = state
        .provider
        .create_session_cookie(&id_token, lifetime)
        .await
        .map_err(|e| AppError::provider("Failed to create session cookie", e))?;

    Ok(Json(ApiResponse::ok(SessionCookieResponse { session_cookie })))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifySessionRequest {
    session_cookie: Option<String>,
}

/// User projection returned for a valid session cookie.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionUserResponse {
    pub uid: String,
    pub email: Option<String>,
    pub email_verified: bool,
    pub display_name: Option<String>,
    #[serde(rename = "photoURL")]
    pub photo_url: Option<String>,
    pub disabled: bool,
    pub custom_claims: CustomClaims,
}

/// Verify a session cookie, rejecting revoked sessions.
async fn verify_session(
    State(state): State<Arc<AppState>>,
    payload: std::result::Result<Json<VerifySessionRequest>, JsonRejection>,
) -> Result<Json<ApiResponse<SessionUserResponse>>> {
    let Json(request) = payload?;
    let cookie = required(request.session_cookie, "Session cookie is required")?;

    let invalid = |err: ProviderError| {
        tracing::warn!(error = %err, "Session cookie verification failed");
        AppError::Unauthorized("Invalid session cookie".to_string())
    };

    let decoded = state
        .provider
        .verify_session_cookie(&cookie, true)
        .await
        .map_err(invalid)?;
    let user = state.provider.get_user(&decoded.uid).await.map_err(invalid)?;

    Ok(Json(ApiResponse::ok_with_message(
        "Session cookie is valid",
        SessionUserResponse {
            custom_claims: user.claims_or_empty(),
            uid: user.uid,
            email: user.email,
            email_verified: user.email_verified,
            display_name: user.display_name,
            photo_url: user.photo_url,
            disabled: user.disabled,
        },
    )))
}
