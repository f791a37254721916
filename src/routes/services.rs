// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Service-to-service routes.
//!
//! Token introspection and user lookup are open to internal callers; minting
//! tokens and creating users require an administrator.

use crate::error::{AppError, Result};
use crate::middleware::auth::{require_admin, require_auth, AuthUser};
use crate::models::{ApiResponse, CustomClaims, NewUser, UserRecord};
use crate::routes::auth::{create_custom_token, required, verify_token};
use crate::routes::user::SignInMetadata;
use crate::services::ProviderError;
use crate::AppState;
use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection},
        Path, State,
    },
    middleware,
    routing::{get, post},
    Extension, Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use validator::{Validate, ValidationErrors};

pub fn routes(state: Arc<AppState>) -> Router<Arc<AppState>> {
    let admin = Router::new()
        .route("/custom-token", post(create_custom_token))
        .route("/create-user", post(create_user))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_admin))
        .route_layer(middleware::from_fn_with_state(state, require_auth));

    Router::new()
        .route("/validate-token", post(verify_token))
        .route("/user/{uid}", get(get_user_for_service))
        .merge(admin)
}

// ─── User Lookup ─────────────────────────────────────────────

/// Minimal user projection for other services.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceUserResponse {
    pub uid: String,
    pub email: Option<String>,
    pub email_verified: bool,
    pub display_name: Option<String>,
    pub disabled: bool,
    pub custom_claims: CustomClaims,
    pub metadata: SignInMetadata,
}

impl From<UserRecord> for ServiceUserResponse {
    fn from(user: UserRecord) -> Self {
        Self {
            custom_claims: user.claims_or_empty(),
            uid: user.uid,
            email: user.email,
            email_verified: user.email_verified,
            display_name: user.display_name,
            disabled: user.disabled,
            metadata: user.metadata.into(),
        }
    }
}

async fn get_user_for_service(
    State(state): State<Arc<AppState>>,
    path: std::result::Result<Path<String>, PathRejection>,
) -> Result<Json<ApiResponse<ServiceUserResponse>>> {
    let Path(uid) = path?;
    let uid = required(Some(uid), "User UID is required")?;

    let user = state
        .provider
        .get_user(&uid)
        .await
        .map_err(|err| match err {
            ProviderError::UserNotFound => AppError::NotFound("User not found".to_string()),
            err => AppError::provider("Failed to get user information", err),
        })?;

    Ok(Json(ApiResponse::ok(ServiceUserResponse::from(user))))
}

// ─── User Creation ───────────────────────────────────────────

fn default_email_verified() -> bool {
    true
}

#[derive(Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateUserRequest {
    #[validate(email(message = "Invalid email format"))]
    email: Option<String>,
    display_name: Option<String>,
    #[validate(length(min = 6, message = "Password must be at least 6 characters"))]
    password: Option<String>,
    #[serde(default)]
    custom_claims: CustomClaims,
    #[serde(default = "default_email_verified")]
    email_verified: bool,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatedUserResponse {
    pub uid: String,
    pub email: Option<String>,
    pub display_name: Option<String>,
    pub email_verified: bool,
    pub custom_claims: CustomClaims,
}

/// First validation message, ordered by field name.
fn validation_message(errors: &ValidationErrors) -> String {
    let field_errors = errors.field_errors();
    let mut fields: Vec<_> = field_errors.iter().collect();
    fields.sort_by(|a, b| a.0.cmp(b.0));

    fields
        .into_iter()
        .flat_map(|(_, errors)| errors.iter())
        .find_map(|error| error.message.as_ref().map(|m| m.to_string()))
        .unwrap_or_else(|| "Invalid request".to_string())
}

/// Create a user directly, optionally with initial custom claims.
///
/// Creation and claim assignment are two provider calls; if the second one
/// fails the user exists without claims and the caller gets a 500.
async fn create_user(
    State(state): State<Arc<AppState>>,
    Extension(admin): Extension<AuthUser>,
    payload: std::result::Result<Json<CreateUserRequest>, JsonRejection>,
) -> Result<Json<ApiResponse<CreatedUserResponse>>> {
    let Json(request) = payload?;
    let email = required(request.email.clone(), "Email is required")?;
    request
        .validate()
        .map_err(|errors| AppError::BadRequest(validation_message(&errors)))?;

    let new_user = NewUser {
        email,
        email_verified: request.email_verified,
        display_name: request.display_name.filter(|name| !name.is_empty()),
        password: request.password.filter(|password| !password.is_empty()),
        disabled: false,
    };

    let created = state
        .provider
        .create_user(new_user)
        .await
        .map_err(|err| match err {
            ProviderError::EmailExists => AppError::BadRequest("Email already exists".to_string()),
            ProviderError::InvalidEmail => {
                AppError::BadRequest("Invalid email format".to_string())
            }
            err => AppError::provider("Failed to create user", err),
        })?;

    if !request.custom_claims.is_empty() {
        if let Err(err) = state
            .provider
            .set_custom_claims(&created.uid, Some(request.custom_claims.clone()))
            .await
        {
            tracing::warn!(
                uid = %created.uid,
                error = %err,
                "User created but custom claims could not be set"
            );
            return Err(AppError::provider("Failed to create user", err));
        }
    }

    tracing::info!(
        uid = %created.uid,
        admin = %admin.uid,
        "New user created by admin"
    );

    Ok(Json(ApiResponse::ok_with_message(
        "User created successfully",
        CreatedUserResponse {
            uid: created.uid,
            email: created.email,
            display_name: created.display_name,
            email_verified: created.email_verified,
            custom_claims: request.custom_claims,
        },
    )))
}
