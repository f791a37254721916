// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! User profile and administration routes.

use crate::error::{AppError, Result};
use crate::middleware::auth::{require_admin, require_auth, AuthUser};
use crate::models::{ApiResponse, CustomClaims, UserInfo, UserMetadata, UserRecord, UserUpdate};
use crate::routes::auth::required;
use crate::AppState;
use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection, QueryRejection},
        Path, Query, State,
    },
    middleware,
    routing::{delete, get, post},
    Extension, Json, Router,
};
use serde::{Deserialize, Deserializer, Serialize};
use std::sync::Arc;

const DEFAULT_MAX_RESULTS: u32 = 1000;
const MAX_RESULTS_LIMIT: u32 = 1000;

/// User routes. Everything requires authentication; administration also
/// requires the `admin` claim.
pub fn routes(state: Arc<AppState>) -> Router<Arc<AppState>> {
    let admin = Router::new()
        .route("/list", get(list_users))
        .route("/custom-claims", post(set_custom_claims))
        .route("/toggle-status", post(toggle_status))
        .route("/{uid}", delete(delete_user))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_admin));

    Router::new()
        .route("/profile", get(get_profile).put(update_profile))
        .merge(admin)
        .route_layer(middleware::from_fn_with_state(state, require_auth))
}

/// Distinguish an absent field (`None`) from an explicit `null` (`Some(None)`).
fn explicit_null<'de, D, T>(deserializer: D) -> std::result::Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

// ─── User Profile ────────────────────────────────────────────

/// Full profile of the current user.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileResponse {
    pub uid: String,
    pub email: Option<String>,
    pub email_verified: bool,
    pub display_name: Option<String>,
    #[serde(rename = "photoURL")]
    pub photo_url: Option<String>,
    pub disabled: bool,
    pub metadata: UserMetadata,
    pub custom_claims: CustomClaims,
    pub provider_data: Vec<UserInfo>,
}

/// Get current user profile.
async fn get_profile(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<ApiResponse<ProfileResponse>>> {
    let record = state
        .provider
        .get_user(&user.uid)
        .await
        .map_err(|e| AppError::provider("Failed to get user profile", e))?;

    Ok(Json(ApiResponse::ok(ProfileResponse {
        custom_claims: record.claims_or_empty(),
        uid: record.uid,
        email: record.email,
        email_verified: record.email_verified,
        display_name: record.display_name,
        photo_url: record.photo_url,
        disabled: record.disabled,
        metadata: record.metadata,
        provider_data: record.provider_data,
    })))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProfileRequest {
    #[serde(default, deserialize_with = "explicit_null")]
    display_name: Option<Option<String>>,
    #[serde(default, deserialize_with = "explicit_null", rename = "photoURL")]
    photo_url: Option<Option<String>>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProfileResponse {
    pub uid: String,
    pub display_name: Option<String>,
    #[serde(rename = "photoURL")]
    pub photo_url: Option<String>,
}

/// Update display name and/or photo URL of the current user.
async fn update_profile(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    payload: std::result::Result<Json<UpdateProfileRequest>, JsonRejection>,
) -> Result<Json<ApiResponse<UpdateProfileResponse>>> {
    let Json(request) = payload?;

    let update = UserUpdate {
        display_name: request.display_name,
        photo_url: request.photo_url,
        disabled: None,
    };

    let updated = state
        .provider
        .update_user(&user.uid, update)
        .await
        .map_err(|e| AppError::provider("Failed to update profile", e))?;

    tracing::info!(uid = %user.uid, "Profile updated");

    Ok(Json(ApiResponse::ok_with_message(
        "Profile updated successfully",
        UpdateProfileResponse {
            uid: updated.uid,
            display_name: updated.display_name,
            photo_url: updated.photo_url,
        },
    )))
}

// ─── Administration ──────────────────────────────────────────

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListUsersQuery {
    max_results: Option<u32>,
    page_token: Option<String>,
}

/// One entry of a user listing.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ListedUser {
    pub uid: String,
    pub email: Option<String>,
    pub email_verified: bool,
    pub display_name: Option<String>,
    #[serde(rename = "photoURL")]
    pub photo_url: Option<String>,
    pub disabled: bool,
    pub metadata: SignInMetadata,
    pub custom_claims: CustomClaims,
}

/// Creation and last sign-in times only.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SignInMetadata {
    pub creation_time: Option<String>,
    pub last_sign_in_time: Option<String>,
}

impl From<UserMetadata> for SignInMetadata {
    fn from(metadata: UserMetadata) -> Self {
        Self {
            creation_time: metadata.creation_time,
            last_sign_in_time: metadata.last_sign_in_time,
        }
    }
}

impl From<UserRecord> for ListedUser {
    fn from(user: UserRecord) -> Self {
        Self {
            custom_claims: user.claims_or_empty(),
            uid: user.uid,
            email: user.email,
            email_verified: user.email_verified,
            display_name: user.display_name,
            photo_url: user.photo_url,
            disabled: user.disabled,
            metadata: user.metadata.into(),
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ListUsersResponse {
    pub users: Vec<ListedUser>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page_token: Option<String>,
}

/// List users one provider page at a time.
async fn list_users(
    State(state): State<Arc<AppState>>,
    query: std::result::Result<Query<ListUsersQuery>, QueryRejection>,
) -> Result<Json<ApiResponse<ListUsersResponse>>> {
    let Query(params) = query?;
    let max_results = params.max_results.unwrap_or(DEFAULT_MAX_RESULTS);
    if max_results == 0 || max_results > MAX_RESULTS_LIMIT {
        return Err(AppError::BadRequest(format!(
            "maxResults must be between 1 and {MAX_RESULTS_LIMIT}"
        )));
    }

    tracing::debug!(
        max_results,
        page_token = ?params.page_token,
        "Listing users"
    );

    let page = state
        .provider
        .list_users(max_results, params.page_token.as_deref())
        .await
        .map_err(|e| AppError::provider("Failed to list users", e))?;

    Ok(Json(ApiResponse::ok(ListUsersResponse {
        users: page.users.into_iter().map(ListedUser::from).collect(),
        page_token: page.page_token,
    })))
}

#[derive(Deserialize)]
pub struct SetClaimsRequest {
    uid: Option<String>,
    claims: Option<CustomClaims>,
}

/// Replace the custom claims of any user.
async fn set_custom_claims(
    State(state): State<Arc<AppState>>,
    Extension(admin): Extension<AuthUser>,
    payload: std::result::Result<Json<SetClaimsRequest>, JsonRejection>,
) -> Result<Json<ApiResponse<()>>> {
    let Json(request) = payload?;
    let uid = required(request.uid, "User UID is required")?;

    state
        .provider
        .set_custom_claims(&uid, request.claims)
        .await
        .map_err(|e| AppError::provider("Failed to set custom claims", e))?;

    tracing::info!(uid = %uid, admin = %admin.uid, "Custom claims updated");

    Ok(Json(ApiResponse::message("Custom claims updated successfully")))
}

#[derive(Deserialize)]
pub struct ToggleStatusRequest {
    uid: Option<String>,
    disabled: Option<bool>,
}

#[derive(Serialize)]
pub struct ToggleStatusResponse {
    pub uid: String,
    pub disabled: bool,
}

/// Enable or disable any user.
async fn toggle_status(
    State(state): State<Arc<AppState>>,
    Extension(admin): Extension<AuthUser>,
    payload: std::result::Result<Json<ToggleStatusRequest>, JsonRejection>,
) -> Result<Json<ApiResponse<ToggleStatusResponse>>> {
    let Json(request) = payload?;
    let uid = required(request.uid, "User UID is required")?;
    let disabled = request
        .disabled
        .ok_or_else(|| AppError::BadRequest("Disabled flag is required".to_string()))?;

    let updated = state
        .provider
        .update_user(
            &uid,
            UserUpdate {
                disabled: Some(disabled),
                ..Default::default()
            },
        )
        .await
        .map_err(|e| AppError::provider("Failed to update user status", e))?;

    tracing::info!(uid = %uid, admin = %admin.uid, disabled, "User status changed");

    let message = if updated.disabled {
        "User disabled successfully"
    } else {
        "User enabled successfully"
    };

    Ok(Json(ApiResponse::ok_with_message(
        message,
        ToggleStatusResponse {
            uid: updated.uid,
            disabled: updated.disabled,
        },
    )))
}

/// Delete any user.
async fn delete_user(
    State(state): State<Arc<AppState>>,
    Extension(admin): Extension<AuthUser>,
    path: std::result::Result<Path<String>, PathRejection>,
) -> Result<Json<ApiResponse<()>>> {
    let Path(uid) = path?;
    let uid = required(Some(uid), "User UID is required")?;

    state
        .provider
        .delete_user(&uid)
        .await
        .map_err(|e| AppError::provider("Failed to delete user", e))?;

    tracing::info!(uid = %uid, admin = %admin.uid, "User deleted");

    Ok(Json(ApiResponse::message("User deleted successfully")))
}
