//! User records as reported by the identity provider.
//!
//! Nothing here is persisted; records are fetched per request.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Opaque custom claims attached to a user by the provider.
pub type CustomClaims = serde_json::Map<String, serde_json::Value>;

/// A user record. Never carries password material.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UserRecord {
    pub uid: String,
    pub email: Option<String>,
    pub email_verified: bool,
    pub display_name: Option<String>,
    pub photo_url: Option<String>,
    pub disabled: bool,
    pub custom_claims: Option<CustomClaims>,
    pub metadata: UserMetadata,
    pub provider_data: Vec<UserInfo>,
    /// Sessions authenticated before this instant are revoked.
    pub tokens_valid_after: Option<DateTime<Utc>>,
}

impl UserRecord {
    /// Custom claims, or an empty map when none are set.
    pub fn claims_or_empty(&self) -> CustomClaims {
        self.custom_claims.clone().unwrap_or_default()
    }

    /// True only for a boolean `admin: true` claim.
    pub fn is_admin(&self) -> bool {
        self.custom_claims
            .as_ref()
            .and_then(|claims| claims.get("admin"))
            .and_then(serde_json::Value::as_bool)
            .unwrap_or(false)
    }
}

/// Account timestamps rendered as HTTP dates.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserMetadata {
    pub creation_time: Option<String>,
    pub last_sign_in_time: Option<String>,
    pub last_refresh_time: Option<String>,
}

/// A linked sign-in provider entry.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserInfo {
    pub uid: String,
    pub provider_id: String,
    pub email: Option<String>,
    pub display_name: Option<String>,
    #[serde(rename = "photoURL")]
    pub photo_url: Option<String>,
}

/// Parameters for creating a user.
#[derive(Debug, Clone, Default)]
pub struct NewUser {
    pub email: String,
    pub email_verified: bool,
    pub display_name: Option<String>,
    pub password: Option<String>,
    pub disabled: bool,
}

/// Partial update of a user. `Some(None)` clears a field.
#[derive(Debug, Clone, Default)]
pub struct UserUpdate {
    pub display_name: Option<Option<String>>,
    pub photo_url: Option<Option<String>>,
    pub disabled: Option<bool>,
}

impl UserUpdate {
    pub fn is_empty(&self) -> bool {
        self.display_name.is_none() && self.photo_url.is_none() && self.disabled.is_none()
    }
}

/// One page of a user listing.
#[derive(Debug, Clone, Default)]
pub struct UserPage {
    pub users: Vec<UserRecord>,
    pub page_token: Option<String>,
}
