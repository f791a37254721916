// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

use async_trait::async_trait;
use axum::body::Body;
use axum::response::Response;
use dspm_auth::config::Config;
use dspm_auth::models::{
    CustomClaims, DecodedToken, NewUser, UserMetadata, UserPage, UserRecord, UserUpdate,
};
use dspm_auth::routes::create_router;
use dspm_auth::services::{IdentityProvider, ProviderError};
use dspm_auth::AppState;
use serde_json::json;
use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const ADMIN_UID: &str = "admin-user";
pub const USER_UID: &str = "regular-user";
pub const PROJECT_ID: &str = "demo-project";

/// In-memory identity provider.
///
/// ID tokens are `user:<uid>`, session cookies are `session:<uid>`. The
/// tokens `expired-token` and `revoked-token` fail with the matching errors;
/// anything else is invalid.
#[derive(Default)]
pub struct FakeProvider {
    users: Mutex<BTreeMap<String, UserRecord>>,
    revoked: Mutex<HashSet<String>>,
    calls: AtomicUsize,
    next_uid: AtomicUsize,
    fail_claims: AtomicBool,
}

#[allow(dead_code)]
impl FakeProvider {
    /// Provider seeded with one administrator and one regular user.
    pub fn with_default_users() -> Self {
        let provider = Self::default();
        provider.insert(UserRecord {
            uid: ADMIN_UID.to_string(),
            email: Some("admin@example.com".to_string()),
            email_verified: true,
            display_name: Some("Admin".to_string()),
            custom_claims: json!({"admin": true}).as_object().cloned(),
            metadata: UserMetadata {
                creation_time: Some("Mon, 05 Jan 2026 10:00:00 GMT".to_string()),
                last_sign_in_time: Some("Tue, 06 Jan 2026 10:00:00 GMT".to_string()),
                last_refresh_time: None,
            },
            ..Default::default()
        });
        provider.insert(UserRecord {
            uid: USER_UID.to_string(),
            email: Some("user@example.com".to_string()),
            display_name: Some("Regular".to_string()),
            ..Default::default()
        });
        provider
    }

    pub fn insert(&self, user: UserRecord) {
        self.users.lock().unwrap().insert(user.uid.clone(), user);
    }

    pub fn user(&self, uid: &str) -> Option<UserRecord> {
        self.users.lock().unwrap().get(uid).cloned()
    }

    /// Number of provider operations invoked so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Make every `set_custom_claims` call fail.
    pub fn fail_claims(&self) {
        self.fail_claims.store(true, Ordering::SeqCst);
    }

    pub fn is_revoked(&self, uid: &str) -> bool {
        self.revoked.lock().unwrap().contains(uid)
    }

    fn record_call(&self) {
        self.calls.fetch_add(1, Ordering::SeqCst);
    }

    fn decode(&self, uid: &str, check_revoked: bool) -> Result<DecodedToken, ProviderError> {
        let user = self.user(uid).ok_or(ProviderError::UserNotFound)?;
        if user.disabled {
            return Err(ProviderError::UserDisabled);
        }
        if check_revoked && self.is_revoked(uid) {
            return Err(ProviderError::TokenRevoked);
        }
        let now = chrono::Utc::now().timestamp() as u64;
        Ok(DecodedToken {
            uid: uid.to_string(),
            iss: format!("https://securetoken.google.com/{PROJECT_ID}"),
            aud: PROJECT_ID.to_string(),
            exp: now + 3600,
            iat: now,
            auth_time: now,
            email: user.email.clone(),
            email_verified: Some(user.email_verified),
            name: user.display_name.clone(),
            picture: user.photo_url.clone(),
            claims: user.claims_or_empty(),
        })
    }
}

#[async_trait]
impl IdentityProvider for FakeProvider {
    async fn verify_id_token(
        &self,
        id_token: &str,
        check_revoked: bool,
    ) -> Result<DecodedToken, ProviderError> {
        self.record_call();
        match id_token {
            "expired-token" => Err(ProviderError::TokenExpired),
            "revoked-token" => Err(ProviderError::TokenRevoked),
            token => match token.strip_prefix("user:") {
                Some(uid) => self.decode(uid, check_revoked),
                None => Err(ProviderError::InvalidToken("malformed token".to_string())),
            },
        }
    }

    async fn get_user(&self, uid: &str) -> Result<UserRecord, ProviderError> {
        self.record_call();
        self.user(uid).ok_or(ProviderError::UserNotFound)
    }

    async fn create_user(&self, user: NewUser) -> Result<UserRecord, ProviderError> {
        self.record_call();
        let mut users = self.users.lock().unwrap();
        if users
            .values()
            .any(|u| u.email.as_deref() == Some(user.email.as_str()))
        {
            return Err(ProviderError::EmailExists);
        }
        let uid = format!("new-user-{}", self.next_uid.fetch_add(1, Ordering::SeqCst));
        let record = UserRecord {
            uid: uid.clone(),
            email: Some(user.email),
            email_verified: user.email_verified,
            display_name: user.display_name,
            disabled: user.disabled,
            ..Default::default()
        };
        users.insert(uid, record.clone());
        Ok(record)
    }

    async fn update_user(&self, uid: &str, update: UserUpdate) -> Result<UserRecord, ProviderError> {
        self.record_call();
        let mut users = self.users.lock().unwrap();
        let user = users.get_mut(uid).ok_or(ProviderError::UserNotFound)?;
        if let Some(display_name) = update.display_name {
            user.display_name = display_name;
        }
        if let Some(photo_url) = update.photo_url {
            user.photo_url = photo_url;
        }
        if let Some(disabled) = update.disabled {
            user.disabled = disabled;
        }
        Ok(user.clone())
    }

    async fn delete_user(&self, uid: &str) -> Result<(), ProviderError> {
        self.record_call();
        self.users
            .lock()
            .unwrap()
            .remove(uid)
            .map(|_| ())
            .ok_or(ProviderError::UserNotFound)
    }

    async fn set_custom_claims(
        &self,
        uid: &str,
        claims: Option<CustomClaims>,
    ) -> Result<(), ProviderError> {
        self.record_call();
        if self.fail_claims.load(Ordering::SeqCst) {
            return Err(ProviderError::Unavailable("claims backend down".to_string()));
        }
        let mut users = self.users.lock().unwrap();
        let user = users.get_mut(uid).ok_or(ProviderError::UserNotFound)?;
        user.custom_claims = claims;
        Ok(())
    }

    async fn create_custom_token(
        &self,
        uid: &str,
        _claims: Option<CustomClaims>,
    ) -> Result<String, ProviderError> {
        self.record_call();
        Ok(format!("custom:{uid}"))
    }

    async fn create_session_cookie(
        &self,
        id_token: &str,
        lifetime: Duration,
    ) -> Result<String, ProviderError> {
        self.record_call();
        if lifetime < Duration::from_secs(5 * 60) || lifetime > Duration::from_secs(14 * 86400) {
            return Err(ProviderError::InvalidArgument(
                "Session cookie lifetime must be between 5 minutes and 2 weeks".to_string(),
            ));
        }
        let uid = id_token
            .strip_prefix("user:")
            .ok_or_else(|| ProviderError::InvalidToken("malformed token".to_string()))?;
        self.decode(uid, false)?;
        Ok(format!("session:{uid}"))
    }

    async fn verify_session_cookie(
        &self,
        session_cookie: &str,
        check_revoked: bool,
    ) -> Result<DecodedToken, ProviderError> {
        self.record_call();
        let uid = session_cookie
            .strip_prefix("session:")
            .ok_or_else(|| ProviderError::InvalidToken("malformed cookie".to_string()))?;
        self.decode(uid, check_revoked)
    }

    async fn revoke_refresh_tokens(&self, uid: &str) -> Result<(), ProviderError> {
        self.record_call();
        self.user(uid).ok_or(ProviderError::UserNotFound)?;
        self.revoked.lock().unwrap().insert(uid.to_string());
        Ok(())
    }

    async fn list_users(
        &self,
        max_results: u32,
        page_token: Option<&str>,
    ) -> Result<UserPage, ProviderError> {
        self.record_call();
        let users = self.users.lock().unwrap();
        let mut users: Vec<UserRecord> = users
            .values()
            .filter(|u| page_token.map_or(true, |after| u.uid.as_str() > after))
            .take(max_results as usize + 1)
            .cloned()
            .collect();

        let page_token = if users.len() > max_results as usize {
            users.truncate(max_results as usize);
            users.last().map(|u| u.uid.clone())
        } else {
            None
        };
        Ok(UserPage { users, page_token })
    }
}

/// Create a test app backed by the seeded fake provider.
#[allow(dead_code)]
pub fn create_test_app() -> (axum::Router, Arc<AppState>, Arc<FakeProvider>) {
    create_test_app_with(Config::test_default())
}

#[allow(dead_code)]
pub fn create_test_app_with(config: Config) -> (axum::Router, Arc<AppState>, Arc<FakeProvider>) {
    let provider = Arc::new(FakeProvider::with_default_users());
    let state = Arc::new(AppState::new(config, provider.clone()));
    (create_router(state.clone()), state, provider)
}

/// Bearer header value for a user of the fake provider.
#[allow(dead_code)]
pub fn bearer(uid: &str) -> String {
    format!("Bearer user:{uid}")
}

#[allow(dead_code)]
pub fn json_body(value: serde_json::Value) -> Body {
    Body::from(value.to_string())
}

/// Read a response body as JSON.
#[allow(dead_code)]
pub async fn body_json(response: Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}
