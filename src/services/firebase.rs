// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Firebase Authentication client.
//!
//! Handles:
//! - Admin user management through the Identity Toolkit REST API
//! - Local verification of ID tokens and session cookies
//! - Custom token signing when a service-account key is configured
//!
//! Every outbound call is bounded by the configured provider timeout and is
//! never retried.

use crate::config::ProviderCredentials;
use crate::models::{
    CustomClaims, DecodedToken, NewUser, UserInfo, UserMetadata, UserPage, UserRecord, UserUpdate,
};
use crate::services::credentials::{AdminCredentials, RESERVED_CLAIMS};
use crate::services::provider::{IdentityProvider, ProviderError};
use crate::services::token_verifier::{now_unix_secs, TokenKind, TokenVerifier, VerifyError};
use crate::time_utils::{format_http_date, parse_epoch_millis, parse_epoch_secs};
use anyhow::Context;
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::time::Duration;

const IDENTITY_TOOLKIT_URL: &str = "https://identitytoolkit.googleapis.com/v1";
const MAX_CLAIMS_PAYLOAD_BYTES: usize = 1000;
const MAX_LIST_RESULTS: u32 = 1000;
const MIN_SESSION_COOKIE_LIFETIME: Duration = Duration::from_secs(5 * 60);
const MAX_SESSION_COOKIE_LIFETIME: Duration = Duration::from_secs(14 * 24 * 60 * 60);

/// Firebase-backed [`IdentityProvider`].
pub struct FirebaseAuth {
    http: reqwest::Client,
    base_url: String,
    credentials: AdminCredentials,
    id_tokens: TokenVerifier,
    session_cookies: TokenVerifier,
}

impl FirebaseAuth {
    /// Build a client whose outbound calls are bounded by `timeout`.
    pub async fn new(credentials: &ProviderCredentials, timeout: Duration) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("failed building identity provider HTTP client")?;

        let credentials = AdminCredentials::new(credentials, timeout).await?;
        let project_id = credentials.project_id().to_string();

        tracing::info!(
            project = %project_id,
            signer = credentials.signer_email().unwrap_or("none"),
            timeout_ms = timeout.as_millis() as u64,
            "Initialized Firebase Authentication client"
        );

        Ok(Self {
            id_tokens: TokenVerifier::new(TokenKind::IdToken, &project_id, http.clone()),
            session_cookies: TokenVerifier::new(
                TokenKind::SessionCookie,
                &project_id,
                http.clone(),
            ),
            base_url: format!("{IDENTITY_TOOLKIT_URL}/projects/{project_id}"),
            http,
            credentials,
        })
    }

    async fn post_json<B, T>(&self, path: &str, body: &B) -> Result<T, ProviderError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let token = self.credentials.access_token().await?;
        let url = format!("{}{}", self.base_url, path);

        let response = self
            .http
            .post(&url)
            .bearer_auth(token)
            .json(body)
            .send()
            .await
            .map_err(transport_error)?;

        check_response_json(response).await
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T, ProviderError> {
        let token = self.credentials.access_token().await?;
        let url = format!("{}{}", self.base_url, path);

        let response = self
            .http
            .get(&url)
            .bearer_auth(token)
            .query(query)
            .send()
            .await
            .map_err(transport_error)?;

        check_response_json(response).await
    }

    async fn ensure_not_revoked(&self, token: &DecodedToken) -> Result<(), ProviderError> {
        let user = self.get_user(&token.uid).await?;
        if user.disabled {
            return Err(ProviderError::UserDisabled);
        }
        if is_revoked(token, &user) {
            return Err(ProviderError::TokenRevoked);
        }
        Ok(())
    }
}

#[async_trait]
impl IdentityProvider for FirebaseAuth {
    async fn verify_id_token(
        &self,
        id_token: &str,
        check_revoked: bool,
    ) -> Result<DecodedToken, ProviderError> {
        let decoded = self.id_tokens.verify(id_token).await.map_err(verify_error)?;
        if check_revoked {
            self.ensure_not_revoked(&decoded).await?;
        }
        Ok(decoded)
    }

    async fn get_user(&self, uid: &str) -> Result<UserRecord, ProviderError> {
        let response: LookupResponse = self
            .post_json("/accounts:lookup", &json!({ "localId": [uid] }))
            .await?;

        response
            .users
            .into_iter()
            .next()
            .map(RestUser::into_record)
            .ok_or(ProviderError::UserNotFound)
    }

    async fn create_user(&self, user: NewUser) -> Result<UserRecord, ProviderError> {
        let body = CreateAccountRequest {
            email: &user.email,
            email_verified: user.email_verified,
            display_name: user.display_name.as_deref(),
            password: user.password.as_deref(),
            disabled: user.disabled,
        };

        let created: LocalIdResponse = self.post_json("/accounts", &body).await?;
        tracing::info!(uid = %created.local_id, "Provider account created");

        self.get_user(&created.local_id).await
    }

    async fn update_user(&self, uid: &str, update: UserUpdate) -> Result<UserRecord, ProviderError> {
        if !update.is_empty() {
            let body = update_request(uid, &update);
            let _: LocalIdResponse = self.post_json("/accounts:update", &body).await?;
        }

        self.get_user(uid).await
    }

    async fn delete_user(&self, uid: &str) -> Result<(), ProviderError> {
        let _: serde_json::Value = self
            .post_json("/accounts:delete", &json!({ "localId": uid }))
            .await?;
        Ok(())
    }

    async fn set_custom_claims(
        &self,
        uid: &str,
        claims: Option<CustomClaims>,
    ) -> Result<(), ProviderError> {
        let payload = serialize_custom_claims(claims.as_ref())?;
        let _: LocalIdResponse = self
            .post_json(
                "/accounts:update",
                &json!({ "localId": uid, "customAttributes": payload }),
            )
            .await?;
        Ok(())
    }

    async fn create_custom_token(
        &self,
        uid: &str,
        claims: Option<CustomClaims>,
    ) -> Result<String, ProviderError> {
        self.credentials.sign_custom_token(uid, claims.as_ref())
    }

    async fn create_session_cookie(
        &self,
        id_token: &str,
        lifetime: Duration,
    ) -> Result<String, ProviderError> {
        validate_session_lifetime(lifetime)?;

        let response: SessionCookieResponse = self
            .post_json(
                ":createSessionCookie",
                &json!({
                    "idToken": id_token,
                    "validDuration": lifetime.as_secs().to_string(),
                }),
            )
            .await?;

        Ok(response.session_cookie)
    }

    async fn verify_session_cookie(
        &self,
        session_cookie: &str,
        check_revoked: bool,
    ) -> Result<DecodedToken, ProviderError> {
        let decoded = self
            .session_cookies
            .verify(session_cookie)
            .await
            .map_err(verify_error)?;
        if check_revoked {
            self.ensure_not_revoked(&decoded).await?;
        }
        Ok(decoded)
    }

    async fn revoke_refresh_tokens(&self, uid: &str) -> Result<(), ProviderError> {
        let _: LocalIdResponse = self
            .post_json(
                "/accounts:update",
                &json!({ "localId": uid, "validSince": now_unix_secs().to_string() }),
            )
            .await?;

        tracing::info!(uid, "Refresh tokens revoked");
        Ok(())
    }

    async fn list_users(
        &self,
        max_results: u32,
        page_token: Option<&str>,
    ) -> Result<UserPage, ProviderError> {
        if max_results == 0 || max_results > MAX_LIST_RESULTS {
            return Err(ProviderError::InvalidArgument(format!(
                "maxResults must be between 1 and {MAX_LIST_RESULTS}"
            )));
        }

        let mut query = vec![("maxResults", max_results.to_string())];
        if let Some(token) = page_token.filter(|token| !token.is_empty()) {
            query.push(("nextPageToken", token.to_string()));
        }

        let response: BatchGetResponse = self.get_json("/accounts:batchGet", &query).await?;

        Ok(UserPage {
            users: response.users.into_iter().map(RestUser::into_record).collect(),
            page_token: response.next_page_token.filter(|token| !token.is_empty()),
        })
    }
}

// ─── Wire types ──────────────────────────────────────────────

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CreateAccountRequest<'a> {
    email: &'a str,
    email_verified: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    display_name: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    password: Option<&'a str>,
    disabled: bool,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct LocalIdResponse {
    local_id: String,
}

#[derive(Deserialize)]
struct LookupResponse {
    #[serde(default)]
    users: Vec<RestUser>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct BatchGetResponse {
    #[serde(default)]
    users: Vec<RestUser>,
    next_page_token: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SessionCookieResponse {
    session_cookie: String,
}

/// Account resource as returned by the REST API.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RestUser {
    local_id: String,
    email: Option<String>,
    #[serde(default)]
    email_verified: bool,
    display_name: Option<String>,
    photo_url: Option<String>,
    #[serde(default)]
    disabled: bool,
    custom_attributes: Option<String>,
    created_at: Option<String>,
    last_login_at: Option<String>,
    last_refresh_at: Option<String>,
    valid_since: Option<String>,
    #[serde(default)]
    provider_user_info: Vec<RestProviderInfo>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RestProviderInfo {
    provider_id: String,
    raw_id: Option<String>,
    email: Option<String>,
    display_name: Option<String>,
    photo_url: Option<String>,
}

impl RestUser {
    fn into_record(self) -> UserRecord {
        let custom_claims = self.custom_attributes.as_deref().and_then(|raw| {
            serde_json::from_str::<CustomClaims>(raw)
                .map_err(|e| {
                    tracing::warn!(uid = %self.local_id, error = %e, "Ignoring malformed custom claims");
                })
                .ok()
        });

        let last_refresh_time = self
            .last_refresh_at
            .as_deref()
            .and_then(|raw| chrono::DateTime::parse_from_rfc3339(raw).ok())
            .map(|date| format_http_date(date.with_timezone(&chrono::Utc)));

        UserRecord {
            email: self.email,
            email_verified: self.email_verified,
            display_name: self.display_name,
            photo_url: self.photo_url,
            disabled: self.disabled,
            custom_claims,
            metadata: UserMetadata {
                creation_time: self
                    .created_at
                    .as_deref()
                    .and_then(parse_epoch_millis)
                    .map(format_http_date),
                last_sign_in_time: self
                    .last_login_at
                    .as_deref()
                    .and_then(parse_epoch_millis)
                    .map(format_http_date),
                last_refresh_time,
            },
            provider_data: self
                .provider_user_info
                .into_iter()
                .map(|info| UserInfo {
                    uid: info.raw_id.unwrap_or_default(),
                    provider_id: info.provider_id,
                    email: info.email,
                    display_name: info.display_name,
                    photo_url: info.photo_url,
                })
                .collect(),
            tokens_valid_after: self.valid_since.as_deref().and_then(parse_epoch_secs),
            uid: self.local_id,
        }
    }
}

#[derive(Deserialize)]
struct RestErrorBody {
    error: RestErrorDetail,
}

#[derive(Deserialize)]
struct RestErrorDetail {
    message: String,
}

// ─── Helpers ─────────────────────────────────────────────────

fn update_request(uid: &str, update: &UserUpdate) -> serde_json::Value {
    let mut body = json!({ "localId": uid });
    let mut delete_attributes = Vec::new();

    match &update.display_name {
        Some(Some(name)) if !name.is_empty() => body["displayName"] = json!(name),
        Some(_) => delete_attributes.push("DISPLAY_NAME"),
        None => {}
    }
    match &update.photo_url {
        Some(Some(url)) if !url.is_empty() => body["photoUrl"] = json!(url),
        Some(_) => delete_attributes.push("PHOTO_URL"),
        None => {}
    }
    if let Some(disabled) = update.disabled {
        body["disableUser"] = json!(disabled);
    }
    if !delete_attributes.is_empty() {
        body["deleteAttribute"] = json!(delete_attributes);
    }

    body
}

/// Serialize claims for storage, enforcing the provider's limits.
fn serialize_custom_claims(claims: Option<&CustomClaims>) -> Result<String, ProviderError> {
    let Some(claims) = claims else {
        return Ok("{}".to_string());
    };

    if let Some(reserved) = claims
        .keys()
        .find(|name| RESERVED_CLAIMS.contains(&name.as_str()))
    {
        return Err(ProviderError::InvalidArgument(format!(
            "claim \"{reserved}\" is reserved and cannot be specified"
        )));
    }

    let payload = serde_json::to_string(claims)
        .map_err(|e| ProviderError::Internal(format!("failed to serialize claims: {e}")))?;

    if payload.len() > MAX_CLAIMS_PAYLOAD_BYTES {
        return Err(ProviderError::InvalidArgument(format!(
            "custom claims payload must not exceed {MAX_CLAIMS_PAYLOAD_BYTES} characters"
        )));
    }

    Ok(payload)
}

fn validate_session_lifetime(lifetime: Duration) -> Result<(), ProviderError> {
    if lifetime < MIN_SESSION_COOKIE_LIFETIME || lifetime > MAX_SESSION_COOKIE_LIFETIME {
        return Err(ProviderError::InvalidArgument(
            "session cookie lifetime must be between 5 minutes and 2 weeks".to_string(),
        ));
    }
    Ok(())
}

/// A session is revoked when it authenticated before the user's valid-since time.
fn is_revoked(token: &DecodedToken, user: &UserRecord) -> bool {
    user.tokens_valid_after
        .is_some_and(|valid_after| (token.auth_time as i64) < valid_after.timestamp())
}

fn verify_error(err: VerifyError) -> ProviderError {
    match err {
        VerifyError::Expired => ProviderError::TokenExpired,
        VerifyError::Invalid(reason) => ProviderError::InvalidToken(reason),
        VerifyError::Transient(reason) => ProviderError::Unavailable(reason),
    }
}

fn transport_error(err: reqwest::Error) -> ProviderError {
    if err.is_timeout() {
        ProviderError::Unavailable("deadline exceeded".to_string())
    } else {
        ProviderError::Unavailable(err.to_string())
    }
}

async fn check_response_json<T: DeserializeOwned>(
    response: reqwest::Response,
) -> Result<T, ProviderError> {
    let status = response.status();

    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<RestErrorBody>(&body)
            .map(|parsed| parsed.error.message)
            .unwrap_or_else(|_| format!("HTTP {status}"));
        tracing::warn!(status = %status, message = %message, "Identity provider request failed");
        return Err(map_rest_error(&message));
    }

    response
        .json()
        .await
        .map_err(|e| ProviderError::Internal(format!("invalid provider response: {e}")))
}

/// Map a REST error message such as `"WEAK_PASSWORD : too short"` onto a category.
fn map_rest_error(message: &str) -> ProviderError {
    let code = message
        .split(|c: char| c == ' ' || c == ':')
        .next()
        .unwrap_or(message);

    match code {
        "USER_NOT_FOUND" => ProviderError::UserNotFound,
        "EMAIL_EXISTS" | "DUPLICATE_EMAIL" => ProviderError::EmailExists,
        "INVALID_EMAIL" => ProviderError::InvalidEmail,
        "TOKEN_EXPIRED" => ProviderError::TokenExpired,
        "INVALID_ID_TOKEN" => ProviderError::InvalidToken(message.to_string()),
        "USER_DISABLED" => ProviderError::UserDisabled,
        "WEAK_PASSWORD"
        | "INVALID_PASSWORD"
        | "INVALID_CLAIMS"
        | "CLAIMS_TOO_LARGE"
        | "FORBIDDEN_CLAIM"
        | "INVALID_DISPLAY_NAME"
        | "INVALID_PHOTO_URL"
        | "INVALID_SESSION_COOKIE_DURATION"
        | "INVALID_PAGE_SELECTION"
        | "MISSING_LOCAL_ID" => ProviderError::InvalidArgument(message.to_string()),
        _ => ProviderError::Internal(message.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rest_user(value: serde_json::Value) -> RestUser {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn rest_user_maps_to_record() {
        let record = rest_user(json!({
            "localId": "abc",
            "email": "a@example.com",
            "emailVerified": true,
            "displayName": "Ann",
            "passwordHash": "c2VjcmV0",
            "customAttributes": "{\"admin\":true}",
            "createdAt": "1704067200000",
            "lastLoginAt": "1704153600000",
            "lastRefreshAt": "2024-01-02T00:00:00.000Z",
            "validSince": "1704067200",
            "providerUserInfo": [{
                "providerId": "password",
                "rawId": "a@example.com",
                "email": "a@example.com"
            }]
        }))
        .into_record();

        assert_eq!(record.uid, "abc");
        assert!(record.email_verified);
        assert!(record.is_admin());
        assert_eq!(
            record.metadata.creation_time.as_deref(),
            Some("Mon, 01 Jan 2024 00:00:00 GMT")
        );
        assert_eq!(
            record.metadata.last_sign_in_time.as_deref(),
            Some("Tue, 02 Jan 2024 00:00:00 GMT")
        );
        assert_eq!(
            record.metadata.last_refresh_time.as_deref(),
            Some("Tue, 02 Jan 2024 00:00:00 GMT")
        );
        assert_eq!(record.provider_data[0].uid, "a@example.com");
        assert_eq!(record.tokens_valid_after.unwrap().timestamp(), 1_704_067_200);
    }

    #[test]
    fn malformed_claims_are_dropped() {
        let record = rest_user(json!({"localId": "abc", "customAttributes": "{not json"})).into_record();
        assert!(record.custom_claims.is_none());
        assert!(!record.disabled);
    }

    #[test]
    fn rest_errors_map_to_categories() {
        assert_eq!(map_rest_error("USER_NOT_FOUND"), ProviderError::UserNotFound);
        assert_eq!(map_rest_error("EMAIL_EXISTS"), ProviderError::EmailExists);
        assert_eq!(map_rest_error("INVALID_EMAIL"), ProviderError::InvalidEmail);
        assert!(matches!(
            map_rest_error("WEAK_PASSWORD : Password should be at least 6 characters"),
            ProviderError::InvalidArgument(_)
        ));
        assert!(matches!(
            map_rest_error("INVALID_ID_TOKEN"),
            ProviderError::InvalidToken(_)
        ));
        assert!(matches!(
            map_rest_error("PERMISSION_DENIED: nope"),
            ProviderError::Internal(_)
        ));
    }

    #[test]
    fn revocation_compares_auth_time() {
        let token: DecodedToken = serde_json::from_value(json!({
            "sub": "abc",
            "iss": "i",
            "aud": "a",
            "exp": 2_000_000_000u64,
            "iat": 1_704_067_100u64,
            "auth_time": 1_704_067_100u64
        }))
        .unwrap();

        let mut user = UserRecord {
            uid: "abc".to_string(),
            ..Default::default()
        };
        assert!(!is_revoked(&token, &user));

        user.tokens_valid_after = parse_epoch_secs("1704067200");
        assert!(is_revoked(&token, &user));

        user.tokens_valid_after = parse_epoch_secs("1704067000");
        assert!(!is_revoked(&token, &user));
    }

    #[test]
    fn claims_validation() {
        assert_eq!(serialize_custom_claims(None).unwrap(), "{}");

        let ok = json!({"admin": true}).as_object().cloned().unwrap();
        assert_eq!(serialize_custom_claims(Some(&ok)).unwrap(), "{\"admin\":true}");

        let reserved = json!({"sub": "x"}).as_object().cloned().unwrap();
        assert!(serialize_custom_claims(Some(&reserved)).is_err());

        let big = json!({"blob": "x".repeat(1000)}).as_object().cloned().unwrap();
        assert!(serialize_custom_claims(Some(&big)).is_err());
    }

    #[test]
    fn session_lifetime_bounds() {
        assert!(validate_session_lifetime(Duration::from_secs(5 * 24 * 60 * 60)).is_ok());
        assert!(validate_session_lifetime(Duration::from_secs(60)).is_err());
        assert!(validate_session_lifetime(Duration::from_secs(15 * 24 * 60 * 60)).is_err());
    }

    #[test]
    fn update_request_clears_blank_fields() {
        let body = update_request(
            "abc",
            &UserUpdate {
                display_name: Some(None),
                photo_url: Some(Some("https://x.test/p.png".to_string())),
                disabled: Some(true),
            },
        );

        assert_eq!(body["localId"], "abc");
        assert_eq!(body["photoUrl"], "https://x.test/p.png");
        assert_eq!(body["disableUser"], true);
        assert_eq!(body["deleteAttribute"], json!(["DISPLAY_NAME"]));
        assert!(body.get("displayName").is_none());
    }
}
