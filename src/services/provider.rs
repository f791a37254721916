// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! The identity provider capability.
//!
//! Every security-sensitive operation is delegated through this trait so the
//! HTTP layer never depends on a concrete provider client.

use crate::models::{CustomClaims, DecodedToken, NewUser, UserPage, UserRecord, UserUpdate};
use async_trait::async_trait;
use std::time::Duration;

/// Provider failure categories surfaced to the HTTP layer.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ProviderError {
    #[error("user not found")]
    UserNotFound,

    #[error("token has expired")]
    TokenExpired,

    #[error("token has been revoked")]
    TokenRevoked,

    #[error("invalid token: {0}")]
    InvalidToken(String),

    #[error("user account is disabled")]
    UserDisabled,

    #[error("email already exists")]
    EmailExists,

    #[error("invalid email")]
    InvalidEmail,

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Network failure or deadline exceeded.
    #[error("identity provider unavailable: {0}")]
    Unavailable(String),

    #[error("identity provider error: {0}")]
    Internal(String),
}

/// Operations offered by the managed identity provider.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Verify an ID token, optionally rejecting revoked sessions.
    async fn verify_id_token(
        &self,
        id_token: &str,
        check_revoked: bool,
    ) -> Result<DecodedToken, ProviderError>;

    async fn get_user(&self, uid: &str) -> Result<UserRecord, ProviderError>;

    async fn create_user(&self, user: NewUser) -> Result<UserRecord, ProviderError>;

    async fn update_user(&self, uid: &str, update: UserUpdate) -> Result<UserRecord, ProviderError>;

    async fn delete_user(&self, uid: &str) -> Result<(), ProviderError>;

    /// Replace a user's custom claims. `None` clears them.
    async fn set_custom_claims(
        &self,
        uid: &str,
        claims: Option<CustomClaims>,
    ) -> Result<(), ProviderError>;

    /// Mint a signed custom token for `uid`.
    async fn create_custom_token(
        &self,
        uid: &str,
        claims: Option<CustomClaims>,
    ) -> Result<String, ProviderError>;

    /// Exchange an ID token for a session cookie valid for `lifetime`.
    async fn create_session_cookie(
        &self,
        id_token: &str,
        lifetime: Duration,
    ) -> Result<String, ProviderError>;

    async fn verify_session_cookie(
        &self,
        session_cookie: &str,
        check_revoked: bool,
    ) -> Result<DecodedToken, ProviderError>;

    /// Invalidate every refresh token issued to `uid`.
    async fn revoke_refresh_tokens(&self, uid: &str) -> Result<(), ProviderError>;

    async fn list_users(
        &self,
        max_results: u32,
        page_token: Option<&str>,
    ) -> Result<UserPage, ProviderError>;
}
