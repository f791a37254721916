// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Admin credentials: Google access tokens and custom token signing.
//!
//! Access tokens come from the gcloud token generator, which caches and
//! refreshes them. Custom tokens need a service-account key; deployments on
//! default credentials can call every admin API except custom token minting.

use crate::config::{ProviderCredentials, ServiceAccountKey};
use crate::models::CustomClaims;
use crate::services::provider::ProviderError;
use crate::services::token_verifier::now_unix_secs;
use anyhow::Context;
use gcloud_sdk::{GoogleAuthTokenGenerator, TokenSourceType};
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use serde::Serialize;
use std::time::Duration;

const CUSTOM_TOKEN_AUDIENCE: &str =
    "https://identitytoolkit.googleapis.com/google.identity.identitytoolkit.v1.IdentityToolkit";
const CUSTOM_TOKEN_LIFETIME_SECS: u64 = 60 * 60;
const OAUTH_SCOPES: &[&str] = &[
    "https://www.googleapis.com/auth/cloud-platform",
    "https://www.googleapis.com/auth/firebase",
    "https://www.googleapis.com/auth/identitytoolkit",
    "https://www.googleapis.com/auth/userinfo.email",
];
const MAX_UID_LEN: usize = 128;

/// Claim names the provider reserves for itself.
pub const RESERVED_CLAIMS: &[&str] = &[
    "acr", "amr", "at_hash", "aud", "auth_time", "azp", "cnf", "c_hash", "exp", "firebase",
    "iat", "iss", "jti", "nbf", "nonce", "sub",
];

#[derive(Serialize)]
struct CustomTokenClaims<'a> {
    iss: &'a str,
    sub: &'a str,
    aud: &'static str,
    iat: u64,
    exp: u64,
    uid: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    claims: Option<&'a CustomClaims>,
}

/// Signs custom tokens with a service-account key.
pub struct CustomTokenSigner {
    client_email: String,
    signing_key: EncodingKey,
}

impl CustomTokenSigner {
    pub fn new(key: &ServiceAccountKey) -> anyhow::Result<Self> {
        let signing_key = EncodingKey::from_rsa_pem(key.private_key.as_bytes())
            .context("service account private key is not a valid RSA PEM")?;

        Ok(Self {
            client_email: key.client_email.clone(),
            signing_key,
        })
    }

    pub fn client_email(&self) -> &str {
        &self.client_email
    }

    /// Sign a one-hour custom token for `uid` carrying optional developer claims.
    pub fn sign(&self, uid: &str, claims: Option<&CustomClaims>) -> Result<String, ProviderError> {
        if uid.is_empty() || uid.len() > MAX_UID_LEN {
            return Err(ProviderError::InvalidArgument(format!(
                "uid must be a non-empty string with at most {MAX_UID_LEN} characters"
            )));
        }

        if let Some(claims) = claims {
            if let Some(reserved) = claims
                .keys()
                .find(|name| RESERVED_CLAIMS.contains(&name.as_str()))
            {
                return Err(ProviderError::InvalidArgument(format!(
                    "developer claim \"{reserved}\" is reserved"
                )));
            }
        }

        let iat = now_unix_secs();
        let payload = CustomTokenClaims {
            iss: &self.client_email,
            sub: &self.client_email,
            aud: CUSTOM_TOKEN_AUDIENCE,
            iat,
            exp: iat + CUSTOM_TOKEN_LIFETIME_SECS,
            uid,
            claims: claims.filter(|claims| !claims.is_empty()),
        };

        encode(&Header::new(Algorithm::RS256), &payload, &self.signing_key)
            .map_err(|e| ProviderError::Internal(format!("failed to sign custom token: {e}")))
    }
}

/// Credentials used by the admin REST client.
pub struct AdminCredentials {
    project_id: String,
    signer: Option<CustomTokenSigner>,
    tokens: GoogleAuthTokenGenerator,
    timeout: Duration,
}

impl AdminCredentials {
    /// Set up the token source; `timeout` bounds each token fetch.
    pub async fn new(credentials: &ProviderCredentials, timeout: Duration) -> anyhow::Result<Self> {
        let (source, signer) = match credentials {
            ProviderCredentials::ServiceAccount(key) => (
                TokenSourceType::Json(key.to_credentials_json()),
                Some(CustomTokenSigner::new(key)?),
            ),
            ProviderCredentials::ApplicationDefault { .. } => (TokenSourceType::Default, None),
        };

        let scopes = OAUTH_SCOPES.iter().map(|scope| scope.to_string()).collect();
        let tokens = GoogleAuthTokenGenerator::new(source, scopes)
            .await
            .context("failed to set up Google credentials")?;

        Ok(Self {
            project_id: credentials.project_id().to_string(),
            signer,
            tokens,
            timeout,
        })
    }

    pub fn project_id(&self) -> &str {
        &self.project_id
    }

    /// Service account that signs custom tokens, if any.
    pub fn signer_email(&self) -> Option<&str> {
        self.signer.as_ref().map(CustomTokenSigner::client_email)
    }

    pub fn sign_custom_token(
        &self,
        uid: &str,
        claims: Option<&CustomClaims>,
    ) -> Result<String, ProviderError> {
        require_signer(self.signer.as_ref())?.sign(uid, claims)
    }

    /// Current OAuth2 access token for admin calls.
    pub async fn access_token(&self) -> Result<String, ProviderError> {
        let token = tokio::time::timeout(self.timeout, self.tokens.create_token())
            .await
            .map_err(|_| ProviderError::Unavailable("access token request timed out".to_string()))?
            .map_err(|e| {
                tracing::error!(error = %e, "Failed to obtain provider access token");
                ProviderError::Unavailable(format!("access token request failed: {e}"))
            })?;

        Ok(token.token.as_sensitive_str().to_string())
    }
}

fn require_signer(signer: Option<&CustomTokenSigner>) -> Result<&CustomTokenSigner, ProviderError> {
    signer.ok_or_else(|| {
        ProviderError::Internal("custom token signing requires a service-account key".to_string())
    })
}
