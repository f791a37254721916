// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Verification of provider-issued ID tokens and session cookies.
//!
//! Both are RS256 JWTs signed with Google-managed keys published as JWKS.
//! Keys are cached for the `max-age` advertised by the key endpoint.

use crate::models::DecodedToken;
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, decode_header, Algorithm, DecodingKey, Validation};
use reqwest::header::CACHE_CONTROL;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};
use tokio::sync::{Mutex, RwLock};

const ID_TOKEN_JWKS_URL: &str =
    "https://www.googleapis.com/service_accounts/v1/jwk/securetoken@system.gserviceaccount.com";
const SESSION_COOKIE_JWKS_URL: &str =
    "https://identitytoolkit.googleapis.com/v1/sessionCookiePublicKeys";
const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(300);
const CLOCK_SKEW_SECS: u64 = 60;
const MAX_UID_LEN: usize = 128;

/// Which kind of provider JWT a verifier accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    IdToken,
    SessionCookie,
}

impl TokenKind {
    fn jwks_url(self) -> &'static str {
        match self {
            TokenKind::IdToken => ID_TOKEN_JWKS_URL,
            TokenKind::SessionCookie => SESSION_COOKIE_JWKS_URL,
        }
    }

    /// Expected `iss` for tokens of this kind in `project_id`.
    pub fn issuer(self, project_id: &str) -> String {
        match self {
            TokenKind::IdToken => format!("https://securetoken.google.com/{project_id}"),
            TokenKind::SessionCookie => format!("https://session.firebase.google.com/{project_id}"),
        }
    }

    fn label(self) -> &'static str {
        match self {
            TokenKind::IdToken => "ID token",
            TokenKind::SessionCookie => "session cookie",
        }
    }
}

/// Verification error categories.
#[derive(Debug, Clone, PartialEq)]
pub enum VerifyError {
    /// Signature is valid but `exp` has passed.
    Expired,
    /// The token is malformed or its claims do not match expectations.
    Invalid(String),
    /// Signing keys could not be fetched.
    Transient(String),
}

#[derive(Clone)]
enum KeySource {
    Jwks,
    StaticKey {
        kid: String,
        decoding_key: Arc<DecodingKey>,
    },
}

#[derive(Clone)]
struct JwksCacheEntry {
    keys_by_kid: HashMap<String, Arc<DecodingKey>>,
    expires_at: Instant,
}

/// Verifier for one kind of provider JWT within one project.
pub struct TokenVerifier {
    http_client: reqwest::Client,
    kind: TokenKind,
    project_id: String,
    issuer: String,
    source: KeySource,
    jwks_cache: RwLock<Option<JwksCacheEntry>>,
    refresh_lock: Mutex<()>,
}

impl TokenVerifier {
    /// Create a verifier that fetches and caches Google-published keys.
    pub fn new(kind: TokenKind, project_id: &str, http_client: reqwest::Client) -> Self {
        tracing::info!(
            kind = kind.label(),
            issuer = %kind.issuer(project_id),
            "Initialized token verifier"
        );

        Self {
            http_client,
            kind,
            project_id: project_id.to_string(),
            issuer: kind.issuer(project_id),
            source: KeySource::Jwks,
            jwks_cache: RwLock::new(None),
            refresh_lock: Mutex::new(()),
        }
    }

    /// Create a verifier with a static RSA public key.
    ///
    /// This is intended for deterministic local/integration tests.
    pub fn new_with_static_key(
        kind: TokenKind,
        project_id: &str,
        kid: impl Into<String>,
        decoding_key: DecodingKey,
    ) -> anyhow::Result<Self> {
        let kid = kid.into();
        if kid.trim().is_empty() {
            anyhow::bail!("static verifier kid must not be empty");
        }

        Ok(Self {
            http_client: reqwest::Client::new(),
            kind,
            project_id: project_id.to_string(),
            issuer: kind.issuer(project_id),
            source: KeySource::StaticKey {
                kid,
                decoding_key: Arc::new(decoding_key),
            },
            jwks_cache: RwLock::new(None),
            refresh_lock: Mutex::new(()),
        })
    }

    /// Verify signature and claims of `token`.
    pub async fn verify(&self, token: &str) -> Result<DecodedToken, VerifyError> {
        if token.is_empty() {
            return Err(VerifyError::Invalid(format!(
                "{} must be a non-empty string",
                self.kind.label()
            )));
        }

        let header = decode_header(token)
            .map_err(|e| VerifyError::Invalid(format!("invalid JWT header: {e}")))?;

        if header.alg != Algorithm::RS256 {
            return Err(VerifyError::Invalid(format!(
                "unexpected JWT alg: {:?}",
                header.alg
            )));
        }

        let kid = header
            .kid
            .ok_or_else(|| VerifyError::Invalid("missing JWT kid".to_string()))?;

        let decoding_key = self.decoding_key_for_kid(&kid).await?;

        let mut validation = Validation::new(Algorithm::RS256);
        validation.set_required_spec_claims(&["exp", "iss", "aud", "sub"]);
        validation.set_issuer(&[self.issuer.as_str()]);
        validation.set_audience(&[self.project_id.as_str()]);
        validation.leeway = CLOCK_SKEW_SECS;

        let token_data = decode::<DecodedToken>(token, decoding_key.as_ref(), &validation)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => VerifyError::Expired,
                _ => VerifyError::Invalid(format!("JWT validation failed: {e}")),
            })?;

        let claims = token_data.claims;

        if claims.uid.is_empty() || claims.uid.len() > MAX_UID_LEN {
            return Err(VerifyError::Invalid(format!(
                "sub claim must be 1-{MAX_UID_LEN} characters"
            )));
        }

        let now = now_unix_secs();
        if claims.iat > now + CLOCK_SKEW_SECS {
            return Err(VerifyError::Invalid("iat claim is in the future".to_string()));
        }
        if claims.auth_time > now + CLOCK_SKEW_SECS {
            return Err(VerifyError::Invalid(
                "auth_time claim is in the future".to_string(),
            ));
        }

        tracing::debug!(
            kind = self.kind.label(),
            uid = %claims.uid,
            exp = claims.exp,
            "Token verified"
        );

        Ok(claims)
    }

    async fn decoding_key_for_kid(&self, kid: &str) -> Result<Arc<DecodingKey>, VerifyError> {
        match &self.source {
            KeySource::StaticKey {
                kid: static_kid,
                decoding_key,
            } => {
                if kid == static_kid {
                    return Ok(decoding_key.clone());
                }

                return Err(VerifyError::Invalid(format!(
                    "unknown JWT kid for static verifier: {kid}"
                )));
            }
            KeySource::Jwks => {}
        }

        if let Some(key) = self.lookup_cached_key(kid).await {
            return Ok(key);
        }

        for force_refresh in [false, true] {
            self.refresh_jwks(force_refresh).await?;
            if let Some(key) = self.lookup_cached_key(kid).await {
                return Ok(key);
            }
        }

        Err(VerifyError::Invalid(format!(
            "JWT kid not found in JWKS after refresh: {kid}"
        )))
    }

    async fn lookup_cached_key(&self, kid: &str) -> Option<Arc<DecodingKey>> {
        let cache = self.jwks_cache.read().await;
        let now = Instant::now();
        cache
            .as_ref()
            .filter(|entry| entry.expires_at > now)
            .and_then(|entry| entry.keys_by_kid.get(kid))
            .cloned()
    }

    async fn refresh_jwks(&self, force_refresh: bool) -> Result<(), VerifyError> {
        let _guard = self.refresh_lock.lock().await;

        if !force_refresh {
            let cache = self.jwks_cache.read().await;
            if cache
                .as_ref()
                .is_some_and(|entry| entry.expires_at > Instant::now())
            {
                return Ok(());
            }
        }

        let jwks_url = self.kind.jwks_url();
        tracing::debug!(jwks_url, "Refreshing signing key cache");

        let response = self
            .http_client
            .get(jwks_url)
            .send()
            .await
            .map_err(|e| VerifyError::Transient(format!("JWKS request failed: {e}")))?;

        if !response.status().is_success() {
            return Err(VerifyError::Transient(format!(
                "JWKS request returned status {}",
                response.status()
            )));
        }

        let ttl = cache_ttl_from_headers(response.headers(), DEFAULT_CACHE_TTL);

        let jwks: Jwks = response
            .json()
            .await
            .map_err(|e| VerifyError::Transient(format!("invalid JWKS JSON: {e}")))?;

        let keys_by_kid = usable_keys(jwks);
        if keys_by_kid.is_empty() {
            return Err(VerifyError::Transient(
                "JWKS response did not include any usable RSA keys".to_string(),
            ));
        }

        *self.jwks_cache.write().await = Some(JwksCacheEntry {
            keys_by_kid,
            expires_at: Instant::now() + ttl,
        });

        tracing::debug!(ttl_secs = ttl.as_secs(), "Signing key cache refreshed");
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
struct Jwks {
    keys: Vec<Jwk>,
}

#[derive(Debug, Deserialize)]
struct Jwk {
    kid: String,
    kty: String,
    alg: Option<String>,
    n: String,
    e: String,
    #[serde(rename = "use")]
    use_: Option<String>,
}

fn usable_keys(jwks: Jwks) -> HashMap<String, Arc<DecodingKey>> {
    let mut keys_by_kid = HashMap::new();

    for jwk in jwks.keys {
        if jwk.kty != "RSA" || jwk.kid.trim().is_empty() {
            continue;
        }
        if jwk.alg.as_deref().is_some_and(|alg| alg != "RS256") {
            continue;
        }
        if jwk.use_.as_deref().is_some_and(|use_| use_ != "sig") {
            continue;
        }

        match DecodingKey::from_rsa_components(&jwk.n, &jwk.e) {
            Ok(key) => {
                keys_by_kid.insert(jwk.kid, Arc::new(key));
            }
            Err(e) => {
                tracing::warn!(error = %e, kid = %jwk.kid, "Skipping invalid RSA JWKS key");
            }
        }
    }

    keys_by_kid
}

/// Strip the `Bearer ` prefix from an Authorization header value.
pub fn bearer_token(header_value: &str) -> Option<&str> {
    header_value
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

fn cache_ttl_from_headers(headers: &reqwest::header::HeaderMap, fallback: Duration) -> Duration {
    headers
        .get(CACHE_CONTROL)
        .and_then(|v| v.to_str().ok())
        .and_then(parse_cache_control_max_age)
        .map(Duration::from_secs)
        .unwrap_or(fallback)
}

fn parse_cache_control_max_age(value: &str) -> Option<u64> {
    value.split(',').find_map(|directive| {
        directive
            .trim()
            .strip_prefix("max-age=")
            .and_then(|raw| raw.trim_matches('"').parse::<u64>().ok())
    })
}

pub(crate) fn now_unix_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{encode, EncodingKey, Header};
    use serde_json::json;

    const PRIVATE_PEM: &[u8] = include_bytes!("../../tests/fixtures/test_rsa_private.pem");
    const PUBLIC_PEM: &[u8] = include_bytes!("../../tests/fixtures/test_rsa_public.pem");
    const KID: &str = "test-kid";
    const PROJECT: &str = "demo-project";

    fn verifier(kind: TokenKind) -> TokenVerifier {
        TokenVerifier::new_with_static_key(
            kind,
            PROJECT,
            KID,
            DecodingKey::from_rsa_pem(PUBLIC_PEM).unwrap(),
        )
        .unwrap()
    }

    fn sign(claims: serde_json::Value, kid: &str) -> String {
        let mut header = Header::new(Algorithm::RS256);
        header.kid = Some(kid.to_string());
        encode(&header, &claims, &EncodingKey::from_rsa_pem(PRIVATE_PEM).unwrap()).unwrap()
    }

    fn claims(kind: TokenKind, exp_offset: i64) -> serde_json::Value {
        let now = now_unix_secs() as i64;
        json!({
            "iss": kind.issuer(PROJECT),
            "aud": PROJECT,
            "sub": "user-1",
            "iat": now - 10,
            "auth_time": now - 10,
            "exp": now + exp_offset,
            "email": "user@example.com",
            "email_verified": true,
            "admin": true
        })
    }

    #[tokio::test]
    async fn verifies_valid_id_token() {
        let token = sign(claims(TokenKind::IdToken, 3600), KID);
        let decoded = verifier(TokenKind::IdToken).verify(&token).await.unwrap();

        assert_eq!(decoded.uid, "user-1");
        assert_eq!(decoded.email.as_deref(), Some("user@example.com"));
        assert_eq!(decoded.email_verified, Some(true));
        assert_eq!(decoded.claims.get("admin"), Some(&json!(true)));
    }

    #[tokio::test]
    async fn expired_token_is_distinguished() {
        let token = sign(claims(TokenKind::IdToken, -3600), KID);
        let err = verifier(TokenKind::IdToken).verify(&token).await.unwrap_err();
        assert_eq!(err, VerifyError::Expired);
    }

    #[tokio::test]
    async fn session_cookie_rejected_as_id_token() {
        let cookie = sign(claims(TokenKind::SessionCookie, 3600), KID);

        assert!(verifier(TokenKind::SessionCookie).verify(&cookie).await.is_ok());
        assert!(matches!(
            verifier(TokenKind::IdToken).verify(&cookie).await,
            Err(VerifyError::Invalid(_))
        ));
    }

    #[tokio::test]
    async fn wrong_audience_and_kid_rejected() {
        let mut wrong_aud = claims(TokenKind::IdToken, 3600);
        wrong_aud["aud"] = json!("other-project");
        let token = sign(wrong_aud, KID);
        assert!(matches!(
            verifier(TokenKind::IdToken).verify(&token).await,
            Err(VerifyError::Invalid(_))
        ));

        let token = sign(claims(TokenKind::IdToken, 3600), "other-kid");
        assert!(matches!(
            verifier(TokenKind::IdToken).verify(&token).await,
            Err(VerifyError::Invalid(_))
        ));
    }

    #[tokio::test]
    async fn garbage_token_rejected() {
        assert!(matches!(
            verifier(TokenKind::IdToken).verify("not.a.jwt").await,
            Err(VerifyError::Invalid(_))
        ));
        assert!(matches!(
            verifier(TokenKind::IdToken).verify("").await,
            Err(VerifyError::Invalid(_))
        ));
    }

    #[test]
    fn parse_cache_control_max_age_valid() {
        assert_eq!(
            parse_cache_control_max_age("public, max-age=3600"),
            Some(3600)
        );
        assert_eq!(parse_cache_control_max_age("max-age=60"), Some(60));
        assert_eq!(parse_cache_control_max_age("max-age=\"120\""), Some(120));
    }

    #[test]
    fn parse_cache_control_max_age_invalid() {
        assert_eq!(parse_cache_control_max_age("public, immutable"), None);
        assert_eq!(parse_cache_control_max_age("max-age=abc"), None);
        assert_eq!(parse_cache_control_max_age(""), None);
    }

    #[test]
    fn bearer_token_extraction() {
        assert_eq!(bearer_token("Bearer abc"), Some("abc"));
        assert_eq!(bearer_token("Bearer "), None);
        assert_eq!(bearer_token("Basic abc"), None);
        assert_eq!(bearer_token("bearer abc"), None);
    }
}
