// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Application configuration loaded from environment variables.
//!
//! Provider credentials come from a service-account JSON file
//! (`GOOGLE_APPLICATION_CREDENTIALS`), from the individual `FIREBASE_*`
//! variables, or, when only `FIREBASE_PROJECT_ID` is set, from the
//! ambient Google credentials of the runtime.

use serde::Deserialize;
use std::env;
use std::str::FromStr;
use std::time::Duration;

/// Default session cookie lifetime (five days).
pub const DEFAULT_SESSION_COOKIE_LIFETIME: Duration = Duration::from_secs(5 * 24 * 60 * 60);

const DEFAULT_PORT: u16 = 3000;
const DEFAULT_RATE_LIMIT_WINDOW_MS: u64 = 15 * 60 * 1000;
const DEFAULT_RATE_LIMIT_MAX_REQUESTS: u32 = 100;
const DEFAULT_BODY_LIMIT_BYTES: usize = 10 * 1024 * 1024;
const DEFAULT_PROVIDER_TIMEOUT_MS: u64 = 10_000;
const DEFAULT_CORS_ORIGIN: &str = "http://localhost:3000";

/// Deployment mode. Only `Development` exposes internal error detail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Development,
    Production,
    Test,
}

impl Environment {
    pub fn is_development(self) -> bool {
        self == Environment::Development
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Environment::Development => "development",
            Environment::Production => "production",
            Environment::Test => "test",
        }
    }
}

impl FromStr for Environment {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "development" | "dev" => Ok(Environment::Development),
            "production" | "prod" => Ok(Environment::Production),
            "test" => Ok(Environment::Test),
            _ => Err(ConfigError::Invalid("APP_ENV")),
        }
    }
}

/// Service-account credentials for the identity provider.
#[derive(Clone, Deserialize)]
pub struct ServiceAccountKey {
    pub project_id: String,
    pub client_email: String,
    pub private_key: String,
    #[serde(default)]
    pub private_key_id: String,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

impl ServiceAccountKey {
    /// Key file JSON in the form Google credential loaders expect.
    pub fn to_credentials_json(&self) -> String {
        serde_json::json!({
            "type": "service_account",
            "project_id": self.project_id,
            "client_email": self.client_email,
            "private_key_id": self.private_key_id,
            "private_key": self.private_key,
            "token_uri": self.token_uri,
        })
        .to_string()
    }
}

fn default_token_uri() -> String {
    "https://oauth2.googleapis.com/token".to_string()
}

// Keep the private key out of logs.
impl std::fmt::Debug for ServiceAccountKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceAccountKey")
            .field("project_id", &self.project_id)
            .field("client_email", &self.client_email)
            .field("token_uri", &self.token_uri)
            .finish_non_exhaustive()
    }
}

/// Where admin calls get their Google credentials.
#[derive(Debug, Clone)]
pub enum ProviderCredentials {
    /// Explicit key; also signs custom tokens.
    ServiceAccount(ServiceAccountKey),
    /// Application default credentials (metadata server, gcloud login).
    ApplicationDefault { project_id: String },
}

impl ProviderCredentials {
    pub fn project_id(&self) -> &str {
        match self {
            ProviderCredentials::ServiceAccount(key) => &key.project_id,
            ProviderCredentials::ApplicationDefault { project_id } => project_id,
        }
    }
}

/// Application configuration, loaded once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    /// Server port
    pub port: u16,
    /// Deployment mode
    pub environment: Environment,
    /// Origins allowed by CORS
    pub cors_origins: Vec<String>,
    /// Fixed rate-limit window per source address
    pub rate_limit_window: Duration,
    /// Requests allowed per source within one window
    pub rate_limit_max_requests: u32,
    /// Maximum accepted request body size
    pub body_limit_bytes: usize,
    /// Deadline for each outbound identity provider call
    pub provider_timeout: Duration,
    /// Whether bearer verification also checks for revoked sessions
    pub check_revoked: bool,
    /// Key rate limiting on `X-Forwarded-For` instead of the socket peer
    pub trust_proxy: bool,
    /// Identity provider credentials (absent in tests using a fake provider)
    pub credentials: Option<ProviderCredentials>,
}

impl Config {
    /// Config for tests: no provider credentials, default edge settings.
    pub fn test_default() -> Self {
        Self {
            port: DEFAULT_PORT,
            environment: Environment::Test,
            cors_origins: vec![DEFAULT_CORS_ORIGIN.to_string()],
            rate_limit_window: Duration::from_millis(DEFAULT_RATE_LIMIT_WINDOW_MS),
            rate_limit_max_requests: DEFAULT_RATE_LIMIT_MAX_REQUESTS,
            body_limit_bytes: DEFAULT_BODY_LIMIT_BYTES,
            provider_timeout: Duration::from_millis(DEFAULT_PROVIDER_TIMEOUT_MS),
            check_revoked: false,
            trust_proxy: false,
            credentials: None,
        }
    }

    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok(); // Load .env file if present

        let environment = match env::var("APP_ENV") {
            Ok(raw) => raw.parse()?,
            Err(_) => Environment::Production,
        };

        let cors_origins = env::var("CORS_ORIGIN")
            .map(|raw| parse_origin_list(&raw))
            .unwrap_or_else(|_| vec![DEFAULT_CORS_ORIGIN.to_string()]);

        let config = Self {
            port: parse_var("PORT", DEFAULT_PORT)?,
            environment,
            cors_origins,
            rate_limit_window: Duration::from_millis(parse_var(
                "RATE_LIMIT_WINDOW_MS",
                DEFAULT_RATE_LIMIT_WINDOW_MS,
            )?),
            rate_limit_max_requests: parse_var(
                "RATE_LIMIT_MAX_REQUESTS",
                DEFAULT_RATE_LIMIT_MAX_REQUESTS,
            )?,
            body_limit_bytes: parse_var("BODY_LIMIT_BYTES", DEFAULT_BODY_LIMIT_BYTES)?,
            provider_timeout: Duration::from_millis(parse_var(
                "PROVIDER_TIMEOUT_MS",
                DEFAULT_PROVIDER_TIMEOUT_MS,
            )?),
            check_revoked: parse_var("CHECK_REVOKED", false)?,
            trust_proxy: parse_var("TRUST_PROXY", false)?,
            credentials: Some(load_credentials()?),
        };
        config.validate()?;
        Ok(config)
    }

    /// Reject settings the server cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.rate_limit_window.is_zero() {
            return Err(ConfigError::Invalid("RATE_LIMIT_WINDOW_MS"));
        }
        if self.rate_limit_max_requests == 0 {
            return Err(ConfigError::Invalid("RATE_LIMIT_MAX_REQUESTS"));
        }
        if self.body_limit_bytes == 0 {
            return Err(ConfigError::Invalid("BODY_LIMIT_BYTES"));
        }
        if self.provider_timeout.is_zero() {
            return Err(ConfigError::Invalid("PROVIDER_TIMEOUT_MS"));
        }
        Ok(())
    }
}

/// Pick provider credentials: key file, discrete key variables, or the
/// runtime's default credentials for `FIREBASE_PROJECT_ID`.
fn load_credentials() -> Result<ProviderCredentials, ConfigError> {
    if env::var("GOOGLE_APPLICATION_CREDENTIALS").is_ok()
        || env::var("FIREBASE_PRIVATE_KEY").is_ok()
    {
        return load_service_account().map(ProviderCredentials::ServiceAccount);
    }

    let project_id =
        env::var("FIREBASE_PROJECT_ID").map_err(|_| ConfigError::Missing("FIREBASE_PROJECT_ID"))?;
    Ok(ProviderCredentials::ApplicationDefault { project_id })
}

/// Read a service-account key from a key file or from discrete variables.
fn load_service_account() -> Result<ServiceAccountKey, ConfigError> {
    if let Ok(path) = env::var("GOOGLE_APPLICATION_CREDENTIALS") {
        let raw = std::fs::read_to_string(&path)
            .map_err(|e| ConfigError::Credentials(format!("{path}: {e}")))?;
        let mut key: ServiceAccountKey = serde_json::from_str(&raw)
            .map_err(|e| ConfigError::Credentials(format!("{path}: {e}")))?;
        // An explicit project overrides the one embedded in the key file.
        if let Ok(project_id) = env::var("FIREBASE_PROJECT_ID") {
            key.project_id = project_id;
        }
        return Ok(key);
    }

    Ok(ServiceAccountKey {
        project_id: env::var("FIREBASE_PROJECT_ID")
            .map_err(|_| ConfigError::Missing("FIREBASE_PROJECT_ID"))?,
        client_email: env::var("FIREBASE_CLIENT_EMAIL")
            .map_err(|_| ConfigError::Missing("FIREBASE_CLIENT_EMAIL"))?,
        // Keys pasted into env files usually carry literal "\n" sequences.
        private_key: env::var("FIREBASE_PRIVATE_KEY")
            .map_err(|_| ConfigError::Missing("FIREBASE_PRIVATE_KEY"))?
            .replace("\\n", "\n"),
        private_key_id: env::var("FIREBASE_PRIVATE_KEY_ID").unwrap_or_default(),
        token_uri: default_token_uri(),
    })
}

fn parse_var<T: FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(name) {
        Ok(raw) => raw.trim().parse().map_err(|_| ConfigError::Invalid(name)),
        Err(_) => Ok(default),
    }
}

/// Split a comma-separated origin list, dropping blanks.
pub fn parse_origin_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|origin| origin.trim().trim_end_matches('/').to_string())
        .filter(|origin| !origin.is_empty())
        .collect()
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),

    #[error("Invalid value for environment variable: {0}")]
    Invalid(&'static str),

    #[error("Failed to load provider credentials: {0}")]
    Credentials(String),
}
