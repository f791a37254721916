//! Verified token payloads.

use super::user::CustomClaims;
use serde::Deserialize;

/// Payload of a verified ID token or session cookie.
#[derive(Debug, Clone, Deserialize)]
pub struct DecodedToken {
    #[serde(rename = "sub")]
    pub uid: String,
    pub iss: String,
    pub aud: String,
    pub exp: u64,
    pub iat: u64,
    pub auth_time: u64,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub email_verified: Option<bool>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub picture: Option<String>,
    /// Every remaining claim, including custom claims.
    #[serde(flatten)]
    pub claims: CustomClaims,
}
