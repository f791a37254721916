// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Middleware modules (authentication, rate limiting, security, etc.).

pub mod auth;
pub mod error_detail;
pub mod rate_limit;
pub mod security;

pub use auth::{optional_auth, require_admin, require_auth, AuthUser};
pub use rate_limit::RateLimiter;
