// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! DSPM Auth: authentication gateway for DSPM services
//!
//! This crate exposes a REST API that delegates token verification, session
//! cookies and user management to a managed identity provider.

pub mod config;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod time_utils;

use config::Config;
use middleware::RateLimiter;
use services::IdentityProvider;
use std::sync::Arc;

/// Shared application state.
pub struct AppState {
    pub config: Config,
    pub provider: Arc<dyn IdentityProvider>,
    pub rate_limiter: RateLimiter,
}

impl AppState {
    pub fn new(config: Config, provider: Arc<dyn IdentityProvider>) -> Self {
        let rate_limiter =
            RateLimiter::new(config.rate_limit_window, config.rate_limit_max_requests);
        Self {
            config,
            provider,
            rate_limiter,
        }
    }
}
