// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Fixed-window rate limiting per source address.

use crate::error::AppError;
use crate::AppState;
use axum::{
    extract::{ConnectInfo, Request, State},
    http::HeaderValue,
    middleware::Next,
    response::{IntoResponse, Response},
};
use dashmap::DashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

const UNKNOWN_CLIENT: &str = "unknown";

#[derive(Debug, Clone, Copy)]
struct WindowEntry {
    started: Instant,
    count: u32,
}

/// Outcome of counting one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateDecision {
    pub allowed: bool,
    pub limit: u32,
    pub remaining: u32,
    /// Time until the current window resets.
    pub reset_after: Duration,
}

/// Per-key request counters with a fixed window.
///
/// Each key's entry is updated under its shard lock, so concurrent requests
/// from one source never lose an increment.
pub struct RateLimiter {
    window: Duration,
    max_requests: u32,
    entries: DashMap<String, WindowEntry>,
}

impl RateLimiter {
    pub fn new(window: Duration, max_requests: u32) -> Self {
        Self {
            window,
            max_requests,
            entries: DashMap::new(),
        }
    }

    /// Count one request for `key` and decide whether it may proceed.
    pub fn check(&self, key: &str) -> RateDecision {
        let now = Instant::now();

        let mut entry = match self.entries.get_mut(key) {
            Some(entry) => entry,
            None => self
                .entries
                .entry(key.to_string())
                .or_insert(WindowEntry {
                    started: now,
                    count: 0,
                }),
        };

        if now.duration_since(entry.started) >= self.window {
            entry.started = now;
            entry.count = 0;
        }
        entry.count = entry.count.saturating_add(1);

        RateDecision {
            allowed: entry.count <= self.max_requests,
            limit: self.max_requests,
            remaining: self.max_requests.saturating_sub(entry.count),
            reset_after: self
                .window
                .saturating_sub(now.duration_since(entry.started)),
        }
    }

    /// Drop entries whose window has elapsed. Returns how many were removed.
    pub fn sweep(&self) -> usize {
        let now = Instant::now();
        let before = self.entries.len();
        self.entries
            .retain(|_, entry| now.duration_since(entry.started) < self.window);
        before.saturating_sub(self.entries.len())
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    pub fn tracked_sources(&self) -> usize {
        self.entries.len()
    }
}

/// Identify the request source: forwarded address when proxies are trusted,
/// else the socket peer.
pub fn client_key(request: &Request, trust_proxy: bool) -> String {
    if trust_proxy {
        let forwarded = request
            .headers()
            .get("x-forwarded-for")
            .and_then(|h| h.to_str().ok())
            .and_then(|value| value.split(',').next())
            .map(str::trim)
            .filter(|value| !value.is_empty());
        if let Some(addr) = forwarded {
            return addr.to_string();
        }
    }

    request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_else(|| UNKNOWN_CLIENT.to_string())
}

/// Middleware enforcing the global rate limit.
pub async fn enforce_rate_limit(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Response {
    let key = client_key(&request, state.config.trust_proxy);
    let decision = state.rate_limiter.check(&key);
    let reset_secs = decision.reset_after.as_secs_f64().ceil() as u64;

    let mut response = if decision.allowed {
        next.run(request).await
    } else {
        tracing::warn!(client = %key, limit = decision.limit, "Rate limit exceeded");
        AppError::RateLimited {
            retry_after_secs: reset_secs,
        }
        .into_response()
    };

    let headers = response.headers_mut();
    headers.insert("X-RateLimit-Limit", HeaderValue::from(decision.limit));
    headers.insert("X-RateLimit-Remaining", HeaderValue::from(decision.remaining));
    // Reset is the wall-clock epoch second the window ends.
    let reset_at = chrono::Utc::now().timestamp().max(0) as u64 + reset_secs;
    headers.insert("X-RateLimit-Reset", HeaderValue::from(reset_at));

    response
}
