// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Data models for the application.

pub mod envelope;
pub mod token;
pub mod user;

pub use envelope::ApiResponse;
pub use token::DecodedToken;
pub use user::{CustomClaims, NewUser, UserInfo, UserMetadata, UserPage, UserRecord, UserUpdate};
