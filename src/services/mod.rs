// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Services module - identity provider integration.

pub mod credentials;
pub mod firebase;
pub mod provider;
pub mod token_verifier;

pub use firebase::FirebaseAuth;
pub use provider::{IdentityProvider, ProviderError};
pub use token_verifier::{TokenKind, TokenVerifier, VerifyError};
