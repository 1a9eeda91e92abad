// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! HMAC-SHA256 bearer tokens.
//!
//! Tokens are self-contained: a signed `principal|expires|issued` payload.
//! Verification needs only the shared secret, no server-side state.

pub mod error;
pub mod issuer;

pub use error::{TokenError, TokenResult};
pub use issuer::{ttl_from_secs, TokenIssuer, VerifiedToken, DEFAULT_TOKEN_TTL_SECS};
