// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Token error types.

use quill_common_secret::{EnvParseError, SecretEnvError};
use thiserror::Error;

pub type TokenResult<T> = Result<T, TokenError>;

/// Why a token could not be issued or verified.
///
/// The four verification kinds are distinct for diagnostics; external
/// callers should only see "unauthenticated", see
/// [`TokenError::is_authentication_failure`].
#[derive(Debug, Error)]
pub enum TokenError {
	/// Not two base64url segments separated by a single `.`.
	#[error("malformed token")]
	InvalidFormat,

	/// The HMAC does not match the payload.
	#[error("token signature mismatch")]
	InvalidSignature,

	/// Signed, but the payload is not `principal|expires|issued`.
	#[error("malformed token payload")]
	InvalidPayload,

	#[error("token expired")]
	Expired,

	#[error("principal must be non-empty and must not contain '|'")]
	InvalidPrincipal,

	#[error("token signing secret is not configured")]
	MissingSecret,

	/// The lifetime, or the expiry it produces, is outside the representable range.
	#[error("token lifetime of {secs}s is out of range")]
	InvalidTtl { secs: i64 },

	#[error(transparent)]
	InvalidValue(#[from] EnvParseError),

	#[error("cannot load token signing secret")]
	SecretSource(#[from] SecretEnvError),
}

impl TokenError {
	/// True for every verification failure.
	pub fn is_authentication_failure(&self) -> bool {
		matches!(
			self,
			TokenError::InvalidFormat
				| TokenError::InvalidSignature
				| TokenError::InvalidPayload
				| TokenError::Expired
		)
	}

	/// Stable label for structured logs.
	pub fn kind(&self) -> &'static str {
		match self {
			TokenError::InvalidFormat => "invalid_format",
			TokenError::InvalidSignature => "invalid_signature",
			TokenError::InvalidPayload => "invalid_payload",
			TokenError::Expired => "expired",
			TokenError::InvalidPrincipal => "invalid_principal",
			TokenError::MissingSecret => "missing_secret",
			TokenError::InvalidTtl { .. } => "invalid_ttl",
			TokenError::InvalidValue(_) => "invalid_value",
			TokenError::SecretSource(_) => "secret_source",
		}
	}
}
