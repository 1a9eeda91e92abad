// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Issuing and verifying bearer tokens.
//!
//! Wire format: `base64url(payload) "." base64url(hmac_sha256(payload))` with
//! `payload = principal|expiresAtUnix|issuedAtUnix`. The principal is visible
//! to anyone holding the token; only integrity is protected.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD as BASE64URL, Engine};
use chrono::{DateTime, Duration, Utc};
use hmac::{Hmac, Mac};
use quill_common_secret::env::{env_parse_from, load_secret_from};
use quill_common_secret::SecretString;
use sha2::Sha256;
use tracing::{debug, instrument};

use crate::error::{TokenError, TokenResult};

type HmacSha256 = Hmac<Sha256>;

/// Default lifetime of an issued token (24 hours).
pub const DEFAULT_TOKEN_TTL_SECS: i64 = 86_400;

const SEGMENT_SEPARATOR: char = '.';
const FIELD_SEPARATOR: char = '|';

/// The claims of a token that passed verification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedToken {
	pub principal: String,
	pub issued_at: DateTime<Utc>,
	pub expires_at: DateTime<Utc>,
}

/// Signs and verifies tokens with a shared HMAC secret.
///
/// There is no revocation list: a correctly signed, unexpired token is
/// always accepted.
#[derive(Clone)]
pub struct TokenIssuer {
	secret: SecretString,
	default_ttl: Duration,
}

impl TokenIssuer {
	pub fn new(secret: SecretString) -> TokenResult<Self> {
		if secret.is_blank() {
			return Err(TokenError::MissingSecret);
		}
		Ok(Self {
			secret,
			default_ttl: Duration::seconds(DEFAULT_TOKEN_TTL_SECS),
		})
	}

	/// Build from `QUILL_TOKEN_SECRET` / `QUILL_TOKEN_SECRET_FILE` and
	/// `QUILL_TOKEN_TTL_SECS`.
	pub fn from_env() -> TokenResult<Self> {
		Self::from_lookup(|name| std::env::var(name).ok())
	}

	pub fn from_lookup<F>(lookup: F) -> TokenResult<Self>
	where
		F: Fn(&str) -> Option<String>,
	{
		let secret = load_secret_from("QUILL_TOKEN_SECRET", &lookup)?
			.ok_or(TokenError::MissingSecret)?;
		let ttl = env_parse_from::<i64, _>("QUILL_TOKEN_TTL_SECS", &lookup)?
			.unwrap_or(DEFAULT_TOKEN_TTL_SECS);

		Ok(Self::new(secret)?.with_default_ttl(ttl_from_secs(ttl)?))
	}

	pub fn with_default_ttl(mut self, ttl: Duration) -> Self {
		self.default_ttl = ttl;
		self
	}

	pub fn default_ttl(&self) -> Duration {
		self.default_ttl
	}

	/// Issue a token for `principal` valid for `ttl` from now.
	///
	/// A negative `ttl` yields a token that is already expired.
	pub fn issue(&self, principal: &str, ttl: Duration) -> TokenResult<String> {
		self.issue_at(principal, ttl, Utc::now())
	}

	#[instrument(skip(self, ttl, now))]
	pub fn issue_at(&self, principal: &str, ttl: Duration, now: DateTime<Utc>) -> TokenResult<String> {
		if principal.is_empty() || principal.contains(FIELD_SEPARATOR) {
			return Err(TokenError::InvalidPrincipal);
		}

		let issued = now.timestamp();
		let expires = issued
			.checked_add(ttl.num_seconds())
			.filter(|secs| DateTime::from_timestamp(*secs, 0).is_some())
			.ok_or(TokenError::InvalidTtl {
				secs: ttl.num_seconds(),
			})?;
		let payload = format!("{principal}{FIELD_SEPARATOR}{expires}{FIELD_SEPARATOR}{issued}");

		let mut mac = self.mac()?;
		mac.update(payload.as_bytes());
		let signature = mac.finalize().into_bytes();

		debug!(expires, "issued token");
		Ok(format!(
			"{}{SEGMENT_SEPARATOR}{}",
			BASE64URL.encode(payload.as_bytes()),
			BASE64URL.encode(signature)
		))
	}

	/// Verify a token against the current time.
	pub fn verify(&self, token: &str) -> TokenResult<VerifiedToken> {
		self.verify_at(token, Utc::now())
	}

	/// Verify a token against `now`.
	///
	/// Nothing in the payload is trusted until the signature checks out.
	pub fn verify_at(&self, token: &str, now: DateTime<Utc>) -> TokenResult<VerifiedToken> {
		let result = self.check(token, now);
		if let Err(e) = &result {
			debug!(kind = e.kind(), "token rejected");
		}
		result
	}

	fn check(&self, token: &str, now: DateTime<Utc>) -> TokenResult<VerifiedToken> {
		let mut segments = token.trim().split(SEGMENT_SEPARATOR);
		let (Some(payload_b64), Some(signature_b64), None) =
			(segments.next(), segments.next(), segments.next())
		else {
			return Err(TokenError::InvalidFormat);
		};

		let payload = BASE64URL
			.decode(payload_b64)
			.map_err(|_| TokenError::InvalidFormat)?;
		let signature = BASE64URL
			.decode(signature_b64)
			.map_err(|_| TokenError::InvalidFormat)?;

		let mut mac = self.mac()?;
		mac.update(&payload);
		mac
			.verify_slice(&signature)
			.map_err(|_| TokenError::InvalidSignature)?;

		let payload = String::from_utf8(payload).map_err(|_| TokenError::InvalidPayload)?;
		let fields: Vec<&str> = payload.split(FIELD_SEPARATOR).collect();
		let [principal, expires, issued] = fields.as_slice() else {
			return Err(TokenError::InvalidPayload);
		};
		if principal.is_empty() {
			return Err(TokenError::InvalidPayload);
		}

		let expires_at = parse_unix(expires)?;
		let issued_at = parse_unix(issued)?;

		if now >= expires_at {
			return Err(TokenError::Expired);
		}

		Ok(VerifiedToken {
			principal: principal.to_string(),
			issued_at,
			expires_at,
		})
	}

	fn mac(&self) -> TokenResult<HmacSha256> {
		HmacSha256::new_from_slice(self.secret.expose().as_bytes())
			.map_err(|_| TokenError::MissingSecret)
	}
}

impl std::fmt::Debug for TokenIssuer {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("TokenIssuer")
			.field("secret", &self.secret)
			.field("default_ttl", &self.default_ttl)
			.finish()
	}
}

/// Convert a lifetime in seconds, rejecting values chrono cannot hold.
pub fn ttl_from_secs(secs: i64) -> TokenResult<Duration> {
	Duration::try_seconds(secs).ok_or(TokenError::InvalidTtl { secs })
}

fn parse_unix(field: &str) -> TokenResult<DateTime<Utc>> {
	let secs: i64 = field.parse().map_err(|_| TokenError::InvalidPayload)?;
	DateTime::from_timestamp(secs, 0).ok_or(TokenError::InvalidPayload)
}
