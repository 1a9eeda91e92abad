// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Credential string that stays out of logs, plus the env helpers that load
//! one.
//!
//! ```
//! use quill_common_secret::SecretString;
//!
//! let key = SecretString::from("sk-live-123");
//! assert_eq!(format!("{key:?}"), "SecretString([REDACTED])");
//! assert_eq!(key.expose(), "sk-live-123");
//! ```

pub mod env;

use std::fmt;

use zeroize::Zeroizing;

pub use env::{env_bool, env_parse, env_var, load_secret_env, EnvParseError, SecretEnvError};

/// Printed in place of a credential.
pub const REDACTED: &str = "[REDACTED]";

/// A provider key, token secret or vault key held as text.
///
/// The buffer is wiped on drop. Reading it requires [`expose`](Self::expose).
#[derive(Clone, PartialEq, Eq)]
pub struct SecretString(Zeroizing<String>);

impl SecretString {
	pub fn new(value: String) -> Self {
		Self(Zeroizing::new(value))
	}

	pub fn expose(&self) -> &str {
		self.0.as_str()
	}

	/// Empty or whitespace only.
	pub fn is_blank(&self) -> bool {
		self.0.trim().is_empty()
	}
}

impl From<String> for SecretString {
	fn from(value: String) -> Self {
		Self::new(value)
	}
}

impl From<&str> for SecretString {
	fn from(value: &str) -> Self {
		Self::new(value.to_owned())
	}
}

impl fmt::Debug for SecretString {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "SecretString({REDACTED})")
	}
}

impl fmt::Display for SecretString {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(REDACTED)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use proptest::prelude::*;

	#[test]
	fn formatting_hides_value() {
		let key = SecretString::from("sk-ant-very-secret");
		assert_eq!(key.to_string(), REDACTED);
		assert_eq!(format!("{key:?}"), "SecretString([REDACTED])");
	}

	#[test]
	fn nested_debug_is_redacted() {
		let keys: Vec<Option<SecretString>> = vec![Some("sk-ant-very-secret".into()), None];
		let debug = format!("{keys:?}");
		assert!(debug.contains(REDACTED));
		assert!(!debug.contains("very-secret"));
	}

	#[test]
	fn blank_detection_trims() {
		assert!(SecretString::from(" \t\n").is_blank());
		assert!(SecretString::from("").is_blank());
		assert!(!SecretString::from(" k ").is_blank());
	}

	#[test]
	fn expose_keeps_surrounding_whitespace() {
		assert_eq!(SecretString::from(" k ").expose(), " k ");
	}

	proptest! {
		#[test]
		fn debug_and_display_never_leak(inner in "[a-zA-Z0-9_-]{4,48}") {
			prop_assume!(!"SecretString([REDACTED])".contains(inner.as_str()));
			let secret = SecretString::new(inner.clone());
			prop_assert!(!secret.to_string().contains(&inner));
			let debug = format!("{:?}", secret);
			prop_assert!(!debug.contains(&inner));
		}

		#[test]
		fn clones_compare_equal(inner in ".*") {
			let secret = SecretString::new(inner.clone());
			let cloned = secret.clone();
			prop_assert_eq!(&cloned, &secret);
			prop_assert_eq!(cloned.expose(), inner.as_str());
		}
	}
}
