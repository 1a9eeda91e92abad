// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Error types for the cipher and key vault.

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias for vault operations.
pub type VaultResult<T> = Result<T, VaultError>;

/// Errors that can occur while resolving keys or running the cipher.
#[derive(Debug, Error)]
pub enum VaultError {
	// =========================================================================
	// Configuration Errors
	// =========================================================================
	#[error("configuration error: {0}")]
	Configuration(String),

	#[error(
		"encryption key required but not configured: set QUILL_ENCRYPTION_KEY, \
		 QUILL_ENCRYPTION_KEY_FILE or QUILL_DEBUG=1"
	)]
	MissingKey,

	#[error("encryption key too short: need at least {min} bytes, got {actual}")]
	KeyTooShort { min: usize, actual: usize },

	// =========================================================================
	// Cipher Errors
	// =========================================================================
	#[error("encryption failed: {0}")]
	Encryption(String),

	#[error("decryption failed: {0}")]
	Decryption(String),

	#[error("invalid ciphertext: {0}")]
	InvalidCiphertext(String),

	// =========================================================================
	// Key File Errors
	// =========================================================================
	#[error("key file error at {path}: {source}")]
	Io {
		path: PathBuf,
		#[source]
		source: std::io::Error,
	},
}

impl VaultError {
	/// True for misconfiguration that must stop the process at startup.
	pub fn is_fatal(&self) -> bool {
		matches!(
			self,
			VaultError::MissingKey | VaultError::KeyTooShort { .. } | VaultError::Configuration(_)
		)
	}

	/// True when stored data could not be opened with the current key.
	///
	/// Wrong key and corrupted data are indistinguishable under AEAD.
	pub fn is_crypto(&self) -> bool {
		matches!(
			self,
			VaultError::Encryption(_) | VaultError::Decryption(_) | VaultError::InvalidCiphertext(_)
		)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn missing_key_is_fatal() {
		assert!(VaultError::MissingKey.is_fatal());
		assert!(VaultError::KeyTooShort { min: 32, actual: 4 }.is_fatal());
		assert!(!VaultError::Decryption("tag".into()).is_fatal());
	}

	#[test]
	fn cipher_failures_are_crypto() {
		assert!(VaultError::Decryption("tag".into()).is_crypto());
		assert!(VaultError::InvalidCiphertext("short".into()).is_crypto());
		assert!(!VaultError::MissingKey.is_crypto());
	}
}
