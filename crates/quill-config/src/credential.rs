// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! A single credential value and its at-rest representation.

use quill_common_secret::SecretString;
use quill_vault::{cipher, EncryptionKey, VaultError, VaultResult};

/// A credential as held by the store.
///
/// `Plain` is used for env-derived values and in the encryption-disabled
/// mode; `Encrypted` holds the base64 stored form. A credential is one or the
/// other, never both.
#[derive(Clone, PartialEq, Eq)]
pub enum Credential {
	Plain(SecretString),
	Encrypted(String),
}

impl Credential {
	pub fn is_encrypted(&self) -> bool {
		matches!(self, Credential::Encrypted(_))
	}

	/// Decrypt for in-process use.
	///
	/// An `Encrypted` value cannot be opened with the passthrough key.
	pub fn reveal(&self, key: &EncryptionKey) -> VaultResult<SecretString> {
		match self {
			Credential::Plain(secret) => Ok(secret.clone()),
			Credential::Encrypted(_) if !key.is_enabled() => Err(VaultError::Configuration(
				"credential is encrypted but encryption is disabled".into(),
			)),
			Credential::Encrypted(stored) => cipher::decrypt(stored, key),
		}
	}

	/// Convert to the form that may be written to disk under `key`.
	///
	/// Plain values are encrypted when a real key is in effect.
	pub fn seal(&self, key: &EncryptionKey) -> VaultResult<Credential> {
		match self {
			Credential::Plain(secret) if key.is_enabled() => {
				Ok(Credential::Encrypted(cipher::encrypt(secret.expose(), key)?))
			}
			other => Ok(other.clone()),
		}
	}
}

impl std::fmt::Debug for Credential {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			Credential::Plain(_) => f.write_str("Plain([REDACTED])"),
			Credential::Encrypted(_) => f.write_str("Encrypted(..)"),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn sealing_plain_with_real_key_encrypts() {
		let key = EncryptionKey::generate();
		let sealed = Credential::Plain("sk-123".into()).seal(&key).unwrap();
		assert!(sealed.is_encrypted());
		assert_eq!(sealed.reveal(&key).unwrap().expose(), "sk-123");
	}

	#[test]
	fn sealing_with_passthrough_keeps_plain() {
		let key = EncryptionKey::passthrough();
		let sealed = Credential::Plain("sk-123".into()).seal(&key).unwrap();
		assert_eq!(sealed, Credential::Plain("sk-123".into()));
	}

	#[test]
	fn sealing_is_idempotent() {
		let key = EncryptionKey::generate();
		let once = Credential::Plain("sk".into()).seal(&key).unwrap();
		let twice = once.seal(&key).unwrap();
		assert_eq!(once, twice);
	}

	#[test]
	fn encrypted_cannot_be_revealed_without_encryption() {
		let stored = Credential::Plain("sk".into())
			.seal(&EncryptionKey::generate())
			.unwrap();
		assert!(matches!(
			stored.reveal(&EncryptionKey::passthrough()),
			Err(VaultError::Configuration(_))
		));
	}

	#[test]
	fn wrong_key_fails_to_reveal() {
		let stored = Credential::Plain("sk".into())
			.seal(&EncryptionKey::generate())
			.unwrap();
		let err = stored.reveal(&EncryptionKey::generate()).unwrap_err();
		assert!(err.is_crypto());
	}

	#[test]
	fn debug_hides_values() {
		let debug = format!("{:?}", Credential::Plain("sk-live".into()));
		assert!(!debug.contains("sk-live"));
	}
}
