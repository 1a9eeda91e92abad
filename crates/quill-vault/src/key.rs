// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! The process encryption key.

use rand::rngs::OsRng;
use rand::RngCore;
use sha2::{Digest, Sha256};
use zeroize::Zeroizing;

/// Size of the AES-256 key in bytes.
pub const KEY_SIZE: usize = 32;

/// Key handed to the cipher.
///
/// `Passthrough` is the sentinel used when encryption is administratively
/// disabled: every cipher call becomes an identity function.
#[derive(Clone)]
pub enum EncryptionKey {
	Aes(Zeroizing<[u8; KEY_SIZE]>),
	Passthrough,
}

impl EncryptionKey {
	/// Build a key from arbitrary bytes, normalizing to [`KEY_SIZE`].
	pub fn from_bytes(bytes: &[u8]) -> Self {
		Self::Aes(normalize_key(bytes))
	}

	/// Draw a fresh random key from the OS RNG.
	pub fn generate() -> Self {
		let mut key = Zeroizing::new([0u8; KEY_SIZE]);
		OsRng.fill_bytes(key.as_mut());
		Self::Aes(key)
	}

	pub fn passthrough() -> Self {
		Self::Passthrough
	}

	pub fn is_enabled(&self) -> bool {
		matches!(self, Self::Aes(_))
	}

	/// Short identifier for log lines: the first 8 bytes of SHA-256(key), hex.
	pub fn fingerprint(&self) -> Option<String> {
		match self {
			Self::Aes(key) => {
				let digest = Sha256::digest(key.as_slice());
				Some(hex::encode(&digest[..8]))
			}
			Self::Passthrough => None,
		}
	}

	pub(crate) fn material(&self) -> Option<&[u8; KEY_SIZE]> {
		match self {
			Self::Aes(key) => Some(key),
			Self::Passthrough => None,
		}
	}
}

impl std::fmt::Debug for EncryptionKey {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			Self::Aes(_) => f.debug_tuple("Aes").field(&"[REDACTED]").finish(),
			Self::Passthrough => f.write_str("Passthrough"),
		}
	}
}

/// Zero-pad short input and truncate long input to exactly [`KEY_SIZE`] bytes.
pub fn normalize_key(bytes: &[u8]) -> Zeroizing<[u8; KEY_SIZE]> {
	let mut key = Zeroizing::new([0u8; KEY_SIZE]);
	let len = bytes.len().min(KEY_SIZE);
	key[..len].copy_from_slice(&bytes[..len]);
	key
}
