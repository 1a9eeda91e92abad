// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Authenticated encryption of credential strings.
//!
//! AES-256-GCM with a fresh random 96-bit nonce per call. The stored form is
//! `base64(nonce || ciphertext || tag)`. Tampering, a wrong key and truncated
//! input all fail decryption; none of them yield a plausible plaintext.

use aes_gcm::{
	aead::{Aead, KeyInit},
	Aes256Gcm, Key, Nonce,
};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use quill_common_secret::SecretString;
use rand::rngs::OsRng;
use rand::RngCore;
use zeroize::Zeroizing;

use crate::error::{VaultError, VaultResult};
use crate::key::{EncryptionKey, KEY_SIZE};

/// Size of the AES-GCM nonce in bytes.
pub const NONCE_SIZE: usize = 12;

/// Encrypt `plaintext` under `key`, returning the base64 stored form.
///
/// With [`EncryptionKey::Passthrough`] the plaintext is returned unchanged.
pub fn encrypt(plaintext: &str, key: &EncryptionKey) -> VaultResult<String> {
	let Some(material) = key.material() else {
		return Ok(plaintext.to_string());
	};

	let sealed = seal(material, plaintext.as_bytes())?;
	Ok(BASE64.encode(sealed))
}

/// Decrypt a base64 stored form produced by [`encrypt`].
pub fn decrypt(ciphertext: &str, key: &EncryptionKey) -> VaultResult<SecretString> {
	let Some(material) = key.material() else {
		return Ok(SecretString::new(ciphertext.to_string()));
	};

	let stored = Zeroizing::new(
		BASE64
			.decode(ciphertext.trim())
			.map_err(|e| VaultError::InvalidCiphertext(format!("invalid base64: {e}")))?,
	);

	let plaintext = open(material, &stored)?;
	let text = std::str::from_utf8(&plaintext)
		.map_err(|_| VaultError::InvalidCiphertext("plaintext is not UTF-8".into()))?;
	Ok(SecretString::new(text.to_string()))
}

/// Encrypt raw bytes. Output is `nonce || ciphertext || tag`.
pub fn seal(key: &[u8; KEY_SIZE], plaintext: &[u8]) -> VaultResult<Vec<u8>> {
	let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key));

	let mut nonce_bytes = [0u8; NONCE_SIZE];
	OsRng.fill_bytes(&mut nonce_bytes);
	let nonce = Nonce::from_slice(&nonce_bytes);

	let ciphertext = cipher
		.encrypt(nonce, plaintext)
		.map_err(|e| VaultError::Encryption(e.to_string()))?;

	let mut stored = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
	stored.extend_from_slice(&nonce_bytes);
	stored.extend_from_slice(&ciphertext);
	Ok(stored)
}

/// Decrypt `nonce || ciphertext || tag` produced by [`seal`].
pub fn open(key: &[u8; KEY_SIZE], stored: &[u8]) -> VaultResult<Zeroizing<Vec<u8>>> {
	if stored.len() < NONCE_SIZE {
		return Err(VaultError::InvalidCiphertext(format!(
			"stored value is {} bytes, shorter than the {NONCE_SIZE}-byte nonce",
			stored.len()
		)));
	}

	let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key));
	let (nonce_bytes, ciphertext) = stored.split_at(NONCE_SIZE);

	let plaintext = cipher
		.decrypt(Nonce::from_slice(nonce_bytes), ciphertext)
		.map_err(|_| VaultError::Decryption("authentication tag mismatch".into()))?;

	Ok(Zeroizing::new(plaintext))
}
