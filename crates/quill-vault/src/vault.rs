// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Resolution of the process encryption key.
//!
//! Resolution order:
//!
//! 1. An explicit key (`QUILL_ENCRYPTION_KEY` / `_FILE`). It must be at least
//!    [`MIN_KEY_LEN`] bytes; a shorter one is fatal.
//! 2. Encryption disabled: the [`EncryptionKey::Passthrough`] sentinel.
//! 3. A key is required outside debug mode and none was supplied: fatal.
//! 4. The key file under the data directory, generated on first run and
//!    written with owner-only permissions.

use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, OnceLock};

use quill_common_secret::env::{env_bool_from, load_secret_from};
use quill_common_secret::SecretString;
use tracing::{debug, info, instrument, warn};

use crate::cipher;
use crate::error::{VaultError, VaultResult};
use crate::key::{EncryptionKey, KEY_SIZE};

/// File name of the generated key, relative to the data directory.
pub const KEY_FILE_NAME: &str = ".encryption_key";

/// Minimum length of an explicit or persisted key.
pub const MIN_KEY_LEN: usize = KEY_SIZE;

/// Inputs that decide where the process key comes from.
#[derive(Debug, Clone, Default)]
pub struct VaultOptions {
	pub explicit_key: Option<SecretString>,
	pub encryption_disabled: bool,
	pub require_key: bool,
	pub debug: bool,
}

impl VaultOptions {
	/// Read options from the process environment.
	///
	/// - `QUILL_ENCRYPTION_KEY` / `QUILL_ENCRYPTION_KEY_FILE`
	/// - `QUILL_DISABLE_ENCRYPTION`
	/// - `QUILL_REQUIRE_ENCRYPTION_KEY`
	/// - `QUILL_DEBUG`
	pub fn from_env() -> VaultResult<Self> {
		Self::from_lookup(|name| std::env::var(name).ok())
	}

	pub fn from_lookup<F>(lookup: F) -> VaultResult<Self>
	where
		F: Fn(&str) -> Option<String>,
	{
		let explicit_key = load_secret_from("QUILL_ENCRYPTION_KEY", &lookup)
			.map_err(|e| VaultError::Configuration(e.to_string()))?;

		Ok(Self {
			explicit_key,
			encryption_disabled: env_bool_from("QUILL_DISABLE_ENCRYPTION", &lookup).unwrap_or(false),
			require_key: env_bool_from("QUILL_REQUIRE_ENCRYPTION_KEY", &lookup).unwrap_or(false),
			debug: env_bool_from("QUILL_DEBUG", &lookup).unwrap_or(false),
		})
	}
}

/// Owns the process encryption key.
///
/// The key is resolved on first use and then fixed for the lifetime of the
/// vault. Resolution is serialized so two callers can never both generate
/// and persist a key file.
pub struct KeyVault {
	options: VaultOptions,
	data_dir: PathBuf,
	key: OnceLock<EncryptionKey>,
	resolving: Mutex<()>,
}

impl KeyVault {
	pub fn new(options: VaultOptions, data_dir: impl Into<PathBuf>) -> Self {
		Self {
			options,
			data_dir: data_dir.into(),
			key: OnceLock::new(),
			resolving: Mutex::new(()),
		}
	}

	/// Path of the persisted key file.
	pub fn key_path(&self) -> PathBuf {
		self.data_dir.join(KEY_FILE_NAME)
	}

	/// Get the process key, resolving it on first call.
	pub fn key(&self) -> VaultResult<&EncryptionKey> {
		if let Some(key) = self.key.get() {
			return Ok(key);
		}

		let _guard = self.resolving.lock().unwrap_or_else(|e| e.into_inner());
		if let Some(key) = self.key.get() {
			return Ok(key);
		}

		let key = resolve_key(&self.options, &self.data_dir)?;
		Ok(self.key.get_or_init(|| key))
	}

	/// True unless the passthrough key is in effect.
	pub fn encryption_enabled(&self) -> VaultResult<bool> {
		Ok(self.key()?.is_enabled())
	}

	pub fn encrypt(&self, plaintext: &str) -> VaultResult<String> {
		cipher::encrypt(plaintext, self.key()?)
	}

	pub fn decrypt(&self, ciphertext: &str) -> VaultResult<SecretString> {
		cipher::decrypt(ciphertext, self.key()?)
	}
}

impl std::fmt::Debug for KeyVault {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("KeyVault")
			.field("data_dir", &self.data_dir)
			.field("encryption_disabled", &self.options.encryption_disabled)
			.field("resolved", &self.key.get().is_some())
			.finish()
	}
}

/// Resolve a key without caching it. See the module docs for the order.
#[instrument(skip_all, fields(data_dir = %data_dir.display()))]
pub fn resolve_key(options: &VaultOptions, data_dir: &Path) -> VaultResult<EncryptionKey> {
	if let Some(explicit) = &options.explicit_key {
		let bytes = explicit.expose().as_bytes();
		if bytes.len() < MIN_KEY_LEN {
			return Err(VaultError::KeyTooShort {
				min: MIN_KEY_LEN,
				actual: bytes.len(),
			});
		}
		if options.encryption_disabled {
			warn!("explicit encryption key supplied; ignoring QUILL_DISABLE_ENCRYPTION");
		}
		let key = EncryptionKey::from_bytes(bytes);
		let fingerprint = key.fingerprint().unwrap_or_default();
		info!(source = "explicit", %fingerprint, "encryption key resolved");
		return Ok(key);
	}

	if options.encryption_disabled {
		warn!("credential encryption disabled; credentials will be stored in plaintext");
		return Ok(EncryptionKey::passthrough());
	}

	if options.require_key && !options.debug {
		return Err(VaultError::MissingKey);
	}

	load_or_generate(&data_dir.join(KEY_FILE_NAME))
}

fn load_or_generate(path: &Path) -> VaultResult<EncryptionKey> {
	match fs::read(path) {
		Ok(bytes) if bytes.len() >= MIN_KEY_LEN => {
			let key = EncryptionKey::from_bytes(&bytes);
			let fingerprint = key.fingerprint().unwrap_or_default();
			info!(
				source = "key-file",
				path = %path.display(),
				%fingerprint,
				"encryption key resolved"
			);
			return Ok(key);
		}
		Ok(bytes) => {
			warn!(
				path = %path.display(),
				len = bytes.len(),
				"key file too short, generating a new key"
			);
		}
		Err(e) if e.kind() == ErrorKind::NotFound => {
			debug!(path = %path.display(), "no key file, generating a new key");
		}
		Err(source) => {
			return Err(VaultError::Io {
				path: path.to_path_buf(),
				source,
			})
		}
	}

	let key = EncryptionKey::generate();
	if let Some(material) = key.material() {
		write_key_file(path, material)?;
	}
	let fingerprint = key.fingerprint().unwrap_or_default();
	info!(
		source = "generated",
		path = %path.display(),
		%fingerprint,
		"generated and persisted new encryption key"
	);
	Ok(key)
}

fn write_key_file(path: &Path, material: &[u8; KEY_SIZE]) -> VaultResult<()> {
	let io_err = |source| VaultError::Io {
		path: path.to_path_buf(),
		source,
	};

	if let Some(parent) = path.parent() {
		fs::create_dir_all(parent).map_err(io_err)?;
	}

	let temp_path = path.with_extension("tmp");
	let mut options = OpenOptions::new();
	options.write(true).create(true).truncate(true);
	#[cfg(unix)]
	{
		use std::os::unix::fs::OpenOptionsExt;
		options.mode(0o600);
	}

	let mut file = options.open(&temp_path).map_err(io_err)?;
	file.write_all(material).map_err(io_err)?;
	file.sync_all().map_err(io_err)?;
	drop(file);

	#[cfg(unix)]
	{
		use std::os::unix::fs::PermissionsExt;
		fs::set_permissions(&temp_path, fs::Permissions::from_mode(0o600)).map_err(io_err)?;
	}

	fs::rename(&temp_path, path).map_err(io_err)
}
