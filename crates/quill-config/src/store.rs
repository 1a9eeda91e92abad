// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! The secret config store and its process-wide instance.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use quill_common_secret::SecretString;
use quill_vault::KeyVault;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::{OnceCell, RwLock};
use tracing::{debug, info, instrument, warn};

use crate::config::{Adoption, AppConfig, ConfigSnapshot};
use crate::credential::Credential;
use crate::error::{ConfigError, ConfigResult};
use crate::options::SubsystemOptions;
use crate::persisted::{PersistedConfig, CONFIG_FILE_NAME};
use crate::provider::{is_sensitive, Provider, API_KEY, ENDPOINT, MODEL, SECRET_KEY};

static GLOBAL: OnceCell<SecretConfigStore> = OnceCell::const_new();

/// Initialize the process-wide store, or return it if already initialized.
///
/// Concurrent callers wait for the first initialization to finish. A failed
/// initialization leaves the cell empty so a later call can retry.
pub async fn init(options: &SubsystemOptions) -> ConfigResult<&'static SecretConfigStore> {
	GLOBAL
		.get_or_try_init(|| SecretConfigStore::open(options))
		.await
}

/// The process-wide store. Fails until [`init`] has completed.
pub fn global() -> ConfigResult<&'static SecretConfigStore> {
	GLOBAL.get().ok_or(ConfigError::NotInitialized)
}

/// Changes to apply to the provider configuration.
///
/// Blank secrets count as omitted; blank settings remove the setting.
#[derive(Debug, Clone, Default)]
pub struct CredentialUpdate {
	pub settings: BTreeMap<String, String>,
	pub secrets: BTreeMap<String, SecretString>,
}

impl CredentialUpdate {
	pub fn new() -> Self {
		Self::default()
	}

	/// Split raw `key=value` fields into secrets and settings.
	pub fn from_fields(fields: impl IntoIterator<Item = (String, String)>) -> Self {
		fields
			.into_iter()
			.fold(Self::default(), |update, (key, value)| update.field(key, value))
	}

	pub fn field(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
		let key = key.into();
		if is_sensitive(&key) {
			self.secrets.insert(key, SecretString::new(value.into()));
		} else {
			self.settings.insert(key, value.into());
		}
		self
	}

	pub fn api_key(self, value: impl Into<String>) -> Self {
		self.field(API_KEY, value)
	}

	pub fn secret_key(self, value: impl Into<String>) -> Self {
		self.field(SECRET_KEY, value)
	}

	pub fn model(self, value: impl Into<String>) -> Self {
		self.field(MODEL, value)
	}

	pub fn endpoint(self, value: impl Into<String>) -> Self {
		self.field(ENDPOINT, value)
	}
}

/// Owns the live [`AppConfig`] and its persisted file.
///
/// A single lock guards the config. Every mutation holds it exclusively
/// across validation, persistence and the swap, so readers never see a
/// provider paired with another provider's credential.
#[derive(Debug)]
pub struct SecretConfigStore {
	path: PathBuf,
	vault: KeyVault,
	state: RwLock<AppConfig>,
}

impl SecretConfigStore {
	/// Build a store from options, merging any meaningful persisted file.
	///
	/// Fails fast on key misconfiguration. Legacy plaintext credentials are
	/// migrated and written back before this returns.
	#[instrument(skip_all, fields(data_dir = %options.data_dir.display()))]
	pub async fn open(options: &SubsystemOptions) -> ConfigResult<Self> {
		let vault = KeyVault::new(options.vault.clone(), &options.data_dir);
		let key = vault.key()?;
		let path = options.data_dir.join(CONFIG_FILE_NAME);

		let mut config = AppConfig::load(options);
		let mut adoption = Adoption::default();

		match read_persisted(&path).await? {
			None => debug!(path = %path.display(), "no persisted config"),
			Some(file) if file.is_template() => {
				warn!(path = %path.display(), "config file only holds defaults, ignoring it");
			}
			Some(file) => {
				adoption = config.adopt(file, key)?;
				info!(
					path = %path.display(),
					provider = %config.llm_provider,
					credentials = config.credentials.len(),
					"loaded persisted config"
				);
			}
		}

		let store = Self {
			path,
			vault,
			state: RwLock::new(config),
		};

		if adoption.needs_save() {
			let state = store.state.write().await;
			store.persist(&state).await?;
			info!(
				migrated = ?adoption.migrated,
				discarded = ?adoption.discarded,
				"rewrote config file after migration"
			);
		}

		Ok(store)
	}

	pub fn path(&self) -> &Path {
		&self.path
	}

	pub fn encryption_enabled(&self) -> ConfigResult<bool> {
		Ok(self.vault.encryption_enabled()?)
	}

	/// Snapshot with credentials decrypted. For in-process use only.
	pub async fn current(&self) -> ConfigResult<ConfigSnapshot> {
		let key = self.vault.key()?;
		let state = self.state.read().await;
		Ok(state.snapshot(key)?)
	}

	/// Validate and apply a provider change, then persist it.
	///
	/// With the provider unchanged, omitted secrets and settings are kept.
	/// Switching provider starts from an empty set, so the new provider must
	/// validate on the supplied fields alone. Nothing is applied on error.
	#[instrument(skip(self, update))]
	pub async fn update_credentials(&self, provider: &str, update: CredentialUpdate) -> ConfigResult<()> {
		let provider: Provider = provider.parse()?;
		let key = self.vault.key()?;

		let mut state = self.state.write().await;
		let same_provider = state.llm_provider == provider.as_str();

		let mut candidate = state.clone();
		candidate.llm_provider = provider.as_str().to_string();
		if !same_provider {
			candidate.llm_config.clear();
			candidate.credentials.clear();
		}

		for (name, value) in update.settings {
			if value.trim().is_empty() {
				candidate.llm_config.remove(&name);
			} else {
				candidate.llm_config.insert(name, value);
			}
		}
		candidate
			.llm_config
			.entry(MODEL.to_string())
			.or_insert_with(|| provider.default_model().to_string());

		for (name, secret) in update.secrets {
			if secret.is_blank() {
				continue;
			}
			candidate
				.credentials
				.insert(name, Credential::Plain(secret).seal(key)?);
		}

		provider.validate(&candidate.llm_config, |field| {
			candidate.credentials.contains_key(field)
		})?;

		self.persist(&candidate).await?;
		*state = candidate;

		info!(%provider, same_provider, "updated provider credentials");
		Ok(())
	}

	/// Write the current config to disk.
	pub async fn save(&self) -> ConfigResult<()> {
		let state = self.state.write().await;
		self.persist(&state).await
	}

	/// Drop every stored credential and persist.
	pub async fn clear_credentials(&self) -> ConfigResult<()> {
		let mut state = self.state.write().await;
		let mut candidate = state.clone();
		candidate.credentials.clear();

		self.persist(&candidate).await?;
		*state = candidate;

		info!(provider = %state.llm_provider, "cleared provider credentials");
		Ok(())
	}

	async fn persist(&self, config: &AppConfig) -> ConfigResult<()> {
		let file = config.to_persisted(self.vault.key()?)?;
		let contents = serde_json::to_vec_pretty(&file).map_err(ConfigError::Serialize)?;
		write_atomic(&self.path, &contents).await?;
		debug!(path = %self.path.display(), "config saved");
		Ok(())
	}
}

async fn read_persisted(path: &Path) -> ConfigResult<Option<PersistedConfig>> {
	let contents = match fs::read(path).await {
		Ok(contents) => contents,
		Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
		Err(e) => return Err(ConfigError::io(path, e)),
	};

	serde_json::from_slice(&contents)
		.map(Some)
		.map_err(|source| ConfigError::Parse {
			path: path.to_path_buf(),
			source,
		})
}

/// Write via a temporary sibling, restricted to the owner, then rename.
async fn write_atomic(path: &Path, contents: &[u8]) -> ConfigResult<()> {
	if let Some(parent) = path.parent() {
		fs::create_dir_all(parent)
			.await
			.map_err(|e| ConfigError::io(parent, e))?;
	}

	let temp_path = path.with_extension("json.tmp");
	let mut file = fs::File::create(&temp_path)
		.await
		.map_err(|e| ConfigError::io(&temp_path, e))?;
	file.write_all(contents)
		.await
		.map_err(|e| ConfigError::io(&temp_path, e))?;
	file.sync_all()
		.await
		.map_err(|e| ConfigError::io(&temp_path, e))?;
	drop(file);

	#[cfg(unix)]
	{
		use std::os::unix::fs::PermissionsExt;
		let perms = std::fs::Permissions::from_mode(0o600);
		if let Err(e) = fs::set_permissions(&temp_path, perms).await {
			warn!(path = %temp_path.display(), error = %e, "failed to set config file permissions to 0600");
		}
	}

	fs::rename(&temp_path, path)
		.await
		.map_err(|e| ConfigError::io(path, e))
}

#[cfg(test)]
mod tests {
	use super::*;
	use quill_vault::VaultOptions;
	use tempfile::tempdir;

	fn options(dir: &Path) -> SubsystemOptions {
		SubsystemOptions::with_data_dir(dir)
	}

	fn disabled(dir: &Path) -> SubsystemOptions {
		let mut options = options(dir);
		options.vault = VaultOptions {
			encryption_disabled: true,
			..Default::default()
		};
		options
	}

	async fn raw_file(store: &SecretConfigStore) -> PersistedConfig {
		let contents = fs::read(store.path()).await.unwrap();
		serde_json::from_slice(&contents).unwrap()
	}

	mod open {
		use super::*;

		#[tokio::test]
		async fn fresh_directory_uses_env_defaults() {
			let dir = tempdir().unwrap();
			let store = SecretConfigStore::open(&options(dir.path())).await.unwrap();

			let current = store.current().await.unwrap();
			assert_eq!(current.llm_provider, "");
			assert!(current.credentials.is_empty());
			assert!(current.encryption_enabled);
			assert!(!store.path().exists());
		}

		#[tokio::test]
		async fn template_file_is_not_adopted() {
			let dir = tempdir().unwrap();
			let template = r#"{"llm_provider":"openai","llm_config":{"model":"gpt-4o","api_key":""}}"#;
			std::fs::write(dir.path().join(CONFIG_FILE_NAME), template).unwrap();

			let store = SecretConfigStore::open(&options(dir.path())).await.unwrap();
			assert_eq!(store.current().await.unwrap().llm_provider, "");
		}

		#[tokio::test]
		async fn legacy_plaintext_is_rewritten_encrypted() {
			let dir = tempdir().unwrap();
			let legacy = r#"{"llm_provider":"anthropic","llm_config":{"api_key":"sk-ant-legacy"}}"#;
			std::fs::write(dir.path().join(CONFIG_FILE_NAME), legacy).unwrap();

			let store = SecretConfigStore::open(&options(dir.path())).await.unwrap();

			let raw = raw_file(&store).await;
			assert!(!raw.llm_config.contains_key(API_KEY));
			assert!(raw.encrypted_llm_config.contains_key(API_KEY));
			let on_disk = std::fs::read_to_string(store.path()).unwrap();
			assert!(!on_disk.contains("sk-ant-legacy"));

			let current = store.current().await.unwrap();
			assert_eq!(current.api_key().unwrap().expose(), "sk-ant-legacy");
		}

		#[tokio::test]
		async fn corrupt_file_is_an_error() {
			let dir = tempdir().unwrap();
			std::fs::write(dir.path().join(CONFIG_FILE_NAME), "{not json").unwrap();

			let err = SecretConfigStore::open(&options(dir.path())).await.unwrap_err();
			assert!(matches!(err, ConfigError::Parse { .. }));
		}

		#[tokio::test]
		async fn required_key_missing_is_fatal() {
			let dir = tempdir().unwrap();
			let mut options = options(dir.path());
			options.vault.require_key = true;

			let err = SecretConfigStore::open(&options).await.unwrap_err();
			assert!(err.is_fatal());
		}
	}

	mod update {
		use super::*;

		#[tokio::test]
		async fn unsupported_provider_is_rejected() {
			let dir = tempdir().unwrap();
			let store = SecretConfigStore::open(&options(dir.path())).await.unwrap();

			let err = store
				.update_credentials("ollama", CredentialUpdate::new().api_key("x"))
				.await
				.unwrap_err();
			assert!(matches!(err, ConfigError::UnsupportedProvider(_)));
			assert!(!store.path().exists());
		}

		#[tokio::test]
		async fn missing_required_field_applies_nothing() {
			let dir = tempdir().unwrap();
			let store = SecretConfigStore::open(&options(dir.path())).await.unwrap();

			let err = store
				.update_credentials("qwen", CredentialUpdate::new().api_key("dash"))
				.await
				.unwrap_err();
			assert!(err.is_validation());
			assert_eq!(store.current().await.unwrap().llm_provider, "");
		}

		#[tokio::test]
		async fn omitted_key_is_kept_for_same_provider() {
			let dir = tempdir().unwrap();
			let store = SecretConfigStore::open(&options(dir.path())).await.unwrap();

			store
				.update_credentials("anthropic", CredentialUpdate::new().api_key("sk-ant"))
				.await
				.unwrap();
			store
				.update_credentials("anthropic", CredentialUpdate::new().model("claude-3-opus-latest"))
				.await
				.unwrap();

			let current = store.current().await.unwrap();
			assert_eq!(current.api_key().unwrap().expose(), "sk-ant");
			assert_eq!(current.model(), Some("claude-3-opus-latest"));
		}

		#[tokio::test]
		async fn switching_provider_without_key_is_rejected() {
			let dir = tempdir().unwrap();
			let store = SecretConfigStore::open(&options(dir.path())).await.unwrap();

			store
				.update_credentials("anthropic", CredentialUpdate::new().api_key("sk-ant"))
				.await
				.unwrap();
			let err = store
				.update_credentials("deepseek", CredentialUpdate::new())
				.await
				.unwrap_err();

			assert!(matches!(err, ConfigError::MissingField { .. }));
			let current = store.current().await.unwrap();
			assert_eq!(current.llm_provider, "anthropic");
			assert_eq!(current.api_key().unwrap().expose(), "sk-ant");
		}

		#[tokio::test]
		async fn switching_to_keyless_openai_endpoint_is_accepted() {
			let dir = tempdir().unwrap();
			let store = SecretConfigStore::open(&options(dir.path())).await.unwrap();

			store
				.update_credentials("anthropic", CredentialUpdate::new().api_key("sk-ant"))
				.await
				.unwrap();
			store
				.update_credentials(
					"openai",
					CredentialUpdate::new().endpoint("http://localhost:11434/v1"),
				)
				.await
				.unwrap();

			let current = store.current().await.unwrap();
			assert_eq!(current.llm_provider, "openai");
			assert!(current.api_key().is_none());
		}

		#[tokio::test]
		async fn saved_file_never_holds_plaintext() {
			let dir = tempdir().unwrap();
			let store = SecretConfigStore::open(&options(dir.path())).await.unwrap();

			store
				.update_credentials(
					"qwen",
					CredentialUpdate::new().api_key("dash-key").secret_key("dash-secret"),
				)
				.await
				.unwrap();

			let on_disk = std::fs::read_to_string(store.path()).unwrap();
			assert!(!on_disk.contains("dash-key"));
			assert!(!on_disk.contains("dash-secret"));
			let raw = raw_file(&store).await;
			assert_eq!(raw.encrypted_llm_config.len(), 2);
		}

		#[tokio::test]
		async fn disabled_encryption_persists_legacy_map() {
			let dir = tempdir().unwrap();
			let store = SecretConfigStore::open(&disabled(dir.path())).await.unwrap();

			store
				.update_credentials("mistral", CredentialUpdate::new().api_key("ms-key"))
				.await
				.unwrap();

			let raw = raw_file(&store).await;
			assert_eq!(raw.llm_config[API_KEY], "ms-key");
			assert!(raw.encrypted_llm_config.is_empty());
		}

		#[tokio::test]
		async fn from_fields_routes_sensitive_keys() {
			let update = CredentialUpdate::from_fields([
				("api_key".to_string(), "k".to_string()),
				("model".to_string(), "m".to_string()),
			]);
			assert!(update.secrets.contains_key(API_KEY));
			assert_eq!(update.settings[MODEL], "m");
		}
	}

	mod clear {
		use super::*;

		#[tokio::test]
		async fn clear_credentials_persists() {
			let dir = tempdir().unwrap();
			let store = SecretConfigStore::open(&options(dir.path())).await.unwrap();
			store
				.update_credentials("glm", CredentialUpdate::new().api_key("glm-key"))
				.await
				.unwrap();

			store.clear_credentials().await.unwrap();

			assert!(store.current().await.unwrap().credentials.is_empty());
			assert!(raw_file(&store).await.encrypted_llm_config.is_empty());
		}
	}

	#[cfg(unix)]
	#[tokio::test]
	async fn config_file_is_owner_only() {
		use std::os::unix::fs::PermissionsExt;

		let dir = tempdir().unwrap();
		let store = SecretConfigStore::open(&options(dir.path())).await.unwrap();
		store.save().await.unwrap();

		let mode = std::fs::metadata(store.path()).unwrap().permissions().mode();
		assert_eq!(mode & 0o777, 0o600);
	}

	#[tokio::test]
	async fn global_requires_init() {
		// Only this test touches the process-wide cell.
		assert!(matches!(global(), Err(ConfigError::NotInitialized)));

		let dir = tempdir().unwrap();
		let first = init(&options(dir.path())).await.unwrap();
		let second = init(&options(dir.path())).await.unwrap();
		assert!(std::ptr::eq(first, second));
		assert!(std::ptr::eq(global().unwrap(), first));
	}
}
