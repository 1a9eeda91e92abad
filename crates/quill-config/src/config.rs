// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! The live application config and its derived views.

use std::collections::BTreeMap;
use std::path::PathBuf;

use quill_common_secret::{SecretString, REDACTED};
use quill_vault::{EncryptionKey, VaultResult};
use serde::Serialize;
use tracing::{debug, warn};

use crate::credential::Credential;
use crate::options::SubsystemOptions;
use crate::persisted::PersistedConfig;
use crate::provider::{is_sensitive, Provider, API_KEY, ENDPOINT, MODEL};

/// Application config as held in memory by the store.
///
/// `llm_config` holds plain settings only; every credential lives in
/// `credentials`, tagged with its representation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
	pub port: u16,
	pub data_dir: PathBuf,
	pub llm_provider: String,
	pub llm_config: BTreeMap<String, String>,
	pub credentials: BTreeMap<String, Credential>,
}

/// What happened to credentials while adopting a persisted file.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Adoption {
	/// Legacy plaintext entries that were encrypted or dropped.
	pub migrated: Vec<String>,
	/// Encrypted entries that no longer decrypt under the current key.
	pub discarded: Vec<String>,
}

impl Adoption {
	/// The file on disk no longer matches memory and must be rewritten.
	pub fn needs_save(&self) -> bool {
		!self.migrated.is_empty() || !self.discarded.is_empty()
	}
}

impl AppConfig {
	/// Config derived from environment options alone.
	pub fn load(options: &SubsystemOptions) -> Self {
		let mut llm_config = BTreeMap::new();
		if let Some(model) = &options.llm.model {
			llm_config.insert(MODEL.to_string(), model.clone());
		}
		if let Some(endpoint) = &options.llm.endpoint {
			llm_config.insert(ENDPOINT.to_string(), endpoint.clone());
		}

		let mut credentials = BTreeMap::new();
		if let Some(api_key) = options.llm.api_key.as_ref().filter(|k| !k.is_blank()) {
			credentials.insert(API_KEY.to_string(), Credential::Plain(api_key.clone()));
		}

		Self {
			port: options.port,
			data_dir: options.data_dir.clone(),
			llm_provider: options
				.llm
				.provider
				.as_deref()
				.map(|p| p.trim().to_lowercase())
				.unwrap_or_default(),
			llm_config,
			credentials,
		}
	}

	pub fn provider(&self) -> Option<Provider> {
		self.llm_provider.parse().ok()
	}

	/// Merge a persisted file over this env-derived config.
	///
	/// Env settings and credentials only survive when they belong to the same
	/// provider as the file. A file without a provider keeps the env one. Legacy plaintext credentials are sealed when a
	/// real key is in effect; encrypted credentials that fail to open are
	/// dropped.
	pub fn adopt(&mut self, file: PersistedConfig, key: &EncryptionKey) -> VaultResult<Adoption> {
		let mut adoption = Adoption::default();

		let file_provider = file.llm_provider.trim().to_lowercase();
		let same_provider = file_provider.is_empty()
			|| self.llm_provider.is_empty()
			|| self.llm_provider == file_provider;
		let env_settings = std::mem::take(&mut self.llm_config);
		let env_credentials = std::mem::take(&mut self.credentials);

		if let Some(port) = file.port {
			self.port = port;
		}
		if !file_provider.is_empty() {
			self.llm_provider = file_provider;
		}

		if same_provider {
			self.llm_config = env_settings;
		}
		for (name, value) in &file.llm_config {
			if !is_sensitive(name) && !value.trim().is_empty() {
				self.llm_config.insert(name.clone(), value.clone());
			}
		}

		for (name, stored) in file.encrypted_llm_config {
			if stored.trim().is_empty() {
				continue;
			}
			let credential = Credential::Encrypted(stored);
			if key.is_enabled() {
				if let Err(e) = credential.reveal(key) {
					warn!(
						credential = %name,
						error = %e,
						"stored credential no longer decrypts, discarding it; the encryption key may have changed, reconfigure the provider"
					);
					adoption.discarded.push(name);
					continue;
				}
			} else {
				debug!(credential = %name, "keeping encrypted credential while encryption is disabled");
			}
			self.credentials.insert(name, credential);
		}

		for (name, value) in file.llm_config {
			if !is_sensitive(&name) || value.trim().is_empty() {
				continue;
			}
			if key.is_enabled() {
				if !self.credentials.contains_key(&name) {
					let sealed = Credential::Plain(SecretString::new(value)).seal(key)?;
					self.credentials.insert(name.clone(), sealed);
				}
				adoption.migrated.push(name);
			} else {
				self.credentials
					.insert(name, Credential::Plain(SecretString::new(value)));
			}
		}

		if same_provider {
			for (name, credential) in env_credentials {
				self.credentials.entry(name).or_insert(credential);
			}
		}

		Ok(adoption)
	}

	/// The form written to disk. Plaintext credentials only appear in
	/// `llm_config` when `key` is the passthrough key.
	pub fn to_persisted(&self, key: &EncryptionKey) -> VaultResult<PersistedConfig> {
		let mut file = PersistedConfig {
			port: Some(self.port),
			data_dir: Some(self.data_dir.clone()),
			llm_provider: self.llm_provider.clone(),
			llm_config: self.llm_config.clone(),
			encrypted_llm_config: BTreeMap::new(),
		};

		for (name, credential) in &self.credentials {
			match credential.seal(key)? {
				Credential::Encrypted(stored) => {
					file.encrypted_llm_config.insert(name.clone(), stored);
				}
				Credential::Plain(secret) => {
					file.llm_config
						.insert(name.clone(), secret.expose().to_string());
				}
			}
		}

		Ok(file)
	}

	/// Decrypted view for in-process use.
	pub fn snapshot(&self, key: &EncryptionKey) -> VaultResult<ConfigSnapshot> {
		let mut credentials = BTreeMap::new();
		for (name, credential) in &self.credentials {
			if credential.is_encrypted() && !key.is_enabled() {
				continue;
			}
			credentials.insert(name.clone(), credential.reveal(key)?);
		}

		Ok(ConfigSnapshot {
			port: self.port,
			data_dir: self.data_dir.clone(),
			llm_provider: self.llm_provider.clone(),
			llm_config: self.llm_config.clone(),
			credentials,
			encryption_enabled: key.is_enabled(),
		})
	}
}

/// A decrypted copy of the config. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigSnapshot {
	pub port: u16,
	pub data_dir: PathBuf,
	pub llm_provider: String,
	pub llm_config: BTreeMap<String, String>,
	pub credentials: BTreeMap<String, SecretString>,
	pub encryption_enabled: bool,
}

impl ConfigSnapshot {
	pub fn credential(&self, name: &str) -> Option<&SecretString> {
		self.credentials.get(name)
	}

	pub fn api_key(&self) -> Option<&SecretString> {
		self.credential(API_KEY)
	}

	/// Configured model, falling back to the provider default.
	pub fn model(&self) -> Option<&str> {
		self.llm_config
			.get(MODEL)
			.map(String::as_str)
			.or_else(|| self.llm_provider.parse::<Provider>().ok().map(|p| p.default_model()))
	}

	/// Masked view safe to print or log.
	pub fn redacted(&self) -> RedactedConfig {
		let mut llm_config = self.llm_config.clone();
		for name in self.credentials.keys() {
			llm_config.insert(name.clone(), REDACTED.to_string());
		}

		RedactedConfig {
			port: self.port,
			data_dir: self.data_dir.clone(),
			llm_provider: self.llm_provider.clone(),
			llm_config,
			encryption_enabled: self.encryption_enabled,
		}
	}
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RedactedConfig {
	pub port: u16,
	pub data_dir: PathBuf,
	pub llm_provider: String,
	pub llm_config: BTreeMap<String, String>,
	pub encryption_enabled: bool,
}
