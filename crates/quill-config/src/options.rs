// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Environment-derived options for the whole subsystem.

use std::path::PathBuf;
use std::time::Duration;

use quill_common_secret::env::{env_parse_from, env_var_from, load_secret_from};
use quill_common_secret::SecretString;
use quill_vault::VaultOptions;

use crate::error::ConfigResult;

pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_CACHE_MAX_SIZE: usize = 500;
pub const DEFAULT_CACHE_EXPIRATION_SECS: u64 = 600;
pub const DEFAULT_TOKEN_TTL_SECS: i64 = 86_400;

/// LLM settings taken from the environment before any persisted file is read.
#[derive(Debug, Clone, Default)]
pub struct LlmEnv {
	pub provider: Option<String>,
	pub model: Option<String>,
	pub endpoint: Option<String>,
	pub api_key: Option<SecretString>,
}

/// Everything the subsystem reads from the environment, read once.
#[derive(Debug, Clone)]
pub struct SubsystemOptions {
	pub data_dir: PathBuf,
	pub port: u16,
	pub vault: VaultOptions,
	pub llm: LlmEnv,
	pub cache_max_size: usize,
	pub cache_expiration: Duration,
	pub token_secret: Option<SecretString>,
	pub token_ttl_secs: i64,
}

impl SubsystemOptions {
	/// Defaults rooted at `data_dir`, with nothing taken from the environment.
	pub fn with_data_dir(data_dir: impl Into<PathBuf>) -> Self {
		Self {
			data_dir: data_dir.into(),
			port: DEFAULT_PORT,
			vault: VaultOptions::default(),
			llm: LlmEnv::default(),
			cache_max_size: DEFAULT_CACHE_MAX_SIZE,
			cache_expiration: Duration::from_secs(DEFAULT_CACHE_EXPIRATION_SECS),
			token_secret: None,
			token_ttl_secs: DEFAULT_TOKEN_TTL_SECS,
		}
	}

	pub fn from_env() -> ConfigResult<Self> {
		Self::from_lookup(|name| std::env::var(name).ok())
	}

	pub fn from_lookup<F>(lookup: F) -> ConfigResult<Self>
	where
		F: Fn(&str) -> Option<String>,
	{
		let data_dir = env_var_from("QUILL_DATA_DIR", &lookup)
			.map(PathBuf::from)
			.unwrap_or_else(default_data_dir);

		let vault = VaultOptions::from_lookup(&lookup)?;

		let llm = LlmEnv {
			provider: env_var_from("QUILL_LLM_PROVIDER", &lookup),
			model: env_var_from("QUILL_LLM_MODEL", &lookup),
			endpoint: env_var_from("QUILL_LLM_ENDPOINT", &lookup),
			api_key: load_secret_from("QUILL_LLM_API_KEY", &lookup)?,
		};

		let expiration_secs = env_parse_from("QUILL_CACHE_EXPIRATION_SECS", &lookup)?
			.unwrap_or(DEFAULT_CACHE_EXPIRATION_SECS);

		Ok(Self {
			data_dir,
			port: env_parse_from("QUILL_PORT", &lookup)?.unwrap_or(DEFAULT_PORT),
			vault,
			llm,
			cache_max_size: env_parse_from("QUILL_CACHE_MAX_SIZE", &lookup)?
				.unwrap_or(DEFAULT_CACHE_MAX_SIZE),
			cache_expiration: Duration::from_secs(expiration_secs),
			token_secret: load_secret_from("QUILL_TOKEN_SECRET", &lookup)?,
			token_ttl_secs: env_parse_from("QUILL_TOKEN_TTL_SECS", &lookup)?
				.unwrap_or(DEFAULT_TOKEN_TTL_SECS),
		})
	}
}

/// `$XDG_DATA_HOME/quill` (or the platform equivalent), else `./data`.
pub fn default_data_dir() -> PathBuf {
	dirs::data_dir()
		.map(|d| d.join("quill"))
		.unwrap_or_else(|| PathBuf::from("data"))
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::error::ConfigError;
	use std::collections::HashMap;

	fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
		let map: HashMap<String, String> = pairs
			.iter()
			.map(|(k, v)| (k.to_string(), v.to_string()))
			.collect();
		move |name: &str| map.get(name).cloned()
	}

	#[test]
	fn defaults_when_environment_is_empty() {
		let options = SubsystemOptions::from_lookup(lookup(&[])).unwrap();
		assert_eq!(options.port, DEFAULT_PORT);
		assert_eq!(options.cache_max_size, DEFAULT_CACHE_MAX_SIZE);
		assert_eq!(options.cache_expiration, Duration::from_secs(600));
		assert_eq!(options.token_ttl_secs, DEFAULT_TOKEN_TTL_SECS);
		assert!(options.llm.provider.is_none());
		assert!(!options.vault.encryption_disabled);
	}

	#[test]
	fn reads_every_variable() {
		let options = SubsystemOptions::from_lookup(lookup(&[
			("QUILL_DATA_DIR", "/srv/quill"),
			("QUILL_PORT", "9000"),
			("QUILL_DISABLE_ENCRYPTION", "true"),
			("QUILL_LLM_PROVIDER", "anthropic"),
			("QUILL_LLM_MODEL", "claude-3-5-sonnet-latest"),
			("QUILL_LLM_API_KEY", "sk-ant"),
			("QUILL_CACHE_MAX_SIZE", "5"),
			("QUILL_CACHE_EXPIRATION_SECS", "30"),
			("QUILL_TOKEN_SECRET", "hmac-key"),
			("QUILL_TOKEN_TTL_SECS", "60"),
		]))
		.unwrap();

		assert_eq!(options.data_dir, PathBuf::from("/srv/quill"));
		assert_eq!(options.port, 9000);
		assert!(options.vault.encryption_disabled);
		assert_eq!(options.llm.provider.as_deref(), Some("anthropic"));
		assert_eq!(options.llm.api_key.unwrap().expose(), "sk-ant");
		assert_eq!(options.cache_max_size, 5);
		assert_eq!(options.cache_expiration, Duration::from_secs(30));
		assert_eq!(options.token_secret.unwrap().expose(), "hmac-key");
		assert_eq!(options.token_ttl_secs, 60);
	}

	#[test]
	fn unparseable_number_names_the_variable() {
		let err = SubsystemOptions::from_lookup(lookup(&[("QUILL_CACHE_MAX_SIZE", "many")])).unwrap_err();
		assert!(matches!(err, ConfigError::InvalidValue { ref key, .. } if key == "QUILL_CACHE_MAX_SIZE"));
	}

	#[test]
	fn with_data_dir_has_no_environment_inputs() {
		let options = SubsystemOptions::with_data_dir("/tmp/x");
		assert!(options.vault.explicit_key.is_none());
		assert!(options.llm.api_key.is_none());
		assert!(options.token_secret.is_none());
	}
}
