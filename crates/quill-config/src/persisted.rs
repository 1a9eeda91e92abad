// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! On-disk format of the config file.

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::provider::{is_sensitive, Provider, ENDPOINT, MODEL};

/// Name of the persisted config file inside the data directory.
pub const CONFIG_FILE_NAME: &str = "config.json";

/// The JSON document written to `config.json`.
///
/// `llm_config` must not hold a populated sensitive key while encryption is
/// enabled; those live in `encrypted_llm_config` as base64 ciphertext.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PersistedConfig {
	#[serde(skip_serializing_if = "Option::is_none")]
	pub port: Option<u16>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub data_dir: Option<PathBuf>,
	pub llm_provider: String,
	pub llm_config: BTreeMap<String, String>,
	#[serde(skip_serializing_if = "BTreeMap::is_empty")]
	pub encrypted_llm_config: BTreeMap<String, String>,
}

impl PersistedConfig {
	/// True when the file carries nothing beyond scaffold defaults.
	///
	/// Meaningful signals: a provider other than the default, a model other
	/// than that provider's default, a custom endpoint, or any credential in
	/// either map.
	pub fn is_template(&self) -> bool {
		let provider = self.llm_provider.trim();
		let default_provider = Provider::OpenAi;

		if !provider.is_empty() && !provider.eq_ignore_ascii_case(default_provider.as_str()) {
			return false;
		}

		let model = self.setting(MODEL);
		if !model.is_empty() && model != default_provider.default_model() {
			return false;
		}

		if !self.setting(ENDPOINT).is_empty() {
			return false;
		}

		if self.encrypted_llm_config.values().any(|v| !v.trim().is_empty()) {
			return false;
		}

		!self
			.llm_config
			.iter()
			.any(|(k, v)| is_sensitive(k) && !v.trim().is_empty())
	}

	fn setting(&self, key: &str) -> &str {
		self.llm_config.get(key).map(|v| v.trim()).unwrap_or_default()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::provider::API_KEY;

	fn config(provider: &str, pairs: &[(&str, &str)]) -> PersistedConfig {
		PersistedConfig {
			llm_provider: provider.to_string(),
			llm_config: pairs
				.iter()
				.map(|(k, v)| (k.to_string(), v.to_string()))
				.collect(),
			..Default::default()
		}
	}

	#[test]
	fn empty_file_is_template() {
		assert!(PersistedConfig::default().is_template());
	}

	#[test]
	fn default_provider_and_model_is_template() {
		assert!(config("openai", &[(MODEL, "gpt-4o")]).is_template());
		assert!(config("openai", &[(MODEL, "")]).is_template());
		assert!(config("openai", &[(API_KEY, "")]).is_template());
	}

	#[test]
	fn other_provider_is_meaningful() {
		assert!(!config("anthropic", &[]).is_template());
	}

	#[test]
	fn custom_model_is_meaningful() {
		assert!(!config("openai", &[(MODEL, "gpt-4o-mini")]).is_template());
	}

	#[test]
	fn endpoint_is_meaningful() {
		assert!(!config("openai", &[(ENDPOINT, "http://localhost:8000/v1")]).is_template());
	}

	#[test]
	fn legacy_credential_is_meaningful() {
		assert!(!config("openai", &[(API_KEY, "sk-legacy")]).is_template());
	}

	#[test]
	fn encrypted_credential_is_meaningful() {
		let mut file = config("openai", &[]);
		file.encrypted_llm_config
			.insert(API_KEY.to_string(), "Y2lwaGVy".to_string());
		assert!(!file.is_template());
	}

	#[test]
	fn missing_fields_deserialize_to_defaults() {
		let file: PersistedConfig = serde_json::from_str(r#"{"llm_provider":"glm"}"#).unwrap();
		assert_eq!(file.llm_provider, "glm");
		assert!(file.llm_config.is_empty());
		assert!(file.port.is_none());
	}

	#[test]
	fn empty_encrypted_map_is_not_written() {
		let json = serde_json::to_string(&config("openai", &[])).unwrap();
		assert!(!json.contains("encrypted_llm_config"));
	}
}
