// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Supported LLM providers and their credential requirements.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, ConfigResult};

pub const API_KEY: &str = "api_key";
pub const SECRET_KEY: &str = "secret_key";
pub const MODEL: &str = "model";
pub const ENDPOINT: &str = "endpoint";

/// `llm_config` keys that are always encrypted at rest.
pub const SENSITIVE_KEYS: &[&str] = &[API_KEY, SECRET_KEY];

pub fn is_sensitive(key: &str) -> bool {
	SENSITIVE_KEYS.contains(&key)
}

/// The fixed allow-list of LLM providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
	OpenAi,
	Anthropic,
	Google,
	GithubModels,
	Grok,
	Mistral,
	Qwen,
	Glm,
	DeepSeek,
	OpenRouter,
}

impl Provider {
	pub const ALL: [Provider; 10] = [
		Provider::OpenAi,
		Provider::Anthropic,
		Provider::Google,
		Provider::GithubModels,
		Provider::Grok,
		Provider::Mistral,
		Provider::Qwen,
		Provider::Glm,
		Provider::DeepSeek,
		Provider::OpenRouter,
	];

	pub fn as_str(&self) -> &'static str {
		match self {
			Provider::OpenAi => "openai",
			Provider::Anthropic => "anthropic",
			Provider::Google => "google",
			Provider::GithubModels => "githubmodels",
			Provider::Grok => "grok",
			Provider::Mistral => "mistral",
			Provider::Qwen => "qwen",
			Provider::Glm => "glm",
			Provider::DeepSeek => "deepseek",
			Provider::OpenRouter => "openrouter",
		}
	}

	pub fn default_model(&self) -> &'static str {
		match self {
			Provider::OpenAi => "gpt-4o",
			Provider::Anthropic => "claude-3-5-sonnet-latest",
			Provider::Google => "gemini-1.5-pro",
			Provider::GithubModels => "gpt-4o",
			Provider::Grok => "grok-2-latest",
			Provider::Mistral => "mistral-large-latest",
			Provider::Qwen => "qwen-max",
			Provider::Glm => "glm-4",
			Provider::DeepSeek => "deepseek-chat",
			Provider::OpenRouter => "openai/gpt-4o",
		}
	}

	/// Secret fields this provider cannot work without, given its plain
	/// settings. An OpenAI-compatible custom endpoint may be keyless.
	pub fn required_secrets(&self, settings: &BTreeMap<String, String>) -> &'static [&'static str] {
		match self {
			Provider::OpenAi if has_value(settings, ENDPOINT) => &[],
			Provider::Qwen => &[API_KEY, SECRET_KEY],
			_ => &[API_KEY],
		}
	}

	/// Check that every required secret is present.
	pub fn validate(
		&self,
		settings: &BTreeMap<String, String>,
		present: impl Fn(&str) -> bool,
	) -> ConfigResult<()> {
		for field in self.required_secrets(settings) {
			if !present(field) {
				return Err(ConfigError::MissingField {
					provider: self.to_string(),
					field: field.to_string(),
				});
			}
		}
		Ok(())
	}
}

impl std::fmt::Display for Provider {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.write_str(self.as_str())
	}
}

impl std::str::FromStr for Provider {
	type Err = ConfigError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		let wanted = s.trim().to_lowercase();
		Provider::ALL
			.into_iter()
			.find(|p| p.as_str() == wanted)
			.ok_or_else(|| ConfigError::UnsupportedProvider(s.to_string()))
	}
}

fn has_value(map: &BTreeMap<String, String>, key: &str) -> bool {
	map.get(key).is_some_and(|v| !v.trim().is_empty())
}

#[cfg(test)]
mod tests {
	use super::*;

	fn settings(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
		pairs
			.iter()
			.map(|(k, v)| (k.to_string(), v.to_string()))
			.collect()
	}

	#[test]
	fn parses_every_allowed_provider() {
		for provider in Provider::ALL {
			assert_eq!(provider.as_str().parse::<Provider>().unwrap(), provider);
		}
	}

	#[test]
	fn parsing_is_case_insensitive() {
		assert_eq!("OpenAI".parse::<Provider>().unwrap(), Provider::OpenAi);
		assert_eq!(" deepseek ".parse::<Provider>().unwrap(), Provider::DeepSeek);
	}

	#[test]
	fn unknown_provider_is_rejected() {
		let err = "ollama".parse::<Provider>().unwrap_err();
		assert!(matches!(err, ConfigError::UnsupportedProvider(p) if p == "ollama"));
	}

	#[test]
	fn serde_uses_lowercase_names() {
		let json = serde_json::to_string(&Provider::GithubModels).unwrap();
		assert_eq!(json, "\"githubmodels\"");
	}

	#[test]
	fn qwen_requires_secret_key() {
		let empty = settings(&[]);
		let err = Provider::Qwen
			.validate(&empty, |f| f == API_KEY)
			.unwrap_err();
		assert!(matches!(err, ConfigError::MissingField { field, .. } if field == SECRET_KEY));
		assert!(Provider::Qwen.validate(&empty, |_| true).is_ok());
	}

	#[test]
	fn openai_with_custom_endpoint_needs_no_key() {
		let custom = settings(&[(ENDPOINT, "http://localhost:11434/v1")]);
		assert!(Provider::OpenAi.validate(&custom, |_| false).is_ok());
		assert!(Provider::OpenAi.validate(&settings(&[]), |_| false).is_err());
	}

	#[test]
	fn blank_endpoint_does_not_waive_key() {
		let blank = settings(&[(ENDPOINT, "  ")]);
		assert!(Provider::OpenAi.validate(&blank, |_| false).is_err());
	}

	#[test]
	fn sensitive_keys() {
		assert!(is_sensitive(API_KEY));
		assert!(is_sensitive(SECRET_KEY));
		assert!(!is_sensitive(MODEL));
	}
}
