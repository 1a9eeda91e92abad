// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Configuration error types.

use std::path::PathBuf;

use quill_common_secret::{EnvParseError, SecretEnvError};
use quill_vault::VaultError;
use thiserror::Error;

pub type ConfigResult<T> = Result<T, ConfigError>;

#[derive(Debug, Error)]
pub enum ConfigError {
	#[error("unsupported provider '{0}'")]
	UnsupportedProvider(String),

	#[error("provider '{provider}' requires '{field}'")]
	MissingField { provider: String, field: String },

	#[error("invalid value for {key}: {message}")]
	InvalidValue { key: String, message: String },

	#[error(transparent)]
	Vault(#[from] VaultError),

	#[error(transparent)]
	SecretEnv(#[from] SecretEnvError),

	#[error("failed to access config file {path}: {source}")]
	Io {
		path: PathBuf,
		#[source]
		source: std::io::Error,
	},

	#[error("failed to parse config file {path}: {source}")]
	Parse {
		path: PathBuf,
		#[source]
		source: serde_json::Error,
	},

	#[error("failed to serialize config: {0}")]
	Serialize(#[source] serde_json::Error),

	#[error("config store has not been initialized")]
	NotInitialized,
}

impl ConfigError {
	/// Misconfiguration that should stop the process at startup.
	pub fn is_fatal(&self) -> bool {
		match self {
			ConfigError::Vault(e) => e.is_fatal(),
			ConfigError::SecretEnv(_) => true,
			_ => false,
		}
	}

	/// Rejected input; nothing was applied.
	pub fn is_validation(&self) -> bool {
		matches!(
			self,
			ConfigError::UnsupportedProvider(_)
				| ConfigError::MissingField { .. }
				| ConfigError::InvalidValue { .. }
		)
	}

	pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
		ConfigError::Io {
			path: path.into(),
			source,
		}
	}
}

impl From<EnvParseError> for ConfigError {
	fn from(e: EnvParseError) -> Self {
		ConfigError::InvalidValue {
			key: e.var,
			message: format!("cannot parse '{}'", e.value),
		}
	}
}
