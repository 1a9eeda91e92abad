// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Application configuration with LLM credentials encrypted at rest.
//!
//! # Layout
//!
//! - [`options`]: everything read from the environment, once.
//! - [`config`]: the live [`AppConfig`], the decrypted [`ConfigSnapshot`] and
//!   a redacted view for display.
//! - [`persisted`]: the `config.json` document and template detection.
//! - [`store`]: [`SecretConfigStore`], the lock-guarded owner of the live
//!   config, plus the process-wide instance behind [`init`] / [`global`].
//!
//! # Credentials
//!
//! Each credential is a [`Credential`]: `Plain` or `Encrypted`, never both.
//! When encryption is enabled the file only ever holds ciphertext in
//! `encrypted_llm_config`; with encryption disabled credentials are written
//! to `llm_config` in plaintext.

pub mod config;
pub mod credential;
pub mod error;
pub mod options;
pub mod persisted;
pub mod provider;
pub mod store;

pub use config::{Adoption, AppConfig, ConfigSnapshot, RedactedConfig};
pub use credential::Credential;
pub use error::{ConfigError, ConfigResult};
pub use options::{default_data_dir, LlmEnv, SubsystemOptions};
pub use persisted::{PersistedConfig, CONFIG_FILE_NAME};
pub use provider::{Provider, API_KEY, ENDPOINT, MODEL, SECRET_KEY, SENSITIVE_KEYS};
pub use store::{global, init, CredentialUpdate, SecretConfigStore};

/// Config from the process environment alone. Does not read `config.json`.
pub fn load() -> ConfigResult<AppConfig> {
	Ok(AppConfig::load(&SubsystemOptions::from_env()?))
}
