// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Environment variable helpers.
//!
//! Secrets follow the `VAR` / `VAR_FILE` convention used by Docker and
//! Kubernetes secret mounts. Every helper has a `*_from` variant taking a
//! lookup function so callers can resolve options without touching the
//! process environment.

use std::path::PathBuf;
use std::str::FromStr;
use std::{env, fs};

use thiserror::Error;

use crate::SecretString;

/// Errors raised while loading a secret from the environment.
#[derive(Debug, Error)]
pub enum SecretEnvError {
	#[error("failed to read secret file at {path}: {source}")]
	Io {
		path: PathBuf,
		#[source]
		source: std::io::Error,
	},

	#[error("secret file path in {var} is empty")]
	EmptyPath { var: String },
}

/// A variable was set but could not be parsed into the expected type.
#[derive(Debug, Error)]
#[error("invalid value for {var}: '{value}'")]
pub struct EnvParseError {
	pub var: String,
	pub value: String,
}

/// Read a variable from the process environment, treating empty as unset.
pub fn env_var(name: &str) -> Option<String> {
	env_var_from(name, process_lookup)
}

/// Read a boolean flag; `1` and `true` (any case) are truthy.
pub fn env_bool(name: &str) -> Option<bool> {
	env_bool_from(name, process_lookup)
}

/// Read and parse a typed variable.
pub fn env_parse<T: FromStr>(name: &str) -> Result<Option<T>, EnvParseError> {
	env_parse_from(name, process_lookup)
}

/// Load a secret from `VAR_FILE` (preferred) or `VAR`.
///
/// A single trailing newline is stripped from file contents.
pub fn load_secret_env(var: &str) -> Result<Option<SecretString>, SecretEnvError> {
	load_secret_from(var, process_lookup)
}

pub fn env_var_from<F>(name: &str, lookup: F) -> Option<String>
where
	F: Fn(&str) -> Option<String>,
{
	lookup(name).filter(|v| !v.is_empty())
}

pub fn env_bool_from<F>(name: &str, lookup: F) -> Option<bool>
where
	F: Fn(&str) -> Option<String>,
{
	env_var_from(name, lookup).map(|v| v.eq_ignore_ascii_case("true") || v == "1")
}

pub fn env_parse_from<T, F>(name: &str, lookup: F) -> Result<Option<T>, EnvParseError>
where
	T: FromStr,
	F: Fn(&str) -> Option<String>,
{
	match env_var_from(name, lookup) {
		Some(value) => value.trim().parse().map(Some).map_err(|_| EnvParseError {
			var: name.to_string(),
			value,
		}),
		None => Ok(None),
	}
}

pub fn load_secret_from<F>(var: &str, lookup: F) -> Result<Option<SecretString>, SecretEnvError>
where
	F: Fn(&str) -> Option<String>,
{
	let file_var = format!("{var}_FILE");

	if let Some(path_str) = lookup(&file_var) {
		if path_str.is_empty() {
			return Err(SecretEnvError::EmptyPath { var: file_var });
		}

		let path = PathBuf::from(&path_str);
		let content = fs::read_to_string(&path).map_err(|source| SecretEnvError::Io {
			path: path.clone(),
			source,
		})?;

		let value = content.strip_suffix('\n').unwrap_or(&content).to_string();
		return Ok(Some(SecretString::new(value)));
	}

	Ok(env_var_from(var, lookup).map(SecretString::new))
}

fn process_lookup(name: &str) -> Option<String> {
	env::var(name).ok()
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::collections::HashMap;
	use std::io::Write;

	fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
		let map: HashMap<String, String> = pairs
			.iter()
			.map(|(k, v)| (k.to_string(), v.to_string()))
			.collect();
		move |name: &str| map.get(name).cloned()
	}

	#[test]
	fn empty_values_are_unset() {
		let vars = lookup(&[("QUILL_PORT", "")]);
		assert_eq!(env_var_from("QUILL_PORT", &vars), None);
	}

	#[test]
	fn bool_flags() {
		let vars = lookup(&[("A", "1"), ("B", "TRUE"), ("C", "no")]);
		assert_eq!(env_bool_from("A", &vars), Some(true));
		assert_eq!(env_bool_from("B", &vars), Some(true));
		assert_eq!(env_bool_from("C", &vars), Some(false));
		assert_eq!(env_bool_from("D", &vars), None);
	}

	#[test]
	fn parse_reports_variable_name() {
		let vars = lookup(&[("QUILL_CACHE_MAX_SIZE", "lots")]);
		let err = env_parse_from::<usize, _>("QUILL_CACHE_MAX_SIZE", &vars).unwrap_err();
		assert_eq!(err.var, "QUILL_CACHE_MAX_SIZE");
		assert!(err.to_string().contains("lots"));
	}

	#[test]
	fn parse_trims_whitespace() {
		let vars = lookup(&[("QUILL_PORT", " 9000 ")]);
		assert_eq!(env_parse_from::<u16, _>("QUILL_PORT", &vars).unwrap(), Some(9000));
	}

	#[test]
	fn file_variant_wins_and_strips_newline() {
		let mut file = tempfile::NamedTempFile::new().unwrap();
		writeln!(file, "from-file").unwrap();
		let path = file.path().to_string_lossy().to_string();

		let vars = lookup(&[("KEY", "from-env"), ("KEY_FILE", path.as_str())]);
		let secret = load_secret_from("KEY", &vars).unwrap().unwrap();
		assert_eq!(secret.expose(), "from-file");
	}

	#[test]
	fn direct_value_used_without_file() {
		let vars = lookup(&[("KEY", "from-env")]);
		let secret = load_secret_from("KEY", &vars).unwrap().unwrap();
		assert_eq!(secret.expose(), "from-env");
	}

	#[test]
	fn empty_file_path_is_an_error() {
		let vars = lookup(&[("KEY_FILE", "")]);
		assert!(matches!(
			load_secret_from("KEY", &vars),
			Err(SecretEnvError::EmptyPath { .. })
		));
	}

	#[test]
	fn missing_file_is_an_error() {
		let vars = lookup(&[("KEY_FILE", "/nonexistent/quill/secret")]);
		assert!(matches!(
			load_secret_from("KEY", &vars),
			Err(SecretEnvError::Io { .. })
		));
	}
}
