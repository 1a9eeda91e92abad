// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::path::PathBuf;

use thiserror::Error;

pub type CacheResult<T> = Result<T, CacheError>;

/// Cache failures. None of them are fatal and none leave a partial entry.
#[derive(Debug, Error)]
pub enum CacheError {
	#[error("cannot resolve path {path}: {source}")]
	PathResolution {
		path: PathBuf,
		#[source]
		source: std::io::Error,
	},

	#[error("cannot create directory {path}: {source}")]
	CreateDir {
		path: PathBuf,
		#[source]
		source: std::io::Error,
	},

	#[error("i/o error on {path}: {source}")]
	Io {
		path: PathBuf,
		#[source]
		source: std::io::Error,
	},

	#[error("failed to serialize value for {path}: {source}")]
	Serialize {
		path: PathBuf,
		#[source]
		source: serde_json::Error,
	},

	#[error("failed to parse {path}: {source}")]
	Deserialize {
		path: PathBuf,
		#[source]
		source: serde_json::Error,
	},
}

impl CacheError {
	pub fn path(&self) -> &std::path::Path {
		match self {
			CacheError::PathResolution { path, .. }
			| CacheError::CreateDir { path, .. }
			| CacheError::Io { path, .. }
			| CacheError::Serialize { path, .. }
			| CacheError::Deserialize { path, .. } => path,
		}
	}

	/// The file does not exist.
	pub fn is_not_found(&self) -> bool {
		matches!(self, CacheError::Io { source, .. } if source.kind() == std::io::ErrorKind::NotFound)
	}
}
