// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::fs::Metadata;
use std::time::{Duration, Instant, SystemTime};

/// Modification time and length of a file at one moment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileStamp {
	pub modified: SystemTime,
	pub len: u64,
}

impl FileStamp {
	pub fn from_metadata(metadata: &Metadata) -> std::io::Result<Self> {
		Ok(Self {
			modified: metadata.modified()?,
			len: metadata.len(),
		})
	}
}

/// One cached file.
///
/// The value is stored as parsed JSON and converted to the caller's type on
/// every hit, so callers never share the cached object.
#[derive(Debug, Clone)]
pub struct CacheEntry {
	pub(crate) value: serde_json::Value,
	pub(crate) created_at: Instant,
	pub(crate) last_read: u64,
	/// `None` when the file could not be stat'ed after a write.
	pub(crate) stamp: Option<FileStamp>,
}

impl CacheEntry {
	pub(crate) fn new(value: serde_json::Value, stamp: Option<FileStamp>, tick: u64) -> Self {
		Self {
			value,
			created_at: Instant::now(),
			last_read: tick,
			stamp,
		}
	}

	/// Valid only if the file is unchanged and the entry has not expired.
	pub fn is_fresh(&self, current: &FileStamp, expiration: Duration) -> bool {
		self.stamp.as_ref() == Some(current) && self.created_at.elapsed() < expiration
	}

	pub fn age(&self) -> Duration {
		self.created_at.elapsed()
	}

	pub fn stamp(&self) -> Option<&FileStamp> {
		self.stamp.as_ref()
	}
}
