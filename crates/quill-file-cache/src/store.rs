// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::fs;
use tokio::sync::RwLock;
use tracing::{debug, instrument, warn};

use crate::entry::{CacheEntry, FileStamp};
use crate::error::{CacheError, CacheResult};
use crate::eviction;
use crate::stats::{CacheStats, Counters};

pub const DEFAULT_MAX_SIZE: usize = 500;
pub const DEFAULT_EXPIRATION: Duration = Duration::from_secs(600);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheConfig {
	/// Most entries held before a batch is evicted.
	pub max_size: usize,
	/// Entries older than this are re-read even if the file is unchanged.
	pub expiration: Duration,
}

impl Default for CacheConfig {
	fn default() -> Self {
		Self {
			max_size: DEFAULT_MAX_SIZE,
			expiration: DEFAULT_EXPIRATION,
		}
	}
}

impl CacheConfig {
	pub fn new(max_size: usize, expiration: Duration) -> Self {
		Self {
			max_size,
			expiration,
		}
	}
}

/// In-memory cache of JSON files keyed by absolute path.
///
/// One lock covers the whole map. Disk I/O happens outside it, so a reader
/// racing a writer may still see the previous value until the writer has
/// updated the map.
#[derive(Debug)]
pub struct CacheStore {
	config: CacheConfig,
	entries: RwLock<HashMap<PathBuf, CacheEntry>>,
	clock: AtomicU64,
	counters: Counters,
}

impl Default for CacheStore {
	fn default() -> Self {
		Self::new(CacheConfig::default())
	}
}

impl CacheStore {
	pub fn new(config: CacheConfig) -> Self {
		Self {
			config,
			entries: RwLock::new(HashMap::new()),
			clock: AtomicU64::new(0),
			counters: Counters::default(),
		}
	}

	pub fn config(&self) -> &CacheConfig {
		&self.config
	}

	/// Read and parse `path`, serving from memory when the cached copy is
	/// still fresh.
	#[instrument(skip_all, fields(path = %path.as_ref().display()))]
	pub async fn read<T: DeserializeOwned>(&self, path: impl AsRef<Path>) -> CacheResult<T> {
		let path = resolve(path.as_ref())?;

		let cached = {
			let entries = self.entries.read().await;
			entries.get(&path).cloned()
		};

		match cached {
			Some(entry) => match stat(&path).await {
				Ok(current) if entry.is_fresh(&current, self.config.expiration) => {
					let value = decode(&path, entry.value)?;
					self.touch(&path).await;
					self.counters.record_hit();
					debug!("cache hit");
					return Ok(value);
				}
				Ok(_) => {
					self.counters.record_stale();
					debug!(age_ms = entry.age().as_millis() as u64, "cache entry stale, reloading");
				}
				Err(e) => {
					self.counters.record_stale();
					debug!(error = %e, "cannot stat cached file, reloading");
				}
			},
			None => {
				self.counters.record_miss();
				debug!("cache miss");
			}
		}

		let before = stat(&path).await;
		let bytes = fs::read(&path).await.map_err(|source| CacheError::Io {
			path: path.clone(),
			source,
		})?;
		let json: serde_json::Value =
			serde_json::from_slice(&bytes).map_err(|source| CacheError::Deserialize {
				path: path.clone(),
				source,
			})?;
		let value = decode(&path, json.clone())?;

		match settled(before, stat(&path).await) {
			Some(stamp) => self.insert(path, json, Some(stamp)).await,
			None => debug!("file changed or could not be stat'ed during read, not caching"),
		}

		Ok(value)
	}

	/// Serialize `value` to `path`, creating parent directories, and refresh
	/// the cache entry.
	///
	/// A failed stat after a successful write only degrades freshness
	/// tracking; the write itself succeeds.
	#[instrument(skip_all, fields(path = %path.as_ref().display()))]
	pub async fn write<T: Serialize + ?Sized>(&self, path: impl AsRef<Path>, value: &T) -> CacheResult<()> {
		let path = resolve(path.as_ref())?;

		if let Some(parent) = path.parent() {
			fs::create_dir_all(parent)
				.await
				.map_err(|source| CacheError::CreateDir {
					path: parent.to_path_buf(),
					source,
				})?;
		}

		let json = serde_json::to_value(value).map_err(|source| CacheError::Serialize {
			path: path.clone(),
			source,
		})?;
		let bytes = serde_json::to_vec_pretty(&json).map_err(|source| CacheError::Serialize {
			path: path.clone(),
			source,
		})?;

		fs::write(&path, &bytes)
			.await
			.map_err(|source| CacheError::Io {
				path: path.clone(),
				source,
			})?;

		let stamp = match stat(&path).await {
			Ok(stamp) => Some(stamp),
			Err(e) => {
				warn!(path = %path.display(), error = %e, "stat failed after write, cache freshness unknown until next read");
				None
			}
		};

		self.insert(path, json, stamp).await;
		debug!(bytes = bytes.len(), "wrote file and refreshed cache");
		Ok(())
	}

	/// Drop the entry for `path`, if any. The file is untouched.
	pub async fn invalidate(&self, path: impl AsRef<Path>) -> bool {
		let Ok(path) = resolve(path.as_ref()) else {
			return false;
		};
		self.entries.write().await.remove(&path).is_some()
	}

	pub async fn clear(&self) {
		let mut entries = self.entries.write().await;
		let count = entries.len();
		entries.clear();
		debug!(count, "cache cleared");
	}

	pub async fn contains(&self, path: impl AsRef<Path>) -> bool {
		match resolve(path.as_ref()) {
			Ok(path) => self.entries.read().await.contains_key(&path),
			Err(_) => false,
		}
	}

	pub async fn len(&self) -> usize {
		self.entries.read().await.len()
	}

	pub async fn is_empty(&self) -> bool {
		self.entries.read().await.is_empty()
	}

	pub async fn stats(&self) -> CacheStats {
		let size = self.len().await;
		self.counters.snapshot(size)
	}

	fn tick(&self) -> u64 {
		self.clock.fetch_add(1, Ordering::Relaxed) + 1
	}

	async fn touch(&self, path: &Path) {
		let tick = self.tick();
		if let Some(entry) = self.entries.write().await.get_mut(path) {
			entry.last_read = tick;
		}
	}

	async fn insert(&self, path: PathBuf, value: serde_json::Value, stamp: Option<FileStamp>) {
		let tick = self.tick();
		let mut entries = self.entries.write().await;
		entries.insert(path, CacheEntry::new(value, stamp, tick));

		let evicted = eviction::enforce(&mut *entries, self.config.max_size);
		if evicted > 0 {
			self.counters.record_evictions(evicted);
			debug!(evicted, remaining = entries.len(), "evicted least recently read entries");
		}
	}
}

fn resolve(path: &Path) -> CacheResult<PathBuf> {
	std::path::absolute(path).map_err(|source| CacheError::PathResolution {
		path: path.to_path_buf(),
		source,
	})
}

async fn stat(path: &Path) -> std::io::Result<FileStamp> {
	let metadata = fs::metadata(path).await?;
	FileStamp::from_metadata(&metadata)
}

/// The stamp to cache with bytes read between `before` and `after`, if the
/// file provably did not change in that window.
fn settled(before: std::io::Result<FileStamp>, after: std::io::Result<FileStamp>) -> Option<FileStamp> {
	match (before, after) {
		(Ok(before), Ok(after)) if before == after => Some(before),
		_ => None,
	}
}

fn decode<T: DeserializeOwned>(path: &Path, value: serde_json::Value) -> CacheResult<T> {
	serde_json::from_value(value).map_err(|source| CacheError::Deserialize {
		path: path.to_path_buf(),
		source,
	})
}
