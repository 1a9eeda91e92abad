// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! A staleness-aware cache over JSON files.
//!
//! [`CacheStore`] maps absolute paths to parsed JSON plus a snapshot of the
//! file's modification time and size. A hit is served only while the file
//! still matches that snapshot and the entry is inside the expiration window;
//! anything else goes back to disk. When the map grows past
//! [`CacheConfig::max_size`] the least recently read fifth is evicted.
//!
//! ```no_run
//! # async fn demo() -> quill_file_cache::CacheResult<()> {
//! use quill_file_cache::{CacheConfig, CacheStore};
//!
//! let cache = CacheStore::new(CacheConfig::default());
//! cache.write("data/scene.json", &serde_json::json!({"title": "Opening"})).await?;
//! let scene: serde_json::Value = cache.read("data/scene.json").await?;
//! # Ok(())
//! # }
//! ```

pub mod entry;
pub mod error;
pub mod eviction;
pub mod stats;
pub mod store;

pub use entry::{CacheEntry, FileStamp};
pub use error::{CacheError, CacheResult};
pub use stats::CacheStats;
pub use store::{CacheConfig, CacheStore, DEFAULT_EXPIRATION, DEFAULT_MAX_SIZE};
