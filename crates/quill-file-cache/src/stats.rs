// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Cache counters.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Counters updated with relaxed atomics; readers get an approximate,
/// monotonically increasing view.
#[derive(Debug, Default)]
pub(crate) struct Counters {
	hits: AtomicU64,
	misses: AtomicU64,
	stale_reloads: AtomicU64,
	evictions: AtomicU64,
}

impl Counters {
	pub fn record_hit(&self) {
		self.hits.fetch_add(1, Ordering::Relaxed);
	}

	pub fn record_miss(&self) {
		self.misses.fetch_add(1, Ordering::Relaxed);
	}

	pub fn record_stale(&self) {
		self.stale_reloads.fetch_add(1, Ordering::Relaxed);
	}

	pub fn record_evictions(&self, count: usize) {
		self.evictions.fetch_add(count as u64, Ordering::Relaxed);
	}

	pub fn snapshot(&self, size: usize) -> CacheStats {
		CacheStats {
			hits: self.hits.load(Ordering::Relaxed),
			misses: self.misses.load(Ordering::Relaxed),
			stale_reloads: self.stale_reloads.load(Ordering::Relaxed),
			evictions: self.evictions.load(Ordering::Relaxed),
			size,
		}
	}
}

/// Point-in-time cache statistics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
	pub hits: u64,
	pub misses: u64,
	/// Reads that found an entry but had to go back to disk.
	pub stale_reloads: u64,
	pub evictions: u64,
	pub size: usize,
}

impl CacheStats {
	/// Fraction of reads served from memory, 0.0 when nothing was read.
	pub fn hit_rate(&self) -> f64 {
		let total = self.hits + self.misses + self.stale_reloads;
		if total == 0 {
			0.0
		} else {
			self.hits as f64 / total as f64
		}
	}
}
