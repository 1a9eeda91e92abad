// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Least-recently-read eviction.
//!
//! A linear scan and sort over the map. Fine for a few hundred entries;
//! the store only calls it when the bound is exceeded.

use std::collections::HashMap;
use std::hash::Hash;

use crate::entry::CacheEntry;

/// Number of entries to drop once `max_size` is exceeded: a fifth of the
/// bound, at least one.
pub fn batch_size(max_size: usize) -> usize {
	(max_size / 5).max(1)
}

/// Keys of the `count` entries with the oldest last-read tick.
pub fn victims<K: Clone + Eq + Hash>(entries: &HashMap<K, CacheEntry>, count: usize) -> Vec<K> {
	let mut by_age: Vec<(&K, u64)> = entries.iter().map(|(k, e)| (k, e.last_read)).collect();
	by_age.sort_by_key(|(_, tick)| *tick);
	by_age
		.into_iter()
		.take(count)
		.map(|(k, _)| k.clone())
		.collect()
}

/// Evict a batch if `entries` holds more than `max_size`. Returns how many
/// were removed.
pub fn enforce<K: Clone + Eq + Hash>(entries: &mut HashMap<K, CacheEntry>, max_size: usize) -> usize {
	if entries.len() <= max_size {
		return 0;
	}

	let overflow = entries.len() - max_size;
	let count = batch_size(max_size).max(overflow);
	let keys = victims(entries, count);
	for key in &keys {
		entries.remove(key);
	}
	keys.len()
}

#[cfg(test)]
mod tests {
	use super::*;
	use serde_json::Value;

	fn entries(ticks: &[u64]) -> HashMap<usize, CacheEntry> {
		ticks
			.iter()
			.enumerate()
			.map(|(i, tick)| (i, CacheEntry::new(Value::Null, None, *tick)))
			.collect()
	}

	#[test]
	fn batch_is_a_fifth_with_minimum_one() {
		assert_eq!(batch_size(500), 100);
		assert_eq!(batch_size(5), 1);
		assert_eq!(batch_size(4), 1);
		assert_eq!(batch_size(0), 1);
	}

	#[test]
	fn victims_are_oldest_first() {
		let map = entries(&[30, 10, 20, 40]);
		assert_eq!(victims(&map, 2), vec![1, 2]);
	}

	#[test]
	fn within_bound_evicts_nothing() {
		let mut map = entries(&[1, 2, 3]);
		assert_eq!(enforce(&mut map, 3), 0);
		assert_eq!(map.len(), 3);
	}

	#[test]
	fn over_bound_evicts_a_batch() {
		let mut map = entries(&(0..11).collect::<Vec<_>>());
		assert_eq!(enforce(&mut map, 10), 2);
		assert_eq!(map.len(), 9);
		assert!(!map.contains_key(&0));
		assert!(!map.contains_key(&1));
	}
}
