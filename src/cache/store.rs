//! Keyed response store owned by a single call site.

// std
use std::collections::HashMap;
// self
use crate::{_prelude::*, cache::entry::CacheEntry};

/// Default lifetime of a cached response.
pub const DEFAULT_CACHE_DURATION: Duration = Duration::from_secs(5 * 60);

/// Mapping from cache key to the last successful response.
///
/// Expired entries are removed by the read that discovers them; nothing sweeps the map in the
/// background.
#[derive(Clone, Debug)]
pub struct ResponseCache<T> {
	duration: Duration,
	entries: HashMap<Arc<str>, CacheEntry<T>>,
}
impl<T> ResponseCache<T>
where
	T: Clone,
{
	/// Create an empty cache whose entries live for `duration`.
	pub fn new(duration: Duration) -> Self {
		Self { duration, entries: HashMap::new() }
	}

	/// Configured entry lifetime.
	pub fn duration(&self) -> Duration {
		self.duration
	}

	/// Look up a live entry, evicting it when it has expired.
	pub fn get(&mut self, key: &str) -> Option<T> {
		self.get_at(key, Instant::now())
	}

	/// Look up a live entry relative to an explicit instant.
	pub fn get_at(&mut self, key: &str, now: Instant) -> Option<T> {
		let expired = self.entries.get(key)?.is_expired(now, self.duration);

		if expired {
			tracing::debug!(key, "cache entry expired; evicting");

			self.entries.remove(key);

			return None;
		}

		self.entries.get(key).map(|entry| entry.value().clone())
	}

	/// Store a value under `key`, replacing any previous entry.
	pub fn insert(&mut self, key: &str, value: T) {
		self.insert_at(key, value, Instant::now());
	}

	/// Store a value with an explicit timestamp.
	pub fn insert_at(&mut self, key: &str, value: T, now: Instant) {
		let key: Arc<str> = Arc::from(key);

		self.entries.insert(key.clone(), CacheEntry::stored_at(key, value, now));
	}

	/// Drop the entry for `key`, returning whether one existed.
	pub fn remove(&mut self, key: &str) -> bool {
		self.entries.remove(key).is_some()
	}

	/// Drop every entry.
	pub fn clear(&mut self) {
		self.entries.clear();
	}

	/// Number of stored entries, including ones not yet found to be expired.
	pub fn len(&self) -> usize {
		self.entries.len()
	}

	/// Whether the cache holds no entries.
	pub fn is_empty(&self) -> bool {
		self.entries.is_empty()
	}
}
impl<T> Default for ResponseCache<T>
where
	T: Clone,
{
	fn default() -> Self {
		Self::new(DEFAULT_CACHE_DURATION)
	}
}
