//! Cache entry definitions.

// self
use crate::_prelude::*;

/// Last successful response stored under a caller-chosen key.
#[derive(Clone, Debug)]
pub struct CacheEntry<T> {
	key: Arc<str>,
	value: T,
	stored_at: Instant,
	stored_at_wallclock: DateTime<Utc>,
}
impl<T> CacheEntry<T> {
	/// Create an entry stamped with the current time.
	pub fn new(key: impl Into<Arc<str>>, value: T) -> Self {
		Self::stored_at(key, value, Instant::now())
	}

	/// Create an entry stamped with an explicit instant.
	pub fn stored_at(key: impl Into<Arc<str>>, value: T, stored_at: Instant) -> Self {
		Self { key: key.into(), value, stored_at, stored_at_wallclock: Utc::now() }
	}

	/// Cache key for this entry.
	pub fn key(&self) -> &str {
		&self.key
	}

	/// Cached response value.
	pub fn value(&self) -> &T {
		&self.value
	}

	/// Monotonic instant at which the entry was written.
	pub fn stored_instant(&self) -> Instant {
		self.stored_at
	}

	/// Wall-clock timestamp at which the entry was written.
	pub fn stored_wallclock(&self) -> DateTime<Utc> {
		self.stored_at_wallclock
	}

	/// Age of the entry relative to `now`.
	pub fn age(&self, now: Instant) -> Duration {
		now.saturating_duration_since(self.stored_at)
	}

	/// Whether the entry has outlived `duration`.
	///
	/// An entry is still live when its age equals the duration exactly.
	pub fn is_expired(&self, now: Instant, duration: Duration) -> bool {
		self.age(now) > duration
	}

	/// Consume the entry and return its value.
	pub fn into_value(self) -> T {
		self.value
	}
}
