//! Per-call-site configuration.

// std
use std::fmt::{Debug, Formatter, Result as FmtResult};
// self
use crate::{
	_prelude::*,
	cache::store::DEFAULT_CACHE_DURATION,
	error::ApiError,
	http::retry::RetryPolicy,
};

/// Callback invoked with the data of every applied success.
pub type SuccessCallback<T> = Arc<dyn Fn(&T) + Send + Sync>;
/// Callback invoked with every terminal failure.
pub type ErrorCallback = Arc<dyn Fn(&ApiError) + Send + Sync>;

/// How a call site executes, caches, and retries its bound operation.
#[derive(Clone)]
pub struct RequestOptions<T> {
	/// Execute on mount and whenever the dependency set changes.
	pub immediate: bool,
	/// Key under which successful responses are cached; `None` disables caching.
	pub cache_key: Option<String>,
	/// Lifetime of cached responses.
	pub cache_duration: Duration,
	/// Retry schedule applied to failures.
	pub retry: RetryPolicy,
	/// Data exposed before the first success.
	pub default_data: Option<T>,
	/// Name used in logs and metrics.
	pub label: Option<String>,
	/// Invoked after each applied success.
	pub on_success: Option<SuccessCallback<T>>,
	/// Invoked after each terminal failure.
	pub on_error: Option<ErrorCallback>,
}
impl<T> RequestOptions<T> {
	/// Defaults: immediate, uncached, no retries.
	pub fn new() -> Self {
		Self {
			immediate: true,
			cache_key: None,
			cache_duration: DEFAULT_CACHE_DURATION,
			retry: RetryPolicy::default(),
			default_data: None,
			label: None,
			on_success: None,
			on_error: None,
		}
	}

	/// Toggle automatic execution.
	pub fn immediate(mut self, immediate: bool) -> Self {
		self.immediate = immediate;

		self
	}

	/// Cache successful responses under `key`.
	pub fn cache_key(mut self, key: impl Into<String>) -> Self {
		self.cache_key = Some(key.into());

		self
	}

	/// Override the cache lifetime.
	pub fn cache_duration(mut self, duration: Duration) -> Self {
		self.cache_duration = duration;

		self
	}

	/// Retry `retry_count` times with exponential backoff from `retry_delay`.
	pub fn retry(mut self, retry_count: u32, retry_delay: Duration) -> Self {
		self.retry = RetryPolicy::new(retry_count, retry_delay);

		self
	}

	/// Seed the state with `data`.
	pub fn default_data(mut self, data: T) -> Self {
		self.default_data = Some(data);

		self
	}

	/// Name this call site in logs and metrics.
	pub fn label(mut self, label: impl Into<String>) -> Self {
		self.label = Some(label.into());

		self
	}

	/// Register a success callback.
	pub fn on_success<F>(mut self, callback: F) -> Self
	where
		F: Fn(&T) + Send + Sync + 'static,
	{
		self.on_success = Some(Arc::new(callback));

		self
	}

	/// Register a failure callback.
	pub fn on_error<F>(mut self, callback: F) -> Self
	where
		F: Fn(&ApiError) + Send + Sync + 'static,
	{
		self.on_error = Some(Arc::new(callback));

		self
	}

	/// Validate invariants for the options.
	pub fn validate(&self) -> Result<()> {
		if let Some(key) = &self.cache_key
			&& key.trim().is_empty()
		{
			return Err(Error::Validation {
				field: "cache_key",
				reason: "Must not be blank; omit it to disable caching.".into(),
			});
		}
		if self.cache_key.is_some() && self.cache_duration.is_zero() {
			return Err(Error::Validation {
				field: "cache_duration",
				reason: "Must be greater than zero when caching is enabled.".into(),
			});
		}

		self.retry.validate()
	}
}
impl<T> Default for RequestOptions<T> {
	fn default() -> Self {
		Self::new()
	}
}
impl<T> Debug for RequestOptions<T> {
	fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
		f.debug_struct("RequestOptions")
			.field("immediate", &self.immediate)
			.field("cache_key", &self.cache_key)
			.field("cache_duration", &self.cache_duration)
			.field("retry", &self.retry)
			.field("has_default_data", &self.default_data.is_some())
			.field("label", &self.label)
			.field("on_success", &self.on_success.is_some())
			.field("on_error", &self.on_error.is_some())
			.finish()
	}
}
