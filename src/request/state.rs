//! Observable request state for a call site.

// self
use crate::error::ApiError;

/// Lifecycle phase of a call site.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum RequestStatus {
	/// Nothing has been executed yet.
	#[default]
	Idle,
	/// An execution is in flight.
	Loading,
	/// The last execution produced data.
	Success,
	/// The last execution failed (possibly with a retry pending).
	Error,
}

/// Snapshot published to subscribers after every state change.
#[derive(Clone, Debug, PartialEq)]
pub struct RequestState<T> {
	/// Current lifecycle phase.
	pub status: RequestStatus,
	/// Last successful response, or the configured default.
	pub data: Option<T>,
	/// Last failure message; cleared when a new execution starts.
	pub error: Option<ApiError>,
	/// Retries consumed since the last success.
	pub retry_attempt: u32,
	/// Whether `data` was served from the response cache.
	pub from_cache: bool,
}
impl<T> RequestState<T> {
	/// Fresh state seeded with `default_data`.
	pub fn new(default_data: Option<T>) -> Self {
		Self {
			status: RequestStatus::Idle,
			data: default_data,
			error: None,
			retry_attempt: 0,
			from_cache: false,
		}
	}

	/// Whether an execution is in flight.
	pub fn is_loading(&self) -> bool {
		self.status == RequestStatus::Loading
	}

	pub(crate) fn begin_loading(&mut self) {
		self.status = RequestStatus::Loading;
		self.error = None;
	}

	pub(crate) fn succeed(&mut self, data: T, from_cache: bool) {
		self.status = RequestStatus::Success;
		self.data = Some(data);
		self.error = None;
		self.retry_attempt = 0;
		self.from_cache = from_cache;
	}

	pub(crate) fn fail(&mut self, error: ApiError, retry_attempt: u32) {
		self.status = RequestStatus::Error;
		self.error = Some(error);
		self.retry_attempt = retry_attempt;
	}
}
impl<T> Default for RequestState<T> {
	fn default() -> Self {
		Self::new(None)
	}
}
