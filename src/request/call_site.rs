//! Call site coordinating execution, caching, cancellation, and retries for one bound operation.
//!
//! A call site allows at most one request in flight. Starting a new execution cancels the
//! previous request's token and bumps a generation counter; a settled request whose generation
//! is no longer current is reported as [`ApiError::Cancelled`] and never touches state. Once
//! [`CallSite::teardown`] runs, the liveness token is cancelled and every later result is
//! reported as [`ApiError::TornDown`].

// std
use std::{
	future::Future,
	pin::Pin,
	sync::{
		Mutex, PoisonError,
		atomic::{AtomicU64, AtomicUsize, Ordering},
	},
};
// crates.io
use serde_json::Value;
use tokio::{
	sync::{RwLock, watch},
	task::JoinHandle,
	time,
};
use tokio_util::sync::CancellationToken;
// self
use crate::{
	_prelude::*,
	cache::store::ResponseCache,
	error::ApiError,
	http::{client::ApiResult, retry::RetryDecision},
	metrics::{self, RequestMetrics},
	request::{options::RequestOptions, state::RequestState},
};

/// Boxed future produced by a bound operation.
pub type OperationFuture<T> = Pin<Box<dyn Future<Output = ApiResult<T>> + Send>>;

type Operation<A, T> = Arc<dyn Fn(A) -> OperationFuture<T> + Send + Sync>;
type OutcomeFuture<T> = Pin<Box<dyn Future<Output = Outcome<T>> + Send>>;

/// Result of a single `execute` call.
#[derive(Clone, Debug, PartialEq)]
pub enum Outcome<T> {
	/// Data was produced, either by the operation or from the cache.
	Fetched {
		/// Response data.
		data: T,
		/// Whether the data came from the response cache.
		from_cache: bool,
	},
	/// The operation failed and a retry has been scheduled.
	Retrying {
		/// Failure that triggered the retry.
		error: ApiError,
		/// One-based number of the scheduled retry.
		attempt: u32,
		/// Backoff before the retry fires.
		delay: Duration,
	},
	/// The execution ended without data.
	Failed(ApiError),
}
impl<T> Outcome<T> {
	/// Whether data was produced.
	pub fn is_success(&self) -> bool {
		matches!(self, Self::Fetched { .. })
	}

	/// Whether a retry is pending.
	pub fn is_retrying(&self) -> bool {
		matches!(self, Self::Retrying { .. })
	}

	/// Whether the data was served from the cache.
	pub fn from_cache(&self) -> bool {
		matches!(self, Self::Fetched { from_cache: true, .. })
	}

	/// Borrow the produced data.
	pub fn data(&self) -> Option<&T> {
		match self {
			Self::Fetched { data, .. } => Some(data),
			_ => None,
		}
	}

	/// Borrow the failure, including the one behind a pending retry.
	pub fn error(&self) -> Option<&ApiError> {
		match self {
			Self::Fetched { .. } => None,
			Self::Retrying { error, .. } | Self::Failed(error) => Some(error),
		}
	}

	/// Collapse into a `Result`, treating a pending retry as a failure.
	pub fn into_result(self) -> ApiResult<T> {
		match self {
			Self::Fetched { data, .. } => Ok(data),
			Self::Retrying { error, .. } | Self::Failed(error) => Err(error),
		}
	}
}

/// Handle to one call site.
///
/// Clones share the same state. When the last handle is dropped the call site is torn down.
pub struct CallSite<A, T> {
	inner: Arc<CallSiteInner<A, T>>,
}
impl<A, T> CallSite<A, T>
where
	A: Clone + Send + Sync + 'static,
	T: Clone + Send + Sync + 'static,
{
	/// Bind `operation` with the supplied options.
	pub fn new<F, Fut>(operation: F, options: RequestOptions<T>) -> Result<Self>
	where
		F: Fn(A) -> Fut + Send + Sync + 'static,
		Fut: Future<Output = ApiResult<T>> + Send + 'static,
	{
		options.validate()?;

		let operation: Operation<A, T> =
			Arc::new(move |args| -> OperationFuture<T> { Box::pin(operation(args)) });
		let label: Arc<str> = Arc::from(options.label.as_deref().unwrap_or("anonymous"));
		let (state, _) = watch::channel(RequestState::new(options.default_data.clone()));
		let cache = ResponseCache::new(options.cache_duration);

		Ok(Self {
			inner: Arc::new(CallSiteInner {
				label,
				operation,
				cache: RwLock::new(cache),
				state,
				generation: AtomicU64::new(0),
				in_flight: Mutex::new(None),
				retry_timer: Mutex::new(None),
				dependencies: Mutex::new(None),
				liveness: CancellationToken::new(),
				handles: AtomicUsize::new(1),
				metrics: RequestMetrics::new(),
				options,
			}),
		})
	}

	/// Run the bound operation, superseding any execution already in flight.
	#[tracing::instrument(skip(self, args), fields(call_site = %self.inner.label))]
	pub async fn execute(&self, args: A) -> Outcome<T> {
		self.inner.abort_retry_timer();
		self.inner.run(args).await
	}

	/// Alias for [`execute`](Self::execute); still answered from the cache when it holds a live
	/// entry.
	pub async fn refetch(&self, args: A) -> Outcome<T> {
		self.execute(args).await
	}

	/// Execute once on mount when the call site is immediate.
	pub async fn mount(&self, args: A) -> Option<Outcome<T>> {
		if self.inner.options.immediate { Some(self.execute(args).await) } else { None }
	}

	/// Record a new dependency set; re-executes when it changed and the call site is immediate.
	///
	/// Dependencies compare element-wise by value.
	pub async fn update_dependencies(
		&self,
		dependencies: Vec<Value>,
		args: A,
	) -> Option<Outcome<T>> {
		let changed = {
			let mut current = lock(&self.inner.dependencies);

			if current.as_ref() == Some(&dependencies) {
				false
			} else {
				*current = Some(dependencies);

				true
			}
		};

		if changed && self.inner.options.immediate {
			Some(self.execute(args).await)
		} else {
			None
		}
	}

	/// Cancel the request in flight, if any, without starting another.
	pub fn cancel(&self) {
		self.inner.abort_retry_timer();
		self.inner.generation.fetch_add(1, Ordering::SeqCst);

		if let Some(token) = lock(&self.inner.in_flight).take() {
			token.cancel();
		}
	}

	/// Tear the call site down; later results are discarded as [`ApiError::TornDown`].
	///
	/// Idempotent.
	pub fn teardown(&self) {
		self.inner.teardown();
	}

	/// Whether the call site has been torn down.
	pub fn is_torn_down(&self) -> bool {
		self.inner.liveness.is_cancelled()
	}

	/// Drop the cached entry for `key`, forcing the next execution to hit the operation.
	pub async fn clear_cache(&self, key: &str) -> bool {
		self.inner.cache.write().await.remove(key)
	}

	/// Drop every cached entry.
	pub async fn invalidate_cache(&self) {
		self.inner.cache.write().await.clear();
	}

	/// Current state snapshot.
	pub fn state(&self) -> RequestState<T> {
		self.inner.state.borrow().clone()
	}

	/// Subscribe to state changes.
	pub fn subscribe(&self) -> watch::Receiver<RequestState<T>> {
		self.inner.state.subscribe()
	}

	/// Whether a retry is underway and more remain in the budget.
	pub fn is_retrying(&self) -> bool {
		let attempt = self.inner.state.borrow().retry_attempt;

		attempt > 0 && attempt < self.inner.options.retry.retry_count
	}

	/// Name used in logs and metrics.
	pub fn label(&self) -> &str {
		&self.inner.label
	}

	/// Options the call site was created with.
	pub fn options(&self) -> &RequestOptions<T> {
		&self.inner.options
	}

	/// Per-call-site telemetry.
	pub fn metrics(&self) -> Arc<RequestMetrics> {
		self.inner.metrics.clone()
	}
}
impl<A, T> Clone for CallSite<A, T> {
	fn clone(&self) -> Self {
		self.inner.handles.fetch_add(1, Ordering::SeqCst);

		Self { inner: self.inner.clone() }
	}
}
impl<A, T> Drop for CallSite<A, T> {
	fn drop(&mut self) {
		if self.inner.handles.fetch_sub(1, Ordering::SeqCst) == 1 {
			self.inner.teardown();
		}
	}
}
impl<A, T> std::fmt::Debug for CallSite<A, T> {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("CallSite")
			.field("label", &self.inner.label)
			.field("options", &self.inner.options)
			.field("torn_down", &self.inner.liveness.is_cancelled())
			.finish()
	}
}

struct CallSiteInner<A, T> {
	label: Arc<str>,
	operation: Operation<A, T>,
	options: RequestOptions<T>,
	cache: RwLock<ResponseCache<T>>,
	state: watch::Sender<RequestState<T>>,
	generation: AtomicU64,
	in_flight: Mutex<Option<CancellationToken>>,
	retry_timer: Mutex<Option<JoinHandle<()>>>,
	dependencies: Mutex<Option<Vec<Value>>>,
	liveness: CancellationToken,
	handles: AtomicUsize,
	metrics: Arc<RequestMetrics>,
}
impl<A, T> CallSiteInner<A, T>
where
	A: Clone + Send + Sync + 'static,
	T: Clone + Send + Sync + 'static,
{
	async fn run(self: &Arc<Self>, args: A) -> Outcome<T> {
		if self.liveness.is_cancelled() {
			return Outcome::Failed(ApiError::TornDown);
		}

		let (generation, token) = self.begin_request();

		if let Some(key) = self.options.cache_key.as_deref() {
			let cached = { self.cache.write().await.get(key) };

			if let Some(data) = cached {
				if let Some(discarded) = self.discarded(generation) {
					return Outcome::Failed(discarded);
				}

				tracing::debug!(key, "serving response from cache");

				self.metrics.record_hit();
				metrics::record_cache_hit(&self.label);
				self.finish_request(generation);
				self.state.send_modify(|state| state.succeed(data.clone(), true));
				self.notify_success(&data);

				return Outcome::Fetched { data, from_cache: true };
			}
		}

		self.metrics.record_miss();
		metrics::record_cache_miss(&self.label);
		self.state.send_modify(RequestState::begin_loading);

		let start = Instant::now();
		let future = (self.operation)(args.clone());
		let result = tokio::select! {
			biased;
			_ = token.cancelled() => None,
			result = future => Some(result),
		};
		let elapsed = start.elapsed();

		if let Some(discarded) = self.discarded(generation) {
			tracing::debug!(error = %discarded, "discarding settled request");

			return Outcome::Failed(discarded);
		}

		let Some(result) = result else {
			return Outcome::Failed(ApiError::Cancelled);
		};

		self.finish_request(generation);
		self.metrics.record_duration(elapsed);
		metrics::record_request_duration(&self.label, elapsed);

		match result {
			Ok(data) => {
				if let Some(key) = self.options.cache_key.as_deref() {
					self.cache.write().await.insert(key, data.clone());
				}

				self.state.send_modify(|state| state.succeed(data.clone(), false));
				self.notify_success(&data);

				Outcome::Fetched { data, from_cache: false }
			},
			Err(error) => self.handle_failure(args, error),
		}
	}

	fn handle_failure(self: &Arc<Self>, args: A, error: ApiError) -> Outcome<T> {
		if error.is_silent() {
			return Outcome::Failed(error);
		}

		let retries_used = self.state.borrow().retry_attempt;

		match self.options.retry.decide(retries_used) {
			RetryDecision::Retry { attempt, delay } => {
				tracing::info!(
					attempt,
					retry_count = self.options.retry.retry_count,
					?delay,
					error = %error,
					"retrying failed request"
				);

				self.metrics.record_retry();
				metrics::record_retry(&self.label);
				self.state.send_modify(|state| state.fail(error.clone(), attempt));
				self.schedule_retry(args, delay);

				Outcome::Retrying { error, attempt, delay }
			},
			RetryDecision::Exhausted => {
				tracing::warn!(error = %error, "request failed");

				self.metrics.record_failure();
				metrics::record_failure(&self.label);
				self.state.send_modify(|state| state.fail(error.clone(), 0));

				if let Some(callback) = &self.options.on_error {
					callback(&error);
				}

				Outcome::Failed(error)
			},
		}
	}

	fn schedule_retry(self: &Arc<Self>, args: A, delay: Duration) {
		let inner = self.clone();
		let handle = tokio::spawn(async move {
			tokio::select! {
				_ = inner.liveness.cancelled() => {},
				_ = time::sleep(delay) => {
					let _ = inner.clone().run_boxed(args).await;
				},
			}
		});

		*lock(&self.retry_timer) = Some(handle);
	}

	fn run_boxed(self: Arc<Self>, args: A) -> OutcomeFuture<T> {
		Box::pin(async move { self.run(args).await })
	}

	fn begin_request(&self) -> (u64, CancellationToken) {
		let token = self.liveness.child_token();
		let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;

		if let Some(previous) = lock(&self.in_flight).replace(token.clone()) {
			tracing::debug!("cancelling superseded request");

			previous.cancel();
		}

		(generation, token)
	}

	fn finish_request(&self, generation: u64) {
		let mut in_flight = lock(&self.in_flight);

		if self.generation.load(Ordering::SeqCst) == generation {
			in_flight.take();
		}
	}

	fn discarded(&self, generation: u64) -> Option<ApiError> {
		if self.liveness.is_cancelled() {
			Some(ApiError::TornDown)
		} else if self.generation.load(Ordering::SeqCst) != generation {
			Some(ApiError::Cancelled)
		} else {
			None
		}
	}

	fn notify_success(&self, data: &T) {
		if let Some(callback) = &self.options.on_success {
			callback(data);
		}
	}
}
impl<A, T> CallSiteInner<A, T> {
	fn abort_retry_timer(&self) {
		if let Some(timer) = lock(&self.retry_timer).take() {
			timer.abort();
		}
	}

	fn teardown(&self) {
		if self.liveness.is_cancelled() {
			return;
		}

		tracing::debug!(call_site = %self.label, "tearing down call site");

		self.liveness.cancel();
		self.abort_retry_timer();

		if let Some(token) = lock(&self.in_flight).take() {
			token.cancel();
		}
	}
}

fn lock<V>(mutex: &Mutex<V>) -> std::sync::MutexGuard<'_, V> {
	mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
