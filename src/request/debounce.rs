//! Debounced call site: the operation runs only after its input has been stable for a delay.

// std
use std::{
	future::Future,
	sync::{Mutex, PoisonError},
};
// crates.io
use tokio::{sync::watch, task::JoinHandle, time};
// self
use crate::{
	_prelude::*,
	http::client::ApiResult,
	request::{
		call_site::{CallSite, Outcome},
		options::RequestOptions,
	},
};

/// Default stability window.
pub const DEFAULT_DEBOUNCE_DELAY: Duration = Duration::from_millis(500);

/// Raw and committed input of a debounced call site.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DebounceState<A> {
	/// Latest input supplied by the caller.
	pub value: A,
	/// Input that survived the stability window.
	pub debounced_value: A,
}
impl<A> DebounceState<A>
where
	A: PartialEq,
{
	/// Whether the latest input has not yet been committed.
	pub fn is_debouncing(&self) -> bool {
		self.value != self.debounced_value
	}
}

/// Call site whose executions trail input changes by a fixed delay.
///
/// Empty input (`A::default()`) is committed but never executed, so clearing a search box does
/// not issue a request.
pub struct DebouncedCallSite<A, T> {
	site: CallSite<A, T>,
	delay: Duration,
	input: Arc<watch::Sender<DebounceState<A>>>,
	timer: Mutex<Option<JoinHandle<()>>>,
}
impl<A, T> DebouncedCallSite<A, T>
where
	A: Clone + Default + PartialEq + Send + Sync + 'static,
	T: Clone + Send + Sync + 'static,
{
	/// Bind `operation` with `initial` as both raw and committed input.
	pub fn new<F, Fut>(
		operation: F,
		initial: A,
		delay: Duration,
		options: RequestOptions<T>,
	) -> Result<Self>
	where
		F: Fn(A) -> Fut + Send + Sync + 'static,
		Fut: Future<Output = ApiResult<T>> + Send + 'static,
	{
		if delay.is_zero() {
			return Err(Error::Validation {
				field: "debounce.delay",
				reason: "Must be greater than zero.".into(),
			});
		}

		let site = CallSite::new(operation, options)?;
		let (input, _) =
			watch::channel(DebounceState { value: initial.clone(), debounced_value: initial });

		Ok(Self { site, delay, input: Arc::new(input), timer: Mutex::new(None) })
	}

	/// Execute for the initial input when it is non-empty and the call site is immediate.
	pub async fn mount(&self) -> Option<Outcome<T>> {
		let value = self.input.borrow().debounced_value.clone();

		if value == A::default() { None } else { self.site.mount(value).await }
	}

	/// Supply new input, restarting the stability window.
	pub fn set_input(&self, value: A) {
		self.input.send_modify(|state| state.value = value.clone());

		let site = self.site.clone();
		let input = self.input.clone();
		let delay = self.delay;
		let immediate = self.site.options().immediate;
		let handle = tokio::spawn(async move {
			time::sleep(delay).await;

			let changed = input.send_if_modified(|state| {
				if state.debounced_value == value {
					false
				} else {
					state.debounced_value = value.clone();

					true
				}
			});

			if changed && immediate && value != A::default() {
				tracing::debug!(call_site = site.label(), "debounced input committed");

				// Detached: later input aborts only the stability window.
				tokio::spawn(async move {
					site.execute(value).await;
				});
			}
		});

		let previous = self.timer.lock().unwrap_or_else(PoisonError::into_inner).replace(handle);

		if let Some(previous) = previous {
			previous.abort();
		}
	}

	/// Whether an input change is waiting for the stability window.
	pub fn is_debouncing(&self) -> bool {
		self.input.borrow().is_debouncing()
	}

	/// Input that last survived the stability window.
	pub fn debounced_value(&self) -> A {
		self.input.borrow().debounced_value.clone()
	}

	/// Subscribe to input changes.
	pub fn subscribe_input(&self) -> watch::Receiver<DebounceState<A>> {
		self.input.subscribe()
	}

	/// Underlying call site, for request state and manual execution.
	pub fn call_site(&self) -> &CallSite<A, T> {
		&self.site
	}

	/// Abort the pending window and tear the call site down.
	pub fn teardown(&self) {
		if let Some(timer) = self.timer.lock().unwrap_or_else(PoisonError::into_inner).take() {
			timer.abort();
		}

		self.site.teardown();
	}
}
impl<A, T> Drop for DebouncedCallSite<A, T> {
	fn drop(&mut self) {
		if let Some(timer) = self.timer.lock().unwrap_or_else(PoisonError::into_inner).take() {
			timer.abort();
		}
	}
}
