//! Page-addressed call sites and the shapes shared with the infinite list.

// std
use std::future::Future;
// crates.io
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
// self
use crate::{
	_prelude::*,
	http::{client::ApiResult, retry::RetryPolicy},
	request::{
		call_site::{CallSite, Outcome},
		options::{ErrorCallback, RequestOptions},
	},
};

/// Page requested when none is configured.
pub const DEFAULT_INITIAL_PAGE: u32 = 1;
/// Items per page when none is configured.
pub const DEFAULT_PAGE_SIZE: u32 = 10;

/// Arguments handed to a paged operation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct PageRequest {
	/// One-based page number.
	pub page: u32,
	/// Requested page size.
	pub limit: u32,
}

/// Page envelope returned by list endpoints.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", bound(deserialize = "T: Deserialize<'de>"))]
pub struct PageResponse<T> {
	/// Items on this page.
	#[serde(default, alias = "data")]
	pub items: Vec<T>,
	/// Server-provided page count.
	#[serde(default, alias = "total_pages")]
	pub total_pages: Option<u32>,
	/// Server-provided item count.
	#[serde(default)]
	pub total: u64,
}
impl<T> PageResponse<T> {
	/// Page count, preferring the server value and falling back to `ceil(total / page_size)`.
	pub fn page_count(&self, page_size: u32) -> u32 {
		match self.total_pages {
			Some(pages) if pages > 0 => pages,
			_ => {
				let pages = self.total.div_ceil(u64::from(page_size.max(1)));

				u32::try_from(pages).unwrap_or(u32::MAX)
			},
		}
	}
}

/// A settled page together with the request that produced it.
#[derive(Clone, Debug, PartialEq)]
pub struct FetchedPage<T> {
	/// Request the page answers.
	pub request: PageRequest,
	/// Decoded envelope.
	pub page: PageResponse<T>,
}

/// Configuration for paged call sites.
#[derive(Clone)]
pub struct PaginationOptions {
	/// First page loaded; also the page the infinite list resets to.
	pub initial_page: u32,
	/// Items requested per page.
	pub page_size: u32,
	/// Load the initial page on mount.
	pub immediate: bool,
	/// Retry schedule for page fetches.
	pub retry: RetryPolicy,
	/// Name used in logs and metrics.
	pub label: Option<String>,
	/// Invoked after each terminal failure.
	pub on_error: Option<ErrorCallback>,
}
impl PaginationOptions {
	/// Defaults: page 1, ten items, immediate, no retries.
	pub fn new() -> Self {
		Self {
			initial_page: DEFAULT_INITIAL_PAGE,
			page_size: DEFAULT_PAGE_SIZE,
			immediate: true,
			retry: RetryPolicy::default(),
			label: None,
			on_error: None,
		}
	}

	/// Start from `page`.
	pub fn initial_page(mut self, page: u32) -> Self {
		self.initial_page = page;

		self
	}

	/// Request `size` items per page.
	pub fn page_size(mut self, size: u32) -> Self {
		self.page_size = size;

		self
	}

	/// Toggle loading on mount.
	pub fn immediate(mut self, immediate: bool) -> Self {
		self.immediate = immediate;

		self
	}

	/// Retry failed page fetches.
	pub fn retry(mut self, retry_count: u32, retry_delay: Duration) -> Self {
		self.retry = RetryPolicy::new(retry_count, retry_delay);

		self
	}

	/// Name the call site.
	pub fn label(mut self, label: impl Into<String>) -> Self {
		self.label = Some(label.into());

		self
	}

	/// Observe terminal failures.
	pub fn on_error<F>(mut self, callback: F) -> Self
	where
		F: Fn(&crate::error::ApiError) + Send + Sync + 'static,
	{
		self.on_error = Some(Arc::new(callback));

		self
	}

	/// Validate page bounds.
	pub fn validate(&self) -> Result<()> {
		if self.initial_page == 0 {
			return Err(Error::Validation {
				field: "pagination.initial_page",
				reason: "Pages are numbered from 1.".into(),
			});
		}
		if self.page_size == 0 {
			return Err(Error::Validation {
				field: "pagination.page_size",
				reason: "Must be greater than zero.".into(),
			});
		}

		Ok(())
	}

	pub(crate) fn request_options<T>(&self) -> RequestOptions<T> {
		let mut options = RequestOptions::new().immediate(self.immediate);

		options.retry = self.retry.clone();
		options.label = self.label.clone();
		options.on_error = self.on_error.clone();

		options
	}
}
impl Default for PaginationOptions {
	fn default() -> Self {
		Self::new()
	}
}

/// Derived page bookkeeping.
#[derive(Clone, Debug, PartialEq)]
pub struct PaginationState<T> {
	/// Page whose items are exposed.
	pub current_page: u32,
	/// Known page count; zero until the first success.
	pub total_pages: u32,
	/// Known item count.
	pub total_items: u64,
	/// Items per page.
	pub page_size: u32,
	/// Items of the current page.
	pub items: Vec<T>,
}
impl<T> PaginationState<T> {
	fn new(current_page: u32, page_size: u32) -> Self {
		Self { current_page, total_pages: 0, total_items: 0, page_size, items: Vec::new() }
	}

	/// Whether a later page exists.
	pub fn has_next_page(&self) -> bool {
		self.current_page < self.total_pages
	}

	/// Whether an earlier page exists.
	pub fn has_prev_page(&self) -> bool {
		self.current_page > 1
	}

	/// Whether `page` lies within `[1, total_pages]`.
	pub fn contains(&self, page: u32) -> bool {
		page >= 1 && page <= self.total_pages
	}

	fn apply(&mut self, fetched: &FetchedPage<T>)
	where
		T: Clone,
	{
		self.current_page = fetched.request.page;
		self.total_pages = fetched.page.page_count(self.page_size);
		self.total_items = fetched.page.total;
		self.items = fetched.page.items.clone();
	}
}

/// Call site that exposes one page of a list at a time.
///
/// Navigation outside `[1, total_pages]` is ignored. The current page moves only once the
/// requested page has been fetched.
pub struct PaginatedCallSite<T> {
	site: CallSite<PageRequest, FetchedPage<T>>,
	state: Arc<watch::Sender<PaginationState<T>>>,
	page_size: u32,
}
impl<T> PaginatedCallSite<T>
where
	T: Clone + Send + Sync + 'static,
{
	/// Bind a paged `operation`.
	pub fn new<F, Fut>(operation: F, options: PaginationOptions) -> Result<Self>
	where
		F: Fn(PageRequest) -> Fut + Send + Sync + 'static,
		Fut: Future<Output = ApiResult<PageResponse<T>>> + Send + 'static,
	{
		options.validate()?;

		let (state, _) =
			watch::channel(PaginationState::new(options.initial_page, options.page_size));
		let state = Arc::new(state);
		let observer = state.clone();
		let request_options = options
			.request_options()
			.on_success(move |fetched: &FetchedPage<T>| {
				observer.send_modify(|state| state.apply(fetched));
			});
		let site = CallSite::new(
			move |request: PageRequest| {
				let future = operation(request);

				async move { future.await.map(|page| FetchedPage { request, page }) }
			},
			request_options,
		)?;

		Ok(Self { site, state, page_size: options.page_size })
	}

	/// Load the current page on mount when immediate.
	pub async fn mount(&self) -> Option<Outcome<FetchedPage<T>>> {
		let page = self.state.borrow().current_page;

		self.site.mount(self.request_for(page)).await
	}

	/// Fetch the current page.
	pub async fn load(&self) -> Outcome<FetchedPage<T>> {
		let page = self.state.borrow().current_page;

		self.fetch(page).await
	}

	/// Re-fetch the current page.
	pub async fn refetch(&self) -> Outcome<FetchedPage<T>> {
		self.load().await
	}

	/// Fetch `page`; returns `None` when it lies outside `[1, total_pages]`.
	pub async fn go_to_page(&self, page: u32) -> Option<Outcome<FetchedPage<T>>> {
		if !self.state.borrow().contains(page) {
			tracing::debug!(call_site = self.site.label(), page, "ignoring out-of-range page");

			return None;
		}

		Some(self.fetch(page).await)
	}

	/// Advance one page.
	pub async fn next_page(&self) -> Option<Outcome<FetchedPage<T>>> {
		let page = self.state.borrow().current_page.saturating_add(1);

		self.go_to_page(page).await
	}

	/// Step back one page.
	pub async fn prev_page(&self) -> Option<Outcome<FetchedPage<T>>> {
		let page = self.state.borrow().current_page.saturating_sub(1);

		self.go_to_page(page).await
	}

	/// Jump to page 1.
	pub async fn first_page(&self) -> Option<Outcome<FetchedPage<T>>> {
		self.go_to_page(1).await
	}

	/// Jump to the last known page.
	pub async fn last_page(&self) -> Option<Outcome<FetchedPage<T>>> {
		let page = self.state.borrow().total_pages;

		self.go_to_page(page).await
	}

	/// Whether a later page exists.
	pub fn has_next_page(&self) -> bool {
		self.state.borrow().has_next_page()
	}

	/// Whether an earlier page exists.
	pub fn has_prev_page(&self) -> bool {
		self.state.borrow().has_prev_page()
	}

	/// Current pagination snapshot.
	pub fn state(&self) -> PaginationState<T> {
		self.state.borrow().clone()
	}

	/// Subscribe to pagination changes.
	pub fn subscribe(&self) -> watch::Receiver<PaginationState<T>> {
		self.state.subscribe()
	}

	/// Underlying call site, for loading and error state.
	pub fn call_site(&self) -> &CallSite<PageRequest, FetchedPage<T>> {
		&self.site
	}

	/// Tear the call site down.
	pub fn teardown(&self) {
		self.site.teardown();
	}

	async fn fetch(&self, page: u32) -> Outcome<FetchedPage<T>> {
		self.site.execute(self.request_for(page)).await
	}

	fn request_for(&self, page: u32) -> PageRequest {
		PageRequest { page, limit: self.page_size }
	}
}
