//! Infinite list: pages accumulate in fetch order until a short page arrives.

// std
use std::future::Future;
// crates.io
use tokio::sync::watch;
// self
use crate::{
	_prelude::*,
	http::client::ApiResult,
	request::{
		call_site::{CallSite, Outcome},
		pagination::{FetchedPage, PageRequest, PageResponse, PaginationOptions},
	},
};

/// Accumulated items and load-more bookkeeping.
#[derive(Clone, Debug, PartialEq)]
pub struct InfiniteListState<T> {
	/// Every fetched item, in fetch order.
	pub items: Vec<T>,
	/// Last page applied.
	pub page: u32,
	/// Whether the last fetched page was full.
	///
	/// A final page holding exactly `page_size` items still reports `true`; the next load
	/// then returns an empty page and flips it.
	pub has_more: bool,
	/// Whether a `load_more` fetch is underway.
	pub is_loading_more: bool,
}
impl<T> InfiniteListState<T> {
	fn new(page: u32) -> Self {
		Self { items: Vec::new(), page, has_more: true, is_loading_more: false }
	}
}

/// Call site accumulating pages for endless scrolling.
pub struct InfiniteList<T> {
	site: CallSite<PageRequest, FetchedPage<T>>,
	state: Arc<watch::Sender<InfiniteListState<T>>>,
	initial_page: u32,
	page_size: u32,
}
impl<T> InfiniteList<T>
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

		let initial_page = options.initial_page;
		let page_size = options.page_size;
		let (state, _) = watch::channel(InfiniteListState::new(initial_page));
		let state = Arc::new(state);
		let on_success = state.clone();
		let on_error = state.clone();
		let user_on_error = options.on_error.clone();
		let request_options = options
			.request_options()
			.on_success(move |fetched: &FetchedPage<T>| {
				on_success.send_modify(|state| {
					let items = &fetched.page.items;

					if fetched.request.page == initial_page {
						state.items = items.clone();
					} else {
						state.items.extend(items.iter().cloned());
					}

					state.page = fetched.request.page;
					state.has_more = items.len() == page_size as usize;
					state.is_loading_more = false;
				});
			})
			.on_error(move |error| {
				on_error.send_modify(|state| state.is_loading_more = false);

				if let Some(callback) = &user_on_error {
					callback(error);
				}
			});
		let site = CallSite::new(
			move |request: PageRequest| {
				let future = operation(request);

				async move { future.await.map(|page| FetchedPage { request, page }) }
			},
			request_options,
		)?;

		Ok(Self { site, state, initial_page, page_size })
	}

	/// Load the initial page on mount when immediate.
	pub async fn mount(&self) -> Option<Outcome<FetchedPage<T>>> {
		self.site.mount(self.request_for(self.initial_page)).await
	}

	/// Fetch the initial page, replacing accumulated items.
	pub async fn load_first(&self) -> Outcome<FetchedPage<T>> {
		self.site.execute(self.request_for(self.initial_page)).await
	}

	/// Append the next page; `None` while a load is underway or the list is exhausted.
	pub async fn load_more(&self) -> Option<Outcome<FetchedPage<T>>> {
		let mut next = None;

		self.state.send_if_modified(|state| {
			if state.is_loading_more || !state.has_more {
				return false;
			}

			state.is_loading_more = true;
			next = Some(state.page.saturating_add(1));

			true
		});

		let Some(page) = next else {
			tracing::debug!(call_site = self.site.label(), "load more ignored");

			return None;
		};
		let outcome = self.site.execute(self.request_for(page)).await;

		if let Outcome::Failed(_) = outcome {
			self.state.send_if_modified(|state| {
				let was_loading = state.is_loading_more;

				state.is_loading_more = false;

				was_loading
			});
		}

		Some(outcome)
	}

	/// Cancel any fetch and return to the initial page with no items.
	pub fn reset(&self) {
		self.site.cancel();
		self.state.send_replace(InfiniteListState::new(self.initial_page));
	}

	/// Current list snapshot.
	pub fn state(&self) -> InfiniteListState<T> {
		self.state.borrow().clone()
	}

	/// Subscribe to list changes.
	pub fn subscribe(&self) -> watch::Receiver<InfiniteListState<T>> {
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

	fn request_for(&self, page: u32) -> PageRequest {
		PageRequest { page, limit: self.page_size }
	}
}

#[cfg(test)]
mod tests {
	// crates.io
	use tokio::time;
	// self
	use super::*;
	use crate::error::ApiError;

	fn sized_pages(sizes: Vec<usize>) -> InfiniteList<u32> {
		InfiniteList::new(
			move |request: PageRequest| {
				let size = sizes.get(request.page as usize - 1).copied().unwrap_or(0);
				let items = (0..size as u32).map(|n| request.page * 100 + n).collect();

				async move { Ok(PageResponse { items, total_pages: None, total: 0 }) }
			},
			PaginationOptions::new().page_size(3),
		)
		.expect("infinite list")
	}

	#[tokio::test]
	async fn short_page_ends_the_list() {
		let list = sized_pages(vec![3, 3, 2]);

		list.load_first().await;

		assert!(list.state().has_more);
		assert!(list.load_more().await.is_some());
		assert!(list.state().has_more);
		assert!(list.load_more().await.is_some());

		let state = list.state();

		assert!(!state.has_more);
		assert_eq!(state.page, 3);
		assert_eq!(state.items.len(), 8);
		assert_eq!(state.items[..4], [100, 101, 102, 200]);
		assert!(list.load_more().await.is_none());
	}

	#[tokio::test]
	async fn reloading_first_page_replaces_items() {
		let list = sized_pages(vec![3, 3]);

		list.load_first().await;
		list.load_more().await;
		list.load_first().await;

		assert_eq!(list.state().items, vec![100, 101, 102]);
		assert_eq!(list.state().page, 1);
	}

	#[tokio::test(start_paused = true)]
	async fn overlapping_load_more_is_ignored() {
		let list = Arc::new(
			InfiniteList::new(
				|request: PageRequest| async move {
					time::sleep(Duration::from_millis(100)).await;

					Ok(PageResponse { items: vec![request.page; 2], total_pages: None, total: 0 })
				},
				PaginationOptions::new().page_size(2),
			)
			.expect("infinite list"),
		);

		list.load_first().await;

		let background = list.clone();
		let pending = tokio::spawn(async move { background.load_more().await });

		tokio::task::yield_now().await;

		assert!(list.state().is_loading_more);
		assert!(list.load_more().await.is_none());
		assert!(pending.await.expect("join").is_some_and(|outcome| outcome.is_success()));
		assert_eq!(list.state().items, vec![1, 1, 2, 2]);
		assert!(!list.state().is_loading_more);
	}

	#[tokio::test]
	async fn failed_load_keeps_page_and_clears_flag() {
		let list = InfiniteList::new(
			|request: PageRequest| async move {
				if request.page == 1 {
					Ok(PageResponse { items: vec![1, 2], total_pages: None, total: 0 })
				} else {
					Err(ApiError::Network("offline".into()))
				}
			},
			PaginationOptions::new().page_size(2),
		)
		.expect("infinite list");

		list.load_first().await;

		assert!(list.load_more().await.is_some_and(|outcome| !outcome.is_success()));

		let state = list.state();

		assert_eq!(state.page, 1);
		assert!(!state.is_loading_more);
		assert!(state.has_more);
	}

	#[tokio::test]
	async fn reset_returns_to_initial_page() {
		let list = sized_pages(vec![3, 3]);

		list.load_first().await;
		list.load_more().await;
		list.reset();

		assert_eq!(list.state(), InfiniteListState::new(1));
	}
}
