//! Call sites driven by the typed API against a mock backend.

// std
use std::time::Duration;
// crates.io
use blog_client::{
	CallSite, InfiniteList, MemoryTokenStore, Outcome, PageRequest, PaginatedCallSite,
	PaginationOptions, PostQuery, RequestOptions, api::models::Post,
};
use http::StatusCode;
use serde_json::{Value, json};
use tokio::time;
use wiremock::{
	Mock, MockServer, ResponseTemplate,
	matchers::{method, path, query_param},
};
// self
use crate::client_for;

fn posts(ids: impl IntoIterator<Item = u32>) -> Value {
	ids.into_iter().map(|id| json!({ "id": id, "title": format!("Post {id}") })).collect()
}

#[tokio::test]
async fn cached_call_site_hits_the_backend_once() {
	let _ = tracing_subscriber::fmt::try_init();

	let server = MockServer::start().await;

	Mock::given(method("GET"))
		.and(path("/api/v1/posts"))
		.and(query_param("page", "1"))
		.respond_with(ResponseTemplate::new(200).set_body_json(posts([1, 2, 3])))
		.expect(1)
		.mount(&server)
		.await;

	let client = client_for(&server, MemoryTokenStore::new());
	let site = CallSite::new(
		move |query: PostQuery| {
			let client = client.clone();

			async move { client.posts().list(&query).await }
		},
		RequestOptions::new().cache_key("posts:p1").label("posts"),
	)
	.expect("call site");
	let query = PostQuery { page: Some(1), ..Default::default() };
	let first = site.execute(query.clone()).await;
	let second = site.execute(query).await;

	assert!(first.is_success());
	assert!(!first.from_cache());
	assert!(second.from_cache());
	assert_eq!(second.data().map(Vec::len), Some(3));

	server.verify().await;
}

#[tokio::test]
async fn transient_server_errors_are_retried() {
	let _ = tracing_subscriber::fmt::try_init();

	let server = MockServer::start().await;

	Mock::given(method("GET"))
		.and(path("/api/v1/categories"))
		.respond_with(ResponseTemplate::new(500).set_body_json(json!({ "message": "busy" })))
		.up_to_n_times(2)
		.expect(2)
		.mount(&server)
		.await;
	Mock::given(method("GET"))
		.and(path("/api/v1/categories"))
		.respond_with(
			ResponseTemplate::new(200).set_body_json(json!([{ "id": 1, "name": "Rust" }])),
		)
		.expect(1)
		.mount(&server)
		.await;

	let client = client_for(&server, MemoryTokenStore::new());
	let site = CallSite::new(
		move |_: ()| {
			let client = client.clone();

			async move { client.categories().list().await }
		},
		RequestOptions::new().retry(3, Duration::from_millis(50)),
	)
	.expect("call site");
	let first = site.execute(()).await;

	match first {
		Outcome::Retrying { attempt, ref error, .. } => {
			assert_eq!(attempt, 1);
			assert_eq!(error.status(), Some(StatusCode::INTERNAL_SERVER_ERROR));
		},
		other => panic!("expected a scheduled retry, got {other:?}"),
	}

	time::sleep(Duration::from_millis(500)).await;

	let state = site.state();

	assert_eq!(state.data.as_ref().map(|categories| categories[0].name.as_str()), Some("Rust"));
	assert!(state.error.is_none());
	assert_eq!(state.retry_attempt, 0);

	server.verify().await;
}

#[tokio::test]
async fn infinite_list_stops_on_a_short_page() {
	let _ = tracing_subscriber::fmt::try_init();

	let server = MockServer::start().await;

	for (page, ids) in [("1", vec![1, 2]), ("2", vec![3, 4]), ("3", vec![5])] {
		Mock::given(method("GET"))
			.and(path("/api/v1/posts"))
			.and(query_param("page", page))
			.and(query_param("limit", "2"))
			.respond_with(ResponseTemplate::new(200).set_body_json(posts(ids)))
			.expect(1)
			.mount(&server)
			.await;
	}

	let client = client_for(&server, MemoryTokenStore::new());
	let list = InfiniteList::new(
		move |request: PageRequest| {
			let client = client.clone();

			async move { client.posts().page(&PostQuery::default().with_page(request)).await }
		},
		PaginationOptions::new().page_size(2),
	)
	.expect("list");

	assert!(list.mount().await.expect("immediate").is_success());
	assert!(list.state().has_more);
	assert!(list.load_more().await.expect("more").is_success());
	assert!(list.state().has_more);
	assert!(list.load_more().await.expect("more").is_success());

	let state = list.state();
	let ids: Vec<&str> = state.items.iter().map(|post: &Post| post.id.as_str()).collect();

	assert_eq!(ids, ["1", "2", "3", "4", "5"]);
	assert_eq!(state.page, 3);
	assert!(!state.has_more);
	assert!(list.load_more().await.is_none());

	server.verify().await;
}

#[tokio::test]
async fn paginated_call_site_reads_envelope_metadata() {
	let server = MockServer::start().await;

	Mock::given(method("GET"))
		.and(path("/api/v1/posts"))
		.and(query_param("page", "1"))
		.respond_with(ResponseTemplate::new(200).set_body_json(json!({
			"data": posts([1, 2, 3]),
			"totalPages": 2,
			"total": 5
		})))
		.mount(&server)
		.await;
	Mock::given(method("GET"))
		.and(path("/api/v1/posts"))
		.and(query_param("page", "2"))
		.respond_with(ResponseTemplate::new(200).set_body_json(json!({
			"data": posts([4, 5]),
			"totalPages": 2,
			"total": 5
		})))
		.mount(&server)
		.await;

	let client = client_for(&server, MemoryTokenStore::new());
	let pages = PaginatedCallSite::new(
		move |request: PageRequest| {
			let client = client.clone();

			async move { client.posts().page(&PostQuery::default().with_page(request)).await }
		},
		PaginationOptions::new().page_size(3),
	)
	.expect("pages");

	pages.mount().await.expect("immediate");

	let state = pages.state();

	assert_eq!(state.total_pages, 2);
	assert_eq!(state.total_items, 5);
	assert!(pages.has_next_page());
	assert!(!pages.has_prev_page());
	assert!(pages.next_page().await.expect("page 2").is_success());
	assert_eq!(pages.state().current_page, 2);
	assert_eq!(pages.state().items.len(), 2);
	assert!(pages.next_page().await.is_none());
}
