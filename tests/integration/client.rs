//! Request and response interceptor behaviour of the HTTP client.

// crates.io
use blog_client::{
	ApiClient, ApiError, ClientConfig, ClientEvent, MemoryTokenStore, PostQuery, TokenStore,
	api::models::{CategoryDraft, Credentials, Post},
	http::status::{NETWORK_ERROR_MESSAGE, SESSION_EXPIRED_MESSAGE},
};
use http::StatusCode;
use serde_json::json;
use wiremock::{
	Mock, MockServer, ResponseTemplate,
	matchers::{header, method, path, query_param},
};
// self
use crate::client_for;

fn post_body(id: u32) -> serde_json::Value {
	json!({ "id": id, "title": format!("Post {id}"), "postStatus": "PUBLISHED" })
}

#[tokio::test]
async fn bearer_token_is_omitted_on_auth_paths() {
	let _ = tracing_subscriber::fmt::try_init();

	let server = MockServer::start().await;
	let tokens = MemoryTokenStore::new();

	tokens.set("auth_token", "abc").expect("store");

	Mock::given(method("GET"))
		.and(path("/api/v1/posts"))
		.and(header("authorization", "Bearer abc"))
		.and(query_param("search", "rust"))
		.respond_with(ResponseTemplate::new(200).set_body_json(json!([post_body(1)])))
		.expect(1)
		.mount(&server)
		.await;
	Mock::given(method("POST"))
		.and(path("/api/v1/auth/login"))
		.respond_with(ResponseTemplate::new(200).set_body_json(json!({ "token": "t" })))
		.expect(1)
		.mount(&server)
		.await;

	let client = client_for(&server, tokens);
	let posts: Vec<Post> = client
		.posts()
		.list(&PostQuery { search: Some("rust".into()), ..Default::default() })
		.await
		.expect("posts");

	assert_eq!(posts.len(), 1);

	client.auth().login(&Credentials::new("user@gmail.com", "123456")).await.expect("login");

	let requests = server.received_requests().await.expect("recording enabled");

	for request in &requests {
		let id = request
			.headers
			.get("x-request-id")
			.and_then(|value| value.to_str().ok())
			.expect("request id header");

		assert!(id.starts_with("req_"));
	}

	let login = requests.iter().find(|request| request.url.path() == "/api/v1/auth/login");

	assert!(login.expect("login request").headers.get("authorization").is_none());

	server.verify().await;
}

#[tokio::test]
async fn unauthorized_response_clears_credentials_and_notifies() {
	let _ = tracing_subscriber::fmt::try_init();

	let server = MockServer::start().await;
	let tokens = MemoryTokenStore::new();

	tokens.set("auth_token", "stale").expect("store");
	tokens.set("refresh_token", "r1").expect("store");

	Mock::given(method("GET"))
		.and(path("/api/v1/user/profile"))
		.respond_with(ResponseTemplate::new(401))
		.mount(&server)
		.await;

	let client = client_for(&server, tokens.clone());
	let mut events = client.events();
	let err = client.user().profile().await.expect_err("401");

	assert_eq!(err.status(), Some(StatusCode::UNAUTHORIZED));
	assert_eq!(err.to_string(), SESSION_EXPIRED_MESSAGE);
	assert!(tokens.access_token().is_none());
	assert!(tokens.refresh_token().is_none());
	assert_eq!(
		events.recv().await.expect("event"),
		ClientEvent::Unauthorized { path: "/user/profile".into() }
	);
}

#[tokio::test]
async fn structured_validation_errors_are_preserved() {
	let server = MockServer::start().await;

	Mock::given(method("POST"))
		.and(path("/api/v1/categories"))
		.respond_with(ResponseTemplate::new(422).set_body_json(json!({
			"errors": [{ "field": "name", "message": "Name is required" }, "Name too short"]
		})))
		.mount(&server)
		.await;

	let client = client_for(&server, MemoryTokenStore::new());
	let err = client
		.categories()
		.create(&CategoryDraft { name: String::new() })
		.await
		.expect_err("422");

	assert_eq!(
		err,
		ApiError::Validation { messages: vec!["Name is required".into(), "Name too short".into()] }
	);
}

#[tokio::test]
async fn missing_server_is_a_network_error() {
	let config = ClientConfig::new("http://127.0.0.1:9/api/v1").expect("config");
	let client = ApiClient::new(&config, MemoryTokenStore::new()).expect("client");
	let err = client.tags().list().await.expect_err("no server");

	assert_eq!(err, ApiError::Network(NETWORK_ERROR_MESSAGE.into()));
}

#[tokio::test]
async fn empty_success_bodies_are_accepted() {
	let server = MockServer::start().await;

	Mock::given(method("DELETE"))
		.and(path("/api/v1/posts/9"))
		.respond_with(ResponseTemplate::new(204))
		.expect(1)
		.mount(&server)
		.await;

	let client = client_for(&server, MemoryTokenStore::new());

	client.posts().delete("9").await.expect("delete");

	server.verify().await;
}
