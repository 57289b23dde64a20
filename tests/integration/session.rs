//! Session lifecycle against a mock auth backend.

// std
use std::{sync::Arc, time::Duration};
// crates.io
use blog_client::{
	AuthStatus, Credentials, MemoryTokenStore, SessionConfig, SessionManager, TokenStore,
};
use chrono::Utc;
use serde_json::{Value, json};
use tokio::time;
use wiremock::{
	Mock, MockServer, ResponseTemplate,
	matchers::{body_json, method, path},
};
// self
use crate::{client_for, mint};

fn token_expiring_in(seconds: i64) -> String {
	mint(json!({
		"sub": "7",
		"email": "user@gmail.com",
		"role": "user",
		"exp": Utc::now().timestamp() + seconds,
	}))
}

fn auth_body(token: &str, refresh_token: &str) -> Value {
	json!({ "token": token, "refreshToken": refresh_token, "user": { "name": "Ada" } })
}

async fn mount_login(server: &MockServer, token: &str) {
	Mock::given(method("POST"))
		.and(path("/api/v1/auth/login"))
		.and(body_json(json!({ "email": "user@gmail.com", "password": "123456" })))
		.respond_with(ResponseTemplate::new(200).set_body_json(auth_body(token, "r1")))
		.mount(server)
		.await;
}

fn session_for(
	server: &MockServer,
	tokens: Arc<MemoryTokenStore>,
	config: SessionConfig,
) -> SessionManager {
	SessionManager::new(client_for(server, tokens), config).expect("session")
}

fn credentials() -> Credentials {
	Credentials::new("user@gmail.com", "123456")
}

#[tokio::test]
async fn login_authenticates_and_schedules_refresh() {
	let _ = tracing_subscriber::fmt::try_init();

	let server = MockServer::start().await;
	let tokens = MemoryTokenStore::new();

	mount_login(&server, &token_expiring_in(3_600)).await;

	let session = session_for(&server, tokens.clone(), SessionConfig::default());
	let user = session.login(&credentials()).await.expect("login");

	assert_eq!(user.email, "user@gmail.com");
	assert_eq!(user.name.as_deref(), Some("Ada"));
	assert_eq!(session.status(), AuthStatus::Authenticated);
	assert_eq!(tokens.refresh_token().as_deref(), Some("r1"));
	assert!(tokens.access_token().is_some());

	let due = session.next_refresh_in().expect("refresh armed");

	assert!(due > Duration::from_secs(54 * 60) && due <= Duration::from_secs(55 * 60), "{due:?}");
}

#[tokio::test]
async fn failed_auto_refresh_logs_out() {
	let _ = tracing_subscriber::fmt::try_init();

	let server = MockServer::start().await;
	let tokens = MemoryTokenStore::new();

	mount_login(&server, &token_expiring_in(3_600)).await;
	Mock::given(method("POST"))
		.and(path("/api/v1/auth/refresh"))
		.and(body_json(json!({ "refreshToken": "r1" })))
		.respond_with(ResponseTemplate::new(500))
		.expect(1)
		.mount(&server)
		.await;
	Mock::given(method("POST"))
		.and(path("/api/v1/auth/logout"))
		.respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
		.mount(&server)
		.await;

	let config = SessionConfig { refresh_lead: Duration::from_secs(3_599), ..Default::default() };
	let session = session_for(&server, tokens.clone(), config);

	session.login(&credentials()).await.expect("login");

	assert!(session.is_authenticated());

	time::sleep(Duration::from_secs(2)).await;

	assert!(session.user().is_none());
	assert_eq!(session.status(), AuthStatus::Unauthenticated);
	assert!(tokens.access_token().is_none());
	assert!(tokens.refresh_token().is_none());

	server.verify().await;
}

#[tokio::test]
async fn successful_auto_refresh_rearms_the_timer() {
	let _ = tracing_subscriber::fmt::try_init();

	let server = MockServer::start().await;
	let tokens = MemoryTokenStore::new();
	let refreshed = token_expiring_in(7_200);

	mount_login(&server, &token_expiring_in(3_600)).await;
	Mock::given(method("POST"))
		.and(path("/api/v1/auth/refresh"))
		.respond_with(ResponseTemplate::new(200).set_body_json(auth_body(&refreshed, "r2")))
		.expect(1)
		.mount(&server)
		.await;

	let config = SessionConfig { refresh_lead: Duration::from_secs(3_599), ..Default::default() };
	let session = session_for(&server, tokens.clone(), config);

	session.login(&credentials()).await.expect("login");
	time::sleep(Duration::from_secs(2)).await;

	assert!(session.is_authenticated());
	assert_eq!(tokens.access_token(), Some(refreshed));
	assert_eq!(tokens.refresh_token().as_deref(), Some("r2"));
	assert!(session.next_refresh_in().expect("re-armed") > Duration::from_secs(3_500));

	server.verify().await;
}

#[tokio::test]
async fn short_lived_tokens_refresh_once() {
	let _ = tracing_subscriber::fmt::try_init();

	let server = MockServer::start().await;

	mount_login(&server, &token_expiring_in(120)).await;
	Mock::given(method("POST"))
		.and(path("/api/v1/auth/refresh"))
		.respond_with(
			ResponseTemplate::new(200).set_body_json(auth_body(&token_expiring_in(120), "r2")),
		)
		.mount(&server)
		.await;

	let session = session_for(&server, MemoryTokenStore::new(), SessionConfig::default());

	session.login(&credentials()).await.expect("login");
	time::sleep(Duration::from_millis(500)).await;

	let refreshes = server
		.received_requests()
		.await
		.expect("recording enabled")
		.iter()
		.filter(|request| request.url.path() == "/api/v1/auth/refresh")
		.count();

	assert_eq!(refreshes, 1);
	assert!(session.is_authenticated());
	assert!(session.next_refresh_in().is_none());
}

#[tokio::test]
async fn expires_in_schedules_refresh_for_tokens_without_exp() {
	let server = MockServer::start().await;
	let token = mint(json!({ "sub": "7", "email": "user@gmail.com" }));

	Mock::given(method("POST"))
		.and(path("/api/v1/auth/login"))
		.respond_with(ResponseTemplate::new(200).set_body_json(json!({
			"token": token,
			"refreshToken": "r1",
			"expiresIn": 3_600
		})))
		.mount(&server)
		.await;

	let session = session_for(&server, MemoryTokenStore::new(), SessionConfig::default());
	let user = session.login(&credentials()).await.expect("login");

	assert!(user.exp.is_some());

	let due = session.next_refresh_in().expect("refresh armed");

	assert!(due > Duration::from_secs(54 * 60) && due <= Duration::from_secs(55 * 60), "{due:?}");
}

#[tokio::test]
async fn logout_survives_a_failing_endpoint() {
	let server = MockServer::start().await;
	let tokens = MemoryTokenStore::new();

	mount_login(&server, &token_expiring_in(3_600)).await;
	Mock::given(method("POST"))
		.and(path("/api/v1/auth/logout"))
		.respond_with(ResponseTemplate::new(503))
		.expect(1)
		.mount(&server)
		.await;

	let session = session_for(&server, tokens.clone(), SessionConfig::default());

	session.login(&credentials()).await.expect("login");
	session.logout().await;

	assert!(!session.is_authenticated());
	assert!(session.next_refresh_in().is_none());
	assert!(tokens.access_token().is_none());

	server.verify().await;
}

#[tokio::test]
async fn auth_error_is_dismissed_after_its_ttl() {
	let server = MockServer::start().await;

	Mock::given(method("POST"))
		.and(path("/api/v1/auth/login"))
		.respond_with(ResponseTemplate::new(403))
		.mount(&server)
		.await;

	let config =
		SessionConfig { auth_error_ttl: Some(Duration::from_millis(200)), ..Default::default() };
	let session = session_for(&server, MemoryTokenStore::new(), config);
	let err = session.login(&credentials()).await.expect_err("forbidden");
	let snapshot = session.snapshot();

	assert_eq!(snapshot.auth_error, Some(err.to_string()));
	assert!(!snapshot.loading);

	time::sleep(Duration::from_millis(500)).await;

	assert!(session.snapshot().auth_error.is_none());
}

#[tokio::test]
async fn unauthorized_response_anywhere_ends_the_session() {
	let _ = tracing_subscriber::fmt::try_init();

	let server = MockServer::start().await;
	let tokens = MemoryTokenStore::new();

	mount_login(&server, &token_expiring_in(3_600)).await;
	Mock::given(method("GET"))
		.and(path("/api/v1/user/profile"))
		.respond_with(ResponseTemplate::new(401))
		.mount(&server)
		.await;

	let session = session_for(&server, tokens.clone(), SessionConfig::default());
	let mut changes = session.subscribe();

	session.login(&credentials()).await.expect("login");
	session.client().user().profile().await.expect_err("401");

	time::timeout(
		Duration::from_secs(2),
		changes.wait_for(|snapshot| snapshot.status == AuthStatus::Unauthenticated),
	)
	.await
	.expect("session expired in time")
	.expect("session alive");

	assert!(session.user().is_none());
	assert!(session.next_refresh_in().is_none());
	assert!(tokens.refresh_token().is_none());
}

#[tokio::test]
async fn initialize_refreshes_an_expired_token() {
	let server = MockServer::start().await;
	let tokens = MemoryTokenStore::new();
	let fresh = token_expiring_in(3_600);

	tokens.set("auth_token", &token_expiring_in(-60)).expect("store");
	tokens.set("refresh_token", "r1").expect("store");

	Mock::given(method("POST"))
		.and(path("/api/v1/auth/refresh"))
		.and(body_json(json!({ "refreshToken": "r1" })))
		.respond_with(ResponseTemplate::new(200).set_body_json(auth_body(&fresh, "r2")))
		.expect(1)
		.mount(&server)
		.await;

	let session = session_for(&server, tokens.clone(), SessionConfig::default());

	assert_eq!(session.initialize().await, AuthStatus::Authenticated);
	assert_eq!(session.user().map(|user| user.id), Some("7".into()));
	assert_eq!(tokens.access_token(), Some(fresh));
	assert!(session.next_refresh_in().is_some());

	server.verify().await;
}

#[tokio::test]
async fn initialize_without_refresh_token_is_unauthenticated() {
	let server = MockServer::start().await;
	let tokens = MemoryTokenStore::new();

	tokens.set("auth_token", &token_expiring_in(-60)).expect("store");

	let session = session_for(&server, tokens.clone(), SessionConfig::default());

	assert_eq!(session.initialize().await, AuthStatus::Unauthenticated);
	assert!(tokens.access_token().is_none());
}
