//! Integration tests against mock blog backends.

mod client;
mod request;
mod session;

// std
use std::sync::Arc;
// crates.io
use blog_client::{ApiClient, ClientConfig, MemoryTokenStore};
use jsonwebtoken::{EncodingKey, Header};
use serde_json::Value;
use wiremock::MockServer;

/// Client whose base URL points at `server`'s `/api/v1`.
pub fn client_for(server: &MockServer, tokens: Arc<MemoryTokenStore>) -> ApiClient {
	let config =
		ClientConfig::new(format!("{}/api/v1", server.uri())).expect("mock server base url");

	ApiClient::new(&config, tokens).expect("client")
}

/// Sign `claims` with a throwaway HMAC key.
pub fn mint(claims: Value) -> String {
	jsonwebtoken::encode(&Header::default(), &claims, &EncodingKey::from_secret(b"integration"))
		.expect("token")
}
