//! `/auth/*` endpoints. None of these carry the bearer token.

// crates.io
use serde_json::Value;
// self
use crate::{
	api::models::{AuthResponse, Credentials, RefreshRequest, Registration},
	http::client::{ApiClient, ApiResult},
};

/// Authentication endpoint group.
#[derive(Clone, Copy, Debug)]
pub struct AuthApi<'a> {
	client: &'a ApiClient,
}
impl<'a> AuthApi<'a> {
	pub(crate) fn new(client: &'a ApiClient) -> Self {
		Self { client }
	}

	/// `POST /auth/login`.
	pub async fn login(&self, credentials: &Credentials) -> ApiResult<AuthResponse> {
		self.client.post("/auth/login", credentials).await
	}

	/// `POST /auth/signin`; creates the account without logging in.
	pub async fn register(&self, registration: &Registration) -> ApiResult<()> {
		self.client.post::<_, Value>("/auth/signin", registration).await.map(|_| ())
	}

	/// `POST /auth/logout`.
	pub async fn logout(&self) -> ApiResult<()> {
		self.client.post_empty::<Value>("/auth/logout").await.map(|_| ())
	}

	/// `POST /auth/refresh` with the stored refresh token.
	pub async fn refresh(&self, refresh_token: &str) -> ApiResult<AuthResponse> {
		self.client.post("/auth/refresh", &RefreshRequest { refresh_token }).await
	}

	/// `GET /auth/verify`.
	pub async fn verify(&self) -> ApiResult<Value> {
		self.client.get("/auth/verify").await
	}
}
