//! HTTP client integration for the blog REST API.
//!
//! [`ApiClient`] applies the request interceptor contract (bearer token everywhere except the
//! authentication endpoints, a unique `X-Request-ID`) and the response contract (unwrap 2xx
//! bodies, translate everything else into [`ApiError`], drop credentials on 401).

// crates.io
use http::{HeaderValue, Method, StatusCode, header::AUTHORIZATION};
use rand::Rng;
use reqwest::{Client, RequestBuilder};
use serde::{Serialize, de::DeserializeOwned};
use serde_json::Value;
use tokio::sync::broadcast;
use url::Url;
// self
use crate::{
	_prelude::*,
	config::ClientConfig,
	error::ApiError,
	http::status::{self, NETWORK_ERROR_MESSAGE},
	session::storage::TokenStore,
};

/// Result of a single API call.
pub type ApiResult<T> = std::result::Result<T, ApiError>;

/// Header carrying the per-request identifier.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

const REQUEST_ID_ALPHABET: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// Notifications broadcast by the client to the presentation layer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ClientEvent {
	/// The server answered 401; credentials were cleared and the user must log in again.
	Unauthorized {
		/// Path of the request that was rejected.
		path: String,
	},
}

/// Typed HTTP collaborator shared by every call site.
#[derive(Clone, Debug)]
pub struct ApiClient {
	inner: Arc<ClientInner>,
}
#[derive(Debug)]
struct ClientInner {
	http: Client,
	base_url: Url,
	tokens: Arc<dyn TokenStore>,
	events: broadcast::Sender<ClientEvent>,
}
impl ApiClient {
	/// Build a client from configuration using the default reqwest client.
	pub fn new(config: &ClientConfig, tokens: Arc<dyn TokenStore>) -> Result<Self> {
		config.validate()?;

		let http = Client::builder()
			.user_agent(config.user_agent.clone())
			.timeout(config.timeout)
			.connect_timeout(Duration::from_secs(5))
			.build()?;

		Ok(Self::with_client(config.base_url.clone(), http, tokens))
	}

	/// Build a client around an existing reqwest client (primarily for tests).
	pub fn with_client(base_url: Url, http: Client, tokens: Arc<dyn TokenStore>) -> Self {
		let (events, _) = broadcast::channel(16);

		Self { inner: Arc::new(ClientInner { http, base_url, tokens, events }) }
	}

	/// Base URL requests are issued against.
	pub fn base_url(&self) -> &Url {
		&self.inner.base_url
	}

	/// Token storage consulted by the request interceptor.
	pub fn tokens(&self) -> &Arc<dyn TokenStore> {
		&self.inner.tokens
	}

	/// Subscribe to client notifications such as [`ClientEvent::Unauthorized`].
	pub fn events(&self) -> broadcast::Receiver<ClientEvent> {
		self.inner.events.subscribe()
	}

	/// `GET path`.
	pub async fn get<T>(&self, path: &str) -> ApiResult<T>
	where
		T: DeserializeOwned,
	{
		self.send(Method::GET, path, |builder| builder).await
	}

	/// `GET path?query`.
	pub async fn get_with<Q, T>(&self, path: &str, query: &Q) -> ApiResult<T>
	where
		Q: Serialize + ?Sized,
		T: DeserializeOwned,
	{
		self.send(Method::GET, path, |builder| builder.query(query)).await
	}

	/// `POST path` with a JSON body.
	pub async fn post<B, T>(&self, path: &str, body: &B) -> ApiResult<T>
	where
		B: Serialize + ?Sized,
		T: DeserializeOwned,
	{
		self.send(Method::POST, path, |builder| builder.json(body)).await
	}

	/// `POST path` without a body.
	pub async fn post_empty<T>(&self, path: &str) -> ApiResult<T>
	where
		T: DeserializeOwned,
	{
		self.send(Method::POST, path, |builder| builder).await
	}

	/// `PUT path` with a JSON body.
	pub async fn put<B, T>(&self, path: &str, body: &B) -> ApiResult<T>
	where
		B: Serialize + ?Sized,
		T: DeserializeOwned,
	{
		self.send(Method::PUT, path, |builder| builder.json(body)).await
	}

	/// `PATCH path` without a body.
	pub async fn patch_empty<T>(&self, path: &str) -> ApiResult<T>
	where
		T: DeserializeOwned,
	{
		self.send(Method::PATCH, path, |builder| builder).await
	}

	/// `DELETE path`.
	pub async fn delete<T>(&self, path: &str) -> ApiResult<T>
	where
		T: DeserializeOwned,
	{
		self.send(Method::DELETE, path, |builder| builder).await
	}

	async fn send<T, F>(&self, method: Method, path: &str, customize: F) -> ApiResult<T>
	where
		T: DeserializeOwned,
		F: FnOnce(RequestBuilder) -> RequestBuilder,
	{
		let url = self.endpoint(path)?;
		let request_id = generate_request_id();
		let mut builder = self
			.inner
			.http
			.request(method.clone(), url)
			.header(REQUEST_ID_HEADER, request_id.as_str());

		if !is_auth_path(path)
			&& let Some(token) = self.inner.tokens.access_token()
			&& let Ok(value) = HeaderValue::from_str(&format!("Bearer {token}"))
		{
			builder = builder.header(AUTHORIZATION, value);
		}

		builder = customize(builder);

		let start = Instant::now();
		let response = match builder.send().await {
			Ok(response) => response,
			Err(err) => {
				tracing::warn!(
					%method,
					path,
					request_id = %request_id,
					error = %err,
					"request failed without response"
				);

				return Err(ApiError::Network(NETWORK_ERROR_MESSAGE.into()));
			},
		};
		let status = response.status();
		let bytes = response.bytes().await.map_err(|err| {
			tracing::warn!(
				%method,
				path,
				request_id = %request_id,
				error = %err,
				"response body unreadable"
			);

			ApiError::Network(NETWORK_ERROR_MESSAGE.into())
		})?;

		tracing::debug!(
			%method,
			path,
			request_id = %request_id,
			status = %status,
			elapsed = ?start.elapsed(),
			"api request complete"
		);

		if status.is_success() {
			return decode_body(&bytes);
		}

		let body = serde_json::from_slice::<Value>(&bytes).ok();

		if status == StatusCode::UNAUTHORIZED {
			self.handle_unauthorized(path);
		}

		Err(status::error_for_status(status, body.as_ref()))
	}

	fn endpoint(&self, path: &str) -> ApiResult<Url> {
		let base = self.inner.base_url.as_str().trim_end_matches('/');
		let path = path.trim_start_matches('/');

		Url::parse(&format!("{base}/{path}"))
			.map_err(|err| ApiError::Decode(format!("Invalid request path {path:?}: {err}.")))
	}

	fn handle_unauthorized(&self, path: &str) {
		if let Err(err) = self.inner.tokens.clear_all() {
			tracing::warn!(error = %err, "failed to clear credentials after 401");
		}

		// No receivers simply means nobody is listening for navigation.
		let _ = self.inner.events.send(ClientEvent::Unauthorized { path: path.to_owned() });

		tracing::debug!(path, "credentials cleared after 401");
	}
}

/// Whether `path` targets an authentication endpoint, which never carries the bearer token.
pub fn is_auth_path(path: &str) -> bool {
	let path = if path.starts_with('/') { path.to_owned() } else { format!("/{path}") };

	path.contains("/auth/")
}

/// Build a request identifier of the form `req_<unix millis>_<9 base36 chars>`.
pub fn generate_request_id() -> String {
	let mut rng = rand::rng();
	let suffix: String = (0..9)
		.map(|_| REQUEST_ID_ALPHABET[rng.random_range(0..REQUEST_ID_ALPHABET.len())] as char)
		.collect();

	format!("req_{}_{suffix}", Utc::now().timestamp_millis())
}

fn decode_body<T>(bytes: &[u8]) -> ApiResult<T>
where
	T: DeserializeOwned,
{
	let result = if bytes.iter().all(u8::is_ascii_whitespace) {
		serde_json::from_value(Value::Null)
	} else {
		serde_json::from_slice(bytes)
	};

	result.map_err(|err| ApiError::Decode(err.to_string()))
}
