//! Client and session configuration with validation.

// std
use std::{env, path::PathBuf};
// crates.io
use serde::{Deserialize, Serialize};
use url::Url;
// self
use crate::{
	_prelude::*,
	session::storage::{FileTokenStore, MemoryTokenStore, TokenStore},
};

/// Default API base URL.
pub const DEFAULT_BASE_URL: &str = "http://localhost:8080/api/v1";
/// Default per-request timeout.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
/// Default lead time before token expiry at which the silent refresh fires.
pub const DEFAULT_REFRESH_LEAD: Duration = Duration::from_secs(5 * 60);
/// Default lifetime of a transient authentication error.
pub const DEFAULT_AUTH_ERROR_TTL: Duration = Duration::from_secs(10);
/// Environment variable overriding the base URL.
pub const ENV_BASE_URL: &str = "BLOG_API_BASE_URL";
/// Environment variable overriding the request timeout in milliseconds.
pub const ENV_TIMEOUT_MS: &str = "BLOG_API_TIMEOUT_MS";
/// Environment variable selecting a file-backed token store.
pub const ENV_TOKEN_FILE: &str = "BLOG_API_TOKEN_FILE";

/// Settings for [`ApiClient`](crate::http::client::ApiClient).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ClientConfig {
	/// Base URL every request path is appended to.
	#[serde(default = "default_base_url")]
	pub base_url: Url,
	/// Timeout applied to each request.
	#[serde(default = "default_request_timeout")]
	pub timeout: Duration,
	/// Optional file used to persist tokens between runs.
	#[serde(default)]
	pub token_file: Option<PathBuf>,
	/// User agent presented to the server.
	#[serde(default = "default_user_agent")]
	pub user_agent: String,
}
impl ClientConfig {
	/// Construct a configuration for `base_url` with default settings.
	pub fn new(base_url: impl AsRef<str>) -> Result<Self> {
		Ok(Self { base_url: Url::parse(base_url.as_ref())?, ..Self::default() })
	}

	/// Parse a JSON document, filling missing fields with defaults.
	pub fn from_json(raw: &str) -> Result<Self> {
		let config: Self = serde_json::from_str(raw)?;

		config.validate()?;

		Ok(config)
	}

	/// Defaults overridden by `BLOG_API_*` environment variables.
	pub fn from_env() -> Result<Self> {
		let mut config = Self::default();

		if let Ok(raw) = env::var(ENV_BASE_URL) {
			config.base_url = Url::parse(raw.trim())?;
		}
		if let Ok(raw) = env::var(ENV_TIMEOUT_MS) {
			let millis = raw.trim().parse::<u64>().map_err(|err| Error::Validation {
				field: "timeout",
				reason: format!("{ENV_TIMEOUT_MS} must be an integer: {err}."),
			})?;

			config.timeout = Duration::from_millis(millis);
		}
		if let Ok(raw) = env::var(ENV_TOKEN_FILE) {
			config.token_file = Some(PathBuf::from(raw));
		}

		config.validate()?;

		Ok(config)
	}

	/// Override the request timeout.
	pub fn with_timeout(mut self, timeout: Duration) -> Self {
		self.timeout = timeout;

		self
	}

	/// Persist tokens in `path`.
	pub fn with_token_file(mut self, path: impl Into<PathBuf>) -> Self {
		self.token_file = Some(path.into());

		self
	}

	/// Token store selected by the configuration: file-backed when `token_file` is set,
	/// otherwise in memory.
	pub fn token_store(&self) -> Result<Arc<dyn TokenStore>> {
		let store: Arc<dyn TokenStore> = match &self.token_file {
			Some(path) => FileTokenStore::open(path)?,
			None => MemoryTokenStore::new(),
		};

		Ok(store)
	}

	/// Validate the configuration against the documented constraints.
	pub fn validate(&self) -> Result<()> {
		if !matches!(self.base_url.scheme(), "http" | "https") {
			return Err(Error::Validation {
				field: "base_url",
				reason: "Must use the http or https scheme.".into(),
			});
		}
		if self.base_url.host_str().is_none() {
			return Err(Error::Validation {
				field: "base_url",
				reason: "Must include a host component.".into(),
			});
		}
		if self.base_url.query().is_some() {
			return Err(Error::Validation {
				field: "base_url",
				reason: "Must not carry a query string.".into(),
			});
		}
		if self.timeout < Duration::from_millis(100) {
			return Err(Error::Validation {
				field: "timeout",
				reason: "Must be at least 100 ms.".into(),
			});
		}
		if self.user_agent.trim().is_empty() {
			return Err(Error::Validation {
				field: "user_agent",
				reason: "Must not be empty.".into(),
			});
		}

		Ok(())
	}
}
impl Default for ClientConfig {
	fn default() -> Self {
		Self {
			base_url: default_base_url(),
			timeout: DEFAULT_REQUEST_TIMEOUT,
			token_file: None,
			user_agent: default_user_agent(),
		}
	}
}

/// Settings for [`SessionManager`](crate::session::manager::SessionManager).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SessionConfig {
	/// How long before expiry the silent refresh is attempted.
	#[serde(default = "default_refresh_lead")]
	pub refresh_lead: Duration,
	/// How long `auth_error` stays visible; `None` keeps it until cleared.
	#[serde(default = "default_auth_error_ttl")]
	pub auth_error_ttl: Option<Duration>,
	/// Role assigned when the token carries none.
	#[serde(default = "default_role")]
	pub default_role: String,
}
impl SessionConfig {
	/// Keep authentication errors until [`clear_error`] is called.
	///
	/// [`clear_error`]: crate::session::manager::SessionManager::clear_error
	pub fn without_auto_dismiss(mut self) -> Self {
		self.auth_error_ttl = None;

		self
	}

	/// Validate the configuration against the documented constraints.
	pub fn validate(&self) -> Result<()> {
		if let Some(ttl) = self.auth_error_ttl
			&& ttl.is_zero()
		{
			return Err(Error::Validation {
				field: "auth_error_ttl",
				reason: "Must be greater than zero; use None to disable auto-dismiss.".into(),
			});
		}
		if self.default_role.trim().is_empty() {
			return Err(Error::Validation {
				field: "default_role",
				reason: "Must not be empty.".into(),
			});
		}

		Ok(())
	}
}
impl Default for SessionConfig {
	fn default() -> Self {
		Self {
			refresh_lead: DEFAULT_REFRESH_LEAD,
			auth_error_ttl: default_auth_error_ttl(),
			default_role: default_role(),
		}
	}
}

fn default_base_url() -> Url {
	Url::parse(DEFAULT_BASE_URL).expect("default base URL is valid")
}

fn default_request_timeout() -> Duration {
	DEFAULT_REQUEST_TIMEOUT
}

fn default_user_agent() -> String {
	format!("blog-client/{}", env!("CARGO_PKG_VERSION"))
}

fn default_refresh_lead() -> Duration {
	DEFAULT_REFRESH_LEAD
}

fn default_auth_error_ttl() -> Option<Duration> {
	Some(DEFAULT_AUTH_ERROR_TTL)
}

fn default_role() -> String {
	"user".into()
}
