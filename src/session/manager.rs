//! Session state machine with silent refresh ahead of token expiry.
//!
//! The manager owns the credential lifecycle: it reads tokens from the shared [`TokenStore`]
//! on [`initialize`](SessionManager::initialize), stores them on login and refresh, and clears
//! them on logout, refresh failure, or any 401 observed by the [`ApiClient`]. A single refresh
//! timer is armed whenever the user's expiry changes.

// std
use std::sync::{
	Mutex, MutexGuard, PoisonError, Weak,
	atomic::{AtomicU64, Ordering},
};
// crates.io
use tokio::{
	sync::{broadcast::error::RecvError, watch},
	task::JoinHandle,
	time,
};
use tokio_util::sync::CancellationToken;
// self
use crate::{
	_prelude::*,
	api::models::{AuthResponse, Credentials, PasswordChange, ProfileUpdate, Registration},
	config::SessionConfig,
	error::ApiError,
	http::client::{ApiClient, ClientEvent},
	metrics,
	session::{
		storage::{ACCESS_TOKEN_KEY, REFRESH_TOKEN_KEY, TokenStore},
		token::{self, TokenClaims},
	},
};

/// Role that unlocks administrative views.
pub const ADMIN_ROLE: &str = "admin";

const NO_TOKEN_MESSAGE: &str = "No token received from server";
const UNDECODABLE_TOKEN_MESSAGE: &str = "Received token could not be decoded";

/// Phase of the session state machine.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum AuthStatus {
	/// [`SessionManager::initialize`] has not run yet.
	#[default]
	Uninitialized,
	/// Stored credentials are being checked.
	Checking,
	/// A user is logged in.
	Authenticated,
	/// No usable credentials.
	Unauthenticated,
}

/// User derived from the access token payload.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct User {
	/// Subject of the token.
	pub id: String,
	/// Email claim, falling back to the subject.
	pub email: String,
	/// Display name.
	pub name: Option<String>,
	/// Authorisation role.
	pub role: String,
	/// Token expiry as seconds since the Unix epoch.
	pub exp: Option<i64>,
}
impl User {
	/// Build a user from token claims; `None` when the claims identify nobody.
	pub fn from_claims(claims: &TokenClaims, default_role: &str) -> Option<Self> {
		let id = claims.sub.clone().or_else(|| claims.email.clone())?;
		let email = claims.email.clone().unwrap_or_else(|| id.clone());

		Some(Self {
			id,
			email,
			name: claims.name.clone(),
			role: claims.role.clone().unwrap_or_else(|| default_role.to_owned()),
			exp: claims.exp,
		})
	}
}

/// Snapshot published to subscribers after every session change.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SessionSnapshot {
	/// State machine phase.
	pub status: AuthStatus,
	/// Logged-in user.
	pub user: Option<User>,
	/// Last user-facing authentication error.
	pub auth_error: Option<String>,
	/// Whether a login, registration, or profile call is underway.
	pub loading: bool,
}
impl SessionSnapshot {
	/// Whether a user is logged in.
	pub fn is_authenticated(&self) -> bool {
		self.user.is_some()
	}

	/// Whether the user holds `role`.
	pub fn has_role(&self, role: &str) -> bool {
		self.user.as_ref().is_some_and(|user| user.role == role)
	}

	/// Whether the user holds any of `roles`.
	pub fn has_any_role(&self, roles: &[&str]) -> bool {
		self.user.as_ref().is_some_and(|user| roles.contains(&user.role.as_str()))
	}

	/// Whether the user is an administrator.
	pub fn is_admin(&self) -> bool {
		self.has_role(ADMIN_ROLE)
	}
}

/// Explicit session handle shared by everything that issues authenticated calls.
///
/// Clones share the same session. Dropping the last clone stops every timer and the
/// unauthorized listener.
#[derive(Clone, Debug)]
pub struct SessionManager {
	inner: Arc<SessionInner>,
}
impl SessionManager {
	/// Create a manager over `client` and start listening for its 401 notifications.
	///
	/// Must be called inside a tokio runtime.
	pub fn new(client: ApiClient, config: SessionConfig) -> Result<Self> {
		config.validate()?;

		let (state, _) = watch::channel(SessionSnapshot::default());
		let inner = Arc::new(SessionInner {
			tokens: client.tokens().clone(),
			client,
			config,
			state,
			refresh_timer: Mutex::new(None),
			refresh_generation: AtomicU64::new(0),
			error_timer: Mutex::new(None),
			shutdown: CancellationToken::new(),
		});

		SessionInner::spawn_unauthorized_listener(&inner);

		Ok(Self { inner })
	}

	/// Check stored credentials and settle into `Authenticated` or `Unauthenticated`.
	#[tracing::instrument(skip(self))]
	pub async fn initialize(&self) -> AuthStatus {
		self.inner.state.send_modify(|state| state.status = AuthStatus::Checking);

		let Some(stored) = self.inner.tokens.access_token() else {
			tracing::debug!("no stored access token");

			self.inner.end_session();

			return AuthStatus::Unauthenticated;
		};
		let token = if token::is_token_expired(&stored) {
			tracing::info!("stored access token expired, attempting refresh");

			if !self.refresh_token().await {
				self.inner.clear_tokens();
				self.inner.end_session();

				return AuthStatus::Unauthenticated;
			}

			match self.inner.tokens.access_token() {
				Some(token) => token,
				None => {
					self.inner.end_session();

					return AuthStatus::Unauthenticated;
				},
			}
		} else {
			stored
		};

		match self.inner.user_from_token(&token, None) {
			Some(user) => {
				self.inner.begin_session(user);

				AuthStatus::Authenticated
			},
			None => {
				tracing::warn!("stored access token could not be decoded");

				self.inner.clear_tokens();
				self.inner.end_session();

				AuthStatus::Unauthenticated
			},
		}
	}

	/// Log in and store the issued tokens.
	#[tracing::instrument(skip_all)]
	pub async fn login(&self, credentials: &Credentials) -> Result<User> {
		self.inner.begin_call();

		let result = self.inner.login(credentials).await;

		self.inner.finish_call(result.as_ref().err());

		result
	}

	/// Create an account; does not log in.
	#[tracing::instrument(skip_all)]
	pub async fn register(&self, registration: &Registration) -> Result<()> {
		self.inner.begin_call();

		let result = self.inner.client.auth().register(registration).await.map_err(Error::from);

		self.inner.finish_call(result.as_ref().err());

		result
	}

	/// End the session locally; endpoint failures are ignored.
	#[tracing::instrument(skip(self))]
	pub async fn logout(&self) {
		self.inner.logout().await;
	}

	/// Exchange the refresh token for a new access token; `false` on any failure.
	#[tracing::instrument(skip(self))]
	pub async fn refresh_token(&self) -> bool {
		self.inner.refresh().await
	}

	/// Update the profile and merge the server's answer into the current user.
	#[tracing::instrument(skip_all)]
	pub async fn update_profile(&self, update: &ProfileUpdate) -> Result<User> {
		self.inner.begin_call();

		let result = self.inner.update_profile(update).await;

		self.inner.finish_call(result.as_ref().err());

		result
	}

	/// Change the account password.
	#[tracing::instrument(skip_all)]
	pub async fn change_password(&self, change: &PasswordChange) -> Result<()> {
		self.inner.begin_call();

		let result = self.inner.client.user().change_password(change).await.map_err(Error::from);

		self.inner.finish_call(result.as_ref().err());

		result
	}

	/// Treat the session as rejected by the server.
	pub fn report_unauthorized(&self) {
		self.inner.expire("reported");
	}

	/// Current session snapshot.
	pub fn snapshot(&self) -> SessionSnapshot {
		self.inner.state.borrow().clone()
	}

	/// Logged-in user.
	pub fn user(&self) -> Option<User> {
		self.inner.state.borrow().user.clone()
	}

	/// State machine phase.
	pub fn status(&self) -> AuthStatus {
		self.inner.state.borrow().status
	}

	/// Whether a user is logged in.
	pub fn is_authenticated(&self) -> bool {
		self.inner.state.borrow().is_authenticated()
	}

	/// Whether the user holds `role`.
	pub fn has_role(&self, role: &str) -> bool {
		self.inner.state.borrow().has_role(role)
	}

	/// Whether the user holds any of `roles`.
	pub fn has_any_role(&self, roles: &[&str]) -> bool {
		self.inner.state.borrow().has_any_role(roles)
	}

	/// Whether the user is an administrator.
	pub fn is_admin(&self) -> bool {
		self.inner.state.borrow().is_admin()
	}

	/// Dismiss the authentication error.
	pub fn clear_error(&self) {
		abort(&self.inner.error_timer);
		self.inner.state.send_if_modified(|state| state.auth_error.take().is_some());
	}

	/// Time until the armed auto-refresh fires; `None` when no refresh is pending.
	pub fn next_refresh_in(&self) -> Option<Duration> {
		lock(&self.inner.refresh_timer)
			.as_ref()
			.filter(|timer| !timer.handle.is_finished())
			.map(|timer| timer.due.saturating_duration_since(Instant::now()))
	}

	/// Subscribe to session changes.
	pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
		self.inner.state.subscribe()
	}

	/// HTTP client this session authenticates.
	pub fn client(&self) -> &ApiClient {
		&self.inner.client
	}

	/// Stop every timer and the unauthorized listener. Idempotent.
	pub fn shutdown(&self) {
		self.inner.shutdown();
	}
}

#[derive(Debug)]
struct RefreshTimer {
	generation: u64,
	due: Instant,
	handle: JoinHandle<()>,
}

#[derive(Debug)]
struct SessionInner {
	client: ApiClient,
	tokens: Arc<dyn TokenStore>,
	config: SessionConfig,
	state: watch::Sender<SessionSnapshot>,
	refresh_timer: Mutex<Option<RefreshTimer>>,
	refresh_generation: AtomicU64,
	error_timer: Mutex<Option<JoinHandle<()>>>,
	shutdown: CancellationToken,
}
impl SessionInner {
	fn spawn_unauthorized_listener(this: &Arc<Self>) {
		let mut events = this.client.events();
		let shutdown = this.shutdown.clone();
		let weak = Arc::downgrade(this);

		tokio::spawn(async move {
			loop {
				let event = tokio::select! {
					_ = shutdown.cancelled() => break,
					event = events.recv() => event,
				};

				match event {
					Ok(ClientEvent::Unauthorized { path }) => {
						let Some(inner) = weak.upgrade() else { break };

						inner.expire(&path);
					},
					Err(RecvError::Lagged(skipped)) => {
						tracing::warn!(skipped, "unauthorized listener lagged");
					},
					Err(RecvError::Closed) => break,
				}
			}
		});
	}

	async fn login(self: &Arc<Self>, credentials: &Credentials) -> Result<User> {
		let response = self.client.auth().login(credentials).await?;
		let token = response.token.as_deref().ok_or_else(|| {
			tracing::warn!("login response carried no token");

			ApiError::Decode(NO_TOKEN_MESSAGE.into())
		})?;

		self.store_tokens(&response)?;

		let name = response.user.as_ref().and_then(|user| user.name.clone());
		let Some(mut user) = self.user_from_token(token, name) else {
			self.clear_tokens();

			return Err(ApiError::Decode(UNDECODABLE_TOKEN_MESSAGE.into()).into());
		};

		user.exp = user.exp.or_else(|| issued_expiry(response.expires_in));

		tracing::info!(user = %user.id, "logged in");

		self.begin_session(user.clone());

		Ok(user)
	}

	async fn logout(self: &Arc<Self>) {
		if let Err(err) = self.client.auth().logout().await {
			tracing::debug!(error = %err, "logout endpoint failed; ending session locally");
		}

		self.clear_tokens();
		self.end_session();
	}

	async fn refresh(self: &Arc<Self>) -> bool {
		let Some(refresh_token) = self.tokens.refresh_token() else {
			tracing::debug!("no refresh token stored");

			return false;
		};
		let response = match self.client.auth().refresh(&refresh_token).await {
			Ok(response) => response,
			Err(err) => {
				tracing::warn!(error = %err, "token refresh failed");
				metrics::record_token_refresh(false);

				return false;
			},
		};

		if response.token.is_none() {
			tracing::warn!("refresh response carried no token");
			metrics::record_token_refresh(false);

			return false;
		}
		if let Err(err) = self.store_tokens(&response) {
			tracing::warn!(error = %err, "refreshed token could not be stored");
			metrics::record_token_refresh(false);

			return false;
		}

		let exp = response
			.token
			.as_deref()
			.and_then(token::parse_token)
			.and_then(|claims| claims.exp)
			.or_else(|| issued_expiry(response.expires_in));
		let mut rearm = None;

		self.state.send_if_modified(|state| match &mut state.user {
			Some(user) => {
				user.exp = exp;
				rearm = exp;

				true
			},
			None => false,
		});

		if let Some(exp) = rearm {
			if self.refresh_delay(exp).is_zero() {
				// Already inside the lead window.
				tracing::warn!(exp, "refreshed token expires within the refresh lead");

				abort_refresh(&self.refresh_timer);
			} else {
				self.arm_refresh(exp);
			}
		}

		tracing::info!("access token refreshed");
		metrics::record_token_refresh(true);

		true
	}

	async fn update_profile(self: &Arc<Self>, update: &ProfileUpdate) -> Result<User> {
		let profile = self.client.user().update_profile(update).await?;
		let mut merged = None;

		self.state.send_modify(|state| {
			let user = state.user.get_or_insert_with(|| User {
				id: profile.id.clone().unwrap_or_default(),
				email: String::new(),
				name: None,
				role: self.config.default_role.clone(),
				exp: None,
			});

			if let Some(id) = &profile.id {
				user.id = id.clone();
			}
			if let Some(email) = &profile.email {
				user.email = email.clone();
			}
			if let Some(name) = &profile.name {
				user.name = Some(name.clone());
			}
			if let Some(role) = &profile.role {
				user.role = role.clone();
			}

			merged = Some(user.clone());
		});

		merged.ok_or_else(|| ApiError::Decode("Profile update produced no user".into()).into())
	}

	fn store_tokens(&self, response: &AuthResponse) -> Result<()> {
		if let Some(token) = &response.token {
			self.tokens.set(ACCESS_TOKEN_KEY, token)?;
		}
		if let Some(refresh_token) = &response.refresh_token {
			self.tokens.set(REFRESH_TOKEN_KEY, refresh_token)?;
		}

		Ok(())
	}

	fn clear_tokens(&self) {
		if let Err(err) = self.tokens.clear_all() {
			tracing::warn!(error = %err, "failed to clear stored tokens");
		}
	}

	fn user_from_token(&self, token: &str, name: Option<String>) -> Option<User> {
		let claims = token::parse_token(token)?;
		let mut user = User::from_claims(&claims, &self.config.default_role)?;

		if name.is_some() {
			user.name = name;
		}

		Some(user)
	}

	fn begin_session(self: &Arc<Self>, user: User) {
		let exp = user.exp;

		self.state.send_modify(|state| {
			state.status = AuthStatus::Authenticated;
			state.user = Some(user);
		});

		match exp {
			Some(exp) => self.arm_refresh(exp),
			None => abort_refresh(&self.refresh_timer),
		}
	}

	fn end_session(&self) {
		abort_refresh(&self.refresh_timer);
		abort(&self.error_timer);
		self.state.send_modify(|state| {
			state.status = AuthStatus::Unauthenticated;
			state.user = None;
			state.auth_error = None;
			state.loading = false;
		});
	}

	fn expire(&self, source: &str) {
		let was_authenticated = self.state.borrow().user.is_some();

		if was_authenticated {
			tracing::info!(source, "session rejected by server");
		}

		self.clear_tokens();
		abort_refresh(&self.refresh_timer);
		self.state.send_if_modified(|state| {
			let changed = state.user.is_some() || state.status != AuthStatus::Unauthenticated;

			state.status = AuthStatus::Unauthenticated;
			state.user = None;

			changed
		});
	}

	fn refresh_delay(&self, exp: i64) -> Duration {
		token::time_until_expiry(exp, Utc::now()).saturating_sub(self.config.refresh_lead)
	}

	fn arm_refresh(self: &Arc<Self>, exp: i64) {
		let delay = self.refresh_delay(exp);
		let generation = self.refresh_generation.fetch_add(1, Ordering::SeqCst) + 1;
		let weak = Arc::downgrade(self);
		let shutdown = self.shutdown.clone();

		tracing::debug!(?delay, "auto-refresh scheduled");

		let handle = tokio::spawn(async move {
			tokio::select! {
				_ = shutdown.cancelled() => {},
				_ = time::sleep(delay) => Self::auto_refresh(weak, generation).await,
			}
		});

		let timer = RefreshTimer { generation, due: Instant::now() + delay, handle };

		if let Some(previous) = lock(&self.refresh_timer).replace(timer) {
			previous.handle.abort();
		}
	}

	async fn auto_refresh(weak: Weak<Self>, generation: u64) {
		let Some(inner) = weak.upgrade() else { return };

		{
			let mut timer = lock(&inner.refresh_timer);

			if timer.as_ref().is_some_and(|timer| timer.generation == generation) {
				timer.take();
			}
		}

		tracing::info!("auto-refreshing access token");

		if !inner.refresh().await {
			tracing::warn!("auto-refresh failed, logging out");

			inner.logout().await;
		}
	}

	fn begin_call(&self) {
		abort(&self.error_timer);
		self.state.send_modify(|state| {
			state.loading = true;
			state.auth_error = None;
		});
	}

	fn finish_call(self: &Arc<Self>, error: Option<&Error>) {
		let message = error.map(ToString::to_string);

		self.state.send_modify(|state| {
			state.loading = false;
			state.auth_error = message.clone();
		});

		if message.is_some()
			&& let Some(ttl) = self.config.auth_error_ttl
		{
			let weak = Arc::downgrade(self);
			let handle = tokio::spawn(async move {
				time::sleep(ttl).await;

				if let Some(inner) = weak.upgrade() {
					inner.state.send_if_modified(|state| state.auth_error.take().is_some());
				}
			});

			if let Some(previous) = lock(&self.error_timer).replace(handle) {
				previous.abort();
			}
		}
	}

	fn shutdown(&self) {
		self.shutdown.cancel();
		abort_refresh(&self.refresh_timer);
		abort(&self.error_timer);
	}
}
impl Drop for SessionInner {
	fn drop(&mut self) {
		self.shutdown();
	}
}

/// Absolute expiry from a relative `expires_in`, for tokens without an `exp` claim.
fn issued_expiry(expires_in: Option<i64>) -> Option<i64> {
	expires_in.filter(|secs| *secs > 0).map(|secs| Utc::now().timestamp().saturating_add(secs))
}

fn lock<V>(mutex: &Mutex<V>) -> MutexGuard<'_, V> {
	mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn abort(timer: &Mutex<Option<JoinHandle<()>>>) {
	if let Some(handle) = lock(timer).take() {
		handle.abort();
	}
}

fn abort_refresh(timer: &Mutex<Option<RefreshTimer>>) {
	if let Some(timer) = lock(timer).take() {
		timer.handle.abort();
	}
}

#[cfg(test)]
mod tests {
	// crates.io
	use jsonwebtoken::{EncodingKey, Header};
	use serde_json::{Value, json};
	// self
	use super::*;
	use crate::session::storage::MemoryTokenStore;

	fn mint(claims: Value) -> String {
		jsonwebtoken::encode(&Header::default(), &claims, &EncodingKey::from_secret(b"test"))
			.expect("token")
	}

	fn offline_session(tokens: Arc<MemoryTokenStore>, config: SessionConfig) -> SessionManager {
		let client = ApiClient::with_client(
			url::Url::parse("http://127.0.0.1:9/api/v1").expect("url"),
			reqwest::Client::new(),
			tokens,
		);

		SessionManager::new(client, config).expect("session")
	}

	#[test]
	fn user_falls_back_to_subject_and_default_role() {
		let claims = TokenClaims { sub: Some("42".into()), ..Default::default() };
		let user = User::from_claims(&claims, "user").expect("user");

		assert_eq!(user.email, "42");
		assert_eq!(user.role, "user");
		assert!(User::from_claims(&TokenClaims::default(), "user").is_none());
	}

	#[test]
	fn relative_expiry_is_anchored_to_now() {
		let now = Utc::now().timestamp();
		let exp = issued_expiry(Some(3_600)).expect("expiry");

		assert!((now + 3_600..=now + 3_601).contains(&exp));
		assert!(issued_expiry(Some(0)).is_none());
		assert!(issued_expiry(None).is_none());
	}

	#[test]
	fn role_predicates_follow_the_user() {
		let mut snapshot = SessionSnapshot::default();

		assert!(!snapshot.has_any_role(&["admin", "user"]));

		snapshot.user = Some(User {
			id: "1".into(),
			email: "a@b.c".into(),
			name: None,
			role: "moderator".into(),
			exp: None,
		});

		assert!(snapshot.has_role("moderator"));
		assert!(snapshot.has_any_role(&["admin", "moderator"]));
		assert!(!snapshot.is_admin());
		assert!(snapshot.is_authenticated());
	}

	#[tokio::test]
	async fn valid_stored_token_authenticates_and_arms_refresh() {
		let tokens = MemoryTokenStore::new();
		let exp = Utc::now().timestamp() + 3_600;

		tokens
			.set(ACCESS_TOKEN_KEY, &mint(json!({ "sub": "7", "role": "admin", "exp": exp })))
			.expect("store");

		let session = offline_session(tokens, SessionConfig::default());

		assert_eq!(session.status(), AuthStatus::Uninitialized);
		assert_eq!(session.initialize().await, AuthStatus::Authenticated);
		assert!(session.is_admin());
		assert_eq!(session.user().and_then(|user| user.exp), Some(exp));
		assert!(
			session.next_refresh_in().is_some_and(|delay| delay > Duration::from_secs(3_000))
		);

		session.shutdown();

		assert!(session.next_refresh_in().is_none());
	}

	#[tokio::test]
	async fn expired_token_without_refresh_token_ends_session() {
		let tokens = MemoryTokenStore::new();

		tokens
			.set(ACCESS_TOKEN_KEY, &mint(json!({ "sub": "7", "exp": Utc::now().timestamp() - 1 })))
			.expect("store");

		let session = offline_session(tokens.clone(), SessionConfig::default());

		assert_eq!(session.initialize().await, AuthStatus::Unauthenticated);
		assert!(tokens.access_token().is_none());
		assert!(session.user().is_none());
	}

	#[tokio::test]
	async fn garbage_token_is_treated_as_no_session() {
		let tokens = MemoryTokenStore::new();

		tokens.set(ACCESS_TOKEN_KEY, "not-a-token").expect("store");

		let session = offline_session(tokens.clone(), SessionConfig::default());

		assert_eq!(session.initialize().await, AuthStatus::Unauthenticated);
		assert!(tokens.access_token().is_none());
	}

	#[tokio::test]
	async fn reported_unauthorized_clears_everything() {
		let tokens = MemoryTokenStore::new();

		tokens
			.set(ACCESS_TOKEN_KEY, &mint(json!({ "sub": "7", "exp": Utc::now().timestamp() + 3_600 })))
			.expect("store");
		tokens.set(REFRESH_TOKEN_KEY, "r1").expect("store");

		let session = offline_session(tokens.clone(), SessionConfig::default());

		session.initialize().await;
		session.report_unauthorized();

		assert_eq!(session.status(), AuthStatus::Unauthenticated);
		assert!(tokens.refresh_token().is_none());
		assert!(session.next_refresh_in().is_none());
	}
}
