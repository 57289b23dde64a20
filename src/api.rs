//! Typed REST surface of the blog backend, layered on [`ApiClient`].
//!
//! Each resource group borrows the client; clone the client into a call-site operation when the
//! future must be `'static`.

pub mod auth;
pub mod content;
pub mod models;
pub mod user;

// self
use crate::http::client::ApiClient;
use auth::AuthApi;
use content::{AnalyticsApi, CategoriesApi, PostsApi, TagsApi};
use user::UserApi;

impl ApiClient {
	/// Authentication endpoints.
	pub fn auth(&self) -> AuthApi<'_> {
		AuthApi::new(self)
	}

	/// Post endpoints.
	pub fn posts(&self) -> PostsApi<'_> {
		PostsApi::new(self)
	}

	/// Category endpoints.
	pub fn categories(&self) -> CategoriesApi<'_> {
		CategoriesApi::new(self)
	}

	/// Tag endpoints.
	pub fn tags(&self) -> TagsApi<'_> {
		TagsApi::new(self)
	}

	/// Profile and account endpoints.
	pub fn user(&self) -> UserApi<'_> {
		UserApi::new(self)
	}

	/// Analytics endpoints.
	pub fn analytics(&self) -> AnalyticsApi<'_> {
		AnalyticsApi::new(self)
	}
}
