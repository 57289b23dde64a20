//! `/user/*` endpoints.

// crates.io
use serde_json::Value;
// self
use crate::{
	api::models::{PasswordChange, ProfileUpdate, UserProfile},
	http::client::{ApiClient, ApiResult},
};

/// Profile and account endpoint group.
#[derive(Clone, Copy, Debug)]
pub struct UserApi<'a> {
	client: &'a ApiClient,
}
impl<'a> UserApi<'a> {
	pub(crate) fn new(client: &'a ApiClient) -> Self {
		Self { client }
	}

	/// `GET /user/profile`.
	pub async fn profile(&self) -> ApiResult<UserProfile> {
		self.client.get("/user/profile").await
	}

	/// `PUT /user/profile`.
	pub async fn update_profile(&self, update: &ProfileUpdate) -> ApiResult<UserProfile> {
		self.client.put("/user/profile", update).await
	}

	/// `PUT /user/password`.
	pub async fn change_password(&self, change: &PasswordChange) -> ApiResult<()> {
		self.client.put::<_, Value>("/user/password", change).await.map(|_| ())
	}

	/// `DELETE /user/account`.
	pub async fn delete_account(&self) -> ApiResult<()> {
		self.client.delete::<Value>("/user/account").await.map(|_| ())
	}
}
