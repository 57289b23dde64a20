//! Wire models exchanged with the blog backend.

// crates.io
use chrono::NaiveDateTime;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
// self
use crate::request::pagination::{PageRequest, PageResponse};

/// Login payload.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Credentials {
	/// Account email.
	pub email: String,
	/// Plain-text password.
	pub password: String,
}
impl Credentials {
	/// Build a login payload.
	pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
		Self { email: email.into(), password: password.into() }
	}
}

/// Registration payload.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Registration {
	/// Display name.
	pub name: String,
	/// Account email.
	pub email: String,
	/// Plain-text password.
	pub password: String,
}

/// Token pair issued by login and refresh.
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthResponse {
	/// Access token.
	#[serde(default)]
	pub token: Option<String>,
	/// Replacement refresh token, when rotated.
	#[serde(default)]
	pub refresh_token: Option<String>,
	/// Server-side user record.
	#[serde(default)]
	pub user: Option<UserProfile>,
	/// Token lifetime in seconds.
	#[serde(default)]
	pub expires_in: Option<i64>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RefreshRequest<'a> {
	pub(crate) refresh_token: &'a str,
}

/// User record returned by the profile endpoints.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
	/// User identifier.
	#[serde(default, deserialize_with = "deserialize_optional_id")]
	pub id: Option<String>,
	/// Account email.
	#[serde(default)]
	pub email: Option<String>,
	/// Display name.
	#[serde(default)]
	pub name: Option<String>,
	/// Authorisation role.
	#[serde(default)]
	pub role: Option<String>,
	/// Fields not modelled above.
	#[serde(flatten)]
	pub extra: Map<String, Value>,
}

/// Partial profile update; absent fields are left untouched.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct ProfileUpdate {
	/// New display name.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub name: Option<String>,
	/// New account email.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub email: Option<String>,
	/// Additional fields forwarded verbatim.
	#[serde(flatten)]
	pub extra: Map<String, Value>,
}

/// Password change payload.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PasswordChange {
	/// Password currently in use.
	pub current_password: String,
	/// Replacement password.
	pub new_password: String,
}

/// Publication state of a post.
#[allow(missing_docs)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PostStatus {
	Draft,
	Published,
	Archived,
}

/// Sort direction for list queries.
#[allow(missing_docs)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
	Asc,
	Desc,
}

/// Author summary embedded in a post.
#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct Author {
	/// Author identifier.
	#[serde(deserialize_with = "deserialize_id")]
	pub id: String,
	/// Display name.
	#[serde(default)]
	pub name: Option<String>,
}

/// Blog post.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Post {
	/// Post identifier.
	#[serde(deserialize_with = "deserialize_id")]
	pub id: String,
	/// Title.
	pub title: String,
	/// Body.
	#[serde(default)]
	pub content: Option<String>,
	/// Author summary.
	#[serde(default)]
	pub author: Option<Author>,
	/// Owning category.
	#[serde(default)]
	pub category: Option<Category>,
	/// Attached tags.
	#[serde(default)]
	pub tags: Vec<Tag>,
	/// Estimated reading time in minutes.
	#[serde(default)]
	pub reading_time: Option<u32>,
	/// Publication state.
	#[serde(default, alias = "postStatus")]
	pub status: Option<PostStatus>,
	/// Creation time as reported by the server.
	#[serde(default)]
	pub created_at: Option<NaiveDateTime>,
	/// Last modification time as reported by the server.
	#[serde(default)]
	pub updated_at: Option<NaiveDateTime>,
}

/// Create or update payload for a post.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PostDraft {
	/// Title.
	pub title: String,
	/// Body.
	pub content: String,
	/// Owning category.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub category_id: Option<String>,
	/// Attached tag identifiers.
	#[serde(skip_serializing_if = "Vec::is_empty")]
	pub tag_ids: Vec<String>,
	/// Publication state.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub status: Option<PostStatus>,
}

/// Filters accepted by `GET /posts`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct PostQuery {
	/// Category identifier.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub category: Option<String>,
	/// Free-text search.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub search: Option<String>,
	/// Sort field, e.g. `createdAt`.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub sort: Option<String>,
	/// Sort direction.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub order: Option<SortOrder>,
	/// One-based page.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub page: Option<u32>,
	/// Page size.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub limit: Option<u32>,
	/// Publication state.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub status: Option<PostStatus>,
}
impl PostQuery {
	/// Same filters, addressed at `request`.
	pub fn with_page(mut self, request: PageRequest) -> Self {
		self.page = Some(request.page);
		self.limit = Some(request.limit);

		self
	}
}

/// Post category.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Category {
	/// Category identifier.
	#[serde(deserialize_with = "deserialize_id")]
	pub id: String,
	/// Name.
	pub name: String,
	/// Number of posts in the category.
	#[serde(default)]
	pub post_count: Option<u64>,
}

/// Post tag.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tag {
	/// Tag identifier.
	#[serde(deserialize_with = "deserialize_id")]
	pub id: String,
	/// Name.
	pub name: String,
	/// Number of posts carrying the tag.
	#[serde(default)]
	pub post_count: Option<u64>,
}

/// Create or rename payload for a category.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct CategoryDraft {
	/// Name.
	pub name: String,
}

/// Batch tag creation payload.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct TagDraft {
	/// Names to create; existing names are returned unchanged.
	pub names: Vec<String>,
}

/// List body that is either a page envelope or a bare array.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum Listing<T> {
	/// Envelope with paging metadata.
	Page(PageResponse<T>),
	/// Bare array.
	Items(Vec<T>),
}
impl<T> Listing<T> {
	/// Normalise into a page envelope; a bare array counts as one complete page.
	pub fn into_page(self) -> PageResponse<T> {
		match self {
			Self::Page(page) => page,
			Self::Items(items) => {
				let total = items.len() as u64;

				PageResponse { items, total_pages: None, total }
			},
		}
	}
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Identifier {
	Text(String),
	Number(serde_json::Number),
}
impl From<Identifier> for String {
	fn from(value: Identifier) -> Self {
		match value {
			Identifier::Text(text) => text,
			Identifier::Number(number) => number.to_string(),
		}
	}
}

fn deserialize_id<'de, D>(deserializer: D) -> Result<String, D::Error>
where
	D: Deserializer<'de>,
{
	Identifier::deserialize(deserializer).map(String::from)
}

fn deserialize_optional_id<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
	D: Deserializer<'de>,
{
	Ok(Option::<Identifier>::deserialize(deserializer)?.map(String::from))
}
