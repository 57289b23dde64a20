//! Posts, categories, tags, and analytics.

// crates.io
use serde_json::Value;
// self
use crate::{
	api::models::{Category, CategoryDraft, Listing, Post, PostDraft, PostQuery, Tag, TagDraft},
	http::client::{ApiClient, ApiResult},
	request::pagination::PageResponse,
};

#[derive(serde::Serialize)]
struct SearchQuery<'a> {
	q: &'a str,
	#[serde(flatten)]
	filters: &'a PostQuery,
}

/// Post endpoint group.
#[derive(Clone, Copy, Debug)]
pub struct PostsApi<'a> {
	client: &'a ApiClient,
}
impl<'a> PostsApi<'a> {
	pub(crate) fn new(client: &'a ApiClient) -> Self {
		Self { client }
	}

	/// `GET /posts`.
	pub async fn list(&self, query: &PostQuery) -> ApiResult<Vec<Post>> {
		self.page(query).await.map(|page| page.items)
	}

	/// `GET /posts`, keeping paging metadata when the server sends it.
	pub async fn page(&self, query: &PostQuery) -> ApiResult<PageResponse<Post>> {
		self.client.get_with::<_, Listing<Post>>("/posts", query).await.map(Listing::into_page)
	}

	/// `GET /posts/{id}`.
	pub async fn get(&self, id: &str) -> ApiResult<Post> {
		self.client.get(&format!("/posts/{id}")).await
	}

	/// `POST /posts`.
	pub async fn create(&self, draft: &PostDraft) -> ApiResult<Post> {
		self.client.post("/posts", draft).await
	}

	/// `PUT /posts/{id}`.
	pub async fn update(&self, id: &str, draft: &PostDraft) -> ApiResult<Post> {
		self.client.put(&format!("/posts/{id}"), draft).await
	}

	/// `DELETE /posts/{id}`.
	pub async fn delete(&self, id: &str) -> ApiResult<()> {
		self.client.delete::<Value>(&format!("/posts/{id}")).await.map(|_| ())
	}

	/// `GET /posts/drafts`.
	pub async fn drafts(&self) -> ApiResult<Vec<Post>> {
		self.client
			.get::<Listing<Post>>("/posts/drafts")
			.await
			.map(|listing| listing.into_page().items)
	}

	/// `PATCH /posts/{id}/publish`.
	pub async fn publish(&self, id: &str) -> ApiResult<Post> {
		self.client.patch_empty(&format!("/posts/{id}/publish")).await
	}

	/// `PATCH /posts/{id}/unpublish`.
	pub async fn unpublish(&self, id: &str) -> ApiResult<Post> {
		self.client.patch_empty(&format!("/posts/{id}/unpublish")).await
	}

	/// `GET /posts/search?q=`.
	pub async fn search(&self, q: &str, filters: &PostQuery) -> ApiResult<Vec<Post>> {
		self.client
			.get_with::<_, Listing<Post>>("/posts/search", &SearchQuery { q, filters })
			.await
			.map(|listing| listing.into_page().items)
	}
}

/// Category endpoint group.
#[derive(Clone, Copy, Debug)]
pub struct CategoriesApi<'a> {
	client: &'a ApiClient,
}
impl<'a> CategoriesApi<'a> {
	pub(crate) fn new(client: &'a ApiClient) -> Self {
		Self { client }
	}

	/// `GET /categories`.
	pub async fn list(&self) -> ApiResult<Vec<Category>> {
		self.client.get("/categories").await
	}

	/// `GET /categories/{id}`.
	pub async fn get(&self, id: &str) -> ApiResult<Category> {
		self.client.get(&format!("/categories/{id}")).await
	}

	/// `POST /categories`.
	pub async fn create(&self, draft: &CategoryDraft) -> ApiResult<Category> {
		self.client.post("/categories", draft).await
	}

	/// `PUT /categories/{id}`.
	pub async fn update(&self, id: &str, draft: &CategoryDraft) -> ApiResult<Category> {
		self.client.put(&format!("/categories/{id}"), draft).await
	}

	/// `DELETE /categories/{id}`.
	pub async fn delete(&self, id: &str) -> ApiResult<()> {
		self.client.delete::<Value>(&format!("/categories/{id}")).await.map(|_| ())
	}

	/// `GET /categories/{id}/posts`.
	pub async fn posts(&self, id: &str, query: &PostQuery) -> ApiResult<PageResponse<Post>> {
		self.client
			.get_with::<_, Listing<Post>>(&format!("/categories/{id}/posts"), query)
			.await
			.map(Listing::into_page)
	}
}

/// Tag endpoint group.
#[derive(Clone, Copy, Debug)]
pub struct TagsApi<'a> {
	client: &'a ApiClient,
}
impl<'a> TagsApi<'a> {
	pub(crate) fn new(client: &'a ApiClient) -> Self {
		Self { client }
	}

	/// `GET /tags`.
	pub async fn list(&self) -> ApiResult<Vec<Tag>> {
		self.client.get("/tags").await
	}

	/// `GET /tags/{id}`.
	pub async fn get(&self, id: &str) -> ApiResult<Tag> {
		self.client.get(&format!("/tags/{id}")).await
	}

	/// `POST /tags`; the server answers with every requested tag.
	pub async fn create(&self, draft: &TagDraft) -> ApiResult<Vec<Tag>> {
		self.client.post("/tags", draft).await
	}

	/// `PUT /tags/{id}`.
	pub async fn update(&self, id: &str, name: &str) -> ApiResult<Tag> {
		self.client.put(&format!("/tags/{id}"), &serde_json::json!({ "name": name })).await
	}

	/// `DELETE /tags/{id}`.
	pub async fn delete(&self, id: &str) -> ApiResult<()> {
		self.client.delete::<Value>(&format!("/tags/{id}")).await.map(|_| ())
	}

	/// `GET /tags/{id}/posts`.
	pub async fn posts(&self, id: &str, query: &PostQuery) -> ApiResult<PageResponse<Post>> {
		self.client
			.get_with::<_, Listing<Post>>(&format!("/tags/{id}/posts"), query)
			.await
			.map(Listing::into_page)
	}

	/// `GET /tags/search?q=`.
	pub async fn search(&self, q: &str) -> ApiResult<Vec<Tag>> {
		self.client.get_with("/tags/search", &[("q", q)]).await
	}
}

/// Analytics endpoint group. Payloads are backend-defined and returned as raw JSON.
#[derive(Clone, Copy, Debug)]
pub struct AnalyticsApi<'a> {
	client: &'a ApiClient,
}
impl<'a> AnalyticsApi<'a> {
	pub(crate) fn new(client: &'a ApiClient) -> Self {
		Self { client }
	}

	/// `GET /analytics/stats`.
	pub async fn stats(&self) -> ApiResult<Value> {
		self.client.get("/analytics/stats").await
	}

	/// `GET /analytics/posts/{id}/views`.
	pub async fn post_views(&self, post_id: &str) -> ApiResult<Value> {
		self.client.get(&format!("/analytics/posts/{post_id}/views")).await
	}
}
