//! Framework-independent async data layer for the blog REST API: cached call sites with retry,
//! cancellation, and teardown, plus a session manager that refreshes tokens ahead of expiry.

#![deny(clippy::all, missing_docs, unused_crate_dependencies)]

pub mod api;
pub mod cache;
pub mod config;
pub mod http;
pub mod metrics;
pub mod request;
pub mod session;

mod error;
mod _prelude {
	pub use std::{sync::Arc, time::Duration};

	pub use chrono::{DateTime, Utc};
	pub use tokio::time::Instant;

	pub use crate::{Error, Result};
}

#[cfg(feature = "prometheus")] pub use crate::metrics::install_default_exporter;
pub use crate::{
	api::models::{Credentials, PostQuery, Registration},
	config::{ClientConfig, SessionConfig},
	error::{ApiError, Error, Result},
	http::{
		client::{ApiClient, ApiResult, ClientEvent},
		retry::RetryPolicy,
	},
	request::{
		call_site::{CallSite, Outcome},
		debounce::DebouncedCallSite,
		infinite::InfiniteList,
		options::RequestOptions,
		pagination::{PageRequest, PageResponse, PaginatedCallSite, PaginationOptions},
		state::{RequestState, RequestStatus},
	},
	session::{
		manager::{AuthStatus, SessionManager, SessionSnapshot, User},
		storage::{FileTokenStore, MemoryTokenStore, TokenStore},
	},
};
