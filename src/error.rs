//! Crate-wide error types and `Result` alias.

// crates.io
use http::StatusCode;

/// Library-wide result type.
pub type Result<T> = std::result::Result<T, Error>;

/// Unified error type for the blog client crate.
#[allow(missing_docs)]
#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error(transparent)]
	Io(#[from] std::io::Error),

	#[error(transparent)]
	Reqwest(#[from] reqwest::Error),
	#[error(transparent)]
	Serde(#[from] serde_json::Error),
	#[error(transparent)]
	Url(#[from] url::ParseError),

	#[error(transparent)]
	Api(#[from] ApiError),
	#[error("Metrics error: {0}")]
	Metrics(String),
	#[error("Token storage error: {0}")]
	Storage(String),
	#[error("Validation failed for {field}: {reason}")]
	Validation { field: &'static str, reason: String },
}

/// Failure taxonomy surfaced to call sites.
///
/// Values are cheap to clone so they can live inside observable request state.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum ApiError {
	/// No response reached the client.
	#[error("{0}")]
	Network(String),
	/// The server answered with a non-success status.
	#[error("{message}")]
	Http {
		/// Status code returned by the server.
		status: StatusCode,
		/// Human readable message mapped from the status.
		message: String,
	},
	/// Structured field errors returned with a 422.
	#[error("{}", messages.join(", "))]
	Validation {
		/// One message per rejected field.
		messages: Vec<String>,
	},
	/// The response body could not be decoded.
	#[error("Unexpected response payload: {0}")]
	Decode(String),
	/// The request was superseded by a newer invocation on the same call site.
	#[error("Request cancelled")]
	Cancelled,
	/// The owning call site was torn down before the request settled.
	#[error("Component unmounted")]
	TornDown,
}
impl ApiError {
	/// Whether this error stems from the engine itself and must stay invisible to users.
	pub fn is_silent(&self) -> bool {
		matches!(self, Self::Cancelled | Self::TornDown)
	}

	/// HTTP status attached to the error, if any.
	pub fn status(&self) -> Option<StatusCode> {
		match self {
			Self::Http { status, .. } => Some(*status),
			Self::Validation { .. } => Some(StatusCode::UNPROCESSABLE_ENTITY),
			_ => None,
		}
	}

	/// Whether the server rejected the credential.
	pub fn is_unauthorized(&self) -> bool {
		self.status() == Some(StatusCode::UNAUTHORIZED)
	}
}

#[cfg(feature = "prometheus")]
impl From<metrics_exporter_prometheus::BuildError> for Error {
	fn from(value: metrics_exporter_prometheus::BuildError) -> Self {
		Self::Metrics(value.to_string())
	}
}
