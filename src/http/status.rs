//! Translation of non-success HTTP statuses into [`ApiError`] values.

// crates.io
use http::StatusCode;
use serde_json::Value;
// self
use crate::error::ApiError;

/// Message used when no response reached the client.
pub const NETWORK_ERROR_MESSAGE: &str =
	"Network error: Unable to connect to the server. Please check your connection.";
/// Message used for a 401.
pub const SESSION_EXPIRED_MESSAGE: &str = "Your session has expired. Please log in again.";

/// Map a non-success status and its (optional) JSON body to the error taxonomy.
pub fn error_for_status(status: StatusCode, body: Option<&Value>) -> ApiError {
	let fixed = |message: &str| ApiError::Http { status, message: message.to_owned() };

	match status {
		StatusCode::UNAUTHORIZED => fixed(SESSION_EXPIRED_MESSAGE),
		StatusCode::FORBIDDEN => fixed("You do not have permission to perform this action."),
		StatusCode::NOT_FOUND => fixed("The requested resource was not found."),
		StatusCode::CONFLICT =>
			fixed("The request conflicts with the current state of the resource."),
		StatusCode::UNPROCESSABLE_ENTITY => validation_error(status, body),
		StatusCode::TOO_MANY_REQUESTS =>
			fixed("Too many requests. Please wait a moment and try again."),
		StatusCode::INTERNAL_SERVER_ERROR =>
			fixed("Internal server error. Please try again later."),
		StatusCode::SERVICE_UNAVAILABLE =>
			fixed("Service temporarily unavailable. Please try again later."),
		_ => {
			let message = body_message(body, "message")
				.or_else(|| body_message(body, "error"))
				.unwrap_or_else(|| {
					format!("HTTP {}: {}", status.as_u16(), status.canonical_reason().unwrap_or(""))
						.trim_end()
						.to_owned()
				});

			ApiError::Http { status, message }
		},
	}
}

fn validation_error(status: StatusCode, body: Option<&Value>) -> ApiError {
	if let Some(errors) = body.and_then(|body| body.get("errors")).and_then(Value::as_array) {
		let messages = errors
			.iter()
			.map(|entry| match entry {
				Value::String(message) => message.clone(),
				other => other
					.get("message")
					.and_then(Value::as_str)
					.map(str::to_owned)
					.unwrap_or_else(|| other.to_string()),
			})
			.collect();

		return ApiError::Validation { messages };
	}

	let message =
		body_message(body, "message").unwrap_or_else(|| "Validation error occurred.".to_owned());

	ApiError::Http { status, message }
}

fn body_message(body: Option<&Value>, field: &str) -> Option<String> {
	body?.get(field)?.as_str().map(str::to_owned)
}
