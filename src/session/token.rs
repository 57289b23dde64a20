//! Bearer token decoding and expiry checks.
//!
//! Tokens are decoded without signature verification: the client only needs the claims to drive
//! its own session state, and the server remains the authority on validity.

// crates.io
use base64::prelude::*;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
// self
use crate::_prelude::*;

/// Claims carried in the payload segment of an access token.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct TokenClaims {
	/// Subject; the user identifier.
	#[serde(default, deserialize_with = "deserialize_identifier")]
	pub sub: Option<String>,
	/// Email address of the subject.
	#[serde(default)]
	pub email: Option<String>,
	/// Display name of the subject.
	#[serde(default)]
	pub name: Option<String>,
	/// Authorisation role.
	#[serde(default)]
	pub role: Option<String>,
	/// Expiry as seconds since the Unix epoch.
	#[serde(default, deserialize_with = "deserialize_numeric_date")]
	pub exp: Option<i64>,
	/// Any claims not modelled above.
	#[serde(flatten)]
	pub extra: Map<String, Value>,
}
impl TokenClaims {
	/// Expiry as a UTC timestamp.
	pub fn expires_at(&self) -> Option<DateTime<Utc>> {
		self.exp.and_then(|exp| DateTime::from_timestamp(exp, 0))
	}

	/// Whether the claims are expired at `now`; missing expiry counts as expired.
	pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
		match self.exp {
			Some(exp) => exp <= now.timestamp(),
			None => true,
		}
	}
}

/// Decode the payload segment of a three-part token.
///
/// Returns `None` for any malformed input.
pub fn parse_token(token: &str) -> Option<TokenClaims> {
	let mut segments = token.trim().split('.');
	let (Some(_header), Some(payload), Some(_signature), None) =
		(segments.next(), segments.next(), segments.next(), segments.next())
	else {
		tracing::debug!("token does not have three segments");

		return None;
	};
	let payload = payload.trim_end_matches('=');
	let bytes = match BASE64_URL_SAFE_NO_PAD
		.decode(payload)
		.or_else(|_| BASE64_STANDARD_NO_PAD.decode(payload))
	{
		Ok(bytes) => bytes,
		Err(err) => {
			tracing::debug!(error = %err, "token payload is not base64");

			return None;
		},
	};

	match serde_json::from_slice::<TokenClaims>(&bytes) {
		Ok(claims) => Some(claims),
		Err(err) => {
			tracing::debug!(error = %err, "token payload is not a JSON object");

			None
		},
	}
}

/// Whether `token` is unusable at the current wall-clock time.
pub fn is_token_expired(token: &str) -> bool {
	is_token_expired_at(token, Utc::now())
}

/// Whether `token` is unparseable, lacks an expiry, or expires at or before `now`.
pub fn is_token_expired_at(token: &str, now: DateTime<Utc>) -> bool {
	parse_token(token).map(|claims| claims.is_expired_at(now)).unwrap_or(true)
}

/// Time left until the token's expiry, saturating at zero.
pub fn time_until_expiry(exp: i64, now: DateTime<Utc>) -> Duration {
	let millis = exp.saturating_mul(1_000).saturating_sub(now.timestamp_millis());

	Duration::from_millis(millis.max(0) as u64)
}

fn deserialize_numeric_date<'de, D>(deserializer: D) -> std::result::Result<Option<i64>, D::Error>
where
	D: Deserializer<'de>,
{
	Ok(match Option::<Value>::deserialize(deserializer)? {
		Some(Value::Number(number)) =>
			number.as_i64().or_else(|| number.as_f64().map(|value| value.floor() as i64)),
		_ => None,
	})
}

fn deserialize_identifier<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
	D: Deserializer<'de>,
{
	Ok(match Option::<Value>::deserialize(deserializer)? {
		Some(Value::String(value)) => Some(value),
		Some(Value::Number(value)) => Some(value.to_string()),
		_ => None,
	})
}

#[cfg(test)]
mod tests {
	// crates.io
	use jsonwebtoken::{EncodingKey, Header};
	use serde_json::json;
	// self
	use super::*;

	fn mint(claims: Value) -> String {
		jsonwebtoken::encode(&Header::default(), &claims, &EncodingKey::from_secret(b"test"))
			.expect("token")
	}

	#[test]
	fn parses_known_claims_and_keeps_extras() {
		let token = mint(json!({
			"sub": 42,
			"email": "user@gmail.com",
			"role": "admin",
			"exp": 1_900_000_000,
			"iss": "blog"
		}));
		let claims = parse_token(&token).expect("claims");

		assert_eq!(claims.sub.as_deref(), Some("42"));
		assert_eq!(claims.email.as_deref(), Some("user@gmail.com"));
		assert_eq!(claims.role.as_deref(), Some("admin"));
		assert_eq!(claims.exp, Some(1_900_000_000));
		assert_eq!(claims.extra.get("iss"), Some(&json!("blog")));
	}

	#[test]
	fn malformed_tokens_parse_to_none() {
		for token in ["", "abc", "a.b", "a.b.c.d", "a.!!!.c", "a.bm90IGpzb24.c"] {
			assert!(parse_token(token).is_none(), "{token:?} should not parse");
		}
	}

	#[test]
	fn expiry_truth_table() {
		let now = Utc::now();
		let past = mint(json!({ "sub": "u", "exp": now.timestamp() - 60 }));
		let future = mint(json!({ "sub": "u", "exp": now.timestamp() + 3_600 }));
		let boundary = mint(json!({ "sub": "u", "exp": now.timestamp() }));
		let no_exp = mint(json!({ "sub": "u" }));

		assert!(is_token_expired_at(&past, now));
		assert!(is_token_expired_at(&boundary, now));
		assert!(is_token_expired_at(&no_exp, now));
		assert!(is_token_expired_at("garbage", now));
		assert!(!is_token_expired_at(&future, now));
	}

	#[test]
	fn fractional_expiry_is_floored() {
		let token = mint(json!({ "exp": 1_700_000_000.75 }));

		assert_eq!(parse_token(&token).and_then(|claims| claims.exp), Some(1_700_000_000));
	}

	#[test]
	fn time_until_expiry_saturates() {
		let now = DateTime::from_timestamp(1_000, 0).expect("timestamp");

		assert_eq!(time_until_expiry(1_060, now), Duration::from_secs(60));
		assert_eq!(time_until_expiry(900, now), Duration::ZERO);
	}
}
