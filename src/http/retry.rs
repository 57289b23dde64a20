//! Retry utilities for failed call-site executions.

// crates.io
use serde::{Deserialize, Serialize};
// self
use crate::_prelude::*;

/// Default delay before the first retry.
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_millis(1_000);

/// Outcome of consulting the retry budget after a failure.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RetryDecision {
	/// Another attempt is permitted after `delay`.
	Retry {
		/// One-based number of the retry being scheduled.
		attempt: u32,
		/// Backoff to wait before the retry fires.
		delay: Duration,
	},
	/// No further attempts allowed; the failure is terminal.
	Exhausted,
}

/// Retry configuration for a call site.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
	/// Number of retries performed after the initial attempt; zero disables retrying.
	#[serde(default)]
	pub retry_count: u32,
	/// Base delay; attempt `n` waits `retry_delay * 2^n`.
	#[serde(default = "default_retry_delay")]
	pub retry_delay: Duration,
}
impl RetryPolicy {
	/// Policy that never retries.
	pub fn disabled() -> Self {
		Self::default()
	}

	/// Policy retrying `retry_count` times starting at `retry_delay`.
	pub fn new(retry_count: u32, retry_delay: Duration) -> Self {
		Self { retry_count, retry_delay }
	}

	/// Validate invariants for retry configuration.
	pub fn validate(&self) -> Result<()> {
		if self.retry_count > 0 && self.retry_delay.is_zero() {
			return Err(Error::Validation {
				field: "retry.retry_delay",
				reason: "Must be greater than zero when retries are enabled.".into(),
			});
		}
		if self.retry_count > 16 {
			return Err(Error::Validation {
				field: "retry.retry_count",
				reason: "Must be 16 or fewer.".into(),
			});
		}

		Ok(())
	}

	/// Exponential backoff for the zero-based retry `attempt`.
	pub fn compute_backoff(&self, attempt: u32) -> Duration {
		let exponent = attempt.min(31);

		self.retry_delay.saturating_mul(1u32 << exponent)
	}

	/// Decide whether a failure observed after `retries_used` retries may be retried.
	pub fn decide(&self, retries_used: u32) -> RetryDecision {
		if retries_used >= self.retry_count {
			tracing::debug!(attempt = retries_used, "retry budget exhausted");

			return RetryDecision::Exhausted;
		}

		let delay = self.compute_backoff(retries_used);

		tracing::debug!(attempt = retries_used + 1, ?delay, "retry backoff computed");

		RetryDecision::Retry { attempt: retries_used + 1, delay }
	}

	/// Whether retrying is enabled at all.
	pub fn is_enabled(&self) -> bool {
		self.retry_count > 0
	}
}
impl Default for RetryPolicy {
	fn default() -> Self {
		Self { retry_count: 0, retry_delay: DEFAULT_RETRY_DELAY }
	}
}

fn default_retry_delay() -> Duration {
	DEFAULT_RETRY_DELAY
}
