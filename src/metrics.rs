//! Metrics helpers and per-call-site telemetry bookkeeping.

// std
use std::sync::atomic::{AtomicU64, Ordering};
#[cfg(feature = "prometheus")] use std::sync::OnceLock;
// crates.io
use metrics::Label;
#[cfg(feature = "prometheus")]
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use smallvec::SmallVec;
// self
use crate::_prelude::*;

type LabelSet = SmallVec<[Label; 2]>;

const METRIC_REQUESTS_TOTAL: &str = "blog_client_requests_total";
const METRIC_CACHE_HITS_TOTAL: &str = "blog_client_cache_hits_total";
const METRIC_CACHE_MISSES_TOTAL: &str = "blog_client_cache_misses_total";
const METRIC_RETRIES_TOTAL: &str = "blog_client_retries_total";
const METRIC_FAILURES_TOTAL: &str = "blog_client_failures_total";
const METRIC_REQUEST_DURATION: &str = "blog_client_request_duration_seconds";
const METRIC_TOKEN_REFRESH_TOTAL: &str = "blog_client_token_refresh_total";

/// Shared Prometheus handle installed by [`install_default_exporter`].
#[cfg(feature = "prometheus")]
static PROMETHEUS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Thread-safe metrics accumulator for a single call site.
#[derive(Debug, Default)]
pub struct RequestMetrics {
	total_requests: AtomicU64,
	cache_hits: AtomicU64,
	cache_misses: AtomicU64,
	retries: AtomicU64,
	failures: AtomicU64,
	last_duration_micros: AtomicU64,
}
impl RequestMetrics {
	/// Create a new metrics accumulator.
	pub fn new() -> Arc<Self> {
		Arc::new(Self::default())
	}

	/// Record an execution served from the response cache.
	pub fn record_hit(&self) {
		self.total_requests.fetch_add(1, Ordering::Relaxed);
		self.cache_hits.fetch_add(1, Ordering::Relaxed);
	}

	/// Record an execution that invoked the bound operation.
	pub fn record_miss(&self) {
		self.total_requests.fetch_add(1, Ordering::Relaxed);
		self.cache_misses.fetch_add(1, Ordering::Relaxed);
	}

	/// Record the latency of a settled operation.
	pub fn record_duration(&self, duration: Duration) {
		self.last_duration_micros.store(duration.as_micros() as u64, Ordering::Relaxed);
	}

	/// Record a scheduled retry.
	pub fn record_retry(&self) {
		self.retries.fetch_add(1, Ordering::Relaxed);
	}

	/// Record a terminal failure.
	pub fn record_failure(&self) {
		self.failures.fetch_add(1, Ordering::Relaxed);
	}

	/// Take a point-in-time snapshot for status reporting.
	pub fn snapshot(&self) -> RequestMetricsSnapshot {
		RequestMetricsSnapshot {
			total_requests: self.total_requests.load(Ordering::Relaxed),
			cache_hits: self.cache_hits.load(Ordering::Relaxed),
			cache_misses: self.cache_misses.load(Ordering::Relaxed),
			retries: self.retries.load(Ordering::Relaxed),
			failures: self.failures.load(Ordering::Relaxed),
			last_duration_micros: match self.last_duration_micros.load(Ordering::Relaxed) {
				0 => None,
				value => Some(value),
			},
		}
	}
}

/// Read-only snapshot of per-call-site telemetry counters.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RequestMetricsSnapshot {
	/// Executions that reached the cache check.
	pub total_requests: u64,
	/// Executions served from the cache.
	pub cache_hits: u64,
	/// Executions that invoked the bound operation.
	pub cache_misses: u64,
	/// Retries scheduled after failures.
	pub retries: u64,
	/// Failures surfaced to the caller after retries were exhausted.
	pub failures: u64,
	/// Microsecond latency of the most recent operation.
	pub last_duration_micros: Option<u64>,
}
impl RequestMetricsSnapshot {
	/// Ratio of cache hits to total executions.
	pub fn hit_rate(&self) -> f64 {
		if self.total_requests == 0 {
			0.0
		} else {
			self.cache_hits as f64 / self.total_requests as f64
		}
	}
}

/// Install the default Prometheus recorder backed by `metrics`.
///
/// Multiple invocations are safe; subsequent calls become no-ops once the recorder is installed.
#[cfg(feature = "prometheus")]
pub fn install_default_exporter() -> Result<()> {
	if PROMETHEUS_HANDLE.get().is_some() {
		return Ok(());
	}

	let handle = PrometheusBuilder::new().install_recorder()?;
	let _ = PROMETHEUS_HANDLE.set(handle);

	Ok(())
}

/// Access the global Prometheus exporter handle when installed.
#[cfg(feature = "prometheus")]
pub fn prometheus_handle() -> Option<&'static PrometheusHandle> {
	PROMETHEUS_HANDLE.get()
}

/// Record an execution answered from the cache.
pub fn record_cache_hit(call_site: &str) {
	let labels = base_labels(call_site);

	metrics::counter!(METRIC_REQUESTS_TOTAL, labels.iter()).increment(1);
	metrics::counter!(METRIC_CACHE_HITS_TOTAL, labels.iter()).increment(1);
}

/// Record an execution that had to invoke the bound operation.
pub fn record_cache_miss(call_site: &str) {
	let labels = base_labels(call_site);

	metrics::counter!(METRIC_REQUESTS_TOTAL, labels.iter()).increment(1);
	metrics::counter!(METRIC_CACHE_MISSES_TOTAL, labels.iter()).increment(1);
}

/// Record how long a settled operation took.
pub fn record_request_duration(call_site: &str, duration: Duration) {
	metrics::histogram!(METRIC_REQUEST_DURATION, base_labels(call_site).iter())
		.record(duration.as_secs_f64());
}

/// Record a scheduled retry.
pub fn record_retry(call_site: &str) {
	metrics::counter!(METRIC_RETRIES_TOTAL, base_labels(call_site).iter()).increment(1);
}

/// Record a failure surfaced to the caller.
pub fn record_failure(call_site: &str) {
	metrics::counter!(METRIC_FAILURES_TOTAL, base_labels(call_site).iter()).increment(1);
}

/// Record the outcome of a silent token refresh.
pub fn record_token_refresh(success: bool) {
	let status = if success { "success" } else { "error" };

	metrics::counter!(METRIC_TOKEN_REFRESH_TOTAL, "status" => status).increment(1);
}

fn base_labels(call_site: &str) -> LabelSet {
	let mut labels = LabelSet::new();

	labels.push(Label::new("call_site", call_site.to_owned()));

	labels
}
