//! Counters and histograms recorded through the `metrics` facade.
//!
//! Without an installed recorder every call is a no-op; the `server` feature
//! installs a Prometheus recorder and renders it on `/metrics`.

use metrics::{counter, gauge, histogram};
use std::time::Duration;

#[cfg(feature = "server")]
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
#[cfg(feature = "server")]
use std::sync::OnceLock;

#[cfg(feature = "server")]
static PROMETHEUS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

#[cfg(feature = "server")]
pub fn init_metrics() {
    match PrometheusBuilder::new().install_recorder() {
        Ok(handle) => {
            if PROMETHEUS_HANDLE.set(handle).is_err() {
                tracing::warn!("Metrics recorder already initialized");
                return;
            }

            // Initialize metrics with zero values
            counter!("domain_checks_total", "tld" => "unknown").absolute(0);
            counter!("domain_rate_limited_total").absolute(0);
            counter!("domain_key_rotations_total").absolute(0);
            counter!("domain_cache_hits_total").absolute(0);
            counter!("domain_cache_misses_total").absolute(0);
            counter!("domain_errors_total", "error_type" => "unknown").absolute(0);
            histogram!("domain_lookup_duration_seconds").record(0.0);
        }
        Err(e) => {
            tracing::error!("Failed to install metrics recorder: {}", e);
        }
    }
}

/// Prometheus text exposition, or `None` before [`init_metrics`] succeeded.
#[cfg(feature = "server")]
pub fn render() -> Option<String> {
    PROMETHEUS_HANDLE.get().map(|handle| handle.render())
}

pub fn increment_checks(domain: &str) {
    let tld = extract_tld(domain);
    counter!("domain_checks_total", "tld" => tld).increment(1);
}

pub fn increment_rate_limited() {
    counter!("domain_rate_limited_total").increment(1);
}

pub fn increment_key_rotations() {
    counter!("domain_key_rotations_total").increment(1);
}

pub fn increment_cache_hits() {
    counter!("domain_cache_hits_total").increment(1);
}

pub fn increment_cache_misses() {
    counter!("domain_cache_misses_total").increment(1);
}

pub fn increment_errors(error_type: &'static str) {
    counter!("domain_errors_total", "error_type" => error_type).increment(1);
}

pub fn record_lookup_time(duration: Duration) {
    histogram!("domain_lookup_duration_seconds").record(duration.as_secs_f64());
}

pub fn set_remaining_keys(remaining: usize) {
    gauge!("domain_api_keys_remaining").set(remaining as f64);
}

// TLDs that get their own label value; everything else is "other"
const TRACKED_TLDS: &[&str] = &[
    "com", "net", "org", "io", "dev", "app", "ai", "co", "info", "biz", "me", "xyz", "uk", "de", "fr", "nl",
    "ru", "cn", "jp", "in", "br", "au", "ca", "us", "eu",
];

fn extract_tld(domain: &str) -> &'static str {
    let Some(tld) = domain.rsplit('.').next().filter(|tld| !tld.is_empty()) else {
        return "unknown";
    };
    TRACKED_TLDS
        .iter()
        .find(|known| known.eq_ignore_ascii_case(tld))
        .copied()
        .unwrap_or("other")
}
