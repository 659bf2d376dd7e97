//! Prometheus metrics surface.
//!
//! A single state/health gauge driven by the process lifecycle, plus a
//! per-handler request counter. Registration happens on first touch; the
//! counters are incremented lock-free by the service.

use lazy_static::lazy_static;
use prometheus::{
    IntCounterVec, IntGauge, Opts, TextEncoder, register_int_counter_vec, register_int_gauge,
};

/// Prometheus namespace of every gateway metric.
const NAMESPACE: &str = "s3_gw";
/// Subsystem of the health gauge.
const STATE_SUBSYSTEM: &str = "state";

lazy_static! {
    static ref HEALTH: IntGauge = register_int_gauge!(
        Opts::new("health", "Current S3 gateway state")
            .namespace(NAMESPACE)
            .subsystem(STATE_SUBSYSTEM)
    )
    .expect("health gauge registers once");
    static ref REQUESTS_TOTAL: IntCounterVec = register_int_counter_vec!(
        Opts::new("requests_total", "Number of handled S3 requests").namespace(NAMESPACE),
        &["handler", "status"]
    )
    .expect("request counter registers once");
}

/// Lifecycle states reported through the health gauge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthStatus {
    /// The listener is not yet accepting requests.
    Starting = 1,
    /// Serving traffic.
    Healthy = 2,
    /// Draining connections before exit.
    ShuttingDown = 3,
}

/// Publish the current lifecycle state.
pub fn set_health(status: HealthStatus) {
    HEALTH.set(status as i64);
}

/// Whether the gauge currently reports [`HealthStatus::Healthy`].
#[must_use]
pub fn is_healthy() -> bool {
    HEALTH.get() == HealthStatus::Healthy as i64
}

/// Count one handled request.
pub fn observe_request(handler: &str, status: http::StatusCode) {
    REQUESTS_TOTAL
        .with_label_values(&[handler, status.as_str()])
        .inc();
}

/// Encode the registry in the Prometheus text format.
#[must_use]
pub fn gather() -> String {
    let metric_families = prometheus::gather();
    TextEncoder::new()
        .encode_to_string(&metric_families)
        .unwrap_or_default()
}
