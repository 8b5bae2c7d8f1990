use std::time::Duration;

use metrics::{counter, histogram};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

pub const REQUEST_LATENCY_MS: &str = "kclassify_request_latency_ms";
pub const REQUESTS_TOTAL: &str = "kclassify_requests_total";
pub const REQUEST_FAILURES_TOTAL: &str = "kclassify_request_failures_total";

/// Installs the global subscriber: logs to stderr, filtered by `RUST_LOG`
/// (falling back to `info`, or `debug` when `verbose`).
///
/// Returns false when a subscriber was already installed.
pub fn init_tracing(verbose: bool) -> bool {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
        .try_init()
        .is_ok()
}

/// Records one inference call on the metrics facade.
pub fn record_request(model: &str, latency: Duration, success: bool) {
    let model = model.to_string();
    histogram!(
        REQUEST_LATENCY_MS,
        latency.as_secs_f64() * 1000.0,
        "model" => model.clone()
    );
    counter!(REQUESTS_TOTAL, 1, "model" => model.clone());
    if !success {
        counter!(REQUEST_FAILURES_TOTAL, 1, "model" => model);
    }
}
