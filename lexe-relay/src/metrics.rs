//! Metrics emitted over a relay instance's lifetime (§4.6).
//!
//! Kept as a couple of free functions rather than a struct of pre-registered
//! handles: each instance is short-lived and the label set (failure class,
//! success/failure) isn't known until the instance actually terminates, so
//! there's nothing worth caching between calls.

use std::time::Duration;

use crate::failure::UpstreamFailure;

const RELAY_TYPE: &str = "trampoline";

/// Increments the relay-failure counter, tagged by failure class (§4.6
/// "Increment relay-failure counter tagged by failure class name on every
/// rejection").
pub fn record_relay_failure(failure: &UpstreamFailure) {
    metrics::counter!("relay_failed_total", "reason" => failure.as_str()).increment(1);
}

/// Records the relay duration histogram from Sending-entry to Stopping,
/// tagged by success/failure and relay type (§4.6 "Record relay duration").
pub fn record_relay_duration(duration: Duration, success: bool) {
    metrics::histogram!(
        "relay_duration_seconds",
        "relay_type" => RELAY_TYPE,
        "success" => if success { "true" } else { "false" },
    )
    .record(duration.as_secs_f64());
}
