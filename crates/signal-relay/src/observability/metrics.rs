//! Metrics definitions for Signal Relay.
//!
//! All metrics follow Prometheus naming conventions:
//! - `relay_` prefix
//! - `_total` suffix for counters
//! - `_seconds` suffix for duration histograms
//!
//! # Cardinality
//!
//! Labels are bounded; room and client identifiers are never used as labels:
//! - `type`: signaling types (8 values max)
//! - `reason`: parse failure or leave reasons (4 values each)
//! - `status`: small fixed sets per metric
//!
//! Recording goes through the global `metrics` recorder. Without an installed
//! recorder every call is a no-op, so core paths never depend on the sink.

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use std::time::Duration;

/// Initialize Prometheus metrics recorder and return the handle
/// for serving metrics via HTTP.
///
/// Must be called before any metrics are recorded.
///
/// # Errors
///
/// Returns error if Prometheus recorder fails to install (e.g., already installed).
pub fn init_metrics_recorder() -> Result<PrometheusHandle, String> {
    PrometheusBuilder::new()
        // Fan-out is in-memory queueing only; sub-millisecond is normal
        .set_buckets_for_metric(
            Matcher::Prefix("relay_signal_fanout".to_string()),
            &[
                0.000_01, 0.000_05, 0.000_1, 0.000_5, 0.001, 0.005, 0.010, 0.050, 0.100,
            ],
        )
        .map_err(|e| format!("Failed to set fan-out buckets: {e}"))?
        // Connection lifetimes range from seconds to hours
        .set_buckets_for_metric(
            Matcher::Prefix("relay_connection_duration".to_string()),
            &[
                1.0, 5.0, 30.0, 60.0, 300.0, 900.0, 1800.0, 3600.0, 7200.0, 14400.0,
            ],
        )
        .map_err(|e| format!("Failed to set connection duration buckets: {e}"))?
        .install_recorder()
        .map_err(|e| format!("Failed to install Prometheus metrics recorder: {e}"))
}

// ============================================================================
// Rooms
// ============================================================================

/// Metric: `relay_rooms_created_total`
pub fn record_room_created() {
    counter!("relay_rooms_created_total").increment(1);
}

/// Metric: `relay_rooms_reaped_total`
pub fn record_rooms_reaped(count: u64) {
    counter!("relay_rooms_reaped_total").increment(count);
}

/// Set the number of rooms in the registry.
///
/// Metric: `relay_rooms_active`
pub fn set_rooms_active(count: usize) {
    // usize to f64 conversion is safe for realistic room counts (< 2^53)
    #[allow(clippy::cast_precision_loss)]
    gauge!("relay_rooms_active").set(count as f64);
}

/// Metric: `relay_room_participants` (sum over all rooms)
pub fn participant_joined() {
    gauge!("relay_room_participants").increment(1.0);
}

/// Metric: `relay_room_participants` (sum over all rooms)
pub fn participant_left() {
    gauge!("relay_room_participants").decrement(1.0);
}

// ============================================================================
// Connections
// ============================================================================

/// Metric: `relay_connections_active`
pub fn connection_opened() {
    gauge!("relay_connections_active").increment(1.0);
}

/// Record a closed connection and its lifetime.
///
/// Metrics: `relay_connections_active`, `relay_connection_duration_seconds`,
/// `relay_connections_closed_total`
/// Labels: `reason` (left, disconnected, timeout, shutdown)
pub fn connection_closed(reason: &str, lifetime: Duration) {
    gauge!("relay_connections_active").decrement(1.0);
    counter!("relay_connections_closed_total", "reason" => reason.to_string()).increment(1);
    histogram!("relay_connection_duration_seconds").record(lifetime.as_secs_f64());
}

// ============================================================================
// Signaling
// ============================================================================

/// Record one inbound event relayed to the room.
///
/// Metric: `relay_signals_relayed_total`
/// Labels: `type`
pub fn record_signal_relayed(signal_type: &str) {
    counter!("relay_signals_relayed_total", "type" => signal_type.to_string()).increment(1);
}

/// Record deliveries dropped because a recipient channel was full.
///
/// Metric: `relay_signal_deliveries_dropped_total`
/// Labels: `type`
pub fn record_deliveries_dropped(signal_type: &str, count: u64) {
    counter!("relay_signal_deliveries_dropped_total", "type" => signal_type.to_string())
        .increment(count);
}

/// Metric: `relay_signal_parse_errors_total`
/// Labels: `reason` (invalid_json, unknown_type, invalid_data, server_only_type)
pub fn record_parse_error(reason: &str) {
    counter!("relay_signal_parse_errors_total", "reason" => reason.to_string()).increment(1);
}

/// Metric: `relay_signal_fanout_seconds`
pub fn record_fanout_duration(duration: Duration) {
    histogram!("relay_signal_fanout_seconds").record(duration.as_secs_f64());
}

// ============================================================================
// Accounts, chat and recordings
// ============================================================================

/// Metric: `relay_users_registered_total`
pub fn record_user_registered() {
    counter!("relay_users_registered_total").increment(1);
}

/// Metric: `relay_logins_total`
/// Labels: `status` (success, failure)
pub fn record_login(status: &str) {
    counter!("relay_logins_total", "status" => status.to_string()).increment(1);
}

/// Metric: `relay_chat_messages_total`
pub fn record_chat_message() {
    counter!("relay_chat_messages_total").increment(1);
}

/// Metric: `relay_recordings_total`
/// Labels: `status` (started, completed, failed)
pub fn record_recording(status: &str) {
    counter!("relay_recordings_total", "status" => status.to_string()).increment(1);
}
