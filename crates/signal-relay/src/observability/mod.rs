//! Observability for Signal Relay: health probes and Prometheus metrics.
//!
//! # Privacy by Default
//!
//! Entry points use `#[instrument(skip_all)]` with explicit fields. Room and
//! client identifiers appear in logs, never in metric labels. Tokens and
//! passwords are never logged.
//!
//! # Metrics
//!
//! | Metric | Type | Labels |
//! |--------|------|--------|
//! | `relay_rooms_created_total` | Counter | none |
//! | `relay_rooms_reaped_total` | Counter | none |
//! | `relay_rooms_active` | Gauge | none |
//! | `relay_room_participants` | Gauge | none |
//! | `relay_connections_active` | Gauge | none |
//! | `relay_connections_closed_total` | Counter | `reason` |
//! | `relay_connection_duration_seconds` | Histogram | none |
//! | `relay_signals_relayed_total` | Counter | `type` |
//! | `relay_signal_deliveries_dropped_total` | Counter | `type` |
//! | `relay_signal_parse_errors_total` | Counter | `reason` |
//! | `relay_signal_fanout_seconds` | Histogram | none |
//! | `relay_users_registered_total` | Counter | none |
//! | `relay_logins_total` | Counter | `status` |
//! | `relay_chat_messages_total` | Counter | none |
//! | `relay_recordings_total` | Counter | `status` |

pub mod health;
pub mod metrics;

pub use health::{health_router, HealthState};
pub use metrics::init_metrics_recorder;
