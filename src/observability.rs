use std::net::SocketAddr;

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

// ── RED metrics (request-driven) ────────────────────────────────

/// Counter: HTTP requests served. Labels: route, method, status.
pub const HTTP_REQUESTS_TOTAL: &str = "learnslot_http_requests_total";

/// Histogram: HTTP request latency in seconds. Labels: route, method.
pub const HTTP_REQUEST_DURATION_SECONDS: &str = "learnslot_http_request_duration_seconds";

// ── Booking outcomes ────────────────────────────────────────────

pub const BOOKINGS_CREATED_TOTAL: &str = "learnslot_bookings_created_total";

pub const BOOKINGS_RESCHEDULED_TOTAL: &str = "learnslot_bookings_rescheduled_total";

pub const BOOKINGS_CANCELLED_TOTAL: &str = "learnslot_bookings_cancelled_total";

/// Counter: authorization denials on write paths. Labels: reason.
pub const BOOKING_DENIALS_TOTAL: &str = "learnslot_booking_denials_total";

// ── USE metrics (resource utilization) ──────────────────────────

/// Counter: the local copy served a read the primary failed, or took a write the primary could not be reached for.
pub const STORE_FALLBACKS_TOTAL: &str = "learnslot_store_fallbacks_total";

/// Histogram: WAL group-commit flush duration in seconds.
pub const WAL_FLUSH_DURATION_SECONDS: &str = "learnslot_wal_flush_duration_seconds";

/// Histogram: WAL group-commit batch size (events per flush).
pub const WAL_FLUSH_BATCH_SIZE: &str = "learnslot_wal_flush_batch_size";

pub const WAL_COMPACTIONS_TOTAL: &str = "learnslot_wal_compactions_total";

/// Install the Prometheus exporter on the given port. No-op if port is None.
pub fn init(port: Option<u16>) -> Result<(), BuildError> {
    let Some(port) = port else { return Ok(()) };
    let addr: SocketAddr = ([0, 0, 0, 0], port).into();
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!("metrics endpoint: http://0.0.0.0:{port}/metrics");
    Ok(())
}
