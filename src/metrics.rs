// Prometheus metrics definitions for the arena backend.

use std::sync::Once;

use lazy_static::lazy_static;
use prometheus::{
    Encoder, Histogram, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, IntGauge, Opts,
    Registry, TextEncoder,
};

lazy_static! {
    pub static ref REGISTRY: Registry = Registry::new();

    // ── Gauges ───────────────────────────────────────────────────────

    /// Matches currently ticking.
    pub static ref ACTIVE_MATCHES: IntGauge =
        IntGauge::new("arena_active_matches", "Matches currently running").unwrap();

    /// Live game socket connections.
    pub static ref CONNECTED_SOCKETS: IntGauge =
        IntGauge::new("arena_connected_sockets", "Live game socket connections").unwrap();

    /// Match worker threads currently active.
    pub static ref MATCH_WORKERS_ACTIVE: IntGauge =
        IntGauge::new("arena_match_workers_active", "Match worker threads currently active").unwrap();

    // ── Counters ─────────────────────────────────────────────────────

    pub static ref MATCHES_STARTED_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("arena_matches_started_total", "Total matches started"),
        &["map"],
    )
    .unwrap();

    pub static ref MATCHES_COMPLETED_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("arena_matches_completed_total", "Total matches completed"),
        &["reason"],
    )
    .unwrap();

    /// Matches whose worker panicked.
    pub static ref MATCHES_ERRORED_TOTAL: IntCounter = IntCounter::new(
        "arena_matches_errored_total",
        "Total matches that crashed",
    )
    .unwrap();

    pub static ref FRAMES_DECODED_TOTAL: IntCounter = IntCounter::new(
        "arena_frames_decoded_total",
        "Inbound frames decoded",
    )
    .unwrap();

    /// Protocol errors, by error kind.
    pub static ref PROTOCOL_ERRORS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("arena_protocol_errors_total", "Inbound protocol errors"),
        &["kind"],
    )
    .unwrap();

    /// Outbound messages, by routing target (unicast, match, global).
    pub static ref MESSAGES_SENT_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("arena_messages_sent_total", "Outbound messages queued to sockets"),
        &["target"],
    )
    .unwrap();

    pub static ref ENTITIES_SPAWNED_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("arena_entities_spawned_total", "Total entities spawned"),
        &["kind"],
    )
    .unwrap();

    pub static ref ENTITIES_KILLED_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("arena_entities_killed_total", "Total entities killed"),
        &["kind"],
    )
    .unwrap();

    pub static ref SKILLS_CAST_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("arena_skills_cast_total", "Total skills cast"),
        &["skill"],
    )
    .unwrap();

    /// Admin API requests, by method/endpoint/status.
    pub static ref API_REQUESTS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("arena_api_requests_total", "Total admin API requests"),
        &["method", "endpoint", "status"],
    )
    .unwrap();

    // ── Histograms ───────────────────────────────────────────────────

    /// Per-tick processing time in milliseconds.
    pub static ref TICK_DURATION_MS: Histogram = Histogram::with_opts(
        HistogramOpts::new("arena_tick_duration_ms", "Per-tick processing time in ms")
            .buckets(vec![0.1, 0.5, 1.0, 2.0, 5.0, 10.0, 25.0, 50.0, 100.0]),
    )
    .unwrap();

    pub static ref MATCH_DURATION_SECONDS: HistogramVec = HistogramVec::new(
        HistogramOpts::new("arena_match_duration_seconds", "Match duration in seconds")
            .buckets(vec![10.0, 30.0, 60.0, 120.0, 300.0, 600.0, 900.0, 1800.0]),
        &["reason"],
    )
    .unwrap();
}

static REGISTER: Once = Once::new();

/// Register all metrics with the custom registry. Safe to call more than once.
pub fn register_metrics() {
    REGISTER.call_once(|| {
        let collectors: Vec<Box<dyn prometheus::core::Collector>> = vec![
            Box::new(ACTIVE_MATCHES.clone()),
            Box::new(CONNECTED_SOCKETS.clone()),
            Box::new(MATCH_WORKERS_ACTIVE.clone()),
            Box::new(MATCHES_STARTED_TOTAL.clone()),
            Box::new(MATCHES_COMPLETED_TOTAL.clone()),
            Box::new(MATCHES_ERRORED_TOTAL.clone()),
            Box::new(FRAMES_DECODED_TOTAL.clone()),
            Box::new(PROTOCOL_ERRORS_TOTAL.clone()),
            Box::new(MESSAGES_SENT_TOTAL.clone()),
            Box::new(ENTITIES_SPAWNED_TOTAL.clone()),
            Box::new(ENTITIES_KILLED_TOTAL.clone()),
            Box::new(SKILLS_CAST_TOTAL.clone()),
            Box::new(API_REQUESTS_TOTAL.clone()),
            Box::new(TICK_DURATION_MS.clone()),
            Box::new(MATCH_DURATION_SECONDS.clone()),
        ];

        for c in collectors {
            if let Err(e) = REGISTRY.register(c) {
                tracing::error!(error = %e, "Failed to register metric");
            }
        }
    });
}

/// Serialize all registered metrics to the Prometheus text exposition format.
pub fn gather_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::error!(error = %e, "Failed to encode metrics");
    }
    String::from_utf8_lossy(&buffer).into_owned()
}

/// Normalize a URL path for metric labels: numeric and UUID segments become `:id`.
pub fn normalize_path(path: &str) -> String {
    path.split('/')
        .map(|segment| {
            if segment.parse::<i64>().is_ok() || uuid::Uuid::parse_str(segment).is_ok() {
                ":id"
            } else {
                segment
            }
        })
        .collect::<Vec<_>>()
        .join("/")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_path_no_ids() {
        assert_eq!(normalize_path("/api/matches"), "/api/matches");
        assert_eq!(normalize_path("/health"), "/health");
    }

    #[test]
    fn test_normalize_path_with_ids() {
        assert_eq!(normalize_path("/api/matches/42"), "/api/matches/:id");
        assert_eq!(
            normalize_path("/api/matches/6f9619ff-8b86-d011-b42d-00cf4fc964ff"),
            "/api/matches/:id"
        );
    }

    #[test]
    fn test_gather_metrics_after_register() {
        register_metrics();
        register_metrics();
        MATCHES_STARTED_TOTAL.with_label_values(&["arena"]).inc();
        let output = gather_metrics();
        assert!(output.contains("arena_matches_started_total"));
    }

    #[test]
    fn test_metric_increments() {
        CONNECTED_SOCKETS.inc();
        CONNECTED_SOCKETS.dec();

        PROTOCOL_ERRORS_TOTAL.with_label_values(&["truncated"]).inc();
        MESSAGES_SENT_TOTAL.with_label_values(&["unicast"]).inc();
        SKILLS_CAST_TOTAL.with_label_values(&["whirlwind"]).inc();
        assert!(SKILLS_CAST_TOTAL.with_label_values(&["whirlwind"]).get() >= 1);

        TICK_DURATION_MS.observe(1.5);
        MATCH_DURATION_SECONDS
            .with_label_values(&["winner"])
            .observe(300.0);
    }
}
