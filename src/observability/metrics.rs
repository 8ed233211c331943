use prometheus::{HistogramOpts, HistogramVec, IntCounter, IntCounterVec, IntGauge, Opts, Registry};
use tracing::info;
use std::sync::Arc;
use tokio::sync::OnceCell;


// Declare the static OnceCell to hold the Metrics.
static METRICS_INSTANCE: OnceCell<Arc<Metrics>> = OnceCell::const_new();

/// Asynchronously initializes and gets a reference to the static `Metrics`.
pub async fn get_metrics() -> &'static Arc<Metrics> {
    METRICS_INSTANCE.get_or_init(|| async {
        info!("Initializing Metrics ...");
        Metrics::new()}
    ).await
}


#[derive(Clone)]
pub struct Metrics {
    pub registry: Registry,

    // Refresh coordination
    pub refresh_operations: IntCounter,
    pub refresh_joined: IntCounter,
    pub refresh_timeouts: IntCounter,

    // Source attempts
    pub refresh_attempts: IntCounterVec,
    pub refresh_failures: IntCounterVec,
    pub refresh_attempt_duration: HistogramVec,

    // Resolver
    pub resolve_requests: IntCounterVec,

    // Cache
    pub cached_token_expiry_unix: IntGauge,

    // Refresh endpoint
    pub endpoint_responses: IntCounterVec,

    // Config/runtime
    pub config_validation_errors: IntCounter,
    pub up: IntGauge,
}

impl Metrics {
    fn new() -> Arc<Self> {
        let registry = Registry::new_custom(Some("sessionagent".into()), None).unwrap();

        let metrics: Arc<Metrics> = Arc::new(Self {
            // Coordination
            refresh_operations: IntCounter::new("refresh_operations_total", "Shared refresh operations started").unwrap(),
            refresh_joined: IntCounter::new("refresh_joined_total", "Callers attached to an in-flight refresh").unwrap(),
            refresh_timeouts: IntCounter::new("refresh_timeouts_total", "Shared refresh waits that hit the ceiling").unwrap(),

            // Source
            refresh_attempts: IntCounterVec::new(Opts::new("refresh_attempts_total", "Token fetch attempts by source"),&["source"],).unwrap(),
            refresh_failures: IntCounterVec::new(Opts::new("refresh_failures_total", "Token fetch failures by reason"),&["source", "reason"],).unwrap(),
            refresh_attempt_duration: HistogramVec::new(HistogramOpts::new("refresh_attempt_duration_seconds", "Token fetch duration seconds").buckets(vec![0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0]),&["source"],).unwrap(),

            resolve_requests: IntCounterVec::new(Opts::new("resolve_requests_total", "Access token resolutions by outcome"),&["outcome"],).unwrap(),

            // Cache
            cached_token_expiry_unix: IntGauge::new("cached_token_expiry_unix_seconds", "Expiry of the cached token, 0 when empty").unwrap(),

            endpoint_responses: IntCounterVec::new(Opts::new("refresh_endpoint_responses_total", "Refresh endpoint responses by result"),&["result"],).unwrap(),

            // Config/runtime
            config_validation_errors: IntCounter::new("config_validation_errors_total","Validation errors during startup",).unwrap(),
            up: IntGauge::new("up", "1 if service is healthy").unwrap(),

            registry,
        });

        // Register all metrics in the registry
        let reg = &metrics.registry;
        reg.register(Box::new(metrics.refresh_operations.clone())).unwrap();
        reg.register(Box::new(metrics.refresh_joined.clone())).unwrap();
        reg.register(Box::new(metrics.refresh_timeouts.clone())).unwrap();
        reg.register(Box::new(metrics.refresh_attempts.clone())).unwrap();
        reg.register(Box::new(metrics.refresh_failures.clone())).unwrap();
        reg.register(Box::new(metrics.refresh_attempt_duration.clone())).unwrap();
        reg.register(Box::new(metrics.resolve_requests.clone())).unwrap();
        reg.register(Box::new(metrics.cached_token_expiry_unix.clone())).unwrap();
        reg.register(Box::new(metrics.endpoint_responses.clone())).unwrap();
        reg.register(Box::new(metrics.config_validation_errors.clone())).unwrap();
        reg.register(Box::new(metrics.up.clone())).unwrap();

        metrics
    }
}
