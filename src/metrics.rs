/// Metrics Module - Prometheus Instrumentation
///
/// - Prometheus registry
/// - Clean helper API
/// - Label cardinality kept to fixed method/kind/event names
/// - Standard histogram buckets

use prometheus::{
    Encoder, Histogram, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, IntGauge, Opts,
    Registry, TextEncoder,
};
use lazy_static::lazy_static;
use std::time::Instant;

/// Standard latency buckets for histograms (seconds)
const LATENCY_BUCKETS: &[f64] = &[0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0, 10.0, 30.0, 60.0];

lazy_static! {
    /// Global Prometheus registry
    pub static ref REGISTRY: Registry = Registry::new();

    // ========================================================================
    // 1. RPC
    // ========================================================================

    /// RPC call duration
    /// Labels: method (eth_blockNumber, eth_getLogs, eth_getTransactionByHash, ...)
    pub static ref RPC_CALL_DURATION: HistogramVec = HistogramVec::new(
        HistogramOpts::new("gmtea_rpc_call_duration_seconds", "RPC call latency")
            .buckets(LATENCY_BUCKETS.to_vec()),
        &["method"]
    ).unwrap();

    /// RPC errors
    /// Labels: method, error_type (transport, missing, decode)
    pub static ref RPC_ERRORS: IntCounterVec = IntCounterVec::new(
        Opts::new("gmtea_rpc_errors_total", "RPC errors by method and type"),
        &["method", "error_type"]
    ).unwrap();

    /// Time spent waiting on the rate limiter
    pub static ref RATE_LIMIT_WAIT: Histogram = Histogram::with_opts(
        HistogramOpts::new("gmtea_rate_limit_wait_seconds", "Time spent waiting for an RPC token")
            .buckets(LATENCY_BUCKETS.to_vec())
    ).unwrap();

    // ========================================================================
    // 2. SCAN PIPELINE
    // ========================================================================

    /// Block-range chunks scanned
    pub static ref SCAN_CHUNKS: IntCounter = IntCounter::new(
        "gmtea_scan_chunks_total",
        "Block-range chunks scanned for contract logs"
    ).unwrap();

    /// Transactions whose sender matched the queried user
    pub static ref SCAN_MATCHED_TRANSACTIONS: IntCounter = IntCounter::new(
        "gmtea_scan_matched_transactions_total",
        "Transactions sent by the queried user"
    ).unwrap();

    /// Activities produced by the classifier
    /// Labels: kind (checkin, badge, username, message, reward)
    pub static ref ACTIVITIES_CLASSIFIED: IntCounterVec = IntCounterVec::new(
        Opts::new("gmtea_activities_classified_total", "Activities produced by kind"),
        &["kind"]
    ).unwrap();

    /// Decode failures that fell back to a generic description
    /// Labels: event
    pub static ref DECODE_FALLBACKS: IntCounterVec = IntCounterVec::new(
        Opts::new("gmtea_decode_fallbacks_total", "Event decode failures by event"),
        &["event"]
    ).unwrap();

    /// Placeholder check-ins synthesized during reconciliation
    pub static ref PLACEHOLDERS_ADDED: IntCounter = IntCounter::new(
        "gmtea_placeholders_added_total",
        "Placeholder check-in activities synthesized"
    ).unwrap();

    /// Full reconstruction pass duration
    pub static ref RECONSTRUCTION_DURATION: Histogram = Histogram::with_opts(
        HistogramOpts::new("gmtea_reconstruction_duration_seconds", "Activity reconstruction latency")
            .buckets(LATENCY_BUCKETS.to_vec())
    ).unwrap();

    /// Reconstruction passes by outcome
    /// Labels: outcome (success, error)
    pub static ref RECONSTRUCTIONS: IntCounterVec = IntCounterVec::new(
        Opts::new("gmtea_reconstructions_total", "Reconstruction passes by outcome"),
        &["outcome"]
    ).unwrap();

    // ========================================================================
    // 3. CACHE
    // ========================================================================

    pub static ref CACHE_HITS: IntCounter = IntCounter::new(
        "gmtea_activity_cache_hits_total",
        "Activity cache hits"
    ).unwrap();

    pub static ref CACHE_MISSES: IntCounter = IntCounter::new(
        "gmtea_activity_cache_misses_total",
        "Activity cache misses (absent, expired or unreadable)"
    ).unwrap();

    pub static ref CACHE_WRITE_ERRORS: IntCounter = IntCounter::new(
        "gmtea_activity_cache_write_errors_total",
        "Activity cache writes that failed and were dropped"
    ).unwrap();

    // ========================================================================
    // 4. FEED / SERVICE
    // ========================================================================

    /// Feed loads that hit the client-side timeout
    pub static ref FEED_TIMEOUTS: IntCounter = IntCounter::new(
        "gmtea_feed_timeouts_total",
        "Feed loads that stopped waiting after the timeout"
    ).unwrap();

    /// HTTP requests served
    /// Labels: endpoint, status
    pub static ref HTTP_REQUESTS: IntCounterVec = IntCounterVec::new(
        Opts::new("gmtea_http_requests_total", "HTTP requests by endpoint and status"),
        &["endpoint", "status"]
    ).unwrap();

    /// Service start time (unix seconds)
    pub static ref SERVICE_START_TIMESTAMP: IntGauge = IntGauge::new(
        "gmtea_service_start_timestamp_seconds",
        "Unix timestamp when the service started"
    ).unwrap();
}

/// Register all metrics with the global registry
///
/// Call once at startup before serving `/metrics`.
pub fn register_metrics() -> Result<(), Box<dyn std::error::Error>> {
    // RPC
    REGISTRY.register(Box::new(RPC_CALL_DURATION.clone()))?;
    REGISTRY.register(Box::new(RPC_ERRORS.clone()))?;
    REGISTRY.register(Box::new(RATE_LIMIT_WAIT.clone()))?;
    // Scan pipeline
    REGISTRY.register(Box::new(SCAN_CHUNKS.clone()))?;
    REGISTRY.register(Box::new(SCAN_MATCHED_TRANSACTIONS.clone()))?;
    REGISTRY.register(Box::new(ACTIVITIES_CLASSIFIED.clone()))?;
    REGISTRY.register(Box::new(DECODE_FALLBACKS.clone()))?;
    REGISTRY.register(Box::new(PLACEHOLDERS_ADDED.clone()))?;
    REGISTRY.register(Box::new(RECONSTRUCTION_DURATION.clone()))?;
    REGISTRY.register(Box::new(RECONSTRUCTIONS.clone()))?;
    // Cache
    REGISTRY.register(Box::new(CACHE_HITS.clone()))?;
    REGISTRY.register(Box::new(CACHE_MISSES.clone()))?;
    REGISTRY.register(Box::new(CACHE_WRITE_ERRORS.clone()))?;
    // Feed / service
    REGISTRY.register(Box::new(FEED_TIMEOUTS.clone()))?;
    REGISTRY.register(Box::new(HTTP_REQUESTS.clone()))?;
    REGISTRY.register(Box::new(SERVICE_START_TIMESTAMP.clone()))?;

    let now = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)?
        .as_secs();
    SERVICE_START_TIMESTAMP.set(now as i64);

    Ok(())
}

/// Gather metrics in Prometheus text format
pub fn gather_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = vec![];
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::error!(error = %e, "Failed to encode metrics");
        return String::new();
    }
    String::from_utf8(buffer).unwrap_or_default()
}

// ============================================================================
// HELPER FUNCTIONS - Clean API for instrumenting code
// ============================================================================

/// Timer for measuring durations
pub struct Timer {
    start: Instant,
}

impl Timer {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    pub fn elapsed_secs(&self) -> f64 {
        self.start.elapsed().as_secs_f64()
    }
}

impl Default for Timer {
    fn default() -> Self {
        Self::new()
    }
}

/// Record RPC call duration
pub fn record_rpc_call_duration(method: &str, duration_secs: f64) {
    RPC_CALL_DURATION.with_label_values(&[method]).observe(duration_secs);
}

/// Increment RPC errors
pub fn increment_rpc_errors(method: &str, error_type: &str) {
    RPC_ERRORS.with_label_values(&[method, error_type]).inc();
}

pub fn record_rate_limit_wait(duration_secs: f64) {
    RATE_LIMIT_WAIT.observe(duration_secs);
}

pub fn increment_scan_chunks() {
    SCAN_CHUNKS.inc();
}

pub fn increment_matched_transactions() {
    SCAN_MATCHED_TRANSACTIONS.inc();
}

pub fn increment_activities_classified(kind: &str) {
    ACTIVITIES_CLASSIFIED.with_label_values(&[kind]).inc();
}

pub fn increment_decode_fallbacks(event: &str) {
    DECODE_FALLBACKS.with_label_values(&[event]).inc();
}

pub fn increment_placeholders_added(count: u64) {
    PLACEHOLDERS_ADDED.inc_by(count);
}

/// Record a reconstruction pass
pub fn record_reconstruction(outcome: &str, duration_secs: f64) {
    RECONSTRUCTIONS.with_label_values(&[outcome]).inc();
    RECONSTRUCTION_DURATION.observe(duration_secs);
}

/// Record cache hit
pub fn increment_cache_hits() {
    CACHE_HITS.inc();
}

/// Record cache miss
pub fn increment_cache_misses() {
    CACHE_MISSES.inc();
}

pub fn increment_cache_write_errors() {
    CACHE_WRITE_ERRORS.inc();
}

pub fn increment_feed_timeouts() {
    FEED_TIMEOUTS.inc();
}

/// Record an HTTP request
pub fn increment_http_requests(endpoint: &str, status: u16) {
    let status = status.to_string();
    HTTP_REQUESTS
        .with_label_values(&[endpoint, status.as_str()])
        .inc();
}
