use lazy_static::lazy_static;
use prometheus::{Counter, Encoder, Gauge, Histogram, HistogramOpts, Opts, Registry, TextEncoder};

lazy_static! {
    pub static ref REGISTRY: Registry = Registry::new();
    pub static ref UPDATES_TOTAL: Counter = Counter::with_opts(Opts::new(
        "hub_updates_total",
        "Total accepted update calls"
    ))
    .unwrap();
    pub static ref UNAUTHORIZED_TOTAL: Counter = Counter::with_opts(Opts::new(
        "hub_unauthorized_updates_total",
        "Total updates rejected for a bad API key"
    ))
    .unwrap();
    pub static ref DROPPED_FIELD_KEYS_TOTAL: Counter = Counter::with_opts(Opts::new(
        "hub_dropped_field_keys_total",
        "Total field keys ignored during updates"
    ))
    .unwrap();
    pub static ref SNAPSHOT_FAILURES_TOTAL: Counter = Counter::with_opts(Opts::new(
        "hub_snapshot_failures_total",
        "Total snapshot write failures"
    ))
    .unwrap();
    pub static ref UPDATE_LATENCY_SECONDS: Histogram = Histogram::with_opts(
        HistogramOpts::new(
            "hub_update_latency_seconds",
            "Time taken to apply one update call"
        )
        .buckets(vec![
            0.00001, 0.00005, 0.0001, 0.0005, 0.001, 0.005, 0.01, 0.05, 0.1
        ])
    )
    .unwrap();
    pub static ref CHANNELS_TOTAL: Gauge = Gauge::with_opts(Opts::new(
        "hub_channels",
        "Number of registered channels"
    ))
    .unwrap();
}

pub fn init_metrics() {
    REGISTRY.register(Box::new(UPDATES_TOTAL.clone())).unwrap();
    REGISTRY
        .register(Box::new(UNAUTHORIZED_TOTAL.clone()))
        .unwrap();
    REGISTRY
        .register(Box::new(DROPPED_FIELD_KEYS_TOTAL.clone()))
        .unwrap();
    REGISTRY
        .register(Box::new(SNAPSHOT_FAILURES_TOTAL.clone()))
        .unwrap();
    REGISTRY
        .register(Box::new(UPDATE_LATENCY_SECONDS.clone()))
        .unwrap();
    REGISTRY.register(Box::new(CHANNELS_TOTAL.clone())).unwrap();
}

pub fn gather_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer).unwrap();
    String::from_utf8(buffer).unwrap()
}
