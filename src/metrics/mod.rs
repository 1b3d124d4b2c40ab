#[cfg(test)]
mod metrics_test;

use std::sync::Once;

use lazy_static::lazy_static;
use prometheus::exponential_buckets;
use prometheus::Encoder;
use prometheus::Gauge;
use prometheus::HistogramOpts;
use prometheus::HistogramVec;
use prometheus::IntCounter;
use prometheus::IntCounterVec;
use prometheus::Opts;
use prometheus::Registry;
use prometheus::TextEncoder;
use tracing::warn;

lazy_static! {
    pub static ref OPERATION_RESULTS: IntCounterVec = IntCounterVec::new(
        Opts::new("failover_operation_results_total", "Workload operations by profile, kind and outcome"),
        &["profile", "kind", "outcome"]
    )
    .expect("metric can not be created");

    pub static ref OPERATION_LATENCY_MS: HistogramVec = HistogramVec::new(
        HistogramOpts::new("failover_operation_latency_ms", "Workload operation latency in ms")
            .buckets(exponential_buckets(1.0, 2.0, 16).expect("valid buckets")),
        &["profile", "kind"]
    )
    .expect("metric can not be created");

    pub static ref CLUSTER_POLL_FAILURES: IntCounter = IntCounter::new(
        "failover_cluster_poll_failures_total",
        "Topology polls that could not reach the replica set"
    )
    .expect("metric can not be created");

    pub static ref ELECTION_DURATION_SECONDS: Gauge = Gauge::new(
        "failover_election_duration_seconds",
        "Election duration measured by the most recent completed failover"
    )
    .expect("metric can not be created");

    pub static ref REGISTRY: Registry = Registry::new();
}

static REGISTER: Once = Once::new();

pub(crate) fn register_custom_metrics(registry: &Registry) {
    let collectors: Vec<Box<dyn prometheus::core::Collector>> = vec![
        Box::new(OPERATION_RESULTS.clone()),
        Box::new(OPERATION_LATENCY_MS.clone()),
        Box::new(CLUSTER_POLL_FAILURES.clone()),
        Box::new(ELECTION_DURATION_SECONDS.clone()),
    ];
    for collector in collectors {
        if let Err(e) = registry.register(collector) {
            warn!("collector can not be registered: {}", e);
        }
    }
}

/// Register the collectors with the crate registry, once per process
pub fn init_metrics() {
    REGISTER.call_once(|| register_custom_metrics(&REGISTRY));
}

/// Prometheus text exposition of the crate registry
pub fn gather_text() -> String {
    init_metrics();
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&REGISTRY.gather(), &mut buffer) {
        warn!("could not encode custom metrics: {}", e);
    }
    match String::from_utf8(buffer) {
        Ok(text) => text,
        Err(e) => {
            warn!("custom metrics could not be from_utf8'd: {}", e);
            String::default()
        }
    }
}
