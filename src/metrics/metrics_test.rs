use super::*;

fn create_test_registry() -> Registry {
    let registry = Registry::new_custom(Some("test".to_string()), None).unwrap();
    register_custom_metrics(&registry);
    registry
}

#[test]
fn test_custom_registry() {
    let registry = create_test_registry();

    OPERATION_RESULTS
        .with_label_values(&["registry-probe", "write", "success"])
        .inc();
    CLUSTER_POLL_FAILURES.inc();

    let metric_names: Vec<String> = registry
        .gather()
        .iter()
        .map(|m| m.get_name().to_string())
        .collect();
    assert!(
        metric_names.contains(&"test_failover_operation_results_total".to_string()),
        "Missing operation results counter: {:?}",
        metric_names
    );
    assert!(metric_names.contains(&"test_failover_cluster_poll_failures_total".to_string()));
}

#[test]
fn test_counter_increment() {
    let counter = OPERATION_RESULTS.with_label_values(&["counter-probe", "read", "failure"]);
    let before = counter.get();

    counter.inc();
    counter.inc();

    assert_eq!(counter.get() - before, 2, "Counter should increment correctly");
}

#[test]
fn test_histogram_labels() {
    OPERATION_LATENCY_MS
        .with_label_values(&["histogram-probe", "write"])
        .observe(12.0);
    OPERATION_LATENCY_MS
        .with_label_values(&["histogram-probe", "write"])
        .observe(2500.0);

    let histogram = OPERATION_LATENCY_MS.with_label_values(&["histogram-probe", "write"]);
    assert_eq!(histogram.get_sample_count(), 2);
    assert_eq!(histogram.get_sample_sum(), 2512.0);
}

#[test]
fn test_gather_text_exposes_crate_metrics() {
    ELECTION_DURATION_SECONDS.set(6.1);
    OPERATION_RESULTS
        .with_label_values(&["text-probe", "read", "success"])
        .inc();

    let text = gather_text();

    assert!(text.contains("failover_election_duration_seconds"));
    assert!(text.contains("profile=\"text-probe\""));
}
