use super::*;

#[test]
fn test_record_keeps_totals_consistent() {
    let mut metrics = ProfileMetrics::default();

    metrics.record(OperationKind::Write, true, 10);
    metrics.record(OperationKind::Write, false, 2000);
    metrics.record(OperationKind::Read, true, 4);

    assert_eq!(metrics.total_writes, 2);
    assert_eq!(metrics.total_writes, metrics.successful_writes + metrics.failed_writes);
    assert_eq!(metrics.total_reads, 1);
    assert_eq!(metrics.total_reads, metrics.successful_reads + metrics.failed_reads);
    assert_eq!(metrics.total_failures(), 1);
    assert_eq!(metrics.total_successes(), 2);
}

#[test]
fn test_latency_max_and_rounded_average() {
    let mut metrics = ProfileMetrics::default();

    metrics.record(OperationKind::Write, true, 3);
    metrics.record(OperationKind::Write, true, 4);
    metrics.record(OperationKind::Read, false, 7);

    assert_eq!(metrics.max_write_latency, 4);
    // 3.5 rounds half up
    assert_eq!(metrics.avg_write_latency, 4);
    assert_eq!(metrics.write_latencies, vec![3, 4]);
    assert_eq!(metrics.avg_read_latency, 7);
    assert_eq!(metrics.max_read_latency, 7);
}

#[test]
fn test_empty_metrics_report_zero_averages() {
    let metrics = ProfileMetrics::default();
    assert_eq!(metrics.avg_write_latency, 0);
    assert_eq!(metrics.avg_read_latency, 0);
}

#[test]
fn test_serialized_shape_hides_running_sums() {
    let mut metrics = ProfileMetrics::default();
    metrics.record(OperationKind::Read, true, 12);

    let json = serde_json::to_value(&metrics).unwrap();

    assert_eq!(json["totalReads"], 1);
    assert_eq!(json["avgReadLatency"], 12);
    assert_eq!(json["readLatencies"], serde_json::json!([12]));
    assert!(json.get("readLatencySum").is_none());
    assert!(json.get("read_latency_sum").is_none());
}
