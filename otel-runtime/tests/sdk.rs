use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use opentelemetry_sdk::metrics::data::{Gauge, ResourceMetrics};
use opentelemetry_sdk::metrics::{InMemoryMetricExporter, SdkMeterProvider};
use otel_runtime::{register, RuntimeStats, RuntimeStatsConfig, PROCESS_KEY};

fn provider_with_exporter() -> (SdkMeterProvider, InMemoryMetricExporter) {
    let exporter = InMemoryMetricExporter::default();
    let provider = SdkMeterProvider::builder()
        .with_periodic_exporter(exporter.clone())
        .build();
    (provider, exporter)
}

/// Returns `(go_process value, observed value)` pairs of the named gauge in
/// the latest export, sorted by label.
fn exported_points(exported: &[ResourceMetrics], name: &str) -> Vec<(String, i64)> {
    let metric = exported
        .iter()
        .rev()
        .flat_map(|resource| resource.scope_metrics.iter())
        .flat_map(|scope| scope.metrics.iter())
        .find(|metric| metric.name == name)
        .unwrap_or_else(|| panic!("metric {} was not exported", name));

    let gauge = metric
        .data
        .as_any()
        .downcast_ref::<Gauge<i64>>()
        .expect("runtime stats are exported as an i64 gauge");

    let mut points: Vec<(String, i64)> = gauge
        .data_points
        .iter()
        .map(|point| {
            assert_eq!(point.attributes.len(), 1);
            assert_eq!(point.attributes[0].key.as_str(), PROCESS_KEY);
            (point.attributes[0].value.as_str().into_owned(), point.value)
        })
        .collect();
    points.sort();
    points
}

#[test]
fn test_flush_exports_four_labelled_points() {
    let (provider, exporter) = provider_with_exporter();

    let reads = Arc::new(AtomicUsize::new(0));
    let counter = reads.clone();
    let _gauge = register(
        RuntimeStatsConfig::new()
            .with_meter_provider(&provider)
            .with_stats_source(move || {
                counter.fetch_add(1, Ordering::SeqCst);
                let mut stats = RuntimeStats {
                    num_cpu: 4,
                    heap_alloc: 1000,
                    sys: 20000,
                    num_gc: 1,
                    ..Default::default()
                };
                stats.pause_ns[0] = 5000;
                stats
            }),
    );

    provider.force_flush().unwrap();

    assert!(reads.load(Ordering::SeqCst) >= 1);
    let exported = exporter.get_finished_metrics().unwrap();
    assert_eq!(
        exported_points(&exported, "go_runtime"),
        [
            ("cpu_goroutines".to_string(), 4),
            ("heap_alloc".to_string(), 1000),
            ("pause_ns".to_string(), 5000),
            ("sys_heap".to_string(), 20000),
        ]
    );

    provider.shutdown().unwrap();
}

#[test]
fn test_process_stats_through_sdk() {
    let (provider, exporter) = provider_with_exporter();

    register(
        RuntimeStatsConfig::new()
            .with_meter_provider(&provider)
            .with_metric_name("process_runtime"),
    );

    provider.force_flush().unwrap();
    let exported = exporter.get_finished_metrics().unwrap();
    let points = exported_points(&exported, "process_runtime");

    let labels: Vec<&str> = points.iter().map(|(label, _)| label.as_str()).collect();
    assert_eq!(labels, ["cpu_goroutines", "heap_alloc", "pause_ns", "sys_heap"]);
    assert!(points.iter().all(|(_, value)| *value >= 0));
    assert!(points.contains(&("pause_ns".to_string(), 0)));

    provider.shutdown().unwrap();
}
