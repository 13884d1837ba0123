//! Registers the runtime stats gauge with an SDK meter provider and prints
//! what one collection exports.

use std::sync::Arc;
use std::time::Duration;

use opentelemetry_sdk::metrics::{InMemoryMetricExporter, SdkMeterProvider};
use otel_runtime::{PauseHistory, ProcessStats, RuntimeStatsConfig, StatsSource};

fn main() {
    let exporter = InMemoryMetricExporter::default();
    let provider = SdkMeterProvider::builder()
        .with_periodic_exporter(exporter.clone())
        .build();

    // Record a simulated stop-the-world phase so `pause_ns` is non-zero.
    let pauses = Arc::new(PauseHistory::new());
    pauses.time(|| std::thread::sleep(Duration::from_millis(2)));

    let source = ProcessStats::new().with_pause_history(pauses.clone());
    let snapshot = source.read();
    println!("Runtime Stats Demo");
    println!("==================\n");
    println!("  cpus        {}", snapshot.num_cpu);
    println!("  heap_alloc  {} bytes", snapshot.heap_alloc);
    println!("  sys         {} bytes", snapshot.sys);
    println!("  last pause  {} ns\n", snapshot.last_pause_ns());

    otel_runtime::register(
        RuntimeStatsConfig::new()
            .with_meter_provider(&provider)
            .with_stats_source(source),
    );

    if let Err(err) = provider.force_flush() {
        eprintln!("flush failed: {}", err);
        return;
    }

    match exporter.get_finished_metrics() {
        Ok(metrics) => println!("{:#?}", metrics),
        Err(err) => eprintln!("could not read exported metrics: {}", err),
    }

    if let Err(err) = provider.shutdown() {
        eprintln!("shutdown failed: {}", err);
    }
}
