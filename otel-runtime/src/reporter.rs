//! Registration of the runtime stats instrument.

use opentelemetry::metrics::{AsyncInstrument, ObservableGauge};
use opentelemetry::{global, KeyValue};

use crate::config::RuntimeStatsConfig;
use crate::stats::RuntimeStats;
use crate::{INSTRUMENTATION_SCOPE, PROCESS_KEY};

/// The value of the [`PROCESS_KEY`] attribute, one per reported statistic.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ProcessLabel {
    /// Logical processing units available to the process.
    Goroutines,
    /// Bytes currently allocated on the heap.
    Heap,
    /// Duration of the most recent pause in nanoseconds.
    Pause,
    /// Bytes obtained from the operating system.
    SysHeap,
}

impl ProcessLabel {
    /// All labels, in the order they are observed.
    pub const ALL: [ProcessLabel; 4] = [
        ProcessLabel::Goroutines,
        ProcessLabel::Heap,
        ProcessLabel::Pause,
        ProcessLabel::SysHeap,
    ];

    /// The attribute value as exported.
    pub fn as_str(self) -> &'static str {
        match self {
            ProcessLabel::Goroutines => "cpu_goroutines",
            ProcessLabel::Heap => "heap_alloc",
            ProcessLabel::Pause => "pause_ns",
            ProcessLabel::SysHeap => "sys_heap",
        }
    }

    /// Picks this label's value out of a snapshot.
    pub fn value(self, stats: &RuntimeStats) -> i64 {
        match self {
            ProcessLabel::Goroutines => saturating_i64(stats.num_cpu as u64),
            ProcessLabel::Heap => saturating_i64(stats.heap_alloc),
            ProcessLabel::Pause => saturating_i64(stats.last_pause_ns()),
            ProcessLabel::SysHeap => saturating_i64(stats.sys),
        }
    }
}

impl std::fmt::Display for ProcessLabel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

fn saturating_i64(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

/// Emits the four observations for one snapshot into `observer`.
pub fn observe_stats(stats: &RuntimeStats, observer: &dyn AsyncInstrument<i64>) {
    for label in ProcessLabel::ALL {
        observer.observe(
            label.value(stats),
            &[KeyValue::new(PROCESS_KEY, label.as_str())],
        );
    }
}

/// Registers the runtime stats gauge.
///
/// The configured meter (or the global meter for the `otelruntime` scope)
/// calls back into the reporter on every collection. Each callback reads one
/// snapshot from the configured source and observes it under the four
/// [`ProcessLabel`] values.
///
/// Problems with the instrument itself, such as an invalid or conflicting
/// name, are reported by the OpenTelemetry SDK's own diagnostics.
///
/// # Examples
///
/// ```
/// use otel_runtime::RuntimeStatsConfig;
///
/// otel_runtime::register(RuntimeStatsConfig::new().with_metric_name("my_service_runtime"));
/// ```
pub fn register(config: RuntimeStatsConfig) -> ObservableGauge<i64> {
    let RuntimeStatsConfig {
        meter,
        metric_name,
        source,
    } = config;

    let custom_meter = meter.is_some();
    let meter = meter.unwrap_or_else(|| global::meter(INSTRUMENTATION_SCOPE));

    log::debug!(
        "registering runtime stats instrument `{}` on the {} meter",
        metric_name,
        if custom_meter { "configured" } else { "global" }
    );

    meter
        .i64_observable_gauge(metric_name)
        .with_description("Process runtime statistics, keyed by the go_process attribute")
        .with_callback(move |observer| {
            let stats = source.read();
            observe_stats(&stats, observer);
        })
        .build()
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use rstest::rstest;

    use super::*;

    #[derive(Default)]
    struct Recorder {
        observed: Mutex<Vec<(i64, Vec<KeyValue>)>>,
    }

    impl AsyncInstrument<i64> for Recorder {
        fn observe(&self, measurement: i64, attributes: &[KeyValue]) {
            self.observed
                .lock()
                .unwrap()
                .push((measurement, attributes.to_vec()));
        }
    }

    fn sample_stats() -> RuntimeStats {
        let mut stats = RuntimeStats {
            num_cpu: 4,
            heap_alloc: 1000,
            sys: 20000,
            num_gc: 3,
            ..Default::default()
        };
        stats.pause_ns[2] = 5000;
        stats
    }

    #[rstest]
    #[case(ProcessLabel::Goroutines, "cpu_goroutines", 4)]
    #[case(ProcessLabel::Heap, "heap_alloc", 1000)]
    #[case(ProcessLabel::Pause, "pause_ns", 5000)]
    #[case(ProcessLabel::SysHeap, "sys_heap", 20000)]
    fn test_label_values(
        #[case] label: ProcessLabel,
        #[case] name: &str,
        #[case] expected: i64,
    ) {
        assert_eq!(label.as_str(), name);
        assert_eq!(label.to_string(), name);
        assert_eq!(label.value(&sample_stats()), expected);
    }

    #[test]
    fn test_observes_four_distinct_labels() {
        let recorder = Recorder::default();
        observe_stats(&sample_stats(), &recorder);

        let observed = recorder.observed.lock().unwrap();
        assert_eq!(observed.len(), 4);

        let mut labels: Vec<String> = observed
            .iter()
            .map(|(_, attrs)| {
                assert_eq!(attrs.len(), 1);
                assert_eq!(attrs[0].key.as_str(), PROCESS_KEY);
                attrs[0].value.as_str().into_owned()
            })
            .collect();
        labels.sort();
        labels.dedup();
        assert_eq!(labels, ["cpu_goroutines", "heap_alloc", "pause_ns", "sys_heap"]);

        let values: Vec<i64> = observed.iter().map(|(v, _)| *v).collect();
        assert_eq!(values, [4, 1000, 5000, 20000]);
    }

    #[test]
    fn test_observes_zero_pause_without_collections() {
        let recorder = Recorder::default();
        let stats = RuntimeStats {
            num_cpu: 2,
            ..Default::default()
        };
        observe_stats(&stats, &recorder);

        let observed = recorder.observed.lock().unwrap();
        let (pause, _) = observed
            .iter()
            .find(|(_, attrs)| attrs[0].value.as_str() == "pause_ns")
            .unwrap();
        assert_eq!(*pause, 0);
    }

    #[test]
    fn test_values_saturate() {
        let stats = RuntimeStats {
            sys: u64::MAX,
            ..Default::default()
        };
        assert_eq!(ProcessLabel::SysHeap.value(&stats), i64::MAX);
    }
}
