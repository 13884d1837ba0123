//! Configuration for the runtime stats reporter.

use std::borrow::Cow;
use std::sync::Arc;

use opentelemetry::metrics::{Meter, MeterProvider};
use opentelemetry::InstrumentationScope;

use crate::process::ProcessStats;
use crate::stats::StatsSource;
use crate::{DEFAULT_METRIC_NAME, INSTRUMENTATION_SCOPE};

/// Configuration for [`register`](crate::register).
///
/// Every setter overrides what an earlier call set, so the last write wins.
#[derive(Clone)]
pub struct RuntimeStatsConfig {
    /// Meter the instrument is registered with.
    ///
    /// Default: `None`, meaning the global meter for the `otelruntime` scope.
    pub meter: Option<Meter>,

    /// Name of the exported metric.
    ///
    /// Default: `go_runtime`
    pub metric_name: Cow<'static, str>,

    /// Where snapshots are read from.
    ///
    /// Default: [`ProcessStats`] without pause history.
    pub source: Arc<dyn StatsSource>,
}

impl Default for RuntimeStatsConfig {
    fn default() -> Self {
        Self {
            meter: None,
            metric_name: Cow::Borrowed(DEFAULT_METRIC_NAME),
            source: Arc::new(ProcessStats::new()),
        }
    }
}

impl RuntimeStatsConfig {
    /// Creates a new configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers with `meter` instead of the global meter.
    #[must_use]
    pub fn with_meter(mut self, meter: Meter) -> Self {
        self.meter = Some(meter);
        self
    }

    /// Registers with a meter obtained from `provider` for this crate's scope.
    #[must_use]
    pub fn with_meter_provider<P>(self, provider: &P) -> Self
    where
        P: MeterProvider + ?Sized,
    {
        let scope = InstrumentationScope::builder(INSTRUMENTATION_SCOPE)
            .with_version(env!("CARGO_PKG_VERSION"))
            .build();
        self.with_meter(provider.meter_with_scope(scope))
    }

    /// Exports the metric under `name` instead of `go_runtime`.
    #[must_use]
    pub fn with_metric_name(mut self, name: impl Into<Cow<'static, str>>) -> Self {
        self.metric_name = name.into();
        self
    }

    /// Reads snapshots from `source` instead of the running process.
    #[must_use]
    pub fn with_stats_source<S: StatsSource>(mut self, source: S) -> Self {
        self.source = Arc::new(source);
        self
    }
}

impl std::fmt::Debug for RuntimeStatsConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RuntimeStatsConfig")
            .field("meter", &self.meter.as_ref().map(|_| "custom").unwrap_or("global"))
            .field("metric_name", &self.metric_name)
            .finish_non_exhaustive()
    }
}
