//! Process runtime statistics for OpenTelemetry.
//!
//! This crate registers one observable gauge that reports four process
//! statistics on every collection. All four are exported under a single
//! metric name and told apart by the [`PROCESS_KEY`] attribute:
//!
//! - `cpu_goroutines` - logical processing units available
//! - `heap_alloc` - bytes allocated on the heap
//! - `pause_ns` - duration of the most recent recorded pause
//! - `sys_heap` - bytes obtained from the operating system
//!
//! Scheduling, aggregation and export are left to the meter's reader. No
//! threads are started by this crate.
//!
//! # Usage
//!
//! ```
//! use otel_runtime::RuntimeStatsConfig;
//!
//! // Reports `go_runtime` through `opentelemetry::global::meter("otelruntime")`.
//! otel_runtime::register(RuntimeStatsConfig::default());
//! ```
//!
//! A meter provider can be injected instead of relying on the global one:
//!
//! ```rust,ignore
//! use opentelemetry_sdk::metrics::SdkMeterProvider;
//! use otel_runtime::RuntimeStatsConfig;
//!
//! let provider = SdkMeterProvider::builder().build();
//! otel_runtime::register(
//!     RuntimeStatsConfig::new()
//!         .with_meter_provider(&provider)
//!         .with_metric_name("service_runtime"),
//! );
//! ```
//!
//! # Pauses
//!
//! Rust has no garbage collector, so `pause_ns` is zero unless the
//! application records its own stop-the-world phases into a
//! [`PauseHistory`] and attaches it to [`ProcessStats`].

#![warn(missing_docs)]

mod config;
mod error;
mod process;
mod reporter;
mod stats;

pub use config::RuntimeStatsConfig;
pub use error::StatsError;
pub use process::ProcessStats;
pub use reporter::{observe_stats, register, ProcessLabel};
pub use stats::{PauseHistory, RuntimeStats, StatsSource, PAUSE_HISTORY_LEN};

/// Attribute key that tells the reported statistics apart.
pub const PROCESS_KEY: &str = "go_process";

/// Metric name used unless configured otherwise.
pub const DEFAULT_METRIC_NAME: &str = "go_runtime";

/// Instrumentation scope of the default meter.
pub const INSTRUMENTATION_SCOPE: &str = "otelruntime";
