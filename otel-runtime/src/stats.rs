//! Runtime statistics snapshots and the sources that produce them.

use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

/// Number of slots in the circular pause history.
pub const PAUSE_HISTORY_LEN: usize = 256;

/// A point-in-time snapshot of process runtime statistics.
///
/// All four reported values are derived from one snapshot so they are
/// mutually consistent.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RuntimeStats {
    /// Logical processing units available to the process.
    pub num_cpu: usize,

    /// Bytes currently allocated on the heap.
    pub heap_alloc: u64,

    /// Bytes obtained from the operating system.
    pub sys: u64,

    /// Circular buffer of recent pause durations in nanoseconds.
    ///
    /// The most recent pause lives at `(num_gc + 255) % 256`.
    pub pause_ns: [u64; PAUSE_HISTORY_LEN],

    /// Number of pauses recorded so far. Wraps on overflow.
    pub num_gc: u32,
}

impl Default for RuntimeStats {
    fn default() -> Self {
        Self {
            num_cpu: 0,
            heap_alloc: 0,
            sys: 0,
            pause_ns: [0; PAUSE_HISTORY_LEN],
            num_gc: 0,
        }
    }
}

impl RuntimeStats {
    /// Returns the duration of the most recent pause in nanoseconds.
    ///
    /// With no pauses recorded this reads the zero-initialised last slot of
    /// the history, so the result is `0` rather than an error.
    pub fn last_pause_ns(&self) -> u64 {
        self.pause_ns[last_slot(self.num_gc)]
    }
}

fn last_slot(num_gc: u32) -> usize {
    (num_gc as usize % PAUSE_HISTORY_LEN + PAUSE_HISTORY_LEN - 1) % PAUSE_HISTORY_LEN
}

/// Something that can produce [`RuntimeStats`] snapshots.
///
/// The reporter calls [`read`](StatsSource::read) exactly once per
/// collection cycle. It may be called concurrently from the meter's reader.
///
/// Closures returning a snapshot implement this trait, which is handy for
/// tests and for feeding statistics from a custom allocator:
///
/// ```
/// use otel_runtime::{RuntimeStats, RuntimeStatsConfig};
///
/// let config = RuntimeStatsConfig::new().with_stats_source(|| RuntimeStats {
///     num_cpu: 4,
///     ..Default::default()
/// });
/// ```
pub trait StatsSource: Send + Sync + 'static {
    /// Takes one snapshot of the current statistics.
    fn read(&self) -> RuntimeStats;
}

impl<F> StatsSource for F
where
    F: Fn() -> RuntimeStats + Send + Sync + 'static,
{
    fn read(&self) -> RuntimeStats {
        self()
    }
}

#[derive(Clone, Copy)]
struct PauseRing {
    pause_ns: [u64; PAUSE_HISTORY_LEN],
    num_gc: u32,
}

impl Default for PauseRing {
    fn default() -> Self {
        Self {
            pause_ns: [0; PAUSE_HISTORY_LEN],
            num_gc: 0,
        }
    }
}

/// A thread-safe circular history of pause durations.
///
/// Rust has no garbage collector, so the process itself never produces
/// pauses. Applications with stop-the-world phases (arena resets,
/// compactions, cache sweeps) can record them here and attach the history
/// to [`ProcessStats`](crate::ProcessStats) to have them reported under
/// the `pause_ns` label.
#[derive(Default)]
pub struct PauseHistory {
    ring: Mutex<PauseRing>,
}

impl PauseHistory {
    /// Creates an empty history.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records one pause.
    ///
    /// Durations beyond `u64::MAX` nanoseconds saturate.
    pub fn record(&self, pause: Duration) {
        let nanos = u64::try_from(pause.as_nanos()).unwrap_or(u64::MAX);
        let mut ring = self.ring.lock().unwrap_or_else(PoisonError::into_inner);
        let slot = ring.num_gc as usize % PAUSE_HISTORY_LEN;
        ring.pause_ns[slot] = nanos;
        ring.num_gc = ring.num_gc.wrapping_add(1);
    }

    /// Runs `f` and records how long it took as a pause.
    pub fn time<F, R>(&self, f: F) -> R
    where
        F: FnOnce() -> R,
    {
        let start = Instant::now();
        let rv = f();
        self.record(start.elapsed());
        rv
    }

    /// Returns the pause buffer and the pause count as one consistent pair.
    pub fn snapshot(&self) -> ([u64; PAUSE_HISTORY_LEN], u32) {
        let ring = *self.ring.lock().unwrap_or_else(PoisonError::into_inner);
        (ring.pause_ns, ring.num_gc)
    }

    /// Number of pauses recorded so far.
    pub fn count(&self) -> u32 {
        self.ring
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .num_gc
    }
}

impl std::fmt::Debug for PauseHistory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let (pause_ns, num_gc) = self.snapshot();
        f.debug_struct("PauseHistory")
            .field("num_gc", &num_gc)
            .field("last_pause_ns", &pause_ns[last_slot(num_gc)])
            .finish()
    }
}
