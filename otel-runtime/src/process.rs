//! Statistics of the running process.

use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::error::StatsError;
use crate::stats::{PauseHistory, RuntimeStats, StatsSource};

/// Reads [`RuntimeStats`] from the running process.
///
/// | field | `jemalloc` feature | Linux | macOS | Windows |
/// |---|---|---|---|---|
/// | `heap_alloc` | `stats.allocated` | `mallinfo2` in-use bytes (glibc only, 0 elsewhere) | 0 | process heap `cbAllocated` |
/// | `sys` | `stats.mapped` | `VmData` | current resident size | private commit (`PagefileUsage`) |
///
/// `num_cpu` is `std::thread::available_parallelism` and `pause_ns`/`num_gc`
/// come from the attached [`PauseHistory`], empty otherwise.
///
/// Memory figures that cannot be read are reported as zero. Only the first
/// failure of a source is logged at debug level.
#[derive(Debug, Default, Clone)]
pub struct ProcessStats {
    pauses: Option<Arc<PauseHistory>>,
    memory_failure_logged: Arc<AtomicBool>,
}

impl ProcessStats {
    /// Creates a new process stats source without pause history.
    pub fn new() -> Self {
        Self::default()
    }

    /// Reports pauses recorded in `history`.
    #[must_use]
    pub fn with_pause_history(mut self, history: Arc<PauseHistory>) -> Self {
        self.pauses = Some(history);
        self
    }

    fn first_memory_failure(&self) -> bool {
        !self.memory_failure_logged.swap(true, Ordering::Relaxed)
    }
}

impl StatsSource for ProcessStats {
    fn read(&self) -> RuntimeStats {
        let mut stats = RuntimeStats {
            num_cpu: num_cpu(),
            ..Default::default()
        };

        match read_memory() {
            Ok(memory) => {
                stats.heap_alloc = memory.heap;
                stats.sys = memory.sys;
            }
            Err(err) if self.first_memory_failure() => {
                log::debug!("runtime memory statistics unavailable: {}", err)
            }
            Err(err) => log::trace!("runtime memory statistics unavailable: {}", err),
        }

        if let Some(ref pauses) = self.pauses {
            let (pause_ns, num_gc) = pauses.snapshot();
            stats.pause_ns = pause_ns;
            stats.num_gc = num_gc;
        }

        stats
    }
}

fn num_cpu() -> usize {
    std::thread::available_parallelism()
        .map(NonZeroUsize::get)
        .unwrap_or(1)
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
struct MemoryUsage {
    heap: u64,
    sys: u64,
}

/// Gets heap and mapped bytes from jemalloc.
#[cfg(all(unix, feature = "jemalloc"))]
fn read_memory() -> Result<MemoryUsage, StatsError> {
    use tikv_jemalloc_ctl::{epoch, stats};

    let jemalloc_err = |err: tikv_jemalloc_ctl::Error| StatsError::Jemalloc(err.to_string());

    // Advance the epoch to get fresh stats
    epoch::advance().map_err(jemalloc_err)?;

    let heap = stats::allocated::read().map_err(jemalloc_err)? as u64;
    let sys = stats::mapped::read().map_err(jemalloc_err)? as u64;

    Ok(MemoryUsage { heap, sys })
}

/// Gets malloc in-use bytes and the private writable size from `/proc/self/status`.
#[cfg(all(target_os = "linux", not(feature = "jemalloc")))]
fn read_memory() -> Result<MemoryUsage, StatsError> {
    let status = std::fs::read_to_string("/proc/self/status")?;
    Ok(MemoryUsage {
        heap: malloc_in_use(),
        sys: status_field_bytes(&status, "VmData")?,
    })
}

/// Bytes handed out by glibc malloc, across all arenas plus mmapped chunks.
#[cfg(all(target_os = "linux", target_env = "gnu", not(feature = "jemalloc")))]
fn malloc_in_use() -> u64 {
    let info = unsafe { libc::mallinfo2() };
    (info.uordblks as u64).saturating_add(info.hblkhd as u64)
}

#[cfg(all(
    target_os = "linux",
    not(target_env = "gnu"),
    not(feature = "jemalloc")
))]
fn malloc_in_use() -> u64 {
    0
}

/// Gets the current resident size. Heap usage needs jemalloc on macOS.
#[cfg(all(target_os = "macos", not(feature = "jemalloc")))]
fn read_memory() -> Result<MemoryUsage, StatsError> {
    use std::mem;

    unsafe {
        let mut info: libc::proc_taskinfo = mem::zeroed();
        let size = mem::size_of::<libc::proc_taskinfo>() as libc::c_int;
        let written = libc::proc_pidinfo(
            libc::getpid(),
            libc::PROC_PIDTASKINFO,
            0,
            &mut info as *mut libc::proc_taskinfo as *mut libc::c_void,
            size,
        );
        if written == size {
            Ok(MemoryUsage {
                heap: 0,
                sys: info.pti_resident_size,
            })
        } else {
            Err(std::io::Error::last_os_error().into())
        }
    }
}

/// Gets the bytes allocated on the process heap and the private commit.
#[cfg(target_os = "windows")]
fn read_memory() -> Result<MemoryUsage, StatsError> {
    use windows_sys::Win32::System::Memory::{GetProcessHeap, HeapSummary, HEAPSUMMARY};
    use windows_sys::Win32::System::ProcessStatus::{
        GetProcessMemoryInfo, PROCESS_MEMORY_COUNTERS,
    };
    use windows_sys::Win32::System::Threading::GetCurrentProcess;

    unsafe {
        let process = GetCurrentProcess();
        let mut pmc: PROCESS_MEMORY_COUNTERS = std::mem::zeroed();
        pmc.cb = std::mem::size_of::<PROCESS_MEMORY_COUNTERS>() as u32;

        if GetProcessMemoryInfo(
            process,
            &mut pmc,
            std::mem::size_of::<PROCESS_MEMORY_COUNTERS>() as u32,
        ) == 0
        {
            return Err(std::io::Error::last_os_error().into());
        }

        // The system allocator serves Rust allocations from the process heap
        let mut summary: HEAPSUMMARY = std::mem::zeroed();
        summary.cb = std::mem::size_of::<HEAPSUMMARY>() as u32;
        let heap = if HeapSummary(GetProcessHeap(), 0, &mut summary) != 0 {
            summary.cbAllocated as u64
        } else {
            0
        };

        Ok(MemoryUsage {
            heap,
            sys: pmc.PagefileUsage as u64,
        })
    }
}

/// Fallback for unsupported platforms.
#[cfg(not(any(
    all(unix, feature = "jemalloc"),
    target_os = "linux",
    target_os = "macos",
    target_os = "windows"
)))]
fn read_memory() -> Result<MemoryUsage, StatsError> {
    Err(StatsError::Unsupported)
}

/// Reads a kB field out of `/proc/<pid>/status` as bytes.
#[cfg_attr(
    any(not(target_os = "linux"), feature = "jemalloc"),
    allow(dead_code)
)]
fn status_field_bytes(status: &str, field: &'static str) -> Result<u64, StatsError> {
    let raw = status
        .lines()
        .find_map(|line| {
            let (key, value) = line.split_once(':')?;
            (key == field).then(|| value.trim())
        })
        .ok_or(StatsError::MissingField(field))?;

    let kb = raw
        .strip_suffix("kB")
        .map(str::trim_end)
        .unwrap_or(raw)
        .parse::<u64>()
        .map_err(|_| StatsError::InvalidField {
            field,
            value: raw.to_owned(),
        })?;

    Ok(kb.saturating_mul(1024))
}
