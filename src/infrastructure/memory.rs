//! Process Memory Probe
//!
//! Reads the process memory footprint for the housekeeping memory sweep.

use std::sync::Arc;

/// Memory figures for the current process, in bytes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemorySample {
    /// Resident set size (memory actually in use)
    pub used_bytes: u64,
    /// Virtual memory size
    pub total_bytes: u64,
}

impl MemorySample {
    pub fn used_mb(&self) -> u64 {
        self.used_bytes / (1024 * 1024)
    }

    pub fn total_mb(&self) -> u64 {
        self.total_bytes / (1024 * 1024)
    }
}

/// Source of memory samples
pub trait MemoryProbe: Send + Sync {
    /// Returns `None` when the platform offers no reading
    fn sample(&self) -> Option<MemorySample>;
}

/// Optional hook the memory sweep calls when usage crosses the ceiling,
/// e.g. to trim caches or ask the allocator to release memory.
pub type ReclaimHook = Arc<dyn Fn() + Send + Sync>;

/// Reads `VmRSS` and `VmSize` from `/proc/self/status`
#[derive(Debug, Default, Clone, Copy)]
pub struct ProcStatusProbe;

impl MemoryProbe for ProcStatusProbe {
    fn sample(&self) -> Option<MemorySample> {
        let status = std::fs::read_to_string("/proc/self/status").ok()?;
        parse_proc_status(&status)
    }
}

/// Parse the memory lines of a `/proc/<pid>/status` file
pub fn parse_proc_status(status: &str) -> Option<MemorySample> {
    let mut used = None;
    let mut total = None;

    for line in status.lines() {
        if let Some(rest) = line.strip_prefix("VmRSS:") {
            used = parse_kb(rest);
        } else if let Some(rest) = line.strip_prefix("VmSize:") {
            total = parse_kb(rest);
        }
    }

    Some(MemorySample {
        used_bytes: used?,
        total_bytes: total?,
    })
}

fn parse_kb(value: &str) -> Option<u64> {
    let kb: u64 = value.split_whitespace().next()?.parse().ok()?;
    Some(kb * 1024)
}
