//! CPU load sources

use std::fs;
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread;
use std::time::Duration;

/// Source of system CPU utilization, in percent
pub trait LoadSampler: Send + Sync {
    /// Measure current utilization (0.0 - 100.0). May block.
    fn sample(&self) -> f64;
}

/// Measures utilization from `/proc/stat` over a fixed window
///
/// Reports 0 where `/proc/stat` is unavailable.
pub struct ProcStatSampler {
    window: Duration,
}

impl ProcStatSampler {
    pub fn new(window: Duration) -> Self {
        Self { window }
    }
}

impl LoadSampler for ProcStatSampler {
    fn sample(&self) -> f64 {
        let Some(before) = read_cpu_times() else {
            return 0.0;
        };
        thread::sleep(self.window);
        let Some(after) = read_cpu_times() else {
            return 0.0;
        };

        let total = after.total.saturating_sub(before.total);
        let idle = after.idle.saturating_sub(before.idle);
        if total == 0 {
            return 0.0;
        }

        (total - idle) as f64 * 100.0 / total as f64
    }
}

/// A fixed, externally settable load
pub struct StaticLoad {
    bits: AtomicU64,
}

impl StaticLoad {
    pub fn new(usage: f64) -> Self {
        Self {
            bits: AtomicU64::new(usage.to_bits()),
        }
    }

    pub fn set(&self, usage: f64) {
        self.bits.store(usage.to_bits(), Ordering::Relaxed);
    }
}

impl LoadSampler for StaticLoad {
    fn sample(&self) -> f64 {
        f64::from_bits(self.bits.load(Ordering::Relaxed))
    }
}

struct CpuTimes {
    total: u64,
    /// idle + iowait
    idle: u64,
}

/// Aggregate `cpu` line: user nice system idle iowait irq softirq steal ...
fn read_cpu_times() -> Option<CpuTimes> {
    let stat = fs::read_to_string("/proc/stat").ok()?;
    let line = stat.lines().find(|l| l.starts_with("cpu "))?;

    let fields: Vec<u64> = line
        .split_whitespace()
        .skip(1)
        .filter_map(|f| f.parse().ok())
        .collect();
    if fields.len() < 4 {
        return None;
    }

    // guest time is already counted in user
    let total: u64 = fields.iter().take(8).sum();
    let idle = fields[3] + fields.get(4).copied().unwrap_or(0);
    Some(CpuTimes { total, idle })
}
