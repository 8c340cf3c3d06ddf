//! Admission Module
//!
//! CPU-aware backpressure in front of the store.
//!
//! ## Gates
//! - **Permits**: bounded read/write concurrency whose capacity shrinks while
//!   the CPU is hot and grows back once it cools
//! - **Circuit breaker**: after `max_overload_count` consecutive hot checks,
//!   writes are refused until a check comes back below the high threshold
//! - **Queue bound**: writes are refused once `max_queue_size` WAL records are
//!   waiting for the next snapshot or flush
//!
//! The CPU is sampled on a background worker; everything here reads the
//! cached sample and never measures on the request path.

mod permits;
mod sampler;

use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::time::Duration;

use crate::config::Config;
use crate::error::{Result, VaultError};

pub use permits::{PermitGuard, Permits};
pub use sampler::{LoadSampler, ProcStatSampler, StaticLoad};

/// Backpressure state shared by every store operation
pub struct AdmissionController {
    write_permits: Permits,
    read_permits: Permits,

    /// Latest CPU sample (f64 bits)
    cpu_usage: AtomicU64,
    /// Consecutive checks above the high threshold
    overload_count: AtomicU32,
    /// WAL records since the last snapshot or flush
    pending_writes: AtomicU64,

    permit_timeout: Duration,
    max_queue_size: u64,
    cpu_high_threshold: f64,
    cpu_low_threshold: f64,
    cpu_extreme_threshold: f64,
    cpu_moderate_threshold: f64,
    max_overload_count: u32,
}

impl AdmissionController {
    pub fn new(config: &Config) -> Self {
        Self {
            write_permits: Permits::new("write", config.write_limit),
            read_permits: Permits::new("read", config.read_limit),
            cpu_usage: AtomicU64::new(0f64.to_bits()),
            overload_count: AtomicU32::new(0),
            pending_writes: AtomicU64::new(0),
            permit_timeout: config.admission_timeout,
            max_queue_size: config.max_queue_size as u64,
            cpu_high_threshold: config.cpu_high_threshold,
            cpu_low_threshold: config.cpu_low_threshold,
            cpu_extreme_threshold: config.cpu_extreme_threshold,
            cpu_moderate_threshold: config.cpu_moderate_threshold,
            max_overload_count: config.max_overload_count,
        }
    }

    // =========================================================================
    // Gates
    // =========================================================================

    /// Reject a write while the queue is full or the breaker is open
    pub fn check_write(&self) -> Result<()> {
        let pending = self.pending_writes();
        if pending >= self.max_queue_size {
            return Err(VaultError::overload(format!(
                "write queue is full ({}/{})",
                pending, self.max_queue_size
            )));
        }

        if self.is_circuit_open() {
            return Err(VaultError::overload(format!(
                "circuit breaker open after {} overloaded checks",
                self.overload_count()
            )));
        }

        Ok(())
    }

    /// Wait for a write permit
    pub fn acquire_write(&self) -> Result<PermitGuard<'_>> {
        self.write_permits
            .acquire(self.permit_timeout)
            .ok_or_else(|| VaultError::overload("timed out waiting for a write permit"))
    }

    /// Wait for a read permit
    pub fn acquire_read(&self) -> Result<PermitGuard<'_>> {
        self.read_permits
            .acquire(self.permit_timeout)
            .ok_or_else(|| VaultError::overload("timed out waiting for a read permit"))
    }

    // =========================================================================
    // Load tracking
    // =========================================================================

    /// Record a fresh CPU sample and re-evaluate throttling
    pub fn observe(&self, usage: f64) {
        self.cpu_usage.store(usage.to_bits(), Ordering::Release);
        self.adjust_throttling();
    }

    /// Shrink permits while hot, grow them back once cool
    ///
    /// A hot check withholds one write permit and, only when that succeeded,
    /// one read permit. Reads are never throttled further than writes.
    pub fn adjust_throttling(&self) {
        let usage = self.cpu_usage();

        if usage > self.cpu_high_threshold {
            let count = self.overload_count.fetch_add(1, Ordering::AcqRel) + 1;
            if self.write_permits.try_shrink() {
                self.read_permits.try_shrink();
            }
            tracing::warn!(
                cpu = usage,
                overloaded_checks = count,
                write_capacity = self.write_permits.capacity(),
                "High CPU load, throttling"
            );
            return;
        }

        if self.overload_count.swap(0, Ordering::AcqRel) >= self.max_overload_count {
            tracing::info!(cpu = usage, "CPU load recovered, circuit breaker closed");
        }

        if usage < self.cpu_low_threshold {
            self.write_permits.grow();
            self.read_permits.grow();
        }
    }

    /// Latest cached CPU sample
    pub fn cpu_usage(&self) -> f64 {
        f64::from_bits(self.cpu_usage.load(Ordering::Acquire))
    }

    pub fn overload_count(&self) -> u32 {
        self.overload_count.load(Ordering::Acquire)
    }

    pub fn is_circuit_open(&self) -> bool {
        self.overload_count() >= self.max_overload_count
    }

    // =========================================================================
    // Queue
    // =========================================================================

    pub fn set_pending_writes(&self, count: u64) {
        self.pending_writes.store(count, Ordering::Release);
    }

    pub fn pending_writes(&self) -> u64 {
        self.pending_writes.load(Ordering::Acquire)
    }

    /// Sub-batch size for a batch put under the current load
    pub fn adjusted_batch_size(&self, max_batch_size: usize) -> usize {
        let usage = self.cpu_usage();
        let fill = self.queue_fill();

        let size = if usage > self.cpu_extreme_threshold || fill > 0.9 {
            max_batch_size / 4
        } else if usage > self.cpu_moderate_threshold || fill > 0.7 {
            max_batch_size / 2
        } else {
            max_batch_size
        };

        size.max(1)
    }

    pub fn is_under_high_load(&self) -> bool {
        self.queue_fill() > 0.7 || self.cpu_usage() > self.cpu_high_threshold
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    pub fn write_permits(&self) -> &Permits {
        &self.write_permits
    }

    pub fn read_permits(&self) -> &Permits {
        &self.read_permits
    }

    fn queue_fill(&self) -> f64 {
        if self.max_queue_size == 0 {
            return 1.0;
        }
        self.pending_writes() as f64 / self.max_queue_size as f64
    }
}
