//! Background Workers
//!
//! Periodic maintenance on dedicated threads: snapshot saves, MemTable flushes
//! with compaction, and CPU sampling for admission control.
//!
//! Every loop selects on a shared crossbeam stop channel; dropping its sender
//! stops all of them at their next boundary. A failing run is logged and the
//! loop keeps its schedule.

use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam::channel::{self, Receiver, Sender};

use crate::admission::LoadSampler;
use crate::error::Result;
use crate::store::Store;

const MIN_INTERVAL: Duration = Duration::from_millis(1);

/// A periodic maintenance task
pub trait BackgroundTask: Send + Sync {
    /// Task name, also used for the thread name
    fn name(&self) -> &'static str;

    /// Delay between runs
    fn interval(&self) -> Duration;

    fn run(&self) -> Result<()>;
}

/// Owns the worker threads and their stop signal
pub struct BackgroundWorkers {
    stop_tx: Option<Sender<()>>,
    stop_rx: Receiver<()>,
    handles: Vec<JoinHandle<()>>,
}

impl BackgroundWorkers {
    pub fn new() -> Self {
        let (stop_tx, stop_rx) = channel::bounded(0);
        Self {
            stop_tx: Some(stop_tx),
            stop_rx,
            handles: Vec::new(),
        }
    }

    /// Run `task` every `task.interval()` until shutdown
    pub fn register(&mut self, task: Arc<dyn BackgroundTask>) -> Result<()> {
        let interval = task.interval().max(MIN_INTERVAL);

        self.spawn(task.name(), move |stop| {
            let ticker = channel::tick(interval);
            loop {
                channel::select! {
                    recv(stop) -> _ => break,
                    recv(ticker) -> _ => {
                        if let Err(e) = task.run() {
                            tracing::error!(task = task.name(), error = %e, "Background task failed");
                        }
                    }
                }
            }
            tracing::debug!(task = task.name(), "Background task stopped");
        })
    }

    /// Spawn a named thread that is handed the stop receiver
    pub fn spawn<F>(&mut self, name: &str, body: F) -> Result<()>
    where
        F: FnOnce(Receiver<()>) + Send + 'static,
    {
        let stop = self.stop_rx.clone();
        let handle = thread::Builder::new()
            .name(name.to_string())
            .spawn(move || body(stop))?;

        self.handles.push(handle);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    /// Signal every worker and wait for it to finish (idempotent)
    pub fn shutdown(&mut self) {
        drop(self.stop_tx.take());

        let current = thread::current().id();
        for handle in self.handles.drain(..) {
            // A job running on a worker may drop the owner; never self-join
            if handle.thread().id() == current {
                continue;
            }
            if handle.join().is_err() {
                tracing::error!("Background worker panicked");
            }
        }
    }
}

impl Default for BackgroundWorkers {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for BackgroundWorkers {
    fn drop(&mut self) {
        self.shutdown();
    }
}

// =============================================================================
// Tasks
// =============================================================================

/// Saves a snapshot every `save_interval`
pub struct SnapshotTask {
    store: Arc<Store>,
}

impl SnapshotTask {
    pub fn new(store: Arc<Store>) -> Self {
        Self { store }
    }
}

impl BackgroundTask for SnapshotTask {
    fn name(&self) -> &'static str {
        "vaultkv-snapshot"
    }

    fn interval(&self) -> Duration {
        self.store.config().save_interval
    }

    fn run(&self) -> Result<()> {
        self.store.save_snapshot().map(|_| ())
    }
}

/// Flushes a full MemTable, then compacts, every `flush_interval`
pub struct FlushTask {
    store: Arc<Store>,
}

impl FlushTask {
    pub fn new(store: Arc<Store>) -> Self {
        Self { store }
    }
}

impl BackgroundTask for FlushTask {
    fn name(&self) -> &'static str {
        "vaultkv-flush"
    }

    fn interval(&self) -> Duration {
        self.store.config().flush_interval
    }

    fn run(&self) -> Result<()> {
        self.store.flush_if_needed()?;
        self.store.compact()?;
        Ok(())
    }
}

/// Feeds CPU samples to the admission controller
pub struct LoadSampleTask {
    store: Arc<Store>,
    sampler: Arc<dyn LoadSampler>,
}

impl LoadSampleTask {
    pub fn new(store: Arc<Store>, sampler: Arc<dyn LoadSampler>) -> Self {
        Self { store, sampler }
    }
}

impl BackgroundTask for LoadSampleTask {
    fn name(&self) -> &'static str {
        "vaultkv-load-sampler"
    }

    fn interval(&self) -> Duration {
        self.store.config().load_sample_interval
    }

    fn run(&self) -> Result<()> {
        let usage = self.sampler.sample();
        self.store.admission().observe(usage);
        Ok(())
    }
}
