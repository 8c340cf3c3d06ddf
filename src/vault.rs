//! Runtime
//!
//! A running store: the facade, its background workers and the priority
//! scheduler's drain loop.
//!
//! ## Example
//! ```no_run
//! use vaultkv::{Config, Priority, Vault};
//!
//! let vault = Vault::start(Config::builder().data_dir("./data").build())?;
//! vault.store().put("user:1", "alice")?;
//!
//! let reply = vault.submit(Priority::High, |store| store.read("user:1"));
//! assert_eq!(reply.recv().unwrap()?, Some("alice".to_string()));
//!
//! vault.shutdown()?;
//! # Ok::<(), vaultkv::VaultError>(())
//! ```

use std::sync::Arc;

use crossbeam::channel::{self, Receiver};

use crate::admission::{LoadSampler, ProcStatSampler};
use crate::background::{BackgroundWorkers, FlushTask, LoadSampleTask, SnapshotTask};
use crate::config::Config;
use crate::error::Result;
use crate::scheduler::{Priority, PriorityScheduler};
use crate::store::Store;

pub struct Vault {
    store: Arc<Store>,
    scheduler: Arc<PriorityScheduler>,
    workers: BackgroundWorkers,
}

impl Vault {
    /// Open the store and start sampling `/proc/stat`
    pub fn start(config: Config) -> Result<Self> {
        let sampler = Arc::new(ProcStatSampler::new(config.load_sample_window));
        Self::start_with_sampler(config, sampler)
    }

    /// Open the store with a custom CPU load source
    pub fn start_with_sampler(config: Config, sampler: Arc<dyn LoadSampler>) -> Result<Self> {
        let scheduler = Arc::new(PriorityScheduler::new(config.scheduler_idle));
        let store = Arc::new(Store::open(config)?);

        let mut workers = BackgroundWorkers::new();
        workers.register(Arc::new(SnapshotTask::new(Arc::clone(&store))))?;
        workers.register(Arc::new(FlushTask::new(Arc::clone(&store))))?;
        workers.register(Arc::new(LoadSampleTask::new(Arc::clone(&store), sampler)))?;

        let drain = Arc::clone(&scheduler);
        workers.spawn("vaultkv-scheduler", move |stop| drain.run(&stop))?;

        tracing::info!(workers = workers.len(), "Vault started");

        Ok(Self {
            store,
            scheduler,
            workers,
        })
    }

    pub fn store(&self) -> &Arc<Store> {
        &self.store
    }

    pub fn scheduler(&self) -> &PriorityScheduler {
        &self.scheduler
    }

    /// Queue a fire-and-forget action
    pub fn enqueue_request<F>(&self, priority: Priority, action: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.scheduler.enqueue(priority, action);
    }

    /// Queue an operation against the store and get its result back
    ///
    /// The receiver disconnects without a value if the job is dropped at
    /// shutdown.
    pub fn submit<F, R>(&self, priority: Priority, operation: F) -> Receiver<R>
    where
        F: FnOnce(&Store) -> R + Send + 'static,
        R: Send + 'static,
    {
        let (tx, rx) = channel::bounded(1);
        let store = Arc::clone(&self.store);

        self.scheduler.enqueue(priority, move || {
            let _ = tx.send(operation(&store));
        });
        rx
    }

    /// Stop the workers, then save a final snapshot and sync the WAL
    pub fn shutdown(mut self) -> Result<()> {
        self.workers.shutdown();
        self.store.close()
    }
}

impl Drop for Vault {
    fn drop(&mut self) {
        self.workers.shutdown();
    }
}
