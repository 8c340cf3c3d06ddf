//! Configuration for vaultkv
//!
//! Centralized, immutable configuration with sensible defaults. A `Config` is
//! built once (from the builder or from the environment) and handed to every
//! component; nothing reads the environment after construction.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::error::{Result, VaultError};

/// Main configuration for a vaultkv instance
#[derive(Debug, Clone)]
pub struct Config {
    // -------------------------------------------------------------------------
    // Storage Configuration
    // -------------------------------------------------------------------------
    /// Root directory for all data files
    /// Internal structure:
    ///   {data_dir}/
    ///     ├── data_store.json      (snapshot)
    ///     ├── data_store.log       (write-ahead log)
    ///     ├── data_store.journal   (crash-recovery journal)
    ///     └── sst_*.json           (immutable sorted tables)
    pub data_dir: PathBuf,

    /// Maximum entries retained in a snapshot
    pub max_entries: usize,

    /// Attempts made to write a snapshot when the file is transiently locked
    pub snapshot_retry_attempts: u32,

    /// Delay between snapshot write attempts
    pub snapshot_retry_delay: Duration,

    // -------------------------------------------------------------------------
    // WAL Configuration
    // -------------------------------------------------------------------------
    /// Sync strategy: how often to fsync WAL
    pub wal_sync_strategy: WalSyncStrategy,

    // -------------------------------------------------------------------------
    // MemTable / SSTable Configuration
    // -------------------------------------------------------------------------
    /// MemTable entry count at which the flush worker writes SSTables
    pub max_store_size: usize,

    /// Maximum entries per SSTable file written by a flush
    pub max_entries_per_sst: usize,

    /// SSTable count above which compaction runs
    pub max_sst_files: usize,

    /// Number of oldest SSTables merged per compaction round
    pub compaction_batch_size: usize,

    // -------------------------------------------------------------------------
    // Batch / Queue Configuration
    // -------------------------------------------------------------------------
    /// Sub-batch size for batch puts (before load adjustment)
    pub max_batch_size: usize,

    /// Maximum number of entries accepted in a single batch put
    pub max_batch_entries: usize,

    /// Pending writes (WAL records since the last snapshot) before writes are rejected
    pub max_queue_size: usize,

    /// Pause inserted between sub-batches under high load
    pub high_load_pause: Duration,

    // -------------------------------------------------------------------------
    // Admission Configuration
    // -------------------------------------------------------------------------
    /// Concurrent write permits
    pub write_limit: usize,

    /// Concurrent read permits
    pub read_limit: usize,

    /// Maximum wait for a permit before reporting overload
    pub admission_timeout: Duration,

    /// CPU percentage above which a check counts as overloaded
    pub cpu_high_threshold: f64,

    /// CPU percentage below which permits are released again
    pub cpu_low_threshold: f64,

    /// CPU percentage above which batches shrink to a quarter
    pub cpu_extreme_threshold: f64,

    /// CPU percentage above which batches shrink to a half
    pub cpu_moderate_threshold: f64,

    /// Consecutive overloaded checks that trip the write circuit breaker
    pub max_overload_count: u32,

    /// Measurement window of a single CPU sample
    pub load_sample_window: Duration,

    /// Interval between CPU samples
    pub load_sample_interval: Duration,

    // -------------------------------------------------------------------------
    // Background Workers
    // -------------------------------------------------------------------------
    /// Interval between snapshot saves (`SAVE_INTERVAL` is in minutes)
    pub save_interval: Duration,

    /// Interval between flush/compaction checks (`FLUSH_INTERVAL` is in seconds)
    pub flush_interval: Duration,

    /// Idle sleep of the scheduler drain loop when both queues are empty
    pub scheduler_idle: Duration,
}

/// WAL sync strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WalSyncStrategy {
    /// fsync after every write (safest, slowest)
    EveryWrite,

    /// fsync after N uncommitted entries (balanced durability/performance)
    EveryNEntries { count: usize },
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data"),
            max_entries: 5000,
            snapshot_retry_attempts: 3,
            snapshot_retry_delay: Duration::from_millis(100),
            wal_sync_strategy: WalSyncStrategy::EveryNEntries { count: 100 },
            max_store_size: 100,
            max_entries_per_sst: 1000,
            max_sst_files: 10,
            compaction_batch_size: 4,
            max_batch_size: 2000,
            max_batch_entries: 10_000,
            max_queue_size: 5000,
            high_load_pause: Duration::from_millis(50),
            write_limit: 1000,
            read_limit: 2000,
            admission_timeout: Duration::from_secs(5),
            cpu_high_threshold: 85.0,
            cpu_low_threshold: 60.0,
            cpu_extreme_threshold: 80.0,
            cpu_moderate_threshold: 60.0,
            max_overload_count: 3,
            load_sample_window: Duration::from_millis(500),
            load_sample_interval: Duration::from_secs(2),
            save_interval: Duration::from_secs(60),
            flush_interval: Duration::from_secs(60),
            scheduler_idle: Duration::from_millis(100),
        }
    }
}

impl Config {
    /// Create a new config builder
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Build a config from the process environment
    ///
    /// Unset variables keep their defaults; unparseable ones are errors.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build a config from an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Config::default();

        if let Some(path) = lookup("DATA_PATH") {
            config.data_dir = PathBuf::from(path);
        }

        config.max_batch_size = parse_var(&lookup, "MAX_BATCH_SIZE", config.max_batch_size)?;
        config.max_batch_entries =
            parse_var(&lookup, "MAX_BATCH_ENTRIES", config.max_batch_entries)?;
        config.max_queue_size = parse_var(&lookup, "MAX_QUEUE_SIZE", config.max_queue_size)?;
        config.write_limit = parse_var(&lookup, "WRITE_LIMIT", config.write_limit)?;
        config.read_limit = parse_var(&lookup, "READ_LIMIT", config.read_limit)?;
        config.cpu_high_threshold =
            parse_var(&lookup, "CPU_HIGH_THRESHOLD", config.cpu_high_threshold)?;
        config.cpu_low_threshold =
            parse_var(&lookup, "CPU_LOW_THRESHOLD", config.cpu_low_threshold)?;
        config.cpu_extreme_threshold =
            parse_var(&lookup, "CPU_EXTREME_THRESHOLD", config.cpu_extreme_threshold)?;
        config.cpu_moderate_threshold =
            parse_var(&lookup, "CPU_MODERATE_THRESHOLD", config.cpu_moderate_threshold)?;
        config.max_overload_count =
            parse_var(&lookup, "MAX_OVERLOAD_COUNT", config.max_overload_count)?;
        config.max_store_size = parse_var(&lookup, "MAX_STORE_SIZE", config.max_store_size)?;
        config.max_sst_files = parse_var(&lookup, "MAX_SST_FILES", config.max_sst_files)?;
        config.compaction_batch_size =
            parse_var(&lookup, "COMPACTION_BATCH_SIZE", config.compaction_batch_size)?;
        config.max_entries = parse_var(&lookup, "MAX_ENTRIES", config.max_entries)?;
        config.max_entries_per_sst =
            parse_var(&lookup, "MAX_ENTRIES_PER_SST", config.max_entries_per_sst)?;

        let save_mins: u64 =
            parse_var(&lookup, "SAVE_INTERVAL", config.save_interval.as_secs() / 60)?;
        config.save_interval = Duration::from_secs(save_mins.saturating_mul(60));

        let flush_secs: u64 =
            parse_var(&lookup, "FLUSH_INTERVAL", config.flush_interval.as_secs())?;
        config.flush_interval = Duration::from_secs(flush_secs);

        let timeout_ms: u64 = parse_var(
            &lookup,
            "ADMISSION_TIMEOUT_MS",
            config.admission_timeout.as_millis() as u64,
        )?;
        config.admission_timeout = Duration::from_millis(timeout_ms);

        let sample_ms: u64 = parse_var(
            &lookup,
            "LOAD_SAMPLE_INTERVAL_MS",
            config.load_sample_interval.as_millis() as u64,
        )?;
        config.load_sample_interval = Duration::from_millis(sample_ms);

        if let Some(raw) = lookup("WAL_SYNC_EVERY") {
            let count: usize = parse_value("WAL_SYNC_EVERY", &raw)?;
            config.wal_sync_strategy = match count {
                0 | 1 => WalSyncStrategy::EveryWrite,
                count => WalSyncStrategy::EveryNEntries { count },
            };
        }

        config.validate()?;
        Ok(config)
    }

    /// Reject configurations that cannot work
    pub fn validate(&self) -> Result<()> {
        let positive = [
            ("MAX_BATCH_SIZE", self.max_batch_size),
            ("MAX_BATCH_ENTRIES", self.max_batch_entries),
            ("MAX_QUEUE_SIZE", self.max_queue_size),
            ("WRITE_LIMIT", self.write_limit),
            ("READ_LIMIT", self.read_limit),
            ("MAX_ENTRIES", self.max_entries),
            ("MAX_ENTRIES_PER_SST", self.max_entries_per_sst),
            ("MAX_STORE_SIZE", self.max_store_size),
        ];

        for (name, value) in positive {
            if value == 0 {
                return Err(VaultError::Config(format!("{} must be greater than zero", name)));
            }
        }

        if self.cpu_low_threshold > self.cpu_high_threshold {
            return Err(VaultError::Config(format!(
                "CPU_LOW_THRESHOLD ({}) must not exceed CPU_HIGH_THRESHOLD ({})",
                self.cpu_low_threshold, self.cpu_high_threshold
            )));
        }

        if self.max_overload_count == 0 {
            return Err(VaultError::Config(
                "MAX_OVERLOAD_COUNT must be greater than zero".to_string(),
            ));
        }

        Ok(())
    }
}

fn parse_var<F, T>(lookup: &F, name: &str, default: T) -> Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(name) {
        Some(raw) => parse_value(name, &raw),
        None => Ok(default),
    }
}

fn parse_value<T: FromStr>(name: &str, raw: &str) -> Result<T> {
    raw.trim()
        .parse()
        .map_err(|_| VaultError::Config(format!("{} has an invalid value: '{}'", name, raw)))
}

/// Builder for Config
#[derive(Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Set the data directory (root for all storage)
    pub fn data_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.data_dir = path.into();
        self
    }

    /// Set the WAL sync strategy
    pub fn wal_sync_strategy(mut self, strategy: WalSyncStrategy) -> Self {
        self.config.wal_sync_strategy = strategy;
        self
    }

    /// Set the snapshot retention cap
    pub fn max_entries(mut self, count: usize) -> Self {
        self.config.max_entries = count;
        self
    }

    /// Set snapshot retry attempts and delay
    pub fn snapshot_retry(mut self, attempts: u32, delay: Duration) -> Self {
        self.config.snapshot_retry_attempts = attempts;
        self.config.snapshot_retry_delay = delay;
        self
    }

    /// Set the MemTable flush threshold (entry count)
    pub fn max_store_size(mut self, count: usize) -> Self {
        self.config.max_store_size = count;
        self
    }

    /// Set the maximum entries per SSTable file
    pub fn max_entries_per_sst(mut self, count: usize) -> Self {
        self.config.max_entries_per_sst = count;
        self
    }

    /// Set the SSTable count that triggers compaction
    pub fn max_sst_files(mut self, count: usize) -> Self {
        self.config.max_sst_files = count;
        self
    }

    /// Set the number of files merged per compaction round
    pub fn compaction_batch_size(mut self, count: usize) -> Self {
        self.config.compaction_batch_size = count;
        self
    }

    /// Set the batch put sub-batch size
    pub fn max_batch_size(mut self, count: usize) -> Self {
        self.config.max_batch_size = count;
        self
    }

    /// Set the maximum number of entries in one batch put
    pub fn max_batch_entries(mut self, count: usize) -> Self {
        self.config.max_batch_entries = count;
        self
    }

    /// Set the pending write queue capacity
    pub fn max_queue_size(mut self, count: usize) -> Self {
        self.config.max_queue_size = count;
        self
    }

    /// Set the pause between sub-batches under high load
    pub fn high_load_pause(mut self, pause: Duration) -> Self {
        self.config.high_load_pause = pause;
        self
    }

    /// Set the write and read permit limits
    pub fn permit_limits(mut self, write_limit: usize, read_limit: usize) -> Self {
        self.config.write_limit = write_limit;
        self.config.read_limit = read_limit;
        self
    }

    /// Set the maximum wait for an admission permit
    pub fn admission_timeout(mut self, timeout: Duration) -> Self {
        self.config.admission_timeout = timeout;
        self
    }

    /// Set the high/low CPU thresholds used by throttling
    pub fn cpu_thresholds(mut self, high: f64, low: f64) -> Self {
        self.config.cpu_high_threshold = high;
        self.config.cpu_low_threshold = low;
        self
    }

    /// Set the consecutive overloaded checks that trip the breaker
    pub fn max_overload_count(mut self, count: u32) -> Self {
        self.config.max_overload_count = count;
        self
    }

    /// Set the CPU sampling window and interval
    pub fn load_sampling(mut self, window: Duration, interval: Duration) -> Self {
        self.config.load_sample_window = window;
        self.config.load_sample_interval = interval;
        self
    }

    /// Set the snapshot interval
    pub fn save_interval(mut self, interval: Duration) -> Self {
        self.config.save_interval = interval;
        self
    }

    /// Set the flush/compaction interval
    pub fn flush_interval(mut self, interval: Duration) -> Self {
        self.config.flush_interval = interval;
        self
    }

    /// Set the scheduler idle sleep
    pub fn scheduler_idle(mut self, idle: Duration) -> Self {
        self.config.scheduler_idle = idle;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}
