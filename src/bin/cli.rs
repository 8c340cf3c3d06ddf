//! vaultkv CLI
//!
//! Operates a data directory directly: opens the store, runs one command,
//! then saves a snapshot and exits.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, EnvFilter};
use vaultkv::{Config, Store, VaultError};

/// vaultkv CLI
#[derive(Parser, Debug)]
#[command(name = "vaultkv-cli")]
#[command(about = "Local command-line access to a vaultkv data directory")]
#[command(version)]
struct Args {
    /// Data directory (overrides DATA_PATH)
    #[arg(short, long)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Set a key-value pair
    Put {
        /// The key to set
        key: String,

        /// The value to set
        value: String,
    },

    /// Get a value by key
    Get {
        /// The key to get
        key: String,
    },

    /// Delete a key
    Del {
        /// The key to delete
        key: String,
    },

    /// List keys between two bounds (inclusive)
    Range {
        start: String,
        end: String,

        #[arg(long, default_value = "50")]
        page_size: usize,

        #[arg(long, default_value = "1")]
        page: usize,

        /// Print the page as JSON
        #[arg(long)]
        json: bool,
    },

    /// Set several pairs given as key=value
    Batch {
        #[arg(required = true)]
        pairs: Vec<String>,
    },

    /// Flush the MemTable into SSTables
    Flush,

    /// Compact SSTables
    Compact,

    /// Save a snapshot and truncate the WAL
    Snapshot,

    /// Show store statistics as JSON
    Stats,
}

fn main() -> ExitCode {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,vaultkv=debug"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(args: Args) -> Result<(), VaultError> {
    let mut config = Config::from_env()?;
    if let Some(dir) = args.data_dir {
        config.data_dir = dir;
    }

    tracing::debug!(version = vaultkv::VERSION, dir = %config.data_dir.display(), "Opening store");
    let store = Store::open(config)?;

    match args.command {
        Commands::Put { key, value } => {
            store.put(&key, &value)?;
            println!("OK");
        }
        Commands::Get { key } => match store.read(&key)? {
            Some(value) => println!("{}", value),
            None => println!("(nil)"),
        },
        Commands::Del { key } => {
            store.delete(&key)?;
            println!("OK");
        }
        Commands::Range {
            start,
            end,
            page_size,
            page,
            json,
        } => {
            let result = store.range_read(&start, &end, page_size, page)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&result)?);
            } else {
                for (key, value) in &result.entries {
                    println!("{}\t{}", key, value);
                }
                println!("({} of {} keys)", result.entries.len(), result.total);
            }
        }
        Commands::Batch { pairs } => {
            let entries = pairs
                .iter()
                .map(|pair| {
                    pair.split_once('=').ok_or_else(|| {
                        VaultError::Validation(format!("expected key=value, got '{}'", pair))
                    })
                })
                .collect::<Result<Vec<_>, _>>()?;
            let accepted = store.batch_put(entries)?;
            println!("OK ({} entries)", accepted.len());
        }
        Commands::Flush => {
            let files = store.flush()?;
            println!("OK ({} files)", files);
        }
        Commands::Compact => {
            let rounds = store.compact()?;
            println!("OK ({} merges)", rounds);
        }
        Commands::Snapshot => {
            let entries = store.save_snapshot()?;
            println!("OK ({} entries)", entries);
        }
        Commands::Stats => {
            println!("{}", serde_json::to_string_pretty(&store.stats())?);
        }
    }

    store.close()
}
