//! minikv - A Small In-Process Key-Value Store
//!
//! This is the main entry point for the minikv console.
//! It sets up logging, the storage engine and its expiry registry, and runs
//! an interactive session over stdin/stdout.

use anyhow::Context;
use minikv::commands::CommandHandler;
use minikv::console::{run_console, ConsoleStats};
use minikv::storage::{ExpiryRegistry, FileSubstrate, StorageEngine};
use std::path::PathBuf;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tokio::runtime::Handle;
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

/// Environment variable naming the data file
const DATA_ENV: &str = "MINIKV_DATA";

/// Console configuration
#[derive(Debug)]
struct Config {
    /// JSON file backing the store; `None` keeps everything in memory
    data_path: Option<PathBuf>,
    /// Suppress the banner and command echo
    quiet: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_path: std::env::var_os(DATA_ENV).map(PathBuf::from),
            quiet: false,
        }
    }
}

impl Config {
    /// Parse configuration from command-line arguments
    fn from_args() -> Self {
        let mut config = Config::default();
        let args: Vec<String> = std::env::args().collect();

        let mut i = 1;
        while i < args.len() {
            match args[i].as_str() {
                "--data" | "-d" => {
                    if i + 1 < args.len() {
                        config.data_path = Some(PathBuf::from(&args[i + 1]));
                        i += 2;
                    } else {
                        eprintln!("Error: --data requires a path");
                        std::process::exit(1);
                    }
                }
                "--memory" => {
                    config.data_path = None;
                    i += 1;
                }
                "--quiet" | "-q" => {
                    config.quiet = true;
                    i += 1;
                }
                "--help" | "-h" => {
                    print_help();
                    std::process::exit(0);
                }
                "--version" | "-v" => {
                    println!("minikv version {}", minikv::VERSION);
                    std::process::exit(0);
                }
                _ => {
                    eprintln!("Unknown argument: {}", args[i]);
                    print_help();
                    std::process::exit(1);
                }
            }
        }

        config
    }

    /// Human-readable storage location for the banner
    fn storage_description(&self) -> String {
        match &self.data_path {
            Some(path) => format!("file {}", path.display()),
            None => "memory".to_string(),
        }
    }
}

fn print_help() {
    println!(
        r#"
minikv - A Small In-Process Key-Value Store

USAGE:
    minikv [OPTIONS]

OPTIONS:
    -d, --data <PATH>    Keep the store in a JSON file (env: MINIKV_DATA)
        --memory         Keep the store in memory, ignoring MINIKV_DATA
    -q, --quiet          No banner and no command echo
    -v, --version        Print version information
    -h, --help           Print this help message

EXAMPLES:
    minikv                         # In-memory store
    minikv --data store.json       # Store survives restarts
    echo "KEYS" | minikv -q        # Scripted use

SESSION:
    > SADD colors red blue
    OK
    > SMEMBERS colors
    1) blue
    2) red
    > EXPIRE colors 10
    OK
    > TTL colors
    10
"#
    );
}

fn print_banner(config: &Config) {
    println!(
        r#"
minikv v{} - In-Process Key-Value Store
──────────────────────────────────────────
Storage: {}
Commands: GET SET SADD SREM SMEMBERS KEYS DEL EXPIRE TTL

Type QUIT or press Ctrl+D to leave, Ctrl+C to interrupt.
"#,
        minikv::VERSION,
        config.storage_description()
    );
}

/// Builds the storage engine for the configured substrate
fn open_storage(config: &Config) -> anyhow::Result<StorageEngine> {
    match &config.data_path {
        Some(path) => {
            let substrate = FileSubstrate::open(path)
                .with_context(|| format!("failed to open data file {}", path.display()))?;
            info!(path = %path.display(), "File substrate opened");
            Ok(StorageEngine::with_substrate(substrate))
        }
        None => {
            info!("Memory substrate initialized");
            Ok(StorageEngine::new())
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse command-line arguments
    let config = Config::from_args();

    // Set up logging on stderr so stdout carries only the session
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    if !config.quiet {
        print_banner(&config);
    }

    let storage = Arc::new(open_storage(&config)?);
    info!(keys = storage.len(), "Storage engine ready");

    let registry = ExpiryRegistry::new(Arc::clone(&storage), Handle::current());
    let handler = CommandHandler::new(Arc::clone(&registry));
    let stats = Arc::new(ConsoleStats::new());

    let session = run_console(
        tokio::io::stdin(),
        tokio::io::stdout(),
        handler,
        Arc::clone(&stats),
        !config.quiet,
    );

    let interrupt = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    let interrupted = tokio::select! {
        result = session => {
            if let Err(e) = result {
                error!(error = %e, "Console session failed");
            }
            false
        }
        _ = interrupt => {
            info!("Interrupt received, shutting down...");
            true
        }
    };

    let cancelled = registry.shutdown();
    let storage_stats = storage.stats();
    info!(
        commands = stats.commands_processed.load(Ordering::Relaxed),
        errors = stats.command_errors.load(Ordering::Relaxed),
        keys = storage_stats.keys,
        expired = storage_stats.expired,
        cancelled_timers = cancelled,
        "Shutdown complete"
    );

    if interrupted {
        // The blocking stdin read would otherwise hold the runtime open
        std::process::exit(0);
    }

    Ok(())
}
