//! xconn: pluggable exchange-connector host
//!
//! Loads the named connector module, wires it to the configuration document,
//! and dispatches its event streams to consumer threads until interrupted.
//! Every startup failure is terminal: log, pause long enough for the
//! diagnostic to be visible, exit non-zero.

use std::path::PathBuf;
use std::process;
use std::thread;
use std::time::Duration;

use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use xconn_runtime::{ConnectorConfig, Harness, ShutdownContext};

/// Pause before exiting on a terminal error, so the diagnostic is visible.
const GRACE_PERIOD: Duration = Duration::from_secs(2);

#[derive(Parser, Debug)]
#[command(name = "xconn")]
#[command(about = "Pluggable exchange connector host")]
struct Args {
    /// Connector/exchange name; resolves to a module in the modules directory
    #[arg(short, long)]
    exchange: String,

    /// Worker threads for data processing (reserved; dispatch is fixed at
    /// one consumer per event type)
    #[arg(short, long, default_value_t = 8)]
    threads: usize,

    /// Logging verbosity level (0, 1, 2)
    #[arg(short, long, default_value_t = 1)]
    verbose: u8,

    /// Path to the connector configuration document
    #[arg(short, long, default_value = "configs/connector.config")]
    config: PathBuf,

    /// Directory containing connector modules
    #[arg(short, long, default_value = "modules")]
    modules_dir: PathBuf,
}

fn init_tracing(verbosity: u8) {
    let default_filter = match verbosity {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .init();
}

fn fail(message: impl std::fmt::Display) -> ! {
    error!("{message}");
    thread::sleep(GRACE_PERIOD);
    process::exit(1);
}

fn main() {
    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(err) => {
            let informational = matches!(
                err.kind(),
                clap::error::ErrorKind::DisplayHelp | clap::error::ErrorKind::DisplayVersion
            );
            err.print().ok();
            if informational {
                process::exit(0);
            }
            thread::sleep(GRACE_PERIOD);
            process::exit(1);
        }
    };

    init_tracing(args.verbose);
    info!(exchange = %args.exchange, "starting xconn");
    // Dispatch is fixed at one consumer per event type; the flag is reserved.
    info!(threads = args.threads, "worker thread count is reserved");

    let config = match ConnectorConfig::load(&args.config) {
        Ok(config) => config,
        Err(err) => fail(format!("failed to load {}: {err}", args.config.display())),
    };

    let ctx = ShutdownContext::new();
    if let Err(err) = ctx.register_signals() {
        fail(format!("failed to register signal handlers: {err}"));
    }

    let mut harness = Harness::new(args.exchange.as_str(), args.verbose);
    match harness.run(&args.modules_dir, &config, &ctx) {
        Ok(()) => info!("terminated cleanly"),
        Err(err) => fail(err),
    }
}
