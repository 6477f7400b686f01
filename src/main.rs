//! tlint CLI
//!
//! Entry point for the `tlint` command-line tool.

use clap::Parser;
use std::path::PathBuf;
use std::process;
use tracing::{error, warn};
use tracing_subscriber::fmt::time::ChronoLocal;
use tracing_subscriber::EnvFilter;

use tlint::config::DEFAULT_SETTINGS_PATH;
use tlint::{Pipeline, SignalHandler, EXIT_CODE_INTERNAL};

/// Environment variable overriding the log filter
const LOG_ENV: &str = "TLINT_LOG";

#[derive(Parser)]
#[command(name = "tlint")]
#[command(about = "GolangCI Lint for Teams", version)]
struct Cli {
    /// Enable debug logging
    #[arg(long)]
    debug: bool,

    /// Path to the settings file
    #[arg(long, short = 'c', default_value = DEFAULT_SETTINGS_PATH)]
    config: PathBuf,
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.debug);

    let signals = SignalHandler::new();
    if let Err(e) = signals.install() {
        warn!("cannot install signal handler: {e}");
    }

    let pipeline = match Pipeline::new() {
        Ok(p) => p,
        Err(e) => {
            error!("{e}");
            process::exit(EXIT_CODE_INTERNAL);
        }
    };

    match pipeline.run(&cli.config, &signals.token()) {
        Ok(code) => process::exit(code),
        Err(e) => {
            error!("{e}");
            process::exit(e.exit_code());
        }
    }
}

fn init_logging(debug: bool) {
    let level = if debug { "debug" } else { "info" };
    let filter = EnvFilter::try_from_env(LOG_ENV)
        .unwrap_or_else(|_| EnvFilter::new(format!("warn,tlint={level}")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_timer(ChronoLocal::new("%Y.%m.%d %H:%M:%S".to_string()))
        .with_target(false)
        .init();
}
