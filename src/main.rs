//! Spacecache CLI entry point.

use std::io::{self, Write};
use std::process::ExitCode;

use clap::Parser;
use spacecache::cli::{Cli, CommandDispatcher};
use spacecache::config::CacheSettings;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Initialize the tracing subscriber for logging.
///
/// Log level is controlled by:
/// 1. `--debug` flag sets level to DEBUG
/// 2. `RUST_LOG` environment variable (if set)
/// 3. Default is INFO
fn init_tracing(debug: bool) {
    let filter = if debug {
        EnvFilter::new("spacecache=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("spacecache=info"))
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_writer(io::stderr))
        .with(filter)
        .init();
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.debug);

    tracing::debug!("Spacecache starting with args: {:?}", cli);

    let settings = match &cli.config {
        Some(path) => match CacheSettings::load(path) {
            Ok(settings) => settings,
            Err(e) => {
                eprintln!("Error: {}", e);
                return ExitCode::from(1);
            }
        },
        None => CacheSettings::default(),
    };

    let dispatcher = CommandDispatcher::new(settings);
    let stdout = io::stdout();
    let mut out = stdout.lock();

    let code = match dispatcher.dispatch(&cli, &mut out) {
        Ok(result) => ExitCode::from(result.exit_code as u8),
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::from(1)
        }
    };
    let _ = out.flush();
    code
}
