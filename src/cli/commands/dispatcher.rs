//! Command dispatching.
//!
//! This module provides the core command infrastructure:
//! - [`Command`] trait for implementing commands
//! - [`CommandResult`] for uniform result reporting
//! - [`CommandDispatcher`] for routing CLI subcommands

use std::io::Write;

use crate::cli::args::{Cli, Commands};
use crate::config::CacheSettings;
use crate::error::Result;

/// Trait for command implementations.
pub trait Command {
    /// Execute the command, writing its report to `out`.
    fn execute(&self, out: &mut dyn Write) -> Result<CommandResult>;
}

/// Result of command execution.
#[derive(Debug)]
pub struct CommandResult {
    /// Whether the command succeeded.
    pub success: bool,

    /// Exit code to use (0 for success, non-zero for failure).
    pub exit_code: i32,
}

impl CommandResult {
    /// Create a successful result.
    pub fn success() -> Self {
        Self {
            success: true,
            exit_code: 0,
        }
    }

    /// Create a failure result.
    pub fn failure(exit_code: i32) -> Self {
        Self {
            success: false,
            exit_code,
        }
    }
}

/// Dispatches CLI commands to their implementations.
pub struct CommandDispatcher {
    settings: CacheSettings,
}

impl CommandDispatcher {
    /// Create a dispatcher using `settings` as the base for every command.
    pub fn new(settings: CacheSettings) -> Self {
        Self { settings }
    }

    /// Base settings before command-line overrides.
    pub fn settings(&self) -> &CacheSettings {
        &self.settings
    }

    /// Dispatch and execute a command.
    pub fn dispatch(&self, cli: &Cli, out: &mut dyn Write) -> Result<CommandResult> {
        match &cli.command {
            Commands::Measure(args) => {
                let cmd = super::measure::MeasureCommand::new(&self.settings, args.clone());
                cmd.execute(out)
            }
            Commands::Watch(args) => {
                let cmd = super::watch::WatchCommand::new(&self.settings, args.clone());
                cmd.execute(out)
            }
            Commands::Record(args) => {
                let cmd = super::record::RecordCommand::new(args.clone());
                cmd.execute(out)
            }
        }
    }
}
