//! Command-line interface for spacecache.
//!
//! # Architecture
//!
//! - [`args`] - Argument definitions using clap derive macros
//! - [`commands`] - Command implementations

pub mod args;
pub mod commands;

pub use args::{CacheArgs, Cli, Commands, MeasureArgs, RecordArgs, WatchArgs};
pub use commands::{Command, CommandDispatcher, CommandResult};
