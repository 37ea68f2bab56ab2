//! CLI command implementations.
//!
//! Each command implements the [`Command`] trait, which provides a uniform
//! interface for executing commands and reporting results. Commands are
//! routed by [`CommandDispatcher`].

pub mod dispatcher;
pub mod measure;
pub mod record;
pub mod watch;

pub use dispatcher::{Command, CommandDispatcher, CommandResult};
