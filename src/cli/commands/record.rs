//! Record command implementation.
//!
//! Provides `spacecache record <FILE>`: prints a persisted usage record or
//! reports that it cannot be trusted.

use std::io::Write;

use crate::cli::args::RecordArgs;
use crate::error::Result;
use crate::usage::load_record;

use super::dispatcher::{Command, CommandResult};

/// The record command implementation.
pub struct RecordCommand {
    args: RecordArgs,
}

impl RecordCommand {
    /// Create a new record command.
    pub fn new(args: RecordArgs) -> Self {
        Self { args }
    }
}

impl Command for RecordCommand {
    fn execute(&self, out: &mut dyn Write) -> Result<CommandResult> {
        let Some(record) = load_record(&self.args.file, self.args.max_age)? else {
            writeln!(out, "No valid record at {}", self.args.file.display())?;
            return Ok(CommandResult::failure(1));
        };

        let written_at = record
            .written_at()
            .map(|at| at.to_rfc3339())
            .unwrap_or_else(|| record.written_at_millis.to_string());
        writeln!(out, "{}\t{}", record.used_bytes, written_at)?;

        Ok(CommandResult::success())
    }
}
