//! Measure command implementation.
//!
//! Provides `spacecache measure <DIR>`: one synchronous measurement,
//! optionally persisted.

use std::io::Write;
use std::time::Duration;

use crate::cli::args::MeasureArgs;
use crate::config::CacheSettings;
use crate::error::Result;
use crate::usage::{DirWalkProbe, SpaceUsedBuilder};

use super::dispatcher::{Command, CommandResult};

/// The measure command implementation.
pub struct MeasureCommand {
    settings: CacheSettings,
    args: MeasureArgs,
}

impl MeasureCommand {
    /// Create a new measure command.
    pub fn new(settings: &CacheSettings, args: MeasureArgs) -> Self {
        Self {
            settings: args.cache.apply(settings.clone()),
            args,
        }
    }
}

impl Command for MeasureCommand {
    fn execute(&self, out: &mut dyn Write) -> Result<CommandResult> {
        let mut cache = SpaceUsedBuilder::from_settings(&self.args.dir, &self.settings)
            .interval(Duration::ZERO)
            .build(DirWalkProbe::new(&self.args.dir))?;
        cache.init()?;

        writeln!(out, "{}\t{}", cache.used(), cache.dir_path())?;

        if cache.cache_file().is_some() && cache.has_measured() {
            cache.save_now()?;
        }

        Ok(CommandResult::success())
    }
}
