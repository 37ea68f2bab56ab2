//! Watch command implementation.
//!
//! Provides `spacecache watch <DIR> --for <DURATION>`: keeps the usage
//! refreshed in the background and prints it once per interval.

use std::io::Write;
use std::thread;
use std::time::Instant;

use crate::cli::args::WatchArgs;
use crate::config::CacheSettings;
use crate::error::Result;
use crate::usage::{DirWalkProbe, SpaceUsedBuilder};

use super::dispatcher::{Command, CommandResult};

/// The watch command implementation.
pub struct WatchCommand {
    settings: CacheSettings,
    args: WatchArgs,
}

impl WatchCommand {
    /// Create a new watch command.
    pub fn new(settings: &CacheSettings, args: WatchArgs) -> Self {
        Self {
            settings: args.apply(settings.clone()),
            args,
        }
    }
}

impl Command for WatchCommand {
    fn execute(&self, out: &mut dyn Write) -> Result<CommandResult> {
        let mut cache = SpaceUsedBuilder::from_settings(&self.args.dir, &self.settings)
            .build(DirWalkProbe::new(&self.args.dir))?;
        cache.init()?;

        let deadline = Instant::now() + self.args.run_for;
        let report_every = if self.settings.interval.is_zero() {
            self.args.run_for
        } else {
            self.settings.interval
        };

        writeln!(out, "{}\t{}", cache.used(), cache.dir_path())?;
        loop {
            let now = Instant::now();
            if now >= deadline {
                break;
            }
            thread::sleep(report_every.min(deadline - now));
            writeln!(out, "{}\t{}", cache.used(), cache.dir_path())?;
        }

        if cache.cache_file().is_some() && cache.has_measured() {
            cache.save_now()?;
        }
        cache.close();
        cache.join();

        Ok(CommandResult::success())
    }
}
