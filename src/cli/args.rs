//! CLI argument definitions.
//!
//! This module defines all CLI arguments using clap's derive macros.
//! The main entry point is the [`Cli`] struct.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;

use crate::config::{parse_duration, CacheSettings};

/// Spacecache - Cached disk usage for directory trees.
#[derive(Debug, Parser)]
#[command(name = "spacecache")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to settings file (YAML)
    #[arg(short, long, global = true, env = "SPACECACHE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(long, global = true)]
    pub debug: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Measure a directory once and print its usage
    Measure(MeasureArgs),

    /// Keep a directory's usage refreshed in the background for a while
    Watch(WatchArgs),

    /// Show a persisted usage record
    Record(RecordArgs),
}

/// Cache settings that can be given on the command line.
///
/// Flags override values from the settings file.
#[derive(Debug, Clone, Default, clap::Args)]
pub struct CacheArgs {
    /// File to persist the measurement to
    #[arg(long, value_name = "FILE")]
    pub cache_file: Option<PathBuf>,

    /// Reuse a persisted record no older than this instead of measuring
    #[arg(long, value_name = "DURATION", value_parser = parse_duration_arg)]
    pub max_record_age: Option<Duration>,
}

impl CacheArgs {
    /// Overlay these flags on `settings`.
    pub fn apply(&self, mut settings: CacheSettings) -> CacheSettings {
        if let Some(cache_file) = &self.cache_file {
            settings.cache_file = Some(cache_file.clone());
        }
        if let Some(max_age) = self.max_record_age {
            settings.max_record_age = Some(max_age);
        }
        settings
    }
}

/// Arguments for the `measure` command.
#[derive(Debug, Clone, clap::Args)]
pub struct MeasureArgs {
    /// Directory to measure
    pub dir: PathBuf,

    #[command(flatten)]
    pub cache: CacheArgs,
}

/// Arguments for the `watch` command.
#[derive(Debug, Clone, clap::Args)]
pub struct WatchArgs {
    /// Directory to watch
    pub dir: PathBuf,

    /// How long to keep refreshing
    #[arg(long = "for", value_name = "DURATION", value_parser = parse_duration_arg)]
    pub run_for: Duration,

    /// Time between refreshes
    #[arg(long, value_name = "DURATION", value_parser = parse_duration_arg)]
    pub interval: Option<Duration>,

    /// Bound on the random offset added to each interval
    #[arg(long, value_name = "DURATION", value_parser = parse_duration_arg)]
    pub jitter: Option<Duration>,

    #[command(flatten)]
    pub cache: CacheArgs,
}

impl WatchArgs {
    /// Overlay these flags on `settings`.
    pub fn apply(&self, settings: CacheSettings) -> CacheSettings {
        let mut settings = self.cache.apply(settings);
        if let Some(interval) = self.interval {
            settings.interval = interval;
        }
        if let Some(jitter) = self.jitter {
            settings.jitter = jitter;
        }
        settings
    }
}

/// Arguments for the `record` command.
#[derive(Debug, Clone, clap::Args)]
pub struct RecordArgs {
    /// Record file to read
    pub file: PathBuf,

    /// Treat records older than this as invalid
    #[arg(long, value_name = "DURATION", value_parser = parse_duration_arg)]
    pub max_age: Option<Duration>,
}

fn parse_duration_arg(value: &str) -> Result<Duration, String> {
    parse_duration(value).map_err(|e| e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_measure() {
        let cli = Cli::parse_from(["spacecache", "measure", "/data", "--cache-file", "/tmp/du"]);
        let Commands::Measure(args) = cli.command else {
            panic!("Expected Measure command");
        };
        assert_eq!(args.dir, PathBuf::from("/data"));
        assert_eq!(args.cache.cache_file, Some(PathBuf::from("/tmp/du")));
    }

    #[test]
    fn parses_watch_durations() {
        let cli = Cli::parse_from([
            "spacecache",
            "watch",
            "/data",
            "--for",
            "2s",
            "--interval",
            "250ms",
            "--jitter",
            "0",
        ]);
        let Commands::Watch(args) = cli.command else {
            panic!("Expected Watch command");
        };
        assert_eq!(args.run_for, Duration::from_secs(2));
        assert_eq!(args.interval, Some(Duration::from_millis(250)));
        assert_eq!(args.jitter, Some(Duration::ZERO));
    }

    #[test]
    fn rejects_bad_duration() {
        let result = Cli::try_parse_from(["spacecache", "watch", "/data", "--for", "later"]);
        assert!(result.is_err());
    }

    #[test]
    fn watch_flags_override_settings() {
        let cli = Cli::parse_from([
            "spacecache",
            "watch",
            "/data",
            "--for",
            "1s",
            "--interval",
            "5s",
            "--cache-file",
            "/tmp/du",
        ]);
        let Commands::Watch(args) = cli.command else {
            panic!("Expected Watch command");
        };

        let settings = args.apply(CacheSettings::default());
        assert_eq!(settings.interval, Duration::from_secs(5));
        assert_eq!(settings.jitter, CacheSettings::DEFAULT_JITTER);
        assert_eq!(settings.cache_file, Some(PathBuf::from("/tmp/du")));
    }

    #[test]
    fn global_flags_parse_after_subcommand() {
        let cli = Cli::parse_from(["spacecache", "record", "/tmp/du", "--debug"]);
        assert!(cli.debug);
        assert!(matches!(cli.command, Commands::Record(_)));
    }
}
