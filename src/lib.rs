//! Spacecache - Cached, background-refreshed disk usage estimates.
//!
//! Measuring how much space a directory tree uses can be slow. Spacecache
//! keeps the latest measurement in memory for cheap reads, refreshes it on
//! a jittered background schedule, and persists it so a restart can reuse
//! a recent value instead of measuring again.
//!
//! # Modules
//!
//! - [`cli`] - Command-line interface and argument parsing
//! - [`config`] - Settings loading and duration parsing
//! - [`error`] - Error types and result aliases
//! - [`usage`] - Usage cell, persisted records, refresh worker and cache
//!
//! # Example
//!
//! ```
//! use spacecache::usage::{CachingSpaceUsed, DirWalkProbe};
//! use std::time::Duration;
//!
//! let dir = std::env::temp_dir();
//! let mut cache = CachingSpaceUsed::builder(&dir)
//!     .interval(Duration::ZERO)
//!     .build(|used: &spacecache::usage::UsageCell| {
//!         used.set(4096);
//!         Ok::<(), std::io::Error>(())
//!     })
//!     .unwrap();
//!
//! cache.init().unwrap();
//! assert_eq!(cache.used(), 4096);
//!
//! cache.increment_used(512);
//! assert_eq!(cache.used(), 4608);
//! # let _ = DirWalkProbe::new(&dir);
//! ```

pub mod cli;
pub mod config;
pub mod error;
pub mod usage;

pub use error::{Result, SpaceCacheError};
