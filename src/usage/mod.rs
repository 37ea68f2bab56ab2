//! Cached directory space usage.
//!
//! This module provides a lock-free usage counter, a crash-tolerant
//! on-disk record of the last measurement, and a background worker that
//! re-measures on a jittered schedule.

pub mod cell;
pub mod probe;
pub mod record;
pub mod scheduler;
pub mod space_used;

pub use cell::UsageCell;
pub use probe::{DirWalkProbe, SpaceProbe};
pub use record::{load_record, save_record, CacheRecord};
pub use scheduler::{jittered_delay, SchedulerState};
pub use space_used::{CachingSpaceUsed, InitialUsage, SpaceUsedBuilder};
