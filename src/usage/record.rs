//! On-disk cache record.
//!
//! A record is a single line of text: the used byte count followed by the
//! epoch-millisecond time it was written, separated by a space. The
//! timestamp comes last so a write cut short by a crash leaves a record
//! whose second field is missing or garbled, which readers reject.

use chrono::{DateTime, TimeZone, Utc};
use std::fs::{self, File};
use std::io::{ErrorKind, Write};
use std::path::Path;
use std::time::Duration;
use tracing::{debug, warn};

use crate::error::{Result, SpaceCacheError};

/// A persisted usage measurement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheRecord {
    /// Bytes used at the time of writing.
    pub used_bytes: u64,
    /// Epoch milliseconds when the record was written.
    pub written_at_millis: i64,
}

impl CacheRecord {
    /// Create a record stamped with the current time.
    pub fn now(used_bytes: u64) -> Self {
        Self {
            used_bytes,
            written_at_millis: Utc::now().timestamp_millis(),
        }
    }

    /// Serialize as `"<used> <millis>"`.
    pub fn encode(&self) -> String {
        format!("{} {}", self.used_bytes, self.written_at_millis)
    }

    /// Parse a serialized record.
    ///
    /// Returns `None` unless both fields are present and numeric and
    /// nothing follows them.
    pub fn parse(content: &str) -> Option<Self> {
        let mut fields = content.split_whitespace();
        let used_bytes = fields.next()?.parse().ok()?;
        let written_at_millis = fields.next()?.parse().ok()?;
        if fields.next().is_some() {
            return None;
        }
        Some(Self {
            used_bytes,
            written_at_millis,
        })
    }

    /// Write time as a timestamp, if representable.
    pub fn written_at(&self) -> Option<DateTime<Utc>> {
        Utc.timestamp_millis_opt(self.written_at_millis).single()
    }

    /// Whether the record was written more than `max_age` ago.
    pub fn is_older_than(&self, max_age: Duration) -> bool {
        let age_millis = Utc::now().timestamp_millis() - self.written_at_millis;
        age_millis > 0 && age_millis as u128 > max_age.as_millis()
    }
}

/// Persist `used` bytes to `cache_file`.
///
/// Fails only when no cache file is configured. Values `<= 0` are never
/// written, so an unmeasured cache cannot clobber an earlier record. Delete
/// and write failures are logged and swallowed.
///
/// The timestamp is wall-clock time, so successive records are only
/// ordered as long as the system clock does not step backwards.
pub fn save_record(cache_file: Option<&Path>, dir: &str, used: i64) -> Result<()> {
    let path = cache_file.ok_or_else(|| SpaceCacheError::CacheFileNotConfigured {
        dir: dir.to_string(),
    })?;

    if used <= 0 {
        debug!("Skipping save of {} bytes for {}", used, dir);
        return Ok(());
    }

    if let Err(err) = remove_existing(path) {
        warn!("Failed to delete old usage record: {}", err);
    }

    let record = CacheRecord::now(used as u64);
    if let Err(err) = write_record(path, &record) {
        warn!("Failed to write usage record: {}", err);
    }

    Ok(())
}

/// Load a record from `cache_file`.
///
/// Missing files, incomplete records and records older than `max_age`
/// yield `Ok(None)`. Other read failures are returned.
pub fn load_record(cache_file: &Path, max_age: Option<Duration>) -> Result<Option<CacheRecord>> {
    let content = match fs::read_to_string(cache_file) {
        Ok(content) => content,
        Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
        Err(err) => return Err(err.into()),
    };

    let Some(record) = CacheRecord::parse(&content) else {
        warn!("Discarding incomplete usage record at {:?}", cache_file);
        return Ok(None);
    };

    if let Some(max_age) = max_age {
        if record.is_older_than(max_age) {
            debug!("Discarding stale usage record at {:?}", cache_file);
            return Ok(None);
        }
    }

    Ok(Some(record))
}

fn remove_existing(path: &Path) -> Result<()> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
        Err(source) => Err(SpaceCacheError::Persistence {
            path: path.to_path_buf(),
            source,
        }),
    }
}

fn write_record(path: &Path, record: &CacheRecord) -> Result<()> {
    let persistence = |source: std::io::Error| SpaceCacheError::Persistence {
        path: path.to_path_buf(),
        source,
    };

    let mut file = File::create(path).map_err(persistence)?;
    file.write_all(record.encode().as_bytes())
        .map_err(persistence)?;
    file.sync_all().map_err(persistence)?;
    Ok(())
}
