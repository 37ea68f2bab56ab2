//! Cached space usage with background refresh.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::AtomicBool;
use std::sync::mpsc::{self, Sender};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, warn};

use super::cell::UsageCell;
use super::probe::SpaceProbe;
use super::record::{load_record, save_record};
use super::scheduler::{RefreshScheduler, SchedulerState, Shared};
use crate::config::CacheSettings;
use crate::error::{Result, SpaceCacheError};

/// Value a cache starts with before its first refresh.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InitialUsage {
    /// No measurement yet; `init` probes synchronously.
    #[default]
    Unknown,
    /// Trust this many bytes until the first scheduled refresh.
    Bytes(u64),
}

/// Builder for [`CachingSpaceUsed`].
#[derive(Debug, Clone)]
pub struct SpaceUsedBuilder {
    path: PathBuf,
    interval: Duration,
    jitter: Duration,
    initial: InitialUsage,
    cache_file: Option<PathBuf>,
    seed: Option<Option<Duration>>,
}

impl SpaceUsedBuilder {
    /// Start building a cache for the directory at `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            interval: CacheSettings::DEFAULT_INTERVAL,
            jitter: CacheSettings::DEFAULT_JITTER,
            initial: InitialUsage::Unknown,
            cache_file: None,
            seed: None,
        }
    }

    /// Apply interval, jitter, cache file and seeding from `settings`.
    pub fn from_settings(path: impl Into<PathBuf>, settings: &CacheSettings) -> Self {
        let mut builder = Self::new(path)
            .interval(settings.interval)
            .jitter(settings.jitter);
        builder.cache_file = settings.cache_file.clone();
        if let Some(max_age) = settings.max_record_age {
            builder = builder.seed_from_cache_file(Some(max_age));
        }
        builder
    }

    /// Time between background refreshes. Zero disables them.
    pub fn interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Bound on the random offset applied to each interval.
    pub fn jitter(mut self, jitter: Duration) -> Self {
        self.jitter = jitter;
        self
    }

    /// Value to report before the first refresh.
    pub fn initial(mut self, initial: InitialUsage) -> Self {
        self.initial = initial;
        self
    }

    /// File used to persist measurements.
    pub fn cache_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.cache_file = Some(path.into());
        self
    }

    /// Seed the initial value from the cache file when it holds a complete
    /// record no older than `max_age`.
    pub fn seed_from_cache_file(mut self, max_age: Option<Duration>) -> Self {
        self.seed = Some(max_age);
        self
    }

    /// Build the cache. The directory must exist so its path can be
    /// canonicalized.
    pub fn build(self, probe: impl SpaceProbe + 'static) -> Result<CachingSpaceUsed> {
        let dir_path = fs::canonicalize(&self.path)?.to_string_lossy().into_owned();

        let initial = match (self.seed, self.cache_file.as_deref()) {
            (Some(max_age), Some(cache_file)) => seeded_initial(cache_file, max_age, self.initial),
            _ => self.initial,
        };

        let used = match initial {
            InitialUsage::Unknown => UsageCell::unknown(),
            InitialUsage::Bytes(bytes) => UsageCell::new(bytes),
        };

        let probe: Box<dyn SpaceProbe> = Box::new(probe);
        Ok(CachingSpaceUsed {
            shared: Arc::new(Shared {
                dir_path,
                interval: self.interval,
                jitter: self.jitter,
                cache_file: self.cache_file,
                used,
                running: AtomicBool::new(true),
                measured: AtomicBool::new(false),
            }),
            probe: Mutex::new(Some(probe)),
            wake: None,
            worker: None,
            initialized: false,
        })
    }
}

fn seeded_initial(
    cache_file: &Path,
    max_age: Option<Duration>,
    fallback: InitialUsage,
) -> InitialUsage {
    match load_record(cache_file, max_age) {
        Ok(Some(record)) => {
            debug!("Seeding usage from {:?}: {} bytes", cache_file, record.used_bytes);
            InitialUsage::Bytes(record.used_bytes)
        }
        Ok(None) => fallback,
        Err(err) => {
            warn!("Failed to read usage record {:?}: {}", cache_file, err);
            fallback
        }
    }
}

/// Space usage of a directory tree, cached in memory and refreshed by a
/// background worker.
///
/// Reads are cheap and never block. Call [`init`](Self::init) once after
/// building; dropping the cache requests the worker to stop.
pub struct CachingSpaceUsed {
    shared: Arc<Shared>,
    // Only touched through `&mut self`; the mutex makes the handle `Sync`.
    probe: Mutex<Option<Box<dyn SpaceProbe>>>,
    wake: Option<Sender<()>>,
    worker: Option<JoinHandle<()>>,
    initialized: bool,
}

impl CachingSpaceUsed {
    /// Start building a cache for `path`.
    pub fn builder(path: impl Into<PathBuf>) -> SpaceUsedBuilder {
        SpaceUsedBuilder::new(path)
    }

    /// Run the first measurement if needed and start background refresh.
    ///
    /// When the initial value is unknown the probe runs synchronously and
    /// its failure is returned. With a zero interval no worker is started.
    pub fn init(&mut self) -> Result<()> {
        self.init_with(thread::Builder::new())
    }

    pub(crate) fn init_with(&mut self, worker: thread::Builder) -> Result<()> {
        if self.initialized {
            return Err(SpaceCacheError::AlreadyInitialized {
                dir: self.shared.dir_path.clone(),
            });
        }
        let slot = self.probe.get_mut().unwrap_or_else(PoisonError::into_inner);
        let Some(mut probe) = slot.take() else {
            return Err(SpaceCacheError::AlreadyInitialized {
                dir: self.shared.dir_path.clone(),
            });
        };

        if self.shared.used.is_unknown() {
            self.shared.used.set(0);
            if let Err(source) = probe.refresh(&self.shared.used) {
                self.shared.used.mark_unknown();
                *slot = Some(probe);
                return Err(SpaceCacheError::Probe {
                    dir: self.shared.dir_path.clone(),
                    source,
                });
            }
            self.shared.mark_measured();
        }

        if self.shared.interval.is_zero() {
            self.initialized = true;
            self.shared.stop();
            return Ok(());
        }

        let (tx, rx) = mpsc::channel();
        let spawned = RefreshScheduler::new(Arc::clone(&self.shared), probe, rx).spawn(worker);
        self.initialized = true;
        match spawned {
            Ok(handle) => {
                self.wake = Some(tx);
                self.worker = Some(handle);
                Ok(())
            }
            Err(err) => {
                // The probe went down with the failed spawn; no refresh can run.
                self.shared.stop();
                Err(err.into())
            }
        }
    }

    /// Estimated bytes used under the directory.
    pub fn used(&self) -> u64 {
        self.shared.used.get()
    }

    /// Canonical path of the measured directory.
    pub fn dir_path(&self) -> &str {
        &self.shared.dir_path
    }

    /// Account for `delta` bytes written (or freed, if negative) since the
    /// last refresh.
    pub fn increment_used(&self, delta: i64) {
        self.shared.used.increment(delta);
    }

    /// Whether the probe has succeeded at least once, during `init` or in a
    /// background tick. A cache seeded from a persisted record has not
    /// measured anything until then.
    pub fn has_measured(&self) -> bool {
        self.shared.has_measured()
    }

    /// Persist the current value now.
    ///
    /// Fails only when no cache file is configured. Use before
    /// [`close`](Self::close) when the final value must reach disk.
    pub fn save_now(&self) -> Result<()> {
        save_record(
            self.shared.cache_file.as_deref(),
            &self.shared.dir_path,
            self.shared.used.raw(),
        )
    }

    /// Ask the background worker to stop.
    ///
    /// Does not wait: a tick already in progress finishes first. See
    /// [`join`](Self::join).
    pub fn close(&self) {
        self.shared.stop();
        if let Some(wake) = &self.wake {
            let _ = wake.send(());
        }
    }

    /// Wait for the background worker to exit. Returns `false` if there
    /// was no worker. Blocks indefinitely unless [`close`](Self::close) was
    /// called first.
    pub fn join(&mut self) -> bool {
        let Some(handle) = self.worker.take() else {
            return false;
        };
        if handle.join().is_err() {
            warn!("Usage refresh worker for {} panicked", self.shared.dir_path);
        }
        true
    }

    /// Whether the background worker is (still) asked to run.
    pub fn is_running(&self) -> bool {
        self.shared.is_running()
    }

    /// Current lifecycle state of the background worker.
    pub fn state(&self) -> SchedulerState {
        match &self.worker {
            None if !self.initialized => SchedulerState::Idle,
            None if self.wake.is_some() => SchedulerState::Stopped,
            None => SchedulerState::NotScheduled,
            Some(handle) if handle.is_finished() => SchedulerState::Stopped,
            Some(_) if self.shared.is_running() => SchedulerState::Running,
            Some(_) => SchedulerState::Cancelling,
        }
    }

    /// Time between background refreshes.
    pub fn refresh_interval(&self) -> Duration {
        self.shared.interval
    }

    /// Bound on the random offset applied to each interval.
    pub fn jitter(&self) -> Duration {
        self.shared.jitter
    }

    /// File measurements are persisted to, if configured.
    pub fn cache_file(&self) -> Option<&Path> {
        self.shared.cache_file.as_deref()
    }
}

impl Drop for CachingSpaceUsed {
    fn drop(&mut self) {
        self.close();
    }
}

impl fmt::Debug for CachingSpaceUsed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CachingSpaceUsed")
            .field("dir_path", &self.shared.dir_path)
            .field("used", &self.used())
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}
