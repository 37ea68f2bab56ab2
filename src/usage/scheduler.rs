//! Background refresh loop.
//!
//! One worker thread per cache sleeps for a jittered interval, runs the
//! probe, then persists the new value. Ticks never overlap: a slow probe
//! only pushes later ticks back.

use rand::Rng;
use std::io;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{Receiver, RecvTimeoutError};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, error, info, warn};

use super::cell::UsageCell;
use super::probe::SpaceProbe;
use super::record::save_record;
use crate::config::format_duration;
use crate::error::SpaceCacheError;

/// Lifecycle of the background refresh worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    /// `init` has not run yet.
    Idle,
    /// The worker is sleeping or running a tick.
    Running,
    /// `close` was called but the worker has not exited yet.
    Cancelling,
    /// The worker has exited.
    Stopped,
    /// The refresh interval is zero, so no worker was started.
    NotScheduled,
}

/// State shared between the cache handle and its worker.
#[derive(Debug)]
pub(crate) struct Shared {
    pub(crate) dir_path: String,
    pub(crate) interval: Duration,
    pub(crate) jitter: Duration,
    pub(crate) cache_file: Option<PathBuf>,
    pub(crate) used: UsageCell,
    pub(crate) running: AtomicBool,
    pub(crate) measured: AtomicBool,
}

impl Shared {
    pub(crate) fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub(crate) fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    pub(crate) fn has_measured(&self) -> bool {
        self.measured.load(Ordering::SeqCst)
    }

    pub(crate) fn mark_measured(&self) {
        self.measured.store(true, Ordering::SeqCst);
    }
}

/// Compute the sleep before the next tick.
///
/// Adds a uniform offset from `[-jitter, jitter)` to `interval` (in whole
/// milliseconds) and never returns less than one millisecond.
pub fn jittered_delay<R: Rng + ?Sized>(
    interval: Duration,
    jitter: Duration,
    rng: &mut R,
) -> Duration {
    let mut delay = whole_millis(interval);
    let jitter = whole_millis(jitter);
    if jitter > 0 {
        delay = delay.saturating_add(rng.random_range(-jitter..jitter));
    }
    Duration::from_millis(delay.max(1) as u64)
}

fn whole_millis(duration: Duration) -> i64 {
    i64::try_from(duration.as_millis()).unwrap_or(i64::MAX)
}

/// Drives periodic refreshes until the running flag is cleared.
pub(crate) struct RefreshScheduler {
    shared: Arc<Shared>,
    probe: Box<dyn SpaceProbe>,
    wake: Receiver<()>,
}

impl RefreshScheduler {
    pub(crate) fn new(
        shared: Arc<Shared>,
        probe: Box<dyn SpaceProbe>,
        wake: Receiver<()>,
    ) -> Self {
        Self {
            shared,
            probe,
            wake,
        }
    }

    /// Start the worker thread from `builder`.
    pub(crate) fn spawn(self, builder: thread::Builder) -> io::Result<JoinHandle<()>> {
        builder
            .name(format!("refresh-used-{}", self.shared.dir_path))
            .spawn(move || self.run())
    }

    fn run(mut self) {
        info!(
            "Refreshing usage of {} every {} (jitter {})",
            self.shared.dir_path,
            format_duration(self.shared.interval),
            format_duration(self.shared.jitter)
        );
        let mut rng = rand::rng();

        while self.shared.is_running() {
            let delay = jittered_delay(self.shared.interval, self.shared.jitter, &mut rng);
            debug!("Next usage refresh of {} in {:?}", self.shared.dir_path, delay);

            match self.wake.recv_timeout(delay) {
                Err(RecvTimeoutError::Timeout) => {}
                Ok(()) => {
                    warn!(
                        "Interrupted while waiting to refresh usage of {}",
                        self.shared.dir_path
                    );
                    if !self.shared.is_running() {
                        break;
                    }
                }
                // The owning handle is gone; nobody is left to read the value.
                Err(RecvTimeoutError::Disconnected) => break,
            }

            self.tick();
        }

        info!("Stopped refreshing usage of {}", self.shared.dir_path);
    }

    fn tick(&mut self) {
        if let Err(source) = self.probe.refresh(&self.shared.used) {
            let err = SpaceCacheError::Probe {
                dir: self.shared.dir_path.clone(),
                source,
            };
            error!("{}", err);
            return;
        }
        self.shared.mark_measured();

        if self.shared.cache_file.is_none() {
            return;
        }
        if let Err(err) = save_record(
            self.shared.cache_file.as_deref(),
            &self.shared.dir_path,
            self.shared.used.raw(),
        ) {
            error!("Failed to save space used: {}", err);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::sync::atomic::AtomicUsize;
    use std::sync::mpsc;

    fn shared(interval: Duration, cache_file: Option<PathBuf>) -> Arc<Shared> {
        Arc::new(Shared {
            dir_path: "/data/vol1".to_string(),
            interval,
            jitter: Duration::ZERO,
            cache_file,
            used: UsageCell::new(0),
            running: AtomicBool::new(true),
            measured: AtomicBool::new(false),
        })
    }

    #[test]
    fn delay_without_jitter_is_interval() {
        let mut rng = StdRng::seed_from_u64(7);
        let delay = jittered_delay(Duration::from_millis(500), Duration::ZERO, &mut rng);
        assert_eq!(delay, Duration::from_millis(500));
    }

    #[test]
    fn delay_stays_within_jitter_bounds() {
        let mut rng = StdRng::seed_from_u64(42);
        let interval = Duration::from_millis(1000);
        let jitter = Duration::from_millis(100);

        for _ in 0..10_000 {
            let delay = jittered_delay(interval, jitter, &mut rng);
            assert!(delay >= Duration::from_millis(900), "{:?}", delay);
            assert!(delay < Duration::from_millis(1100), "{:?}", delay);
        }
    }

    #[test]
    fn delay_never_drops_below_one_milli() {
        let mut rng = StdRng::seed_from_u64(3);

        for _ in 0..10_000 {
            let delay = jittered_delay(Duration::from_millis(1), Duration::from_millis(50), &mut rng);
            assert!(delay >= Duration::from_millis(1));
            assert!(delay < Duration::from_millis(51));
        }

        let delay = jittered_delay(Duration::ZERO, Duration::ZERO, &mut rng);
        assert_eq!(delay, Duration::from_millis(1));
    }

    #[test]
    fn huge_interval_saturates() {
        let mut rng = StdRng::seed_from_u64(1);
        let delay = jittered_delay(Duration::MAX, Duration::from_millis(10), &mut rng);
        assert!(delay > Duration::from_secs(1_000_000));
    }

    #[test]
    fn worker_ticks_until_woken_after_stop() {
        let shared = shared(Duration::from_millis(5), None);
        let ticks = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&ticks);
        let probe = move |used: &UsageCell| {
            counter.fetch_add(1, Ordering::SeqCst);
            used.increment(10);
            Ok::<(), io::Error>(())
        };

        let (tx, rx) = mpsc::channel();
        let handle = RefreshScheduler::new(Arc::clone(&shared), Box::new(probe), rx)
            .spawn(thread::Builder::new())
            .unwrap();

        while ticks.load(Ordering::SeqCst) < 3 {
            thread::sleep(Duration::from_millis(1));
        }

        shared.stop();
        let _ = tx.send(());
        handle.join().unwrap();

        let seen = ticks.load(Ordering::SeqCst);
        assert!(seen >= 3);
        assert_eq!(shared.used.get(), seen as u64 * 10);
    }

    #[test]
    fn failing_probe_does_not_stop_worker() {
        let shared = shared(Duration::from_millis(2), None);
        let attempts = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&attempts);
        let probe = move |_: &UsageCell| {
            counter.fetch_add(1, Ordering::SeqCst);
            Err::<(), io::Error>(io::Error::other("probe exploded"))
        };

        let (tx, rx) = mpsc::channel();
        let handle = RefreshScheduler::new(Arc::clone(&shared), Box::new(probe), rx)
            .spawn(thread::Builder::new())
            .unwrap();

        while attempts.load(Ordering::SeqCst) < 3 {
            thread::sleep(Duration::from_millis(1));
        }

        shared.stop();
        drop(tx);
        handle.join().unwrap();
        assert!(attempts.load(Ordering::SeqCst) >= 3);
    }

    #[test]
    fn wake_exits_long_sleep_promptly() {
        let shared = shared(Duration::from_secs(3600), None);
        let probe = |_: &UsageCell| Ok::<(), io::Error>(());

        let (tx, rx) = mpsc::channel();
        let handle = RefreshScheduler::new(Arc::clone(&shared), Box::new(probe), rx)
            .spawn(thread::Builder::new())
            .unwrap();

        shared.stop();
        let _ = tx.send(());
        handle.join().unwrap();
    }

    #[test]
    fn wake_while_running_still_ticks() {
        let shared = shared(Duration::from_secs(3600), None);
        let ticks = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&ticks);
        let probe = move |_: &UsageCell| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok::<(), io::Error>(())
        };

        let (tx, rx) = mpsc::channel();
        let handle = RefreshScheduler::new(Arc::clone(&shared), Box::new(probe), rx)
            .spawn(thread::Builder::new())
            .unwrap();

        tx.send(()).unwrap();
        while ticks.load(Ordering::SeqCst) < 1 {
            thread::sleep(Duration::from_millis(1));
        }

        shared.stop();
        let _ = tx.send(());
        handle.join().unwrap();
        assert_eq!(ticks.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn tick_persists_measured_value() {
        let temp = tempfile::TempDir::new().unwrap();
        let path = temp.path().join("dfsUsed");
        let shared = shared(Duration::from_secs(3600), Some(path.clone()));
        let probe = |used: &UsageCell| {
            used.set(777);
            Ok::<(), io::Error>(())
        };

        let (_tx, rx) = mpsc::channel();
        let mut scheduler = RefreshScheduler::new(Arc::clone(&shared), Box::new(probe), rx);
        scheduler.tick();

        let record = crate::usage::record::load_record(&path, None).unwrap().unwrap();
        assert_eq!(record.used_bytes, 777);
        assert!(shared.has_measured());
    }

    #[test]
    fn failed_tick_keeps_previous_record() {
        let temp = tempfile::TempDir::new().unwrap();
        let path = temp.path().join("dfsUsed");
        std::fs::write(&path, "1234 1700000000000").unwrap();
        let shared = shared(Duration::from_secs(3600), Some(path.clone()));
        shared.used.set(99);
        let probe = |_: &UsageCell| Err::<(), io::Error>(io::Error::other("unreadable"));

        let (_tx, rx) = mpsc::channel();
        let mut scheduler = RefreshScheduler::new(Arc::clone(&shared), Box::new(probe), rx);
        scheduler.tick();

        assert_eq!(std::fs::read_to_string(&path).unwrap(), "1234 1700000000000");
        assert_eq!(shared.used.get(), 99);
        assert!(!shared.has_measured());
    }
}
