use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Monotonic time source and sleeper used for input pacing and polling.
///
/// Scripted input is timing sensitive (button holds are tens of milliseconds),
/// so every wait in the script runner and the worker goes through this trait.
/// Tests substitute [`ManualClock`], which advances instantly.
pub trait Clock: Send + Sync + 'static {
    /// Time elapsed since the clock was created.
    fn now(&self) -> Duration;

    /// Blocks the caller for `duration`.
    fn sleep(&self, duration: Duration);
}

/// Scheduler sleeps shorter than this are not trusted; the tail of every
/// [`QuantaClock::sleep`] is busy-waited instead.
pub const SPIN_THRESHOLD: Duration = Duration::from_millis(3);

/// A clock that uses the CPU's Time-Stamp Counter (TSC) via the `quanta` crate.
///
/// Sleeps hand the bulk of the interval to the scheduler and spin for the last
/// [`SPIN_THRESHOLD`], which keeps sub-millisecond holds accurate.
#[derive(Debug, Clone)]
pub struct QuantaClock {
    clock: quanta::Clock,
    start: quanta::Instant,
}

impl Default for QuantaClock {
    fn default() -> Self {
        let clock = quanta::Clock::new();
        let start = clock.now();
        Self { clock, start }
    }
}

impl QuantaClock {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Clock for QuantaClock {
    fn now(&self) -> Duration {
        self.clock.now().duration_since(self.start)
    }

    fn sleep(&self, duration: Duration) {
        let deadline = self.now() + duration;
        if duration > SPIN_THRESHOLD {
            std::thread::sleep(duration - SPIN_THRESHOLD);
        }
        while self.now() < deadline {
            std::hint::spin_loop();
        }
    }
}

/// A clock that only moves when slept on or advanced explicitly.
///
/// Clones share the same timeline.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    elapsed_ns: Arc<AtomicU64>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn advance(&self, duration: Duration) {
        let nanos = u64::try_from(duration.as_nanos()).unwrap_or(u64::MAX);
        self.elapsed_ns.fetch_add(nanos, Ordering::AcqRel);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Duration {
        Duration::from_nanos(self.elapsed_ns.load(Ordering::Acquire))
    }

    fn sleep(&self, duration: Duration) {
        self.advance(duration);
        std::thread::yield_now();
    }
}
