use std::time::{Duration, Instant, SystemTime};

use crate::time::MonotonicTime;

/// A pacing hook that can hold back a simulation run.
///
/// The [`Runner`](crate::simulation::Runner) calls
/// [`synchronize()`](Clock::synchronize) exactly once per simulation step,
/// between two steps and never in the middle of one, with the simulation time
/// of the step about to be executed.
///
/// A clock is associated to a simulation with
/// [`SimInit::set_clock()`](crate::simulation::SimInit::set_clock).
pub trait Clock: Send {
    /// Blocks until the deadline.
    fn synchronize(&mut self, deadline: MonotonicTime) -> SyncStatus;
}

/// The synchronization status reported by a clock.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum SyncStatus {
    /// The deadline was met.
    Synchronized,
    /// The deadline had already passed and the clock lags behind it by the
    /// duration given in the payload.
    OutOfSync(Duration),
}

/// A [`Clock`] that never blocks.
///
/// This is the default clock: the simulation runs as fast as possible.
#[derive(Copy, Clone, Debug, Default)]
pub struct NoClock {}

impl NoClock {
    /// Constructs a new `NoClock`.
    pub fn new() -> Self {
        Self {}
    }
}

impl Clock for NoClock {
    /// Returns `SyncStatus::Synchronized` immediately.
    fn synchronize(&mut self, _: MonotonicTime) -> SyncStatus {
        SyncStatus::Synchronized
    }
}

/// A simulation time pinned to an instant of the system's monotonic clock.
#[derive(Copy, Clone, Debug)]
struct Anchor {
    simulation: MonotonicTime,
    wall_clock: Instant,
}

impl Anchor {
    /// Returns the simulation time matching the current wall clock time.
    fn current(&self) -> MonotonicTime {
        let now = Instant::now();
        if now >= self.wall_clock {
            self.simulation + now.duration_since(self.wall_clock)
        } else {
            self.simulation - self.wall_clock.duration_since(now)
        }
    }

    /// Sleeps until the wall clock catches up with the deadline.
    fn wait_for(&self, deadline: MonotonicTime) -> SyncStatus {
        let current = self.current();
        if current > deadline {
            return SyncStatus::OutOfSync(current.duration_since(deadline));
        }
        spin_sleep::sleep(deadline.duration_since(current));

        SyncStatus::Synchronized
    }
}

/// A real-time [`Clock`] based on the system's monotonic clock.
///
/// The clock maps a reference simulation time onto a reference wall clock
/// time and then paces the simulation so that one simulated second lasts one
/// wall clock second.
#[derive(Copy, Clone, Debug)]
pub struct SystemClock(Anchor);

impl SystemClock {
    /// Constructs a `SystemClock` that matches the simulation reference time
    /// with an [`Instant`].
    ///
    /// The reference instant may lie in the past or in the future.
    ///
    /// # Examples
    ///
    /// ```
    /// use std::time::{Duration, Instant};
    ///
    /// use pdevs::time::{MonotonicTime, SystemClock};
    ///
    /// let t0 = MonotonicTime::EPOCH;
    ///
    /// // Simulated time `t0` corresponds to 10ms from now.
    /// let clock = SystemClock::from_instant(t0, Instant::now() + Duration::from_millis(10));
    /// ```
    pub fn from_instant(simulation_ref: MonotonicTime, wall_clock_ref: Instant) -> Self {
        Self(Anchor {
            simulation: simulation_ref,
            wall_clock: wall_clock_ref,
        })
    }

    /// Constructs a `SystemClock` that matches the simulation reference time
    /// with a [`SystemTime`].
    ///
    /// Pacing still relies on the system's monotonic clock: the non-monotonic
    /// system time is only sampled once, at construction, and the reference is
    /// moved to the current instant.
    pub fn from_system_time(simulation_ref: MonotonicTime, wall_clock_ref: SystemTime) -> Self {
        let wall_clock = Instant::now();
        let simulation = match SystemTime::now().duration_since(wall_clock_ref) {
            Ok(elapsed) => simulation_ref + elapsed,
            Err(early) => simulation_ref - early.duration(),
        };

        Self(Anchor {
            simulation,
            wall_clock,
        })
    }
}

impl Clock for SystemClock {
    /// Sleeps until the wall clock reaches the deadline, or reports the lag if
    /// the deadline is already behind.
    fn synchronize(&mut self, deadline: MonotonicTime) -> SyncStatus {
        self.0.wait_for(deadline)
    }
}

/// A real-time [`Clock`] which starts on its first use.
///
/// This clock behaves as a [`SystemClock`] whose reference is defined by the
/// first call to [`synchronize()`](Clock::synchronize): that call returns
/// immediately and binds its deadline to the current instant.
#[derive(Copy, Clone, Debug, Default)]
pub struct AutoSystemClock {
    anchor: Option<Anchor>,
}

impl AutoSystemClock {
    /// Constructs a new `AutoSystemClock`.
    pub fn new() -> Self {
        Self::default()
    }
}

impl Clock for AutoSystemClock {
    fn synchronize(&mut self, deadline: MonotonicTime) -> SyncStatus {
        match self.anchor {
            Some(anchor) => anchor.wait_for(deadline),
            None => {
                self.anchor = Some(Anchor {
                    simulation: deadline,
                    wall_clock: Instant::now(),
                });

                SyncStatus::Synchronized
            }
        }
    }
}
