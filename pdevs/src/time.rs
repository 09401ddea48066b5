//! Simulation time and pacing.
//!
//! This module provides most notably:
//!
//! * [`MonotonicTime`]: a monotonic timestamp based on the [TAI] time standard,
//!   used for every simulated instant handled by the kernel,
//! * [`Clock`]: a trait for types that can pace a simulation against an
//!   external time reference, implemented for instance by [`SystemClock`] and
//!   [`AutoSystemClock`].
//!
//! [TAI]: https://en.wikipedia.org/wiki/International_Atomic_Time
//!
//! # Infinite time
//!
//! A model that has no scheduled autonomous event is *passive*. Its next event
//! time is then [`MonotonicTime::MAX`], which the kernel treats as infinity:
//! time advances that would overflow past it saturate to it, and a simulation
//! whose next event time is `MonotonicTime::MAX` is considered passivated.
//!
//! # Examples
//!
//! A time advance expressed relative to the last transition:
//!
//! ```
//! use std::time::Duration;
//! use pdevs::time::{self, MonotonicTime};
//!
//! let t0 = MonotonicTime::EPOCH;
//!
//! assert_eq!(time::schedule(t0, Some(Duration::from_secs(2))), t0 + Duration::from_secs(2));
//! assert_eq!(time::schedule(t0, None), MonotonicTime::MAX);
//! ```

mod clock;

use std::time::Duration;

pub use tai_time::MonotonicTime;

pub use clock::{AutoSystemClock, Clock, NoClock, SyncStatus, SystemClock};

/// Returns the time of the next autonomous event given the time of the last
/// transition and a time advance, where `None` stands for an infinite time
/// advance.
///
/// The result saturates to [`MonotonicTime::MAX`].
pub fn schedule(last: MonotonicTime, time_advance: Option<Duration>) -> MonotonicTime {
    time_advance
        .and_then(|ta| last.checked_add(ta))
        .unwrap_or(MonotonicTime::MAX)
}

/// Returns `true` if the time stands for infinity, i.e. a passive schedule.
pub fn is_infinite(time: MonotonicTime) -> bool {
    time == MonotonicTime::MAX
}
