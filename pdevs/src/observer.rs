//! Observation of the simulation protocol.
//!
//! Every engine reports each of its effective `init`, `collect_outputs` and
//! `advance_simulation` calls to an [`Observer`] as a [`Record`]. Records carry
//! the path of the acting model, the time bounds of the call, the rendered
//! state of atomic models and the content of every non-empty bag touched by
//! the call.
//!
//! Calls that leave the engine untouched are not reported:
//!
//! * `collect_outputs(t)` is only reported when the model is imminent at `t`,
//! * an atomic model's `advance_simulation(t)` is only reported when it fires
//!   a transition; a coupled model always advances its children and always
//!   reports the call.
//!
//! Leaf records are thus the same whichever coordinator drives the leaves.
//!
//! The kernel does not format or persist records itself. Observers are passed
//! explicitly at construction time, and the default [`NoObserver`] disables
//! all rendering. A [`TracingObserver`](crate::tracing::TracingObserver)
//! forwarding records to the `tracing` ecosystem and a [`RecordingObserver`]
//! keeping them in memory are provided.
//!
//! Observers may be called concurrently from several worker threads when the
//! multi-threaded coordinator is used.

use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

use crate::ports::{Bags, Direction};
use crate::time::MonotonicTime;

/// The protocol call a record refers to.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Phase {
    /// Initialization.
    Init,
    /// Output collection at an imminent instant.
    Collect,
    /// State transition.
    Advance,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Init => f.write_str("init"),
            Self::Collect => f.write_str("collect"),
            Self::Advance => f.write_str("advance"),
        }
    }
}

/// The messages present in one non-empty bag.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BagRecord {
    /// Direction of the port.
    pub direction: Direction,
    /// Port name.
    pub port: Arc<str>,
    /// `Debug` renderings of the messages.
    pub messages: Vec<String>,
}

/// An observation emitted after a protocol call.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Record<'a> {
    /// The protocol call.
    pub phase: Phase,
    /// The path of the acting model, e.g. `top.sub.leaf`.
    pub path: &'a str,
    /// The time argument of the call.
    pub time: MonotonicTime,
    /// The time of the last transition after the call.
    pub last: MonotonicTime,
    /// The time of the next scheduled event after the call.
    pub next: MonotonicTime,
    /// The rendered state of an atomic model, `None` for coupled models.
    pub state: Option<String>,
    /// The non-empty bags touched by the call.
    pub bags: Vec<BagRecord>,
}

impl Record<'_> {
    /// Returns an owned copy of the record.
    pub fn to_owned_record(&self) -> OwnedRecord {
        OwnedRecord {
            phase: self.phase,
            path: self.path.to_string(),
            time: self.time,
            last: self.last,
            next: self.next,
            state: self.state.clone(),
            bags: self.bags.clone(),
        }
    }

    /// Returns the messages observed on the named port, if any.
    pub fn messages(&self, direction: Direction, port: &str) -> Option<&[String]> {
        self.bags
            .iter()
            .find(|bag| bag.direction == direction && &*bag.port == port)
            .map(|bag| bag.messages.as_slice())
    }
}

/// An owned [`Record`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OwnedRecord {
    /// See [`Record::phase`].
    pub phase: Phase,
    /// See [`Record::path`].
    pub path: String,
    /// See [`Record::time`].
    pub time: MonotonicTime,
    /// See [`Record::last`].
    pub last: MonotonicTime,
    /// See [`Record::next`].
    pub next: MonotonicTime,
    /// See [`Record::state`].
    pub state: Option<String>,
    /// See [`Record::bags`].
    pub bags: Vec<BagRecord>,
}

impl OwnedRecord {
    /// Returns the messages observed on the named port, if any.
    pub fn messages(&self, direction: Direction, port: &str) -> Option<&[String]> {
        self.bags
            .iter()
            .find(|bag| bag.direction == direction && &*bag.port == port)
            .map(|bag| bag.messages.as_slice())
    }
}

/// A subscriber to simulation records.
pub trait Observer: Send + Sync {
    /// Returns `false` if records should not be built at all.
    fn enabled(&self) -> bool {
        true
    }

    /// Processes a record.
    fn observe(&self, record: &Record<'_>);
}

/// An [`Observer`] that ignores everything.
#[derive(Copy, Clone, Debug, Default)]
pub struct NoObserver;

impl Observer for NoObserver {
    fn enabled(&self) -> bool {
        false
    }

    fn observe(&self, _: &Record<'_>) {}
}

/// An [`Observer`] that keeps a copy of every record.
///
/// Clones share the same storage, so a clone can be handed over to the
/// simulation while the original is kept for inspection.
#[derive(Clone, Debug, Default)]
pub struct RecordingObserver {
    records: Arc<Mutex<Vec<OwnedRecord>>>,
}

impl RecordingObserver {
    /// Creates an empty recorder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of all records received so far.
    pub fn records(&self) -> Vec<OwnedRecord> {
        self.records.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Removes and returns all records received so far.
    pub fn take(&self) -> Vec<OwnedRecord> {
        std::mem::take(&mut *self.records.lock().unwrap_or_else(PoisonError::into_inner))
    }
}

impl Observer for RecordingObserver {
    fn observe(&self, record: &Record<'_>) {
        self.records.lock().unwrap_or_else(PoisonError::into_inner).push(record.to_owned_record());
    }
}

/// Shared handle to an observer, as held by engines.
pub(crate) type SharedObserver = Arc<dyn Observer>;

/// Builds and emits a record if the observer is enabled.
///
/// Rendering only takes place when the observer is enabled.
pub(crate) fn emit(
    observer: &dyn Observer,
    phase: Phase,
    path: &str,
    (time, last, next): (MonotonicTime, MonotonicTime, MonotonicTime),
    state: Option<&dyn fmt::Debug>,
    bags: &[(Direction, &Bags)],
) {
    if !observer.enabled() {
        return;
    }

    let bags = bags
        .iter()
        .flat_map(|(direction, bags)| {
            bags.render()
                .into_iter()
                .map(move |(port, messages)| BagRecord {
                    direction: *direction,
                    port,
                    messages,
                })
        })
        .collect();

    observer.observe(&Record {
        phase,
        path,
        time,
        last,
        next,
        state: state.map(|state| format!("{:?}", state)),
        bags,
    });
}
