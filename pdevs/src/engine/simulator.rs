use std::fmt;
use std::sync::Arc;

use crate::model::{Atomic, AtomicModel};
use crate::observer::{self, Phase, SharedObserver};
use crate::ports::{Bags, Direction};
use crate::time::{self, MonotonicTime};

use super::{child_path, SimulationError};

/// The engine of an atomic model.
///
/// A simulator fires the transitions of its model at the right instants:
///
/// | input at `t` | `t == next`      | `t < next`           |
/// |--------------|------------------|----------------------|
/// | none         | internal         | nothing              |
/// | some         | internal, then external with zero elapsed time | external |
pub struct Simulator {
    id: String,
    path: Arc<str>,
    model: Box<dyn AtomicModel>,
    last: MonotonicTime,
    next: MonotonicTime,
    initialized: bool,
    inbox: Bags,
    outbox: Bags,
    observer: SharedObserver,
}

impl Simulator {
    pub(crate) fn new(atomic: Atomic, parent: Option<&str>, observer: SharedObserver) -> Self {
        let (id, interface, model) = atomic.into_parts();
        let path = child_path(parent, &id);

        Self {
            id,
            path,
            model,
            last: MonotonicTime::EPOCH,
            next: MonotonicTime::MAX,
            initialized: false,
            inbox: interface.bags(Direction::Input),
            outbox: interface.bags(Direction::Output),
            observer,
        }
    }

    /// Returns the identifier of the model.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Returns the path of the model.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Returns the time of the last transition.
    pub fn last(&self) -> MonotonicTime {
        self.last
    }

    /// Returns the time of the next internal event.
    pub fn next(&self) -> MonotonicTime {
        self.next
    }

    /// Returns the input bags.
    pub fn inbox(&self) -> &Bags {
        &self.inbox
    }

    /// Returns the input bags for injection of external messages.
    pub fn inbox_mut(&mut self) -> &mut Bags {
        &mut self.inbox
    }

    /// Returns the output bags.
    pub fn outbox(&self) -> &Bags {
        &self.outbox
    }

    /// Returns `true` if the model has an internal event scheduled at `t`.
    pub fn is_imminent(&self, t: MonotonicTime) -> bool {
        t == self.next && !time::is_infinite(t)
    }

    /// Schedules the first internal event of the model.
    pub fn init(&mut self, t0: MonotonicTime) {
        self.last = t0;
        self.next = time::schedule(t0, self.model.time_advance());
        self.initialized = true;

        self.observe(Phase::Init, t0, &[]);
    }

    /// Computes the output of the model if it is imminent at `t`.
    ///
    /// Nothing happens if `t` precedes the next internal event.
    ///
    /// The input bags are left untouched: they are emptied at the end of each
    /// [`advance_simulation()`](Self::advance_simulation), so messages found
    /// there were injected for the coming advance at `t`.
    pub fn collect_outputs(&mut self, t: MonotonicTime) -> Result<(), SimulationError> {
        self.check_initialized()?;
        if t > self.next {
            return Err(SimulationError::CollectOutOfWindow {
                model: self.path.to_string(),
                time: t,
                next: self.next,
            });
        }
        if !self.is_imminent(t) {
            return Ok(());
        }

        self.output(t)?;

        self.observe(Phase::Collect, t, &[(Direction::Output, &self.outbox)]);

        Ok(())
    }

    /// Fires the transition due at `t`, if any, and schedules the next
    /// internal event.
    pub fn advance_simulation(&mut self, t: MonotonicTime) -> Result<(), SimulationError> {
        self.check_initialized()?;
        if t < self.last || t > self.next {
            return Err(SimulationError::AdvanceOutOfWindow {
                model: self.path.to_string(),
                time: t,
                last: self.last,
                next: self.next,
            });
        }

        // The outputs of this instant have already been routed.
        self.outbox.clear();

        let imminent = self.is_imminent(t);
        if self.inbox.is_empty() {
            if !imminent {
                return Ok(());
            }
            self.model.internal_transition();
        } else if imminent {
            // Internal effects resolve before same-instant external effects.
            self.model.internal_transition();
            self.external_transition(t, t)?;
        } else {
            self.external_transition(t, self.last)?;
        }

        self.last = t;
        self.next = time::schedule(t, self.model.time_advance());

        self.observe(Phase::Advance, t, &[(Direction::Input, &self.inbox)]);
        self.inbox.clear();

        Ok(())
    }

    /// Calls the output function of the model.
    fn output(&mut self, t: MonotonicTime) -> Result<(), SimulationError> {
        if !self.is_imminent(t) {
            return Err(SimulationError::NotImminent {
                model: self.path.to_string(),
                time: t,
                next: self.next,
            });
        }
        self.outbox.clear();
        self.model.output(&mut self.outbox);

        Ok(())
    }

    /// Calls the external transition of the model with the time elapsed since
    /// `since`.
    fn external_transition(
        &mut self,
        t: MonotonicTime,
        since: MonotonicTime,
    ) -> Result<(), SimulationError> {
        if self.inbox.is_empty() {
            return Err(SimulationError::EmptyExternalInput {
                model: self.path.to_string(),
                time: t,
            });
        }
        self.model
            .external_transition(t.duration_since(since), &self.inbox);

        Ok(())
    }

    fn check_initialized(&self) -> Result<(), SimulationError> {
        if self.initialized {
            Ok(())
        } else {
            Err(SimulationError::Uninitialized {
                model: self.path.to_string(),
            })
        }
    }

    fn observe(&self, phase: Phase, t: MonotonicTime, bags: &[(Direction, &Bags)]) {
        observer::emit(
            &*self.observer,
            phase,
            &self.path,
            (t, self.last, self.next),
            Some(&self.model as &dyn fmt::Debug),
            bags,
        );
    }
}

impl fmt::Debug for Simulator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Simulator")
            .field("path", &self.path)
            .field("last", &self.last)
            .field("next", &self.next)
            .field("model", &self.model)
            .finish_non_exhaustive()
    }
}
