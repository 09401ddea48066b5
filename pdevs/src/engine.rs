//! Abstract simulators.
//!
//! An [`Engine`] executes one node of a model tree according to the
//! Parallel-DEVS abstract simulator protocol:
//!
//! * a [`Simulator`] drives an atomic model through its transition contract,
//! * a [`Coordinator`] owns one engine per child of a coupled model and routes
//!   messages along the couplings.
//!
//! The kind of engine is chosen once, when the engine is built from a
//! [`Model`]; coordinators are built recursively.
//!
//! # Protocol
//!
//! Every engine keeps the time of its last transition `last` and of its next
//! scheduled event `next`, with `last <= next` at all times. One simulation
//! step at time `t` consists of two calls on the root engine:
//!
//! 1. [`collect_outputs(t)`](Engine::collect_outputs), which asks every
//!    imminent atomic model for its output and propagates the outputs up to
//!    the root through the external output couplings,
//! 2. [`advance_simulation(t)`](Engine::advance_simulation), which routes the
//!    collected messages through the internal and external input couplings and
//!    only then fires the transitions.
//!
//! All outputs are thus collected and routed before any transition fires, so
//! simultaneously imminent models observe the same input snapshot regardless
//! of traversal order.
//!
//! Calling `collect_outputs` with `t > next`, or `advance_simulation` with `t`
//! outside `[last, next]`, is a contract violation reported as a
//! [`SimulationError`]. Such errors are fatal: the state of the model tree is
//! not meaningful anymore and the run must be aborted.
//!
//! # Examples
//!
//! ```
//! use std::time::Duration;
//!
//! use pdevs::engine::Engine;
//! use pdevs::model::{AtomicModel, Model};
//! use pdevs::ports::{Bags, Interface, Port};
//! use pdevs::time::MonotonicTime;
//!
//! #[derive(Debug)]
//! struct Countdown {
//!     remaining: u32,
//!     out: Port<u32>,
//! }
//! impl AtomicModel for Countdown {
//!     fn interface(&self) -> Interface {
//!         Interface::new().output(&self.out)
//!     }
//!     fn time_advance(&self) -> Option<Duration> {
//!         (self.remaining > 0).then_some(Duration::from_secs(1))
//!     }
//!     fn output(&self, outputs: &mut Bags) {
//!         outputs.push(&self.out, self.remaining);
//!     }
//!     fn internal_transition(&mut self) {
//!         self.remaining -= 1;
//!     }
//!     fn external_transition(&mut self, _: Duration, _: &Bags) {}
//! }
//!
//! let out = Port::new("out");
//! let model = Model::atomic("countdown", Countdown { remaining: 2, out: out.clone() }).unwrap();
//! let mut engine = Engine::new(model);
//!
//! let t0 = MonotonicTime::EPOCH;
//! engine.init(t0);
//!
//! let t1 = engine.next();
//! assert_eq!(t1, t0 + Duration::from_secs(1));
//! engine.collect_outputs(t1).unwrap();
//! assert_eq!(engine.outbox().get(&out), &[2]);
//! engine.advance_simulation(t1).unwrap();
//! assert!(engine.outbox().is_empty());
//! ```

mod coordinator;
pub mod parallel;
mod simulator;

use std::error::Error;
use std::fmt;
use std::sync::Arc;

pub use coordinator::Coordinator;
pub use parallel::ParallelCoordinator;
pub use simulator::Simulator;

use crate::model::Model;
use crate::observer::{NoObserver, Observer, SharedObserver};
use crate::ports::Bags;
use crate::time::MonotonicTime;

/// An abstract simulator for a node of a model tree.
#[derive(Debug)]
pub enum Engine {
    /// The engine of an atomic model.
    Simulator(Simulator),
    /// The engine of a coupled model.
    Coordinator(Coordinator),
}

impl Engine {
    /// Builds the engine tree of a model without observer.
    pub fn new(model: Model) -> Self {
        Self::build(model, None, &(Arc::new(NoObserver) as SharedObserver))
    }

    /// Builds the engine tree of a model, reporting to the specified observer.
    pub fn with_observer(model: Model, observer: impl Observer + 'static) -> Self {
        Self::build(model, None, &(Arc::new(observer) as SharedObserver))
    }

    pub(crate) fn build(model: Model, parent: Option<&str>, observer: &SharedObserver) -> Self {
        match model {
            Model::Atomic(atomic) => Self::Simulator(Simulator::new(atomic, parent, observer.clone())),
            Model::Coupled(coupled) => {
                Self::Coordinator(Coordinator::new(coupled, parent, observer.clone()))
            }
        }
    }

    /// Returns the identifier of the model.
    pub fn id(&self) -> &str {
        match self {
            Self::Simulator(simulator) => simulator.id(),
            Self::Coordinator(coordinator) => coordinator.id(),
        }
    }

    /// Returns the path of the model from the root of the tree.
    pub fn path(&self) -> &str {
        match self {
            Self::Simulator(simulator) => simulator.path(),
            Self::Coordinator(coordinator) => coordinator.path(),
        }
    }

    /// Initializes the engine at the specified start time.
    pub fn init(&mut self, t0: MonotonicTime) {
        match self {
            Self::Simulator(simulator) => simulator.init(t0),
            Self::Coordinator(coordinator) => coordinator.init(t0),
        }
    }

    /// Collects the outputs of imminent models at time `t`.
    pub fn collect_outputs(&mut self, t: MonotonicTime) -> Result<(), SimulationError> {
        match self {
            Self::Simulator(simulator) => simulator.collect_outputs(t),
            Self::Coordinator(coordinator) => coordinator.collect_outputs(t),
        }
    }

    /// Routes pending messages and fires the transitions due at time `t`.
    pub fn advance_simulation(&mut self, t: MonotonicTime) -> Result<(), SimulationError> {
        match self {
            Self::Simulator(simulator) => simulator.advance_simulation(t),
            Self::Coordinator(coordinator) => coordinator.advance_simulation(t),
        }
    }

    /// Returns the time of the last transition.
    pub fn last(&self) -> MonotonicTime {
        match self {
            Self::Simulator(simulator) => simulator.last(),
            Self::Coordinator(coordinator) => coordinator.last(),
        }
    }

    /// Returns the time of the next scheduled event, `MonotonicTime::MAX` if
    /// passive.
    pub fn next(&self) -> MonotonicTime {
        match self {
            Self::Simulator(simulator) => simulator.next(),
            Self::Coordinator(coordinator) => coordinator.next(),
        }
    }

    /// Returns the input bags.
    pub fn inbox(&self) -> &Bags {
        match self {
            Self::Simulator(simulator) => simulator.inbox(),
            Self::Coordinator(coordinator) => coordinator.inbox(),
        }
    }

    /// Returns the input bags for injection of external messages.
    ///
    /// Injected messages are consumed by the next call to
    /// [`advance_simulation()`](Engine::advance_simulation).
    pub fn inbox_mut(&mut self) -> &mut Bags {
        match self {
            Self::Simulator(simulator) => simulator.inbox_mut(),
            Self::Coordinator(coordinator) => coordinator.inbox_mut(),
        }
    }

    /// Returns the output bags.
    ///
    /// Output bags are only populated between a call to
    /// [`collect_outputs()`](Engine::collect_outputs) at an imminent time and
    /// the subsequent call to
    /// [`advance_simulation()`](Engine::advance_simulation).
    pub fn outbox(&self) -> &Bags {
        match self {
            Self::Simulator(simulator) => simulator.outbox(),
            Self::Coordinator(coordinator) => coordinator.outbox(),
        }
    }

    /// Steps the simulation as long as the next event precedes `end`.
    ///
    /// Returns the time of the next event, which is `MonotonicTime::MAX` if
    /// the whole tree is passive.
    pub fn run_until(&mut self, end: MonotonicTime) -> Result<MonotonicTime, SimulationError> {
        self.run(&mut Until(end))?;

        Ok(self.next())
    }

    /// Steps the simulation for as long as the supervisor allows it.
    pub(crate) fn run(&mut self, supervisor: &mut dyn Supervisor) -> Result<(), SimulationError> {
        loop {
            let t = self.next();
            if !supervisor.proceed(t) {
                return Ok(());
            }
            self.collect_outputs(t)?;
            self.advance_simulation(t)?;
            supervisor.completed(t);
        }
    }
}

/// Decides, between two steps, whether the simulation should go on.
///
/// Supervisors are always called from the thread that started the run.
pub(crate) trait Supervisor {
    /// Returns `true` if the step at `next` should be executed.
    fn proceed(&mut self, next: MonotonicTime) -> bool;

    /// Notifies the completion of the step at `t`.
    fn completed(&mut self, _t: MonotonicTime) {}
}

/// Runs until the next event is at or after the wrapped time.
#[derive(Debug)]
pub(crate) struct Until(pub(crate) MonotonicTime);

impl Supervisor for Until {
    fn proceed(&mut self, next: MonotonicTime) -> bool {
        next < self.0
    }
}

/// A violation of the simulation protocol.
///
/// These errors reveal a defect in the model tree or in the driver and are
/// never recoverable.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SimulationError {
    /// The engine was stepped before being initialized.
    Uninitialized {
        /// Path of the model.
        model: String,
    },
    /// Outputs were collected after the next scheduled event.
    CollectOutOfWindow {
        /// Path of the model.
        model: String,
        /// Requested time.
        time: MonotonicTime,
        /// Next scheduled event of the model.
        next: MonotonicTime,
    },
    /// A transition was requested outside `[last, next]`.
    AdvanceOutOfWindow {
        /// Path of the model.
        model: String,
        /// Requested time.
        time: MonotonicTime,
        /// Last transition of the model.
        last: MonotonicTime,
        /// Next scheduled event of the model.
        next: MonotonicTime,
    },
    /// The output function was invoked on a model that is not imminent.
    NotImminent {
        /// Path of the model.
        model: String,
        /// Requested time.
        time: MonotonicTime,
        /// Next scheduled event of the model.
        next: MonotonicTime,
    },
    /// An external transition was attempted without input messages.
    EmptyExternalInput {
        /// Path of the model.
        model: String,
        /// Requested time.
        time: MonotonicTime,
    },
}

impl SimulationError {
    /// Returns the path of the model which detected the violation.
    pub fn model(&self) -> &str {
        match self {
            Self::Uninitialized { model }
            | Self::CollectOutOfWindow { model, .. }
            | Self::AdvanceOutOfWindow { model, .. }
            | Self::NotImminent { model, .. }
            | Self::EmptyExternalInput { model, .. } => model,
        }
    }
}

impl fmt::Display for SimulationError {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Uninitialized { model } => {
                write!(fmt, "model '{}' was stepped before initialization", model)
            }
            Self::CollectOutOfWindow { model, time, next } => write!(
                fmt,
                "outputs of model '{}' collected at {} after its next event at {}",
                model, time, next
            ),
            Self::AdvanceOutOfWindow {
                model,
                time,
                last,
                next,
            } => write!(
                fmt,
                "model '{}' advanced to {} outside of its window [{}, {}]",
                model, time, last, next
            ),
            Self::NotImminent { model, time, next } => write!(
                fmt,
                "output of model '{}' requested at {} while its next event is at {}",
                model, time, next
            ),
            Self::EmptyExternalInput { model, time } => write!(
                fmt,
                "external transition of model '{}' at {} without input",
                model, time
            ),
        }
    }
}

impl Error for SimulationError {}

/// Joins a parent path and a model identifier.
pub(crate) fn child_path(parent: Option<&str>, id: &str) -> Arc<str> {
    match parent {
        Some(parent) => format!("{}.{}", parent, id).into(),
        None => id.into(),
    }
}
