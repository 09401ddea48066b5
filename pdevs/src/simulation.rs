//! Simulation bench and execution.
//!
//! # Overview
//!
//! A simulation is set up with a [`SimInit`] builder, which takes ownership of
//! the root of a model tree and lets the user configure:
//!
//! * the number of worker threads: a single thread selects the sequential
//!   [`Engine`], several threads the [`ParallelCoordinator`],
//! * an [`Observer`](crate::observer::Observer) receiving the records of every
//!   protocol call,
//! * a [`Clock`] pacing the simulation against wall clock time, together with
//!   an optional synchronization tolerance,
//! * a progress callback invoked after each step.
//!
//! Calling [`SimInit::init()`] initializes all models at the start time and
//! returns a [`Runner`], which then advances the simulation with
//! [`run_until()`](Runner::run_until),
//! [`run_until_passivate()`](Runner::run_until_passivate) or
//! [`step()`](Runner::step).
//!
//! # Examples
//!
//! ```
//! use std::time::Duration;
//!
//! use pdevs::model::{AtomicModel, Coupled, Model};
//! use pdevs::ports::{Bags, Interface, Port};
//! use pdevs::simulation::SimInit;
//! use pdevs::time::MonotonicTime;
//!
//! /// Emits a pulse every second.
//! #[derive(Debug)]
//! struct Pulse {
//!     out: Port<()>,
//! }
//! impl AtomicModel for Pulse {
//!     fn interface(&self) -> Interface {
//!         Interface::new().output(&self.out)
//!     }
//!     fn time_advance(&self) -> Option<Duration> {
//!         Some(Duration::from_secs(1))
//!     }
//!     fn output(&self, outputs: &mut Bags) {
//!         outputs.push(&self.out, ());
//!     }
//!     fn internal_transition(&mut self) {}
//!     fn external_transition(&mut self, _: Duration, _: &Bags) {}
//! }
//!
//! let out = Port::<()>::new("out");
//! let top = Coupled::builder("top")
//!     .output(&out)
//!     .child(Model::atomic("pulse", Pulse { out: out.clone() }).unwrap())
//!     .eoc("pulse", &out, &out);
//!
//! let t0 = MonotonicTime::EPOCH;
//! let mut runner = SimInit::new(top).init(t0).unwrap();
//!
//! let next = runner.run_until(t0 + Duration::from_secs(3)).unwrap();
//! assert_eq!(next, t0 + Duration::from_secs(3));
//! assert_eq!(runner.last_time(), t0 + Duration::from_secs(2));
//! ```

mod sim_init;

use std::error::Error;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, error};

use crate::engine::{Engine, ParallelCoordinator, SimulationError, Supervisor};
use crate::model::ConstructionError;
use crate::ports::Bags;
use crate::time::{self, Clock, MonotonicTime, SyncStatus};

pub use sim_init::{IntoModel, SimInit};

/// Callback invoked after each step with the time of the step and the end
/// time of the run.
pub(crate) type Progress = Box<dyn FnMut(MonotonicTime, MonotonicTime) + Send>;

/// The engine driven by a [`Runner`].
#[derive(Debug)]
pub(crate) enum Backend {
    Sequential(Engine),
    Parallel(ParallelCoordinator),
}

impl Backend {
    fn init(&mut self, t0: MonotonicTime) {
        match self {
            Self::Sequential(engine) => engine.init(t0),
            Self::Parallel(coordinator) => coordinator.init(t0),
        }
    }

    fn run(&mut self, supervisor: &mut dyn Supervisor) -> Result<(), SimulationError> {
        match self {
            Self::Sequential(engine) => engine.run(supervisor),
            Self::Parallel(coordinator) => coordinator.run(supervisor),
        }
    }

    fn path(&self) -> &str {
        match self {
            Self::Sequential(engine) => engine.path(),
            Self::Parallel(coordinator) => coordinator.path(),
        }
    }

    fn num_threads(&self) -> usize {
        match self {
            Self::Sequential(_) => 1,
            Self::Parallel(coordinator) => coordinator.num_threads(),
        }
    }

    fn last(&self) -> MonotonicTime {
        match self {
            Self::Sequential(engine) => engine.last(),
            Self::Parallel(coordinator) => coordinator.last(),
        }
    }

    fn next(&self) -> MonotonicTime {
        match self {
            Self::Sequential(engine) => engine.next(),
            Self::Parallel(coordinator) => coordinator.next(),
        }
    }

    fn inbox_mut(&mut self) -> &mut Bags {
        match self {
            Self::Sequential(engine) => engine.inbox_mut(),
            Self::Parallel(coordinator) => coordinator.inbox_mut(),
        }
    }
}

/// An initialized simulation.
///
/// A `Runner` is created by calling [`SimInit::init()`]. Each step of the
/// simulation:
///
/// 1. determines the time of the earliest scheduled event, then
/// 2. calls [`Clock::synchronize()`] which, unless the simulation is
///    configured to run as fast as possible, blocks until the desired wall
///    clock time, and finally
/// 3. collects the outputs of all imminent models, routes them and fires all
///    transitions due at that time.
pub struct Runner {
    backend: Backend,
    clock: Box<dyn Clock>,
    clock_tolerance: Option<Duration>,
    progress: Option<Progress>,
    interrupt: Arc<AtomicBool>,
}

impl Runner {
    pub(crate) fn new(
        backend: Backend,
        clock: Box<dyn Clock>,
        clock_tolerance: Option<Duration>,
        progress: Option<Progress>,
    ) -> Self {
        Self {
            backend,
            clock,
            clock_tolerance,
            progress,
            interrupt: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Returns the time of the last step, or the start time if no step was
    /// executed yet.
    pub fn last_time(&self) -> MonotonicTime {
        self.backend.last()
    }

    /// Returns the time of the next scheduled event, `MonotonicTime::MAX` if
    /// all models are passive.
    pub fn next_time(&self) -> MonotonicTime {
        self.backend.next()
    }

    /// Returns the input bags of the root model.
    ///
    /// Messages injected into these bags are delivered at the next step: along
    /// the external input couplings of a coupled root model, or directly to
    /// an atomic root model, whose transition at that step is then confluent.
    pub fn inbox_mut(&mut self) -> &mut Bags {
        self.backend.inbox_mut()
    }

    /// Returns a handle that can stop a run from another thread.
    pub fn interrupt_handle(&self) -> Interrupt {
        Interrupt(self.interrupt.clone())
    }

    /// Executes all steps scheduled strictly before `end`.
    ///
    /// Returns the time of the next scheduled event. The run returns early
    /// without error if it is interrupted with an [`Interrupt`] handle; any
    /// interruption requested before this call is discarded.
    pub fn run_until(&mut self, end: MonotonicTime) -> Result<MonotonicTime, ExecutionError> {
        self.interrupt.store(false, Ordering::Relaxed);
        debug!(target: "pdevs", model = self.backend.path(), "running until {}", end);

        self.drive(end, None, true)?;
        debug!(
            target: "pdevs",
            model = self.backend.path(),
            "run ended at {}, next event at {}",
            self.last_time(),
            self.next_time()
        );

        Ok(self.next_time())
    }

    /// Executes all steps until all models are passive.
    ///
    /// Returns `MonotonicTime::MAX` unless the run was interrupted.
    pub fn run_until_passivate(&mut self) -> Result<MonotonicTime, ExecutionError> {
        self.run_until(MonotonicTime::MAX)
    }

    /// Executes the next scheduled step.
    ///
    /// Returns the time of the executed step, or `None` if all models are
    /// passive. Interruptions are ignored.
    pub fn step(&mut self) -> Result<Option<MonotonicTime>, ExecutionError> {
        let t = self.next_time();
        if time::is_infinite(t) {
            return Ok(None);
        }
        self.drive(MonotonicTime::MAX, Some(1), false)?;

        Ok(Some(t))
    }

    fn drive(
        &mut self,
        end: MonotonicTime,
        max_steps: Option<u64>,
        interruptible: bool,
    ) -> Result<(), ExecutionError> {
        let mut pacer = Pacer {
            end,
            steps_left: max_steps,
            clock: &mut *self.clock,
            tolerance: self.clock_tolerance,
            interrupt: interruptible.then_some(&*self.interrupt),
            progress: self.progress.as_mut(),
            lag: None,
            interrupted: false,
        };
        let res = self.backend.run(&mut pacer);
        let (lag, interrupted) = (pacer.lag, pacer.interrupted);

        if let Err(e) = res {
            error!(target: "pdevs", model = e.model(), "simulation aborted: {}", e);

            return Err(e.into());
        }
        if let Some(lag) = lag {
            error!(
                target: "pdevs",
                model = self.backend.path(),
                "simulation lagging {:?} behind the clock at {}",
                lag,
                self.next_time()
            );

            return Err(ExecutionError::OutOfSync(lag));
        }
        if interrupted {
            debug!(
                target: "pdevs",
                model = self.backend.path(),
                "simulation interrupted before {}",
                self.next_time()
            );
        }

        Ok(())
    }
}

impl fmt::Debug for Runner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Runner")
            .field("backend", &self.backend)
            .field("clock_tolerance", &self.clock_tolerance)
            .finish_non_exhaustive()
    }
}

/// A handle to interrupt a [`Runner`] from another thread.
///
/// An interruption takes effect between two steps: the step in progress, if
/// any, always completes.
#[derive(Clone, Debug)]
pub struct Interrupt(Arc<AtomicBool>);

impl Interrupt {
    /// Requests the interruption of the current run.
    pub fn interrupt(&self) {
        self.0.store(true, Ordering::Relaxed);
    }
}

/// Supervisor applying the configuration of a [`Runner`] between steps.
struct Pacer<'a> {
    end: MonotonicTime,
    steps_left: Option<u64>,
    clock: &'a mut dyn Clock,
    tolerance: Option<Duration>,
    interrupt: Option<&'a AtomicBool>,
    progress: Option<&'a mut Progress>,
    lag: Option<Duration>,
    interrupted: bool,
}

impl Supervisor for Pacer<'_> {
    fn proceed(&mut self, next: MonotonicTime) -> bool {
        if next >= self.end || time::is_infinite(next) || self.steps_left == Some(0) {
            return false;
        }
        if self
            .interrupt
            .is_some_and(|interrupt| interrupt.load(Ordering::Relaxed))
        {
            self.interrupted = true;
            return false;
        }
        if let SyncStatus::OutOfSync(lag) = self.clock.synchronize(next) {
            if self.tolerance.is_some_and(|tolerance| lag > tolerance) {
                self.lag = Some(lag);
                return false;
            }
        }
        if let Some(steps_left) = &mut self.steps_left {
            *steps_left -= 1;
        }

        true
    }

    fn completed(&mut self, t: MonotonicTime) {
        if let Some(progress) = &mut self.progress {
            progress(t, self.end);
        }
    }
}

/// An error returned upon simulation execution failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutionError {
    /// The model tree is ill-formed.
    Construction(ConstructionError),
    /// The simulation protocol was violated. The simulation cannot be
    /// resumed.
    Simulation(SimulationError),
    /// The simulation lagged behind its clock by more than the configured
    /// tolerance. The lag is provided.
    ///
    /// The step that could not be synchronized is not executed, so the
    /// simulation can be resumed.
    OutOfSync(Duration),
}

impl fmt::Display for ExecutionError {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Construction(e) => write!(fmt, "invalid model tree: {}", e),
            Self::Simulation(e) => write!(fmt, "simulation protocol violation: {}", e),
            Self::OutOfSync(lag) => write!(
                fmt,
                "the simulation lagged behind its clock by {:?}, beyond the synchronization tolerance",
                lag
            ),
        }
    }
}

impl Error for ExecutionError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Construction(e) => Some(e),
            Self::Simulation(e) => Some(e),
            Self::OutOfSync(_) => None,
        }
    }
}

impl From<ConstructionError> for ExecutionError {
    fn from(e: ConstructionError) -> Self {
        Self::Construction(e)
    }
}

impl From<SimulationError> for ExecutionError {
    fn from(e: SimulationError) -> Self {
        Self::Simulation(e)
    }
}
