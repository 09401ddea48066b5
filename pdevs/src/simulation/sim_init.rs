use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, error};

use crate::engine::{Engine, ParallelCoordinator};
use crate::model::{ConstructionError, CoupledBuilder, Model};
use crate::observer::{NoObserver, Observer, SharedObserver};
use crate::time::{Clock, MonotonicTime, NoClock};

use super::{Backend, ExecutionError, Progress, Runner};

/// Builder for a simulation.
///
/// By default, the simulation runs sequentially on the calling thread, as
/// fast as possible and without observer.
pub struct SimInit {
    model: Result<Model, ConstructionError>,
    num_threads: usize,
    observer: SharedObserver,
    clock: Box<dyn Clock + 'static>,
    clock_tolerance: Option<Duration>,
    progress: Option<Progress>,
}

impl SimInit {
    /// Creates a builder for a sequential simulation of the specified model
    /// tree.
    ///
    /// The model may also be provided as a coupled model builder or as the
    /// result of a model constructor, in which case construction errors are
    /// reported by [`init()`](SimInit::init).
    pub fn new(model: impl IntoModel) -> Self {
        Self {
            model: model.into_model(),
            num_threads: 1,
            observer: Arc::new(NoObserver),
            clock: Box::new(NoClock::new()),
            clock_tolerance: None,
            progress: None,
        }
    }

    /// Creates a builder for a multi-threaded simulation running on all
    /// available logical threads.
    pub fn with_all_threads(model: impl IntoModel) -> Self {
        Self::new(model).with_num_threads(num_cpus::get())
    }

    /// Sets the number of threads.
    ///
    /// With more than one thread, the model tree is flattened and executed by
    /// a [`ParallelCoordinator`]. The effective number of threads never
    /// exceeds the number of atomic models.
    pub fn with_num_threads(mut self, num_threads: usize) -> Self {
        self.num_threads = num_threads.max(1);

        self
    }

    /// Reports all protocol calls to the specified observer.
    pub fn with_observer(mut self, observer: impl Observer + 'static) -> Self {
        self.observer = Arc::new(observer);

        self
    }

    /// Synchronize the simulation with the provided [`Clock`].
    ///
    /// If the clock isn't explicitly set then the default [`NoClock`] is used,
    /// resulting in the simulation running as fast as possible.
    pub fn set_clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Box::new(clock);

        self
    }

    /// Specifies a tolerance for clock synchronization.
    ///
    /// When a clock synchronization tolerance is set, then any report of
    /// synchronization loss by [`Clock::synchronize`] that exceeds the
    /// specified tolerance will stop the run with
    /// [`ExecutionError::OutOfSync`]. By default, synchronization losses are
    /// ignored.
    pub fn set_clock_tolerance(mut self, tolerance: Duration) -> Self {
        self.clock_tolerance = Some(tolerance);

        self
    }

    /// Invokes the specified callback after each step with the time of the
    /// step and the end time of the run.
    pub fn with_progress(
        mut self,
        progress: impl FnMut(MonotonicTime, MonotonicTime) + Send + 'static,
    ) -> Self {
        self.progress = Some(Box::new(progress));

        self
    }

    /// Builds a simulation initialized at the specified start time.
    ///
    /// All models are initialized and the clock is synchronized with the
    /// start time.
    pub fn init(mut self, start_time: MonotonicTime) -> Result<Runner, ExecutionError> {
        let model = self.model.map_err(|e| {
            error!(target: "pdevs", "invalid model tree: {}", e);
            e
        })?;

        let mut backend = if self.num_threads > 1 {
            Backend::Parallel(ParallelCoordinator::build(
                model,
                self.num_threads,
                self.observer,
            ))
        } else {
            Backend::Sequential(Engine::build(model, None, &self.observer))
        };
        backend.init(start_time);
        self.clock.synchronize(start_time);

        debug!(
            target: "pdevs",
            model = backend.path(),
            num_threads = backend.num_threads(),
            "simulation initialized at {}, first event at {}",
            start_time,
            backend.next()
        );

        Ok(Runner::new(
            backend,
            self.clock,
            self.clock_tolerance,
            self.progress,
        ))
    }
}

impl fmt::Debug for SimInit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SimInit")
            .field("model", &self.model)
            .field("num_threads", &self.num_threads)
            .field("clock_tolerance", &self.clock_tolerance)
            .finish_non_exhaustive()
    }
}

/// A value from which the root of a model tree can be obtained.
pub trait IntoModel {
    /// Returns the model, or the error that prevented its construction.
    fn into_model(self) -> Result<Model, ConstructionError>;
}

impl IntoModel for Model {
    fn into_model(self) -> Result<Model, ConstructionError> {
        Ok(self)
    }
}

impl IntoModel for Result<Model, ConstructionError> {
    fn into_model(self) -> Result<Model, ConstructionError> {
        self
    }
}

impl IntoModel for CoupledBuilder {
    fn into_model(self) -> Result<Model, ConstructionError> {
        self.build()
    }
}
