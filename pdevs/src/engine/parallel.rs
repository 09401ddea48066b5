//! Multi-threaded execution of a model tree.
//!
//! The [`ParallelCoordinator`] produces the same simulation as a sequential
//! [`Engine`](crate::engine::Engine) but distributes the work of each step
//! over a fixed number of worker threads.
//!
//! At construction, the model tree is flattened into a list of atomic leaves
//! and a list of routes, each route being a chain of couplings from a leaf
//! output to a leaf input collapsed into a single edge. Each worker owns a
//! contiguous range of leaves and a contiguous range of routes, and every step
//! at time `t` goes through four phases separated by barriers:
//!
//! 1. *collect*: each worker collects the outputs of its imminent leaves,
//! 2. *route*: each worker copies the messages of its routes from source
//!    outboxes to destination inboxes,
//! 3. *transition*: each worker advances its leaves to `t` and computes the
//!    earliest next event among them,
//! 4. *decide*: the calling thread combines the local minima and decides
//!    whether and when the next step takes place.
//!
//! Each leaf sits behind its own mutex. Routes never hold two locks at a time:
//! messages are first copied out of the source outbox and only then appended
//! to the destination inbox, so routes converging on the same inbox are
//! serialized by the mutex of the destination.

mod flatten;

use std::any::Any;
use std::fmt;
use std::ops::Range;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Barrier, Mutex, MutexGuard, PoisonError};
use std::thread;

use crossbeam_utils::CachePadded;

use crate::model::Model;
use crate::observer::{self, NoObserver, Observer, Phase, SharedObserver};
use crate::ports::{Bags, Direction};
use crate::time::MonotonicTime;

use super::{SimulationError, Simulator, Supervisor, Until};
use flatten::{Destination, Route, Source};

/// A multi-threaded coordinator for a whole model tree.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
///
/// use pdevs::engine::ParallelCoordinator;
/// use pdevs::model::{AtomicModel, Coupled, Model};
/// use pdevs::ports::{Bags, Interface, Port};
/// use pdevs::time::MonotonicTime;
///
/// #[derive(Debug)]
/// struct Blinker {
///     on: bool,
/// }
/// impl AtomicModel for Blinker {
///     fn interface(&self) -> Interface {
///         Interface::new()
///     }
///     fn time_advance(&self) -> Option<Duration> {
///         Some(Duration::from_millis(500))
///     }
///     fn output(&self, _: &mut Bags) {}
///     fn internal_transition(&mut self) {
///         self.on = !self.on;
///     }
///     fn external_transition(&mut self, _: Duration, _: &Bags) {}
/// }
///
/// let blinkers = (0..8).map(|i| Model::atomic(format!("b{}", i), Blinker { on: false }).unwrap());
/// let model = Coupled::builder("panel").children(blinkers).build().unwrap();
///
/// let mut coordinator = ParallelCoordinator::new(model, 4);
/// let t0 = MonotonicTime::EPOCH;
/// coordinator.init(t0);
///
/// let next = coordinator.run_until(t0 + Duration::from_secs(2)).unwrap();
/// assert_eq!(next, t0 + Duration::from_secs(2));
/// assert_eq!(coordinator.last(), t0 + Duration::from_millis(1500));
/// ```
pub struct ParallelCoordinator {
    path: Arc<str>,
    leaves: Vec<CachePadded<Mutex<Simulator>>>,
    routes: Vec<Route>,
    inbox: Mutex<Bags>,
    outbox: Mutex<Bags>,
    num_threads: usize,
    last: MonotonicTime,
    next: MonotonicTime,
    initialized: bool,
    observer: SharedObserver,
}

impl ParallelCoordinator {
    /// Flattens a model tree for execution on up to `num_threads` threads.
    ///
    /// The number of worker threads is capped by the number of atomic models.
    pub fn new(model: Model, num_threads: usize) -> Self {
        Self::build(model, num_threads, Arc::new(NoObserver))
    }

    /// Flattens a model tree for execution on up to `num_threads` threads,
    /// reporting to the specified observer.
    pub fn with_observer(model: Model, num_threads: usize, observer: impl Observer + 'static) -> Self {
        Self::build(model, num_threads, Arc::new(observer))
    }

    pub(crate) fn build(model: Model, num_threads: usize, observer: SharedObserver) -> Self {
        let flat = flatten::flatten(model, &observer);
        let num_threads = num_threads.min(flat.leaves.len()).max(1);

        Self {
            path: flat.path,
            leaves: flat
                .leaves
                .into_iter()
                .map(|leaf| CachePadded::new(Mutex::new(leaf)))
                .collect(),
            routes: flat.routes,
            inbox: Mutex::new(flat.inbox),
            outbox: Mutex::new(flat.outbox),
            num_threads,
            last: MonotonicTime::EPOCH,
            next: MonotonicTime::MAX,
            initialized: false,
            observer,
        }
    }

    /// Returns the path of the root model.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Returns the number of worker threads used for each step, including
    /// the calling thread.
    pub fn num_threads(&self) -> usize {
        self.num_threads
    }

    /// Returns the number of atomic models.
    pub fn leaf_count(&self) -> usize {
        self.leaves.len()
    }

    /// Returns the time of the last step.
    pub fn last(&self) -> MonotonicTime {
        self.last
    }

    /// Returns the earliest next event among all atomic models.
    pub fn next(&self) -> MonotonicTime {
        self.next
    }

    /// Returns the input bags of the root model for injection of external
    /// messages.
    ///
    /// Injected messages are delivered at the next step.
    pub fn inbox_mut(&mut self) -> &mut Bags {
        self.inbox.get_mut().unwrap_or_else(PoisonError::into_inner)
    }

    /// Initializes all atomic models.
    pub fn init(&mut self, t0: MonotonicTime) {
        let mut next = MonotonicTime::MAX;
        for leaf in &mut self.leaves {
            let leaf = leaf.get_mut().unwrap_or_else(PoisonError::into_inner);
            leaf.init(t0);
            next = next.min(leaf.next());
        }
        self.last = t0;
        self.next = next;
        self.initialized = true;

        observer::emit(
            &*self.observer,
            Phase::Init,
            &self.path,
            (t0, self.last, self.next),
            None,
            &[],
        );
    }

    /// Steps the simulation as long as the next event precedes `end`.
    ///
    /// Returns the time of the next event, which is `MonotonicTime::MAX` if
    /// all models are passive.
    pub fn run_until(&mut self, end: MonotonicTime) -> Result<MonotonicTime, SimulationError> {
        self.run(&mut Until(end))?;

        Ok(self.next)
    }

    /// Steps the simulation for as long as the supervisor allows it.
    ///
    /// Worker threads only live for the duration of the call. If a model
    /// panics, the panic is propagated to the caller once all workers have
    /// stopped.
    pub(crate) fn run(&mut self, supervisor: &mut dyn Supervisor) -> Result<(), SimulationError> {
        if !self.initialized {
            return Err(SimulationError::Uninitialized {
                model: self.path.to_string(),
            });
        }
        if !supervisor.proceed(self.next) {
            return Ok(());
        }

        let mut last = self.last;
        let mut next = self.next;

        let failure = {
            let workspace = Workspace::new(self);
            let shared = &workspace;
            let mut started = false;
            let mut decide = || {
                if started {
                    let t = next;
                    let previous = last;
                    last = t;
                    next = shared.minimum();
                    shared.report(&*self.observer, &self.path, t, previous, next);

                    if shared.failure.is_set() {
                        return None;
                    }
                    supervisor.completed(t);
                    if !supervisor.proceed(next) {
                        return None;
                    }
                }
                started = true;

                Some(next)
            };

            thread::scope(|s| {
                for worker in 1..shared.num_workers {
                    s.spawn(move || shared.work(worker, None));
                }
                shared.work(0, Some(&mut decide));
            });

            workspace.failure
        };
        self.last = last;
        self.next = next;

        failure.into_result()
    }
}

impl fmt::Debug for ParallelCoordinator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ParallelCoordinator")
            .field("path", &self.path)
            .field("leaves", &self.leaves.len())
            .field("routes", &self.routes.len())
            .field("num_threads", &self.num_threads)
            .field("last", &self.last)
            .field("next", &self.next)
            .finish_non_exhaustive()
    }
}

/// State shared by the workers during one run.
struct Workspace<'a> {
    leaves: &'a [CachePadded<Mutex<Simulator>>],
    routes: &'a [Route],
    inbox: &'a Mutex<Bags>,
    outbox: &'a Mutex<Bags>,
    num_workers: usize,
    barrier: Barrier,
    /// Time of the current step, `None` when workers must stop.
    step: Mutex<Option<MonotonicTime>>,
    /// Earliest next event of the leaves of each worker.
    minima: Vec<CachePadded<Mutex<MonotonicTime>>>,
    failure: Failure,
}

impl<'a> Workspace<'a> {
    fn new(coordinator: &'a ParallelCoordinator) -> Self {
        let num_workers = coordinator.num_threads;

        Self {
            leaves: &coordinator.leaves,
            routes: &coordinator.routes,
            inbox: &coordinator.inbox,
            outbox: &coordinator.outbox,
            num_workers,
            barrier: Barrier::new(num_workers),
            step: Mutex::new(None),
            minima: (0..num_workers)
                .map(|_| CachePadded::new(Mutex::new(MonotonicTime::MAX)))
                .collect(),
            failure: Failure::default(),
        }
    }

    /// Runs the step loop of a worker.
    ///
    /// The leader decides the time of each step before the other workers are
    /// released.
    fn work(
        &self,
        worker: usize,
        mut leader: Option<&mut dyn FnMut() -> Option<MonotonicTime>>,
    ) {
        let leaves = partition(self.leaves.len(), self.num_workers, worker);
        let routes = partition(self.routes.len(), self.num_workers, worker);

        loop {
            if let Some(decide) = leader.as_mut() {
                let step = match panic::catch_unwind(AssertUnwindSafe(|| decide())) {
                    Ok(step) => step,
                    Err(payload) => {
                        self.failure.set_panic(payload);
                        None
                    }
                };
                *lock(&self.step) = step;
            }

            self.barrier.wait();
            let Some(t) = *lock(&self.step) else {
                break;
            };

            self.guard(|| self.collect(t, leaves.clone()));
            self.barrier.wait();

            self.guard(|| self.route(routes.clone()));
            self.barrier.wait();

            self.guard(|| self.advance(t, leaves.clone(), worker));
            self.barrier.wait();
        }
    }

    fn collect(&self, t: MonotonicTime, leaves: Range<usize>) -> Result<(), SimulationError> {
        for leaf in &self.leaves[leaves] {
            lock(&**leaf).collect_outputs(t)?;
        }

        Ok(())
    }

    fn route(&self, routes: Range<usize>) -> Result<(), SimulationError> {
        for route in &self.routes[routes] {
            let mut messages = match route.source {
                Source::Leaf { leaf, port } => {
                    let leaf = lock(&*self.leaves[leaf]);
                    let bag = leaf.outbox().bag(port);
                    if bag.is_empty() {
                        continue;
                    }
                    dyn_clone::clone_box(bag)
                }
                Source::RootInput { port } => {
                    let inbox = lock(self.inbox);
                    let bag = inbox.bag(port);
                    if bag.is_empty() {
                        continue;
                    }
                    dyn_clone::clone_box(bag)
                }
            };

            match route.destination {
                Destination::Leaf { leaf, port } => lock(&*self.leaves[leaf])
                    .inbox_mut()
                    .bag_mut(port)
                    .append(&mut *messages),
                Destination::RootOutput { port } => {
                    lock(self.outbox).bag_mut(port).append(&mut *messages)
                }
            }
        }

        Ok(())
    }

    fn advance(
        &self,
        t: MonotonicTime,
        leaves: Range<usize>,
        worker: usize,
    ) -> Result<(), SimulationError> {
        let mut next = MonotonicTime::MAX;
        for leaf in &self.leaves[leaves] {
            let mut leaf = lock(&**leaf);
            leaf.advance_simulation(t)?;
            next = next.min(leaf.next());
        }
        *lock(&*self.minima[worker]) = next;

        Ok(())
    }

    /// Returns the earliest next event over all leaves.
    fn minimum(&self) -> MonotonicTime {
        self.minima
            .iter()
            .map(|min| *lock(&**min))
            .min()
            .unwrap_or(MonotonicTime::MAX)
    }

    /// Reports the messages that crossed the boundary of the root model
    /// during the step at `t`, then clears the root bags.
    fn report(
        &self,
        observer: &dyn Observer,
        path: &str,
        t: MonotonicTime,
        previous: MonotonicTime,
        next: MonotonicTime,
    ) {
        let mut outbox = lock(self.outbox);
        let mut inbox = lock(self.inbox);

        observer::emit(
            observer,
            Phase::Collect,
            path,
            (t, previous, t),
            None,
            &[(Direction::Output, &outbox)],
        );
        observer::emit(
            observer,
            Phase::Advance,
            path,
            (t, t, next),
            None,
            &[(Direction::Input, &inbox)],
        );
        outbox.clear();
        inbox.clear();
    }

    /// Runs one phase unless a previous phase has failed.
    fn guard(&self, phase: impl FnOnce() -> Result<(), SimulationError>) {
        if self.failure.is_set() {
            return;
        }
        match panic::catch_unwind(AssertUnwindSafe(phase)) {
            Ok(Ok(())) => {}
            Ok(Err(e)) => self.failure.set_error(e),
            Err(payload) => self.failure.set_panic(payload),
        }
    }
}

/// The first failure of a run.
#[derive(Default)]
struct Failure {
    is_set: AtomicBool,
    error: Mutex<Option<SimulationError>>,
    panic: Mutex<Option<Box<dyn Any + Send>>>,
}

impl Failure {
    fn is_set(&self) -> bool {
        self.is_set.load(Ordering::Acquire)
    }

    fn set_error(&self, error: SimulationError) {
        lock(&self.error).get_or_insert(error);
        self.is_set.store(true, Ordering::Release);
    }

    fn set_panic(&self, payload: Box<dyn Any + Send>) {
        lock(&self.panic).get_or_insert(payload);
        self.is_set.store(true, Ordering::Release);
    }

    /// Resumes a captured panic, or returns the captured error.
    fn into_result(self) -> Result<(), SimulationError> {
        let panic = self.panic.into_inner().unwrap_or_else(PoisonError::into_inner);
        if let Some(payload) = panic {
            panic::resume_unwind(payload);
        }

        match self.error.into_inner().unwrap_or_else(PoisonError::into_inner) {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}

/// Locks a mutex, ignoring poisoning.
///
/// A poisoned mutex can only result from a panic in a model, which is
/// captured and resumed at the end of the run.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Returns the range of items assigned to a worker.
fn partition(len: usize, num_workers: usize, worker: usize) -> Range<usize> {
    (worker * len / num_workers)..((worker + 1) * len / num_workers)
}
