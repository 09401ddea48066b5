//! Loss of synchronization during step execution.

use std::thread;
use std::time::Duration;

use pdevs::model::{AtomicModel, Coupled, Model};
use pdevs::ports::{Bags, Interface};
use pdevs::simulation::{ExecutionError, SimInit};
use pdevs::time::{AutoSystemClock, MonotonicTime};

const MT_NUM_THREADS: usize = 4;

/// Transitions at the specified ticks, blocking each time for the specified
/// period.
#[derive(Debug)]
struct Blocker {
    ticks: Vec<Duration>,
    block_time: Duration,
    now: Duration,
    index: usize,
}
impl AtomicModel for Blocker {
    fn interface(&self) -> Interface {
        Interface::new()
    }
    fn time_advance(&self) -> Option<Duration> {
        self.ticks.get(self.index).map(|tick| *tick - self.now)
    }
    fn output(&self, _: &mut Bags) {}
    fn internal_transition(&mut self) {
        thread::sleep(self.block_time);
        self.now = self.ticks[self.index];
        self.index += 1;
    }
    fn external_transition(&mut self, _: Duration, _: &Bags) {}
}

/// A model that never does anything, to give the other workers a leaf.
#[derive(Debug)]
struct Idle;
impl AtomicModel for Idle {
    fn interface(&self) -> Interface {
        Interface::new()
    }
    fn time_advance(&self) -> Option<Duration> {
        None
    }
    fn output(&self, _: &mut Bags) {}
    fn internal_transition(&mut self) {}
    fn external_transition(&mut self, _: Duration, _: &Bags) {}
}

// Run a model blocking at the required ticks with the specified
// synchronization tolerance.
//
// Returns the next scheduled event relative to the start time, and the result
// of `Runner::run_until`.
fn clock_sync(
    num_threads: usize,
    block_time_ms: u64,
    clock_tolerance_ms: u64,
    ticks_ms: &[u64],
) -> (Duration, Result<MonotonicTime, ExecutionError>) {
    let blocker = Blocker {
        ticks: ticks_ms.iter().map(|t| Duration::from_millis(*t)).collect(),
        block_time: Duration::from_millis(block_time_ms),
        now: Duration::ZERO,
        index: 0,
    };

    let mut top = Coupled::builder("top").child(Model::atomic("blocker", blocker).unwrap());
    for i in 1..num_threads {
        top = top.child(Model::atomic(format!("idle{}", i), Idle).unwrap());
    }

    let t0 = MonotonicTime::EPOCH;
    let mut runner = SimInit::new(top)
        .with_num_threads(num_threads)
        .set_clock(AutoSystemClock::new())
        .set_clock_tolerance(Duration::from_millis(clock_tolerance_ms))
        .init(t0)
        .unwrap();

    let end = t0 + Duration::from_millis(ticks_ms.iter().copied().max().unwrap_or(0) + 1);
    let res = runner.run_until(end);
    let next_tick = runner.next_time().duration_since(t0);

    (next_tick, res)
}

fn clock_sync_zero_tolerance(num_threads: usize) {
    // The fourth tick should fail for being ~50ms too late.
    const BLOCKING_MS: u64 = 100;
    const CLOCK_TOLERANCE_MS: u64 = 0;
    const TICKS_MS: &[u64] = &[100, 250, 400, 450, 650];

    let (next_tick, res) = clock_sync(num_threads, BLOCKING_MS, CLOCK_TOLERANCE_MS, TICKS_MS);

    if let Err(ExecutionError::OutOfSync(_lag)) = res {
        assert_eq!(next_tick, Duration::from_millis(TICKS_MS[3]));
    } else {
        panic!("loss of synchronization not observed");
    }
}

fn clock_sync_with_tolerance(num_threads: usize) {
    // The third tick is ~50ms too late but should pass thanks to the tolerance.
    // The fifth tick should fail for being ~150ms too late, which is beyond the
    // 100ms tolerance.
    const BLOCKING_MS: u64 = 200;
    const CLOCK_TOLERANCE_MS: u64 = 100;
    const TICKS_MS: &[u64] = &[100, 350, 500, 800, 850, 1250];

    let (next_tick, res) = clock_sync(num_threads, BLOCKING_MS, CLOCK_TOLERANCE_MS, TICKS_MS);

    if let Err(ExecutionError::OutOfSync(lag)) = res {
        assert_eq!(next_tick, Duration::from_millis(TICKS_MS[4]));
        assert!(lag > Duration::from_millis(CLOCK_TOLERANCE_MS));
    } else {
        panic!("loss of synchronization not observed");
    }
}

fn clock_sync_no_tolerance(num_threads: usize) {
    // Without tolerance, lagging steps are executed anyway.
    const BLOCKING_MS: u64 = 100;
    const TICKS_MS: &[u64] = &[50, 100, 150];

    let blocker = Blocker {
        ticks: TICKS_MS.iter().map(|t| Duration::from_millis(*t)).collect(),
        block_time: Duration::from_millis(BLOCKING_MS),
        now: Duration::ZERO,
        index: 0,
    };
    let top = Coupled::builder("top")
        .child(Model::atomic("blocker", blocker).unwrap())
        .child(Model::atomic("idle", Idle).unwrap());

    let t0 = MonotonicTime::EPOCH;
    let mut runner = SimInit::new(top)
        .with_num_threads(num_threads)
        .set_clock(AutoSystemClock::new())
        .init(t0)
        .unwrap();

    assert_eq!(runner.run_until_passivate(), Ok(MonotonicTime::MAX));
    assert_eq!(runner.last_time(), t0 + Duration::from_millis(150));
}

#[test]
fn clock_sync_zero_tolerance_st() {
    clock_sync_zero_tolerance(1);
}

#[test]
fn clock_sync_zero_tolerance_mt() {
    clock_sync_zero_tolerance(MT_NUM_THREADS);
}

#[test]
fn clock_sync_with_tolerance_st() {
    clock_sync_with_tolerance(1);
}

#[test]
fn clock_sync_with_tolerance_mt() {
    clock_sync_with_tolerance(MT_NUM_THREADS);
}

#[test]
fn clock_sync_no_tolerance_st() {
    clock_sync_no_tolerance(1);
}

#[test]
fn clock_sync_no_tolerance_mt() {
    clock_sync_no_tolerance(MT_NUM_THREADS);
}
