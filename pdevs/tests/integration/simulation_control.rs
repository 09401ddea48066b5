//! Run control: stepping, interruption and progress reports.

use std::sync::{Arc, Mutex, OnceLock};
use std::time::Duration;

use pdevs::model::{AtomicModel, Coupled, Model};
use pdevs::ports::{Bags, Interface};
use pdevs::simulation::{Interrupt, SimInit};
use pdevs::time::MonotonicTime;

use crate::models::{secs, Generator};

const MT_NUM_THREADS: usize = 4;

/// Counts down once per second, and requests an interruption at the
/// specified count.
#[derive(Debug)]
struct Countdown {
    remaining: u32,
    interrupt_at: Option<u32>,
    interrupt: Arc<OnceLock<Interrupt>>,
}
impl AtomicModel for Countdown {
    fn interface(&self) -> Interface {
        Interface::new()
    }
    fn time_advance(&self) -> Option<Duration> {
        (self.remaining > 0).then_some(secs(1.0))
    }
    fn output(&self, _: &mut Bags) {}
    fn internal_transition(&mut self) {
        self.remaining -= 1;
        if Some(self.remaining) == self.interrupt_at {
            if let Some(interrupt) = self.interrupt.get() {
                interrupt.interrupt();
            }
        }
    }
    fn external_transition(&mut self, _: Duration, _: &Bags) {}
}

fn tree(remaining: u32, interrupt_at: Option<u32>) -> (Model, Arc<OnceLock<Interrupt>>) {
    let interrupt = Arc::new(OnceLock::new());
    let model = Coupled::builder("top")
        .child(
            Model::atomic(
                "countdown",
                Countdown {
                    remaining,
                    interrupt_at,
                    interrupt: interrupt.clone(),
                },
            )
            .unwrap(),
        )
        .child(Generator::new(secs(4.0), ()).with_limit(1).into_model("alarm"))
        .build()
        .unwrap();

    (model, interrupt)
}

fn step_by_step(num_threads: usize) {
    let (model, _) = tree(2, None);
    let t0 = MonotonicTime::EPOCH;
    let mut runner = SimInit::new(model)
        .with_num_threads(num_threads)
        .init(t0)
        .unwrap();

    assert_eq!(runner.step(), Ok(Some(t0 + secs(1.0))));
    assert_eq!(runner.step(), Ok(Some(t0 + secs(2.0))));
    assert_eq!(runner.step(), Ok(Some(t0 + secs(4.0))));
    assert_eq!(runner.step(), Ok(None));
    assert_eq!(runner.last_time(), t0 + secs(4.0));
    assert_eq!(runner.next_time(), MonotonicTime::MAX);
}

fn run_until_passivate(num_threads: usize) {
    let (model, _) = tree(6, None);
    let t0 = MonotonicTime::EPOCH;
    let mut runner = SimInit::new(model)
        .with_num_threads(num_threads)
        .init(t0)
        .unwrap();

    assert_eq!(runner.run_until_passivate(), Ok(MonotonicTime::MAX));
    assert_eq!(runner.last_time(), t0 + secs(6.0));

    // Nothing left to do.
    assert_eq!(runner.run_until(t0 + secs(100.0)), Ok(MonotonicTime::MAX));
    assert_eq!(runner.last_time(), t0 + secs(6.0));
}

fn interrupt_from_model(num_threads: usize) {
    let (model, interrupt) = tree(8, Some(5));
    let t0 = MonotonicTime::EPOCH;
    let mut runner = SimInit::new(model)
        .with_num_threads(num_threads)
        .init(t0)
        .unwrap();
    interrupt.set(runner.interrupt_handle()).unwrap();

    // The step at 3s raises the interruption, which takes effect before the
    // step at 4s.
    assert_eq!(runner.run_until(t0 + secs(10.0)), Ok(t0 + secs(4.0)));
    assert_eq!(runner.last_time(), t0 + secs(3.0));

    // The run can be resumed.
    assert_eq!(runner.run_until(t0 + secs(10.0)), Ok(MonotonicTime::MAX));
    assert_eq!(runner.last_time(), t0 + secs(8.0));
}

fn stale_interrupt_is_discarded(num_threads: usize) {
    let (model, _) = tree(3, None);
    let t0 = MonotonicTime::EPOCH;
    let mut runner = SimInit::new(model)
        .with_num_threads(num_threads)
        .init(t0)
        .unwrap();

    runner.interrupt_handle().interrupt();

    assert_eq!(runner.run_until(t0 + secs(3.5)), Ok(t0 + secs(4.0)));
    assert_eq!(runner.last_time(), t0 + secs(3.0));
}

fn progress_reports(num_threads: usize) {
    let (model, _) = tree(3, None);
    let reports = Arc::new(Mutex::new(Vec::new()));
    let t0 = MonotonicTime::EPOCH;
    let mut runner = SimInit::new(model)
        .with_num_threads(num_threads)
        .with_progress({
            let reports = reports.clone();
            move |t, end| reports.lock().unwrap().push((t, end))
        })
        .init(t0)
        .unwrap();

    let end = t0 + secs(3.0);
    runner.run_until(end).unwrap();

    assert_eq!(
        *reports.lock().unwrap(),
        [(t0 + secs(1.0), end), (t0 + secs(2.0), end)]
    );
}

#[test]
fn step_by_step_st() {
    step_by_step(1);
}

#[test]
fn step_by_step_mt() {
    step_by_step(MT_NUM_THREADS);
}

#[test]
fn run_until_passivate_st() {
    run_until_passivate(1);
}

#[test]
fn run_until_passivate_mt() {
    run_until_passivate(MT_NUM_THREADS);
}

#[test]
fn interrupt_from_model_st() {
    interrupt_from_model(1);
}

#[test]
fn interrupt_from_model_mt() {
    interrupt_from_model(MT_NUM_THREADS);
}

#[test]
fn stale_interrupt_is_discarded_st() {
    stale_interrupt_is_discarded(1);
}

#[test]
fn stale_interrupt_is_discarded_mt() {
    stale_interrupt_is_discarded(MT_NUM_THREADS);
}

#[test]
fn progress_reports_st() {
    progress_reports(1);
}

#[test]
fn progress_reports_mt() {
    progress_reports(MT_NUM_THREADS);
}
