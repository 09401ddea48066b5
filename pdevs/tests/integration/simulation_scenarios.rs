//! End-to-end simulation of small model trees.

use std::time::Duration;

use pdevs::model::{AtomicModel, Coupled, Model};
use pdevs::observer::{OwnedRecord, Phase, RecordingObserver};
use pdevs::ports::{Bags, Direction, Interface, Port};
use pdevs::simulation::SimInit;
use pdevs::time::MonotonicTime;

use crate::models::{secs, Accumulator, Generator};

const MT_NUM_THREADS: usize = 4;

/// Adds up the values received on `in`, waking up every second.
#[derive(Debug, Default)]
struct Tally {
    total: u64,
}
impl Tally {
    fn input() -> Port<u64> {
        Port::new("in")
    }
}
impl AtomicModel for Tally {
    fn interface(&self) -> Interface {
        Interface::new().input(&Self::input())
    }
    fn time_advance(&self) -> Option<Duration> {
        Some(secs(1.0))
    }
    fn output(&self, _: &mut Bags) {}
    fn internal_transition(&mut self) {}
    fn external_transition(&mut self, _: Duration, inputs: &Bags) {
        self.total += inputs.get(&Self::input()).iter().sum::<u64>();
    }
}

// Returns the messages forwarded by the root model on the named output port,
// along with the time at which they were collected.
fn root_outputs(records: &[OwnedRecord], port: &str) -> Vec<(MonotonicTime, Vec<String>)> {
    records
        .iter()
        .filter(|r| r.path == "top" && r.phase == Phase::Collect)
        .filter_map(|r| {
            r.messages(Direction::Output, port)
                .map(|msgs| (r.time, msgs.to_vec()))
        })
        .collect()
}

fn periodic_generator(num_threads: usize) {
    let out = Port::<u64>::new("out");
    let top = Coupled::builder("top")
        .output(&out)
        .child(Generator::new(secs(1.0), 1u64).into_model("numbers"))
        .eoc("numbers", &out, &out);

    let recorder = RecordingObserver::new();
    let t0 = MonotonicTime::EPOCH;
    let mut runner = SimInit::new(top)
        .with_num_threads(num_threads)
        .with_observer(recorder.clone())
        .init(t0)
        .unwrap();

    assert_eq!(runner.run_until(t0 + secs(3.0)), Ok(t0 + secs(3.0)));
    assert_eq!(runner.last_time(), t0 + secs(2.0));

    assert_eq!(
        root_outputs(&recorder.records(), "out"),
        [
            (t0 + secs(1.0), vec!["1".to_string()]),
            (t0 + secs(2.0), vec!["1".to_string()]),
        ]
    );
}

fn accumulator_reset(num_threads: usize) {
    let out = Port::<u64>::new("out");
    let tick = Port::<()>::new("out");
    let top = Coupled::builder("top")
        .output(&Accumulator::sum())
        .child(Generator::new(secs(1.0), 1u64).into_model("numbers"))
        .child(Generator::new(secs(5.0), ()).into_model("resets"))
        .child(Accumulator::default().into_model("accumulator"))
        .ic("numbers", &out, "accumulator", &Accumulator::add())
        .ic("resets", &tick, "accumulator", &Accumulator::reset())
        .eoc("accumulator", &Accumulator::sum(), &Accumulator::sum());

    let recorder = RecordingObserver::new();
    let t0 = MonotonicTime::EPOCH;
    let mut runner = SimInit::new(top)
        .with_num_threads(num_threads)
        .with_observer(recorder.clone())
        .init(t0)
        .unwrap();

    runner.run_until(t0 + secs(11.0)).unwrap();
    let records = recorder.records();

    // The sum includes the value received at the very instant of the reset,
    // and nothing is reported one second later.
    assert_eq!(
        root_outputs(&records, "sum"),
        [
            (t0 + secs(5.0), vec!["5".to_string()]),
            (t0 + secs(10.0), vec!["5".to_string()]),
        ]
    );

    // The accumulator restarts from zero after each reset.
    let state_at_6s = records
        .iter()
        .find(|r| {
            r.path == "top.accumulator" && r.phase == Phase::Advance && r.time == t0 + secs(6.0)
        })
        .and_then(|r| r.state.clone())
        .unwrap();
    assert!(state_at_6s.contains("total: 1"), "{}", state_at_6s);
}

fn injected_input(num_threads: usize) {
    let add = Port::<u64>::new("add");
    let top = Coupled::builder("top")
        .input(&add)
        .output(&Accumulator::sum())
        .child(Accumulator::default().into_model("accumulator"))
        .child(Generator::new(secs(4.0), ()).into_model("resets"))
        .eic(&add, "accumulator", &Accumulator::add())
        .ic(
            "resets",
            &Port::<()>::new("out"),
            "accumulator",
            &Accumulator::reset(),
        )
        .eoc("accumulator", &Accumulator::sum(), &Accumulator::sum());

    let recorder = RecordingObserver::new();
    let t0 = MonotonicTime::EPOCH;
    let mut runner = SimInit::new(top)
        .with_num_threads(num_threads)
        .with_observer(recorder.clone())
        .init(t0)
        .unwrap();

    // Messages injected before a step are delivered at that step only.
    runner.inbox_mut().extend(&add, [2, 3]);
    runner.run_until(t0 + secs(2.0)).unwrap();
    runner.inbox_mut().push(&add, 10);
    runner.run_until(t0 + secs(5.0)).unwrap();

    assert_eq!(
        root_outputs(&recorder.records(), "sum"),
        [(t0 + secs(4.0), vec!["15".to_string()])]
    );
}

fn injected_input_atomic_root(num_threads: usize) {
    let recorder = RecordingObserver::new();
    let t0 = MonotonicTime::EPOCH;
    let mut runner = SimInit::new(Model::atomic("tally", Tally::default()))
        .with_num_threads(num_threads)
        .with_observer(recorder.clone())
        .init(t0)
        .unwrap();

    // The root is imminent at the step receiving the messages, which are
    // thus delivered through a confluent transition.
    runner.inbox_mut().extend(&Tally::input(), [3, 4]);
    assert_eq!(runner.step(), Ok(Some(t0 + secs(1.0))));
    runner.inbox_mut().push(&Tally::input(), 10);
    assert_eq!(runner.step(), Ok(Some(t0 + secs(2.0))));
    assert_eq!(runner.step(), Ok(Some(t0 + secs(3.0))));

    let totals: Vec<_> = recorder
        .records()
        .into_iter()
        .filter(|r| r.phase == Phase::Advance)
        .filter_map(|r| r.state.map(|state| (r.time, state)))
        .map(|(t, state)| (t, state.contains("total: 7"), state.contains("total: 17")))
        .collect();
    assert_eq!(
        totals,
        [
            (t0 + secs(1.0), true, false),
            (t0 + secs(2.0), false, true),
            (t0 + secs(3.0), false, true),
        ]
    );
}

#[test]
fn periodic_generator_st() {
    periodic_generator(1);
}

#[test]
fn periodic_generator_mt() {
    periodic_generator(MT_NUM_THREADS);
}

#[test]
fn accumulator_reset_st() {
    accumulator_reset(1);
}

#[test]
fn accumulator_reset_mt() {
    accumulator_reset(MT_NUM_THREADS);
}

#[test]
fn injected_input_st() {
    injected_input(1);
}

#[test]
fn injected_input_mt() {
    injected_input(MT_NUM_THREADS);
}

#[test]
fn injected_input_atomic_root_st() {
    injected_input_atomic_root(1);
}

#[test]
fn injected_input_atomic_root_mt() {
    injected_input_atomic_root(MT_NUM_THREADS);
}
