//! Ordering of outputs and transitions within a step.

use std::time::Duration;

use pdevs::model::{AtomicModel, Coupled, Model};
use pdevs::observer::{Phase, RecordingObserver};
use pdevs::ports::{Bags, Direction, Interface, Port};
use pdevs::simulation::SimInit;
use pdevs::time::MonotonicTime;

use crate::models::{secs, Generator, Recorder};

const MT_NUM_THREADS: usize = 4;

/// Doubles its value periodically and adds the values it receives.
#[derive(Debug)]
struct Doubler {
    value: u64,
    elapsed: Vec<Duration>,
}
impl Doubler {
    fn add() -> Port<u64> {
        Port::new("add")
    }
}
impl AtomicModel for Doubler {
    fn interface(&self) -> Interface {
        Interface::new().input(&Self::add())
    }
    fn time_advance(&self) -> Option<Duration> {
        Some(secs(1.0))
    }
    fn output(&self, _: &mut Bags) {}
    fn internal_transition(&mut self) {
        self.value *= 2;
    }
    fn external_transition(&mut self, elapsed: Duration, inputs: &Bags) {
        self.elapsed.push(elapsed);
        self.value += inputs.get(&Self::add()).iter().sum::<u64>();
    }
}

/// Emits its transition count periodically.
#[derive(Debug, Default)]
struct Counter {
    count: u64,
}
impl Counter {
    fn out() -> Port<u64> {
        Port::new("out")
    }
}
impl AtomicModel for Counter {
    fn interface(&self) -> Interface {
        Interface::new().output(&Self::out())
    }
    fn time_advance(&self) -> Option<Duration> {
        Some(secs(1.0))
    }
    fn output(&self, outputs: &mut Bags) {
        outputs.push(&Self::out(), self.count);
    }
    fn internal_transition(&mut self) {
        self.count += 1;
    }
    fn external_transition(&mut self, _: Duration, _: &Bags) {}
}

fn confluent_transition(num_threads: usize) {
    let out = Port::<u64>::new("out");
    let top = Coupled::builder("top")
        .child(Generator::new(secs(1.0), 10u64).with_limit(1).into_model("source"))
        .child(
            Model::atomic(
                "doubler",
                Doubler {
                    value: 1,
                    elapsed: Vec::new(),
                },
            )
            .unwrap(),
        )
        .ic("source", &out, "doubler", &Doubler::add());

    let recorder = RecordingObserver::new();
    let t0 = MonotonicTime::EPOCH;
    let mut runner = SimInit::new(top)
        .with_num_threads(num_threads)
        .with_observer(recorder.clone())
        .init(t0)
        .unwrap();
    runner.run_until(t0 + secs(1.5)).unwrap();

    // The internal transition fires first, then the external transition with
    // a zero elapsed time: 1 * 2 + 10.
    let state = recorder
        .records()
        .into_iter()
        .find(|r| r.path == "top.doubler" && r.phase == Phase::Advance)
        .and_then(|r| r.state)
        .unwrap();
    assert!(state.contains("value: 12"), "{}", state);
    assert!(state.contains("elapsed: [0ns]"), "{}", state);
}

fn output_before_transition(num_threads: usize) {
    let (recorder, log) = Recorder::<u64>::new();

    // Both models are imminent at each step; the receiver must observe the
    // value held by the counter before its transition.
    let top = Coupled::builder("top")
        .child(Model::atomic("counter", Counter::default()).unwrap())
        .child(recorder.into_model("recorder"))
        .ic("counter", &Counter::out(), "recorder", &Recorder::<u64>::input());

    let t0 = MonotonicTime::EPOCH;
    let mut runner = SimInit::new(top)
        .with_num_threads(num_threads)
        .init(t0)
        .unwrap();
    runner.run_until(t0 + secs(3.5)).unwrap();

    assert_eq!(
        *log.lock().unwrap(),
        [(secs(1.0), 0), (secs(2.0), 1), (secs(3.0), 2)]
    );
}

fn no_stale_messages(num_threads: usize) {
    let out = Port::<u64>::new("out");
    let tick = Port::<()>::new("out");
    let input = Port::<u64>::new("data");
    let (sink, log) = Recorder::<u64>::new();
    let (tick_sink, _) = Recorder::<()>::new();

    // A single message travels down three levels, while periodic ticks keep
    // every level stepping afterwards.
    let inner = Coupled::builder("inner")
        .input(&input)
        .child(sink.into_model("sink"))
        .child(Generator::new(secs(1.0), ()).into_model("ticker"))
        .child(tick_sink.into_model("tick_sink"))
        .eic(&input, "sink", &Recorder::<u64>::input())
        .ic("ticker", &tick, "tick_sink", &Recorder::<()>::input())
        .build()
        .unwrap();
    let mid = Coupled::builder("mid")
        .input(&input)
        .output(&out)
        .child(inner)
        .eic(&input, "inner", &input)
        .build()
        .unwrap();
    let top = Coupled::builder("top")
        .output(&out)
        .child(Generator::new(secs(1.0), 42u64).with_limit(1).into_model("source"))
        .child(mid)
        .ic("source", &out, "mid", &input)
        .eoc("source", &out, &out);

    let recorder = RecordingObserver::new();
    let t0 = MonotonicTime::EPOCH;
    let mut runner = SimInit::new(top)
        .with_num_threads(num_threads)
        .with_observer(recorder.clone())
        .init(t0)
        .unwrap();
    assert_eq!(runner.run_until(t0 + secs(5.5)), Ok(t0 + secs(6.0)));

    assert_eq!(*log.lock().unwrap(), [(secs(1.0), 42)]);

    let root_outputs: Vec<_> = recorder
        .records()
        .into_iter()
        .filter(|r| r.path == "top" && r.phase == Phase::Collect)
        .filter(|r| r.messages(Direction::Output, "out").is_some())
        .map(|r| r.time)
        .collect();
    assert_eq!(root_outputs, [t0 + secs(1.0)]);
}

#[test]
fn confluent_transition_st() {
    confluent_transition(1);
}

#[test]
fn confluent_transition_mt() {
    confluent_transition(MT_NUM_THREADS);
}

#[test]
fn output_before_transition_st() {
    output_before_transition(1);
}

#[test]
fn output_before_transition_mt() {
    output_before_transition(MT_NUM_THREADS);
}

#[test]
fn no_stale_messages_st() {
    no_stale_messages(1);
}

#[test]
fn no_stale_messages_mt() {
    no_stale_messages(MT_NUM_THREADS);
}
