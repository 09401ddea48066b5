//! Sequential and multi-threaded executions of the same model tree.

use pdevs::model::{Coupled, Model};
use pdevs::observer::{OwnedRecord, Phase, RecordingObserver};
use pdevs::ports::{Direction, Port};
use pdevs::simulation::SimInit;
use pdevs::time::MonotonicTime;

use crate::models::{secs, Accumulator, Generator, Relay};

// A three-level tree mixing fan-in, fan-out, zero-delay reports and
// coinciding events.
fn tree() -> Model {
    let out = Port::<u64>::new("out");
    let tick = Port::<()>::new("out");
    let data = Port::<u64>::new("data");
    let reset = Port::<()>::new("reset");

    let inner = Coupled::builder("inner")
        .input(&data)
        .input(&reset)
        .output(&Accumulator::sum())
        .child(Relay::<u64>::new(secs(0.25)).into_model("relay"))
        .child(Accumulator::default().into_model("accumulator"))
        .child(Accumulator::default().into_model("subtotal"))
        .eic(&data, "relay", "in")
        .eic(&data, "subtotal", "add")
        .eic(&reset, "accumulator", "reset")
        .ic("relay", "out", "accumulator", "add")
        .eoc("accumulator", "sum", "sum")
        .build()
        .unwrap();
    let mid = Coupled::builder("mid")
        .input(&data)
        .input(&reset)
        .output(&Accumulator::sum())
        .child(inner)
        .child(Relay::<u64>::new(secs(1.0)).into_model("delay"))
        .eic(&data, "inner", &data)
        .eic(&data, "delay", "in")
        .eic(&reset, "inner", &reset)
        .ic("delay", "out", "inner", &data)
        .eoc("inner", "sum", "sum")
        .build()
        .unwrap();

    Coupled::builder("top")
        .output(&Accumulator::sum())
        .output(&out)
        .child(Generator::new(secs(1.0), 1u64).into_model("ones"))
        .child(Generator::new(secs(0.75), 10u64).into_model("tens"))
        .child(Generator::new(secs(3.0), 100u64).with_limit(2).into_model("hundreds"))
        .child(Generator::new(secs(2.0), ()).into_model("resets"))
        .child(mid)
        .child(Accumulator::default().into_model("total"))
        .ic("ones", &out, "mid", &data)
        .ic("tens", &out, "mid", &data)
        .ic("hundreds", &out, "mid", &data)
        .ic("resets", &tick, "mid", &reset)
        .ic("mid", "sum", "total", "add")
        .ic("resets", &tick, "total", "reset")
        .eoc("mid", "sum", "sum")
        .eoc("total", "sum", "sum")
        .eoc("ones", &out, &out)
        .build()
        .unwrap()
}

struct Outcome {
    leaf_records: Vec<OwnedRecord>,
    root_outputs: Vec<(MonotonicTime, Vec<String>)>,
    last: MonotonicTime,
    next: MonotonicTime,
}

fn run(num_threads: usize) -> Outcome {
    let recorder = RecordingObserver::new();
    let t0 = MonotonicTime::EPOCH;
    let mut runner = SimInit::new(tree())
        .with_num_threads(num_threads)
        .with_observer(recorder.clone())
        .init(t0)
        .unwrap();
    runner.run_until(t0 + secs(12.0)).unwrap();

    let records = recorder.records();

    // Records of a given leaf are emitted in order, so a stable sort gives the
    // same sequence whatever the interleaving of the workers. Messages routed
    // to the same bag from several sources may arrive in any order.
    let mut leaf_records: Vec<_> = records
        .iter()
        .filter(|r| r.state.is_some())
        .cloned()
        .map(|mut r| {
            for bag in &mut r.bags {
                bag.messages.sort();
            }
            r
        })
        .collect();
    leaf_records.sort_by_key(|r| (r.time, r.path.clone(), r.phase.to_string()));

    let root_outputs = records
        .iter()
        .filter(|r| r.path == "top" && r.phase == Phase::Collect && !r.bags.is_empty())
        .map(|r| {
            let mut msgs = r
                .messages(Direction::Output, "sum")
                .unwrap_or_default()
                .to_vec();
            msgs.extend(r.messages(Direction::Output, "out").unwrap_or_default().iter().cloned());
            msgs.sort();
            (r.time, msgs)
        })
        .collect();

    Outcome {
        leaf_records,
        root_outputs,
        last: runner.last_time(),
        next: runner.next_time(),
    }
}

fn equivalence(num_threads: usize) {
    let sequential = run(1);
    let parallel = run(num_threads);

    assert!(!sequential.leaf_records.is_empty());
    assert!(!sequential.root_outputs.is_empty());
    assert_eq!(sequential.leaf_records, parallel.leaf_records);
    assert_eq!(sequential.root_outputs, parallel.root_outputs);
    assert_eq!(sequential.last, parallel.last);
    assert_eq!(sequential.next, parallel.next);
}

#[test]
fn equivalence_two_threads() {
    equivalence(2);
}

#[test]
fn equivalence_four_threads() {
    equivalence(4);
}

#[test]
fn equivalence_more_threads_than_leaves() {
    equivalence(64);
}
