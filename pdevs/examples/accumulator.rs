//! Example: accumulator bench.
//!
//! This example demonstrates in particular:
//!
//! * hierarchical coupled models,
//! * simultaneous events and zero-delay transitions,
//! * multi-threaded execution,
//! * structured logging of the simulation with `tracing`.
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │ bench                                                            │
//! │  ┌────────────────────────────────────────────────┐              │
//! │  │ counter                                        │              │
//! │  │  ┌─────────┐                                   │              │
//! │  │  │ numbers ├──┐    ┌─────────────┐             │  ┌─────────┐ │
//! │  │  └─────────┘  └───►│             │             │  │         │ │
//! │  │               add  │ accumulator ├────────────►├─►│ display │ │
//! │  │  ┌─────────┐  ┌───►│             │     sum     │  │         │ │
//! │  │  │ resets  ├──┘    └─────────────┘             │  └─────────┘ │
//! │  │  └─────────┘ reset                             │              │
//! │  └────────────────────────────────────────────────┘              │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Run with `RUST_LOG=pdevs=debug` to log the messages exchanged between
//! models, or `RUST_LOG=pdevs=trace` to log all transitions.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tracing_subscriber::EnvFilter;

use pdevs::model::{AtomicModel, Coupled, Model};
use pdevs::ports::{Bags, Interface, Message, Port};
use pdevs::simulation::SimInit;
use pdevs::time::MonotonicTime;
use pdevs::tracing::TracingObserver;

/// Periodic generator.
#[derive(Debug)]
pub struct Generator<T> {
    period: Duration,
    value: T,
    out: Port<T>,
}

impl<T: Message> AtomicModel for Generator<T> {
    fn interface(&self) -> Interface {
        Interface::new().output(&self.out)
    }
    fn time_advance(&self) -> Option<Duration> {
        Some(self.period)
    }
    fn output(&self, outputs: &mut Bags) {
        outputs.push(&self.out, self.value.clone());
    }
    fn internal_transition(&mut self) {}
    fn external_transition(&mut self, _: Duration, _: &Bags) {}
}

/// Accumulator reporting and clearing its sum upon reset.
#[derive(Debug, Default)]
pub struct Accumulator {
    total: u64,
    reset_pending: bool,
}

impl Accumulator {
    pub fn add() -> Port<u64> {
        Port::new("add")
    }
    pub fn reset() -> Port<()> {
        Port::new("reset")
    }
    pub fn sum() -> Port<u64> {
        Port::new("sum")
    }
}

impl AtomicModel for Accumulator {
    fn interface(&self) -> Interface {
        Interface::new()
            .input(&Self::add())
            .input(&Self::reset())
            .output(&Self::sum())
    }
    fn time_advance(&self) -> Option<Duration> {
        self.reset_pending.then_some(Duration::ZERO)
    }
    fn output(&self, outputs: &mut Bags) {
        outputs.push(&Self::sum(), self.total);
    }
    fn internal_transition(&mut self) {
        self.total = 0;
        self.reset_pending = false;
    }
    fn external_transition(&mut self, _: Duration, inputs: &Bags) {
        self.total += inputs.get(&Self::add()).iter().sum::<u64>();
        if !inputs.get(&Self::reset()).is_empty() {
            self.reset_pending = true;
        }
    }
}

/// Passive model keeping the sums it receives, with their simulation time.
#[derive(Debug)]
pub struct Display {
    now: Duration,
    sums: Arc<Mutex<Vec<(Duration, u64)>>>,
}

impl AtomicModel for Display {
    fn interface(&self) -> Interface {
        Interface::new().input(&Accumulator::sum())
    }
    fn time_advance(&self) -> Option<Duration> {
        None
    }
    fn output(&self, _: &mut Bags) {}
    fn internal_transition(&mut self) {}
    fn external_transition(&mut self, elapsed: Duration, inputs: &Bags) {
        self.now += elapsed;
        let mut sums = self.sums.lock().unwrap();
        for sum in inputs.get(&Accumulator::sum()) {
            sums.push((self.now, *sum));
        }
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    // ---------------
    // Bench assembly.
    // ---------------

    // Models.
    let out = Port::<u64>::new("out");
    let tick = Port::<()>::new("out");
    let numbers = Generator {
        period: Duration::from_secs(1),
        value: 1,
        out: out.clone(),
    };
    let resets = Generator {
        period: Duration::from_secs(5),
        value: (),
        out: tick.clone(),
    };
    let sums = Arc::new(Mutex::new(Vec::new()));
    let display = Display {
        now: Duration::ZERO,
        sums: sums.clone(),
    };

    // Couplings.
    let counter = Coupled::builder("counter")
        .output(&Accumulator::sum())
        .child(Model::atomic("numbers", numbers)?)
        .child(Model::atomic("resets", resets)?)
        .child(Model::atomic("accumulator", Accumulator::default())?)
        .ic("numbers", &out, "accumulator", &Accumulator::add())
        .ic("resets", &tick, "accumulator", &Accumulator::reset())
        .eoc("accumulator", &Accumulator::sum(), &Accumulator::sum())
        .build()?;
    let bench = Coupled::builder("bench")
        .child(counter)
        .child(Model::atomic("display", display)?)
        .ic("counter", &Accumulator::sum(), "display", &Accumulator::sum());

    // Start time (arbitrary since models do not depend on absolute time).
    let t0 = MonotonicTime::EPOCH;

    // Assembly and initialization.
    let mut runner = SimInit::with_all_threads(bench)
        .with_observer(TracingObserver)
        .init(t0)?;

    // ----------
    // Simulation.
    // ----------

    // The first reset happens at the same time as the fifth number, which is
    // accounted for in the reported sum.
    let next = runner.run_until(t0 + Duration::from_secs(6))?;
    assert_eq!(next, t0 + Duration::from_secs(6));
    assert_eq!(*sums.lock().unwrap(), [(Duration::from_secs(5), 5)]);

    // The sum is reported once per reset period.
    runner.run_until(t0 + Duration::from_secs(21))?;
    assert_eq!(
        *sums.lock().unwrap(),
        [
            (Duration::from_secs(5), 5),
            (Duration::from_secs(10), 5),
            (Duration::from_secs(15), 5),
            (Duration::from_secs(20), 5),
        ]
    );

    // Step manually through the next reset.
    while runner.step()? != Some(t0 + Duration::from_secs(25)) {}
    runner.step()?;
    assert_eq!(sums.lock().unwrap().last(), Some(&(Duration::from_secs(25), 5)));

    Ok(())
}
