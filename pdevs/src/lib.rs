//! A Parallel-DEVS simulation kernel.
//!
//! Pdevs executes hierarchical discrete-event models according to the
//! Parallel-DEVS formalism: a simulation is a tree of *atomic models*, each an
//! isolated state machine with typed input and output ports, assembled into
//! *coupled models* whose couplings wire the ports of their children together.
//!
//! Simultaneous events are handled the Parallel-DEVS way: at every simulated
//! instant, the outputs of all imminent models are collected and routed before
//! any state transition fires, so that models scheduled at the same instant
//! all observe the same snapshot of their inputs, whatever the order in which
//! the kernel visits them.
//!
//! The same model tree can be executed either sequentially, by a recursive
//! tree of abstract simulators, or on several threads by a coordinator that
//! flattens the tree and splits each step into barrier-synchronized phases.
//! Both produce the same simulation.
//!
//!
//! # A practical overview
//!
//! Simulating a system typically involves three distinct activities:
//!
//! 1. the design of atomic models for each elementary sub-system,
//! 2. the assembly of a model tree from these models, performed by coupling
//!    model ports,
//! 3. the execution of the simulation.
//!
//! ## Authoring models
//!
//! Atomic models implement the [`AtomicModel`](model::AtomicModel) trait,
//! which describes their behavior with four functions:
//!
//! * a *time advance*, which gives the delay until the next autonomous event
//!   of the model, or `None` if the model is passive,
//! * an *output function*, called when the autonomous event occurs and before
//!   the state changes, which writes messages into the output bags of the
//!   model,
//! * an *internal transition*, which updates the state when the autonomous
//!   event occurs,
//! * an *external transition*, which updates the state when messages arrive
//!   on the input ports.
//!
//! Ports are typed handles identified by a name, see [`Port`](ports::Port).
//!
//! #### A generator and an accumulator
//!
//! The following generator emits a value on its output port periodically:
//!
//! ```text
//!          ┌───────────┐
//!          │           │
//!          │ Generator ├───────▶ out
//!          │           │  u64
//!          └───────────┘
//! ```
//!
//! ```
//! use std::time::Duration;
//!
//! use pdevs::model::AtomicModel;
//! use pdevs::ports::{Bags, Interface, Port};
//!
//! #[derive(Debug)]
//! pub struct Generator {
//!     pub period: Duration,
//!     pub value: u64,
//!     pub out: Port<u64>,
//! }
//!
//! impl AtomicModel for Generator {
//!     fn interface(&self) -> Interface {
//!         Interface::new().output(&self.out)
//!     }
//!     fn time_advance(&self) -> Option<Duration> {
//!         Some(self.period)
//!     }
//!     fn output(&self, outputs: &mut Bags) {
//!         outputs.push(&self.out, self.value);
//!     }
//!     fn internal_transition(&mut self) {}
//!     fn external_transition(&mut self, _elapsed: Duration, _inputs: &Bags) {}
//! }
//! ```
//!
//! The accumulator below sums the values it receives, and outputs and clears
//! its sum whenever it receives a reset signal:
//!
//! ```text
//!                 ┌─────────────┐
//!         add ●──▶│             │
//!         u64     │ Accumulator ├───────▶ sum
//!       reset ●──▶│             │  u64
//!          ()     └─────────────┘
//! ```
//!
//! ```
//! use std::time::Duration;
//!
//! use pdevs::model::AtomicModel;
//! use pdevs::ports::{Bags, Interface, Port};
//!
//! #[derive(Debug)]
//! pub struct Accumulator {
//!     pub total: u64,
//!     pub reset_pending: bool,
//!     pub add: Port<u64>,
//!     pub reset: Port<()>,
//!     pub sum: Port<u64>,
//! }
//!
//! impl AtomicModel for Accumulator {
//!     fn interface(&self) -> Interface {
//!         Interface::new()
//!             .input(&self.add)
//!             .input(&self.reset)
//!             .output(&self.sum)
//!     }
//!     fn time_advance(&self) -> Option<Duration> {
//!         // Report immediately when a reset is pending, otherwise wait.
//!         self.reset_pending.then_some(Duration::ZERO)
//!     }
//!     fn output(&self, outputs: &mut Bags) {
//!         outputs.push(&self.sum, self.total);
//!     }
//!     fn internal_transition(&mut self) {
//!         self.total = 0;
//!         self.reset_pending = false;
//!     }
//!     fn external_transition(&mut self, _elapsed: Duration, inputs: &Bags) {
//!         self.total += inputs.get(&self.add).iter().sum::<u64>();
//!         if !inputs.get(&self.reset).is_empty() {
//!             self.reset_pending = true;
//!         }
//!     }
//! }
//! ```
//!
//! ## Assembling a model tree
//!
//! Coupled models own their children and three kinds of couplings:
//!
//! * *external input couplings* forward the messages received on an input
//!   port of the coupled model to an input port of a child,
//! * *external output couplings* forward the messages emitted on an output
//!   port of a child to an output port of the coupled model,
//! * *internal couplings* connect an output port of a child to an input port of
//!   another child.
//!
//! Coupled models are themselves models and can be nested arbitrarily. The
//! tree is validated once, when each coupled model is built: unknown models or
//! ports, mismatched message types, ports used in the wrong direction,
//! duplicate identifiers and self-coupled children are all reported as a
//! [`ConstructionError`](model::ConstructionError).
//!
//! ```text
//! ┌────────────────────────────────────────────┐
//! │ top                                        │
//! │  ┌─────────────┐                           │
//! │  │ numbers     ├──┐    ┌─────────────┐     │
//! │  └─────────────┘  └───▶│             │     │
//! │                   add  │ accumulator ├─────┼───▶ sum
//! │  ┌─────────────┐  ┌───▶│             │     │
//! │  │ resets      ├──┘    └─────────────┘     │
//! │  └─────────────┘ reset                     │
//! └────────────────────────────────────────────┘
//! ```
//!
//! ```
//! # use std::time::Duration;
//! # use pdevs::model::AtomicModel;
//! # use pdevs::ports::{Bags, Interface, Port};
//! # #[derive(Debug)]
//! # pub struct Generator<T> { pub period: Duration, pub value: T, pub out: Port<T> }
//! # impl<T: pdevs::ports::Message> AtomicModel for Generator<T> {
//! #     fn interface(&self) -> Interface { Interface::new().output(&self.out) }
//! #     fn time_advance(&self) -> Option<Duration> { Some(self.period) }
//! #     fn output(&self, outputs: &mut Bags) { outputs.push(&self.out, self.value.clone()); }
//! #     fn internal_transition(&mut self) {}
//! #     fn external_transition(&mut self, _: Duration, _: &Bags) {}
//! # }
//! # #[derive(Debug)]
//! # pub struct Accumulator { pub total: u64, pub reset_pending: bool, pub add: Port<u64>, pub reset: Port<()>, pub sum: Port<u64> }
//! # impl AtomicModel for Accumulator {
//! #     fn interface(&self) -> Interface { Interface::new().input(&self.add).input(&self.reset).output(&self.sum) }
//! #     fn time_advance(&self) -> Option<Duration> { self.reset_pending.then_some(Duration::ZERO) }
//! #     fn output(&self, outputs: &mut Bags) { outputs.push(&self.sum, self.total); }
//! #     fn internal_transition(&mut self) { self.total = 0; self.reset_pending = false; }
//! #     fn external_transition(&mut self, _: Duration, inputs: &Bags) {
//! #         self.total += inputs.get(&self.add).iter().sum::<u64>();
//! #         if !inputs.get(&self.reset).is_empty() { self.reset_pending = true; }
//! #     }
//! # }
//! use pdevs::model::{Coupled, Model};
//!
//! let out = Port::<u64>::new("out");
//! let tick = Port::<()>::new("out");
//! let add = Port::<u64>::new("add");
//! let reset = Port::<()>::new("reset");
//! let sum = Port::<u64>::new("sum");
//!
//! let numbers = Generator { period: Duration::from_secs(1), value: 1, out: out.clone() };
//! let resets = Generator { period: Duration::from_secs(5), value: (), out: tick.clone() };
//! let accumulator = Accumulator {
//!     total: 0,
//!     reset_pending: false,
//!     add: add.clone(),
//!     reset: reset.clone(),
//!     sum: sum.clone(),
//! };
//!
//! let top = Coupled::builder("top")
//!     .output(&sum)
//!     .child(Model::atomic("numbers", numbers)?)
//!     .child(Model::atomic("resets", resets)?)
//!     .child(Model::atomic("accumulator", accumulator)?)
//!     .ic("numbers", &out, "accumulator", &add)
//!     .ic("resets", &tick, "accumulator", &reset)
//!     .eoc("accumulator", &sum, &sum)
//!     .build()?;
//!
//! # Ok::<(), pdevs::model::ConstructionError>(())
//! ```
//!
//! ## Running simulations
//!
//! A model tree is handed over to a [`SimInit`](simulation::SimInit) builder,
//! which selects the execution engine and an optional real-time
//! [`Clock`](time::Clock), then initializes all models at a start time and
//! returns a [`Runner`](simulation::Runner):
//!
//! ```
//! # use std::time::Duration;
//! # use pdevs::model::{AtomicModel, Coupled, Model};
//! # use pdevs::ports::{Bags, Interface, Port};
//! # #[derive(Debug)]
//! # pub struct Generator { pub period: Duration, pub value: u64, pub out: Port<u64> }
//! # impl AtomicModel for Generator {
//! #     fn interface(&self) -> Interface { Interface::new().output(&self.out) }
//! #     fn time_advance(&self) -> Option<Duration> { Some(self.period) }
//! #     fn output(&self, outputs: &mut Bags) { outputs.push(&self.out, self.value); }
//! #     fn internal_transition(&mut self) {}
//! #     fn external_transition(&mut self, _: Duration, _: &Bags) {}
//! # }
//! # let out = Port::<u64>::new("out");
//! # let top = Coupled::builder("top")
//! #     .output(&out)
//! #     .child(Model::atomic("numbers", Generator { period: Duration::from_secs(1), value: 1, out: out.clone() })?)
//! #     .eoc("numbers", &out, &out)
//! #     .build()?;
//! use pdevs::observer::{Phase, RecordingObserver};
//! use pdevs::ports::Direction;
//! use pdevs::simulation::SimInit;
//! use pdevs::time::MonotonicTime;
//!
//! // Keep a copy of every record emitted during the simulation.
//! let recorder = RecordingObserver::new();
//!
//! let t0 = MonotonicTime::EPOCH;
//! let mut runner = SimInit::new(top)
//!     .with_observer(recorder.clone())
//!     .init(t0)?;
//!
//! // Run the simulation for 3 seconds.
//! let next = runner.run_until(t0 + Duration::from_secs(3))?;
//! assert_eq!(next, t0 + Duration::from_secs(3));
//!
//! // The root model emitted one message at t=1s and one at t=2s.
//! let emitted: Vec<_> = recorder
//!     .records()
//!     .into_iter()
//!     .filter(|r| r.path == "top" && r.phase == Phase::Collect)
//!     .filter_map(|r| r.messages(Direction::Output, "out").map(|m| (r.time, m.len())))
//!     .collect();
//! assert_eq!(
//!     emitted,
//!     [(t0 + Duration::from_secs(1), 1), (t0 + Duration::from_secs(2), 1)]
//! );
//!
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//!
//! # Other resources
//!
//! ## Other examples
//!
//! The `examples` directory of the crate contains a
//! complete accumulator bench with logging through the [`tracing`] module.
//!
//!
//! ## Modules documentation
//!
//! While the above overview does cover the basic concepts, more information is
//! available in the documentation of the different modules:
//!
//! * the [`model`] module provides more details about atomic and coupled
//!   models and about the validation of couplings,
//! * the [`engine`] module discusses the abstract simulator protocol and the
//!   multi-threaded coordinator,
//! * the [`observer`] and [`tracing`] modules describe how simulation records
//!   can be inspected and logged,
//! * the [`time`] module discusses time-related types and real-time pacing.
#![warn(missing_docs, missing_debug_implementations, unreachable_pub)]

pub mod engine;
pub mod model;
pub mod observer;
pub mod ports;
pub mod simulation;
pub mod time;
pub mod tracing;
