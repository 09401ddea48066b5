//! Support for structured logging.
//!
//! # Overview
//!
//! The [`TracingObserver`] forwards every simulation [`Record`] to the
//! [`tracing`] ecosystem as an event with the following metadata:
//!
//! - target: `pdevs`,
//! - verbosity level: [`Level::DEBUG`](tracing::Level::DEBUG) for records
//!   carrying messages, [`Level::TRACE`](tracing::Level::TRACE) otherwise,
//! - a `model` field with the path of the acting model, e.g. `top.sub.leaf`,
//! - a message naming the protocol call (`init`, `collect` or `advance`),
//! - `time` and `next` fields with the time bounds of the call,
//! - a `state` field with the rendered state of atomic models,
//! - a `bags` field listing the messages of each non-empty bag.
//!
//! Independently of any observer, the kernel itself emits `DEBUG` events for
//! the milestones of a run (initialization, start and end of `run_until`,
//! interruptions) and an `ERROR` event when a run is aborted.
//!
//!
//! # Configuration
//!
//! Using the `tracing-subscriber` crate, records can be logged to standard
//! output by placing the following call anywhere before
//! [`SimInit::init`](crate::simulation::SimInit::init):
//!
//! ```
//! tracing_subscriber::fmt::init();
//! ```
//!
//! The observer is then registered on the simulation bench:
//!
//! ```
//! use pdevs::model::Coupled;
//! use pdevs::simulation::SimInit;
//! use pdevs::time::MonotonicTime;
//! use pdevs::tracing::TracingObserver;
//!
//! let model = Coupled::builder("top").build().unwrap();
//! let runner = SimInit::new(model)
//!     .with_observer(TracingObserver)
//!     .init(MonotonicTime::EPOCH)
//!     .unwrap();
//! ```
//!
//!
//! # Event filtering examples
//!
//! Note that event filtering based on the `RUST_LOG` environment variable
//! requires the `env-filter` feature of the
//! [`tracing-subscriber`](https://docs.rs/tracing-subscriber) crate.
//!
//! Only show the messages exchanged between models:
//!
//! ```text
//! $ RUST_LOG="pdevs=debug" cargo run --example accumulator
//! ```
//!
//! Show every transition of every model:
//!
//! ```text
//! $ RUST_LOG="pdevs=trace" cargo run --example accumulator
//! ```

use std::fmt;

use tracing::{debug, trace, Level};

use crate::observer::{BagRecord, Observer, Record};

/// An [`Observer`] that emits every record as a `tracing` event.
///
/// See the [module-level documentation][crate::tracing] for more details.
#[derive(Copy, Clone, Debug, Default)]
pub struct TracingObserver;

impl Observer for TracingObserver {
    fn enabled(&self) -> bool {
        tracing::enabled!(target: "pdevs", Level::DEBUG)
    }

    fn observe(&self, record: &Record<'_>) {
        if record.bags.is_empty() {
            trace!(
                target: "pdevs",
                model = record.path,
                time = %record.time,
                next = %record.next,
                state = record.state.as_deref(),
                "{}",
                record.phase
            );
        } else {
            debug!(
                target: "pdevs",
                model = record.path,
                time = %record.time,
                next = %record.next,
                state = record.state.as_deref(),
                bags = %DisplayBags(&record.bags),
                "{}",
                record.phase
            );
        }
    }
}

/// Renders bags as `input:port=[m1, m2] output:port=[m3]`.
struct DisplayBags<'a>(&'a [BagRecord]);

impl fmt::Display for DisplayBags<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, bag) in self.0.iter().enumerate() {
            if i != 0 {
                f.write_str(" ")?;
            }
            write!(f, "{}:{}=[{}]", bag.direction, bag.port, bag.messages.join(", "))?;
        }

        Ok(())
    }
}
