//! Model components.
//!
//! A simulation is described by a tree of [`Model`]s. Leaves are atomic
//! models, i.e. user types implementing the [`AtomicModel`] contract, while
//! inner nodes are [`Coupled`] models that own their children together with
//! the couplings wiring their ports.
//!
//! Model trees are static: they are assembled once, validated, and then handed
//! over to an [`Engine`](crate::engine::Engine) or to a
//! [`SimInit`](crate::simulation::SimInit) which takes exclusive ownership of
//! them for the whole run.
//!
//! # Atomic models
//!
//! The following model emits a tick every second:
//!
//! ```
//! use std::time::Duration;
//!
//! use pdevs::model::{AtomicModel, Model};
//! use pdevs::ports::{Bags, Interface, Port};
//!
//! #[derive(Debug)]
//! pub struct Ticker {
//!     out: Port<()>,
//! }
//!
//! impl AtomicModel for Ticker {
//!     fn interface(&self) -> Interface {
//!         Interface::new().output(&self.out)
//!     }
//!     fn time_advance(&self) -> Option<Duration> {
//!         Some(Duration::from_secs(1))
//!     }
//!     fn output(&self, outputs: &mut Bags) {
//!         outputs.push(&self.out, ());
//!     }
//!     fn internal_transition(&mut self) {}
//!     fn external_transition(&mut self, _elapsed: Duration, _inputs: &Bags) {}
//! }
//!
//! let ticker = Model::atomic("ticker", Ticker { out: Port::new("out") }).unwrap();
//! assert!(ticker.is_atomic());
//! ```
//!
//! # Coupled models
//!
//! Coupled models are assembled with a [`CoupledBuilder`]; see [`Coupled`].

mod coupled;
mod coupling;

use std::error::Error;
use std::fmt;
use std::time::Duration;

pub use coupled::{Coupled, CoupledBuilder};
pub use coupling::{Coupling, CouplingKind, Endpoint};

use crate::ports::{Bags, Direction, Interface};

/// The behavioral contract of an atomic model.
///
/// The kernel drives an atomic model through the following protocol:
///
/// * [`time_advance()`](AtomicModel::time_advance) is queried after
///   initialization and after every transition to schedule the next autonomous
///   event,
/// * when the scheduled time is reached, [`output()`](AtomicModel::output) is
///   called first, and only then the transition that follows it,
/// * [`internal_transition()`](AtomicModel::internal_transition) fires at the
///   scheduled time when no input arrived at that instant,
/// * [`external_transition()`](AtomicModel::external_transition) fires when
///   input arrives strictly before the scheduled time; it is never called with
///   empty inputs,
/// * when input arrives exactly at the scheduled time, the model undergoes
///   its internal transition immediately followed by an external transition
///   with a zero elapsed time. Internal effects are thus always resolved
///   before same-instant external effects.
///
/// The `Debug` rendering of the model is reported to observers as the model
/// state.
pub trait AtomicModel: fmt::Debug + Send + 'static {
    /// Declares the input and output ports of the model.
    ///
    /// This is called once, when the model is wrapped in a [`Model`].
    fn interface(&self) -> Interface;

    /// Returns the duration until the next autonomous event, or `None` if the
    /// model is passive.
    fn time_advance(&self) -> Option<Duration>;

    /// Writes the output messages of the imminent model.
    ///
    /// This must be a pure function of the current state.
    fn output(&self, outputs: &mut Bags);

    /// Updates the state when the scheduled time is reached.
    fn internal_transition(&mut self);

    /// Updates the state upon reception of input messages, `elapsed` being the
    /// time since the last transition.
    fn external_transition(&mut self, elapsed: Duration, inputs: &Bags);
}

/// An atomic model together with its identifier and captured interface.
pub struct Atomic {
    id: String,
    interface: Interface,
    model: Box<dyn AtomicModel>,
}

impl Atomic {
    /// Returns the model identifier.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Returns the interface of the model.
    pub fn interface(&self) -> &Interface {
        &self.interface
    }

    pub(crate) fn into_parts(self) -> (String, Interface, Box<dyn AtomicModel>) {
        (self.id, self.interface, self.model)
    }
}

impl fmt::Debug for Atomic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Atomic")
            .field("id", &self.id)
            .field("state", &self.model)
            .finish_non_exhaustive()
    }
}

/// A node of a model tree.
#[derive(Debug)]
pub enum Model {
    /// A leaf model with private state.
    Atomic(Atomic),
    /// A composite of child models and couplings.
    Coupled(Coupled),
}

impl Model {
    /// Wraps an atomic model, capturing its interface.
    ///
    /// An error is returned if the interface declares the same port name twice
    /// in the same direction.
    pub fn atomic(id: impl Into<String>, model: impl AtomicModel) -> Result<Self, ConstructionError> {
        let id = id.into();
        let interface = model.interface();
        interface.validate(&id)?;

        Ok(Self::Atomic(Atomic {
            id,
            interface,
            model: Box::new(model),
        }))
    }

    /// Returns the model identifier, which is unique among its siblings.
    pub fn id(&self) -> &str {
        match self {
            Self::Atomic(atomic) => atomic.id(),
            Self::Coupled(coupled) => coupled.id(),
        }
    }

    /// Returns the interface of the model.
    pub fn interface(&self) -> &Interface {
        match self {
            Self::Atomic(atomic) => atomic.interface(),
            Self::Coupled(coupled) => coupled.interface(),
        }
    }

    /// Returns `true` for atomic models.
    pub fn is_atomic(&self) -> bool {
        matches!(self, Self::Atomic(_))
    }
}

/// An error detected while assembling a model.
///
/// Construction errors are reported before any simulation time elapses; they
/// point to a defect in the description of the model tree.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ConstructionError {
    /// Two children of a coupled model share the same identifier.
    DuplicateModelId {
        /// The coupled model.
        parent: String,
        /// The duplicated identifier.
        id: String,
    },
    /// A model declares the same port name twice in the same direction.
    DuplicatePort {
        /// The model.
        model: String,
        /// The duplicated port name.
        port: String,
        /// The direction of both declarations.
        direction: Direction,
    },
    /// A coupling references a model which is not a child of the coupled
    /// model.
    UnknownModel {
        /// The coupled model.
        parent: String,
        /// The unknown identifier.
        id: String,
    },
    /// A coupling references a port which the model does not declare.
    UnknownPort {
        /// The model.
        model: String,
        /// The unknown port name.
        port: String,
        /// The direction that was expected for the port.
        direction: Direction,
    },
    /// A coupling references a port declared with the wrong direction.
    PortDirection {
        /// The model.
        model: String,
        /// The port name.
        port: String,
        /// The direction that was expected for the port.
        expected: Direction,
    },
    /// The source and destination ports of a coupling carry different
    /// message types.
    PortTypeMismatch {
        /// The source endpoint.
        source: String,
        /// The message type of the source port.
        source_type: &'static str,
        /// The destination endpoint.
        destination: String,
        /// The message type of the destination port.
        destination_type: &'static str,
    },
    /// An internal coupling connects a model to itself.
    SelfLoop {
        /// The coupled model.
        parent: String,
        /// The model connected to itself.
        id: String,
    },
}

impl fmt::Display for ConstructionError {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DuplicateModelId { parent, id } => write!(
                fmt,
                "coupled model '{}' has several children with id '{}'",
                parent, id
            ),
            Self::DuplicatePort {
                model,
                port,
                direction,
            } => write!(
                fmt,
                "model '{}' declares {} port '{}' more than once",
                model, direction, port
            ),
            Self::UnknownModel { parent, id } => write!(
                fmt,
                "coupled model '{}' has no child with id '{}'",
                parent, id
            ),
            Self::UnknownPort {
                model,
                port,
                direction,
            } => write!(
                fmt,
                "model '{}' has no {} port '{}'",
                model, direction, port
            ),
            Self::PortDirection {
                model,
                port,
                expected,
            } => write!(
                fmt,
                "port '{}' of model '{}' is not an {} port",
                port, model, expected
            ),
            Self::PortTypeMismatch {
                source,
                source_type,
                destination,
                destination_type,
            } => write!(
                fmt,
                "cannot couple '{}' carrying `{}` to '{}' carrying `{}`",
                source, source_type, destination, destination_type
            ),
            Self::SelfLoop { parent, id } => write!(
                fmt,
                "internal coupling of coupled model '{}' connects '{}' to itself",
                parent, id
            ),
        }
    }
}

impl Error for ConstructionError {}
