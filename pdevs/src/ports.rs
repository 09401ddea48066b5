//! Ports, interfaces and message bags.
//!
//! # Ports
//!
//! A [`Port`] is a typed, named attachment point of a model. It is a cheap,
//! cloneable handle that carries no messages of its own: it identifies a
//! message channel by its name and by the type `T` of the messages it carries.
//! Two ports with the same name but different message types are different
//! ports.
//!
//! Models declare the ports of their boundary with an [`Interface`], which
//! lists input and output ports separately:
//!
//! ```
//! use pdevs::ports::{Interface, Port};
//!
//! let add = Port::<u32>::new("add");
//! let reset = Port::<()>::new("reset");
//! let sum = Port::<u32>::new("sum");
//!
//! let interface = Interface::new().input(&add).input(&reset).output(&sum);
//! assert_eq!(interface.inputs().count(), 2);
//! ```
//!
//! # Message bags
//!
//! During one simulated instant, the messages present on the ports of one
//! direction of a model are held in [`Bags`]: one multiset of messages per
//! declared port. An atomic model writes into the output bags in
//! [`AtomicModel::output()`](crate::model::AtomicModel::output) and reads the
//! input bags in its external transition. Bags never outlive the instant they
//! describe: the kernel clears them as soon as they have been consumed.

mod bag;

use std::any::{self, TypeId};
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

pub use bag::Bags;
pub(crate) use bag::Bag;

use crate::model::ConstructionError;

/// Bound satisfied by every type that can be carried by a port.
///
/// The `Debug` implementation is used to render messages for observers.
pub trait Message: Clone + Send + fmt::Debug + 'static {}

impl<T: Clone + Send + fmt::Debug + 'static> Message for T {}

/// The direction of a port relative to its model.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Direction {
    /// A port receiving messages.
    Input,
    /// A port emitting messages.
    Output,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Input => f.write_str("input"),
            Self::Output => f.write_str("output"),
        }
    }
}

/// A typed port handle.
///
/// The handle is used both to declare the port in an [`Interface`] and to
/// access the corresponding bag in [`Bags`]. It can also stand for the port
/// name wherever a coupling endpoint is expected.
pub struct Port<T> {
    name: Arc<str>,
    _phantom: PhantomData<fn() -> T>,
}

impl<T: Message> Port<T> {
    /// Creates a port handle with the specified name.
    pub fn new(name: impl Into<Arc<str>>) -> Self {
        Self {
            name: name.into(),
            _phantom: PhantomData,
        }
    }

    /// Returns the port name.
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl<T> Clone for Port<T> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            _phantom: PhantomData,
        }
    }
}

impl<T> AsRef<str> for Port<T> {
    fn as_ref(&self) -> &str {
        &self.name
    }
}

impl<T> fmt::Debug for Port<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Port")
            .field("name", &self.name)
            .field("message_type", &any::type_name::<T>())
            .finish()
    }
}

/// The declaration of a port inside an [`Interface`].
#[derive(Clone)]
pub struct PortDecl {
    name: Arc<str>,
    type_id: TypeId,
    type_name: &'static str,
    new_bag: fn() -> Box<dyn Bag>,
}

impl PortDecl {
    fn new<T: Message>(port: &Port<T>) -> Self {
        Self {
            name: port.name.clone(),
            type_id: TypeId::of::<T>(),
            type_name: any::type_name::<T>(),
            new_bag: bag::new_bag::<T>,
        }
    }

    /// Returns the port name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the name of the message type carried by the port.
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    pub(crate) fn type_id(&self) -> TypeId {
        self.type_id
    }

    pub(crate) fn shared_name(&self) -> Arc<str> {
        self.name.clone()
    }

    pub(crate) fn new_bag(&self) -> Box<dyn Bag> {
        (self.new_bag)()
    }
}

impl fmt::Debug for PortDecl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PortDecl")
            .field("name", &self.name)
            .field("message_type", &self.type_name)
            .finish()
    }
}

/// The boundary of a model: its input and output port declarations.
#[derive(Clone, Debug, Default)]
pub struct Interface {
    inputs: Vec<PortDecl>,
    outputs: Vec<PortDecl>,
}

impl Interface {
    /// Creates an interface without ports.
    pub fn new() -> Self {
        Self::default()
    }

    /// Declares an input port.
    pub fn input<T: Message>(mut self, port: &Port<T>) -> Self {
        self.inputs.push(PortDecl::new(port));

        self
    }

    /// Declares an output port.
    pub fn output<T: Message>(mut self, port: &Port<T>) -> Self {
        self.outputs.push(PortDecl::new(port));

        self
    }

    /// Returns an iterator over the input port declarations.
    pub fn inputs(&self) -> impl Iterator<Item = &PortDecl> {
        self.inputs.iter()
    }

    /// Returns an iterator over the output port declarations.
    pub fn outputs(&self) -> impl Iterator<Item = &PortDecl> {
        self.outputs.iter()
    }

    pub(crate) fn ports(&self, direction: Direction) -> &[PortDecl] {
        match direction {
            Direction::Input => &self.inputs,
            Direction::Output => &self.outputs,
        }
    }

    /// Returns the index of the named port in the specified direction.
    pub(crate) fn position(&self, direction: Direction, name: &str) -> Option<usize> {
        self.ports(direction)
            .iter()
            .position(|decl| &*decl.name == name)
    }

    /// Creates empty bags for all ports in the specified direction.
    pub(crate) fn bags(&self, direction: Direction) -> Bags {
        Bags::new(self.ports(direction).into())
    }

    /// Checks that no port name is declared twice in the same direction.
    pub(crate) fn validate(&self, model: &str) -> Result<(), ConstructionError> {
        for direction in [Direction::Input, Direction::Output] {
            let ports = self.ports(direction);
            for (i, decl) in ports.iter().enumerate() {
                if ports[..i].iter().any(|other| other.name == decl.name) {
                    return Err(ConstructionError::DuplicatePort {
                        model: model.to_string(),
                        port: decl.name.to_string(),
                        direction,
                    });
                }
            }
        }

        Ok(())
    }
}
