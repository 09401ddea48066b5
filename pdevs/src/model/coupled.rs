use std::fmt;

use crate::ports::{Direction, Interface, Message, Port, PortDecl};

use super::coupling::Slot;
use super::{ConstructionError, Coupling, CouplingKind, Endpoint, Model};

/// A composite model made of child models and of the couplings between their
/// ports.
///
/// A `Coupled` model can only be obtained from [`CoupledBuilder::build()`],
/// which validates every coupling. Once built, the model is guaranteed to be
/// well-formed:
///
/// * children have distinct identifiers,
/// * every coupling endpoint exists and has the right direction,
/// * both ends of every coupling carry the same message type,
/// * no internal coupling connects a child to itself.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
///
/// use pdevs::model::{AtomicModel, Coupled, Model};
/// use pdevs::ports::{Bags, Interface, Port};
///
/// #[derive(Debug)]
/// struct Relay {
///     input: Port<u32>,
///     output: Port<u32>,
/// }
/// impl AtomicModel for Relay {
///     fn interface(&self) -> Interface {
///         Interface::new().input(&self.input).output(&self.output)
///     }
///     fn time_advance(&self) -> Option<Duration> {
///         None
///     }
///     fn output(&self, _: &mut Bags) {}
///     fn internal_transition(&mut self) {}
///     fn external_transition(&mut self, _: Duration, _: &Bags) {}
/// }
///
/// let input = Port::<u32>::new("in");
/// let output = Port::<u32>::new("out");
/// let relay = || Relay { input: input.clone(), output: output.clone() };
///
/// let chain = Coupled::builder("chain")
///     .input(&input)
///     .output(&output)
///     .child(Model::atomic("first", relay()).unwrap())
///     .child(Model::atomic("second", relay()).unwrap())
///     .eic(&input, "first", &input)
///     .ic("first", &output, "second", &input)
///     .eoc("second", &output, &output)
///     .build()
///     .unwrap();
///
/// assert_eq!(chain.id(), "chain");
/// ```
pub struct Coupled {
    pub(crate) id: String,
    pub(crate) interface: Interface,
    pub(crate) children: Vec<Model>,
    pub(crate) eic: Vec<Coupling>,
    pub(crate) eoc: Vec<Coupling>,
    pub(crate) ic: Vec<Coupling>,
}

impl Coupled {
    /// Starts the assembly of a coupled model.
    pub fn builder(id: impl Into<String>) -> CoupledBuilder {
        CoupledBuilder {
            id: id.into(),
            interface: Interface::new(),
            children: Vec::new(),
            eic: Vec::new(),
            eoc: Vec::new(),
            ic: Vec::new(),
        }
    }

    /// Returns the model identifier.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Returns the boundary ports of the model.
    pub fn interface(&self) -> &Interface {
        &self.interface
    }

    /// Returns the children in declaration order.
    pub fn children(&self) -> &[Model] {
        &self.children
    }

    /// Returns the external input couplings.
    pub fn eic(&self) -> &[Coupling] {
        &self.eic
    }

    /// Returns the external output couplings.
    pub fn eoc(&self) -> &[Coupling] {
        &self.eoc
    }

    /// Returns the internal couplings.
    pub fn ic(&self) -> &[Coupling] {
        &self.ic
    }
}

impl fmt::Debug for Coupled {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Coupled")
            .field("id", &self.id)
            .field("children", &self.children)
            .field("eic", &self.eic.len())
            .field("eoc", &self.eoc.len())
            .field("ic", &self.ic.len())
            .finish()
    }
}

/// An unresolved coupling, as declared to the builder.
#[derive(Debug)]
struct Declared {
    source: Endpoint,
    destination: Endpoint,
}

/// Builder for a [`Coupled`] model.
///
/// Port arguments accept either a [`Port`] handle or a port name. Nothing is
/// checked until [`build()`](CoupledBuilder::build) is called.
#[derive(Debug)]
pub struct CoupledBuilder {
    id: String,
    interface: Interface,
    children: Vec<Model>,
    eic: Vec<Declared>,
    eoc: Vec<Declared>,
    ic: Vec<Declared>,
}

impl CoupledBuilder {
    /// Declares an input port on the boundary of the coupled model.
    pub fn input<T: Message>(mut self, port: &Port<T>) -> Self {
        self.interface = self.interface.input(port);

        self
    }

    /// Declares an output port on the boundary of the coupled model.
    pub fn output<T: Message>(mut self, port: &Port<T>) -> Self {
        self.interface = self.interface.output(port);

        self
    }

    /// Adds a child model.
    pub fn child(mut self, model: Model) -> Self {
        self.children.push(model);

        self
    }

    /// Adds several child models.
    pub fn children(mut self, models: impl IntoIterator<Item = Model>) -> Self {
        self.children.extend(models);

        self
    }

    /// Adds an external input coupling from an input port of the coupled model
    /// to an input port of a child.
    pub fn eic(
        mut self,
        port: impl AsRef<str>,
        child: impl AsRef<str>,
        child_port: impl AsRef<str>,
    ) -> Self {
        self.eic.push(Declared {
            source: Endpoint::boundary(port.as_ref()),
            destination: Endpoint::child(child.as_ref(), child_port.as_ref()),
        });

        self
    }

    /// Adds an external output coupling from an output port of a child to an
    /// output port of the coupled model.
    pub fn eoc(
        mut self,
        child: impl AsRef<str>,
        child_port: impl AsRef<str>,
        port: impl AsRef<str>,
    ) -> Self {
        self.eoc.push(Declared {
            source: Endpoint::child(child.as_ref(), child_port.as_ref()),
            destination: Endpoint::boundary(port.as_ref()),
        });

        self
    }

    /// Adds an internal coupling from an output port of a child to an input
    /// port of another child.
    pub fn ic(
        mut self,
        source: impl AsRef<str>,
        source_port: impl AsRef<str>,
        destination: impl AsRef<str>,
        destination_port: impl AsRef<str>,
    ) -> Self {
        self.ic.push(Declared {
            source: Endpoint::child(source.as_ref(), source_port.as_ref()),
            destination: Endpoint::child(destination.as_ref(), destination_port.as_ref()),
        });

        self
    }

    /// Validates the model and its couplings.
    ///
    /// Boundary ports are checked first, then child identifiers, and finally
    /// the external input, external output and internal couplings, each in
    /// declaration order. The first error found is returned.
    pub fn build(self) -> Result<Model, ConstructionError> {
        self.interface.validate(&self.id)?;

        for (i, child) in self.children.iter().enumerate() {
            if self.children[..i].iter().any(|other| other.id() == child.id()) {
                return Err(ConstructionError::DuplicateModelId {
                    parent: self.id.clone(),
                    id: child.id().to_string(),
                });
            }
        }

        let eic = self.resolve_all(CouplingKind::ExternalInput, &self.eic)?;
        let eoc = self.resolve_all(CouplingKind::ExternalOutput, &self.eoc)?;
        let ic = self.resolve_all(CouplingKind::Internal, &self.ic)?;

        Ok(Model::Coupled(Coupled {
            id: self.id,
            interface: self.interface,
            children: self.children,
            eic,
            eoc,
            ic,
        }))
    }

    fn resolve_all(
        &self,
        kind: CouplingKind,
        declared: &[Declared],
    ) -> Result<Vec<Coupling>, ConstructionError> {
        declared
            .iter()
            .map(|coupling| self.resolve(kind, coupling))
            .collect()
    }

    fn resolve(&self, kind: CouplingKind, declared: &Declared) -> Result<Coupling, ConstructionError> {
        // Boundary input ports act as sources and boundary output ports as
        // destinations, the other way around for children.
        let (source_dir, destination_dir) = match kind {
            CouplingKind::ExternalInput => (Direction::Input, Direction::Input),
            CouplingKind::ExternalOutput => (Direction::Output, Direction::Output),
            CouplingKind::Internal => (Direction::Output, Direction::Input),
        };

        let (source_slot, source_decl) = self.locate(&declared.source, source_dir)?;
        let (destination_slot, destination_decl) =
            self.locate(&declared.destination, destination_dir)?;

        if kind == CouplingKind::Internal && source_slot.child == destination_slot.child {
            return Err(ConstructionError::SelfLoop {
                parent: self.id.clone(),
                id: declared.source.model().unwrap_or_default().to_string(),
            });
        }

        if source_decl.type_id() != destination_decl.type_id() {
            return Err(ConstructionError::PortTypeMismatch {
                source: self.qualified(&declared.source),
                source_type: source_decl.type_name(),
                destination: self.qualified(&declared.destination),
                destination_type: destination_decl.type_name(),
            });
        }

        Ok(Coupling::new(
            kind,
            declared.source.clone(),
            declared.destination.clone(),
            source_slot,
            destination_slot,
        ))
    }

    /// Finds the model and port referenced by an endpoint.
    fn locate(
        &self,
        endpoint: &Endpoint,
        direction: Direction,
    ) -> Result<(Slot, &PortDecl), ConstructionError> {
        let (child, model_id, interface) = match endpoint.model() {
            None => (None, self.id.as_str(), &self.interface),
            Some(id) => {
                let idx = self
                    .children
                    .iter()
                    .position(|child| child.id() == id)
                    .ok_or_else(|| ConstructionError::UnknownModel {
                        parent: self.id.clone(),
                        id: id.to_string(),
                    })?;

                (Some(idx), id, self.children[idx].interface())
            }
        };

        match interface.position(direction, endpoint.port()) {
            Some(port) => Ok((Slot { child, port }, &interface.ports(direction)[port])),
            None => {
                let opposite = match direction {
                    Direction::Input => Direction::Output,
                    Direction::Output => Direction::Input,
                };
                if interface.position(opposite, endpoint.port()).is_some() {
                    Err(ConstructionError::PortDirection {
                        model: model_id.to_string(),
                        port: endpoint.port().to_string(),
                        expected: direction,
                    })
                } else {
                    Err(ConstructionError::UnknownPort {
                        model: model_id.to_string(),
                        port: endpoint.port().to_string(),
                        direction,
                    })
                }
            }
        }
    }

    fn qualified(&self, endpoint: &Endpoint) -> String {
        match endpoint.model() {
            Some(_) => endpoint.to_string(),
            None => format!("{}.{}", self.id, endpoint.port()),
        }
    }
}
