use std::fmt;

/// The three wiring relations of a coupled model.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum CouplingKind {
    /// From an input port of the coupled model to an input port of a child
    /// (EIC).
    ExternalInput,
    /// From an output port of a child to an output port of the coupled model
    /// (EOC).
    ExternalOutput,
    /// From an output port of a child to an input port of another child (IC).
    Internal,
}

/// One end of a coupling.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Endpoint {
    model: Option<String>,
    port: String,
}

impl Endpoint {
    pub(crate) fn boundary(port: &str) -> Self {
        Self {
            model: None,
            port: port.to_string(),
        }
    }

    pub(crate) fn child(model: &str, port: &str) -> Self {
        Self {
            model: Some(model.to_string()),
            port: port.to_string(),
        }
    }

    /// Returns the child model identifier, or `None` if the endpoint lies on
    /// the boundary of the coupled model itself.
    pub fn model(&self) -> Option<&str> {
        self.model.as_deref()
    }

    /// Returns the port name.
    pub fn port(&self) -> &str {
        &self.port
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.model {
            Some(model) => write!(f, "{}.{}", model, self.port),
            None => f.write_str(&self.port),
        }
    }
}

/// Position of a validated endpoint: the child index (`None` for the
/// boundary) and the port index in the relevant interface direction.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) struct Slot {
    pub(crate) child: Option<usize>,
    pub(crate) port: usize,
}

/// A validated, type-checked directed edge between two ports.
#[derive(Clone, Debug)]
pub struct Coupling {
    kind: CouplingKind,
    source: Endpoint,
    destination: Endpoint,
    pub(crate) source_slot: Slot,
    pub(crate) destination_slot: Slot,
}

impl Coupling {
    pub(crate) fn new(
        kind: CouplingKind,
        source: Endpoint,
        destination: Endpoint,
        source_slot: Slot,
        destination_slot: Slot,
    ) -> Self {
        Self {
            kind,
            source,
            destination,
            source_slot,
            destination_slot,
        }
    }

    /// Returns the kind of coupling.
    pub fn kind(&self) -> CouplingKind {
        self.kind
    }

    /// Returns the source endpoint.
    pub fn source(&self) -> &Endpoint {
        &self.source
    }

    /// Returns the destination endpoint.
    pub fn destination(&self) -> &Endpoint {
        &self.destination
    }
}

impl fmt::Display for Coupling {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}", self.source, self.destination)
    }
}
