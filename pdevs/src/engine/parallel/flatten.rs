//! Flattening of a model tree into leaves and leaf-to-leaf routes.

use std::sync::Arc;

use crate::engine::{child_path, Simulator};
use crate::model::{Coupled, Coupling, Model};
use crate::observer::SharedObserver;
use crate::ports::{Bags, Direction};

/// The origin of the messages carried by a route.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) enum Source {
    /// An output bag of a leaf.
    Leaf { leaf: usize, port: usize },
    /// An input bag of the root model.
    RootInput { port: usize },
}

/// The target of the messages carried by a route.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) enum Destination {
    /// An input bag of a leaf.
    Leaf { leaf: usize, port: usize },
    /// An output bag of the root model.
    RootOutput { port: usize },
}

/// A chain of couplings collapsed into a single edge.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) struct Route {
    pub(crate) source: Source,
    pub(crate) destination: Destination,
}

/// A model tree reduced to its atomic leaves.
#[derive(Debug)]
pub(crate) struct Flattened {
    pub(crate) path: Arc<str>,
    pub(crate) leaves: Vec<Simulator>,
    pub(crate) routes: Vec<Route>,
    pub(crate) inbox: Bags,
    pub(crate) outbox: Bags,
}

/// A port of a leaf, as `(leaf, port)` indices.
type LeafPort = (usize, usize);

/// The leaf ports reachable from each boundary port of a model.
///
/// For an input port, these are the leaf inputs its messages end up in; for
/// an output port, the leaf outputs its messages originate from.
struct Reach {
    inputs: Vec<Vec<LeafPort>>,
    outputs: Vec<Vec<LeafPort>>,
}

/// Flattens a model tree.
///
/// Leaves are numbered in depth-first order. Every chain of couplings from a
/// leaf output to a leaf input becomes one route, whatever the number of
/// levels it crosses; chains starting or ending at the boundary of the root
/// model become routes from the root inbox or to the root outbox.
pub(crate) fn flatten(model: Model, observer: &SharedObserver) -> Flattened {
    let path = child_path(None, model.id());
    let inbox = model.interface().bags(Direction::Input);
    let outbox = model.interface().bags(Direction::Output);

    let mut leaves = Vec::new();
    let mut routes = Vec::new();
    let reach = visit(model, None, observer, &mut leaves, &mut routes);

    for (port, targets) in reach.inputs.iter().enumerate() {
        routes.extend(targets.iter().map(|&(leaf, leaf_port)| Route {
            source: Source::RootInput { port },
            destination: Destination::Leaf {
                leaf,
                port: leaf_port,
            },
        }));
    }
    for (port, origins) in reach.outputs.iter().enumerate() {
        routes.extend(origins.iter().map(|&(leaf, leaf_port)| Route {
            source: Source::Leaf {
                leaf,
                port: leaf_port,
            },
            destination: Destination::RootOutput { port },
        }));
    }

    Flattened {
        path,
        leaves,
        routes,
        inbox,
        outbox,
    }
}

fn visit(
    model: Model,
    parent: Option<&str>,
    observer: &SharedObserver,
    leaves: &mut Vec<Simulator>,
    routes: &mut Vec<Route>,
) -> Reach {
    match model {
        Model::Atomic(atomic) => {
            let leaf = leaves.len();
            let interface = atomic.interface();
            let own = |direction| -> Vec<Vec<LeafPort>> {
                (0..interface.ports(direction).len())
                    .map(|port| vec![(leaf, port)])
                    .collect()
            };
            let reach = Reach {
                inputs: own(Direction::Input),
                outputs: own(Direction::Output),
            };
            leaves.push(Simulator::new(atomic, parent, observer.clone()));

            reach
        }
        Model::Coupled(coupled) => visit_coupled(coupled, parent, observer, leaves, routes),
    }
}

fn visit_coupled(
    coupled: Coupled,
    parent: Option<&str>,
    observer: &SharedObserver,
    leaves: &mut Vec<Simulator>,
    routes: &mut Vec<Route>,
) -> Reach {
    let path = child_path(parent, &coupled.id);
    let Coupled {
        interface,
        children,
        eic,
        eoc,
        ic,
        ..
    } = coupled;

    let children: Vec<Reach> = children
        .into_iter()
        .map(|child| visit(child, Some(&*path), observer, leaves, routes))
        .collect();

    let mut reach = Reach {
        inputs: vec![Vec::new(); interface.ports(Direction::Input).len()],
        outputs: vec![Vec::new(); interface.ports(Direction::Output).len()],
    };
    for coupling in &eic {
        if let Some(child) = coupling.destination_slot.child {
            reach.inputs[coupling.source_slot.port]
                .extend_from_slice(&children[child].inputs[coupling.destination_slot.port]);
        }
    }
    for coupling in &eoc {
        if let Some(child) = coupling.source_slot.child {
            reach.outputs[coupling.destination_slot.port]
                .extend_from_slice(&children[child].outputs[coupling.source_slot.port]);
        }
    }
    for coupling in &ic {
        routes.extend(internal_routes(coupling, &children));
    }

    reach
}

/// Expands an internal coupling into the routes between all leaf ports it
/// connects.
fn internal_routes<'a>(
    coupling: &'a Coupling,
    children: &'a [Reach],
) -> impl Iterator<Item = Route> + 'a {
    let origins = coupling
        .source_slot
        .child
        .map(|child| children[child].outputs[coupling.source_slot.port].as_slice())
        .unwrap_or_default();
    let targets = coupling
        .destination_slot
        .child
        .map(|child| children[child].inputs[coupling.destination_slot.port].as_slice())
        .unwrap_or_default();

    origins.iter().flat_map(move |&(leaf, port)| {
        targets.iter().map(move |&(target_leaf, target_port)| Route {
            source: Source::Leaf { leaf, port },
            destination: Destination::Leaf {
                leaf: target_leaf,
                port: target_port,
            },
        })
    })
}
