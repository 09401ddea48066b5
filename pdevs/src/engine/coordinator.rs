use std::fmt;
use std::sync::Arc;

use crate::model::{Coupled, Coupling};
use crate::observer::{self, Phase, SharedObserver};
use crate::ports::{Bags, Direction};
use crate::time::{self, MonotonicTime};

use super::{child_path, Engine, SimulationError};

/// A port-to-port route between two known bags.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
struct PortRoute {
    from: usize,
    to: usize,
}

/// The internal couplings between one pair of children.
#[derive(Clone, Debug, PartialEq, Eq)]
struct PairRoutes {
    source: usize,
    destination: usize,
    ports: Vec<PortRoute>,
}

/// The engine of a coupled model.
///
/// Routing tables are derived from the couplings once, at construction:
///
/// * external input couplings are grouped by destination child,
/// * external output couplings are grouped by source child,
/// * internal couplings are grouped by (source, destination) pair.
///
/// No coupling is looked up by name while the simulation runs.
pub struct Coordinator {
    id: String,
    path: Arc<str>,
    children: Vec<Engine>,
    eic: Vec<Vec<PortRoute>>,
    eoc: Vec<Vec<PortRoute>>,
    ic: Vec<PairRoutes>,
    last: MonotonicTime,
    next: MonotonicTime,
    initialized: bool,
    inbox: Bags,
    outbox: Bags,
    observer: SharedObserver,
}

impl Coordinator {
    pub(crate) fn new(coupled: Coupled, parent: Option<&str>, observer: SharedObserver) -> Self {
        let Coupled {
            id,
            interface,
            children,
            eic,
            eoc,
            ic,
        } = coupled;
        let path = child_path(parent, &id);
        let child_count = children.len();

        let children: Vec<_> = children
            .into_iter()
            .map(|child| Engine::build(child, Some(&*path), &observer))
            .collect();

        Self {
            id,
            children,
            eic: group_by_child(&eic, child_count, |c| c.destination_slot.child),
            eoc: group_by_child(&eoc, child_count, |c| c.source_slot.child),
            ic: group_by_pair(&ic),
            path,
            last: MonotonicTime::EPOCH,
            next: MonotonicTime::MAX,
            initialized: false,
            inbox: interface.bags(Direction::Input),
            outbox: interface.bags(Direction::Output),
            observer,
        }
    }

    /// Returns the identifier of the model.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Returns the path of the model.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Returns the time of the last transition.
    pub fn last(&self) -> MonotonicTime {
        self.last
    }

    /// Returns the earliest next event among all children.
    pub fn next(&self) -> MonotonicTime {
        self.next
    }

    /// Returns the input bags.
    pub fn inbox(&self) -> &Bags {
        &self.inbox
    }

    /// Returns the input bags for injection of external messages.
    pub fn inbox_mut(&mut self) -> &mut Bags {
        &mut self.inbox
    }

    /// Returns the output bags.
    pub fn outbox(&self) -> &Bags {
        &self.outbox
    }

    /// Returns the child engines.
    pub fn children(&self) -> &[Engine] {
        &self.children
    }

    /// Initializes all children.
    pub fn init(&mut self, t0: MonotonicTime) {
        for child in &mut self.children {
            child.init(t0);
        }
        self.last = t0;
        self.next = self.earliest_child_event();
        self.initialized = true;

        self.observe(Phase::Init, t0, &[]);
    }

    /// Collects the outputs of the imminent children at `t` and forwards them
    /// through the external output couplings.
    ///
    /// Nothing happens if `t` precedes the next scheduled event.
    pub fn collect_outputs(&mut self, t: MonotonicTime) -> Result<(), SimulationError> {
        self.check_initialized()?;
        if t > self.next {
            return Err(SimulationError::CollectOutOfWindow {
                model: self.path.to_string(),
                time: t,
                next: self.next,
            });
        }
        if t < self.next || time::is_infinite(t) {
            return Ok(());
        }

        self.outbox.clear();
        for child in &mut self.children {
            child.collect_outputs(t)?;
        }
        for (child, routes) in self.children.iter().zip(&self.eoc) {
            for route in routes {
                self.outbox
                    .bag_mut(route.to)
                    .extend_from(child.outbox().bag(route.from));
            }
        }

        self.observe(Phase::Collect, t, &[(Direction::Output, &self.outbox)]);

        Ok(())
    }

    /// Routes the collected outputs and the external inputs to the children,
    /// then advances all children to `t`.
    pub fn advance_simulation(&mut self, t: MonotonicTime) -> Result<(), SimulationError> {
        self.check_initialized()?;
        if t < self.last || t > self.next {
            return Err(SimulationError::AdvanceOutOfWindow {
                model: self.path.to_string(),
                time: t,
                last: self.last,
                next: self.next,
            });
        }

        for pair in &self.ic {
            let (source, destination) = pair_mut(&mut self.children, pair.source, pair.destination);
            for route in &pair.ports {
                destination
                    .inbox_mut()
                    .bag_mut(route.to)
                    .extend_from(source.outbox().bag(route.from));
            }
        }
        for (child, routes) in self.children.iter_mut().zip(&self.eic) {
            for route in routes {
                child
                    .inbox_mut()
                    .bag_mut(route.to)
                    .extend_from(self.inbox.bag(route.from));
            }
        }
        for child in &mut self.children {
            child.advance_simulation(t)?;
        }

        self.last = t;
        self.next = self.earliest_child_event();

        self.observe(Phase::Advance, t, &[(Direction::Input, &self.inbox)]);
        self.inbox.clear();
        self.outbox.clear();

        Ok(())
    }

    fn earliest_child_event(&self) -> MonotonicTime {
        self.children
            .iter()
            .map(Engine::next)
            .min()
            .unwrap_or(MonotonicTime::MAX)
    }

    fn check_initialized(&self) -> Result<(), SimulationError> {
        if self.initialized {
            Ok(())
        } else {
            Err(SimulationError::Uninitialized {
                model: self.path.to_string(),
            })
        }
    }

    fn observe(&self, phase: Phase, t: MonotonicTime, bags: &[(Direction, &Bags)]) {
        observer::emit(
            &*self.observer,
            phase,
            &self.path,
            (t, self.last, self.next),
            None,
            bags,
        );
    }
}

impl fmt::Debug for Coordinator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Coordinator")
            .field("path", &self.path)
            .field("last", &self.last)
            .field("next", &self.next)
            .field("children", &self.children)
            .finish_non_exhaustive()
    }
}

/// Groups the port routes of boundary couplings by the child they touch.
fn group_by_child(
    couplings: &[Coupling],
    child_count: usize,
    child_of: impl Fn(&Coupling) -> Option<usize>,
) -> Vec<Vec<PortRoute>> {
    let mut routes = vec![Vec::new(); child_count];
    for coupling in couplings {
        if let Some(child) = child_of(coupling) {
            routes[child].push(PortRoute {
                from: coupling.source_slot.port,
                to: coupling.destination_slot.port,
            });
        }
    }

    routes
}

/// Groups the port routes of internal couplings by (source, destination)
/// pair, preserving the order of first appearance.
fn group_by_pair(couplings: &[Coupling]) -> Vec<PairRoutes> {
    let mut pairs: Vec<PairRoutes> = Vec::new();
    for coupling in couplings {
        let (Some(source), Some(destination)) =
            (coupling.source_slot.child, coupling.destination_slot.child)
        else {
            continue;
        };
        let route = PortRoute {
            from: coupling.source_slot.port,
            to: coupling.destination_slot.port,
        };

        match pairs
            .iter_mut()
            .find(|pair| pair.source == source && pair.destination == destination)
        {
            Some(pair) => pair.ports.push(route),
            None => pairs.push(PairRoutes {
                source,
                destination,
                ports: vec![route],
            }),
        }
    }

    pairs
}

/// Borrows two distinct elements of a slice, the first one immutably.
fn pair_mut<T>(slice: &mut [T], a: usize, b: usize) -> (&T, &mut T) {
    assert_ne!(a, b, "internal coupling with identical endpoints");
    if a < b {
        let (left, right) = slice.split_at_mut(b);
        (&left[a], &mut right[0])
    } else {
        let (left, right) = slice.split_at_mut(a);
        (&right[0], &mut left[b])
    }
}
