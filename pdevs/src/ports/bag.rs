use std::any::{self, Any};
use std::fmt;
use std::sync::Arc;

use dyn_clone::DynClone;

use super::{Message, Port, PortDecl};

/// A type-erased multiset of messages of a single type.
pub(crate) trait Bag: DynClone + Send + 'static {
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
    fn len(&self) -> usize;
    fn clear(&mut self);
    /// Appends clones of all messages of `other`, which must carry the same
    /// message type.
    fn extend_from(&mut self, other: &dyn Bag);
    /// Moves all messages of `other`, which must carry the same message type.
    fn append(&mut self, other: &mut dyn Bag);
    fn render(&self) -> Vec<String>;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

dyn_clone::clone_trait_object!(Bag);

pub(super) fn new_bag<T: Message>() -> Box<dyn Bag> {
    Box::new(TypedBag::<T>(Vec::new()))
}

#[derive(Clone)]
struct TypedBag<T>(Vec<T>);

impl<T: Message> TypedBag<T> {
    fn downcast(other: &dyn Bag) -> &Self {
        match other.as_any().downcast_ref::<Self>() {
            Some(bag) => bag,
            None => panic!(
                "message bag type mismatch: expected messages of type `{}`",
                any::type_name::<T>()
            ),
        }
    }

    fn downcast_mut(other: &mut dyn Bag) -> &mut Self {
        match other.as_any_mut().downcast_mut::<Self>() {
            Some(bag) => bag,
            None => panic!(
                "message bag type mismatch: expected messages of type `{}`",
                any::type_name::<T>()
            ),
        }
    }
}

impl<T: Message> Bag for TypedBag<T> {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }

    fn len(&self) -> usize {
        self.0.len()
    }

    fn clear(&mut self) {
        self.0.clear();
    }

    fn extend_from(&mut self, other: &dyn Bag) {
        self.0.extend_from_slice(&Self::downcast(other).0);
    }

    fn append(&mut self, other: &mut dyn Bag) {
        self.0.append(&mut Self::downcast_mut(other).0);
    }

    fn render(&self) -> Vec<String> {
        self.0.iter().map(|msg| format!("{:?}", msg)).collect()
    }
}

/// The message bags of all ports of one direction of a model.
///
/// Bags are indexed by the declared ports; accessing a port that was not
/// declared, or declared with another message type, is a programming error
/// and panics.
///
/// # Examples
///
/// ```
/// use pdevs::ports::{Bags, Interface, Port};
///
/// let out = Port::<u32>::new("out");
/// let mut bags = Bags::for_outputs(&Interface::new().output(&out));
///
/// assert!(bags.is_empty());
/// bags.push(&out, 3);
/// bags.extend(&out, [4, 5]);
/// assert_eq!(bags.get(&out), &[3, 4, 5]);
/// ```
#[derive(Clone)]
pub struct Bags {
    decls: Arc<[PortDecl]>,
    bags: Vec<Box<dyn Bag>>,
}

impl Bags {
    pub(crate) fn new(decls: Arc<[PortDecl]>) -> Self {
        let bags = decls.iter().map(PortDecl::new_bag).collect();

        Self { decls, bags }
    }

    /// Creates empty bags for the input ports of an interface.
    pub fn for_inputs(interface: &super::Interface) -> Self {
        interface.bags(super::Direction::Input)
    }

    /// Creates empty bags for the output ports of an interface.
    pub fn for_outputs(interface: &super::Interface) -> Self {
        interface.bags(super::Direction::Output)
    }

    /// Returns the messages present on a port.
    ///
    /// # Panics
    ///
    /// Panics if the port is not declared with this message type.
    pub fn get<T: Message>(&self, port: &Port<T>) -> &[T] {
        let idx = self.index_of(port);

        &TypedBag::<T>::downcast(&*self.bags[idx]).0
    }

    /// Adds a message to a port.
    ///
    /// # Panics
    ///
    /// Panics if the port is not declared with this message type.
    pub fn push<T: Message>(&mut self, port: &Port<T>, msg: T) {
        let idx = self.index_of(port);

        TypedBag::<T>::downcast_mut(&mut *self.bags[idx]).0.push(msg);
    }

    /// Adds several messages to a port.
    ///
    /// # Panics
    ///
    /// Panics if the port is not declared with this message type.
    pub fn extend<T: Message, I: IntoIterator<Item = T>>(&mut self, port: &Port<T>, msgs: I) {
        let idx = self.index_of(port);

        TypedBag::<T>::downcast_mut(&mut *self.bags[idx])
            .0
            .extend(msgs);
    }

    /// Returns `true` if no port holds any message.
    pub fn is_empty(&self) -> bool {
        self.bags.iter().all(|bag| bag.is_empty())
    }

    /// Returns the total number of messages over all ports.
    pub fn len(&self) -> usize {
        self.bags.iter().map(|bag| bag.len()).sum()
    }

    /// Removes all messages from all ports.
    pub fn clear(&mut self) {
        for bag in &mut self.bags {
            bag.clear();
        }
    }

    pub(crate) fn bag(&self, idx: usize) -> &dyn Bag {
        &*self.bags[idx]
    }

    pub(crate) fn bag_mut(&mut self, idx: usize) -> &mut dyn Bag {
        &mut *self.bags[idx]
    }

    /// Renders the non-empty bags as `(port name, messages)` pairs.
    pub(crate) fn render(&self) -> Vec<(Arc<str>, Vec<String>)> {
        self.decls
            .iter()
            .zip(&self.bags)
            .filter(|(_, bag)| !bag.is_empty())
            .map(|(decl, bag)| (decl.shared_name(), bag.render()))
            .collect()
    }

    fn index_of<T: Message>(&self, port: &Port<T>) -> usize {
        match self.decls.iter().position(|decl| decl.name() == port.name()) {
            Some(idx) => idx,
            None => panic!("port `{}` is not declared", port.name()),
        }
    }
}

impl fmt::Debug for Bags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut map = f.debug_map();
        for (decl, bag) in self.decls.iter().zip(&self.bags) {
            map.entry(&decl.name(), &bag.render());
        }

        map.finish()
    }
}
