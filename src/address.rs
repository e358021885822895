//! Addresses and canonical objects.

use core::fmt;
use core::hash::{Hash, Hasher};
use core::ops::Deref;
use serde::{Serialize, Serializer};
use std::rc::Rc;

/// Permanent location of a canonical value: its hash plus its position in
/// the collision chain for that hash (0 for the first value seen).
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize)]
pub struct Address {
    pub hash: u32,
    pub collision: u32,
}

impl Address {
    #[inline]
    pub const fn new(hash: u32, collision: u32) -> Self {
        Self { hash, collision }
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.hash, self.collision)
    }
}

impl From<(u32, u32)> for Address {
    fn from((hash, collision): (u32, u32)) -> Self {
        Self::new(hash, collision)
    }
}

/// Values that know the address they were minted at.
pub trait Addressed {
    fn address(&self) -> Address;
}

impl Addressed for Address {
    fn address(&self) -> Address {
        *self
    }
}

struct Node<T> {
    address: Address,
    value: T,
}

/// Shared canonical object minted by a `MasterSet`.
///
/// Clones share the same node. Equality and hashing use node identity,
/// so two `Interned` compare equal only if they are the same object.
pub struct Interned<T> {
    node: Rc<Node<T>>,
}

impl<T> Interned<T> {
    pub fn new(address: Address, value: T) -> Self {
        Self {
            node: Rc::new(Node { address, value }),
        }
    }

    #[inline]
    pub fn value(&self) -> &T {
        &self.node.value
    }

    /// True if both handles point at the same canonical object.
    #[inline]
    pub fn ptr_eq(a: &Self, b: &Self) -> bool {
        Rc::ptr_eq(&a.node, &b.node)
    }
}

impl<T> Addressed for Interned<T> {
    #[inline]
    fn address(&self) -> Address {
        self.node.address
    }
}

impl<T> Clone for Interned<T> {
    fn clone(&self) -> Self {
        Self {
            node: Rc::clone(&self.node),
        }
    }
}

impl<T> Deref for Interned<T> {
    type Target = T;
    fn deref(&self) -> &T {
        &self.node.value
    }
}

impl<T> PartialEq for Interned<T> {
    fn eq(&self, other: &Self) -> bool {
        Self::ptr_eq(self, other)
    }
}

impl<T> Eq for Interned<T> {}

impl<T> Hash for Interned<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        (Rc::as_ptr(&self.node) as usize).hash(state);
    }
}

impl<T: fmt::Debug> fmt::Debug for Interned<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Interned")
            .field("address", &self.node.address)
            .field("value", &self.node.value)
            .finish()
    }
}

impl<T: fmt::Display> fmt::Display for Interned<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.node.value.fmt(f)
    }
}

// Serialises as the payload; the address is not part of the plain form.
impl<T: Serialize> Serialize for Interned<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.node.value.serialize(serializer)
    }
}
