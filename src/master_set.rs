//! MasterSet: the deduplicating authority that mints addresses.

use crate::address::{Address, Addressed};
use crate::error::{Error, Result};
use crate::hmap::{HMap, MapOptions};
use crate::hset::HSet;
use crate::keyed_map::KeyedMap;
use crate::plain::{self, PlainOptions};
use crate::reentrancy::ReentryCheck;
use core::fmt;
use core::ops::ControlFlow;
use serde::Serialize;
use std::cell::RefCell;
use std::rc::Rc;

/// Client-supplied hashing, equality and construction for one key domain.
///
/// `Candidate<'a>` is the borrowed form a value takes before it is
/// interned; `Stored` is the canonical object minted for it.
pub trait KeyStrategy {
    type Candidate<'a>;
    type Stored: Addressed + Clone + PartialEq;

    /// Hash a candidate. Must agree with `equal`.
    fn hash(&self, candidate: &Self::Candidate<'_>) -> u32;

    /// Does the stored object represent this candidate?
    fn equal(&self, prev: &Self::Stored, candidate: &Self::Candidate<'_>) -> bool;

    /// Build or touch the canonical object at `addr`.
    ///
    /// Called with `(None, Some(candidate))` when `addr` is minted and with
    /// `(Some(prev), None)` when a candidate resolves to an existing object.
    /// Returning `prev` unchanged keeps the object's identity.
    fn merge(
        &self,
        addr: Address,
        prev: Option<&Self::Stored>,
        candidate: Option<&Self::Candidate<'_>>,
    ) -> Self::Stored;

    /// Reject a candidate before anything is hashed or stored.
    fn validate(&self, _candidate: &Self::Candidate<'_>) -> core::result::Result<(), String> {
        Ok(())
    }
}

/// Normalise a raw input into a strategy's candidate form.
pub trait Prepare<R: ?Sized>: KeyStrategy {
    fn prepare<'a>(&self, raw: &'a R) -> Self::Candidate<'a>;
}

enum Probe {
    Hit(Address),
    Miss(Address),
}

struct Inner<K: KeyStrategy> {
    strategy: K,
    map: RefCell<HMap<K::Stored>>,
    reentry: ReentryCheck,
}

/// Shared handle to an authority. Clones refer to the same canonical map;
/// views and keyed maps created from it keep it alive.
pub struct MasterSet<K: KeyStrategy> {
    inner: Rc<Inner<K>>,
}

impl<K: KeyStrategy> Clone for MasterSet<K> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<K: KeyStrategy> fmt::Debug for MasterSet<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let map = self.inner.map.borrow();
        f.debug_struct("MasterSet")
            .field("len", &map.len())
            .field("collisions", &map.collision_count())
            .field("frozen", &map.is_frozen())
            .finish()
    }
}

impl<K: KeyStrategy> MasterSet<K> {
    pub fn new(strategy: K) -> Self {
        Self::with_options(strategy, MapOptions::default())
    }

    pub fn with_options(strategy: K, opts: MapOptions) -> Self {
        Self {
            inner: Rc::new(Inner {
                strategy,
                map: RefCell::new(HMap::with_options(opts)),
                reentry: ReentryCheck::new(),
            }),
        }
    }

    pub fn strategy(&self) -> &K {
        &self.inner.strategy
    }

    /// True if both handles refer to the same authority.
    pub fn ptr_eq(a: &Self, b: &Self) -> bool {
        Rc::ptr_eq(&a.inner, &b.inner)
    }

    fn probe(strategy: &K, map: &HMap<K::Stored>, hash: u32, candidate: &K::Candidate<'_>) -> Probe {
        let head = Address::new(hash, 0);
        match map.get(head) {
            None => Probe::Miss(head),
            Some(prev) if strategy.equal(prev, candidate) => Probe::Hit(head),
            Some(_) => {
                let mut next = 1;
                for (c, prev) in map.chain(hash) {
                    if strategy.equal(prev, candidate) {
                        return Probe::Hit(Address::new(hash, c));
                    }
                    next = c + 1;
                }
                Probe::Miss(Address::new(hash, next))
            }
        }
    }

    /// Resolve a candidate to its canonical object, minting a new address
    /// when no stored object is equal to it.
    pub fn put_create(&self, candidate: &K::Candidate<'_>) -> Result<K::Stored> {
        let _g = self.inner.reentry.enter("put_create");
        let strategy = &self.inner.strategy;
        strategy.validate(candidate).map_err(Error::Rejected)?;
        let hash = strategy.hash(candidate);

        let mut map = self.inner.map.borrow_mut();
        let addr = match Self::probe(strategy, &map, hash, candidate) {
            Probe::Hit(addr) => addr,
            Probe::Miss(addr) => {
                if map.is_frozen() {
                    return Err(Error::Frozen);
                }
                if addr.collision > 0 {
                    log::trace!("hash {} collides, minting collision {}", hash, addr.collision);
                } else {
                    log::trace!("minting address {}", addr);
                }
                addr
            }
        };

        let stored = map.put_merge(addr, |prev| match prev {
            Some(prev) => strategy.merge(addr, Some(prev), None),
            None => strategy.merge(addr, None, Some(candidate)),
        })?;
        Ok(stored.clone())
    }

    /// Prepare a raw input and resolve it with `put_create`.
    pub fn put_raw<R: ?Sized>(&self, raw: &R) -> Result<K::Stored>
    where
        K: Prepare<R>,
    {
        let candidate = self.inner.strategy.prepare(raw);
        self.put_create(&candidate)
    }

    /// Find the canonical object for a candidate without minting or merging.
    pub fn lookup(&self, candidate: &K::Candidate<'_>) -> Option<K::Stored> {
        let _g = self.inner.reentry.enter("lookup");
        let strategy = &self.inner.strategy;
        let hash = strategy.hash(candidate);
        let map = self.inner.map.borrow();
        match Self::probe(strategy, &map, hash, candidate) {
            Probe::Hit(addr) => map.get(addr).cloned(),
            Probe::Miss(_) => None,
        }
    }

    pub fn lookup_raw<R: ?Sized>(&self, raw: &R) -> Option<K::Stored>
    where
        K: Prepare<R>,
    {
        let candidate = self.inner.strategy.prepare(raw);
        self.lookup(&candidate)
    }

    pub fn get(&self, addr: Address) -> Option<K::Stored> {
        let _g = self.inner.reentry.enter("get");
        self.inner.map.borrow().get(addr).cloned()
    }

    /// True if `value` is this authority's canonical object at its address.
    pub fn contains(&self, value: &K::Stored) -> bool {
        let _g = self.inner.reentry.enter("contains");
        self.inner
            .map
            .borrow()
            .get(value.address())
            .is_some_and(|v| v == value)
    }

    pub(crate) fn check_owned(&self, value: &K::Stored) -> Result<()> {
        if self.contains(value) {
            Ok(())
        } else {
            Err(Error::Foreign {
                address: value.address(),
            })
        }
    }

    pub fn len(&self) -> usize {
        let _g = self.inner.reentry.enter("len");
        self.inner.map.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn addresses(&self) -> Vec<Address> {
        let _g = self.inner.reentry.enter("addresses");
        self.inner.map.borrow().addresses().into_owned()
    }

    pub fn values(&self) -> Vec<K::Stored> {
        let _g = self.inner.reentry.enter("values");
        self.inner.map.borrow().values().cloned().collect()
    }

    pub fn first(&self) -> Option<K::Stored> {
        let _g = self.inner.reentry.enter("first");
        self.inner.map.borrow().first().cloned()
    }

    pub fn last(&self) -> Option<K::Stored> {
        let _g = self.inner.reentry.enter("last");
        self.inner.map.borrow().last().cloned()
    }

    pub fn find<P>(&self, pred: P) -> Option<K::Stored>
    where
        P: FnMut(&K::Stored) -> bool,
    {
        // Visitors run under a shared borrow, so they may read this set.
        self.inner.map.borrow().find(pred).cloned()
    }

    pub fn for_each<F>(&self, visit: F) -> ControlFlow<()>
    where
        F: FnMut(Address, &K::Stored, usize) -> ControlFlow<()>,
    {
        self.inner.map.borrow().for_each(visit)
    }

    pub fn collision_groups(&self) -> Vec<Vec<K::Stored>> {
        let _g = self.inner.reentry.enter("collision_groups");
        self.inner
            .map
            .borrow()
            .collision_groups()
            .into_iter()
            .map(|g| g.into_iter().cloned().collect())
            .collect()
    }

    pub fn collision_count(&self) -> usize {
        let _g = self.inner.reentry.enter("collision_count");
        self.inner.map.borrow().collision_count()
    }

    pub fn same_addresses<W>(&self, other: &HMap<W>) -> bool {
        let _g = self.inner.reentry.enter("same_addresses");
        self.inner.map.borrow().same_addresses(other)
    }

    /// Stop minting. Resolving already-interned candidates still works.
    pub fn freeze(&self) {
        let _g = self.inner.reentry.enter("freeze");
        self.inner.map.borrow_mut().freeze();
    }

    pub fn is_frozen(&self) -> bool {
        let _g = self.inner.reentry.enter("is_frozen");
        self.inner.map.borrow().is_frozen()
    }

    /// A fresh store keyed by this authority's addresses.
    pub fn hmap<V>(&self, opts: MapOptions) -> KeyedMap<K, V> {
        KeyedMap::new(self.clone(), opts)
    }

    /// A fresh view sharing this authority's numbering.
    pub fn hset(&self, opts: MapOptions) -> HSet<K> {
        HSet::new(self.clone(), opts)
    }

    pub fn to_plain(&self, opts: PlainOptions) -> Result<serde_json::Value>
    where
        K::Stored: Serialize,
    {
        let _g = self.inner.reentry.enter("to_plain");
        let map = self.inner.map.borrow();
        plain::members(map.values(), map.collision_count(), opts)
    }
}
