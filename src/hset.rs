//! HSet: a view over a master set's canonical objects.
//!
//! A view keeps its own membership and order but never mints addresses;
//! every member is the master set's object at the same address.

use crate::address::{Address, Addressed};
use crate::error::{Error, Result};
use crate::hmap::{HMap, Iter, MapOptions};
use crate::master_set::{KeyStrategy, MasterSet, Prepare};
use crate::plain::{self, PlainOptions};
use core::fmt;
use core::ops::ControlFlow;
use serde::Serialize;

pub struct HSet<K: KeyStrategy> {
    master: MasterSet<K>,
    map: HMap<K::Stored>,
}

impl<K: KeyStrategy> HSet<K> {
    pub(crate) fn new(master: MasterSet<K>, opts: MapOptions) -> Self {
        Self {
            master,
            map: HMap::with_options(opts),
        }
    }

    pub fn master(&self) -> &MasterSet<K> {
        &self.master
    }

    /// The underlying address-keyed store.
    pub fn map(&self) -> &HMap<K::Stored> {
        &self.map
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn get(&self, addr: Address) -> Option<&K::Stored> {
        self.map.get(addr)
    }

    /// This view's member equal to `candidate`, resolved through the master
    /// set without minting.
    pub fn lookup(&self, candidate: &K::Candidate<'_>) -> Option<&K::Stored> {
        let value = self.master.lookup(candidate)?;
        self.map.get(value.address())
    }

    pub fn lookup_raw<R: ?Sized>(&self, raw: &R) -> Option<&K::Stored>
    where
        K: Prepare<R>,
    {
        let value = self.master.lookup_raw(raw)?;
        self.map.get(value.address())
    }

    pub fn contains(&self, value: &K::Stored) -> bool {
        self.map.get(value.address()).is_some_and(|v| v == value)
    }

    /// Add a canonical object of the master set.
    pub fn put(&mut self, value: &K::Stored) -> Result<&K::Stored> {
        self.master.check_owned(value)?;
        self.map.put(value.address(), value.clone())
    }

    /// Resolve a candidate through the master set, then add it here.
    ///
    /// A frozen view only resolves candidates the master already knows,
    /// so a refused write never mints.
    pub fn put_create(&mut self, candidate: &K::Candidate<'_>) -> Result<&K::Stored> {
        let value = if self.map.is_frozen() {
            self.master.lookup(candidate).ok_or(Error::Frozen)?
        } else {
            self.master.put_create(candidate)?
        };
        self.map.put(value.address(), value)
    }

    pub fn put_raw<R: ?Sized>(&mut self, raw: &R) -> Result<&K::Stored>
    where
        K: Prepare<R>,
    {
        let candidate = self.master.strategy().prepare(raw);
        self.put_create(&candidate)
    }

    /// Import already-resolved objects; stops at the first foreign one.
    pub fn put_all<I>(&mut self, values: I) -> Result<()>
    where
        I: IntoIterator<Item = K::Stored>,
    {
        for value in values {
            self.master.check_owned(&value)?;
            self.map.put(value.address(), value)?;
        }
        Ok(())
    }

    pub fn iter(&self) -> impl Iterator<Item = &K::Stored> + '_ {
        self.map.values()
    }

    pub fn values(&self) -> Vec<K::Stored> {
        self.map.values().cloned().collect()
    }

    pub fn first(&self) -> Option<&K::Stored> {
        self.map.first()
    }

    pub fn last(&self) -> Option<&K::Stored> {
        self.map.last()
    }

    pub fn find<P>(&self, pred: P) -> Option<&K::Stored>
    where
        P: FnMut(&K::Stored) -> bool,
    {
        self.map.find(pred)
    }

    pub fn for_each<F>(&self, visit: F) -> ControlFlow<()>
    where
        F: FnMut(Address, &K::Stored, usize) -> ControlFlow<()>,
    {
        self.map.for_each(visit)
    }

    pub fn collision_count(&self) -> usize {
        self.map.collision_count()
    }

    pub fn freeze(&mut self) {
        self.map.freeze();
    }

    pub fn is_frozen(&self) -> bool {
        self.map.is_frozen()
    }

    pub fn clear(&mut self) -> Result<()> {
        self.map.clear()
    }

    /// Independent copy backed by the same master set.
    pub fn copy(&self, n: Option<usize>) -> Result<Self> {
        Ok(Self {
            master: self.master.clone(),
            map: self.map.copy(n)?,
        })
    }

    pub fn same_addresses(&self, other: &HSet<K>) -> bool {
        self.map.same_addresses(&other.map)
    }

    pub fn to_plain(&self, opts: PlainOptions) -> Result<serde_json::Value>
    where
        K::Stored: Serialize,
    {
        plain::members(self.map.values(), self.map.collision_count(), opts)
    }
}

impl<'a, K: KeyStrategy> IntoIterator for &'a HSet<K> {
    type Item = (Address, &'a K::Stored);
    type IntoIter = Iter<'a, K::Stored>;
    fn into_iter(self) -> Self::IntoIter {
        self.map.iter()
    }
}

impl<K: KeyStrategy> fmt::Debug for HSet<K>
where
    K::Stored: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.map.values()).finish()
    }
}
