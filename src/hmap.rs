//! HMap: values stored by hash, then by collision index.
//!
//! Collision 0 lives in the primary table keyed by hash. Collisions
//! `1..` live in a per-hash overflow chain keyed by collision index, so a
//! write at a high index costs one entry, not the gap below it.

use crate::address::Address;
use crate::error::{Error, Result};
use crate::plain::{self, PlainOptions};
use core::ops::ControlFlow;
use hashbrown::hash_map::Entry;
use hashbrown::HashMap;
use serde::Serialize;
use std::borrow::Cow;
use std::cell::OnceCell;
use std::collections::BTreeMap;

/// Construction options shared by stores and views.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct MapOptions {
    /// Iterate in first-insertion order. When false, iteration is by
    /// ascending hash, then ascending collision.
    pub insert_order: bool,
}

impl Default for MapOptions {
    fn default() -> Self {
        Self { insert_order: true }
    }
}

impl MapOptions {
    pub fn hash_order() -> Self {
        Self {
            insert_order: false,
        }
    }
}

#[derive(Clone, Debug)]
pub struct HMap<V> {
    by_hash: HashMap<u32, V>,
    // Never holds an empty chain.
    by_hash_col: HashMap<u32, BTreeMap<u32, V>>,
    order: Option<Vec<Address>>,
    len: usize,
    frozen: bool,
    // Hash-ordered address list, computed once after freezing.
    frozen_order: OnceCell<Vec<Address>>,
}

impl<V> Default for HMap<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> HMap<V> {
    pub fn new() -> Self {
        Self::with_options(MapOptions::default())
    }

    pub fn with_options(opts: MapOptions) -> Self {
        Self {
            by_hash: HashMap::new(),
            by_hash_col: HashMap::new(),
            order: opts.insert_order.then(Vec::new),
            len: 0,
            frozen: false,
            frozen_order: OnceCell::new(),
        }
    }

    pub fn options(&self) -> MapOptions {
        MapOptions {
            insert_order: self.order.is_some(),
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn is_frozen(&self) -> bool {
        self.frozen
    }

    pub fn get(&self, addr: Address) -> Option<&V> {
        if addr.collision == 0 {
            self.by_hash.get(&addr.hash)
        } else {
            self.by_hash_col.get(&addr.hash)?.get(&addr.collision)
        }
    }

    pub fn contains(&self, addr: Address) -> bool {
        self.get(addr).is_some()
    }

    /// Overflow entries for `hash` as `(collision, value)`, ascending.
    pub(crate) fn chain(&self, hash: u32) -> impl Iterator<Item = (u32, &V)> + '_ {
        self.by_hash_col
            .get(&hash)
            .into_iter()
            .flat_map(|chain| chain.iter().map(|(&c, v)| (c, v)))
    }

    /// Store `value` at `addr`.
    pub fn put(&mut self, addr: Address, value: V) -> Result<&V>
    where
        V: PartialEq,
    {
        self.put_merge(addr, |_| value)
    }

    /// Store the result of `merge(addr, previous, value)` at `addr`.
    pub fn put_with<F>(&mut self, addr: Address, value: V, merge: F) -> Result<&V>
    where
        V: PartialEq,
        F: FnOnce(Address, Option<&V>, V) -> V,
    {
        self.put_merge(addr, |prev| merge(addr, prev, value))
    }

    /// Store the value produced from the previous occupant of `addr`.
    ///
    /// A result equal to the previous value leaves the map untouched, which
    /// is also the only write a frozen map accepts.
    pub fn put_merge<F>(&mut self, addr: Address, merge: F) -> Result<&V>
    where
        V: PartialEq,
        F: FnOnce(Option<&V>) -> V,
    {
        if self.frozen {
            let val = merge(self.get(addr));
            return match self.get(addr) {
                Some(prev) if *prev == val => Ok(prev),
                _ => Err(Error::Frozen),
            };
        }

        let fresh = if addr.collision == 0 {
            match self.by_hash.entry(addr.hash) {
                Entry::Occupied(mut o) => {
                    let val = merge(Some(o.get()));
                    if *o.get() != val {
                        o.insert(val);
                    }
                    false
                }
                Entry::Vacant(e) => {
                    e.insert(merge(None));
                    true
                }
            }
        } else {
            let chain = self.by_hash_col.entry(addr.hash).or_default();
            match chain.get_mut(&addr.collision) {
                Some(prev) => {
                    let val = merge(Some(&*prev));
                    if *prev != val {
                        *prev = val;
                    }
                    false
                }
                None => {
                    chain.insert(addr.collision, merge(None));
                    true
                }
            }
        };

        if fresh {
            self.len += 1;
            if let Some(order) = self.order.as_mut() {
                order.push(addr);
            }
        }
        Ok(self
            .get(addr)
            .expect("slot must be occupied immediately after put"))
    }

    /// Addresses in iteration order.
    pub fn addresses(&self) -> Cow<'_, [Address]> {
        if let Some(order) = &self.order {
            return Cow::Borrowed(order.as_slice());
        }
        if self.frozen {
            return Cow::Borrowed(self.frozen_order.get_or_init(|| self.hash_order()).as_slice());
        }
        Cow::Owned(self.hash_order())
    }

    fn hash_order(&self) -> Vec<Address> {
        let mut hashes: Vec<u32> = self
            .by_hash
            .keys()
            .chain(self.by_hash_col.keys())
            .copied()
            .collect();
        hashes.sort_unstable();
        hashes.dedup();

        let mut ret = Vec::with_capacity(self.len);
        for h in hashes {
            if self.by_hash.contains_key(&h) {
                ret.push(Address::new(h, 0));
            }
            ret.extend(self.chain(h).map(|(c, _)| Address::new(h, c)));
        }
        ret
    }

    pub fn iter(&self) -> Iter<'_, V> {
        Iter {
            map: self,
            addrs: self.addresses(),
            pos: 0,
        }
    }

    pub fn values(&self) -> impl Iterator<Item = &V> + '_ {
        self.iter().map(|(_, v)| v)
    }

    pub fn first(&self) -> Option<&V> {
        self.addresses().first().and_then(|&a| self.get(a))
    }

    pub fn last(&self) -> Option<&V> {
        self.addresses().last().and_then(|&a| self.get(a))
    }

    /// Visit entries in order with their position; `Break` stops early.
    pub fn for_each<F>(&self, mut visit: F) -> ControlFlow<()>
    where
        F: FnMut(Address, &V, usize) -> ControlFlow<()>,
    {
        for (i, (addr, v)) in self.iter().enumerate() {
            if visit(addr, v, i).is_break() {
                return ControlFlow::Break(());
            }
        }
        ControlFlow::Continue(())
    }

    pub fn find<P>(&self, mut pred: P) -> Option<&V>
    where
        P: FnMut(&V) -> bool,
    {
        self.values().find(|v| pred(v))
    }

    /// Groups of values sharing a hash, one group per hash that has at
    /// least one overflow entry, ordered by hash.
    pub fn collision_groups(&self) -> Vec<Vec<&V>> {
        let mut hashes: Vec<u32> = self.by_hash_col.keys().copied().collect();
        hashes.sort_unstable();
        hashes
            .into_iter()
            .map(|h| {
                self.by_hash
                    .get(&h)
                    .into_iter()
                    .chain(self.chain(h).map(|(_, v)| v))
                    .collect()
            })
            .collect()
    }

    /// Number of entries stored in overflow chains.
    pub fn collision_count(&self) -> usize {
        self.by_hash_col.values().map(BTreeMap::len).sum()
    }

    pub fn freeze(&mut self) {
        if !self.frozen {
            log::debug!("freezing map with {} entries", self.len);
        }
        self.frozen = true;
    }

    /// Independent, unfrozen copy. `n` must be omitted or equal to `len()`.
    pub fn copy(&self, n: Option<usize>) -> Result<Self>
    where
        V: Clone,
    {
        if let Some(requested) = n {
            if requested != self.len {
                return Err(Error::PartialCopy {
                    requested,
                    len: self.len,
                });
            }
        }
        log::debug!("copying map with {} entries", self.len);
        Ok(Self {
            by_hash: self.by_hash.clone(),
            by_hash_col: self.by_hash_col.clone(),
            order: self.order.clone(),
            len: self.len,
            frozen: false,
            frozen_order: OnceCell::new(),
        })
    }

    pub fn clear(&mut self) -> Result<()> {
        if self.frozen {
            return Err(Error::Frozen);
        }
        log::debug!("clearing map with {} entries", self.len);
        self.by_hash.clear();
        self.by_hash_col.clear();
        if let Some(order) = self.order.as_mut() {
            order.clear();
        }
        self.len = 0;
        Ok(())
    }

    /// True if both maps hold entries at exactly the same addresses.
    pub fn same_addresses<W>(&self, other: &HMap<W>) -> bool {
        if self.len != other.len
            || self.by_hash.len() != other.by_hash.len()
            || self.by_hash_col.len() != other.by_hash_col.len()
        {
            return false;
        }
        self.addresses().iter().all(|&a| other.contains(a))
    }

    /// Plain form keyed by address.
    pub fn to_plain(&self, opts: PlainOptions) -> Result<serde_json::Value>
    where
        V: Serialize,
    {
        plain::pairs(self.iter(), self.collision_count(), opts)
    }
}

/// Ordered iterator over `(Address, &V)`.
pub struct Iter<'a, V> {
    map: &'a HMap<V>,
    addrs: Cow<'a, [Address]>,
    pos: usize,
}

impl<'a, V> Iterator for Iter<'a, V> {
    type Item = (Address, &'a V);

    fn next(&mut self) -> Option<Self::Item> {
        while let Some(&addr) = self.addrs.get(self.pos) {
            self.pos += 1;
            if let Some(v) = self.map.get(addr) {
                return Some((addr, v));
            }
        }
        None
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (0, Some(self.addrs.len() - self.pos))
    }
}

impl<'a, V> IntoIterator for &'a HMap<V> {
    type Item = (Address, &'a V);
    type IntoIter = Iter<'a, V>;
    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const ABCD: [(u32, u32, &str); 4] = [(0, 0, "a"), (1, 0, "b"), (1, 2, "c"), (1, 1, "d")];

    fn create_map(hc_vals: &[(u32, u32, &'static str)], opts: MapOptions) -> HMap<&'static str> {
        let mut m = HMap::with_options(opts);
        for &(h, c, v) in hc_vals {
            m.put(Address::new(h, c), v).unwrap();
        }
        m
    }

    fn vals(m: &HMap<&'static str>) -> Vec<&'static str> {
        m.values().copied().collect()
    }

    #[test]
    fn values_follow_configured_order() {
        let cases: &[(&[(u32, u32, &str)], &[&str], &[&str])] = &[
            (&[(0, 0, "a")], &["a"], &["a"]),
            (&[(1, 0, "b")], &["b"], &["b"]),
            (&[(0, 0, "a"), (1, 0, "b"), (0, 0, "c")], &["c", "b"], &["c", "b"]),
            (&[(0, 0, "a"), (1, 0, "b"), (1, 0, "c")], &["a", "c"], &["a", "c"]),
            (&[(0, 0, "a"), (1, 0, "b"), (1, 2, "c")], &["a", "b", "c"], &["a", "b", "c"]),
            (&ABCD, &["a", "b", "c", "d"], &["a", "b", "d", "c"]),
        ];
        for &(hc, insert, hash) in cases {
            assert_eq!(vals(&create_map(hc, MapOptions::default())), insert, "{hc:?}");
            assert_eq!(vals(&create_map(hc, MapOptions::hash_order())), hash, "{hc:?}");
        }
    }

    #[test]
    fn addresses_in_both_orders() {
        let a = |h, c| Address::new(h, c);
        let m = create_map(&ABCD, MapOptions::default());
        assert_eq!(&*m.addresses(), &[a(0, 0), a(1, 0), a(1, 2), a(1, 1)]);
        let m = create_map(&ABCD, MapOptions::hash_order());
        assert_eq!(&*m.addresses(), &[a(0, 0), a(1, 0), a(1, 1), a(1, 2)]);

        let m = create_map(&[(0, 0, "a"), (1, 0, "b"), (1, 0, "c")], MapOptions::default());
        assert_eq!(&*m.addresses(), &[a(0, 0), a(1, 0)]);
    }

    #[test]
    fn collision_groups_share_a_hash() {
        let m = create_map(&[(0, 0, "a"), (1, 0, "b"), (1, 0, "c")], MapOptions::default());
        assert!(m.collision_groups().is_empty());
        let m = create_map(&[(0, 0, "a"), (1, 0, "b"), (1, 2, "c")], MapOptions::default());
        assert_eq!(m.collision_groups(), vec![vec![&"b", &"c"]]);
        let m = create_map(&ABCD, MapOptions::default());
        assert_eq!(m.collision_groups(), vec![vec![&"b", &"d", &"c"]]);
        assert_eq!(m.collision_count(), 2);
    }

    #[test]
    fn for_each_halts_on_break() {
        for opts in [MapOptions::default(), MapOptions::hash_order()] {
            let m = create_map(&ABCD, opts);
            for halt in 0..=5 {
                let mut seen = Vec::new();
                let flow = m.for_each(|_, v, i| {
                    if i == halt {
                        return ControlFlow::Break(());
                    }
                    seen.push(*v);
                    ControlFlow::Continue(())
                });
                let all = vals(&m);
                assert_eq!(seen, all[..halt.min(all.len())].to_vec());
                assert_eq!(flow.is_break(), halt < all.len());
            }
        }
    }

    #[test]
    fn get_distinguishes_absent() {
        let m = create_map(&[(0, 0, "a"), (1, 0, "b"), (1, 3, "c"), (1, 1, "d")], MapOptions::default());
        assert_eq!(m.get(Address::new(0, 0)), Some(&"a"));
        assert_eq!(m.get(Address::new(0, 1)), None);
        assert_eq!(m.get(Address::new(1, 0)), Some(&"b"));
        assert_eq!(m.get(Address::new(1, 2)), None, "skipped collision index is empty");
        assert_eq!(m.get(Address::new(1, 3)), Some(&"c"));
        assert_eq!(m.get(Address::new(1, 4)), None);
        assert_eq!(m.get(Address::new(9, 0)), None);
        assert_eq!(m.len(), 4);
    }

    #[test]
    fn high_collision_index_is_stored_sparsely() {
        let mut m: HMap<u8> = HMap::with_options(MapOptions::hash_order());
        m.put(Address::new(0, u32::MAX), 1).unwrap();
        m.put(Address::new(0, 20_000_000), 2).unwrap();
        assert_eq!(m.len(), 2);
        assert_eq!(m.collision_count(), 2);
        assert_eq!(m.get(Address::new(0, u32::MAX)), Some(&1));
        assert_eq!(m.get(Address::new(0, 1)), None);
        assert_eq!(
            &*m.addresses(),
            &[Address::new(0, 20_000_000), Address::new(0, u32::MAX)]
        );
        assert_eq!(m.chain(0).count(), 2);
        assert_eq!(m.collision_groups(), vec![vec![&2, &1]]);
    }

    #[test]
    fn put_replaces_or_appends() {
        let base = [(0, 0, "a"), (1, 0, "b"), (1, 3, "c"), (1, 1, "d")];
        let cases = [
            ((1, 0), vec!["a", "e", "d", "c"]),
            ((1, 4), vec!["a", "b", "d", "c", "e"]),
            ((1, 3), vec!["a", "b", "d", "e"]),
        ];
        for ((h, c), exp) in cases {
            let mut m = create_map(&base, MapOptions::hash_order());
            assert_eq!(*m.put(Address::new(h, c), "e").unwrap(), "e");
            assert_eq!(vals(&m), exp);
        }
    }

    #[test]
    fn put_with_stores_merge_result() {
        fn plus_one(_a: Address, _prev: Option<&String>, v: String) -> String {
            let c = v.chars().next().unwrap();
            char::from_u32(c as u32 + 1).unwrap().to_string()
        }
        let mut m: HMap<String> = HMap::with_options(MapOptions::hash_order());
        for (h, c, v) in [(0, 0, "a"), (1, 0, "b"), (1, 3, "c"), (1, 1, "d")] {
            m.put(Address::new(h, c), v.to_string()).unwrap();
        }
        let r = m
            .put_with(Address::new(1, 4), "e".to_string(), plus_one)
            .unwrap()
            .clone();
        assert_eq!(r, "f");
        let all: Vec<_> = m.values().cloned().collect();
        assert_eq!(all, vec!["a", "b", "d", "c", "f"]);
    }

    #[test]
    fn merge_sees_previous_value() {
        let mut m: HMap<u32> = HMap::new();
        m.put(Address::new(3, 0), 10).unwrap();
        let mut seen = None;
        m.put_with(Address::new(3, 0), 5, |a, prev, v| {
            seen = Some((a, prev.copied()));
            prev.copied().unwrap_or(0) + v
        })
        .unwrap();
        assert_eq!(seen, Some((Address::new(3, 0), Some(10))));
        assert_eq!(m.get(Address::new(3, 0)), Some(&15));
        assert_eq!(m.len(), 1);
    }

    #[test]
    fn frozen_rejects_changes_but_allows_identical_puts() {
        let mut m = create_map(&ABCD, MapOptions::default());
        m.freeze();
        assert!(m.is_frozen());
        assert!(matches!(m.put(Address::new(0, 0), "z"), Err(Error::Frozen)));
        assert!(matches!(m.put(Address::new(7, 0), "z"), Err(Error::Frozen)));
        assert_eq!(*m.put(Address::new(1, 2), "c").unwrap(), "c");
        assert!(matches!(m.clear(), Err(Error::Frozen)));
        assert_eq!(vals(&m), vec!["a", "b", "c", "d"]);
    }

    #[test]
    fn frozen_hash_order_is_cached_and_stable() {
        let mut m = create_map(&ABCD, MapOptions::hash_order());
        m.freeze();
        let first = m.addresses();
        assert!(matches!(first, Cow::Borrowed(_)));
        assert_eq!(vals(&m), vec!["a", "b", "d", "c"]);
    }

    #[test]
    fn copy_is_independent_and_full_only() {
        let mut m = create_map(&ABCD, MapOptions::default());
        m.freeze();
        let mut c = m.copy(None).unwrap();
        assert_eq!(
            c.to_plain(PlainOptions::default()).unwrap(),
            m.to_plain(PlainOptions::default()).unwrap()
        );
        assert!(!c.is_frozen());
        c.put(Address::new(0, 0), "z").unwrap();
        c.put(Address::new(5, 0), "y").unwrap();
        assert_eq!(m.get(Address::new(0, 0)), Some(&"a"));
        assert!(!m.contains(Address::new(5, 0)));

        assert!(m.copy(Some(4)).is_ok());
        assert!(matches!(
            m.copy(Some(2)),
            Err(Error::PartialCopy { requested: 2, len: 4 })
        ));
    }

    #[test]
    fn clear_empties_everything() {
        let mut m = create_map(&ABCD, MapOptions::default());
        m.clear().unwrap();
        assert!(m.is_empty());
        assert_eq!(m.addresses().len(), 0);
        assert_eq!(m.collision_count(), 0);
        m.put(Address::new(2, 0), "q").unwrap();
        assert_eq!(vals(&m), vec!["q"]);
    }

    #[test]
    fn same_addresses_ignores_values() {
        let a = create_map(&ABCD, MapOptions::default());
        let mut b: HMap<u8> = HMap::with_options(MapOptions::hash_order());
        for (h, c, _) in ABCD {
            b.put(Address::new(h, c), 0).unwrap();
        }
        assert!(a.same_addresses(&b));
        b.put(Address::new(1, 3), 0).unwrap();
        assert!(!a.same_addresses(&b));
        let c = create_map(&[(0, 0, "a"), (1, 0, "b"), (2, 0, "c"), (3, 0, "d")], MapOptions::default());
        assert!(!a.same_addresses(&c));
    }

    #[test]
    fn first_last_find() {
        let m = create_map(&ABCD, MapOptions::default());
        assert_eq!(m.first(), Some(&"a"));
        assert_eq!(m.last(), Some(&"d"));
        assert_eq!(m.find(|v| *v > "b"), Some(&"c"));
        assert_eq!(m.find(|v| *v == "q"), None);
        let empty: HMap<u8> = HMap::new();
        assert_eq!(empty.first(), None);
    }

    #[test]
    fn to_plain_uses_address_pairs() {
        let m = create_map(&[(0, 0, "a"), (1, 1, "b")], MapOptions::default());
        assert_eq!(
            m.to_plain(PlainOptions::with_stats()).unwrap(),
            json!([
                [{"hash": 0, "collision": 0}, "a"],
                [{"hash": 1, "collision": 1}, "b"],
                ["$collisions", 1]
            ])
        );
    }
}
