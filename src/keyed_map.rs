//! KeyedMap: associated data stored at a master set's addresses.

use crate::address::{Address, Addressed};
use crate::error::Result;
use crate::hmap::{HMap, MapOptions};
use crate::master_set::{KeyStrategy, MasterSet, Prepare};
use crate::plain::{self, PlainOptions};
use core::ops::ControlFlow;
use serde::Serialize;

pub struct KeyedMap<K: KeyStrategy, V> {
    keys: MasterSet<K>,
    map: HMap<V>,
}

impl<K: KeyStrategy, V> KeyedMap<K, V> {
    pub(crate) fn new(keys: MasterSet<K>, opts: MapOptions) -> Self {
        Self {
            keys,
            map: HMap::with_options(opts),
        }
    }

    pub fn keys(&self) -> &MasterSet<K> {
        &self.keys
    }

    /// The underlying address-keyed store.
    pub fn map(&self) -> &HMap<V> {
        &self.map
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn get(&self, key: &K::Stored) -> Option<&V> {
        self.map.get(key.address())
    }

    pub fn get_at(&self, addr: Address) -> Option<&V> {
        self.map.get(addr)
    }

    pub fn put(&mut self, key: &K::Stored, value: V) -> Result<&V>
    where
        V: PartialEq,
    {
        self.keys.check_owned(key)?;
        self.map.put(key.address(), value)
    }

    /// Intern `raw` as a key, then store `value` under it.
    pub fn put_raw<R: ?Sized>(&mut self, raw: &R, value: V) -> Result<&V>
    where
        K: Prepare<R>,
        V: PartialEq,
    {
        let key = self.keys.put_raw(raw)?;
        self.map.put(key.address(), value)
    }

    /// Store every `(raw key, value)` pair.
    pub fn extend_raw<'r, R, I>(&mut self, pairs: I) -> Result<()>
    where
        R: ?Sized + 'r,
        K: Prepare<R>,
        V: PartialEq,
        I: IntoIterator<Item = (&'r R, V)>,
    {
        for (raw, value) in pairs {
            self.put_raw(raw, value)?;
        }
        Ok(())
    }

    /// Entries in order, each with its key object.
    pub fn iter(&self) -> impl Iterator<Item = (K::Stored, &V)> + '_ {
        self.map
            .iter()
            .filter_map(|(addr, v)| self.keys.get(addr).map(|k| (k, v)))
    }

    pub fn values(&self) -> impl Iterator<Item = &V> + '_ {
        self.map.values()
    }

    pub fn for_each<F>(&self, mut visit: F) -> ControlFlow<()>
    where
        F: FnMut(&K::Stored, &V, usize) -> ControlFlow<()>,
    {
        for (i, (k, v)) in self.iter().enumerate() {
            if visit(&k, v, i).is_break() {
                return ControlFlow::Break(());
            }
        }
        ControlFlow::Continue(())
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

    pub fn copy(&self, n: Option<usize>) -> Result<Self>
    where
        V: Clone,
    {
        Ok(Self {
            keys: self.keys.clone(),
            map: self.map.copy(n)?,
        })
    }

    pub fn same_addresses<W>(&self, other: &KeyedMap<K, W>) -> bool {
        self.map.same_addresses(&other.map)
    }

    /// Plain form: an object when every key renders as text.
    pub fn to_plain(&self, opts: PlainOptions) -> Result<serde_json::Value>
    where
        K::Stored: Serialize,
        V: Serialize,
    {
        plain::pairs(self.iter(), self.map.collision_count(), opts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::address::Interned;
    use crate::error::Error;
    use serde_json::json;

    /// Integer keys hashed mod 4.
    struct ModFour;

    impl KeyStrategy for ModFour {
        type Candidate<'a> = u32;
        type Stored = Interned<u32>;

        fn hash(&self, c: &u32) -> u32 {
            c % 4
        }
        fn equal(&self, prev: &Interned<u32>, c: &u32) -> bool {
            **prev == *c
        }
        fn merge(&self, addr: Address, prev: Option<&Interned<u32>>, c: Option<&u32>) -> Interned<u32> {
            prev.cloned()
                .unwrap_or_else(|| Interned::new(addr, c.copied().unwrap_or_default()))
        }
    }

    impl Prepare<u32> for ModFour {
        fn prepare<'a>(&self, raw: &'a u32) -> u32 {
            *raw
        }
    }

    #[test]
    fn values_live_at_key_addresses() {
        let keys = MasterSet::new(ModFour);
        let mut m = keys.hmap::<&str>(MapOptions::default());
        m.put_raw(&1u32, "one").unwrap();
        m.put_raw(&5u32, "five").unwrap();
        m.put_raw(&2u32, "two").unwrap();

        let five = keys.lookup(&5).unwrap();
        assert_eq!(five.address(), Address::new(1, 1));
        assert_eq!(m.get(&five), Some(&"five"));
        assert_eq!(m.get_at(Address::new(2, 0)), Some(&"two"));
        assert_eq!(m.len(), 3);

        let rows: Vec<(u32, &str)> = m.iter().map(|(k, v)| (*k, *v)).collect();
        assert_eq!(rows, vec![(1, "one"), (5, "five"), (2, "two")]);
    }

    #[test]
    fn keys_from_another_master_are_rejected() {
        let keys = MasterSet::new(ModFour);
        let other = MasterSet::new(ModFour);
        let mut m = keys.hmap::<u8>(MapOptions::default());
        let stranger = other.put_raw(&3u32).unwrap();
        assert!(matches!(m.put(&stranger, 1), Err(Error::Foreign { .. })));
        let own = keys.put_raw(&3u32).unwrap();
        assert_eq!(m.put(&own, 7).unwrap(), &7);
    }

    #[test]
    fn plain_form_uses_pairs_for_non_text_keys() {
        let keys = MasterSet::new(ModFour);
        let mut m = keys.hmap::<bool>(MapOptions::hash_order());
        m.extend_raw([(&6u32, true), (&2, false), (&1, true)]).unwrap();
        assert_eq!(
            m.to_plain(PlainOptions::with_stats()).unwrap(),
            json!([[1, true], [6, true], [2, false], ["$collisions", 1]])
        );
    }

    #[test]
    fn copy_and_same_addresses() {
        let keys = MasterSet::new(ModFour);
        let mut a = keys.hmap::<u32>(MapOptions::default());
        let mut labels = keys.hmap::<String>(MapOptions::default());
        for k in [1u32, 5, 9] {
            a.put_raw(&k, k * 10).unwrap();
            labels.put_raw(&k, format!("k{k}")).unwrap();
        }
        assert!(a.same_addresses(&labels));

        let mut b = a.copy(None).unwrap();
        let nine = keys.lookup(&9).unwrap();
        b.put(&nine, 0).unwrap();
        assert_eq!(a.get(&nine), Some(&90));
        assert_eq!(b.get(&nine), Some(&0));

        a.freeze();
        assert!(matches!(a.put(&nine, 1), Err(Error::Frozen)));
        assert!(a.put(&nine, 90).is_ok());
    }

    #[test]
    fn for_each_stops_early() {
        let keys = MasterSet::new(ModFour);
        let mut m = keys.hmap::<u32>(MapOptions::default());
        for k in 0..6u32 {
            m.put_raw(&k, k).unwrap();
        }
        let mut seen = Vec::new();
        let flow = m.for_each(|k, v, i| {
            if i == 3 {
                return ControlFlow::Break(());
            }
            seen.push((**k, *v));
            ControlFlow::Continue(())
        });
        assert!(flow.is_break());
        assert_eq!(seen, vec![(0, 0), (1, 1), (2, 2)]);
    }
}
