#![cfg(test)]

// Property tests for HMap kept inside the crate so they can reach
// `chain` and other crate-private helpers.

use crate::address::Address;
use crate::error::Error;
use crate::hmap::{HMap, MapOptions};
use proptest::prelude::*;
use std::collections::BTreeMap;

// Small address space so puts overwrite and chains have gaps often.
#[derive(Clone, Debug)]
enum Op {
    Put(u32, u32, i32),
    Merge(u32, u32, i32),
    Freeze,
    Copy,
    Clear,
}

fn arb_op() -> impl Strategy<Value = Op> {
    prop_oneof![
        6 => (0u32..6, 0u32..4, -3i32..3).prop_map(|(h, c, v)| Op::Put(h, c, v)),
        3 => (0u32..6, 0u32..4, -3i32..3).prop_map(|(h, c, v)| Op::Merge(h, c, v)),
        1 => Just(Op::Freeze),
        1 => Just(Op::Copy),
        1 => Just(Op::Clear),
    ]
}

// Model: values by address plus first-insertion order.
#[derive(Default)]
struct Model {
    vals: BTreeMap<Address, i32>,
    order: Vec<Address>,
    frozen: bool,
}

impl Model {
    fn put(&mut self, a: Address, v: i32) -> Result<i32, ()> {
        match self.vals.get(&a).copied() {
            Some(prev) if prev == v => Ok(v),
            _ if self.frozen => Err(()),
            Some(_) => {
                self.vals.insert(a, v);
                Ok(v)
            }
            None => {
                self.vals.insert(a, v);
                self.order.push(a);
                Ok(v)
            }
        }
    }
}

// Property: state-machine equivalence against a BTreeMap model.
// Invariants exercised across random operation sequences:
// - `get` parity for every address in the space; unset addresses are None.
// - Insertion order lists each address once, at its first write.
// - Hash order is ascending (hash, collision) and equals the model's keys.
// - Frozen maps reject only writes that would change a value.
// - `copy` yields the same addresses and is unfrozen.
proptest! {
    #![proptest_config(ProptestConfig { cases: 128, .. ProptestConfig::default() })]
    #[test]
    fn prop_state_machine(insert_order in any::<bool>(), ops in proptest::collection::vec(arb_op(), 1..80)) {
        let opts = MapOptions { insert_order };
        let mut sut: HMap<i32> = HMap::with_options(opts);
        let mut model = Model::default();

        for op in ops {
            match op {
                Op::Put(h, c, v) => {
                    let a = Address::new(h, c);
                    let expected = model.put(a, v);
                    match sut.put(a, v) {
                        Ok(&got) => prop_assert_eq!(Ok(got), expected),
                        Err(Error::Frozen) => prop_assert!(expected.is_err()),
                        Err(e) => prop_assert!(false, "unexpected error {}", e),
                    }
                }
                Op::Merge(h, c, d) => {
                    // Merge adds `d` to the previous value (or stores `d`).
                    let a = Address::new(h, c);
                    let target = model.vals.get(&a).map_or(d, |p| p + d);
                    let expected = model.put(a, target);
                    let res = sut.put_with(a, d, |_, prev, d| prev.map_or(d, |p| p + d)).map(|v| *v);
                    match res {
                        Ok(got) => prop_assert_eq!(Ok(got), expected),
                        Err(Error::Frozen) => prop_assert!(expected.is_err()),
                        Err(e) => prop_assert!(false, "unexpected error {}", e),
                    }
                }
                Op::Freeze => {
                    sut.freeze();
                    model.frozen = true;
                }
                Op::Copy => {
                    let copy = sut.copy(None).expect("full copy");
                    prop_assert!(copy.same_addresses(&sut));
                    prop_assert!(!copy.is_frozen());
                    prop_assert_eq!(copy.addresses().into_owned(), sut.addresses().into_owned());
                    sut = copy;
                    model.frozen = false;
                }
                Op::Clear => {
                    let res = sut.clear();
                    if model.frozen {
                        prop_assert!(res.is_err());
                    } else {
                        prop_assert!(res.is_ok());
                        model.vals.clear();
                        model.order.clear();
                    }
                }
            }

            // Post-conditions after each op
            prop_assert_eq!(sut.len(), model.vals.len());
            for h in 0..6u32 {
                for c in 0..5u32 {
                    let a = Address::new(h, c);
                    prop_assert_eq!(sut.get(a), model.vals.get(&a));
                }
            }
            let expected_order: Vec<Address> = if insert_order {
                model.order.clone()
            } else {
                model.vals.keys().copied().collect()
            };
            prop_assert_eq!(sut.addresses().into_owned(), expected_order);
            let chained = model.vals.keys().filter(|a| a.collision > 0).count();
            prop_assert_eq!(sut.collision_count(), chained);
        }
    }
}

// Property: chain entries keep their collision index. Writing collision k
// never moves any other collision of the same hash, and no gaps are filled.
proptest! {
    #[test]
    fn prop_chain_slots_are_stable(cols in proptest::collection::vec(1u32..u32::MAX, 1..20)) {
        let mut m: HMap<u32> = HMap::new();
        for &c in &cols {
            m.put(Address::new(7, c), c).unwrap();
        }
        let mut expected = cols.clone();
        expected.sort_unstable();
        expected.dedup();
        let chain: Vec<(u32, u32)> = m.chain(7).map(|(c, &v)| (c, v)).collect();
        let want: Vec<(u32, u32)> = expected.iter().map(|&c| (c, c)).collect();
        prop_assert_eq!(chain, want);
        prop_assert_eq!(m.collision_count(), expected.len());
        prop_assert_eq!(m.len(), expected.len());
    }
}
