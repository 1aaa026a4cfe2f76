#![cfg(test)]

// Property tests for OpenAddressingTable kept inside the crate so they can
// reach the probe sequence and slot states directly.

use crate::error::{CapacityLimit, TableError};
use crate::open_addressing::{OpenAddressingTable, Slot};
use crate::table::{InsertKind, SegmentTable};
use proptest::prelude::*;
use std::collections::{BTreeSet, HashMap};

// Pool-indexed operations to improve shrinking: indices shrink to earlier keys,
// pool length shrinks, and op lists shrink in length.
#[derive(Clone, Debug)]
enum OpI {
    Insert(usize, i32),
    Delete(usize),
    Lookup(usize),
    Invalid(String),
}

fn arb_scenario() -> impl Strategy<Value = (usize, Vec<String>, Vec<OpI>)> {
    (
        1usize..=13,
        proptest::collection::vec("[0-9]{3}[A-Z][0-9]{2}", 1..=16),
    )
        .prop_flat_map(|(size, pool)| {
            let idxs: Vec<usize> = (0..pool.len()).collect();
            let idx = proptest::sample::select(idxs);
            let op = prop_oneof![
                4 => (idx.clone(), any::<i32>()).prop_map(|(i, v)| OpI::Insert(i, v)),
                2 => idx.clone().prop_map(OpI::Delete),
                2 => idx.clone().prop_map(OpI::Lookup),
                1 => "[0-9a-z]{0,7}".prop_map(OpI::Invalid),
            ];
            proptest::collection::vec(op, 1..80).prop_map(move |ops| (size, pool.clone(), ops))
        })
}

// Property: State-machine equivalence against std::collections::HashMap.
// Invariants exercised across random operation sequences:
// - Upsert never changes `len`; inserts (new keys and updates alike) are
//   refused exactly when `len == size`, and the refused value is not stored.
// - Every live key stays reachable through lookup after unrelated deletions
//   (tombstones keep probe paths intact).
// - `delete` returns the model's value; collision sets only name live keys and
//   include every live key sharing the deleted key's hash1.
// - Slot census: occupied slots == len; occupied + empty + tombstones == size.
// - Malformed keys are rejected by every keyed operation without mutation.
proptest! {
    #![proptest_config(ProptestConfig { cases: 128, .. ProptestConfig::default() })]
    #[test]
    fn prop_state_machine((size, pool, ops) in arb_scenario()) {
        let mut sut: OpenAddressingTable<i32> = OpenAddressingTable::new(size);
        let mut model: HashMap<String, i32> = HashMap::new();

        for op in ops {
            match op {
                OpI::Insert(i, v) => {
                    let k = &pool[i];
                    let full = model.len() == size;
                    match sut.insert(k, v) {
                        Ok(ins) => {
                            prop_assert!(!full, "a full table must refuse every insert");
                            let existed = model.insert(k.clone(), v).is_some();
                            let expected = if existed { InsertKind::Updated } else { InsertKind::Inserted };
                            prop_assert_eq!(ins.kind, expected);
                            prop_assert!(ins.index < size);
                            let occupied_by_k = matches!(sut.slot(ins.index), Some(Slot::Occupied { key, .. }) if key == k);
                            prop_assert!(occupied_by_k);
                        }
                        Err(TableError::CapacityExceeded(CapacityLimit::Full { size: s })) => {
                            prop_assert_eq!(s, size);
                            prop_assert!(full);
                        }
                        Err(e) => prop_assert!(false, "unexpected insert error {:?}", e),
                    }
                }
                OpI::Delete(i) => {
                    let k = &pool[i];
                    let home = sut.hash1(k);
                    let res = sut.delete(k).unwrap();
                    match (res, model.remove(k)) {
                        (Some(d), Some(v)) => {
                            prop_assert_eq!(&d.key, k);
                            prop_assert_eq!(d.value, v);
                            let reported: BTreeSet<&str> = d.collisions.iter().map(String::as_str).collect();
                            prop_assert_eq!(reported.len(), d.collisions.len(), "no duplicates");
                            prop_assert!(!reported.contains(k.as_str()));
                            for c in &d.collisions {
                                prop_assert!(model.contains_key(c), "collision {} is not live", c);
                            }
                            for other in model.keys() {
                                if sut.hash1(other) == home {
                                    prop_assert!(reported.contains(other.as_str()));
                                }
                            }
                            prop_assert!(matches!(sut.slot(d.index), Some(Slot::Tombstone)));
                        }
                        (None, None) => {}
                        (got, want) => prop_assert!(false, "delete mismatch: {:?} vs {:?}", got.map(|d| d.key), want),
                    }
                }
                OpI::Lookup(i) => {
                    let k = &pool[i];
                    prop_assert_eq!(sut.lookup(k).unwrap(), model.get(k));
                }
                OpI::Invalid(s) => {
                    let before = sut.statistics();
                    prop_assert_eq!(sut.insert(&s, 0), Err(TableError::InvalidKey(s.clone())));
                    prop_assert_eq!(sut.lookup(&s), Err(TableError::InvalidKey(s.clone())));
                    prop_assert_eq!(sut.delete(&s), Err(TableError::InvalidKey(s.clone())));
                    prop_assert_eq!(sut.statistics(), before);
                }
            }

            prop_assert_eq!(sut.len(), model.len());
            for (k, v) in &model {
                prop_assert_eq!(sut.lookup(k).unwrap(), Some(v));
            }
            let stats = sut.statistics();
            prop_assert_eq!(stats.filled, model.len());
            prop_assert_eq!(stats.filled + stats.empty + stats.tombstones, size);
        }
    }
}

// Property: with the step coprime to the size, the probe sequence of any key
// is a permutation of all slots.
proptest! {
    #[test]
    fn prop_probe_is_permutation(size in 1usize..600, key in "[0-9]{3}[A-Z][0-9]{2}") {
        let t: OpenAddressingTable<()> = OpenAddressingTable::new(size);
        let seen: BTreeSet<usize> = t.probe(&key).collect();
        prop_assert_eq!(seen.len(), size);
        prop_assert_eq!(t.probe(&key).next(), Some(t.hash1(&key)));
    }
}
