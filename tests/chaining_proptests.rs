// ChainingTable property tests.
//
// Property 1: state-machine equivalence with std::collections::HashMap.
//  - Model: key -> value map plus a mirror of the overflow policy.
//  - Invariant: len() == model.len(); every model key is found with its value;
//               inserts are refused exactly when the policy says so, and then
//               nothing changes.
//  - Operations: insert, delete, lookup over a small key pool.
//
// Property 2: collision sets are exactly the surviving bucket neighbors.
//  - After each delete, the reported keys equal the model keys hashing to
//    the same bucket, in insertion order.
use proptest::prelude::*;
use segment_hash::{CapacityCheck, ChainingTable, InsertKind, SegmentTable, TableError};
use std::collections::HashMap;

fn key_pool() -> impl Strategy<Value = Vec<String>> {
    proptest::collection::vec("[0-9][A-C]{4}[0-9]", 1..=40)
}

// Property 1: policy-aware equivalence with a HashMap model.
proptest! {
    #[test]
    fn prop_chaining_matches_model(
        size in 1usize..=6,
        pool in key_pool(),
        ops in proptest::collection::vec((0u8..=2u8, 0usize..1000usize, any::<u16>()), 1..150),
    ) {
        let mut t: ChainingTable<u16> = ChainingTable::new(size);
        let mut model: HashMap<String, u16> = HashMap::new();

        for (op, raw, v) in ops {
            let k = &pool[raw % pool.len()];
            match op {
                0 => {
                    let refused = t.capacity_check().is_refused();
                    match t.insert(k, v) {
                        Ok(ins) => {
                            prop_assert!(!refused);
                            let existed = model.insert(k.clone(), v).is_some();
                            prop_assert_eq!(ins.kind == InsertKind::Updated, existed);
                            prop_assert_eq!(ins.index, t.hash(k));
                        }
                        Err(TableError::CapacityExceeded(_)) => prop_assert!(refused),
                        Err(e) => prop_assert!(false, "unexpected insert error {:?}", e),
                    }
                }
                1 => {
                    let res = t.delete(k).unwrap();
                    prop_assert_eq!(res.map(|d| d.value), model.remove(k));
                }
                2 => {
                    prop_assert_eq!(t.lookup(k).unwrap(), model.get(k));
                }
                _ => unreachable!(),
            }

            prop_assert_eq!(t.len(), model.len());
            for (mk, mv) in &model {
                prop_assert_eq!(t.lookup(mk).unwrap(), Some(mv));
            }

            let stats = t.statistics();
            prop_assert_eq!(stats.filled + stats.empty, size);
            let chain_sum: usize = (0..size).map(|i| t.chain_len(i).unwrap()).sum();
            prop_assert_eq!(chain_sum, model.len());
            if let CapacityCheck::Refuse(_) = t.capacity_check() {
                prop_assert!(t.avg_chain_length() > 15.0);
            }
        }
    }
}

// Property 2: delete reports the remaining bucket, in chain order.
proptest! {
    #[test]
    fn prop_collisions_are_bucket_neighbors(
        size in 1usize..=4,
        pool in proptest::collection::vec("[0-9][A-Z]{4}[0-9]", 1..=15),
        victims in proptest::collection::vec(0usize..100, 1..10),
    ) {
        let mut t: ChainingTable<()> = ChainingTable::new(size);
        let mut order: Vec<String> = Vec::new();
        for k in &pool {
            if t.insert(k, ()).unwrap().kind == InsertKind::Inserted {
                order.push(k.clone());
            }
        }

        for raw in victims {
            if order.is_empty() {
                break;
            }
            let victim = order.remove(raw % order.len());
            let bucket = t.hash(&victim);
            let d = t.delete(&victim).unwrap().expect("inserted above");
            let expected: Vec<String> = order
                .iter()
                .filter(|k| t.hash(k) == bucket)
                .cloned()
                .collect();
            prop_assert_eq!(d.collisions, expected);
        }
    }
}
