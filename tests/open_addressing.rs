// OpenAddressingTable integration tests.
//
// Each test names the behavior verified. Invariants exercised:
// - Reads after writes: a successful insert is visible to lookup until it is
//   deleted or overwritten.
// - Upsert: re-inserting a key overwrites in place and never changes `len`.
// - Tombstones: deleting a key never hides keys placed past it.
// - Fail closed: malformed keys are rejected by every keyed operation.
use rand::rngs::StdRng;
use rand::SeedableRng;
use segment_hash::analysis::generate_keys;
use segment_hash::{
    InsertKind, KeyFormat, OpenAddressingTable, SegmentTable, Slot, TableError,
};
use std::collections::HashSet;
use test_log::test;

// Both keys start probing at slot 2 of a 5-slot table and step by 3.
const FIRST: &str = "002A00";
const SECOND: &str = "007A00";

// Test: the double-hashing walk-through on a 5-slot table.
// Verifies: second colliding key lands at (2 + 3) mod 5 = 0; deleting the
// first keeps the second reachable and reports it as a collision.
#[test]
fn colliding_keys_on_small_table() {
    let mut t = OpenAddressingTable::new(5);
    assert_eq!((t.hash1(FIRST), t.hash2(FIRST)), (2, 3));
    assert_eq!((t.hash1(SECOND), t.hash2(SECOND)), (2, 3));

    assert_eq!(t.insert(FIRST, "first").unwrap().index, 2);
    let second = t.insert(SECOND, "second").unwrap();
    assert_eq!(second.index, 0);
    assert_eq!(second.kind, InsertKind::Inserted);

    let located = t.locate(SECOND).unwrap().expect("present");
    assert_eq!((located.index, located.key, *located.value), (0, SECOND, "second"));

    let deleted = t.delete(FIRST).unwrap().expect("present");
    assert_eq!(deleted.index, 2);
    assert_eq!(deleted.value, "first");
    assert!(deleted.collisions.contains(&SECOND.to_string()));

    assert!(matches!(t.slot(2), Some(Slot::Tombstone)));
    assert_eq!(t.lookup(SECOND).unwrap(), Some(&"second"));
    assert_eq!(t.lookup(FIRST).unwrap(), None);
    assert_eq!(t.len(), 1);
}

// Test: keys sitting on the deleted key's probe path whose home is on that
// path too are reported, even without sharing hash1; keys off the path are not.
#[test]
fn path_members_reported_as_collisions() {
    let mut t = OpenAddressingTable::new(5);
    let same_home = "014C00";
    let home_zero = "002B11";
    let home_four = "001B11";
    assert_eq!(t.hash1(same_home), 2);
    assert_eq!(t.hash1(home_zero), 0);
    assert_eq!(t.hash1(home_four), 4);

    assert_eq!(t.insert(same_home, 0).unwrap().index, 2);
    assert_eq!(t.insert(home_zero, 0).unwrap().index, 0);
    assert_eq!(t.insert(home_four, 0).unwrap().index, 4);
    // FIRST probes 2 -> 0 -> 3.
    assert_eq!(t.insert(FIRST, 0).unwrap().index, 3);

    let deleted = t.delete(FIRST).unwrap().expect("present");
    let mut got = deleted.collisions.clone();
    got.sort();
    assert_eq!(got, vec![home_zero.to_string(), same_home.to_string()]);
}

// Test: upsert keeps count and reflects the latest value.
#[test]
fn upsert_is_idempotent_on_count() {
    let mut t = OpenAddressingTable::default();
    t.insert("123A45", 1).unwrap();
    let again = t.insert("123A45", 2).unwrap();
    assert_eq!(again.kind, InsertKind::Updated);
    assert_eq!(t.len(), 1);
    assert_eq!(t.lookup("123A45").unwrap(), Some(&2));
    assert_eq!(t.statistics().filled, 1);
}

// Test: malformed keys are a caller error, distinct from "not found".
#[test]
fn invalid_keys_rejected_without_mutation() {
    let mut t = OpenAddressingTable::new(11);
    t.insert("123A45", 1).unwrap();
    for bad in ["123a45", "12A345", "123A4", "", "1234567"] {
        let err = TableError::InvalidKey(bad.to_string());
        assert_eq!(t.insert(bad, 9), Err(err.clone()));
        assert_eq!(t.lookup(bad), Err(err.clone()));
        assert_eq!(t.delete(bad), Err(err.clone()));
        assert!(matches!(t.locate(bad), Err(TableError::InvalidKey(_))));
        assert!(!t.validate(bad));
    }
    assert_eq!(t.len(), 1);
    assert_eq!(t.lookup("999Z99").unwrap(), None);
    assert_eq!(t.delete("999Z99").unwrap(), None);
}

// Test: deleting a third of a heavily loaded table never hides the rest.
#[test]
fn deletion_does_not_break_probe_paths() {
    let mut rng = StdRng::seed_from_u64(2024);
    let mut t = OpenAddressingTable::new(997);
    let mut keys: Vec<String> = generate_keys(KeyFormat::DIGITS_LETTER_DIGITS, 2000, &mut rng);
    let mut seen = HashSet::new();
    keys.retain(|k| seen.insert(k.clone()));
    keys.truncate(900);

    for (i, k) in keys.iter().enumerate() {
        t.insert(k, i).unwrap();
    }
    assert_eq!(t.len(), 900);

    for k in keys.iter().step_by(3) {
        assert!(t.delete(k).unwrap().is_some());
    }
    for (i, k) in keys.iter().enumerate() {
        let expect = if i % 3 == 0 { None } else { Some(&i) };
        assert_eq!(t.lookup(k).unwrap(), expect, "key {k}");
    }
    assert_eq!(t.len(), 600);

    let s = t.statistics();
    assert_eq!(s.filled, 600);
    assert_eq!(s.tombstones + s.empty + s.filled, 997);
}

// Test: segment queries by index.
#[test]
fn locate_by_index_reports_slot_contents() {
    let mut t = OpenAddressingTable::new(5);
    t.insert(FIRST, 1).unwrap();
    assert_eq!(t.locate_by_index(2).unwrap(), vec![(FIRST, &1)]);
    assert!(t.locate_by_index(0).unwrap().is_empty());
    assert_eq!(
        t.locate_by_index(9),
        Err(TableError::OutOfRange { index: 9, size: 5 })
    );
}

// Test: statistics after inserts, deletes and reset.
#[test]
fn statistics_and_reset() {
    let mut t = OpenAddressingTable::new(5);
    t.insert(FIRST, ()).unwrap();
    t.insert(SECOND, ()).unwrap();
    t.delete(FIRST).unwrap();

    let s = t.statistics();
    assert_eq!(s.size, 5);
    assert_eq!(s.filled, 1);
    assert_eq!(s.empty, 3);
    assert_eq!(s.tombstones, 1);
    assert_eq!(s.count, 1);
    assert_eq!(s.fill_percentage, 20.0);
    assert!(s.to_string().contains("20.00%"));

    t.reset();
    assert!(t.is_empty());
    assert_eq!(t.statistics().empty, 5);
    assert_eq!(t.insert(SECOND, ()).unwrap().index, 2);
}
