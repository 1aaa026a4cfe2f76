//! segment-hash: fixed-size hash tables over keys of a fixed lexical
//! pattern, in two collision-resolution variants sharing one contract.
//!
//! Internal Design:
//!
//! Summary
//! - Goal: a small, inspectable associative container whose placement of
//!   every key can be predicted by hand, with diagnostics about how full and
//!   how collided it is.
//! - Layers:
//!   - KeyFormat: anchored pattern of digit / uppercase positions; every
//!     keyed operation validates against it first.
//!   - PolynomialHasher: `h = (h * base + code(c)) mod n`, folded left to
//!     right; results are segment indices directly.
//!   - OpenAddressingTable<V>: slot array, double hashing (bases 31 and 37),
//!     tombstone deletion.
//!   - ChainingTable<V>: bucket array of ordered handle lists into a
//!     `SlotMap` of entries, single hash (base 31), soft overflow policy.
//!   - SegmentTable: the shared trait; `export` and `analysis` are written
//!     against it.
//!
//! Constraints
//! - Single-threaded, synchronous; no operation blocks or allocates beyond
//!   the table's own storage and its return values.
//! - Size is fixed at construction; no resizing or rehashing. `reset`
//!   reallocates an empty store of the same size.
//! - `count` increments on a new key, decrements on a removal, and is
//!   unchanged when an existing key is overwritten.
//!
//! Outcomes
//! - A malformed key is `Err(TableError::InvalidKey)` and never mutates.
//! - A missing key is `Ok(None)`, a normal result.
//! - Refused inserts are `Err(TableError::CapacityExceeded)`; advisory
//!   thresholds ride along on the successful `Insertion` as warnings.
//! - Segment queries outside `[0, size)` are `Err(TableError::OutOfRange)`.
//!
//! Collision sets
//! - Chaining: every other key left in the bucket of the removed key.
//! - Open addressing: keys sharing the removed key's `hash1`, plus keys on
//!   the removed key's probe path (up to its slot) whose own `hash1` also
//!   lies on that path. The second rule is a heuristic and may over- or
//!   under-report actual displacement.

pub mod analysis;
pub mod chaining;
pub mod error;
pub mod export;
pub mod hasher;
pub mod key;
pub mod open_addressing;
mod open_addressing_proptest;
pub mod table;

// Public surface
pub use chaining::{ChainPolicy, ChainStats, ChainingTable};
pub use error::{CapacityLimit, Result, TableError};
pub use hasher::PolynomialHasher;
pub use key::{CharClass, KeyFormat};
pub use open_addressing::{OpenAddressingTable, OpenStats, Slot};
pub use table::{
    CapacityCheck, CapacityWarning, Deleted, InsertKind, Insertion, Located, Row, SegmentTable,
};
