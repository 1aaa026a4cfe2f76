//! The contract shared by both collision-resolution variants.

use crate::error::{CapacityLimit, Result};
use crate::key::KeyFormat;
use core::fmt;

/// Whether an insertion created an entry or overwrote an existing one.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum InsertKind {
    Inserted,
    Updated,
}

/// Advisory threshold crossed at the time of an insertion. Never refuses the
/// operation; the caller decides whether and how to surface it.
#[derive(Clone, Debug, PartialEq)]
pub enum CapacityWarning {
    /// Open addressing: live entries reached the warning share of all slots.
    HighFill { count: usize, size: usize },
    /// Chaining: average chain length over nonempty buckets is high.
    LongChains { avg_chain_length: f64 },
    /// Chaining: live entries reached the warning share of the bucket count.
    NearlyFull { count: usize, size: usize },
}

impl fmt::Display for CapacityWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CapacityWarning::HighFill { count, size } => {
                write!(f, "table is over 90% full ({count} of {size} slots)")
            }
            CapacityWarning::LongChains { avg_chain_length } => {
                write!(f, "average chain length {avg_chain_length:.2} exceeds 10")
            }
            CapacityWarning::NearlyFull { count, size } => {
                write!(f, "{count} entries across {size} buckets")
            }
        }
    }
}

/// Result of evaluating a table's capacity thresholds before a mutation.
#[derive(Clone, Debug, PartialEq)]
pub enum CapacityCheck {
    Proceed(Vec<CapacityWarning>),
    Refuse(CapacityLimit),
}

impl CapacityCheck {
    pub fn is_refused(&self) -> bool {
        matches!(self, CapacityCheck::Refuse(_))
    }

    pub fn warnings(&self) -> &[CapacityWarning] {
        match self {
            CapacityCheck::Proceed(w) => w,
            CapacityCheck::Refuse(_) => &[],
        }
    }
}

/// Successful insertion.
#[derive(Clone, Debug, PartialEq)]
pub struct Insertion {
    /// Slot or bucket the entry lives in.
    pub index: usize,
    pub kind: InsertKind,
    pub warnings: Vec<CapacityWarning>,
}

/// A live entry together with the segment holding it.
#[derive(Debug, PartialEq)]
pub struct Located<'a, V> {
    pub index: usize,
    pub key: &'a str,
    pub value: &'a V,
}

/// Successful deletion. `collisions` lists the other live keys considered
/// to have collided with the removed one, per the variant's definition.
#[derive(Clone, Debug, PartialEq)]
pub struct Deleted<V> {
    pub index: usize,
    pub key: String,
    pub value: V,
    pub collisions: Vec<String>,
}

/// One line of a table view.
///
/// Open addressing yields one row per slot with `occupancy` 1 or 0.
/// Chaining yields one row per entry with `occupancy` equal to its chain
/// length, plus one empty row per empty bucket.
#[derive(Debug, PartialEq)]
pub struct Row<'a, V> {
    pub index: usize,
    pub entry: Option<(&'a str, &'a V)>,
    pub occupancy: usize,
}

/// A fixed-size associative container keyed by format-constrained strings.
///
/// Every keyed operation validates the key first and reports a malformed
/// key as [`TableError::InvalidKey`](crate::TableError::InvalidKey) without
/// touching the table.
pub trait SegmentTable {
    type Value;
    type Stats: fmt::Display;

    fn key_format(&self) -> KeyFormat;

    fn validate(&self, key: &str) -> bool {
        self.key_format().validate(key)
    }

    /// Number of segments, fixed at construction.
    fn size(&self) -> usize;

    /// Number of live entries.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Home segment of `key`. Does not validate.
    fn segment_of(&self, key: &str) -> usize;

    /// Insert or overwrite.
    fn insert(&mut self, key: &str, value: Self::Value) -> Result<Insertion>;

    fn lookup(&self, key: &str) -> Result<Option<&Self::Value>> {
        Ok(self.locate(key)?.map(|l| l.value))
    }

    fn locate(&self, key: &str) -> Result<Option<Located<'_, Self::Value>>>;

    /// Entries stored at segment `index`; empty when the segment is empty.
    fn locate_by_index(&self, index: usize) -> Result<Vec<(&str, &Self::Value)>>;

    fn delete(&mut self, key: &str) -> Result<Option<Deleted<Self::Value>>>;

    /// Hard and advisory thresholds as they stand now.
    fn capacity_check(&self) -> CapacityCheck;

    fn statistics(&self) -> Self::Stats;

    fn rows(&self) -> Vec<Row<'_, Self::Value>>;

    /// Drop every entry and start over with an empty store of the same size.
    fn reset(&mut self);
}
