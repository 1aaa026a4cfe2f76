//! ChainingTable: separate chaining over a fixed bucket array.
//!
//! Entries live in a generational `SlotMap`; each bucket is an ordered list
//! of handles into it, kept in insertion order. Removing an entry unlinks its
//! handle from its bucket and frees the slot, so no tombstones are needed.

use crate::error::{CapacityLimit, Result, TableError};
use crate::hasher::PolynomialHasher;
use crate::key::KeyFormat;
use crate::table::{
    CapacityCheck, CapacityWarning, Deleted, InsertKind, Insertion, Located, Row, SegmentTable,
};
use core::fmt;
use slotmap::{DefaultKey, SlotMap};

/// Bucket count used by [`ChainingTable::default`].
pub const DEFAULT_SIZE: usize = 1500;

/// Soft overflow policy. All averages are over nonempty buckets.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct ChainPolicy {
    /// Refuse inserts above this average chain length.
    pub max_avg_chain: f64,
    /// Refuse inserts above this average once every bucket is in use.
    pub max_avg_chain_saturated: f64,
    /// Warn above this average chain length.
    pub warn_avg_chain: f64,
    /// Warn once entries reach this share of the bucket count.
    pub warn_fill_ratio: f64,
}

impl Default for ChainPolicy {
    fn default() -> Self {
        Self {
            max_avg_chain: 20.0,
            max_avg_chain_saturated: 15.0,
            warn_avg_chain: 10.0,
            warn_fill_ratio: 0.95,
        }
    }
}

/// Fill-level diagnostics over buckets.
#[derive(Clone, Debug, PartialEq)]
pub struct ChainStats {
    pub size: usize,
    pub filled: usize,
    pub empty: usize,
    pub count: usize,
    /// Share of nonempty buckets, not of entries.
    pub fill_percentage: f64,
    pub max_chain_length: usize,
    /// Over nonempty buckets, rounded to two decimals.
    pub avg_chain_length: f64,
}

impl fmt::Display for ChainStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Table size:          {}", self.size)?;
        writeln!(f, "Filled buckets:      {}", self.filled)?;
        writeln!(f, "Empty buckets:       {}", self.empty)?;
        writeln!(f, "Entries:             {}", self.count)?;
        writeln!(f, "Fill percentage:     {:.2}%", self.fill_percentage)?;
        writeln!(f, "Max chain length:    {}", self.max_chain_length)?;
        write!(f, "Avg chain length:    {}", self.avg_chain_length)
    }
}

#[derive(Debug)]
struct Entry<V> {
    key: String,
    value: V,
}

pub struct ChainingTable<V> {
    entries: SlotMap<DefaultKey, Entry<V>>,
    buckets: Vec<Vec<DefaultKey>>,
    occupied_buckets: usize,
    format: KeyFormat,
    policy: ChainPolicy,
}

fn empty_buckets(size: usize) -> Vec<Vec<DefaultKey>> {
    (0..size).map(|_| Vec::new()).collect()
}

impl<V> ChainingTable<V> {
    /// Table of `size` buckets accepting `dLLLLd` keys.
    ///
    /// # Panics
    /// If `size` is zero.
    pub fn new(size: usize) -> Self {
        Self::with_key_format(size, KeyFormat::DIGIT_LETTERS_DIGIT)
    }

    /// # Panics
    /// If `size` is zero.
    pub fn with_key_format(size: usize, format: KeyFormat) -> Self {
        assert!(size > 0, "table size must be nonzero");
        Self {
            entries: SlotMap::with_key(),
            buckets: empty_buckets(size),
            occupied_buckets: 0,
            format,
            policy: ChainPolicy::default(),
        }
    }

    pub fn with_policy(mut self, policy: ChainPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn policy(&self) -> &ChainPolicy {
        &self.policy
    }

    /// Bucket index, in `[0, size)`.
    pub fn hash(&self, key: &str) -> usize {
        PolynomialHasher::PRIMARY.hash(key, self.buckets.len())
    }

    /// Live entries, bucket by bucket, each chain in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (usize, &str, &V)> + '_ {
        self.buckets.iter().enumerate().flat_map(move |(i, chain)| {
            chain.iter().filter_map(move |&h| {
                self.entries
                    .get(h)
                    .map(|e| (i, e.key.as_str(), &e.value))
            })
        })
    }

    pub fn chain_len(&self, index: usize) -> Option<usize> {
        self.buckets.get(index).map(Vec::len)
    }

    /// Average chain length over nonempty buckets, 0 when all are empty.
    pub fn avg_chain_length(&self) -> f64 {
        if self.occupied_buckets == 0 {
            0.0
        } else {
            self.entries.len() as f64 / self.occupied_buckets as f64
        }
    }

    fn check_key(&self, key: &str) -> Result<()> {
        if self.format.validate(key) {
            Ok(())
        } else {
            Err(TableError::InvalidKey(key.to_owned()))
        }
    }

    /// Position of `key` within bucket `bucket`.
    fn position(&self, bucket: usize, key: &str) -> Option<usize> {
        self.buckets[bucket].iter().position(|&h| {
            self.entries
                .get(h)
                .map(|e| e.key == key)
                .unwrap_or(false)
        })
    }

    fn chain_entries(&self, bucket: usize) -> impl Iterator<Item = &Entry<V>> + '_ {
        self.buckets[bucket]
            .iter()
            .filter_map(move |&h| self.entries.get(h))
    }
}

impl<V> Default for ChainingTable<V> {
    fn default() -> Self {
        Self::new(DEFAULT_SIZE)
    }
}

impl<V: fmt::Debug> fmt::Debug for ChainingTable<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChainingTable")
            .field("size", &self.buckets.len())
            .field("count", &self.entries.len())
            .field("occupied_buckets", &self.occupied_buckets)
            .field("format", &self.format.to_string())
            .finish()
    }
}

impl<V> SegmentTable for ChainingTable<V> {
    type Value = V;
    type Stats = ChainStats;

    fn key_format(&self) -> KeyFormat {
        self.format
    }

    fn size(&self) -> usize {
        self.buckets.len()
    }

    fn len(&self) -> usize {
        self.entries.len()
    }

    fn segment_of(&self, key: &str) -> usize {
        self.hash(key)
    }

    fn capacity_check(&self) -> CapacityCheck {
        let avg = self.avg_chain_length();
        let size = self.buckets.len();
        if avg > self.policy.max_avg_chain {
            return CapacityCheck::Refuse(CapacityLimit::ChainTooLong {
                avg_chain_length: avg,
            });
        }
        if self.occupied_buckets == size && avg > self.policy.max_avg_chain_saturated {
            return CapacityCheck::Refuse(CapacityLimit::Saturated {
                avg_chain_length: avg,
            });
        }

        let count = self.entries.len();
        let mut warnings = Vec::new();
        if avg > self.policy.warn_avg_chain {
            warnings.push(CapacityWarning::LongChains {
                avg_chain_length: avg,
            });
        }
        if count as f64 >= self.policy.warn_fill_ratio * size as f64 {
            warnings.push(CapacityWarning::NearlyFull { count, size });
        }
        CapacityCheck::Proceed(warnings)
    }

    /// The capacity policy is evaluated before the key is looked up, so an
    /// overflowing table refuses updates of existing keys too.
    fn insert(&mut self, key: &str, value: V) -> Result<Insertion> {
        self.check_key(key)?;
        let warnings = match self.capacity_check() {
            CapacityCheck::Refuse(limit) => {
                log::debug!("refusing {key}: {limit}");
                return Err(TableError::CapacityExceeded(limit));
            }
            CapacityCheck::Proceed(warnings) => warnings,
        };
        for w in &warnings {
            log::warn!("{w}");
        }

        let bucket = self.hash(key);
        if let Some(pos) = self.position(bucket, key) {
            let h = self.buckets[bucket][pos];
            if let Some(e) = self.entries.get_mut(h) {
                e.value = value;
            }
            log::trace!("updated {key} in bucket {bucket}");
            return Ok(Insertion {
                index: bucket,
                kind: InsertKind::Updated,
                warnings,
            });
        }

        let h = self.entries.insert(Entry {
            key: key.to_owned(),
            value,
        });
        let chain = &mut self.buckets[bucket];
        if chain.is_empty() {
            self.occupied_buckets += 1;
        }
        chain.push(h);
        log::trace!("inserted {key} into bucket {bucket} (chain {})", chain.len());

        Ok(Insertion {
            index: bucket,
            kind: InsertKind::Inserted,
            warnings,
        })
    }

    fn locate(&self, key: &str) -> Result<Option<Located<'_, V>>> {
        self.check_key(key)?;
        let bucket = self.hash(key);
        Ok(self
            .chain_entries(bucket)
            .find(|e| e.key == key)
            .map(|e| Located {
                index: bucket,
                key: e.key.as_str(),
                value: &e.value,
            }))
    }

    fn locate_by_index(&self, index: usize) -> Result<Vec<(&str, &V)>> {
        let size = self.buckets.len();
        if index >= size {
            return Err(TableError::OutOfRange { index, size });
        }
        Ok(self
            .chain_entries(index)
            .map(|e| (e.key.as_str(), &e.value))
            .collect())
    }

    fn delete(&mut self, key: &str) -> Result<Option<Deleted<V>>> {
        self.check_key(key)?;
        let bucket = self.hash(key);
        let Some(pos) = self.position(bucket, key) else {
            log::debug!("delete of absent key {key}");
            return Ok(None);
        };

        let h = self.buckets[bucket].remove(pos);
        if self.buckets[bucket].is_empty() {
            self.occupied_buckets -= 1;
        }
        let Some(entry) = self.entries.remove(h) else {
            return Ok(None);
        };

        let collisions: Vec<String> = self
            .chain_entries(bucket)
            .map(|e| e.key.clone())
            .collect();
        log::trace!(
            "deleted {} from bucket {bucket}, {} keys share it",
            entry.key,
            collisions.len()
        );

        Ok(Some(Deleted {
            index: bucket,
            key: entry.key,
            value: entry.value,
            collisions,
        }))
    }

    fn statistics(&self) -> ChainStats {
        let size = self.buckets.len();
        let filled = self.occupied_buckets;
        let max_chain_length = self.buckets.iter().map(Vec::len).max().unwrap_or(0);
        ChainStats {
            size,
            filled,
            empty: size - filled,
            count: self.entries.len(),
            fill_percentage: filled as f64 / size as f64 * 100.0,
            max_chain_length,
            avg_chain_length: (self.avg_chain_length() * 100.0).round() / 100.0,
        }
    }

    fn rows(&self) -> Vec<Row<'_, V>> {
        let mut rows = Vec::with_capacity(self.buckets.len().max(self.entries.len()));
        for (index, chain) in self.buckets.iter().enumerate() {
            if chain.is_empty() {
                rows.push(Row {
                    index,
                    entry: None,
                    occupancy: 0,
                });
                continue;
            }
            rows.extend(self.chain_entries(index).map(|e| Row {
                index,
                entry: Some((e.key.as_str(), &e.value)),
                occupancy: chain.len(),
            }));
        }
        rows
    }

    fn reset(&mut self) {
        self.entries = SlotMap::with_key();
        self.buckets = empty_buckets(self.buckets.len());
        self.occupied_buckets = 0;
        log::info!("chaining table reset ({} buckets)", self.buckets.len());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Keys of the `dLLLLd` format that all hash to bucket 1 of a 4-bucket table.
    const BUCKET_ONE: [&str; 4] = ["1AAAC0", "1AABD0", "1AACA0", "1AADB0"];

    #[test]
    fn chains_keep_insertion_order() {
        let mut t = ChainingTable::new(4);
        for (i, k) in BUCKET_ONE.iter().enumerate() {
            assert_eq!(t.hash(k), 1);
            let ins = t.insert(k, i).unwrap();
            assert_eq!(ins.index, 1);
            assert_eq!(ins.kind, InsertKind::Inserted);
        }
        let keys: Vec<&str> = t.locate_by_index(1).unwrap().into_iter().map(|(k, _)| k).collect();
        assert_eq!(keys, BUCKET_ONE);
        assert_eq!(t.chain_len(1), Some(4));
        assert_eq!(t.chain_len(0), Some(0));
    }

    #[test]
    fn delete_middle_keeps_order_and_reports_neighbors() {
        let mut t = ChainingTable::new(4);
        for k in BUCKET_ONE {
            t.insert(k, ()).unwrap();
        }
        let d = t.delete("1AABD0").unwrap().expect("present");
        assert_eq!(d.collisions, vec!["1AAAC0", "1AACA0", "1AADB0"]);
        assert_eq!(t.len(), 3);
        let keys: Vec<&str> = t.iter().map(|(_, k, _)| k).collect();
        assert_eq!(keys, vec!["1AAAC0", "1AACA0", "1AADB0"]);
    }

    #[test]
    fn occupied_bucket_count_tracks_chains() {
        let mut t = ChainingTable::new(4);
        t.insert("1AAAC0", ()).unwrap();
        t.insert("1AABD0", ()).unwrap();
        assert_eq!(t.statistics().filled, 1);
        t.delete("1AAAC0").unwrap();
        assert_eq!(t.statistics().filled, 1);
        t.delete("1AABD0").unwrap();
        let s = t.statistics();
        assert_eq!((s.filled, s.empty, s.count, s.max_chain_length), (0, 4, 0, 0));
        assert_eq!(s.avg_chain_length, 0.0);
    }

    #[test]
    fn saturated_table_refuses_above_fifteen() {
        // One bucket: it is in use as soon as anything is stored.
        let mut t = ChainingTable::new(1);
        for i in 0..16 {
            let key = format!("{}ABCD{}", i / 10, i % 10);
            t.insert(&key, i).unwrap();
        }
        assert_eq!(t.len(), 16);
        let err = t.insert("9ZZZZ9", 99).unwrap_err();
        assert_eq!(
            err,
            TableError::CapacityExceeded(CapacityLimit::Saturated {
                avg_chain_length: 16.0
            })
        );
        // Policy runs before the lookup, so updates are refused as well.
        assert!(t.insert("0ABCD0", 5).is_err());
        assert_eq!(t.len(), 16);
    }

    #[test]
    fn warnings_follow_policy() {
        let mut t = ChainingTable::new(2).with_policy(ChainPolicy {
            warn_avg_chain: 1.0,
            ..ChainPolicy::default()
        });
        let first = t.insert("1AAAA1", ()).unwrap();
        assert!(first.warnings.is_empty());
        let second = t.insert("1AAAA1", ()).unwrap();
        assert_eq!(second.kind, InsertKind::Updated);
        assert!(second.warnings.is_empty());
        t.insert("2BBBB2", ()).unwrap();
        let check = t.capacity_check();
        assert!(!check.is_refused());
        assert!(check
            .warnings()
            .iter()
            .any(|w| matches!(w, CapacityWarning::NearlyFull { count: 2, size: 2 })));
    }

    #[test]
    fn rows_cover_every_bucket() {
        let mut t = ChainingTable::new(4);
        t.insert("1AAAC0", "x").unwrap();
        t.insert("1AABD0", "y").unwrap();
        let rows = t.rows();
        assert_eq!(rows.len(), 5, "three empty buckets plus two entries");
        assert_eq!(rows[1].entry, Some(("1AAAC0", &"x")));
        assert_eq!(rows[1].occupancy, 2);
        assert_eq!(rows[2].index, 1);
        assert_eq!(rows[0].entry, None);
    }

    #[test]
    fn stats_round_average() {
        let mut t = ChainingTable::new(4);
        t.insert("1AAAC0", ()).unwrap();
        t.insert("1AABD0", ()).unwrap();
        let other = (0..10)
            .map(|d| format!("{d}ZZZZ{d}"))
            .find(|k| t.hash(k) != 1)
            .unwrap();
        t.insert(&other, ()).unwrap();
        let s = t.statistics();
        assert_eq!(s.count, 3);
        assert_eq!(s.filled, 2);
        assert_eq!(s.avg_chain_length, 1.5);
        assert_eq!(s.fill_percentage, 50.0);
        assert_eq!(s.max_chain_length, 2);
    }
}
