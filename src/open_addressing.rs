//! OpenAddressingTable: double hashing over a fixed slot array, with
//! tombstones so deletions never cut another key's probe path.
//!
//! Slot lifecycle: `Empty -> Occupied` on insert, `Occupied -> Tombstone` on
//! delete, `Tombstone -> Occupied` when an insert reuses it. Only `reset`
//! returns slots to `Empty`.

use crate::error::{CapacityLimit, Result, TableError};
use crate::hasher::PolynomialHasher;
use crate::key::KeyFormat;
use crate::table::{
    CapacityCheck, CapacityWarning, Deleted, InsertKind, Insertion, Located, Row, SegmentTable,
};
use core::fmt;
use hashbrown::HashSet;

/// Segment count used by [`OpenAddressingTable::default`].
pub const DEFAULT_SIZE: usize = 2500;

/// Share of slots holding live entries at which inserts start warning.
pub const WARN_FILL_RATIO: f64 = 0.9;

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Slot<V> {
    Empty,
    Tombstone,
    Occupied { key: String, value: V },
}

impl<V> Slot<V> {
    pub fn is_occupied(&self) -> bool {
        matches!(self, Slot::Occupied { .. })
    }

    fn entry(&self) -> Option<(&str, &V)> {
        match self {
            Slot::Occupied { key, value } => Some((key.as_str(), value)),
            _ => None,
        }
    }
}

/// Probe sequence `(h1 + i * h2) mod n` for `i` in `0..n`.
#[derive(Clone, Debug)]
pub struct Probe {
    next: usize,
    step: usize,
    size: usize,
    remaining: usize,
}

impl Probe {
    fn new(start: usize, step: usize, size: usize) -> Self {
        Self {
            next: start,
            step,
            size,
            remaining: size,
        }
    }
}

impl Iterator for Probe {
    type Item = usize;

    #[inline]
    fn next(&mut self) -> Option<usize> {
        if self.remaining == 0 {
            return None;
        }
        self.remaining -= 1;
        let idx = self.next;
        self.next = (self.next + self.step) % self.size;
        Some(idx)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl ExactSizeIterator for Probe {}

/// Fill-level diagnostics. Tombstones count as neither filled nor empty.
#[derive(Clone, Debug, PartialEq)]
pub struct OpenStats {
    pub size: usize,
    pub filled: usize,
    pub empty: usize,
    pub tombstones: usize,
    pub count: usize,
    /// `filled / size * 100`
    pub fill_percentage: f64,
}

impl fmt::Display for OpenStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Table size:        {}", self.size)?;
        writeln!(f, "Filled slots:      {}", self.filled)?;
        writeln!(f, "Empty slots:       {}", self.empty)?;
        writeln!(f, "Deleted slots:     {}", self.tombstones)?;
        writeln!(f, "Entries:           {}", self.count)?;
        write!(f, "Fill percentage:   {:.2}%", self.fill_percentage)
    }
}

pub struct OpenAddressingTable<V> {
    slots: Vec<Slot<V>>,
    count: usize,
    format: KeyFormat,
}

fn gcd(mut a: usize, mut b: usize) -> usize {
    while b != 0 {
        (a, b) = (b, a % b);
    }
    a
}

fn empty_slots<V>(size: usize) -> Vec<Slot<V>> {
    (0..size).map(|_| Slot::Empty).collect()
}

impl<V> OpenAddressingTable<V> {
    /// Table of `size` slots accepting `dddLdd` keys.
    ///
    /// # Panics
    /// If `size` is zero.
    pub fn new(size: usize) -> Self {
        Self::with_key_format(size, KeyFormat::DIGITS_LETTER_DIGITS)
    }

    /// # Panics
    /// If `size` is zero.
    pub fn with_key_format(size: usize, format: KeyFormat) -> Self {
        assert!(size > 0, "table size must be nonzero");
        Self {
            slots: empty_slots(size),
            count: 0,
            format,
        }
    }

    /// Probe start, in `[0, size)`.
    pub fn hash1(&self, key: &str) -> usize {
        PolynomialHasher::PRIMARY.hash(key, self.slots.len())
    }

    /// Probe step, in `[1, size)` (or 1 when size is 1) and coprime with the
    /// size, so the probe sequence visits every slot exactly once.
    ///
    /// Steps sharing an odd factor with the size are moved to the next
    /// coprime value. At size 2500 this changes the step, and so the
    /// placement, of keys whose raw step is a multiple of 5 compared with a
    /// plain "force odd" rule.
    pub fn hash2(&self, key: &str) -> usize {
        let n = self.slots.len();
        let mut step = PolynomialHasher::SECONDARY.hash(key, n);
        if step == 0 {
            step = 1;
        }
        if n % 2 == 0 && step % 2 == 0 {
            step += 1;
        }
        // Odd steps can still share an odd factor with n (e.g. 5 and 2500).
        while gcd(step, n) != 1 {
            step = if step + 1 < n { step + 1 } else { 1 };
        }
        step
    }

    pub fn probe(&self, key: &str) -> Probe {
        Probe::new(self.hash1(key), self.hash2(key), self.slots.len())
    }

    pub fn slot(&self, index: usize) -> Option<&Slot<V>> {
        self.slots.get(index)
    }

    /// Live entries in slot order.
    pub fn iter(&self) -> impl Iterator<Item = (usize, &str, &V)> + '_ {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(i, s)| s.entry().map(|(k, v)| (i, k, v)))
    }

    fn check_key(&self, key: &str) -> Result<()> {
        if self.format.validate(key) {
            Ok(())
        } else {
            Err(TableError::InvalidKey(key.to_owned()))
        }
    }

    /// Lookup scan: stops at the first `Empty` slot, passes over tombstones.
    fn find_slot(&self, key: &str) -> Option<usize> {
        for idx in self.probe(key) {
            match &self.slots[idx] {
                Slot::Empty => return None,
                Slot::Occupied { key: k, .. } if k == key => return Some(idx),
                Slot::Occupied { .. } | Slot::Tombstone => {}
            }
        }
        None
    }

    /// Insertion scan: first `Empty` or `Tombstone` slot.
    fn find_vacant(&self, key: &str) -> Option<usize> {
        self.probe(key).find(|&idx| !self.slots[idx].is_occupied())
    }

    /// Other live keys reported as colliding with a key just removed from
    /// `deleted_at`: keys sharing its `hash1`, plus keys sitting on its probe
    /// path (up to `deleted_at`) whose own `hash1` is on that path too.
    ///
    /// The second half approximates "displaced because of this key"; it can
    /// over- and under-report real displacement chains.
    fn collisions(&self, key: &str, deleted_at: usize) -> Vec<String> {
        let home = self.hash1(key);
        let mut path = HashSet::new();
        for idx in self.probe(key) {
            path.insert(idx);
            if idx == deleted_at {
                break;
            }
        }

        self.iter()
            .filter(|&(idx, other, _)| {
                if other == key {
                    return false;
                }
                let other_home = self.hash1(other);
                other_home == home || (path.contains(&idx) && path.contains(&other_home))
            })
            .map(|(_, other, _)| other.to_owned())
            .collect()
    }
}

impl<V> Default for OpenAddressingTable<V> {
    fn default() -> Self {
        Self::new(DEFAULT_SIZE)
    }
}

impl<V: fmt::Debug> fmt::Debug for OpenAddressingTable<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpenAddressingTable")
            .field("size", &self.slots.len())
            .field("count", &self.count)
            .field("format", &self.format.to_string())
            .finish()
    }
}

impl<V> SegmentTable for OpenAddressingTable<V> {
    type Value = V;
    type Stats = OpenStats;

    fn key_format(&self) -> KeyFormat {
        self.format
    }

    fn size(&self) -> usize {
        self.slots.len()
    }

    fn len(&self) -> usize {
        self.count
    }

    fn segment_of(&self, key: &str) -> usize {
        self.hash1(key)
    }

    fn capacity_check(&self) -> CapacityCheck {
        let size = self.slots.len();
        if self.count >= size {
            return CapacityCheck::Refuse(CapacityLimit::Full { size });
        }
        let mut warnings = Vec::new();
        if self.count as f64 >= size as f64 * WARN_FILL_RATIO {
            warnings.push(CapacityWarning::HighFill {
                count: self.count,
                size,
            });
        }
        CapacityCheck::Proceed(warnings)
    }

    /// The hard limit is checked before the key is looked up, so a full
    /// table refuses updates of existing keys too.
    fn insert(&mut self, key: &str, value: V) -> Result<Insertion> {
        self.check_key(key)?;
        let warnings = match self.capacity_check() {
            CapacityCheck::Refuse(limit) => {
                log::debug!("refusing {key}: {limit}");
                return Err(TableError::CapacityExceeded(limit));
            }
            CapacityCheck::Proceed(warnings) => warnings,
        };

        if let Some(idx) = self.find_slot(key) {
            if let Slot::Occupied { value: v, .. } = &mut self.slots[idx] {
                *v = value;
            }
            log::trace!("updated {key} in slot {idx}");
            return Ok(Insertion {
                index: idx,
                kind: InsertKind::Updated,
                warnings,
            });
        }

        // The probe visits every slot and count < size here, so a vacant
        // slot always exists.
        let Some(idx) = self.find_vacant(key) else {
            debug_assert!(false, "no vacant slot for {key} below capacity");
            let limit = CapacityLimit::ProbeExhausted {
                size: self.slots.len(),
            };
            log::debug!("refusing {key}: {limit}");
            return Err(TableError::CapacityExceeded(limit));
        };

        self.slots[idx] = Slot::Occupied {
            key: key.to_owned(),
            value,
        };
        self.count += 1;
        log::trace!("inserted {key} into slot {idx} (home {})", self.hash1(key));
        for w in &warnings {
            log::warn!("{w}");
        }

        Ok(Insertion {
            index: idx,
            kind: InsertKind::Inserted,
            warnings,
        })
    }

    fn locate(&self, key: &str) -> Result<Option<Located<'_, V>>> {
        self.check_key(key)?;
        Ok(self.find_slot(key).and_then(|idx| {
            self.slots[idx].entry().map(|(key, value)| Located {
                index: idx,
                key,
                value,
            })
        }))
    }

    fn locate_by_index(&self, index: usize) -> Result<Vec<(&str, &V)>> {
        let size = self.slots.len();
        let slot = self
            .slots
            .get(index)
            .ok_or(TableError::OutOfRange { index, size })?;
        Ok(slot.entry().into_iter().collect())
    }

    fn delete(&mut self, key: &str) -> Result<Option<Deleted<V>>> {
        self.check_key(key)?;
        let Some(idx) = self.find_slot(key) else {
            log::debug!("delete of absent key {key}");
            return Ok(None);
        };

        let (key, value) = match core::mem::replace(&mut self.slots[idx], Slot::Tombstone) {
            Slot::Occupied { key, value } => (key, value),
            other => {
                self.slots[idx] = other;
                return Ok(None);
            }
        };
        self.count -= 1;

        let collisions = self.collisions(&key, idx);
        log::trace!(
            "deleted {key} from slot {idx}, {} colliding keys",
            collisions.len()
        );

        Ok(Some(Deleted {
            index: idx,
            key,
            value,
            collisions,
        }))
    }

    fn statistics(&self) -> OpenStats {
        let size = self.slots.len();
        let (mut filled, mut empty, mut tombstones) = (0, 0, 0);
        for slot in &self.slots {
            match slot {
                Slot::Empty => empty += 1,
                Slot::Tombstone => tombstones += 1,
                Slot::Occupied { .. } => filled += 1,
            }
        }
        OpenStats {
            size,
            filled,
            empty,
            tombstones,
            count: self.count,
            fill_percentage: filled as f64 / size as f64 * 100.0,
        }
    }

    fn rows(&self) -> Vec<Row<'_, V>> {
        self.slots
            .iter()
            .enumerate()
            .map(|(index, slot)| {
                let entry = slot.entry();
                Row {
                    index,
                    entry,
                    occupancy: usize::from(entry.is_some()),
                }
            })
            .collect()
    }

    fn reset(&mut self) {
        self.slots = empty_slots(self.slots.len());
        self.count = 0;
        log::info!("open addressing table reset ({} slots)", self.slots.len());
    }
}
