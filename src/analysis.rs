//! Hash distribution analysis: how evenly a table's home-segment hash
//! spreads a batch of keys.

use crate::key::KeyFormat;
use crate::table::SegmentTable;
use core::fmt;
use rand::Rng;
use std::collections::BTreeMap;
use std::io::{self, Write};

pub const CSV_HEADER: &str = "Сегмент,Количество_попаданий";

/// Keys generated by default, three per segment of a default open
/// addressing table.
pub const DEFAULT_KEY_COUNT: usize = 7500;

pub fn generate_keys<R: Rng + ?Sized>(format: KeyFormat, n: usize, rng: &mut R) -> Vec<String> {
    (0..n).map(|_| format.random_key(rng)).collect()
}

/// Per-segment hit counts for a batch of keys.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Distribution {
    hits: Vec<usize>,
    keys: usize,
}

impl Distribution {
    /// Count the home segment of every key. Keys are neither validated nor
    /// inserted.
    pub fn tally<'k, T, I>(table: &T, keys: I) -> Self
    where
        T: SegmentTable,
        I: IntoIterator<Item = &'k str>,
    {
        let mut hits = vec![0; table.size()];
        let mut n = 0;
        for key in keys {
            hits[table.segment_of(key)] += 1;
            n += 1;
            if n % 1000 == 0 {
                log::debug!("tallied {n} keys");
            }
        }
        Self { hits, keys: n }
    }

    pub fn size(&self) -> usize {
        self.hits.len()
    }

    pub fn keys(&self) -> usize {
        self.keys
    }

    pub fn hits(&self) -> &[usize] {
        &self.hits
    }

    pub fn filled(&self) -> usize {
        self.hits.iter().filter(|&&h| h > 0).count()
    }

    pub fn empty(&self) -> usize {
        self.size() - self.filled()
    }

    /// Smallest and largest hit count among segments hit at least once.
    pub fn min_max(&self) -> Option<(usize, usize)> {
        let mut hit = self.hits.iter().copied().filter(|&h| h > 0);
        let first = hit.next()?;
        Some(hit.fold((first, first), |(lo, hi), h| (lo.min(h), hi.max(h))))
    }

    /// Mean hits over segments hit at least once.
    pub fn mean_filled(&self) -> f64 {
        match self.filled() {
            0 => 0.0,
            filled => self.keys as f64 / filled as f64,
        }
    }

    /// Mean a perfectly uniform hash would give: keys per segment.
    pub fn expected_mean(&self) -> f64 {
        self.keys as f64 / self.size() as f64
    }

    /// Number of segments for each nonzero hit count.
    pub fn hit_histogram(&self) -> BTreeMap<usize, usize> {
        let mut by_hits = BTreeMap::new();
        for &h in self.hits.iter().filter(|&&h| h > 0) {
            *by_hits.entry(h).or_insert(0) += 1;
        }
        by_hits
    }

    /// One `segment,hits` row for every segment.
    pub fn write_csv<W: Write>(&self, mut out: W) -> io::Result<()> {
        writeln!(out, "{CSV_HEADER}")?;
        for (segment, hits) in self.hits.iter().enumerate() {
            writeln!(out, "{segment},{hits}")?;
        }
        out.flush()
    }
}

impl fmt::Display for Distribution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Segments:          {}", self.size())?;
        writeln!(f, "Keys:              {}", self.keys)?;
        writeln!(f, "Filled segments:   {}", self.filled())?;
        write!(f, "Empty segments:    {}", self.empty())?;
        let Some((min, max)) = self.min_max() else {
            return Ok(());
        };
        writeln!(f)?;
        writeln!(f, "Min hits per filled segment: {min}")?;
        writeln!(f, "Max hits per filled segment: {max}")?;
        writeln!(f, "Mean hits per filled segment: {:.2}", self.mean_filled())?;
        writeln!(f, "Expected mean: {:.2}", self.expected_mean())?;
        write!(f, "Segments by hit count:")?;
        for (hits, segments) in self.hit_histogram() {
            let pct = segments as f64 / self.size() as f64 * 100.0;
            write!(f, "\n  {hits} hits: {segments} segments ({pct:.2}%)")?;
        }
        Ok(())
    }
}
