use core::fmt;

/// Hard limit that refused an insertion.
#[derive(Clone, Debug, PartialEq)]
pub enum CapacityLimit {
    /// Open addressing: every slot is occupied.
    Full { size: usize },
    /// Open addressing: the probe sequence held no reusable slot. Cannot
    /// happen below capacity while the probe step is coprime with the size.
    ProbeExhausted { size: usize },
    /// Chaining: average chain length over nonempty buckets is too high.
    ChainTooLong { avg_chain_length: f64 },
    /// Chaining: every bucket is in use and chains are long.
    Saturated { avg_chain_length: f64 },
}

/// Errors reported by table operations. A missing key is not an error;
/// lookups and deletions report it as `Ok(None)`.
#[derive(Clone, Debug, PartialEq)]
pub enum TableError {
    /// Key does not match the table's key format
    InvalidKey(String),

    /// Insertion refused, table unchanged
    CapacityExceeded(CapacityLimit),

    /// Segment index outside `[0, size)`
    OutOfRange { index: usize, size: usize },
}

impl fmt::Display for CapacityLimit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CapacityLimit::Full { size } => write!(f, "all {size} slots are occupied"),
            CapacityLimit::ProbeExhausted { size } => {
                write!(f, "probe sequence of {size} slots has no free slot")
            }
            CapacityLimit::ChainTooLong { avg_chain_length } => {
                write!(f, "average chain length {avg_chain_length:.2} is too long")
            }
            CapacityLimit::Saturated { avg_chain_length } => write!(
                f,
                "every bucket is in use with average chain length {avg_chain_length:.2}"
            ),
        }
    }
}

impl fmt::Display for TableError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TableError::InvalidKey(key) => write!(f, "invalid key format: {key:?}"),
            TableError::CapacityExceeded(limit) => write!(f, "table overflow: {limit}"),
            TableError::OutOfRange { index, size } => {
                write!(f, "segment {index} out of range 0..{size}")
            }
        }
    }
}

impl std::error::Error for TableError {}

/// Table operation result
pub type Result<T> = std::result::Result<T, TableError>;
