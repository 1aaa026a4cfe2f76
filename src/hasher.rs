//! Polynomial string hashing reduced modulo the table size.

/// Folds a key left to right as `h = (h * base + code(c)) mod n`, where
/// `code` is the Unicode scalar value. Every intermediate value stays in
/// `[0, n)`, so the result is directly a segment index.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct PolynomialHasher {
    base: u64,
}

impl PolynomialHasher {
    /// Multiplier 31: probe start for open addressing and the bucket hash
    /// for chaining.
    pub const PRIMARY: PolynomialHasher = PolynomialHasher::new(31);
    /// Multiplier 37: probe step for open addressing.
    pub const SECONDARY: PolynomialHasher = PolynomialHasher::new(37);

    pub const fn new(base: u64) -> Self {
        Self { base }
    }

    pub fn base(&self) -> u64 {
        self.base
    }

    /// Hash `key` into `[0, modulus)`. `modulus` must be nonzero.
    pub fn hash(&self, key: &str, modulus: usize) -> usize {
        debug_assert!(modulus > 0, "hash modulus must be nonzero");
        let m = modulus as u128;
        let base = u128::from(self.base);
        key.chars()
            .fold(0u128, |h, c| (h * base + u128::from(u32::from(c))) % m) as usize
    }
}
