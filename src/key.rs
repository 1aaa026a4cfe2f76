//! Key formats: fixed-width patterns of digit and uppercase-letter positions.

use core::fmt;
use rand::Rng;

/// Character class accepted at one key position.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum CharClass {
    /// ASCII `0-9`.
    Digit,
    /// ASCII `A-Z`.
    Upper,
}

impl CharClass {
    #[inline]
    pub fn matches(self, c: char) -> bool {
        match self {
            CharClass::Digit => c.is_ascii_digit(),
            CharClass::Upper => c.is_ascii_uppercase(),
        }
    }

    fn sample<R: Rng + ?Sized>(self, rng: &mut R) -> char {
        match self {
            CharClass::Digit => char::from(rng.random_range(b'0'..=b'9')),
            CharClass::Upper => char::from(rng.random_range(b'A'..=b'Z')),
        }
    }

    fn symbol(self) -> char {
        match self {
            CharClass::Digit => 'd',
            CharClass::Upper => 'L',
        }
    }
}

/// A compiled key pattern. Matching is anchored at both ends, so a key is
/// valid only if it has exactly one character per class, each in its class.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct KeyFormat {
    classes: &'static [CharClass],
}

use CharClass::{Digit, Upper};

impl KeyFormat {
    /// `dddLdd`: three digits, one letter, two digits (e.g. `123A45`).
    pub const DIGITS_LETTER_DIGITS: KeyFormat =
        KeyFormat::new(&[Digit, Digit, Digit, Upper, Digit, Digit]);

    /// `dLLLLd`: one digit, four letters, one digit (e.g. `1ABCD2`).
    pub const DIGIT_LETTERS_DIGIT: KeyFormat =
        KeyFormat::new(&[Digit, Upper, Upper, Upper, Upper, Digit]);

    pub const fn new(classes: &'static [CharClass]) -> Self {
        Self { classes }
    }

    pub fn classes(&self) -> &'static [CharClass] {
        self.classes
    }

    /// Number of characters a valid key has.
    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }

    pub fn validate(&self, key: &str) -> bool {
        let mut chars = key.chars();
        for class in self.classes {
            match chars.next() {
                Some(c) if class.matches(c) => {}
                _ => return false,
            }
        }
        chars.next().is_none()
    }

    /// A uniformly random key matching this format.
    pub fn random_key<R: Rng + ?Sized>(&self, rng: &mut R) -> String {
        self.classes.iter().map(|class| class.sample(rng)).collect()
    }

    /// Smallest key of the format: `0` for digits and `A` for letters.
    pub fn example(&self) -> String {
        self.classes
            .iter()
            .map(|class| match class {
                CharClass::Digit => '0',
                CharClass::Upper => 'A',
            })
            .collect()
    }
}

impl fmt::Display for KeyFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for class in self.classes {
            write!(f, "{}", class.symbol())?;
        }
        Ok(())
    }
}
