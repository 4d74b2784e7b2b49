//! Error type for bitset construction from external input.
//!
//! Only fallible construction paths report errors: loading a caller-supplied
//! word array and validating a [`GrowableConfig`](crate::GrowableConfig).
//! Misuse of an already-built bitset (setting an ID past a dense bitset's
//! size, combining bitsets of different widths) is a contract violation and
//! panics instead.
//!
//! The enum is `#[non_exhaustive]`; match with a fallback arm.

use std::fmt;

/// Errors from loading or configuring a bitset.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum BitSetError {
    /// The word array holds fewer words than `ceil(size / 64)`.
    ReprTooShort { got: usize, expected: usize },
    /// The requested bit count does not fit the target's ID space.
    SizeOverflow { bits: u64, max: u64 },
    /// A configuration field failed validation.
    InvalidConfig {
        field: &'static str,
        detail: &'static str,
    },
}

impl fmt::Display for BitSetError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ReprTooShort { got, expected } => {
                write!(f, "word array too short: {got} words (expected {expected})")
            }
            Self::SizeOverflow { bits, max } => {
                write!(f, "bit count {bits} exceeds maximum {max}")
            }
            Self::InvalidConfig { field, detail } => {
                write!(f, "invalid config `{field}`: {detail}")
            }
        }
    }
}

impl std::error::Error for BitSetError {}
