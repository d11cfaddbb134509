//! Errors raised while parsing or serializing on-disk data structures.

use core::fmt::{Debug, Display, Formatter};

/// An error when reading/parsing a fixed on-disk data structure.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ParseError {
    /// Data structure cannot be parsed because not enough input data was provided.
    InputTooSmall,
    /// Supposedly NUL terminated string data isn't NUL terminated.
    StringNotNullTerminated,
    /// Supposedly UTF-8 string data is not valid UTF-8.
    StringNotUtf8,
    /// A numeric field did not parse as an unsigned decimal.
    NotADecimal,
    /// A hex-encoded field (e.g. a MAC octet) failed to decode.
    InvalidHex,
}

impl Display for ParseError {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::InputTooSmall => f.write_str("input too small"),
            Self::StringNotNullTerminated => f.write_str("string data is not NUL terminated"),
            Self::StringNotUtf8 => f.write_str("string data not UTF-8"),
            Self::NotADecimal => f.write_str("field is not an unsigned decimal"),
            Self::InvalidHex => f.write_str("field is not valid hex"),
        }
    }
}

impl std::error::Error for ParseError {}
