//! The crate-wide error taxonomy.
//!
//! Every public fallible function in this crate returns [`Result<T>`]
//! (an alias for `std::result::Result<T, EepromError>`). Component-local
//! errors ([`crate::codec::CodecError`], [`crate::tlv::TlvError`]) convert
//! into [`EepromError`] via `From` at the point where they cross into the
//! datamodel layer.

use std::path::PathBuf;
use thiserror::Error;

use crate::codec::CodecError;
use crate::tlv::TlvError;

pub type Result<T> = std::result::Result<T, EepromError>;

#[derive(Debug, Error)]
pub enum EepromError {
    #[error("I/O error on '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to memory-map '{path}': {source}")]
    Mmap {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Unknown key, unknown group parameter, or a value that doesn't parse
    /// for its declared codec. Non-fatal to the store; only the offending
    /// operation fails.
    #[error("'{key}': {reason}")]
    Schema { key: String, reason: String },

    #[error("no space left to store '{key}' ({needed} bytes needed)")]
    Capacity { key: String, needed: usize },

    #[error("storage integrity check failed: {reason}")]
    Integrity { reason: String },

    #[error("invalid operation: {0}")]
    State(&'static str),
}

impl From<CodecError> for EepromError {
    fn from(err: CodecError) -> Self {
        EepromError::Schema { key: String::new(), reason: err.to_string() }
    }
}

impl From<TlvError> for EepromError {
    fn from(err: TlvError) -> Self {
        match err {
            TlvError::NoSpace { needed } => EepromError::Capacity { key: String::new(), needed },
            TlvError::AlreadyExists | TlvError::NotFound => {
                EepromError::State("TLV record already exists or is missing")
            }
        }
    }
}

/// Attaches a property key to an [`EepromError`] that was built without one
/// (codec and TLV errors are raised before the calling key is in scope).
pub(crate) fn with_key(mut err: EepromError, key: &str) -> EepromError {
    match &mut err {
        EepromError::Schema { key: k, .. } | EepromError::Capacity { key: k, .. } => {
            if k.is_empty() {
                *k = key.to_string();
            }
        }
        _ => {}
    }
    err
}
