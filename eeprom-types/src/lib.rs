//! On-disk data structures and wire constants for EEPROM identity and
//! calibration storage.
//!
//! This crate defines the headers, TLV record layout, and property type
//! codes shared by the three datamodels (`firmux-fields`, `firmux-tlv`,
//! `legacy-tlv`). It purposefully omits business logic — compaction,
//! best-gap placement, codec dispatch, the registry — which lives in
//! `eeprom-core`.

pub mod error;
pub mod header;
pub mod pod;
pub mod property;
pub mod record;

pub use error::ParseError;
