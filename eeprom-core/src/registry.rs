//! The protocol registry: probes datamodels against a region in a fixed
//! order and adopts the first that recognizes it.
//!
//! Descriptors are an explicit compile-time list (`descriptors()`) rather
//! than runtime self-registration, and the open region is an enum over
//! concrete model states rather than a boxed trait object, since the set of
//! datamodels is small, closed, and known up front.

use log::debug;

use crate::error::{EepromError, Result};
use crate::model::firmux_fields::{self, FirmuxFields};
use crate::model::firmux_tlv::{self, FirmuxTlv};
use crate::model::legacy_tlv::{self, LegacyTlv};
use crate::model::Model;

/// Which concrete datamodel a [`ModelHandle`] is currently holding.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Descriptor {
    FirmuxTlv,
    FirmuxFields,
    LegacyTlv,
}

/// The default datamodel: tried first, and the only one `Registry::open`
/// will force-reinitialize into.
pub const DEFAULT: Descriptor = Descriptor::FirmuxTlv;

/// Alternates tried, in order, when the default doesn't recognize the
/// region and the caller didn't request `force`.
pub const ALTERNATES: &[Descriptor] = &[Descriptor::FirmuxFields, Descriptor::LegacyTlv];

/// An open region bound to one concrete datamodel.
pub enum ModelHandle<'a> {
    FirmuxTlv(FirmuxTlv<'a>),
    FirmuxFields(FirmuxFields<'a>),
    LegacyTlv(LegacyTlv<'a>),
}

impl<'a> ModelHandle<'a> {
    pub fn descriptor(&self) -> Descriptor {
        match self {
            ModelHandle::FirmuxTlv(_) => Descriptor::FirmuxTlv,
            ModelHandle::FirmuxFields(_) => Descriptor::FirmuxFields,
            ModelHandle::LegacyTlv(_) => Descriptor::LegacyTlv,
        }
    }

    /// Flushes pending writes and consumes the handle.
    pub fn close(mut self) -> Result<()> {
        self.flush()
    }
}

impl<'a> Model for ModelHandle<'a> {
    fn list(&self) -> Vec<String> {
        match self {
            ModelHandle::FirmuxTlv(m) => m.list(),
            ModelHandle::FirmuxFields(m) => m.list(),
            ModelHandle::LegacyTlv(m) => m.list(),
        }
    }

    fn check(&self, key: &str, value: Option<&str>) -> Result<()> {
        match self {
            ModelHandle::FirmuxTlv(m) => m.check(key, value),
            ModelHandle::FirmuxFields(m) => m.check(key, value),
            ModelHandle::LegacyTlv(m) => m.check(key, value),
        }
    }

    fn print(&mut self, key: Option<&str>, out: Option<&str>) -> Result<i64> {
        match self {
            ModelHandle::FirmuxTlv(m) => m.print(key, out),
            ModelHandle::FirmuxFields(m) => m.print(key, out),
            ModelHandle::LegacyTlv(m) => m.print(key, out),
        }
    }

    fn store(&mut self, key: &str, value: &str) -> Result<()> {
        match self {
            ModelHandle::FirmuxTlv(m) => m.store(key, value),
            ModelHandle::FirmuxFields(m) => m.store(key, value),
            ModelHandle::LegacyTlv(m) => m.store(key, value),
        }
    }

    fn flush(&mut self) -> Result<()> {
        match self {
            ModelHandle::FirmuxTlv(m) => m.flush(),
            ModelHandle::FirmuxFields(m) => m.flush(),
            ModelHandle::LegacyTlv(m) => m.flush(),
        }
    }
}

fn try_init(descriptor: Descriptor, data: &mut [u8], force: bool) -> Result<Option<ModelHandle<'_>>> {
    match descriptor {
        Descriptor::FirmuxTlv => Ok(FirmuxTlv::init(data, force)?.map(ModelHandle::FirmuxTlv)),
        Descriptor::FirmuxFields => Ok(FirmuxFields::init(data, force)?.map(ModelHandle::FirmuxFields)),
        Descriptor::LegacyTlv => Ok(LegacyTlv::init(data, force)?.map(ModelHandle::LegacyTlv)),
    }
}

/// Whether `descriptor` would successfully open `data`, checked read-only
/// so the decision doesn't hold any borrow of `data` past this call.
fn recognizes(descriptor: Descriptor, data: &[u8]) -> Result<bool> {
    match descriptor {
        Descriptor::FirmuxTlv => firmux_tlv::recognizes(data),
        Descriptor::FirmuxFields => firmux_fields::recognizes(data),
        Descriptor::LegacyTlv => legacy_tlv::recognizes(data),
    }
}

/// Tries the default datamodel first; if it doesn't recognize the region
/// and `force` is `false`, tries each alternate in order. `force` always
/// reinitializes as the default model and never falls through to
/// alternates.
///
/// The region is probed (read-only, via `recognizes`) before committing to
/// a single `try_init` call on whichever descriptor matched, so no handle
/// is ever reborrowed across the probe loop: each `recognizes` call's
/// borrow of `data` ends before the next one begins, and `try_init` runs
/// exactly once for the chosen descriptor.
pub fn open(data: &mut [u8], force: bool) -> Result<ModelHandle<'_>> {
    if force {
        debug!("registry: forcing reinitialization as the default datamodel");
        return try_init(DEFAULT, data, true)?
            .ok_or_else(|| EepromError::Integrity { reason: "default datamodel refused forced reinitialization".into() });
    }

    debug!("registry: probing default datamodel");
    if recognizes(DEFAULT, data)? {
        return Ok(try_init(DEFAULT, data, false)?.expect("recognizes(DEFAULT) guarantees try_init succeeds"));
    }

    for &descriptor in ALTERNATES {
        debug!("registry: probing alternate datamodel {descriptor:?}");
        if recognizes(descriptor, data)? {
            return Ok(try_init(descriptor, data, false)?.expect("recognizes(descriptor) guarantees try_init succeeds"));
        }
    }

    Err(EepromError::Integrity { reason: "no registered datamodel recognizes this region".into() })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn erased_region_opens_as_default_model() {
        let mut buf = vec![0xFFu8; 512];
        let handle = open(&mut buf, false).unwrap();
        assert_eq!(handle.descriptor(), Descriptor::FirmuxTlv);
    }

    #[test]
    fn force_reinitializes_as_default_model() {
        let mut buf = vec![0x00u8; 512];
        let handle = open(&mut buf, true).unwrap();
        assert_eq!(handle.descriptor(), Descriptor::FirmuxTlv);
    }

    #[test]
    fn unrecognized_non_empty_region_is_an_integrity_error() {
        let mut buf = vec![0x42u8; 512];
        assert!(matches!(open(&mut buf, false), Err(EepromError::Integrity { .. })));
    }
}
