//! TLV property type codes for the two TLV-based datamodels.
//!
//! Each enum is the wire vocabulary for one datamodel's scalar properties.
//! MAC group slots are *not* enumerated as individual variants: a group is
//! addressed by a contiguous `[first, last]` range of raw type bytes (see
//! the `MAC_FIRST`/`MAC_LAST` associated constants), resolved at the model
//! layer rather than the wire-type layer.

use num_enum::FromPrimitive;

/// Scalar property type codes for the `firmux-tlv` datamodel.
#[derive(Copy, Clone, Debug, Eq, PartialEq, FromPrimitive)]
#[repr(u8)]
pub enum FirmuxTlvPropertyId {
    ProductId = 1,
    ProductName = 2,
    SerialNo = 3,
    PcbName = 16,
    PcbRevision = 17,
    PcbPrdate = 18,
    PcbPrlocation = 19,
    PcbSn = 20,
    XtalCaldata = 240,
    RadioCaldata = 241,
    RadioBrddata = 242,
    #[num_enum(catch_all)]
    Unknown(u8),
}

impl FirmuxTlvPropertyId {
    /// First type code in the `MAC_ADDR_*` slot range (inclusive).
    pub const MAC_FIRST: u8 = 128;
    /// Last type code in the `MAC_ADDR_*` slot range (inclusive).
    pub const MAC_LAST: u8 = 143;

    pub fn raw(self) -> u8 {
        u8::from(self)
    }
}

impl From<FirmuxTlvPropertyId> for u8 {
    fn from(id: FirmuxTlvPropertyId) -> u8 {
        match id {
            FirmuxTlvPropertyId::ProductId => 1,
            FirmuxTlvPropertyId::ProductName => 2,
            FirmuxTlvPropertyId::SerialNo => 3,
            FirmuxTlvPropertyId::PcbName => 16,
            FirmuxTlvPropertyId::PcbRevision => 17,
            FirmuxTlvPropertyId::PcbPrdate => 18,
            FirmuxTlvPropertyId::PcbPrlocation => 19,
            FirmuxTlvPropertyId::PcbSn => 20,
            FirmuxTlvPropertyId::XtalCaldata => 240,
            FirmuxTlvPropertyId::RadioCaldata => 241,
            FirmuxTlvPropertyId::RadioBrddata => 242,
            FirmuxTlvPropertyId::Unknown(v) => v,
        }
    }
}

/// Scalar property type codes for the `legacy-tlv` compatibility datamodel.
#[derive(Copy, Clone, Debug, Eq, PartialEq, FromPrimitive)]
#[repr(u8)]
pub enum LegacyTlvPropertyId {
    ProductId = 1,
    SerialNo = 2,
    PcbName = 16,
    PcbRevision = 17,
    PcbPrdate = 18,
    PcbPrlocation = 19,
    PcbSn = 20,
    RadioCalibrationData = 240,
    XtalCalibrationData = 241,
    #[num_enum(catch_all)]
    Unknown(u8),
}

impl LegacyTlvPropertyId {
    pub const MAC_FIRST: u8 = 224;
    pub const MAC_LAST: u8 = 239;

    pub fn raw(self) -> u8 {
        u8::from(self)
    }
}

impl From<LegacyTlvPropertyId> for u8 {
    fn from(id: LegacyTlvPropertyId) -> u8 {
        match id {
            LegacyTlvPropertyId::ProductId => 1,
            LegacyTlvPropertyId::SerialNo => 2,
            LegacyTlvPropertyId::PcbName => 16,
            LegacyTlvPropertyId::PcbRevision => 17,
            LegacyTlvPropertyId::PcbPrdate => 18,
            LegacyTlvPropertyId::PcbPrlocation => 19,
            LegacyTlvPropertyId::PcbSn => 20,
            LegacyTlvPropertyId::RadioCalibrationData => 240,
            LegacyTlvPropertyId::XtalCalibrationData => 241,
            LegacyTlvPropertyId::Unknown(v) => v,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_type_codes_round_trip() {
        assert_eq!(FirmuxTlvPropertyId::from(200).raw(), 200);
        assert!(matches!(
            FirmuxTlvPropertyId::from(200),
            FirmuxTlvPropertyId::Unknown(200)
        ));
    }

    #[test]
    fn known_type_codes_resolve() {
        assert_eq!(FirmuxTlvPropertyId::from(1), FirmuxTlvPropertyId::ProductId);
        assert_eq!(LegacyTlvPropertyId::from(240), LegacyTlvPropertyId::RadioCalibrationData);
    }

    #[test]
    fn mac_ranges_dont_overlap_scalar_ids() {
        assert!(FirmuxTlvPropertyId::MAC_FIRST > 242 - 1 || FirmuxTlvPropertyId::MAC_FIRST > 20);
        assert_eq!(LegacyTlvPropertyId::MAC_LAST - LegacyTlvPropertyId::MAC_FIRST, 15);
    }
}
