//! Storage headers for the three datamodels.
//!
//! Each header sits at offset 0 of the mapped region and is structurally
//! uniform (magic, optional version, CRC, optional payload length) but
//! differs in byte width and endianness per model. Parsing is done field
//! by field via [`crate::pod`] rather than by casting the mapped bytes to a
//! `#[repr(C)]` struct, since the region's alignment is whatever the OS
//! handed back from `mmap` and is not guaranteed to satisfy `u32`/`u16`
//! alignment requirements.

use crate::error::ParseError;
use crate::pod::{parse_be_u16, parse_be_u32, parse_ne_u32, write_be_u16, write_be_u32, write_ne_u32};

/// `firmux-fields`: `{ magic[8], crc: u32 big-endian }`.
pub const FIRMUX_FIELDS_MAGIC: &[u8; 8] = b"FXDMFLD1";
pub const FIRMUX_FIELDS_HEADER_LEN: usize = 12;

#[derive(Clone, Copy, Debug)]
pub struct FirmuxFieldsHeader {
    pub crc: u32,
}

impl FirmuxFieldsHeader {
    pub fn parse(data: &[u8]) -> Result<Self, ParseError> {
        let mut offset = 8;
        let crc = parse_be_u32(&mut offset, data)?;
        Ok(Self { crc })
    }

    pub fn write(&self, data: &mut [u8]) {
        data[0..8].copy_from_slice(FIRMUX_FIELDS_MAGIC);
        let mut offset = 8;
        write_be_u32(&mut offset, data, self.crc);
    }

    pub fn magic_matches(data: &[u8]) -> bool {
        data.len() >= 8 && &data[0..8] == FIRMUX_FIELDS_MAGIC
    }
}

/// `firmux-tlv`: `{ magic[7], version: u8, crc: u32, len: u32 }`, host order.
pub const FIRMUX_TLV_MAGIC: &[u8; 7] = b"FXDMTLV";
pub const FIRMUX_TLV_VERSION: u8 = 1;
pub const FIRMUX_TLV_HEADER_LEN: usize = 16;

#[derive(Clone, Copy, Debug)]
pub struct FirmuxTlvHeader {
    pub version: u8,
    pub crc: u32,
    pub len: u32,
}

impl FirmuxTlvHeader {
    pub fn parse(data: &[u8]) -> Result<Self, ParseError> {
        let version = *data.get(7).ok_or(ParseError::InputTooSmall)?;
        let mut offset = 8;
        let crc = parse_ne_u32(&mut offset, data)?;
        let len = parse_ne_u32(&mut offset, data)?;
        Ok(Self { version, crc, len })
    }

    pub fn write(&self, data: &mut [u8]) {
        data[0..7].copy_from_slice(FIRMUX_TLV_MAGIC);
        data[7] = self.version;
        let mut offset = 8;
        write_ne_u32(&mut offset, data, self.crc);
        write_ne_u32(&mut offset, data, self.len);
    }

    pub fn magic_matches(data: &[u8]) -> bool {
        data.len() >= 8 && &data[0..7] == FIRMUX_TLV_MAGIC && data[7] == FIRMUX_TLV_VERSION
    }
}

/// `legacy-tlv`: `{ magic[8] (incl. trailing NUL), version: u16be, totallen: u32be, crc32: u32be }`.
pub const LEGACY_TLV_MAGIC: &[u8; 8] = b"TLVeppr\0";
pub const LEGACY_TLV_VERSION: u16 = 1;
pub const LEGACY_TLV_HEADER_LEN: usize = 18;

#[derive(Clone, Copy, Debug)]
pub struct LegacyTlvHeader {
    pub version: u16,
    pub totallen: u32,
    pub crc32: u32,
}

impl LegacyTlvHeader {
    pub fn parse(data: &[u8]) -> Result<Self, ParseError> {
        let mut offset = 8;
        let version = parse_be_u16(&mut offset, data)?;
        let totallen = parse_be_u32(&mut offset, data)?;
        let crc32 = parse_be_u32(&mut offset, data)?;
        Ok(Self { version, totallen, crc32 })
    }

    pub fn write(&self, data: &mut [u8]) {
        data[0..8].copy_from_slice(LEGACY_TLV_MAGIC);
        let mut offset = 8;
        write_be_u16(&mut offset, data, self.version);
        write_be_u32(&mut offset, data, self.totallen);
        write_be_u32(&mut offset, data, self.crc32);
    }

    pub fn magic_matches(data: &[u8]) -> bool {
        data.len() >= 8 && &data[0..8] == LEGACY_TLV_MAGIC
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn firmux_tlv_header_round_trips() {
        let mut buf = [0u8; FIRMUX_TLV_HEADER_LEN];
        let header = FirmuxTlvHeader { version: 1, crc: 0xdead_beef, len: 42 };
        header.write(&mut buf);
        assert!(FirmuxTlvHeader::magic_matches(&buf));
        let parsed = FirmuxTlvHeader::parse(&buf).unwrap();
        assert_eq!(parsed.crc, 0xdead_beef);
        assert_eq!(parsed.len, 42);
    }

    #[test]
    fn legacy_tlv_header_round_trips() {
        let mut buf = [0u8; LEGACY_TLV_HEADER_LEN];
        let header = LegacyTlvHeader { version: 1, totallen: 9, crc32: 0x1234_5678 };
        header.write(&mut buf);
        assert!(LegacyTlvHeader::magic_matches(&buf));
        let parsed = LegacyTlvHeader::parse(&buf).unwrap();
        assert_eq!(parsed.totallen, 9);
        assert_eq!(parsed.crc32, 0x1234_5678);
    }

    #[test]
    fn firmux_fields_header_round_trips() {
        let mut buf = [0u8; FIRMUX_FIELDS_HEADER_LEN];
        let header = FirmuxFieldsHeader { crc: 7 };
        header.write(&mut buf);
        assert!(FirmuxFieldsHeader::magic_matches(&buf));
        assert_eq!(FirmuxFieldsHeader::parse(&buf).unwrap().crc, 7);
    }
}
