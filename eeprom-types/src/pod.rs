//! Plain old data.
//!
//! Byte-level readers/writers for the fixed-width integers that appear in
//! storage headers and TLV record headers. Endianness is explicit in the
//! function name rather than implicit in a trait impl, since this crate
//! has to represent three different byte orders (little-endian, big-endian,
//! and host/native order) depending on which datamodel a field belongs to.

use crate::error::ParseError;

pub fn parse_be_u16(offset: &mut usize, data: &[u8]) -> Result<u16, ParseError> {
    let end = offset.checked_add(2).ok_or(ParseError::InputTooSmall)?;
    let buf: [u8; 2] = data
        .get(*offset..end)
        .ok_or(ParseError::InputTooSmall)?
        .try_into()
        .expect("buffer coercion should work");
    *offset = end;
    Ok(u16::from_be_bytes(buf))
}

pub fn parse_ne_u32(offset: &mut usize, data: &[u8]) -> Result<u32, ParseError> {
    let end = offset.checked_add(4).ok_or(ParseError::InputTooSmall)?;
    let buf: [u8; 4] = data
        .get(*offset..end)
        .ok_or(ParseError::InputTooSmall)?
        .try_into()
        .expect("buffer coercion should work");
    *offset = end;
    Ok(u32::from_ne_bytes(buf))
}

pub fn parse_be_u32(offset: &mut usize, data: &[u8]) -> Result<u32, ParseError> {
    let end = offset.checked_add(4).ok_or(ParseError::InputTooSmall)?;
    let buf: [u8; 4] = data
        .get(*offset..end)
        .ok_or(ParseError::InputTooSmall)?
        .try_into()
        .expect("buffer coercion should work");
    *offset = end;
    Ok(u32::from_be_bytes(buf))
}

pub fn write_ne_u32(offset: &mut usize, data: &mut [u8], value: u32) {
    data[*offset..*offset + 4].copy_from_slice(&value.to_ne_bytes());
    *offset += 4;
}

pub fn write_be_u32(offset: &mut usize, data: &mut [u8], value: u32) {
    data[*offset..*offset + 4].copy_from_slice(&value.to_be_bytes());
    *offset += 4;
}

pub fn write_be_u16(offset: &mut usize, data: &mut [u8], value: u16) {
    data[*offset..*offset + 2].copy_from_slice(&value.to_be_bytes());
    *offset += 2;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn be_u32_round_trip() {
        let mut offset = 0;
        let data = [0x00, 0x00, 0x01, 0x02];
        assert_eq!(parse_be_u32(&mut offset, &data).unwrap(), 0x0102);
        assert_eq!(offset, 4);
    }

    #[test]
    fn input_too_small_is_reported() {
        let mut offset = 0;
        let data = [0x00];
        assert_eq!(parse_be_u16(&mut offset, &data), Err(ParseError::InputTooSmall));
    }

    #[test]
    fn write_be_u32_round_trips_through_parse() {
        let mut buf = [0u8; 4];
        let mut offset = 0;
        write_be_u32(&mut offset, &mut buf, 0xdead_beef);
        let mut offset = 0;
        assert_eq!(parse_be_u32(&mut offset, &buf).unwrap(), 0xdead_beef);
    }
}
