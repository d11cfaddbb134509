//! Bidirectional converters between user-facing text and on-storage bytes.
//!
//! Every property a datamodel exposes names one of these as its codec. The
//! size-only queries (`parse_size`/`format_size`) exist so a caller can size
//! a buffer before committing to a full parse/format.

use thiserror::Error;

#[derive(Debug, Error, Eq, PartialEq)]
pub enum CodecError {
    #[error("expected {expected} bytes, got {actual}")]
    WrongLength { expected: usize, actual: usize },
    #[error("'{0}' is not a valid decimal triplet")]
    NotADateTriplet(String),
    #[error("'{0}' is not a valid MAC address")]
    NotAMacAddress(String),
    #[error("stored bytes are not valid UTF-8")]
    NotUtf8,
    #[error("interface tag is not NUL-terminated")]
    MissingTagTerminator,
    #[cfg(feature = "lzma")]
    #[error("LZMA error: {0}")]
    Lzma(String),
}

pub type Result<T> = std::result::Result<T, CodecError>;

pub trait Codec {
    fn parse(&self, input: &str) -> Result<Vec<u8>>;
    fn format(&self, stored: &[u8]) -> Result<String>;

    fn parse_size(&self, input: &str) -> Result<usize> {
        Ok(self.parse(input)?.len())
    }

    fn format_size(&self, stored: &[u8]) -> Result<usize> {
        Ok(self.format(stored)?.len())
    }
}

/// Verbatim byte copy in both directions.
#[derive(Debug, Default, Clone, Copy)]
pub struct TextCodec;

impl Codec for TextCodec {
    fn parse(&self, input: &str) -> Result<Vec<u8>> {
        Ok(input.as_bytes().to_vec())
    }

    fn format(&self, stored: &[u8]) -> Result<String> {
        let end = stored.iter().position(|&b| b == 0).unwrap_or(stored.len());
        String::from_utf8(stored[..end].to_vec()).map_err(|_| CodecError::NotUtf8)
    }
}

/// `"Y-M-D"` decimal triplet, stored as three raw bytes.
#[derive(Debug, Default, Clone, Copy)]
pub struct ByteTripletCodec;

impl Codec for ByteTripletCodec {
    fn parse(&self, input: &str) -> Result<Vec<u8>> {
        let parts: Vec<&str> = input.split('-').collect();
        if parts.len() != 3 {
            return Err(CodecError::NotADateTriplet(input.to_string()));
        }
        let mut out = Vec::with_capacity(3);
        for part in parts {
            let n: u8 = part
                .parse()
                .map_err(|_| CodecError::NotADateTriplet(input.to_string()))?;
            out.push(n);
        }
        Ok(out)
    }

    fn format(&self, stored: &[u8]) -> Result<String> {
        if stored.len() != 3 {
            return Err(CodecError::WrongLength { expected: 3, actual: stored.len() });
        }
        Ok(format!("{}-{}-{}", stored[0], stored[1], stored[2]))
    }
}

const MAC_LEN: usize = 6;

fn parse_mac_octets(input: &str) -> Result<[u8; MAC_LEN]> {
    let parts: Vec<&str> = input.split(':').collect();
    if parts.len() != MAC_LEN {
        return Err(CodecError::NotAMacAddress(input.to_string()));
    }
    let mut octets = [0u8; MAC_LEN];
    for (i, part) in parts.iter().enumerate() {
        octets[i] = u8::from_str_radix(part, 16).map_err(|_| CodecError::NotAMacAddress(input.to_string()))?;
    }
    Ok(octets)
}

fn format_mac_octets(octets: &[u8]) -> String {
    octets.iter().map(|b| format!("{b:02x}")).collect::<Vec<_>>().join(":")
}

/// Six colon-hex octets, `xx:xx:xx:xx:xx:xx`.
#[derive(Debug, Default, Clone, Copy)]
pub struct MacCodec;

impl Codec for MacCodec {
    fn parse(&self, input: &str) -> Result<Vec<u8>> {
        Ok(parse_mac_octets(input)?.to_vec())
    }

    fn format(&self, stored: &[u8]) -> Result<String> {
        if stored.len() != MAC_LEN {
            return Err(CodecError::WrongLength { expected: MAC_LEN, actual: stored.len() });
        }
        Ok(format_mac_octets(stored))
    }
}

/// A MAC address followed by a NUL-terminated interface tag, e.g.
/// `MAC_ADDR_eth0`'s stored value for the `eth0` slot.
#[derive(Debug, Default, Clone, Copy)]
pub struct MacWithParamCodec;

impl MacWithParamCodec {
    /// Parses the MAC and appends `tag` NUL-terminated, as stored on disk.
    pub fn parse_with_tag(&self, mac: &str, tag: &str) -> Result<Vec<u8>> {
        let octets = parse_mac_octets(mac)?;
        let mut out = Vec::with_capacity(MAC_LEN + tag.len() + 1);
        out.extend_from_slice(&octets);
        out.extend_from_slice(tag.as_bytes());
        out.push(0);
        Ok(out)
    }

    /// Extracts the interface tag from a stored `MAC_ADDR_<tag>` value.
    pub fn format_param(&self, stored: &[u8]) -> Result<String> {
        if stored.len() < MAC_LEN + 1 {
            return Err(CodecError::WrongLength { expected: MAC_LEN + 1, actual: stored.len() });
        }
        let tag_bytes = &stored[MAC_LEN..];
        if tag_bytes.last() != Some(&0) {
            return Err(CodecError::MissingTagTerminator);
        }
        String::from_utf8(tag_bytes[..tag_bytes.len() - 1].to_vec()).map_err(|_| CodecError::NotUtf8)
    }
}

impl Codec for MacWithParamCodec {
    fn parse(&self, input: &str) -> Result<Vec<u8>> {
        Ok(parse_mac_octets(input)?.to_vec())
    }

    fn format(&self, stored: &[u8]) -> Result<String> {
        if stored.len() < MAC_LEN {
            return Err(CodecError::WrongLength { expected: MAC_LEN, actual: stored.len() });
        }
        Ok(format_mac_octets(&stored[..MAC_LEN]))
    }
}

/// Raw binary blob. `parse`/`format` interpret `input`/`stored` as hex text
/// so the value can round-trip through a CLI argument.
#[derive(Debug, Default, Clone, Copy)]
pub struct OpaqueBinaryCodec;

impl Codec for OpaqueBinaryCodec {
    fn parse(&self, input: &str) -> Result<Vec<u8>> {
        hex_decode(input)
    }

    fn format(&self, stored: &[u8]) -> Result<String> {
        Ok(hex_encode(stored))
    }
}

fn hex_decode(input: &str) -> Result<Vec<u8>> {
    let input = input.strip_prefix("0x").unwrap_or(input);
    if input.len() % 2 != 0 {
        return Err(CodecError::NotAMacAddress(input.to_string()));
    }
    (0..input.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(&input[i..i + 2], 16).map_err(|_| CodecError::NotAMacAddress(input.to_string())))
        .collect()
}

fn hex_encode(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

/// LZMA-compressed binary blob (preset 9 + EXTREME, CRC-64 check) when the
/// `lzma` feature is enabled; otherwise behaves exactly like
/// [`OpaqueBinaryCodec`].
#[derive(Debug, Default, Clone, Copy)]
pub struct LzmaBinaryCodec;

#[cfg(feature = "lzma")]
impl Codec for LzmaBinaryCodec {
    fn parse(&self, input: &str) -> Result<Vec<u8>> {
        use std::io::Write;
        use xz2::stream::{Check, Stream};
        use xz2::write::XzEncoder;

        let raw = hex_decode(input)?;
        let stream = Stream::new_easy_encoder(9 | xz2::stream::PRESET_EXTREME, Check::Crc64)
            .map_err(|e| CodecError::Lzma(e.to_string()))?;
        let mut encoder = XzEncoder::new_stream(Vec::new(), stream);
        encoder.write_all(&raw).map_err(|e| CodecError::Lzma(e.to_string()))?;
        encoder.finish().map_err(|e| CodecError::Lzma(e.to_string()))
    }

    fn format(&self, stored: &[u8]) -> Result<String> {
        use std::io::Read;
        use xz2::read::XzDecoder;

        let mut decoder = XzDecoder::new(stored);
        let mut out = Vec::new();
        decoder.read_to_end(&mut out).map_err(|e| CodecError::Lzma(e.to_string()))?;
        Ok(hex_encode(&out))
    }
}

#[cfg(not(feature = "lzma"))]
impl Codec for LzmaBinaryCodec {
    fn parse(&self, input: &str) -> Result<Vec<u8>> {
        OpaqueBinaryCodec.parse(input)
    }

    fn format(&self, stored: &[u8]) -> Result<String> {
        OpaqueBinaryCodec.format(stored)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_codec_round_trips() {
        let c = TextCodec;
        let stored = c.parse("hello").unwrap();
        assert_eq!(c.format(&stored).unwrap(), "hello");
    }

    #[test]
    fn text_codec_format_stops_at_nul() {
        let c = TextCodec;
        assert_eq!(c.format(b"abc\0def").unwrap(), "abc");
    }

    #[test]
    fn byte_triplet_round_trips() {
        let c = ByteTripletCodec;
        let stored = c.parse("23-5-1").unwrap();
        assert_eq!(stored, vec![23, 5, 1]);
        assert_eq!(c.format(&stored).unwrap(), "23-5-1");
    }

    #[test]
    fn byte_triplet_rejects_malformed_input() {
        let c = ByteTripletCodec;
        assert!(c.parse("23-5").is_err());
        assert!(c.parse("23-5-xx").is_err());
    }

    #[test]
    fn mac_codec_round_trips() {
        let c = MacCodec;
        let stored = c.parse("aa:bb:cc:dd:ee:ff").unwrap();
        assert_eq!(stored, vec![0xaa, 0xbb, 0xcc, 0xdd, 0xee, 0xff]);
        assert_eq!(c.format(&stored).unwrap(), "aa:bb:cc:dd:ee:ff");
    }

    #[test]
    fn mac_with_param_round_trips_tag() {
        let c = MacWithParamCodec;
        let stored = c.parse_with_tag("aa:bb:cc:dd:ee:ff", "eth0").unwrap();
        assert_eq!(stored.len(), 6 + 4 + 1);
        assert_eq!(c.format(&stored).unwrap(), "aa:bb:cc:dd:ee:ff");
        assert_eq!(c.format_param(&stored).unwrap(), "eth0");
    }

    #[test]
    fn opaque_binary_round_trips_hex() {
        let c = OpaqueBinaryCodec;
        let stored = c.parse("deadbeef").unwrap();
        assert_eq!(stored, vec![0xde, 0xad, 0xbe, 0xef]);
        assert_eq!(c.format(&stored).unwrap(), "deadbeef");
    }

    #[cfg(not(feature = "lzma"))]
    #[test]
    fn lzma_codec_falls_back_to_opaque_without_feature() {
        let c = LzmaBinaryCodec;
        let stored = c.parse("cafef00d").unwrap();
        assert_eq!(c.format(&stored).unwrap(), "cafef00d");
    }
}
