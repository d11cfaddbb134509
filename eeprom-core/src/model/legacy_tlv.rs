//! The `legacy-tlv` datamodel: a read-mostly compatibility layout. TLV
//! records with an all-big-endian header and record length field, keyed by
//! [`LegacyTlvPropertyId`].

use eeprom_types::header::{LegacyTlvHeader, LEGACY_TLV_HEADER_LEN, LEGACY_TLV_VERSION};
use eeprom_types::property::LegacyTlvPropertyId;
use log::debug;

use crate::codec::{Codec, LzmaBinaryCodec, MacWithParamCodec, OpaqueBinaryCodec, TextCodec};
use crate::crc::checksum;
use crate::error::{with_key, EepromError, Result};
use crate::key::split_group_key;

const GROUP_PATTERN: &str = "GENERIC_MAC";

struct PropertyEntry {
    name: &'static str,
    id: LegacyTlvPropertyId,
    codec: &'static dyn Codec,
}

static PROPERTIES: &[PropertyEntry] = &[
    PropertyEntry { name: "PRODUCT_ID", id: LegacyTlvPropertyId::ProductId, codec: &TextCodec },
    PropertyEntry { name: "SERIAL_NO", id: LegacyTlvPropertyId::SerialNo, codec: &TextCodec },
    PropertyEntry { name: "PCB_NAME", id: LegacyTlvPropertyId::PcbName, codec: &TextCodec },
    PropertyEntry { name: "PCB_REVISION", id: LegacyTlvPropertyId::PcbRevision, codec: &TextCodec },
    PropertyEntry { name: "PCB_PRDATE", id: LegacyTlvPropertyId::PcbPrdate, codec: &TextCodec },
    PropertyEntry { name: "PCB_PRLOCATION", id: LegacyTlvPropertyId::PcbPrlocation, codec: &TextCodec },
    PropertyEntry { name: "PCB_SN", id: LegacyTlvPropertyId::PcbSn, codec: &TextCodec },
    PropertyEntry {
        name: "RADIO_CALIBRATION_DATA",
        id: LegacyTlvPropertyId::RadioCalibrationData,
        codec: &LzmaBinaryCodec,
    },
    PropertyEntry {
        name: "XTAL_CALIBRATION_DATA",
        id: LegacyTlvPropertyId::XtalCalibrationData,
        codec: &OpaqueBinaryCodec,
    },
];

fn find_property(name: &str) -> Option<&'static PropertyEntry> {
    PROPERTIES.iter().find(|p| p.name == name)
}

struct TlvStoreView<'a> {
    data: &'a [u8],
}

impl<'a> TlvStoreView<'a> {
    fn get(&self, ty: u8) -> Option<Vec<u8>> {
        use eeprom_types::record::{RECORD_HEADER_LEN, TLV_EMPTY, TLV_PAD};
        let last = self.data.len();
        let mut curr = 0usize;
        while curr + RECORD_HEADER_LEN < last {
            let t = self.data[curr];
            if t == TLV_EMPTY {
                return None;
            }
            if t == TLV_PAD {
                curr += 1;
                continue;
            }
            let len = u16::from_be_bytes([self.data[curr + 1], self.data[curr + 2]]) as usize;
            if t == ty {
                let start = curr + RECORD_HEADER_LEN;
                return Some(self.data[start..start + len].to_vec());
            }
            curr += RECORD_HEADER_LEN + len;
        }
        None
    }
}

/// An opened, validated `legacy-tlv` region. Read-mostly: `store`/`flush`
/// always refuse.
pub struct LegacyTlv<'a> {
    data: &'a mut [u8],
}

/// The outcome of inspecting a region's header without mutating it.
enum Recognition {
    /// Header magic matches and its checksum validates.
    Match,
    /// Header bytes are all erased; a fresh header would be written.
    Empty,
    Unrecognized,
}

/// Inspects `data` for a `legacy-tlv` header, read-only. Used both by
/// [`LegacyTlv::init`] and by the registry to decide whether this
/// datamodel should be tried without yet committing to opening it.
fn recognize(data: &[u8]) -> Result<Recognition> {
    if data.len() < LEGACY_TLV_HEADER_LEN {
        return Err(EepromError::State("region too small for legacy-tlv header"));
    }

    if LegacyTlvHeader::magic_matches(data) {
        let header = LegacyTlvHeader::parse(data).map_err(|e| EepromError::Integrity { reason: e.to_string() })?;
        let payload = &data[LEGACY_TLV_HEADER_LEN..];
        let len = header.totallen as usize;
        if len > payload.len() {
            return Err(EepromError::Integrity { reason: "stored length exceeds payload".into() });
        }
        let computed = checksum(&payload[..len]);
        if computed != header.crc32 {
            return Err(EepromError::Integrity {
                reason: format!("CRC mismatch: stored {:#x}, computed {:#x}", header.crc32, computed),
            });
        }
        return Ok(Recognition::Match);
    }

    if data[..LEGACY_TLV_HEADER_LEN].iter().all(|&b| b == 0xFF) {
        return Ok(Recognition::Empty);
    }

    Ok(Recognition::Unrecognized)
}

/// Whether a `legacy-tlv` open against `data` would succeed, without
/// mutating or holding any borrow past this call.
pub(crate) fn recognizes(data: &[u8]) -> Result<bool> {
    Ok(!matches!(recognize(data)?, Recognition::Unrecognized))
}

impl<'a> LegacyTlv<'a> {
    pub fn init(data: &'a mut [u8], force: bool) -> Result<Option<Self>> {
        if data.len() < LEGACY_TLV_HEADER_LEN {
            return Err(EepromError::State("region too small for legacy-tlv header"));
        }

        if force {
            debug!("legacy-tlv: forced region, reinitializing");
            let header = LegacyTlvHeader { version: LEGACY_TLV_VERSION, totallen: 0, crc32: checksum(&[]) };
            header.write(data);
            data[LEGACY_TLV_HEADER_LEN..].fill(0xFF);
            return Ok(Some(Self { data }));
        }

        match recognize(data)? {
            Recognition::Match => {
                debug!("legacy-tlv: recognized valid region");
                Ok(Some(Self { data }))
            }
            Recognition::Empty => {
                debug!("legacy-tlv: empty region, reinitializing");
                let header = LegacyTlvHeader { version: LEGACY_TLV_VERSION, totallen: 0, crc32: checksum(&[]) };
                header.write(data);
                data[LEGACY_TLV_HEADER_LEN..].fill(0xFF);
                Ok(Some(Self { data }))
            }
            Recognition::Unrecognized => {
                debug!("legacy-tlv: header not recognized");
                Ok(None)
            }
        }
    }

    fn scan_group(&self, tag: &str) -> Option<u8> {
        let view = TlvStoreView { data: &self.data[LEGACY_TLV_HEADER_LEN..] };
        let codec = MacWithParamCodec;
        for id in LegacyTlvPropertyId::MAC_FIRST..=LegacyTlvPropertyId::MAC_LAST {
            if let Some(value) = view.get(id) {
                if codec.format_param(&value).ok().as_deref() == Some(tag) {
                    return Some(id);
                }
            }
        }
        None
    }
}

impl<'a> super::Model for LegacyTlv<'a> {
    fn list(&self) -> Vec<String> {
        let mut names: Vec<String> = PROPERTIES.iter().map(|p| p.name.to_string()).collect();
        // The MAC slot range is advertised as one wildcard entry rather
        // than one row per tag.
        names.push(format!("{GROUP_PATTERN}*"));
        names
    }

    fn check(&self, key: &str, value: Option<&str>) -> Result<()> {
        if let Some(tag) = split_group_key(key, GROUP_PATTERN) {
            if let Some(v) = value {
                return MacWithParamCodec.parse_with_tag(v, tag).map(|_| ()).map_err(Into::into);
            }
            return Ok(());
        }
        let entry = find_property(key)
            .ok_or_else(|| EepromError::Schema { key: key.to_string(), reason: "unknown property".into() })?;
        if let Some(v) = value {
            entry.codec.parse(v).map_err(|e| with_key(e.into(), key))?;
        }
        Ok(())
    }

    fn print(&mut self, key: Option<&str>, out: Option<&str>) -> Result<i64> {
        let text = match key {
            None => {
                let mut buf = String::new();
                let view = TlvStoreView { data: &self.data[LEGACY_TLV_HEADER_LEN..] };
                for p in PROPERTIES {
                    if let Some(v) = view.get(p.id.raw()) {
                        let formatted = p.codec.format(&v).map_err(|e| with_key(e.into(), p.name))?;
                        buf.push_str(&format!("{}={}\n", p.name, formatted));
                    }
                }
                for id in LegacyTlvPropertyId::MAC_FIRST..=LegacyTlvPropertyId::MAC_LAST {
                    if let Some(v) = view.get(id) {
                        let tag = MacWithParamCodec.format_param(&v).unwrap_or_default();
                        let mac = MacWithParamCodec.format(&v).map_err(|e| with_key(e.into(), GROUP_PATTERN))?;
                        buf.push_str(&format!("{GROUP_PATTERN}_{tag}={mac}\n"));
                    }
                }
                buf
            }
            Some(k) => {
                if let Some(tag) = split_group_key(k, GROUP_PATTERN) {
                    let id = self.scan_group(tag).ok_or_else(|| EepromError::Schema {
                        key: k.to_string(),
                        reason: "no such interface tag".into(),
                    })?;
                    let view = TlvStoreView { data: &self.data[LEGACY_TLV_HEADER_LEN..] };
                    let value = view.get(id).expect("slot was just resolved as occupied");
                    MacWithParamCodec.format(&value).map_err(|e| with_key(e.into(), k))?
                } else {
                    let entry = find_property(k)
                        .ok_or_else(|| EepromError::Schema { key: k.to_string(), reason: "unknown property".into() })?;
                    let view = TlvStoreView { data: &self.data[LEGACY_TLV_HEADER_LEN..] };
                    match view.get(entry.id.raw()) {
                        Some(v) => entry.codec.format(&v).map_err(|e| with_key(e.into(), k))?,
                        None => return Ok(1),
                    }
                }
            }
        };

        match out {
            Some(path) if path.starts_with('@') => {
                std::fs::write(&path[1..], text.as_bytes())
                    .map_err(|source| EepromError::Io { path: path[1..].into(), source })?;
            }
            _ => print!("{text}"),
        }

        Ok(text.len() as i64)
    }

    fn store(&mut self, _key: &str, _value: &str) -> Result<()> {
        Err(EepromError::State("legacy-tlv is a read-mostly compatibility model; writes are refused"))
    }

    fn flush(&mut self) -> Result<()> {
        Err(EepromError::State("legacy-tlv is a read-mostly compatibility model; writes are refused"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Model;

    fn region(size: usize) -> Vec<u8> {
        vec![0xFFu8; size]
    }

    #[test]
    fn init_on_erased_region_yields_empty_valid_state() {
        let mut buf = region(256);
        assert!(LegacyTlv::init(&mut buf, false).unwrap().is_some());
    }

    #[test]
    fn store_is_refused() {
        let mut buf = region(256);
        let mut model = LegacyTlv::init(&mut buf, false).unwrap().unwrap();
        assert!(matches!(model.store("PRODUCT_ID", "x"), Err(EepromError::State(_))));
    }

    #[test]
    fn list_advertises_generic_mac_group() {
        let mut buf = region(256);
        let model = LegacyTlv::init(&mut buf, false).unwrap().unwrap();
        assert!(model.list().contains(&"GENERIC_MAC*".to_string()));
    }
}
