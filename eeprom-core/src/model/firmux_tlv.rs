//! The `firmux-tlv` datamodel: the registry's default. TLV records with a
//! host-byte-order header, keyed by [`FirmuxTlvPropertyId`].

use eeprom_types::header::{FirmuxTlvHeader, FIRMUX_TLV_HEADER_LEN, FIRMUX_TLV_VERSION};
use eeprom_types::property::FirmuxTlvPropertyId;
use eeprom_types::record::LengthEndian;
use log::debug;

use crate::codec::{ByteTripletCodec, Codec, LzmaBinaryCodec, MacWithParamCodec, OpaqueBinaryCodec, TextCodec};
use crate::crc::checksum;
use crate::error::{with_key, EepromError, Result};
use crate::key::split_group_key;
use crate::tlv::TlvStore;

const GROUP_PATTERN: &str = "MAC_ADDR";

struct PropertyEntry {
    name: &'static str,
    id: FirmuxTlvPropertyId,
    codec: &'static dyn Codec,
}

static PROPERTIES: &[PropertyEntry] = &[
    PropertyEntry { name: "PRODUCT_ID", id: FirmuxTlvPropertyId::ProductId, codec: &TextCodec },
    PropertyEntry { name: "PRODUCT_NAME", id: FirmuxTlvPropertyId::ProductName, codec: &TextCodec },
    PropertyEntry { name: "SERIAL_NO", id: FirmuxTlvPropertyId::SerialNo, codec: &TextCodec },
    PropertyEntry { name: "PCB_NAME", id: FirmuxTlvPropertyId::PcbName, codec: &TextCodec },
    PropertyEntry { name: "PCB_REVISION", id: FirmuxTlvPropertyId::PcbRevision, codec: &TextCodec },
    PropertyEntry { name: "PCB_PRDATE", id: FirmuxTlvPropertyId::PcbPrdate, codec: &ByteTripletCodec },
    PropertyEntry { name: "PCB_PRLOCATION", id: FirmuxTlvPropertyId::PcbPrlocation, codec: &TextCodec },
    PropertyEntry { name: "PCB_SN", id: FirmuxTlvPropertyId::PcbSn, codec: &TextCodec },
    PropertyEntry { name: "XTAL_CALDATA", id: FirmuxTlvPropertyId::XtalCaldata, codec: &OpaqueBinaryCodec },
    PropertyEntry { name: "RADIO_CALDATA", id: FirmuxTlvPropertyId::RadioCaldata, codec: &LzmaBinaryCodec },
    PropertyEntry { name: "RADIO_BRDDATA", id: FirmuxTlvPropertyId::RadioBrddata, codec: &LzmaBinaryCodec },
];

fn find_property(name: &str) -> Option<&'static PropertyEntry> {
    PROPERTIES.iter().find(|p| p.name == name)
}

/// An opened, validated `firmux-tlv` region.
pub struct FirmuxTlv<'a> {
    data: &'a mut [u8],
    dirty: bool,
}

/// The outcome of inspecting a region's header without mutating it.
enum Recognition {
    /// Header magic matches and its checksum validates.
    Match,
    /// Header bytes are all erased; a fresh header would be written.
    Empty,
    Unrecognized,
}

/// Inspects `data` for a `firmux-tlv` header, read-only. Used both by
/// [`FirmuxTlv::init`] and by the registry to decide whether this
/// datamodel should be tried without yet committing to opening it.
fn recognize(data: &[u8]) -> Result<Recognition> {
    if data.len() < FIRMUX_TLV_HEADER_LEN {
        return Err(EepromError::State("region too small for firmux-tlv header"));
    }

    if FirmuxTlvHeader::magic_matches(data) {
        let header = FirmuxTlvHeader::parse(data).map_err(|e| EepromError::Integrity { reason: e.to_string() })?;
        let payload = &data[FIRMUX_TLV_HEADER_LEN..];
        let len = header.len as usize;
        if len > payload.len() {
            return Err(EepromError::Integrity { reason: "stored length exceeds payload".into() });
        }
        let computed = checksum(&payload[..len]);
        if computed != header.crc {
            return Err(EepromError::Integrity {
                reason: format!("CRC mismatch: stored {:#x}, computed {:#x}", header.crc, computed),
            });
        }
        return Ok(Recognition::Match);
    }

    if data[..FIRMUX_TLV_HEADER_LEN].iter().all(|&b| b == 0xFF) {
        return Ok(Recognition::Empty);
    }

    Ok(Recognition::Unrecognized)
}

/// Whether a `firmux-tlv` open against `data` would succeed, without
/// mutating or holding any borrow past this call.
pub(crate) fn recognizes(data: &[u8]) -> Result<bool> {
    Ok(!matches!(recognize(data)?, Recognition::Unrecognized))
}

impl<'a> FirmuxTlv<'a> {
    /// Attempts to recognize and validate `data` as a `firmux-tlv` region.
    /// Returns `Ok(None)` (not `Err`) when the header doesn't match and
    /// isn't empty, so the registry can try the next model.
    pub fn init(data: &'a mut [u8], force: bool) -> Result<Option<Self>> {
        if data.len() < FIRMUX_TLV_HEADER_LEN {
            return Err(EepromError::State("region too small for firmux-tlv header"));
        }

        if force {
            debug!("firmux-tlv: forced region, reinitializing");
            let header = FirmuxTlvHeader { version: FIRMUX_TLV_VERSION, crc: checksum(&[]), len: 0 };
            header.write(data);
            data[FIRMUX_TLV_HEADER_LEN..].fill(0xFF);
            return Ok(Some(Self { data, dirty: false }));
        }

        match recognize(data)? {
            Recognition::Match => {
                debug!("firmux-tlv: recognized valid region");
                Ok(Some(Self { data, dirty: false }))
            }
            Recognition::Empty => {
                debug!("firmux-tlv: empty region, reinitializing");
                let header = FirmuxTlvHeader { version: FIRMUX_TLV_VERSION, crc: checksum(&[]), len: 0 };
                header.write(data);
                data[FIRMUX_TLV_HEADER_LEN..].fill(0xFF);
                Ok(Some(Self { data, dirty: false }))
            }
            Recognition::Unrecognized => {
                debug!("firmux-tlv: header not recognized");
                Ok(None)
            }
        }
    }

    fn store_inner(&mut self) -> TlvStore<'_> {
        TlvStore::new(&mut self.data[FIRMUX_TLV_HEADER_LEN..], LengthEndian::Host)
    }

    fn scan_group(&self, tag: &str) -> Option<u8> {
        let view = TlvStoreView { data: &self.data[FIRMUX_TLV_HEADER_LEN..] };
        let codec = MacWithParamCodec;
        for id in FirmuxTlvPropertyId::MAC_FIRST..=FirmuxTlvPropertyId::MAC_LAST {
            if let Some(value) = view.get(id) {
                if codec.format_param(&value).ok().as_deref() == Some(tag) {
                    return Some(id);
                }
            }
        }
        None
    }

    fn first_free_group_slot(&self) -> Option<u8> {
        let view = TlvStoreView { data: &self.data[FIRMUX_TLV_HEADER_LEN..] };
        (FirmuxTlvPropertyId::MAC_FIRST..=FirmuxTlvPropertyId::MAC_LAST).find(|&id| view.get(id).is_none())
    }
}

/// A read-only scan helper mirroring `TlvStore::find`/`get` without needing
/// a mutable borrow, used by group resolution so it can run alongside other
/// immutable lookups.
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
            let len = u16::from_ne_bytes([self.data[curr + 1], self.data[curr + 2]]) as usize;
            if t == ty {
                let start = curr + RECORD_HEADER_LEN;
                return Some(self.data[start..start + len].to_vec());
            }
            curr += RECORD_HEADER_LEN + len;
        }
        None
    }
}

impl<'a> super::Model for FirmuxTlv<'a> {
    fn list(&self) -> Vec<String> {
        let mut names: Vec<String> = PROPERTIES.iter().map(|p| p.name.to_string()).collect();
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

        let entry = find_property(key).ok_or_else(|| EepromError::Schema { key: key.to_string(), reason: "unknown property".into() })?;
        if let Some(v) = value {
            entry.codec.parse(v).map_err(|e| with_key(e.into(), key))?;
        }
        Ok(())
    }

    fn print(&mut self, key: Option<&str>, out: Option<&str>) -> Result<i64> {
        let text = match key {
            None => {
                let mut buf = String::new();
                let view = TlvStoreView { data: &self.data[FIRMUX_TLV_HEADER_LEN..] };
                for p in PROPERTIES {
                    if let Some(v) = view.get(p.id.raw()) {
                        let formatted = p.codec.format(&v).map_err(|e| with_key(e.into(), p.name))?;
                        buf.push_str(&format!("{}={}\n", p.name, formatted));
                    }
                }
                for id in FirmuxTlvPropertyId::MAC_FIRST..=FirmuxTlvPropertyId::MAC_LAST {
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
                    let id = self
                        .scan_group(tag)
                        .ok_or_else(|| EepromError::Schema { key: k.to_string(), reason: "no such interface tag".into() })?;
                    let view = TlvStoreView { data: &self.data[FIRMUX_TLV_HEADER_LEN..] };
                    let value = view.get(id).expect("slot was just resolved as occupied");
                    MacWithParamCodec.format(&value).map_err(|e| with_key(e.into(), k))?
                } else {
                    let entry = find_property(k).ok_or_else(|| EepromError::Schema { key: k.to_string(), reason: "unknown property".into() })?;
                    let view = TlvStoreView { data: &self.data[FIRMUX_TLV_HEADER_LEN..] };
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

    fn store(&mut self, key: &str, value: &str) -> Result<()> {
        let input = if let Some(path) = value.strip_prefix('@') {
            String::from_utf8(
                std::fs::read(path).map_err(|source| EepromError::Io { path: path.into(), source })?,
            )
            .map_err(|_| EepromError::Schema { key: key.to_string(), reason: "file is not valid UTF-8".into() })?
        } else {
            value.to_string()
        };

        let (id, bytes) = if let Some(tag) = split_group_key(key, GROUP_PATTERN) {
            let id = self.scan_group(tag).or_else(|| self.first_free_group_slot()).ok_or_else(|| {
                EepromError::Capacity { key: key.to_string(), needed: input.len() + tag.len() + 1 }
            })?;
            let bytes = MacWithParamCodec.parse_with_tag(&input, tag).map_err(|e| with_key(e.into(), key))?;
            (id, bytes)
        } else {
            let entry = find_property(key).ok_or_else(|| EepromError::Schema { key: key.to_string(), reason: "unknown property".into() })?;
            let bytes = entry.codec.parse(&input).map_err(|e| with_key(e.into(), key))?;
            (entry.id.raw(), bytes)
        };

        self.store_inner().set(id, &bytes).map_err(|e| with_key(e.into(), key))?;
        self.dirty = true;
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        if !self.dirty {
            return Ok(());
        }
        let len = self.store_inner().len() as u32;
        let crc = checksum(&self.data[FIRMUX_TLV_HEADER_LEN..FIRMUX_TLV_HEADER_LEN + len as usize]);
        let header = FirmuxTlvHeader { version: FIRMUX_TLV_VERSION, crc, len };
        header.write(self.data);
        self.dirty = false;
        Ok(())
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
        let mut buf = region(512);
        let model = FirmuxTlv::init(&mut buf, false).unwrap();
        assert!(model.is_some());
    }

    #[test]
    fn init_on_unrelated_data_is_unrecognized() {
        let mut buf = region(512);
        buf[0..4].copy_from_slice(b"XXXX");
        let model = FirmuxTlv::init(&mut buf, false).unwrap();
        assert!(model.is_none());
    }

    #[test]
    fn store_then_print_round_trips_a_scalar_property() {
        let mut buf = region(512);
        let mut model = FirmuxTlv::init(&mut buf, false).unwrap().unwrap();
        model.store("PRODUCT_ID", "ACME-1").unwrap();
        model.flush().unwrap();
        let n = model.print(Some("PRODUCT_ID"), Some("@/dev/null")).unwrap();
        assert!(n > 0);
    }

    #[test]
    fn print_missing_scalar_returns_sentinel_one() {
        let mut buf = region(512);
        let mut model = FirmuxTlv::init(&mut buf, false).unwrap().unwrap();
        assert_eq!(model.print(Some("PRODUCT_ID"), Some("@/dev/null")).unwrap(), 1);
    }

    #[test]
    fn dump_all_includes_mac_group_records() {
        let mut buf = region(512);
        let mut model = FirmuxTlv::init(&mut buf, false).unwrap().unwrap();
        model.store("PRODUCT_ID", "ACME-1").unwrap();
        model.store("MAC_ADDR_eth0", "aa:bb:cc:dd:ee:ff").unwrap();
        model.flush().unwrap();

        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("out.txt");
        model.print(None, Some(&format!("@{}", dest.display()))).unwrap();
        let out = std::fs::read_to_string(&dest).unwrap();

        assert!(out.contains("PRODUCT_ID=ACME-1"));
        assert!(out.contains("MAC_ADDR_eth0=aa:bb:cc:dd:ee:ff"));
    }

    #[test]
    fn print_unknown_key_is_schema_error() {
        let mut buf = region(512);
        let mut model = FirmuxTlv::init(&mut buf, false).unwrap().unwrap();
        assert!(matches!(model.print(Some("NOT_A_KEY"), None), Err(EepromError::Schema { .. })));
    }

    #[test]
    fn mac_group_allocates_first_free_slot_then_resolves_it() {
        let mut buf = region(512);
        let mut model = FirmuxTlv::init(&mut buf, false).unwrap().unwrap();
        model.store("MAC_ADDR_eth0", "aa:bb:cc:dd:ee:ff").unwrap();
        model.store("MAC_ADDR_eth1", "11:22:33:44:55:66").unwrap();
        assert_eq!(model.scan_group("eth0"), Some(FirmuxTlvPropertyId::MAC_FIRST));
        assert_eq!(model.scan_group("eth1"), Some(FirmuxTlvPropertyId::MAC_FIRST + 1));
    }

    #[test]
    fn reopening_after_flush_validates_crc() {
        let mut buf = region(512);
        {
            let mut model = FirmuxTlv::init(&mut buf, false).unwrap().unwrap();
            model.store("SERIAL_NO", "SN-42").unwrap();
            model.flush().unwrap();
        }
        let model = FirmuxTlv::init(&mut buf, false).unwrap();
        assert!(model.is_some());
    }

    #[test]
    fn corrupted_crc_is_rejected_as_integrity_error() {
        let mut buf = region(512);
        {
            let mut model = FirmuxTlv::init(&mut buf, false).unwrap().unwrap();
            model.store("SERIAL_NO", "SN-42").unwrap();
            model.flush().unwrap();
        }
        buf[FIRMUX_TLV_HEADER_LEN] ^= 0xFF;
        assert!(matches!(FirmuxTlv::init(&mut buf, false), Err(EepromError::Integrity { .. })));
    }
}
