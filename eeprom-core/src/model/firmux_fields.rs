//! The `firmux-fields` datamodel: a fixed packed struct, no TLV records.
//!
//! Every property occupies a fixed byte range within the payload. A field
//! counts as *set* iff any of its bytes differ from the erased value
//! (`0xFF`) — there is no separate occupancy bit.

use eeprom_types::header::{FirmuxFieldsHeader, FIRMUX_FIELDS_HEADER_LEN};
use log::debug;

use crate::codec::{ByteTripletCodec, Codec, MacCodec, TextCodec};
use crate::crc::checksum;
use crate::error::{with_key, EepromError, Result};

struct Field {
    name: &'static str,
    offset: usize,
    size: usize,
    codec: &'static dyn Codec,
}

macro_rules! field {
    ($name:expr, $offset:expr, $size:expr, $codec:expr) => {
        Field { name: $name, offset: $offset, size: $size, codec: $codec }
    };
}

// Layout, relative to the start of the payload (i.e. right after the
// header): product id 16, product name 16, serial 16, PCB name 8, PCB
// revision 4, PCB prdate 3 + 1 pad, PCB prlocation 16, PCB sn 16, MAC 6.
static FIELDS: &[Field] = &[
    field!("PRODUCT_ID", 0, 16, &TextCodec),
    field!("PRODUCT_NAME", 16, 16, &TextCodec),
    field!("SERIAL_NO", 32, 16, &TextCodec),
    field!("PCB_NAME", 48, 8, &TextCodec),
    field!("PCB_REVISION", 56, 4, &TextCodec),
    field!("PCB_PRDATE", 60, 3, &ByteTripletCodec),
    field!("PCB_PRLOCATION", 64, 16, &TextCodec),
    field!("PCB_SN", 80, 16, &TextCodec),
    field!("MAC_ADDR", 96, 6, &MacCodec),
];

const PAYLOAD_LEN: usize = 102;

fn find_field(name: &str) -> Option<&'static Field> {
    FIELDS.iter().find(|f| f.name == name)
}

fn is_set(bytes: &[u8]) -> bool {
    bytes.iter().any(|&b| b != 0xFF)
}

/// An opened, validated `firmux-fields` region.
pub struct FirmuxFields<'a> {
    data: &'a mut [u8],
    dirty: bool,
}

/// The outcome of inspecting a region's header without mutating it.
enum Recognition {
    /// Header magic matches and its checksum validates.
    Match,
    /// Header bytes are all erased; a fresh header would be written. Any
    /// all-0xFF header is treated as empty even if the payload beyond it
    /// holds leftover garbage from a previous, differently sized datamodel.
    Empty,
    Unrecognized,
}

/// Inspects `data` for a `firmux-fields` header, read-only. Used both by
/// [`FirmuxFields::init`] and by the registry to decide whether this
/// datamodel should be tried without yet committing to opening it.
fn recognize(data: &[u8]) -> Result<Recognition> {
    let needed = FIRMUX_FIELDS_HEADER_LEN + PAYLOAD_LEN;
    if data.len() < needed {
        return Err(EepromError::State("region too small for firmux-fields layout"));
    }

    if FirmuxFieldsHeader::magic_matches(data) {
        let header = FirmuxFieldsHeader::parse(data).map_err(|e| EepromError::Integrity { reason: e.to_string() })?;
        let payload = &data[FIRMUX_FIELDS_HEADER_LEN..FIRMUX_FIELDS_HEADER_LEN + PAYLOAD_LEN];
        let computed = checksum(payload);
        if computed != header.crc {
            return Err(EepromError::Integrity {
                reason: format!("CRC mismatch: stored {:#x}, computed {:#x}", header.crc, computed),
            });
        }
        return Ok(Recognition::Match);
    }

    if data[..FIRMUX_FIELDS_HEADER_LEN].iter().all(|&b| b == 0xFF) {
        return Ok(Recognition::Empty);
    }

    Ok(Recognition::Unrecognized)
}

/// Whether a `firmux-fields` open against `data` would succeed, without
/// mutating or holding any borrow past this call.
pub(crate) fn recognizes(data: &[u8]) -> Result<bool> {
    Ok(!matches!(recognize(data)?, Recognition::Unrecognized))
}

impl<'a> FirmuxFields<'a> {
    pub fn init(data: &'a mut [u8], force: bool) -> Result<Option<Self>> {
        if data.len() < FIRMUX_FIELDS_HEADER_LEN + PAYLOAD_LEN {
            return Err(EepromError::State("region too small for firmux-fields layout"));
        }

        if force {
            debug!("firmux-fields: forced region, reinitializing");
            let header = FirmuxFieldsHeader { crc: checksum(&[0xFFu8; PAYLOAD_LEN]) };
            header.write(data);
            data[FIRMUX_FIELDS_HEADER_LEN..FIRMUX_FIELDS_HEADER_LEN + PAYLOAD_LEN].fill(0xFF);
            return Ok(Some(Self { data, dirty: false }));
        }

        match recognize(data)? {
            Recognition::Match => {
                debug!("firmux-fields: recognized valid region");
                Ok(Some(Self { data, dirty: false }))
            }
            Recognition::Empty => {
                debug!("firmux-fields: empty region, reinitializing");
                let header = FirmuxFieldsHeader { crc: checksum(&[0xFFu8; PAYLOAD_LEN]) };
                header.write(data);
                data[FIRMUX_FIELDS_HEADER_LEN..FIRMUX_FIELDS_HEADER_LEN + PAYLOAD_LEN].fill(0xFF);
                Ok(Some(Self { data, dirty: false }))
            }
            Recognition::Unrecognized => {
                debug!("firmux-fields: header not recognized");
                Ok(None)
            }
        }
    }

    fn slot(&self, field: &Field) -> &[u8] {
        let start = FIRMUX_FIELDS_HEADER_LEN + field.offset;
        &self.data[start..start + field.size]
    }

    fn slot_mut(&mut self, field: &Field) -> &mut [u8] {
        let start = FIRMUX_FIELDS_HEADER_LEN + field.offset;
        &mut self.data[start..start + field.size]
    }
}

impl<'a> super::Model for FirmuxFields<'a> {
    fn list(&self) -> Vec<String> {
        FIELDS.iter().map(|f| f.name.to_string()).collect()
    }

    fn check(&self, key: &str, value: Option<&str>) -> Result<()> {
        let field =
            find_field(key).ok_or_else(|| EepromError::Schema { key: key.to_string(), reason: "unknown property".into() })?;
        if let Some(v) = value {
            let bytes = field.codec.parse(v).map_err(|e| with_key(e.into(), key))?;
            if bytes.len() > field.size {
                return Err(EepromError::Schema {
                    key: key.to_string(),
                    reason: format!("value is {} bytes, slot holds {}", bytes.len(), field.size),
                });
            }
        }
        Ok(())
    }

    fn print(&mut self, key: Option<&str>, out: Option<&str>) -> Result<i64> {
        let text = match key {
            None => {
                let mut buf = String::new();
                for f in FIELDS {
                    let slot = self.slot(f);
                    if is_set(slot) {
                        let formatted = f.codec.format(slot).map_err(|e| with_key(e.into(), f.name))?;
                        buf.push_str(&format!("{}={}\n", f.name, formatted));
                    }
                }
                buf
            }
            Some(k) => {
                let field =
                    find_field(k).ok_or_else(|| EepromError::Schema { key: k.to_string(), reason: "unknown property".into() })?;
                let slot = self.slot(field);
                if !is_set(slot) {
                    return Ok(1);
                }
                field.codec.format(slot).map_err(|e| with_key(e.into(), k))?
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
            String::from_utf8(std::fs::read(path).map_err(|source| EepromError::Io { path: path.into(), source })?)
                .map_err(|_| EepromError::Schema { key: key.to_string(), reason: "file is not valid UTF-8".into() })?
        } else {
            value.to_string()
        };

        let field =
            find_field(key).ok_or_else(|| EepromError::Schema { key: key.to_string(), reason: "unknown property".into() })?;
        let bytes = field.codec.parse(&input).map_err(|e| with_key(e.into(), key))?;
        if bytes.len() > field.size {
            return Err(EepromError::Schema {
                key: key.to_string(),
                reason: format!("value is {} bytes, slot holds {}", bytes.len(), field.size),
            });
        }

        let slot = self.slot_mut(field);
        slot.fill(0xFF);
        slot[..bytes.len()].copy_from_slice(&bytes);
        self.dirty = true;
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        if !self.dirty {
            return Ok(());
        }
        let payload = &self.data[FIRMUX_FIELDS_HEADER_LEN..FIRMUX_FIELDS_HEADER_LEN + PAYLOAD_LEN];
        let crc = checksum(payload);
        let header = FirmuxFieldsHeader { crc };
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
        let mut buf = region(256);
        assert!(FirmuxFields::init(&mut buf, false).unwrap().is_some());
    }

    #[test]
    fn store_then_print_round_trips() {
        let mut buf = region(256);
        let mut model = FirmuxFields::init(&mut buf, false).unwrap().unwrap();
        model.store("MAC_ADDR", "aa:bb:cc:dd:ee:ff").unwrap();
        model.flush().unwrap();
        assert!(model.print(Some("MAC_ADDR"), Some("@/dev/null")).unwrap() > 0);
    }

    #[test]
    fn unset_field_reports_sentinel() {
        let mut buf = region(256);
        let mut model = FirmuxFields::init(&mut buf, false).unwrap().unwrap();
        assert_eq!(model.print(Some("PRODUCT_ID"), Some("@/dev/null")).unwrap(), 1);
    }

    #[test]
    fn oversized_value_is_rejected() {
        let mut buf = region(256);
        let mut model = FirmuxFields::init(&mut buf, false).unwrap().unwrap();
        let err = model.store("PCB_REVISION", "way too long for four bytes").unwrap_err();
        assert!(matches!(err, EepromError::Schema { .. }));
    }

    #[test]
    fn reopening_after_flush_validates_crc() {
        let mut buf = region(256);
        {
            let mut model = FirmuxFields::init(&mut buf, false).unwrap().unwrap();
            model.store("SERIAL_NO", "SN-1").unwrap();
            model.flush().unwrap();
        }
        assert!(FirmuxFields::init(&mut buf, false).unwrap().is_some());
    }
}
