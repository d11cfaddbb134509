//! A flat TLV (type-length-value) record store over a borrowed byte slice.
//!
//! Uses a gap-tracking compaction and best-gap placement scheme: deleted
//! and shrunk records leave `TLV_PAD`
//! (0x00) holes rather than shifting trailing bytes, and new records prefer
//! the smallest hole they fit in over growing the tail. The `length` field's
//! byte order is a per-datamodel choice (native for `firmux-tlv`, big-endian
//! for `legacy-tlv`), so it is threaded through as [`LengthEndian`] rather
//! than fixed at compile time.

use eeprom_types::record::{LengthEndian, RECORD_HEADER_LEN, TLV_EMPTY, TLV_PAD};
use thiserror::Error;

#[derive(Debug, Error, Eq, PartialEq)]
pub enum TlvError {
    #[error("no space for a {needed}-byte record")]
    NoSpace { needed: usize },
    #[error("record already exists")]
    AlreadyExists,
    #[error("record not found")]
    NotFound,
}

pub type Result<T> = std::result::Result<T, TlvError>;

fn read_len(endian: LengthEndian, bytes: [u8; 2]) -> usize {
    match endian {
        LengthEndian::Host => u16::from_ne_bytes(bytes) as usize,
        LengthEndian::Big => u16::from_be_bytes(bytes) as usize,
    }
}

fn write_len(endian: LengthEndian, len: u16) -> [u8; 2] {
    match endian {
        LengthEndian::Host => len.to_ne_bytes(),
        LengthEndian::Big => len.to_be_bytes(),
    }
}

/// A located record: byte offset of its header, and the length of its value.
#[derive(Clone, Copy, Debug)]
struct Location {
    offset: usize,
    length: usize,
}

/// A TLV store laid out over `data`, in place, with no separate bookkeeping
/// other than a fragmentation flag.
///
/// The `frag` flag tracks whether any `set`/`del` has ever left a `TLV_PAD`
/// hole; it gates [`TlvStore::optimise`] so compaction is skipped on an
/// already-dense store.
pub struct TlvStore<'a> {
    data: &'a mut [u8],
    endian: LengthEndian,
    frag: bool,
}

impl<'a> TlvStore<'a> {
    pub fn new(data: &'a mut [u8], endian: LengthEndian) -> Self {
        Self { data, endian, frag: false }
    }

    pub fn reset(&mut self) {
        self.data.fill(TLV_EMPTY);
    }

    /// Offset of the first `TLV_EMPTY` byte, i.e. the length of the used
    /// prefix of the store. Returns the full store size if none is found.
    pub fn len(&self) -> usize {
        match self.find_raw(TLV_EMPTY) {
            Some(loc) => loc.offset,
            None => self.data.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.data.first() == Some(&TLV_EMPTY)
    }

    fn len_at(&self, offset: usize) -> usize {
        read_len(self.endian, [self.data[offset + 1], self.data[offset + 2]])
    }

    fn find_raw(&self, target: u8) -> Option<Location> {
        let last = self.data.len();
        let mut curr = 0usize;

        while curr + RECORD_HEADER_LEN < last {
            let ty = self.data[curr];
            if ty == target {
                return Some(Location { offset: curr, length: self.len_at(curr) });
            }
            if ty == TLV_EMPTY {
                break;
            }
            if ty == TLV_PAD {
                curr += 1;
                continue;
            }
            curr += RECORD_HEADER_LEN + self.len_at(curr);
        }

        None
    }

    fn find(&self, ty: u8) -> Option<Location> {
        debug_assert!(ty != TLV_EMPTY && ty != TLV_PAD);
        self.find_raw(ty)
    }

    /// Finds the smallest padding run that fits `length` bytes of value
    /// (plus a header), falling back to the erased tail. Returns `None` if
    /// neither exists.
    fn gap(&self, length: usize) -> Option<Location> {
        let last = self.data.len();
        let mut curr = 0usize;
        let mut best: Option<Location> = None;
        let mut tail: Option<Location> = None;

        while curr + RECORD_HEADER_LEN < last {
            let ty = self.data[curr];

            if ty == TLV_EMPTY {
                if curr + RECORD_HEADER_LEN + length < last {
                    tail = Some(Location { offset: curr, length: 0 });
                }
                break;
            }

            if ty == TLV_PAD {
                let run_start = curr;
                while curr < last && self.data[curr] == TLV_PAD {
                    curr += 1;
                }
                if curr == last {
                    break;
                }
                let run_len = curr - run_start - RECORD_HEADER_LEN;
                if run_len >= length {
                    let better = match best {
                        None => true,
                        Some(b) => run_len < b.length,
                    };
                    if better {
                        best = Some(Location { offset: run_start, length: run_len });
                    }
                    if run_len == length {
                        break;
                    }
                }
                continue;
            }

            curr += RECORD_HEADER_LEN + self.len_at(curr);
        }

        best.or(tail)
    }

    fn write_record(&mut self, offset: usize, ty: u8, value: &[u8]) {
        self.data[offset] = ty;
        let len_bytes = write_len(self.endian, value.len() as u16);
        self.data[offset + 1..offset + 3].copy_from_slice(&len_bytes);
        self.data[offset + RECORD_HEADER_LEN..offset + RECORD_HEADER_LEN + value.len()]
            .copy_from_slice(value);
    }

    fn add_tail(&mut self, ty: u8, value: &[u8]) -> Result<()> {
        let loc = self.gap(value.len()).ok_or(TlvError::NoSpace { needed: value.len() })?;
        self.write_record(loc.offset, ty, value);
        Ok(())
    }

    /// Inserts a new record. Fails with [`TlvError::AlreadyExists`] if `ty`
    /// is already present.
    pub fn add(&mut self, ty: u8, value: &[u8]) -> Result<()> {
        debug_assert!(ty != TLV_EMPTY && ty != TLV_PAD);
        if self.find(ty).is_some() {
            return Err(TlvError::AlreadyExists);
        }
        self.add_tail(ty, value)
    }

    /// Inserts or updates a record, growing/shrinking/replacing in place as
    /// needed. An in-place shrink pads the freed tail of the old value; a
    /// grow pads the whole old record and re-places it via [`Self::gap`].
    pub fn set(&mut self, ty: u8, value: &[u8]) -> Result<()> {
        debug_assert!(ty != TLV_EMPTY && ty != TLV_PAD);

        let Some(loc) = self.find(ty) else {
            return self.add_tail(ty, value);
        };

        if loc.length == value.len() {
            let start = loc.offset + RECORD_HEADER_LEN;
            self.data[start..start + value.len()].copy_from_slice(value);
            return Ok(());
        }

        self.frag = true;
        let value_start = loc.offset + RECORD_HEADER_LEN;
        self.data[value_start..value_start + loc.length].fill(TLV_PAD);

        if loc.length > value.len() {
            self.write_record(loc.offset, ty, value);
            let freed_start = loc.offset + RECORD_HEADER_LEN + value.len();
            let freed_end = loc.offset + RECORD_HEADER_LEN + loc.length;
            self.data[freed_start..freed_end].fill(TLV_PAD);
            Ok(())
        } else {
            self.data[loc.offset..loc.offset + RECORD_HEADER_LEN].fill(TLV_PAD);
            self.add_tail(ty, value)
        }
    }

    /// Zero-fills (pads) a record's header and value in place.
    pub fn del(&mut self, ty: u8) -> Result<()> {
        debug_assert!(ty != TLV_EMPTY && ty != TLV_PAD);
        let loc = self.find(ty).ok_or(TlvError::NotFound)?;
        self.frag = true;
        let end = loc.offset + RECORD_HEADER_LEN + loc.length;
        self.data[loc.offset..end].fill(TLV_PAD);
        Ok(())
    }

    /// Returns a copy of a record's value, or `None` if absent.
    pub fn get(&self, ty: u8) -> Option<Vec<u8>> {
        let loc = self.find(ty)?;
        let start = loc.offset + RECORD_HEADER_LEN;
        Some(self.data[start..start + loc.length].to_vec())
    }

    /// Length of a record's value without copying it, or `None` if absent.
    pub fn size(&self, ty: u8) -> Option<usize> {
        self.find(ty).map(|loc| loc.length)
    }

    /// Compacts live records toward the front of the store, eliminating all
    /// padding holes. A no-op unless a prior `set`/`del` created fragmentation.
    pub fn optimise(&mut self) {
        if !self.frag {
            return;
        }

        let last = self.data.len();
        let mut save = 0usize;
        let mut curr = 0usize;

        while curr + RECORD_HEADER_LEN < last {
            let ty = self.data[curr];
            if ty == TLV_EMPTY {
                break;
            }
            if ty == TLV_PAD {
                curr += 1;
                continue;
            }
            let count = RECORD_HEADER_LEN + self.len_at(curr);
            if save != curr {
                self.data.copy_within(curr..curr + count, save);
            }
            save += count;
            curr += count;
        }

        if save != curr {
            self.data[save..curr].fill(TLV_EMPTY);
        }

        self.frag = false;
    }

    pub fn iter(&self) -> TlvIter<'_> {
        TlvIter { store: self, curr: 0 }
    }
}

pub struct TlvIter<'a> {
    store: &'a TlvStore<'a>,
    curr: usize,
}

pub struct Record {
    pub ty: u8,
    pub offset: usize,
    pub value: Vec<u8>,
}

impl<'a> Iterator for TlvIter<'a> {
    type Item = Record;

    fn next(&mut self) -> Option<Record> {
        let last = self.store.data.len();

        while self.curr + RECORD_HEADER_LEN < last {
            let ty = self.store.data[self.curr];
            if ty == TLV_EMPTY {
                return None;
            }
            if ty == TLV_PAD {
                self.curr += 1;
                continue;
            }
            let value_len = self.store.len_at(self.curr);
            let offset = self.curr;
            let value =
                self.store.data[self.curr + RECORD_HEADER_LEN..self.curr + RECORD_HEADER_LEN + value_len].to_vec();
            self.curr += RECORD_HEADER_LEN + value_len;
            return Some(Record { ty, offset, value });
        }

        None
    }
}
