//! CRC-32 (ISO-HDLC, reflected, polynomial `0xEDB88320`) over a TLV payload.
//!
//! Every datamodel's `crc` header field covers the payload bytes only, never
//! its own header, so the checksum can be recomputed before the header is
//! rewritten without having to zero the `crc` field first.

use crc32fast::Hasher;

pub fn checksum(payload: &[u8]) -> u32 {
    let mut hasher = Hasher::new();
    hasher.update(payload);
    hasher.finalize()
}
