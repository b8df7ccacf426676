//! Canonical CBOR encoding of an item's version state.
//!
//! The fingerprint of an item is `Blake3(canonical_version_bytes(..))`. The
//! encoding follows RFC 8949 Core Deterministic Encoding:
//! - Map keys sorted by encoded byte comparison
//! - Integers use smallest valid encoding
//! - Definite lengths only
//! - No floats (timestamps are i64 milliseconds)
//!
//! Two replicas holding the same `(guid, version, modified, by)` therefore
//! derive byte-identical input and the same fingerprint on every platform.

use crate::crypto::Blake3Hash;
use crate::types::ItemGuid;

/// Field keys (integer keys for compact encoding).
mod keys {
    pub const GUID: u64 = 0;
    pub const VERSION: u64 = 1;
    pub const MODIFIED: u64 = 2;
    pub const BY: u64 = 3;
}

/// CBOR major types used here.
mod major {
    pub const UINT: u8 = 0;
    pub const NINT: u8 = 1;
    pub const TEXT: u8 = 3;
    pub const MAP: u8 = 5;
}

/// Encode the version state of an item to canonical CBOR bytes.
pub fn canonical_version_bytes(guid: &ItemGuid, version: u64, modified: i64, by: &str) -> Vec<u8> {
    let mut map = CanonicalMap::default();
    map.entry(keys::GUID, |buf| encode_text(buf, &guid.to_string()));
    map.entry(keys::VERSION, |buf| encode_uint(buf, major::UINT, version));
    map.entry(keys::MODIFIED, |buf| encode_int(buf, modified));
    map.entry(keys::BY, |buf| encode_text(buf, by));
    map.finish()
}

/// Compute the version fingerprint of an item.
pub fn version_fingerprint(guid: &ItemGuid, version: u64, modified: i64, by: &str) -> Blake3Hash {
    Blake3Hash::hash(&canonical_version_bytes(guid, version, modified, by))
}

/// Map with unsigned integer keys, written in encoded-key order.
#[derive(Default)]
struct CanonicalMap {
    entries: Vec<(Vec<u8>, Vec<u8>)>,
}

impl CanonicalMap {
    fn entry(&mut self, key: u64, value: impl FnOnce(&mut Vec<u8>)) {
        let mut key_buf = Vec::new();
        encode_uint(&mut key_buf, major::UINT, key);
        let mut value_buf = Vec::new();
        value(&mut value_buf);
        self.entries.push((key_buf, value_buf));
    }

    fn finish(mut self) -> Vec<u8> {
        self.entries.sort_by(|a, b| a.0.cmp(&b.0));

        let mut buf = Vec::new();
        encode_uint(&mut buf, major::MAP, self.entries.len() as u64);
        for (key, value) in self.entries {
            buf.extend_from_slice(&key);
            buf.extend_from_slice(&value);
        }
        buf
    }
}

fn encode_text(buf: &mut Vec<u8>, s: &str) {
    encode_uint(buf, major::TEXT, s.len() as u64);
    buf.extend_from_slice(s.as_bytes());
}

/// Encode a signed integer (major types 0 and 1).
fn encode_int(buf: &mut Vec<u8>, n: i64) {
    if n >= 0 {
        encode_uint(buf, major::UINT, n as u64);
    } else {
        // -1 encodes as 0, -2 as 1, etc.
        encode_uint(buf, major::NINT, !(n as u64));
    }
}

/// Encode an argument with the given major type in its shortest form.
fn encode_uint(buf: &mut Vec<u8>, major: u8, n: u64) {
    let mt = major << 5;
    match n {
        0..=23 => buf.push(mt | n as u8),
        24..=0xff => buf.extend_from_slice(&[mt | 24, n as u8]),
        0x100..=0xffff => {
            buf.push(mt | 25);
            buf.extend_from_slice(&(n as u16).to_be_bytes());
        }
        0x1_0000..=0xffff_ffff => {
            buf.push(mt | 26);
            buf.extend_from_slice(&(n as u32).to_be_bytes());
        }
        _ => {
            buf.push(mt | 27);
            buf.extend_from_slice(&n.to_be_bytes());
        }
    }
}
