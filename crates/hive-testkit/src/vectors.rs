//! Golden test vectors for deterministic verification.
//!
//! These vectors pin the canonical fingerprint encoding so that every
//! implementation derives byte-identical input for the same
//! `(guid, version, modified, by)`.

use hive_core::{canonical_version_bytes, version_fingerprint, ItemGuid, ANCHOR_HEX};
use serde::Serialize;

/// A golden test vector.
#[derive(Debug, Clone, Serialize)]
pub struct GoldenVector {
    /// Human-readable name for the vector.
    pub name: &'static str,
    /// Byte the 16-byte guid is filled with.
    pub guid_byte: u8,
    pub version: u64,
    pub modified: i64,
    pub by: &'static str,
    /// Expected canonical bytes (hex).
    pub expected_bytes: &'static str,
}

impl GoldenVector {
    pub fn guid(&self) -> ItemGuid {
        ItemGuid::from_bytes([self.guid_byte; 16])
    }

    /// Canonical bytes this implementation produces for the vector.
    pub fn encode(&self) -> Vec<u8> {
        canonical_version_bytes(&self.guid(), self.version, self.modified, self.by)
    }

    /// Fingerprint this implementation produces for the vector (hex).
    pub fn fingerprint_hex(&self) -> String {
        version_fingerprint(&self.guid(), self.version, self.modified, self.by).to_hex()
    }
}

/// Get all golden test vectors.
pub fn all_vectors() -> Vec<GoldenVector> {
    vec![
        GoldenVector {
            name: "first version with 64-bit timestamp",
            guid_byte: 0x42,
            version: 1,
            modified: 1736870400000, // 2025-01-14T16:00:00Z
            by: "alice",
            expected_bytes: "a400782434323432343234322d343234322d343234322d343234322d343234\
                             3234323432343234320101021b00000194658b10000365616c696365",
        },
        GoldenVector {
            name: "zero guid, epoch, empty editor",
            guid_byte: 0x00,
            version: 1,
            modified: 0,
            by: "",
            expected_bytes: "a400782430303030303030302d303030302d303030302d303030302d303030\
                             303030303030303030010102000360",
        },
        GoldenVector {
            name: "negative timestamp",
            guid_byte: 0xab,
            version: 12,
            modified: -1,
            by: "bob",
            expected_bytes: "a400782461626162616261622d616261622d616261622d616261622d616261\
                             626162616261626162010c02200363626f62",
        },
        GoldenVector {
            name: "two-byte version, non-ascii editor",
            guid_byte: 0x11,
            version: 300,
            modified: 1000,
            by: "zoë",
            expected_bytes: "a400782431313131313131312d313131312d313131312d313131312d313131\
                             3131313131313131310119012c021903e803647a6fc3ab",
        },
    ]
}

/// Verify all golden vectors encode to their expected bytes.
///
/// Returns `(name, matches, fingerprint hex)` per vector.
pub fn verify_all_vectors() -> Vec<(String, bool, String)> {
    all_vectors()
        .iter()
        .map(|v| {
            let matches = hex::encode(v.encode()) == v.expected_bytes;
            (v.name.to_string(), matches, v.fingerprint_hex())
        })
        .collect()
}

/// Export the vectors, with the fingerprints this implementation derives,
/// as pretty JSON for other implementations to check against.
pub fn vectors_json() -> serde_json::Result<String> {
    let entries: Vec<serde_json::Value> = all_vectors()
        .iter()
        .map(|v| {
            let mut entry = serde_json::to_value(v)?;
            entry["fingerprint"] = serde_json::Value::String(v.fingerprint_hex());
            Ok(entry)
        })
        .collect::<serde_json::Result<_>>()?;

    serde_json::to_string_pretty(&serde_json::json!({
        "anchor": ANCHOR_HEX,
        "vectors": entries,
    }))
}
