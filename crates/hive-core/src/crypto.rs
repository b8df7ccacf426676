//! Hash primitive for hive replication.
//!
//! Every digest in the system (leaf, internal node, fingerprint, root) is a
//! 32-byte Blake3 output wrapped in [`Blake3Hash`].

use serde::{Deserialize, Serialize};
use std::fmt;

/// Hex of `blake3("")`, the anchor used wherever data is missing.
pub const ANCHOR_HEX: &str = "af1349b9f5f9a1a6a0404dea36dcc9499bcb25c9adc112b7cc9a93cae41f3262";

/// A 32-byte Blake3 hash.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Blake3Hash(pub [u8; 32]);

impl Blake3Hash {
    /// Compute the Blake3 hash of the given data.
    pub fn hash(data: &[u8]) -> Self {
        Self(*blake3::hash(data).as_bytes())
    }

    /// Hash the concatenation `left || right`.
    pub fn hash_pair(left: &Blake3Hash, right: &Blake3Hash) -> Self {
        let mut hasher = blake3::Hasher::new();
        hasher.update(&left.0);
        hasher.update(&right.0);
        Self(*hasher.finalize().as_bytes())
    }

    /// The anchor value: the hash of an empty byte sequence.
    ///
    /// Stands in for missing or undecodable data so tree shapes stay defined.
    pub fn anchor() -> Self {
        Self::hash(&[])
    }

    /// Create from raw bytes.
    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Get the raw bytes.
    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Convert to lowercase hex string.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Parse from hex string.
    pub fn from_hex(s: &str) -> Result<Self, hex::FromHexError> {
        let bytes = hex::decode(s)?;
        if bytes.len() != 32 {
            return Err(hex::FromHexError::InvalidStringLength);
        }
        let mut arr = [0u8; 32];
        arr.copy_from_slice(&bytes);
        Ok(Self(arr))
    }
}

impl fmt::Debug for Blake3Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Blake3({})", &self.to_hex()[..16])
    }
}

impl fmt::Display for Blake3Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl AsRef<[u8]> for Blake3Hash {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl From<[u8; 32]> for Blake3Hash {
    fn from(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blake3_hash() {
        let data = b"test data";
        let h1 = Blake3Hash::hash(data);
        let h2 = Blake3Hash::hash(data);
        assert_eq!(h1, h2);

        let different = b"different data";
        let h3 = Blake3Hash::hash(different);
        assert_ne!(h1, h3);
    }

    #[test]
    fn test_anchor_is_hash_of_empty() {
        assert_eq!(Blake3Hash::anchor().to_hex(), ANCHOR_HEX);
        assert_eq!(Blake3Hash::anchor(), Blake3Hash::hash(b""));
    }

    #[test]
    fn test_hash_pair_is_order_sensitive() {
        let a = Blake3Hash::hash(b"a");
        let b = Blake3Hash::hash(b"b");
        assert_ne!(Blake3Hash::hash_pair(&a, &b), Blake3Hash::hash_pair(&b, &a));

        let mut concat = Vec::new();
        concat.extend_from_slice(a.as_bytes());
        concat.extend_from_slice(b.as_bytes());
        assert_eq!(Blake3Hash::hash_pair(&a, &b), Blake3Hash::hash(&concat));
    }

    #[test]
    fn test_from_hex_rejects_bad_input() {
        assert!(Blake3Hash::from_hex("zz").is_err());
        assert!(Blake3Hash::from_hex("abcd").is_err());
        let h = Blake3Hash::hash(b"x");
        assert_eq!(Blake3Hash::from_hex(&h.to_hex()).unwrap(), h);
    }
}
