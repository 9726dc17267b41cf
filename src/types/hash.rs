//! 32-byte SHA-256 hash type used as block identity and parent link.

use crate::types::encoding::{Encode, EncodeSink};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256};
use std::fmt;

/// SHA-256 hash length in bytes.
pub const HASH_LEN: usize = 32;

/// Fixed-size 32-byte hash.
///
/// The all-zero value is the "no parent" / "empty chain" sentinel; see
/// [`Hash::is_empty`]. On disk and on the wire it is a 64 character
/// lowercase hex string.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Hash, Ord, PartialOrd)]
pub struct Hash(pub [u8; HASH_LEN]);

impl Hash {
    /// Creates a zero-valued hash (all bytes are 0x00).
    pub const fn zero() -> Hash {
        Hash([0u8; HASH_LEN])
    }

    /// Returns true for the empty-chain sentinel.
    pub fn is_empty(&self) -> bool {
        self.0 == [0u8; HASH_LEN]
    }

    /// Lowercase hex form, as used in URLs and the block log.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Parses a 64 character hex string.
    pub fn from_hex(s: &str) -> Result<Hash, hex::FromHexError> {
        let mut out = [0u8; HASH_LEN];
        hex::decode_to_slice(s, &mut out)?;
        Ok(Hash(out))
    }

    /// Creates a new SHA-256 builder for incremental hashing.
    pub fn sha256() -> HashBuilder {
        HashBuilder::new()
    }
}

impl fmt::Display for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in &self.0 {
            write!(f, "{:02x}", byte)?;
        }
        Ok(())
    }
}

impl Serialize for Hash {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Hash {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Hash::from_hex(&s).map_err(serde::de::Error::custom)
    }
}

impl Encode for Hash {
    fn encode<S: EncodeSink>(&self, out: &mut S) {
        self.0.encode(out);
    }
}

/// Incremental SHA-256 hash builder.
///
/// Implements [`EncodeSink`] so encodable types can be hashed directly
/// without intermediate byte buffers.
pub struct HashBuilder {
    hasher: Sha256,
}

impl HashBuilder {
    pub fn new() -> Self {
        Self {
            hasher: Sha256::new(),
        }
    }

    /// Feeds data into the hash computation.
    pub fn update(&mut self, data: &[u8]) {
        self.hasher.update(data);
    }

    /// Consumes the builder and returns the final hash.
    pub fn finalize(self) -> Hash {
        Hash(self.hasher.finalize().into())
    }
}

impl Default for HashBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl EncodeSink for HashBuilder {
    fn write(&mut self, bytes: &[u8]) {
        self.hasher.update(bytes);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_hash_is_empty() {
        assert!(Hash::zero().is_empty());
        assert!(Hash::default().is_empty());
    }

    #[test]
    fn sha256_output_is_not_empty() {
        let mut h = Hash::sha256();
        h.update(b"");
        assert!(!h.finalize().is_empty());
    }

    #[test]
    fn sha256_matches_known_vector() {
        let mut h = Hash::sha256();
        h.update(b"abc");
        assert_eq!(
            h.finalize().to_hex(),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn hex_roundtrip_and_display_agree() {
        let mut h = Hash::sha256();
        h.update(b"test");
        let hash = h.finalize();
        assert_eq!(hash.to_string(), hash.to_hex());
        assert_eq!(Hash::from_hex(&hash.to_hex()).unwrap(), hash);
    }

    #[test]
    fn from_hex_rejects_wrong_length() {
        assert!(Hash::from_hex("abcd").is_err());
        assert!(Hash::from_hex("zz").is_err());
    }

    #[test]
    fn serializes_as_hex_string() {
        let json = serde_json::to_string(&Hash::zero()).unwrap();
        assert_eq!(json, format!("\"{}\"", "0".repeat(64)));

        let back: Hash = serde_json::from_str(&json).unwrap();
        assert!(back.is_empty());
    }

    #[test]
    fn deserialize_rejects_garbage() {
        assert!(serde_json::from_str::<Hash>("\"not-hex\"").is_err());
    }

    #[test]
    fn builder_is_incremental() {
        let mut whole = Hash::sha256();
        whole.update(b"hello world");

        let mut parts = Hash::sha256();
        parts.update(b"hello ");
        parts.update(b"world");

        assert_eq!(whole.finalize(), parts.finalize());
    }
}
