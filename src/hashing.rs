use serde::Serialize;
use sha2::{Digest, Sha256};

/// Length in hex characters of every digest produced here.
pub const DIGEST_HEX_LEN: usize = 64;

/// SHA-256 of raw bytes, hex encoded.
pub fn sha256_hex(data: &[u8]) -> String {
    hex::encode(sha256(data))
}

pub fn sha256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(data);
    let digest = hasher.finalize();
    let mut out = [0u8; 32];
    out.copy_from_slice(&digest[..]);
    out
}

/// Canonical JSON encoding: struct fields and map keys come out sorted,
/// so two values with the same content always produce the same bytes.
pub fn canonical_bytes<T: Serialize + ?Sized>(value: &T) -> Vec<u8> {
    // Going through `Value` sorts keys (serde_json's default map is a BTreeMap).
    // Our types only contain strings, integers and options, which always encode.
    let value = serde_json::to_value(value).unwrap_or(serde_json::Value::Null);
    serde_json::to_vec(&value).unwrap_or_default()
}

/// Digest of the canonical encoding of `value`.
pub fn digest<T: Serialize + ?Sized>(value: &T) -> String {
    sha256_hex(&canonical_bytes(value))
}
