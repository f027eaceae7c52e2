//! Merkle root over an ordered list of transaction ids.
//!
//! - No leaves: no root.
//! - One leaf: the root is that leaf.
//! - Otherwise pairs are concatenated (hex) and hashed level by level,
//!   duplicating the last node of an odd level.

use crate::hashing::sha256_hex;

pub fn root_of<S: AsRef<str>>(digests: &[S]) -> Option<String> {
    let mut level: Vec<String> = digests.iter().map(|d| d.as_ref().to_string()).collect();
    if level.is_empty() {
        return None;
    }

    while level.len() > 1 {
        level = level
            .chunks(2)
            .map(|pair| {
                let left = &pair[0];
                let right = pair.get(1).unwrap_or(left);
                sha256_hex(format!("{left}{right}").as_bytes())
            })
            .collect();
    }

    level.pop()
}
