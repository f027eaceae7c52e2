use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};

use crate::hashing::sha256_hex;

/// Proof-of-Work predicate: the guess hash must start with this many hex zeros.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Difficulty(u32);

impl Difficulty {
    pub const fn new(leading_zeros: u32) -> Self {
        Self(leading_zeros)
    }

    pub fn leading_zeros(self) -> u32 {
        self.0
    }

    pub fn is_satisfied_by(self, hash: &str) -> bool {
        let zeros = self.0 as usize;
        hash.len() >= zeros && hash.bytes().take(zeros).all(|c| c == b'0')
    }
}

fn guess_hash(previous_hash: &str, nonce: u64) -> String {
    sha256_hex(format!("{previous_hash}{nonce}").as_bytes())
}

/// Check a nonce against the previous block's hash without re-mining.
pub fn valid_proof(previous_hash: &str, nonce: u64, difficulty: Difficulty) -> bool {
    difficulty.is_satisfied_by(&guess_hash(previous_hash, nonce))
}

/// Try nonces from 0 upward until one satisfies `difficulty`.
///
/// Returns `None` as soon as `cancel` is raised; the flag is read on every
/// attempt so a competing block stops the search promptly.
pub fn proof_of_work(previous_hash: &str, difficulty: Difficulty, cancel: &AtomicBool) -> Option<u64> {
    let mut nonce: u64 = 0;
    loop {
        if cancel.load(Ordering::Relaxed) {
            return None;
        }
        if valid_proof(previous_hash, nonce, difficulty) {
            return Some(nonce);
        }
        nonce = nonce.wrapping_add(1);
    }
}
