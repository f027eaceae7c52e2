use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::atomic::AtomicBool;

use super::merkle;
use super::pow::{Difficulty, proof_of_work};
use crate::hashing::{DIGEST_HEX_LEN, digest};
use crate::transaction::Transaction;

/// Layout version of `Block`; part of the hashed content.
pub const BLOCK_VERSION: u32 = 1;

/// Timestamp (ms) of the genesis block.
pub const GENESIS_TIMESTAMP: i64 = 0;

/// How a block earned its place in the chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AdmissionProof {
    Genesis,
    /// Nonce satisfying the difficulty for the previous block's hash.
    Work { nonce: u64, miner: String },
    /// Validator picked by stake-weighted selection.
    Stake { validator: String },
}

impl AdmissionProof {
    /// Address credited with fees and the block reward.
    pub fn beneficiary(&self) -> Option<&str> {
        match self {
            AdmissionProof::Genesis => None,
            AdmissionProof::Work { miner, .. } => Some(miner),
            AdmissionProof::Stake { validator } => Some(validator),
        }
    }
}

/// A single block in the blockchain holding a list of transactions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    pub version: u32,
    pub index: u64,
    pub timestamp: i64, // milliseconds (UTC)
    pub transactions: Vec<Transaction>,
    pub merkle_root: Option<String>,
    pub previous_hash: String,
    pub proof: AdmissionProof,
    pub hash: String, // Cached hash of the block
}

#[derive(Serialize)]
struct HashedFields<'a> {
    version: u32,
    index: u64,
    timestamp: i64,
    transactions: &'a [Transaction],
    merkle_root: &'a Option<String>,
    previous_hash: &'a str,
    proof: &'a AdmissionProof,
}

impl Block {
    /// Previous-hash sentinel carried by the genesis block.
    pub fn genesis_previous_hash() -> String {
        "0".repeat(DIGEST_HEX_LEN)
    }

    /// Create the genesis block (first block in the chain).
    ///
    /// Fully deterministic, so independently started nodes share it.
    pub fn genesis() -> Self {
        Self::new_with_timestamp(
            0,
            Vec::new(),
            Self::genesis_previous_hash(),
            AdmissionProof::Genesis,
            GENESIS_TIMESTAMP,
        )
    }

    /// Build a block, deriving its Merkle root and hash.
    pub fn new(
        index: u64,
        transactions: Vec<Transaction>,
        previous_hash: String,
        proof: AdmissionProof,
    ) -> Self {
        Self::new_with_timestamp(
            index,
            transactions,
            previous_hash,
            proof,
            Utc::now().timestamp_millis(),
        )
    }

    pub fn new_with_timestamp(
        index: u64,
        transactions: Vec<Transaction>,
        previous_hash: String,
        proof: AdmissionProof,
        timestamp: i64,
    ) -> Self {
        let merkle_root = Self::merkle_root_of(&transactions);
        let mut block = Self {
            version: BLOCK_VERSION,
            index,
            timestamp,
            transactions,
            merkle_root,
            previous_hash,
            proof,
            hash: String::new(),
        };
        block.hash = block.compute_hash();
        block
    }

    /// Search a nonce for `previous_hash` and seal a PoW block with it.
    pub fn mine(
        index: u64,
        transactions: Vec<Transaction>,
        previous_hash: String,
        miner: String,
        difficulty: Difficulty,
    ) -> (u64, Self) {
        let never = AtomicBool::new(false);
        // Without cancellation the search only ends on success.
        let nonce = proof_of_work(&previous_hash, difficulty, &never).unwrap_or_default();
        let block = Self::new(
            index,
            transactions,
            previous_hash,
            AdmissionProof::Work { nonce, miner },
        );
        (nonce, block)
    }

    pub fn merkle_root_of(transactions: &[Transaction]) -> Option<String> {
        let ids: Vec<&str> = transactions.iter().map(|t| t.id.as_str()).collect();
        merkle::root_of(&ids)
    }

    /// Recompute the hash from content, ignoring the cached `hash` field.
    pub fn compute_hash(&self) -> String {
        digest(&HashedFields {
            version: self.version,
            index: self.index,
            timestamp: self.timestamp,
            transactions: &self.transactions,
            merkle_root: &self.merkle_root,
            previous_hash: &self.previous_hash,
            proof: &self.proof,
        })
    }

    /// Stored hash and Merkle root both match the content.
    /// (Does NOT validate chain linkage or the admission proof.)
    pub fn is_intact(&self) -> bool {
        self.hash == self.compute_hash() && self.merkle_root == Self::merkle_root_of(&self.transactions)
    }
}
