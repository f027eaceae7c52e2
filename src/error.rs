//! Error taxonomy shared by the ledger, the chain and the node.

use thiserror::Error;

use crate::transaction::Amount;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChainError {
    /// Negative or malformed value, rejected before it reaches the pending queue.
    #[error("invalid amount: {0}")]
    InvalidAmount(String),

    /// Missing or empty request field.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("insufficient balance for {address}: required {required}, available {available}")]
    InsufficientBalance {
        address: String,
        required: Amount,
        available: Amount,
    },

    #[error("invalid signature: {0}")]
    InvalidSignature(String),

    #[error("transaction {0} is already pending")]
    DuplicateTransaction(String),

    /// Recomputed digest, link or proof of a block does not match what is stored.
    #[error("structural mismatch at block #{index}: {reason}")]
    StructuralMismatch { index: u64, reason: String },

    #[error("peer {peer} unreachable: {reason}")]
    PeerUnreachable { peer: String, reason: String },

    /// Nothing to mine or nobody to select.
    #[error("no candidate: {0}")]
    NoCandidate(&'static str),

    #[error("chain tip moved while searching for a proof")]
    StaleProof,

    #[error("mining for height {0} was cancelled by a competing block")]
    MiningCancelled(u64),

    #[error("unknown validator: {0}")]
    UnknownValidator(String),
}

pub type Result<T> = std::result::Result<T, ChainError>;
