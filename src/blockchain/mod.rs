pub mod block;
pub mod merkle;
pub mod model;
pub mod pow;
pub mod stake;

pub use block::{AdmissionProof, Block};
pub use model::Blockchain;
pub use pow::{Difficulty, proof_of_work, valid_proof};
pub use stake::{RewardDistribution, StakeRegistry};

use crate::transaction::Amount;

/// Default Proof-of-Work difficulty (number of leading zeros).
pub const DEFAULT_DIFFICULTY: u32 = 3;

/// Balance of an address the ledger has never seen.
pub const DEFAULT_INITIAL_BALANCE: Amount = 100;

/// Subsidy for the miner of a PoW block.
pub const POW_REWARD: Amount = 10;

/// Subsidy for the validator forging a PoS block.
pub const POS_REWARD: Amount = 5;

/// Difficulty bounds (keep low in dev to avoid long waits)
pub const DIFF_MIN: u32 = 1;
pub const DIFF_MAX: u32 = 6;

/// Consensus and economic parameters of a chain.
#[derive(Debug, Clone)]
pub struct ChainConfig {
    pub difficulty: Difficulty,
    pub initial_balance: Amount,
    pub pow_reward: Amount,
    pub pos_reward: Amount,
    /// Reject transactions that carry no signature.
    pub require_signatures: bool,
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            difficulty: Difficulty::new(DEFAULT_DIFFICULTY),
            initial_balance: DEFAULT_INITIAL_BALANCE,
            pow_reward: POW_REWARD,
            pos_reward: POS_REWARD,
            require_signatures: false,
        }
    }
}
