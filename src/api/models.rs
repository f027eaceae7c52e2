use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::blockchain::{Block, RewardDistribution};
use crate::node::{Node, Resolution};
use crate::transaction::{Amount, Transaction};

/// Shared application state: the node owning the chain, ledger and peers.
pub struct AppState {
    pub node: Arc<Node>,
}

impl AppState {
    pub fn new(node: Arc<Node>) -> Self {
        Self { node }
    }
}

/* ---------- Chain API Models ---------- */

#[derive(Serialize)]
pub struct ValidateResponse {
    pub valid: bool,
    pub length: usize,
    pub difficulty: u32,
}

#[derive(Deserialize, Default)]
pub struct MineRequest {
    /// Defaults to the node id.
    #[serde(default)]
    pub miner_address: Option<String>,
}

#[derive(Serialize)]
pub struct MineResponse {
    pub message: String,
    pub block: Block,
}

#[derive(Serialize)]
pub struct ForgeResponse {
    pub message: String,
    pub block: Block,
    pub rewards: RewardDistribution,
}

#[derive(Serialize, Deserialize)]
pub struct PeerBlockResponse {
    pub accepted: bool,
}

/* ---------- TX API Models ---------- */

/// Either a fully built (usually signed) transaction or the plain fields of
/// an unsigned one, which the node builds itself.
#[derive(Deserialize)]
#[serde(untagged)]
pub enum NewTxRequest {
    Prebuilt(Transaction),
    Draft {
        sender: String,
        receiver: String,
        amount: i64,
        #[serde(default)]
        fee: i64,
    },
}

#[derive(Serialize, Deserialize)]
pub struct NewTxResponse {
    pub message: String,
    pub index: u64,
    pub id: String,
}

#[derive(Deserialize)]
pub struct SignTxRequest {
    pub private_key: String,
    pub receiver: String,
    pub amount: i64,
    #[serde(default)]
    pub fee: i64,
}

#[derive(Serialize)]
pub struct MempoolResponse {
    pub size: usize,
    pub transactions: Vec<String>, // list ids for brevity
}

/* ---------- Network API Models ---------- */

#[derive(Deserialize)]
pub struct RegisterNodesRequest {
    pub nodes: Vec<String>,
}

#[derive(Serialize, Deserialize)]
pub struct RegisterNodesResponse {
    pub message: String,
    pub nodes: Vec<String>,
}

#[derive(Serialize)]
pub struct ResolveResponse {
    pub message: String,
    pub resolution: Resolution,
    pub length: usize,
}

/* ---------- Ledger / Stake API Models ---------- */

#[derive(Serialize, Deserialize)]
pub struct BalanceResponse {
    pub address: String,
    pub balance: Amount,
}

#[derive(Deserialize)]
pub struct RegisterValidatorRequest {
    pub address: String,
    pub stake: i64,
}

#[derive(Serialize, Deserialize)]
pub struct RegisterValidatorResponse {
    pub success: bool,
    pub stake: Amount,
    pub balance: Amount,
}

#[derive(Deserialize)]
pub struct DelegateRequest {
    pub delegator: String,
    pub validator: String,
    pub amount: i64,
}

#[derive(Serialize)]
pub struct ValidatorEntry {
    pub address: String,
    pub stake: Amount,
    pub delegators: Vec<(String, Amount)>,
}

#[derive(Serialize)]
pub struct ValidatorsResponse {
    pub total_stake: Amount,
    pub validators: Vec<ValidatorEntry>,
}

#[derive(Serialize)]
pub struct StatsResponse {
    pub node_id: String,
    pub height: usize,
    pub difficulty: u32,
    pub pending: usize,
    pub peers: usize,
    pub accounts: usize,
    pub validators: usize,
    pub total_stake: Amount,
    pub resolving: bool,
}
