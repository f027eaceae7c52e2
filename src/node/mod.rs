//! A consensus participant: one chain, a peer set, gossip and
//! longest-valid-chain conflict resolution.
//!
//! Known limitation: resolution adopts the longest valid chain reported by
//! any peer. Nothing weighs forks by work or stake and nothing tolerates
//! Byzantine peers; a peer with a longer valid chain always wins.

pub mod peer;

use actix_web::web;
use futures::future::join_all;
use log::{debug, info, warn};
use serde::Serialize;
use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use crate::blockchain::{Block, Blockchain, ChainConfig, RewardDistribution, proof_of_work};
use crate::error::{ChainError, Result};
use crate::transaction::{Amount, Transaction};

pub use peer::{ChainSnapshot, HttpPeerClient, LocalPeers, PeerClient};

/// Result of a conflict-resolution pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Resolution {
    Replaced,
    Authoritative,
}

pub struct Node {
    id: String,
    blockchain: Mutex<Blockchain>,
    peers: Mutex<BTreeSet<String>>,
    client: Arc<dyn PeerClient>,
    /// Cancellation flags of in-flight proof searches, keyed by target height.
    mining: Mutex<HashMap<u64, Arc<AtomicBool>>>,
    resolving: AtomicBool,
}

fn normalize_peer(address: &str) -> Option<String> {
    let peer = address
        .trim()
        .trim_start_matches("http://")
        .trim_end_matches('/');
    (!peer.is_empty()).then(|| peer.to_string())
}

impl Node {
    pub fn new(id: impl Into<String>, config: ChainConfig, client: Arc<dyn PeerClient>) -> Self {
        Self {
            id: id.into(),
            blockchain: Mutex::new(Blockchain::new(config)),
            peers: Mutex::new(BTreeSet::new()),
            client,
            mining: Mutex::new(HashMap::new()),
            resolving: AtomicBool::new(false),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Exclusive access to the chain; every mutation happens under this lock.
    pub fn blockchain(&self) -> MutexGuard<'_, Blockchain> {
        self.blockchain.lock().expect("mutex poisoned")
    }

    pub fn is_resolving(&self) -> bool {
        self.resolving.load(Ordering::SeqCst)
    }

    /* -------------------- Peers -------------------- */

    /// Add a peer (idempotent) and return the updated set.
    pub fn register_peer(&self, address: &str) -> Vec<String> {
        let mut peers = self.peers.lock().expect("mutex poisoned");
        if let Some(peer) = normalize_peer(address) {
            if peers.insert(peer.clone()) {
                info!("registered peer {}", peer);
            }
        }
        peers.iter().cloned().collect()
    }

    pub fn peers(&self) -> Vec<String> {
        self.peers
            .lock()
            .expect("mutex poisoned")
            .iter()
            .cloned()
            .collect()
    }

    /* -------------------- Reads -------------------- */

    pub fn chain_snapshot(&self) -> ChainSnapshot {
        let bc = self.blockchain();
        ChainSnapshot {
            length: bc.len(),
            chain: bc.chain.clone(),
        }
    }

    pub fn balance_of(&self, address: &str) -> Amount {
        self.blockchain().balance_of(address)
    }

    /* -------------------- Transactions -------------------- */

    /// Admit a client transaction and gossip it to peers.
    pub async fn submit_transaction(&self, tx: Transaction) -> Result<u64> {
        let index = self.blockchain().submit_transaction(tx.clone())?;
        self.broadcast_transaction(&tx).await;
        Ok(index)
    }

    /// Admit a transaction gossiped by a peer; it is not relayed further.
    pub fn receive_transaction(&self, tx: Transaction) -> Result<u64> {
        self.blockchain().submit_transaction(tx)
    }

    /* -------------------- Blocks -------------------- */

    /// Append a block pushed by a peer when it extends our tip.
    ///
    /// Anything else is ignored; a later `resolve_conflicts` heals forks.
    pub fn receive_block(&self, block: Block) -> bool {
        let index = block.index;
        let outcome = self.blockchain().accept_block(block);
        match outcome {
            Ok(()) => {
                self.cancel_mining_through(index);
                true
            }
            Err(e) => {
                debug!("ignoring peer block #{}: {}", index, e);
                false
            }
        }
    }

    fn begin_mining(&self, height: u64) -> Arc<AtomicBool> {
        self.mining
            .lock()
            .expect("mutex poisoned")
            .entry(height)
            .or_insert_with(|| Arc::new(AtomicBool::new(false)))
            .clone()
    }

    fn end_mining(&self, height: u64) {
        self.mining.lock().expect("mutex poisoned").remove(&height);
    }

    /// Raise the flag of every search targeting a height up to `index`.
    fn cancel_mining_through(&self, index: u64) {
        let mining = self.mining.lock().expect("mutex poisoned");
        for (height, flag) in mining.iter().filter(|(h, _)| **h <= index) {
            info!("cancelling proof search for height {}", height);
            flag.store(true, Ordering::SeqCst);
        }
    }

    fn cancel_all_mining(&self) {
        for flag in self.mining.lock().expect("mutex poisoned").values() {
            flag.store(true, Ordering::SeqCst);
        }
    }

    /// Search a proof for the current tip on the blocking pool, then commit
    /// the pending queue with it and gossip the block.
    ///
    /// A competing block accepted for the same height cancels the search
    /// (`MiningCancelled`); a tip that moved otherwise yields `StaleProof`.
    pub async fn mine(&self, miner: &str) -> Result<Block> {
        let (tip, height, difficulty) = {
            let bc = self.blockchain();
            if bc.pending().is_empty() {
                return Err(ChainError::NoCandidate("no pending transactions"));
            }
            (bc.last_block().hash.clone(), bc.len() as u64, bc.difficulty())
        };

        let cancel = self.begin_mining(height);
        debug!("mining height {} on tip {} (difficulty {})", height, tip, difficulty.leading_zeros());
        let previous = tip.clone();
        let searched = web::block(move || proof_of_work(&previous, difficulty, &cancel)).await;
        self.end_mining(height);

        let nonce = match searched {
            Ok(Some(nonce)) => nonce,
            Ok(None) | Err(_) => {
                info!("mining for height {} cancelled", height);
                return Err(ChainError::MiningCancelled(height));
            }
        };

        let block = self.blockchain().commit_mined(&tip, nonce, miner)?;
        info!("MINER - sealed block #{} (hash={}, nonce={})", block.index, block.hash, nonce);
        self.broadcast_block(&block).await;
        Ok(block)
    }

    /// Forge a PoS block from the pending queue and gossip it.
    pub async fn forge(&self) -> Result<(Block, RewardDistribution)> {
        let forged = {
            let mut rng = rand::thread_rng();
            self.blockchain().forge_block(&mut rng)
        }?;
        self.broadcast_block(&forged.0).await;
        Ok(forged)
    }

    pub fn register_validator(&self, address: &str, stake: Amount) -> bool {
        self.blockchain().register_validator(address, stake)
    }

    pub fn delegate_stake(&self, delegator: &str, validator: &str, amount: Amount) -> Result<()> {
        self.blockchain().delegate_stake(delegator, validator, amount)
    }

    /* -------------------- Gossip -------------------- */

    /// Best-effort send to every peer; failures are logged and skipped.
    /// Returns how many peers took the block.
    pub async fn broadcast_block(&self, block: &Block) -> usize {
        let peers = self.peers();
        let sends = peers.iter().map(|p| self.client.push_block(p, block));
        Self::tally("block", &peers, join_all(sends).await)
    }

    pub async fn broadcast_transaction(&self, tx: &Transaction) -> usize {
        let peers = self.peers();
        let sends = peers.iter().map(|p| self.client.push_transaction(p, tx));
        Self::tally("transaction", &peers, join_all(sends).await)
    }

    fn tally(what: &str, peers: &[String], results: Vec<Result<()>>) -> usize {
        let mut delivered = 0;
        for (peer, result) in peers.iter().zip(results) {
            match result {
                Ok(()) => delivered += 1,
                Err(e) => warn!("broadcast of {} to {} failed: {}", what, peer, e),
            }
        }
        debug!("{} broadcast: {}/{} peers", what, delivered, peers.len());
        delivered
    }

    /* -------------------- Consensus -------------------- */

    /// Fetch every peer's chain and adopt the longest one that is strictly
    /// longer than ours and validates. Ties keep the local chain.
    pub async fn resolve_conflicts(&self) -> Resolution {
        self.resolving.store(true, Ordering::SeqCst);
        let peers = self.peers();
        let fetches = peers.iter().map(|p| self.client.fetch_chain(p));
        let fetched = join_all(fetches).await;

        let local_len = self.blockchain().len();
        let mut candidates: Vec<Vec<Block>> = Vec::new();
        for (peer, result) in peers.iter().zip(fetched) {
            match result {
                Ok(snapshot) if snapshot.length != snapshot.chain.len() => {
                    warn!("peer {} reported length {} for {} blocks", peer, snapshot.length, snapshot.chain.len());
                }
                Ok(snapshot) if snapshot.length > local_len => candidates.push(snapshot.chain),
                Ok(_) => {}
                Err(e) => warn!("skipping peer {} during resolution: {}", peer, e),
            }
        }
        // Stable sort: among equally long chains the first peer wins.
        candidates.sort_by(|a, b| b.len().cmp(&a.len()));

        let mut resolution = Resolution::Authoritative;
        {
            let mut bc = self.blockchain();
            for chain in candidates {
                if chain.len() <= bc.len() {
                    break;
                }
                let length = chain.len();
                match bc.replace_chain(chain) {
                    Ok(()) => {
                        resolution = Resolution::Replaced;
                        break;
                    }
                    Err(e) => warn!("rejecting peer chain of length {}: {}", length, e),
                }
            }
        }

        if resolution == Resolution::Replaced {
            self.cancel_all_mining();
        }
        info!("conflict resolution: {:?}", resolution);
        self.resolving.store(false, Ordering::SeqCst);
        resolution
    }
}
