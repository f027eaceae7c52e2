use log::{debug, info, warn};
use rand::Rng;
use std::collections::HashSet;
use std::sync::atomic::AtomicBool;

use super::pow::{Difficulty, proof_of_work, valid_proof};
use super::stake::{RewardDistribution, StakeRegistry};
use super::{AdmissionProof, Block, ChainConfig};
use crate::error::{ChainError, Result};
use crate::transaction::{Amount, Ledger, Transaction};

/// In-memory chain with its ledger, pending queue and validator stakes.
///
/// Every mutation goes through `&mut self`; callers sharing a chain put it
/// behind a single lock so commits never interleave on the same tip.
#[derive(Debug)]
pub struct Blockchain {
    pub chain: Vec<Block>,
    ledger: Ledger,
    pending: Vec<Transaction>,
    stakes: StakeRegistry,
    config: ChainConfig,
}

fn mismatch(index: u64, reason: impl Into<String>) -> ChainError {
    ChainError::StructuralMismatch {
        index,
        reason: reason.into(),
    }
}

impl Blockchain {
    /// Initialize a new blockchain with a genesis block.
    pub fn new(config: ChainConfig) -> Self {
        Self {
            chain: vec![Block::genesis()],
            ledger: Ledger::new(config.initial_balance),
            pending: Vec::new(),
            stakes: StakeRegistry::new(),
            config,
        }
    }

    /// Return the last block in the chain.
    pub fn last_block(&self) -> &Block {
        // `new` seeds the genesis block and `replace_chain` only accepts
        // validated chains, which always start with one.
        &self.chain[self.chain.len() - 1]
    }

    pub fn len(&self) -> usize {
        self.chain.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chain.is_empty()
    }

    pub fn difficulty(&self) -> Difficulty {
        self.config.difficulty
    }

    pub fn config(&self) -> &ChainConfig {
        &self.config
    }

    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    pub fn pending(&self) -> &[Transaction] {
        &self.pending
    }

    pub fn stakes(&self) -> &StakeRegistry {
        &self.stakes
    }

    pub fn balance_of(&self, address: &str) -> Amount {
        self.ledger.balance_of(address)
    }

    pub fn contains_transaction(&self, id: &str) -> bool {
        self.chain
            .iter()
            .any(|b| b.transactions.iter().any(|t| t.id == id))
    }

    /* -------------------- Transactions -------------------- */

    fn check_transaction(config: &ChainConfig, tx: &Transaction) -> Result<()> {
        tx.verify()?;
        if config.require_signatures && !tx.is_signed() {
            return Err(ChainError::InvalidSignature("transaction is not signed".into()));
        }
        Ok(())
    }

    /// Queue a transaction if its sender can currently cover amount + fee.
    /// Returns the index of the block it is expected to land in.
    pub fn submit_transaction(&mut self, tx: Transaction) -> Result<u64> {
        Self::check_transaction(&self.config, &tx)?;
        if self.pending.iter().any(|p| p.id == tx.id) || self.contains_transaction(&tx.id) {
            return Err(ChainError::DuplicateTransaction(tx.id));
        }
        if let Err(e) = self.ledger.ensure_funds(&tx.sender, tx.total_debit()) {
            warn!("rejected tx {}: {}", tx.id, e);
            return Err(e);
        }

        debug!(
            "queued tx {} ({} -> {}, amount={}, fee={}); pending={}",
            tx.id,
            tx.sender,
            tx.receiver,
            tx.amount,
            tx.fee,
            self.pending.len() + 1
        );
        self.pending.push(tx);
        Ok(self.chain.len() as u64)
    }

    /* -------------------- Block production -------------------- */

    fn reward_for(config: &ChainConfig, proof: &AdmissionProof) -> Amount {
        match proof {
            AdmissionProof::Genesis => 0,
            AdmissionProof::Work { .. } => config.pow_reward,
            AdmissionProof::Stake { .. } => config.pos_reward,
        }
    }

    /// Validate `proof` as the admission of a block following `previous`.
    /// A stake proof must name an address that has staked on this node.
    fn check_proof(
        config: &ChainConfig,
        stakes: &StakeRegistry,
        previous: &Block,
        index: u64,
        proof: &AdmissionProof,
    ) -> Result<()> {
        match proof {
            AdmissionProof::Genesis => Err(mismatch(index, "genesis proof outside genesis")),
            AdmissionProof::Work { nonce, miner } => {
                if miner.is_empty() {
                    return Err(mismatch(index, "empty miner address"));
                }
                if !valid_proof(&previous.hash, *nonce, config.difficulty) {
                    return Err(mismatch(index, "nonce does not meet difficulty"));
                }
                Ok(())
            }
            AdmissionProof::Stake { validator } if validator.is_empty() => {
                Err(mismatch(index, "empty validator address"))
            }
            AdmissionProof::Stake { validator } if !stakes.has_staked(validator) => {
                Err(mismatch(index, format!("validator {validator} holds no stake")))
            }
            AdmissionProof::Stake { .. } => Ok(()),
        }
    }

    /// Commit `transactions` admitted by `proof` on top of the current tip.
    ///
    /// Each transaction is re-checked against the ledger as it stands now;
    /// those that no longer fit are dropped. Fees and the block reward go
    /// to the proof's beneficiary. Every transaction in the batch leaves the
    /// pending queue, committed or not.
    pub fn commit_block(&mut self, transactions: Vec<Transaction>, proof: AdmissionProof) -> Result<Block> {
        let index = self.chain.len() as u64;
        self.ensure_active_validator(&proof)?;
        Self::check_proof(&self.config, &self.stakes, self.last_block(), index, &proof)?;

        let beneficiary = proof.beneficiary();
        let mut working = self.ledger.clone();
        let batch: HashSet<String> = transactions.iter().map(|t| t.id.clone()).collect();
        let mut committed = Vec::with_capacity(transactions.len());
        let mut seen = HashSet::new();

        for tx in transactions {
            let admissible = Self::check_transaction(&self.config, &tx)
                .and_then(|_| {
                    if !seen.insert(tx.id.clone()) || self.contains_transaction(&tx.id) {
                        return Err(ChainError::DuplicateTransaction(tx.id.clone()));
                    }
                    Ok(())
                })
                .and_then(|_| working.apply(&tx, beneficiary));
            match admissible {
                Ok(()) => committed.push(tx),
                Err(e) => warn!("dropping tx {} from block #{}: {}", tx.id, index, e),
            }
        }

        if let Some(beneficiary) = beneficiary {
            working.credit(beneficiary, Self::reward_for(&self.config, &proof));
        }

        let block = Block::new(index, committed, self.last_block().hash.clone(), proof);
        self.ledger = working;
        self.pending.retain(|t| !batch.contains(&t.id));
        self.chain.push(block.clone());

        info!(
            "committed block #{} (hash={}, txs={}, dropped={})",
            block.index,
            block.hash,
            block.transactions.len(),
            batch.len() - block.transactions.len()
        );
        Ok(block)
    }

    /// New stake blocks, local or pushed, need a validator that holds stake now.
    fn ensure_active_validator(&self, proof: &AdmissionProof) -> Result<()> {
        match proof {
            AdmissionProof::Stake { validator } if !self.stakes.is_validator(validator) => {
                Err(ChainError::UnknownValidator(validator.clone()))
            }
            _ => Ok(()),
        }
    }

    fn take_pending(&self) -> Result<Vec<Transaction>> {
        if self.pending.is_empty() {
            return Err(ChainError::NoCandidate("no pending transactions"));
        }
        Ok(self.pending.clone())
    }

    /// Commit the pending queue with a nonce found for `expected_tip`.
    /// Fails with `StaleProof` if the tip moved in the meantime.
    pub fn commit_mined(&mut self, expected_tip: &str, nonce: u64, miner: &str) -> Result<Block> {
        if self.last_block().hash != expected_tip {
            return Err(ChainError::StaleProof);
        }
        let transactions = self.take_pending()?;
        self.commit_block(
            transactions,
            AdmissionProof::Work {
                nonce,
                miner: miner.to_string(),
            },
        )
    }

    /// Mine the pending queue in the caller's thread (no cancellation).
    pub fn mine_pending(&mut self, miner: &str) -> Result<Block> {
        self.take_pending()?;
        let tip = self.last_block().hash.clone();
        let never = AtomicBool::new(false);
        let nonce = proof_of_work(&tip, self.config.difficulty, &never)
            .ok_or(ChainError::MiningCancelled(self.chain.len() as u64))?;
        self.commit_mined(&tip, nonce, miner)
    }

    /* -------------------- Proof of Stake -------------------- */

    /// Lock `stake` from `address`'s balance. Returns false when it can't cover it.
    pub fn register_validator(&mut self, address: &str, stake: Amount) -> bool {
        if let Err(e) = self.ledger.debit(address, stake) {
            warn!("validator registration refused: {}", e);
            return false;
        }
        self.stakes.add_stake(address, stake);
        info!(
            "{} is now a validator with stake {}",
            address,
            self.stakes.stake_of(address)
        );
        true
    }

    /// Lock `amount` from `delegator` and add it to `validator`'s stake.
    pub fn delegate_stake(&mut self, delegator: &str, validator: &str, amount: Amount) -> Result<()> {
        if !self.stakes.is_validator(validator) {
            return Err(ChainError::UnknownValidator(validator.to_string()));
        }
        self.ledger.debit(delegator, amount)?;
        self.stakes.delegate(delegator, validator, amount)?;
        info!("{} delegated {} to {}", delegator, amount, validator);
        Ok(())
    }

    pub fn select_validator<R: Rng + ?Sized>(&self, rng: &mut R) -> Option<String> {
        self.stakes.select_validator(rng)
    }

    /// Produce a PoS block from the pending queue.
    ///
    /// The validator's reward is credited by the commit; the returned
    /// distribution reports what each delegator is owed out of it.
    pub fn forge_block<R: Rng + ?Sized>(&mut self, rng: &mut R) -> Result<(Block, RewardDistribution)> {
        let transactions = self.take_pending()?;
        let validator = self
            .select_validator(rng)
            .ok_or(ChainError::NoCandidate("no validator holds stake"))?;

        let block = self.commit_block(
            transactions,
            AdmissionProof::Stake {
                validator: validator.clone(),
            },
        )?;
        let distribution = self
            .stakes
            .distribute_reward(&validator, self.config.pos_reward);
        for share in &distribution.delegator_shares {
            debug!(
                "delegator {} owed {} from block #{} reward",
                share.delegator, share.share, block.index
            );
        }
        Ok((block, distribution))
    }

    /* -------------------- Validation & consensus -------------------- */

    /// Apply a block's transactions and reward to `ledger`; any overdraw
    /// makes the whole block invalid, and so does a transaction id already
    /// in `seen` (committed earlier or repeated within the block).
    fn settle(
        config: &ChainConfig,
        ledger: &mut Ledger,
        seen: &mut HashSet<String>,
        block: &Block,
    ) -> Result<()> {
        let beneficiary = block.proof.beneficiary();
        for tx in &block.transactions {
            if !seen.insert(tx.id.clone()) {
                return Err(mismatch(
                    block.index,
                    format!("transaction {} is already on the chain", tx.id),
                ));
            }
            Self::check_transaction(config, tx).map_err(|e| mismatch(block.index, e.to_string()))?;
            ledger
                .apply(tx, beneficiary)
                .map_err(|e| mismatch(block.index, e.to_string()))?;
        }
        if let Some(beneficiary) = beneficiary {
            ledger.credit(beneficiary, Self::reward_for(config, &block.proof));
        }
        Ok(())
    }

    /// Structural checks of `block` as the successor of `previous`.
    fn check_successor(
        config: &ChainConfig,
        stakes: &StakeRegistry,
        previous: &Block,
        block: &Block,
    ) -> Result<()> {
        let index = block.index;
        if index != previous.index + 1 {
            return Err(mismatch(index, "index does not follow previous block"));
        }
        if block.previous_hash != previous.hash {
            return Err(mismatch(index, "previous hash does not link"));
        }
        if block.hash != block.compute_hash() {
            return Err(mismatch(index, "stored hash differs from recomputed hash"));
        }
        if block.merkle_root != Block::merkle_root_of(&block.transactions) {
            return Err(mismatch(index, "merkle root differs from transactions"));
        }
        Self::check_proof(config, stakes, previous, index, &block.proof)
    }

    /// Validate a whole chain (fail-fast) and return the ledger obtained by
    /// replaying it on fresh default balances.
    ///
    /// Stake blocks are checked against the local `stakes`, since validator
    /// registrations are not carried on the chain.
    pub fn validate_chain(chain: &[Block], config: &ChainConfig, stakes: &StakeRegistry) -> Result<Ledger> {
        let genesis = chain.first().ok_or_else(|| mismatch(0, "empty chain"))?;
        if genesis.index != 0
            || genesis.previous_hash != Block::genesis_previous_hash()
            || genesis.proof != AdmissionProof::Genesis
            || !genesis.transactions.is_empty()
            || !genesis.is_intact()
        {
            return Err(mismatch(0, "malformed genesis block"));
        }

        let mut ledger = Ledger::new(config.initial_balance);
        let mut seen = HashSet::new();
        for pair in chain.windows(2) {
            Self::check_successor(config, stakes, &pair[0], &pair[1])?;
            Self::settle(config, &mut ledger, &mut seen, &pair[1])?;
        }
        Ok(ledger)
    }

    pub fn validate(&self) -> Result<()> {
        Self::validate_chain(&self.chain, &self.config, &self.stakes).map(|_| ())
    }

    /// Validate the entire chain: genesis, linkage, hashes, proofs and balances.
    pub fn is_valid(&self) -> bool {
        match self.validate() {
            Ok(()) => true,
            Err(e) => {
                warn!("chain invalid: {}", e);
                false
            }
        }
    }

    /// Append a block pushed by a peer if it extends the current tip.
    pub fn accept_block(&mut self, block: Block) -> Result<()> {
        self.ensure_active_validator(&block.proof)?;
        Self::check_successor(&self.config, &self.stakes, self.last_block(), &block)?;
        let mut working = self.ledger.clone();
        let mut seen: HashSet<String> = self
            .chain
            .iter()
            .flat_map(|b| b.transactions.iter().map(|t| t.id.clone()))
            .collect();
        Self::settle(&self.config, &mut working, &mut seen, &block)?;

        let included: HashSet<&str> = block.transactions.iter().map(|t| t.id.as_str()).collect();
        self.pending.retain(|t| !included.contains(t.id.as_str()));
        self.ledger = working;
        info!("accepted peer block #{} (hash={})", block.index, block.hash);
        self.chain.push(block);
        Ok(())
    }

    /// Adopt `chain` if it validates, rebuilding the ledger by replay.
    ///
    /// Local stakes are locked again on the rebuilt ledger; validators whose
    /// stake can no longer be covered are dropped.
    pub fn replace_chain(&mut self, chain: Vec<Block>) -> Result<()> {
        let mut ledger = Self::validate_chain(&chain, &self.config, &self.stakes)?;

        let validators: Vec<String> = self.stakes.iter().map(|(v, _)| v.clone()).collect();
        for validator in validators {
            let mut trial = ledger.clone();
            let delegated: Vec<(String, Amount)> = self
                .stakes
                .delegators_of(&validator)
                .map(|d| d.iter().map(|(k, v)| (k.clone(), *v)).collect())
                .unwrap_or_default();
            let own = self.stakes.stake_of(&validator)
                - delegated.iter().map(|(_, a)| *a).sum::<Amount>();

            let relocked = trial.debit(&validator, own).and_then(|_| {
                delegated
                    .iter()
                    .try_for_each(|(delegator, amount)| trial.debit(delegator, *amount))
            });
            match relocked {
                Ok(()) => ledger = trial,
                Err(e) => {
                    warn!("dropping validator {} after chain replacement: {}", validator, e);
                    self.stakes.remove(&validator);
                }
            }
        }

        let included: HashSet<&str> = chain
            .iter()
            .flat_map(|b| b.transactions.iter().map(|t| t.id.as_str()))
            .collect();
        self.pending.retain(|t| !included.contains(t.id.as_str()));
        self.ledger = ledger;
        self.chain = chain;
        info!("chain replaced; new length {}", self.chain.len());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wallet::Keypair;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn config() -> ChainConfig {
        ChainConfig {
            difficulty: Difficulty::new(1),
            ..ChainConfig::default()
        }
    }

    fn tx(sender: &str, receiver: &str, amount: i64, fee: i64) -> Transaction {
        Transaction::new(sender, receiver, amount, fee, None).unwrap()
    }

    #[test]
    fn genesis_only_chain_is_valid() {
        let bc = Blockchain::new(config());
        assert_eq!(bc.len(), 1);
        assert_eq!(bc.last_block().previous_hash, "0".repeat(64));
        assert!(bc.is_valid());
    }

    #[test]
    fn overspend_is_rejected_without_side_effects() {
        let mut bc = Blockchain::new(config());
        let err = bc.submit_transaction(tx("X", "Y", 150, 0)).unwrap_err();
        assert!(matches!(err, ChainError::InsufficientBalance { required: 150, available: 100, .. }));
        assert_eq!(bc.balance_of("X"), 100);
        assert!(bc.pending().is_empty());
    }

    #[test]
    fn duplicate_submission_is_rejected() {
        let mut bc = Blockchain::new(config());
        let t = tx("alice", "bob", 1, 0);
        bc.submit_transaction(t.clone()).unwrap();
        assert_eq!(
            bc.submit_transaction(t.clone()),
            Err(ChainError::DuplicateTransaction(t.id))
        );
    }

    #[test]
    fn chain_stays_valid_after_every_commit() {
        let mut bc = Blockchain::new(config());
        for round in 0..4 {
            bc.submit_transaction(tx("alice", "bob", 5, 1)).unwrap();
            bc.submit_transaction(tx("bob", "carol", 3, 0)).unwrap();
            let block = bc.mine_pending("miner").unwrap();
            assert_eq!(block.index, round + 1);
            assert!(bc.is_valid());
        }
        assert!(bc.pending().is_empty());
        // 4 rounds: alice -24, bob +20 -12, carol +12, miner +4 fees +40 rewards
        assert_eq!(bc.balance_of("alice"), 76);
        assert_eq!(bc.balance_of("bob"), 108);
        assert_eq!(bc.balance_of("carol"), 112);
        assert_eq!(bc.balance_of("miner"), 144);
    }

    #[test]
    fn commit_drops_transactions_that_no_longer_fit() {
        let mut bc = Blockchain::new(config());
        // Both individually admissible, together they overspend.
        bc.submit_transaction(tx("X", "Y", 80, 0)).unwrap();
        bc.submit_transaction(tx("X", "Z", 80, 0)).unwrap();
        let block = bc.mine_pending("miner").unwrap();

        assert_eq!(block.transactions.len(), 1);
        assert_eq!(bc.balance_of("X"), 20);
        assert_eq!(bc.balance_of("Y"), 180);
        assert_eq!(bc.balance_of("Z"), 100);
        assert!(bc.pending().is_empty());
        assert!(bc.is_valid());
    }

    #[test]
    fn tampered_block_invalidates_chain() {
        let mut bc = Blockchain::new(config());
        bc.submit_transaction(tx("alice", "bob", 5, 0)).unwrap();
        bc.mine_pending("miner").unwrap();
        bc.submit_transaction(tx("bob", "alice", 1, 0)).unwrap();
        bc.mine_pending("miner").unwrap();
        assert!(bc.is_valid());

        bc.chain[1].transactions.push(tx("mallory", "mallory", 1, 0));
        assert!(!bc.is_valid());
        assert!(matches!(
            bc.validate(),
            Err(ChainError::StructuralMismatch { index: 1, .. })
        ));
    }

    #[test]
    fn relinked_block_invalidates_chain() {
        let mut bc = Blockchain::new(config());
        bc.submit_transaction(tx("alice", "bob", 5, 0)).unwrap();
        bc.mine_pending("miner").unwrap();
        bc.chain[1].previous_hash = "f".repeat(64);
        bc.chain[1].hash = bc.chain[1].compute_hash();
        assert!(!bc.is_valid());
    }

    #[test]
    fn bad_nonce_is_refused_at_commit() {
        let mut bc = Blockchain::new(ChainConfig {
            difficulty: Difficulty::new(4),
            ..ChainConfig::default()
        });
        let tip = bc.last_block().hash.clone();
        let bad = (0..u64::MAX)
            .find(|n| !valid_proof(&tip, *n, Difficulty::new(4)))
            .unwrap();
        bc.submit_transaction(tx("alice", "bob", 1, 0)).unwrap();
        assert!(matches!(
            bc.commit_mined(&tip, bad, "miner"),
            Err(ChainError::StructuralMismatch { .. })
        ));
        assert_eq!(bc.len(), 1);
        assert_eq!(bc.pending().len(), 1);
    }

    #[test]
    fn stale_tip_is_refused() {
        let mut bc = Blockchain::new(config());
        bc.submit_transaction(tx("alice", "bob", 1, 0)).unwrap();
        assert_eq!(bc.commit_mined("not-the-tip", 0, "miner"), Err(ChainError::StaleProof));
    }

    #[test]
    fn mining_with_empty_pool_has_no_candidate() {
        let mut bc = Blockchain::new(config());
        assert!(matches!(bc.mine_pending("miner"), Err(ChainError::NoCandidate(_))));
    }

    #[test]
    fn signature_policy_is_enforced() {
        let mut bc = Blockchain::new(ChainConfig {
            require_signatures: true,
            ..config()
        });
        assert!(matches!(
            bc.submit_transaction(tx("alice", "bob", 1, 0)),
            Err(ChainError::InvalidSignature(_))
        ));

        let kp = Keypair::generate();
        let signed = Transaction::new(kp.address(), "bob", 1, 0, Some(&kp)).unwrap();
        bc.submit_transaction(signed).unwrap();
        bc.mine_pending("miner").unwrap();
        assert_eq!(bc.balance_of(&kp.address()), 99);
        assert!(bc.is_valid());
    }

    #[test]
    fn validator_registration_and_forging() {
        let mut bc = Blockchain::new(config());
        let mut rng = StdRng::seed_from_u64(7);

        assert!(!bc.register_validator("poor", 500));
        assert_eq!(bc.balance_of("poor"), 100);

        assert!(bc.register_validator("A", 50));
        assert_eq!(bc.balance_of("A"), 50);
        assert_eq!(
            bc.delegate_stake("C", "ghost", 20),
            Err(ChainError::UnknownValidator("ghost".into()))
        );
        bc.delegate_stake("C", "A", 20).unwrap();
        assert_eq!(bc.balance_of("C"), 80);
        assert_eq!(bc.stakes().stake_of("A"), 70);

        assert!(matches!(bc.forge_block(&mut rng), Err(ChainError::NoCandidate(_))));

        bc.submit_transaction(tx("alice", "bob", 10, 2)).unwrap();
        let (block, dist) = bc.forge_block(&mut rng).unwrap();
        assert_eq!(block.proof, AdmissionProof::Stake { validator: "A".into() });
        // 50 left after staking, +2 fee, +5 reward
        assert_eq!(bc.balance_of("A"), 57);
        assert_eq!(dist.reward, 5);
        assert_eq!(dist.delegator_shares[0].delegator, "C");
        assert_eq!(dist.delegator_shares[0].share, 1);
        assert!(bc.is_valid());
    }

    #[test]
    fn peer_block_must_extend_tip() {
        let mut a = Blockchain::new(config());
        let mut b = Blockchain::new(config());
        assert_eq!(a.last_block(), b.last_block());

        a.submit_transaction(tx("alice", "bob", 5, 0)).unwrap();
        let block = a.mine_pending("miner-a").unwrap();

        let mut forged = block.clone();
        forged.previous_hash = "1".repeat(64);
        assert!(b.accept_block(forged).is_err());

        b.accept_block(block).unwrap();
        assert_eq!(b.len(), 2);
        assert_eq!(b.balance_of("bob"), 105);
        assert!(b.is_valid());
    }

    #[test]
    fn replacement_replays_ledger_and_relocks_stakes() {
        let mut long = Blockchain::new(config());
        long.submit_transaction(tx("V", "sink", 90, 0)).unwrap();
        long.mine_pending("miner").unwrap();

        let mut local = Blockchain::new(config());
        assert!(local.register_validator("V", 50));
        assert!(local.register_validator("W", 10));
        local.submit_transaction(tx("sink", "x", 1, 0)).unwrap();

        local.replace_chain(long.chain.clone()).unwrap();
        assert_eq!(local.len(), 2);
        // V only has 10 left on the adopted chain, W still covers its stake.
        assert!(!local.stakes().is_validator("V"));
        assert_eq!(local.balance_of("V"), 10);
        assert_eq!(local.balance_of("W"), 90);
        assert_eq!(local.balance_of("miner"), 110);
        assert_eq!(local.pending().len(), 1);
    }

    fn mined_on_tip(bc: &Blockchain, transactions: Vec<Transaction>, miner: &str) -> Block {
        let (_, block) = Block::mine(
            bc.len() as u64,
            transactions,
            bc.last_block().hash.clone(),
            miner.to_string(),
            bc.difficulty(),
        );
        block
    }

    #[test]
    fn peer_block_replaying_committed_transaction_is_refused() {
        let mut bc = Blockchain::new(config());
        let transfer = tx("alice", "bob", 30, 0);
        bc.submit_transaction(transfer.clone()).unwrap();
        bc.mine_pending("miner").unwrap();

        let replay = mined_on_tip(&bc, vec![transfer], "evil");
        assert!(matches!(
            bc.accept_block(replay.clone()),
            Err(ChainError::StructuralMismatch { index: 2, .. })
        ));
        assert_eq!(bc.len(), 2);
        assert_eq!(bc.balance_of("alice"), 70);
        assert_eq!(bc.balance_of("bob"), 130);

        // Forcing it in anyway breaks validation of the whole chain.
        bc.chain.push(replay);
        assert!(!bc.is_valid());
    }

    #[test]
    fn transaction_repeated_within_a_block_is_refused() {
        let mut bc = Blockchain::new(config());
        let transfer = tx("alice", "bob", 10, 0);
        let doubled = mined_on_tip(&bc, vec![transfer.clone(), transfer], "evil");
        assert!(bc.accept_block(doubled).is_err());
        assert_eq!(bc.len(), 1);
        assert_eq!(bc.balance_of("alice"), 100);
    }

    #[test]
    fn chain_with_replayed_transaction_is_not_adopted() {
        let mut other = Blockchain::new(config());
        let transfer = tx("alice", "bob", 30, 0);
        other.submit_transaction(transfer.clone()).unwrap();
        other.mine_pending("miner").unwrap();
        let replay = mined_on_tip(&other, vec![transfer], "evil");
        other.chain.push(replay);

        let mut local = Blockchain::new(config());
        assert!(matches!(
            local.replace_chain(other.chain.clone()),
            Err(ChainError::StructuralMismatch { index: 2, .. })
        ));
        assert_eq!(local.len(), 1);
    }

    #[test]
    fn peer_stake_block_from_unstaked_validator_is_refused() {
        let mut bc = Blockchain::new(ChainConfig {
            difficulty: Difficulty::new(6),
            ..ChainConfig::default()
        });
        let free = Block::new(
            1,
            Vec::new(),
            bc.last_block().hash.clone(),
            AdmissionProof::Stake {
                validator: "nobody-staked".into(),
            },
        );
        assert_eq!(
            bc.accept_block(free.clone()),
            Err(ChainError::UnknownValidator("nobody-staked".into()))
        );
        assert_eq!(bc.len(), 1);
        assert_eq!(bc.balance_of("nobody-staked"), 100);
        assert!(bc.replace_chain(vec![Block::genesis(), free]).is_err());
    }

    #[test]
    fn peer_stake_block_from_known_validator_is_accepted() {
        let mut bc = Blockchain::new(config());
        assert!(bc.register_validator("V", 40));
        let block = Block::new(
            1,
            vec![tx("alice", "bob", 5, 1)],
            bc.last_block().hash.clone(),
            AdmissionProof::Stake { validator: "V".into() },
        );
        bc.accept_block(block).unwrap();
        // 60 after staking, +1 fee, +5 reward
        assert_eq!(bc.balance_of("V"), 66);
        assert!(bc.is_valid());
    }

    #[test]
    fn retired_validator_keeps_its_blocks_valid() {
        let mut bc = Blockchain::new(config());
        let mut rng = StdRng::seed_from_u64(3);
        assert!(bc.register_validator("V", 60));
        bc.submit_transaction(tx("alice", "bob", 5, 0)).unwrap();
        bc.forge_block(&mut rng).unwrap();

        // A longer chain extending ours where V spends what it had left.
        let mut longer = bc.chain.clone();
        let spend = tx("V", "sink", 50, 0);
        let (_, next) = Block::mine(
            2,
            vec![spend],
            longer[1].hash.clone(),
            "miner".into(),
            bc.difficulty(),
        );
        longer.push(next);

        bc.replace_chain(longer).unwrap();
        assert!(!bc.stakes().is_validator("V"));
        assert!(bc.is_valid());
    }

    #[test]
    fn invalid_replacement_is_refused() {
        let mut other = Blockchain::new(config());
        other.submit_transaction(tx("alice", "bob", 5, 0)).unwrap();
        other.mine_pending("miner").unwrap();
        other.chain[1].transactions.clear();

        let mut local = Blockchain::new(config());
        assert!(local.replace_chain(other.chain.clone()).is_err());
        assert_eq!(local.len(), 1);
    }
}
