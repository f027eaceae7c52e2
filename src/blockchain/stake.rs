use rand::Rng;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

use crate::error::{ChainError, Result};
use crate::transaction::Amount;

/// Validator stakes plus the delegations that make up part of them.
///
/// A validator's stake includes what was delegated to it; the delegation
/// map only records who contributed how much.
#[derive(Debug, Clone, Default, Serialize)]
pub struct StakeRegistry {
    stakes: BTreeMap<String, Amount>,
    delegations: BTreeMap<String, BTreeMap<String, Amount>>,
    /// Validators dropped after a chain replacement. Their earlier blocks
    /// stay admissible but they are never selected again.
    retired: BTreeSet<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DelegatorShare {
    pub delegator: String,
    pub share: Amount,
}

/// Outcome of rewarding a validator. Only `reward` reaches the ledger;
/// delegator shares are reported for off-chain settlement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RewardDistribution {
    pub validator: String,
    pub reward: Amount,
    pub delegator_shares: Vec<DelegatorShare>,
}

impl StakeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_validator(&self, address: &str) -> bool {
        self.stakes.contains_key(address)
    }

    /// Registered now or at some earlier point.
    pub fn has_staked(&self, address: &str) -> bool {
        self.is_validator(address) || self.retired.contains(address)
    }

    pub fn stake_of(&self, address: &str) -> Amount {
        self.stakes.get(address).copied().unwrap_or(0)
    }

    pub fn total_stake(&self) -> Amount {
        self.stakes.values().fold(0, |acc, s| acc.saturating_add(*s))
    }

    pub fn add_stake(&mut self, validator: &str, amount: Amount) {
        let stake = self.stakes.entry(validator.to_string()).or_insert(0);
        *stake = stake.saturating_add(amount);
    }

    /// Grow `validator`'s stake on behalf of `delegator`.
    pub fn delegate(&mut self, delegator: &str, validator: &str, amount: Amount) -> Result<()> {
        if !self.is_validator(validator) {
            return Err(ChainError::UnknownValidator(validator.to_string()));
        }
        self.add_stake(validator, amount);
        let delegated = self
            .delegations
            .entry(validator.to_string())
            .or_default()
            .entry(delegator.to_string())
            .or_insert(0);
        *delegated = delegated.saturating_add(amount);
        Ok(())
    }

    pub fn delegators_of(&self, validator: &str) -> Option<&BTreeMap<String, Amount>> {
        self.delegations.get(validator)
    }

    /// Drop a validator together with its delegation records.
    pub fn remove(&mut self, validator: &str) -> Amount {
        self.delegations.remove(validator);
        match self.stakes.remove(validator) {
            Some(stake) => {
                self.retired.insert(validator.to_string());
                stake
            }
            None => 0,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Amount)> {
        self.stakes.iter()
    }

    pub fn len(&self) -> usize {
        self.stakes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stakes.is_empty()
    }

    /// Stake-weighted draw: uniform over `[0, total)`, then the first
    /// validator whose cumulative stake exceeds the draw. `None` when no
    /// stake is registered. Each call is independent of earlier ones.
    pub fn select_validator<R: Rng + ?Sized>(&self, rng: &mut R) -> Option<String> {
        let total = self.total_stake();
        if total == 0 {
            return None;
        }
        let draw = rng.gen_range(0..total);
        let mut cumulative: Amount = 0;
        for (validator, stake) in &self.stakes {
            cumulative = cumulative.saturating_add(*stake);
            if cumulative > draw {
                return Some(validator.clone());
            }
        }
        None
    }

    /// Split report for `reward`: each delegator is owed
    /// `reward * delegated / validator_stake`, rounded down.
    pub fn distribute_reward(&self, validator: &str, reward: Amount) -> RewardDistribution {
        let total = self.stake_of(validator);
        let delegator_shares = match (self.delegations.get(validator), total) {
            (Some(delegators), total) if total > 0 => delegators
                .iter()
                .map(|(delegator, delegated)| DelegatorShare {
                    delegator: delegator.clone(),
                    share: (u128::from(reward) * u128::from(*delegated) / u128::from(total))
                        as Amount,
                })
                .collect(),
            _ => Vec::new(),
        };
        RewardDistribution {
            validator: validator.to_string(),
            reward,
            delegator_shares,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn sample_registry() -> StakeRegistry {
        let mut reg = StakeRegistry::new();
        reg.add_stake("A", 50);
        reg.add_stake("B", 30);
        reg.delegate("C", "A", 20).unwrap();
        reg
    }

    #[test]
    fn empty_registry_selects_nobody() {
        let mut rng = StdRng::seed_from_u64(1);
        assert_eq!(StakeRegistry::new().select_validator(&mut rng), None);
    }

    #[test]
    fn delegation_requires_registered_validator() {
        let mut reg = StakeRegistry::new();
        assert_eq!(
            reg.delegate("C", "ghost", 5),
            Err(ChainError::UnknownValidator("ghost".into()))
        );
    }

    #[test]
    fn selection_frequency_tracks_stake() {
        let reg = sample_registry();
        assert_eq!(reg.total_stake(), 100);
        assert_eq!(reg.stake_of("A"), 70);

        let mut rng = StdRng::seed_from_u64(42);
        let trials = 20_000;
        let mut a = 0;
        let mut b = 0;
        for _ in 0..trials {
            match reg.select_validator(&mut rng).as_deref() {
                Some("A") => a += 1,
                Some("B") => b += 1,
                other => panic!("unexpected selection {other:?}"),
            }
        }
        let fa = a as f64 / trials as f64;
        let fb = b as f64 / trials as f64;
        assert!((fa - 0.7).abs() < 0.02, "A frequency {fa}");
        assert!((fb - 0.3).abs() < 0.02, "B frequency {fb}");
    }

    #[test]
    fn reward_shares_are_proportional_and_reported() {
        let reg = sample_registry();
        let dist = reg.distribute_reward("A", 70);
        assert_eq!(dist.reward, 70);
        assert_eq!(
            dist.delegator_shares,
            vec![DelegatorShare {
                delegator: "C".into(),
                share: 20
            }]
        );
        assert!(reg.distribute_reward("B", 10).delegator_shares.is_empty());
    }

    #[test]
    fn remove_drops_stake_and_delegations() {
        let mut reg = sample_registry();
        assert_eq!(reg.remove("A"), 70);
        assert!(reg.delegators_of("A").is_none());
        assert_eq!(reg.total_stake(), 30);
        assert!(!reg.is_validator("A"));
        assert!(reg.has_staked("A"));
        assert!(!reg.has_staked("ghost"));
    }
}
