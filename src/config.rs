use log::warn;
use std::env;
use std::str::FromStr;
use std::time::Duration;
use uuid::Uuid;

use crate::blockchain::{
    ChainConfig, DEFAULT_DIFFICULTY, DEFAULT_INITIAL_BALANCE, DIFF_MAX, DIFF_MIN, Difficulty,
    POS_REWARD, POW_REWARD,
};
use crate::transaction::Amount;

/// Node settings, read from the environment (optionally seeded by `.env`).
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub node_id: String,
    pub chain: ChainConfig,
    pub peers: Vec<String>,
    pub peer_timeout: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            node_id: Uuid::new_v4().simple().to_string(),
            chain: ChainConfig::default(),
            peers: Vec::new(),
            peer_timeout: Duration::from_millis(2_000),
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from any key lookup; unset keys keep their default and
    /// unparsable ones fall back to it with a warning.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let difficulty = parse_or(&get, "DIFFICULTY", DEFAULT_DIFFICULTY);
        let clamped = difficulty.clamp(DIFF_MIN, DIFF_MAX);
        if clamped != difficulty {
            warn!("DIFFICULTY={difficulty} out of range, using {clamped}");
        }

        Self {
            host: get("HOST").unwrap_or(defaults.host),
            port: parse_or(&get, "PORT", defaults.port),
            node_id: get("NODE_ID").unwrap_or(defaults.node_id),
            chain: ChainConfig {
                difficulty: Difficulty::new(clamped),
                initial_balance: parse_or::<Amount>(&get, "INITIAL_BALANCE", DEFAULT_INITIAL_BALANCE),
                pow_reward: parse_or::<Amount>(&get, "POW_REWARD", POW_REWARD),
                pos_reward: parse_or::<Amount>(&get, "POS_REWARD", POS_REWARD),
                require_signatures: parse_or(&get, "REQUIRE_SIGNATURES", false),
            },
            peers: get("PEERS")
                .map(|v| {
                    v.split(',')
                        .map(str::trim)
                        .filter(|p| !p.is_empty())
                        .map(String::from)
                        .collect()
                })
                .unwrap_or_default(),
            peer_timeout: Duration::from_millis(parse_or(&get, "PEER_TIMEOUT_MS", 2_000u64)),
        }
    }
}

fn parse_or<T: FromStr>(get: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> T {
    match get(key) {
        None => default,
        Some(raw) => raw.parse().unwrap_or_else(|_| {
            warn!("{key}={raw:?} is not valid, using default");
            default
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn from_pairs(pairs: &[(&str, &str)]) -> Config {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|k| map.get(k).cloned())
    }

    #[test]
    fn defaults_apply_when_unset() {
        let cfg = from_pairs(&[]);
        assert_eq!(cfg.host, "127.0.0.1");
        assert_eq!(cfg.port, 8080);
        assert_eq!(cfg.chain.difficulty, Difficulty::new(DEFAULT_DIFFICULTY));
        assert_eq!(cfg.chain.initial_balance, 100);
        assert!(!cfg.chain.require_signatures);
        assert!(cfg.peers.is_empty());
        assert_eq!(cfg.node_id.len(), 32);
    }

    #[test]
    fn values_are_parsed() {
        let cfg = from_pairs(&[
            ("PORT", "9001"),
            ("NODE_ID", "node-a"),
            ("DIFFICULTY", "2"),
            ("REQUIRE_SIGNATURES", "true"),
            ("PEERS", "127.0.0.1:9002, 127.0.0.1:9003,"),
            ("PEER_TIMEOUT_MS", "500"),
        ]);
        assert_eq!(cfg.port, 9001);
        assert_eq!(cfg.node_id, "node-a");
        assert_eq!(cfg.chain.difficulty, Difficulty::new(2));
        assert!(cfg.chain.require_signatures);
        assert_eq!(cfg.peers, vec!["127.0.0.1:9002", "127.0.0.1:9003"]);
        assert_eq!(cfg.peer_timeout, Duration::from_millis(500));
    }

    #[test]
    fn bad_values_fall_back() {
        let cfg = from_pairs(&[("PORT", "http"), ("DIFFICULTY", "40"), ("POW_REWARD", "-3")]);
        assert_eq!(cfg.port, 8080);
        assert_eq!(cfg.chain.difficulty, Difficulty::new(DIFF_MAX));
        assert_eq!(cfg.chain.pow_reward, POW_REWARD);
    }
}
