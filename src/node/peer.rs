//! How a node talks to its peers.
//!
//! `HttpPeerClient` speaks to the `/api/v1` routes of remote nodes;
//! `LocalPeers` routes the same calls to in-process nodes, which lets
//! several nodes run against each other without sockets.

use futures::FutureExt;
use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use super::Node;
use crate::blockchain::Block;
use crate::error::{ChainError, Result};
use crate::transaction::Transaction;

/// A peer's chain as served by `GET /chain/`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChainSnapshot {
    pub length: usize,
    pub chain: Vec<Block>,
}

pub trait PeerClient: Send + Sync {
    fn fetch_chain<'a>(&'a self, peer: &'a str) -> BoxFuture<'a, Result<ChainSnapshot>>;

    fn push_block<'a>(&'a self, peer: &'a str, block: &'a Block) -> BoxFuture<'a, Result<()>>;

    fn push_transaction<'a>(&'a self, peer: &'a str, tx: &'a Transaction) -> BoxFuture<'a, Result<()>>;
}

fn unreachable(peer: &str, reason: impl ToString) -> ChainError {
    ChainError::PeerUnreachable {
        peer: peer.to_string(),
        reason: reason.to_string(),
    }
}

/// Peer addresses are stored as `host:port`; a scheme is added on demand.
pub fn peer_url(peer: &str, path: &str) -> String {
    let base = peer.trim_end_matches('/');
    if base.starts_with("http://") || base.starts_with("https://") {
        format!("{base}/api/v1{path}")
    } else {
        format!("http://{base}/api/v1{path}")
    }
}

/// HTTP transport with a per-request timeout.
pub struct HttpPeerClient {
    client: reqwest::Client,
}

impl HttpPeerClient {
    pub fn new(timeout: Duration) -> reqwest::Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client })
    }

    async fn post_json<T: Serialize + ?Sized>(&self, peer: &str, path: &str, body: &T) -> Result<()> {
        self.client
            .post(peer_url(peer, path))
            .json(body)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map(|_| ())
            .map_err(|e| unreachable(peer, e))
    }
}

impl PeerClient for HttpPeerClient {
    fn fetch_chain<'a>(&'a self, peer: &'a str) -> BoxFuture<'a, Result<ChainSnapshot>> {
        async move {
            let response = self
                .client
                .get(peer_url(peer, "/chain/"))
                .send()
                .await
                .and_then(|r| r.error_for_status())
                .map_err(|e| unreachable(peer, e))?;
            response
                .json::<ChainSnapshot>()
                .await
                .map_err(|e| unreachable(peer, e))
        }
        .boxed()
    }

    fn push_block<'a>(&'a self, peer: &'a str, block: &'a Block) -> BoxFuture<'a, Result<()>> {
        self.post_json(peer, "/blocks/new/", block).boxed()
    }

    fn push_transaction<'a>(&'a self, peer: &'a str, tx: &'a Transaction) -> BoxFuture<'a, Result<()>> {
        self.post_json(peer, "/transactions/peer/", tx).boxed()
    }
}

/// In-process peer table keyed by address.
#[derive(Default)]
pub struct LocalPeers {
    nodes: RwLock<HashMap<String, Arc<Node>>>,
}

impl LocalPeers {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Make `node` reachable under `address`.
    pub fn attach(&self, address: &str, node: Arc<Node>) {
        self.nodes
            .write()
            .expect("lock poisoned")
            .insert(address.to_string(), node);
    }

    /// Simulate `address` going offline.
    pub fn detach(&self, address: &str) {
        self.nodes.write().expect("lock poisoned").remove(address);
    }

    fn node(&self, peer: &str) -> Result<Arc<Node>> {
        self.nodes
            .read()
            .expect("lock poisoned")
            .get(peer)
            .cloned()
            .ok_or_else(|| unreachable(peer, "no such local node"))
    }
}

impl PeerClient for LocalPeers {
    fn fetch_chain<'a>(&'a self, peer: &'a str) -> BoxFuture<'a, Result<ChainSnapshot>> {
        let result = self.node(peer).map(|n| n.chain_snapshot());
        futures::future::ready(result).boxed()
    }

    fn push_block<'a>(&'a self, peer: &'a str, block: &'a Block) -> BoxFuture<'a, Result<()>> {
        let result = self.node(peer).map(|n| {
            n.receive_block(block.clone());
        });
        futures::future::ready(result).boxed()
    }

    fn push_transaction<'a>(&'a self, peer: &'a str, tx: &'a Transaction) -> BoxFuture<'a, Result<()>> {
        let result = self
            .node(peer)
            .and_then(|n| n.receive_transaction(tx.clone()).map(|_| ()));
        futures::future::ready(result).boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn urls_are_built_with_or_without_scheme() {
        assert_eq!(
            peer_url("127.0.0.1:8081", "/chain/"),
            "http://127.0.0.1:8081/api/v1/chain/"
        );
        assert_eq!(
            peer_url("https://node.example/", "/blocks/new/"),
            "https://node.example/api/v1/blocks/new/"
        );
    }

    #[test]
    fn snapshot_roundtrips_through_json() {
        let snap = ChainSnapshot {
            length: 1,
            chain: vec![Block::genesis()],
        };
        let json = serde_json::to_string(&snap).unwrap();
        let back: ChainSnapshot = serde_json::from_str(&json).unwrap();
        assert_eq!(back.chain, snap.chain);
    }
}
