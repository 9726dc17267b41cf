//! Known-peer membership.

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Address of another node, as advertised in `/node/status`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeerNode {
    pub ip: String,
    pub port: u64,
    pub is_bootstrap: bool,
    /// Set once the add-peer handshake with this peer succeeded. Local only.
    #[serde(skip)]
    pub connected: bool,
}

impl PeerNode {
    pub fn new(ip: impl Into<String>, port: u64, is_bootstrap: bool, connected: bool) -> Self {
        Self {
            ip: ip.into(),
            port,
            is_bootstrap,
            connected,
        }
    }

    /// Identity key of the peer, `ip:port`.
    pub fn tcp_address(&self) -> String {
        format!("{}:{}", self.ip, self.port)
    }
}

impl fmt::Display for PeerNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.ip, self.port)
    }
}

/// Process-wide set of known peers keyed by `ip:port`.
///
/// Never contains the owning node itself. Safe to mutate from the request
/// path and the sync loop at the same time.
pub struct PeerSet {
    own_address: String,
    peers: DashMap<String, PeerNode>,
}

impl PeerSet {
    pub fn new(own_ip: &str, own_port: u64) -> Self {
        Self {
            own_address: format!("{own_ip}:{own_port}"),
            peers: DashMap::new(),
        }
    }

    pub fn is_self(&self, peer: &PeerNode) -> bool {
        peer.tcp_address() == self.own_address
    }

    /// Inserts or replaces `peer`. Returns false if `peer` is this node.
    pub fn add(&self, peer: PeerNode) -> bool {
        if self.is_self(&peer) {
            return false;
        }
        self.peers.insert(peer.tcp_address(), peer);
        true
    }

    pub fn remove(&self, address: &str) -> Option<PeerNode> {
        self.peers.remove(address).map(|(_, peer)| peer)
    }

    pub fn contains(&self, address: &str) -> bool {
        self.peers.contains_key(address)
    }

    pub fn get(&self, address: &str) -> Option<PeerNode> {
        self.peers.get(address).map(|entry| entry.value().clone())
    }

    /// Marks a known peer as connected. No-op for unknown addresses.
    pub fn mark_connected(&self, address: &str) {
        if let Some(mut entry) = self.peers.get_mut(address) {
            entry.connected = true;
        }
    }

    pub fn len(&self) -> usize {
        self.peers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }

    /// Point-in-time copy, ordered by address.
    pub fn snapshot(&self) -> BTreeMap<String, PeerNode> {
        self.peers
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect()
    }
}
