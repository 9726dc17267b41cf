//! In-memory transport implementation for local testing and development.
//!
//! Routes peer calls directly to [`Server`]s living in the same process,
//! ideal for unit tests and single-process simulations.

use crate::core::block::Block;
use crate::network::message::StatusRes;
use crate::network::peer::PeerNode;
use crate::network::server::Server;
use crate::network::transport::{Transport, TransportError, check_add_peer};
use crate::types::hash::Hash;
use dashmap::DashMap;
use std::sync::{Arc, Weak};

/// In-process registry of servers keyed by `ip:port`.
///
/// Holds weak references so that servers sharing this transport do not keep
/// each other alive. A dropped or unregistered server is unreachable.
#[derive(Default)]
pub struct LocalTransport {
    servers: DashMap<String, Weak<Server>>,
}

impl LocalTransport {
    /// Creates an empty registry wrapped in an Arc for sharing between servers.
    pub fn new() -> Arc<LocalTransport> {
        Arc::new(LocalTransport::default())
    }

    /// Makes `server` reachable at its configured address.
    pub fn register(&self, server: &Arc<Server>) {
        self.servers
            .insert(server.address(), Arc::downgrade(server));
    }

    pub fn unregister(&self, address: &str) {
        self.servers.remove(address);
    }

    fn lookup(&self, peer: &PeerNode) -> Result<Arc<Server>, TransportError> {
        self.servers
            .get(&peer.tcp_address())
            .and_then(|entry| entry.value().upgrade())
            .ok_or_else(|| TransportError::unreachable(peer, "no server at this address"))
    }
}

#[async_trait::async_trait]
impl Transport for LocalTransport {
    async fn status(&self, peer: &PeerNode) -> Result<StatusRes, TransportError> {
        Ok(self.lookup(peer)?.status())
    }

    async fn add_peer(&self, peer: &PeerNode, ip: &str, port: u64) -> Result<(), TransportError> {
        let res = self.lookup(peer)?.add_peer(ip, &port.to_string());
        check_add_peer(peer, res)
    }

    async fn fetch_blocks(
        &self,
        peer: &PeerNode,
        from: Hash,
    ) -> Result<Vec<Block>, TransportError> {
        self.lookup(peer)?
            .blocks_after(from)
            .map(|res| res.blocks)
            .map_err(|e| TransportError::protocol(peer, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::test_utils::utils::{balances, temp_server};

    #[tokio::test]
    async fn unknown_address_is_unreachable() {
        let transport = LocalTransport::new();
        let peer = PeerNode::new("127.0.0.1", 1, false, false);
        assert!(matches!(
            transport.status(&peer).await,
            Err(TransportError::Unreachable { .. })
        ));
    }

    #[tokio::test]
    async fn routes_to_registered_server() {
        let transport = LocalTransport::new();
        let (_dir, server) = temp_server(8001, None, balances(&[("owner", 10)]), transport.clone());
        transport.register(&server);

        let peer = PeerNode::new("127.0.0.1", 8001, false, false);
        let status = transport.status(&peer).await.unwrap();
        assert!(status.block_hash.is_empty());

        transport.add_peer(&peer, "127.0.0.1", 8002).await.unwrap();
        assert!(server.peers().get("127.0.0.1:8002").unwrap().connected);

        assert!(transport.fetch_blocks(&peer, Hash::zero()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn dropped_or_unregistered_server_is_unreachable() {
        let transport = LocalTransport::new();
        let peer = PeerNode::new("127.0.0.1", 8001, false, false);

        let (dir, server) = temp_server(8001, None, balances(&[]), transport.clone());
        transport.register(&server);
        transport.unregister("127.0.0.1:8001");
        assert!(transport.status(&peer).await.is_err());

        transport.register(&server);
        drop(server);
        drop(dir);
        assert!(matches!(
            transport.status(&peer).await,
            Err(TransportError::Unreachable { .. })
        ));
    }
}
