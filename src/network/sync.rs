//! Periodic peer polling that keeps this node's chain in step with its peers.
//!
//! Every tick, for each known peer other than this node:
//! 1. Query the peer's status; if it cannot be reached, forget the peer
//! 2. Announce this node to the peer unless already connected
//! 3. Import the blocks the peer has after our head
//! 4. Merge the peer's known peers into ours
//!
//! A failure at step 2 abandons the peer for this tick. A failure at step 3
//! is logged and the pass moves on to step 4; imported blocks go through the
//! same validated path as local submissions.

use crate::core::state::StateError;
use crate::network::message::StatusRes;
use crate::network::peer::PeerNode;
use crate::network::server::Server;
use crate::network::transport::TransportError;
use crate::{debug, info, warn};
use std::sync::Arc;
use tokio::time::{Instant, interval_at};
use tokio_util::sync::CancellationToken;

/// Errors from importing a peer's blocks.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    State(#[from] StateError),
}

impl SyncError {
    /// True when the peer only sent blocks this node already has.
    pub fn is_already_applied(&self) -> bool {
        matches!(self, SyncError::State(e) if e.is_already_applied())
    }
}

impl Server {
    /// Runs [`Server::do_sync`] every `sync_interval` until `token` is
    /// cancelled. The first pass starts one interval after the call.
    pub async fn sync_loop(self: Arc<Self>, token: CancellationToken) {
        let period = self.ops.sync_interval;
        info!("syncing with known peers every {}s", period.as_secs_f64());
        let mut ticker = interval_at(Instant::now() + period, period);

        loop {
            tokio::select! {
                _ = token.cancelled() => {
                    break;
                }
                _ = ticker.tick() => {
                    self.do_sync().await;
                }
            }
        }

        info!("sync loop stopped");
    }

    /// One pass over a snapshot of the known peers.
    pub async fn do_sync(&self) {
        for (address, peer) in self.peers.snapshot() {
            if self.peers.is_self(&peer) {
                continue;
            }
            debug!("syncing with peer {address}");

            let status = match self.transport.status(&peer).await {
                Ok(status) => status,
                Err(e) => {
                    warn!("{e}; removing {address} from known peers");
                    self.peers.remove(&address);
                    continue;
                }
            };

            if let Err(e) = self.join_known_peers(&peer).await {
                warn!("failed to join peer {address}: {e}");
                continue;
            }

            match self.sync_blocks(&peer, &status).await {
                Ok(0) => {}
                Ok(n) => info!("imported {n} blocks from peer {address}"),
                Err(e) if e.is_already_applied() => {
                    debug!("peer {address} sent blocks we already have: {e}")
                }
                Err(e) => warn!("failed to sync blocks from peer {address}: {e}"),
            }

            self.sync_known_peers(&status);
        }
    }

    /// Announces this node to `peer` unless the handshake already happened.
    pub async fn join_known_peers(&self, peer: &PeerNode) -> Result<(), TransportError> {
        if peer.connected {
            return Ok(());
        }
        self.transport
            .add_peer(peer, &self.ops.ip, self.ops.port)
            .await?;
        self.peers.mark_connected(&peer.tcp_address());
        debug!("joined peer {peer}");
        Ok(())
    }

    /// Imports the blocks `peer` has after our head. Returns how many were
    /// committed.
    pub async fn sync_blocks(
        &self,
        peer: &PeerNode,
        status: &StatusRes,
    ) -> Result<usize, SyncError> {
        let (local_hash, local_number) = self.ledger.head();

        if status.block_hash.is_empty() {
            return Ok(0);
        }
        if status.block_number == 0 && !local_hash.is_empty() {
            return Ok(0);
        }
        if status.block_hash == local_hash {
            return Ok(0);
        }

        let new_blocks = if local_number == 0 && status.block_number == 0 {
            1
        } else {
            status.block_number.saturating_sub(local_number)
        };
        if new_blocks == 0 {
            return Ok(0);
        }
        info!("peer {peer} is {new_blocks} blocks ahead, fetching after {local_hash}");

        let blocks = self.transport.fetch_blocks(peer, local_hash).await?;
        if blocks.is_empty() {
            debug!("peer {peer} has no blocks after {local_hash}");
            return Ok(0);
        }
        let count = blocks.len();
        self.ledger.add_blocks(blocks)?;
        Ok(count)
    }

    /// Adds every peer `status` knows about that we do not, unconnected.
    pub fn sync_known_peers(&self, status: &StatusRes) {
        for peer in status.peers_known.values() {
            let address = peer.tcp_address();
            if self.peers.contains(&address) || self.peers.is_self(peer) {
                continue;
            }
            let mut peer = peer.clone();
            peer.connected = false;
            if self.peers.add(peer) {
                info!("found new peer {address}");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::block::Block;
    use crate::core::transaction::{Account, Transaction};
    use crate::network::local_transport::LocalTransport;
    use crate::network::server::ServerOps;
    use crate::types::hash::Hash;
    use crate::utils::test_utils::utils::{balances, block_on, temp_server, temp_server_with};
    use std::time::Duration;

    fn peer(port: u64) -> PeerNode {
        PeerNode::new("127.0.0.1", port, false, false)
    }

    fn genesis_block() -> Block {
        block_on(
            Hash::zero(),
            0,
            vec![
                Transaction::new("owner", "owner", 3, ""),
                Transaction::new("owner", "owner", 700, "reward"),
            ],
        )
    }

    #[tokio::test]
    async fn follower_catches_up_in_one_pass() {
        let transport = LocalTransport::new();
        let genesis = balances(&[("owner", 1_000_000)]);

        let (_da, a) = temp_server(9001, None, genesis.clone(), transport.clone());
        let (_db, b) = temp_server(9002, Some(peer(9001)), genesis, transport.clone());
        transport.register(&a);
        transport.register(&b);

        let block0 = genesis_block();
        let h0 = a.ledger().add_block(block0.clone()).unwrap();
        a.ledger()
            .add_block(block_on(h0, 1, vec![Transaction::new("owner", "harsh", 2000, "")]))
            .unwrap();
        b.ledger().add_block(block0).unwrap();

        b.do_sync().await;

        assert_eq!(b.ledger().balances(), a.ledger().balances());
        assert_eq!(b.ledger().latest_block_hash(), a.ledger().latest_block_hash());
        assert_eq!(b.ledger().balance_of(&Account::from("harsh")), 2000);

        // The handshake made each side aware of the other.
        assert!(b.peers().get("127.0.0.1:9001").unwrap().connected);
        assert!(a.peers().get("127.0.0.1:9002").unwrap().connected);
    }

    #[tokio::test]
    async fn empty_follower_imports_from_genesis() {
        let transport = LocalTransport::new();
        let genesis = balances(&[("owner", 1_000_000)]);

        let (_da, a) = temp_server(9001, None, genesis.clone(), transport.clone());
        let (_db, b) = temp_server(9002, Some(peer(9001)), genesis, transport.clone());
        transport.register(&a);

        a.ledger().add_block(genesis_block()).unwrap();
        b.do_sync().await;

        assert_eq!(b.ledger().head(), a.ledger().head());
        assert_eq!(b.ledger().balance_of(&Account::from("owner")), 1_000_700);
    }

    #[tokio::test]
    async fn unreachable_peer_is_evicted() {
        let transport = LocalTransport::new();
        let (_db, b) = temp_server(9002, Some(peer(9001)), balances(&[]), transport.clone());

        b.do_sync().await;
        assert!(b.peers().is_empty());
    }

    #[tokio::test]
    async fn rejected_handshake_keeps_peer_but_skips_pass() {
        let transport = LocalTransport::new();
        let genesis = balances(&[("owner", 10)]);
        let (_da, a) = temp_server(9001, None, genesis.clone(), transport.clone());
        transport.register(&a);
        a.ledger().add_block(block_on(Hash::zero(), 0, vec![])).unwrap();

        // A refuses to add a peer without an ip.
        let mut ops = ServerOps::new("", "", 9002);
        ops.bootstrap = Some(peer(9001));
        let (_db, b) = temp_server_with(ops, genesis, transport.clone());

        b.do_sync().await;
        assert!(b.peers().contains("127.0.0.1:9001"));
        assert!(!b.peers().get("127.0.0.1:9001").unwrap().connected);
        assert!(b.ledger().latest_block_hash().is_empty());
    }

    #[tokio::test]
    async fn peers_are_discovered_through_status() {
        let transport = LocalTransport::new();
        let (_da, a) = temp_server(9001, None, balances(&[]), transport.clone());
        let (_db, b) = temp_server(9002, Some(peer(9001)), balances(&[]), transport.clone());
        transport.register(&a);
        transport.register(&b);
        a.peers().add(peer(9003));

        b.do_sync().await;
        assert!(!b.peers().get("127.0.0.1:9003").unwrap().connected);

        // A now lists B as well; B skips itself and drops the dead 9003.
        b.do_sync().await;
        assert!(!b.peers().contains("127.0.0.1:9002"));
        assert!(!b.peers().contains("127.0.0.1:9003"));
        assert!(b.peers().contains("127.0.0.1:9001"));
    }

    #[tokio::test]
    async fn invalid_blocks_keep_peer_and_still_merge_peers() {
        let transport = LocalTransport::new();
        let rich = balances(&[("owner", 1_000_000)]);
        let poor = balances(&[("owner", 10)]);
        let (_da, a) = temp_server(9001, None, rich, transport.clone());
        let (_db, b) = temp_server(9002, Some(peer(9001)), poor, transport.clone());
        transport.register(&a);
        transport.register(&b);
        a.peers().add(peer(9003));

        // B's genesis cannot pay for A's first block.
        a.ledger()
            .add_block(block_on(
                Hash::zero(),
                0,
                vec![Transaction::new("owner", "harsh", 500_000, "")],
            ))
            .unwrap();

        b.do_sync().await;

        assert!(b.peers().contains("127.0.0.1:9001"));
        assert!(b.peers().contains("127.0.0.1:9003"));
        assert!(b.ledger().latest_block_hash().is_empty());
        assert_eq!(b.ledger().balance_of(&Account::from("owner")), 10);
        assert_eq!(b.ledger().balance_of(&Account::from("harsh")), 0);
    }

    #[tokio::test]
    async fn equal_heads_skip_fetch() {
        let transport = LocalTransport::new();
        let genesis = balances(&[("owner", 1_000_000)]);
        let (_da, a) = temp_server(9001, None, genesis.clone(), transport.clone());
        let (_db, b) = temp_server(9002, Some(peer(9001)), genesis, transport.clone());
        transport.register(&a);

        let block0 = genesis_block();
        a.ledger().add_block(block0.clone()).unwrap();
        b.ledger().add_block(block0).unwrap();

        let status = a.status();
        let imported = b.sync_blocks(&peer(9001), &status).await.unwrap();
        assert_eq!(imported, 0);
    }

    #[test]
    fn replayed_blocks_count_as_already_applied() {
        let transport = LocalTransport::new();
        let (_da, a) = temp_server(9001, None, balances(&[]), transport.clone());
        let (_db, b) = temp_server(9002, None, balances(&[]), transport);

        let h0 = a.ledger().add_block(block_on(Hash::zero(), 0, vec![])).unwrap();
        a.ledger().add_block(block_on(h0, 1, vec![])).unwrap();
        let chain = a.ledger().blocks_after(Hash::zero()).unwrap();

        b.ledger().add_blocks(chain.clone()).unwrap();
        let err = SyncError::from(b.ledger().add_blocks(chain).unwrap_err());
        assert!(err.is_already_applied());
        assert_eq!(b.ledger().head(), a.ledger().head());
    }

    #[tokio::test]
    async fn sync_loop_stops_on_cancel() {
        let transport = LocalTransport::new();
        let genesis = balances(&[("owner", 1_000_000)]);
        let (_da, a) = temp_server(9001, None, genesis.clone(), transport.clone());
        let mut ops = ServerOps::new("", "127.0.0.1", 9002);
        ops.bootstrap = Some(peer(9001));
        ops.sync_interval = Duration::from_millis(20);
        let (_db, b) = temp_server_with(ops, genesis, transport.clone());
        transport.register(&a);

        a.ledger().add_block(genesis_block()).unwrap();

        let token = CancellationToken::new();
        let handle = tokio::spawn(b.clone().sync_loop(token.clone()));

        let deadline = Instant::now() + Duration::from_secs(5);
        while b.ledger().latest_block_hash() != a.ledger().latest_block_hash() {
            assert!(Instant::now() < deadline, "follower never synced");
            tokio::time::sleep(Duration::from_millis(10)).await;
        }

        token.cancel();
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("sync loop did not stop")
            .unwrap();
    }
}
