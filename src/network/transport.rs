//! Peer transport abstraction.
//!
//! The sync engine only ever makes three calls to another node: ask for its
//! status, announce itself, and fetch the blocks after a given hash. A
//! [`Transport`] carries those calls; [`crate::network::http_transport`] does
//! it over HTTP and [`crate::network::local_transport`] in process.

use crate::core::block::Block;
use crate::network::message::{AddPeerRes, StatusRes};
use crate::network::peer::PeerNode;
use crate::types::hash::Hash;

/// Errors that can occur while talking to a peer.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Connection refused, timed out, or the peer is not registered.
    #[error("peer {addr} unreachable: {reason}")]
    Unreachable { addr: String, reason: String },

    /// The peer answered with an error status or an undecodable body.
    #[error("bad response from peer {addr}: {reason}")]
    Protocol { addr: String, reason: String },

    /// The peer declined the add-peer handshake.
    #[error("peer {addr} rejected the handshake: {reason}")]
    Rejected { addr: String, reason: String },
}

impl TransportError {
    pub fn unreachable(peer: &PeerNode, reason: impl ToString) -> Self {
        TransportError::Unreachable {
            addr: peer.tcp_address(),
            reason: reason.to_string(),
        }
    }

    pub fn protocol(peer: &PeerNode, reason: impl ToString) -> Self {
        TransportError::Protocol {
            addr: peer.tcp_address(),
            reason: reason.to_string(),
        }
    }
}

/// Async client side of the peer protocol.
///
/// Implementors must bound every call in time; a call that does not finish
/// is reported as [`TransportError::Unreachable`].
#[async_trait::async_trait]
pub trait Transport: Send + Sync {
    /// Queries the peer's head and known peers.
    async fn status(&self, peer: &PeerNode) -> Result<StatusRes, TransportError>;

    /// Asks `peer` to add the node at `ip:port` to its known peers.
    ///
    /// # Errors
    /// Returns `TransportError::Rejected` if the peer answered
    /// `success=false` or with a non-empty error.
    async fn add_peer(&self, peer: &PeerNode, ip: &str, port: u64) -> Result<(), TransportError>;

    /// Fetches every block the peer has after `from`, in commit order.
    async fn fetch_blocks(&self, peer: &PeerNode, from: Hash)
    -> Result<Vec<Block>, TransportError>;
}

/// Turns an add-peer response into a result.
pub fn check_add_peer(peer: &PeerNode, res: AddPeerRes) -> Result<(), TransportError> {
    if res.success && res.error.is_empty() {
        return Ok(());
    }
    let reason = if res.error.is_empty() {
        "peer answered success=false".to_string()
    } else {
        res.error
    };
    Err(TransportError::Rejected {
        addr: peer.tcp_address(),
        reason,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn handshake_success_requires_flag_and_no_error() {
        let peer = PeerNode::new("127.0.0.1", 9000, false, false);
        assert!(check_add_peer(&peer, AddPeerRes::ok()).is_ok());

        let err = check_add_peer(&peer, AddPeerRes::failed("bad port")).unwrap_err();
        assert!(matches!(
            err,
            TransportError::Rejected { ref reason, .. } if reason == "bad port"
        ));

        let both = AddPeerRes {
            success: true,
            error: "odd".into(),
        };
        assert!(check_add_peer(&peer, both).is_err());

        let silent = AddPeerRes {
            success: false,
            error: String::new(),
        };
        assert!(matches!(
            check_add_peer(&peer, silent),
            Err(TransportError::Rejected { .. })
        ));
    }

    #[test]
    fn error_messages_name_the_peer() {
        let peer = PeerNode::new("10.0.0.1", 9000, false, false);
        let err = TransportError::unreachable(&peer, "connection refused");
        assert_eq!(
            err.to_string(),
            "peer 10.0.0.1:9000 unreachable: connection refused"
        );
    }
}
