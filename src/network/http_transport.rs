//! HTTP implementation of [`Transport`].

use crate::core::block::Block;
use crate::debug;
use crate::network::message::{AddPeerRes, ErrRes, StatusRes, SyncRes};
use crate::network::peer::PeerNode;
use crate::network::transport::{Transport, TransportError, check_add_peer};
use crate::types::hash::Hash;
use reqwest::Client;
use serde::de::DeserializeOwned;
use std::time::Duration;

/// Default per-request timeout for peer calls.
pub const DEFAULT_PEER_TIMEOUT: Duration = Duration::from_secs(5);

/// Talks to peers over plain HTTP, one GET per call.
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    /// Builds a transport whose requests fail after `timeout`.
    pub fn new(timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout)
            .build()?;
        Ok(Self { client })
    }

    async fn get<T: DeserializeOwned>(
        &self,
        peer: &PeerNode,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T, TransportError> {
        let url = format!("http://{}{}", peer.tcp_address(), path);
        debug!("GET {url} {query:?}");

        let res = self
            .client
            .get(&url)
            .query(query)
            .send()
            .await
            .map_err(|e| TransportError::unreachable(peer, e))?;

        let status = res.status();
        let body = res
            .bytes()
            .await
            .map_err(|e| TransportError::unreachable(peer, e))?;

        if !status.is_success() {
            let reason = match serde_json::from_slice::<ErrRes>(&body) {
                Ok(err) => format!("{status}: {}", err.error),
                Err(_) => status.to_string(),
            };
            return Err(TransportError::protocol(peer, reason));
        }

        serde_json::from_slice(&body).map_err(|e| TransportError::protocol(peer, e))
    }
}

#[async_trait::async_trait]
impl Transport for HttpTransport {
    async fn status(&self, peer: &PeerNode) -> Result<StatusRes, TransportError> {
        self.get(peer, "/node/status", &[]).await
    }

    async fn add_peer(&self, peer: &PeerNode, ip: &str, port: u64) -> Result<(), TransportError> {
        let res: AddPeerRes = self
            .get(
                peer,
                "/node/peer",
                &[("ip", ip.to_string()), ("port", port.to_string())],
            )
            .await?;
        check_add_peer(peer, res)
    }

    async fn fetch_blocks(
        &self,
        peer: &PeerNode,
        from: Hash,
    ) -> Result<Vec<Block>, TransportError> {
        let res: SyncRes = self
            .get(peer, "/node/sync", &[("fromBlock", from.to_hex())])
            .await?;
        Ok(res.blocks)
    }
}
