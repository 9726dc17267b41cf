//! Node server tying the ledger, the known-peer set and a transport together.
//!
//! Serves the HTTP surface other nodes and local clients talk to, and runs
//! the periodic sync loop (see [`crate::network::sync`]) in the background
//! until shut down.

use crate::core::ledger::Ledger;
use crate::core::state::StateError;
use crate::core::transaction::Transaction;
use crate::network::message::{
    AddPeerQuery, AddPeerRes, BalancesRes, ErrRes, StatusRes, SyncQuery, SyncRes, TxAddReq,
    TxAddRes,
};
use crate::network::peer::{PeerNode, PeerSet};
use crate::network::transport::Transport;
use crate::types::hash::Hash;
use crate::{info, warn};
use serde::Serialize;
use std::convert::Infallible;
use std::fmt::Display;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio_util::sync::CancellationToken;
use warp::http::StatusCode;
use warp::{Filter, Reply};

pub const DEFAULT_IP: &str = "127.0.0.1";
pub const DEFAULT_HTTP_PORT: u64 = 8080;
pub const DEFAULT_SYNC_INTERVAL: Duration = Duration::from_secs(45);

/// Configuration options for the server.
#[derive(Clone, Debug)]
pub struct ServerOps {
    /// Directory holding `database/genesis.json` and `database/block.db`.
    pub data_dir: PathBuf,
    /// Address this node listens on and advertises to peers.
    pub ip: String,
    pub port: u64,
    /// Peer seeded into the known-peer set at startup.
    pub bootstrap: Option<PeerNode>,
    /// How often the sync loop polls known peers
    pub sync_interval: Duration,
    /// Upper bound on a single peer call
    pub peer_timeout: Duration,
}

impl ServerOps {
    pub fn new(data_dir: impl Into<PathBuf>, ip: impl Into<String>, port: u64) -> Self {
        Self {
            data_dir: data_dir.into(),
            ip: ip.into(),
            port,
            bootstrap: None,
            sync_interval: DEFAULT_SYNC_INTERVAL,
            peer_timeout: crate::network::http_transport::DEFAULT_PEER_TIMEOUT,
        }
    }
}

/// Errors that stop the server from starting.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("invalid listen address {addr}: {reason}")]
    InvalidAddress { addr: String, reason: String },

    #[error("failed to bind http server: {0}")]
    Bind(#[from] warp::Error),

    #[error(transparent)]
    State(#[from] StateError),
}

/// A single ledger node.
pub struct Server {
    pub(crate) ops: ServerOps,
    pub(crate) ledger: Arc<Ledger>,
    pub(crate) peers: PeerSet,
    pub(crate) transport: Arc<dyn Transport>,
}

impl Server {
    /// Creates a server over an already opened ledger.
    pub fn new(ops: ServerOps, ledger: Arc<Ledger>, transport: Arc<dyn Transport>) -> Self {
        let peers = PeerSet::new(&ops.ip, ops.port);
        if let Some(bootstrap) = ops.bootstrap.clone() {
            peers.add(bootstrap);
        }
        Server {
            ops,
            ledger,
            peers,
            transport,
        }
    }

    /// Opens the ledger under `ops.data_dir` and creates a server over it.
    pub fn open(ops: ServerOps, transport: Arc<dyn Transport>) -> Result<Self, ServerError> {
        let ledger = Arc::new(Ledger::open(&ops.data_dir)?);
        Ok(Self::new(ops, ledger, transport))
    }

    /// This node's `ip:port`.
    pub fn address(&self) -> String {
        format!("{}:{}", self.ops.ip, self.ops.port)
    }

    pub fn ops(&self) -> &ServerOps {
        &self.ops
    }

    pub fn ledger(&self) -> &Arc<Ledger> {
        &self.ledger
    }

    pub fn peers(&self) -> &PeerSet {
        &self.peers
    }

    pub fn status(&self) -> StatusRes {
        let (block_hash, block_number) = self.ledger.head();
        StatusRes {
            block_hash,
            block_number,
            peers_known: self.peers.snapshot(),
        }
    }

    /// Blocks strictly after `from`; the empty hash means "from genesis".
    pub fn blocks_after(&self, from: Hash) -> Result<SyncRes, StateError> {
        Ok(SyncRes {
            blocks: self.ledger.blocks_after(from)?,
        })
    }

    /// Adds the caller at `ip:port_raw` as a connected peer.
    pub fn add_peer(&self, ip: &str, port_raw: &str) -> AddPeerRes {
        let port = match port_raw.parse::<u16>() {
            Ok(port) => port as u64,
            Err(e) => {
                warn!("rejecting peer {ip}:{port_raw}: invalid port: {e}");
                return AddPeerRes::failed(format!("invalid port {port_raw:?}: {e}"));
            }
        };
        if ip.is_empty() {
            return AddPeerRes::failed("missing peer ip");
        }

        let peer = PeerNode::new(ip, port, false, true);
        if self.peers.add(peer) {
            info!("peer {ip}:{port} added to known peers");
        }
        AddPeerRes::ok()
    }

    /// Commits `req` as a single-transaction block.
    pub fn add_tx(&self, req: TxAddReq) -> Result<TxAddRes, StateError> {
        let tx = Transaction::new(req.from, req.to, req.value, req.data);
        let block_hash = self.ledger.submit_transaction(tx, unix_now())?;
        Ok(TxAddRes { block_hash })
    }

    pub fn balances(&self) -> BalancesRes {
        let (block_hash, balances) = self.ledger.balances();
        BalancesRes {
            block_hash,
            balances,
        }
    }

    /// The node's HTTP routes.
    pub fn routes(
        self: &Arc<Self>,
    ) -> impl Filter<Extract = (warp::reply::Response,), Error = warp::Rejection> + Clone + use<>
    {
        let balances = warp::path!("balances" / "list")
            .and(warp::get())
            .and(with_server(self.clone()))
            .map(|server: Arc<Server>| json_ok(&server.balances()));

        let tx_add = warp::path!("tx" / "add")
            .and(warp::post())
            .and(warp::body::bytes())
            .and(with_server(self.clone()))
            .map(|body: bytes::Bytes, server: Arc<Server>| {
                let req = match serde_json::from_slice::<TxAddReq>(&body) {
                    Ok(req) => req,
                    Err(e) => return json_err(format!("unable to decode request body: {e}")),
                };
                reply(server.add_tx(req))
            });

        let status = warp::path!("node" / "status")
            .and(warp::get())
            .and(with_server(self.clone()))
            .map(|server: Arc<Server>| json_ok(&server.status()));

        let sync = warp::path!("node" / "sync")
            .and(warp::get())
            .and(warp::query::<SyncQuery>())
            .and(with_server(self.clone()))
            .map(|query: SyncQuery, server: Arc<Server>| {
                let from = if query.from_block.is_empty() {
                    Hash::zero()
                } else {
                    match Hash::from_hex(&query.from_block) {
                        Ok(hash) => hash,
                        Err(e) => return json_err(format!("invalid fromBlock: {e}")),
                    }
                };
                reply(server.blocks_after(from))
            });

        let add_peer = warp::path!("node" / "peer")
            .and(warp::get().or(warp::post()).unify())
            .and(warp::query::<AddPeerQuery>())
            .and(with_server(self.clone()))
            .map(|query: AddPeerQuery, server: Arc<Server>| {
                json_ok(&server.add_peer(&query.ip, &query.port))
            });

        balances
            .or(tx_add)
            .unify()
            .or(status)
            .unify()
            .or(sync)
            .unify()
            .or(add_peer)
            .unify()
    }

    /// Serves HTTP and runs the sync loop until `token` is cancelled.
    pub async fn run(self: Arc<Self>, token: CancellationToken) -> Result<(), ServerError> {
        let address = self.address();
        let socket: SocketAddr = address
            .parse()
            .map_err(|e: std::net::AddrParseError| ServerError::InvalidAddress {
                addr: address.clone(),
                reason: e.to_string(),
            })?;

        let shutdown = token.clone();
        let (bound, http) = warp::serve(self.routes())
            .try_bind_with_graceful_shutdown(socket, async move { shutdown.cancelled().await })?;
        info!("listening on http://{bound}");

        let sync = tokio::spawn(self.clone().sync_loop(token.clone()));

        http.await;
        token.cancel();
        if let Err(e) = sync.await {
            warn!("sync loop ended abnormally: {e}");
        }

        info!("server shut down");
        Ok(())
    }
}

fn with_server(
    server: Arc<Server>,
) -> impl Filter<Extract = (Arc<Server>,), Error = Infallible> + Clone {
    warp::any().map(move || server.clone())
}

fn json_ok<T: Serialize>(body: &T) -> warp::reply::Response {
    warp::reply::json(body).into_response()
}

fn json_err(error: impl Display) -> warp::reply::Response {
    let body = ErrRes {
        error: error.to_string(),
    };
    warp::reply::with_status(warp::reply::json(&body), StatusCode::INTERNAL_SERVER_ERROR)
        .into_response()
}

fn reply<T: Serialize, E: Display>(result: Result<T, E>) -> warp::reply::Response {
    match result {
        Ok(body) => json_ok(&body),
        Err(e) => {
            warn!("request failed: {e}");
            json_err(e)
        }
    }
}

/// Current time in Unix seconds.
pub fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}
