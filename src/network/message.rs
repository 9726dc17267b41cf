//! JSON bodies exchanged over the node's HTTP surface.

use crate::core::block::Block;
use crate::core::state::Balances;
use crate::network::peer::PeerNode;
use crate::types::hash::Hash;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// `GET /node/status`
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusRes {
    pub block_hash: Hash,
    pub block_number: u64,
    pub peers_known: BTreeMap<String, PeerNode>,
}

/// `GET /node/sync?fromBlock=<hex>`
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncRes {
    pub blocks: Vec<Block>,
}

/// `GET /node/peer?ip=&port=`
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddPeerRes {
    pub success: bool,
    #[serde(default)]
    pub error: String,
}

impl AddPeerRes {
    pub fn ok() -> Self {
        Self {
            success: true,
            error: String::new(),
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: error.into(),
        }
    }
}

/// `POST /tx/add` request body.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxAddReq {
    pub from: String,
    pub to: String,
    pub value: u64,
    #[serde(default)]
    pub data: String,
}

/// `POST /tx/add` response body.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxAddRes {
    pub block_hash: Hash,
}

/// `GET /balances/list`
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalancesRes {
    pub block_hash: Hash,
    pub balances: Balances,
}

/// Body of every error response.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrRes {
    pub error: String,
}

/// Query string of `/node/sync`.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct SyncQuery {
    #[serde(rename = "fromBlock", default)]
    pub from_block: String,
}

/// Query string of `/node/peer`. The port stays raw so a bad value can be
/// reported in the response body.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct AddPeerQuery {
    #[serde(default)]
    pub ip: String,
    #[serde(default)]
    pub port: String,
}
