//! Blocks, headers and the persisted `{hash, block}` record.

use crate::core::transaction::Transaction;
use crate::types::encoding::{Encode, EncodeSink};
use crate::types::hash::Hash;
use serde::{Deserialize, Serialize};

/// Block header linking a block to its parent.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Header {
    /// Content hash of the parent block, or the zero hash for the first block.
    pub parent: Hash,
    /// Block index in the chain (first block = 0).
    pub number: u64,
    /// Unix timestamp in seconds.
    pub time: u64,
}

impl Encode for Header {
    fn encode<S: EncodeSink>(&self, out: &mut S) {
        self.parent.encode(out);
        self.number.encode(out);
        self.time.encode(out);
    }
}

/// Header plus an ordered transaction payload.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    pub header: Header,
    #[serde(rename = "payload")]
    pub transactions: Vec<Transaction>,
}

impl Block {
    pub fn new(parent: Hash, number: u64, time: u64, transactions: Vec<Transaction>) -> Self {
        Self {
            header: Header {
                parent,
                number,
                time,
            },
            transactions,
        }
    }

    /// Content hash of the full block (header and payload).
    ///
    /// Pure function of the block's fields; see [`crate::types::encoding`]
    /// for the byte layout that is hashed.
    pub fn hash(&self) -> Hash {
        let mut h = Hash::sha256();
        self.encode(&mut h);
        h.finalize()
    }
}

impl Encode for Block {
    fn encode<S: EncodeSink>(&self, out: &mut S) {
        self.header.encode(out);
        self.transactions.encode(out);
    }
}

/// One line of the block log.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockRecord {
    #[serde(rename = "hash")]
    pub key: Hash,
    #[serde(rename = "block")]
    pub value: Block,
}

impl BlockRecord {
    pub fn new(block: Block) -> Self {
        Self {
            key: block.hash(),
            value: block,
        }
    }
}
