//! Replicated account ledger.
//!
//! Provides the block and transaction model, the ledger state machine over a
//! durable block log, and the node server that keeps peers in sync.

pub mod core;
pub mod network;
pub mod storage;
pub mod types;
pub mod utils;
