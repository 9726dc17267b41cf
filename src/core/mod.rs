//! Core ledger data structures.
//!
//! This module contains the fundamental building blocks of the ledger:
//! - `Transaction`: Unsigned value transfer between two accounts, or a reward
//! - `Block`: Hash-linked header plus an ordered transaction payload
//! - `Genesis`: Initial balances loaded before any block is applied
//! - `State`: Balance table and chain head, rebuilt by replaying the block log
//! - `Ledger`: Mutex-guarded `State` shared between request handling and sync
//! - `seed_demo_chain`: Demonstration blocks for seeding a fresh node

pub mod block;
pub mod genesis;
pub mod ledger;
pub mod migrate;
pub mod state;
pub mod transaction;
