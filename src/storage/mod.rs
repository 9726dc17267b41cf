//! Ledger storage subsystem.
//!
//! - [`block_store`]: Append-only newline-delimited JSON block log
//! - [`fs`]: Data directory layout and first-run initialisation

pub mod block_store;
pub mod fs;
