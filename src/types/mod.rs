//! Core type definitions for ledger primitives.
//!
//! - `Hash`: Fixed-size 32-byte SHA-256 digests
//! - `Encode`: Canonical binary encoding fed to the hasher

pub mod encoding;
pub mod hash;
