//! Network layer for communication between ledger nodes.
//!
//! Provides the HTTP surface of a node, the client side used to reach other
//! nodes, and the periodic sync that keeps chains converged.
//!
//! - [`peer`]: Known-peer set
//! - [`message`]: JSON request and response bodies
//! - [`transport`]: Transport trait and error types
//! - [`http_transport`]: Production HTTP transport
//! - [`local_transport`]: In-memory transport for testing
//! - [`server`]: Node server, HTTP routes and lifecycle
//! - [`sync`]: Peer polling and block import

pub mod http_transport;
pub mod local_transport;
pub mod message;
pub mod peer;
pub mod server;
pub mod sync;
pub mod transport;
