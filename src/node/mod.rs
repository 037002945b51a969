//! Remote node integration
//!
//! This module provides the daemon client, the `RemoteNode` seam the sync engine
//! depends on, and the wire types returned by the daemon's wallet sync API.

/// HTTP client for the daemon's wallet sync API
mod client;
/// The remote node interface consumed by the sync engine
mod remote;
/// Type definitions for daemon data structures
mod types;

pub use client::DaemonClient;
pub use remote::RemoteNode;
pub use types::*;
