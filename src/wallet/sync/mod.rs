//! Wallet Synchronization Module
//!
//! This module provides the core logic for keeping a view-only CryptoNote wallet in step
//! with a remote daemon's chain. It is composed of several submodules, each responsible for a
//! specific aspect of the sync process:
//!
//! - `orchestrator`: The main entry point. One `tick` fetches, rewinds on forks, scans and records.
//! - `block_fetcher`: Fork-safe fetch protocol against the remote node, including the timestamp resume pin.
//! - `checkpoints`: Bounded window of recent block hashes plus sparse permanent checkpoints.
//! - `transaction_scanner`: Turns raw transactions into per-owner transfers and spent key images.
//! - `locked_transactions`: Decides which time-locked transactions have become spendable.
//! - `events`: Event types and handler trait through which the caller's ledger receives deltas.
//! - `repositories` / `state_persistence`: Durable synchronizer state between runs.
//!
//! The synchronizer itself keeps no ledger; every scanned block is handed to the registered
//! handlers as a `TransactionData` delta and then discarded.

/// Fork-safe block fetching
pub mod block_fetcher;
/// Fork-detection checkpoints
pub mod checkpoints;
/// Event system for decoupled communication during sync
pub mod events;
/// Unlock-time evaluation
pub mod locked_transactions;
/// Main coordinator for the wallet sync process
pub mod orchestrator;
/// Storage backends for synchronizer state
pub mod repositories;
/// Periodic saving and restoring of synchronizer state
pub mod state_persistence;
/// Block and transaction scanning
pub mod transaction_scanner;

pub use orchestrator::*;
