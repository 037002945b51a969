//!
//! Utility module for the wallet sync service.
//!
//! Re-exports formatting helpers used when logging ledger deltas.
/// Amount formatting
pub mod index;

pub use index::{DEFAULT_DECIMALS, format_atomic_amount};
