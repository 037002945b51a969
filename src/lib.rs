//! View-only block synchronization and transaction scanning for CryptoNote wallets.

pub mod config;
pub mod node;
pub mod utils;
pub mod wallet;

#[cfg(test)]
mod test_utils;
