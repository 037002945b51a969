use crate::node::{KeyImage, NodeError, PublicKey, TransactionHash};

use serde::{Deserialize, Serialize};

/// Signed amount credited to (positive) or debited from (negative) an owner.
pub type SignedAmount = i128;

/// Per-transaction transfers, keyed by owner public spend key.
///
/// Owners keep the order in which they were first seen; crediting an owner that is
/// already present adds to its pending amount.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferMap {
	entries: Vec<(PublicKey, SignedAmount)>,
}

impl TransferMap {
	pub fn new() -> Self {
		Self::default()
	}

	/// Add `amount` received by `owner`.
	pub fn credit(&mut self, owner: PublicKey, amount: u64) {
		self.add(owner, SignedAmount::from(amount));
	}

	/// Subtract `amount` spent by `owner`.
	pub fn debit(&mut self, owner: PublicKey, amount: u64) {
		self.add(owner, -SignedAmount::from(amount));
	}

	fn add(&mut self, owner: PublicKey, amount: SignedAmount) {
		match self.entries.iter_mut().find(|(key, _)| *key == owner) {
			Some((_, pending)) => *pending += amount,
			None => self.entries.push((owner, amount)),
		}
	}

	pub fn get(&self, owner: &PublicKey) -> Option<SignedAmount> {
		self.entries
			.iter()
			.find(|(key, _)| key == owner)
			.map(|(_, amount)| *amount)
	}

	pub fn is_empty(&self) -> bool {
		self.entries.is_empty()
	}

	pub fn len(&self) -> usize {
		self.entries.len()
	}

	pub fn iter(&self) -> impl Iterator<Item = &(PublicKey, SignedAmount)> {
		self.entries.iter()
	}

	/// Net amount across all owners.
	pub fn net(&self) -> SignedAmount {
		self.entries.iter().map(|(_, amount)| amount).sum()
	}
}

/// A transaction touching this wallet, created only by the transaction scanner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
	pub transfers: TransferMap,
	pub hash: TransactionHash,
	pub fee: u64,
	pub timestamp: u64,
	pub block_height: u64,
	pub payment_id: String,
	pub unlock_time: u64,
	pub is_coinbase: bool,
}

/// A key image owned by `owner` that was seen spent on chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpentKeyImage {
	pub owner: PublicKey,
	pub key_image: KeyImage,
}

/// Ledger delta produced by scanning; handed to the caller's ledger and then discarded.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransactionData {
	pub transactions_to_add: Vec<Transaction>,
	pub key_images_to_mark_spent: Vec<SpentKeyImage>,
}

impl TransactionData {
	pub fn new() -> Self {
		Self::default()
	}

	/// Append another delta, keeping order.
	pub fn extend(&mut self, other: TransactionData) {
		self.transactions_to_add.extend(other.transactions_to_add);
		self.key_images_to_mark_spent
			.extend(other.key_images_to_mark_spent);
	}

	pub fn is_empty(&self) -> bool {
		self.transactions_to_add.is_empty() && self.key_images_to_mark_spent.is_empty()
	}
}

/// Error types for wallet synchronization
#[derive(Debug, thiserror::Error)]
pub enum WalletSyncError {
	#[error("Node error: {0}")]
	Node(#[from] NodeError),

	#[error(
		"Daemon returned block {actual} as the first block of a fresh sync, but the wallet \
		 was configured to start at height {expected}; check the wallet's start height or \
		 point it at a daemon on the expected chain"
	)]
	ProtocolMismatch { expected: u64, actual: u64 },

	#[error("Checkpoint at height {height} does not follow current height {current}")]
	CheckpointOrder { height: u64, current: u64 },

	#[error("Invalid checkpoint snapshot: {0}")]
	InvalidCheckpoints(String),

	#[error("Key management is not attached; call attach() before syncing")]
	KeyManagementNotAttached,

	#[error("Persistence error: {0}")]
	Persistence(String),

	#[error("IO error: {0}")]
	Io(#[from] std::io::Error),

	#[error("Serialization error: {0}")]
	Serialization(#[from] serde_json::Error),

	#[error("Configuration error: {0}")]
	Config(String),
}

impl WalletSyncError {
	/// Whether synchronization must stop until the caller intervenes.
	pub fn is_fatal(&self) -> bool {
		matches!(
			self,
			WalletSyncError::ProtocolMismatch { .. }
				| WalletSyncError::CheckpointOrder { .. }
				| WalletSyncError::InvalidCheckpoints(_)
				| WalletSyncError::KeyManagementNotAttached
				| WalletSyncError::Config(_)
		)
	}
}
