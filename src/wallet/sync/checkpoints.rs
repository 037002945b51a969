//! Checkpoint tracking for wallet synchronization.
//!
//! This module provides the `CheckpointTracker`, which records how far the wallet has
//! synchronized and keeps the block hashes the daemon uses to find the most recent block
//! both sides still agree on. Two sets are kept, both ordered most-recent-first:
//!
//! - a bounded window of the latest blocks, which covers ordinary short forks;
//! - sparse checkpoints every `sparse_interval` blocks, never evicted by the window, so a
//!   fork deeper than the window still resolves to a nearby common ancestor.

use crate::node::BlockHash;
use crate::wallet::WalletSyncError;

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use tracing::debug;

/// Blocks kept in the recent window by default.
pub const DEFAULT_CHECKPOINT_WINDOW: usize = 100;
/// Default spacing of sparse checkpoints.
pub const DEFAULT_SPARSE_INTERVAL: u64 = 5_000;

/// A confirmed block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Checkpoint {
	pub height: u64,
	pub hash: BlockHash,
}

/// Durable form of a `CheckpointTracker`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckpointSnapshot {
	pub window: usize,
	pub sparse_interval: u64,
	pub recent: Vec<Checkpoint>,
	pub sparse: Vec<Checkpoint>,
}

/// Tracks the synced height and the fork-detection evidence sent with each fetch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "CheckpointSnapshot", into = "CheckpointSnapshot")]
pub struct CheckpointTracker {
	window: usize,
	sparse_interval: u64,
	recent: VecDeque<Checkpoint>,
	sparse: Vec<Checkpoint>,
}

impl Default for CheckpointTracker {
	fn default() -> Self {
		Self::new(DEFAULT_CHECKPOINT_WINDOW, DEFAULT_SPARSE_INTERVAL)
	}
}

impl CheckpointTracker {
	/// Create an empty tracker. A zero window or interval is raised to 1.
	pub fn new(window: usize, sparse_interval: u64) -> Self {
		let window = window.max(1);
		Self {
			window,
			sparse_interval: sparse_interval.max(1),
			recent: VecDeque::with_capacity(window),
			sparse: Vec::new(),
		}
	}

	/// Last confirmed synced height; 0 if nothing has been synced.
	pub fn current_height(&self) -> u64 {
		let recent = self.recent.front().map(|c| c.height);
		let sparse = self.sparse.first().map(|c| c.height);
		recent.max(sparse).unwrap_or(0)
	}

	/// True before the first block has been recorded (or after a full rewind).
	pub fn is_empty(&self) -> bool {
		self.recent.is_empty() && self.sparse.is_empty()
	}

	/// The recent window, most-recent-first.
	pub fn recent_hashes(&self) -> Vec<BlockHash> {
		self.recent.iter().map(|c| c.hash).collect()
	}

	/// Everything sent to the daemon: the recent window followed by the sparse
	/// checkpoints older than it, most-recent-first.
	pub fn block_hash_checkpoints(&self) -> Vec<BlockHash> {
		let oldest_recent = self.oldest_recent_height().unwrap_or(u64::MAX);

		self.recent
			.iter()
			.chain(self.sparse.iter().filter(|c| c.height < oldest_recent))
			.map(|c| c.hash)
			.collect()
	}

	/// Height of the oldest entry still in the recent window.
	pub fn oldest_recent_height(&self) -> Option<u64> {
		self.recent.back().map(|c| c.height)
	}

	/// Number of entries in the recent window.
	pub fn len(&self) -> usize {
		self.recent.len()
	}

	pub fn window(&self) -> usize {
		self.window
	}

	/// Record a confirmed block, evicting the oldest recent entry when the window is full.
	///
	/// Heights must strictly increase; stale entries from a fork have to be dropped with
	/// `rewind` first.
	pub fn record(&mut self, height: u64, hash: BlockHash) -> Result<(), WalletSyncError> {
		if !self.is_empty() && height <= self.current_height() {
			return Err(WalletSyncError::CheckpointOrder {
				height,
				current: self.current_height(),
			});
		}

		let checkpoint = Checkpoint { height, hash };
		self.recent.push_front(checkpoint);
		if self.recent.len() > self.window {
			self.recent.pop_back();
		}

		if height % self.sparse_interval == 0 {
			self.sparse.insert(0, checkpoint);
		}

		Ok(())
	}

	/// Drop every checkpoint at or above `height`. Returns how many recent entries were dropped.
	pub fn rewind(&mut self, height: u64) -> usize {
		let before = self.recent.len();
		self.recent.retain(|c| c.height < height);
		self.sparse.retain(|c| c.height < height);

		let dropped = before - self.recent.len();
		debug!(
			"Rewound checkpoints to below height {}: dropped {} recent entries",
			height, dropped
		);
		dropped
	}

	pub fn snapshot(&self) -> CheckpointSnapshot {
		self.clone().into()
	}
}

impl From<CheckpointTracker> for CheckpointSnapshot {
	fn from(tracker: CheckpointTracker) -> Self {
		Self {
			window: tracker.window,
			sparse_interval: tracker.sparse_interval,
			recent: tracker.recent.into(),
			sparse: tracker.sparse,
		}
	}
}

fn check_descending(name: &str, checkpoints: &[Checkpoint]) -> Result<(), WalletSyncError> {
	for pair in checkpoints.windows(2) {
		if pair[0].height <= pair[1].height {
			return Err(WalletSyncError::InvalidCheckpoints(format!(
				"{} checkpoints not strictly descending at heights {} and {}",
				name, pair[0].height, pair[1].height
			)));
		}
	}
	Ok(())
}

/// Sparse entries sit on the interval and agree with the recent window where they overlap.
fn check_sparse_consistent(snapshot: &CheckpointSnapshot) -> Result<(), WalletSyncError> {
	let head = snapshot.recent.first().map(|c| c.height);
	let oldest = snapshot.recent.last().map(|c| c.height);

	for sparse in &snapshot.sparse {
		if sparse.height % snapshot.sparse_interval != 0 {
			return Err(WalletSyncError::InvalidCheckpoints(format!(
				"sparse checkpoint at height {} is not a multiple of {}",
				sparse.height, snapshot.sparse_interval
			)));
		}
		if head.is_some_and(|head| sparse.height > head) {
			return Err(WalletSyncError::InvalidCheckpoints(format!(
				"sparse checkpoint at height {} is above the recent head",
				sparse.height
			)));
		}
		if oldest.is_some_and(|oldest| sparse.height >= oldest) {
			let matches = snapshot
				.recent
				.iter()
				.any(|recent| recent.height == sparse.height && recent.hash == sparse.hash);
			if !matches {
				return Err(WalletSyncError::InvalidCheckpoints(format!(
					"sparse checkpoint at height {} disagrees with the recent window",
					sparse.height
				)));
			}
		}
	}
	Ok(())
}

impl TryFrom<CheckpointSnapshot> for CheckpointTracker {
	type Error = WalletSyncError;

	fn try_from(snapshot: CheckpointSnapshot) -> Result<Self, Self::Error> {
		if snapshot.window == 0 || snapshot.sparse_interval == 0 {
			return Err(WalletSyncError::InvalidCheckpoints(
				"window and sparse interval must be positive".to_string(),
			));
		}
		if snapshot.recent.len() > snapshot.window {
			return Err(WalletSyncError::InvalidCheckpoints(format!(
				"{} recent checkpoints exceed window of {}",
				snapshot.recent.len(),
				snapshot.window
			)));
		}
		check_descending("recent", &snapshot.recent)?;
		check_descending("sparse", &snapshot.sparse)?;
		check_sparse_consistent(&snapshot)?;

		Ok(Self {
			window: snapshot.window,
			sparse_interval: snapshot.sparse_interval,
			recent: snapshot.recent.into(),
			sparse: snapshot.sparse,
		})
	}
}
