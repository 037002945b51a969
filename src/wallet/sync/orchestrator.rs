//! Wallet sync orchestrator.
//!
//! This module defines the `WalletSynchronizer`, which coordinates one synchronization
//! tick at a time: it fetches the next batch through the `BlockFetcher`, detects forks,
//! scans each block with the `TransactionScanner`, hands the resulting ledger deltas to
//! the registered event handlers, and records each block in the `CheckpointTracker`.
//!
//! Blocks are applied strictly one at a time in height order, so checkpoints are always
//! recorded in increasing height order. Ticks must not overlap; the scheduler driving
//! `tick` owns that exclusion (it holds `&mut self` for the duration of a tick).
//!
//! Construction is two-phase: build the synchronizer from fresh parameters or from a
//! restored `SynchronizerState`, then `attach` the key-management component before the
//! first `tick`.

use crate::config::SyncConfig;
use crate::node::{BlockHash, RemoteNode, SecretKey, TransactionHash};
use crate::wallet::WalletSyncError;
use crate::wallet::keys::KeyManagement;
use crate::wallet::sync::{
	block_fetcher::BlockFetcher,
	checkpoints::CheckpointTracker,
	events::{EventDispatcher, SyncEvent, SyncEventHandler},
	locked_transactions::{LockedTransaction, check_locked_transactions},
	state_persistence::SynchronizerState,
	transaction_scanner::TransactionScanner,
};

use std::sync::Arc;
use tracing::{debug, info, warn};

/// What a single tick did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickSummary {
	/// Blocks scanned and recorded.
	pub blocks: usize,
	/// Transactions touching the wallet.
	pub transactions: usize,
	/// Lowest height rewound to, if a fork was detected.
	pub fork_height: Option<u64>,
	/// Synced height after the tick.
	pub height: u64,
}

/// Main wallet synchronizer that coordinates all sync components.
pub struct WalletSynchronizer {
	node: Arc<dyn RemoteNode>,
	state: SynchronizerState,
	keys: Option<Arc<dyn KeyManagement>>,
	fetcher: BlockFetcher,
	event_dispatcher: EventDispatcher,
}

impl WalletSynchronizer {
	/// Create a synchronizer for a wallet that has never synced.
	///
	/// A non-zero `start_timestamp` takes precedence over `start_height` until the first
	/// batch arrives.
	pub fn new(
		node: Arc<dyn RemoteNode>,
		config: &SyncConfig,
		view_key: SecretKey,
		start_height: u64,
		start_timestamp: u64,
	) -> Self {
		let checkpoints =
			CheckpointTracker::new(config.checkpoint_window, config.sparse_checkpoint_interval);
		let state = SynchronizerState::new(view_key, start_height, start_timestamp, checkpoints);
		Self::from_state(node, state)
	}

	/// Rebuild a synchronizer from saved state. `attach` must be called before `tick`.
	pub fn from_state(node: Arc<dyn RemoteNode>, state: SynchronizerState) -> Self {
		Self {
			fetcher: BlockFetcher::new(node.clone()),
			node,
			state,
			keys: None,
			event_dispatcher: EventDispatcher::new(),
		}
	}

	/// Attach the key-management component.
	pub fn attach(&mut self, keys: Arc<dyn KeyManagement>) {
		self.keys = Some(keys);
	}

	pub fn is_attached(&self) -> bool {
		self.keys.is_some()
	}

	/// Register a handler for sync events, typically the caller's ledger.
	pub fn register_handler(&mut self, handler: Box<dyn SyncEventHandler>) {
		self.event_dispatcher.register_handler(handler);
	}

	/// Cumulative synced height.
	pub fn sync_height(&self) -> u64 {
		self.state.checkpoints.current_height()
	}

	pub fn state(&self) -> &SynchronizerState {
		&self.state
	}

	pub fn into_state(self) -> SynchronizerState {
		self.state
	}

	/// Run one fetch-then-scan round.
	pub async fn tick(&mut self) -> Result<TickSummary, WalletSyncError> {
		let keys = self
			.keys
			.clone()
			.ok_or(WalletSyncError::KeyManagementNotAttached)?;

		let previous_timestamp = self.state.start_timestamp;
		let blocks = self.fetcher.fetch_next(&mut self.state, keys.as_ref()).await?;

		if previous_timestamp != 0 && self.state.start_timestamp == 0 {
			self.event_dispatcher
				.dispatch(&SyncEvent::ResumePointPinned {
					timestamp: previous_timestamp,
					height: self.state.start_height,
				})
				.await;
		}

		let mut summary = TickSummary::default();

		for block in &blocks {
			if let Some(rewound) = self.rewind_if_forked(block.height, &block.hash) {
				summary.fork_height = Some(
					summary
						.fork_height
						.map_or(block.height, |h| h.min(block.height)),
				);
				self.event_dispatcher
					.dispatch(&SyncEvent::ForkDetected {
						height: block.height,
						previous_height: rewound.0,
						rewound_checkpoints: rewound.1,
					})
					.await;
			}

			let data = TransactionScanner::new(keys.as_ref(), &self.state.view_key).scan_block(block);
			summary.transactions += data.transactions_to_add.len();

			self.event_dispatcher
				.dispatch(&SyncEvent::BlockScanned {
					height: block.height,
					hash: block.hash,
					data,
				})
				.await;

			self.state.checkpoints.record(block.height, block.hash)?;
			summary.blocks += 1;
		}

		summary.height = self.sync_height();

		if summary.blocks > 0 {
			debug!(
				"Tick scanned {} blocks, {} wallet transactions, now at height {}",
				summary.blocks, summary.transactions, summary.height
			);
		}

		self.event_dispatcher
			.dispatch(&SyncEvent::TickCompleted {
				height: summary.height,
				blocks: summary.blocks,
			})
			.await;

		Ok(summary)
	}

	/// Rewind the checkpoints when `height` is not above the synced height.
	///
	/// Returns the height before the rewind and the number of recent checkpoints dropped.
	fn rewind_if_forked(&mut self, height: u64, hash: &BlockHash) -> Option<(u64, usize)> {
		let checkpoints = &mut self.state.checkpoints;
		let current = checkpoints.current_height();

		if checkpoints.is_empty() || height > current {
			return None;
		}

		warn!(
			"Fork detected: daemon returned block {} at height {} while wallet is at height {}",
			hash, height, current
		);

		if checkpoints
			.oldest_recent_height()
			.is_none_or(|oldest| height < oldest)
		{
			warn!(
				"Fork at height {} is deeper than the {}-block checkpoint window",
				height,
				checkpoints.window()
			);
		}

		let dropped = checkpoints.rewind(height);
		info!(
			"Rewound from height {} to below {} ({} checkpoints dropped)",
			current, height, dropped
		);
		Some((current, dropped))
	}

	/// Hashes of `candidates` whose unlock time has passed.
	pub async fn check_locked_transactions(
		&self,
		candidates: &[LockedTransaction],
	) -> Vec<TransactionHash> {
		check_locked_transactions(self.node.as_ref(), candidates).await
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::node::{KeyImage, KeyInput, PublicKey, RawTransaction};
	use crate::test_utils::{MockKeys, MockNode, RecordingHandler, block_at, blocks_from};

	const OWNER: PublicKey = PublicKey([1; 32]);

	fn synchronizer(node: Arc<MockNode>, start_height: u64, start_timestamp: u64) -> WalletSynchronizer {
		let config = SyncConfig {
			checkpoint_window: 10,
			sparse_checkpoint_interval: 1_000,
			..SyncConfig::default()
		};
		WalletSynchronizer::new(node, &config, SecretKey([5; 32]), start_height, start_timestamp)
	}

	#[tokio::test]
	async fn test_tick_before_attach_fails_fast() {
		let node = Arc::new(MockNode::new(100));
		node.push_batch(blocks_from(0, 3));
		let mut sync = synchronizer(node.clone(), 0, 0);

		let err = sync.tick().await.expect_err("not attached");
		assert!(matches!(err, WalletSyncError::KeyManagementNotAttached));
		assert!(node.requests().is_empty());
	}

	#[tokio::test]
	async fn test_tick_records_blocks_and_reports_deltas() {
		let node = Arc::new(MockNode::new(100));
		let mut blocks = blocks_from(50, 3);
		blocks[1].transactions.push(RawTransaction {
			hash: crate::node::TransactionHash([7; 32]),
			transaction_public_key: PublicKey([8; 32]),
			inputs: vec![KeyInput {
				amount: 25,
				key_image: KeyImage([9; 32]),
			}],
			outputs: vec![],
			payment_id: String::new(),
			unlock_time: 0,
		});
		node.push_batch(blocks.clone());

		let handler = RecordingHandler::default();
		let mut sync = synchronizer(node, 50, 0);
		sync.attach(Arc::new(MockKeys::default().with_key_image(KeyImage([9; 32]), OWNER)));
		sync.register_handler(Box::new(handler.clone()));

		let summary = sync.tick().await.expect("tick");

		assert_eq!(
			summary,
			TickSummary {
				blocks: 3,
				transactions: 1,
				fork_height: None,
				height: 52,
			}
		);
		assert_eq!(sync.sync_height(), 52);
		assert_eq!(
			sync.state().checkpoints().recent_hashes(),
			vec![blocks[2].hash, blocks[1].hash, blocks[0].hash]
		);
		assert_eq!(handler.scanned_heights(), vec![50, 51, 52]);
		assert_eq!(handler.spent_key_images(), vec![KeyImage([9; 32])]);
	}

	#[tokio::test]
	async fn test_fork_rewinds_before_applying_batch() {
		let node = Arc::new(MockNode::new(100));
		node.push_batch(blocks_from(10, 6));
		// The daemon's chain replaced blocks 13..=15
		node.push_batch(vec![block_at(13, 1), block_at(14, 1), block_at(15, 1), block_at(16, 1)]);

		let handler = RecordingHandler::default();
		let mut sync = synchronizer(node, 10, 0);
		sync.attach(Arc::new(MockKeys::default()));
		sync.register_handler(Box::new(handler.clone()));

		sync.tick().await.expect("first tick");
		assert_eq!(sync.sync_height(), 15);

		let summary = sync.tick().await.expect("fork tick");

		assert_eq!(summary.fork_height, Some(13));
		assert_eq!(summary.height, 16);
		assert_eq!(handler.forks(), vec![(13, 15, 3)]);
		let hashes = sync.state().checkpoints().recent_hashes();
		assert_eq!(hashes[0], block_at(16, 1).hash);
		assert_eq!(hashes[3], block_at(13, 1).hash);
		assert_eq!(hashes[4], block_at(12, 0).hash);
	}

	#[tokio::test]
	async fn test_timestamp_resume_emits_pin_event() {
		let node = Arc::new(MockNode::new(100));
		node.push_batch(blocks_from(40, 2));

		let keys = Arc::new(MockKeys::default());
		let handler = RecordingHandler::default();
		let mut sync = synchronizer(node, 0, 1_650_000_000);
		sync.attach(keys.clone());
		sync.register_handler(Box::new(handler.clone()));

		sync.tick().await.expect("tick");

		assert_eq!(sync.state().start_timestamp(), 0);
		assert_eq!(sync.state().start_height(), 40);
		assert_eq!(keys.pins(), vec![(1_650_000_000, 40)]);
		assert_eq!(handler.pins(), vec![(1_650_000_000, 40)]);
	}

	#[tokio::test]
	async fn test_restored_state_resumes_from_checkpoints() {
		let node = Arc::new(MockNode::new(100));
		node.push_batch(blocks_from(20, 2));
		let mut sync = synchronizer(node.clone(), 20, 0);
		sync.attach(Arc::new(MockKeys::default()));
		sync.tick().await.expect("tick");

		let json = serde_json::to_string(&sync.into_state()).expect("serializes");
		let state: SynchronizerState = serde_json::from_str(&json).expect("deserializes");

		node.push_batch(blocks_from(22, 1));
		let mut restored = WalletSynchronizer::from_state(node.clone(), state);
		assert!(!restored.is_attached());
		restored.attach(Arc::new(MockKeys::default()));

		let summary = restored.tick().await.expect("tick");
		assert_eq!(summary.height, 22);
		assert_eq!(summary.fork_height, None);
		let requests = node.requests();
		let (checkpoints, start_height, _) = &requests[1];
		assert_eq!(checkpoints[0], block_at(21, 0).hash);
		assert_eq!(*start_height, 20);
	}

	#[tokio::test]
	async fn test_node_behind_is_a_quiet_no_op() {
		let node = Arc::new(MockNode::new(100));
		node.push_batch(blocks_from(90, 5));
		let mut sync = synchronizer(node.clone(), 90, 0);
		sync.attach(Arc::new(MockKeys::default()));
		sync.tick().await.expect("tick");

		node.set_height(50);
		let before = sync.state().clone();
		let summary = sync.tick().await.expect("tick");

		assert_eq!(summary.blocks, 0);
		assert_eq!(sync.state(), &before);
	}
}
