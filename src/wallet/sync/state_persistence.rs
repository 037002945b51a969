//! State persistence service for wallet synchronization.
//!
//! This module defines `SynchronizerState`, the minimal state needed to resume
//! synchronization (view key, resume point, checkpoints), and the
//! `StatePersistenceService` that decides when to save it and restores it on startup.
//! File details live behind the `SyncStateRepository` trait.

use crate::node::SecretKey;
use crate::wallet::WalletSyncError;
use crate::wallet::sync::checkpoints::CheckpointTracker;
use crate::wallet::sync::repositories::{FileSyncStateRepository, SyncStateRepository};

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::info;

/// Everything the synchronizer needs to pick up where it left off.
///
/// `start_height` and `start_timestamp` are alternative resume points: a non-zero
/// timestamp is used until the first batch arrives, after which it is zeroed for good
/// and the height takes over. The key-management component is not part of this state
/// and must be attached again after a restore.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SynchronizerState {
	pub(crate) view_key: SecretKey,
	pub(crate) start_height: u64,
	pub(crate) start_timestamp: u64,
	pub(crate) checkpoints: CheckpointTracker,
}

impl SynchronizerState {
	pub fn new(
		view_key: SecretKey,
		start_height: u64,
		start_timestamp: u64,
		checkpoints: CheckpointTracker,
	) -> Self {
		Self {
			view_key,
			start_height,
			start_timestamp,
			checkpoints,
		}
	}

	pub fn view_key(&self) -> &SecretKey {
		&self.view_key
	}

	pub fn start_height(&self) -> u64 {
		self.start_height
	}

	pub fn start_timestamp(&self) -> u64 {
		self.start_timestamp
	}

	pub fn checkpoints(&self) -> &CheckpointTracker {
		&self.checkpoints
	}
}

/// Configuration for periodic state saving.
#[derive(Debug, Clone)]
pub struct PersistenceConfig {
	/// Save state after this many newly synced blocks.
	pub interval: u64,
}

impl Default for PersistenceConfig {
	fn default() -> Self {
		Self { interval: 1000 }
	}
}

/// Service for saving and restoring synchronizer state.
pub struct StatePersistenceService {
	state_repo: Box<dyn SyncStateRepository + Send + Sync>,
	config: PersistenceConfig,
	last_saved_height: Option<u64>,
}

impl StatePersistenceService {
	/// Create a persistence service storing state files in `data_dir`.
	pub fn new(data_dir: PathBuf, config: PersistenceConfig) -> Self {
		Self::with_repository(Box::new(FileSyncStateRepository::new(data_dir)), config)
	}

	pub fn with_repository(
		state_repo: Box<dyn SyncStateRepository + Send + Sync>,
		config: PersistenceConfig,
	) -> Self {
		Self {
			state_repo,
			config,
			last_saved_height: None,
		}
	}

	/// Save unconditionally.
	pub async fn save_state(&mut self, state: &SynchronizerState) -> Result<(), WalletSyncError> {
		let height = state.checkpoints.current_height();
		self.state_repo.save(state, height).await?;
		self.last_saved_height = Some(height);
		Ok(())
	}

	/// Save if at least `interval` blocks were synced (or rewound) since the last save.
	///
	/// Returns whether the state was written.
	pub async fn save_if_due(&mut self, state: &SynchronizerState) -> Result<bool, WalletSyncError> {
		let height = state.checkpoints.current_height();
		let due = match self.last_saved_height {
			Some(saved) => height.abs_diff(saved) >= self.config.interval,
			None => true,
		};

		if due {
			self.save_state(state).await?;
		}
		Ok(due)
	}

	/// Restore the last saved state, if any.
	pub async fn restore_state(&mut self) -> Result<Option<SynchronizerState>, WalletSyncError> {
		let restored = self.state_repo.load().await?;

		Ok(restored.map(|(state, height)| {
			info!("Restored synchronizer state at height {}", height);
			self.last_saved_height = Some(height);
			state
		}))
	}
}
