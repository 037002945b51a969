//! Fork-safe block fetching.
//!
//! The daemon is sent the wallet's block hash checkpoints and answers with the blocks
//! following the most recent one it still has on its active chain. When the first
//! returned block is at or below the wallet's synced height, the wallet's chain forked
//! away; the orchestrator detects that and rewinds before applying the batch.

use crate::node::{Block, RemoteNode};
use crate::wallet::WalletSyncError;
use crate::wallet::keys::KeyManagement;
use crate::wallet::sync::state_persistence::SynchronizerState;

use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Pulls the next batch of blocks from the remote node.
#[derive(Clone)]
pub struct BlockFetcher {
	node: Arc<dyn RemoteNode>,
}

impl BlockFetcher {
	pub fn new(node: Arc<dyn RemoteNode>) -> Self {
		Self { node }
	}

	/// Fetch the blocks following the last point the wallet and the daemon agree on.
	///
	/// Transport failures and a daemon behind the wallet yield an empty batch and leave
	/// `state` untouched. The only error is a fresh sync that does not begin at the
	/// configured start height.
	pub async fn fetch_next(
		&self,
		state: &mut SynchronizerState,
		keys: &dyn KeyManagement,
	) -> Result<Vec<Block>, WalletSyncError> {
		let wallet_height = state.checkpoints.current_height();

		let remote_height = match self.node.local_height().await {
			Ok(height) => height,
			Err(e) => {
				warn!("Failed to get daemon height, retrying next tick: {}", e);
				return Ok(Vec::new());
			}
		};

		// Syncing against a daemon that is behind us would discard our progress.
		if remote_height < wallet_height {
			debug!(
				"Daemon height {} is below wallet height {}, skipping fetch",
				remote_height, wallet_height
			);
			return Ok(Vec::new());
		}

		let first_sync = state.checkpoints.is_empty();
		let start_timestamp = state.start_timestamp;

		let blocks = match self
			.node
			.fetch_sync_batch(
				&state.checkpoints.block_hash_checkpoints(),
				state.start_height,
				start_timestamp,
			)
			.await
		{
			Ok(blocks) => blocks,
			Err(e) => {
				warn!("Failed to fetch sync batch, retrying next tick: {}", e);
				return Ok(Vec::new());
			}
		};

		let Some(first) = blocks.first() else {
			return Ok(blocks);
		};

		if start_timestamp != 0 {
			info!(
				"Resume timestamp {} resolved to height {}",
				start_timestamp, first.height
			);
			state.start_timestamp = 0;
			state.start_height = first.height;
			keys.pin_timestamp_to_height(start_timestamp, first.height);
		} else if first_sync && first.height != state.start_height {
			error!(
				"First block returned by the daemon is at height {}, expected {}",
				first.height, state.start_height
			);
			return Err(WalletSyncError::ProtocolMismatch {
				expected: state.start_height,
				actual: first.height,
			});
		}

		Ok(blocks)
	}
}
