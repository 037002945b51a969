use super::types::{Block, BlockHash, NodeError};

/// The remote daemon as seen by the sync engine.
#[async_trait::async_trait]
pub trait RemoteNode: Send + Sync {
	/// Height of the daemon's own chain tip.
	async fn local_height(&self) -> Result<u64, NodeError>;

	/// Fetch the blocks following the most recent checkpoint the daemon still has on its
	/// active chain, falling back to `start_height`/`start_timestamp` when it recognizes none.
	async fn fetch_sync_batch(
		&self,
		checkpoints: &[BlockHash],
		start_height: u64,
		start_timestamp: u64,
	) -> Result<Vec<Block>, NodeError>;
}
