use crate::wallet::WalletSyncError;
use crate::wallet::sync::state_persistence::SynchronizerState;

use std::path::PathBuf;
use tracing::{info, warn};

const STATE_FILENAME: &str = "wallet_sync_state.json";
const METADATA_FILENAME: &str = "wallet_sync_state.meta.json";

/// Repository for synchronizer state persistence
#[async_trait::async_trait]
pub trait SyncStateRepository {
	async fn save(&self, state: &SynchronizerState, height: u64) -> Result<(), WalletSyncError>;
	async fn load(&self) -> Result<Option<(SynchronizerState, u64)>, WalletSyncError>;
}

/// File-based implementation of SyncStateRepository
pub struct FileSyncStateRepository {
	data_dir: PathBuf,
}

impl FileSyncStateRepository {
	pub fn new(data_dir: PathBuf) -> Self {
		Self { data_dir }
	}

	fn state_filename(&self) -> PathBuf {
		self.data_dir.join(STATE_FILENAME)
	}

	fn metadata_filename(&self) -> PathBuf {
		self.data_dir.join(METADATA_FILENAME)
	}
}

#[async_trait::async_trait]
impl SyncStateRepository for FileSyncStateRepository {
	async fn save(&self, state: &SynchronizerState, height: u64) -> Result<(), WalletSyncError> {
		tokio::fs::create_dir_all(&self.data_dir).await?;

		// Create metadata
		let metadata = serde_json::json!({
			"sync_height": height,
			"timestamp": chrono::Utc::now().to_rfc3339(),
		});

		tokio::fs::write(
			self.metadata_filename(),
			serde_json::to_string_pretty(&metadata)?,
		)
		.await
		.map_err(|e| {
			WalletSyncError::Persistence(format!("Failed to write state metadata: {}", e))
		})?;

		// Replace the state file atomically
		let content = serde_json::to_string_pretty(state)?;
		let filename = self.state_filename();
		let tmp_filename = filename.with_extension("json.tmp");

		tokio::fs::write(&tmp_filename, content)
			.await
			.map_err(|e| {
				WalletSyncError::Persistence(format!("Failed to write state file: {}", e))
			})?;
		tokio::fs::rename(&tmp_filename, &filename).await?;

		info!("Saved synchronizer state to {:?} at height {}", filename, height);
		Ok(())
	}

	async fn load(&self) -> Result<Option<(SynchronizerState, u64)>, WalletSyncError> {
		let filename = self.state_filename();

		if !tokio::fs::try_exists(&filename).await? {
			return Ok(None);
		}

		let content = tokio::fs::read_to_string(&filename).await.map_err(|e| {
			WalletSyncError::Persistence(format!("Failed to read state file: {}", e))
		})?;

		let state: SynchronizerState = serde_json::from_str(&content).map_err(|e| {
			WalletSyncError::Persistence(format!("Failed to parse state file: {}", e))
		})?;

		// The metadata sidecar is informational; the checkpoints are authoritative
		let height = state.checkpoints.current_height();
		match tokio::fs::read_to_string(self.metadata_filename()).await {
			Ok(meta_content) => {
				let recorded = serde_json::from_str::<serde_json::Value>(&meta_content)
					.ok()
					.and_then(|metadata| metadata.get("sync_height").and_then(|h| h.as_u64()));
				if recorded.is_some_and(|recorded| recorded != height) {
					warn!(
						"State metadata height {:?} disagrees with checkpoint height {}",
						recorded, height
					);
				}
			}
			Err(e) => warn!("Could not read state metadata: {}", e),
		}

		info!("Loaded synchronizer state from {:?} at height {}", filename, height);
		Ok(Some((state, height)))
	}
}
