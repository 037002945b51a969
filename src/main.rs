use cryptonote_wallet_sync::{
	config::ServiceConfig,
	node::{DaemonClient, RemoteNode, TransactionHash},
	utils::{DEFAULT_DECIMALS, format_atomic_amount},
	wallet::{
		KeyManagement, WalletSyncError, WalletSynchronizer, WatchListKeys,
		sync::{
			events::{SyncEvent, SyncEventHandler},
			locked_transactions::LockedTransaction,
			state_persistence::{PersistenceConfig, StatePersistenceService},
		},
	},
};

use std::process::ExitCode;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::time::MissedTickBehavior;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

/// Logs ledger deltas and keeps the time-locked transactions seen so far.
#[derive(Clone, Default)]
struct LedgerLogger {
	/// (block height, transaction) pairs still locked
	locked: Arc<Mutex<Vec<(u64, LockedTransaction)>>>,
}

impl LedgerLogger {
	fn lock(&self) -> Result<MutexGuard<'_, Vec<(u64, LockedTransaction)>>, WalletSyncError> {
		self.locked
			.lock()
			.map_err(|_| WalletSyncError::Persistence("ledger lock poisoned".to_string()))
	}

	fn pending(&self) -> Result<Vec<LockedTransaction>, WalletSyncError> {
		Ok(self.lock()?.iter().map(|(_, tx)| *tx).collect())
	}

	fn release(&self, hashes: &[TransactionHash]) -> Result<(), WalletSyncError> {
		self.lock()?.retain(|(_, tx)| !hashes.contains(&tx.hash));
		Ok(())
	}
}

#[async_trait::async_trait]
impl SyncEventHandler for LedgerLogger {
	async fn handle(&mut self, event: &SyncEvent) -> Result<(), WalletSyncError> {
		match event {
			SyncEvent::BlockScanned { height, data, .. } => {
				for tx in &data.transactions_to_add {
					for (owner, amount) in tx.transfers.iter() {
						info!(
							"Block {}: transaction {} moves {} for {} (fee {})",
							height,
							tx.hash,
							format_atomic_amount(*amount, DEFAULT_DECIMALS),
							owner,
							format_atomic_amount(tx.fee as i128, DEFAULT_DECIMALS)
						);
					}
					if tx.unlock_time != 0 {
						self.lock()?.push((
							*height,
							LockedTransaction {
								hash: tx.hash,
								unlock_time: tx.unlock_time,
							},
						));
					}
				}
				for spent in &data.key_images_to_mark_spent {
					info!(
						"Block {}: key image {} of {} spent",
						height, spent.key_image, spent.owner
					);
				}
			}
			SyncEvent::ForkDetected { height, .. } => {
				warn!("Discarding ledger entries at or above height {}", height);
				self.lock()?
					.retain(|(block_height, _)| block_height < height);
			}
			SyncEvent::ResumePointPinned { timestamp, height } => {
				info!("Wallet creation time {} pinned to height {}", timestamp, height);
			}
			SyncEvent::TickCompleted { .. } => {}
		}
		Ok(())
	}

	fn name(&self) -> &'static str {
		"LedgerLogger"
	}
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
	tracing_subscriber::fmt()
		.with_env_filter(
			EnvFilter::try_from_default_env()
				.unwrap_or_else(|_| EnvFilter::new("info,cryptonote_wallet_sync=debug")),
		)
		.with_target(false)
		.with_thread_ids(false)
		.with_thread_names(false)
		.with_file(false)
		.with_line_number(false)
		.with_timer(tracing_subscriber::fmt::time::time())
		.init();

	info!("Starting wallet sync service");

	match run().await {
		Ok(()) => ExitCode::SUCCESS,
		Err(e) => {
			error!("Wallet sync stopped: {}", e);
			ExitCode::FAILURE
		}
	}
}

async fn run() -> Result<(), WalletSyncError> {
	let config = ServiceConfig::from_env()?;

	let node: Arc<dyn RemoteNode> = Arc::new(
		DaemonClient::new(
			config.daemon_url.clone(),
			config.sync.block_count,
			config.request_timeout,
		)?
		.with_skip_coinbase_transactions(config.sync.skip_coinbase_transactions),
	);
	info!("Created daemon client for {}", config.daemon_url);

	let watch_list_path = config
		.watch_list_path
		.clone()
		.ok_or_else(|| WalletSyncError::Config("WATCH_LIST_PATH is not set".to_string()))?;
	let keys: Arc<dyn KeyManagement> = Arc::new(WatchListKeys::load(&watch_list_path).await?);

	let mut persistence = StatePersistenceService::new(
		config.state_dir.clone(),
		PersistenceConfig {
			interval: config.sync.persist_every_blocks,
		},
	);

	let mut synchronizer = match persistence.restore_state().await? {
		Some(state) => {
			if config
				.view_key
				.as_ref()
				.is_some_and(|key| key != state.view_key())
			{
				warn!("WALLET_VIEW_KEY differs from the saved state; using the saved key");
			}
			info!(
				"Resuming from saved state at height {}",
				state.checkpoints().current_height()
			);
			WalletSynchronizer::from_state(node, state)
		}
		None => {
			let view_key = config.view_key.clone().ok_or_else(|| {
				WalletSyncError::Config(
					"WALLET_VIEW_KEY is required when no saved state exists".to_string(),
				)
			})?;
			info!(
				"Starting fresh sync from height {} / timestamp {}",
				config.start_height, config.start_timestamp
			);
			WalletSynchronizer::new(
				node,
				&config.sync,
				view_key,
				config.start_height,
				config.start_timestamp,
			)
		}
	};

	let ledger = LedgerLogger::default();
	synchronizer.register_handler(Box::new(ledger.clone()));
	synchronizer.attach(keys);

	let mut interval = tokio::time::interval(config.sync.poll_interval);
	interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

	let shutdown = tokio::signal::ctrl_c();
	tokio::pin!(shutdown);

	let result = loop {
		tokio::select! {
			_ = &mut shutdown => {
				info!("Shutdown requested");
				break Ok(());
			}
			_ = interval.tick() => {}
		}

		match synchronizer.tick().await {
			Ok(summary) => {
				if let Err(e) = persistence.save_if_due(synchronizer.state()).await {
					warn!("Failed to save sync state: {}", e);
				}

				let pending = match ledger.pending() {
					Ok(pending) => pending,
					Err(e) => break Err(e),
				};
				let unlocked = synchronizer.check_locked_transactions(&pending).await;
				for hash in &unlocked {
					info!("Transaction {} is now unlocked", hash);
				}
				if let Err(e) = ledger.release(&unlocked) {
					break Err(e);
				}

				// Keep fetching without waiting while catching up.
				if summary.blocks > 0 {
					interval.reset_immediately();
				}
			}
			Err(e) if e.is_fatal() => break Err(e),
			Err(e) => warn!("Sync tick failed, retrying: {}", e),
		}
	};

	persistence.save_state(synchronizer.state()).await?;
	info!("Saved sync state at height {}", synchronizer.sync_height());

	result
}

#[cfg(test)]
mod tests {
	use super::*;

	fn poisoned() -> LedgerLogger {
		let ledger = LedgerLogger::default();
		let locked = ledger.locked.clone();
		let _ = std::thread::spawn(move || {
			let _guard = locked.lock().expect("first lock");
			panic!("poison the ledger");
		})
		.join();
		ledger
	}

	#[tokio::test]
	async fn test_poisoned_ledger_reports_errors_everywhere() {
		let mut ledger = poisoned();

		assert!(matches!(ledger.pending(), Err(WalletSyncError::Persistence(_))));
		assert!(matches!(ledger.release(&[]), Err(WalletSyncError::Persistence(_))));

		let fork = SyncEvent::ForkDetected {
			height: 10,
			previous_height: 12,
			rewound_checkpoints: 3,
		};
		assert!(matches!(
			ledger.handle(&fork).await,
			Err(WalletSyncError::Persistence(_))
		));
	}

	#[tokio::test]
	async fn test_fork_drops_locked_entries_at_or_above_height() {
		let mut ledger = LedgerLogger::default();
		for height in [5, 10, 11] {
			ledger.lock().expect("lock").push((
				height,
				LockedTransaction {
					hash: TransactionHash([height as u8; 32]),
					unlock_time: 100,
				},
			));
		}

		ledger
			.handle(&SyncEvent::ForkDetected {
				height: 10,
				previous_height: 11,
				rewound_checkpoints: 2,
			})
			.await
			.expect("handled");

		let pending = ledger.pending().expect("pending");
		assert_eq!(pending.len(), 1);
		assert_eq!(pending[0].hash, TransactionHash([5; 32]));

		ledger.release(&[TransactionHash([5; 32])]).expect("released");
		assert!(ledger.pending().expect("pending").is_empty());
	}
}
