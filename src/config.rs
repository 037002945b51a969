//! Configuration for the sync engine and the scheduler binary.

use crate::node::SecretKey;
use crate::wallet::WalletSyncError;
use crate::wallet::sync::checkpoints::{DEFAULT_CHECKPOINT_WINDOW, DEFAULT_SPARSE_INTERVAL};

use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Tuning of a single synchronizer.
#[derive(Debug, Clone)]
pub struct SyncConfig {
	/// Recent block hashes kept for fork detection.
	pub checkpoint_window: usize,
	/// Spacing of checkpoints kept regardless of the window.
	pub sparse_checkpoint_interval: u64,
	/// Blocks requested per sync batch.
	pub block_count: u64,
	pub skip_coinbase_transactions: bool,
	/// Delay between ticks.
	pub poll_interval: Duration,
	/// Save state after this many newly synced blocks.
	pub persist_every_blocks: u64,
}

impl Default for SyncConfig {
	fn default() -> Self {
		Self {
			checkpoint_window: DEFAULT_CHECKPOINT_WINDOW,
			sparse_checkpoint_interval: DEFAULT_SPARSE_INTERVAL,
			block_count: 100,
			skip_coinbase_transactions: false,
			poll_interval: Duration::from_secs(5),
			persist_every_blocks: 1000,
		}
	}
}

/// Binary configuration from environment variables
#[derive(Debug, Clone)]
pub struct ServiceConfig {
	/// Daemon HTTP API base URL
	pub daemon_url: String,
	/// Directory for the synchronizer state file
	pub state_dir: PathBuf,
	/// JSON file listing the watched sub-wallets
	pub watch_list_path: Option<PathBuf>,
	/// Private view key, only needed when no saved state exists
	pub view_key: Option<SecretKey>,
	pub start_height: u64,
	pub start_timestamp: u64,
	pub request_timeout: Duration,
	pub sync: SyncConfig,
}

impl ServiceConfig {
	/// Load configuration from environment variables
	///
	/// Environment variables:
	/// - `DAEMON_URL`: daemon API (default `http://127.0.0.1:11898`)
	/// - `WALLET_STATE_DIR`: state directory (default `./wallet-data`)
	/// - `WATCH_LIST_PATH`: watch-list JSON file
	/// - `WALLET_VIEW_KEY`: hex private view key for a fresh sync
	/// - `START_HEIGHT`, `START_TIMESTAMP`: resume point for a fresh sync
	/// - `POLL_INTERVAL_SECS`, `BLOCK_COUNT`, `REQUEST_TIMEOUT_SECS`
	pub fn from_env() -> Result<Self, WalletSyncError> {
		Self::from_lookup(|key| env::var(key).ok())
	}

	/// Build the configuration from any key lookup.
	pub fn from_lookup<F>(lookup: F) -> Result<Self, WalletSyncError>
	where
		F: Fn(&str) -> Option<String>,
	{
		let defaults = SyncConfig::default();

		let daemon_url =
			lookup("DAEMON_URL").unwrap_or_else(|| "http://127.0.0.1:11898".to_string());
		let state_dir = lookup("WALLET_STATE_DIR")
			.map(PathBuf::from)
			.unwrap_or_else(|| PathBuf::from("./wallet-data"));
		let watch_list_path = lookup("WATCH_LIST_PATH").map(PathBuf::from);

		let view_key = lookup("WALLET_VIEW_KEY")
			.map(|hex| hex.parse::<SecretKey>())
			.transpose()
			.map_err(|e| WalletSyncError::Config(format!("WALLET_VIEW_KEY: {}", e)))?;

		let poll_interval = match parse_var::<u64, _>(&lookup, "POLL_INTERVAL_SECS")? {
			Some(secs) => Duration::from_secs(secs),
			None => defaults.poll_interval,
		};
		let request_timeout =
			Duration::from_secs(parse_var(&lookup, "REQUEST_TIMEOUT_SECS")?.unwrap_or(30));
		let block_count = parse_var(&lookup, "BLOCK_COUNT")?.unwrap_or(defaults.block_count);
		if block_count == 0 {
			return Err(WalletSyncError::Config(
				"BLOCK_COUNT must be positive".to_string(),
			));
		}

		Ok(Self {
			daemon_url,
			state_dir,
			watch_list_path,
			view_key,
			start_height: parse_var(&lookup, "START_HEIGHT")?.unwrap_or(0),
			start_timestamp: parse_var(&lookup, "START_TIMESTAMP")?.unwrap_or(0),
			request_timeout,
			sync: SyncConfig {
				block_count,
				poll_interval,
				..defaults
			},
		})
	}
}

fn parse_var<T, F>(lookup: &F, key: &str) -> Result<Option<T>, WalletSyncError>
where
	T: FromStr,
	T::Err: std::fmt::Display,
	F: Fn(&str) -> Option<String>,
{
	lookup(key)
		.map(|value| {
			value
				.trim()
				.parse()
				.map_err(|e| WalletSyncError::Config(format!("{}={:?}: {}", key, value, e)))
		})
		.transpose()
}
