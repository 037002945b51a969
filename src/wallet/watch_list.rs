//! Watch-list key management.
//!
//! `WatchListKeys` answers ownership queries from precomputed lists of key images and
//! one-time output keys per sub-wallet, loaded from a JSON file. It is the collaborator
//! the scheduler binary runs with; wallets holding real spend keys plug their own
//! `KeyManagement` implementation in instead.

use crate::node::{KeyImage, PublicKey, SecretKey};
use crate::wallet::WalletSyncError;
use crate::wallet::keys::KeyManagement;

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Mutex;
use tracing::info;

/// One sub-wallet entry of the watch list file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatchedSubWallet {
	pub public_spend_key: PublicKey,
	/// Height the sub-wallet was created at; 0 when only a timestamp is known.
	#[serde(default)]
	pub creation_height: u64,
	/// Creation time as a UNIX timestamp; 0 once converted to a height.
	#[serde(default)]
	pub creation_timestamp: u64,
	#[serde(default)]
	pub key_images: Vec<KeyImage>,
	#[serde(default)]
	pub output_keys: Vec<PublicKey>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WatchListFile {
	pub subwallets: Vec<WatchedSubWallet>,
}

pub struct WatchListKeys {
	key_images: HashMap<KeyImage, PublicKey>,
	output_keys: HashMap<PublicKey, PublicKey>,
	subwallets: Mutex<Vec<WatchedSubWallet>>,
}

impl WatchListKeys {
	pub fn new(file: WatchListFile) -> Self {
		let mut key_images = HashMap::new();
		let mut output_keys = HashMap::new();

		for subwallet in &file.subwallets {
			for key_image in &subwallet.key_images {
				key_images.insert(*key_image, subwallet.public_spend_key);
			}
			for output_key in &subwallet.output_keys {
				output_keys.insert(*output_key, subwallet.public_spend_key);
			}
		}

		Self {
			key_images,
			output_keys,
			subwallets: Mutex::new(file.subwallets),
		}
	}

	/// Load a watch list from a JSON file.
	pub async fn load(path: &Path) -> Result<Self, WalletSyncError> {
		let content = tokio::fs::read_to_string(path).await?;
		let file: WatchListFile = serde_json::from_str(&content)?;

		info!(
			"Loaded watch list with {} sub-wallets from {:?}",
			file.subwallets.len(),
			path
		);
		Ok(Self::new(file))
	}

	/// Current sub-wallet bookkeeping, including any pinned creation heights.
	pub fn subwallets(&self) -> Vec<WatchedSubWallet> {
		self.subwallets
			.lock()
			.map(|guard| guard.clone())
			.unwrap_or_default()
	}
}

impl KeyManagement for WatchListKeys {
	fn owner_of_key_image(&self, key_image: &KeyImage) -> Option<PublicKey> {
		self.key_images.get(key_image).copied()
	}

	fn derive_output_owner(
		&self,
		_transaction_public_key: &PublicKey,
		_output_index: usize,
		output_key: &PublicKey,
		_view_key: &SecretKey,
	) -> Option<PublicKey> {
		// One-time keys are precomputed, so the derivation inputs are not needed here.
		self.output_keys.get(output_key).copied()
	}

	fn pin_timestamp_to_height(&self, timestamp: u64, height: u64) {
		if timestamp == 0 {
			return;
		}
		let Ok(mut subwallets) = self.subwallets.lock() else {
			return;
		};

		for subwallet in subwallets.iter_mut() {
			if subwallet.creation_timestamp == timestamp {
				info!(
					"Pinning sub-wallet {} created at timestamp {} to height {}",
					subwallet.public_spend_key, subwallet.creation_timestamp, height
				);
				subwallet.creation_timestamp = 0;
				subwallet.creation_height = height;
			}
		}

		info!("Resume timestamp {} resolved to height {}", timestamp, height);
	}
}
