//! Test doubles for the remote node and key-management collaborators.

use crate::node::{Block, BlockHash, KeyImage, NodeError, PublicKey, RemoteNode, SecretKey};
use crate::wallet::WalletSyncError;
use crate::wallet::keys::KeyManagement;
use crate::wallet::sync::events::{SyncEvent, SyncEventHandler};

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

/// Block hash unique per (height, fork tag).
pub fn block_at(height: u64, fork: u8) -> Block {
	let mut hash = [fork; 32];
	hash[..8].copy_from_slice(&height.to_le_bytes());
	Block {
		height,
		hash: BlockHash(hash),
		timestamp: 1_500_000_000 + height * 30,
		transactions: Vec::new(),
		coinbase: None,
	}
}

/// `count` consecutive blocks on the main chain starting at `start`.
pub fn blocks_from(start: u64, count: u64) -> Vec<Block> {
	(start..start + count).map(|h| block_at(h, 0)).collect()
}

type Request = (Vec<BlockHash>, u64, u64);

/// Remote node returning queued batches in order, then empty batches.
#[derive(Default)]
pub struct MockNode {
	height: Mutex<u64>,
	batches: Mutex<VecDeque<Vec<Block>>>,
	requests: Mutex<Vec<Request>>,
	fail_height: bool,
	fail_batches: bool,
}

impl MockNode {
	pub fn new(height: u64) -> Self {
		Self {
			height: Mutex::new(height),
			..Self::default()
		}
	}

	pub fn failing_height(mut self) -> Self {
		self.fail_height = true;
		self
	}

	pub fn failing_batches(mut self) -> Self {
		self.fail_batches = true;
		self
	}

	pub fn set_height(&self, height: u64) {
		*self.height.lock().expect("lock") = height;
	}

	pub fn push_batch(&self, blocks: Vec<Block>) {
		self.batches.lock().expect("lock").push_back(blocks);
	}

	/// Every `fetch_sync_batch` call as (checkpoints, start height, start timestamp).
	pub fn requests(&self) -> Vec<Request> {
		self.requests.lock().expect("lock").clone()
	}
}

#[async_trait::async_trait]
impl RemoteNode for MockNode {
	async fn local_height(&self) -> Result<u64, NodeError> {
		if self.fail_height {
			return Err(NodeError::Unreachable("connection refused".to_string()));
		}
		Ok(*self.height.lock().expect("lock"))
	}

	async fn fetch_sync_batch(
		&self,
		checkpoints: &[BlockHash],
		start_height: u64,
		start_timestamp: u64,
	) -> Result<Vec<Block>, NodeError> {
		self.requests.lock().expect("lock").push((
			checkpoints.to_vec(),
			start_height,
			start_timestamp,
		));
		if self.fail_batches {
			return Err(NodeError::Status("BUSY".to_string()));
		}
		Ok(self
			.batches
			.lock()
			.expect("lock")
			.pop_front()
			.unwrap_or_default())
	}
}

/// Key management answering from fixed maps and recording calls.
#[derive(Default)]
pub struct MockKeys {
	key_images: HashMap<KeyImage, PublicKey>,
	outputs: HashMap<PublicKey, PublicKey>,
	derivations: Mutex<Vec<(PublicKey, usize)>>,
	pins: Mutex<Vec<(u64, u64)>>,
}

impl MockKeys {
	pub fn with_key_image(mut self, key_image: KeyImage, owner: PublicKey) -> Self {
		self.key_images.insert(key_image, owner);
		self
	}

	pub fn with_output(mut self, output_key: PublicKey, owner: PublicKey) -> Self {
		self.outputs.insert(output_key, owner);
		self
	}

	pub fn derivation_queries(&self) -> Vec<(PublicKey, usize)> {
		self.derivations.lock().expect("lock").clone()
	}

	pub fn pins(&self) -> Vec<(u64, u64)> {
		self.pins.lock().expect("lock").clone()
	}
}

impl KeyManagement for MockKeys {
	fn owner_of_key_image(&self, key_image: &KeyImage) -> Option<PublicKey> {
		self.key_images.get(key_image).copied()
	}

	fn derive_output_owner(
		&self,
		transaction_public_key: &PublicKey,
		output_index: usize,
		output_key: &PublicKey,
		_view_key: &SecretKey,
	) -> Option<PublicKey> {
		self.derivations
			.lock()
			.expect("lock")
			.push((*transaction_public_key, output_index));
		self.outputs.get(output_key).copied()
	}

	fn pin_timestamp_to_height(&self, timestamp: u64, height: u64) {
		self.pins.lock().expect("lock").push((timestamp, height));
	}
}

/// Event handler keeping every event for inspection; clones share the log.
#[derive(Clone, Default)]
pub struct RecordingHandler {
	events: Arc<Mutex<Vec<SyncEvent>>>,
}

impl RecordingHandler {
	pub fn scanned_heights(&self) -> Vec<u64> {
		self.events
			.lock()
			.expect("lock")
			.iter()
			.filter_map(|event| match event {
				SyncEvent::BlockScanned { height, .. } => Some(*height),
				_ => None,
			})
			.collect()
	}

	pub fn spent_key_images(&self) -> Vec<KeyImage> {
		self.events
			.lock()
			.expect("lock")
			.iter()
			.filter_map(|event| match event {
				SyncEvent::BlockScanned { data, .. } => Some(data.key_images_to_mark_spent.clone()),
				_ => None,
			})
			.flatten()
			.map(|spent| spent.key_image)
			.collect()
	}

	/// (fork height, previous height, rewound checkpoints)
	pub fn forks(&self) -> Vec<(u64, u64, usize)> {
		self.events
			.lock()
			.expect("lock")
			.iter()
			.filter_map(|event| match event {
				SyncEvent::ForkDetected {
					height,
					previous_height,
					rewound_checkpoints,
				} => Some((*height, *previous_height, *rewound_checkpoints)),
				_ => None,
			})
			.collect()
	}

	pub fn pins(&self) -> Vec<(u64, u64)> {
		self.events
			.lock()
			.expect("lock")
			.iter()
			.filter_map(|event| match event {
				SyncEvent::ResumePointPinned { timestamp, height } => Some((*timestamp, *height)),
				_ => None,
			})
			.collect()
	}
}

#[async_trait::async_trait]
impl SyncEventHandler for RecordingHandler {
	async fn handle(&mut self, event: &SyncEvent) -> Result<(), WalletSyncError> {
		self.events.lock().expect("lock").push(event.clone());
		Ok(())
	}

	fn name(&self) -> &'static str {
		"RecordingHandler"
	}
}
