//! The key-management seam.
//!
//! The sync engine never touches spend keys. It asks the key-management component
//! yes/no questions about key images and outputs, and notifies it once when a
//! timestamp-based resume point has been resolved to a block height.

use crate::node::{KeyImage, PublicKey, SecretKey};

/// Ownership queries answered by the component that holds the wallet's keys.
///
/// Queries must not change the implementor's state.
pub trait KeyManagement: Send + Sync {
	/// Public spend key of the sub-wallet that owns `key_image`, if any.
	fn owner_of_key_image(&self, key_image: &KeyImage) -> Option<PublicKey>;

	/// Public spend key of the sub-wallet that output `output_index` of a transaction
	/// pays to, derived from the transaction public key and the private view key.
	fn derive_output_owner(
		&self,
		transaction_public_key: &PublicKey,
		output_index: usize,
		output_key: &PublicKey,
		view_key: &SecretKey,
	) -> Option<PublicKey>;

	/// Convert timestamp-based bookkeeping to heights: the first block at or after
	/// `timestamp` is `height`.
	fn pin_timestamp_to_height(&self, timestamp: u64, height: u64);
}
