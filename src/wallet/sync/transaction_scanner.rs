use crate::node::{Block, KeyInput, PublicKey, RawCoinbaseTransaction, RawOutput, RawTransaction, SecretKey};
use crate::wallet::keys::KeyManagement;
use crate::wallet::types::{SpentKeyImage, Transaction, TransactionData, TransferMap};

use tracing::{debug, warn};

/// Turns raw transactions into ledger deltas for the wallet's sub-wallets.
#[derive(Clone, Copy)]
pub struct TransactionScanner<'a> {
	keys: &'a dyn KeyManagement,
	view_key: &'a SecretKey,
}

impl<'a> TransactionScanner<'a> {
	pub fn new(keys: &'a dyn KeyManagement, view_key: &'a SecretKey) -> Self {
		Self { keys, view_key }
	}

	/// Debit owned inputs and queue their key images to be marked spent.
	///
	/// Returns the sum of every input amount, owned or not.
	pub fn scan_inputs(
		&self,
		inputs: &[KeyInput],
		transfers: &mut TransferMap,
		data: &mut TransactionData,
	) -> u128 {
		let mut sum = 0u128;

		for input in inputs {
			sum += u128::from(input.amount);

			if let Some(owner) = self.keys.owner_of_key_image(&input.key_image) {
				transfers.debit(owner, input.amount);
				data.key_images_to_mark_spent.push(SpentKeyImage {
					owner,
					key_image: input.key_image,
				});
			}
		}

		sum
	}

	/// Credit outputs paying to one of the wallet's spend keys.
	///
	/// Returns the sum of every output amount, owned or not.
	pub fn scan_outputs(
		&self,
		transaction_public_key: &PublicKey,
		outputs: &[RawOutput],
		transfers: &mut TransferMap,
	) -> u128 {
		let mut sum = 0u128;

		for (index, output) in outputs.iter().enumerate() {
			sum += u128::from(output.amount);

			if let Some(owner) = self.keys.derive_output_owner(
				transaction_public_key,
				index,
				&output.key,
				self.view_key,
			) {
				transfers.credit(owner, output.amount);
			}
		}

		sum
	}

	pub fn scan_transaction(
		&self,
		tx: &RawTransaction,
		block_timestamp: u64,
		block_height: u64,
	) -> TransactionData {
		let mut data = TransactionData::new();
		let mut transfers = TransferMap::new();

		let sum_inputs = self.scan_inputs(&tx.inputs, &mut transfers, &mut data);
		let sum_outputs =
			self.scan_outputs(&tx.transaction_public_key, &tx.outputs, &mut transfers);

		if !transfers.is_empty() {
			let fee = match sum_inputs
				.checked_sub(sum_outputs)
				.and_then(|fee| u64::try_from(fee).ok())
			{
				Some(fee) => fee,
				None => {
					warn!(
						"Transaction {} spends {} and creates {}, no valid fee; recording fee 0",
						tx.hash, sum_inputs, sum_outputs
					);
					0
				}
			};

			debug!(
				"Transaction {} at height {} touches {} sub-wallets",
				tx.hash,
				block_height,
				transfers.len()
			);

			data.transactions_to_add.push(Transaction {
				transfers,
				hash: tx.hash,
				fee,
				timestamp: block_timestamp,
				block_height,
				payment_id: tx.payment_id.clone(),
				unlock_time: tx.unlock_time,
				is_coinbase: false,
			});
		}

		data
	}

	pub fn scan_coinbase(
		&self,
		tx: &RawCoinbaseTransaction,
		block_timestamp: u64,
		block_height: u64,
	) -> TransactionData {
		let mut data = TransactionData::new();
		let mut transfers = TransferMap::new();

		self.scan_outputs(&tx.transaction_public_key, &tx.outputs, &mut transfers);

		if !transfers.is_empty() {
			debug!(
				"Coinbase {} at height {} pays the wallet",
				tx.hash, block_height
			);

			data.transactions_to_add.push(Transaction {
				transfers,
				hash: tx.hash,
				fee: 0,
				timestamp: block_timestamp,
				block_height,
				payment_id: String::new(),
				unlock_time: tx.unlock_time,
				is_coinbase: true,
			});
		}

		data
	}

	/// Scan the coinbase, then every transaction in block order.
	pub fn scan_block(&self, block: &Block) -> TransactionData {
		let mut data = TransactionData::new();

		if let Some(coinbase) = &block.coinbase {
			data.extend(self.scan_coinbase(coinbase, block.timestamp, block.height));
		}

		for tx in &block.transactions {
			data.extend(self.scan_transaction(tx, block.timestamp, block.height));
		}

		data
	}
}
