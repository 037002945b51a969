//! Types for the daemon's wallet sync API

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Error returned when a hex string does not decode to exactly 32 bytes.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("expected 64 hex characters, got {0:?}")]
pub struct InvalidKeyHex(pub String);

fn decode_32(s: &str) -> Result<[u8; 32], InvalidKeyHex> {
	let bytes = hex::decode(s).map_err(|_| InvalidKeyHex(s.to_string()))?;
	bytes
		.try_into()
		.map_err(|_| InvalidKeyHex(s.to_string()))
}

/// Declares a public 32-byte identifier that travels as lowercase hex.
macro_rules! hex_bytes32 {
	($(#[$meta:meta])* $name:ident) => {
		$(#[$meta])*
		#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
		pub struct $name(pub [u8; 32]);

		impl fmt::Display for $name {
			fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
				f.write_str(&hex::encode(self.0))
			}
		}

		impl fmt::Debug for $name {
			fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
				write!(f, "{}({})", stringify!($name), self)
			}
		}

		impl FromStr for $name {
			type Err = InvalidKeyHex;

			fn from_str(s: &str) -> Result<Self, Self::Err> {
				decode_32(s).map(Self)
			}
		}

		impl Serialize for $name {
			fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
				serializer.serialize_str(&hex::encode(self.0))
			}
		}

		impl<'de> Deserialize<'de> for $name {
			fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
				let s = String::deserialize(deserializer)?;
				s.parse().map_err(serde::de::Error::custom)
			}
		}
	};
}

hex_bytes32!(
	/// Hash identifying a block on the daemon's chain.
	BlockHash
);
hex_bytes32!(
	/// Hash identifying a transaction.
	TransactionHash
);
hex_bytes32!(
	/// A curve point: transaction public keys, one-time output keys and public spend keys.
	PublicKey
);
hex_bytes32!(
	/// Unique tag of a spent output, shared by every transaction that tries to spend it.
	KeyImage
);

/// A private key. Serialized as hex for the wallet state file, never displayed.
#[derive(Clone, PartialEq, Eq)]
pub struct SecretKey(pub [u8; 32]);

impl fmt::Debug for SecretKey {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str("SecretKey(<redacted>)")
	}
}

impl FromStr for SecretKey {
	type Err = InvalidKeyHex;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		decode_32(s)
			.map(Self)
			.map_err(|_| InvalidKeyHex("<secret>".to_string()))
	}
}

impl Serialize for SecretKey {
	fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
		serializer.serialize_str(&hex::encode(self.0))
	}
}

impl<'de> Deserialize<'de> for SecretKey {
	fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
		let s = String::deserialize(deserializer)?;
		s.parse().map_err(serde::de::Error::custom)
	}
}

/// An input spending a previous output, identified by its key image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyInput {
	/// Amount in atomic units.
	pub amount: u64,
	#[serde(rename = "k_image")]
	pub key_image: KeyImage,
}

/// A transaction output as returned by the daemon.
///
/// The core never interprets the key itself; it hands it to the key-management
/// collaborator together with the transaction public key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawOutput {
	/// One-time destination key.
	pub key: PublicKey,
	/// Amount in atomic units.
	pub amount: u64,
}

/// The value-minting transaction of a block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawCoinbaseTransaction {
	pub hash: TransactionHash,
	#[serde(rename = "txPublicKey")]
	pub transaction_public_key: PublicKey,
	#[serde(default)]
	pub outputs: Vec<RawOutput>,
	#[serde(rename = "unlockTime", default)]
	pub unlock_time: u64,
}

/// A regular (non-coinbase) transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawTransaction {
	pub hash: TransactionHash,
	#[serde(rename = "txPublicKey")]
	pub transaction_public_key: PublicKey,
	#[serde(default)]
	pub inputs: Vec<KeyInput>,
	#[serde(default)]
	pub outputs: Vec<RawOutput>,
	#[serde(rename = "paymentID", default)]
	pub payment_id: String,
	#[serde(rename = "unlockTime", default)]
	pub unlock_time: u64,
}

/// A block returned by the wallet sync endpoint. Immutable once fetched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
	#[serde(rename = "blockHeight")]
	pub height: u64,
	#[serde(rename = "blockHash")]
	pub hash: BlockHash,
	#[serde(rename = "blockTimestamp")]
	pub timestamp: u64,
	#[serde(default)]
	pub transactions: Vec<RawTransaction>,
	#[serde(rename = "coinbaseTX", default)]
	pub coinbase: Option<RawCoinbaseTransaction>,
}

/// Body of `POST /getwalletsyncdata`.
#[derive(Debug, Clone, Serialize)]
pub struct SyncDataRequest {
	#[serde(rename = "blockHashCheckpoints")]
	pub block_hash_checkpoints: Vec<BlockHash>,
	#[serde(rename = "startHeight")]
	pub start_height: u64,
	#[serde(rename = "startTimestamp")]
	pub start_timestamp: u64,
	#[serde(rename = "blockCount")]
	pub block_count: u64,
	#[serde(rename = "skipCoinbaseTransactions")]
	pub skip_coinbase_transactions: bool,
}

/// Response of `POST /getwalletsyncdata`.
#[derive(Debug, Clone, Deserialize)]
pub struct SyncDataResponse {
	#[serde(default)]
	pub items: Vec<Block>,
	pub status: String,
	#[serde(default)]
	pub synced: bool,
}

/// Response of `GET /height`.
#[derive(Debug, Clone, Deserialize)]
pub struct HeightResponse {
	pub height: u64,
	#[serde(default)]
	pub network_height: u64,
}

/// Error types for daemon requests. All of them are transient from the sync engine's view.
#[derive(Debug, thiserror::Error)]
pub enum NodeError {
	#[error("HTTP error: {0}")]
	Http(#[from] reqwest::Error),

	#[error("JSON parse error: {0}")]
	Json(#[from] serde_json::Error),

	#[error("Daemon returned status {0}")]
	Status(String),

	#[error("Daemon unreachable: {0}")]
	Unreachable(String),
}
