//! Unlock-time gating for received transactions.
//!
//! An unlock time below `MAX_BLOCK_NUMBER` is a block height; anything else is a UNIX
//! timestamp. The ledger keeps transactions with a future unlock time aside and asks
//! periodically which of them have become spendable.

use crate::node::{RemoteNode, TransactionHash};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Unlock times below this value are block heights.
pub const MAX_BLOCK_NUMBER: u64 = 500_000_000;
/// Blocks of slack when comparing a height-based unlock time.
pub const LOCKED_TX_ALLOWED_DELTA_BLOCKS: u64 = 1;
/// Seconds of slack when comparing a timestamp-based unlock time.
pub const LOCKED_TX_ALLOWED_DELTA_SECONDS: u64 = 1;

/// A transaction the ledger is holding until its unlock time passes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockedTransaction {
	pub hash: TransactionHash,
	pub unlock_time: u64,
}

/// Whether `unlock_time` has passed at `height` / `now` (UNIX seconds).
pub fn is_unlocked(unlock_time: u64, height: u64, now: u64) -> bool {
	if unlock_time < MAX_BLOCK_NUMBER {
		height.saturating_add(LOCKED_TX_ALLOWED_DELTA_BLOCKS) >= unlock_time
	} else {
		now.saturating_add(LOCKED_TX_ALLOWED_DELTA_SECONDS) >= unlock_time
	}
}

/// Return the hashes of `candidates` that are spendable at the daemon's current height
/// and the local clock. A daemon failure reports nothing unlocked for this round.
pub async fn check_locked_transactions(
	node: &dyn RemoteNode,
	candidates: &[LockedTransaction],
) -> Vec<TransactionHash> {
	if candidates.is_empty() {
		return Vec::new();
	}

	let height = match node.local_height().await {
		Ok(height) => height,
		Err(e) => {
			warn!("Failed to get daemon height for unlock check: {}", e);
			return Vec::new();
		}
	};
	let now = u64::try_from(chrono::Utc::now().timestamp()).unwrap_or(0);

	let unlocked: Vec<TransactionHash> = candidates
		.iter()
		.filter(|candidate| is_unlocked(candidate.unlock_time, height, now))
		.map(|candidate| candidate.hash)
		.collect();

	debug!(
		"{} of {} locked transactions unlocked at height {}",
		unlocked.len(),
		candidates.len(),
		height
	);
	unlocked
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::test_utils::MockNode;

	#[test]
	fn test_height_based_unlock() {
		assert!(is_unlocked(0, 0, 0));
		assert!(is_unlocked(101, 100, 0));
		assert!(!is_unlocked(102, 100, 0));
	}

	#[test]
	fn test_timestamp_based_unlock() {
		let unlock = 1_700_000_000;
		assert!(!is_unlocked(unlock, u64::MAX - 1, unlock - 2));
		assert!(is_unlocked(unlock, 0, unlock - 1));
		assert!(is_unlocked(unlock, 0, unlock + 60));
	}

	#[tokio::test]
	async fn test_check_reports_unlocked_hashes() {
		let node = MockNode::new(1_000);
		let candidates = [
			LockedTransaction {
				hash: TransactionHash([1; 32]),
				unlock_time: 990,
			},
			LockedTransaction {
				hash: TransactionHash([2; 32]),
				unlock_time: 1_010,
			},
			LockedTransaction {
				hash: TransactionHash([3; 32]),
				unlock_time: 1_000_000_000,
			},
			LockedTransaction {
				hash: TransactionHash([4; 32]),
				unlock_time: u64::MAX,
			},
		];

		let unlocked = check_locked_transactions(&node, &candidates).await;
		assert_eq!(
			unlocked,
			vec![TransactionHash([1; 32]), TransactionHash([3; 32])]
		);
	}

	#[tokio::test]
	async fn test_check_with_failing_node_reports_nothing() {
		let node = MockNode::new(1_000).failing_height();
		let candidates = [LockedTransaction {
			hash: TransactionHash([1; 32]),
			unlock_time: 0,
		}];

		assert!(check_locked_transactions(&node, &candidates).await.is_empty());
	}
}
