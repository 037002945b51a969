//! Event system for wallet synchronization.
//!
//! The orchestrator reports what each tick produced as `SyncEvent`s: ledger deltas per
//! scanned block, detected forks, and the one-time resolution of a timestamp resume
//! point. The caller's ledger registers a `SyncEventHandler` to apply them; logging or
//! persistence hooks can be registered alongside it.

use crate::node::BlockHash;
use crate::wallet::WalletSyncError;
use crate::wallet::types::TransactionData;

/// Events that occur during wallet synchronization
#[derive(Debug, Clone)]
pub enum SyncEvent {
	/// The wallet's chain forked away; ledger entries at or above `height` must be
	/// rolled back before the following `BlockScanned` events are applied.
	ForkDetected {
		height: u64,
		previous_height: u64,
		rewound_checkpoints: usize,
	},
	/// A timestamp resume point was resolved to the height of the first fetched block
	ResumePointPinned { timestamp: u64, height: u64 },
	/// A block was scanned; `data` is its ledger delta
	BlockScanned {
		height: u64,
		hash: BlockHash,
		data: TransactionData,
	},
	/// A tick finished; `height` is the synced height after it
	TickCompleted { height: u64, blocks: usize },
}

/// Trait for handling sync events.
#[async_trait::async_trait]
pub trait SyncEventHandler: Send + Sync {
	/// Handle a sync event.
	async fn handle(&mut self, event: &SyncEvent) -> Result<(), WalletSyncError>;

	/// Get the name of this handler for logging and diagnostics.
	fn name(&self) -> &'static str;
}

/// Event dispatcher that manages multiple event handlers.
///
/// Handlers are called in registration order for every event.
#[derive(Default)]
pub struct EventDispatcher {
	handlers: Vec<Box<dyn SyncEventHandler>>,
}

impl EventDispatcher {
	/// Create a new, empty event dispatcher.
	pub fn new() -> Self {
		Self::default()
	}

	/// Register a new event handler.
	pub fn register_handler(&mut self, handler: Box<dyn SyncEventHandler>) {
		self.handlers.push(handler);
	}

	pub fn len(&self) -> usize {
		self.handlers.len()
	}

	pub fn is_empty(&self) -> bool {
		self.handlers.is_empty()
	}

	/// Dispatch an event to all registered handlers.
	///
	/// Errors from handlers are logged, but do not stop other handlers from running.
	pub async fn dispatch(&mut self, event: &SyncEvent) {
		for handler in &mut self.handlers {
			if let Err(e) = handler.handle(event).await {
				tracing::error!("Handler {} failed to process event: {}", handler.name(), e);
			}
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::sync::{Arc, Mutex};

	struct Failing;

	#[async_trait::async_trait]
	impl SyncEventHandler for Failing {
		async fn handle(&mut self, _event: &SyncEvent) -> Result<(), WalletSyncError> {
			Err(WalletSyncError::Persistence("ledger offline".to_string()))
		}

		fn name(&self) -> &'static str {
			"Failing"
		}
	}

	struct Counting(Arc<Mutex<usize>>);

	#[async_trait::async_trait]
	impl SyncEventHandler for Counting {
		async fn handle(&mut self, _event: &SyncEvent) -> Result<(), WalletSyncError> {
			*self.0.lock().expect("lock") += 1;
			Ok(())
		}

		fn name(&self) -> &'static str {
			"Counting"
		}
	}

	#[tokio::test]
	async fn test_failing_handler_does_not_block_others() {
		let count = Arc::new(Mutex::new(0));
		let mut dispatcher = EventDispatcher::new();
		dispatcher.register_handler(Box::new(Failing));
		dispatcher.register_handler(Box::new(Counting(count.clone())));

		dispatcher
			.dispatch(&SyncEvent::TickCompleted { height: 1, blocks: 0 })
			.await;
		dispatcher
			.dispatch(&SyncEvent::ResumePointPinned {
				timestamp: 1,
				height: 2,
			})
			.await;

		assert_eq!(dispatcher.len(), 2);
		assert_eq!(*count.lock().expect("lock"), 2);
	}
}
