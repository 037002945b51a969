//!
//! HTTP client for a CryptoNote daemon's wallet sync API.
//!
//! The daemon exposes a plain JSON API: `GET /height` reports its chain tip and
//! `POST /getwalletsyncdata` returns the blocks following the most recent block hash
//! checkpoint it still recognizes.

use super::remote::RemoteNode;
use super::types::*;
use backoff::{ExponentialBackoff, future::retry};
use reqwest::Client;
use std::time::Duration;
use tracing::debug;

/// Daemon client
#[derive(Clone)]
pub struct DaemonClient {
	/// The underlying HTTP client.
	http_client: Client,
	/// The daemon base URL, e.g. `http://127.0.0.1:11898`.
	daemon_url: String,
	/// Blocks requested per sync batch.
	block_count: u64,
	/// Ask the daemon to leave coinbase transactions out of the batch.
	skip_coinbase_transactions: bool,
	/// Upper bound for a single request, and for the retries of idempotent ones.
	request_timeout: Duration,
}

impl DaemonClient {
	/// Create a new daemon client.
	///
	/// # Arguments
	/// * `daemon_url` - Base URL of the daemon's HTTP API.
	/// * `block_count` - How many blocks to request per batch.
	/// * `request_timeout` - Timeout for a single request.
	pub fn new(
		daemon_url: String,
		block_count: u64,
		request_timeout: Duration,
	) -> Result<Self, NodeError> {
		let http_client = Client::builder().timeout(request_timeout).build()?;

		Ok(Self {
			http_client,
			daemon_url: daemon_url.trim_end_matches('/').to_string(),
			block_count,
			skip_coinbase_transactions: false,
			request_timeout,
		})
	}

	/// Leave coinbase transactions out of fetched batches (wallets that never mine).
	pub fn with_skip_coinbase_transactions(mut self, skip: bool) -> Self {
		self.skip_coinbase_transactions = skip;
		self
	}

	fn endpoint(&self, path: &str) -> String {
		format!("{}/{}", self.daemon_url, path)
	}

	async fn get_height(&self) -> Result<HeightResponse, NodeError> {
		let response = self
			.http_client
			.get(self.endpoint("height"))
			.send()
			.await
			.map_err(send_error)?;

		if !response.status().is_success() {
			return Err(NodeError::Status(response.status().to_string()));
		}

		Ok(response.json().await?)
	}
}

/// Connection failures and timeouts mean the daemon could not be reached at all.
fn send_error(e: reqwest::Error) -> NodeError {
	if e.is_connect() || e.is_timeout() {
		NodeError::Unreachable(e.to_string())
	} else {
		NodeError::Http(e)
	}
}

#[async_trait::async_trait]
impl RemoteNode for DaemonClient {
	async fn local_height(&self) -> Result<u64, NodeError> {
		let policy = ExponentialBackoff {
			max_elapsed_time: Some(self.request_timeout),
			..ExponentialBackoff::default()
		};

		let height = retry(policy, || async {
			self.get_height().await.map_err(|e| {
				debug!("Height request failed, retrying: {}", e);
				backoff::Error::transient(e)
			})
		})
		.await?;

		debug!(
			"Daemon height {} (network height {})",
			height.height, height.network_height
		);
		Ok(height.height)
	}

	async fn fetch_sync_batch(
		&self,
		checkpoints: &[BlockHash],
		start_height: u64,
		start_timestamp: u64,
	) -> Result<Vec<Block>, NodeError> {
		let request_body = SyncDataRequest {
			block_hash_checkpoints: checkpoints.to_vec(),
			start_height,
			start_timestamp,
			block_count: self.block_count,
			skip_coinbase_transactions: self.skip_coinbase_transactions,
		};

		let response = self
			.http_client
			.post(self.endpoint("getwalletsyncdata"))
			.header("Content-Type", "application/json")
			.json(&request_body)
			.send()
			.await
			.map_err(send_error)?;

		if !response.status().is_success() {
			return Err(NodeError::Status(response.status().to_string()));
		}

		let sync_data: SyncDataResponse = response.json().await?;

		if sync_data.status != "OK" {
			return Err(NodeError::Status(sync_data.status));
		}

		debug!(
			"Fetched {} blocks from {} checkpoints (synced: {})",
			sync_data.items.len(),
			checkpoints.len(),
			sync_data.synced
		);
		Ok(sync_data.items)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_endpoint_strips_trailing_slash() {
		let client = DaemonClient::new(
			"http://127.0.0.1:11898/".to_string(),
			100,
			Duration::from_secs(1),
		)
		.expect("client builds");
		assert_eq!(
			client.endpoint("getwalletsyncdata"),
			"http://127.0.0.1:11898/getwalletsyncdata"
		);
	}

	#[tokio::test]
	async fn test_unreachable_daemon_is_an_error() {
		// Port 9 (discard) on localhost is not expected to serve HTTP.
		let client = DaemonClient::new(
			"http://127.0.0.1:9".to_string(),
			100,
			Duration::from_millis(200),
		)
		.expect("client builds");
		let err = client
			.fetch_sync_batch(&[], 0, 0)
			.await
			.expect_err("nothing listening");
		assert!(matches!(err, NodeError::Unreachable(_)), "{:?}", err);
	}
}
