pub mod keys;
pub mod sync;
pub mod types;
pub mod watch_list;

pub use keys::KeyManagement;
pub use sync::{TickSummary, WalletSynchronizer};
pub use types::*;
pub use watch_list::WatchListKeys;
