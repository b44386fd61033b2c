//! `SQLite` conversation store.
//!
//! - [`connection`]: lock acquisition, pragmas, the transaction wrapper
//! - [`metrics`]: per-operation counters and latency histograms
//! - [`store`]: the [`SqliteConversationStore`] itself

mod connection;
mod metrics;
mod store;

pub use connection::{acquire_lock, configure_connection, with_transaction};
pub use metrics::{record_operation_metrics, status_of};
pub use store::SqliteConversationStore;
