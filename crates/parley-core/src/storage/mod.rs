//! Reference storage backends.
//!
//! - [`SqliteTopicStore`]: topics and their messages
//! - [`SqliteAuditLog`]: one row per judge call
//! - [`RetryQueue`]: background replay of failed topic writes

mod audit;
mod retry;
mod sqlite;

pub use audit::SqliteAuditLog;
pub use retry::{RetryQueue, StoreOp};
pub use sqlite::{SqliteTopicStore, StoredTopic};
