//! Metric stores
//!
//! The aggregation engine only talks to the [`MetricStore`] trait. Two
//! implementations are provided:
//!
//! - **SQLite** (default): Embedded database with embedded migrations
//! - **In-Memory**: No persistence, for testing and dry runs
//!
//! ## Usage
//!
//! ```no_run
//! use player_count::storage::{MetricStore, sqlite::SqliteStore};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let store = SqliteStore::new("./player-count.db").await?;
//!     let apps = store.get_application_list().await?;
//!     println!("tracking {} applications", apps.len());
//!     Ok(())
//! }
//! ```

pub mod backend;
pub mod error;
pub mod memory;
#[cfg(feature = "storage-sqlite")]
pub mod schema;
#[cfg(feature = "storage-sqlite")]
pub mod sqlite;

pub use backend::{HealthStatus, MetricStore};
pub use error::{StorageError, StorageResult};
pub use memory::MemoryStore;
