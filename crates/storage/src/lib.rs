//! Storage Layer
//!
//! The store is the single source of truth shared by the poll loop and the
//! command side. Every write is keyed by service id and idempotent on its own.

mod memory;
mod records;
mod sqlite;
mod store;

pub use memory::MemoryStore;
pub use records::{
    DeployReport, ManualAction, ManualActionKind, MonitoredService, StatusChangeEvent,
    DEFAULT_LOG_ERROR_THRESHOLD,
};
pub use sqlite::SqliteStore;
pub use store::Store;

use thiserror::Error;

/// Storage errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    DatabaseError(String),
    #[error("Service not found: {0}")]
    NotFound(String),
    #[error("Corrupt record: {0}")]
    Corrupt(String),
}

impl From<sqlx::Error> for StorageError {
    fn from(err: sqlx::Error) -> Self {
        StorageError::DatabaseError(err.to_string())
    }
}
