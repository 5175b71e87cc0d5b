//! Storage abstractions for dataset persistence.
//!
//! Two durable artifacts back the pipeline:
//! - the SQLite table `violations` — the full current snapshot of the
//!   source, replaced atomically per run
//! - `known_ids.txt` — the checkpoint of identity keys seen as of the last
//!   successful run, one key per line, sorted
//!
//! The orchestrator is the only writer of both; the query surface reads the
//! table concurrently and must never observe a partially-replaced dataset.

pub mod checkpoint;
pub mod sqlite;

use async_trait::async_trait;

use crate::error::PersistenceError;
use crate::models::Violation;

// Re-export for convenience
pub use checkpoint::CheckpointFile;
pub use sqlite::{EstablishmentCount, SearchField, SqliteStore};

/// Trait for dataset storage backends.
#[async_trait]
pub trait ViolationStore: Send + Sync {
    /// Atomically discard the prior dataset and insert exactly `records`.
    ///
    /// Either all rows land or none do; a mid-insert failure must leave the
    /// previous dataset visible to readers.
    async fn replace_all(&self, records: &[Violation])
    -> std::result::Result<(), PersistenceError>;
}
