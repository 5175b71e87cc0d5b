// src/storage/checkpoint.rs

//! Known-identity checkpoint file.
//!
//! Plain text, one identity key per line, sorted ascending, UTF-8,
//! newline-terminated. The sorted layout keeps successive checkpoints
//! diffable and reproducible regardless of set iteration order.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use tokio::io::AsyncWriteExt;

use crate::error::CheckpointError;

/// Durable set of identity keys seen as of the last successful run.
#[derive(Debug, Clone)]
pub struct CheckpointFile {
    path: PathBuf,
}

impl CheckpointFile {
    /// Create a checkpoint handle for the given file path.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// The backing file path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the known-identity set.
    ///
    /// A missing file is the first-run bootstrap case and yields the empty
    /// set, never an error. Blank lines are ignored.
    pub async fn load(&self) -> Result<HashSet<String>, CheckpointError> {
        let content = match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                log::info!(
                    "No checkpoint at {}; starting from the empty set",
                    self.path.display()
                );
                return Ok(HashSet::new());
            }
            Err(e) => return Err(CheckpointError::new(&self.path, e)),
        };

        Ok(content
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect())
    }

    /// Durably replace the stored set with exactly `ids`.
    ///
    /// Writes the sorted keys to a temporary sibling and renames it over the
    /// target, so a failed write leaves the previous checkpoint intact.
    pub async fn save(&self, ids: &HashSet<String>) -> Result<(), CheckpointError> {
        let mut sorted: Vec<&str> = ids.iter().map(String::as_str).collect();
        sorted.sort_unstable();

        let mut content = String::with_capacity(sorted.iter().map(|id| id.len() + 1).sum());
        for id in sorted {
            content.push_str(id);
            content.push('\n');
        }

        self.write_atomic(content.as_bytes())
            .await
            .map_err(|e| CheckpointError::new(&self.path, e))
    }

    /// Write bytes atomically (write to temp, then rename).
    async fn write_atomic(&self, bytes: &[u8]) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        let tmp = self.path.with_extension("tmp");
        let mut file = tokio::fs::File::create(&tmp).await?;
        file.write_all(bytes).await?;
        file.flush().await?;
        drop(file);

        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }
}
