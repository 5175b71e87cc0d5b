//! Notification channels for newly-detected records.
//!
//! Each channel formats and dispatches a human-readable summary of the
//! New-Record Set. Channels are independently optional and their failures
//! are never fatal: the orchestrator records the per-channel outcome and
//! proceeds to persistence regardless.

pub mod feed;
pub mod mail;
pub mod oauth;

use async_trait::async_trait;
use thiserror::Error;

use crate::models::Violation;

// Re-export for convenience
pub use feed::FeedChannel;
pub use mail::MailChannel;

/// Per-channel failure kinds.
#[derive(Error, Debug)]
pub enum NotifyError {
    /// The remote end rejected our credentials
    #[error("authentication rejected: {0}")]
    Auth(String),

    /// The message could not be delivered
    #[error("transport failure: {0}")]
    Transport(String),

    /// The channel is only partially configured; skipped, not failed
    #[error("configuration incomplete: {0}")]
    ConfigIncomplete(&'static str),
}

/// An independent notification delivery mechanism.
#[async_trait]
pub trait NotificationChannel: Send + Sync {
    /// Channel name for logging and run reports.
    fn name(&self) -> &'static str;

    /// Format and dispatch a summary of the new records.
    async fn notify(&self, new_records: &[Violation]) -> Result<(), NotifyError>;
}
