//! Pipeline stages for the incremental sync.
//!
//! - `fetch`: download the raw dataset
//! - `parse`: raw CSV → typed records + identity keys
//! - `diff`: new-record detection against the checkpoint
//! - `sync`: orchestration of one run

pub mod diff;
pub mod fetch;
pub mod parse;
pub mod sync;

pub use diff::{detect_new, filter_new};
pub use fetch::{HttpFetcher, SourceFetcher};
pub use parse::{ParseOutcome, REQUIRED_COLUMNS, parse_violations};
pub use sync::{ChannelOutcome, RunReport, SyncPipeline};
