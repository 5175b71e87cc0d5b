// src/utils/http.rs

//! HTTP client utilities.

use std::time::Duration;

use crate::config::SourceConfig;
use crate::error::{FetchError, Result};

/// Create a configured asynchronous HTTP client.
///
/// The timeout is mandatory: a hung download must fail the run rather than
/// block the scheduler's next invocation.
pub fn create_async_client(config: &SourceConfig) -> Result<reqwest::Client> {
    let client = reqwest::Client::builder()
        .user_agent(&config.user_agent)
        .timeout(Duration::from_secs(config.timeout_secs))
        .build()
        .map_err(FetchError::Transport)?;
    Ok(client)
}
