// src/notify/feed.rs

//! Feed notification channel.
//!
//! Posts a single bounded message naming the establishments with new
//! violations. The message never splits a name and never exceeds the
//! character cap; when the next name would overflow, a truncation marker
//! ends the message instead.

use std::collections::BTreeSet;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};

use crate::config::FeedConfig;
use crate::models::Violation;
use crate::notify::oauth::{self, OauthKeys};
use crate::notify::{NotificationChannel, NotifyError};

/// Hard cap on the whole post, truncation marker included.
pub const FEED_CHAR_LIMIT: usize = 250;

const TRUNCATION_MARKER: &str = "...";
const PREFIX: &str = "Nouvelle(s) contravention(s) détectée(s) pour : ";
const SEPARATOR: &str = ", ";

/// Distinct establishment names from the new records, trimmed and sorted
/// lexicographically.
pub fn distinct_names(new_records: &[Violation]) -> Vec<String> {
    new_records
        .iter()
        .map(|v| v.etablissement.trim())
        .filter(|name| !name.is_empty())
        .map(str::to_string)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// Compose the bounded post message, or `None` when there is nothing to
/// announce (the channel is then a no-op, not an error).
pub fn compose_message(new_records: &[Violation]) -> Option<String> {
    let names = distinct_names(new_records);
    if names.is_empty() {
        return None;
    }

    let sep_chars = SEPARATOR.chars().count();
    let marker_chars = TRUNCATION_MARKER.chars().count();

    // Greedily take whole names while the message stays under the cap.
    let mut parts: Vec<&str> = Vec::new();
    let mut len = PREFIX.chars().count();
    let mut truncated = false;
    for name in &names {
        let sep = if parts.is_empty() { 0 } else { sep_chars };
        let name_chars = name.chars().count();
        if len + sep + name_chars <= FEED_CHAR_LIMIT {
            parts.push(name);
            len += sep + name_chars;
        } else {
            truncated = true;
            break;
        }
    }

    // The marker itself must fit under the cap; give back names until it does.
    if truncated {
        loop {
            let sep = if parts.is_empty() { 0 } else { sep_chars };
            if len + sep + marker_chars <= FEED_CHAR_LIMIT {
                break;
            }
            match parts.pop() {
                Some(dropped) => {
                    let dropped_sep = if parts.is_empty() { 0 } else { sep_chars };
                    len -= dropped.chars().count() + dropped_sep;
                }
                None => break,
            }
        }
    }

    let mut message = String::from(PREFIX);
    message.push_str(&parts.join(SEPARATOR));
    if truncated {
        if !parts.is_empty() {
            message.push_str(SEPARATOR);
        }
        message.push_str(TRUNCATION_MARKER);
    }
    Some(message)
}

/// Micro-post feed channel with OAuth 1.0a request signing.
pub struct FeedChannel {
    config: FeedConfig,
    client: Client,
}

impl FeedChannel {
    pub fn new(config: FeedConfig) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .expect("Failed to build HTTP client");

        Self { config, client }
    }

    fn keys(&self) -> Result<OauthKeys<'_>, NotifyError> {
        match (
            &self.config.api_key,
            &self.config.api_secret,
            &self.config.access_token,
            &self.config.access_token_secret,
        ) {
            (Some(consumer_key), Some(consumer_secret), Some(token), Some(token_secret)) => {
                Ok(OauthKeys {
                    consumer_key,
                    consumer_secret,
                    token,
                    token_secret,
                })
            }
            _ => Err(NotifyError::ConfigIncomplete(
                "feed credentials are not fully set",
            )),
        }
    }
}

#[async_trait]
impl NotificationChannel for FeedChannel {
    fn name(&self) -> &'static str {
        "feed"
    }

    async fn notify(&self, new_records: &[Violation]) -> Result<(), NotifyError> {
        let keys = self.keys()?;

        let Some(message) = compose_message(new_records) else {
            log::info!("No establishment names among new records; nothing to post");
            return Ok(());
        };

        let authorization = oauth::authorization_header("POST", &self.config.endpoint, &keys);
        let body = serde_json::json!({ "text": message }).to_string();

        log::debug!("Posting {} characters to {}", message.chars().count(), self.config.endpoint);
        let response = self
            .client
            .post(&self.config.endpoint)
            .header(reqwest::header::AUTHORIZATION, authorization)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .await
            .map_err(|e| NotifyError::Transport(e.to_string()))?;

        let status = response.status();
        match status {
            _ if status.is_success() => Ok(()),
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(NotifyError::Auth(format!(
                "feed endpoint returned {status}"
            ))),
            _ => Err(NotifyError::Transport(format!(
                "feed endpoint returned {status}"
            ))),
        }
    }
}
