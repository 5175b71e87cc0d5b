// src/notify/oauth.rs

//! OAuth 1.0a request signing for the feed channel.
//!
//! Builds the `Authorization` header for a single request: canonical
//! percent-encoded parameter string, HMAC-SHA1 over the signature base
//! string, base64-encoded signature. JSON bodies do not participate in the
//! signature; only the oauth_* protocol parameters do.

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use hmac::{Hmac, Mac};
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use rand::Rng;
use rand::distributions::Alphanumeric;
use sha1::Sha1;

type HmacSha1 = Hmac<Sha1>;

/// RFC 5849 escaping: everything except ALPHA / DIGIT / `-` / `.` / `_` / `~`.
const OAUTH_ENCODE_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

/// The four credential strings of an OAuth 1.0a user context.
#[derive(Debug, Clone, Copy)]
pub struct OauthKeys<'a> {
    pub consumer_key: &'a str,
    pub consumer_secret: &'a str,
    pub token: &'a str,
    pub token_secret: &'a str,
}

fn encode(value: &str) -> String {
    utf8_percent_encode(value, OAUTH_ENCODE_SET).to_string()
}

/// Build the `Authorization` header value for a request with a fresh
/// timestamp and nonce. The endpoint URL must not carry a query string.
pub fn authorization_header(method: &str, url: &str, keys: &OauthKeys<'_>) -> String {
    let timestamp = chrono::Utc::now().timestamp().to_string();
    let nonce: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(32)
        .map(char::from)
        .collect();

    sign_request(method, url, keys, &timestamp, &nonce)
}

/// Deterministic signing core, separated from nonce generation.
fn sign_request(
    method: &str,
    url: &str,
    keys: &OauthKeys<'_>,
    timestamp: &str,
    nonce: &str,
) -> String {
    let params: [(&str, &str); 6] = [
        ("oauth_consumer_key", keys.consumer_key),
        ("oauth_nonce", nonce),
        ("oauth_signature_method", "HMAC-SHA1"),
        ("oauth_timestamp", timestamp),
        ("oauth_token", keys.token),
        ("oauth_version", "1.0"),
    ];

    // Canonical parameter string: pairs encoded first, then sorted.
    let mut encoded: Vec<(String, String)> = params
        .iter()
        .map(|(k, v)| (encode(k), encode(v)))
        .collect();
    encoded.sort();
    let param_string = encoded
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join("&");

    let base_string = format!(
        "{}&{}&{}",
        method.to_uppercase(),
        encode(url),
        encode(&param_string)
    );
    let signing_key = format!(
        "{}&{}",
        encode(keys.consumer_secret),
        encode(keys.token_secret)
    );

    let mut mac =
        HmacSha1::new_from_slice(signing_key.as_bytes()).expect("HMAC accepts any key length");
    mac.update(base_string.as_bytes());
    let signature = BASE64.encode(mac.finalize().into_bytes());

    let mut header = String::from("OAuth ");
    for (i, (k, v)) in params.iter().enumerate() {
        if i > 0 {
            header.push_str(", ");
        }
        header.push_str(&format!("{}=\"{}\"", encode(k), encode(v)));
    }
    header.push_str(&format!(", oauth_signature=\"{}\"", encode(&signature)));
    header
}
