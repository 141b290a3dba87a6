// Journal reads: each call returns a `JournalEntry` whose signed url is
// then downloaded without the bearer token to get the actual events.

use crate::api::ApiClient;
use crate::config::REQUEST_TIMEOUT;
use crate::error::{Error, Result};
use crate::models::{JournalEntry, JournalPayload};
use crate::stream::JournalSource;
use reqwest::blocking::Client;
use reqwest::StatusCode;
use serde_json::Value;
use tracing::debug;

const JOURNAL_PATH: &str = "/webhooks/v4/journal";

#[derive(Clone)]
pub struct JournalClient {
    api: ApiClient,
    // Separate client: signed urls must not receive the Authorization header.
    downloader: Client,
}

impl JournalClient {
    pub fn new(api: ApiClient) -> Result<Self> {
        let downloader = Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self { api, downloader })
    }

    pub fn earliest(&self) -> Result<JournalEntry> {
        self.entry(&format!("{}/earliest", JOURNAL_PATH))
    }

    pub fn latest(&self) -> Result<JournalEntry> {
        self.entry(&format!("{}/latest", JOURNAL_PATH))
    }

    /// Entry following `offset`. `Error::NoContent` means `offset` is
    /// already the newest position.
    pub fn next(&self, offset: &str) -> Result<JournalEntry> {
        self.entry(&format!("{}/offset/{}/next", JOURNAL_PATH, offset_segment(offset)))
    }

    /// Download the payload behind an entry's signed url.
    pub fn download(&self, entry: &JournalEntry) -> Result<JournalPayload> {
        let url = entry.url.as_deref().ok_or(Error::NoContent)?;
        debug!(offset = %entry.current_offset, "downloading journal payload");

        let res = self.downloader.get(url).send()?;
        let status = res.status();
        if status == StatusCode::FORBIDDEN || status == StatusCode::NOT_FOUND {
            return Err(Error::LinkExpired);
        }
        if !status.is_success() {
            let text = res.text().unwrap_or_default();
            return Err(Error::from_response(status.as_u16(), &text));
        }
        let text = res.text()?;
        Ok(serde_json::from_str(&text)?)
    }

    pub fn fetch_earliest(&self) -> Result<(JournalEntry, JournalPayload)> {
        self.with_payload(self.earliest()?)
    }

    pub fn fetch_latest(&self) -> Result<(JournalEntry, JournalPayload)> {
        self.with_payload(self.latest()?)
    }

    pub fn fetch_next(&self, offset: &str) -> Result<(JournalEntry, JournalPayload)> {
        self.with_payload(self.next(offset)?)
    }

    fn with_payload(&self, entry: JournalEntry) -> Result<(JournalEntry, JournalPayload)> {
        let payload = self.download(&entry)?;
        Ok((entry, payload))
    }

    fn entry(&self, path: &str) -> Result<JournalEntry> {
        parse_entry(&self.api.get_text(path)?)
    }
}

/// A 200 whose body is empty, `null`, or lacks a non-empty `url` is the
/// same "nothing further" answer as a 204.
fn parse_entry(body: &str) -> Result<JournalEntry> {
    if body.trim().is_empty() {
        return Err(Error::NoContent);
    }
    let value: Value = serde_json::from_str(body)?;
    let has_url = value
        .get("url")
        .and_then(Value::as_str)
        .map_or(false, |url| !url.trim().is_empty());
    if !has_url {
        return Err(Error::NoContent);
    }
    Ok(serde_json::from_value(value)?)
}

/// Offsets are opaque; encode them so `/`, `?` or `#` stay inside the
/// path segment.
fn offset_segment(offset: &str) -> String {
    urlencoding::encode(offset.trim()).into_owned()
}

impl JournalSource for JournalClient {
    fn latest(&self) -> Result<JournalEntry> {
        JournalClient::latest(self)
    }

    fn next_after(&self, offset: &str) -> Result<JournalEntry> {
        self.next(offset)
    }

    fn download(&self, entry: &JournalEntry) -> Result<JournalPayload> {
        JournalClient::download(self, entry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_body_means_no_content() {
        assert!(matches!(parse_entry(""), Err(Error::NoContent)));
        assert!(matches!(parse_entry("  \n"), Err(Error::NoContent)));
    }

    #[test]
    fn null_or_urlless_body_means_no_content() {
        for body in [
            "null",
            "{}",
            r#"{"currentOffset":"abc"}"#,
            r#"{"url":"","currentOffset":"abc"}"#,
            r#"{"url":null,"currentOffset":"abc"}"#,
        ] {
            assert!(matches!(parse_entry(body), Err(Error::NoContent)), "{body}");
        }
    }

    #[test]
    fn malformed_body_is_a_decode_error() {
        assert!(matches!(parse_entry("{not json"), Err(Error::Decode(_))));
    }

    #[test]
    fn entry_with_url_parses() {
        let entry = parse_entry(
            r#"{"url":"https://signed.example.com/x","expiresAt":"2026-01-01T00:00:00Z","currentOffset":"abc"}"#,
        )
        .unwrap();
        assert_eq!(entry.current_offset, "abc");
        assert_eq!(entry.url.as_deref(), Some("https://signed.example.com/x"));
    }

    #[test]
    fn offset_is_encoded_as_one_path_segment() {
        assert_eq!(offset_segment(" a/b?c#d "), "a%2Fb%3Fc%23d");
        assert_eq!(
            offset_segment("3fa85f64-5717-4562-b3fc-2c963f66afa6"),
            "3fa85f64-5717-4562-b3fc-2c963f66afa6"
        );
    }
}
