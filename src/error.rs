// Error type shared by every layer of the client.
// The shell matches on these variants to decide how to render a failure;
// anything that is not a configuration problem is shown and the menu
// continues.

use serde::Deserialize;
use thiserror::Error;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum Error {
    /// Required settings are missing or malformed. Fatal at startup.
    #[error("configuration error: {0}")]
    Config(String),

    /// The client-credentials exchange failed.
    #[error("authentication failed: {message}{}", describe_ids(.correlation_id, .category))]
    Auth {
        message: String,
        correlation_id: Option<String>,
        category: Option<String>,
    },

    /// Any non-success response the gateway does not handle itself.
    #[error("API error {status}: {message}{}", describe_ids(.correlation_id, .category))]
    Api {
        status: u16,
        message: String,
        correlation_id: Option<String>,
        category: Option<String>,
    },

    /// 204 (or a journal entry without a url): nothing new to read.
    #[error("no content")]
    NoContent,

    /// The signed payload link answered 403/404.
    #[error("the signed journal link has expired or is no longer accessible")]
    LinkExpired,

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("unexpected response body: {0}")]
    Decode(#[from] serde_json::Error),
}

impl Error {
    /// Status code carried by the error, if it came from an HTTP response.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Api { status, .. } => Some(*status),
            Self::NoContent => Some(204),
            Self::Http(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    pub fn is_server_error(&self) -> bool {
        matches!(self.status(), Some(500..=599))
    }

    pub fn is_no_content(&self) -> bool {
        matches!(self, Self::NoContent)
    }

    /// Build an `Api` error from a failed response body, falling back to
    /// the raw text when the body is not the vendor's error envelope.
    pub(crate) fn from_response(status: u16, body: &str) -> Self {
        let parsed = ErrorBody::parse(body);
        Self::Api {
            status,
            message: parsed.message.unwrap_or_else(|| fallback_message(status, body)),
            correlation_id: parsed.correlation_id,
            category: parsed.category,
        }
    }

    pub(crate) fn auth_from_response(status: u16, body: &str) -> Self {
        let parsed = ErrorBody::parse(body);
        let message = parsed
            .message
            .or(parsed.error_description)
            .or(parsed.error)
            .unwrap_or_else(|| fallback_message(status, body));
        Self::Auth {
            message,
            correlation_id: parsed.correlation_id,
            category: parsed.category,
        }
    }
}

/// Error envelope returned by the API and the token endpoint.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ErrorBody {
    message: Option<String>,
    correlation_id: Option<String>,
    category: Option<String>,
    // OAuth-style fields from the token endpoint
    error: Option<String>,
    #[serde(rename = "error_description")]
    error_description: Option<String>,
}

impl ErrorBody {
    fn parse(body: &str) -> Self {
        serde_json::from_str(body).unwrap_or_default()
    }
}

fn fallback_message(status: u16, body: &str) -> String {
    let body = body.trim();
    if body.is_empty() {
        format!("request failed with status {}", status)
    } else {
        body.to_string()
    }
}

fn describe_ids(correlation_id: &Option<String>, category: &Option<String>) -> String {
    match (correlation_id, category) {
        (Some(id), Some(cat)) => format!(" (category: {}, correlation id: {})", cat, id),
        (Some(id), None) => format!(" (correlation id: {})", id),
        (None, Some(cat)) => format!(" (category: {})", cat),
        (None, None) => String::new(),
    }
}
