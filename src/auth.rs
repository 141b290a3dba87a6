// Credential cache for the client-credentials grant.
//
// One `TokenCache` is created at startup and shared (behind an `Arc`) by
// the API client and the streaming thread. The token slot sits behind a
// mutex that is held for the whole exchange, so a refresh racing with a
// read can never hand out a stale or half-written token.

use crate::config::{Config, REQUEST_TIMEOUT};
use crate::error::{Error, Result};
use chrono::Utc;
use reqwest::blocking::Client;
use serde::Deserialize;
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, info};

/// Tokens are refreshed this long before the server-side expiry.
pub const EXPIRY_MARGIN_MS: i64 = 5 * 60 * 1000;

/// Bearer token as issued by the token endpoint, stamped with the time it
/// was obtained. Never modified after creation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Token {
    pub access_token: String,
    pub token_type: String,
    pub expires_in_seconds: i64,
    pub obtained_at_ms: i64,
}

impl Token {
    /// Epoch millis from which the token is treated as expired.
    pub fn refresh_at_ms(&self) -> i64 {
        self.obtained_at_ms + self.expires_in_seconds * 1000 - EXPIRY_MARGIN_MS
    }

    pub fn is_expired_at(&self, now_ms: i64) -> bool {
        now_ms >= self.refresh_at_ms()
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(now_ms())
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default = "default_token_type")]
    token_type: String,
    expires_in: i64,
    #[allow(dead_code)]
    scope: Option<String>,
}

fn default_token_type() -> String {
    "bearer".to_string()
}

pub struct TokenCache {
    client: Client,
    token_url: String,
    client_id: String,
    client_secret: String,
    scope: String,
    current: Mutex<Option<Token>>,
}

impl TokenCache {
    pub fn new(config: &Config) -> Result<Self> {
        let client = Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(TokenCache {
            client,
            token_url: config.token_url.clone(),
            client_id: config.client_id.clone(),
            client_secret: config.client_secret.clone(),
            scope: config.scope_param(),
            current: Mutex::new(None),
        })
    }

    /// Cached token if still valid, otherwise a freshly exchanged one.
    pub fn get_token(&self) -> Result<Token> {
        let mut slot = self.lock();
        if let Some(token) = slot.as_ref() {
            if !token.is_expired() {
                return Ok(token.clone());
            }
            debug!("cached token expired, refreshing");
        }
        let token = self.exchange()?;
        *slot = Some(token.clone());
        Ok(token)
    }

    /// Exchange credentials unconditionally and replace the cached token.
    pub fn force_refresh(&self) -> Result<Token> {
        let mut slot = self.lock();
        let token = self.exchange()?;
        *slot = Some(token.clone());
        Ok(token)
    }

    pub fn clear(&self) {
        *self.lock() = None;
        debug!("token cache cleared");
    }

    /// Current token without triggering an exchange.
    pub fn cached(&self) -> Option<Token> {
        self.lock().clone()
    }

    fn lock(&self) -> MutexGuard<'_, Option<Token>> {
        // A panic while holding the lock leaves at worst an old token in
        // the slot, which the expiry check still guards.
        self.current.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn exchange(&self) -> Result<Token> {
        let form = [
            ("grant_type", "client_credentials"),
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.as_str()),
            ("scope", self.scope.as_str()),
        ];
        let res = self
            .client
            .post(&self.token_url)
            .form(&form)
            .send()
            .map_err(|e| Error::Auth {
                message: format!("token request failed: {}", e),
                correlation_id: None,
                category: None,
            })?;

        let status = res.status();
        let body = res.text().unwrap_or_default();
        if !status.is_success() {
            return Err(Error::auth_from_response(status.as_u16(), &body));
        }

        let parsed: TokenResponse = serde_json::from_str(&body).map_err(|e| Error::Auth {
            message: format!("token response could not be parsed: {}", e),
            correlation_id: None,
            category: None,
        })?;

        info!(expires_in = parsed.expires_in, "obtained access token");
        Ok(Token {
            access_token: parsed.access_token,
            token_type: parsed.token_type,
            expires_in_seconds: parsed.expires_in,
            obtained_at_ms: now_ms(),
        })
    }
}

pub(crate) fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}
