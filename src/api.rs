// HTTP gateway: every authenticated call to the API goes through
// `ApiClient`, which attaches the bearer token from the shared
// `TokenCache`, retries once after a 401 with a refreshed token and maps
// non-success responses to `Error`.

use crate::auth::TokenCache;
use crate::config::{Config, REQUEST_TIMEOUT};
use crate::error::{Error, Result};
use reqwest::blocking::{Client, Response};
use reqwest::header::{ACCEPT, AUTHORIZATION};
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, warn};

/// Blocking client for the API. Cheap to clone: the reqwest client and
/// the token cache are both reference counted.
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
    tokens: Arc<TokenCache>,
}

impl ApiClient {
    pub fn new(config: &Config, tokens: Arc<TokenCache>) -> Result<Self> {
        let client = Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(ApiClient {
            client,
            base_url: config.api_base_url.clone(),
            tokens,
        })
    }

    pub fn tokens(&self) -> &Arc<TokenCache> {
        &self.tokens
    }

    pub fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let res = self.send(Method::GET, path, None)?;
        decode(res)
    }

    /// GET returning the raw body, for endpoints whose success responses
    /// are not always a JSON document.
    pub fn get_text(&self, path: &str) -> Result<String> {
        let res = self.send(Method::GET, path, None)?;
        Ok(res.text()?)
    }

    pub fn post<B: Serialize, T: DeserializeOwned>(&self, path: &str, body: &B) -> Result<T> {
        let body = serde_json::to_value(body)?;
        let res = self.send(Method::POST, path, Some(&body))?;
        decode(res)
    }

    pub fn put<B: Serialize, T: DeserializeOwned>(&self, path: &str, body: &B) -> Result<T> {
        let body = serde_json::to_value(body)?;
        let res = self.send(Method::PUT, path, Some(&body))?;
        decode(res)
    }

    /// DELETE is expected to answer 204, so `NoContent` counts as success
    /// here rather than being passed on.
    pub fn delete(&self, path: &str) -> Result<()> {
        match self.send(Method::DELETE, path, None) {
            Ok(_) | Err(Error::NoContent) => Ok(()),
            Err(e) => Err(e),
        }
    }

    /// Send one request, refreshing the token and retrying exactly once on
    /// a 401. A 204 becomes `Error::NoContent`.
    fn send(&self, method: Method, path: &str, body: Option<&Value>) -> Result<Response> {
        let url = format!("{}{}", self.base_url, path);
        debug!(%method, %url, "API request");

        let token = self.tokens.get_token()?;
        let mut res = self.request(method.clone(), &url, body, &token.access_token)?;

        if res.status() == StatusCode::UNAUTHORIZED {
            warn!(%url, "received 401, refreshing token and retrying once");
            let token = self.tokens.force_refresh()?;
            res = self.request(method, &url, body, &token.access_token)?;
        }

        let status = res.status();
        debug!(status = status.as_u16(), %url, "API response");
        if status == StatusCode::NO_CONTENT {
            return Err(Error::NoContent);
        }
        if !status.is_success() {
            let text = res.text().unwrap_or_default();
            return Err(Error::from_response(status.as_u16(), &text));
        }
        Ok(res)
    }

    fn request(
        &self,
        method: Method,
        url: &str,
        body: Option<&Value>,
        access_token: &str,
    ) -> Result<Response> {
        let mut req = self
            .client
            .request(method, url)
            .header(AUTHORIZATION, format!("Bearer {}", access_token))
            .header(ACCEPT, "application/json");
        if let Some(body) = body {
            req = req.json(body);
        }
        Ok(req.send()?)
    }
}

fn decode<T: DeserializeOwned>(res: Response) -> Result<T> {
    let text = res.text()?;
    Ok(serde_json::from_str(&text)?)
}
