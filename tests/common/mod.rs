#![allow(dead_code)]

use journal_cli::api::ApiClient;
use journal_cli::auth::TokenCache;
use journal_cli::config::Config;
use serde_json::json;
use std::sync::Arc;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, Request, ResponseTemplate};

pub const TOKEN_PATH: &str = "/oauth/v1/token";

pub fn config(server_uri: &str) -> Config {
    Config {
        client_id: "client-id".into(),
        client_secret: "client-secret".into(),
        api_base_url: server_uri.to_string(),
        token_url: format!("{}{}", server_uri, TOKEN_PATH),
        scopes: vec!["developer.webhooks_journal.read".into()],
        default_portal_id: None,
        debug: false,
    }
}

/// Must be called from a blocking context.
pub fn api_client(server_uri: &str) -> ApiClient {
    let config = config(server_uri);
    let tokens = Arc::new(TokenCache::new(&config).unwrap());
    ApiClient::new(&config, tokens).unwrap()
}

pub fn token_body(access_token: &str, expires_in: i64) -> serde_json::Value {
    json!({
        "access_token": access_token,
        "token_type": "bearer",
        "expires_in": expires_in
    })
}

pub async fn mount_token(server: &MockServer, access_token: &str) {
    Mock::given(method("POST"))
        .and(path(TOKEN_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(token_body(access_token, 1800)))
        .mount(server)
        .await;
}

/// Matches requests that carry no Authorization header.
pub struct NoAuthorization;

impl wiremock::Match for NoAuthorization {
    fn matches(&self, request: &Request) -> bool {
        !request.headers.contains_key("authorization")
    }
}
