mod common;

use common::{api_client, config, mount_token, token_body, TOKEN_PATH};
use journal_cli::auth::TokenCache;
use journal_cli::Error;
use serde_json::{json, Value};
use wiremock::matchers::{body_string_contains, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn cached_token_is_reused() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(TOKEN_PATH))
        .and(body_string_contains("grant_type=client_credentials"))
        .and(body_string_contains("client_id=client-id"))
        .and(body_string_contains("client_secret=client-secret"))
        .respond_with(ResponseTemplate::new(200).set_body_json(token_body("tok-1", 1800)))
        .expect(1)
        .mount(&server)
        .await;

    let uri = server.uri();
    tokio::task::spawn_blocking(move || {
        let cache = TokenCache::new(&config(&uri)).unwrap();
        let first = cache.get_token().unwrap();
        let second = cache.get_token().unwrap();
        assert_eq!(first.access_token, "tok-1");
        assert_eq!(first, second);
    })
    .await
    .unwrap();
}

#[tokio::test]
async fn force_refresh_always_exchanges() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(TOKEN_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(token_body("tok-1", 1800)))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(TOKEN_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(token_body("tok-2", 1800)))
        .expect(1)
        .mount(&server)
        .await;

    let uri = server.uri();
    tokio::task::spawn_blocking(move || {
        let cache = TokenCache::new(&config(&uri)).unwrap();
        let first = cache.get_token().unwrap();
        let refreshed = cache.force_refresh().unwrap();
        assert_ne!(first.access_token, refreshed.access_token);
        assert_eq!(cache.cached(), Some(refreshed));
    })
    .await
    .unwrap();
}

#[tokio::test]
async fn token_within_expiry_margin_is_refetched() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(TOKEN_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(token_body("short", 300)))
        .expect(2)
        .mount(&server)
        .await;

    let uri = server.uri();
    tokio::task::spawn_blocking(move || {
        let cache = TokenCache::new(&config(&uri)).unwrap();
        cache.get_token().unwrap();
        cache.get_token().unwrap();
    })
    .await
    .unwrap();
}

#[tokio::test]
async fn clear_forces_a_new_exchange() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(TOKEN_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(token_body("tok", 1800)))
        .expect(2)
        .mount(&server)
        .await;

    let uri = server.uri();
    tokio::task::spawn_blocking(move || {
        let cache = TokenCache::new(&config(&uri)).unwrap();
        cache.get_token().unwrap();
        cache.clear();
        assert_eq!(cache.cached(), None);
        cache.get_token().unwrap();
    })
    .await
    .unwrap();
}

#[tokio::test]
async fn failed_exchange_carries_correlation_id() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(TOKEN_PATH))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "status": "BAD_CLIENT_ID",
            "message": "missing or unknown client id",
            "correlationId": "corr-1",
            "category": "BAD_REQUEST"
        })))
        .mount(&server)
        .await;

    let uri = server.uri();
    tokio::task::spawn_blocking(move || {
        let cache = TokenCache::new(&config(&uri)).unwrap();
        match cache.get_token() {
            Err(Error::Auth { message, correlation_id, category }) => {
                assert_eq!(message, "missing or unknown client id");
                assert_eq!(correlation_id.as_deref(), Some("corr-1"));
                assert_eq!(category.as_deref(), Some("BAD_REQUEST"));
            }
            other => panic!("expected auth error, got {other:?}"),
        }
    })
    .await
    .unwrap();
}

#[tokio::test]
async fn bearer_token_is_attached() {
    let server = MockServer::start().await;
    mount_token(&server, "tok-1").await;
    Mock::given(method("GET"))
        .and(path("/things"))
        .and(header("authorization", "Bearer tok-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
        .expect(1)
        .mount(&server)
        .await;

    let uri = server.uri();
    tokio::task::spawn_blocking(move || {
        let api = api_client(&uri);
        let body: Value = api.get("/things").unwrap();
        assert_eq!(body, json!({"ok": true}));
    })
    .await
    .unwrap();
}

#[tokio::test]
async fn unauthorized_refreshes_and_retries_once() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(TOKEN_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(token_body("stale", 1800)))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(TOKEN_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(token_body("fresh", 1800)))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/things"))
        .and(header("authorization", "Bearer stale"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/things"))
        .and(header("authorization", "Bearer fresh"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([1, 2])))
        .expect(1)
        .mount(&server)
        .await;

    let uri = server.uri();
    tokio::task::spawn_blocking(move || {
        let api = api_client(&uri);
        let body: Value = api.get("/things").unwrap();
        assert_eq!(body, json!([1, 2]));
    })
    .await
    .unwrap();
}

#[tokio::test]
async fn second_unauthorized_is_surfaced() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(TOKEN_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(token_body("tok", 1800)))
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/things"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "message": "token revoked",
            "correlationId": "corr-401",
            "category": "INVALID_AUTHENTICATION"
        })))
        .expect(2)
        .mount(&server)
        .await;

    let uri = server.uri();
    tokio::task::spawn_blocking(move || {
        let api = api_client(&uri);
        match api.get::<Value>("/things") {
            Err(Error::Api { status, message, correlation_id, category }) => {
                assert_eq!(status, 401);
                assert_eq!(message, "token revoked");
                assert_eq!(correlation_id.as_deref(), Some("corr-401"));
                assert_eq!(category.as_deref(), Some("INVALID_AUTHENTICATION"));
            }
            other => panic!("expected API error, got {other:?}"),
        }
    })
    .await
    .unwrap();
}

#[tokio::test]
async fn no_content_is_distinguished() {
    let server = MockServer::start().await;
    mount_token(&server, "tok").await;
    Mock::given(method("GET"))
        .and(path("/empty"))
        .respond_with(ResponseTemplate::new(204))
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/empty"))
        .respond_with(ResponseTemplate::new(204))
        .mount(&server)
        .await;

    let uri = server.uri();
    tokio::task::spawn_blocking(move || {
        let api = api_client(&uri);
        let err = api.get::<Value>("/empty").unwrap_err();
        assert!(err.is_no_content());
        assert_eq!(err.status(), Some(204));
        // DELETE answers 204 on success
        api.delete("/empty").unwrap();
    })
    .await
    .unwrap();
}

#[tokio::test]
async fn put_sends_json_body() {
    let server = MockServer::start().await;
    mount_token(&server, "tok").await;
    Mock::given(method("PUT"))
        .and(path("/things/1"))
        .and(wiremock::matchers::body_json(json!({"name": "renamed"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": 1, "name": "renamed"})))
        .expect(1)
        .mount(&server)
        .await;

    let uri = server.uri();
    tokio::task::spawn_blocking(move || {
        let api = api_client(&uri);
        let body: Value = api.put("/things/1", &json!({"name": "renamed"})).unwrap();
        assert_eq!(body["name"], "renamed");
    })
    .await
    .unwrap();
}
