//! API tokens: issued, accepted through the `Token` header, revoked

use std::time::Duration;

use axum::http::StatusCode;
use pretty_assertions::assert_eq;
use serde_json::json;
use tests::app::{Auth, TestApp};
use tests::async_helpers::{with_timeout, DEFAULT_TIMEOUT};

async fn add_token(app: &TestApp, auth: &Auth, desc: &str) -> (i64, String) {
    let response = app
        .post("/api/addToken", json!({ "desc": desc, "expiry": 0 }), auth)
        .await;
    assert_eq!(response.envelope_status(), "success", "{:?}", response.body);
    let data = &response.body["data"];
    (
        data["id"].as_i64().unwrap(),
        data["token"].as_str().unwrap().to_string(),
    )
}

#[tokio::test]
async fn test_token_lifecycle() {
    let app = TestApp::new().await;
    let admin = app.admin().await;

    let (id, token) = add_token(&app, &admin, "ci").await;
    assert_eq!(token.len(), 64);

    // Usable right after addToken returns
    let bearer = Auth::Token(token.clone());
    let response = app.get("/api/status", &bearer).await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["data"]["tokens"], json!(1));

    let listed = app.get("/api/tokens", &admin).await;
    assert_eq!(listed.body["data"][0]["desc"], "ci");

    let response = app
        .post("/api/deleteToken", json!({ "id": id }), &admin)
        .await;
    assert_eq!(response.envelope_status(), "success");

    // Rejected right after deleteToken returns
    let response = app.get("/api/status", &bearer).await;
    assert_eq!(response.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_token_can_manage_tokens() {
    let app = TestApp::new().await;
    let admin = app.admin().await;
    let (_, token) = add_token(&app, &admin, "automation").await;
    let bearer = Auth::Token(token);

    let (second, _) = add_token(&app, &bearer, "child").await;
    assert_eq!(app.mocks.tokens.count(), 2);

    let response = app
        .post("/api/deleteToken", json!({ "id": second }), &bearer)
        .await;
    assert_eq!(response.envelope_status(), "success");
    assert_eq!(app.mocks.tokens.count(), 1);
}

#[tokio::test]
async fn test_delete_unknown_token() {
    let app = TestApp::new().await;
    let admin = app.admin().await;

    let response = app
        .post("/api/deleteToken", json!({ "id": 99 }), &admin)
        .await;
    assert_eq!(response.envelope_status(), "failed");
    assert_eq!(response.message(), "token 99 not found");
}

#[tokio::test]
async fn test_negative_expiry_is_rejected() {
    let app = TestApp::new().await;
    let admin = app.admin().await;

    let response = app
        .post("/api/addToken", json!({ "desc": "x", "expiry": -1 }), &admin)
        .await;
    assert_eq!(response.envelope_status(), "failed");
    assert_eq!(app.mocks.tokens.count(), 0);
}

#[tokio::test]
async fn test_oversized_expiry_is_rejected() {
    let app = TestApp::new().await;
    let admin = app.admin().await;

    let response = app
        .post(
            "/api/addToken",
            json!({ "desc": "forever", "expiry": 200_000_000_000_000i64 }),
            &admin,
        )
        .await;
    assert_eq!(response.envelope_status(), "failed");
    assert_eq!(response.message(), "expiry too large");
    assert_eq!(app.mocks.tokens.count(), 0);
}

#[tokio::test]
async fn test_slow_rebuild_does_not_restore_revoked_token() {
    let app = TestApp::new().await;
    let admin = app.admin().await;
    let (id, token) = add_token(&app, &admin, "revoked").await;

    // A rebuild that read the store while the token still existed
    let hold = app.mocks.tokens.hold_next_list();
    let cache = app.server.services().tokens.clone();
    let (tokens, users) = (app.mocks.tokens.clone(), app.mocks.users.clone());
    let slow = tokio::spawn(async move { cache.rebuild(tokens.as_ref(), users.as_ref()).await });
    with_timeout(DEFAULT_TIMEOUT, hold.reached.notified()).await;

    let release = hold.release.clone();
    let (response, _) = with_timeout(
        DEFAULT_TIMEOUT,
        futures::future::join(
            app.post("/api/deleteToken", json!({ "id": id }), &admin),
            async move {
                tokio::time::sleep(Duration::from_millis(50)).await;
                release.notify_one();
            },
        ),
    )
    .await;
    assert_eq!(response.envelope_status(), "success");

    slow.await.unwrap().unwrap();
    assert!(app.server.services().tokens.resolve(&token).is_none());

    let response = app.get("/api/status", &Auth::Token(token)).await;
    assert_eq!(response.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_rebuild_failure_is_reported() {
    let app = TestApp::new().await;
    let admin = app.admin().await;
    let (_, first) = add_token(&app, &admin, "first").await;

    app.mocks.tokens.fail_list(true);
    let response = app
        .post("/api/addToken", json!({ "desc": "second" }), &admin)
        .await;
    assert_eq!(response.envelope_status(), "failed");
    assert!(response
        .message()
        .starts_with("token cache rebuild failed:"));

    // The token was stored; the previous snapshot keeps serving
    assert_eq!(app.mocks.tokens.count(), 2);
    let response = app.get("/api/status", &Auth::Token(first)).await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["data"]["tokens"], json!(1));
}
