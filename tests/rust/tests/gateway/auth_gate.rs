//! Auth gate: who gets past, and what the rejection looks like

use axum::http::{Method, StatusCode};
use pretty_assertions::assert_eq;
use serde_json::json;
use tests::app::{Auth, TestApp, ADMIN_PASSWORD, ADMIN_USER};

#[tokio::test]
async fn test_unauthenticated_requests_are_rejected() {
    let app = TestApp::new().await;

    for path in ["/api/load", "/api/status", "/api/tokens"] {
        let response = app.get(path, &Auth::None).await;
        assert_eq!(response.status, StatusCode::UNAUTHORIZED, "{}", path);
        assert_eq!(
            response.body,
            json!({ "status": "failed", "message": "Invalid login" })
        );
    }

    let response = app
        .post("/api/save", json!({ "object": "inbounds" }), &Auth::None)
        .await;
    assert_eq!(response.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_rejected_mutations_have_no_effect() {
    let app = TestApp::new().await;

    let response = app
        .post("/api/addToken", json!({ "desc": "sneaky" }), &Auth::None)
        .await;
    assert_eq!(response.status, StatusCode::UNAUTHORIZED);
    assert_eq!(app.mocks.tokens.count(), 0);

    let response = app
        .post(
            "/api/addToken",
            json!({ "desc": "sneaky" }),
            &Auth::Token("not-a-token".to_string()),
        )
        .await;
    assert_eq!(response.status, StatusCode::UNAUTHORIZED);
    assert_eq!(app.mocks.tokens.count(), 0);
}

#[tokio::test]
async fn test_options_without_cors_reaches_no_handler() {
    let app = TestApp::new().await;

    let response = app
        .request(Method::OPTIONS, "/api/status", None, &Auth::None)
        .await;
    assert!(
        matches!(
            response.status,
            StatusCode::UNAUTHORIZED | StatusCode::METHOD_NOT_ALLOWED
        ),
        "{}",
        response.status
    );
    assert_ne!(response.envelope_status(), "success");

    let response = app
        .request(Method::OPTIONS, "/api/addToken", None, &Auth::None)
        .await;
    assert_ne!(response.status, StatusCode::OK);
    assert_eq!(app.mocks.tokens.count(), 0);
}

#[tokio::test]
async fn test_unknown_action_behind_gate_needs_credentials() {
    let app = TestApp::new().await;

    let response = app.get("/api/frobnicate", &Auth::None).await;
    assert_eq!(response.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_login_and_logout_paths_are_exempt() {
    let app = TestApp::new().await;

    let response = app
        .post(
            "/api/login",
            json!({ "username": ADMIN_USER, "password": "wrong" }),
            &Auth::None,
        )
        .await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.envelope_status(), "failed");
    assert_eq!(response.message(), "wrong username or password");
    assert!(response.set_cookie.is_none());

    let response = app.get("/api/logout", &Auth::None).await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.envelope_status(), "success");
}

#[tokio::test]
async fn test_exemption_matches_path_suffix() {
    let app = TestApp::new().await;

    // Passes the gate and then fails dispatch
    let response = app.post("/api/xlogin", json!({}), &Auth::None).await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.message(), "unknown action: xlogin");

    let response = app.get("/api/adminlogout", &Auth::None).await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.message(), "unknown action: adminlogout");
}

#[tokio::test]
async fn test_session_cookie_grants_access() {
    let app = TestApp::new().await;
    let admin = app.admin().await;

    let response = app.get("/api/status", &admin).await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.envelope_status(), "success");
    assert_eq!(response.body["data"]["sessions"], json!(1));
}

#[tokio::test]
async fn test_login_sets_http_only_cookie() {
    let app = TestApp::new().await;

    let response = app
        .post(
            "/api/login",
            json!({ "username": ADMIN_USER, "password": ADMIN_PASSWORD }),
            &Auth::None,
        )
        .await;
    assert_eq!(response.envelope_status(), "success");

    let cookie = response.set_cookie.expect("login sets a cookie");
    assert!(cookie.starts_with("sbpanel_session="));
    assert!(cookie.contains("HttpOnly"));
    assert!(cookie.contains("Path=/"));
}

#[tokio::test]
async fn test_logout_ends_session() {
    let app = TestApp::new().await;
    let admin = app.admin().await;

    let response = app.get("/api/logout", &admin).await;
    assert_eq!(response.envelope_status(), "success");
    let cleared = response.set_cookie.expect("logout clears the cookie");
    assert!(cleared.contains("Max-Age=0"));

    let response = app.get("/api/status", &admin).await;
    assert_eq!(response.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_forged_credentials_are_rejected() {
    let app = TestApp::new().await;

    let forged = Auth::Cookie("sbpanel_session=deadbeef".to_string());
    assert_eq!(
        app.get("/api/load", &forged).await.status,
        StatusCode::UNAUTHORIZED
    );

    let forged = Auth::Token("deadbeef".to_string());
    assert_eq!(
        app.get("/api/load", &forged).await.status,
        StatusCode::UNAUTHORIZED
    );
}

#[tokio::test]
async fn test_change_pass_closes_sessions() {
    let app = TestApp::new().await;
    let admin = app.admin().await;

    let users = app.get("/api/users", &admin).await;
    let id = users.body["data"][0]["id"].as_i64().unwrap();

    let response = app
        .post(
            "/api/changePass",
            json!({
                "id": id,
                "oldPass": ADMIN_PASSWORD,
                "newUsername": "root",
                "newPass": "s3cret",
            }),
            &admin,
        )
        .await;
    assert_eq!(response.envelope_status(), "success");

    assert_eq!(
        app.get("/api/status", &admin).await.status,
        StatusCode::UNAUTHORIZED
    );
    assert!(app.login(ADMIN_USER, ADMIN_PASSWORD).await.is_none());
    assert!(app.login("root", "s3cret").await.is_some());
}

#[tokio::test]
async fn test_login_is_rate_limited() {
    let app = TestApp::new().await;

    for _ in 0..10 {
        let response = app
            .post(
                "/api/login",
                json!({ "username": "nobody", "password": "x" }),
                &Auth::None,
            )
            .await;
        assert_eq!(response.status, StatusCode::OK);
    }

    let response = app
        .post(
            "/api/login",
            json!({ "username": "nobody", "password": "x" }),
            &Auth::None,
        )
        .await;
    assert_eq!(response.status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(response.envelope_status(), "failed");
}
