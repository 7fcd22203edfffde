use axum::http::{HeaderMap, StatusCode};
use serde_json::{Value, json};
use wiremock::MockServer;

use super::helpers::{
    STAFF_PASSWORD, STAFF_USERNAME, create_test_app, setup_test_db, staff_cookie, test_request, test_state,
};
use crate::services::cookie_service::ACCESS_TOKEN_COOKIE;

#[tokio::test]
async fn test_login_success_sets_session_cookie() {
    let server = MockServer::start().await;
    let state = test_state(setup_test_db().await, &server);
    state
        .auth_service
        .upsert_user(STAFF_USERNAME, STAFF_PASSWORD)
        .await
        .unwrap();
    let app = create_test_app(state);

    let (status, body, headers) = test_request(
        app,
        "POST",
        "/login",
        Some(json!({ "username": STAFF_USERNAME, "password": STAFF_PASSWORD })),
        None,
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    let response: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(response["message"], "Login successful");

    let cookie = headers.get("set-cookie").unwrap().to_str().unwrap();
    assert!(cookie.starts_with(&format!("{ACCESS_TOKEN_COOKIE}=")));
    assert!(cookie.contains("HttpOnly"));
}

#[tokio::test]
async fn test_login_invalid_password() {
    let server = MockServer::start().await;
    let state = test_state(setup_test_db().await, &server);
    state
        .auth_service
        .upsert_user(STAFF_USERNAME, STAFF_PASSWORD)
        .await
        .unwrap();
    let app = create_test_app(state);

    let (status, _, headers) = test_request(
        app,
        "POST",
        "/login",
        Some(json!({ "username": STAFF_USERNAME, "password": "wrongpassword" })),
        None,
    )
    .await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(headers.get("set-cookie").is_none());
}

#[tokio::test]
async fn test_logout_clears_cookie() {
    let server = MockServer::start().await;
    let state = test_state(setup_test_db().await, &server);
    let cookie = staff_cookie(&state).await;
    let app = create_test_app(state);

    let (status, _, headers) = test_request(app, "POST", "/logout", None, Some(cookie)).await;

    assert_eq!(status, StatusCode::OK);
    let cookie = headers.get("set-cookie").unwrap().to_str().unwrap();
    assert!(cookie.starts_with(&format!("{ACCESS_TOKEN_COOKIE}=;")));
    assert!(cookie.contains("Max-Age=0"));
}

#[tokio::test]
async fn test_get_current_user() {
    let server = MockServer::start().await;
    let state = test_state(setup_test_db().await, &server);
    let cookie = staff_cookie(&state).await;
    let app = create_test_app(state);

    let (status, body, _) = test_request(app, "GET", "/me", None, Some(cookie)).await;

    assert_eq!(status, StatusCode::OK);
    let user: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(user["username"], STAFF_USERNAME);
    assert!(user["id"].is_number());
}

#[tokio::test]
async fn test_protected_routes_reject_missing_or_forged_session() {
    let server = MockServer::start().await;
    let app = create_test_app(test_state(setup_test_db().await, &server));

    let (status, _, _) = test_request(app.clone(), "GET", "/requisitions", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let mut forged = HeaderMap::new();
    forged.insert("cookie", format!("{ACCESS_TOKEN_COOKIE}=not-a-jwt").parse().unwrap());
    let (status, body, _) = test_request(app, "GET", "/requisitions", None, Some(forged)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    let response: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(response["error"], "unauthorized");
}
