use std::sync::{Arc, Once};

use axum::{
    Router,
    body::Body,
    http::{HeaderMap, Request, StatusCode},
};
use serde_json::{Value, json};
use sqlx::SqlitePool;
use sqlx::sqlite::SqlitePoolOptions;
use tower::ServiceExt;
use tracing::{Level, info};
use tracing_subscriber::fmt::format::FmtSpan;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::config::CompanyCodes;
use crate::serpro::credentials::Credentials;
use crate::serpro::http::HttpClient;
use crate::serpro::token::TokenManager;
use crate::serpro::{RequestBuilder, SerproClient};
use crate::services::cookie_service::ACCESS_TOKEN_COOKIE;
use crate::services::document_service::DocumentService;
use crate::services::jwt_service::JwtService;
use crate::{AppState, create_router};

static INIT: Once = Once::new();

/// base64 of `%PDF-1.4\n`
pub const PDF_B64: &str = "JVBERi0xLjQK";
pub const STAFF_USERNAME: &str = "staff";
pub const STAFF_PASSWORD: &str = "staff-password";

/// Initialize logging exactly once
pub fn init_tracing() {
    INIT.call_once(|| {
        tracing_subscriber::fmt()
            .with_test_writer()
            .with_target(false)
            .with_level(true)
            .with_file(true)
            .with_line_number(true)
            .with_max_level(Level::ERROR)
            .with_span_events(FmtSpan::NONE)
            .init();
    });
}

pub async fn setup_test_db() -> SqlitePool {
    init_tracing();
    info!("Setting up test database");

    // A single connection keeps every query on the same in-memory database.
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .expect("Failed to create test database");

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("Failed to run migrations");

    pool
}

pub async fn mount_auth(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/authenticate"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "test-access",
            "jwt_token": "test-jwt",
            "expires_in": 3600
        })))
        .mount(server)
        .await;
}

pub async fn mount_emit_success(server: &MockServer) {
    mount_auth(server).await;
    Mock::given(method("POST"))
        .and(path("/Emitir"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "mensagens": [{ "codigo": "Sucesso-23001", "texto": "Requisição efetuada com sucesso." }],
            "dados": json!({ "docArrecadacaoPdfB64": PDF_B64 }).to_string()
        })))
        .mount(server)
        .await;
}

pub async fn mount_emit_failure(server: &MockServer, status: u16, code: &str, text: &str) {
    mount_auth(server).await;
    Mock::given(method("POST"))
        .and(path("/Emitir"))
        .respond_with(ResponseTemplate::new(status).set_body_json(json!({
            "mensagens": [{ "codigo": code, "texto": text }]
        })))
        .mount(server)
        .await;
}

pub fn test_serpro_client(server: &MockServer) -> SerproClient {
    let credentials = Credentials {
        certificate_dir: "/unused".into(),
        certificate_name: "cert.pfx".into(),
        certificate_password: "pfx".into(),
        consumer_key: "key".into(),
        consumer_secret: "secret".into(),
    };
    let http = HttpClient::builder().build().expect("Failed to build HTTP client");
    let tokens = TokenManager::new(http.clone(), format!("{}/authenticate", server.uri()), &credentials);
    SerproClient::new(http, server.uri(), Arc::new(tokens))
}

pub fn test_document_service(pool: SqlitePool, server: &MockServer) -> DocumentService {
    DocumentService::new(
        pool,
        test_serpro_client(server),
        RequestBuilder::new("00000000000000", "00000000000000"),
    )
}

pub fn test_state(pool: SqlitePool, server: &MockServer) -> AppState {
    AppState::new(
        pool,
        JwtService::new("test-secret"),
        test_serpro_client(server),
        RequestBuilder::new("00000000000000", "00000000000000"),
        CompanyCodes::parse("11.111.111/0001-11=5678").expect("valid company codes"),
    )
}

pub fn create_test_app(state: AppState) -> Router {
    create_router(state)
}

/// Provisions the staff user and returns a `Cookie` header carrying a session.
pub async fn staff_cookie(state: &AppState) -> HeaderMap {
    state
        .auth_service
        .upsert_user(STAFF_USERNAME, STAFF_PASSWORD)
        .await
        .expect("Failed to create staff user");
    let token = state
        .auth_service
        .login(STAFF_USERNAME, STAFF_PASSWORD)
        .await
        .expect("Failed to log in staff user");

    let mut headers = HeaderMap::new();
    headers.insert(
        "cookie",
        format!("{ACCESS_TOKEN_COOKIE}={token}").parse().unwrap(),
    );
    headers
}

pub async fn test_request(
    app: Router,
    method: &str,
    uri: &str,
    body: Option<Value>,
    headers: Option<HeaderMap>,
) -> (StatusCode, String, HeaderMap) {
    info!(method = %method, uri = %uri, "Making test request");

    let body = match body {
        Some(json) => Body::from(serde_json::to_string(&json).unwrap()),
        None => Body::empty(),
    };

    let mut request = Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json");

    // Add custom headers if provided
    if let Some(custom_headers) = headers {
        for (key, value) in custom_headers.iter() {
            request = request.header(key, value);
        }
    }

    let response = app.oneshot(request.body(body).unwrap()).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body = String::from_utf8_lossy(&bytes).into_owned();

    info!(status = %status, body = %body, "Test response received");
    (status, body, headers)
}
