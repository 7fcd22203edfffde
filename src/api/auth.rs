use axum::{Json, extract::State};
use serde::Deserialize;
use serde_json::{Value, json};
use tower_cookies::Cookies;

use crate::AppState;
use crate::api::ApiError;
use crate::services::cookie_service::CookieService;

#[derive(Deserialize)]
pub struct LoginRequest {
    username: String,
    password: String,
}

pub async fn login(
    State(state): State<AppState>,
    cookies: Cookies,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<Value>, ApiError> {
    let token = state
        .auth_service
        .login(payload.username.trim(), &payload.password)
        .await?;
    CookieService::set_access_cookie(&cookies, &token);

    Ok(Json(json!({ "message": "Login successful" })))
}

pub async fn logout(cookies: Cookies) -> Json<Value> {
    CookieService::clear_access_cookie(&cookies);
    Json(json!({ "message": "Logged out" }))
}
