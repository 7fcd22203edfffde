use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use tower_cookies::Cookies;
use tracing::debug;

use crate::{AppState, api::ApiError, models::user::User, services::cookie_service::CookieService};

#[derive(Clone)]
pub struct CurrentUser(pub User);

/// Rejects requests without a valid staff session cookie.
pub async fn require_staff(
    State(state): State<AppState>,
    cookies: Cookies,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = CookieService::access_token(&cookies).ok_or(ApiError::Unauthorized)?;

    let user = state.auth_service.verify_token(&token).await.map_err(|e| {
        debug!(error = %e, "Rejected session token");
        ApiError::from(e)
    })?;

    // Add the user to request extensions
    request.extensions_mut().insert(CurrentUser(user));

    Ok(next.run(request).await)
}
