use std::sync::Arc;

use anyhow::Context;
use axum::{
    Json, Router,
    routing::{get, post},
};
use serde::Serialize;
use sqlx::SqlitePool;
use tower_cookies::CookieManagerLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

mod api;
mod config;
mod db;
mod middleware;
mod models;
mod serpro;
mod services;
mod utils;
#[cfg(test)]
mod tests;

use config::{CompanyCodes, Config};
use serpro::{RequestBuilder, SerproClient};
use services::auth_service::AuthService;
use services::batch_service::BatchService;
use services::document_service::DocumentService;
use services::jwt_service::JwtService;

#[derive(Clone)]
pub struct AppState {
    pub db: SqlitePool,
    pub auth_service: AuthService,
    pub documents: DocumentService,
    pub batch: BatchService,
    pub company_codes: Arc<CompanyCodes>,
}

impl AppState {
    pub fn new(
        db: SqlitePool,
        jwt_service: JwtService,
        client: SerproClient,
        builder: RequestBuilder,
        company_codes: CompanyCodes,
    ) -> Self {
        let documents = DocumentService::new(db.clone(), client, builder);
        Self {
            auth_service: AuthService::new(db.clone(), jwt_service),
            batch: BatchService::new(documents.clone()),
            documents,
            company_codes: Arc::new(company_codes),
            db,
        }
    }
}

#[derive(Serialize)]
struct Health {
    status: &'static str,
}

async fn health() -> Json<Health> {
    Json(Health { status: "ok" })
}

pub fn create_router(state: AppState) -> Router {
    // Create a CORS layer
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let staff_only = Router::new()
        .route("/me", get(api::user::get_current_user))
        .route("/das", post(api::documents::generate_das))
        .route("/das/batch", post(api::documents::submit_batch))
        .route("/requisitions", get(api::requisitions::list_requisitions))
        .route("/requisitions/{id}/receipt", get(api::requisitions::download_receipt))
        .route_layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::auth::require_staff,
        ));

    Router::new()
        .route("/health", get(health))
        .route("/login", post(api::auth::login))
        .route("/logout", post(api::auth::logout))
        .merge(staff_only)
        .layer(CookieManagerLayer::new())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("serpro_das=info,tower_http=info")),
        )
        .init();

    let config = Config::from_env().context("invalid configuration")?;

    let pool = db::create_db_pool(&config.database_url)
        .await
        .context("failed to open the database")?;
    let client = SerproClient::from_config(&config.serpro).context("failed to set up the SERPRO client")?;
    let builder = RequestBuilder::new(&config.serpro.contractor_id, &config.serpro.requester_id);

    let state = AppState::new(
        pool,
        JwtService::new(&config.secret_key),
        client,
        builder,
        config.company_codes.clone(),
    );

    if let Some(admin) = &config.admin {
        state
            .auth_service
            .upsert_user(&admin.username, &admin.password)
            .await
            .context("failed to provision the admin account")?;
    }

    let app = create_router(state);

    let listener = tokio::net::TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.bind_addr))?;
    tracing::info!("listening on {}", config.bind_addr);
    axum::serve(listener, app).await?;

    Ok(())
}
