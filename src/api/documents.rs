use axum::{
    Json,
    extract::{Extension, State, rejection::JsonRejection},
};
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::info;

use crate::AppState;
use crate::api::ApiError;
use crate::middleware::auth::CurrentUser;
use crate::serpro::{DocumentRequest, TaxpayerType};
use crate::services::batch_service::BatchRow;

#[derive(Deserialize)]
pub struct GenerateRequest {
    taxpayer_id: String,
    taxpayer_type: TaxpayerType,
    system_id: String,
    service_id: String,
    billing_period: String,
}

#[derive(Deserialize)]
pub struct BatchRequest {
    rows: Vec<BatchRow>,
}

pub async fn generate_das(
    State(state): State<AppState>,
    Extension(current_user): Extension<CurrentUser>,
    payload: Result<Json<GenerateRequest>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let Json(payload) = payload?;
    info!(staff = %current_user.0.username, taxpayer = %payload.taxpayer_id, "DAS requested");

    let request = DocumentRequest::new(
        payload.taxpayer_id,
        payload.taxpayer_type,
        payload.system_id,
        payload.service_id,
        payload.billing_period,
    );
    let requisition_id = state.documents.generate(&request).await?;

    Ok(Json(json!({
        "message": "DAS document generated successfully",
        "data": { "requisition_id": requisition_id }
    })))
}

pub async fn submit_batch(
    State(state): State<AppState>,
    Extension(current_user): Extension<CurrentUser>,
    payload: Result<Json<BatchRequest>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let Json(payload) = payload?;
    info!(staff = %current_user.0.username, rows = payload.rows.len(), "Batch submitted");

    let results = state.batch.run_batch(&payload.rows).await;

    Ok(Json(json!({
        "message": "Batch submission finished",
        "results": results
    })))
}
