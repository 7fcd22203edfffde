use axum::{
    Json,
    extract::{Path, Query, State},
    response::{IntoResponse, Response},
};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use chrono::{DateTime, Utc};
use http::header::{CONTENT_DISPOSITION, CONTENT_TYPE};
use serde::{Deserialize, Serialize};

use crate::AppState;
use crate::api::ApiError;
use crate::models::requisition::{Requisition, RequisitionFilter, RequisitionStatus};

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    taxpayer: Option<String>,
    month: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct RequisitionSummary {
    id: i64,
    taxpayer_id: String,
    sent_at: String,
    status: RequisitionStatus,
    has_document: bool,
}

impl From<Requisition> for RequisitionSummary {
    fn from(requisition: Requisition) -> Self {
        Self {
            id: requisition.id,
            taxpayer_id: requisition.taxpayer_id,
            sent_at: requisition.sent_at.format("%d/%m/%Y %H:%M:%S").to_string(),
            status: requisition.status,
            has_document: requisition.response_document.is_some(),
        }
    }
}

pub async fn list_requisitions(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<RequisitionSummary>>, ApiError> {
    let filter = RequisitionFilter {
        taxpayer_id: query.taxpayer.filter(|t| !t.trim().is_empty()),
        // An unparseable month is ignored rather than rejected.
        month: query
            .month
            .and_then(|m| m.trim().parse::<u32>().ok())
            .filter(|m| (1..=12).contains(m)),
    };

    let requisitions = Requisition::list(&state.db, &filter).await?;
    Ok(Json(requisitions.into_iter().map(RequisitionSummary::from).collect()))
}

pub async fn download_receipt(State(state): State<AppState>, Path(id): Path<i64>) -> Result<Response, ApiError> {
    let not_available = || ApiError::NotFound("receipt not found or not yet available".to_string());

    let requisition = Requisition::find_by_id(&state.db, id).await?.ok_or_else(not_available)?;
    let encoded = requisition.response_document.as_deref().ok_or_else(not_available)?;

    let pdf = STANDARD
        .decode(encoded.trim())
        .map_err(|e| ApiError::Internal(format!("stored document {id} is not valid base64: {e}")))?;

    let code = state.company_codes.code_for(&requisition.taxpayer_id);
    let disposition = format!(
        "attachment; filename=\"{}\"",
        receipt_filename(code, requisition.sent_at)
    );

    Ok(([(CONTENT_TYPE, "application/pdf".to_string()), (CONTENT_DISPOSITION, disposition)], pdf).into_response())
}

/// `{company_code}-PARC SN-{MMYYYY}.pdf`
pub fn receipt_filename(company_code: &str, sent_at: DateTime<Utc>) -> String {
    format!("{company_code}-PARC SN-{}.pdf", sent_at.format("%m%Y"))
}
