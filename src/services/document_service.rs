use chrono::Utc;
use sqlx::SqlitePool;
use thiserror::Error;
use tracing::{info, instrument, warn};

use crate::models::requisition::{Requisition, RequisitionError, RequisitionStatus};
use crate::serpro::{ApiMethod, DocumentRequest, EMIT_ENDPOINT, RequestBuilder, SerproClient, SerproError};

const UNKNOWN_FAILURE: &str = "an unknown error occurred while generating the DAS document";
const SUCCESS_MESSAGE: &str = "Success";

#[derive(Debug, Error)]
pub enum DocumentError {
    /// The gateway answered but produced no document.
    #[error("{0}")]
    NotGenerated(String),
    #[error(transparent)]
    Serpro(#[from] SerproError),
    #[error(transparent)]
    Requisition(#[from] RequisitionError),
}

/// Emits one DAS document and records it.
#[derive(Clone)]
pub struct DocumentService {
    pool: SqlitePool,
    client: SerproClient,
    builder: RequestBuilder,
}

impl DocumentService {
    pub fn new(pool: SqlitePool, client: SerproClient, builder: RequestBuilder) -> Self {
        Self { pool, client, builder }
    }

    /// Returns the id of the stored requisition.
    #[instrument(skip(self, request), fields(taxpayer = %request.taxpayer_id, period = %request.billing_period))]
    pub async fn generate(&self, request: &DocumentRequest) -> Result<i64, DocumentError> {
        let envelope = self.builder.build_request(request)?;
        let sent_at = Utc::now();

        let response = self.client.call(EMIT_ENDPOINT, ApiMethod::Post, &envelope).await?;
        let Some(document) = response.document else {
            let message = response.message.unwrap_or_else(|| UNKNOWN_FAILURE.to_string());
            warn!(message = %message, "DAS document not generated");
            return Err(DocumentError::NotGenerated(message));
        };

        // The row and its document land together or not at all.
        let mut tx = self.pool.begin().await.map_err(RequisitionError::from)?;
        let requisition = Requisition::create(&mut *tx, request, sent_at).await?;
        Requisition::save_response(
            &mut *tx,
            requisition.id,
            Some(&document),
            RequisitionStatus::Concluded,
            Some(response.message.as_deref().unwrap_or(SUCCESS_MESSAGE)),
        )
        .await?;
        tx.commit().await.map_err(RequisitionError::from)?;

        info!(requisition_id = requisition.id, "DAS document stored");
        Ok(requisition.id)
    }
}
