use serde::{Deserialize, Deserializer, Serialize, de};
use serde_json::Value;
use tracing::{error, info, info_span, Instrument};
use uuid::Uuid;

use crate::serpro::{DocumentRequest, TaxpayerType};
use crate::services::document_service::{DocumentError, DocumentService};
use crate::utils::period::billing_period_from;

/// Batch spreadsheets only list companies, so every row is emitted as a CNPJ.
pub const BATCH_TAXPAYER_TYPE: TaxpayerType = TaxpayerType::Organization;

const SUCCESS_MESSAGE: &str = "DAS document generated";

/// One spreadsheet row, keyed by the spreadsheet's column headers.
#[derive(Debug, Clone, Deserialize)]
pub struct BatchRow {
    #[serde(rename = "CNPJ", deserialize_with = "cell_text")]
    pub taxpayer_id: String,
    #[serde(rename = "ID_SISTEMA", deserialize_with = "cell_text")]
    pub system_id: String,
    #[serde(rename = "ID_SERVICO", deserialize_with = "cell_text")]
    pub service_id: String,
    /// Either `YYYY/MM` text or a date cell.
    #[serde(rename = "DATA_ENVIO", default)]
    pub send_date: Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum BatchStatus {
    Success,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BatchOutcome {
    pub taxpayer_id: String,
    pub status: BatchStatus,
    pub message: String,
}

#[derive(Clone)]
pub struct BatchService {
    documents: DocumentService,
}

impl BatchService {
    pub fn new(documents: DocumentService) -> Self {
        Self { documents }
    }

    /// Processes rows one after another. A failing row is reported and the
    /// batch moves on; the result has exactly one entry per row, in order.
    pub async fn run_batch(&self, rows: &[BatchRow]) -> Vec<BatchOutcome> {
        let span = info_span!("batch", batch_id = %Uuid::new_v4(), rows = rows.len());
        async {
            let mut outcomes = Vec::with_capacity(rows.len());
            for row in rows {
                outcomes.push(self.run_row(row).await);
            }
            let failed = outcomes.iter().filter(|o| o.status == BatchStatus::Error).count();
            info!(failed, "Batch finished");
            outcomes
        }
        .instrument(span)
        .await
    }

    async fn run_row(&self, row: &BatchRow) -> BatchOutcome {
        info!(
            taxpayer = %row.taxpayer_id,
            system_id = %row.system_id,
            service_id = %row.service_id,
            send_date = %row.send_date,
            "Processing batch row"
        );

        match self.emit(row).await {
            Ok(requisition_id) => {
                info!(taxpayer = %row.taxpayer_id, requisition_id, "DAS document generated");
                BatchOutcome {
                    taxpayer_id: row.taxpayer_id.clone(),
                    status: BatchStatus::Success,
                    message: SUCCESS_MESSAGE.to_string(),
                }
            }
            Err(RowError::Document(DocumentError::NotGenerated(message))) => {
                error!(taxpayer = %row.taxpayer_id, message = %message, "DAS document not generated");
                BatchOutcome {
                    taxpayer_id: row.taxpayer_id.clone(),
                    status: BatchStatus::Error,
                    message,
                }
            }
            Err(e) => {
                error!(taxpayer = %row.taxpayer_id, error = %e, "Batch row failed");
                BatchOutcome {
                    taxpayer_id: row.taxpayer_id.clone(),
                    status: BatchStatus::Error,
                    message: format!("error processing taxpayer {}: {e}", row.taxpayer_id),
                }
            }
        }
    }

    async fn emit(&self, row: &BatchRow) -> Result<i64, RowError> {
        let billing_period = billing_period_from(&row.send_date).map_err(|e| RowError::Date(e.to_string()))?;
        let request = DocumentRequest::new(
            row.taxpayer_id.as_str(),
            BATCH_TAXPAYER_TYPE,
            row.system_id.as_str(),
            row.service_id.as_str(),
            billing_period,
        );

        Ok(self.documents.generate(&request).await?)
    }
}

#[derive(Debug, thiserror::Error)]
enum RowError {
    #[error("{0}")]
    Date(String),
    #[error(transparent)]
    Document(#[from] DocumentError),
}

/// Spreadsheet cells may come through as numbers; keep their text form.
/// Whole floats (`11111111000111.0`) are read as integers, fractional ones rejected.
fn cell_text<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(text) => Ok(text.trim().to_string()),
        Value::Null => Ok(String::new()),
        Value::Number(number) if number.is_i64() || number.is_u64() => Ok(number.to_string()),
        Value::Number(number) => match number.as_f64() {
            Some(float) if float.is_finite() && float.fract() == 0.0 && float.abs() < 1e18 => {
                Ok(format!("{}", float as i64))
            }
            _ => Err(de::Error::custom(format!("expected a whole number, got {number}"))),
        },
        other => Ok(other.to_string()),
    }
}
