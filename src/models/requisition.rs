use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Datelike, Utc};
use serde::Serialize;
use sqlx::{Executor, Sqlite, SqlitePool};
use thiserror::Error;

use crate::serpro::{DocumentRequest, TaxpayerType};

#[derive(Debug, Error)]
pub enum RequisitionError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("requisition {0} not found")]
    NotFound(i64),
    #[error("corrupt requisition row {id}: {reason}")]
    Corrupt { id: i64, reason: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RequisitionStatus {
    Pending,
    Concluded,
    Error,
}

impl RequisitionStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "Pending",
            Self::Concluded => "Concluded",
            Self::Error => "Error",
        }
    }
}

impl fmt::Display for RequisitionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RequisitionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Pending" => Ok(Self::Pending),
            "Concluded" => Ok(Self::Concluded),
            "Error" => Ok(Self::Error),
            other => Err(format!("unknown status '{other}'")),
        }
    }
}

/// A document request sent to SERPRO and what came back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Requisition {
    pub id: i64,
    pub taxpayer_id: String,
    pub taxpayer_type: TaxpayerType,
    pub system_id: String,
    pub service_id: String,
    pub sent_at: DateTime<Utc>,
    pub status: RequisitionStatus,
    /// Base64-encoded PDF.
    pub response_document: Option<String>,
    pub response_message: Option<String>,
    pub responded_at: Option<DateTime<Utc>>,
}

#[derive(sqlx::FromRow)]
struct RequisitionRow {
    id: i64,
    taxpayer_id: String,
    taxpayer_type: i64,
    system_id: String,
    service_id: String,
    sent_at: DateTime<Utc>,
    status: String,
    response_document: Option<String>,
    response_message: Option<String>,
    responded_at: Option<DateTime<Utc>>,
}

impl TryFrom<RequisitionRow> for Requisition {
    type Error = RequisitionError;

    fn try_from(row: RequisitionRow) -> Result<Self, Self::Error> {
        let id = row.id;
        let corrupt = move |reason: String| RequisitionError::Corrupt { id, reason };
        let taxpayer_type = u8::try_from(row.taxpayer_type)
            .map_err(|e| e.to_string())
            .and_then(TaxpayerType::try_from)
            .map_err(corrupt)?;
        let status: RequisitionStatus = row.status.parse().map_err(corrupt)?;

        Ok(Self {
            id: row.id,
            taxpayer_id: row.taxpayer_id,
            taxpayer_type,
            system_id: row.system_id,
            service_id: row.service_id,
            sent_at: row.sent_at,
            status,
            response_document: row.response_document,
            response_message: row.response_message,
            responded_at: row.responded_at,
        })
    }
}

#[derive(Debug, Clone, Default)]
pub struct RequisitionFilter {
    pub taxpayer_id: Option<String>,
    /// Calendar month (1-12) of `sent_at`.
    pub month: Option<u32>,
}

const COLUMNS: &str = "id, taxpayer_id, taxpayer_type, system_id, service_id, sent_at, status, \
                       response_document, response_message, responded_at";

impl Requisition {
    /// Records a request as `Pending`. Accepts a pool or an open transaction.
    pub async fn create<'e, E>(
        executor: E,
        request: &DocumentRequest,
        sent_at: DateTime<Utc>,
    ) -> Result<Requisition, RequisitionError>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let row = sqlx::query_as::<_, RequisitionRow>(&format!(
            r#"
            INSERT INTO requisitions (taxpayer_id, taxpayer_type, system_id, service_id, sent_at, status)
            VALUES (?, ?, ?, ?, ?, ?)
            RETURNING {COLUMNS}
            "#
        ))
        .bind(&request.taxpayer_id)
        .bind(i64::from(request.taxpayer_type.code()))
        .bind(&request.system_id)
        .bind(&request.service_id)
        .bind(sent_at)
        .bind(RequisitionStatus::Pending.as_str())
        .fetch_one(executor)
        .await?;

        row.try_into()
    }

    /// Stores the gateway's answer and stamps `responded_at`.
    pub async fn save_response<'e, E>(
        executor: E,
        id: i64,
        document: Option<&str>,
        status: RequisitionStatus,
        message: Option<&str>,
    ) -> Result<(), RequisitionError>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let result = sqlx::query(
            r#"
            UPDATE requisitions
            SET response_document = ?, status = ?, response_message = ?, responded_at = ?
            WHERE id = ?
            "#,
        )
        .bind(document)
        .bind(status.as_str())
        .bind(message)
        .bind(Utc::now())
        .bind(id)
        .execute(executor)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RequisitionError::NotFound(id));
        }
        Ok(())
    }

    pub async fn find_by_id(pool: &SqlitePool, id: i64) -> Result<Option<Requisition>, RequisitionError> {
        sqlx::query_as::<_, RequisitionRow>(&format!("SELECT {COLUMNS} FROM requisitions WHERE id = ?"))
            .bind(id)
            .fetch_optional(pool)
            .await?
            .map(Requisition::try_from)
            .transpose()
    }

    pub async fn list(pool: &SqlitePool, filter: &RequisitionFilter) -> Result<Vec<Requisition>, RequisitionError> {
        let rows = match &filter.taxpayer_id {
            Some(taxpayer_id) => {
                sqlx::query_as::<_, RequisitionRow>(&format!(
                    "SELECT {COLUMNS} FROM requisitions WHERE taxpayer_id = ? ORDER BY id"
                ))
                .bind(taxpayer_id)
                .fetch_all(pool)
                .await?
            }
            None => {
                sqlx::query_as::<_, RequisitionRow>(&format!("SELECT {COLUMNS} FROM requisitions ORDER BY id"))
                    .fetch_all(pool)
                    .await?
            }
        };

        rows.into_iter()
            .map(Requisition::try_from)
            .filter(|r| match (r, filter.month) {
                (Ok(requisition), Some(month)) => requisition.sent_at.month() == month,
                _ => true,
            })
            .collect()
    }
}
