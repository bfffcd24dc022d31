use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;

use leadops_core::domain::lead::{
    DirectLead, DispositionRecord, LeadId, LeadStatus, HIGH_SERVICEABILITY_CONFIDENCE,
    INTENT_INTERESTED,
};
use leadops_core::domain::manager::ManagerName;
use leadops_core::domain::{format_timestamp, parse_timestamp};
use leadops_core::pipeline::{LeadHistoryStore, StoreError};

use super::{decode_error, RepositoryError};
use crate::DbPool;

pub struct SqlLeadHistoryStore {
    pool: DbPool,
}

/// A disposition event to append to a customer's history.
#[derive(Clone, Debug, Default)]
pub struct NewDisposition {
    pub customer_mobile: String,
    pub customer_name: Option<String>,
    pub city: Option<String>,
    pub address: Option<String>,
    pub zone: Option<String>,
    pub coordinates: Option<String>,
    pub structured_disposition: Option<String>,
    pub manager_name: String,
    pub installation_status: i64,
    pub final_lead_status: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
}

impl SqlLeadHistoryStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Appends a new, unprocessed disposition event.
    pub async fn append_disposition(
        &self,
        disposition: &NewDisposition,
    ) -> Result<LeadId, RepositoryError> {
        let created_at = format_timestamp(&disposition.created_at.unwrap_or_else(Utc::now));

        let result = sqlx::query(
            "INSERT INTO lead_disposition
                (customer_mobile, customer_name, city, address, zone, coordinates,
                 structured_disposition, manager_name, status, installation_status,
                 final_lead_status, modified_at, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&disposition.customer_mobile)
        .bind(&disposition.customer_name)
        .bind(&disposition.city)
        .bind(&disposition.address)
        .bind(&disposition.zone)
        .bind(&disposition.coordinates)
        .bind(&disposition.structured_disposition)
        .bind(&disposition.manager_name)
        .bind(LeadStatus::Unprocessed.as_str())
        .bind(disposition.installation_status)
        .bind(&disposition.final_lead_status)
        .bind(&created_at)
        .bind(&created_at)
        .execute(&self.pool)
        .await?;

        Ok(LeadId(result.last_insert_rowid()))
    }

    pub async fn find_by_id(&self, id: LeadId) -> Result<Option<DispositionRecord>, RepositoryError> {
        let row = sqlx::query(
            "SELECT id, customer_mobile, customer_name, city, address, zone, coordinates,
                    structured_disposition, manager_name, status, installation_status,
                    final_lead_status, modified_at, created_at
             FROM lead_disposition WHERE id = ?",
        )
        .bind(id.0)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(row_to_disposition).transpose()
    }

    /// Full history for one customer, newest first.
    pub async fn list_for_customer(
        &self,
        customer_mobile: &str,
    ) -> Result<Vec<DispositionRecord>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT id, customer_mobile, customer_name, city, address, zone, coordinates,
                    structured_disposition, manager_name, status, installation_status,
                    final_lead_status, modified_at, created_at
             FROM lead_disposition
             WHERE customer_mobile = ?
             ORDER BY created_at DESC, id DESC",
        )
        .bind(customer_mobile)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_disposition).collect()
    }

    pub async fn select_current_direct_leads(
        &self,
        manager: &ManagerName,
    ) -> Result<Vec<DirectLead>, RepositoryError> {
        // Rank first, filter second: a customer's newest row decides eligibility.
        let rows = sqlx::query(
            r#"
            WITH ranked AS (
                SELECT d.*,
                       ROW_NUMBER() OVER (
                           PARTITION BY d.customer_mobile
                           ORDER BY d.created_at DESC, d.id DESC
                       ) AS row_rank
                FROM lead_disposition d
            ),
            current AS (
                SELECT ranked.*,
                       CASE WHEN json_valid(structured_disposition)
                            THEN json_extract(structured_disposition, '$.customerIntent')
                       END AS customer_intent,
                       CASE WHEN json_valid(structured_disposition)
                            THEN json_extract(structured_disposition, '$.serviceabilityConfidence')
                       END AS serviceability_confidence
                FROM ranked
                WHERE row_rank = 1
            )
            SELECT id, customer_mobile, customer_name, city, address, zone, coordinates,
                   structured_disposition, manager_name, status, installation_status,
                   final_lead_status, modified_at, created_at
            FROM current
            WHERE customer_intent = ?
              AND manager_name = ?
              AND status = ?
              AND installation_status = 0
              AND serviceability_confidence = ?
            ORDER BY created_at DESC, id DESC
            "#,
        )
        .bind(INTENT_INTERESTED)
        .bind(manager.as_str())
        .bind(LeadStatus::Unprocessed.as_str())
        .bind(HIGH_SERVICEABILITY_CONFIDENCE)
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| row_to_disposition(row).map(|record| DirectLead::from_record(&record)))
            .collect()
    }
}

#[async_trait::async_trait]
impl LeadHistoryStore for SqlLeadHistoryStore {
    async fn current_direct_leads(
        &self,
        manager: &ManagerName,
    ) -> Result<Vec<DirectLead>, StoreError> {
        Ok(self.select_current_direct_leads(manager).await?)
    }
}

pub(crate) fn row_to_disposition(row: &SqliteRow) -> Result<DispositionRecord, RepositoryError> {
    let status_str: String = row.try_get("status").map_err(decode_error)?;
    let status = LeadStatus::parse(&status_str)
        .ok_or_else(|| RepositoryError::Decode(format!("unknown lead status `{status_str}`")))?;
    let created_at_str: String = row.try_get("created_at").map_err(decode_error)?;
    let created_at = parse_timestamp(&created_at_str)
        .ok_or_else(|| RepositoryError::Decode(format!("invalid created_at `{created_at_str}`")))?;

    Ok(DispositionRecord {
        id: LeadId(row.try_get("id").map_err(decode_error)?),
        customer_mobile: row.try_get("customer_mobile").map_err(decode_error)?,
        customer_name: row.try_get("customer_name").map_err(decode_error)?,
        city: row.try_get("city").map_err(decode_error)?,
        address: row.try_get("address").map_err(decode_error)?,
        zone: row.try_get("zone").map_err(decode_error)?,
        coordinates: row.try_get("coordinates").map_err(decode_error)?,
        structured_disposition: row.try_get("structured_disposition").map_err(decode_error)?,
        manager_name: row.try_get("manager_name").map_err(decode_error)?,
        status,
        installation_status: row.try_get("installation_status").map_err(decode_error)?,
        final_lead_status: row.try_get("final_lead_status").map_err(decode_error)?,
        modified_at: row.try_get("modified_at").map_err(decode_error)?,
        created_at,
    })
}
