use chrono::Utc;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, Sqlite, Transaction};
use tracing::debug;

use leadops_core::domain::feedback::{
    FeedbackId, FeedbackRecord, FollowUpLead, ValidatedSubmission, Workflow,
    FOLLOW_UP_WITH_PARTNER,
};
use leadops_core::domain::lead::LeadStatus;
use leadops_core::domain::manager::ManagerName;
use leadops_core::domain::{format_timestamp, parse_timestamp};
use leadops_core::pipeline::{FeedbackStore, StoreError};

use super::lead_history::row_to_disposition;
use super::{decode_error, RepositoryError};
use crate::DbPool;

pub struct SqlFeedbackStore {
    pool: DbPool,
}

/// Result of a conditional status transition attempted inside a submission.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SubmissionOutcome {
    Recorded(FeedbackId),
    Missing,
    AlreadyProcessed,
    /// The row exists but belongs to a different customer.
    CustomerMismatch,
}

impl SqlFeedbackStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub async fn find_by_id(&self, id: FeedbackId) -> Result<Option<FeedbackRecord>, RepositoryError> {
        let row = sqlx::query(
            "SELECT id, manager_id, customer_mobile, disposition_choice, closure_reason, remark,
                    free_text_note, updated_coordinates, manager_display_name, follow_up_status,
                    created_at
             FROM lead_feedback WHERE id = ?",
        )
        .bind(id.0)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(|row| row_to_feedback(row, "")).transpose()
    }

    /// Every feedback row for one customer, newest first.
    pub async fn list_for_customer(
        &self,
        customer_mobile: &str,
    ) -> Result<Vec<FeedbackRecord>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT id, manager_id, customer_mobile, disposition_choice, closure_reason, remark,
                    free_text_note, updated_coordinates, manager_display_name, follow_up_status,
                    created_at
             FROM lead_feedback
             WHERE customer_mobile = ?
             ORDER BY created_at DESC, id DESC",
        )
        .bind(customer_mobile)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(|row| row_to_feedback(row, "")).collect()
    }

    pub async fn select_current_follow_up_leads(
        &self,
        manager: &ManagerName,
    ) -> Result<Vec<FollowUpLead>, RepositoryError> {
        let rows = sqlx::query(
            r#"
            WITH current_disposition AS (
                SELECT * FROM (
                    SELECT d.*,
                           ROW_NUMBER() OVER (
                               PARTITION BY d.customer_mobile
                               ORDER BY d.created_at DESC, d.id DESC
                           ) AS row_rank
                    FROM lead_disposition d
                ) WHERE row_rank = 1
            ),
            current_feedback AS (
                SELECT * FROM (
                    SELECT f.*,
                           ROW_NUMBER() OVER (
                               PARTITION BY f.customer_mobile
                               ORDER BY f.created_at DESC, f.id DESC
                           ) AS row_rank
                    FROM lead_feedback f
                ) WHERE row_rank = 1
            )
            SELECT d.id, d.customer_mobile, d.customer_name, d.city, d.address, d.zone,
                   d.coordinates, d.structured_disposition, d.manager_name, d.status,
                   d.installation_status, d.final_lead_status, d.modified_at, d.created_at,
                   f.id AS feedback_id,
                   f.manager_id AS feedback_manager_id,
                   f.customer_mobile AS feedback_customer_mobile,
                   f.disposition_choice AS feedback_disposition_choice,
                   f.closure_reason AS feedback_closure_reason,
                   f.remark AS feedback_remark,
                   f.free_text_note AS feedback_free_text_note,
                   f.updated_coordinates AS feedback_updated_coordinates,
                   f.manager_display_name AS feedback_manager_display_name,
                   f.follow_up_status AS feedback_follow_up_status,
                   f.created_at AS feedback_created_at
            FROM current_disposition d
            JOIN current_feedback f ON f.customer_mobile = d.customer_mobile
            WHERE f.disposition_choice = ?
              AND d.manager_name = ?
              AND f.follow_up_status = ?
            ORDER BY f.created_at DESC, f.id DESC
            "#,
        )
        .bind(FOLLOW_UP_WITH_PARTNER)
        .bind(manager.as_str())
        .bind(LeadStatus::Unprocessed.as_str())
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| {
                let disposition = row_to_disposition(row)?;
                let feedback = row_to_feedback(row, "feedback_")?;
                Ok(FollowUpLead::from_pair(&disposition, &feedback))
            })
            .collect()
    }

    /// Retires the target row and inserts the feedback in one transaction.
    ///
    /// The conditional update runs first so two racing submissions for the
    /// same lead serialize on the write lock; the loser sees zero affected
    /// rows and nothing is inserted. Only the status column is written, and
    /// only when the row belongs to `submission.customer_mobile`.
    pub async fn submit(
        &self,
        workflow: Workflow,
        submission: &ValidatedSubmission,
    ) -> Result<SubmissionOutcome, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let (retire_sql, owner_sql) = match workflow {
            Workflow::Direct => (
                "UPDATE lead_disposition SET status = 'processed'
                 WHERE id = ? AND customer_mobile = ? AND status = 'unprocessed'",
                "SELECT customer_mobile FROM lead_disposition WHERE id = ?",
            ),
            Workflow::FollowUp => (
                "UPDATE lead_feedback SET follow_up_status = 'processed'
                 WHERE id = ? AND customer_mobile = ? AND follow_up_status = 'unprocessed'",
                "SELECT customer_mobile FROM lead_feedback WHERE id = ?",
            ),
        };
        let retired = sqlx::query(retire_sql)
            .bind(submission.lead_id)
            .bind(&submission.customer_mobile)
            .execute(&mut *tx)
            .await?;

        if retired.rows_affected() == 0 {
            let stored_mobile: Option<String> = sqlx::query_scalar(owner_sql)
                .bind(submission.lead_id)
                .fetch_optional(&mut *tx)
                .await?;
            tx.rollback().await?;

            let outcome = match stored_mobile {
                None => SubmissionOutcome::Missing,
                Some(mobile) if mobile != submission.customer_mobile => {
                    SubmissionOutcome::CustomerMismatch
                }
                Some(_) => SubmissionOutcome::AlreadyProcessed,
            };
            debug!(
                event_name = "db.feedback.transition_skipped",
                workflow = workflow.as_str(),
                lead_id = submission.lead_id,
                outcome = ?outcome,
                "no unprocessed row to retire"
            );
            return Ok(outcome);
        }

        let now = format_timestamp(&Utc::now());
        let feedback_id = insert_feedback(&mut tx, submission, &now).await?;
        tx.commit().await?;

        Ok(SubmissionOutcome::Recorded(feedback_id))
    }

    async fn record(
        &self,
        workflow: Workflow,
        submission: &ValidatedSubmission,
    ) -> Result<FeedbackId, StoreError> {
        match self.submit(workflow, submission).await? {
            SubmissionOutcome::Recorded(id) => Ok(id),
            SubmissionOutcome::Missing => Err(StoreError::NotFound {
                entity: workflow.target_entity(),
                key: submission.lead_id.to_string(),
            }),
            SubmissionOutcome::AlreadyProcessed => Err(StoreError::Conflict {
                entity: workflow.target_entity(),
                key: submission.lead_id.to_string(),
            }),
            SubmissionOutcome::CustomerMismatch => Err(StoreError::CustomerMismatch {
                entity: workflow.target_entity(),
                key: submission.lead_id.to_string(),
                customer_mobile: submission.customer_mobile.clone(),
            }),
        }
    }
}

#[async_trait::async_trait]
impl FeedbackStore for SqlFeedbackStore {
    async fn current_follow_up_leads(
        &self,
        manager: &ManagerName,
    ) -> Result<Vec<FollowUpLead>, StoreError> {
        Ok(self.select_current_follow_up_leads(manager).await?)
    }

    async fn record_direct_feedback(
        &self,
        submission: &ValidatedSubmission,
    ) -> Result<FeedbackId, StoreError> {
        self.record(Workflow::Direct, submission).await
    }

    async fn record_follow_up_feedback(
        &self,
        submission: &ValidatedSubmission,
    ) -> Result<FeedbackId, StoreError> {
        self.record(Workflow::FollowUp, submission).await
    }
}

async fn insert_feedback(
    tx: &mut Transaction<'_, Sqlite>,
    submission: &ValidatedSubmission,
    created_at: &str,
) -> Result<FeedbackId, RepositoryError> {
    let result = sqlx::query(
        "INSERT INTO lead_feedback
            (manager_id, customer_mobile, disposition_choice, closure_reason, remark,
             free_text_note, updated_coordinates, manager_display_name, follow_up_status,
             created_at)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(submission.manager_id)
    .bind(&submission.customer_mobile)
    .bind(&submission.disposition_choice)
    .bind(&submission.closure_reason)
    .bind(&submission.remark)
    .bind(&submission.free_text_note)
    .bind(&submission.updated_coordinates)
    .bind(&submission.manager_display_name)
    .bind(LeadStatus::Unprocessed.as_str())
    .bind(created_at)
    .execute(&mut **tx)
    .await?;

    Ok(FeedbackId(result.last_insert_rowid()))
}

fn row_to_feedback(row: &SqliteRow, prefix: &str) -> Result<FeedbackRecord, RepositoryError> {
    let column = |name: &str| format!("{prefix}{name}");

    let status_str: String = row.try_get(column("follow_up_status").as_str()).map_err(decode_error)?;
    let follow_up_status = LeadStatus::parse(&status_str)
        .ok_or_else(|| RepositoryError::Decode(format!("unknown follow-up status `{status_str}`")))?;
    let created_at_str: String = row.try_get(column("created_at").as_str()).map_err(decode_error)?;
    let created_at = parse_timestamp(&created_at_str)
        .ok_or_else(|| RepositoryError::Decode(format!("invalid created_at `{created_at_str}`")))?;

    Ok(FeedbackRecord {
        id: FeedbackId(row.try_get(column("id").as_str()).map_err(decode_error)?),
        manager_id: row.try_get(column("manager_id").as_str()).map_err(decode_error)?,
        customer_mobile: row.try_get(column("customer_mobile").as_str()).map_err(decode_error)?,
        disposition_choice: row
            .try_get(column("disposition_choice").as_str())
            .map_err(decode_error)?,
        closure_reason: row.try_get(column("closure_reason").as_str()).map_err(decode_error)?,
        remark: row.try_get(column("remark").as_str()).map_err(decode_error)?,
        free_text_note: row.try_get(column("free_text_note").as_str()).map_err(decode_error)?,
        updated_coordinates: row
            .try_get(column("updated_coordinates").as_str())
            .map_err(decode_error)?,
        manager_display_name: row
            .try_get(column("manager_display_name").as_str())
            .map_err(decode_error)?,
        follow_up_status,
        created_at,
    })
}
