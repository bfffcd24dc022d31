use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use leadops_core::domain::feedback::{FeedbackId, FeedbackRecord, FollowUpLead, ValidatedSubmission};
use leadops_core::domain::lead::{DirectLead, DispositionRecord, LeadId, LeadStatus};
use leadops_core::domain::manager::{ManagerName, UserId};
use leadops_core::domain::format_timestamp;
use leadops_core::pipeline::selection;
use leadops_core::pipeline::{FeedbackStore, IdentityResolver, LeadHistoryStore, StoreError};

use super::lead_history::NewDisposition;

#[derive(Default)]
struct LeadTables {
    dispositions: Vec<DispositionRecord>,
    feedback: Vec<FeedbackRecord>,
    users: HashMap<i64, String>,
    next_lead_id: i64,
    next_feedback_id: i64,
}

/// Process-local store implementing every pipeline port.
///
/// Selection goes through the same rules as the SQL views, so behaviour is
/// interchangeable with the SQLite stores. Reads can be slowed down or made
/// to fail a number of times to exercise timeouts and retries.
#[derive(Default)]
pub struct InMemoryLeadStore {
    tables: RwLock<LeadTables>,
    failing_reads: AtomicU32,
    read_delay: Option<Duration>,
}

impl InMemoryLeadStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every read sleeps for `delay` before answering.
    pub fn with_read_delay(mut self, delay: Duration) -> Self {
        self.read_delay = Some(delay);
        self
    }

    /// The next `count` reads fail with [`StoreError::Unavailable`].
    pub fn fail_next_reads(&self, count: u32) {
        self.failing_reads.store(count, Ordering::SeqCst);
    }

    pub async fn insert_user(&self, user_id: UserId, username: &str) {
        self.tables.write().await.users.insert(user_id.0, username.to_string());
    }

    pub async fn insert_disposition(&self, disposition: NewDisposition) -> LeadId {
        let mut tables = self.tables.write().await;
        tables.next_lead_id += 1;
        let id = LeadId(tables.next_lead_id);
        let created_at = disposition.created_at.unwrap_or_else(Utc::now);

        tables.dispositions.push(DispositionRecord {
            id,
            customer_mobile: disposition.customer_mobile,
            customer_name: disposition.customer_name,
            city: disposition.city,
            address: disposition.address,
            zone: disposition.zone,
            coordinates: disposition.coordinates,
            structured_disposition: disposition.structured_disposition,
            manager_name: disposition.manager_name,
            status: LeadStatus::Unprocessed,
            installation_status: disposition.installation_status,
            final_lead_status: disposition.final_lead_status,
            modified_at: Some(format_timestamp(&created_at)),
            created_at,
        });
        id
    }

    /// Records feedback without retiring anything, e.g. to seed follow-ups.
    pub async fn insert_feedback(
        &self,
        submission: &ValidatedSubmission,
        created_at: DateTime<Utc>,
    ) -> FeedbackId {
        let mut tables = self.tables.write().await;
        push_feedback(&mut tables, submission, created_at)
    }

    pub async fn dispositions(&self) -> Vec<DispositionRecord> {
        self.tables.read().await.dispositions.clone()
    }

    pub async fn feedback(&self) -> Vec<FeedbackRecord> {
        self.tables.read().await.feedback.clone()
    }

    async fn before_read(&self) -> Result<(), StoreError> {
        if let Some(delay) = self.read_delay {
            tokio::time::sleep(delay).await;
        }
        let failed = self
            .failing_reads
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
            .is_ok();
        if failed {
            return Err(StoreError::Unavailable("injected read failure".to_string()));
        }
        Ok(())
    }
}

fn push_feedback(
    tables: &mut LeadTables,
    submission: &ValidatedSubmission,
    created_at: DateTime<Utc>,
) -> FeedbackId {
    tables.next_feedback_id += 1;
    let id = FeedbackId(tables.next_feedback_id);
    tables.feedback.push(FeedbackRecord {
        id,
        manager_id: submission.manager_id,
        customer_mobile: submission.customer_mobile.clone(),
        disposition_choice: submission.disposition_choice.clone(),
        closure_reason: submission.closure_reason.clone(),
        remark: submission.remark.clone(),
        free_text_note: submission.free_text_note.clone(),
        updated_coordinates: submission.updated_coordinates.clone(),
        manager_display_name: submission.manager_display_name.clone(),
        follow_up_status: LeadStatus::Unprocessed,
        created_at,
    });
    id
}

#[async_trait::async_trait]
impl LeadHistoryStore for InMemoryLeadStore {
    async fn current_direct_leads(
        &self,
        manager: &ManagerName,
    ) -> Result<Vec<DirectLead>, StoreError> {
        self.before_read().await?;
        let tables = self.tables.read().await;
        Ok(selection::direct_leads(&tables.dispositions, manager))
    }
}

#[async_trait::async_trait]
impl FeedbackStore for InMemoryLeadStore {
    async fn current_follow_up_leads(
        &self,
        manager: &ManagerName,
    ) -> Result<Vec<FollowUpLead>, StoreError> {
        self.before_read().await?;
        let tables = self.tables.read().await;
        Ok(selection::follow_up_leads(&tables.dispositions, &tables.feedback, manager))
    }

    async fn record_direct_feedback(
        &self,
        submission: &ValidatedSubmission,
    ) -> Result<FeedbackId, StoreError> {
        let mut tables = self.tables.write().await;
        let key = submission.lead_id.to_string();

        let record = tables
            .dispositions
            .iter_mut()
            .find(|record| record.id.0 == submission.lead_id)
            .ok_or_else(|| StoreError::NotFound { entity: "disposition", key: key.clone() })?;
        if record.customer_mobile != submission.customer_mobile {
            return Err(StoreError::CustomerMismatch {
                entity: "disposition",
                key,
                customer_mobile: submission.customer_mobile.clone(),
            });
        }
        if record.status != LeadStatus::Unprocessed {
            return Err(StoreError::Conflict { entity: "disposition", key });
        }
        record.status = LeadStatus::Processed;

        Ok(push_feedback(&mut tables, submission, Utc::now()))
    }

    async fn record_follow_up_feedback(
        &self,
        submission: &ValidatedSubmission,
    ) -> Result<FeedbackId, StoreError> {
        let mut tables = self.tables.write().await;
        let key = submission.lead_id.to_string();

        let record = tables
            .feedback
            .iter_mut()
            .find(|record| record.id.0 == submission.lead_id)
            .ok_or_else(|| StoreError::NotFound { entity: "feedback", key: key.clone() })?;
        if record.customer_mobile != submission.customer_mobile {
            return Err(StoreError::CustomerMismatch {
                entity: "feedback",
                key,
                customer_mobile: submission.customer_mobile.clone(),
            });
        }
        if record.follow_up_status != LeadStatus::Unprocessed {
            return Err(StoreError::Conflict { entity: "feedback", key });
        }
        record.follow_up_status = LeadStatus::Processed;

        Ok(push_feedback(&mut tables, submission, Utc::now()))
    }
}

#[async_trait::async_trait]
impl IdentityResolver for InMemoryLeadStore {
    async fn manager_name(&self, user_id: UserId) -> Result<Option<ManagerName>, StoreError> {
        self.before_read().await?;
        let tables = self.tables.read().await;
        Ok(tables.users.get(&user_id.0).cloned().map(ManagerName::new))
    }
}
