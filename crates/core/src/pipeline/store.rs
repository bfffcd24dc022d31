use async_trait::async_trait;
use thiserror::Error;

use crate::domain::feedback::{FeedbackId, FollowUpLead, ValidatedSubmission};
use crate::domain::lead::DirectLead;
use crate::domain::manager::{ManagerName, UserId};

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("storage unavailable: {0}")]
    Unavailable(String),
    #[error("storage call timed out")]
    Timeout,
    #[error("{entity} `{key}` not found")]
    NotFound { entity: &'static str, key: String },
    #[error("{entity} `{key}` was already processed")]
    Conflict { entity: &'static str, key: String },
    #[error("{entity} `{key}` does not belong to customer `{customer_mobile}`")]
    CustomerMismatch { entity: &'static str, key: String, customer_mobile: String },
    #[error("decode error: {0}")]
    Decode(String),
}

/// Read side of the disposition history.
#[async_trait]
pub trait LeadHistoryStore: Send + Sync {
    /// Current, eligible, unprocessed leads assigned to `manager`, newest first.
    async fn current_direct_leads(&self, manager: &ManagerName)
        -> Result<Vec<DirectLead>, StoreError>;
}

#[async_trait]
pub trait FeedbackStore: Send + Sync {
    /// Current follow-up leads for `manager`, newest feedback first.
    async fn current_follow_up_leads(
        &self,
        manager: &ManagerName,
    ) -> Result<Vec<FollowUpLead>, StoreError>;

    /// Retires the disposition `submission.lead_id` and records the feedback,
    /// all or nothing. The disposition must belong to
    /// `submission.customer_mobile`.
    async fn record_direct_feedback(
        &self,
        submission: &ValidatedSubmission,
    ) -> Result<FeedbackId, StoreError>;

    /// Retires the follow-up of feedback `submission.lead_id` and records the
    /// new feedback, all or nothing.
    async fn record_follow_up_feedback(
        &self,
        submission: &ValidatedSubmission,
    ) -> Result<FeedbackId, StoreError>;
}

#[async_trait]
pub trait IdentityResolver: Send + Sync {
    async fn manager_name(&self, user_id: UserId) -> Result<Option<ManagerName>, StoreError>;
}
