//! Lead deduplication and status-transition pipeline.
//!
//! [`LeadPipeline`] is built once at process start and shared by every
//! request. It holds no mutable state of its own; all state lives behind the
//! store ports.

pub mod retry;
pub mod selection;
pub mod store;

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tracing::{error, info, warn};

use crate::config::PipelineConfig;
use crate::domain::feedback::{FeedbackSubmission, FollowUpLead, SubmissionReceipt, Workflow};
use crate::domain::lead::DirectLead;
use crate::domain::manager::{ManagerName, UserId};
use crate::errors::PipelineError;

pub use retry::ReadRetryPolicy;
pub use store::{FeedbackStore, IdentityResolver, LeadHistoryStore, StoreError};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PipelineSettings {
    pub storage_timeout: Duration,
    pub read_retry: ReadRetryPolicy,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self { storage_timeout: Duration::from_secs(5), read_retry: ReadRetryPolicy::default() }
    }
}

impl From<&PipelineConfig> for PipelineSettings {
    fn from(config: &PipelineConfig) -> Self {
        Self {
            storage_timeout: Duration::from_millis(config.storage_timeout_ms),
            read_retry: ReadRetryPolicy {
                max_attempts: config.read_retry_attempts,
                base_delay: Duration::from_millis(config.read_retry_base_delay_ms),
                max_delay: Duration::from_millis(config.read_retry_max_delay_ms),
            },
        }
    }
}

#[derive(Clone)]
pub struct LeadPipeline {
    history: Arc<dyn LeadHistoryStore>,
    feedback: Arc<dyn FeedbackStore>,
    identity: Arc<dyn IdentityResolver>,
    settings: PipelineSettings,
}

impl LeadPipeline {
    pub fn new(
        history: Arc<dyn LeadHistoryStore>,
        feedback: Arc<dyn FeedbackStore>,
        identity: Arc<dyn IdentityResolver>,
        settings: PipelineSettings,
    ) -> Self {
        Self { history, feedback, identity, settings }
    }

    pub fn settings(&self) -> &PipelineSettings {
        &self.settings
    }

    pub async fn resolve_manager(&self, user_id: UserId) -> Result<ManagerName, PipelineError> {
        const OPERATION: &str = "resolve_manager";
        let found = self
            .settings
            .read_retry
            .run(OPERATION, || self.bounded(OPERATION, self.identity.manager_name(user_id)))
            .await
            .map_err(|error| log_failure(OPERATION, &user_id.to_string(), error))?;

        found.ok_or_else(|| {
            warn!(event_name = "pipeline.identity.unknown", user_id = user_id.0, "manager not found");
            PipelineError::NotFound { entity: "manager", key: user_id.to_string() }
        })
    }

    pub async fn select_current_direct_leads(
        &self,
        manager: &ManagerName,
    ) -> Result<Vec<DirectLead>, PipelineError> {
        const OPERATION: &str = "select_current_direct_leads";
        let leads = self
            .settings
            .read_retry
            .run(OPERATION, || self.bounded(OPERATION, self.history.current_direct_leads(manager)))
            .await
            .map_err(|error| log_failure(OPERATION, manager.as_str(), error))?;

        for lead in leads.iter().filter(|lead| lead.has_malformed_date()) {
            warn!(
                event_name = "pipeline.payload.malformed",
                operation = OPERATION,
                lead_id = lead.id.0,
                value = lead.preferred_date.as_deref().unwrap_or_default(),
                "preferredDate could not be parsed; appointment date left empty"
            );
        }
        info!(
            event_name = "pipeline.direct.selected",
            manager = %manager,
            count = leads.len(),
            "selected current direct leads"
        );
        Ok(leads)
    }

    pub async fn select_current_follow_up_leads(
        &self,
        manager: &ManagerName,
    ) -> Result<Vec<FollowUpLead>, PipelineError> {
        const OPERATION: &str = "select_current_follow_up_leads";
        let leads = self
            .settings
            .read_retry
            .run(OPERATION, || {
                self.bounded(OPERATION, self.feedback.current_follow_up_leads(manager))
            })
            .await
            .map_err(|error| log_failure(OPERATION, manager.as_str(), error))?;

        for lead in leads.iter().filter(|lead| lead.has_malformed_date()) {
            warn!(
                event_name = "pipeline.payload.malformed",
                operation = OPERATION,
                lead_id = lead.id.0,
                value = lead.preferred_date.as_deref().unwrap_or_default(),
                "preferredDate could not be parsed; appointment date left empty"
            );
        }
        info!(
            event_name = "pipeline.follow_up.selected",
            manager = %manager,
            count = leads.len(),
            "selected current follow-up leads"
        );
        Ok(leads)
    }

    pub async fn submit_direct_feedback(
        &self,
        submission: FeedbackSubmission,
    ) -> Result<SubmissionReceipt, PipelineError> {
        self.submit(Workflow::Direct, submission).await
    }

    pub async fn submit_follow_up_feedback(
        &self,
        submission: FeedbackSubmission,
    ) -> Result<SubmissionReceipt, PipelineError> {
        self.submit(Workflow::FollowUp, submission).await
    }

    async fn submit(
        &self,
        workflow: Workflow,
        submission: FeedbackSubmission,
    ) -> Result<SubmissionReceipt, PipelineError> {
        let operation = match workflow {
            Workflow::Direct => "submit_direct_feedback",
            Workflow::FollowUp => "submit_follow_up_feedback",
        };

        let submission = submission.validate().map_err(|error| {
            warn!(event_name = "pipeline.submit.rejected", operation, error = %error, "invalid submission");
            error
        })?;
        let lead_id = submission.lead_id;

        // Single attempt: a retried write could record the feedback twice.
        let feedback_id = match workflow {
            Workflow::Direct => {
                self.bounded(operation, self.feedback.record_direct_feedback(&submission)).await
            }
            Workflow::FollowUp => {
                self.bounded(operation, self.feedback.record_follow_up_feedback(&submission)).await
            }
        }
        .map_err(|error| log_failure(operation, &lead_id.to_string(), error))?;

        info!(
            event_name = "pipeline.submit.recorded",
            operation,
            lead_id,
            feedback_id = feedback_id.0,
            manager_id = submission.manager_id,
            "feedback recorded and lead retired"
        );
        Ok(SubmissionReceipt { feedback_id, lead_id, workflow })
    }

    async fn bounded<T>(
        &self,
        operation: &'static str,
        call: impl Future<Output = Result<T, StoreError>>,
    ) -> Result<T, PipelineError> {
        match tokio::time::timeout(self.settings.storage_timeout, call).await {
            Ok(result) => result.map_err(|error| PipelineError::from_store(operation, error)),
            Err(_) => Err(PipelineError::StorageTimeout { operation }),
        }
    }
}

fn log_failure(operation: &'static str, subject: &str, error: PipelineError) -> PipelineError {
    match &error {
        PipelineError::StorageUnavailable { .. } | PipelineError::StorageTimeout { .. } => {
            error!(
                event_name = "pipeline.storage.failed",
                operation,
                subject,
                error = %error,
                "storage failure"
            );
        }
        PipelineError::Conflict { .. }
        | PipelineError::NotFound { .. }
        | PipelineError::Validation(_) => {
            warn!(event_name = "pipeline.request.refused", operation, subject, error = %error, "request refused");
        }
        PipelineError::MalformedPayload { .. } => {}
    }
    error
}
