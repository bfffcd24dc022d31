pub mod config;
pub mod domain;
pub mod errors;
pub mod pipeline;

pub use domain::feedback::{
    FeedbackId, FeedbackRecord, FeedbackSubmission, FollowUpLead, SubmissionReceipt,
    ValidatedSubmission, Workflow, FOLLOW_UP_WITH_PARTNER,
};
pub use domain::lead::{
    DirectLead, DispositionRecord, LeadId, LeadStatus, StructuredDisposition,
    HIGH_SERVICEABILITY_CONFIDENCE, INTENT_INTERESTED,
};
pub use domain::manager::{ManagerName, UserId};
pub use errors::{InterfaceError, PipelineError};
pub use pipeline::{LeadPipeline, PipelineSettings, ReadRetryPolicy};
