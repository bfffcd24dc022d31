use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::lead::{DirectLead, DispositionRecord, LeadId, LeadStatus};
use crate::errors::PipelineError;

pub const FOLLOW_UP_WITH_PARTNER: &str = "Follow Up with Partner";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FeedbackId(pub i64);

impl std::fmt::Display for FeedbackId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedbackRecord {
    pub id: FeedbackId,
    pub manager_id: i64,
    pub customer_mobile: String,
    pub disposition_choice: String,
    pub closure_reason: String,
    pub remark: String,
    pub free_text_note: String,
    pub updated_coordinates: String,
    pub manager_display_name: String,
    pub follow_up_status: LeadStatus,
    pub created_at: DateTime<Utc>,
}

/// A lead a manager deferred to the partner team that still awaits review.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FollowUpLead {
    /// Id of the feedback row; this is what a follow-up submission targets.
    pub id: FeedbackId,
    pub customer_mobile: String,
    pub address: Option<String>,
    pub zone: Option<String>,
    pub coordinates: Option<String>,
    pub appointment_date: Option<NaiveDate>,
    pub final_lead_status: Option<String>,
    pub city: Option<String>,
    pub manager_name: String,
    pub modified_at: Option<String>,
    pub disposition: String,
    pub remark: String,
    pub output_at: DateTime<Utc>,
    #[serde(skip)]
    pub preferred_date: Option<String>,
}

impl FollowUpLead {
    pub fn from_pair(disposition: &DispositionRecord, feedback: &FeedbackRecord) -> Self {
        let lead = DirectLead::from_record(disposition);
        Self {
            id: feedback.id,
            customer_mobile: lead.customer_mobile,
            address: lead.address,
            zone: lead.zone,
            coordinates: lead.coordinates,
            appointment_date: lead.appointment_date,
            final_lead_status: lead.final_lead_status,
            city: lead.city,
            manager_name: lead.manager_name,
            modified_at: lead.modified_at,
            disposition: feedback.disposition_choice.clone(),
            remark: feedback.remark.clone(),
            output_at: feedback.created_at,
            preferred_date: lead.preferred_date,
        }
    }

    pub fn has_malformed_date(&self) -> bool {
        self.preferred_date.is_some() && self.appointment_date.is_none()
    }
}

/// Which status flag a submission retires.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Workflow {
    /// Retires the disposition record (`lead_disposition.status`).
    Direct,
    /// Retires the feedback record (`lead_feedback.follow_up_status`).
    FollowUp,
}

impl Workflow {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Direct => "direct",
            Self::FollowUp => "follow_up",
        }
    }

    pub fn target_entity(self) -> &'static str {
        match self {
            Self::Direct => "disposition",
            Self::FollowUp => "feedback",
        }
    }
}

/// Manager decision as received from the request layer.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedbackSubmission {
    #[serde(default)]
    pub lead_id: Option<i64>,
    pub manager_id: i64,
    pub customer_mobile: String,
    pub disposition_choice: String,
    #[serde(default)]
    pub closure_reason: String,
    #[serde(default)]
    pub remark: String,
    #[serde(default)]
    pub free_text_note: String,
    #[serde(default)]
    pub updated_coordinates: String,
    #[serde(default)]
    pub manager_display_name: String,
}

impl FeedbackSubmission {
    pub fn validate(self) -> Result<ValidatedSubmission, PipelineError> {
        let lead_id = match self.lead_id {
            Some(id) if id > 0 => id,
            Some(id) => {
                return Err(PipelineError::Validation(format!("lead id must be positive, got {id}")))
            }
            None => return Err(PipelineError::Validation("missing lead id in the payload".into())),
        };

        if self.customer_mobile.trim().is_empty() {
            return Err(PipelineError::Validation("customer mobile is required".into()));
        }
        if self.disposition_choice.trim().is_empty() {
            return Err(PipelineError::Validation("disposition choice is required".into()));
        }

        Ok(ValidatedSubmission {
            lead_id,
            manager_id: self.manager_id,
            customer_mobile: self.customer_mobile.trim().to_string(),
            disposition_choice: self.disposition_choice.trim().to_string(),
            closure_reason: self.closure_reason,
            remark: self.remark,
            free_text_note: self.free_text_note,
            updated_coordinates: self.updated_coordinates,
            manager_display_name: self.manager_display_name,
        })
    }
}

/// A submission whose lead id is known to be present and positive.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ValidatedSubmission {
    pub lead_id: i64,
    pub manager_id: i64,
    pub customer_mobile: String,
    pub disposition_choice: String,
    pub closure_reason: String,
    pub remark: String,
    pub free_text_note: String,
    pub updated_coordinates: String,
    pub manager_display_name: String,
}

impl ValidatedSubmission {
    pub fn target(&self) -> LeadId {
        LeadId(self.lead_id)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmissionReceipt {
    pub feedback_id: FeedbackId,
    pub lead_id: i64,
    pub workflow: Workflow,
}
