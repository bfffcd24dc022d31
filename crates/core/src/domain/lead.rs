use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::PipelineError;

pub const INTENT_INTERESTED: &str = "Interested";
pub const HIGH_SERVICEABILITY_CONFIDENCE: &str =
    "High Confidence (more than 2 points present inside 100 mtrs circle)";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LeadId(pub i64);

impl std::fmt::Display for LeadId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Review state shared by the direct and follow-up workflows.
///
/// The only legal transition is `Unprocessed -> Processed`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LeadStatus {
    Unprocessed,
    Processed,
}

impl LeadStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Unprocessed => "unprocessed",
            Self::Processed => "processed",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "unprocessed" => Some(Self::Unprocessed),
            "processed" => Some(Self::Processed),
            _ => None,
        }
    }
}

/// One disposition event for a customer, as stored in the lead history.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispositionRecord {
    pub id: LeadId,
    pub customer_mobile: String,
    pub customer_name: Option<String>,
    pub city: Option<String>,
    pub address: Option<String>,
    pub zone: Option<String>,
    pub coordinates: Option<String>,
    /// Raw JSON payload; see [`StructuredDisposition::parse`].
    pub structured_disposition: Option<String>,
    pub manager_name: String,
    pub status: LeadStatus,
    pub installation_status: i64,
    pub final_lead_status: Option<String>,
    pub modified_at: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl DispositionRecord {
    pub fn structured(&self) -> StructuredDisposition {
        self.structured_disposition
            .as_deref()
            .map(StructuredDisposition::parse)
            .unwrap_or_default()
    }
}

/// The fields of the semi-structured disposition payload the pipeline reads.
///
/// Each field is independent: a non-string or missing value only blanks
/// that field, and unparseable JSON blanks all of them.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct StructuredDisposition {
    pub customer_intent: Option<String>,
    pub preferred_date: Option<String>,
    pub serviceability_confidence: Option<String>,
}

impl StructuredDisposition {
    pub fn parse(raw: &str) -> Self {
        let Ok(Value::Object(map)) = serde_json::from_str::<Value>(raw) else {
            return Self::default();
        };
        let text = |key: &str| map.get(key).and_then(Value::as_str).map(str::to_string);

        Self {
            customer_intent: text("customerIntent"),
            preferred_date: text("preferredDate"),
            serviceability_confidence: text("serviceabilityConfidence"),
        }
    }
}

/// Parses the leading `YYYY-MM-DD` of a preferred-date value. Anything after
/// the date (a time component, say) is ignored.
pub fn parse_appointment_date(raw: &str) -> Result<NaiveDate, PipelineError> {
    NaiveDate::parse_and_remainder(raw.trim(), "%Y-%m-%d").map(|(date, _)| date).map_err(|_| {
        PipelineError::MalformedPayload { field: "preferredDate", value: raw.to_string() }
    })
}

/// A current, eligible lead awaiting a manager decision.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectLead {
    pub id: LeadId,
    pub customer_mobile: String,
    pub city: Option<String>,
    pub address: Option<String>,
    pub modified_at: Option<String>,
    pub zone: Option<String>,
    pub coordinates: Option<String>,
    pub final_lead_status: Option<String>,
    pub manager_name: String,
    pub customer_name: Option<String>,
    pub output_at: DateTime<Utc>,
    #[serde(skip)]
    pub preferred_date: Option<String>,
    pub appointment_date: Option<NaiveDate>,
}

impl DirectLead {
    pub fn from_record(record: &DispositionRecord) -> Self {
        let preferred_date = record.structured().preferred_date;
        Self {
            id: record.id,
            customer_mobile: record.customer_mobile.clone(),
            city: record.city.clone(),
            address: record.address.clone(),
            modified_at: record.modified_at.clone(),
            zone: record.zone.clone(),
            coordinates: record.coordinates.clone(),
            final_lead_status: record.final_lead_status.clone(),
            manager_name: record.manager_name.clone(),
            customer_name: record.customer_name.clone(),
            output_at: record.created_at,
            appointment_date: preferred_date.as_deref().and_then(|raw| parse_appointment_date(raw).ok()),
            preferred_date,
        }
    }

    /// True when a preferred date was supplied but could not be read.
    pub fn has_malformed_date(&self) -> bool {
        self.preferred_date.is_some() && self.appointment_date.is_none()
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::{parse_appointment_date, LeadStatus, StructuredDisposition};
    use crate::errors::PipelineError;

    #[test]
    fn structured_disposition_reads_known_fields() {
        let parsed = StructuredDisposition::parse(
            r#"{"customerIntent":"Interested","preferredDate":"2024-05-10","serviceabilityConfidence":"Low"}"#,
        );

        assert_eq!(parsed.customer_intent.as_deref(), Some("Interested"));
        assert_eq!(parsed.preferred_date.as_deref(), Some("2024-05-10"));
        assert_eq!(parsed.serviceability_confidence.as_deref(), Some("Low"));
    }

    #[test]
    fn structured_disposition_degrades_on_malformed_json() {
        assert_eq!(StructuredDisposition::parse("{not json"), StructuredDisposition::default());
        assert_eq!(StructuredDisposition::parse("[1, 2]"), StructuredDisposition::default());
    }

    #[test]
    fn non_string_fields_are_blanked_individually() {
        let parsed =
            StructuredDisposition::parse(r#"{"customerIntent":"Interested","preferredDate":20240510}"#);

        assert_eq!(parsed.customer_intent.as_deref(), Some("Interested"));
        assert_eq!(parsed.preferred_date, None);
    }

    #[test]
    fn appointment_date_accepts_trailing_time() {
        let expected = NaiveDate::from_ymd_opt(2024, 5, 10);
        assert_eq!(parse_appointment_date("2024-05-10").ok(), expected);
        assert_eq!(parse_appointment_date("2024-05-10 09:30:00").ok(), expected);
    }

    #[test]
    fn appointment_date_rejects_other_formats() {
        let error = parse_appointment_date("10/05/2024").expect_err("should not parse");
        assert!(matches!(error, PipelineError::MalformedPayload { field: "preferredDate", .. }));
        assert!(parse_appointment_date("").is_err());
    }

    #[test]
    fn lead_status_uses_storage_spelling() {
        assert_eq!(LeadStatus::Unprocessed.as_str(), "unprocessed");
        assert_eq!(LeadStatus::parse("processed"), Some(LeadStatus::Processed));
        assert_eq!(LeadStatus::parse("PROCESSED"), None);
    }
}
