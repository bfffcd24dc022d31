//! Storage-independent selection rules for the two lead views.
//!
//! Deduplication always happens before eligibility filtering: a customer
//! whose newest disposition is ineligible has no active lead at all, even if
//! an older disposition would have matched.

use std::collections::HashMap;

use crate::domain::feedback::{FeedbackRecord, FollowUpLead, FOLLOW_UP_WITH_PARTNER};
use crate::domain::lead::{
    DirectLead, DispositionRecord, LeadStatus, HIGH_SERVICEABILITY_CONFIDENCE, INTENT_INTERESTED,
};
use crate::domain::manager::ManagerName;

/// Newest disposition per customer. Equal timestamps resolve to the highest id.
pub fn current_dispositions(records: &[DispositionRecord]) -> Vec<&DispositionRecord> {
    latest_by_customer(records, |r| (&r.customer_mobile, (r.created_at, r.id.0)))
}

/// Newest feedback per customer, same tie-break as dispositions.
pub fn current_feedback(records: &[FeedbackRecord]) -> Vec<&FeedbackRecord> {
    latest_by_customer(records, |r| (&r.customer_mobile, (r.created_at, r.id.0)))
}

fn latest_by_customer<'a, T, K: Ord + Copy>(
    records: &'a [T],
    key: impl Fn(&'a T) -> (&'a String, K),
) -> Vec<&'a T> {
    let mut latest: HashMap<&String, (K, &T)> = HashMap::new();
    for record in records {
        let (customer, rank) = key(record);
        match latest.get(customer) {
            Some((current, _)) if *current >= rank => {}
            _ => {
                latest.insert(customer, (rank, record));
            }
        }
    }
    latest.into_values().map(|(_, record)| record).collect()
}

pub fn is_direct_eligible(record: &DispositionRecord, manager: &ManagerName) -> bool {
    let structured = record.structured();
    structured.customer_intent.as_deref() == Some(INTENT_INTERESTED)
        && record.manager_name == manager.as_str()
        && record.status == LeadStatus::Unprocessed
        && record.installation_status == 0
        && structured.serviceability_confidence.as_deref() == Some(HIGH_SERVICEABILITY_CONFIDENCE)
}

pub fn direct_leads(records: &[DispositionRecord], manager: &ManagerName) -> Vec<DirectLead> {
    let mut current = current_dispositions(records)
        .into_iter()
        .filter(|record| is_direct_eligible(record, manager))
        .collect::<Vec<_>>();
    current.sort_by(|a, b| (b.created_at, b.id.0).cmp(&(a.created_at, a.id.0)));
    current.into_iter().map(DirectLead::from_record).collect()
}

pub fn follow_up_leads(
    dispositions: &[DispositionRecord],
    feedback: &[FeedbackRecord],
    manager: &ManagerName,
) -> Vec<FollowUpLead> {
    let latest_feedback = current_feedback(feedback)
        .into_iter()
        .map(|record| (record.customer_mobile.as_str(), record))
        .collect::<HashMap<_, _>>();

    let mut pairs = current_dispositions(dispositions)
        .into_iter()
        .filter_map(|disposition| {
            latest_feedback
                .get(disposition.customer_mobile.as_str())
                .map(|feedback| (disposition, *feedback))
        })
        .filter(|(disposition, feedback)| {
            feedback.disposition_choice == FOLLOW_UP_WITH_PARTNER
                && disposition.manager_name == manager.as_str()
                && feedback.follow_up_status == LeadStatus::Unprocessed
        })
        .collect::<Vec<_>>();
    pairs.sort_by(|(_, a), (_, b)| (b.created_at, b.id.0).cmp(&(a.created_at, a.id.0)));

    pairs.into_iter().map(|(disposition, feedback)| FollowUpLead::from_pair(disposition, feedback)).collect()
}
