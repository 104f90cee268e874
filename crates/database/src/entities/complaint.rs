//! Complaint entity definitions

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Complaint {
    #[serde(skip_serializing)]
    pub id: i64,
    pub public_id: String,
    #[serde(skip_serializing)]
    pub user_id: i64,
    pub category: String,
    pub description: String,
    pub incident_date: Option<String>,
    /// Reported monetary loss in whole rupees.
    pub loss_amount_inr: Option<i64>,
    pub status: ComplaintStatus,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone)]
pub struct NewComplaint {
    pub user_id: i64,
    pub category: String,
    pub description: String,
    pub incident_date: Option<String>,
    pub loss_amount_inr: Option<i64>,
}

#[derive(Debug, Clone, Default)]
pub struct UpdateComplaint {
    pub category: Option<String>,
    pub description: Option<String>,
    pub incident_date: Option<String>,
    pub loss_amount_inr: Option<i64>,
    pub status: Option<ComplaintStatus>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComplaintStatus {
    Draft,
    Submitted,
    UnderReview,
    Resolved,
}

impl ComplaintStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ComplaintStatus::Draft => "draft",
            ComplaintStatus::Submitted => "submitted",
            ComplaintStatus::UnderReview => "under_review",
            ComplaintStatus::Resolved => "resolved",
        }
    }

    /// Which statuses a complaint may move to from here. Submission is a
    /// one-way door; review and resolution belong to the authority side.
    pub fn can_transition_to(&self, next: ComplaintStatus) -> bool {
        use ComplaintStatus::*;
        matches!(
            (self, next),
            (Draft, Submitted) | (Submitted, UnderReview) | (UnderReview, Resolved)
        )
    }
}

impl From<&str> for ComplaintStatus {
    fn from(s: &str) -> Self {
        match s {
            "submitted" => ComplaintStatus::Submitted,
            "under_review" => ComplaintStatus::UnderReview,
            "resolved" => ComplaintStatus::Resolved,
            _ => ComplaintStatus::Draft,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_transitions_are_forward_only() {
        use ComplaintStatus::*;
        assert!(Draft.can_transition_to(Submitted));
        assert!(Submitted.can_transition_to(UnderReview));
        assert!(UnderReview.can_transition_to(Resolved));

        assert!(!Submitted.can_transition_to(Draft));
        assert!(!Resolved.can_transition_to(UnderReview));
        assert!(!Draft.can_transition_to(Resolved));
    }
}
