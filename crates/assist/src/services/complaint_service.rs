//! Complaint lifecycle: drafting, submission and status tracking.

use chrono::NaiveDate;

use cybermitra_database::{
    Complaint, ComplaintRepository, ComplaintStatus, NewComplaint, UpdateComplaint,
};

use crate::types::{AssistError, AssistResult};

const MAX_DESCRIPTION_CHARS: usize = 5_000;

#[derive(Debug, Clone)]
pub struct NewComplaintInput {
    pub category: String,
    pub description: String,
    pub incident_date: Option<String>,
    pub loss_amount_inr: Option<i64>,
}

#[derive(Debug, Clone, Default)]
pub struct UpdateComplaintInput {
    pub category: Option<String>,
    pub description: Option<String>,
    pub incident_date: Option<String>,
    pub loss_amount_inr: Option<i64>,
    pub status: Option<ComplaintStatus>,
}

pub struct ComplaintService {
    complaints: ComplaintRepository,
}

impl ComplaintService {
    pub fn new(complaints: ComplaintRepository) -> Self {
        Self { complaints }
    }

    pub async fn create(&self, user_id: i64, input: NewComplaintInput) -> AssistResult<Complaint> {
        validate_category(&input.category)?;
        validate_description(&input.description)?;
        validate_incident_date(input.incident_date.as_deref())?;
        validate_loss(input.loss_amount_inr)?;

        Ok(self
            .complaints
            .create(&NewComplaint {
                user_id,
                category: input.category.trim().to_string(),
                description: input.description.trim().to_string(),
                incident_date: input.incident_date,
                loss_amount_inr: input.loss_amount_inr,
            })
            .await?)
    }

    pub async fn list(&self, user_id: i64) -> AssistResult<Vec<Complaint>> {
        Ok(self.complaints.list_for_user(user_id).await?)
    }

    pub async fn get(&self, user_id: i64, public_id: &str) -> AssistResult<Complaint> {
        self.owned(user_id, public_id).await
    }

    /// Field edits are only allowed while the complaint is a draft;
    /// after submission only forward status moves remain.
    pub async fn update(
        &self,
        user_id: i64,
        public_id: &str,
        input: UpdateComplaintInput,
    ) -> AssistResult<Complaint> {
        let complaint = self.owned(user_id, public_id).await?;

        let edits_fields = input.category.is_some()
            || input.description.is_some()
            || input.incident_date.is_some()
            || input.loss_amount_inr.is_some();
        if edits_fields && complaint.status != ComplaintStatus::Draft {
            return Err(AssistError::Conflict(
                "a submitted complaint can no longer be edited".into(),
            ));
        }

        if let Some(category) = &input.category {
            validate_category(category)?;
        }
        if let Some(description) = &input.description {
            validate_description(description)?;
        }
        validate_incident_date(input.incident_date.as_deref())?;
        validate_loss(input.loss_amount_inr)?;

        if let Some(next) = input.status {
            if !complaint.status.can_transition_to(next) {
                return Err(AssistError::Conflict(format!(
                    "cannot move a {} complaint to {}",
                    complaint.status.as_str(),
                    next.as_str()
                )));
            }
        }

        self.complaints
            .update(
                complaint.id,
                &UpdateComplaint {
                    category: input.category,
                    description: input.description,
                    incident_date: input.incident_date,
                    loss_amount_inr: input.loss_amount_inr,
                    status: input.status,
                },
            )
            .await?
            .ok_or(AssistError::NotFound("complaint"))
    }

    /// Only drafts can be withdrawn; a submitted complaint is a record.
    pub async fn delete(&self, user_id: i64, public_id: &str) -> AssistResult<()> {
        let complaint = self.owned(user_id, public_id).await?;
        if complaint.status != ComplaintStatus::Draft {
            return Err(AssistError::Conflict(
                "a submitted complaint cannot be deleted".into(),
            ));
        }
        self.complaints.delete(complaint.id).await?;
        Ok(())
    }

    pub(crate) async fn owned(&self, user_id: i64, public_id: &str) -> AssistResult<Complaint> {
        let complaint = self
            .complaints
            .find_by_public_id(public_id)
            .await?
            .ok_or(AssistError::NotFound("complaint"))?;
        if complaint.user_id != user_id {
            return Err(AssistError::AccessDenied("complaint belongs to another user"));
        }
        Ok(complaint)
    }
}

fn validate_category(category: &str) -> AssistResult<()> {
    let category = category.trim();
    if category.is_empty() || category.len() > 80 {
        return Err(AssistError::invalid("category must be 1-80 characters"));
    }
    Ok(())
}

fn validate_description(description: &str) -> AssistResult<()> {
    let description = description.trim();
    if description.is_empty() {
        return Err(AssistError::invalid("description must not be empty"));
    }
    if description.chars().count() > MAX_DESCRIPTION_CHARS {
        return Err(AssistError::invalid("description too long"));
    }
    Ok(())
}

fn validate_incident_date(date: Option<&str>) -> AssistResult<()> {
    if let Some(date) = date {
        NaiveDate::parse_from_str(date, "%Y-%m-%d")
            .map_err(|_| AssistError::invalid("incident_date must be YYYY-MM-DD"))?;
    }
    Ok(())
}

fn validate_loss(loss: Option<i64>) -> AssistResult<()> {
    if let Some(loss) = loss {
        if loss < 0 {
            return Err(AssistError::invalid("loss amount cannot be negative"));
        }
    }
    Ok(())
}
