//! Repository for complaint data access.

use chrono::Utc;
use sqlx::{Row, SqlitePool};

use crate::entities::complaint::{Complaint, ComplaintStatus, NewComplaint, UpdateComplaint};
use crate::ids::new_public_id;
use crate::types::StoreResult;

#[derive(Clone)]
pub struct ComplaintRepository {
    pool: SqlitePool,
}

impl ComplaintRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn create(&self, new_complaint: &NewComplaint) -> StoreResult<Complaint> {
        let now = Utc::now().to_rfc3339();
        let public_id = new_public_id();

        let result = sqlx::query(
            "INSERT INTO complaints
                 (public_id, user_id, category, description, incident_date, loss_amount_inr, status, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, 'draft', ?, ?)",
        )
        .bind(&public_id)
        .bind(new_complaint.user_id)
        .bind(&new_complaint.category)
        .bind(&new_complaint.description)
        .bind(&new_complaint.incident_date)
        .bind(new_complaint.loss_amount_inr)
        .bind(&now)
        .bind(&now)
        .execute(&self.pool)
        .await?;

        Ok(Complaint {
            id: result.last_insert_rowid(),
            public_id,
            user_id: new_complaint.user_id,
            category: new_complaint.category.clone(),
            description: new_complaint.description.clone(),
            incident_date: new_complaint.incident_date.clone(),
            loss_amount_inr: new_complaint.loss_amount_inr,
            status: ComplaintStatus::Draft,
            created_at: now.clone(),
            updated_at: now,
        })
    }

    pub async fn find_by_public_id(&self, public_id: &str) -> StoreResult<Option<Complaint>> {
        let row = sqlx::query(
            "SELECT id, public_id, user_id, category, description, incident_date, loss_amount_inr,
                    status, created_at, updated_at
             FROM complaints WHERE public_id = ?",
        )
        .bind(public_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|row| map_complaint(&row)).transpose()
    }

    pub async fn find_by_id(&self, id: i64) -> StoreResult<Option<Complaint>> {
        let row = sqlx::query(
            "SELECT id, public_id, user_id, category, description, incident_date, loss_amount_inr,
                    status, created_at, updated_at
             FROM complaints WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|row| map_complaint(&row)).transpose()
    }

    pub async fn list_for_user(&self, user_id: i64) -> StoreResult<Vec<Complaint>> {
        let rows = sqlx::query(
            "SELECT id, public_id, user_id, category, description, incident_date, loss_amount_inr,
                    status, created_at, updated_at
             FROM complaints WHERE user_id = ? ORDER BY updated_at DESC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(map_complaint).collect()
    }

    pub async fn update(&self, id: i64, update: &UpdateComplaint) -> StoreResult<Option<Complaint>> {
        let now = Utc::now().to_rfc3339();

        sqlx::query(
            "UPDATE complaints SET
                 category = COALESCE(?, category),
                 description = COALESCE(?, description),
                 incident_date = COALESCE(?, incident_date),
                 loss_amount_inr = COALESCE(?, loss_amount_inr),
                 status = COALESCE(?, status),
                 updated_at = ?
             WHERE id = ?",
        )
        .bind(&update.category)
        .bind(&update.description)
        .bind(&update.incident_date)
        .bind(update.loss_amount_inr)
        .bind(update.status.map(|s| s.as_str()))
        .bind(&now)
        .bind(id)
        .execute(&self.pool)
        .await?;

        let row = sqlx::query(
            "SELECT id, public_id, user_id, category, description, incident_date, loss_amount_inr,
                    status, created_at, updated_at
             FROM complaints WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|row| map_complaint(&row)).transpose()
    }

    pub async fn delete(&self, id: i64) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM complaints WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

fn map_complaint(row: &sqlx::sqlite::SqliteRow) -> StoreResult<Complaint> {
    let status: String = row.try_get("status")?;
    Ok(Complaint {
        id: row.try_get("id")?,
        public_id: row.try_get("public_id")?,
        user_id: row.try_get("user_id")?,
        category: row.try_get("category")?,
        description: row.try_get("description")?,
        incident_date: row.try_get("incident_date")?,
        loss_amount_inr: row.try_get("loss_amount_inr")?,
        status: ComplaintStatus::from(status.as_str()),
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}
