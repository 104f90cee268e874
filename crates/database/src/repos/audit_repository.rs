//! Repository for risk audit runs.

use chrono::Utc;
use sqlx::{Row, SqlitePool};

use crate::entities::audit::AuditRun;
use crate::types::StoreResult;

#[derive(Clone)]
pub struct AuditRepository {
    pool: SqlitePool,
}

impl AuditRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn insert(
        &self,
        user_id: i64,
        score: i64,
        risk_band: &str,
        answers: &str,
    ) -> StoreResult<AuditRun> {
        let now = Utc::now().to_rfc3339();
        let result = sqlx::query(
            "INSERT INTO audit_runs (user_id, score, risk_band, answers, created_at) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(user_id)
        .bind(score)
        .bind(risk_band)
        .bind(answers)
        .bind(&now)
        .execute(&self.pool)
        .await?;

        Ok(AuditRun {
            id: result.last_insert_rowid(),
            user_id,
            score,
            risk_band: risk_band.to_string(),
            answers: answers.to_string(),
            created_at: now,
        })
    }

    pub async fn list_for_user(&self, user_id: i64) -> StoreResult<Vec<AuditRun>> {
        let rows = sqlx::query(
            "SELECT id, user_id, score, risk_band, answers, created_at
             FROM audit_runs WHERE user_id = ? ORDER BY id DESC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| {
                Ok(AuditRun {
                    id: row.try_get("id")?,
                    user_id: row.try_get("user_id")?,
                    score: row.try_get("score")?,
                    risk_band: row.try_get("risk_band")?,
                    answers: row.try_get("answers")?,
                    created_at: row.try_get("created_at")?,
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{memory_pool, seed_user};

    #[tokio::test]
    async fn records_runs_latest_first() {
        let pool = memory_pool().await;
        let user_id = seed_user(&pool, "Divya").await;
        let repo = AuditRepository::new(pool);

        repo.insert(user_id, 40, "high", "{}").await.unwrap();
        repo.insert(user_id, 85, "low", "{}").await.unwrap();

        let runs = repo.list_for_user(user_id).await.unwrap();
        assert_eq!(runs.len(), 2);
        assert_eq!(runs[0].risk_band, "low");
        assert_eq!(runs[1].score, 40);
    }
}
