//! Repository for evidence file metadata.

use chrono::Utc;
use sqlx::{Row, SqlitePool};

use crate::entities::evidence::{EvidenceFile, NewEvidenceFile};
use crate::ids::new_public_id;
use crate::types::StoreResult;

#[derive(Clone)]
pub struct EvidenceRepository {
    pool: SqlitePool,
}

impl EvidenceRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn create(&self, new_file: &NewEvidenceFile) -> StoreResult<EvidenceFile> {
        let now = Utc::now().to_rfc3339();
        let public_id = new_public_id();

        let result = sqlx::query(
            "INSERT INTO evidence_files
                 (public_id, complaint_id, file_name, content_type, size_bytes, object_name, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&public_id)
        .bind(new_file.complaint_id)
        .bind(&new_file.file_name)
        .bind(&new_file.content_type)
        .bind(new_file.size_bytes)
        .bind(&new_file.object_name)
        .bind(&now)
        .execute(&self.pool)
        .await?;

        Ok(EvidenceFile {
            id: result.last_insert_rowid(),
            public_id,
            complaint_id: new_file.complaint_id,
            file_name: new_file.file_name.clone(),
            content_type: new_file.content_type.clone(),
            size_bytes: new_file.size_bytes,
            object_name: new_file.object_name.clone(),
            created_at: now,
        })
    }

    pub async fn find_by_public_id(&self, public_id: &str) -> StoreResult<Option<EvidenceFile>> {
        let row = sqlx::query(
            "SELECT id, public_id, complaint_id, file_name, content_type, size_bytes, object_name, created_at
             FROM evidence_files WHERE public_id = ?",
        )
        .bind(public_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|row| map_evidence(&row)).transpose()
    }

    pub async fn list_for_complaint(&self, complaint_id: i64) -> StoreResult<Vec<EvidenceFile>> {
        let rows = sqlx::query(
            "SELECT id, public_id, complaint_id, file_name, content_type, size_bytes, object_name, created_at
             FROM evidence_files WHERE complaint_id = ? ORDER BY id ASC",
        )
        .bind(complaint_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(map_evidence).collect()
    }

    pub async fn delete(&self, id: i64) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM evidence_files WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

fn map_evidence(row: &sqlx::sqlite::SqliteRow) -> StoreResult<EvidenceFile> {
    Ok(EvidenceFile {
        id: row.try_get("id")?,
        public_id: row.try_get("public_id")?,
        complaint_id: row.try_get("complaint_id")?,
        file_name: row.try_get("file_name")?,
        content_type: row.try_get("content_type")?,
        size_bytes: row.try_get("size_bytes")?,
        object_name: row.try_get("object_name")?,
        created_at: row.try_get("created_at")?,
    })
}
