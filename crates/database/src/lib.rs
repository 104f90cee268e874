//! SQLite storage layer for the Cybermitra backend: connection management,
//! migrations, entities and repositories.

pub mod connection;
pub mod entities;
pub mod migrations;
pub mod repos;
pub mod types;

pub use connection::prepare_database;
pub use migrations::run_migrations;

pub use repos::{
    AuditRepository, ChatRepository, ComplaintRepository, EvidenceRepository, StationQuery,
    StationRepository,
};

pub use entities::{
    audit::AuditRun,
    chat::{Chat, ChatMessage, MessageRole, NewChat, NewMessage},
    complaint::{Complaint, ComplaintStatus, NewComplaint, UpdateComplaint},
    evidence::{EvidenceFile, NewEvidenceFile},
    station::{NewStation, PoliceStation},
    user::User,
};

pub use types::{StoreError, StoreResult};

use cybermitra_config::DatabaseConfig;
use sqlx::SqlitePool;

pub mod ids {
    use cuid2::CuidConstructor;
    use once_cell::sync::Lazy;

    static CUID: Lazy<CuidConstructor> = Lazy::new(CuidConstructor::new);

    /// Generate a collision-resistant public identifier.
    pub fn new_public_id() -> String {
        CUID.create_id()
    }
}

/// Connect and bring the schema up to date.
pub async fn initialize_database(config: &DatabaseConfig) -> anyhow::Result<SqlitePool> {
    let pool = prepare_database(config).await?;
    run_migrations(&pool).await?;
    Ok(pool)
}

#[cfg(test)]
pub mod testing {
    use sqlx::SqlitePool;

    /// In-memory database with the full schema, for repository tests.
    ///
    /// A single connection: every pooled connection to `:memory:` would
    /// otherwise see its own empty database.
    pub async fn memory_pool() -> SqlitePool {
        let pool = sqlx::sqlite::SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .expect("in-memory sqlite");
        sqlx::query("PRAGMA foreign_keys = ON")
            .execute(&pool)
            .await
            .unwrap();
        crate::run_migrations(&pool).await.expect("migrations");
        pool
    }

    /// Insert a bare user row and return its id.
    pub async fn seed_user(pool: &SqlitePool, name: &str) -> i64 {
        let now = chrono::Utc::now().to_rfc3339();
        let result = sqlx::query(
            "INSERT INTO users (public_id, name, created_at, updated_at) VALUES (?, ?, ?, ?)",
        )
        .bind(crate::ids::new_public_id())
        .bind(name)
        .bind(&now)
        .bind(&now)
        .execute(pool)
        .await
        .unwrap();
        result.last_insert_rowid()
    }
}
