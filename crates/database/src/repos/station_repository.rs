//! Repository for the police station directory.

use sqlx::{Row, SqlitePool};

use crate::entities::station::{NewStation, PoliceStation};
use crate::types::StoreResult;

#[derive(Clone)]
pub struct StationRepository {
    pool: SqlitePool,
}

#[derive(Debug, Clone, Default)]
pub struct StationQuery {
    pub state: Option<String>,
    pub district: Option<String>,
    /// Case-insensitive substring match on name and address.
    pub text: Option<String>,
    pub limit: i64,
}

impl StationRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn insert(&self, station: &NewStation) -> StoreResult<PoliceStation> {
        let result = sqlx::query(
            "INSERT INTO police_stations (name, state, district, address, phone) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&station.name)
        .bind(&station.state)
        .bind(&station.district)
        .bind(&station.address)
        .bind(&station.phone)
        .execute(&self.pool)
        .await?;

        Ok(PoliceStation {
            id: result.last_insert_rowid(),
            name: station.name.clone(),
            state: station.state.clone(),
            district: station.district.clone(),
            address: station.address.clone(),
            phone: station.phone.clone(),
        })
    }

    pub async fn search(&self, query: &StationQuery) -> StoreResult<Vec<PoliceStation>> {
        let limit = if query.limit <= 0 { 50 } else { query.limit.min(200) };
        let text = query.text.as_ref().map(|t| format!("%{}%", t.to_lowercase()));

        let rows = sqlx::query(
            "SELECT id, name, state, district, address, phone
             FROM police_stations
             WHERE (? IS NULL OR state = ?)
               AND (? IS NULL OR district = ?)
               AND (? IS NULL OR lower(name) LIKE ? OR lower(address) LIKE ?)
             ORDER BY state, district, name
             LIMIT ?",
        )
        .bind(&query.state)
        .bind(&query.state)
        .bind(&query.district)
        .bind(&query.district)
        .bind(&text)
        .bind(&text)
        .bind(&text)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(map_station).collect()
    }

    pub async fn count(&self) -> StoreResult<i64> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM police_stations")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}

fn map_station(row: &sqlx::sqlite::SqliteRow) -> StoreResult<PoliceStation> {
    Ok(PoliceStation {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        state: row.try_get("state")?,
        district: row.try_get("district")?,
        address: row.try_get("address")?,
        phone: row.try_get("phone")?,
    })
}
