//! Police station directory and emergency helpline panel.

use serde::Serialize;
use tracing::info;

use cybermitra_database::{NewStation, PoliceStation, StationQuery, StationRepository};

use crate::types::AssistResult;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EmergencyContact {
    pub name: &'static str,
    pub number: &'static str,
    pub description: &'static str,
    pub around_the_clock: bool,
}

const EMERGENCY_PANEL: &[EmergencyContact] = &[
    EmergencyContact {
        name: "National Cybercrime Helpline",
        number: "1930",
        description: "Report financial cyber fraud; fastest route to freezing a money trail.",
        around_the_clock: true,
    },
    EmergencyContact {
        name: "Emergency Response",
        number: "112",
        description: "Police, fire and medical emergencies.",
        around_the_clock: true,
    },
    EmergencyContact {
        name: "Women Helpline",
        number: "181",
        description: "Support for women facing harassment, online or offline.",
        around_the_clock: true,
    },
    EmergencyContact {
        name: "Child Helpline",
        number: "1098",
        description: "Assistance for children in distress.",
        around_the_clock: true,
    },
    EmergencyContact {
        name: "Cybercrime Reporting Portal",
        number: "cybercrime.gov.in",
        description: "File and track complaints with the national portal.",
        around_the_clock: true,
    },
];

/// Stations bundled for first-run deployments without an imported
/// directory. Real deployments replace these through the seeding command.
const DEFAULT_STATIONS: &[(&str, &str, &str, &str, &str)] = &[
    (
        "Cyber Crime Police Station, Bandra Kurla Complex",
        "Maharashtra",
        "Mumbai",
        "BKC, Bandra East, Mumbai 400051",
        "022-26504008",
    ),
    (
        "Cyber Crime Police Station, Pune City",
        "Maharashtra",
        "Pune",
        "Shivajinagar, Pune 411005",
        "020-29710097",
    ),
    (
        "Cyber Crime Police Station, Hyderabad",
        "Telangana",
        "Hyderabad",
        "Basheerbagh, Hyderabad 500029",
        "040-27852412",
    ),
    (
        "Cyber Crime Cell, New Delhi",
        "Delhi",
        "New Delhi",
        "Mandir Marg, New Delhi 110001",
        "011-23746694",
    ),
    (
        "CEN Crime Police Station, Bengaluru City",
        "Karnataka",
        "Bengaluru Urban",
        "Infantry Road, Bengaluru 560001",
        "080-22094498",
    ),
];

pub struct DirectoryService {
    stations: StationRepository,
}

impl DirectoryService {
    pub fn new(stations: StationRepository) -> Self {
        Self { stations }
    }

    pub async fn search_stations(&self, query: &StationQuery) -> AssistResult<Vec<PoliceStation>> {
        Ok(self.stations.search(query).await?)
    }

    /// The static helpline panel. No authentication, no persistence.
    pub fn emergency_panel(&self) -> &'static [EmergencyContact] {
        EMERGENCY_PANEL
    }

    /// Populate the directory with the bundled stations if it is empty.
    pub async fn seed_if_empty(&self) -> AssistResult<usize> {
        if self.stations.count().await? > 0 {
            return Ok(0);
        }

        for (name, state, district, address, phone) in DEFAULT_STATIONS {
            self.stations
                .insert(&NewStation {
                    name: (*name).to_string(),
                    state: (*state).to_string(),
                    district: (*district).to_string(),
                    address: (*address).to_string(),
                    phone: Some((*phone).to_string()),
                })
                .await?;
        }
        info!(count = DEFAULT_STATIONS.len(), "seeded police station directory");
        Ok(DEFAULT_STATIONS.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cybermitra_database::run_migrations;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn service() -> DirectoryService {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        run_migrations(&pool).await.unwrap();
        DirectoryService::new(StationRepository::new(pool))
    }

    #[tokio::test]
    async fn seeding_is_idempotent() {
        let service = service().await;
        let first = service.seed_if_empty().await.unwrap();
        assert!(first > 0);
        let second = service.seed_if_empty().await.unwrap();
        assert_eq!(second, 0);
    }

    #[tokio::test]
    async fn seeded_stations_are_searchable() {
        let service = service().await;
        service.seed_if_empty().await.unwrap();

        let hits = service
            .search_stations(&StationQuery {
                state: Some("Telangana".into()),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(hits.len(), 1);
        assert!(hits[0].name.contains("Hyderabad"));
    }

    #[test]
    fn the_panel_leads_with_1930() {
        let panel = EMERGENCY_PANEL;
        assert_eq!(panel[0].number, "1930");
        assert!(panel.iter().any(|c| c.number == "112"));
    }
}
