//! Police station directory entities

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PoliceStation {
    pub id: i64,
    pub name: String,
    pub state: String,
    pub district: String,
    pub address: String,
    pub phone: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewStation {
    pub name: String,
    pub state: String,
    pub district: String,
    pub address: String,
    pub phone: Option<String>,
}
