use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TripStatus {
    Started,
    Finished,
}

/// A trip transitions `started -> finished` exactly once; no further
/// transitions are permitted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trip {
    pub id: String,
    pub passenger_id: String,
    pub conductor_id: String,
    pub status: TripStatus,
    #[serde(default)]
    pub origin: Option<String>,
    #[serde(default)]
    pub destination: Option<String>,
    pub started_at: DateTime<Utc>,
    #[serde(default)]
    pub finished_at: Option<DateTime<Utc>>,
}

impl Trip {
    pub fn start(
        passenger_id: String,
        conductor_id: String,
        origin: Option<String>,
        destination: Option<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            passenger_id,
            conductor_id,
            status: TripStatus::Started,
            origin,
            destination,
            started_at: Utc::now(),
            finished_at: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct StartTripInput {
    pub passenger_id: String,
    pub conductor_id: String,
    #[serde(default)]
    pub origin: Option<String>,
    #[serde(default)]
    pub destination: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FinishTripInput {
    pub trip_id: String,
}
