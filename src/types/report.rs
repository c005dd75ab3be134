use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::trip::TripStatus;

/// One row per passenger per reporting period in the remote `reports` table.
/// Remote uniqueness is enforced via the upsert conflict key
/// `(passenger_id, period)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportMeta {
    pub passenger_id: String,
    /// `YYYY-MM-DD`
    pub period: String,
    /// `reports/<passenger_id>/<period>.pdf`
    pub storage_key: String,
    pub size_bytes: u64,
}

impl ReportMeta {
    pub fn storage_key_for(passenger_id: &str, period: &str) -> String {
        format!("reports/{passenger_id}/{period}.pdf")
    }
}

/// A `reports` row as returned by the remote store.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StoredReport {
    pub id: i64,
    pub passenger_id: String,
    pub period: String,
    pub storage_key: String,
    pub size_bytes: u64,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

/// Joined trip/passenger/conductor view served by the report lookup endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct ReportRow {
    pub trip_id: String,
    pub status: TripStatus,
    pub origin: Option<String>,
    pub destination: Option<String>,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub passenger_id: String,
    pub passenger_name: String,
    pub passenger_doc: String,
    pub conductor_id: String,
    pub conductor_name: String,
    pub conductor_license: Option<String>,
    pub conductor_phone: Option<String>,
}

/// Result of generating and publishing one daily report.
#[derive(Debug, Clone, Serialize)]
pub struct DailyReport {
    pub id: i64,
    pub period: String,
    pub size_bytes: u64,
    pub download_url: Option<String>,
}
