use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A registered passenger. `cedula` is the unique key within the active set;
/// uniqueness is enforced by the registry at write time, not by the stores.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Passenger {
    pub id: String,
    pub name: String,
    pub cedula: String,
    pub gerencia: String,
    /// Opaque QR payload. A `QR-<cedula>` placeholder is synthesized when the
    /// source (form, import row, sheet row) does not carry one.
    pub qr_code: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Passenger {
    pub fn new(name: String, cedula: String, gerencia: String, qr_code: Option<String>) -> Self {
        let now = Utc::now();
        let qr_code = qr_code.unwrap_or_else(|| Self::placeholder_qr(&cedula));
        Self {
            id: Uuid::new_v4().to_string(),
            name,
            cedula,
            gerencia,
            qr_code,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn placeholder_qr(cedula: &str) -> String {
        format!("QR-{cedula}")
    }
}

/// Input shape for creating or updating a passenger over HTTP.
#[derive(Debug, Clone, Deserialize)]
pub struct PassengerInput {
    pub name: String,
    pub cedula: String,
    #[serde(default)]
    pub gerencia: String,
    #[serde(default)]
    pub qr_code: Option<String>,
}
