use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Operator,
}

/// Administrative account record. The registry seeds a single default
/// administrator when the user collection is empty.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub name: String,
    pub cedula: String,
    pub role: Role,
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn default_admin() -> Self {
        Self {
            id: "1".to_string(),
            name: "Administrador".to_string(),
            cedula: "12345678".to_string(),
            role: Role::Admin,
            created_at: Utc::now(),
        }
    }
}
