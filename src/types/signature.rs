use base64::Engine;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Opaque auxiliary record: stored and mirrored, never interpreted beyond the
/// well-formedness check on embedded data-URI payloads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Signature {
    pub id: String,
    pub payload: Value,
    pub created_at: DateTime<Utc>,
}

impl Signature {
    pub fn new(payload: Value) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            payload,
            created_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConductorCredential {
    pub id: String,
    pub payload: Value,
    pub created_at: DateTime<Utc>,
}

impl ConductorCredential {
    pub fn new(payload: Value) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            payload,
            created_at: Utc::now(),
        }
    }
}

/// Validate an embedded payload string. Plain strings (e.g. `QR-12345678`)
/// pass through; anything claiming to be a data URI must carry a decodable
/// base64 section. Returns the decoded byte length for data URIs.
pub fn check_embedded_payload(payload: &str) -> Result<Option<usize>, String> {
    if !payload.starts_with("data:") {
        return Ok(None);
    }
    let Some((_, encoded)) = payload.split_once(";base64,") else {
        return Err("data URI payload is not base64-encoded".to_string());
    };
    base64::engine::general_purpose::STANDARD
        .decode(encoded)
        .map(|bytes| Some(bytes.len()))
        .map_err(|e| format!("invalid base64 payload: {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_payload_passes() {
        assert_eq!(check_embedded_payload("QR-12345678"), Ok(None));
    }

    #[test]
    fn data_uri_payload_reports_size() {
        let uri = format!(
            "data:image/png;base64,{}",
            base64::engine::general_purpose::STANDARD.encode([0u8; 16])
        );
        assert_eq!(check_embedded_payload(&uri), Ok(Some(16)));
    }

    #[test]
    fn malformed_data_uri_is_rejected() {
        assert!(check_embedded_payload("data:image/png;base64,@@@").is_err());
        assert!(check_embedded_payload("data:image/png,plain").is_err());
    }
}
