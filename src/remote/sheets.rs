use crate::config::{Config, SHEETS_API_BASE};
use crate::error::{IsRetryable, TransitError};
use crate::remote::oauth::SheetsCredential;
use crate::types::Passenger;

use backon::{ExponentialBuilder, Retryable};
use chrono::{DateTime, Utc};
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use reqwest::StatusCode;
use serde_json::{Value, json};
use std::num::NonZeroU32;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::warn;
use url::Url;

/// Positional column contract of the worksheet. Rows start at row 2; the
/// first row is the header.
pub const SHEET_COLUMNS: [&str; 6] = [
    "name",
    "cedula",
    "gerencia",
    "qr_code",
    "created_at",
    "updated_at",
];

/// Write calls against the values API are rate limited per minute.
const WRITE_QUOTA_PER_MINUTE: u32 = 60;

fn default_retry_policy() -> ExponentialBuilder {
    ExponentialBuilder::default()
        .with_min_delay(Duration::from_secs(1))
        .with_max_delay(Duration::from_secs(3))
        .with_max_times(3)
        .with_jitter()
}

/// Remote spreadsheet adapter. Translates between the local passenger shape
/// and worksheet rows; all calls fail fast with `AuthRequired` when no token
/// or spreadsheet is configured.
pub struct SheetsApi {
    client: reqwest::Client,
    spreadsheet_id: Option<String>,
    sheet_name: String,
    credential: Mutex<SheetsCredential>,
    write_limiter: DefaultDirectRateLimiter,
}

impl SheetsApi {
    pub fn new(cfg: &Config) -> Self {
        let client = reqwest::Client::builder()
            .user_agent("transit-nexus-sheets/1.0")
            .connect_timeout(Duration::from_secs(5))
            .timeout(Duration::from_secs(15))
            .build()
            .expect("FATAL: initialize SheetsApi HTTP client failed");
        let write_limiter = RateLimiter::direct(Quota::per_minute(
            NonZeroU32::new(WRITE_QUOTA_PER_MINUTE).expect("nonzero write quota"),
        ));

        Self {
            client,
            spreadsheet_id: cfg.sheets.spreadsheet_id.clone(),
            sheet_name: cfg.sheets.sheet_name.clone(),
            credential: Mutex::new(SheetsCredential::from_config(&cfg.sheets)),
            write_limiter,
        }
    }

    pub async fn is_authenticated(&self) -> bool {
        self.credential.lock().await.token_is_fresh()
    }

    /// Inject an access token obtained out of band (the operator's OAuth
    /// consent happens outside this service).
    pub async fn set_access_token(&self, token: String, expires_in_secs: Option<i64>) {
        self.credential
            .lock()
            .await
            .set_access_token(token, expires_in_secs);
    }

    pub async fn clear_access_token(&self) {
        self.credential.lock().await.invalidate();
    }

    /// Current bearer token, refreshing through the offline credential when
    /// the cached one is missing or expired.
    async fn bearer_token(&self) -> Result<String, TransitError> {
        let mut cred = self.credential.lock().await;
        if !cred.token_is_fresh() {
            if cred.refresh.is_none() {
                return Err(TransitError::AuthRequired);
            }
            let client = self.client.clone();
            cred.refresh_with(&client).await?;
        }
        cred.access_token.clone().ok_or(TransitError::AuthRequired)
    }

    fn values_url(&self, suffix: &str) -> Result<Url, TransitError> {
        let spreadsheet_id = self
            .spreadsheet_id
            .as_deref()
            .ok_or(TransitError::AuthRequired)?;
        let url = SHEETS_API_BASE.join(&format!(
            "{spreadsheet_id}/values/{}!{suffix}",
            self.sheet_name
        ))?;
        Ok(url)
    }

    /// Pull all data rows and map them into passengers. Returns the mapped
    /// collection plus the number of rows skipped for lacking a cedula.
    pub async fn fetch_passengers(&self) -> Result<(Vec<Passenger>, usize), TransitError> {
        let token = self.bearer_token().await?;
        let url = self.values_url("A2:Z")?;

        let payload: Value = (|| async {
            let resp = self.client.get(url.clone()).bearer_auth(&token).send().await?;
            self.check_status(resp.status()).await?;
            resp.json().await.map_err(Into::into)
        })
        .retry(default_retry_policy())
        .when(|e: &TransitError| e.is_retryable())
        .notify(|err, dur: Duration| {
            warn!("sheet fetch retrying after error {}, sleeping {:?}", err, dur);
        })
        .await?;

        let rows: Vec<Vec<String>> = payload
            .get("values")
            .and_then(Value::as_array)
            .map(|rows| {
                rows.iter()
                    .map(|row| {
                        row.as_array()
                            .map(|cells| {
                                cells
                                    .iter()
                                    .map(|c| c.as_str().unwrap_or_default().to_string())
                                    .collect()
                            })
                            .unwrap_or_default()
                    })
                    .collect()
            })
            .unwrap_or_default();

        let mut passengers = Vec::with_capacity(rows.len());
        let mut skipped = 0usize;
        for (index, row) in rows.iter().enumerate() {
            match map_row(row, index + 2) {
                Some(p) => passengers.push(p),
                None => skipped += 1,
            }
        }
        Ok((passengers, skipped))
    }

    /// Clear all data rows, leaving the header untouched.
    pub async fn clear(&self) -> Result<(), TransitError> {
        let token = self.bearer_token().await?;
        let mut url = self.values_url("A2:Z")?;
        url.set_path(&format!("{}:clear", url.path()));
        self.write_limiter.until_ready().await;

        (|| async {
            let resp = self
                .client
                .post(url.clone())
                .bearer_auth(&token)
                .json(&json!({}))
                .send()
                .await?;
            self.check_status(resp.status()).await
        })
        .retry(default_retry_policy())
        .when(|e: &TransitError| e.is_retryable())
        .notify(|err, dur: Duration| {
            warn!("sheet clear retrying after error {}, sleeping {:?}", err, dur);
        })
        .await
    }

    /// Append one passenger as a worksheet row.
    pub async fn append_passenger(&self, passenger: &Passenger) -> Result<(), TransitError> {
        let token = self.bearer_token().await?;
        let mut url = self.values_url("A2")?;
        url.set_path(&format!("{}:append", url.path()));
        url.set_query(Some(
            "valueInputOption=USER_ENTERED&insertDataOption=INSERT_ROWS",
        ));
        self.write_limiter.until_ready().await;

        let body = json!({
            "majorDimension": "ROWS",
            "values": [passenger_row(passenger)],
        });

        (|| async {
            let resp = self
                .client
                .post(url.clone())
                .bearer_auth(&token)
                .json(&body)
                .send()
                .await?;
            self.check_status(resp.status()).await
        })
        .retry(default_retry_policy())
        .when(|e: &TransitError| e.is_retryable())
        .notify(|err, dur: Duration| {
            warn!("sheet append retrying after error {}, sleeping {:?}", err, dur);
        })
        .await
    }

    /// A 401 invalidates the cached token so the next call re-authenticates.
    async fn check_status(&self, status: StatusCode) -> Result<(), TransitError> {
        if status == StatusCode::UNAUTHORIZED {
            self.credential.lock().await.invalidate();
            return Err(TransitError::AuthRequired);
        }
        if !status.is_success() {
            return Err(TransitError::UpstreamStatus(status));
        }
        Ok(())
    }
}

/// Map one positional row (see `SHEET_COLUMNS`) to a passenger. Rows without
/// a cedula are skipped rather than mapped into an invalid record.
pub fn map_row(row: &[String], row_number: usize) -> Option<Passenger> {
    let cell = |index: usize| {
        row.get(index)
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
    };

    let cedula = cell(1)?.to_string();
    let name = cell(0).unwrap_or_default().to_string();
    let gerencia = cell(2).unwrap_or_default().to_string();
    let qr_code = cell(3)
        .map(str::to_string)
        .unwrap_or_else(|| Passenger::placeholder_qr(&cedula));
    let created_at = cell(4).and_then(parse_timestamp).unwrap_or_else(Utc::now);
    let updated_at = cell(5).and_then(parse_timestamp).unwrap_or(created_at);

    Some(Passenger {
        id: format!("sheet-{row_number}"),
        name,
        cedula,
        gerencia,
        qr_code,
        created_at,
        updated_at,
    })
}

/// One worksheet row in `SHEET_COLUMNS` order.
pub fn passenger_row(passenger: &Passenger) -> Vec<String> {
    vec![
        passenger.name.clone(),
        passenger.cedula.clone(),
        passenger.gerencia.clone(),
        passenger.qr_code.clone(),
        passenger.created_at.to_rfc3339(),
        passenger.updated_at.to_rfc3339(),
    ]
}

fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(cells: &[&str]) -> Vec<String> {
        cells.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn full_row_maps_positionally() {
        let mapped = map_row(
            &row(&[
                "Ana Pérez",
                "100200",
                "Operaciones",
                "data:image/png;base64,AAAA",
                "2024-03-01T12:00:00+00:00",
                "2024-03-02T12:00:00+00:00",
            ]),
            2,
        )
        .unwrap();

        assert_eq!(mapped.id, "sheet-2");
        assert_eq!(mapped.name, "Ana Pérez");
        assert_eq!(mapped.cedula, "100200");
        assert_eq!(mapped.gerencia, "Operaciones");
        assert_eq!(mapped.qr_code, "data:image/png;base64,AAAA");
        assert_eq!(mapped.created_at.to_rfc3339(), "2024-03-01T12:00:00+00:00");
    }

    #[test]
    fn sparse_row_gets_defaults() {
        let mapped = map_row(&row(&["Luis", "300400"]), 7).unwrap();
        assert_eq!(mapped.id, "sheet-7");
        assert_eq!(mapped.qr_code, "QR-300400");
        assert_eq!(mapped.gerencia, "");
        assert_eq!(mapped.updated_at, mapped.created_at);
    }

    #[test]
    fn row_without_cedula_is_skipped() {
        assert!(map_row(&row(&["Nombre sin cedula"]), 3).is_none());
        assert!(map_row(&row(&["Nombre", "   "]), 4).is_none());
    }

    #[test]
    fn passenger_row_matches_column_order() {
        let p = Passenger::new(
            "Ana".to_string(),
            "100".to_string(),
            "TI".to_string(),
            None,
        );
        let cells = passenger_row(&p);
        assert_eq!(cells.len(), SHEET_COLUMNS.len());
        assert_eq!(cells[0], "Ana");
        assert_eq!(cells[1], "100");
        assert_eq!(cells[3], "QR-100");
    }
}
