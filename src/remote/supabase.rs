use crate::config::{Config, SIGNED_URL_TTL_MAX_SECS, SIGNED_URL_TTL_MIN_SECS};
use crate::error::{IsRetryable, TransitError};
use crate::types::{ReportMeta, StoredReport};

use backon::{ExponentialBuilder, Retryable};
use chrono::{DateTime, Utc};
use reqwest::StatusCode;
use serde_json::{Value, json};
use std::time::Duration;
use tracing::warn;
use url::Url;

fn default_retry_policy() -> ExponentialBuilder {
    ExponentialBuilder::default()
        .with_min_delay(Duration::from_secs(1))
        .with_max_delay(Duration::from_secs(3))
        .with_max_times(3)
        .with_jitter()
}

/// Clamp a requested signed-URL validity into the allowed window.
pub fn clamp_signed_url_ttl(secs: u64) -> u64 {
    secs.clamp(SIGNED_URL_TTL_MIN_SECS, SIGNED_URL_TTL_MAX_SECS)
}

/// Remote relational adapter: report metadata through a PostgREST-style API
/// plus the companion blob store with signed-URL retrieval.
pub struct ReportsApi {
    client: reqwest::Client,
    base: Url,
    service_key: String,
}

impl ReportsApi {
    /// `None` when the relational backend is not configured; callers treat
    /// that as `AuthRequired` at the point of use.
    pub fn from_config(cfg: &Config) -> Option<Self> {
        let base = cfg.supabase.url.clone()?;
        let service_key = cfg.supabase.service_key.clone()?;
        let client = reqwest::Client::builder()
            .user_agent("transit-nexus-reports/1.0")
            .connect_timeout(Duration::from_secs(5))
            .timeout(Duration::from_secs(30))
            .build()
            .expect("FATAL: initialize ReportsApi HTTP client failed");
        Some(Self {
            client,
            base,
            service_key,
        })
    }

    fn endpoint(&self, path: &str) -> Result<Url, TransitError> {
        self.base.join(path).map_err(Into::into)
    }

    fn check_status(status: StatusCode) -> Result<(), TransitError> {
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(TransitError::AuthRequired);
        }
        if !status.is_success() {
            return Err(TransitError::UpstreamStatus(status));
        }
        Ok(())
    }

    /// Upsert one report row on the `(passenger_id, period)` conflict key.
    /// Returns the row id.
    pub async fn upsert_report_meta(&self, meta: &ReportMeta) -> Result<i64, TransitError> {
        let url = self.endpoint("rest/v1/reports?on_conflict=passenger_id,period")?;

        let rows: Vec<Value> = (|| async {
            let resp = self
                .client
                .post(url.clone())
                .header("apikey", &self.service_key)
                .bearer_auth(&self.service_key)
                .header("Prefer", "resolution=merge-duplicates,return=representation")
                .json(meta)
                .send()
                .await?;
            Self::check_status(resp.status())?;
            resp.json().await.map_err(Into::into)
        })
        .retry(default_retry_policy())
        .when(|e: &TransitError| e.is_retryable())
        .notify(|err, dur: Duration| {
            warn!("report upsert retrying after error {}, sleeping {:?}", err, dur);
        })
        .await?;

        rows.first()
            .and_then(|row| row.get("id"))
            .and_then(Value::as_i64)
            .ok_or_else(|| {
                TransitError::Validation("report upsert returned no row id".to_string())
            })
    }

    pub async fn list_reports(
        &self,
        passenger_id: &str,
        limit: usize,
        lt_created_at: Option<DateTime<Utc>>,
    ) -> Result<Vec<StoredReport>, TransitError> {
        let mut url = self.endpoint("rest/v1/reports")?;
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("passenger_id", &format!("eq.{passenger_id}"));
            query.append_pair("order", "created_at.desc");
            query.append_pair("limit", &limit.to_string());
            if let Some(ts) = lt_created_at {
                query.append_pair("created_at", &format!("lt.{}", ts.to_rfc3339()));
            }
        }

        let resp = self
            .client
            .get(url)
            .header("apikey", &self.service_key)
            .bearer_auth(&self.service_key)
            .send()
            .await?;
        Self::check_status(resp.status())?;
        resp.json().await.map_err(Into::into)
    }

    pub async fn report_storage_key(&self, report_id: i64) -> Result<String, TransitError> {
        let mut url = self.endpoint("rest/v1/reports")?;
        url.query_pairs_mut()
            .append_pair("id", &format!("eq.{report_id}"))
            .append_pair("select", "storage_key");

        let resp = self
            .client
            .get(url)
            .header("apikey", &self.service_key)
            .bearer_auth(&self.service_key)
            .send()
            .await?;
        Self::check_status(resp.status())?;
        let rows: Vec<Value> = resp.json().await?;
        rows.first()
            .and_then(|row| row.get("storage_key"))
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or(TransitError::NotFound("report"))
    }

    /// Upload (or replace) one PDF in the reports bucket.
    pub async fn upload_report(&self, storage_key: &str, bytes: Vec<u8>) -> Result<(), TransitError> {
        let url = self.endpoint(&format!("storage/v1/object/{storage_key}"))?;

        let resp = self
            .client
            .post(url)
            .header("apikey", &self.service_key)
            .bearer_auth(&self.service_key)
            .header("x-upsert", "true")
            .header("Content-Type", "application/pdf")
            .body(bytes)
            .send()
            .await?;
        Self::check_status(resp.status())
    }

    /// Create a time-boxed signed download URL for a stored object.
    pub async fn signed_url(&self, storage_key: &str, ttl_secs: u64) -> Result<String, TransitError> {
        let url = self.endpoint(&format!("storage/v1/object/sign/{storage_key}"))?;
        let ttl = clamp_signed_url_ttl(ttl_secs);

        let resp = self
            .client
            .post(url)
            .header("apikey", &self.service_key)
            .bearer_auth(&self.service_key)
            .json(&json!({ "expiresIn": ttl }))
            .send()
            .await?;
        Self::check_status(resp.status())?;

        let payload: Value = resp.json().await?;
        let signed_path = payload
            .get("signedURL")
            .and_then(Value::as_str)
            .ok_or_else(|| {
                TransitError::Validation("sign response missing signedURL".to_string())
            })?;
        let full = self
            .base
            .join(&format!("storage/v1{signed_path}"))?;
        Ok(full.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ttl_is_clamped_to_the_allowed_window() {
        assert_eq!(clamp_signed_url_ttl(0), 600);
        assert_eq!(clamp_signed_url_ttl(600), 600);
        assert_eq!(clamp_signed_url_ttl(1800), 1800);
        assert_eq!(clamp_signed_url_ttl(86400), 3600);
    }
}
