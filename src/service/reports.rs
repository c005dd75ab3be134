use crate::error::TransitError;
use crate::remote::supabase::ReportsApi;
use crate::service::pdf;
use crate::service::registry::Registry;
use crate::types::{DailyReport, ReportMeta, StoredReport};

use chrono::{DateTime, NaiveDate, Utc};
use std::sync::Arc;
use tracing::warn;

/// Report generation flow: build the PDF, publish it to the blob store,
/// upsert the metadata row, hand back a time-boxed download URL.
#[derive(Clone)]
pub struct ReportService {
    registry: Registry,
    api: Option<Arc<ReportsApi>>,
    signed_url_ttl_secs: u64,
}

impl ReportService {
    pub fn new(registry: Registry, api: Option<ReportsApi>, signed_url_ttl_secs: u64) -> Self {
        Self {
            registry,
            api: api.map(Arc::new),
            signed_url_ttl_secs,
        }
    }

    fn api(&self) -> Result<&Arc<ReportsApi>, TransitError> {
        self.api.as_ref().ok_or(TransitError::AuthRequired)
    }

    pub async fn create_daily_report(
        &self,
        passenger_id: &str,
        period: &str,
    ) -> Result<DailyReport, TransitError> {
        let day = NaiveDate::parse_from_str(period, "%Y-%m-%d").map_err(|_| {
            TransitError::Validation("period must be formatted YYYY-MM-DD".to_string())
        })?;
        let passenger = self.registry.get_passenger(passenger_id).await?;
        let trips = self
            .registry
            .trips_for_passenger_on(passenger_id, day)
            .await?;

        let bytes = pdf::daily_report_pdf(&passenger, period, &trips)?;
        let size_bytes = bytes.len() as u64;
        let api = self.api()?;

        let storage_key = ReportMeta::storage_key_for(passenger_id, period);
        api.upload_report(&storage_key, bytes).await?;

        let meta = ReportMeta {
            passenger_id: passenger_id.to_string(),
            period: period.to_string(),
            storage_key: storage_key.clone(),
            size_bytes,
        };
        let id = api.upsert_report_meta(&meta).await?;

        // The report row and blob are already durable; a failed signing only
        // costs the caller the immediate download link.
        let download_url = match api.signed_url(&storage_key, self.signed_url_ttl_secs).await {
            Ok(url) => Some(url),
            Err(e) => {
                warn!(error = %e, "signed URL creation failed after upload");
                None
            }
        };

        Ok(DailyReport {
            id,
            period: period.to_string(),
            size_bytes,
            download_url,
        })
    }

    pub async fn list_reports(
        &self,
        passenger_id: &str,
        limit: usize,
        lt_created_at: Option<DateTime<Utc>>,
    ) -> Result<Vec<StoredReport>, TransitError> {
        self.api()?
            .list_reports(passenger_id, limit, lt_created_at)
            .await
    }

    pub async fn download_url(&self, report_id: i64) -> Result<String, TransitError> {
        let api = self.api()?;
        let storage_key = api.report_storage_key(report_id).await?;
        api.signed_url(&storage_key, self.signed_url_ttl_secs).await
    }
}
