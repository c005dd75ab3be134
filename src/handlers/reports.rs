use axum::Json;
use axum::extract::{Query, State};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::{Value, json};

use crate::TransitError;
use crate::middleware::RequireKeyAuth;
use crate::router::{TransitState, ok_envelope};

#[derive(Debug, Deserialize)]
pub struct TripReportQuery {
    pub trip_id: String,
}

/// GET /reports?trip_id= serves the joined trip/passenger/conductor row.
pub async fn trip_report(
    State(state): State<TransitState>,
    Query(query): Query<TripReportQuery>,
) -> Result<Json<Value>, TransitError> {
    Ok(ok_envelope(
        state.registry.trip_report(&query.trip_id).await?,
    ))
}

#[derive(Debug, Deserialize)]
pub struct ListReportsQuery {
    pub passenger_id: String,
    #[serde(default = "default_limit")]
    pub limit: usize,
    #[serde(default)]
    pub before: Option<DateTime<Utc>>,
}

fn default_limit() -> usize {
    50
}

pub async fn list(
    State(state): State<TransitState>,
    Query(query): Query<ListReportsQuery>,
) -> Result<Json<Value>, TransitError> {
    Ok(ok_envelope(
        state
            .reports
            .list_reports(&query.passenger_id, query.limit, query.before)
            .await?,
    ))
}

#[derive(Debug, Deserialize)]
pub struct DailyReportInput {
    pub passenger_id: String,
    /// `YYYY-MM-DD`
    pub period: String,
}

pub async fn daily(
    _: RequireKeyAuth,
    State(state): State<TransitState>,
    Json(input): Json<DailyReportInput>,
) -> Result<Json<Value>, TransitError> {
    Ok(ok_envelope(
        state
            .reports
            .create_daily_report(&input.passenger_id, &input.period)
            .await?,
    ))
}

#[derive(Debug, Deserialize)]
pub struct DownloadQuery {
    pub id: i64,
}

pub async fn download(
    State(state): State<TransitState>,
    Query(query): Query<DownloadQuery>,
) -> Result<Json<Value>, TransitError> {
    let url = state.reports.download_url(query.id).await?;
    Ok(ok_envelope(json!({ "url": url })))
}
