use crate::config::Config;
use crate::handlers::{conductors, health, passengers, reports, sync as sync_routes, trips};
use crate::remote::SheetsApi;
use crate::service::{Registry, ReportService, SyncService};
use crate::store::CollectionStorage;

use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Serialize;
use serde_json::{Value, json};
use std::sync::Arc;

/// Shared application state: one handle per collaborating service,
/// constructed once per session so tests can build isolated instances.
#[derive(Clone)]
pub struct TransitState {
    pub registry: Registry,
    pub sync: SyncService,
    pub reports: ReportService,
    pub sheets: Arc<SheetsApi>,
    pub db: CollectionStorage,
    pub api_key: Arc<str>,
    pub has_database_url: bool,
}

impl TransitState {
    pub fn new(
        registry: Registry,
        sync: SyncService,
        reports: ReportService,
        sheets: Arc<SheetsApi>,
        db: CollectionStorage,
        cfg: &Config,
    ) -> Self {
        Self {
            registry,
            sync,
            reports,
            sheets,
            db,
            api_key: Arc::from(cfg.api_key.as_str()),
            has_database_url: !cfg.database_url.is_empty(),
        }
    }
}

/// Success envelope; the error side lives in `TransitError::into_response`.
pub fn ok_envelope<T: Serialize>(data: T) -> Json<Value> {
    Json(json!({ "ok": true, "data": data }))
}

pub fn transit_router(state: TransitState) -> Router {
    Router::new()
        .route("/health", get(health::health))
        .route("/db-check", get(health::db_check))
        .route(
            "/passengers",
            get(passengers::list_or_get)
                .post(passengers::create)
                .put(passengers::update)
                .delete(passengers::remove),
        )
        .route("/passengers/import", post(passengers::import))
        .route(
            "/conductors",
            get(conductors::list).post(conductors::create),
        )
        .route("/trips", get(trips::list))
        .route("/trips-start", post(trips::start))
        .route("/trips-finish", post(trips::finish))
        .route("/reports", get(reports::trip_report))
        .route("/reports/list", get(reports::list))
        .route("/reports/daily", post(reports::daily))
        .route("/reports/download", get(reports::download))
        .route("/sync/pull", post(sync_routes::pull))
        .route("/sync/push", post(sync_routes::push))
        .route(
            "/sync/token",
            post(sync_routes::set_token).delete(sync_routes::clear_token),
        )
        .with_state(state)
}
