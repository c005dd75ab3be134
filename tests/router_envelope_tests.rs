use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Request, StatusCode},
};
use serde_json::Value;
use std::sync::Arc;
use tempfile::TempDir;
use tower::ServiceExt;

use transit_nexus::config::Config;
use transit_nexus::remote::{ReportsApi, SheetsApi};
use transit_nexus::router::{TransitState, transit_router};
use transit_nexus::service::{Registry, ReportService, SyncService};
use transit_nexus::store::{CollectionStorage, KvStore, StorageHandle};

const TEST_KEY: &str = "pwd";

async fn spawn_app() -> (Router, TempDir) {
    let dir = tempfile::tempdir().expect("failed to create temp dir");

    let mut cfg = Config::default();
    cfg.api_key = TEST_KEY.to_string();
    cfg.data_dir = dir.path().join("kv");
    cfg.database_url = format!("sqlite:{}", dir.path().join("transit.sqlite").display());

    let kv = KvStore::open(&cfg.data_dir, cfg.kv_quota_bytes).expect("kv open failed");
    let db = CollectionStorage::connect(&cfg.database_url)
        .await
        .expect("db connect failed");
    let storage = StorageHandle::spawn(kv, db.clone())
        .await
        .expect("storage spawn failed");

    let registry = Registry::new(storage);
    registry.ensure_seed_data().await.expect("seed failed");

    let sheets = Arc::new(SheetsApi::new(&cfg));
    let sync = SyncService::spawn(registry.clone(), sheets.clone(), cfg.push_concurrency, None);
    let reports = ReportService::new(
        registry.clone(),
        ReportsApi::from_config(&cfg),
        cfg.supabase.signed_url_ttl_secs,
    );

    let state = TransitState::new(registry, sync, reports, sheets, db, &cfg);
    (transit_router(state), dir)
}

async fn body_json(resp: axum::response::Response) -> Value {
    let bytes = to_bytes(resp.into_body(), usize::MAX)
        .await
        .expect("failed to read response body");
    serde_json::from_slice(&bytes).expect("response body was not JSON")
}

fn get(uri: &str) -> Request<Body> {
    Request::builder()
        .method("GET")
        .uri(uri)
        .body(Body::empty())
        .expect("failed to build request")
}

fn post_json(uri: &str, key: Option<&str>, payload: &Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json");
    if let Some(key) = key {
        builder = builder.header("x-api-key", key);
    }
    builder
        .body(Body::from(payload.to_string()))
        .expect("failed to build request")
}

#[tokio::test]
async fn health_is_open_and_enveloped() {
    let (app, _dir) = spawn_app().await;

    let resp = app.oneshot(get("/health")).await.expect("request failed");
    assert_eq!(resp.status(), StatusCode::OK);
    let body = body_json(resp).await;
    assert_eq!(body["ok"], true);
    assert_eq!(body["has_database_url"], true);
}

#[tokio::test]
async fn db_check_reports_current_time() {
    let (app, _dir) = spawn_app().await;

    let resp = app.oneshot(get("/db-check")).await.expect("request failed");
    assert_eq!(resp.status(), StatusCode::OK);
    let body = body_json(resp).await;
    assert_eq!(body["ok"], true);
    assert!(body["now"].as_str().is_some());
}

#[tokio::test]
async fn mutating_routes_require_the_key() {
    let (app, _dir) = spawn_app().await;
    let payload = serde_json::json!({ "name": "Ana", "cedula": "100" });

    let resp = app
        .clone()
        .oneshot(post_json("/passengers", None, &payload))
        .await
        .expect("request failed");
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    let body = body_json(resp).await;
    assert_eq!(body["ok"], false);
    assert_eq!(body["error"]["code"], "UNAUTHORIZED");

    let resp = app
        .oneshot(post_json("/passengers", Some("wrong-key"), &payload))
        .await
        .expect("request failed");
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn duplicate_cedula_returns_validation_error() {
    let (app, _dir) = spawn_app().await;
    let payload = serde_json::json!({ "name": "Ana", "cedula": "100", "gerencia": "TI" });

    let resp = app
        .clone()
        .oneshot(post_json("/passengers", Some(TEST_KEY), &payload))
        .await
        .expect("request failed");
    assert_eq!(resp.status(), StatusCode::OK);
    let body = body_json(resp).await;
    assert_eq!(body["ok"], true);
    assert_eq!(body["data"]["cedula"], "100");
    assert_eq!(body["data"]["qr_code"], "QR-100");

    let duplicate = serde_json::json!({ "name": "Otra", "cedula": "100" });
    let resp = app
        .clone()
        .oneshot(post_json("/passengers", Some(TEST_KEY), &duplicate))
        .await
        .expect("request failed");
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body = body_json(resp).await;
    assert_eq!(body["ok"], false);
    assert_eq!(body["error"]["code"], "VALIDATION");

    let resp = app.oneshot(get("/passengers")).await.expect("request failed");
    let body = body_json(resp).await;
    assert_eq!(body["data"].as_array().map(Vec::len), Some(1));
}

#[tokio::test]
async fn trip_start_finish_flow() {
    let (app, _dir) = spawn_app().await;

    let passenger = serde_json::json!({ "name": "Ana", "cedula": "100" });
    let resp = app
        .clone()
        .oneshot(post_json("/passengers", Some(TEST_KEY), &passenger))
        .await
        .expect("request failed");
    let passenger_id = body_json(resp).await["data"]["id"]
        .as_str()
        .expect("missing passenger id")
        .to_string();

    let conductor = serde_json::json!({ "name": "Pedro", "license_id": "L-1" });
    let resp = app
        .clone()
        .oneshot(post_json("/conductors", Some(TEST_KEY), &conductor))
        .await
        .expect("request failed");
    let conductor_id = body_json(resp).await["data"]["id"]
        .as_str()
        .expect("missing conductor id")
        .to_string();

    let start = serde_json::json!({
        "passenger_id": passenger_id,
        "conductor_id": conductor_id,
        "origin": "Base",
        "destination": "Planta",
    });
    let resp = app
        .clone()
        .oneshot(post_json("/trips-start", Some(TEST_KEY), &start))
        .await
        .expect("request failed");
    assert_eq!(resp.status(), StatusCode::OK);
    let body = body_json(resp).await;
    assert_eq!(body["data"]["status"], "started");
    let trip_id = body["data"]["id"].as_str().expect("missing trip id").to_string();

    let finish = serde_json::json!({ "trip_id": trip_id });
    let resp = app
        .clone()
        .oneshot(post_json("/trips-finish", Some(TEST_KEY), &finish))
        .await
        .expect("request failed");
    assert_eq!(resp.status(), StatusCode::OK);
    let body = body_json(resp).await;
    assert_eq!(body["data"]["status"], "finished");
    assert!(body["data"]["finished_at"].as_str().is_some());

    // Finishing twice is a validation error.
    let resp = app
        .clone()
        .oneshot(post_json("/trips-finish", Some(TEST_KEY), &finish))
        .await
        .expect("request failed");
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    // The joined report row is served for the finished trip.
    let resp = app
        .oneshot(get(&format!("/reports?trip_id={trip_id}")))
        .await
        .expect("request failed");
    assert_eq!(resp.status(), StatusCode::OK);
    let body = body_json(resp).await;
    assert_eq!(body["data"]["passenger_name"], "Ana");
    assert_eq!(body["data"]["conductor_name"], "Pedro");
}

#[tokio::test]
async fn import_is_idempotent_over_http() {
    let (app, _dir) = spawn_app().await;
    let csv = "Nombre,Cedula,Gerencia\nAna,100,TI\nLuis,200,RRHH\n";

    let import_request = |body: &str| {
        Request::builder()
            .method("POST")
            .uri("/passengers/import")
            .header("x-api-key", TEST_KEY)
            .header("content-type", "text/csv")
            .body(Body::from(body.to_string()))
            .expect("failed to build request")
    };

    let resp = app
        .clone()
        .oneshot(import_request(csv))
        .await
        .expect("request failed");
    assert_eq!(resp.status(), StatusCode::OK);
    let body = body_json(resp).await;
    assert_eq!(body["data"]["imported"], 2);

    let resp = app
        .clone()
        .oneshot(import_request(csv))
        .await
        .expect("request failed");
    let body = body_json(resp).await;
    assert_eq!(body["data"]["imported"], 0);
    assert_eq!(body["data"]["skipped_duplicate"], 2);

    let resp = app.oneshot(get("/passengers")).await.expect("request failed");
    let body = body_json(resp).await;
    assert_eq!(body["data"].as_array().map(Vec::len), Some(2));
}

#[tokio::test]
async fn sync_pull_without_token_fails_fast() {
    let (app, _dir) = spawn_app().await;

    let resp = app
        .oneshot(post_json("/sync/pull", Some(TEST_KEY), &serde_json::json!({})))
        .await
        .expect("request failed");
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    let body = body_json(resp).await;
    assert_eq!(body["error"]["code"], "AUTH_REQUIRED");
}

#[tokio::test]
async fn daily_report_without_backend_fails_fast() {
    let (app, _dir) = spawn_app().await;

    let passenger = serde_json::json!({ "name": "Ana", "cedula": "100" });
    let resp = app
        .clone()
        .oneshot(post_json("/passengers", Some(TEST_KEY), &passenger))
        .await
        .expect("request failed");
    let passenger_id = body_json(resp).await["data"]["id"]
        .as_str()
        .expect("missing passenger id")
        .to_string();

    let payload = serde_json::json!({ "passenger_id": passenger_id, "period": "2024-03-01" });
    let resp = app
        .oneshot(post_json("/reports/daily", Some(TEST_KEY), &payload))
        .await
        .expect("request failed");
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}
