use mimalloc::MiMalloc;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use transit_nexus::config::Config;
use transit_nexus::remote::{ReportsApi, SheetsApi};
use transit_nexus::router::{TransitState, transit_router};
use transit_nexus::service::{Registry, ReportService, SyncService};
use transit_nexus::store::{CollectionStorage, KvStore, StorageHandle};

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    let cfg = Config::from_env()?;

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(cfg.loglevel.clone()));
    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_level(true)
                .with_target(false),
        )
        .init();

    info!(
        database_url = %cfg.database_url,
        data_dir = %cfg.data_dir.display(),
        kv_quota_bytes = cfg.kv_quota_bytes,
        loglevel = %cfg.loglevel,
        sync_interval_secs = cfg.sync_interval_secs,
    );

    let kv = KvStore::open(&cfg.data_dir, cfg.kv_quota_bytes)?;
    let db = CollectionStorage::connect(&cfg.database_url).await?;
    let storage = StorageHandle::spawn(kv, db.clone()).await?;

    let registry = Registry::new(storage);
    registry.ensure_seed_data().await?;

    let sheets = Arc::new(SheetsApi::new(&cfg));
    let auto_pull =
        (cfg.sync_interval_secs > 0).then(|| Duration::from_secs(cfg.sync_interval_secs));
    let sync = SyncService::spawn(
        registry.clone(),
        sheets.clone(),
        cfg.push_concurrency,
        auto_pull,
    );

    let reports_api = ReportsApi::from_config(&cfg);
    if reports_api.is_none() {
        warn!("report backend not configured; report publishing disabled");
    }
    let reports = ReportService::new(
        registry.clone(),
        reports_api,
        cfg.supabase.signed_url_ttl_secs,
    );

    // Build axum router and serve
    let state = TransitState::new(registry, sync, reports, sheets, db, &cfg);
    let app = transit_router(state);

    let listener = TcpListener::bind(&cfg.listen).await?;
    info!("HTTP server listening on {}", cfg.listen);
    axum::serve(listener, app).await?;
    Ok(())
}
