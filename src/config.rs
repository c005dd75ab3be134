//! Runtime configuration, loaded once at startup and passed explicitly to the
//! components that need it. Environment variables use the `TRANSIT_` prefix
//! with `__` separating nested sections, e.g. `TRANSIT_SHEETS__SPREADSHEET_ID`.

use figment::{
    Figment,
    providers::{Env, Serialized},
};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::LazyLock;
use url::Url;

pub static GOOGLE_AUTH_URL: LazyLock<Url> = LazyLock::new(|| {
    Url::parse("https://accounts.google.com/o/oauth2/v2/auth").expect("static auth url")
});

pub static GOOGLE_TOKEN_URI: LazyLock<Url> =
    LazyLock::new(|| Url::parse("https://oauth2.googleapis.com/token").expect("static token uri"));

pub static SHEETS_API_BASE: LazyLock<Url> = LazyLock::new(|| {
    Url::parse("https://sheets.googleapis.com/v4/spreadsheets/").expect("static sheets base")
});

/// Signed download URLs are valid for a bounded window.
pub const SIGNED_URL_TTL_MIN_SECS: u64 = 600;
pub const SIGNED_URL_TTL_MAX_SECS: u64 = 3600;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub listen: String,
    pub database_url: String,
    pub data_dir: PathBuf,
    pub kv_quota_bytes: u64,
    /// Write-protecting key required on mutating HTTP calls (`TRANSIT_API_KEY`).
    pub api_key: String,
    pub loglevel: String,
    /// Period for the background pull from the spreadsheet mirror; 0 disables it.
    pub sync_interval_secs: u64,
    pub push_concurrency: usize,
    pub sheets: SheetsConfig,
    pub supabase: SupabaseConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SheetsConfig {
    pub spreadsheet_id: Option<String>,
    pub sheet_name: String,
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub refresh_token: Option<String>,
    /// Optional bootstrap access token; normally injected at runtime.
    pub access_token: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SupabaseConfig {
    pub url: Option<Url>,
    pub service_key: Option<String>,
    pub signed_url_ttl_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen: "0.0.0.0:8000".to_string(),
            database_url: "sqlite:transit.sqlite".to_string(),
            data_dir: PathBuf::from("./data"),
            kv_quota_bytes: 5 * 1024 * 1024,
            api_key: String::new(),
            loglevel: "info".to_string(),
            sync_interval_secs: 0,
            push_concurrency: 4,
            sheets: SheetsConfig::default(),
            supabase: SupabaseConfig::default(),
        }
    }
}

impl Default for SheetsConfig {
    fn default() -> Self {
        Self {
            spreadsheet_id: None,
            sheet_name: "Pasajeros".to_string(),
            client_id: None,
            client_secret: None,
            refresh_token: None,
            access_token: None,
        }
    }
}

impl Default for SupabaseConfig {
    fn default() -> Self {
        Self {
            url: None,
            service_key: None,
            signed_url_ttl_secs: SIGNED_URL_TTL_MIN_SECS,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, figment::Error> {
        Figment::from(Serialized::defaults(Config::default()))
            .merge(Env::prefixed("TRANSIT_").split("__"))
            .extract()
    }
}
