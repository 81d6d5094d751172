use crate::error::{AppError, Result};

pub const DEALS_API_URL: &str = "https://www.hotukdeals.com/rest_api/v2";

/// How often the scraper re-queries the deals listing for every configured
/// search term (seconds).
pub const SCRAPE_INTERVAL_SECS: u64 = 300;

/// Queue dispatcher sweep interval (seconds). Queued deals held through a
/// quiet window are flushed on the first sweep after the window closes.
pub const DISPATCH_SWEEP_INTERVAL_SECS: u64 = 60;

/// Retention sweep interval (seconds) — deletes expired deal and queue rows.
pub const RETENTION_SWEEP_INTERVAL_SECS: u64 = 3600;

/// Channel/config cache refresh interval (seconds).
pub const CHANNEL_REFRESH_INTERVAL_SECS: u64 = 60;

/// Channel capacity for internal message routing.
pub const CHANNEL_CAPACITY: usize = 1024;

/// Words of context kept on each side of a bracketed match in evidence
/// snippets, e.g. `...Amazing [NB10000] Power Bank...`.
pub const SNIPPET_CONTEXT_WORDS: usize = 3;

/// Retention horizons. Deal records are an audit trail and live for a year;
/// queued deliveries are only meaningful until the next quiet window ends,
/// so they get a short safety-net TTL against a stuck flush.
pub mod retention {
    pub const DEAL_TTL_SECS: i64 = 365 * 24 * 3600;
    pub const QUEUED_DEAL_TTL_SECS: i64 = 24 * 3600;
}

#[derive(Debug, Clone)]
pub struct Config {
    pub deals_api_url: String,
    pub log_level: String,
    pub db_path: String,
    pub api_port: u16,
    /// Per-request timeout for scraper fetches and webhook posts (WEBHOOK_TIMEOUT_SECS)
    pub http_timeout_secs: u64,
    /// Max deals taken from the listing per search term per cycle (SCRAPER_MAX_RESULTS)
    pub scraper_max_results: usize,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            deals_api_url: std::env::var("DEALS_API_URL")
                .unwrap_or_else(|_| DEALS_API_URL.to_string()),
            log_level: std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            db_path: std::env::var("DB_PATH").unwrap_or_else(|_| "dealwatch.db".to_string()),
            api_port: std::env::var("API_PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse::<u16>()
                .map_err(|_| AppError::Config("API_PORT must be a valid port number".to_string()))?,
            http_timeout_secs: std::env::var("WEBHOOK_TIMEOUT_SECS")
                .unwrap_or_else(|_| "30".to_string())
                .parse::<u64>()
                .unwrap_or(30),
            scraper_max_results: std::env::var("SCRAPER_MAX_RESULTS")
                .unwrap_or_else(|_| "50".to_string())
                .parse::<usize>()
                .unwrap_or(50),
        })
    }
}
