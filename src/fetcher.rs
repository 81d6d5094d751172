use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::interval;
use tracing::{debug, info, warn};

use crate::api::health::HealthState;
use crate::config::{Config, SCRAPE_INTERVAL_SECS};
use crate::error::{AppError, Result};
use crate::state::ChannelStore;
use crate::types::ScrapedDeal;

/// Fetch the deals listing for one search term. Items the parser cannot
/// make sense of are skipped with a debug log rather than failing the page.
pub async fn fetch_deals(
    cfg: &Config,
    client: &reqwest::Client,
    term: &str,
) -> Result<Vec<ScrapedDeal>> {
    let url = format!(
        "{}/search?query={}&limit={}",
        cfg.deals_api_url,
        urlencode(term),
        cfg.scraper_max_results,
    );

    let resp: serde_json::Value = client.get(&url).send().await?.json().await?;

    // The listing endpoint wraps results in a "deals" array; tolerate a bare
    // array too.
    let items = match resp.as_array() {
        Some(a) => a.as_slice(),
        None => resp
            .get("deals")
            .and_then(|d| d.as_array())
            .map(|a| a.as_slice())
            .ok_or_else(|| {
                AppError::Scrape(format!("search response for \"{term}\" had no deals array"))
            })?,
    };

    let mut deals = Vec::new();
    for item in items.iter().take(cfg.scraper_max_results) {
        match parse_deal_item(item, term) {
            Some(deal) => deals.push(deal),
            None => debug!(term, "skipping unparseable listing item"),
        }
    }
    Ok(deals)
}

/// Field-by-field tolerant parse. `id`, `title` and `link` are required;
/// everything else is best-effort.
fn parse_deal_item(item: &serde_json::Value, term: &str) -> Option<ScrapedDeal> {
    let id = string_field(item, &["deal_id", "id"])?;
    let title = string_field(item, &["title"])?;
    let link = string_field(item, &["deal_link", "link", "url"])?;
    let merchant = string_field(item, &["merchant"]);
    let price = numeric_field(item, &["price"]);
    let discount = numeric_field(item, &["discount_percentage", "discount"]);

    Some(ScrapedDeal {
        id,
        title,
        link,
        price,
        discount,
        merchant,
        search_term: term.to_string(),
    })
}

fn string_field(item: &serde_json::Value, keys: &[&str]) -> Option<String> {
    for key in keys {
        match item.get(key) {
            Some(serde_json::Value::String(s)) if !s.is_empty() => return Some(s.clone()),
            Some(serde_json::Value::Number(n)) => return Some(n.to_string()),
            _ => {}
        }
    }
    None
}

/// Listing prices arrive as numbers or display strings like "£1,299.99".
fn numeric_field(item: &serde_json::Value, keys: &[&str]) -> Option<f64> {
    for key in keys {
        match item.get(key) {
            Some(serde_json::Value::Number(n)) => return n.as_f64(),
            Some(serde_json::Value::String(s)) => {
                if let Some(v) = parse_price(s) {
                    return Some(v);
                }
            }
            _ => {}
        }
    }
    None
}

pub fn parse_price(raw: &str) -> Option<f64> {
    let cleaned: String = raw
        .trim()
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.' || *c == '-')
        .collect();
    if cleaned.is_empty() {
        return None;
    }
    cleaned.parse::<f64>().ok()
}

fn urlencode(s: &str) -> String {
    s.chars()
        .map(|c| match c {
            ' ' => "+".to_string(),
            'a'..='z' | 'A'..='Z' | '0'..='9' | '-' | '_' | '.' | '~' => c.to_string(),
            other => {
                let mut buf = [0u8; 4];
                other
                    .encode_utf8(&mut buf)
                    .bytes()
                    .map(|b| format!("%{b:02X}"))
                    .collect()
            }
        })
        .collect()
}

// ---------------------------------------------------------------------------
// DealFetcher — background scrape loop
// ---------------------------------------------------------------------------

/// Polls the listing for every configured search term on a fixed interval
/// and feeds candidates into the pipeline channel. A per-term failure is
/// logged and skipped; the next cycle retries naturally.
pub struct DealFetcher {
    cfg: Config,
    store: Arc<ChannelStore>,
    deal_tx: mpsc::Sender<ScrapedDeal>,
    health: Arc<HealthState>,
    client: reqwest::Client,
}

impl DealFetcher {
    pub fn new(
        cfg: Config,
        store: Arc<ChannelStore>,
        deal_tx: mpsc::Sender<ScrapedDeal>,
        health: Arc<HealthState>,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(cfg.http_timeout_secs))
            .build()?;
        Ok(Self { cfg, store, deal_tx, health, client })
    }

    pub async fn run(self) {
        let mut ticker = interval(Duration::from_secs(SCRAPE_INTERVAL_SECS));

        loop {
            ticker.tick().await;
            self.scrape_cycle().await;
        }
    }

    async fn scrape_cycle(&self) {
        let terms = self.store.distinct_search_terms();
        if terms.is_empty() {
            debug!("No search terms configured, skipping scrape cycle");
            return;
        }

        let mut fetched = 0usize;
        let mut failed_terms = 0usize;
        for term in &terms {
            match fetch_deals(&self.cfg, &self.client, term).await {
                Ok(deals) => {
                    fetched += deals.len();
                    for deal in deals {
                        let send = self
                            .deal_tx
                            .send(deal)
                            .await
                            .map_err(|e| AppError::ChannelSend(e.to_string()));
                        if let Err(e) = send {
                            warn!("Pipeline channel closed, dropping candidate: {e}");
                        }
                    }
                }
                Err(e) => {
                    failed_terms += 1;
                    warn!(term = %term, "Scrape failed for term: {e}");
                }
            }
        }

        self.health.set_last_scrape_at(now_secs());
        info!(
            terms = terms.len(),
            fetched,
            failed_terms,
            "Scrape cycle complete: {fetched} candidates across {} terms ({failed_terms} failed)",
            terms.len(),
        );
    }
}

fn now_secs() -> i64 {
    chrono::Utc::now().timestamp()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
