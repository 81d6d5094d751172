mod api;
mod channel_refresh;
mod config;
mod db;
mod dispatch;
mod error;
mod fetcher;
mod filter;
mod notify;
mod pipeline;
mod quiet;
mod retention;
mod state;
mod types;

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::api::health::HealthState;
use crate::api::routes::{router, ApiState};
use crate::channel_refresh::ChannelRefresher;
use crate::config::{Config, CHANNEL_CAPACITY};
use crate::db::channels::load_channels;
use crate::dispatch::QueueDispatcher;
use crate::error::Result;
use crate::fetcher::DealFetcher;
use crate::notify::WebhookNotifier;
use crate::pipeline::DealProcessor;
use crate::retention::RetentionSweeper;
use crate::state::ChannelStore;

#[tokio::main]
async fn main() {
    let cfg = match Config::from_env() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Config error: {e}");
            std::process::exit(1);
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(&cfg.log_level))
        .init();

    if let Err(e) = run(cfg).await {
        error!("Fatal error: {e}");
        std::process::exit(1);
    }
}

async fn run(cfg: Config) -> Result<()> {
    // --- Database setup ---
    let pool = sqlx::SqlitePool::connect(&format!("sqlite:{}?mode=rwc", cfg.db_path)).await?;
    sqlx::migrate!("./migrations").run(&pool).await?;
    info!("Database ready at {}", cfg.db_path);

    // --- Channel cache bootstrap ---
    let store = ChannelStore::new();
    let channels = load_channels(&pool).await?;
    let channel_count = channels.len();
    let term_count: usize = channels.iter().map(|c| c.configs.len()).sum();
    store.replace_all(channels);
    info!("Loaded {channel_count} channel(s) with {term_count} search config(s)");
    if channel_count == 0 {
        warn!("No channels configured — the scraper will idle until some are created");
    }

    let health = Arc::new(HealthState::new());
    let notifier = Arc::new(WebhookNotifier::new(cfg.http_timeout_secs)?);

    // --- Channels ---
    let (deal_tx, deal_rx) = mpsc::channel(CHANNEL_CAPACITY);

    // --- Spawn tasks ---

    // Scraper: polls the listing per configured term.
    let fetcher = DealFetcher::new(
        cfg.clone(),
        Arc::clone(&store),
        deal_tx,
        Arc::clone(&health),
    )?;
    tokio::spawn(async move { fetcher.run().await });

    // Decision pipeline: evaluate → record → gate → deliver/enqueue.
    let processor = DealProcessor::new(
        pool.clone(),
        Arc::clone(&store),
        Arc::clone(&notifier),
        deal_rx,
        Arc::clone(&health),
    );
    tokio::spawn(async move { processor.run().await });

    // Queue dispatcher: releases quiet-hours holds in batches.
    let dispatcher = QueueDispatcher::new(
        pool.clone(),
        Arc::clone(&store),
        Arc::clone(&notifier),
        Arc::clone(&health),
    );
    tokio::spawn(async move { dispatcher.run().await });

    // Retention: TTL cleanup for deal and queue rows.
    let sweeper = RetentionSweeper::new(pool.clone());
    tokio::spawn(async move { sweeper.run().await });

    // Channel cache refresh: picks up management-surface edits.
    let refresher = ChannelRefresher::new(Arc::clone(&store), pool.clone());
    tokio::spawn(async move { refresher.run().await });

    // --- HTTP read API ---
    let api_state = ApiState {
        pool: pool.clone(),
        store: Arc::clone(&store),
        health: Arc::clone(&health),
    };
    let app = router(api_state);
    let bind_addr = format!("0.0.0.0:{}", cfg.api_port);
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    info!("HTTP API listening on {bind_addr}");

    axum::serve(listener, app).await?;

    Ok(())
}
