use std::sync::Arc;
use std::time::Duration;

use tokio::time::interval;
use tracing::{error, info};

use crate::config::CHANNEL_REFRESH_INTERVAL_SECS;
use crate::db::channels::load_channels;
use crate::state::ChannelStore;

/// Background task that keeps the in-memory channel cache in step with the
/// database. The management surface edits the rows; this loop is the only
/// way those edits reach the pipeline.
pub struct ChannelRefresher {
    store: Arc<ChannelStore>,
    pool: sqlx::SqlitePool,
}

impl ChannelRefresher {
    pub fn new(store: Arc<ChannelStore>, pool: sqlx::SqlitePool) -> Self {
        Self { store, pool }
    }

    pub async fn run(self) {
        let mut ticker = interval(Duration::from_secs(CHANNEL_REFRESH_INTERVAL_SECS));
        ticker.tick().await; // skip immediate first tick — bootstrap already loaded

        loop {
            ticker.tick().await;
            if let Err(e) = self.refresh().await {
                error!("Channel refresh failed: {e}");
            }
        }
    }

    async fn refresh(&self) -> crate::error::Result<()> {
        let fresh = load_channels(&self.pool).await?;
        let total = fresh.len();
        let (added, removed) = self.store.replace_all(fresh);
        if added > 0 || removed > 0 {
            info!(
                added,
                removed,
                total,
                "Channel refresh: +{added} added, -{removed} removed, {total} total",
            );
        }
        Ok(())
    }
}
