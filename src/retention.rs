use std::time::Duration;

use chrono::Utc;
use tokio::time::interval;
use tracing::{error, info};

use crate::config::RETENTION_SWEEP_INTERVAL_SECS;
use crate::db::{deal_store, queue_store};
use crate::error::Result;

/// Background task that deletes expired rows: deal records after their
/// 12-month audit horizon, queued deals after the 24-hour flush safety net.
/// Expiry is a storage concern; the decision pipeline never looks at it.
pub struct RetentionSweeper {
    pool: sqlx::SqlitePool,
}

impl RetentionSweeper {
    pub fn new(pool: sqlx::SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn run(self) {
        let mut ticker = interval(Duration::from_secs(RETENTION_SWEEP_INTERVAL_SECS));
        ticker.tick().await; // consume immediate first tick

        loop {
            ticker.tick().await;
            if let Err(e) = self.sweep().await {
                error!("Retention sweep failed: {e}");
            }
        }
    }

    async fn sweep(&self) -> Result<()> {
        let now = Utc::now().timestamp();
        let deals = deal_store::purge_expired(&self.pool, now).await?;
        let queued = queue_store::purge_expired(&self.pool, now).await?;
        if deals > 0 || queued > 0 {
            info!(deals, queued, "Retention sweep removed {deals} deal(s), {queued} queued");
        }
        Ok(())
    }
}
