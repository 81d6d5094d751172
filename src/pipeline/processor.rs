use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::mpsc;
use tracing::{debug, error, info};

use crate::api::health::HealthState;
use crate::db::{deal_store, queue_store};
use crate::error::Result;
use crate::filter::evaluate;
use crate::filter::evidence::{format_match_summary, serialize_match_details};
use crate::notify::Notifier;
use crate::quiet::is_quiet;
use crate::state::ChannelStore;
use crate::types::{Channel, DeliverableDeal, FilterConfig, ScrapedDeal};

/// The decision pipeline. Consumes scraped candidates and, for every
/// channel config whose search term produced them: evaluate → record
/// (dedup) → quiet-hours gate → deliver now or enqueue.
///
/// Evaluation and evidence are pure; the only shared state is the store,
/// and both write paths are identity-keyed, so overlapping scrape cycles
/// cannot double-insert or double-notify.
pub struct DealProcessor<N> {
    pool: sqlx::SqlitePool,
    store: Arc<ChannelStore>,
    notifier: N,
    deal_rx: mpsc::Receiver<ScrapedDeal>,
    health: Arc<HealthState>,
}

impl<N: Notifier> DealProcessor<N> {
    pub fn new(
        pool: sqlx::SqlitePool,
        store: Arc<ChannelStore>,
        notifier: N,
        deal_rx: mpsc::Receiver<ScrapedDeal>,
        health: Arc<HealthState>,
    ) -> Self {
        Self { pool, store, notifier, deal_rx, health }
    }

    pub async fn run(mut self) {
        while let Some(deal) = self.deal_rx.recv().await {
            self.process(deal).await;
        }
    }

    /// Fan one candidate out to every interested channel. A failure on one
    /// channel is logged and must not touch the others.
    pub(crate) async fn process(&self, deal: ScrapedDeal) {
        let now = Utc::now();
        for (channel, config) in self.store.configs_for_term(&deal.search_term) {
            if let Err(e) = self.process_for_channel(&deal, &channel, &config, now).await {
                error!(
                    channel_id = %channel.id,
                    deal_id = %deal.id,
                    "Pipeline failed for channel, deal not notified this cycle: {e}",
                );
            }
        }
    }

    async fn process_for_channel(
        &self,
        deal: &ScrapedDeal,
        channel: &Channel,
        config: &FilterConfig,
        now: DateTime<Utc>,
    ) -> Result<()> {
        let result = evaluate(deal, config);
        self.health.inc_deals_evaluated();

        let newly_recorded =
            deal_store::record(&self.pool, &channel.id, deal, &result, now.timestamp()).await?;
        if !newly_recorded {
            debug!(
                channel_id = %channel.id,
                deal_id = %deal.id,
                "Already on record for channel, skipping",
            );
            return Ok(());
        }

        if !result.passed {
            debug!(
                channel_id = %channel.id,
                deal_id = %deal.id,
                status = %result.filter_status,
                "Deal rejected: {}",
                result.filter_reason.as_deref().unwrap_or("no reason"),
            );
            return Ok(());
        }

        if is_quiet(&channel.quiet_hours, now) {
            let serialized = result.match_details.as_ref().map(serialize_match_details);
            queue_store::enqueue(
                &self.pool,
                &channel.id,
                deal,
                serialized.as_deref(),
                now.timestamp(),
            )
            .await?;
            self.health.inc_deals_queued();
            info!(
                channel_id = %channel.id,
                deal_id = %deal.id,
                "Quiet hours active, queued for later delivery: {}",
                deal.title,
            );
            return Ok(());
        }

        let summary = match &result.match_details {
            Some(details) => format_match_summary(details, &deal.search_term),
            None => format!("Returned by HotUKDeals search for \"{}\"", deal.search_term),
        };
        let deliverable = DeliverableDeal {
            deal_id: deal.id.clone(),
            title: deal.title.clone(),
            link: deal.link.clone(),
            price: deal.price,
            merchant: deal.merchant.clone(),
            match_summary: summary,
        };
        self.notifier.deliver(channel, &[deliverable]).await?;
        deal_store::mark_notified(&self.pool, &channel.id, &deal.id).await?;
        self.health.inc_notifications_sent();
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
