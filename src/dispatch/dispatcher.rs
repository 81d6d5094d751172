use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::time::interval;
use tracing::{debug, error, info, warn};

use crate::api::health::HealthState;
use crate::config::DISPATCH_SWEEP_INTERVAL_SECS;
use crate::db::models::QueuedDealRow;
use crate::db::{deal_store, queue_store};
use crate::error::Result;
use crate::filter::evidence::{deserialize_match_details, format_match_summary};
use crate::notify::Notifier;
use crate::quiet::is_quiet;
use crate::state::ChannelStore;
use crate::types::DeliverableDeal;

/// Background sweep that releases deliveries held during quiet hours.
///
/// Each sweep discovers every channel with queued work via the global
/// queue ordering, re-checks the gate, and flushes channels whose window
/// has closed — one batched notification per channel, oldest first. A
/// failing channel is logged and left for the next sweep; it never blocks
/// the others and is never retried in-process.
pub struct QueueDispatcher<N> {
    pool: sqlx::SqlitePool,
    store: Arc<ChannelStore>,
    notifier: N,
    health: Arc<HealthState>,
}

impl<N: Notifier> QueueDispatcher<N> {
    pub fn new(
        pool: sqlx::SqlitePool,
        store: Arc<ChannelStore>,
        notifier: N,
        health: Arc<HealthState>,
    ) -> Self {
        Self { pool, store, notifier, health }
    }

    pub async fn run(self) {
        let mut ticker = interval(Duration::from_secs(DISPATCH_SWEEP_INTERVAL_SECS));
        ticker.tick().await; // consume immediate first tick

        loop {
            ticker.tick().await;
            self.sweep(Utc::now()).await;
        }
    }

    pub(crate) async fn sweep(&self, now: DateTime<Utc>) {
        let channels = match queue_store::pending_channels(&self.pool).await {
            Ok(channels) => channels,
            Err(e) => {
                error!("Queue discovery failed, skipping sweep: {e}");
                return;
            }
        };

        for channel_id in channels {
            if let Err(e) = self.flush_channel(&channel_id, now).await {
                error!(
                    channel_id = %channel_id,
                    "Queue flush failed, leaving for next sweep: {e}",
                );
            }
        }
    }

    async fn flush_channel(&self, channel_id: &str, now: DateTime<Utc>) -> Result<()> {
        let Some(channel) = self.store.get(channel_id) else {
            // Channel was deleted while its queue was non-empty; the 24h
            // TTL reclaims the rows.
            warn!(channel_id = %channel_id, "Queued deals for unknown channel, leaving to expire");
            return Ok(());
        };

        if is_quiet(&channel.quiet_hours, now) {
            debug!(channel_id = %channel_id, "Still in quiet hours, holding queue");
            return Ok(());
        }

        let rows = queue_store::pending_for_channel(&self.pool, channel_id).await?;
        if rows.is_empty() {
            return Ok(());
        }

        let deliverables: Vec<DeliverableDeal> = rows.iter().map(deliverable_from_row).collect();
        self.notifier.deliver(&channel, &deliverables).await?;

        let ids: Vec<i64> = rows.iter().map(|r| r.id).collect();
        queue_store::delete_flushed(&self.pool, &ids).await?;
        for row in &rows {
            deal_store::mark_notified(&self.pool, &row.channel_id, &row.deal_id).await?;
        }
        self.health.add_notifications_sent(rows.len() as u64);
        info!(
            channel_id = %channel_id,
            count = rows.len(),
            "Flushed {} queued deal(s) to {}",
            rows.len(),
            channel.name,
        );
        Ok(())
    }
}

/// Rebuild the display summary from the stored evidence, degrading to the
/// generic search-result line when the document is missing or malformed.
fn deliverable_from_row(row: &QueuedDealRow) -> DeliverableDeal {
    let match_summary = row
        .match_details
        .as_deref()
        .and_then(deserialize_match_details)
        .map(|details| format_match_summary(&details, &row.search_term))
        .unwrap_or_else(|| {
            format!("Returned by HotUKDeals search for \"{}\"", row.search_term)
        });

    DeliverableDeal {
        deal_id: row.deal_id.clone(),
        title: row.title.clone(),
        link: row.link.clone().unwrap_or_default(),
        price: row.price,
        merchant: row.merchant.clone(),
        match_summary,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_pool;
    use crate::filter::evaluate;
    use crate::notify::testing::RecordingNotifier;
    use crate::types::{Channel, FilterConfig, QuietHours, ScrapedDeal};
    use chrono::{NaiveTime, TimeZone};

    fn channel(id: &str, quiet: bool) -> Channel {
        let quiet_hours = if quiet {
            QuietHours {
                enabled: true,
                start: NaiveTime::MIN,
                end: NaiveTime::parse_from_str("23:59:59", "%H:%M:%S").unwrap(),
                timezone: chrono_tz::UTC,
            }
        } else {
            QuietHours::disabled()
        };
        Channel {
            id: id.to_string(),
            name: format!("Channel {id}"),
            webhook_url: format!("https://hooks.example/{id}"),
            quiet_hours,
            configs: vec![FilterConfig::for_term("steam deck")],
        }
    }

    fn deal(id: &str) -> ScrapedDeal {
        ScrapedDeal {
            id: id.to_string(),
            title: format!("Steam Deck bundle {id}"),
            link: format!("https://example.com/{id}"),
            price: Some(349.0),
            discount: None,
            merchant: None,
            search_term: "steam deck".to_string(),
        }
    }

    async fn record_and_enqueue(pool: &sqlx::SqlitePool, channel_id: &str, d: &ScrapedDeal, at: i64) {
        let result = evaluate(d, &FilterConfig::for_term("steam deck"));
        deal_store::record(pool, channel_id, d, &result, at).await.unwrap();
        let serialized = result
            .match_details
            .as_ref()
            .map(crate::filter::evidence::serialize_match_details);
        queue_store::enqueue(pool, channel_id, d, serialized.as_deref(), at)
            .await
            .unwrap();
    }

    fn dispatcher(
        pool: sqlx::SqlitePool,
        channels: Vec<Channel>,
        notifier: Arc<RecordingNotifier>,
    ) -> QueueDispatcher<Arc<RecordingNotifier>> {
        let store = ChannelStore::new();
        store.replace_all(channels);
        QueueDispatcher::new(pool, store, notifier, Arc::new(HealthState::new()))
    }

    fn noon() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 15, 12, 0, 0).unwrap()
    }

    #[tokio::test]
    async fn flush_delivers_one_ordered_batch_and_clears_the_queue() {
        let pool = test_pool().await;
        let d1 = deal("d1");
        let d2 = deal("d2");
        record_and_enqueue(&pool, "ch1", &d2, 200).await;
        record_and_enqueue(&pool, "ch1", &d1, 100).await;

        let notifier = Arc::new(RecordingNotifier::new());
        let disp = dispatcher(pool.clone(), vec![channel("ch1", false)], notifier.clone());
        disp.sweep(noon()).await;

        // One batched delivery, oldest first.
        assert_eq!(
            notifier.delivered(),
            vec![("ch1".to_string(), vec!["d1".to_string(), "d2".to_string()])]
        );
        assert_eq!(queue_store::pending_count(&pool).await.unwrap(), 0);
        for row in deal_store::recent(&pool, 10).await.unwrap() {
            assert_eq!(row.notified, 1, "flushed deal {} marked notified", row.deal_id);
        }
    }

    #[tokio::test]
    async fn still_quiet_channel_is_left_queued() {
        let pool = test_pool().await;
        record_and_enqueue(&pool, "ch1", &deal("d1"), 100).await;

        let notifier = Arc::new(RecordingNotifier::new());
        let disp = dispatcher(pool.clone(), vec![channel("ch1", true)], notifier.clone());
        disp.sweep(noon()).await;

        assert!(notifier.delivered().is_empty());
        assert_eq!(queue_store::pending_count(&pool).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn failing_channel_does_not_block_others_and_keeps_its_queue() {
        let pool = test_pool().await;
        record_and_enqueue(&pool, "ch_bad", &deal("d1"), 100).await;
        record_and_enqueue(&pool, "ch_good", &deal("d2"), 200).await;

        let notifier = Arc::new(RecordingNotifier::failing_for(&["ch_bad"]));
        let disp = dispatcher(
            pool.clone(),
            vec![channel("ch_bad", false), channel("ch_good", false)],
            notifier.clone(),
        );
        disp.sweep(noon()).await;

        assert_eq!(
            notifier.delivered(),
            vec![("ch_good".to_string(), vec!["d2".to_string()])]
        );
        // Failed channel's rows survive for the next sweep.
        assert_eq!(
            queue_store::pending_for_channel(&pool, "ch_bad").await.unwrap().len(),
            1
        );
    }

    #[tokio::test]
    async fn unknown_channel_rows_are_left_to_expire() {
        let pool = test_pool().await;
        record_and_enqueue(&pool, "ch_gone", &deal("d1"), 100).await;

        let notifier = Arc::new(RecordingNotifier::new());
        let disp = dispatcher(pool.clone(), vec![], notifier.clone());
        disp.sweep(noon()).await;

        assert!(notifier.delivered().is_empty());
        assert_eq!(queue_store::pending_count(&pool).await.unwrap(), 1);
    }

    #[test]
    fn missing_evidence_degrades_to_generic_summary() {
        let row = QueuedDealRow {
            id: 1,
            channel_id: "ch1".to_string(),
            deal_id: "d1".to_string(),
            search_term: "steam deck".to_string(),
            title: "Steam Deck bundle".to_string(),
            link: None,
            price: None,
            merchant: None,
            match_details: Some("corrupted {".to_string()),
            queued_at: 0,
            created_at: 0,
            expires_at: 0,
        };
        let deliverable = deliverable_from_row(&row);
        assert_eq!(
            deliverable.match_summary,
            "Returned by HotUKDeals search for \"steam deck\""
        );
    }
}
