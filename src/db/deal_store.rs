//! Persisted deal sightings. Identity is `(channel_id, deal_id)` — writes
//! are upserts on that key, so reprocessing the same scrape result can
//! never create a second notification path for a channel.

use crate::config::retention::DEAL_TTL_SECS;
use crate::db::models::DealRow;
use crate::error::Result;
use crate::filter::evidence::serialize_match_details;
use crate::types::{FilterResult, ScrapedDeal};

/// Record one evaluated sighting. Returns `true` when the row was newly
/// inserted, `false` when this (channel, deal) pair was already on record.
/// A conflict is the dedup mechanism, not an error.
pub async fn record(
    pool: &sqlx::SqlitePool,
    channel_id: &str,
    deal: &ScrapedDeal,
    result: &FilterResult,
    now: i64,
) -> Result<bool> {
    let match_details = result.match_details.as_ref().map(serialize_match_details);
    let filter_status = result.filter_status.to_string();

    let outcome = sqlx::query(
        r#"
        INSERT INTO deals (
            channel_id, deal_id, search_term, title, link, price, merchant,
            match_details, filter_status, filter_reason,
            notified, timestamp, created_at, expires_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, 0, ?, ?, ?)
        ON CONFLICT(channel_id, deal_id) DO NOTHING
        "#,
    )
    .bind(channel_id)
    .bind(&deal.id)
    .bind(&deal.search_term)
    .bind(&deal.title)
    .bind(&deal.link)
    .bind(deal.price)
    .bind(&deal.merchant)
    .bind(match_details)
    .bind(filter_status)
    .bind(&result.filter_reason)
    .bind(now)
    .bind(now)
    .bind(now + DEAL_TTL_SECS)
    .execute(pool)
    .await?;

    Ok(outcome.rows_affected() > 0)
}

pub async fn mark_notified(pool: &sqlx::SqlitePool, channel_id: &str, deal_id: &str) -> Result<()> {
    sqlx::query("UPDATE deals SET notified = 1 WHERE channel_id = ? AND deal_id = ?")
        .bind(channel_id)
        .bind(deal_id)
        .execute(pool)
        .await?;
    Ok(())
}

/// A channel's sightings for one search term, newest first. Served by the
/// `(channel_id, search_term, timestamp)` index.
pub async fn history(
    pool: &sqlx::SqlitePool,
    channel_id: &str,
    search_term: &str,
    limit: i64,
) -> Result<Vec<DealRow>> {
    let rows = sqlx::query_as::<_, DealRow>(
        r#"
        SELECT channel_id, deal_id, search_term, title, link, price, merchant,
               match_details, filter_status, filter_reason,
               notified, timestamp, created_at, expires_at
        FROM deals
        WHERE channel_id = ? AND search_term = ?
        ORDER BY timestamp DESC
        LIMIT ?
        "#,
    )
    .bind(channel_id)
    .bind(search_term)
    .bind(limit)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

pub async fn recent(pool: &sqlx::SqlitePool, limit: i64) -> Result<Vec<DealRow>> {
    let rows = sqlx::query_as::<_, DealRow>(
        r#"
        SELECT channel_id, deal_id, search_term, title, link, price, merchant,
               match_details, filter_status, filter_reason,
               notified, timestamp, created_at, expires_at
        FROM deals
        ORDER BY timestamp DESC
        LIMIT ?
        "#,
    )
    .bind(limit)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

pub async fn purge_expired(pool: &sqlx::SqlitePool, now: i64) -> Result<u64> {
    let outcome = sqlx::query("DELETE FROM deals WHERE expires_at <= ?")
        .bind(now)
        .execute(pool)
        .await?;
    Ok(outcome.rows_affected())
}

pub async fn total_count(pool: &sqlx::SqlitePool) -> Result<i64> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM deals")
        .fetch_one(pool)
        .await?;
    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_pool;
    use crate::filter::evaluate;
    use crate::types::FilterConfig;

    fn deal(id: &str, title: &str) -> ScrapedDeal {
        ScrapedDeal {
            id: id.to_string(),
            title: title.to_string(),
            link: format!("https://example.com/{id}"),
            price: Some(349.0),
            discount: None,
            merchant: Some("Amazon".to_string()),
            search_term: "steam deck".to_string(),
        }
    }

    fn passed_result(d: &ScrapedDeal) -> crate::types::FilterResult {
        evaluate(d, &FilterConfig::for_term("steam deck"))
    }

    #[tokio::test]
    async fn second_sighting_is_deduplicated() {
        let pool = test_pool().await;
        let d = deal("d1", "Steam Deck OLED");
        let result = passed_result(&d);

        assert!(record(&pool, "ch1", &d, &result, 100).await.unwrap());
        assert!(!record(&pool, "ch1", &d, &result, 200).await.unwrap());

        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM deals")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(count, 1);

        // First sighting's fields are untouched by the replay.
        let row = &recent(&pool, 10).await.unwrap()[0];
        assert_eq!(row.timestamp, 100);
    }

    #[tokio::test]
    async fn same_deal_is_independent_per_channel() {
        let pool = test_pool().await;
        let d = deal("d1", "Steam Deck OLED");
        let result = passed_result(&d);

        assert!(record(&pool, "ch1", &d, &result, 100).await.unwrap());
        assert!(record(&pool, "ch2", &d, &result, 100).await.unwrap());
    }

    #[tokio::test]
    async fn rejected_deals_are_recorded_with_reason() {
        let pool = test_pool().await;
        let d = deal("d2", "Nintendo Switch bundle");
        let result = evaluate(&d, &FilterConfig::for_term("steam deck"));
        assert!(!result.passed);

        assert!(record(&pool, "ch1", &d, &result, 100).await.unwrap());
        let row = &recent(&pool, 10).await.unwrap()[0];
        assert_eq!(row.filter_status, "filtered_no_match");
        assert!(row.filter_reason.as_deref().unwrap().contains("steam deck"));
        assert!(row.match_details.is_none());
    }

    #[tokio::test]
    async fn stored_evidence_round_trips() {
        let pool = test_pool().await;
        let d = deal("d1", "Steam Deck OLED 512GB");
        let result = passed_result(&d);
        record(&pool, "ch1", &d, &result, 100).await.unwrap();

        let row = &recent(&pool, 10).await.unwrap()[0];
        let raw = row.match_details.as_deref().unwrap();
        let details = crate::filter::evidence::deserialize_match_details(raw).unwrap();
        assert_eq!(details, result.match_details.unwrap());
    }

    #[tokio::test]
    async fn history_is_per_term_newest_first() {
        let pool = test_pool().await;
        for (id, ts) in [("d1", 100), ("d2", 300), ("d3", 200)] {
            let d = deal(id, "Steam Deck OLED");
            let result = passed_result(&d);
            record(&pool, "ch1", &d, &result, ts).await.unwrap();
        }
        let mut other = deal("d4", "Steam Deck dock");
        other.search_term = "dock".to_string();
        let result = evaluate(&other, &FilterConfig::for_term("dock"));
        record(&pool, "ch1", &other, &result, 400).await.unwrap();

        let rows = history(&pool, "ch1", "steam deck", 10).await.unwrap();
        let ids: Vec<&str> = rows.iter().map(|r| r.deal_id.as_str()).collect();
        assert_eq!(ids, vec!["d2", "d3", "d1"]);
    }

    #[tokio::test]
    async fn mark_notified_flips_only_the_flag() {
        let pool = test_pool().await;
        let d = deal("d1", "Steam Deck OLED");
        let result = passed_result(&d);
        record(&pool, "ch1", &d, &result, 100).await.unwrap();

        mark_notified(&pool, "ch1", "d1").await.unwrap();
        let row = &recent(&pool, 10).await.unwrap()[0];
        assert_eq!(row.notified, 1);
        assert_eq!(row.filter_status, "passed");
    }

    #[tokio::test]
    async fn purge_removes_only_expired_rows() {
        let pool = test_pool().await;
        let d1 = deal("d1", "Steam Deck OLED");
        let d2 = deal("d2", "Steam Deck LCD");
        record(&pool, "ch1", &d1, &passed_result(&d1), 0).await.unwrap();
        record(&pool, "ch1", &d2, &passed_result(&d2), 1000).await.unwrap();

        let purged = purge_expired(&pool, DEAL_TTL_SECS + 500).await.unwrap();
        assert_eq!(purged, 1);
        let rows = recent(&pool, 10).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].deal_id, "d2");
    }
}
