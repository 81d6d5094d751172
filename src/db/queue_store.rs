//! Deliveries parked during quiet hours. Rows live until the dispatcher
//! flushes them; `expires_at` is the safety net if a flush never happens.

use crate::config::retention::QUEUED_DEAL_TTL_SECS;
use crate::db::models::QueuedDealRow;
use crate::error::Result;
use crate::types::ScrapedDeal;

pub async fn enqueue(
    pool: &sqlx::SqlitePool,
    channel_id: &str,
    deal: &ScrapedDeal,
    match_details: Option<&str>,
    now: i64,
) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO queued_deals (
            channel_id, deal_id, search_term, title, link, price, merchant,
            match_details, queued_at, created_at, expires_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
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
    .bind(now)
    .bind(now)
    .bind(now + QUEUED_DEAL_TTL_SECS)
    .execute(pool)
    .await?;
    Ok(())
}

/// Channels with at least one queued entry, oldest work first — the global
/// `queued_at` ordering lets one sweep discover everything without a
/// channel enumeration step.
pub async fn pending_channels(pool: &sqlx::SqlitePool) -> Result<Vec<String>> {
    let ids: Vec<String> = sqlx::query_scalar(
        r#"
        SELECT channel_id
        FROM queued_deals
        GROUP BY channel_id
        ORDER BY MIN(queued_at) ASC
        "#,
    )
    .fetch_all(pool)
    .await?;
    Ok(ids)
}

/// One channel's queue in delivery order.
pub async fn pending_for_channel(
    pool: &sqlx::SqlitePool,
    channel_id: &str,
) -> Result<Vec<QueuedDealRow>> {
    let rows = sqlx::query_as::<_, QueuedDealRow>(
        r#"
        SELECT id, channel_id, deal_id, search_term, title, link, price, merchant,
               match_details, queued_at, created_at, expires_at
        FROM queued_deals
        WHERE channel_id = ?
        ORDER BY queued_at ASC, id ASC
        "#,
    )
    .bind(channel_id)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

/// Delete the rows of a flushed batch. Runs in one transaction so a crash
/// mid-delete leaves either the whole batch or none of it — the dedup key
/// on `deals` keeps a re-flush from double-notifying a fresh sighting.
pub async fn delete_flushed(pool: &sqlx::SqlitePool, ids: &[i64]) -> Result<()> {
    let mut tx = pool.begin().await?;
    for id in ids {
        sqlx::query("DELETE FROM queued_deals WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;
    }
    tx.commit().await?;
    Ok(())
}

pub async fn purge_expired(pool: &sqlx::SqlitePool, now: i64) -> Result<u64> {
    let outcome = sqlx::query("DELETE FROM queued_deals WHERE expires_at <= ?")
        .bind(now)
        .execute(pool)
        .await?;
    Ok(outcome.rows_affected())
}

pub async fn pending_count(pool: &sqlx::SqlitePool) -> Result<i64> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM queued_deals")
        .fetch_one(pool)
        .await?;
    Ok(count)
}
