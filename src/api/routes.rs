use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::api::health::HealthState;
use crate::db::models::{DealRow, QueuedDealRow};
use crate::db::{deal_store, queue_store};
use crate::error::AppError;
use crate::filter::evidence::{deserialize_match_details, format_match_summary};
use crate::state::ChannelStore;
use crate::types::FilterStatus;

#[derive(Clone)]
pub struct ApiState {
    pub pool: sqlx::SqlitePool,
    pub store: Arc<ChannelStore>,
    pub health: Arc<HealthState>,
}

pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/health", get(get_health))
        .route("/channels/:id/deals", get(get_channel_deals))
        .route("/channels/:id/queue", get(get_channel_queue))
        .route("/deals/recent", get(get_recent_deals))
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Query param structs
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
pub struct ChannelDealsQuery {
    pub search_term: String,
    pub limit: Option<i64>,
}

#[derive(Deserialize)]
pub struct RecentDealsQuery {
    pub limit: Option<i64>,
    /// Optional filter on the closed outcome set, e.g. `passed`.
    pub status: Option<String>,
}

// ---------------------------------------------------------------------------
// Response types
// ---------------------------------------------------------------------------

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub channels: usize,
    pub last_scrape_at: i64,
    pub deals_evaluated: u64,
    pub deals_queued: u64,
    pub notifications_sent: u64,
    pub queue_pending: i64,
}

#[derive(Serialize)]
pub struct DealResponse {
    pub deal_id: String,
    pub search_term: String,
    pub title: String,
    pub link: Option<String>,
    pub price: Option<f64>,
    pub merchant: Option<String>,
    pub filter_status: String,
    pub filter_reason: Option<String>,
    pub match_summary: Option<String>,
    pub notified: bool,
    pub timestamp: i64,
}

#[derive(Serialize)]
pub struct QueuedDealResponse {
    pub deal_id: String,
    pub title: String,
    pub link: Option<String>,
    pub price: Option<f64>,
    pub merchant: Option<String>,
    pub queued_at: i64,
    pub expires_at: i64,
}

impl From<DealRow> for DealResponse {
    fn from(row: DealRow) -> Self {
        // Evidence is display-only here; a missing or malformed document
        // just leaves the summary empty.
        let match_summary = row
            .match_details
            .as_deref()
            .and_then(deserialize_match_details)
            .map(|details| format_match_summary(&details, &row.search_term));
        Self {
            deal_id: row.deal_id,
            search_term: row.search_term,
            title: row.title,
            link: row.link,
            price: row.price,
            merchant: row.merchant,
            filter_status: row.filter_status,
            filter_reason: row.filter_reason,
            match_summary,
            notified: row.notified != 0,
            timestamp: row.timestamp,
        }
    }
}

impl From<QueuedDealRow> for QueuedDealResponse {
    fn from(row: QueuedDealRow) -> Self {
        Self {
            deal_id: row.deal_id,
            title: row.title,
            link: row.link,
            price: row.price,
            merchant: row.merchant,
            queued_at: row.queued_at,
            expires_at: row.expires_at,
        }
    }
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

async fn get_health(State(state): State<ApiState>) -> Result<Json<HealthResponse>, AppError> {
    let queue_pending = queue_store::pending_count(&state.pool).await?;
    Ok(Json(HealthResponse {
        status: "ok",
        channels: state.store.channel_count(),
        last_scrape_at: state.health.last_scrape_at_secs(),
        deals_evaluated: state.health.deals_evaluated(),
        deals_queued: state.health.deals_queued(),
        notifications_sent: state.health.notifications_sent(),
        queue_pending,
    }))
}

/// A channel's sightings for one search term, newest first.
async fn get_channel_deals(
    State(state): State<ApiState>,
    Path(channel_id): Path<String>,
    Query(params): Query<ChannelDealsQuery>,
) -> Result<Json<Vec<DealResponse>>, AppError> {
    let limit = params.limit.unwrap_or(50).clamp(1, 500);
    let rows = deal_store::history(&state.pool, &channel_id, &params.search_term, limit).await?;
    Ok(Json(rows.into_iter().map(DealResponse::from).collect()))
}

/// Deliveries currently held for a channel, in delivery order.
async fn get_channel_queue(
    State(state): State<ApiState>,
    Path(channel_id): Path<String>,
) -> Result<Json<Vec<QueuedDealResponse>>, AppError> {
    let rows = queue_store::pending_for_channel(&state.pool, &channel_id).await?;
    Ok(Json(rows.into_iter().map(QueuedDealResponse::from).collect()))
}

async fn get_recent_deals(
    State(state): State<ApiState>,
    Query(params): Query<RecentDealsQuery>,
) -> Result<Json<Vec<DealResponse>>, AppError> {
    let limit = params.limit.unwrap_or(50).clamp(1, 500);
    let status = match params.status.as_deref() {
        Some(raw) => Some(FilterStatus::from_str_status(raw).ok_or_else(|| {
            AppError::Config(format!("unknown filter status \"{raw}\""))
        })?),
        None => None,
    };
    let mut rows = deal_store::recent(&state.pool, limit).await?;
    if let Some(status) = status {
        let wanted = status.to_string();
        rows.retain(|r| r.filter_status == wanted);
    }
    Ok(Json(rows.into_iter().map(DealResponse::from).collect()))
}
