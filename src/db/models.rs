//! Database row types. Used by sqlx for typed queries.

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ChannelRow {
    pub id: String,
    pub name: String,
    pub webhook_url: String,
    pub quiet_hours_enabled: i64,
    pub quiet_hours_start: Option<String>,
    pub quiet_hours_end: Option<String>,
    pub quiet_hours_timezone: Option<String>,
    pub created_at: i64,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct SearchConfigRow {
    pub id: String,
    pub channel_id: String,
    pub search_term: String,
    /// JSON array of strings.
    pub include_keywords: String,
    /// JSON array of strings.
    pub exclude_keywords: String,
    pub case_sensitive: i64,
    pub max_price: Option<f64>,
    pub min_discount: Option<f64>,
    pub created_at: i64,
}

/// One sighting of a deal on one channel — the dedup unit. Immutable after
/// insert apart from `notified`.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct DealRow {
    pub channel_id: String,
    pub deal_id: String,
    pub search_term: String,
    pub title: String,
    pub link: Option<String>,
    pub price: Option<f64>,
    pub merchant: Option<String>,
    pub match_details: Option<String>,
    pub filter_status: String,
    pub filter_reason: Option<String>,
    pub notified: i64,
    pub timestamp: i64,
    pub created_at: i64,
    pub expires_at: i64,
}

/// A delivery held back by quiet hours, waiting for the dispatcher.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct QueuedDealRow {
    pub id: i64,
    pub channel_id: String,
    pub deal_id: String,
    pub search_term: String,
    pub title: String,
    pub link: Option<String>,
    pub price: Option<f64>,
    pub merchant: Option<String>,
    pub match_details: Option<String>,
    pub queued_at: i64,
    pub created_at: i64,
    pub expires_at: i64,
}
