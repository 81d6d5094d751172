//! Read path for channels and their search configs. The management surface
//! owns these tables; this service only loads them into the in-memory cache.

use chrono::NaiveTime;
use chrono_tz::Tz;
use tracing::warn;

use crate::db::models::{ChannelRow, SearchConfigRow};
use crate::error::Result;
use crate::types::{Channel, FilterConfig, QuietHours};

/// Fallback when a channel row carries an unrecognized zone name.
const DEFAULT_TIMEZONE: Tz = chrono_tz::Europe::London;

pub async fn load_channels(pool: &sqlx::SqlitePool) -> Result<Vec<Channel>> {
    let channel_rows = sqlx::query_as::<_, ChannelRow>(
        r#"
        SELECT id, name, webhook_url,
               quiet_hours_enabled, quiet_hours_start, quiet_hours_end, quiet_hours_timezone,
               created_at
        FROM channels
        ORDER BY id
        "#,
    )
    .fetch_all(pool)
    .await?;

    let config_rows = sqlx::query_as::<_, SearchConfigRow>(
        r#"
        SELECT id, channel_id, search_term, include_keywords, exclude_keywords,
               case_sensitive, max_price, min_discount, created_at
        FROM search_configs
        ORDER BY channel_id, created_at
        "#,
    )
    .fetch_all(pool)
    .await?;

    let mut channels: Vec<Channel> = channel_rows.into_iter().map(channel_from_row).collect();
    for row in config_rows {
        let Some(channel) = channels.iter_mut().find(|c| c.id == row.channel_id) else {
            warn!(config_id = %row.id, channel_id = %row.channel_id, "search config references unknown channel");
            continue;
        };
        channel.configs.push(config_from_row(row));
    }

    Ok(channels)
}

fn channel_from_row(row: ChannelRow) -> Channel {
    let quiet_hours = parse_quiet_hours(
        row.quiet_hours_enabled != 0,
        row.quiet_hours_start.as_deref(),
        row.quiet_hours_end.as_deref(),
        row.quiet_hours_timezone.as_deref(),
        &row.id,
    );
    Channel {
        id: row.id,
        name: row.name,
        webhook_url: row.webhook_url,
        quiet_hours,
        configs: Vec::new(),
    }
}

fn config_from_row(row: SearchConfigRow) -> FilterConfig {
    FilterConfig {
        search_term: row.search_term,
        include_keywords: parse_keywords(&row.include_keywords, &row.id, "include"),
        exclude_keywords: parse_keywords(&row.exclude_keywords, &row.id, "exclude"),
        case_sensitive: row.case_sensitive != 0,
        max_price: row.max_price,
        min_discount: row.min_discount,
    }
}

fn parse_keywords(raw: &str, config_id: &str, which: &str) -> Vec<String> {
    match serde_json::from_str::<Vec<String>>(raw) {
        Ok(keywords) => keywords,
        Err(e) => {
            warn!(config_id, which, "malformed keyword list, treating as empty: {e}");
            Vec::new()
        }
    }
}

/// A schedule that cannot be parsed degrades to disabled rather than
/// guessing a window; a bad zone name degrades to the product's home zone.
fn parse_quiet_hours(
    enabled: bool,
    start: Option<&str>,
    end: Option<&str>,
    timezone: Option<&str>,
    channel_id: &str,
) -> QuietHours {
    if !enabled {
        return QuietHours::disabled();
    }
    let (Some(start_raw), Some(end_raw)) = (start, end) else {
        warn!(channel_id, "quiet hours enabled without start/end, disabling");
        return QuietHours::disabled();
    };
    let (Some(start), Some(end)) = (parse_time(start_raw), parse_time(end_raw)) else {
        warn!(channel_id, start = start_raw, end = end_raw, "unparseable quiet hours, disabling");
        return QuietHours::disabled();
    };
    let timezone = match timezone {
        Some(name) => match name.parse::<Tz>() {
            Ok(tz) => tz,
            Err(_) => {
                warn!(channel_id, timezone = name, "unknown timezone, falling back to Europe/London");
                DEFAULT_TIMEZONE
            }
        },
        None => DEFAULT_TIMEZONE,
    };
    QuietHours { enabled: true, start, end, timezone }
}

fn parse_time(raw: &str) -> Option<NaiveTime> {
    NaiveTime::parse_from_str(raw, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(raw, "%H:%M:%S"))
        .ok()
}
