use chrono::NaiveTime;
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use crate::filter::evidence::MatchDetails;

// ---------------------------------------------------------------------------
// Scraped deal (candidate)
// ---------------------------------------------------------------------------

/// A candidate item discovered by the scraper. Transient input to the
/// evaluator; `search_term` names the configured term that surfaced it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScrapedDeal {
    pub id: String,
    pub title: String,
    pub link: String,
    pub price: Option<f64>,
    /// Percentage off, when the listing carries one.
    pub discount: Option<f64>,
    pub merchant: Option<String>,
    pub search_term: String,
}

// ---------------------------------------------------------------------------
// Filter configuration
// ---------------------------------------------------------------------------

/// What one channel wants to match. Immutable per evaluation call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilterConfig {
    pub search_term: String,
    pub include_keywords: Vec<String>,
    pub exclude_keywords: Vec<String>,
    pub case_sensitive: bool,
    pub max_price: Option<f64>,
    pub min_discount: Option<f64>,
}

impl FilterConfig {
    /// A config that matches `term` with no further constraints.
    pub fn for_term(term: &str) -> Self {
        Self {
            search_term: term.to_string(),
            include_keywords: Vec::new(),
            exclude_keywords: Vec::new(),
            case_sensitive: false,
            max_price: None,
            min_discount: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Filter outcome
// ---------------------------------------------------------------------------

/// Closed set of filter outcomes. The serialized forms are part of the
/// persisted schema and must not change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterStatus {
    Passed,
    FilteredNoMatch,
    FilteredExclude,
    FilteredInclude,
    FilteredPriceTooHigh,
    FilteredDiscountTooLow,
}

impl std::fmt::Display for FilterStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            FilterStatus::Passed => "passed",
            FilterStatus::FilteredNoMatch => "filtered_no_match",
            FilterStatus::FilteredExclude => "filtered_exclude",
            FilterStatus::FilteredInclude => "filtered_include",
            FilterStatus::FilteredPriceTooHigh => "filtered_price_too_high",
            FilterStatus::FilteredDiscountTooLow => "filtered_discount_too_low",
        };
        write!(f, "{s}")
    }
}

impl FilterStatus {
    pub fn from_str_status(s: &str) -> Option<Self> {
        match s {
            "passed" => Some(FilterStatus::Passed),
            "filtered_no_match" => Some(FilterStatus::FilteredNoMatch),
            "filtered_exclude" => Some(FilterStatus::FilteredExclude),
            "filtered_include" => Some(FilterStatus::FilteredInclude),
            "filtered_price_too_high" => Some(FilterStatus::FilteredPriceTooHigh),
            "filtered_discount_too_low" => Some(FilterStatus::FilteredDiscountTooLow),
            _ => None,
        }
    }
}

/// Result of evaluating one deal against one config.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterResult {
    pub passed: bool,
    pub filter_status: FilterStatus,
    pub filter_reason: Option<String>,
    pub match_details: Option<MatchDetails>,
}

// ---------------------------------------------------------------------------
// Channels and quiet hours
// ---------------------------------------------------------------------------

/// Per-channel quiet-hours schedule. `start`/`end` are local times of day in
/// `timezone`; `start > end` means the window wraps midnight.
#[derive(Debug, Clone, PartialEq)]
pub struct QuietHours {
    pub enabled: bool,
    pub start: NaiveTime,
    pub end: NaiveTime,
    pub timezone: Tz,
}

impl QuietHours {
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            start: NaiveTime::MIN,
            end: NaiveTime::MIN,
            timezone: chrono_tz::UTC,
        }
    }
}

/// A notification destination with its schedule and filter configs.
/// Read-only from this service's perspective — the management surface owns
/// the rows these are loaded from.
#[derive(Debug, Clone)]
pub struct Channel {
    pub id: String,
    pub name: String,
    pub webhook_url: String,
    pub quiet_hours: QuietHours,
    pub configs: Vec<FilterConfig>,
}

// ---------------------------------------------------------------------------
// Delivery
// ---------------------------------------------------------------------------

/// What the notification transport consumes, single or batched.
#[derive(Debug, Clone)]
pub struct DeliverableDeal {
    pub deal_id: String,
    pub title: String,
    pub link: String,
    pub price: Option<f64>,
    pub merchant: Option<String>,
    pub match_summary: String,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
