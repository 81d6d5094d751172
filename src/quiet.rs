use chrono::{DateTime, Timelike, Utc};

use crate::types::QuietHours;

/// Whether `instant` falls inside the channel's quiet window.
///
/// The instant is converted to local time in the schedule's timezone and
/// tested against the half-open interval `[start, end)`. `start > end`
/// wraps midnight: 22:00–08:00 contains 23:30 and 02:00 but not 10:00.
/// `start == end` is an empty window. A disabled schedule is never quiet.
pub fn is_quiet(schedule: &QuietHours, instant: DateTime<Utc>) -> bool {
    if !schedule.enabled {
        return false;
    }
    let local = instant.with_timezone(&schedule.timezone).time();
    // Compare at second granularity — sub-second noise must not move an
    // instant across the window edge.
    let local = match local.with_nanosecond(0) {
        Some(t) => t,
        None => local,
    };
    if schedule.start <= schedule.end {
        local >= schedule.start && local < schedule.end
    } else {
        local >= schedule.start || local < schedule.end
    }
}
