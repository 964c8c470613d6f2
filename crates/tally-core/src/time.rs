//! Wall-clock helpers shared across the engine.

use chrono::{Local, LocalResult, TimeZone};

/// Current wall-clock time as unix seconds.
pub fn current_unix_time() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

/// Format unix seconds as a local `YYYY-MM-DD HH:MM:SS` string.
pub fn format_unix(ts: u64) -> String {
    match Local.timestamp_opt(ts as i64, 0) {
        LocalResult::Single(dt) => dt.format("%Y-%m-%d %H:%M:%S").to_string(),
        _ => format!("@{ts}"),
    }
}

/// Days from `now` until `deadline`, rounded to one decimal.
/// Zero once the deadline has passed.
pub fn days_until(deadline: u64, now: u64) -> f64 {
    if deadline <= now {
        return 0.0;
    }
    let days = (deadline - now) as f64 / 86_400.0;
    (days * 10.0).round() / 10.0
}
