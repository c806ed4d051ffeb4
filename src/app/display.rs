use chrono::{Local, TimeZone};

pub(crate) fn truncate(s: &str, max: usize) -> String {
    let mut out = s.to_string();
    if out.chars().count() > max {
        out = out.chars().take(max.saturating_sub(3)).collect::<String>() + "...";
    }
    out
}

/// Local time of a Unix-millisecond timestamp, or the raw number if it is out of range.
pub(crate) fn format_saved_at(timestamp_ms: i64) -> String {
    Local
        .timestamp_millis_opt(timestamp_ms)
        .single()
        .map(|dt| dt.format("%Y-%m-%d %H:%M %:z").to_string())
        .unwrap_or_else(|| timestamp_ms.to_string())
}

pub(crate) fn percentage_ratio(percentage: &str) -> Option<f64> {
    let value = percentage.trim().trim_end_matches('%').parse::<f64>().ok()?;
    if !value.is_finite() {
        return None;
    }
    Some((value / 100.0).clamp(0.0, 1.0))
}

/// `#007 (17.50%)`, the way resume points are labelled everywhere.
pub(crate) fn resume_label(row_id: &str, percentage: &str) -> String {
    format!("#{row_id} ({percentage}%)")
}
