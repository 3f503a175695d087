//! Display helpers for tables and console output.

use chrono::NaiveDateTime;

/// `dd.mm.YYYY HH:MM:SS`
pub fn timestamp(ts: &NaiveDateTime) -> String {
    ts.format("%d.%m.%Y %H:%M:%S").to_string()
}

/// Whole minutes as `"{h}h {m}m"`, or `"{m}m"` under an hour.
pub fn duration_hours(hours: f64) -> String {
    if hours.is_nan() || hours <= 0.0 {
        return "0m".to_string();
    }
    // Hours come from integer milliseconds; round back to them before flooring.
    let minutes = (hours * 3_600_000.0).round() as u64 / 60_000;
    let (h, m) = (minutes / 60, minutes % 60);
    if h > 0 {
        format!("{}h {}m", h, m)
    } else {
        format!("{}m", m)
    }
}

pub fn map_link(lat: f64, lon: f64) -> String {
    format!("https://www.google.com/maps?q={},{}", lat, lon)
}
