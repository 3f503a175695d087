//! Loosely-typed upstream values.
//!
//! The report service sends numeric columns either as JSON numbers or as
//! strings (sometimes with trailing units), so every numeric field goes
//! through [`LooseNumber`] before it reaches the typed model.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// A number that may arrive as a JSON number or as text.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LooseNumber {
    Number(f64),
    Text(String),
}

impl LooseNumber {
    /// Numeric value, or NaN when the text has no numeric prefix.
    pub fn to_f64(&self) -> f64 {
        match self {
            LooseNumber::Number(n) => *n,
            LooseNumber::Text(s) => parse_float_prefix(s),
        }
    }
}

impl From<f64> for LooseNumber {
    fn from(value: f64) -> Self {
        LooseNumber::Number(value)
    }
}

impl From<&str> for LooseNumber {
    fn from(value: &str) -> Self {
        LooseNumber::Text(value.to_string())
    }
}

/// Optional loose field to `f64`; missing, null and unparseable all give NaN.
pub fn loose_f64(value: Option<&LooseNumber>) -> f64 {
    value.map(LooseNumber::to_f64).unwrap_or(f64::NAN)
}

/// Optional loose field to `Option<f64>`, treating unparseable text as absent.
pub fn loose_opt(value: Option<&LooseNumber>) -> Option<f64> {
    value.map(LooseNumber::to_f64).filter(|v| !v.is_nan())
}

/// Parse the longest leading decimal literal of `text`.
///
/// Leading whitespace is skipped and trailing garbage is ignored, so
/// `"41.5 L"` reads as `41.5`. Returns NaN when no digits are found.
pub fn parse_float_prefix(text: &str) -> f64 {
    let s = text.trim_start();
    let bytes = s.as_bytes();
    let mut end = 0;

    if end < bytes.len() && (bytes[end] == b'+' || bytes[end] == b'-') {
        end += 1;
    }
    if s[end..].starts_with("Infinity") {
        return s[..end + "Infinity".len()].replace("Infinity", "inf").parse().unwrap_or(f64::NAN);
    }

    let mut digits = 0;
    while end < bytes.len() && bytes[end].is_ascii_digit() {
        end += 1;
        digits += 1;
    }
    if end < bytes.len() && bytes[end] == b'.' {
        end += 1;
        while end < bytes.len() && bytes[end].is_ascii_digit() {
            end += 1;
            digits += 1;
        }
    }
    if digits == 0 {
        return f64::NAN;
    }

    // Exponent only counts when it has at least one digit.
    if end < bytes.len() && (bytes[end] == b'e' || bytes[end] == b'E') {
        let mut exp_end = end + 1;
        if exp_end < bytes.len() && (bytes[exp_end] == b'+' || bytes[exp_end] == b'-') {
            exp_end += 1;
        }
        let exp_digits_start = exp_end;
        while exp_end < bytes.len() && bytes[exp_end].is_ascii_digit() {
            exp_end += 1;
        }
        if exp_end > exp_digits_start {
            end = exp_end;
        }
    }

    s[..end].parse().unwrap_or(f64::NAN)
}

const WDATE_FORMATS: [&str; 4] = [
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
];

/// Parse an upstream `wdate` (naive local time, no zone).
pub fn parse_wdate(text: &str) -> Option<NaiveDateTime> {
    let text = text.trim();
    WDATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(text, fmt).ok())
}
