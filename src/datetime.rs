// Timestamp formatting for date dimensions and date-valued formulas

use crate::parser::{tokenize, DateToken};
use chrono::{DateTime, Datelike, FixedOffset, Timelike, Utc};

/// Day-level bucket used when a date dimension has no explicit pattern
pub const DEFAULT_DATE_PATTERN: &str = "YYYY-MM-DD";

/// Bucketing patterns offered by the configuration form
pub const DATETIME_FORMATTER_TYPES: [&str; 5] = [
    "YYYY-MM-DD",
    "YYYY-[W]ww",
    "YYYY-MM",
    "YYYY-[Q]Q",
    "YYYY",
];

/// Format a Unix-millisecond timestamp with a dayjs-style pattern.
/// Returns `None` for timestamps chrono cannot represent.
pub fn format_timestamp(millis: f64, pattern: &str, utc_offset_minutes: i32) -> Option<String> {
    if !millis.is_finite() {
        return None;
    }
    let offset = FixedOffset::east_opt(utc_offset_minutes.checked_mul(60)?)?;
    let utc = DateTime::<Utc>::from_timestamp_millis(millis as i64)?;
    let local = utc.with_timezone(&offset);
    Some(render(&tokenize(pattern), &local))
}

fn render(tokens: &[DateToken], dt: &DateTime<FixedOffset>) -> String {
    let mut out = String::new();
    for token in tokens {
        match token {
            DateToken::Year4 => out.push_str(&format!("{:04}", dt.year())),
            DateToken::Year2 => out.push_str(&format!("{:02}", dt.year().rem_euclid(100))),
            DateToken::Quarter => out.push_str(&((dt.month() - 1) / 3 + 1).to_string()),
            DateToken::Month2 => out.push_str(&format!("{:02}", dt.month())),
            DateToken::Month => out.push_str(&dt.month().to_string()),
            DateToken::Day2 => out.push_str(&format!("{:02}", dt.day())),
            DateToken::Day => out.push_str(&dt.day().to_string()),
            DateToken::DayOrdinal => out.push_str(&ordinal(dt.day())),
            DateToken::Week2 => out.push_str(&format!("{:02}", dt.iso_week().week())),
            DateToken::Week => out.push_str(&dt.iso_week().week().to_string()),
            DateToken::Hour24Padded => out.push_str(&format!("{:02}", dt.hour())),
            DateToken::Hour24 => out.push_str(&dt.hour().to_string()),
            DateToken::Hour12Padded => out.push_str(&format!("{:02}", hour12(dt.hour()))),
            DateToken::Hour12 => out.push_str(&hour12(dt.hour()).to_string()),
            DateToken::Minute2 => out.push_str(&format!("{:02}", dt.minute())),
            DateToken::Minute => out.push_str(&dt.minute().to_string()),
            DateToken::Second2 => out.push_str(&format!("{:02}", dt.second())),
            DateToken::Second => out.push_str(&dt.second().to_string()),
            DateToken::MeridiemUpper => out.push_str(if dt.hour() < 12 { "AM" } else { "PM" }),
            DateToken::MeridiemLower => out.push_str(if dt.hour() < 12 { "am" } else { "pm" }),
            DateToken::Literal(s) => out.push_str(s),
        }
    }
    out
}

fn hour12(hour: u32) -> u32 {
    match hour % 12 {
        0 => 12,
        h => h,
    }
}

fn ordinal(day: u32) -> String {
    let suffix = match (day % 10, day % 100) {
        (_, 11..=13) => "th",
        (1, _) => "st",
        (2, _) => "nd",
        (3, _) => "rd",
        _ => "th",
    };
    format!("{day}{suffix}")
}
