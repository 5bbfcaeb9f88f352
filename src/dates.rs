//! Publication-date resolution.
//!
//! Feeds publish dates in many conventions (RFC 2822 in RSS, RFC 3339 in
//! Atom, loose human formats in scraped pages). Everything is reduced to a
//! `YYYY-MM-DD` calendar date. When nothing parses the date stays unknown
//! (empty string); the current date is never substituted.

use crate::models::DateCandidates;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;

static LEADING_ISO_DATE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d{4})-(\d{1,2})-(\d{1,2})").unwrap());

static RFC822_DAY_MONTH_YEAR: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?:[A-Za-z]{3,9},?\s*)?(\d{1,2}\s+[A-Za-z]{3,9}\s+\d{4})").unwrap()
});

const NAIVE_DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
];

const OFFSET_DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S %z",
    "%Y-%m-%dT%H:%M:%S%z",
    "%a, %d %b %Y %H:%M %z",
    "%d %b %Y %H:%M:%S %z",
];

const DATE_FORMATS: &[&str] = &[
    "%Y/%m/%d",
    "%d/%m/%Y",
    "%d %b %Y",
    "%d %B %Y",
    "%B %d, %Y",
    "%b %d, %Y",
    "%a, %d %b %Y",
];

/// Resolve the best publication date from the candidates, or `""`.
///
/// Precedence: structured published, updated, created timestamps; then the
/// published, updated, created and `dc:date` strings in the standard feed
/// conventions; then the same strings through the lenient parser. The first
/// value that parses wins.
pub fn resolve(candidates: &DateCandidates) -> String {
    let structured = [
        candidates.published_at,
        candidates.updated_at,
        candidates.created_at,
    ];
    if let Some(ts) = structured.into_iter().flatten().next() {
        return ts.with_timezone(&Utc).date_naive().to_string();
    }

    let strings: Vec<&str> = [
        &candidates.published,
        &candidates.updated,
        &candidates.created,
        &candidates.dc_date,
    ]
    .into_iter()
    .filter_map(|s| s.as_deref())
    .map(str::trim)
    .filter(|s| !s.is_empty())
    .collect();

    strings
        .iter()
        .find_map(|s| parse_feed_convention(s))
        .or_else(|| strings.iter().find_map(|s| parse_lenient(s)))
        .map(|d| d.to_string())
        .unwrap_or_default()
}

/// Parse a single date string with every supported convention.
pub fn parse_date_str(s: &str) -> Option<NaiveDate> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }
    parse_feed_convention(s).or_else(|| parse_lenient(s))
}

/// Ordering key for an archive date; unknown dates map to 1970-01-01 so
/// they sort last in a descending order.
pub fn sort_key(date: &str) -> NaiveDate {
    parse_date_str(date).unwrap_or(DateTime::<Utc>::UNIX_EPOCH.date_naive())
}

fn parse_feed_convention(s: &str) -> Option<NaiveDate> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc).date_naive());
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(s) {
        return Some(dt.with_timezone(&Utc).date_naive());
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d").ok()
}

fn parse_lenient(s: &str) -> Option<NaiveDate> {
    let s = s.split_whitespace().collect::<Vec<_>>().join(" ");

    for fmt in OFFSET_DATETIME_FORMATS {
        if let Ok(dt) = DateTime::parse_from_str(&s, fmt) {
            return Some(dt.with_timezone(&Utc).date_naive());
        }
    }
    for fmt in NAIVE_DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(&s, fmt) {
            return Some(dt.date());
        }
    }
    for fmt in DATE_FORMATS {
        if let Ok(d) = NaiveDate::parse_from_str(&s, fmt) {
            return Some(d);
        }
    }

    // RFC 822 dates with zone names chrono does not know ("CEST", "HKT").
    if let Some(caps) = RFC822_DAY_MONTH_YEAR.captures(&s) {
        let day_month_year = &caps[1];
        if let Some(d) = ["%d %b %Y", "%d %B %Y"]
            .iter()
            .find_map(|fmt| NaiveDate::parse_from_str(day_month_year, fmt).ok())
        {
            return Some(d);
        }
    }

    let caps = LEADING_ISO_DATE.captures(&s)?;
    let year = caps[1].parse().ok()?;
    let month = caps[2].parse().ok()?;
    let day = caps[3].parse().ok()?;
    NaiveDate::from_ymd_opt(year, month, day)
}
