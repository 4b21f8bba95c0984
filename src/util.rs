use chrono::{DateTime, NaiveDate, NaiveDateTime};

use crate::error::PruneError;

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
];

const DATE_FORMATS: &[&str] = &[
    "%Y-%m-%d",
    "%Y/%m/%d",
    "%Y.%m.%d",
    "%m/%d/%Y",
    "%m-%d-%Y",
    "%d %b %Y",
    "%d %B %Y",
    "%b %d %Y",
    "%B %d %Y",
    "%b %d, %Y",
    "%B %d, %Y",
];

/// Parse a date the way an operator is likely to type it.
///
/// Accepts ISO dates and datetimes (the time part is dropped), RFC 3339,
/// `YYYY/MM/DD`, `YYYY.MM.DD`, compact `YYYYMMDD`, month-first `MM/DD/YYYY`
/// and `MM-DD-YYYY`, and month names (`1 Jan 2023`, `January 1, 2023`).
pub fn parse_date(raw: &str) -> Result<NaiveDate, PruneError> {
    let s = raw.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.date_naive());
    }
    if let Some(date) = parse_compact(s) {
        return Ok(date);
    }
    for format in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, format) {
            return Ok(dt.date());
        }
    }
    for format in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(s, format) {
            return Ok(date);
        }
    }

    Err(PruneError::InvalidDate(raw.to_string()))
}

/// `YYYYMMDD`
fn parse_compact(s: &str) -> Option<NaiveDate> {
    if s.len() != 8 || !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let year = s[0..4].parse().ok()?;
    let month = s[4..6].parse().ok()?;
    let day = s[6..8].parse().ok()?;
    NaiveDate::from_ymd_opt(year, month, day)
}
