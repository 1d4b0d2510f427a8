//! HTTP-date parsing and formatting.
//!
//! Accepts all three forms allowed for received dates:
//!
//! - IMF-fixdate: `Sun, 06 Nov 1994 08:49:37 GMT`
//! - RFC 850: `Sunday, 06-Nov-94 08:49:37 GMT`
//! - asctime: `Sun Nov  6 08:49:37 1994`
//!
//! Outgoing dates are always written as IMF-fixdate.

use chrono::{DateTime, NaiveDateTime, Utc};

const IMF_FIXDATE: &str = "%a, %d %b %Y %H:%M:%S GMT";
const RFC_850: &str = "%A, %d-%b-%y %H:%M:%S GMT";
const ASCTIME: &str = "%a %b %e %H:%M:%S %Y";

/// Parses an HTTP-date. Returns `None` for anything malformed.
pub fn parse_http_date(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }
    if let Ok(date) = DateTime::parse_from_rfc2822(value) {
        return Some(date.with_timezone(&Utc));
    }
    [IMF_FIXDATE, RFC_850, ASCTIME]
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(value, format).ok())
        .map(|naive| naive.and_utc())
}

/// Formats a timestamp as an IMF-fixdate.
pub fn format_http_date(date: DateTime<Utc>) -> String {
    date.format(IMF_FIXDATE).to_string()
}
