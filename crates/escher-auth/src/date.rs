//! Date formats used on the wire.
//!
//! Escher signs with the long date `YYYYMMDDTHHMMSSZ` and binds the short date
//! `YYYYMMDD` into the credential. A date header named `Date` carries an
//! RFC 1123 date instead.

use chrono::{DateTime, NaiveDateTime, Utc};

use crate::error::EscherError;

const LONG_DATE_FORMAT: &str = "%Y%m%dT%H%M%SZ";
const SHORT_DATE_FORMAT: &str = "%Y%m%d";
const HTTP_DATE_FORMAT: &str = "%a, %d %b %Y %H:%M:%S GMT";

/// Format as `YYYYMMDDTHHMMSSZ`.
#[must_use]
pub fn long_date(date: &DateTime<Utc>) -> String {
    date.format(LONG_DATE_FORMAT).to_string()
}

/// Format as `YYYYMMDD`.
#[must_use]
pub fn short_date(date: &DateTime<Utc>) -> String {
    date.format(SHORT_DATE_FORMAT).to_string()
}

/// Format as an RFC 1123 HTTP date.
#[must_use]
pub fn http_date(date: &DateTime<Utc>) -> String {
    date.format(HTTP_DATE_FORMAT).to_string()
}

/// Parse a date as found in a date header or presigned query.
///
/// Accepts the long format, RFC 1123 / RFC 2822 and RFC 3339.
///
/// # Errors
///
/// Returns [`EscherError::InvalidDate`] if none of the formats match.
///
/// # Examples
///
/// ```
/// use escher_auth::date::{long_date, parse_request_date};
///
/// let a = parse_request_date("20110909T233600Z").unwrap();
/// let b = parse_request_date("Fri, 09 Sep 2011 23:36:00 GMT").unwrap();
/// assert_eq!(a, b);
/// assert_eq!(long_date(&a), "20110909T233600Z");
/// ```
pub fn parse_request_date(value: &str) -> Result<DateTime<Utc>, EscherError> {
    let value = value.trim();
    if let Ok(naive) = NaiveDateTime::parse_from_str(value, LONG_DATE_FORMAT) {
        return Ok(naive.and_utc());
    }
    if let Ok(date) = DateTime::parse_from_rfc2822(value) {
        return Ok(date.with_timezone(&Utc));
    }
    parse_iso_date(value)
}

/// Parse an RFC 3339 date such as `2021-01-01T00:00:00Z`.
///
/// # Errors
///
/// Returns [`EscherError::InvalidDate`] if the value is not RFC 3339.
pub fn parse_iso_date(value: &str) -> Result<DateTime<Utc>, EscherError> {
    DateTime::parse_from_rfc3339(value.trim())
        .map(|date| date.with_timezone(&Utc))
        .map_err(|_| EscherError::InvalidDate(value.to_owned()))
}
