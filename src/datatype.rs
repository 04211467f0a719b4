//! Built-in value datatypes referenced by `matches` constraints.
//!
//! Each datatype validates the textual form of a field or flag value. Parsing
//! is delegated to `chrono`, `uuid`, `base64` and `std::net` where those
//! crates define the lexical space; the remaining types use anchored regexes.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::net::{Ipv4Addr, Ipv6Addr};
use std::str::FromStr;
use std::sync::LazyLock;

// ─── Cached regexes ─────────────────────────────────────────────────────────

static TOKEN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\p{L}|_)(\p{L}|\p{N}|[.\-_])*$").unwrap());

static NCNAME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[\p{L}_][\p{L}\p{N}.\-_]*$").unwrap());

static INTEGER_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[-+]?[0-9]+$").unwrap());

static DECIMAL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[-+]?([0-9]+(\.[0-9]*)?|\.[0-9]+)$").unwrap());

static URI_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-zA-Z][a-zA-Z0-9+.\-]*:[^\s]*$").unwrap());

static URI_REFERENCE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[^\s]*$").unwrap());

static EMAIL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap());

static HOSTNAME_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([a-zA-Z0-9]([a-zA-Z0-9\-]{0,61}[a-zA-Z0-9])?\.)*[a-zA-Z0-9]([a-zA-Z0-9\-]{0,61}[a-zA-Z0-9])?$")
        .unwrap()
});

static DAY_TIME_DURATION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^-?P([0-9]+D(T([0-9]+H)?([0-9]+M)?([0-9]+(\.[0-9]+)?S)?)?|T([0-9]+H)?([0-9]+M)?([0-9]+(\.[0-9]+)?S)?)$")
        .unwrap()
});

static YEAR_MONTH_DURATION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^-?P([0-9]+Y([0-9]+M)?|[0-9]+M)$").unwrap());

static TIMEZONE_SUFFIX_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(Z|[+-][0-9]{2}:[0-9]{2})$").unwrap());

/// A named datatype whose lexical space a value must belong to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DataType {
    String,
    Token,
    NcName,
    Integer,
    PositiveInteger,
    NonNegativeInteger,
    Decimal,
    Boolean,
    Date,
    DateTime,
    DateWithTimezone,
    DateTimeWithTimezone,
    Uuid,
    Uri,
    UriReference,
    EmailAddress,
    Hostname,
    IpV4Address,
    IpV6Address,
    Base64,
    DayTimeDuration,
    YearMonthDuration,
}

impl DataType {
    pub fn name(self) -> &'static str {
        match self {
            DataType::String => "string",
            DataType::Token => "token",
            DataType::NcName => "nc-name",
            DataType::Integer => "integer",
            DataType::PositiveInteger => "positive-integer",
            DataType::NonNegativeInteger => "non-negative-integer",
            DataType::Decimal => "decimal",
            DataType::Boolean => "boolean",
            DataType::Date => "date",
            DataType::DateTime => "date-time",
            DataType::DateWithTimezone => "date-with-timezone",
            DataType::DateTimeWithTimezone => "date-time-with-timezone",
            DataType::Uuid => "uuid",
            DataType::Uri => "uri",
            DataType::UriReference => "uri-reference",
            DataType::EmailAddress => "email-address",
            DataType::Hostname => "hostname",
            DataType::IpV4Address => "ip-v4-address",
            DataType::IpV6Address => "ip-v6-address",
            DataType::Base64 => "base64",
            DataType::DayTimeDuration => "day-time-duration",
            DataType::YearMonthDuration => "year-month-duration",
        }
    }

    /// Check that `value` is in this datatype's lexical space.
    ///
    /// Returns a short description of the failure on mismatch.
    pub fn validate(self, value: &str) -> Result<(), String> {
        let ok = match self {
            DataType::String => !value.is_empty() && value.trim() == value,
            DataType::Token => TOKEN_RE.is_match(value),
            DataType::NcName => NCNAME_RE.is_match(value),
            DataType::Integer => INTEGER_RE.is_match(value),
            DataType::PositiveInteger => integer_sign(value) == Some(Ordering::Greater),
            DataType::NonNegativeInteger => {
                integer_sign(value).is_some_and(|sign| sign != Ordering::Less)
            }
            DataType::Decimal => DECIMAL_RE.is_match(value),
            DataType::Boolean => matches!(value, "true" | "false" | "1" | "0"),
            DataType::Date => parse_date(value, false),
            DataType::DateWithTimezone => parse_date(value, true),
            DataType::DateTime => parse_date_time(value, false),
            DataType::DateTimeWithTimezone => parse_date_time(value, true),
            DataType::Uuid => uuid::Uuid::parse_str(value).is_ok() && value.len() == 36,
            DataType::Uri => URI_RE.is_match(value),
            DataType::UriReference => URI_REFERENCE_RE.is_match(value),
            DataType::EmailAddress => EMAIL_RE.is_match(value),
            DataType::Hostname => value.len() <= 253 && HOSTNAME_RE.is_match(value),
            DataType::IpV4Address => Ipv4Addr::from_str(value).is_ok(),
            DataType::IpV6Address => Ipv6Addr::from_str(value).is_ok(),
            DataType::Base64 => !value.is_empty() && STANDARD.decode(value).is_ok(),
            DataType::DayTimeDuration => {
                DAY_TIME_DURATION_RE.is_match(value) && !value.ends_with('T')
            }
            DataType::YearMonthDuration => YEAR_MONTH_DURATION_RE.is_match(value),
        };

        if ok {
            Ok(())
        } else {
            Err(format!("'{}' is not a valid {}", value, self.name()))
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for DataType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        serde_json::from_value(serde_json::Value::String(s.to_string()))
            .map_err(|_| format!("unknown datatype: '{}'", s))
    }
}

/// Sign of an integer literal of any length; `-0` is zero.
fn integer_sign(value: &str) -> Option<Ordering> {
    if !INTEGER_RE.is_match(value) {
        return None;
    }
    let digits = value.trim_start_matches(['-', '+']);
    Some(if digits.bytes().all(|b| b == b'0') {
        Ordering::Equal
    } else if value.starts_with('-') {
        Ordering::Less
    } else {
        Ordering::Greater
    })
}

fn parse_date(value: &str, require_timezone: bool) -> bool {
    let (date, zone) = split_timezone(value);
    if require_timezone && zone.is_none() {
        return false;
    }
    chrono::NaiveDate::parse_from_str(date, "%Y-%m-%d").is_ok()
}

fn parse_date_time(value: &str, require_timezone: bool) -> bool {
    match split_timezone(value) {
        (_, Some(_)) => chrono::DateTime::parse_from_rfc3339(value).is_ok(),
        (local, None) => {
            !require_timezone
                && (chrono::NaiveDateTime::parse_from_str(local, "%Y-%m-%dT%H:%M:%S").is_ok()
                    || chrono::NaiveDateTime::parse_from_str(local, "%Y-%m-%dT%H:%M:%S%.f")
                        .is_ok())
        }
    }
}

fn split_timezone(value: &str) -> (&str, Option<&str>) {
    match TIMEZONE_SUFFIX_RE.find(value) {
        Some(m) => (&value[..m.start()], Some(m.as_str())),
        None => (value, None),
    }
}
