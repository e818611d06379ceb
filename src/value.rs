//! Typed field values and invariant text coercion

use std::fmt;
use std::str::FromStr;

use base64::Engine;
use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, TimeDelta};
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::column::ColumnType;

/// A coerced field value.
///
/// `Null` stands for an empty field, a binary field that is not valid
/// base64, or a virtual column nobody resolved.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    #[default]
    Null,
    Text(String),
    Int16(i16),
    Int32(i32),
    Int64(i64),
    Double(f64),
    Single(f32),
    Decimal(Decimal),
    Boolean(bool),
    Byte(u8),
    Char(char),
    Guid(Uuid),
    Binary(Vec<u8>),
    DateTime(NaiveDateTime),
    DateTimeOffset(DateTime<FixedOffset>),
    TimeSpan(TimeDelta),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Borrow the text of a `Text` value
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Widen any integer variant
    pub fn as_i64(&self) -> Option<i64> {
        match *self {
            Value::Byte(v) => Some(v as i64),
            Value::Int16(v) => Some(v as i64),
            Value::Int32(v) => Some(v as i64),
            Value::Int64(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match *self {
            Value::Double(v) => Some(v),
            Value::Single(v) => Some(v as f64),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match *self {
            Value::Boolean(v) => Some(v),
            _ => None,
        }
    }

    /// Declared type that produces this variant; `None` for `Null`
    pub fn column_type(&self) -> Option<ColumnType> {
        Some(match self {
            Value::Null => return None,
            Value::Text(_) => ColumnType::Text,
            Value::Int16(_) => ColumnType::Int16,
            Value::Int32(_) => ColumnType::Int32,
            Value::Int64(_) => ColumnType::Int64,
            Value::Double(_) => ColumnType::Double,
            Value::Single(_) => ColumnType::Single,
            Value::Decimal(_) => ColumnType::Decimal,
            Value::Boolean(_) => ColumnType::Boolean,
            Value::Byte(_) => ColumnType::Byte,
            Value::Char(_) => ColumnType::Char,
            Value::Guid(_) => ColumnType::Guid,
            Value::Binary(_) => ColumnType::Binary,
            Value::DateTime(_) => ColumnType::DateTime,
            Value::DateTimeOffset(_) => ColumnType::DateTimeOffset,
            Value::TimeSpan(_) => ColumnType::TimeSpan,
        })
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => Ok(()),
            Value::Text(v) => f.write_str(v),
            Value::Int16(v) => write!(f, "{}", v),
            Value::Int32(v) => write!(f, "{}", v),
            Value::Int64(v) => write!(f, "{}", v),
            Value::Double(v) => write!(f, "{}", v),
            Value::Single(v) => write!(f, "{}", v),
            Value::Decimal(v) => write!(f, "{}", v),
            Value::Boolean(v) => write!(f, "{}", v),
            Value::Byte(v) => write!(f, "{}", v),
            Value::Char(v) => write!(f, "{}", v),
            Value::Guid(v) => write!(f, "{}", v),
            Value::Binary(v) => f.write_str(&base64::engine::general_purpose::STANDARD.encode(v)),
            Value::DateTime(v) => write!(f, "{}", v.format("%Y-%m-%dT%H:%M:%S%.f")),
            Value::DateTimeOffset(v) => write!(f, "{}", v.to_rfc3339()),
            Value::TimeSpan(v) => f.write_str(&format_time_span(v)),
        }
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int32(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int64(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Boolean(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Double(v)
    }
}

/// Coerce non-empty field text to `column_type`.
///
/// Returns `None` when the text does not parse. Binary fields never fail:
/// invalid base64 gives `Some(Value::Null)`.
pub fn coerce(raw: &str, column_type: ColumnType) -> Option<Value> {
    let trimmed = raw.trim();
    match column_type {
        ColumnType::Text => Some(Value::Text(raw.to_string())),
        ColumnType::Int16 => trimmed.parse().ok().map(Value::Int16),
        ColumnType::Int32 => trimmed.parse().ok().map(Value::Int32),
        ColumnType::Int64 => trimmed.parse().ok().map(Value::Int64),
        ColumnType::Byte => trimmed.parse().ok().map(Value::Byte),
        ColumnType::Double => trimmed.parse().ok().map(Value::Double),
        ColumnType::Single => trimmed.parse().ok().map(Value::Single),
        ColumnType::Decimal => parse_decimal(trimmed).map(Value::Decimal),
        ColumnType::Boolean => parse_bool(trimmed).map(Value::Boolean),
        ColumnType::Char => parse_char(raw).map(Value::Char),
        ColumnType::Guid => Uuid::parse_str(trimmed).ok().map(Value::Guid),
        ColumnType::Binary => Some(parse_binary(raw).map_or(Value::Null, Value::Binary)),
        ColumnType::DateTime => parse_datetime(trimmed).map(Value::DateTime),
        ColumnType::DateTimeOffset => parse_datetime_offset(trimmed).map(Value::DateTimeOffset),
        ColumnType::TimeSpan => parse_time_span(trimmed).map(Value::TimeSpan),
    }
}

fn parse_decimal(s: &str) -> Option<Decimal> {
    Decimal::from_str(s)
        .or_else(|_| Decimal::from_scientific(s))
        .ok()
}

fn parse_bool(s: &str) -> Option<bool> {
    if s.eq_ignore_ascii_case("true") {
        Some(true)
    } else if s.eq_ignore_ascii_case("false") {
        Some(false)
    } else {
        None
    }
}

fn parse_char(s: &str) -> Option<char> {
    let mut chars = s.chars();
    match (chars.next(), chars.next()) {
        (Some(ch), None) => Some(ch),
        _ => None,
    }
}

fn parse_binary(s: &str) -> Option<Vec<u8>> {
    let compact: String = s.chars().filter(|c| !c.is_ascii_whitespace()).collect();
    base64::engine::general_purpose::STANDARD.decode(compact).ok()
}

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
    "%m/%d/%Y %H:%M:%S%.f",
    "%m/%d/%Y %H:%M",
];

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%m/%d/%Y", "%Y/%m/%d"];

const DATETIME_OFFSET_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f %:z",
    "%Y-%m-%d %H:%M:%S%.f%:z",
    "%Y-%m-%dT%H:%M:%S%.f %:z",
    "%m/%d/%Y %H:%M:%S%.f %:z",
];

fn parse_naive(s: &str) -> Option<NaiveDateTime> {
    DATETIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
        .or_else(|| {
            DATE_FORMATS
                .iter()
                .find_map(|fmt| NaiveDate::parse_from_str(s, fmt).ok())
                .and_then(|date| date.and_hms_opt(0, 0, 0))
        })
}

fn parse_offset(s: &str) -> Option<DateTime<FixedOffset>> {
    DateTime::parse_from_rfc3339(s).ok().or_else(|| {
        DATETIME_OFFSET_FORMATS
            .iter()
            .find_map(|fmt| DateTime::parse_from_str(s, fmt).ok())
    })
}

/// Offset-bearing input is converted to UTC wall time
fn parse_datetime(s: &str) -> Option<NaiveDateTime> {
    parse_naive(s).or_else(|| parse_offset(s).map(|dt| dt.naive_utc()))
}

/// Offset-less input is taken as UTC
fn parse_datetime_offset(s: &str) -> Option<DateTime<FixedOffset>> {
    parse_offset(s).or_else(|| parse_naive(s).map(|dt| dt.and_utc().fixed_offset()))
}

/// `[-][d.]hh:mm[:ss[.fffffff]]` or a bare day count
fn parse_time_span(s: &str) -> Option<TimeDelta> {
    let (negative, body) = match s.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, s),
    };
    if body.is_empty() {
        return None;
    }

    let span = if !body.contains(':') {
        TimeDelta::try_days(parse_digits(body)?)?
    } else {
        let (days, clock) = match body.split_once('.') {
            Some((days, rest)) if rest.contains(':') => (parse_digits(days)?, rest),
            _ => (0, body),
        };

        let mut parts = clock.split(':');
        let hours = parse_digits(parts.next()?)?;
        let minutes = parse_digits(parts.next()?)?;
        let (seconds, nanos) = match parts.next() {
            Some(sec) => parse_seconds(sec)?,
            None => (0, 0),
        };
        if parts.next().is_some() || hours > 23 || minutes > 59 || seconds > 59 {
            return None;
        }

        TimeDelta::try_days(days)?
            .checked_add(&TimeDelta::try_hours(hours)?)?
            .checked_add(&TimeDelta::try_minutes(minutes)?)?
            .checked_add(&TimeDelta::try_seconds(seconds)?)?
            .checked_add(&TimeDelta::nanoseconds(nanos))?
    };

    Some(if negative { -span } else { span })
}

fn parse_digits(s: &str) -> Option<i64> {
    if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    s.parse().ok()
}

/// Seconds with an optional fraction of up to 9 digits
fn parse_seconds(s: &str) -> Option<(i64, i64)> {
    let (whole, fraction) = match s.split_once('.') {
        Some((whole, fraction)) => (whole, fraction),
        None => (s, ""),
    };
    let seconds = parse_digits(whole)?;
    if fraction.is_empty() {
        return Some((seconds, 0));
    }
    if fraction.len() > 9 {
        return None;
    }
    let digits = parse_digits(fraction)?;
    let nanos = digits * 10i64.pow(9 - fraction.len() as u32);
    Some((seconds, nanos))
}

fn format_time_span(span: &TimeDelta) -> String {
    let sign = if *span < TimeDelta::zero() { "-" } else { "" };
    let abs = span.abs();
    let days = abs.num_days();
    let hours = abs.num_hours() % 24;
    let minutes = abs.num_minutes() % 60;
    let seconds = abs.num_seconds() % 60;
    let nanos = abs.subsec_nanos();

    let mut out = String::from(sign);
    if days > 0 {
        out.push_str(&format!("{}.", days));
    }
    out.push_str(&format!("{:02}:{:02}:{:02}", hours, minutes, seconds));
    if nanos > 0 {
        out.push_str(&format!(".{:07}", nanos / 100));
    }
    out
}
