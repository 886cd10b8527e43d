//! Timestamps and their three wire formats.

use chrono::{NaiveDateTime, SecondsFormat, TimeZone, Utc};
use std::fmt;
use thiserror::Error;

const NANOS_PER_SECOND: u32 = 1_000_000_000;
const NANOS_PER_MILLI: u32 = 1_000_000;

/// Wire representation of a timestamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Format {
    /// RFC 3339 with a `Z` offset, e.g. `1985-04-12T23:20:50.52Z`.
    DateTime,
    /// IMF-fixdate, e.g. `Tue, 29 Apr 2014 18:30:38 GMT`.
    HttpDate,
    /// Seconds since the Unix epoch, with an optional fraction.
    EpochSeconds,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DateTimeParseError {
    #[error("invalid {format} timestamp `{value}`")]
    Invalid { format: &'static str, value: String },
    #[error("timestamp `{0}` is outside the representable range")]
    OutOfRange(String),
}

/// A point in time with nanosecond precision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DateTime {
    seconds: i64,
    subsecond_nanos: u32,
}

impl DateTime {
    pub fn from_secs(seconds: i64) -> Self {
        DateTime { seconds, subsecond_nanos: 0 }
    }

    pub fn from_millis(millis: i64) -> Self {
        DateTime {
            seconds: millis.div_euclid(1000),
            subsecond_nanos: millis.rem_euclid(1000) as u32 * NANOS_PER_MILLI,
        }
    }

    /// Builds a timestamp from whole seconds and a sub-second fraction.
    ///
    /// Nanos at or above one second carry into `seconds`.
    pub fn from_secs_and_nanos(seconds: i64, subsecond_nanos: u32) -> Self {
        DateTime {
            seconds: seconds + i64::from(subsecond_nanos / NANOS_PER_SECOND),
            subsecond_nanos: subsecond_nanos % NANOS_PER_SECOND,
        }
    }

    pub fn from_secs_f64(epoch_seconds: f64) -> Self {
        let seconds = epoch_seconds.floor();
        let nanos = ((epoch_seconds - seconds) * f64::from(NANOS_PER_SECOND)).round() as u32;
        DateTime::from_secs_and_nanos(seconds as i64, nanos)
    }

    pub fn secs(&self) -> i64 {
        self.seconds
    }

    pub fn subsec_nanos(&self) -> u32 {
        self.subsecond_nanos
    }

    pub fn as_secs_f64(&self) -> f64 {
        self.seconds as f64 + f64::from(self.subsecond_nanos) / f64::from(NANOS_PER_SECOND)
    }

    pub fn from_str(value: &str, format: Format) -> Result<Self, DateTimeParseError> {
        match format {
            Format::EpochSeconds => value
                .parse::<f64>()
                .ok()
                .filter(|v| v.is_finite())
                .map(DateTime::from_secs_f64)
                .ok_or_else(|| DateTimeParseError::Invalid {
                    format: "epoch-seconds",
                    value: value.to_string(),
                }),
            Format::DateTime => chrono::DateTime::parse_from_rfc3339(value)
                .map(|parsed| {
                    let utc = parsed.with_timezone(&Utc);
                    DateTime::from_secs_and_nanos(utc.timestamp(), utc.timestamp_subsec_nanos())
                })
                .map_err(|_| DateTimeParseError::Invalid {
                    format: "date-time",
                    value: value.to_string(),
                }),
            Format::HttpDate => parse_http_date(value),
        }
    }

    /// Renders the timestamp in `format`.
    ///
    /// Instants outside chrono's calendar range render as epoch seconds.
    pub fn fmt(&self, format: Format) -> String {
        let structured = match self.to_chrono() {
            Some(structured) if format != Format::EpochSeconds => structured,
            _ => return self.fmt_epoch_seconds(),
        };
        match format {
            Format::DateTime => {
                let precision = if self.subsecond_nanos == 0 {
                    SecondsFormat::Secs
                } else if self.subsecond_nanos % NANOS_PER_MILLI == 0 {
                    SecondsFormat::Millis
                } else {
                    SecondsFormat::Nanos
                };
                structured.to_rfc3339_opts(precision, true)
            }
            Format::HttpDate => {
                let base = structured.format("%a, %d %b %Y %H:%M:%S").to_string();
                if self.subsecond_nanos == 0 {
                    format!("{base} GMT")
                } else {
                    format!("{base}.{:03} GMT", self.subsecond_nanos / NANOS_PER_MILLI)
                }
            }
            Format::EpochSeconds => self.fmt_epoch_seconds(),
        }
    }

    fn fmt_epoch_seconds(&self) -> String {
        if self.subsecond_nanos == 0 {
            self.seconds.to_string()
        } else {
            let fraction = format!("{:09}", self.subsecond_nanos);
            format!("{}.{}", self.seconds, fraction.trim_end_matches('0'))
        }
    }

    fn to_chrono(self) -> Option<chrono::DateTime<Utc>> {
        Utc.timestamp_opt(self.seconds, self.subsecond_nanos).single()
    }
}

impl fmt::Display for DateTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&DateTime::fmt(self, Format::DateTime))
    }
}

fn parse_http_date(value: &str) -> Result<DateTime, DateTimeParseError> {
    let invalid = || DateTimeParseError::Invalid {
        format: "http-date",
        value: value.to_string(),
    };
    let body = value.strip_suffix(" GMT").ok_or_else(invalid)?;
    let (whole, nanos) = match body.rsplit_once('.') {
        Some((whole, fraction)) => {
            if fraction.is_empty() || fraction.len() > 9 || !fraction.bytes().all(|b| b.is_ascii_digit()) {
                return Err(invalid());
            }
            let padded = format!("{fraction:0<9}");
            (whole, padded.parse::<u32>().map_err(|_| invalid())?)
        }
        None => (body, 0),
    };
    let naive = NaiveDateTime::parse_from_str(whole, "%a, %d %b %Y %H:%M:%S").map_err(|_| invalid())?;
    Ok(DateTime::from_secs_and_nanos(naive.and_utc().timestamp(), nanos))
}
