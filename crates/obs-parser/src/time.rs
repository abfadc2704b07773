//! Provider timestamp encodings and their conversion to canonical UTC instants.
//!
//! Every canonical timestamp is a `DateTime<Utc>` rounded to the whole second.
//! The source zone is always stated by the provider configuration; nothing is
//! inferred from the host locale.

use std::fmt;

use chrono::{
    DateTime, Datelike, DurationRound, FixedOffset, LocalResult, NaiveDate, NaiveDateTime,
    TimeDelta, TimeZone, Utc,
};
use chrono_tz::Tz;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum TimeParseError {
    #[error("expected {expected} timestamp field(s) but found {found}")]
    Arity { expected: usize, found: usize },

    #[error("'{value}' does not match any of the formats {formats:?}")]
    NoMatchingFormat { value: String, formats: Vec<String> },

    #[error("'{value}' is not a valid {what}")]
    InvalidNumber { value: String, what: &'static str },

    #[error("day of year {day} is outside year {year}")]
    DayOutOfRange { year: i32, day: f64 },

    #[error("local time {value} does not exist in {zone}")]
    NonexistentLocalTime { value: String, zone: String },

    #[error("timestamp '{value}' is out of range")]
    OutOfRange { value: String },

    #[error("invalid UTC offset of {0} seconds")]
    InvalidOffset(i32),
}

/// The zone a provider records local wall-clock times in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SourceZone {
    #[default]
    Utc,
    /// Seconds east of UTC, e.g. `-8 * 3600` for Pacific standard time.
    FixedOffset(i32),
    Named(Tz),
}

impl SourceZone {
    pub fn hours(offset_hours: i32) -> Self {
        SourceZone::FixedOffset(offset_hours * 3600)
    }

    pub fn to_utc(&self, local: NaiveDateTime) -> Result<DateTime<Utc>, TimeParseError> {
        match self {
            SourceZone::Utc => Ok(local.and_utc()),
            SourceZone::FixedOffset(seconds) => {
                let offset =
                    FixedOffset::east_opt(*seconds).ok_or(TimeParseError::InvalidOffset(*seconds))?;
                resolve_local(offset.from_local_datetime(&local), local, self)
            }
            SourceZone::Named(tz) => resolve_local(tz.from_local_datetime(&local), local, self),
        }
    }

    pub fn from_utc(&self, instant: DateTime<Utc>) -> Result<NaiveDateTime, TimeParseError> {
        match self {
            SourceZone::Utc => Ok(instant.naive_utc()),
            SourceZone::FixedOffset(seconds) => {
                let offset =
                    FixedOffset::east_opt(*seconds).ok_or(TimeParseError::InvalidOffset(*seconds))?;
                Ok(instant.with_timezone(&offset).naive_local())
            }
            SourceZone::Named(tz) => Ok(instant.with_timezone(tz).naive_local()),
        }
    }
}

impl fmt::Display for SourceZone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceZone::Utc => f.write_str("UTC"),
            SourceZone::FixedOffset(seconds) => {
                let sign = if *seconds < 0 { '-' } else { '+' };
                let abs = seconds.unsigned_abs();
                write!(f, "UTC{sign}{:02}:{:02}", abs / 3600, (abs % 3600) / 60)
            }
            SourceZone::Named(tz) => f.write_str(tz.name()),
        }
    }
}

// Ambiguous wall-clock times (DST fall-back) resolve to the earlier instant.
fn resolve_local<Z: TimeZone>(
    result: LocalResult<DateTime<Z>>,
    local: NaiveDateTime,
    zone: &SourceZone,
) -> Result<DateTime<Utc>, TimeParseError> {
    result
        .earliest()
        .map(|dt| dt.with_timezone(&Utc))
        .ok_or_else(|| TimeParseError::NonexistentLocalTime {
            value: local.to_string(),
            zone: zone.to_string(),
        })
}

/// How a provider writes timestamps.
#[derive(Debug, Clone, PartialEq)]
pub enum TimeEncoding {
    /// chrono format strings tried in order against the space-joined parts.
    Pattern { formats: Vec<String>, zone: SourceZone },
    /// ISO 8601 text; an explicit offset wins over `zone`.
    Iso8601 { zone: SourceZone },
    /// Two parts: year and (fractional) day of year, day 1.0 being Jan 1 00:00.
    YearDay { zone: SourceZone },
    /// POSIX seconds, integral or fractional.
    EpochSeconds,
}

const ISO_NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
    "%Y/%m/%d %H:%M:%S",
    "%Y/%m/%d %H:%M",
];

impl TimeEncoding {
    pub fn pattern(formats: &[&str], zone: SourceZone) -> Self {
        TimeEncoding::Pattern {
            formats: formats.iter().map(|f| (*f).to_string()).collect(),
            zone,
        }
    }

    /// Number of raw fields this encoding consumes.
    pub fn arity(&self) -> usize {
        match self {
            TimeEncoding::YearDay { .. } => 2,
            _ => 1,
        }
    }

    pub fn normalize(&self, parts: &[&str]) -> Result<DateTime<Utc>, TimeParseError> {
        match self {
            TimeEncoding::Pattern { formats, zone } => {
                let joined = join_parts(parts);
                let local = parse_naive(&joined, formats.iter().map(String::as_str))
                    .ok_or_else(|| TimeParseError::NoMatchingFormat {
                        value: joined.clone(),
                        formats: formats.clone(),
                    })?;
                round_to_second(zone.to_utc(local)?)
            }
            TimeEncoding::Iso8601 { zone } => {
                let joined = join_parts(parts);
                if let Ok(dt) = DateTime::parse_from_rfc3339(&joined) {
                    return round_to_second(dt.with_timezone(&Utc));
                }
                if let Some(local) = parse_naive(&joined, ISO_NAIVE_FORMATS.iter().copied()) {
                    return round_to_second(zone.to_utc(local)?);
                }
                let date = NaiveDate::parse_from_str(&joined, "%Y-%m-%d").map_err(|_| {
                    TimeParseError::NoMatchingFormat {
                        value: joined.clone(),
                        formats: iso_format_names(),
                    }
                })?;
                zone.to_utc(date.and_time(chrono::NaiveTime::MIN))
            }
            TimeEncoding::YearDay { zone } => {
                expect_arity(parts, 2)?;
                let year: i32 = parts[0].trim().parse().map_err(|_| TimeParseError::InvalidNumber {
                    value: parts[0].trim().to_string(),
                    what: "year",
                })?;
                let day: f64 = parts[1].trim().parse().map_err(|_| TimeParseError::InvalidNumber {
                    value: parts[1].trim().to_string(),
                    what: "day of year",
                })?;
                let local = year_day_to_naive(year, day)?;
                zone.to_utc(local)
            }
            TimeEncoding::EpochSeconds => {
                expect_arity(parts, 1)?;
                let raw = parts[0].trim();
                let seconds = match raw.parse::<i64>() {
                    Ok(seconds) => seconds,
                    Err(_) => {
                        let value: f64 = raw.parse().map_err(|_| TimeParseError::InvalidNumber {
                            value: raw.to_string(),
                            what: "epoch seconds value",
                        })?;
                        if !value.is_finite() {
                            return Err(TimeParseError::OutOfRange {
                                value: raw.to_string(),
                            });
                        }
                        value.round() as i64
                    }
                };
                DateTime::from_timestamp(seconds, 0).ok_or_else(|| TimeParseError::OutOfRange {
                    value: raw.to_string(),
                })
            }
        }
    }

    /// Renders `instant` back into this encoding's raw field(s).
    pub fn render(&self, instant: DateTime<Utc>) -> Result<Vec<String>, TimeParseError> {
        match self {
            TimeEncoding::Pattern { formats, zone } => {
                let format = formats.first().map(String::as_str).unwrap_or("%Y-%m-%d %H:%M:%S");
                Ok(vec![zone.from_utc(instant)?.format(format).to_string()])
            }
            TimeEncoding::Iso8601 { zone } => Ok(vec![zone
                .from_utc(instant)?
                .format("%Y-%m-%dT%H:%M:%S")
                .to_string()]),
            TimeEncoding::YearDay { zone } => {
                let local = zone.from_utc(instant)?;
                let start = year_start(local.year())?;
                let elapsed = (local - start).num_seconds() as f64;
                let day = 1.0 + elapsed / 86_400.0;
                Ok(vec![local.year().to_string(), format!("{day:.6}")])
            }
            TimeEncoding::EpochSeconds => Ok(vec![instant.timestamp().to_string()]),
        }
    }
}

fn expect_arity(parts: &[&str], expected: usize) -> Result<(), TimeParseError> {
    if parts.len() == expected {
        Ok(())
    } else {
        Err(TimeParseError::Arity {
            expected,
            found: parts.len(),
        })
    }
}

fn join_parts(parts: &[&str]) -> String {
    parts
        .iter()
        .flat_map(|part| part.split_whitespace())
        .collect::<Vec<_>>()
        .join(" ")
}

fn parse_naive<'a>(value: &str, formats: impl Iterator<Item = &'a str>) -> Option<NaiveDateTime> {
    formats
        .into_iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(value, fmt).ok())
}

fn iso_format_names() -> Vec<String> {
    let mut names = vec!["RFC 3339".to_string()];
    names.extend(ISO_NAIVE_FORMATS.iter().map(|f| (*f).to_string()));
    names.push("%Y-%m-%d".to_string());
    names
}

fn round_to_second(instant: DateTime<Utc>) -> Result<DateTime<Utc>, TimeParseError> {
    instant
        .duration_round(TimeDelta::seconds(1))
        .map_err(|_| TimeParseError::OutOfRange {
            value: instant.to_rfc3339(),
        })
}

fn year_start(year: i32) -> Result<NaiveDateTime, TimeParseError> {
    NaiveDate::from_yo_opt(year, 1)
        .map(|date| date.and_time(chrono::NaiveTime::MIN))
        .ok_or(TimeParseError::DayOutOfRange { year, day: 1.0 })
}

fn days_in_year(year: i32) -> u32 {
    NaiveDate::from_ymd_opt(year, 12, 31)
        .map(|date| date.ordinal())
        .unwrap_or(365)
}

pub(crate) fn year_day_to_naive(year: i32, day: f64) -> Result<NaiveDateTime, TimeParseError> {
    if !day.is_finite() || day < 1.0 || day >= f64::from(days_in_year(year)) + 1.0 {
        return Err(TimeParseError::DayOutOfRange { year, day });
    }
    let start = year_start(year)?;
    let seconds = ((day - 1.0) * 86_400.0).round() as i64;
    Ok(start + TimeDelta::seconds(seconds))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn utc(ts: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(ts)
            .expect("valid rfc3339")
            .with_timezone(&Utc)
    }

    #[test]
    fn epoch_seconds_one_day_apart() {
        let encoding = TimeEncoding::EpochSeconds;
        let a = encoding.normalize(&["0"]).unwrap();
        let b = encoding.normalize(&["86400"]).unwrap();
        assert_eq!(b - a, TimeDelta::hours(24));
        assert_eq!(a, utc("1970-01-01T00:00:00Z"));
    }

    #[test]
    fn year_day_handles_fraction_and_leap_years() {
        let encoding = TimeEncoding::YearDay {
            zone: SourceZone::Utc,
        };
        assert_eq!(
            encoding.normalize(&["2017", "335.5"]).unwrap(),
            utc("2017-12-01T12:00:00Z")
        );
        assert_eq!(
            encoding.normalize(&["2016", "366"]).unwrap(),
            utc("2016-12-31T00:00:00Z")
        );
        assert!(matches!(
            encoding.normalize(&["2017", "366"]),
            Err(TimeParseError::DayOutOfRange { year: 2017, .. })
        ));
        assert!(matches!(
            encoding.normalize(&["2017"]),
            Err(TimeParseError::Arity { expected: 2, found: 1 })
        ));
    }

    #[test]
    fn pattern_applies_fixed_offset() {
        let encoding = TimeEncoding::pattern(&["%m/%d/%Y %H:%M"], SourceZone::hours(-8));
        assert_eq!(
            encoding.normalize(&["07/01/2016 00:15"]).unwrap(),
            utc("2016-07-01T08:15:00Z")
        );
    }

    #[test]
    fn pattern_tolerates_repeated_whitespace_and_split_fields() {
        let encoding = TimeEncoding::pattern(&["%Y-%m-%d %H:%M"], SourceZone::Utc);
        assert_eq!(
            encoding.normalize(&["2017-12-01   03:00"]).unwrap(),
            utc("2017-12-01T03:00:00Z")
        );
        assert_eq!(
            encoding.normalize(&["2017-12-01", "03:00"]).unwrap(),
            utc("2017-12-01T03:00:00Z")
        );
    }

    #[test]
    fn named_zone_resolves_daylight_saving() {
        let encoding = TimeEncoding::pattern(
            &["%Y-%m-%d %H:%M:%S"],
            SourceZone::Named(chrono_tz::America::Los_Angeles),
        );
        assert_eq!(
            encoding.normalize(&["2017-07-01 12:00:00"]).unwrap(),
            utc("2017-07-01T19:00:00Z")
        );
        assert!(matches!(
            encoding.normalize(&["2017-03-12 02:30:00"]),
            Err(TimeParseError::NonexistentLocalTime { .. })
        ));
    }

    #[test]
    fn iso8601_accepts_offsets_and_varying_separators() {
        let encoding = TimeEncoding::Iso8601 {
            zone: SourceZone::Utc,
        };
        let expected = utc("2016-05-01T12:30:00Z");
        for raw in [
            "2016-05-01T12:30:00Z",
            "2016-05-01T05:30:00-07:00",
            "2016-05-01 12:30:00",
            "2016/05/01 12:30",
            "2016-05-01T12:30:00.4",
        ] {
            assert_eq!(encoding.normalize(&[raw]).unwrap(), expected, "{raw}");
        }
        assert_eq!(
            encoding.normalize(&["2016-05-01"]).unwrap(),
            utc("2016-05-01T00:00:00Z")
        );
        assert!(encoding.normalize(&["yesterday"]).is_err());
    }

    #[test]
    fn rendered_timestamps_parse_back_to_the_same_instant() {
        let instant = utc("2016-02-29T17:45:13Z");
        let encodings = [
            TimeEncoding::EpochSeconds,
            TimeEncoding::YearDay {
                zone: SourceZone::Utc,
            },
            TimeEncoding::YearDay {
                zone: SourceZone::hours(-8),
            },
            TimeEncoding::pattern(&["%m/%d/%Y %H:%M:%S"], SourceZone::hours(-8)),
            TimeEncoding::Iso8601 {
                zone: SourceZone::Named(chrono_tz::America::Los_Angeles),
            },
        ];
        for encoding in encodings {
            let rendered = encoding.render(instant).unwrap();
            let parts: Vec<&str> = rendered.iter().map(String::as_str).collect();
            assert_eq!(encoding.normalize(&parts).unwrap(), instant, "{encoding:?}");
        }
    }

    #[test]
    fn rejects_garbage_numbers() {
        assert!(matches!(
            TimeEncoding::EpochSeconds.normalize(&["abc"]),
            Err(TimeParseError::InvalidNumber { .. })
        ));
        assert!(TimeEncoding::EpochSeconds.normalize(&["1e400"]).is_err());
    }
}
