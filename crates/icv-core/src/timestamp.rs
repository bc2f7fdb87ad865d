//! Wall-clock timestamps.
//!
//! Timestamps travel as local wall-clock strings (`YYYY-MM-DD HH:MM:SS`) in
//! the time zone of the monitored network. All arithmetic happens on absolute
//! instants obtained through [`instant`], so durations stay correct across
//! offset changes.
//!
//! The module doubles as a serde `with` adapter for [`NaiveDateTime`] fields.

use chrono::{
  DateTime, LocalResult, NaiveDate, NaiveDateTime, TimeDelta, TimeZone,
  Timelike,
};
use chrono_tz::Tz;
use serde::{Deserialize, Deserializer, Serializer};

/// Canonical rendering used in documents and evaluation keys.
pub const FORMAT: &str = "%Y-%m-%d %H:%M:%S";

const NAIVE_FORMATS: &[&str] = &[
  "%Y-%m-%d %H:%M:%S",
  "%Y-%m-%dT%H:%M:%S",
  "%Y-%m-%d %H:%M:%S%.f",
  "%Y-%m-%dT%H:%M:%S%.f",
  "%Y-%m-%d %H:%M",
  "%Y-%m-%dT%H:%M",
];

/// Render a wall-clock timestamp in the canonical format.
pub fn format(ts: &NaiveDateTime) -> String { ts.format(FORMAT).to_string() }

/// Parse a wall-clock timestamp without zone information. Sub-second
/// precision is dropped.
pub fn parse_naive(raw: &str) -> Option<NaiveDateTime> {
  let raw = raw.trim();
  NAIVE_FORMATS
    .iter()
    .find_map(|f| NaiveDateTime::parse_from_str(raw, f).ok())
    .and_then(|ts| ts.with_nanosecond(0))
}

/// Parse a timestamp into wall-clock time in `tz`. Accepts the naive formats
/// of [`parse_naive`] as well as RFC 3339, which is converted into `tz`.
pub fn parse(raw: &str, tz: Tz) -> Option<NaiveDateTime> {
  if let Ok(dt) = DateTime::parse_from_rfc3339(raw.trim()) {
    return dt.with_timezone(&tz).naive_local().with_nanosecond(0);
  }
  parse_naive(raw)
}

/// Resolve a wall-clock time to an instant in `tz`.
///
/// Ambiguous times (clocks turned back) resolve to the earlier instant.
/// Times inside a gap (clocks turned forward) are shifted forward by an hour.
pub fn instant(ts: &NaiveDateTime, tz: Tz) -> Option<DateTime<Tz>> {
  match tz.from_local_datetime(ts) {
    LocalResult::Single(dt) => Some(dt),
    LocalResult::Ambiguous(earliest, _) => Some(earliest),
    LocalResult::None => {
      tz.from_local_datetime(&(*ts + TimeDelta::hours(1))).earliest()
    }
  }
}

/// The last whole second (23:59:59) of `date` in `tz`.
pub fn end_of_day(date: NaiveDate, tz: Tz) -> Option<DateTime<Tz>> {
  instant(&date.and_hms_opt(23, 59, 59)?, tz)
}

pub fn serialize<S>(ts: &NaiveDateTime, s: S) -> Result<S::Ok, S::Error>
where
  S: Serializer,
{
  s.collect_str(&ts.format(FORMAT))
}

pub fn deserialize<'de, D>(d: D) -> Result<NaiveDateTime, D::Error>
where
  D: Deserializer<'de>,
{
  let raw = String::deserialize(d)?;
  parse_naive(&raw).ok_or_else(|| {
    serde::de::Error::custom(format!("invalid timestamp: {raw:?}"))
  })
}

#[cfg(test)]
mod tests {
  use chrono::NaiveDate;

  use super::*;

  fn at(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(y, mo, d)
      .unwrap()
      .and_hms_opt(h, mi, s)
      .unwrap()
  }

  #[test]
  fn parses_common_layouts() {
    let expected = at(2025, 3, 14, 8, 30, 5);
    assert_eq!(parse_naive("2025-03-14 08:30:05"), Some(expected));
    assert_eq!(parse_naive("2025-03-14T08:30:05"), Some(expected));
    assert_eq!(parse_naive(" 2025-03-14 08:30:05.750 "), Some(expected));
    assert_eq!(parse_naive("2025-03-14 08:30"), Some(at(2025, 3, 14, 8, 30, 0)));
    assert_eq!(parse_naive("14/03/2025"), None);
    assert_eq!(parse_naive(""), None);
  }

  #[test]
  fn rfc3339_is_converted_into_zone() {
    let tz: Tz = "America/Mexico_City".parse().unwrap();
    // Mexico City is UTC-6 year-round since 2022.
    let parsed = parse("2025-03-14T14:30:05Z", tz);
    assert_eq!(parsed, Some(at(2025, 3, 14, 8, 30, 5)));
  }

  #[test]
  fn format_is_canonical() {
    assert_eq!(format(&at(2025, 1, 2, 3, 4, 5)), "2025-01-02 03:04:05");
  }

  #[test]
  fn gap_times_shift_forward() {
    let tz: Tz = "America/New_York".parse().unwrap();
    // 2025-03-09 02:30 does not exist in New York.
    let dt = instant(&at(2025, 3, 9, 2, 30, 0), tz).unwrap();
    assert_eq!(dt.naive_local(), at(2025, 3, 9, 3, 30, 0));
  }

  #[test]
  fn end_of_day_is_last_second() {
    let dt = end_of_day(NaiveDate::from_ymd_opt(2025, 6, 1).unwrap(), Tz::UTC)
      .unwrap();
    assert_eq!(dt.naive_local(), at(2025, 6, 1, 23, 59, 59));
  }
}
