//! Presentation forms of a duration.
//!
//! Every form is derived from the same seconds value: raw seconds, an
//! hours/minutes/seconds breakdown using floor division, and decimal hours
//! at a fixed precision.

use std::fmt;

use serde::Serialize;

/// Decimal places used when rendering hours.
pub const HOURS_PRECISION: usize = 9;

#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default)]
pub struct Seconds(pub f64);

impl Seconds {
  pub fn hms(self) -> Hms {
    let total = self.0.max(0.0);
    Hms {
      hours:   (total / 3600.0).floor() as u64,
      minutes: ((total % 3600.0) / 60.0).floor() as u64,
      seconds: (total % 60.0).floor() as u64,
    }
  }

  pub fn hours(self) -> f64 { self.0 / 3600.0 }

  pub fn hours_fixed(self, precision: usize) -> String {
    format!("{:.*}", precision, self.hours())
  }
}

impl From<i64> for Seconds {
  fn from(secs: i64) -> Self { Self(secs as f64) }
}

/// A floor-divided hours/minutes/seconds breakdown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Hms {
  pub hours:   u64,
  pub minutes: u64,
  pub seconds: u64,
}

impl fmt::Display for Hms {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}h {}m {}s", self.hours, self.minutes, self.seconds)
  }
}

/// All three forms of a whole-second total, ready for serialisation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FormattedDuration {
  pub seconds: i64,
  pub hms:     String,
  pub hours:   String,
}

impl From<i64> for FormattedDuration {
  fn from(secs: i64) -> Self {
    let value = Seconds::from(secs);
    Self {
      seconds: secs,
      hms:     value.hms().to_string(),
      hours:   value.hours_fixed(HOURS_PRECISION),
    }
  }
}

/// All three forms of a per-node average. Averages are fractional, so the
/// raw seconds keep their fraction.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FormattedAverage {
  pub seconds: f64,
  pub hms:     String,
  pub hours:   String,
}

impl From<Seconds> for FormattedAverage {
  fn from(secs: Seconds) -> Self {
    Self {
      seconds: secs.0,
      hms:     secs.hms().to_string(),
      hours:   secs.hours_fixed(HOURS_PRECISION),
    }
  }
}
