//! Raw samples, date ranges, and ingestion.
//!
//! The samples document is produced by external tooling and is trusted only
//! loosely: individual records may lack fields or carry numbers as strings.
//! Ingestion turns it into a [`SampleBatch`] that upholds the detector's
//! preconditions (sorted by node then time, one sample per node and instant).

use chrono::{NaiveDate, NaiveDateTime};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{Error, Result, timestamp};

// ─── Samples ─────────────────────────────────────────────────────────────────

/// A sample record exactly as found in the samples document.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct RawSample {
  #[serde(default)]
  pub tag:       Option<String>,
  #[serde(default)]
  pub timestamp: Option<Value>,
  #[serde(default)]
  pub value:     Option<Value>,
}

/// A validated measurement of one node at one wall-clock second.
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
  pub node:      String,
  pub timestamp: NaiveDateTime,
  pub value:     f64,
}

impl Sample {
  pub fn new(node: impl Into<String>, timestamp: NaiveDateTime, value: f64) -> Self {
    Self { node: node.into(), timestamp, value }
  }
}

/// Decode a whole samples document. The document must be a JSON array;
/// elements that are not objects become empty records and are later counted
/// as malformed.
pub fn decode_samples(doc: Value) -> Result<Vec<RawSample>> {
  let Value::Array(items) = doc else {
    return Err(Error::Input("samples document is not a JSON array".into()));
  };
  Ok(
    items
      .into_iter()
      .map(|item| serde_json::from_value(item).unwrap_or_default())
      .collect(),
  )
}

/// Interpret a JSON number or numeric string as a finite `f64`.
pub(crate) fn lenient_number(value: &Value) -> Option<f64> {
  let n = match value {
    Value::Number(n) => n.as_f64(),
    Value::String(s) => s.trim().parse::<f64>().ok(),
    _ => None,
  }?;
  n.is_finite().then_some(n)
}

impl RawSample {
  /// Validate the record, returning `None` when any field is missing or
  /// unparseable.
  pub fn parse(&self, tz: Tz) -> Option<Sample> {
    let node = self.tag.as_deref().map(str::trim).filter(|t| !t.is_empty())?;
    let timestamp = match self.timestamp.as_ref()? {
      Value::String(s) => timestamp::parse(s, tz)?,
      _ => return None,
    };
    let value = lenient_number(self.value.as_ref()?)?;
    Some(Sample::new(node, timestamp, value))
  }
}

// ─── Date range ──────────────────────────────────────────────────────────────

/// An inclusive range of calendar days.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
  pub start: NaiveDate,
  pub end:   NaiveDate,
}

impl DateRange {
  pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self> {
    if start > end {
      return Err(Error::Input(format!(
        "start date {start} is after end date {end}"
      )));
    }
    Ok(Self { start, end })
  }

  /// Parse a range from caller-supplied strings. Both dates are required.
  pub fn parse(start: &str, end: &str) -> Result<Self> {
    let start = parse_date(start, "start")?;
    let end = parse_date(end, "end")?;
    Self::new(start, end)
  }
}

fn parse_date(raw: &str, which: &str) -> Result<NaiveDate> {
  let raw = raw.trim();
  if raw.is_empty() {
    return Err(Error::Input(format!("{which} date is missing")));
  }
  NaiveDate::parse_from_str(raw, "%Y-%m-%d")
    .ok()
    .or_else(|| timestamp::parse_naive(raw).map(|ts| ts.date()))
    .ok_or_else(|| Error::Input(format!("{which} date {raw:?} is not a date")))
}

// ─── Batch ───────────────────────────────────────────────────────────────────

/// Counts gathered while ingesting a samples document.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestReport {
  pub accepted:   usize,
  pub malformed:  usize,
  pub duplicates: usize,
}

/// Samples sorted by node, then by timestamp, with at most one sample per
/// (node, timestamp).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SampleBatch {
  samples: Vec<Sample>,
}

impl SampleBatch {
  /// Sort `samples` and drop repeated (node, timestamp) pairs, keeping the
  /// first occurrence in input order.
  pub fn new(mut samples: Vec<Sample>) -> Self {
    samples.sort_by(|a, b| {
      a.node.cmp(&b.node).then(a.timestamp.cmp(&b.timestamp))
    });
    samples.dedup_by(|later, earlier| {
      later.node == earlier.node && later.timestamp == earlier.timestamp
    });
    Self { samples }
  }

  /// Validate raw records and build a batch.
  ///
  /// Every valid sample is kept, whatever its date. The date range only
  /// scopes what the sample source produces; a run that opens inside it must
  /// still find its closing sample after it.
  pub fn ingest(raw: &[RawSample], tz: Tz) -> (Self, IngestReport) {
    let mut report = IngestReport::default();
    let mut samples = Vec::with_capacity(raw.len());

    for record in raw {
      let Some(sample) = record.parse(tz) else {
        tracing::debug!(?record, "skipping malformed sample");
        report.malformed += 1;
        continue;
      };
      samples.push(sample);
    }

    let parsed = samples.len();
    let batch = Self::new(samples);
    report.duplicates = parsed - batch.len();
    report.accepted = batch.len();

    if report.duplicates > 0 {
      tracing::warn!(
        duplicates = report.duplicates,
        "dropped samples repeating a (node, timestamp) pair"
      );
    }
    (batch, report)
  }

  pub fn len(&self) -> usize { self.samples.len() }

  pub fn is_empty(&self) -> bool { self.samples.is_empty() }

  pub fn samples(&self) -> &[Sample] { &self.samples }

  /// Iterate over each node's samples in ascending time order.
  pub fn by_node(&self) -> impl Iterator<Item = (&str, &[Sample])> {
    self
      .samples
      .chunk_by(|a, b| a.node == b.node)
      .map(|run| (run[0].node.as_str(), run))
  }
}

#[cfg(test)]
mod tests {
  use serde_json::json;

  use super::*;

  fn ts(raw: &str) -> NaiveDateTime { timestamp::parse_naive(raw).unwrap() }

  #[test]
  fn decode_rejects_non_array() {
    let err = decode_samples(json!({ "tag": "A" })).unwrap_err();
    assert!(matches!(err, Error::Input(_)));
  }

  #[test]
  fn lenient_values_and_missing_fields() {
    let raw = decode_samples(json!([
      { "tag": "A", "timestamp": "2025-01-01 00:00:00", "value": 12.5 },
      { "tag": "A", "timestamp": "2025-01-01 00:00:01", "value": " 13 " },
      { "tag": "A", "timestamp": "2025-01-01 00:00:02" },
      { "tag": "A", "value": 1.0 },
      { "timestamp": "2025-01-01 00:00:03", "value": 1.0 },
      { "tag": "A", "timestamp": "yesterday", "value": 1.0 },
      { "tag": "A", "timestamp": "2025-01-01 00:00:04", "value": "n/a" },
      42
    ]))
    .unwrap();
    assert_eq!(raw.len(), 8);

    let (batch, report) = SampleBatch::ingest(&raw, Tz::UTC);
    assert_eq!(report.accepted, 2);
    assert_eq!(report.malformed, 6);
    assert_eq!(batch.samples()[1].value, 13.0);
  }

  #[test]
  fn batch_sorts_and_drops_duplicates() {
    let batch = SampleBatch::new(vec![
      Sample::new("B", ts("2025-01-01 00:00:05"), 1.0),
      Sample::new("A", ts("2025-01-01 00:00:09"), 2.0),
      Sample::new("A", ts("2025-01-01 00:00:01"), 3.0),
      Sample::new("A", ts("2025-01-01 00:00:09"), 4.0),
    ]);
    let nodes: Vec<_> = batch.by_node().map(|(n, s)| (n, s.len())).collect();
    assert_eq!(nodes, vec![("A", 2), ("B", 1)]);
    // The first occurrence of the repeated pair survives.
    assert_eq!(batch.samples()[1].value, 2.0);
  }

  #[test]
  fn ingest_keeps_samples_of_every_date() {
    let raw = decode_samples(json!([
      { "tag": "A", "timestamp": "2024-12-31 23:59:59", "value": 1 },
      { "tag": "A", "timestamp": "2025-01-01 00:00:00", "value": 1 },
      { "tag": "A", "timestamp": "2025-01-03 00:00:00", "value": 1 },
      { "tag": "A", "timestamp": "2025-01-01 00:00:00", "value": 9 }
    ]))
    .unwrap();
    let (batch, report) = SampleBatch::ingest(&raw, Tz::UTC);
    assert_eq!(batch.len(), 3);
    assert_eq!(report.accepted, 3);
    assert_eq!(report.duplicates, 1);
    assert_eq!(batch.samples()[1].value, 1.0);
  }

  #[test]
  fn date_range_validation() {
    assert!(matches!(DateRange::parse("", "2025-01-01"), Err(Error::Input(_))));
    assert!(matches!(
      DateRange::parse("2025-01-02", "2025-01-01"),
      Err(Error::Input(_))
    ));
    assert!(matches!(
      DateRange::parse("2025-13-01", "2025-12-31"),
      Err(Error::Input(_))
    ));
    let r = DateRange::parse("2025-01-01", "2025-01-01 10:00:00").unwrap();
    assert_eq!(r.start, r.end);
  }
}
