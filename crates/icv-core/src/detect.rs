//! Out-of-band interval detection.
//!
//! Each node's samples are swept once, left to right, with a single cursor.
//! A run opens at the first out-of-band sample and closes at the next in-band
//! sample (whose timestamp becomes the run's end) or at the node's last
//! sample. Every sample the run visits, including the closing one, is
//! consumed: the cursor resumes after it, so no sample can open a second run.
//!
//! Runs shorter than one second are discarded. Runs that cross midnight in
//! the configured zone are split into one [`Infraction`] per calendar day:
//! a segment ends at 23:59:59 and the next resumes one second later at
//! 00:00:00. A non-final segment's duration counts through to midnight, so
//! segment durations always sum to the run's duration.

use chrono::{DateTime, NaiveDateTime, TimeDelta};
use chrono_tz::Tz;

use crate::{
  infraction::Infraction,
  limits::{LimitIndex, LimitSpec},
  sample::{Sample, SampleBatch},
  timestamp,
};

/// Runs shorter than this many seconds are dropped.
pub const MIN_DURATION_SECS: i64 = 1;

/// A detected run before day splitting.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Run<'a> {
  start: &'a Sample,
  end:   NaiveDateTime,
}

/// Pure interval detector. Holds only the time zone used for calendar-day
/// boundaries, so one instance can serve concurrent runs.
#[derive(Debug, Clone, Copy)]
pub struct Detector {
  tz: Tz,
}

impl Detector {
  pub fn new(tz: Tz) -> Self { Self { tz } }

  pub fn tz(&self) -> Tz { self.tz }

  /// Detect all infractions in `batch`. Nodes without a limit spec are
  /// skipped.
  pub fn detect(&self, batch: &SampleBatch, limits: &LimitIndex) -> Vec<Infraction> {
    let mut out = Vec::new();
    for (node, samples) in batch.by_node() {
      let Some(spec) = limits.get(node) else {
        tracing::debug!(node, samples = samples.len(), "no limits for node, skipping");
        continue;
      };
      for run in runs(spec, samples) {
        self.emit(spec, run, &mut out);
      }
    }
    out
  }

  fn emit(&self, spec: &LimitSpec, run: Run<'_>, out: &mut Vec<Infraction>) {
    let (Some(start), Some(end)) = (
      timestamp::instant(&run.start.timestamp, self.tz),
      timestamp::instant(&run.end, self.tz),
    ) else {
      tracing::warn!(node = %spec.node, start = %run.start.timestamp, "unresolvable run, skipping");
      return;
    };

    if (end - start).num_seconds() < MIN_DURATION_SECS {
      return;
    }

    let make = |start: NaiveDateTime, end: NaiveDateTime, secs: i64| Infraction {
      node: spec.node.clone(),
      tier: spec.tier,
      start,
      end,
      value_at_start: run.start.value,
      lower: spec.lower,
      upper: spec.upper,
      duration_seconds: secs,
    };

    if start.date_naive() == end.date_naive() {
      out.push(make(run.start.timestamp, run.end, (end - start).num_seconds()));
      return;
    }

    let mut first = true;
    for (seg_start, seg_end, secs) in self.split_days(start, end) {
      // The opening segment keeps the sample's own timestamp so it matches
      // evaluations keyed by it.
      let seg_start = if first { run.start.timestamp } else { seg_start };
      first = false;
      out.push(make(seg_start, seg_end, secs));
    }
  }

  /// Split `[start, end]` into per-day segments of
  /// `(start, end, duration_secs)` in local wall-clock time.
  fn split_days(
    &self,
    start: DateTime<Tz>,
    end: DateTime<Tz>,
  ) -> Vec<(NaiveDateTime, NaiveDateTime, i64)> {
    let one_second = TimeDelta::seconds(1);
    let mut segments = Vec::new();
    let mut seg_start = start;

    while seg_start < end {
      let Some(day_end) = timestamp::end_of_day(seg_start.date_naive(), self.tz)
        .filter(|d| *d >= seg_start)
      else {
        tracing::warn!(%seg_start, "no end of day for segment, clipping at run end");
        segments.push((seg_start.naive_local(), end.naive_local(), (end - seg_start).num_seconds()));
        break;
      };

      if end <= day_end {
        segments.push((
          seg_start.naive_local(),
          end.naive_local(),
          (end - seg_start).num_seconds(),
        ));
        break;
      }

      let resume = day_end + one_second;
      segments.push((
        seg_start.naive_local(),
        day_end.naive_local(),
        (resume - seg_start).num_seconds(),
      ));
      seg_start = resume;
    }
    segments
  }
}

/// Find every maximal out-of-band run in one node's time-ordered samples.
fn runs<'a>(spec: &LimitSpec, samples: &'a [Sample]) -> Vec<Run<'a>> {
  let mut out = Vec::new();
  let mut cursor = 0;

  while cursor < samples.len() {
    let start = &samples[cursor];
    cursor += 1;
    if spec.contains(start.value) {
      continue;
    }

    let mut end = start.timestamp;
    while cursor < samples.len() {
      let next = &samples[cursor];
      cursor += 1;
      end = next.timestamp;
      if spec.contains(next.value) {
        break;
      }
    }
    out.push(Run { start, end });
  }
  out
}
