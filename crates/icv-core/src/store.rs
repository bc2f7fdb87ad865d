//! The `IcvStore` and `SampleSource` traits.
//!
//! Storage backends (e.g. `icv-store-json`) implement these. Higher layers
//! (`icv-api`, `icv-server`) depend on this abstraction, not on any concrete
//! backend.

use std::future::Future;

use crate::{
  evaluation::{EvaluatedInfraction, EvaluationMap, ValidatedBatch},
  limits::LimitSpec,
  sample::{DateRange, RawSample},
};

/// Access to the persisted documents: limits, evaluations, and the latest
/// detection snapshot.
///
/// Every write replaces a whole document. Implementations must serialise
/// writers to the same document so that a read-modify-write never
/// interleaves with another.
///
/// All methods return `Send` futures so the trait can be used in multi-threaded
/// async runtimes (e.g. tokio with `axum`).
pub trait IcvStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  // ── Limits ────────────────────────────────────────────────────────────

  /// Read a snapshot of the limit population.
  fn load_limits(
    &self,
  ) -> impl Future<Output = Result<Vec<LimitSpec>, Self::Error>> + Send + '_;

  /// Replace the limits document with `limits`.
  fn replace_limits(
    &self,
    limits: Vec<LimitSpec>,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  // ── Evaluations ───────────────────────────────────────────────────────

  /// Read a snapshot of the evaluation overlay. A missing document reads as
  /// empty.
  fn load_evaluations(
    &self,
  ) -> impl Future<Output = Result<EvaluationMap, Self::Error>> + Send + '_;

  /// Upsert `batch` into the evaluation document and rewrite it whole.
  /// Returns the overlay as written.
  fn upsert_evaluations(
    &self,
    batch: ValidatedBatch,
  ) -> impl Future<Output = Result<EvaluationMap, Self::Error>> + Send + '_;

  /// Reset the evaluation document to empty and discard the detection
  /// snapshot.
  fn clear_evaluations(
    &self,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  // ── Detection snapshot ────────────────────────────────────────────────

  /// Replace the detection snapshot with the output of the latest run.
  fn write_snapshot<'a>(
    &'a self,
    rows: &'a [EvaluatedInfraction],
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + 'a;
}

/// Produces the raw samples for a date range.
pub trait SampleSource: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  fn fetch<'a>(
    &'a self,
    range: &'a DateRange,
  ) -> impl Future<Output = Result<Vec<RawSample>, Self::Error>> + Send + 'a;
}
