//! Entry points invoked by callers (HTTP handlers, the CLI, scheduled jobs).
//!
//! Each operation borrows read-only snapshots of the persisted documents for
//! the duration of one call; no state is shared between invocations.

use serde::Serialize;

use crate::{
  Error, Result,
  aggregate::{Summary, summarize_merged},
  detect::Detector,
  evaluation::{EvaluationKey, EvaluationUpdate, merge, validate_batch},
  limits::{LimitEntry, LimitIndex, LimitSpec, validate_replacement},
  sample::{DateRange, IngestReport, SampleBatch},
  store::{IcvStore, SampleSource},
};

/// The result of [`detect_and_aggregate`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DetectionRun {
  pub summary: Summary,
  pub ingest:  IngestReport,
}

/// Fetch samples for `range`, detect infractions, overlay evaluations,
/// persist the detection snapshot, and aggregate.
pub async fn detect_and_aggregate<S, P>(
  store: &S,
  source: &P,
  detector: &Detector,
  range: &DateRange,
) -> Result<DetectionRun>
where
  S: IcvStore,
  P: SampleSource,
{
  let raw = source
    .fetch(range)
    .await
    .map_err(|e| Error::unreadable("samples", e))?;
  let limits = LimitIndex::new(
    store
      .load_limits()
      .await
      .map_err(|e| Error::unreadable("limits", e))?,
  );
  let overlay = store
    .load_evaluations()
    .await
    .map_err(|e| Error::unreadable("evaluations", e))?;

  let (batch, ingest) = SampleBatch::ingest(&raw, detector.tz());
  let infractions = detector.detect(&batch, &limits);
  let merged = merge(infractions, &overlay);

  store.write_snapshot(&merged).await.map_err(Error::persistence)?;
  let summary = summarize_merged(merged, &limits);

  tracing::info!(
    start = %range.start,
    end = %range.end,
    samples = ingest.accepted,
    malformed = ingest.malformed,
    infractions = summary.global.infraction_count,
    "detection run complete"
  );
  Ok(DetectionRun { summary, ingest })
}

/// Validate and persist an evaluation batch. Either every update is applied
/// or none is. Returns the number of records written.
pub async fn save_evaluations<S>(store: &S, updates: Vec<EvaluationUpdate>) -> Result<usize>
where
  S: IcvStore,
{
  let batch = validate_batch(updates).inspect_err(|e| {
    tracing::warn!(error = %e, "evaluation batch rejected");
  })?;
  let written = batch.len();
  store.upsert_evaluations(batch).await.map_err(Error::persistence)?;
  tracing::info!(written, "evaluations saved");
  Ok(written)
}

/// Discard every stored evaluation.
pub async fn clear_evaluations<S: IcvStore>(store: &S) -> Result<()> {
  store.clear_evaluations().await.map_err(Error::persistence)?;
  tracing::info!("evaluations cleared");
  Ok(())
}

/// The most recently started infraction that has been evaluated.
pub async fn latest_evaluation<S: IcvStore>(store: &S) -> Result<Option<EvaluationKey>> {
  let overlay = store
    .load_evaluations()
    .await
    .map_err(|e| Error::unreadable("evaluations", e))?;
  Ok(overlay.latest().cloned())
}

/// Replace the whole limit population. Only callers holding an admin
/// session may do this; authentication itself happens upstream.
pub async fn replace_limits<S: IcvStore>(
  store: &S,
  entries: &[LimitEntry],
  is_admin: bool,
) -> Result<Vec<LimitSpec>> {
  if !is_admin {
    return Err(Error::Unauthorized);
  }
  let specs = validate_replacement(entries)?;
  store
    .replace_limits(specs.clone())
    .await
    .map_err(Error::persistence)?;
  tracing::info!(nodes = specs.len(), "limits replaced");
  Ok(specs)
}
