//! Handler for `POST /detect`.
//!
//! Body: `{"fecha_inicial":"2025-01-01","fecha_final":"2025-01-31"}`. Both
//! dates are required; the response is the full detection run (infraction
//! rows, per-tier and global summaries, ingest counts).

use axum::{Json, extract::State};
use icv_core::{
  ops::{self, DetectionRun},
  sample::DateRange,
  store::{IcvStore, SampleSource},
};
use serde::Deserialize;

use crate::{ApiState, error::ApiError};

#[derive(Debug, Default, Deserialize)]
pub struct DetectBody {
  #[serde(default)]
  pub fecha_inicial: Option<String>,
  #[serde(default)]
  pub fecha_final:   Option<String>,
}

/// `POST /detect`
pub async fn handler<S, P>(
  State(state): State<ApiState<S, P>>,
  Json(body): Json<DetectBody>,
) -> Result<Json<DetectionRun>, ApiError>
where
  S: IcvStore,
  P: SampleSource,
{
  let range = DateRange::parse(
    body.fecha_inicial.as_deref().unwrap_or_default(),
    body.fecha_final.as_deref().unwrap_or_default(),
  )?;
  let run = ops::detect_and_aggregate(
    state.store.as_ref(),
    state.source.as_ref(),
    &state.detector,
    &range,
  )
  .await?;
  Ok(Json(run))
}
