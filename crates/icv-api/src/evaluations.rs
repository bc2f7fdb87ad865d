//! Handlers for `/evaluations` endpoints.
//!
//! | Method   | Path | Notes |
//! |----------|------|-------|
//! | `GET`    | `/evaluations` | The evaluation document, nested by tag then timestamp |
//! | `POST`   | `/evaluations` | Body: `[{"tag","timestamp","cuenta","nocuenta","descripcion"}]` |
//! | `DELETE` | `/evaluations` | Clears evaluations and the detection snapshot |
//! | `GET`    | `/evaluations/latest` | `{"tag","timestamp"}` or `null` |

use axum::{
  Json,
  extract::State,
  http::StatusCode,
};
use icv_core::{
  evaluation::{EvaluationDocument, EvaluationUpdate},
  ops,
  store::{IcvStore, SampleSource},
  timestamp,
};
use serde::Serialize;
use serde_json::{Value, json};

use crate::{ApiState, error::ApiError};

// ─── List ─────────────────────────────────────────────────────────────────────

/// `GET /evaluations`
pub async fn list<S, P>(
  State(state): State<ApiState<S, P>>,
) -> Result<Json<EvaluationDocument>, ApiError>
where
  S: IcvStore,
  P: SampleSource,
{
  let overlay = state
    .store
    .load_evaluations()
    .await
    .map_err(|e| ApiError::Store(Box::new(e)))?;
  Ok(Json(overlay.to_document()))
}

// ─── Save ─────────────────────────────────────────────────────────────────────

/// `POST /evaluations`. The batch is applied whole or rejected whole.
pub async fn save<S, P>(
  State(state): State<ApiState<S, P>>,
  Json(updates): Json<Vec<EvaluationUpdate>>,
) -> Result<Json<Value>, ApiError>
where
  S: IcvStore,
  P: SampleSource,
{
  let written = ops::save_evaluations(state.store.as_ref(), updates).await?;
  Ok(Json(json!({ "written": written })))
}

// ─── Clear ────────────────────────────────────────────────────────────────────

/// `DELETE /evaluations`
pub async fn clear<S, P>(State(state): State<ApiState<S, P>>) -> Result<StatusCode, ApiError>
where
  S: IcvStore,
  P: SampleSource,
{
  ops::clear_evaluations(state.store.as_ref()).await?;
  Ok(StatusCode::NO_CONTENT)
}

// ─── Latest ───────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct Latest {
  pub tag:       String,
  pub timestamp: String,
}

/// `GET /evaluations/latest`
pub async fn latest<S, P>(
  State(state): State<ApiState<S, P>>,
) -> Result<Json<Option<Latest>>, ApiError>
where
  S: IcvStore,
  P: SampleSource,
{
  let key = ops::latest_evaluation(state.store.as_ref()).await?;
  Ok(Json(key.map(|key| Latest {
    timestamp: timestamp::format(&key.start),
    tag:       key.node,
  })))
}
