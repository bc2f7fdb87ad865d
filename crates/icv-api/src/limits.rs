//! Handlers for `/limits` endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/limits` | The current limit population |
//! | `PUT`  | `/limits` | Admin only. Body: `[{"tag","limiteInferior","limiteSuperior","nivel_tension"}]` |

use axum::{Json, extract::State};
use icv_core::{
  limits::{LimitEntry, LimitSpec},
  ops,
  store::{IcvStore, SampleSource},
};

use crate::{AdminFlag, ApiState, error::ApiError};

/// `GET /limits`
pub async fn list<S, P>(
  State(state): State<ApiState<S, P>>,
) -> Result<Json<Vec<LimitSpec>>, ApiError>
where
  S: IcvStore,
  P: SampleSource,
{
  let limits = state
    .store
    .load_limits()
    .await
    .map_err(|e| ApiError::Store(Box::new(e)))?;
  Ok(Json(limits))
}

/// `PUT /limits`. Replaces the whole population.
pub async fn replace<S, P>(
  State(state): State<ApiState<S, P>>,
  AdminFlag(is_admin): AdminFlag,
  Json(entries): Json<Vec<LimitEntry>>,
) -> Result<Json<Vec<LimitSpec>>, ApiError>
where
  S: IcvStore,
  P: SampleSource,
{
  let specs = ops::replace_limits(state.store.as_ref(), &entries, is_admin).await?;
  Ok(Json(specs))
}
