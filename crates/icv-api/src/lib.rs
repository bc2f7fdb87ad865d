//! JSON REST API for ICV monitoring.
//!
//! Exposes an axum [`Router`] backed by any [`icv_core::store::IcvStore`] and
//! [`icv_core::store::SampleSource`]. Session handling, TLS, and transport
//! concerns are the caller's responsibility; the caller signals an admin
//! session by inserting an [`AdminFlag`] into the request extensions.
//!
//! # Mounting
//!
//! ```rust,ignore
//! .nest("/api", icv_api::api_router(state.clone()))
//! ```

pub mod detect;
pub mod error;
pub mod evaluations;
pub mod limits;

use std::sync::Arc;

use axum::{
  Router,
  extract::FromRequestParts,
  http::request::Parts,
  routing::{get, post},
};
use icv_core::{
  detect::Detector,
  store::{IcvStore, SampleSource},
};

pub use error::ApiError;

/// Request extension set by the caller's session layer. Absent means `false`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AdminFlag(pub bool);

impl<T: Send + Sync> FromRequestParts<T> for AdminFlag {
  type Rejection = std::convert::Infallible;

  async fn from_request_parts(parts: &mut Parts, _: &T) -> Result<Self, Self::Rejection> {
    Ok(parts.extensions.get::<AdminFlag>().copied().unwrap_or_default())
  }
}

/// Shared state threaded through all handlers.
pub struct ApiState<S, P> {
  pub store:    Arc<S>,
  pub source:   Arc<P>,
  pub detector: Detector,
}

impl<S, P> Clone for ApiState<S, P> {
  fn clone(&self) -> Self {
    Self {
      store:    Arc::clone(&self.store),
      source:   Arc::clone(&self.source),
      detector: self.detector,
    }
  }
}

/// Build a fully-materialised API router for `state`.
///
/// The returned `Router<()>` can be nested into any parent router regardless
/// of its own state type.
pub fn api_router<S, P>(state: ApiState<S, P>) -> Router<()>
where
  S: IcvStore + 'static,
  P: SampleSource + 'static,
{
  Router::new()
    .route("/detect", post(detect::handler::<S, P>))
    // Evaluations
    .route(
      "/evaluations",
      get(evaluations::list::<S, P>)
        .post(evaluations::save::<S, P>)
        .delete(evaluations::clear::<S, P>),
    )
    .route("/evaluations/latest", get(evaluations::latest::<S, P>))
    // Limits
    .route("/limits", get(limits::list::<S, P>).put(limits::replace::<S, P>))
    .with_state(state)
}
