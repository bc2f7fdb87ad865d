//! HTTP server for ICV monitoring.
//!
//! Mounts the [`icv_api`] router under `/api`, adds admin session routes
//! under `/auth`, and wires both to a [`JsonStore`] and the configured
//! sample source.

pub mod auth;
pub mod error;

pub use error::Error;

use std::{
  path::{Path, PathBuf},
  sync::Arc,
  time::Duration,
};

use axum::{
  Router, middleware,
  routing::{get, post},
};
use chrono_tz::Tz;
use icv_api::ApiState;
use icv_core::{
  detect::Detector,
  store::{IcvStore, SampleSource},
};
use icv_store_json::{CommandSource, FileSource, JsonStore, Samples, StorePaths};
use serde::Deserialize;
use tower_http::trace::TraceLayer;

use auth::{AuthConfig, Sessions};

// ─── Configuration ────────────────────────────────────────────────────────────

/// Runtime server configuration, deserialised from `config.toml`.
#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
  #[serde(default = "default_host")]
  pub host:                 String,
  #[serde(default = "default_port")]
  pub port:                 u16,
  /// IANA zone the samples' wall-clock timestamps are recorded in.
  #[serde(default = "default_timezone")]
  pub timezone:             String,
  pub limits_path:          PathBuf,
  pub evaluations_path:     PathBuf,
  pub snapshot_path:        PathBuf,
  pub admin_password_hash:  String,
  #[serde(default = "default_session_timeout")]
  pub session_timeout_secs: u64,
  pub samples:              SamplesConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SamplesConfig {
  pub path:      PathBuf,
  #[serde(default)]
  pub generator: Option<GeneratorConfig>,
}

/// An external program run before each detection to refresh the samples
/// document. It receives the start and end dates as its last two arguments.
#[derive(Debug, Deserialize, Clone)]
pub struct GeneratorConfig {
  pub program:      String,
  #[serde(default)]
  pub args:         Vec<String>,
  #[serde(default = "default_generator_timeout")]
  pub timeout_secs: u64,
}

fn default_host() -> String { "127.0.0.1".into() }
fn default_port() -> u16 { 8080 }
fn default_timezone() -> String { "America/Mexico_City".into() }
fn default_session_timeout() -> u64 { 30 * 60 }
fn default_generator_timeout() -> u64 { 300 }

impl ServerConfig {
  pub fn tz(&self) -> Result<Tz, Error> {
    self
      .timezone
      .parse()
      .map_err(|e| Error::Config(format!("timezone {:?}: {e}", self.timezone)))
  }

  pub fn store_paths(&self) -> StorePaths {
    StorePaths {
      limits:      expand_tilde(&self.limits_path),
      evaluations: expand_tilde(&self.evaluations_path),
      snapshot:    expand_tilde(&self.snapshot_path),
    }
  }

  pub fn sample_source(&self) -> Samples {
    let file = FileSource::new(expand_tilde(&self.samples.path));
    match &self.samples.generator {
      None => Samples::File(file),
      Some(g) => Samples::Command(CommandSource::new(
        g.program.clone(),
        g.args.clone(),
        Duration::from_secs(g.timeout_secs),
        file,
      )),
    }
  }

  pub fn auth(&self) -> AuthConfig {
    AuthConfig {
      password_hash:   self.admin_password_hash.clone(),
      session_timeout: Duration::from_secs(self.session_timeout_secs),
    }
  }
}

/// Expand a leading `~` to the user's home directory.
pub fn expand_tilde(path: &Path) -> PathBuf {
  let s = path.to_string_lossy();
  if let Some(rest) = s.strip_prefix("~/")
    && let Ok(home) = std::env::var("HOME")
  {
    return PathBuf::from(home).join(rest);
  }
  path.to_path_buf()
}

// ─── Application state ────────────────────────────────────────────────────────

/// State for the session routes and middleware.
#[derive(Clone)]
pub struct AppState {
  pub auth:     Arc<AuthConfig>,
  pub sessions: Arc<Sessions>,
}

impl AppState {
  pub fn new(auth: AuthConfig) -> Self {
    Self {
      sessions: Arc::new(Sessions::new(auth.session_timeout)),
      auth:     Arc::new(auth),
    }
  }
}

/// Build the API state for `config`.
pub fn api_state(config: &ServerConfig) -> Result<ApiState<JsonStore, Samples>, Error> {
  Ok(ApiState {
    store:    Arc::new(JsonStore::open(config.store_paths())),
    source:   Arc::new(config.sample_source()),
    detector: Detector::new(config.tz()?),
  })
}

// ─── Router ───────────────────────────────────────────────────────────────────

/// Build the full application router.
pub fn router<S, P>(state: AppState, api: ApiState<S, P>) -> Router
where
  S: IcvStore + 'static,
  P: SampleSource + 'static,
{
  Router::new()
    .route("/auth/login", post(auth::login))
    .route("/auth/status", get(auth::status))
    .route("/auth/logout", post(auth::logout))
    .with_state(state.clone())
    .nest("/api", icv_api::api_router(api))
    .layer(middleware::from_fn_with_state(state, auth::admin_session))
    .layer(TraceLayer::new_for_http())
}

// ─── Integration tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests;
