//! Admin sessions: password login, bearer tokens with an inactivity timeout,
//! and the middleware that marks requests from an open session as admin.

use std::{
  collections::HashMap,
  time::{Duration, Instant},
};

use argon2::{Argon2, PasswordHash, PasswordVerifier};
use axum::{
  Extension, Json,
  extract::{FromRequestParts, Request, State},
  http::{HeaderMap, StatusCode, header, request::Parts},
  middleware::Next,
  response::{IntoResponse, Response},
};
use icv_api::AdminFlag;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::{AppState, error::Error};

/// Credentials and session policy for this server instance.
#[derive(Clone)]
pub struct AuthConfig {
  /// PHC string produced by argon2, e.g. `$argon2id$v=19$…`
  pub password_hash:   String,
  /// Sessions idle for longer than this are closed.
  pub session_timeout: Duration,
}

/// Verify `password` against the configured hash.
pub fn verify_password(password: &str, config: &AuthConfig) -> Result<(), Error> {
  let parsed_hash = PasswordHash::new(&config.password_hash)
    .map_err(|_| Error::Unauthorized)?;

  Argon2::default()
    .verify_password(password.as_bytes(), &parsed_hash)
    .map_err(|_| Error::Unauthorized)
}

// ─── Sessions ─────────────────────────────────────────────────────────────────

/// What a presented token turned out to be.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
  /// No token, or one this server never issued or has closed.
  Absent,
  Live,
  /// The session idled past the timeout and has just been closed.
  Expired,
}

/// Open sessions keyed by token, with the instant each was last used.
pub struct Sessions {
  timeout: Duration,
  active:  Mutex<HashMap<Uuid, Instant>>,
}

impl Sessions {
  pub fn new(timeout: Duration) -> Self {
    Self { timeout, active: Mutex::new(HashMap::new()) }
  }

  pub async fn open(&self) -> Uuid {
    let token = Uuid::new_v4();
    let now = Instant::now();
    let mut active = self.active.lock().await;
    active.retain(|_, last| now.duration_since(*last) < self.timeout);
    active.insert(token, now);
    token
  }

  /// Look up `token`. A live session's idle timer is reset; an expired one
  /// is removed, so it reports [`SessionState::Expired`] only once.
  pub async fn touch(&self, token: Uuid) -> SessionState {
    let now = Instant::now();
    let mut active = self.active.lock().await;
    match active.get_mut(&token) {
      Some(last) if now.duration_since(*last) < self.timeout => {
        *last = now;
        SessionState::Live
      }
      Some(_) => {
        active.remove(&token);
        tracing::info!(%token, "admin session expired");
        SessionState::Expired
      }
      None => SessionState::Absent,
    }
  }

  /// Close `token`. Returns `false` if it was not open.
  pub async fn close(&self, token: Uuid) -> bool {
    self.active.lock().await.remove(&token).is_some()
  }
}

// ─── Bearer token extractor ──────────────────────────────────────────────────

/// The session token presented in `Authorization: Bearer <uuid>`, if any.
pub struct BearerToken(pub Option<Uuid>);

fn bearer(headers: &HeaderMap) -> Option<Uuid> {
  headers
    .get(header::AUTHORIZATION)
    .and_then(|v| v.to_str().ok())
    .and_then(|v| v.strip_prefix("Bearer "))
    .and_then(|t| Uuid::parse_str(t.trim()).ok())
}

impl<S: Send + Sync> FromRequestParts<S> for BearerToken {
  type Rejection = std::convert::Infallible;

  async fn from_request_parts(parts: &mut Parts, _: &S) -> Result<Self, Self::Rejection> {
    Ok(BearerToken(bearer(&parts.headers)))
  }
}

/// Middleware: insert an [`AdminFlag`] reflecting whether the request carries
/// a live session token, and the [`SessionState`] it was derived from.
pub async fn admin_session(
  State(state): State<AppState>,
  mut req: Request,
  next: Next,
) -> Response {
  let session = match bearer(req.headers()) {
    Some(token) => state.sessions.touch(token).await,
    None => SessionState::Absent,
  };
  req.extensions_mut().insert(AdminFlag(session == SessionState::Live));
  req.extensions_mut().insert(session);
  next.run(req).await
}

// ─── Handlers ─────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct LoginBody {
  pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
  pub token:      Uuid,
  pub expires_in: u64,
}

/// `POST /auth/login`, body: `{"password":"…"}`
pub async fn login(
  State(state): State<AppState>,
  Json(body): Json<LoginBody>,
) -> Result<Json<LoginResponse>, Error> {
  if body.password.is_empty() {
    return Err(Error::BadRequest("password is required".into()));
  }
  verify_password(&body.password, &state.auth).inspect_err(|_| {
    tracing::warn!("admin login rejected");
  })?;

  let token = state.sessions.open().await;
  tracing::info!(%token, "admin session opened");
  Ok(Json(LoginResponse {
    token,
    expires_in: state.auth.session_timeout.as_secs(),
  }))
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
  pub is_admin: bool,
  /// The presented token belonged to a session that idled out.
  pub expired:  bool,
}

/// `GET /auth/status`
pub async fn status(
  AdminFlag(is_admin): AdminFlag,
  session: Option<Extension<SessionState>>,
) -> Json<StatusResponse> {
  let expired = matches!(session, Some(Extension(SessionState::Expired)));
  Json(StatusResponse { is_admin, expired })
}

/// `POST /auth/logout`
pub async fn logout(
  State(state): State<AppState>,
  BearerToken(token): BearerToken,
) -> Result<impl IntoResponse, Error> {
  let token = token.ok_or(Error::Unauthorized)?;
  if !state.sessions.close(token).await {
    return Err(Error::Unauthorized);
  }
  tracing::info!(%token, "admin session closed");
  Ok(StatusCode::NO_CONTENT)
}
