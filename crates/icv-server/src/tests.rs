use argon2::{Argon2, PasswordHasher, password_hash::SaltString};
use axum::{
  body::Body,
  http::{Request, StatusCode, header},
  response::Response,
};
use rand_core::OsRng;
use serde_json::{Value, json};
use tempfile::TempDir;
use tower::ServiceExt as _;

use super::*;

fn hash(password: &str) -> String {
  let salt = SaltString::generate(&mut OsRng);
  Argon2::default()
    .hash_password(password.as_bytes(), &salt)
    .unwrap()
    .to_string()
}

fn load(toml: &str) -> ServerConfig {
  config::Config::builder()
    .add_source(config::File::from_str(toml, config::FileFormat::Toml))
    .build()
    .unwrap()
    .try_deserialize()
    .unwrap()
}

fn make_config(dir: &Path, password: &str) -> ServerConfig {
  load(&format!(
    r#"
      limits_path = "{dir}/tags.json"
      evaluations_path = "{dir}/eval.json"
      snapshot_path = "{dir}/filtrados.json"
      admin_password_hash = "{hash}"

      [samples]
      path = "{dir}/resultados.json"
    "#,
    dir = dir.display(),
    hash = hash(password),
  ))
}

fn app(config: &ServerConfig) -> Router {
  router(AppState::new(config.auth()), api_state(config).unwrap())
}

async fn send(
  app: Router,
  method: &str,
  uri: &str,
  token: Option<&str>,
  body: Option<Value>,
) -> Response {
  let mut builder = Request::builder().method(method).uri(uri);
  if let Some(token) = token {
    builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
  }
  let req = match body {
    Some(body) => builder
      .header(header::CONTENT_TYPE, "application/json")
      .body(Body::from(body.to_string())),
    None => builder.body(Body::empty()),
  }
  .unwrap();
  app.oneshot(req).await.unwrap()
}

async fn json_body(resp: Response) -> Value {
  let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
  serde_json::from_slice(&bytes).unwrap()
}

// ── Configuration ───────────────────────────────────────────────────────────

#[test]
fn config_defaults() {
  let dir = TempDir::new().unwrap();
  let config = make_config(dir.path(), "secret");
  assert_eq!(config.host, "127.0.0.1");
  assert_eq!(config.port, 8080);
  assert_eq!(config.session_timeout_secs, 1800);
  assert_eq!(config.tz().unwrap(), chrono_tz::America::Mexico_City);
  assert!(config.samples.generator.is_none());
  assert!(matches!(config.sample_source(), Samples::File(_)));
  assert_eq!(config.store_paths(), StorePaths::in_dir(dir.path()));
}

#[test]
fn config_with_generator_and_bad_timezone() {
  let config = load(
    r#"
      timezone = "Mars/Olympus_Mons"
      limits_path = "tags.json"
      evaluations_path = "eval.json"
      snapshot_path = "filtrados.json"
      admin_password_hash = "x"

      [samples]
      path = "resultados.json"

      [samples.generator]
      program = "ICVDatalink"
      args = ["--quiet"]
    "#,
  );
  let generator = config.samples.generator.as_ref().unwrap();
  assert_eq!(generator.timeout_secs, 300);
  assert_eq!(generator.args, vec!["--quiet".to_string()]);
  assert!(matches!(config.sample_source(), Samples::Command(_)));
  assert!(matches!(config.tz(), Err(Error::Config(_))));
  assert!(api_state(&config).is_err());
}

// ── Sessions ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn login_rejects_wrong_password() {
  let dir = TempDir::new().unwrap();
  let config = make_config(dir.path(), "secret");
  let resp = send(app(&config), "POST", "/auth/login", None, Some(json!({ "password": "nope" }))).await;
  assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
  assert!(resp.headers().contains_key(header::WWW_AUTHENTICATE));
}

#[tokio::test]
async fn admin_session_lifecycle() {
  let dir = TempDir::new().unwrap();
  let config = make_config(dir.path(), "secret");
  let app = app(&config);
  let limits = json!([
    { "tag": "A", "limiteInferior": 0, "limiteSuperior": 10, "nivel_tension": 115 }
  ]);

  let status = json_body(send(app.clone(), "GET", "/auth/status", None, None).await).await;
  assert_eq!(status, json!({ "is_admin": false, "expired": false }));

  let resp = send(app.clone(), "PUT", "/api/limits", None, Some(limits.clone())).await;
  assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

  let resp = send(app.clone(), "POST", "/auth/login", None, Some(json!({ "password": "secret" }))).await;
  assert_eq!(resp.status(), StatusCode::OK);
  let login = json_body(resp).await;
  assert_eq!(login["expires_in"], 1800);
  let token = login["token"].as_str().unwrap().to_owned();

  let status = json_body(send(app.clone(), "GET", "/auth/status", Some(&token), None).await).await;
  assert_eq!(status, json!({ "is_admin": true, "expired": false }));

  let resp = send(app.clone(), "PUT", "/api/limits", Some(&token), Some(limits)).await;
  assert_eq!(resp.status(), StatusCode::OK);
  let resp = send(app.clone(), "GET", "/api/limits", None, None).await;
  assert_eq!(json_body(resp).await[0]["tag"], "A");

  let resp = send(app.clone(), "POST", "/auth/logout", Some(&token), None).await;
  assert_eq!(resp.status(), StatusCode::NO_CONTENT);

  let status = json_body(send(app.clone(), "GET", "/auth/status", Some(&token), None).await).await;
  assert_eq!(status, json!({ "is_admin": false, "expired": false }));

  let resp = send(app, "POST", "/auth/logout", Some(&token), None).await;
  assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn idle_session_reports_expired() {
  let dir = TempDir::new().unwrap();
  let mut config = make_config(dir.path(), "secret");
  config.session_timeout_secs = 0;
  let app = app(&config);

  let resp = send(app.clone(), "POST", "/auth/login", None, Some(json!({ "password": "secret" }))).await;
  let token = json_body(resp).await["token"].as_str().unwrap().to_owned();

  let status = json_body(send(app.clone(), "GET", "/auth/status", Some(&token), None).await).await;
  assert_eq!(status, json!({ "is_admin": false, "expired": true }));

  // The expired session is gone; the token is now simply unknown.
  let status = json_body(send(app.clone(), "GET", "/auth/status", Some(&token), None).await).await;
  assert_eq!(status, json!({ "is_admin": false, "expired": false }));

  let resp = send(
    app,
    "PUT",
    "/api/limits",
    Some(&token),
    Some(json!([{ "tag": "A", "limiteInferior": 0, "limiteSuperior": 1, "nivel_tension": 69 }])),
  )
  .await;
  assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn evaluations_do_not_need_a_session() {
  let dir = TempDir::new().unwrap();
  let config = make_config(dir.path(), "secret");
  let resp = send(
    app(&config),
    "POST",
    "/api/evaluations",
    None,
    Some(json!([{ "tag": "A", "timestamp": "2025-01-01 00:00:00", "cuenta": true }])),
  )
  .await;
  assert_eq!(resp.status(), StatusCode::OK);
  assert!(dir.path().join("eval.json").exists());
}
