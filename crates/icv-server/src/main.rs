//! icv-server binary.
//!
//! Reads `config.toml` (or the path specified with `--config`), overlaid with
//! `ICV_*` environment variables, and either serves the HTTP API or runs a
//! single detection from the command line.
//!
//! # Password hash generation
//!
//! To generate the argon2 PHC string for `admin_password_hash` in config.toml:
//!
//! ```
//! cargo run -p icv-server -- hash-password
//! ```

use std::path::PathBuf;

use anyhow::Context as _;
use argon2::{Argon2, PasswordHasher, password_hash::SaltString};
use clap::{Parser, Subcommand};
use icv_core::{ops, sample::DateRange};
use icv_server::{AppState, ServerConfig};
use rand_core::OsRng;
use tokio::net::TcpListener;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about = "ICV monitoring server")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "config.toml")]
  config: PathBuf,

  #[command(subcommand)]
  command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
  /// Serve the HTTP API (the default).
  Serve,
  /// Run one detection and print the result as JSON.
  Detect {
    /// First day of the range, `YYYY-MM-DD`.
    #[arg(long)]
    from: String,
    /// Last day of the range, `YYYY-MM-DD`.
    #[arg(long)]
    to:   String,
  },
  /// Print the argon2 hash for a password entered on stdin and exit.
  HashPassword,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  // Initialise tracing. Logs go to stderr so `detect` output stays clean.
  tracing_subscriber::fmt()
    .with_writer(std::io::stderr)
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .init();

  let cli = Cli::parse();

  match cli.command.unwrap_or(Command::Serve) {
    Command::HashPassword => hash_password(),
    Command::Serve => serve(load_config(cli.config)?).await,
    Command::Detect { from, to } => detect(load_config(cli.config)?, &from, &to).await,
  }
}

fn load_config(path: PathBuf) -> anyhow::Result<ServerConfig> {
  let settings = config::Config::builder()
    .add_source(config::File::from(path).required(false))
    .add_source(config::Environment::with_prefix("ICV").separator("__"))
    .build()
    .context("failed to read config file")?;

  settings
    .try_deserialize()
    .context("failed to deserialise ServerConfig")
}

async fn serve(config: ServerConfig) -> anyhow::Result<()> {
  let api = icv_server::api_state(&config)?;
  let app = icv_server::router(AppState::new(config.auth()), api);
  let address = format!("{}:{}", config.host, config.port);

  tracing::info!(timezone = %config.timezone, "Listening on http://{address}");
  let listener = TcpListener::bind(&address)
    .await
    .with_context(|| format!("failed to bind {address}"))?;

  axum::serve(listener, app).await.context("server error")?;

  Ok(())
}

async fn detect(config: ServerConfig, from: &str, to: &str) -> anyhow::Result<()> {
  let api = icv_server::api_state(&config)?;
  let range = DateRange::parse(from, to)?;
  let run = ops::detect_and_aggregate(api.store.as_ref(), api.source.as_ref(), &api.detector, &range)
    .await
    .context("detection failed")?;
  println!("{}", serde_json::to_string_pretty(&run)?);
  Ok(())
}

fn hash_password() -> anyhow::Result<()> {
  let password = rpassword_or_stdin()?;
  let salt = SaltString::generate(&mut OsRng);
  let hash = Argon2::default()
    .hash_password(password.as_bytes(), &salt)
    .map_err(|e| anyhow::anyhow!("argon2 error: {e}"))?
    .to_string();
  println!("{hash}");
  Ok(())
}

/// Read a password from stdin.
fn rpassword_or_stdin() -> anyhow::Result<String> {
  use std::io::{self, BufRead, Write};
  let stdin = io::stdin();
  eprint!("Password: ");
  io::stderr().flush().ok();
  let mut line = String::new();
  stdin.lock().read_line(&mut line)?;
  Ok(
    line
      .trim_end_matches('\n')
      .trim_end_matches('\r')
      .to_string(),
  )
}
