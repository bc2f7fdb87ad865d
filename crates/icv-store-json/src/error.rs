//! Error type for `icv-store-json`.

use std::{path::PathBuf, time::Duration};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("core error: {0}")]
  Core(#[from] icv_core::Error),

  #[error("document {0:?} does not exist")]
  Missing(PathBuf),

  #[error("i/o error on {path:?}: {source}")]
  Io {
    path:   PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error("malformed document {path:?}: {source}")]
  Json {
    path:   PathBuf,
    #[source]
    source: serde_json::Error,
  },

  #[error("sample generator {program:?} failed: {detail}")]
  Generator { program: String, detail: String },

  #[error("sample generator {program:?} timed out after {after:?}")]
  Timeout { program: String, after: Duration },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
