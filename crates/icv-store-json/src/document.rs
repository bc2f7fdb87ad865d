//! Whole-document reads and atomic replacements.

use std::path::{Path, PathBuf};

use serde::Serialize;
use serde_json::Value;
use tokio::io::AsyncWriteExt as _;

use crate::{Error, Result};

fn io_err(path: &Path) -> impl FnOnce(std::io::Error) -> Error + '_ {
  move |source| Error::Io { path: path.to_path_buf(), source }
}

/// Read and parse a JSON document. Returns `None` if the file does not exist.
pub async fn read(path: &Path) -> Result<Option<Value>> {
  let bytes = match tokio::fs::read(path).await {
    Ok(bytes) => bytes,
    Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
    Err(e) => return Err(io_err(path)(e)),
  };
  serde_json::from_slice(&bytes)
    .map(Some)
    .map_err(|source| Error::Json { path: path.to_path_buf(), source })
}

/// Like [`read`], but a missing document is an error.
pub async fn read_required(path: &Path) -> Result<Value> {
  read(path).await?.ok_or_else(|| Error::Missing(path.to_path_buf()))
}

fn staging_path(path: &Path) -> PathBuf {
  let mut name = path.file_name().unwrap_or_default().to_os_string();
  name.push(".tmp");
  path.with_file_name(name)
}

/// Replace the document at `path` with `value`, pretty-printed.
///
/// The new content is written and synced to a sibling staging file which is
/// then renamed over the target, so readers see either the old or the new
/// document in full. Callers must serialise writers to the same path.
pub async fn replace<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
  let bytes = serde_json::to_vec_pretty(value)
    .map_err(|source| Error::Json { path: path.to_path_buf(), source })?;

  if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
    tokio::fs::create_dir_all(parent).await.map_err(io_err(parent))?;
  }

  let staging = staging_path(path);
  let mut file = tokio::fs::File::create(&staging)
    .await
    .map_err(io_err(&staging))?;
  file.write_all(&bytes).await.map_err(io_err(&staging))?;
  file.sync_all().await.map_err(io_err(&staging))?;
  drop(file);

  tokio::fs::rename(&staging, path).await.map_err(io_err(path))?;
  tracing::debug!(path = %path.display(), bytes = bytes.len(), "document replaced");
  Ok(())
}
