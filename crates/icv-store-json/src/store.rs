//! [`JsonStore`], the flat-file implementation of [`IcvStore`].

use std::{
  path::{Path, PathBuf},
  sync::Arc,
};

use serde_json::Value;
use tokio::sync::Mutex;

use icv_core::{
  evaluation::{EvaluatedInfraction, EvaluationDocument, EvaluationMap, ValidatedBatch},
  limits::{LimitSpec, decode_limits},
  store::IcvStore,
};

use crate::{Error, Result, document};

/// Locations of the documents a [`JsonStore`] manages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorePaths {
  pub limits:      PathBuf,
  pub evaluations: PathBuf,
  pub snapshot:    PathBuf,
}

impl StorePaths {
  /// The conventional file names inside `dir`.
  pub fn in_dir(dir: impl AsRef<Path>) -> Self {
    let dir = dir.as_ref();
    Self {
      limits:      dir.join("tags.json"),
      evaluations: dir.join("eval.json"),
      snapshot:    dir.join("filtrados.json"),
    }
  }
}

struct Inner {
  paths:       StorePaths,
  /// Serialises writers of the limits document.
  limits:      Mutex<()>,
  /// Serialises writers of the evaluation document and the snapshot.
  evaluations: Mutex<()>,
}

/// An ICV store backed by JSON files.
///
/// Clones share the same paths and writer locks.
#[derive(Clone)]
pub struct JsonStore {
  inner: Arc<Inner>,
}

impl JsonStore {
  pub fn open(paths: StorePaths) -> Self {
    Self {
      inner: Arc::new(Inner {
        paths,
        limits: Mutex::new(()),
        evaluations: Mutex::new(()),
      }),
    }
  }

  pub fn paths(&self) -> &StorePaths { &self.inner.paths }

  async fn read_evaluations(&self) -> Result<EvaluationMap> {
    let path = &self.inner.paths.evaluations;
    let doc = match document::read(path).await? {
      None | Some(Value::Null) => EvaluationDocument::new(),
      // Empty collections have been written as `[]` by older tooling.
      Some(Value::Array(items)) if items.is_empty() => EvaluationDocument::new(),
      Some(value) => serde_json::from_value(value)
        .map_err(|source| Error::Json { path: path.clone(), source })?,
    };
    Ok(EvaluationMap::from_document(doc))
  }
}

impl IcvStore for JsonStore {
  type Error = Error;

  async fn load_limits(&self) -> Result<Vec<LimitSpec>> {
    let value = document::read_required(&self.inner.paths.limits).await?;
    Ok(decode_limits(value)?)
  }

  async fn replace_limits(&self, limits: Vec<LimitSpec>) -> Result<()> {
    let _guard = self.inner.limits.lock().await;
    document::replace(&self.inner.paths.limits, &limits).await
  }

  async fn load_evaluations(&self) -> Result<EvaluationMap> {
    self.read_evaluations().await
  }

  async fn upsert_evaluations(&self, batch: ValidatedBatch) -> Result<EvaluationMap> {
    let _guard = self.inner.evaluations.lock().await;
    let mut map = self.read_evaluations().await?;
    map.upsert(batch);
    document::replace(&self.inner.paths.evaluations, &map.to_document()).await?;
    Ok(map)
  }

  async fn clear_evaluations(&self) -> Result<()> {
    let _guard = self.inner.evaluations.lock().await;
    document::replace(&self.inner.paths.evaluations, &EvaluationDocument::new()).await?;
    document::replace(&self.inner.paths.snapshot, &[] as &[EvaluatedInfraction]).await
  }

  async fn write_snapshot(&self, rows: &[EvaluatedInfraction]) -> Result<()> {
    let _guard = self.inner.evaluations.lock().await;
    document::replace(&self.inner.paths.snapshot, rows).await
  }
}
