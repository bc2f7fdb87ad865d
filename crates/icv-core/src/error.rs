//! Error types for `icv-core`.

use thiserror::Error;

/// A boxed error produced by a storage backend or sample source.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, Error)]
pub enum Error {
  /// Missing or malformed caller input, such as the date range.
  #[error("invalid input: {0}")]
  Input(String),

  /// A samples or limits document could not be read or decoded.
  #[error("failed to read {what}: {source}")]
  Unreadable {
    what:   &'static str,
    #[source]
    source: BoxError,
  },

  /// A write batch was rejected as a whole; nothing was persisted.
  #[error("{reason}: {}", offenders.join("; "))]
  Validation {
    reason:    String,
    offenders: Vec<String>,
  },

  #[error("admin session required")]
  Unauthorized,

  /// Writing a document failed. Documents are replaced whole, so the prior
  /// on-disk state is unchanged.
  #[error("persistence error: {0}")]
  Persistence(#[source] BoxError),
}

impl Error {
  pub(crate) fn unreadable<E>(what: &'static str, source: E) -> Self
  where
    E: std::error::Error + Send + Sync + 'static,
  {
    Self::Unreadable { what, source: Box::new(source) }
  }

  pub(crate) fn persistence<E>(source: E) -> Self
  where
    E: std::error::Error + Send + Sync + 'static,
  {
    Self::Persistence(Box::new(source))
  }

  /// `true` for input-class errors: bad caller input, an unreadable input
  /// document, a rejected batch, or a missing admin session. Only
  /// persistence failures are server-side.
  pub fn is_client_error(&self) -> bool {
    !matches!(self, Self::Persistence(_))
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn only_persistence_is_server_side() {
    let io = || std::io::Error::other("boom");
    assert!(Error::Input("no dates".into()).is_client_error());
    assert!(Error::unreadable("samples", io()).is_client_error());
    assert!(Error::Unauthorized.is_client_error());
    assert!(!Error::persistence(io()).is_client_error());
  }
}
