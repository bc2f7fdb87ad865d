//! Flat JSON document backend for ICV monitoring.
//!
//! Each document (limits, evaluations, detection snapshot, samples) is a
//! single JSON file. Writes replace a file whole via write-then-rename, and
//! writers to the same document are serialised behind a per-document lock.

mod document;
mod source;
mod store;

pub mod error;

pub use error::{Error, Result};
pub use source::{CommandSource, FileSource, Samples};
pub use store::{JsonStore, StorePaths};
