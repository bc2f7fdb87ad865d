//! Core types and operations for voltage-quality (ICV) monitoring.
//!
//! This crate is deliberately free of HTTP and filesystem dependencies. It
//! detects out-of-band intervals in per-node sample streams, overlays human
//! evaluations on them, and aggregates the result into per-tier and global
//! compliance figures. Persistence is reached only through the traits in
//! [`store`].

// We intentionally use native `async fn` in traits (stabilised in Rust 1.75).
// Suppress the advisory lint about `Send` bounds on the returned futures.
#![allow(async_fn_in_trait)]

pub mod aggregate;
pub mod detect;
pub mod duration;
pub mod error;
pub mod evaluation;
pub mod infraction;
pub mod limits;
pub mod ops;
pub mod sample;
pub mod store;
pub mod timestamp;

pub use error::{Error, Result};
