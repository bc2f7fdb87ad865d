//! The detector's output record.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::{evaluation::EvaluationKey, limits::Tier};

/// A maximal interval during which a node's value was outside its band,
/// clipped to a single calendar day.
///
/// Serialises with the field names of the detection output document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Infraction {
  #[serde(rename = "tag")]
  pub node:             String,
  #[serde(rename = "nivel_tension")]
  pub tier:             Tier,
  #[serde(rename = "timestamp", with = "crate::timestamp")]
  pub start:            NaiveDateTime,
  #[serde(rename = "sigtimestamp", with = "crate::timestamp")]
  pub end:              NaiveDateTime,
  /// The value of the sample that opened the run, inherited by every
  /// day segment of that run.
  #[serde(rename = "value")]
  pub value_at_start:   f64,
  #[serde(rename = "limiteInferior")]
  pub lower:            f64,
  #[serde(rename = "limiteSuperior")]
  pub upper:            f64,
  /// Always at least one second.
  #[serde(rename = "tiempoFuera")]
  pub duration_seconds: i64,
}

impl Infraction {
  /// The identity evaluations are attached to.
  pub fn key(&self) -> EvaluationKey {
    EvaluationKey { node: self.node.clone(), start: self.start }
  }
}
