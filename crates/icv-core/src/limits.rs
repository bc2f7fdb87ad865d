//! Limit bands and the per-node limit index.

use std::{
  collections::{BTreeMap, HashMap, HashSet},
  fmt,
};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{Error, Result, sample::lenient_number};

// ─── Tier ────────────────────────────────────────────────────────────────────

/// Voltage classification of a node, in kilovolts.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Tier(pub u32);

impl Tier {
  pub const KV400: Tier = Tier(400);
  pub const KV230: Tier = Tier(230);
  pub const KV115: Tier = Tier(115);
  pub const KV69: Tier = Tier(69);

  fn from_number(n: f64) -> Option<Self> {
    (n >= 0.0 && n <= f64::from(u32::MAX)).then(|| Tier(n.trunc() as u32))
  }
}

impl fmt::Display for Tier {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{} kV", self.0)
  }
}

// ─── LimitSpec ───────────────────────────────────────────────────────────────

/// The inclusive band a node's value must stay within.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LimitSpec {
  #[serde(rename = "tag")]
  pub node:  String,
  #[serde(rename = "limiteInferior")]
  pub lower: f64,
  #[serde(rename = "limiteSuperior")]
  pub upper: f64,
  #[serde(rename = "nivel_tension")]
  pub tier:  Tier,
}

impl LimitSpec {
  /// `true` when `value` lies within `[lower, upper]`. Bounds are inclusive.
  pub fn contains(&self, value: f64) -> bool {
    value >= self.lower && value <= self.upper
  }
}

/// A limits document entry before validation. Numbers may arrive as JSON
/// numbers or numeric strings.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct LimitEntry {
  #[serde(default)]
  pub tag:             Option<String>,
  #[serde(default, rename = "limiteInferior")]
  pub limite_inferior: Option<Value>,
  #[serde(default, rename = "limiteSuperior")]
  pub limite_superior: Option<Value>,
  #[serde(default)]
  pub nivel_tension:   Option<Value>,
}

impl LimitEntry {
  fn parse(&self) -> std::result::Result<LimitSpec, &'static str> {
    let node = self
      .tag
      .as_deref()
      .map(str::trim)
      .filter(|t| !t.is_empty())
      .ok_or("tag is missing")?;
    let lower = self
      .limite_inferior
      .as_ref()
      .and_then(lenient_number)
      .ok_or("lower bound is not a number")?;
    let upper = self
      .limite_superior
      .as_ref()
      .and_then(lenient_number)
      .ok_or("upper bound is not a number")?;
    let tier = self
      .nivel_tension
      .as_ref()
      .and_then(lenient_number)
      .and_then(Tier::from_number)
      .ok_or("voltage tier is not a number")?;
    Ok(LimitSpec { node: node.to_owned(), lower, upper, tier })
  }
}

/// Decode a limits document leniently: entries that cannot be interpreted
/// are logged and skipped.
pub fn decode_limits(doc: Value) -> Result<Vec<LimitSpec>> {
  let Value::Array(items) = doc else {
    return Err(Error::Input("limits document is not a JSON array".into()));
  };
  let mut specs = Vec::with_capacity(items.len());
  for (index, item) in items.into_iter().enumerate() {
    let entry: LimitEntry = serde_json::from_value(item).unwrap_or_default();
    match entry.parse() {
      Ok(spec) => specs.push(spec),
      Err(reason) => tracing::warn!(index, reason, "skipping limit entry"),
    }
  }
  Ok(specs)
}

/// Validate a full replacement of the limits document. Every entry must be
/// complete, numeric, have `lower <= upper`, and carry a unique tag; any
/// failure rejects the whole replacement.
pub fn validate_replacement(entries: &[LimitEntry]) -> Result<Vec<LimitSpec>> {
  let mut offenders = Vec::new();
  let mut seen = HashSet::new();
  let mut specs = Vec::with_capacity(entries.len());

  for (index, entry) in entries.iter().enumerate() {
    match entry.parse() {
      Ok(spec) if spec.lower > spec.upper => offenders.push(format!(
        "entry {index} ({}): lower bound exceeds upper bound",
        spec.node
      )),
      Ok(spec) if !seen.insert(spec.node.clone()) => {
        offenders.push(format!("entry {index} ({}): duplicate tag", spec.node))
      }
      Ok(spec) => specs.push(spec),
      Err(reason) => offenders.push(format!("entry {index}: {reason}")),
    }
  }

  if offenders.is_empty() {
    Ok(specs)
  } else {
    Err(Error::Validation {
      reason: "limit replacement rejected".into(),
      offenders,
    })
  }
}

// ─── LimitIndex ──────────────────────────────────────────────────────────────

/// Node → limit band lookup. Later specs for the same node replace earlier
/// ones.
#[derive(Debug, Clone, Default)]
pub struct LimitIndex {
  by_node: HashMap<String, LimitSpec>,
}

impl LimitIndex {
  pub fn new(specs: impl IntoIterator<Item = LimitSpec>) -> Self {
    let by_node = specs.into_iter().map(|s| (s.node.clone(), s)).collect();
    Self { by_node }
  }

  pub fn get(&self, node: &str) -> Option<&LimitSpec> { self.by_node.get(node) }

  /// Number of monitored nodes.
  pub fn node_count(&self) -> usize { self.by_node.len() }

  /// Number of monitored nodes in each tier.
  pub fn nodes_per_tier(&self) -> BTreeMap<Tier, usize> {
    let mut counts = BTreeMap::new();
    for spec in self.by_node.values() {
      *counts.entry(spec.tier).or_insert(0) += 1;
    }
    counts
  }
}

#[cfg(test)]
mod tests {
  use serde_json::json;

  use super::*;

  fn spec(node: &str, tier: u32) -> LimitSpec {
    LimitSpec { node: node.into(), lower: 0.0, upper: 10.0, tier: Tier(tier) }
  }

  #[test]
  fn bounds_are_inclusive() {
    let s = spec("A", 115);
    assert!(s.contains(0.0));
    assert!(s.contains(10.0));
    assert!(!s.contains(-0.001));
    assert!(!s.contains(10.001));
  }

  #[test]
  fn decode_is_lenient() {
    let specs = decode_limits(json!([
      { "tag": "A", "limiteInferior": "108.5", "limiteSuperior": 121, "nivel_tension": "115" },
      { "tag": "B", "limiteInferior": 0, "limiteSuperior": 1 },
      { "limiteInferior": 0, "limiteSuperior": 1, "nivel_tension": 69 },
      "garbage"
    ]))
    .unwrap();
    assert_eq!(specs.len(), 1);
    assert_eq!(specs[0].lower, 108.5);
    assert_eq!(specs[0].tier, Tier::KV115);
  }

  #[test]
  fn index_counts_unique_nodes_per_tier() {
    let index = LimitIndex::new(vec![
      spec("A", 400),
      spec("B", 400),
      spec("C", 69),
      spec("A", 230),
    ]);
    assert_eq!(index.node_count(), 3);
    assert_eq!(index.get("A").unwrap().tier, Tier::KV230);
    let per_tier = index.nodes_per_tier();
    assert_eq!(per_tier[&Tier::KV400], 1);
    assert_eq!(per_tier[&Tier::KV230], 1);
    assert_eq!(per_tier[&Tier::KV69], 1);
  }

  #[test]
  fn replacement_is_all_or_nothing() {
    let entries: Vec<LimitEntry> = serde_json::from_value(json!([
      { "tag": "A", "limiteInferior": 1, "limiteSuperior": 2, "nivel_tension": 115 },
      { "tag": "B", "limiteInferior": 5, "limiteSuperior": 2, "nivel_tension": 115 },
      { "tag": "A", "limiteInferior": 1, "limiteSuperior": 2, "nivel_tension": 115 },
      { "tag": " ", "limiteInferior": 1, "limiteSuperior": 2, "nivel_tension": 115 }
    ]))
    .unwrap();
    let Err(Error::Validation { offenders, .. }) = validate_replacement(&entries)
    else {
      panic!("expected validation error");
    };
    assert_eq!(offenders.len(), 3);

    let ok = validate_replacement(&entries[..1]).unwrap();
    assert_eq!(ok, vec![LimitSpec {
      node:  "A".into(),
      lower: 1.0,
      upper: 2.0,
      tier:  Tier::KV115,
    }]);
  }

  #[test]
  fn tier_display() {
    assert_eq!(Tier::KV400.to_string(), "400 kV");
  }
}
