//! Per-tier and global ICV aggregation.
//!
//! The ICV of a tier is the evaluated out-of-band time of that tier divided
//! by the number of monitored nodes in the tier, taken from the limit
//! population rather than from the infractions, so nodes without
//! infractions still lower the average. The global ICV divides the evaluated
//! time of all tiers by the total node count. A zero denominator divides
//! by one.

use std::collections::{BTreeMap, HashSet};

use serde::Serialize;

use crate::{
  duration::{FormattedAverage, FormattedDuration, Seconds},
  evaluation::{EvaluatedInfraction, EvaluationMap, EvaluationStatus, merge},
  infraction::Infraction,
  limits::{LimitIndex, Tier},
};

/// One summarised infraction: the merged record plus derived fields
/// exporters would otherwise have to recompute.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InfractionRow {
  #[serde(flatten)]
  pub entry:        EvaluatedInfraction,
  pub status:       EvaluationStatus,
  pub duration_hms: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TierSummary {
  pub tier:                       Tier,
  pub infraction_count:           usize,
  pub total_duration_seconds:     i64,
  pub evaluated_duration_seconds: i64,
  /// Monitored nodes in this tier.
  pub node_count:                 usize,
  pub nodes_with_infractions:     usize,
  pub icv:                        FormattedAverage,
  pub total_duration:             FormattedDuration,
  pub evaluated_duration:         FormattedDuration,
  /// Evaluated time as a share of all out-of-band time, in percent.
  pub evaluated_share_percent:    f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GlobalSummary {
  pub infraction_count:           usize,
  pub total_duration_seconds:     i64,
  pub evaluated_duration_seconds: i64,
  pub node_count:                 usize,
  pub nodes_with_infractions:     usize,
  pub tier_count:                 usize,
  pub icv:                        FormattedAverage,
  pub total_duration:             FormattedDuration,
  pub evaluated_duration:         FormattedDuration,
  pub evaluated_share_percent:    f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Summary {
  pub infractions: Vec<InfractionRow>,
  pub per_tier:    Vec<TierSummary>,
  pub global:      GlobalSummary,
}

#[derive(Default)]
struct Tally<'a> {
  count:     usize,
  total:     i64,
  evaluated: i64,
  nodes:     HashSet<&'a str>,
}

impl<'a> Tally<'a> {
  fn add(&mut self, entry: &'a EvaluatedInfraction) {
    self.count += 1;
    self.total += entry.infraction.duration_seconds;
    if entry.evaluation.is_counted() {
      self.evaluated += entry.infraction.duration_seconds;
    }
    self.nodes.insert(&entry.infraction.node);
  }
}

fn average(evaluated: i64, nodes: usize) -> Seconds {
  Seconds(evaluated as f64 / nodes.max(1) as f64)
}

fn share_percent(evaluated: i64, total: i64) -> f64 {
  if total > 0 { evaluated as f64 / total as f64 * 100.0 } else { 0.0 }
}

/// Merge `infractions` with `overlay` and aggregate against the node
/// population in `limits`.
pub fn summarize(
  infractions: Vec<Infraction>,
  overlay: &EvaluationMap,
  limits: &LimitIndex,
) -> Summary {
  summarize_merged(merge(infractions, overlay), limits)
}

/// Aggregate infractions that already carry their evaluation.
pub fn summarize_merged(merged: Vec<EvaluatedInfraction>, limits: &LimitIndex) -> Summary {
  let (per_tier, global) = aggregate(&merged, limits);

  let infractions = merged
    .into_iter()
    .map(|entry| InfractionRow {
      status: entry.evaluation.status(),
      duration_hms: Seconds::from(entry.infraction.duration_seconds).hms().to_string(),
      entry,
    })
    .collect();

  Summary { infractions, per_tier, global }
}

fn aggregate(
  merged: &[EvaluatedInfraction],
  limits: &LimitIndex,
) -> (Vec<TierSummary>, GlobalSummary) {
  let population = limits.nodes_per_tier();

  let mut all = Tally::default();
  let mut by_tier: BTreeMap<Tier, Tally<'_>> =
    population.keys().map(|tier| (*tier, Tally::default())).collect();
  for entry in merged {
    all.add(entry);
    by_tier.entry(entry.infraction.tier).or_default().add(entry);
  }

  let per_tier: Vec<TierSummary> = by_tier
    .iter()
    .rev()
    .map(|(tier, tally)| {
      let node_count = population.get(tier).copied().unwrap_or(0);
      TierSummary {
        tier: *tier,
        infraction_count: tally.count,
        total_duration_seconds: tally.total,
        evaluated_duration_seconds: tally.evaluated,
        node_count,
        nodes_with_infractions: tally.nodes.len(),
        icv: average(tally.evaluated, node_count).into(),
        total_duration: tally.total.into(),
        evaluated_duration: tally.evaluated.into(),
        evaluated_share_percent: share_percent(tally.evaluated, tally.total),
      }
    })
    .collect();

  let node_count = limits.node_count();
  let global = GlobalSummary {
    infraction_count: all.count,
    total_duration_seconds: all.total,
    evaluated_duration_seconds: all.evaluated,
    node_count,
    nodes_with_infractions: all.nodes.len(),
    tier_count: per_tier.len(),
    icv: average(all.evaluated, node_count).into(),
    total_duration: all.total.into(),
    evaluated_duration: all.evaluated.into(),
    evaluated_share_percent: share_percent(all.evaluated, all.total),
  };

  (per_tier, global)
}
