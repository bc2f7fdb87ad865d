//! Human evaluations of infractions and the overlay merge.
//!
//! An evaluation is keyed by the same identity as an infraction: the node and
//! the infraction's start timestamp. The persisted document nests records by
//! node, then by canonical start timestamp string.

use std::collections::{BTreeMap, HashMap};

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::{Error, Result, infraction::Infraction, timestamp};

// ─── Records ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EvaluationKey {
  pub node:  String,
  pub start: NaiveDateTime,
}

impl EvaluationKey {
  pub fn new(node: impl Into<String>, start: NaiveDateTime) -> Self {
    Self { node: node.into(), start }
  }
}

/// A human judgment on one infraction. `counts` and `excluded` are mutually
/// exclusive in valid data.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvaluationRecord {
  #[serde(rename = "cuenta", default)]
  pub counts:        bool,
  #[serde(rename = "nocuenta", default)]
  pub excluded:      bool,
  #[serde(rename = "descripcion", default)]
  pub justification: String,
}

/// Where an evaluated infraction stands with respect to the ICV metric.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvaluationStatus {
  Counted,
  Excluded,
  Pending,
}

impl EvaluationRecord {
  /// `true` when the infraction contributes to the evaluated duration.
  pub fn is_counted(&self) -> bool { self.counts && !self.excluded }

  pub fn status(&self) -> EvaluationStatus {
    if self.excluded {
      EvaluationStatus::Excluded
    } else if self.counts {
      EvaluationStatus::Counted
    } else {
      EvaluationStatus::Pending
    }
  }
}

// ─── Document ────────────────────────────────────────────────────────────────

/// The persisted shape: node → start timestamp → record.
pub type EvaluationDocument = BTreeMap<String, BTreeMap<String, EvaluationRecord>>;

/// In-memory evaluation overlay keyed by [`EvaluationKey`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EvaluationMap {
  records: HashMap<EvaluationKey, EvaluationRecord>,
}

impl EvaluationMap {
  pub fn new() -> Self { Self::default() }

  /// Build the overlay from its persisted shape. Entries whose timestamp key
  /// cannot be parsed are logged and dropped.
  pub fn from_document(doc: EvaluationDocument) -> Self {
    let mut records = HashMap::new();
    for (node, by_start) in doc {
      for (raw_start, record) in by_start {
        match timestamp::parse_naive(&raw_start) {
          Some(start) => {
            records.insert(EvaluationKey::new(node.clone(), start), record);
          }
          None => tracing::warn!(%node, raw_start, "dropping evaluation with unparseable timestamp"),
        }
      }
    }
    Self { records }
  }

  pub fn to_document(&self) -> EvaluationDocument {
    let mut doc = EvaluationDocument::new();
    for (key, record) in &self.records {
      doc
        .entry(key.node.clone())
        .or_default()
        .insert(timestamp::format(&key.start), record.clone());
    }
    doc
  }

  pub fn get(&self, key: &EvaluationKey) -> Option<&EvaluationRecord> {
    self.records.get(key)
  }

  pub fn insert(&mut self, key: EvaluationKey, record: EvaluationRecord) {
    self.records.insert(key, record);
  }

  pub fn len(&self) -> usize { self.records.len() }

  pub fn is_empty(&self) -> bool { self.records.is_empty() }

  /// Insert new keys and fully replace the values of existing ones.
  pub fn upsert(&mut self, batch: ValidatedBatch) {
    self.records.extend(batch.0);
  }

  /// The most recently started evaluated infraction.
  pub fn latest(&self) -> Option<&EvaluationKey> {
    self.records.keys().max_by(|a, b| {
      a.start.cmp(&b.start).then_with(|| b.node.cmp(&a.node))
    })
  }
}

// ─── Write batches ───────────────────────────────────────────────────────────

/// One element of an evaluation save request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvaluationUpdate {
  pub tag:         String,
  pub timestamp:   String,
  #[serde(default)]
  pub cuenta:      bool,
  #[serde(default)]
  pub nocuenta:    bool,
  #[serde(default)]
  pub descripcion: String,
}

/// A batch that passed [`validate_batch`]; the only input
/// [`EvaluationMap::upsert`] accepts.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedBatch(Vec<(EvaluationKey, EvaluationRecord)>);

impl ValidatedBatch {
  pub fn len(&self) -> usize { self.0.len() }

  pub fn is_empty(&self) -> bool { self.0.is_empty() }
}

/// Validate a whole save request. Any offending element rejects the batch.
///
/// Accepted records are normalised: justifications are trimmed, and when
/// both flags are set `excluded` wins and `counts` is cleared.
pub fn validate_batch(updates: Vec<EvaluationUpdate>) -> Result<ValidatedBatch> {
  let mut offenders = Vec::new();
  let mut accepted = Vec::with_capacity(updates.len());

  for update in updates {
    let node = update.tag.trim();
    let label = format!("{node}@{}", update.timestamp.trim());
    let justification = update.descripcion.trim();

    if node.is_empty() {
      offenders.push(format!("{label}: tag is missing"));
      continue;
    }
    let Some(start) = timestamp::parse_naive(&update.timestamp) else {
      offenders.push(format!("{label}: timestamp is not valid"));
      continue;
    };
    if update.nocuenta && justification.is_empty() {
      offenders.push(format!("{label}: justification required when excluded"));
      continue;
    }

    accepted.push((EvaluationKey::new(node, start), EvaluationRecord {
      counts:        update.cuenta && !update.nocuenta,
      excluded:      update.nocuenta,
      justification: justification.to_owned(),
    }));
  }

  if offenders.is_empty() {
    Ok(ValidatedBatch(accepted))
  } else {
    Err(Error::Validation {
      reason: "evaluation batch rejected".into(),
      offenders,
    })
  }
}

// ─── Overlay merge ───────────────────────────────────────────────────────────

/// An infraction with its evaluation attached.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EvaluatedInfraction {
  #[serde(flatten)]
  pub infraction: Infraction,
  #[serde(flatten)]
  pub evaluation: EvaluationRecord,
}

/// Left-join `infractions` with `overlay` on (node, start). Every infraction
/// appears exactly once, in input order; unmatched ones get a default record.
pub fn merge(infractions: Vec<Infraction>, overlay: &EvaluationMap) -> Vec<EvaluatedInfraction> {
  infractions
    .into_iter()
    .map(|infraction| {
      let evaluation = overlay.get(&infraction.key()).cloned().unwrap_or_default();
      EvaluatedInfraction { infraction, evaluation }
    })
    .collect()
}

#[cfg(test)]
mod tests {
  use serde_json::json;

  use super::*;
  use crate::limits::Tier;

  fn ts(raw: &str) -> NaiveDateTime { timestamp::parse_naive(raw).unwrap() }

  fn update(tag: &str, at: &str, cuenta: bool, nocuenta: bool, why: &str) -> EvaluationUpdate {
    EvaluationUpdate {
      tag:         tag.into(),
      timestamp:   at.into(),
      cuenta,
      nocuenta,
      descripcion: why.into(),
    }
  }

  fn infraction(node: &str, start: &str, secs: i64) -> Infraction {
    Infraction {
      node:             node.into(),
      tier:             Tier::KV230,
      start:            ts(start),
      end:              ts(start) + chrono::TimeDelta::seconds(secs),
      value_at_start:   250.0,
      lower:            218.5,
      upper:            241.5,
      duration_seconds: secs,
    }
  }

  #[test]
  fn document_round_trip_uses_canonical_keys() {
    let doc: EvaluationDocument = serde_json::from_value(json!({
      "A": {
        "2025-01-01T08:00:00": { "cuenta": true, "nocuenta": false, "descripcion": "" },
        "not a time": { "cuenta": true }
      },
      "B": {
        "2025-01-02 09:30:00": { "nocuenta": true, "descripcion": "maintenance" }
      }
    }))
    .unwrap();
    let map = EvaluationMap::from_document(doc);
    assert_eq!(map.len(), 2);

    let out = serde_json::to_value(map.to_document()).unwrap();
    assert_eq!(out, json!({
      "A": {
        "2025-01-01 08:00:00": { "cuenta": true, "nocuenta": false, "descripcion": "" }
      },
      "B": {
        "2025-01-02 09:30:00": { "cuenta": false, "nocuenta": true, "descripcion": "maintenance" }
      }
    }));
  }

  #[test]
  fn batch_with_one_bad_entry_is_rejected() {
    let err = validate_batch(vec![
      update("A", "2025-01-01 08:00:00", true, false, ""),
      update("B", "2025-01-01 09:00:00", false, true, "   "),
      update("C", "2025-01-01 10:00:00", false, true, "storm"),
    ])
    .unwrap_err();
    let Error::Validation { offenders, .. } = err else {
      panic!("expected validation error, got {err:?}");
    };
    assert_eq!(offenders.len(), 1);
    assert!(offenders[0].starts_with("B@"));
  }

  #[test]
  fn malformed_keys_are_rejected() {
    let err = validate_batch(vec![
      update("", "2025-01-01 08:00:00", true, false, ""),
      update("A", "tomorrow", true, false, ""),
    ])
    .unwrap_err();
    assert!(matches!(err, Error::Validation { ref offenders, .. } if offenders.len() == 2));
  }

  #[test]
  fn upsert_inserts_and_replaces() {
    let mut map = EvaluationMap::new();
    map.insert(EvaluationKey::new("A", ts("2025-01-01 08:00:00")), EvaluationRecord {
      counts:        false,
      excluded:      true,
      justification: "old".into(),
    });

    let batch = validate_batch(vec![
      update("A", "2025-01-01 08:00:00", true, false, "  confirmed  "),
      update("B", "2025-01-01 09:00:00", true, true, "planned outage"),
    ])
    .unwrap();
    map.upsert(batch);

    assert_eq!(map.len(), 2);
    let a = map.get(&EvaluationKey::new("A", ts("2025-01-01 08:00:00"))).unwrap();
    assert_eq!(a, &EvaluationRecord {
      counts:        true,
      excluded:      false,
      justification: "confirmed".into(),
    });
    let b = map.get(&EvaluationKey::new("B", ts("2025-01-01 09:00:00"))).unwrap();
    assert!(b.excluded && !b.counts);
    assert_eq!(b.status(), EvaluationStatus::Excluded);
  }

  #[test]
  fn merge_is_a_left_join() {
    let mut overlay = EvaluationMap::new();
    overlay.insert(EvaluationKey::new("A", ts("2025-01-01 08:00:00")), EvaluationRecord {
      counts:        true,
      excluded:      false,
      justification: String::new(),
    });
    // Evaluation for an infraction that is no longer detected.
    overlay.insert(EvaluationKey::new("Z", ts("2025-01-01 08:00:00")), EvaluationRecord::default());

    let merged = merge(
      vec![
        infraction("A", "2025-01-01 08:00:00", 30),
        infraction("A", "2025-01-01 09:00:00", 5),
        infraction("B", "2025-01-01 08:00:00", 7),
      ],
      &overlay,
    );
    assert_eq!(merged.len(), 3);
    assert_eq!(merged[0].evaluation.status(), EvaluationStatus::Counted);
    assert_eq!(merged[1].evaluation, EvaluationRecord::default());
    assert_eq!(merged[2].evaluation.status(), EvaluationStatus::Pending);
  }

  #[test]
  fn evaluated_infraction_wire_shape() {
    let merged = merge(vec![infraction("A", "2025-01-01 08:00:00", 30)], &EvaluationMap::new());
    let value = serde_json::to_value(&merged[0]).unwrap();
    assert_eq!(value, json!({
      "tag": "A",
      "nivel_tension": 230,
      "timestamp": "2025-01-01 08:00:00",
      "sigtimestamp": "2025-01-01 08:00:30",
      "value": 250.0,
      "limiteInferior": 218.5,
      "limiteSuperior": 241.5,
      "tiempoFuera": 30,
      "cuenta": false,
      "nocuenta": false,
      "descripcion": ""
    }));
  }

  #[test]
  fn latest_picks_most_recent_start() {
    let mut map = EvaluationMap::new();
    assert!(map.latest().is_none());
    map.insert(EvaluationKey::new("A", ts("2025-01-03 08:00:00")), EvaluationRecord::default());
    map.insert(EvaluationKey::new("B", ts("2025-01-05 08:00:00")), EvaluationRecord::default());
    map.insert(EvaluationKey::new("C", ts("2025-01-04 08:00:00")), EvaluationRecord::default());
    assert_eq!(map.latest().unwrap().node, "B");
  }
}
