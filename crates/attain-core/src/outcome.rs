//! Outcome entities and the mapping edges linking adjacent tiers.
//!
//! Outcomes form a three-tier hierarchy (PEO ← PLO ← CLO). Edges are held as
//! an edge list keyed by (child, parent) rather than as parent lists embedded
//! in child objects, so cascade deletes and bidirectional traversal are both
//! index lookups.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The tier an outcome occupies in the hierarchy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
  /// Course Learning Outcome — scoped to one course offering.
  Clo,
  /// Program Learning Outcome — scoped to a degree program.
  Plo,
  /// Program Educational Objective — the highest tier.
  Peo,
}

impl Tier {
  /// The tier immediately above, if any. Mapping edges may only connect a
  /// child to a parent in this tier.
  pub fn parent(self) -> Option<Tier> {
    match self {
      Tier::Clo => Some(Tier::Plo),
      Tier::Plo => Some(Tier::Peo),
      Tier::Peo => None,
    }
  }
}

/// A learning outcome at any tier.
///
/// `scope_id` is the course offering for a CLO, the degree program for a PLO
/// or PEO. `code` is the human-readable label ("CLO1") and is unique within
/// a (scope, tier) pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Outcome {
  pub outcome_id:  Uuid,
  pub tier:        Tier,
  pub scope_id:    Uuid,
  pub code:        String,
  pub description: String,
  pub created_at:  DateTime<Utc>,
}

/// Input to [`crate::store::OutcomeStore::create_outcome`].
/// `outcome_id` and `created_at` are always assigned by the store.
#[derive(Debug, Clone)]
pub struct NewOutcome {
  pub tier:        Tier,
  pub scope_id:    Uuid,
  pub code:        String,
  pub description: String,
}

/// A directed edge from a child outcome to a parent one tier up.
/// At most one edge exists per (child, parent) pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MappingEdge {
  pub child_id:   Uuid,
  pub parent_id:  Uuid,
  /// Rollup weight. Every edge is created with weight 1; the field exists so
  /// weighted rollup can land without changing the aggregation contract.
  pub weight:     Decimal,
  pub created_at: DateTime<Utc>,
}

/// Rows removed alongside a deleted outcome, reported for audit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CascadeReport {
  pub edges_removed:       usize,
  pub allocations_removed: usize,
}

impl CascadeReport {
  pub fn total(&self) -> usize {
    self.edges_removed + self.allocations_removed
  }
}
