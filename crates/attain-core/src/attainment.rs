//! Attainment values, levels, thresholds, and the derived result shape.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ─── Attainment value ────────────────────────────────────────────────────────

/// A computed attainment percentage, or the explicit absence of one.
///
/// `Undefined` means no assessment maps to the outcome. It is data, not an
/// error: 0% is a measured failure, `Undefined` is the absence of any
/// measurement, and downstream consumers must keep the two distinct.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Attainment {
  Measured(Decimal),
  Undefined,
}

impl Attainment {
  pub fn as_measured(self) -> Option<Decimal> {
    match self {
      Attainment::Measured(v) => Some(v),
      Attainment::Undefined => None,
    }
  }

  pub fn is_measured(self) -> bool {
    matches!(self, Attainment::Measured(_))
  }
}

// ─── Classification ──────────────────────────────────────────────────────────

/// Discrete attainment band.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttainmentLevel {
  Excellent,
  High,
  Medium,
  Low,
  VeryLow,
  /// The attainment was `Undefined`; no measurement exists to classify.
  Unknown,
}

/// Band breakpoints — inclusive lower bounds on the higher band.
///
/// Programs with a stricter pass bar override these per outcome; the
/// classifier always takes the active config as a parameter.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ThresholdConfig {
  pub excellent: Decimal,
  pub high:      Decimal,
  pub medium:    Decimal,
  pub low:       Decimal,
}

impl Default for ThresholdConfig {
  fn default() -> Self {
    Self {
      excellent: Decimal::from(80),
      high:      Decimal::from(70),
      medium:    Decimal::from(60),
      low:       Decimal::from(50),
    }
  }
}

// ─── Aggregation inputs ──────────────────────────────────────────────────────

/// How cohort-level CLO attainment is aggregated across students.
///
/// The two strategies diverge when students have missing scores, so the
/// choice is a per-report parameter rather than a global.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum RollupStrategy {
  /// Pool every student's weighted shares before dividing. Robust to partial
  /// submissions: a missing score is excluded, not counted as zero.
  #[default]
  MarksFirst,
  /// Mean of per-student percentages, over students with a measured value.
  StudentFirst,
}

/// Who an attainment result describes.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize,
)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum AttainmentSubject {
  Student(Uuid),
  /// All students observed in a course offering or program scope.
  Cohort(Uuid),
}

impl AttainmentSubject {
  pub fn id(self) -> Uuid {
    match self {
      AttainmentSubject::Student(id) | AttainmentSubject::Cohort(id) => id,
    }
  }
}

/// The population a recompute pass covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum Scope {
  Offering(Uuid),
  Program(Uuid),
}

impl Scope {
  pub fn id(self) -> Uuid {
    match self {
      Scope::Offering(id) | Scope::Program(id) => id,
    }
  }
}

// ─── Results ─────────────────────────────────────────────────────────────────

/// Evidence counts carried alongside a computed percentage.
#[derive(
  Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize,
)]
pub struct SupportingCounts {
  /// Assessment items that contributed marks.
  pub items:             usize,
  /// Distinct students whose scores contributed.
  pub students:          usize,
  /// Child outcomes with a measured value (rollup results only).
  pub children_measured: usize,
  /// Child outcomes mapped under the outcome (rollup results only).
  pub children_total:    usize,
}

/// A derived attainment record.
///
/// Recomputed on demand from raw scores and allocations, cached with its
/// computation timestamp, and never edited outside the logged override path.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttainmentResult {
  pub subject:     AttainmentSubject,
  pub outcome_id:  Uuid,
  pub attainment:  Attainment,
  pub level:       AttainmentLevel,
  pub supporting:  SupportingCounts,
  pub computed_at: DateTime<Utc>,
}

/// Audit record written when an administrator overrides a computed value.
/// The engine records what it had computed at the time, never silently
/// overwrites it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OverrideRecord {
  pub override_id: Uuid,
  pub subject:     AttainmentSubject,
  pub outcome_id:  Uuid,
  /// The computed value at the moment of the correction.
  pub previous:    Attainment,
  /// The imposed percentage.
  pub value:       Decimal,
  pub reason:      String,
  pub recorded_at: DateTime<Utc>,
}
