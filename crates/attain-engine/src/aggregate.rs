//! CLO attainment from scores and allocations, rolled up tier by tier.
//!
//! The pure functions at the top operate on a [`CloEvidence`] snapshot read
//! in bulk; [`Aggregator`] orchestrates the store reads around them. Evidence
//! is keyed into ordered maps before any arithmetic, so input order cannot
//! affect a result.

use std::collections::{BTreeMap, BTreeSet};

use chrono::Utc;
use rust_decimal::Decimal;
use uuid::Uuid;

use attain_core::{
  assessment::ScoreRecord,
  attainment::{
    Attainment, AttainmentResult, AttainmentSubject, OverrideRecord,
    RollupStrategy, SupportingCounts,
  },
  outcome::{Outcome, Tier},
  store::{OutcomeStore, ScoreSource},
};

use crate::{
  EngineStore,
  classify::classify,
  error::EngineError,
  summary::{BreakdownRow, student_breakdown},
};

// ─── Evidence snapshot ───────────────────────────────────────────────────────

/// The marks an item allocates to the CLO under computation, with the
/// item's total.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ItemWeight {
  pub allocated: Decimal,
  pub total:     Decimal,
}

/// Everything needed to compute one CLO's attainment, read in bulk up front.
#[derive(Debug, Clone, Default)]
pub struct CloEvidence {
  /// Items with a nonzero allocation to the CLO, keyed by item id.
  pub items:  BTreeMap<Uuid, ItemWeight>,
  /// Obtained marks keyed by (student, item).
  pub scores: BTreeMap<(Uuid, Uuid), Decimal>,
}

impl CloEvidence {
  /// Build a snapshot. Zero-allocation rows carry no weight and are
  /// dropped here so the folds below never see them.
  pub fn new(
    items: Vec<(Uuid, ItemWeight)>,
    scores: Vec<ScoreRecord>,
  ) -> Self {
    let items = items
      .into_iter()
      .filter(|(_, w)| w.allocated > Decimal::ZERO)
      .collect();
    let scores = scores
      .into_iter()
      .map(|s| ((s.student_id, s.item_id), s.obtained))
      .collect();
    Self { items, scores }
  }

  /// Every student with at least one recorded score in the snapshot.
  pub fn students(&self) -> BTreeSet<Uuid> {
    self.scores.keys().map(|(student, _)| *student).collect()
  }
}

// ─── Pure attainment functions ───────────────────────────────────────────────

/// CLO attainment for a single student.
///
/// Per item with a score for the student: share = obtained × allocated ÷
/// total, capped implicitly by the score bound. Attainment is
/// 100 × Σshare ÷ Σallocated; with no contributing items the result is
/// `Undefined`, never 0.
pub fn student_clo_attainment(
  evidence: &CloEvidence,
  student: Uuid,
) -> (Attainment, SupportingCounts) {
  let mut shares = Decimal::ZERO;
  let mut max_possible = Decimal::ZERO;
  let mut items = 0usize;

  for (item_id, weight) in &evidence.items {
    let Some(obtained) = evidence.scores.get(&(student, *item_id)) else {
      continue;
    };
    shares += *obtained * weight.allocated / weight.total;
    max_possible += weight.allocated;
    items += 1;
  }

  if max_possible.is_zero() {
    return (Attainment::Undefined, SupportingCounts::default());
  }

  let counts = SupportingCounts {
    items,
    students: 1,
    ..SupportingCounts::default()
  };
  (
    Attainment::Measured(Decimal::ONE_HUNDRED * shares / max_possible),
    counts,
  )
}

/// Cohort CLO attainment under the chosen rollup strategy.
///
/// A (student, item) pair with no recorded score contributes nothing under
/// either strategy — a missing score is an exclusion, not a zero.
pub fn cohort_clo_attainment(
  evidence: &CloEvidence,
  strategy: RollupStrategy,
) -> (Attainment, SupportingCounts) {
  match strategy {
    RollupStrategy::MarksFirst => {
      let mut shares = Decimal::ZERO;
      let mut max_possible = Decimal::ZERO;
      let mut items = BTreeSet::new();
      let mut students = BTreeSet::new();

      for ((student, item_id), obtained) in &evidence.scores {
        let Some(weight) = evidence.items.get(item_id) else {
          continue;
        };
        shares += *obtained * weight.allocated / weight.total;
        max_possible += weight.allocated;
        items.insert(*item_id);
        students.insert(*student);
      }

      if max_possible.is_zero() {
        return (Attainment::Undefined, SupportingCounts::default());
      }

      let counts = SupportingCounts {
        items:    items.len(),
        students: students.len(),
        ..SupportingCounts::default()
      };
      (
        Attainment::Measured(Decimal::ONE_HUNDRED * shares / max_possible),
        counts,
      )
    }

    RollupStrategy::StudentFirst => {
      let mut sum = Decimal::ZERO;
      let mut measured = 0usize;
      let mut items = BTreeSet::new();

      for student in evidence.students() {
        let (attainment, _) = student_clo_attainment(evidence, student);
        if let Some(value) = attainment.as_measured() {
          sum += value;
          measured += 1;
        }
      }
      for (_, item_id) in evidence.scores.keys() {
        if evidence.items.contains_key(item_id) {
          items.insert(*item_id);
        }
      }

      if measured == 0 {
        return (Attainment::Undefined, SupportingCounts::default());
      }

      let counts = SupportingCounts {
        items:    items.len(),
        students: measured,
        ..SupportingCounts::default()
      };
      (
        Attainment::Measured(sum / Decimal::from(measured as u64)),
        counts,
      )
    }
  }
}

/// Weighted mean over child attainments, excluding `Undefined` children.
///
/// All-`Undefined` (or empty) input yields `Undefined` — never 0, never a
/// division by zero.
pub fn rollup_children(
  children: &[(Attainment, Decimal)],
) -> (Attainment, SupportingCounts) {
  let mut weighted = Decimal::ZERO;
  let mut weight_total = Decimal::ZERO;
  let mut measured = 0usize;

  for (attainment, weight) in children {
    if let Some(value) = attainment.as_measured() {
      weighted += value * weight;
      weight_total += weight;
      measured += 1;
    }
  }

  let counts = SupportingCounts {
    children_measured: measured,
    children_total: children.len(),
    ..SupportingCounts::default()
  };

  if weight_total.is_zero() {
    (Attainment::Undefined, counts)
  } else {
    (Attainment::Measured(weighted / weight_total), counts)
  }
}

// ─── Aggregator ──────────────────────────────────────────────────────────────

/// Computes attainment on demand over a store.
///
/// Stateless between calls: every computation re-reads persisted scores,
/// allocations, and edges — never previously computed results.
#[derive(Clone)]
pub struct Aggregator<S> {
  store: S,
}

impl<S: EngineStore> Aggregator<S> {
  pub fn new(store: S) -> Self {
    Self { store }
  }

  pub fn store(&self) -> &S {
    &self.store
  }

  /// Attainment of `outcome_id` for `subject`, computed fresh and
  /// classified under the outcome's active thresholds.
  pub async fn attainment(
    &self,
    subject: AttainmentSubject,
    outcome_id: Uuid,
    strategy: RollupStrategy,
  ) -> Result<AttainmentResult, EngineError<S::Err>> {
    let outcome = self
      .store
      .get_outcome(outcome_id)
      .await
      .map_err(EngineError::Store)?
      .ok_or(attain_core::Error::OutcomeNotFound(outcome_id))?;

    let (attainment, supporting) =
      self.compute(subject, &outcome, strategy).await?;

    let thresholds = self
      .store
      .threshold_for(outcome_id)
      .await
      .map_err(EngineError::Store)?
      .unwrap_or_default();

    Ok(AttainmentResult {
      subject,
      outcome_id,
      attainment,
      level: classify(attainment, &thresholds),
      supporting,
      computed_at: Utc::now(),
    })
  }

  /// Per-student per-CLO classified rows for a course offering, built from
  /// one evidence snapshot per CLO. Sorted by student, then outcome code.
  pub async fn offering_breakdown(
    &self,
    offering_id: Uuid,
  ) -> Result<Vec<BreakdownRow>, EngineError<S::Err>> {
    let clos = self
      .store
      .list_outcomes(offering_id, Some(Tier::Clo))
      .await
      .map_err(EngineError::Store)?;

    let mut rows = Vec::new();
    for clo in &clos {
      let evidence = self
        .clo_evidence(AttainmentSubject::Cohort(offering_id), clo.outcome_id)
        .await?;
      let thresholds = self
        .store
        .threshold_for(clo.outcome_id)
        .await
        .map_err(EngineError::Store)?
        .unwrap_or_default();

      for student in evidence.students() {
        let (attainment, _) = student_clo_attainment(&evidence, student);
        rows.push(BreakdownRow {
          student_id: student,
          offering_id,
          outcome_code: clo.code.clone(),
          attainment,
          level: classify(attainment, &thresholds),
        });
      }
    }

    Ok(student_breakdown(rows))
  }

  /// Administrative correction, written through the logged override path.
  /// The record carries what the engine had computed at the time; nothing
  /// is silently overwritten.
  pub async fn override_attainment(
    &self,
    subject: AttainmentSubject,
    outcome_id: Uuid,
    value: Decimal,
    reason: String,
  ) -> Result<OverrideRecord, EngineError<S::Err>> {
    let current = self
      .attainment(subject, outcome_id, RollupStrategy::default())
      .await?;
    let thresholds = self
      .store
      .threshold_for(outcome_id)
      .await
      .map_err(EngineError::Store)?
      .unwrap_or_default();

    let now = Utc::now();
    let record = OverrideRecord {
      override_id: Uuid::new_v4(),
      subject,
      outcome_id,
      previous: current.attainment,
      value,
      reason,
      recorded_at: now,
    };
    let imposed = AttainmentResult {
      subject,
      outcome_id,
      attainment: Attainment::Measured(value),
      level: classify(Attainment::Measured(value), &thresholds),
      supporting: current.supporting,
      computed_at: now,
    };

    tracing::info!(
      %outcome_id,
      subject = ?subject,
      previous = ?record.previous,
      value = %value,
      reason = %record.reason,
      "attainment manually overridden"
    );

    self
      .store
      .record_override(record.clone(), imposed)
      .await
      .map_err(EngineError::Store)?;
    Ok(record)
  }

  /// Dispatch on tier: CLOs compute from evidence, PLOs and PEOs roll up
  /// their mapped children. Edge adjacency is enforced on write, so a PLO's
  /// children are always CLOs and a PEO's always PLOs.
  pub(crate) async fn compute(
    &self,
    subject: AttainmentSubject,
    outcome: &Outcome,
    strategy: RollupStrategy,
  ) -> Result<(Attainment, SupportingCounts), EngineError<S::Err>> {
    match outcome.tier {
      Tier::Clo => {
        let evidence = self.clo_evidence(subject, outcome.outcome_id).await?;
        Ok(clo_attainment_for(subject, &evidence, strategy))
      }
      Tier::Plo => self.plo_attainment(subject, outcome.outcome_id, strategy).await,
      Tier::Peo => {
        let edges = self
          .store
          .list_child_edges(outcome.outcome_id)
          .await
          .map_err(EngineError::Store)?;
        let mut children = Vec::with_capacity(edges.len());
        for (plo, weight) in edges {
          let (attainment, _) = self
            .plo_attainment(subject, plo.outcome_id, strategy)
            .await?;
          children.push((attainment, weight));
        }
        Ok(rollup_children(&children))
      }
    }
  }

  async fn plo_attainment(
    &self,
    subject: AttainmentSubject,
    plo_id: Uuid,
    strategy: RollupStrategy,
  ) -> Result<(Attainment, SupportingCounts), EngineError<S::Err>> {
    let edges = self
      .store
      .list_child_edges(plo_id)
      .await
      .map_err(EngineError::Store)?;

    let mut children = Vec::with_capacity(edges.len());
    for (clo, weight) in edges {
      let evidence = self.clo_evidence(subject, clo.outcome_id).await?;
      let (attainment, _) = clo_attainment_for(subject, &evidence, strategy);
      children.push((attainment, weight));
    }
    Ok(rollup_children(&children))
  }

  /// Bulk evidence snapshot for one CLO: one allocation read plus one score
  /// fetch, scope-filtered for student subjects.
  pub(crate) async fn clo_evidence(
    &self,
    subject: AttainmentSubject,
    clo_id: Uuid,
  ) -> Result<CloEvidence, EngineError<S::Err>> {
    let allocations = self
      .store
      .allocations_for_clo(clo_id)
      .await
      .map_err(EngineError::Store)?;

    let items: Vec<(Uuid, ItemWeight)> = allocations
      .iter()
      .map(|a| {
        (a.item.item_id, ItemWeight {
          allocated: a.marks,
          total:     a.item.total_marks,
        })
      })
      .collect();

    let item_ids: Vec<Uuid> = items.iter().map(|(id, _)| *id).collect();
    let students = match subject {
      AttainmentSubject::Student(id) => Some(vec![id]),
      AttainmentSubject::Cohort(_) => None,
    };

    let scores = if item_ids.is_empty() {
      Vec::new()
    } else {
      self
        .store
        .fetch_scores(item_ids, students)
        .await
        .map_err(EngineError::Store)?
    };

    Ok(CloEvidence::new(items, scores))
  }
}

/// Subject dispatch over an evidence snapshot.
fn clo_attainment_for(
  subject: AttainmentSubject,
  evidence: &CloEvidence,
  strategy: RollupStrategy,
) -> (Attainment, SupportingCounts) {
  match subject {
    AttainmentSubject::Student(id) => student_clo_attainment(evidence, id),
    AttainmentSubject::Cohort(_) => cohort_clo_attainment(evidence, strategy),
  }
}
