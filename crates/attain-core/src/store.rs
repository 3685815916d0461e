//! The `OutcomeStore`, `ScoreSource`, and `ScoreSink` traits.
//!
//! `OutcomeStore` is implemented by storage backends (e.g.
//! `attain-store-sqlite`). Higher layers (`attain-engine`, `attain-api`)
//! depend on these abstractions, not on any concrete backend. `ScoreSource`
//! is the consumed side of the score ingestion adapter; `ScoreSink` is the
//! optional producing side for backends that also hold the scores.

use std::future::Future;

use rust_decimal::Decimal;
use uuid::Uuid;

use crate::{
  assessment::{
    AllocationDraft, AllocationRow, AssessmentItem, CloAllocation,
    NewAssessmentItem, ScoreRecord,
  },
  attainment::{
    AttainmentResult, AttainmentSubject, OverrideRecord, Scope,
    ThresholdConfig,
  },
  outcome::{CascadeReport, NewOutcome, Outcome, Tier},
};

// ─── Publish outcome ─────────────────────────────────────────────────────────

/// Result of publishing a staged batch of attainment results.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishOutcome {
  /// The batch was committed; carries the number of rows written.
  Written(usize),
  /// The store's revision moved past the one the batch was computed
  /// against. Nothing was written; the caller recomputes from scratch.
  Stale,
}

// ─── OutcomeStore ────────────────────────────────────────────────────────────

/// Abstraction over a hierarchy + allocation + result-cache backend.
///
/// Every mutation is atomic: validation and commit happen as one unit, and a
/// rejected call leaves the store exactly as it was. Structural mutations
/// (outcomes, mappings, items, allocations) advance the revision counter;
/// score ingest does not.
///
/// All methods return `Send` futures so the trait can be used in
/// multi-threaded async runtimes (e.g. tokio with `axum`).
pub trait OutcomeStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  // ── Outcomes ──────────────────────────────────────────────────────────

  /// Create and persist a new outcome. Fails with `DuplicateCode` if the
  /// code is already taken within the same scope and tier.
  fn create_outcome(
    &self,
    input: NewOutcome,
  ) -> impl Future<Output = Result<Outcome, Self::Error>> + Send + '_;

  /// Retrieve an outcome by id. Returns `None` if not found.
  fn get_outcome(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<Outcome>, Self::Error>> + Send + '_;

  /// List the outcomes of a scope, optionally restricted to one tier,
  /// ordered by code.
  fn list_outcomes(
    &self,
    scope_id: Uuid,
    tier: Option<Tier>,
  ) -> impl Future<Output = Result<Vec<Outcome>, Self::Error>> + Send + '_;

  /// Delete an outcome, cascading over every mapping edge touching it and
  /// every allocation row referencing it. The report carries the cascade
  /// counts for audit.
  fn delete_outcome(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<CascadeReport, Self::Error>> + Send + '_;

  // ── Mapping edges ─────────────────────────────────────────────────────

  /// Idempotent edge toggle. Fails with `TierMismatch` unless the child's
  /// tier is immediately below the parent's, and with `OutcomeNotFound` if
  /// either id is unknown. Returns whether the edge set changed.
  fn set_mapping(
    &self,
    child_id: Uuid,
    parent_id: Uuid,
    present: bool,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;

  /// Child outcomes mapped under `parent_id`, ordered by code.
  fn list_children(
    &self,
    parent_id: Uuid,
  ) -> impl Future<Output = Result<Vec<Outcome>, Self::Error>> + Send + '_;

  /// Parent outcomes `child_id` maps into, ordered by code.
  fn list_parents(
    &self,
    child_id: Uuid,
  ) -> impl Future<Output = Result<Vec<Outcome>, Self::Error>> + Send + '_;

  /// Child outcomes with their rollup weights — what the aggregator
  /// consumes. Ordered by code.
  fn list_child_edges(
    &self,
    parent_id: Uuid,
  ) -> impl Future<Output = Result<Vec<(Outcome, Decimal)>, Self::Error>>
  + Send
  + '_;

  // ── Assessment items ──────────────────────────────────────────────────

  /// Create an assessment item. Fails with `NonPositiveTotal` if
  /// `total_marks` is not strictly positive.
  fn create_item(
    &self,
    input: NewAssessmentItem,
  ) -> impl Future<Output = Result<AssessmentItem, Self::Error>> + Send + '_;

  fn get_item(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<AssessmentItem>, Self::Error>>
  + Send
  + '_;

  /// Items of a course offering, ordered by name.
  fn list_items(
    &self,
    offering_id: Uuid,
  ) -> impl Future<Output = Result<Vec<AssessmentItem>, Self::Error>>
  + Send
  + '_;

  // ── Allocation ledger ─────────────────────────────────────────────────

  /// Replace the full allocation set for an item atomically.
  ///
  /// Validates in one pass before committing: every target is an existing
  /// CLO, no CLO appears twice, each row's marks are within
  /// `[0, total_marks]`, and the proposed sum does not exceed
  /// `total_marks`. On violation nothing is written. Returns the stored
  /// rows ordered by CLO code.
  fn set_allocations(
    &self,
    item_id: Uuid,
    rows: Vec<AllocationDraft>,
  ) -> impl Future<Output = Result<Vec<AllocationRow>, Self::Error>>
  + Send
  + '_;

  /// The item's allocation rows, ordered by CLO code.
  fn get_allocations(
    &self,
    item_id: Uuid,
  ) -> impl Future<Output = Result<Vec<AllocationRow>, Self::Error>>
  + Send
  + '_;

  /// Every item allocating marks to `clo_id`, with the allocated marks.
  /// Ordered by item name, then id.
  fn allocations_for_clo(
    &self,
    clo_id: Uuid,
  ) -> impl Future<Output = Result<Vec<CloAllocation>, Self::Error>>
  + Send
  + '_;

  // ── Threshold overrides ───────────────────────────────────────────────

  /// Set or clear (with `None`) the per-outcome threshold override.
  fn set_threshold(
    &self,
    outcome_id: Uuid,
    config: Option<ThresholdConfig>,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  /// The outcome's threshold override, if one is set.
  fn threshold_for(
    &self,
    outcome_id: Uuid,
  ) -> impl Future<Output = Result<Option<ThresholdConfig>, Self::Error>>
  + Send
  + '_;

  // ── Result cache ──────────────────────────────────────────────────────

  /// The current revision counter. Read at the start of a recompute and
  /// compared inside [`publish_results`](Self::publish_results).
  fn revision(
    &self,
  ) -> impl Future<Output = Result<i64, Self::Error>> + Send + '_;

  /// Commit a staged batch of results in one transaction, provided the
  /// revision still equals `expected_revision`. History is retained; rows
  /// are keyed by (subject, outcome, computed_at).
  fn publish_results(
    &self,
    scope: Scope,
    expected_revision: i64,
    results: Vec<AttainmentResult>,
  ) -> impl Future<Output = Result<PublishOutcome, Self::Error>> + Send + '_;

  /// The most recently computed cached result for a subject/outcome pair.
  fn latest_result(
    &self,
    subject: AttainmentSubject,
    outcome_id: Uuid,
  ) -> impl Future<Output = Result<Option<AttainmentResult>, Self::Error>>
  + Send
  + '_;

  /// All cached cohort results for a scope's outcomes of one tier, ordered
  /// by computation time then code. Feeds the trend builder.
  fn cohort_history(
    &self,
    scope_id: Uuid,
    tier: Tier,
  ) -> impl Future<Output = Result<Vec<AttainmentResult>, Self::Error>>
  + Send
  + '_;

  /// Write an administrative override: the audit record and the imposed
  /// result land in one transaction.
  fn record_override(
    &self,
    record: OverrideRecord,
    result: AttainmentResult,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;
}

// ─── Score adapter ───────────────────────────────────────────────────────────

/// The consumed side of the score ingestion adapter.
///
/// One bulk read per aggregation scope: the aggregator always fetches every
/// relevant score in a single call, never per-student round trips.
pub trait ScoreSource: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  /// Scores for the given items, optionally restricted to specific
  /// students. Empty `item_ids` yields an empty result.
  fn fetch_scores(
    &self,
    item_ids: Vec<Uuid>,
    student_ids: Option<Vec<Uuid>>,
  ) -> impl Future<Output = Result<Vec<ScoreRecord>, Self::Error>> + Send + '_;
}

/// The producing side, for backends that also hold the scores. Records are
/// upserted per (student, item); obtained marks outside `[0, total_marks]`
/// reject the whole batch.
pub trait ScoreSink: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  fn record_scores(
    &self,
    records: Vec<ScoreRecord>,
  ) -> impl Future<Output = Result<usize, Self::Error>> + Send + '_;
}
