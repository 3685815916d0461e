//! Assessment items, their per-CLO mark allocations, and obtained scores.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A gradable unit — an assessment component or an individual question —
/// belonging to exactly one course offering.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssessmentItem {
  pub item_id:     Uuid,
  pub offering_id: Uuid,
  pub name:        String,
  /// Fixed positive total the item is marked out of.
  pub total_marks: Decimal,
  pub created_at:  DateTime<Utc>,
}

/// Input to [`crate::store::OutcomeStore::create_item`].
#[derive(Debug, Clone)]
pub struct NewAssessmentItem {
  pub offering_id: Uuid,
  pub name:        String,
  pub total_marks: Decimal,
}

/// Marks an assessment item allocates to one CLO.
///
/// For a fixed item, the sum of `marks` across its rows never exceeds the
/// item's `total_marks`; rows are only ever written through the atomic
/// replace-set operation that checks this.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AllocationRow {
  pub item_id: Uuid,
  pub clo_id:  Uuid,
  pub marks:   Decimal,
}

/// One proposed (CLO, marks) pair in a replace-set call.
#[derive(Debug, Clone, Copy)]
pub struct AllocationDraft {
  pub clo_id: Uuid,
  pub marks:  Decimal,
}

/// An item that allocates marks to a given CLO, with the allocated marks.
/// The aggregator's weighting basis.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CloAllocation {
  pub item:  AssessmentItem,
  pub marks: Decimal,
}

/// A student's obtained marks on one assessment item. Supplied by the score
/// ingestion adapter; `0 ≤ obtained ≤ total_marks` holds on ingest.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ScoreRecord {
  pub student_id: Uuid,
  pub item_id:    Uuid,
  pub obtained:   Decimal,
}
