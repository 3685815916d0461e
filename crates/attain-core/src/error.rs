//! Error types for `attain-core`.

use rust_decimal::Decimal;
use thiserror::Error;
use uuid::Uuid;

use crate::outcome::Tier;

#[derive(Debug, Clone, Error)]
pub enum Error {
  #[error("outcome not found: {0}")]
  OutcomeNotFound(Uuid),

  #[error("assessment item not found: {0}")]
  ItemNotFound(Uuid),

  #[error("code {code:?} already exists for tier {tier:?} in scope {scope_id}")]
  DuplicateCode {
    scope_id: Uuid,
    tier:     Tier,
    code:     String,
  },

  #[error("cannot map a {child:?} outcome under a {parent:?} outcome")]
  TierMismatch { child: Tier, parent: Tier },

  #[error("outcome {0} is not a CLO and cannot receive mark allocations")]
  AllocationTargetNotClo(Uuid),

  #[error("CLO {0} appears more than once in the proposed allocation set")]
  DuplicateAllocation(Uuid),

  #[error(
    "allocations for item {item_id} total {allocated}, exceeding its \
     {total} marks"
  )]
  OverAllocated {
    item_id:   Uuid,
    allocated: Decimal,
    total:     Decimal,
  },

  #[error("allocation of {marks} to CLO {clo_id} is outside [0, {total}]")]
  MarksOutOfRange {
    clo_id: Uuid,
    marks:  Decimal,
    total:  Decimal,
  },

  #[error("obtained {obtained} is outside [0, {total}] for item {item_id}")]
  ScoreOutOfRange {
    item_id:  Uuid,
    obtained: Decimal,
    total:    Decimal,
  },

  #[error("total marks must be positive, got {0}")]
  NonPositiveTotal(Decimal),

  #[error("scope changed while a recompute was in flight; retry the recompute")]
  StaleScope,
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
