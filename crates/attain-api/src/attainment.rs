//! Handlers for `/attainment` endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/attainment` | Computed fresh, never served from the cache |
//! | `POST` | `/attainment/override` | Logged manual correction; returns 201 |

use attain_core::attainment::{
  AttainmentResult, AttainmentSubject, OverrideRecord, RollupStrategy,
};
use axum::{
  Json,
  extract::{Query, State},
  http::StatusCode,
  response::IntoResponse,
};
use rust_decimal::Decimal;
use serde::Deserialize;
use uuid::Uuid;

use crate::{ApiState, ApiStore, error::ApiError};

/// Flat query/body form of [`AttainmentSubject`].
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubjectKind {
  Student,
  Cohort,
}

fn subject(kind: SubjectKind, id: Uuid) -> AttainmentSubject {
  match kind {
    SubjectKind::Student => AttainmentSubject::Student(id),
    SubjectKind::Cohort => AttainmentSubject::Cohort(id),
  }
}

// ─── Get ──────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct GetParams {
  pub subject_kind: SubjectKind,
  pub subject_id:   Uuid,
  pub outcome_id:   Uuid,
  /// Cohort rollup strategy; defaults to marks-first.
  #[serde(default)]
  pub strategy:     RollupStrategy,
}

/// `GET /attainment?subject_kind=student&subject_id=...&outcome_id=...`
pub async fn get_one<S: ApiStore>(
  State(state): State<ApiState<S>>,
  Query(params): Query<GetParams>,
) -> Result<Json<AttainmentResult>, ApiError> {
  let result = state
    .aggregator
    .attainment(
      subject(params.subject_kind, params.subject_id),
      params.outcome_id,
      params.strategy,
    )
    .await
    .map_err(ApiError::from_store)?;
  Ok(Json(result))
}

// ─── Override ─────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct OverrideBody {
  pub subject_kind: SubjectKind,
  pub subject_id:   Uuid,
  pub outcome_id:   Uuid,
  /// The imposed percentage.
  pub value:        Decimal,
  pub reason:       String,
}

/// `POST /attainment/override` — returns 201 + the audit record, which
/// carries the value the engine had computed at the time.
pub async fn override_one<S: ApiStore>(
  State(state): State<ApiState<S>>,
  Json(body): Json<OverrideBody>,
) -> Result<impl IntoResponse, ApiError> {
  let record: OverrideRecord = state
    .aggregator
    .override_attainment(
      subject(body.subject_kind, body.subject_id),
      body.outcome_id,
      body.value,
      body.reason,
    )
    .await
    .map_err(ApiError::from_store)?;
  Ok((StatusCode::CREATED, Json(record)))
}
