//! Handlers for `/items` endpoints — assessment items and their allocation
//! ledger.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/items` | `?offering_id` required |
//! | `POST` | `/items` | Body: [`CreateBody`]; returns 201 + stored item |
//! | `GET`  | `/items/:id` | 404 if not found |
//! | `GET`  | `/items/:id/allocations` | Rows ordered by CLO code |
//! | `PUT`  | `/items/:id/allocations` | Replaces the full set atomically |

use attain_core::{
  assessment::{AllocationDraft, AllocationRow, AssessmentItem, NewAssessmentItem},
  store::OutcomeStore,
};
use axum::{
  Json,
  extract::{Path, Query, State},
  http::StatusCode,
  response::IntoResponse,
};
use rust_decimal::Decimal;
use serde::Deserialize;
use uuid::Uuid;

use crate::{ApiState, ApiStore, error::ApiError};

// ─── List ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct ListParams {
  pub offering_id: Uuid,
}

/// `GET /items?offering_id=<id>`
pub async fn list<S: ApiStore>(
  State(state): State<ApiState<S>>,
  Query(params): Query<ListParams>,
) -> Result<Json<Vec<AssessmentItem>>, ApiError> {
  let items = state
    .aggregator
    .store()
    .list_items(params.offering_id)
    .await
    .map_err(ApiError::from_store)?;
  Ok(Json(items))
}

// ─── Create ───────────────────────────────────────────────────────────────────

/// JSON body accepted by `POST /items`.
#[derive(Debug, Deserialize)]
pub struct CreateBody {
  pub offering_id: Uuid,
  pub name:        String,
  pub total_marks: Decimal,
}

/// `POST /items` — returns 201 + the stored [`AssessmentItem`].
pub async fn create<S: ApiStore>(
  State(state): State<ApiState<S>>,
  Json(body): Json<CreateBody>,
) -> Result<impl IntoResponse, ApiError> {
  let item = state
    .aggregator
    .store()
    .create_item(NewAssessmentItem {
      offering_id: body.offering_id,
      name:        body.name,
      total_marks: body.total_marks,
    })
    .await
    .map_err(ApiError::from_store)?;
  Ok((StatusCode::CREATED, Json(item)))
}

// ─── Get one ──────────────────────────────────────────────────────────────────

/// `GET /items/:id`
pub async fn get_one<S: ApiStore>(
  State(state): State<ApiState<S>>,
  Path(id): Path<Uuid>,
) -> Result<Json<AssessmentItem>, ApiError> {
  let item = state
    .aggregator
    .store()
    .get_item(id)
    .await
    .map_err(ApiError::from_store)?
    .ok_or_else(|| ApiError::NotFound(format!("item {id} not found")))?;
  Ok(Json(item))
}

// ─── Allocations ──────────────────────────────────────────────────────────────

/// `GET /items/:id/allocations`
pub async fn get_allocations<S: ApiStore>(
  State(state): State<ApiState<S>>,
  Path(id): Path<Uuid>,
) -> Result<Json<Vec<AllocationRow>>, ApiError> {
  let rows = state
    .aggregator
    .store()
    .get_allocations(id)
    .await
    .map_err(ApiError::from_store)?;
  Ok(Json(rows))
}

/// One proposed (CLO, marks) pair in the replacement set.
#[derive(Debug, Deserialize)]
pub struct AllocationBody {
  pub clo_id: Uuid,
  pub marks:  Decimal,
}

/// `PUT /items/:id/allocations` — body: array of [`AllocationBody`].
///
/// Replaces the item's full allocation set; a validation failure (422)
/// leaves the stored set untouched.
pub async fn set_allocations<S: ApiStore>(
  State(state): State<ApiState<S>>,
  Path(id): Path<Uuid>,
  Json(body): Json<Vec<AllocationBody>>,
) -> Result<Json<Vec<AllocationRow>>, ApiError> {
  let drafts = body
    .into_iter()
    .map(|b| AllocationDraft {
      clo_id: b.clo_id,
      marks:  b.marks,
    })
    .collect();
  let rows = state
    .aggregator
    .store()
    .set_allocations(id, drafts)
    .await
    .map_err(ApiError::from_store)?;
  Ok(Json(rows))
}
