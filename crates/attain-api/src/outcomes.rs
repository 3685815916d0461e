//! Handlers for `/outcomes` endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`    | `/outcomes` | `?scope_id` required; optional `tier` |
//! | `POST`   | `/outcomes` | Body: [`CreateBody`]; returns 201 + stored outcome |
//! | `GET`    | `/outcomes/:id` | 404 if not found |
//! | `DELETE` | `/outcomes/:id` | Cascades; returns the removed-row counts |
//! | `GET`    | `/outcomes/:id/children` | Mapped children, ordered by code |
//! | `GET`    | `/outcomes/:id/parents` | Mapped parents, ordered by code |
//! | `GET`    | `/outcomes/:id/threshold` | Active override, or `null` |
//! | `PUT`    | `/outcomes/:id/threshold` | Body: `{"config": {...}}`; `null` clears |

use attain_core::{
  attainment::ThresholdConfig,
  outcome::{CascadeReport, NewOutcome, Outcome, Tier},
  store::OutcomeStore,
};
use axum::{
  Json,
  extract::{Path, Query, State},
  http::StatusCode,
  response::IntoResponse,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::{ApiState, ApiStore, error::ApiError};

// ─── List ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct ListParams {
  /// Required: the course offering or program whose outcomes to return.
  pub scope_id: Uuid,
  /// If set, restrict to one tier.
  pub tier:     Option<Tier>,
}

/// `GET /outcomes?scope_id=<id>[&tier=clo|plo|peo]`
pub async fn list<S: ApiStore>(
  State(state): State<ApiState<S>>,
  Query(params): Query<ListParams>,
) -> Result<Json<Vec<Outcome>>, ApiError> {
  let outcomes = state
    .aggregator
    .store()
    .list_outcomes(params.scope_id, params.tier)
    .await
    .map_err(ApiError::from_store)?;
  Ok(Json(outcomes))
}

// ─── Create ───────────────────────────────────────────────────────────────────

/// JSON body accepted by `POST /outcomes`.
#[derive(Debug, Deserialize)]
pub struct CreateBody {
  pub tier:        Tier,
  pub scope_id:    Uuid,
  pub code:        String,
  pub description: String,
}

/// `POST /outcomes` — returns 201 + the stored [`Outcome`].
pub async fn create<S: ApiStore>(
  State(state): State<ApiState<S>>,
  Json(body): Json<CreateBody>,
) -> Result<impl IntoResponse, ApiError> {
  let outcome = state
    .aggregator
    .store()
    .create_outcome(NewOutcome {
      tier:        body.tier,
      scope_id:    body.scope_id,
      code:        body.code,
      description: body.description,
    })
    .await
    .map_err(ApiError::from_store)?;
  Ok((StatusCode::CREATED, Json(outcome)))
}

// ─── Get one ──────────────────────────────────────────────────────────────────

/// `GET /outcomes/:id`
pub async fn get_one<S: ApiStore>(
  State(state): State<ApiState<S>>,
  Path(id): Path<Uuid>,
) -> Result<Json<Outcome>, ApiError> {
  let outcome = state
    .aggregator
    .store()
    .get_outcome(id)
    .await
    .map_err(ApiError::from_store)?
    .ok_or_else(|| ApiError::NotFound(format!("outcome {id} not found")))?;
  Ok(Json(outcome))
}

// ─── Delete ───────────────────────────────────────────────────────────────────

/// `DELETE /outcomes/:id` — cascades over mapping edges and allocation rows,
/// returning the [`CascadeReport`] for audit.
pub async fn delete_one<S: ApiStore>(
  State(state): State<ApiState<S>>,
  Path(id): Path<Uuid>,
) -> Result<Json<CascadeReport>, ApiError> {
  let report = state
    .aggregator
    .store()
    .delete_outcome(id)
    .await
    .map_err(ApiError::from_store)?;
  Ok(Json(report))
}

// ─── Traversal ────────────────────────────────────────────────────────────────

/// `GET /outcomes/:id/children`
pub async fn children<S: ApiStore>(
  State(state): State<ApiState<S>>,
  Path(id): Path<Uuid>,
) -> Result<Json<Vec<Outcome>>, ApiError> {
  let outcomes = state
    .aggregator
    .store()
    .list_children(id)
    .await
    .map_err(ApiError::from_store)?;
  Ok(Json(outcomes))
}

/// `GET /outcomes/:id/parents`
pub async fn parents<S: ApiStore>(
  State(state): State<ApiState<S>>,
  Path(id): Path<Uuid>,
) -> Result<Json<Vec<Outcome>>, ApiError> {
  let outcomes = state
    .aggregator
    .store()
    .list_parents(id)
    .await
    .map_err(ApiError::from_store)?;
  Ok(Json(outcomes))
}

// ─── Threshold override ───────────────────────────────────────────────────────

/// `GET /outcomes/:id/threshold` — the active override, or `null` when the
/// outcome uses the defaults.
pub async fn get_threshold<S: ApiStore>(
  State(state): State<ApiState<S>>,
  Path(id): Path<Uuid>,
) -> Result<Json<Option<ThresholdConfig>>, ApiError> {
  let config = state
    .aggregator
    .store()
    .threshold_for(id)
    .await
    .map_err(ApiError::from_store)?;
  Ok(Json(config))
}

#[derive(Debug, Deserialize)]
pub struct SetThresholdBody {
  /// `null` clears the override.
  pub config: Option<ThresholdConfig>,
}

/// `PUT /outcomes/:id/threshold` — body: `{"config": {...} | null}`
pub async fn set_threshold<S: ApiStore>(
  State(state): State<ApiState<S>>,
  Path(id): Path<Uuid>,
  Json(body): Json<SetThresholdBody>,
) -> Result<StatusCode, ApiError> {
  state
    .aggregator
    .store()
    .set_threshold(id, body.config)
    .await
    .map_err(ApiError::from_store)?;
  Ok(StatusCode::NO_CONTENT)
}
