//! Handlers for `/recompute` endpoints — batch jobs with staged publish.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `POST` | `/recompute` | Inline for small scopes, spawned job otherwise |
//! | `GET`  | `/recompute/:id` | Latest observed job status |
//! | `POST` | `/recompute/:id/cancel` | Requests cancellation |
//!
//! A `stale` terminal status means the scope's structure changed while the
//! job was computing; nothing was published and the caller retries the whole
//! recompute.

use attain_core::attainment::{RollupStrategy, Scope};
use attain_engine::recompute::JobStatus;
use axum::{
  Json,
  extract::{Path, State},
  http::StatusCode,
  response::IntoResponse,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{ApiState, ApiStore, error::ApiError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
  /// Compute and publish before responding. For small scopes (one course
  /// offering).
  Inline,
  /// Spawn a cancellable background job and respond with its id.
  #[default]
  Spawn,
}

#[derive(Debug, Deserialize)]
pub struct StartBody {
  pub scope:    Scope,
  #[serde(default)]
  pub strategy: RollupStrategy,
  #[serde(default)]
  pub mode:     Mode,
}

#[derive(Debug, Serialize)]
pub struct StartResponse {
  #[serde(skip_serializing_if = "Option::is_none")]
  pub job_id: Option<Uuid>,
  pub status: JobStatus,
}

/// `POST /recompute` — body:
/// `{"scope": {"kind": "offering", "id": ...}, "mode": "inline"}`
pub async fn start<S: ApiStore>(
  State(state): State<ApiState<S>>,
  Json(body): Json<StartBody>,
) -> Result<impl IntoResponse, ApiError> {
  match body.mode {
    Mode::Inline => {
      let status = state
        .aggregator
        .recompute(body.scope, body.strategy)
        .await
        .map_err(ApiError::from_store)?;
      Ok((StatusCode::OK, Json(StartResponse {
        job_id: None,
        status,
      })))
    }
    Mode::Spawn => {
      let handle = state.aggregator.spawn_recompute(body.scope, body.strategy);
      let job_id = handle.job_id();
      let status = handle.status();
      state.jobs.lock().await.insert(job_id, handle);
      Ok((StatusCode::ACCEPTED, Json(StartResponse {
        job_id: Some(job_id),
        status,
      })))
    }
  }
}

/// `GET /recompute/:id`
pub async fn status<S: ApiStore>(
  State(state): State<ApiState<S>>,
  Path(id): Path<Uuid>,
) -> Result<Json<JobStatus>, ApiError> {
  let jobs = state.jobs.lock().await;
  let handle = jobs
    .get(&id)
    .ok_or_else(|| ApiError::NotFound(format!("recompute job {id} not found")))?;
  Ok(Json(handle.status()))
}

/// `POST /recompute/:id/cancel` — returns the status observed after the
/// request; the job reaches `cancelled` once it next checks the token.
pub async fn cancel<S: ApiStore>(
  State(state): State<ApiState<S>>,
  Path(id): Path<Uuid>,
) -> Result<Json<JobStatus>, ApiError> {
  let jobs = state.jobs.lock().await;
  let handle = jobs
    .get(&id)
    .ok_or_else(|| ApiError::NotFound(format!("recompute job {id} not found")))?;
  handle.cancel();
  Ok(Json(handle.status()))
}
