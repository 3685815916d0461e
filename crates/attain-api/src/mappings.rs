//! Handler for `POST /mappings` — the only way edges come and go.

use attain_core::store::OutcomeStore;
use axum::{Json, extract::State};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{ApiState, ApiStore, error::ApiError};

#[derive(Debug, Deserialize)]
pub struct SetBody {
  pub child_id:  Uuid,
  pub parent_id: Uuid,
  pub present:   bool,
}

#[derive(Debug, Serialize)]
pub struct SetResponse {
  /// Whether the edge set actually changed; repeating a toggle is a no-op.
  pub changed: bool,
}

/// `POST /mappings` — body:
/// `{"child_id": ..., "parent_id": ..., "present": true}`
pub async fn set<S: ApiStore>(
  State(state): State<ApiState<S>>,
  Json(body): Json<SetBody>,
) -> Result<Json<SetResponse>, ApiError> {
  let changed = state
    .aggregator
    .store()
    .set_mapping(body.child_id, body.parent_id, body.present)
    .await
    .map_err(ApiError::from_store)?;
  Ok(Json(SetResponse { changed }))
}
