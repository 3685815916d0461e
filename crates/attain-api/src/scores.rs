//! Handler for `POST /scores` — the shipped side of score ingestion.

use attain_core::{assessment::ScoreRecord, store::ScoreSink};
use axum::{Json, extract::State};
use serde::Serialize;

use crate::{ApiState, ApiStore, error::ApiError};

#[derive(Debug, Serialize)]
pub struct IngestResponse {
  pub recorded: usize,
}

/// `POST /scores` — body: array of score records.
///
/// Upserts per (student, item); one out-of-range mark rejects the whole
/// batch.
pub async fn ingest<S: ApiStore>(
  State(state): State<ApiState<S>>,
  Json(records): Json<Vec<ScoreRecord>>,
) -> Result<Json<IngestResponse>, ApiError> {
  let recorded = state
    .aggregator
    .store()
    .record_scores(records)
    .await
    .map_err(ApiError::from_store)?;
  Ok(Json(IngestResponse { recorded }))
}
