//! Handlers for `/summary` endpoints — the chart-ready shapes.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET` | `/summary` | Flat `{name, value}` series, computed fresh |
//! | `GET` | `/summary/trend` | Period-by-outcome matrix from cached results |
//! | `GET` | `/summary/breakdown` | Student → CLO table for one offering |

use std::collections::BTreeMap;

use attain_core::{
  attainment::{AttainmentResult, AttainmentSubject, RollupStrategy},
  outcome::{Outcome, Tier},
  store::OutcomeStore,
};
use attain_engine::summary::{
  BreakdownRow, ChartPoint, TrendRow, chart_series, trend_matrix,
};
use axum::{
  Json,
  extract::{Query, State},
};
use serde::Deserialize;
use uuid::Uuid;

use crate::{ApiState, ApiStore, error::ApiError};

fn by_id(outcomes: Vec<Outcome>) -> BTreeMap<Uuid, Outcome> {
  outcomes.into_iter().map(|o| (o.outcome_id, o)).collect()
}

// ─── Chart series ─────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct ChartParams {
  pub scope_id: Uuid,
  pub tier:     Tier,
  #[serde(default)]
  pub strategy: RollupStrategy,
}

/// `GET /summary?scope_id=...&tier=plo[&strategy=...]`
///
/// Computes each outcome's cohort attainment fresh and reshapes it for
/// bar/line/pie charts. An `Undefined` attainment surfaces as a `null`
/// value, distinct from a measured 0.
pub async fn chart<S: ApiStore>(
  State(state): State<ApiState<S>>,
  Query(params): Query<ChartParams>,
) -> Result<Json<Vec<ChartPoint>>, ApiError> {
  let outcomes = state
    .aggregator
    .store()
    .list_outcomes(params.scope_id, Some(params.tier))
    .await
    .map_err(ApiError::from_store)?;

  let cohort = AttainmentSubject::Cohort(params.scope_id);
  let mut results = Vec::with_capacity(outcomes.len());
  for outcome in &outcomes {
    let result = state
      .aggregator
      .attainment(cohort, outcome.outcome_id, params.strategy)
      .await
      .map_err(ApiError::from_store)?;
    results.push(result);
  }

  Ok(Json(chart_series(&by_id(outcomes), &results)))
}

// ─── Trend matrix ─────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct TrendParams {
  pub scope_id: Uuid,
  pub tier:     Tier,
}

/// `GET /summary/trend?scope_id=...&tier=plo`
///
/// Serves cached cohort results, grouped into chronological periods by
/// computation date — one matrix row per recompute batch day.
pub async fn trend<S: ApiStore>(
  State(state): State<ApiState<S>>,
  Query(params): Query<TrendParams>,
) -> Result<Json<Vec<TrendRow>>, ApiError> {
  let store = state.aggregator.store();
  let history = store
    .cohort_history(params.scope_id, params.tier)
    .await
    .map_err(ApiError::from_store)?;
  let outcomes = store
    .list_outcomes(params.scope_id, Some(params.tier))
    .await
    .map_err(ApiError::from_store)?;

  // History arrives ordered by computation time; adjacent rows sharing a
  // date form one period.
  let mut periods: Vec<(String, Vec<AttainmentResult>)> = Vec::new();
  for result in history {
    let label = result.computed_at.date_naive().to_string();
    match periods.last_mut() {
      Some((period, rows)) if *period == label => rows.push(result),
      _ => periods.push((label, vec![result])),
    }
  }

  Ok(Json(trend_matrix(&periods, &by_id(outcomes))))
}

// ─── Student breakdown ────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct BreakdownParams {
  pub offering_id: Uuid,
}

/// `GET /summary/breakdown?offering_id=...`
pub async fn breakdown<S: ApiStore>(
  State(state): State<ApiState<S>>,
  Query(params): Query<BreakdownParams>,
) -> Result<Json<Vec<BreakdownRow>>, ApiError> {
  let rows = state
    .aggregator
    .offering_breakdown(params.offering_id)
    .await
    .map_err(ApiError::from_store)?;
  Ok(Json(rows))
}
