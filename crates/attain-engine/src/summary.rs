//! Chart-ready reshaping of attainment result collections.
//!
//! No computation happens here. Every builder orders its rows (outcome
//! code, then subject id) so calling it twice over the same data yields
//! identical output — UI diffing and exported reports stay reproducible.

use std::collections::BTreeMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use attain_core::{
  attainment::{Attainment, AttainmentLevel, AttainmentResult},
  outcome::Outcome,
};

// ─── Shapes ──────────────────────────────────────────────────────────────────

/// One bar/line/pie datum. `value: None` means `Undefined` and renders as
/// "no data" — distinct from a measured 0.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartPoint {
  pub name:  String,
  pub value: Option<Decimal>,
}

/// One trend-chart row: a period label and its per-outcome values, keyed by
/// outcome code.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendRow {
  pub period: String,
  pub series: BTreeMap<String, Option<Decimal>>,
}

/// One row of the student → course → CLO breakdown table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BreakdownRow {
  pub student_id:   Uuid,
  pub offering_id:  Uuid,
  pub outcome_code: String,
  pub attainment:   Attainment,
  pub level:        AttainmentLevel,
}

// ─── Builders ────────────────────────────────────────────────────────────────

fn code_for(outcomes: &BTreeMap<Uuid, Outcome>, outcome_id: Uuid) -> String {
  outcomes
    .get(&outcome_id)
    .map(|o| o.code.clone())
    .unwrap_or_else(|| outcome_id.to_string())
}

/// Flat series for bar/line/pie charts, sorted by outcome code then
/// subject id.
pub fn chart_series(
  outcomes: &BTreeMap<Uuid, Outcome>,
  results: &[AttainmentResult],
) -> Vec<ChartPoint> {
  let mut points: Vec<(String, Uuid, Option<Decimal>)> = results
    .iter()
    .map(|r| {
      (
        code_for(outcomes, r.outcome_id),
        r.subject.id(),
        r.attainment.as_measured(),
      )
    })
    .collect();

  points.sort_by(|a, b| a.0.cmp(&b.0).then_with(|| a.1.cmp(&b.1)));
  points
    .into_iter()
    .map(|(name, _, value)| ChartPoint { name, value })
    .collect()
}

/// Period-by-outcome matrix for trend charts.
///
/// Period order follows the caller's (chronological) input order; columns
/// are keyed by code, so their order is stable. When a period holds several
/// results for the same outcome, the last one wins — callers pass rows in
/// computation order, so that is the newest.
pub fn trend_matrix(
  periods: &[(String, Vec<AttainmentResult>)],
  outcomes: &BTreeMap<Uuid, Outcome>,
) -> Vec<TrendRow> {
  periods
    .iter()
    .map(|(period, results)| {
      let mut series = BTreeMap::new();
      for r in results {
        series
          .insert(code_for(outcomes, r.outcome_id), r.attainment.as_measured());
      }
      TrendRow {
        period: period.clone(),
        series,
      }
    })
    .collect()
}

/// Order the breakdown table: student, then offering, then outcome code.
pub fn student_breakdown(mut rows: Vec<BreakdownRow>) -> Vec<BreakdownRow> {
  rows.sort_by(|a, b| {
    a.student_id
      .cmp(&b.student_id)
      .then_with(|| a.offering_id.cmp(&b.offering_id))
      .then_with(|| a.outcome_code.cmp(&b.outcome_code))
  });
  rows
}
