//! Encoding and decoding helpers between Rust domain types and the
//! plain-text representations stored in SQLite columns.
//!
//! All timestamps are stored as RFC 3339 strings, decimals as their
//! canonical display form, and UUIDs as hyphenated lowercase strings.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use uuid::Uuid;

use attain_core::{
  assessment::{AllocationRow, AssessmentItem, CloAllocation, ScoreRecord},
  attainment::{
    Attainment, AttainmentLevel, AttainmentResult, AttainmentSubject,
    OverrideRecord, SupportingCounts, ThresholdConfig,
  },
  outcome::{Outcome, Tier},
};

use crate::{Error, Result};

// ─── Uuid ────────────────────────────────────────────────────────────────────

pub fn encode_uuid(id: Uuid) -> String {
  id.hyphenated().to_string()
}

pub fn decode_uuid(s: &str) -> Result<Uuid> {
  Ok(Uuid::parse_str(s)?)
}

// ─── DateTime<Utc> ───────────────────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String {
  dt.to_rfc3339()
}

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

// ─── Decimal ─────────────────────────────────────────────────────────────────

pub fn encode_decimal(d: Decimal) -> String {
  d.to_string()
}

pub fn decode_decimal(s: &str) -> Result<Decimal> {
  s.parse().map_err(|e: rust_decimal::Error| {
    Error::DecimalParse(format!("{e}: {s:?}"))
  })
}

// ─── Tier ────────────────────────────────────────────────────────────────────

pub fn encode_tier(t: Tier) -> &'static str {
  match t {
    Tier::Clo => "clo",
    Tier::Plo => "plo",
    Tier::Peo => "peo",
  }
}

pub fn decode_tier(s: &str) -> Result<Tier> {
  match s {
    "clo" => Ok(Tier::Clo),
    "plo" => Ok(Tier::Plo),
    "peo" => Ok(Tier::Peo),
    other => Err(Error::Decode(format!("unknown tier: {other:?}"))),
  }
}

// ─── AttainmentLevel ─────────────────────────────────────────────────────────

pub fn encode_level(l: AttainmentLevel) -> &'static str {
  match l {
    AttainmentLevel::Excellent => "excellent",
    AttainmentLevel::High => "high",
    AttainmentLevel::Medium => "medium",
    AttainmentLevel::Low => "low",
    AttainmentLevel::VeryLow => "very_low",
    AttainmentLevel::Unknown => "unknown",
  }
}

pub fn decode_level(s: &str) -> Result<AttainmentLevel> {
  match s {
    "excellent" => Ok(AttainmentLevel::Excellent),
    "high" => Ok(AttainmentLevel::High),
    "medium" => Ok(AttainmentLevel::Medium),
    "low" => Ok(AttainmentLevel::Low),
    "very_low" => Ok(AttainmentLevel::VeryLow),
    "unknown" => Ok(AttainmentLevel::Unknown),
    other => Err(Error::Decode(format!("unknown level: {other:?}"))),
  }
}

// ─── AttainmentSubject ───────────────────────────────────────────────────────

pub fn encode_subject(s: AttainmentSubject) -> (&'static str, String) {
  match s {
    AttainmentSubject::Student(id) => ("student", encode_uuid(id)),
    AttainmentSubject::Cohort(id) => ("cohort", encode_uuid(id)),
  }
}

pub fn decode_subject(kind: &str, id: &str) -> Result<AttainmentSubject> {
  let id = decode_uuid(id)?;
  match kind {
    "student" => Ok(AttainmentSubject::Student(id)),
    "cohort" => Ok(AttainmentSubject::Cohort(id)),
    other => Err(Error::Decode(format!("unknown subject kind: {other:?}"))),
  }
}

// ─── Attainment ──────────────────────────────────────────────────────────────

/// `Undefined` is stored as NULL; a measured value as its decimal string.
/// The distinction survives storage — NULL never reads back as 0.
pub fn encode_attainment(a: Attainment) -> Option<String> {
  a.as_measured().map(encode_decimal)
}

pub fn decode_attainment(s: Option<&str>) -> Result<Attainment> {
  match s {
    Some(v) => Ok(Attainment::Measured(decode_decimal(v)?)),
    None => Ok(Attainment::Undefined),
  }
}

// ─── Row types ───────────────────────────────────────────────────────────────

/// Raw strings read directly from an `outcomes` row.
pub struct RawOutcome {
  pub outcome_id:  String,
  pub tier:        String,
  pub scope_id:    String,
  pub code:        String,
  pub description: String,
  pub created_at:  String,
}

impl RawOutcome {
  pub fn into_outcome(self) -> Result<Outcome> {
    Ok(Outcome {
      outcome_id:  decode_uuid(&self.outcome_id)?,
      tier:        decode_tier(&self.tier)?,
      scope_id:    decode_uuid(&self.scope_id)?,
      code:        self.code,
      description: self.description,
      created_at:  decode_dt(&self.created_at)?,
    })
  }
}

/// Raw strings read directly from an `assessment_items` row.
pub struct RawItem {
  pub item_id:     String,
  pub offering_id: String,
  pub name:        String,
  pub total_marks: String,
  pub created_at:  String,
}

impl RawItem {
  pub fn into_item(self) -> Result<AssessmentItem> {
    Ok(AssessmentItem {
      item_id:     decode_uuid(&self.item_id)?,
      offering_id: decode_uuid(&self.offering_id)?,
      name:        self.name,
      total_marks: decode_decimal(&self.total_marks)?,
      created_at:  decode_dt(&self.created_at)?,
    })
  }
}

/// Raw strings read directly from an `allocations` row.
pub struct RawAllocation {
  pub item_id: String,
  pub clo_id:  String,
  pub marks:   String,
}

impl RawAllocation {
  pub fn into_row(self) -> Result<AllocationRow> {
    Ok(AllocationRow {
      item_id: decode_uuid(&self.item_id)?,
      clo_id:  decode_uuid(&self.clo_id)?,
      marks:   decode_decimal(&self.marks)?,
    })
  }
}

/// An `assessment_items` row joined with the marks it allocates to a CLO.
pub struct RawCloAllocation {
  pub item:  RawItem,
  pub marks: String,
}

impl RawCloAllocation {
  pub fn into_allocation(self) -> Result<CloAllocation> {
    Ok(CloAllocation {
      item:  self.item.into_item()?,
      marks: decode_decimal(&self.marks)?,
    })
  }
}

/// Raw strings read directly from a `score_records` row.
pub struct RawScore {
  pub student_id: String,
  pub item_id:    String,
  pub obtained:   String,
}

impl RawScore {
  pub fn into_score(self) -> Result<ScoreRecord> {
    Ok(ScoreRecord {
      student_id: decode_uuid(&self.student_id)?,
      item_id:    decode_uuid(&self.item_id)?,
      obtained:   decode_decimal(&self.obtained)?,
    })
  }
}

/// Raw strings read directly from a `threshold_overrides` row.
pub struct RawThreshold {
  pub excellent: String,
  pub high:      String,
  pub medium:    String,
  pub low:       String,
}

impl RawThreshold {
  pub fn into_config(self) -> Result<ThresholdConfig> {
    Ok(ThresholdConfig {
      excellent: decode_decimal(&self.excellent)?,
      high:      decode_decimal(&self.high)?,
      medium:    decode_decimal(&self.medium)?,
      low:       decode_decimal(&self.low)?,
    })
  }
}

/// Raw strings read directly from an `attainment_results` row.
pub struct RawResult {
  pub subject_kind:      String,
  pub subject_id:        String,
  pub outcome_id:        String,
  pub attainment:        Option<String>,
  pub level:             String,
  pub items_counted:     i64,
  pub students_counted:  i64,
  pub children_measured: i64,
  pub children_total:    i64,
  pub computed_at:       String,
}

/// Raw strings read directly from an `attainment_overrides` row.
pub struct RawOverride {
  pub override_id:  String,
  pub subject_kind: String,
  pub subject_id:   String,
  pub outcome_id:   String,
  pub previous:     Option<String>,
  pub value:        String,
  pub reason:       String,
  pub recorded_at:  String,
}

impl RawOverride {
  pub fn into_record(self) -> Result<OverrideRecord> {
    Ok(OverrideRecord {
      override_id: decode_uuid(&self.override_id)?,
      subject:     decode_subject(&self.subject_kind, &self.subject_id)?,
      outcome_id:  decode_uuid(&self.outcome_id)?,
      previous:    decode_attainment(self.previous.as_deref())?,
      value:       decode_decimal(&self.value)?,
      reason:      self.reason,
      recorded_at: decode_dt(&self.recorded_at)?,
    })
  }
}

impl RawResult {
  pub fn into_result(self) -> Result<AttainmentResult> {
    Ok(AttainmentResult {
      subject:     decode_subject(&self.subject_kind, &self.subject_id)?,
      outcome_id:  decode_uuid(&self.outcome_id)?,
      attainment:  decode_attainment(self.attainment.as_deref())?,
      level:       decode_level(&self.level)?,
      supporting:  SupportingCounts {
        items:             self.items_counted as usize,
        students:          self.students_counted as usize,
        children_measured: self.children_measured as usize,
        children_total:    self.children_total as usize,
      },
      computed_at: decode_dt(&self.computed_at)?,
    })
  }
}
