//! [`SqliteStore`] — the SQLite implementation of the store traits.

use std::{collections::BTreeSet, path::Path};

use chrono::Utc;
use rusqlite::OptionalExtension as _;
use rust_decimal::Decimal;
use uuid::Uuid;

use attain_core::{
  assessment::{
    AllocationDraft, AllocationRow, AssessmentItem, CloAllocation,
    NewAssessmentItem, ScoreRecord,
  },
  attainment::{
    AttainmentResult, AttainmentSubject, OverrideRecord, Scope,
    ThresholdConfig,
  },
  outcome::{CascadeReport, NewOutcome, Outcome, Tier},
  store::{OutcomeStore, PublishOutcome, ScoreSink, ScoreSource},
};

use crate::{
  Error, Result,
  encode::{
    RawAllocation, RawCloAllocation, RawItem, RawOutcome, RawOverride,
    RawResult, RawScore, RawThreshold, decode_decimal, decode_tier,
    encode_attainment, encode_decimal, encode_dt, encode_level,
    encode_subject, encode_tier, encode_uuid,
  },
  schema::SCHEMA,
};

// ─── Store ───────────────────────────────────────────────────────────────────

/// An Attain store backed by a single SQLite file.
///
/// Cloning is cheap — the inner connection is reference-counted. All access
/// is serialised on the connection's thread, which is what makes every
/// replace-set write an atomic validate-then-commit unit.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store — useful for testing.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  /// Run `f` inside a transaction on the connection thread. A validation
  /// failure returns before commit, so the transaction rolls back and the
  /// store is left exactly as it was.
  async fn with_tx<T, F>(&self, f: F) -> Result<T>
  where
    F: FnOnce(&rusqlite::Transaction) -> Result<T> + Send + 'static,
    T: Send + 'static,
  {
    let out: Result<T> = self
      .conn
      .call(move |conn| {
        let tx = match conn.transaction() {
          Ok(tx) => tx,
          Err(e) => return Ok(Err(Error::Sqlite(e))),
        };
        match f(&tx) {
          Ok(value) => match tx.commit() {
            Ok(()) => Ok(Ok(value)),
            Err(e) => Ok(Err(Error::Sqlite(e))),
          },
          // Dropping the transaction rolls it back.
          Err(e) => Ok(Err(e)),
        }
      })
      .await?;
    out
  }

  /// Audit log entries for an outcome, oldest first.
  pub async fn overrides_for(
    &self,
    outcome_id: Uuid,
  ) -> Result<Vec<OverrideRecord>> {
    let outcome_str = encode_uuid(outcome_id);

    let raws: Vec<RawOverride> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT override_id, subject_kind, subject_id, outcome_id,
                  previous, value, reason, recorded_at
           FROM attainment_overrides
           WHERE outcome_id = ?1
           ORDER BY recorded_at",
        )?;
        let rows = stmt
          .query_map(rusqlite::params![outcome_str], |row| {
            Ok(RawOverride {
              override_id:  row.get(0)?,
              subject_kind: row.get(1)?,
              subject_id:   row.get(2)?,
              outcome_id:   row.get(3)?,
              previous:     row.get(4)?,
              value:        row.get(5)?,
              reason:       row.get(6)?,
              recorded_at:  row.get(7)?,
            })
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawOverride::into_record).collect()
  }
}

// ─── Transaction helpers ─────────────────────────────────────────────────────

/// Advance the structural revision counter. Called by every mutation that
/// can invalidate an in-flight recompute.
fn bump_revision(tx: &rusqlite::Transaction) -> Result<()> {
  tx.execute("UPDATE meta SET value = value + 1 WHERE key = 'revision'", [])?;
  Ok(())
}

/// The tier of an outcome, or `None` if the id is unknown.
fn outcome_tier(
  tx: &rusqlite::Transaction,
  id: Uuid,
) -> Result<Option<Tier>> {
  let tier: Option<String> = tx
    .query_row(
      "SELECT tier FROM outcomes WHERE outcome_id = ?1",
      rusqlite::params![encode_uuid(id)],
      |r| r.get(0),
    )
    .optional()?;
  tier.as_deref().map(decode_tier).transpose()
}

/// The total marks of an item, or an `ItemNotFound` error.
fn item_total(tx: &rusqlite::Transaction, item_id: Uuid) -> Result<Decimal> {
  let total: Option<String> = tx
    .query_row(
      "SELECT total_marks FROM assessment_items WHERE item_id = ?1",
      rusqlite::params![encode_uuid(item_id)],
      |r| r.get(0),
    )
    .optional()?;
  match total {
    Some(s) => decode_decimal(&s),
    None => Err(attain_core::Error::ItemNotFound(item_id).into()),
  }
}

fn insert_result(
  tx: &rusqlite::Transaction,
  result: &AttainmentResult,
) -> Result<()> {
  let (kind, subject_id) = encode_subject(result.subject);
  tx.execute(
    "INSERT OR REPLACE INTO attainment_results (
       subject_kind, subject_id, outcome_id, attainment, level,
       items_counted, students_counted, children_measured, children_total,
       computed_at
     ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
    rusqlite::params![
      kind,
      subject_id,
      encode_uuid(result.outcome_id),
      encode_attainment(result.attainment),
      encode_level(result.level),
      result.supporting.items as i64,
      result.supporting.students as i64,
      result.supporting.children_measured as i64,
      result.supporting.children_total as i64,
      encode_dt(result.computed_at),
    ],
  )?;
  Ok(())
}

fn raw_outcome(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawOutcome> {
  Ok(RawOutcome {
    outcome_id:  row.get(0)?,
    tier:        row.get(1)?,
    scope_id:    row.get(2)?,
    code:        row.get(3)?,
    description: row.get(4)?,
    created_at:  row.get(5)?,
  })
}

fn raw_item(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawItem> {
  Ok(RawItem {
    item_id:     row.get(0)?,
    offering_id: row.get(1)?,
    name:        row.get(2)?,
    total_marks: row.get(3)?,
    created_at:  row.get(4)?,
  })
}

fn raw_result(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawResult> {
  Ok(RawResult {
    subject_kind:      row.get(0)?,
    subject_id:        row.get(1)?,
    outcome_id:        row.get(2)?,
    attainment:        row.get(3)?,
    level:             row.get(4)?,
    items_counted:     row.get(5)?,
    students_counted:  row.get(6)?,
    children_measured: row.get(7)?,
    children_total:    row.get(8)?,
    computed_at:       row.get(9)?,
  })
}

/// `?N, ?N+1, ...` placeholder list for dynamically-sized IN clauses.
fn placeholders(count: usize, start: usize) -> String {
  (start..start + count)
    .map(|i| format!("?{i}"))
    .collect::<Vec<_>>()
    .join(", ")
}

const OUTCOME_COLUMNS: &str =
  "outcome_id, tier, scope_id, code, description, created_at";
const RESULT_COLUMNS: &str =
  "subject_kind, subject_id, outcome_id, attainment, level, items_counted, \
   students_counted, children_measured, children_total, computed_at";

// ─── OutcomeStore impl ───────────────────────────────────────────────────────

impl OutcomeStore for SqliteStore {
  type Error = Error;

  // ── Outcomes ──────────────────────────────────────────────────────────────

  async fn create_outcome(&self, input: NewOutcome) -> Result<Outcome> {
    let outcome = Outcome {
      outcome_id:  Uuid::new_v4(),
      tier:        input.tier,
      scope_id:    input.scope_id,
      code:        input.code,
      description: input.description,
      created_at:  Utc::now(),
    };

    let row = outcome.clone();
    self
      .with_tx(move |tx| {
        let exists: bool = tx
          .query_row(
            "SELECT 1 FROM outcomes
             WHERE scope_id = ?1 AND tier = ?2 AND code = ?3",
            rusqlite::params![
              encode_uuid(row.scope_id),
              encode_tier(row.tier),
              row.code
            ],
            |_| Ok(true),
          )
          .optional()?
          .unwrap_or(false);

        if exists {
          return Err(
            attain_core::Error::DuplicateCode {
              scope_id: row.scope_id,
              tier:     row.tier,
              code:     row.code.clone(),
            }
            .into(),
          );
        }

        tx.execute(
          "INSERT INTO outcomes
             (outcome_id, tier, scope_id, code, description, created_at)
           VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
          rusqlite::params![
            encode_uuid(row.outcome_id),
            encode_tier(row.tier),
            encode_uuid(row.scope_id),
            row.code,
            row.description,
            encode_dt(row.created_at),
          ],
        )?;
        bump_revision(tx)
      })
      .await?;

    Ok(outcome)
  }

  async fn get_outcome(&self, id: Uuid) -> Result<Option<Outcome>> {
    let id_str = encode_uuid(id);

    let raw: Option<RawOutcome> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              &format!(
                "SELECT {OUTCOME_COLUMNS} FROM outcomes WHERE outcome_id = ?1"
              ),
              rusqlite::params![id_str],
              raw_outcome,
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawOutcome::into_outcome).transpose()
  }

  async fn list_outcomes(
    &self,
    scope_id: Uuid,
    tier: Option<Tier>,
  ) -> Result<Vec<Outcome>> {
    let scope_str = encode_uuid(scope_id);
    let tier_str = tier.map(encode_tier).map(str::to_owned);

    let raws: Vec<RawOutcome> = self
      .conn
      .call(move |conn| {
        let rows = if let Some(t) = tier_str {
          let mut stmt = conn.prepare(&format!(
            "SELECT {OUTCOME_COLUMNS} FROM outcomes
             WHERE scope_id = ?1 AND tier = ?2 ORDER BY code"
          ))?;
          stmt
            .query_map(rusqlite::params![scope_str, t], raw_outcome)?
            .collect::<rusqlite::Result<Vec<_>>>()?
        } else {
          let mut stmt = conn.prepare(&format!(
            "SELECT {OUTCOME_COLUMNS} FROM outcomes
             WHERE scope_id = ?1 ORDER BY code"
          ))?;
          stmt
            .query_map(rusqlite::params![scope_str], raw_outcome)?
            .collect::<rusqlite::Result<Vec<_>>>()?
        };
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawOutcome::into_outcome).collect()
  }

  async fn delete_outcome(&self, id: Uuid) -> Result<CascadeReport> {
    self
      .with_tx(move |tx| {
        if outcome_tier(tx, id)?.is_none() {
          return Err(attain_core::Error::OutcomeNotFound(id).into());
        }
        let id_str = encode_uuid(id);

        let edges_removed = tx.execute(
          "DELETE FROM mapping_edges WHERE child_id = ?1 OR parent_id = ?1",
          rusqlite::params![id_str],
        )?;
        let allocations_removed = tx.execute(
          "DELETE FROM allocations WHERE clo_id = ?1",
          rusqlite::params![id_str],
        )?;
        tx.execute(
          "DELETE FROM threshold_overrides WHERE outcome_id = ?1",
          rusqlite::params![id_str],
        )?;
        tx.execute(
          "DELETE FROM outcomes WHERE outcome_id = ?1",
          rusqlite::params![id_str],
        )?;
        bump_revision(tx)?;

        Ok(CascadeReport {
          edges_removed,
          allocations_removed,
        })
      })
      .await
  }

  // ── Mapping edges ─────────────────────────────────────────────────────────

  async fn set_mapping(
    &self,
    child_id: Uuid,
    parent_id: Uuid,
    present: bool,
  ) -> Result<bool> {
    self
      .with_tx(move |tx| {
        let child_tier = outcome_tier(tx, child_id)?
          .ok_or(attain_core::Error::OutcomeNotFound(child_id))?;
        let parent_tier = outcome_tier(tx, parent_id)?
          .ok_or(attain_core::Error::OutcomeNotFound(parent_id))?;

        if child_tier.parent() != Some(parent_tier) {
          return Err(
            attain_core::Error::TierMismatch {
              child:  child_tier,
              parent: parent_tier,
            }
            .into(),
          );
        }

        let changed = if present {
          tx.execute(
            "INSERT OR IGNORE INTO mapping_edges
               (child_id, parent_id, weight, created_at)
             VALUES (?1, ?2, ?3, ?4)",
            rusqlite::params![
              encode_uuid(child_id),
              encode_uuid(parent_id),
              encode_decimal(Decimal::ONE),
              encode_dt(Utc::now()),
            ],
          )?
        } else {
          tx.execute(
            "DELETE FROM mapping_edges
             WHERE child_id = ?1 AND parent_id = ?2",
            rusqlite::params![encode_uuid(child_id), encode_uuid(parent_id)],
          )?
        } > 0;

        if changed {
          bump_revision(tx)?;
        }
        Ok(changed)
      })
      .await
  }

  async fn list_children(&self, parent_id: Uuid) -> Result<Vec<Outcome>> {
    let parent_str = encode_uuid(parent_id);

    let raws: Vec<RawOutcome> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT o.outcome_id, o.tier, o.scope_id, o.code, o.description,
                  o.created_at
           FROM mapping_edges e
           JOIN outcomes o ON o.outcome_id = e.child_id
           WHERE e.parent_id = ?1
           ORDER BY o.code",
        )?;
        let rows = stmt
          .query_map(rusqlite::params![parent_str], raw_outcome)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawOutcome::into_outcome).collect()
  }

  async fn list_parents(&self, child_id: Uuid) -> Result<Vec<Outcome>> {
    let child_str = encode_uuid(child_id);

    let raws: Vec<RawOutcome> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT o.outcome_id, o.tier, o.scope_id, o.code, o.description,
                  o.created_at
           FROM mapping_edges e
           JOIN outcomes o ON o.outcome_id = e.parent_id
           WHERE e.child_id = ?1
           ORDER BY o.code",
        )?;
        let rows = stmt
          .query_map(rusqlite::params![child_str], raw_outcome)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawOutcome::into_outcome).collect()
  }

  async fn list_child_edges(
    &self,
    parent_id: Uuid,
  ) -> Result<Vec<(Outcome, Decimal)>> {
    let parent_str = encode_uuid(parent_id);

    let raws: Vec<(RawOutcome, String)> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT o.outcome_id, o.tier, o.scope_id, o.code, o.description,
                  o.created_at, e.weight
           FROM mapping_edges e
           JOIN outcomes o ON o.outcome_id = e.child_id
           WHERE e.parent_id = ?1
           ORDER BY o.code",
        )?;
        let rows = stmt
          .query_map(rusqlite::params![parent_str], |row| {
            Ok((raw_outcome(row)?, row.get::<_, String>(6)?))
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws
      .into_iter()
      .map(|(raw, weight)| {
        Ok((raw.into_outcome()?, decode_decimal(&weight)?))
      })
      .collect()
  }

  // ── Assessment items ──────────────────────────────────────────────────────

  async fn create_item(
    &self,
    input: NewAssessmentItem,
  ) -> Result<AssessmentItem> {
    if input.total_marks <= Decimal::ZERO {
      return Err(
        attain_core::Error::NonPositiveTotal(input.total_marks).into(),
      );
    }

    let item = AssessmentItem {
      item_id:     Uuid::new_v4(),
      offering_id: input.offering_id,
      name:        input.name,
      total_marks: input.total_marks,
      created_at:  Utc::now(),
    };

    let row = item.clone();
    self
      .with_tx(move |tx| {
        tx.execute(
          "INSERT INTO assessment_items
             (item_id, offering_id, name, total_marks, created_at)
           VALUES (?1, ?2, ?3, ?4, ?5)",
          rusqlite::params![
            encode_uuid(row.item_id),
            encode_uuid(row.offering_id),
            row.name,
            encode_decimal(row.total_marks),
            encode_dt(row.created_at),
          ],
        )?;
        bump_revision(tx)
      })
      .await?;

    Ok(item)
  }

  async fn get_item(&self, id: Uuid) -> Result<Option<AssessmentItem>> {
    let id_str = encode_uuid(id);

    let raw: Option<RawItem> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              "SELECT item_id, offering_id, name, total_marks, created_at
               FROM assessment_items WHERE item_id = ?1",
              rusqlite::params![id_str],
              raw_item,
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawItem::into_item).transpose()
  }

  async fn list_items(
    &self,
    offering_id: Uuid,
  ) -> Result<Vec<AssessmentItem>> {
    let offering_str = encode_uuid(offering_id);

    let raws: Vec<RawItem> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT item_id, offering_id, name, total_marks, created_at
           FROM assessment_items
           WHERE offering_id = ?1
           ORDER BY name, item_id",
        )?;
        let rows = stmt
          .query_map(rusqlite::params![offering_str], raw_item)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawItem::into_item).collect()
  }

  // ── Allocation ledger ─────────────────────────────────────────────────────

  async fn set_allocations(
    &self,
    item_id: Uuid,
    rows: Vec<AllocationDraft>,
  ) -> Result<Vec<AllocationRow>> {
    let raws: Vec<RawAllocation> = self
      .with_tx(move |tx| {
        let total = item_total(tx, item_id)?;
        let item_id_str = encode_uuid(item_id);

        // One validation pass over the complete proposed set; nothing is
        // written unless every check passes.
        let mut seen = BTreeSet::new();
        let mut allocated = Decimal::ZERO;
        for draft in &rows {
          if !seen.insert(draft.clo_id) {
            return Err(
              attain_core::Error::DuplicateAllocation(draft.clo_id).into(),
            );
          }
          match outcome_tier(tx, draft.clo_id)? {
            None => {
              return Err(
                attain_core::Error::OutcomeNotFound(draft.clo_id).into(),
              );
            }
            Some(Tier::Clo) => {}
            Some(_) => {
              return Err(
                attain_core::Error::AllocationTargetNotClo(draft.clo_id)
                  .into(),
              );
            }
          }
          if draft.marks < Decimal::ZERO || draft.marks > total {
            return Err(
              attain_core::Error::MarksOutOfRange {
                clo_id: draft.clo_id,
                marks:  draft.marks,
                total,
              }
              .into(),
            );
          }
          allocated += draft.marks;
        }
        if allocated > total {
          return Err(
            attain_core::Error::OverAllocated {
              item_id,
              allocated,
              total,
            }
            .into(),
          );
        }

        tx.execute(
          "DELETE FROM allocations WHERE item_id = ?1",
          rusqlite::params![item_id_str],
        )?;
        for draft in &rows {
          tx.execute(
            "INSERT INTO allocations (item_id, clo_id, marks)
             VALUES (?1, ?2, ?3)",
            rusqlite::params![
              item_id_str,
              encode_uuid(draft.clo_id),
              encode_decimal(draft.marks),
            ],
          )?;
        }
        bump_revision(tx)?;

        let mut stmt = tx.prepare(
          "SELECT a.item_id, a.clo_id, a.marks
           FROM allocations a
           JOIN outcomes o ON o.outcome_id = a.clo_id
           WHERE a.item_id = ?1
           ORDER BY o.code",
        )?;
        let stored = stmt
          .query_map(rusqlite::params![item_id_str], |row| {
            Ok(RawAllocation {
              item_id: row.get(0)?,
              clo_id:  row.get(1)?,
              marks:   row.get(2)?,
            })
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(stored)
      })
      .await?;

    raws.into_iter().map(RawAllocation::into_row).collect()
  }

  async fn get_allocations(&self, item_id: Uuid) -> Result<Vec<AllocationRow>> {
    let item_str = encode_uuid(item_id);

    let raws: Vec<RawAllocation> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT a.item_id, a.clo_id, a.marks
           FROM allocations a
           JOIN outcomes o ON o.outcome_id = a.clo_id
           WHERE a.item_id = ?1
           ORDER BY o.code",
        )?;
        let rows = stmt
          .query_map(rusqlite::params![item_str], |row| {
            Ok(RawAllocation {
              item_id: row.get(0)?,
              clo_id:  row.get(1)?,
              marks:   row.get(2)?,
            })
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawAllocation::into_row).collect()
  }

  async fn allocations_for_clo(
    &self,
    clo_id: Uuid,
  ) -> Result<Vec<CloAllocation>> {
    let clo_str = encode_uuid(clo_id);

    let raws: Vec<RawCloAllocation> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT i.item_id, i.offering_id, i.name, i.total_marks,
                  i.created_at, a.marks
           FROM allocations a
           JOIN assessment_items i ON i.item_id = a.item_id
           WHERE a.clo_id = ?1
           ORDER BY i.name, i.item_id",
        )?;
        let rows = stmt
          .query_map(rusqlite::params![clo_str], |row| {
            Ok(RawCloAllocation {
              item:  raw_item(row)?,
              marks: row.get(5)?,
            })
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws
      .into_iter()
      .map(RawCloAllocation::into_allocation)
      .collect()
  }

  // ── Threshold overrides ───────────────────────────────────────────────────

  async fn set_threshold(
    &self,
    outcome_id: Uuid,
    config: Option<ThresholdConfig>,
  ) -> Result<()> {
    self
      .with_tx(move |tx| {
        if outcome_tier(tx, outcome_id)?.is_none() {
          return Err(attain_core::Error::OutcomeNotFound(outcome_id).into());
        }

        match config {
          Some(cfg) => {
            tx.execute(
              "INSERT INTO threshold_overrides
                 (outcome_id, excellent, high, medium, low)
               VALUES (?1, ?2, ?3, ?4, ?5)
               ON CONFLICT(outcome_id) DO UPDATE SET
                 excellent = excluded.excellent,
                 high      = excluded.high,
                 medium    = excluded.medium,
                 low       = excluded.low",
              rusqlite::params![
                encode_uuid(outcome_id),
                encode_decimal(cfg.excellent),
                encode_decimal(cfg.high),
                encode_decimal(cfg.medium),
                encode_decimal(cfg.low),
              ],
            )?;
          }
          None => {
            tx.execute(
              "DELETE FROM threshold_overrides WHERE outcome_id = ?1",
              rusqlite::params![encode_uuid(outcome_id)],
            )?;
          }
        }
        bump_revision(tx)
      })
      .await
  }

  async fn threshold_for(
    &self,
    outcome_id: Uuid,
  ) -> Result<Option<ThresholdConfig>> {
    let outcome_str = encode_uuid(outcome_id);

    let raw: Option<RawThreshold> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              "SELECT excellent, high, medium, low
               FROM threshold_overrides WHERE outcome_id = ?1",
              rusqlite::params![outcome_str],
              |row| {
                Ok(RawThreshold {
                  excellent: row.get(0)?,
                  high:      row.get(1)?,
                  medium:    row.get(2)?,
                  low:       row.get(3)?,
                })
              },
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawThreshold::into_config).transpose()
  }

  // ── Result cache ──────────────────────────────────────────────────────────

  async fn revision(&self) -> Result<i64> {
    let value: i64 = self
      .conn
      .call(|conn| {
        Ok(conn.query_row(
          "SELECT value FROM meta WHERE key = 'revision'",
          [],
          |r| r.get(0),
        )?)
      })
      .await?;
    Ok(value)
  }

  async fn publish_results(
    &self,
    _scope: Scope,
    expected_revision: i64,
    results: Vec<AttainmentResult>,
  ) -> Result<PublishOutcome> {
    self
      .with_tx(move |tx| {
        let revision: i64 = tx.query_row(
          "SELECT value FROM meta WHERE key = 'revision'",
          [],
          |r| r.get(0),
        )?;
        if revision != expected_revision {
          return Ok(PublishOutcome::Stale);
        }

        for result in &results {
          insert_result(tx, result)?;
        }
        Ok(PublishOutcome::Written(results.len()))
      })
      .await
  }

  async fn latest_result(
    &self,
    subject: AttainmentSubject,
    outcome_id: Uuid,
  ) -> Result<Option<AttainmentResult>> {
    let (kind, subject_str) = encode_subject(subject);
    let outcome_str = encode_uuid(outcome_id);

    let raw: Option<RawResult> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              &format!(
                "SELECT {RESULT_COLUMNS} FROM attainment_results
                 WHERE subject_kind = ?1 AND subject_id = ?2
                   AND outcome_id = ?3
                 ORDER BY computed_at DESC LIMIT 1"
              ),
              rusqlite::params![kind, subject_str, outcome_str],
              raw_result,
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawResult::into_result).transpose()
  }

  async fn cohort_history(
    &self,
    scope_id: Uuid,
    tier: Tier,
  ) -> Result<Vec<AttainmentResult>> {
    let scope_str = encode_uuid(scope_id);
    let tier_str = encode_tier(tier).to_owned();

    let raws: Vec<RawResult> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT r.subject_kind, r.subject_id, r.outcome_id, r.attainment,
                  r.level, r.items_counted, r.students_counted,
                  r.children_measured, r.children_total, r.computed_at
           FROM attainment_results r
           JOIN outcomes o ON o.outcome_id = r.outcome_id
           WHERE o.scope_id = ?1 AND o.tier = ?2
             AND r.subject_kind = 'cohort'
           ORDER BY r.computed_at, o.code",
        )?;
        let rows = stmt
          .query_map(rusqlite::params![scope_str, tier_str], raw_result)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawResult::into_result).collect()
  }

  async fn record_override(
    &self,
    record: OverrideRecord,
    result: AttainmentResult,
  ) -> Result<()> {
    self
      .with_tx(move |tx| {
        let (kind, subject_id) = encode_subject(record.subject);
        tx.execute(
          "INSERT INTO attainment_overrides (
             override_id, subject_kind, subject_id, outcome_id,
             previous, value, reason, recorded_at
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
          rusqlite::params![
            encode_uuid(record.override_id),
            kind,
            subject_id,
            encode_uuid(record.outcome_id),
            encode_attainment(record.previous),
            encode_decimal(record.value),
            record.reason,
            encode_dt(record.recorded_at),
          ],
        )?;
        insert_result(tx, &result)
      })
      .await
  }
}

// ─── Score adapter impls ─────────────────────────────────────────────────────

impl ScoreSource for SqliteStore {
  type Error = Error;

  async fn fetch_scores(
    &self,
    item_ids: Vec<Uuid>,
    student_ids: Option<Vec<Uuid>>,
  ) -> Result<Vec<ScoreRecord>> {
    if item_ids.is_empty()
      || student_ids.as_ref().is_some_and(|s| s.is_empty())
    {
      return Ok(Vec::new());
    }

    let item_strs: Vec<String> =
      item_ids.into_iter().map(encode_uuid).collect();
    let student_strs: Option<Vec<String>> = student_ids
      .map(|ids| ids.into_iter().map(encode_uuid).collect());

    let raws: Vec<RawScore> = self
      .conn
      .call(move |conn| {
        let mut sql = format!(
          "SELECT student_id, item_id, obtained FROM score_records
           WHERE item_id IN ({})",
          placeholders(item_strs.len(), 1)
        );
        let mut args = item_strs;
        if let Some(students) = student_strs {
          sql.push_str(&format!(
            " AND student_id IN ({})",
            placeholders(students.len(), args.len() + 1)
          ));
          args.extend(students);
        }
        sql.push_str(" ORDER BY student_id, item_id");

        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
          .query_map(rusqlite::params_from_iter(args.iter()), |row| {
            Ok(RawScore {
              student_id: row.get(0)?,
              item_id:    row.get(1)?,
              obtained:   row.get(2)?,
            })
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawScore::into_score).collect()
  }
}

impl ScoreSink for SqliteStore {
  type Error = Error;

  async fn record_scores(&self, records: Vec<ScoreRecord>) -> Result<usize> {
    self
      .with_tx(move |tx| {
        let recorded_at = encode_dt(Utc::now());
        for record in &records {
          let total = item_total(tx, record.item_id)?;
          if record.obtained < Decimal::ZERO || record.obtained > total {
            return Err(
              attain_core::Error::ScoreOutOfRange {
                item_id:  record.item_id,
                obtained: record.obtained,
                total,
              }
              .into(),
            );
          }
          tx.execute(
            "INSERT INTO score_records
               (student_id, item_id, obtained, recorded_at)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(student_id, item_id) DO UPDATE SET
               obtained = excluded.obtained,
               recorded_at = excluded.recorded_at",
            rusqlite::params![
              encode_uuid(record.student_id),
              encode_uuid(record.item_id),
              encode_decimal(record.obtained),
              recorded_at,
            ],
          )?;
        }
        Ok(records.len())
      })
      .await
  }
}
