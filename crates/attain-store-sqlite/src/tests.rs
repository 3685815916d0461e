//! Integration tests for `SqliteStore` against an in-memory database.

use chrono::Utc;
use rust_decimal::Decimal;
use uuid::Uuid;

use attain_core::{
  assessment::{AllocationDraft, AssessmentItem, NewAssessmentItem, ScoreRecord},
  attainment::{
    Attainment, AttainmentLevel, AttainmentResult, AttainmentSubject,
    OverrideRecord, Scope, SupportingCounts, ThresholdConfig,
  },
  outcome::{NewOutcome, Outcome, Tier},
  store::{OutcomeStore, PublishOutcome, ScoreSink, ScoreSource},
};

use crate::{Error, SqliteStore};

async fn store() -> SqliteStore {
  SqliteStore::open_in_memory()
    .await
    .expect("in-memory store")
}

fn dec(s: &str) -> Decimal {
  s.parse().unwrap()
}

async fn outcome(
  s: &SqliteStore,
  tier: Tier,
  scope: Uuid,
  code: &str,
) -> Outcome {
  s.create_outcome(NewOutcome {
    tier,
    scope_id: scope,
    code: code.into(),
    description: format!("{code} description"),
  })
  .await
  .unwrap()
}

async fn item(
  s: &SqliteStore,
  offering: Uuid,
  name: &str,
  total: &str,
) -> AssessmentItem {
  s.create_item(NewAssessmentItem {
    offering_id: offering,
    name:        name.into(),
    total_marks: dec(total),
  })
  .await
  .unwrap()
}

fn draft(clo: &Outcome, marks: &str) -> AllocationDraft {
  AllocationDraft {
    clo_id: clo.outcome_id,
    marks:  dec(marks),
  }
}

// ─── Outcomes ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn create_and_get_outcome() {
  let s = store().await;
  let scope = Uuid::new_v4();

  let created = outcome(&s, Tier::Clo, scope, "CLO1").await;
  assert_eq!(created.tier, Tier::Clo);
  assert_eq!(created.code, "CLO1");

  let fetched = s.get_outcome(created.outcome_id).await.unwrap().unwrap();
  assert_eq!(fetched.outcome_id, created.outcome_id);
  assert_eq!(fetched.scope_id, scope);
  assert_eq!(fetched.description, "CLO1 description");
}

#[tokio::test]
async fn get_outcome_missing_returns_none() {
  let s = store().await;
  assert!(s.get_outcome(Uuid::new_v4()).await.unwrap().is_none());
}

#[tokio::test]
async fn duplicate_code_in_same_scope_and_tier_errors() {
  let s = store().await;
  let scope = Uuid::new_v4();
  outcome(&s, Tier::Clo, scope, "CLO1").await;

  let err = s
    .create_outcome(NewOutcome {
      tier:        Tier::Clo,
      scope_id:    scope,
      code:        "CLO1".into(),
      description: "duplicate".into(),
    })
    .await
    .unwrap_err();
  assert!(matches!(
    err,
    Error::Core(attain_core::Error::DuplicateCode { .. })
  ));
}

#[tokio::test]
async fn same_code_allowed_across_scopes_and_tiers() {
  let s = store().await;
  let scope_a = Uuid::new_v4();
  let scope_b = Uuid::new_v4();

  outcome(&s, Tier::Clo, scope_a, "CLO1").await;
  // Same code, different scope.
  outcome(&s, Tier::Clo, scope_b, "CLO1").await;
  // Same scope and code, different tier.
  outcome(&s, Tier::Plo, scope_a, "CLO1").await;
}

#[tokio::test]
async fn list_outcomes_orders_by_code_and_filters_by_tier() {
  let s = store().await;
  let program = Uuid::new_v4();
  outcome(&s, Tier::Plo, program, "PLO2").await;
  outcome(&s, Tier::Plo, program, "PLO1").await;
  outcome(&s, Tier::Peo, program, "PEO1").await;

  let all = s.list_outcomes(program, None).await.unwrap();
  let codes: Vec<_> = all.iter().map(|o| o.code.as_str()).collect();
  assert_eq!(codes, ["PEO1", "PLO1", "PLO2"]);

  let plos = s.list_outcomes(program, Some(Tier::Plo)).await.unwrap();
  let codes: Vec<_> = plos.iter().map(|o| o.code.as_str()).collect();
  assert_eq!(codes, ["PLO1", "PLO2"]);
}

// ─── Mapping edges ───────────────────────────────────────────────────────────

#[tokio::test]
async fn set_mapping_toggles_idempotently() {
  let s = store().await;
  let offering = Uuid::new_v4();
  let program = Uuid::new_v4();
  let clo = outcome(&s, Tier::Clo, offering, "CLO1").await;
  let plo = outcome(&s, Tier::Plo, program, "PLO1").await;

  assert!(
    s.set_mapping(clo.outcome_id, plo.outcome_id, true)
      .await
      .unwrap()
  );
  // Repeating the toggle changes nothing.
  assert!(
    !s.set_mapping(clo.outcome_id, plo.outcome_id, true)
      .await
      .unwrap()
  );

  assert!(
    s.set_mapping(clo.outcome_id, plo.outcome_id, false)
      .await
      .unwrap()
  );
  assert!(
    !s.set_mapping(clo.outcome_id, plo.outcome_id, false)
      .await
      .unwrap()
  );
}

#[tokio::test]
async fn set_mapping_rejects_non_adjacent_tiers() {
  let s = store().await;
  let offering = Uuid::new_v4();
  let program = Uuid::new_v4();
  let clo = outcome(&s, Tier::Clo, offering, "CLO1").await;
  let peo = outcome(&s, Tier::Peo, program, "PEO1").await;

  let err = s
    .set_mapping(clo.outcome_id, peo.outcome_id, true)
    .await
    .unwrap_err();
  assert!(matches!(
    err,
    Error::Core(attain_core::Error::TierMismatch {
      child:  Tier::Clo,
      parent: Tier::Peo,
    })
  ));

  // Reversed direction is a mismatch too.
  let plo = outcome(&s, Tier::Plo, program, "PLO1").await;
  let err = s
    .set_mapping(plo.outcome_id, clo.outcome_id, true)
    .await
    .unwrap_err();
  assert!(matches!(
    err,
    Error::Core(attain_core::Error::TierMismatch { .. })
  ));
}

#[tokio::test]
async fn set_mapping_unknown_outcome_errors() {
  let s = store().await;
  let program = Uuid::new_v4();
  let plo = outcome(&s, Tier::Plo, program, "PLO1").await;

  let missing = Uuid::new_v4();
  let err = s
    .set_mapping(missing, plo.outcome_id, true)
    .await
    .unwrap_err();
  assert!(matches!(
    err,
    Error::Core(attain_core::Error::OutcomeNotFound(id)) if id == missing
  ));
}

#[tokio::test]
async fn children_and_parents_are_ordered_by_code() {
  let s = store().await;
  let offering = Uuid::new_v4();
  let program = Uuid::new_v4();
  let clo2 = outcome(&s, Tier::Clo, offering, "CLO2").await;
  let clo1 = outcome(&s, Tier::Clo, offering, "CLO1").await;
  let plo1 = outcome(&s, Tier::Plo, program, "PLO1").await;
  let plo2 = outcome(&s, Tier::Plo, program, "PLO2").await;

  s.set_mapping(clo2.outcome_id, plo1.outcome_id, true)
    .await
    .unwrap();
  s.set_mapping(clo1.outcome_id, plo1.outcome_id, true)
    .await
    .unwrap();
  s.set_mapping(clo1.outcome_id, plo2.outcome_id, true)
    .await
    .unwrap();

  let children = s.list_children(plo1.outcome_id).await.unwrap();
  let codes: Vec<_> = children.iter().map(|o| o.code.as_str()).collect();
  assert_eq!(codes, ["CLO1", "CLO2"]);

  let parents = s.list_parents(clo1.outcome_id).await.unwrap();
  let codes: Vec<_> = parents.iter().map(|o| o.code.as_str()).collect();
  assert_eq!(codes, ["PLO1", "PLO2"]);
}

#[tokio::test]
async fn child_edges_carry_the_default_weight() {
  let s = store().await;
  let offering = Uuid::new_v4();
  let program = Uuid::new_v4();
  let clo = outcome(&s, Tier::Clo, offering, "CLO1").await;
  let plo = outcome(&s, Tier::Plo, program, "PLO1").await;
  s.set_mapping(clo.outcome_id, plo.outcome_id, true)
    .await
    .unwrap();

  let edges = s.list_child_edges(plo.outcome_id).await.unwrap();
  assert_eq!(edges.len(), 1);
  assert_eq!(edges[0].0.outcome_id, clo.outcome_id);
  assert_eq!(edges[0].1, Decimal::ONE);
}

// ─── Cascade delete ──────────────────────────────────────────────────────────

#[tokio::test]
async fn delete_outcome_cascades_and_reports_counts() {
  let s = store().await;
  let offering = Uuid::new_v4();
  let program = Uuid::new_v4();
  let clo = outcome(&s, Tier::Clo, offering, "CLO1").await;
  let plo1 = outcome(&s, Tier::Plo, program, "PLO1").await;
  let plo2 = outcome(&s, Tier::Plo, program, "PLO2").await;

  // Two edges and three allocation rows touch the CLO.
  s.set_mapping(clo.outcome_id, plo1.outcome_id, true)
    .await
    .unwrap();
  s.set_mapping(clo.outcome_id, plo2.outcome_id, true)
    .await
    .unwrap();
  let quiz = item(&s, offering, "Quiz", "20").await;
  let exam = item(&s, offering, "Exam", "100").await;
  let lab = item(&s, offering, "Lab", "50").await;
  for i in [&quiz, &exam, &lab] {
    s.set_allocations(i.item_id, vec![draft(&clo, "10")])
      .await
      .unwrap();
  }

  let report = s.delete_outcome(clo.outcome_id).await.unwrap();
  assert_eq!(report.edges_removed, 2);
  assert_eq!(report.allocations_removed, 3);
  assert_eq!(report.total(), 5);

  assert!(s.get_outcome(clo.outcome_id).await.unwrap().is_none());
  for i in [&quiz, &exam, &lab] {
    assert!(s.get_allocations(i.item_id).await.unwrap().is_empty());
  }
  assert!(s.list_children(plo1.outcome_id).await.unwrap().is_empty());
}

#[tokio::test]
async fn delete_unknown_outcome_errors() {
  let s = store().await;
  let err = s.delete_outcome(Uuid::new_v4()).await.unwrap_err();
  assert!(matches!(
    err,
    Error::Core(attain_core::Error::OutcomeNotFound(_))
  ));
}

// ─── Assessment items ────────────────────────────────────────────────────────

#[tokio::test]
async fn create_item_rejects_non_positive_totals() {
  let s = store().await;
  let offering = Uuid::new_v4();

  for total in ["0", "-5"] {
    let err = s
      .create_item(NewAssessmentItem {
        offering_id: offering,
        name:        "Quiz".into(),
        total_marks: dec(total),
      })
      .await
      .unwrap_err();
    assert!(matches!(
      err,
      Error::Core(attain_core::Error::NonPositiveTotal(_))
    ));
  }
}

#[tokio::test]
async fn list_items_orders_by_name() {
  let s = store().await;
  let offering = Uuid::new_v4();
  item(&s, offering, "Quiz", "20").await;
  item(&s, offering, "Exam", "100").await;
  item(&s, Uuid::new_v4(), "Other offering", "10").await;

  let items = s.list_items(offering).await.unwrap();
  let names: Vec<_> = items.iter().map(|i| i.name.as_str()).collect();
  assert_eq!(names, ["Exam", "Quiz"]);
}

// ─── Allocation ledger ───────────────────────────────────────────────────────

#[tokio::test]
async fn set_allocations_replaces_the_full_set() {
  let s = store().await;
  let offering = Uuid::new_v4();
  let clo1 = outcome(&s, Tier::Clo, offering, "CLO1").await;
  let clo2 = outcome(&s, Tier::Clo, offering, "CLO2").await;
  let exam = item(&s, offering, "Exam", "100").await;

  s.set_allocations(exam.item_id, vec![draft(&clo1, "60"), draft(&clo2, "40")])
    .await
    .unwrap();

  // A later set replaces, never merges.
  let rows = s
    .set_allocations(exam.item_id, vec![draft(&clo2, "30")])
    .await
    .unwrap();
  assert_eq!(rows.len(), 1);
  assert_eq!(rows[0].clo_id, clo2.outcome_id);
  assert_eq!(rows[0].marks, dec("30"));

  let stored = s.get_allocations(exam.item_id).await.unwrap();
  assert_eq!(stored.len(), 1);
  assert_eq!(stored[0].clo_id, clo2.outcome_id);
}

#[tokio::test]
async fn allocations_are_returned_in_code_order() {
  let s = store().await;
  let offering = Uuid::new_v4();
  let clo2 = outcome(&s, Tier::Clo, offering, "CLO2").await;
  let clo1 = outcome(&s, Tier::Clo, offering, "CLO1").await;
  let exam = item(&s, offering, "Exam", "100").await;

  let rows = s
    .set_allocations(exam.item_id, vec![draft(&clo2, "40"), draft(&clo1, "60")])
    .await
    .unwrap();
  assert_eq!(rows[0].clo_id, clo1.outcome_id);
  assert_eq!(rows[1].clo_id, clo2.outcome_id);
}

#[tokio::test]
async fn over_allocation_is_rejected_with_no_partial_write() {
  let s = store().await;
  let offering = Uuid::new_v4();
  let clo1 = outcome(&s, Tier::Clo, offering, "CLO1").await;
  let clo2 = outcome(&s, Tier::Clo, offering, "CLO2").await;
  let exam = item(&s, offering, "Exam", "100").await;

  s.set_allocations(exam.item_id, vec![draft(&clo1, "50")])
    .await
    .unwrap();

  // 70 + 40 > 100.
  let err = s
    .set_allocations(exam.item_id, vec![draft(&clo1, "70"), draft(&clo2, "40")])
    .await
    .unwrap_err();
  assert!(matches!(
    err,
    Error::Core(attain_core::Error::OverAllocated { allocated, total, .. })
      if allocated == dec("110") && total == dec("100")
  ));

  // The prior set survives intact.
  let stored = s.get_allocations(exam.item_id).await.unwrap();
  assert_eq!(stored.len(), 1);
  assert_eq!(stored[0].clo_id, clo1.outcome_id);
  assert_eq!(stored[0].marks, dec("50"));
}

#[tokio::test]
async fn allocation_validation_covers_range_duplicates_and_targets() {
  let s = store().await;
  let offering = Uuid::new_v4();
  let program = Uuid::new_v4();
  let clo = outcome(&s, Tier::Clo, offering, "CLO1").await;
  let plo = outcome(&s, Tier::Plo, program, "PLO1").await;
  let exam = item(&s, offering, "Exam", "100").await;

  let err = s
    .set_allocations(exam.item_id, vec![draft(&clo, "-1")])
    .await
    .unwrap_err();
  assert!(matches!(
    err,
    Error::Core(attain_core::Error::MarksOutOfRange { .. })
  ));

  let err = s
    .set_allocations(exam.item_id, vec![draft(&clo, "101")])
    .await
    .unwrap_err();
  assert!(matches!(
    err,
    Error::Core(attain_core::Error::MarksOutOfRange { .. })
  ));

  let err = s
    .set_allocations(exam.item_id, vec![draft(&clo, "30"), draft(&clo, "20")])
    .await
    .unwrap_err();
  assert!(matches!(
    err,
    Error::Core(attain_core::Error::DuplicateAllocation(_))
  ));

  let err = s
    .set_allocations(exam.item_id, vec![draft(&plo, "30")])
    .await
    .unwrap_err();
  assert!(matches!(
    err,
    Error::Core(attain_core::Error::AllocationTargetNotClo(_))
  ));

  let err = s
    .set_allocations(Uuid::new_v4(), vec![draft(&clo, "30")])
    .await
    .unwrap_err();
  assert!(matches!(err, Error::Core(attain_core::Error::ItemNotFound(_))));
}

#[tokio::test]
async fn full_total_to_one_clo_and_empty_set_are_both_valid() {
  let s = store().await;
  let offering = Uuid::new_v4();
  let clo = outcome(&s, Tier::Clo, offering, "CLO1").await;
  let exam = item(&s, offering, "Exam", "100").await;

  let rows = s
    .set_allocations(exam.item_id, vec![draft(&clo, "100")])
    .await
    .unwrap();
  assert_eq!(rows[0].marks, dec("100"));

  // An empty set clears the ledger for the item.
  let rows = s.set_allocations(exam.item_id, Vec::new()).await.unwrap();
  assert!(rows.is_empty());
  assert!(s.get_allocations(exam.item_id).await.unwrap().is_empty());
}

#[tokio::test]
async fn allocations_for_clo_collects_across_items() {
  let s = store().await;
  let offering = Uuid::new_v4();
  let clo = outcome(&s, Tier::Clo, offering, "CLO1").await;
  let quiz = item(&s, offering, "Quiz", "20").await;
  let exam = item(&s, offering, "Exam", "100").await;

  s.set_allocations(quiz.item_id, vec![draft(&clo, "20")])
    .await
    .unwrap();
  s.set_allocations(exam.item_id, vec![draft(&clo, "60")])
    .await
    .unwrap();

  let allocations = s.allocations_for_clo(clo.outcome_id).await.unwrap();
  assert_eq!(allocations.len(), 2);
  // Ordered by item name.
  assert_eq!(allocations[0].item.name, "Exam");
  assert_eq!(allocations[0].marks, dec("60"));
  assert_eq!(allocations[1].item.name, "Quiz");
  assert_eq!(allocations[1].marks, dec("20"));
}

// ─── Scores ──────────────────────────────────────────────────────────────────

#[tokio::test]
async fn record_and_fetch_scores() {
  let s = store().await;
  let offering = Uuid::new_v4();
  let exam = item(&s, offering, "Exam", "100").await;
  let s1 = Uuid::new_v4();
  let s2 = Uuid::new_v4();

  let recorded = s
    .record_scores(vec![
      ScoreRecord {
        student_id: s1,
        item_id:    exam.item_id,
        obtained:   dec("80"),
      },
      ScoreRecord {
        student_id: s2,
        item_id:    exam.item_id,
        obtained:   dec("55"),
      },
    ])
    .await
    .unwrap();
  assert_eq!(recorded, 2);

  let all = s.fetch_scores(vec![exam.item_id], None).await.unwrap();
  assert_eq!(all.len(), 2);

  let only_s1 = s
    .fetch_scores(vec![exam.item_id], Some(vec![s1]))
    .await
    .unwrap();
  assert_eq!(only_s1.len(), 1);
  assert_eq!(only_s1[0].student_id, s1);
  assert_eq!(only_s1[0].obtained, dec("80"));
}

#[tokio::test]
async fn record_scores_upserts_per_student_and_item() {
  let s = store().await;
  let offering = Uuid::new_v4();
  let exam = item(&s, offering, "Exam", "100").await;
  let student = Uuid::new_v4();

  let score = |marks: &str| ScoreRecord {
    student_id: student,
    item_id:    exam.item_id,
    obtained:   dec(marks),
  };
  s.record_scores(vec![score("40")]).await.unwrap();
  s.record_scores(vec![score("70")]).await.unwrap();

  let all = s.fetch_scores(vec![exam.item_id], None).await.unwrap();
  assert_eq!(all.len(), 1);
  assert_eq!(all[0].obtained, dec("70"));
}

#[tokio::test]
async fn out_of_range_score_rejects_the_whole_batch() {
  let s = store().await;
  let offering = Uuid::new_v4();
  let exam = item(&s, offering, "Exam", "100").await;
  let s1 = Uuid::new_v4();
  let s2 = Uuid::new_v4();

  let err = s
    .record_scores(vec![
      ScoreRecord {
        student_id: s1,
        item_id:    exam.item_id,
        obtained:   dec("60"),
      },
      ScoreRecord {
        student_id: s2,
        item_id:    exam.item_id,
        obtained:   dec("101"),
      },
    ])
    .await
    .unwrap_err();
  assert!(matches!(
    err,
    Error::Core(attain_core::Error::ScoreOutOfRange { .. })
  ));

  // The valid first record rolled back with the rest.
  let all = s.fetch_scores(vec![exam.item_id], None).await.unwrap();
  assert!(all.is_empty());
}

#[tokio::test]
async fn fetch_scores_with_empty_filters_returns_nothing() {
  let s = store().await;
  let offering = Uuid::new_v4();
  let exam = item(&s, offering, "Exam", "100").await;

  assert!(s.fetch_scores(Vec::new(), None).await.unwrap().is_empty());
  assert!(
    s.fetch_scores(vec![exam.item_id], Some(Vec::new()))
      .await
      .unwrap()
      .is_empty()
  );
}

// ─── Threshold overrides ─────────────────────────────────────────────────────

#[tokio::test]
async fn threshold_override_set_get_clear() {
  let s = store().await;
  let offering = Uuid::new_v4();
  let clo = outcome(&s, Tier::Clo, offering, "CLO1").await;

  assert!(s.threshold_for(clo.outcome_id).await.unwrap().is_none());

  let strict = ThresholdConfig {
    excellent: dec("90"),
    high:      dec("80"),
    medium:    dec("70"),
    low:       dec("60"),
  };
  s.set_threshold(clo.outcome_id, Some(strict)).await.unwrap();
  assert_eq!(
    s.threshold_for(clo.outcome_id).await.unwrap(),
    Some(strict)
  );

  s.set_threshold(clo.outcome_id, None).await.unwrap();
  assert!(s.threshold_for(clo.outcome_id).await.unwrap().is_none());
}

#[tokio::test]
async fn threshold_for_unknown_outcome_errors() {
  let s = store().await;
  let err = s
    .set_threshold(Uuid::new_v4(), Some(ThresholdConfig::default()))
    .await
    .unwrap_err();
  assert!(matches!(
    err,
    Error::Core(attain_core::Error::OutcomeNotFound(_))
  ));
}

// ─── Revision and result cache ───────────────────────────────────────────────

#[tokio::test]
async fn structural_mutations_bump_the_revision_but_scores_do_not() {
  let s = store().await;
  let offering = Uuid::new_v4();
  assert_eq!(s.revision().await.unwrap(), 0);

  let clo = outcome(&s, Tier::Clo, offering, "CLO1").await;
  assert_eq!(s.revision().await.unwrap(), 1);

  let exam = item(&s, offering, "Exam", "100").await;
  assert_eq!(s.revision().await.unwrap(), 2);

  s.set_allocations(exam.item_id, vec![draft(&clo, "100")])
    .await
    .unwrap();
  assert_eq!(s.revision().await.unwrap(), 3);

  // Scores arrive continuously; they are not structural.
  s.record_scores(vec![ScoreRecord {
    student_id: Uuid::new_v4(),
    item_id:    exam.item_id,
    obtained:   dec("50"),
  }])
  .await
  .unwrap();
  assert_eq!(s.revision().await.unwrap(), 3);
}

fn cohort_result(
  scope: Uuid,
  outcome_id: Uuid,
  value: &str,
) -> AttainmentResult {
  AttainmentResult {
    subject:     AttainmentSubject::Cohort(scope),
    outcome_id,
    attainment:  Attainment::Measured(value.parse().unwrap()),
    level:       AttainmentLevel::High,
    supporting:  SupportingCounts::default(),
    computed_at: Utc::now(),
  }
}

#[tokio::test]
async fn publish_results_commits_at_the_expected_revision() {
  let s = store().await;
  let offering = Uuid::new_v4();
  let clo = outcome(&s, Tier::Clo, offering, "CLO1").await;

  let revision = s.revision().await.unwrap();
  let result = cohort_result(offering, clo.outcome_id, "75");
  let outcome = s
    .publish_results(Scope::Offering(offering), revision, vec![result.clone()])
    .await
    .unwrap();
  assert_eq!(outcome, PublishOutcome::Written(1));

  let cached = s
    .latest_result(AttainmentSubject::Cohort(offering), clo.outcome_id)
    .await
    .unwrap()
    .unwrap();
  assert_eq!(cached.attainment, result.attainment);
}

#[tokio::test]
async fn stale_publish_writes_nothing() {
  let s = store().await;
  let offering = Uuid::new_v4();
  let clo = outcome(&s, Tier::Clo, offering, "CLO1").await;

  let revision = s.revision().await.unwrap();
  // A structural change lands between compute and publish.
  outcome(&s, Tier::Clo, offering, "CLO2").await;

  let outcome = s
    .publish_results(Scope::Offering(offering), revision, vec![cohort_result(
      offering,
      clo.outcome_id,
      "75",
    )])
    .await
    .unwrap();
  assert_eq!(outcome, PublishOutcome::Stale);

  let cached = s
    .latest_result(AttainmentSubject::Cohort(offering), clo.outcome_id)
    .await
    .unwrap();
  assert!(cached.is_none());
}

#[tokio::test]
async fn latest_result_prefers_the_newest_computation() {
  let s = store().await;
  let offering = Uuid::new_v4();
  let clo = outcome(&s, Tier::Clo, offering, "CLO1").await;
  let revision = s.revision().await.unwrap();

  let mut old = cohort_result(offering, clo.outcome_id, "50");
  old.computed_at = "2025-03-01T00:00:00Z".parse().unwrap();
  let mut new = cohort_result(offering, clo.outcome_id, "65");
  new.computed_at = "2025-06-01T00:00:00Z".parse().unwrap();

  s.publish_results(Scope::Offering(offering), revision, vec![
    new.clone(),
    old,
  ])
  .await
  .unwrap();

  let cached = s
    .latest_result(AttainmentSubject::Cohort(offering), clo.outcome_id)
    .await
    .unwrap()
    .unwrap();
  assert_eq!(cached.attainment, new.attainment);
}

#[tokio::test]
async fn cohort_history_filters_by_scope_tier_and_subject() {
  let s = store().await;
  let program = Uuid::new_v4();
  let plo = outcome(&s, Tier::Plo, program, "PLO1").await;
  let peo = outcome(&s, Tier::Peo, program, "PEO1").await;
  let revision = s.revision().await.unwrap();

  let mut student_row = cohort_result(program, plo.outcome_id, "40");
  student_row.subject = AttainmentSubject::Student(Uuid::new_v4());

  s.publish_results(Scope::Program(program), revision, vec![
    cohort_result(program, plo.outcome_id, "70"),
    cohort_result(program, peo.outcome_id, "66"),
    student_row,
  ])
  .await
  .unwrap();

  let history = s.cohort_history(program, Tier::Plo).await.unwrap();
  assert_eq!(history.len(), 1);
  assert_eq!(history[0].outcome_id, plo.outcome_id);
  assert!(matches!(
    history[0].subject,
    AttainmentSubject::Cohort(id) if id == program
  ));
}

// ─── Override audit ──────────────────────────────────────────────────────────

#[tokio::test]
async fn record_override_stores_audit_row_and_imposed_result() {
  let s = store().await;
  let offering = Uuid::new_v4();
  let clo = outcome(&s, Tier::Clo, offering, "CLO1").await;
  let subject = AttainmentSubject::Student(Uuid::new_v4());

  let record = OverrideRecord {
    override_id: Uuid::new_v4(),
    subject,
    outcome_id: clo.outcome_id,
    previous: Attainment::Undefined,
    value: dec("82"),
    reason: "credited prior learning".into(),
    recorded_at: Utc::now(),
  };
  let mut imposed = cohort_result(offering, clo.outcome_id, "82");
  imposed.subject = subject;

  s.record_override(record.clone(), imposed).await.unwrap();

  let audit = s.overrides_for(clo.outcome_id).await.unwrap();
  assert_eq!(audit.len(), 1);
  assert_eq!(audit[0].override_id, record.override_id);
  assert_eq!(audit[0].previous, Attainment::Undefined);
  assert_eq!(audit[0].reason, "credited prior learning");

  let cached = s
    .latest_result(subject, clo.outcome_id)
    .await
    .unwrap()
    .unwrap();
  assert_eq!(cached.attainment, Attainment::Measured(dec("82")));
}
