//! Batch recomputation with staged, atomically published results.
//!
//! A recompute reads the store revision, computes every result for its
//! scope into memory, and publishes the whole batch in one transaction.
//! Partial results are never visible: cancellation or a revision mismatch
//! ends the job with nothing written.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use attain_core::{
  attainment::{
    Attainment, AttainmentResult, AttainmentSubject, RollupStrategy, Scope,
    SupportingCounts, ThresholdConfig,
  },
  outcome::{Outcome, Tier},
  store::{OutcomeStore, PublishOutcome},
};

use crate::{
  EngineStore,
  aggregate::{Aggregator, cohort_clo_attainment, student_clo_attainment},
  classify::classify,
  error::EngineError,
};

// ─── Job status ──────────────────────────────────────────────────────────────

/// Observable state of a recompute job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum JobStatus {
  Running { completed: usize, total: usize },
  /// The batch was published; carries the number of result rows written.
  Completed { written: usize },
  /// The scope's outcomes, mappings, or allocations changed mid-flight.
  /// Nothing was written; the caller retries the whole recompute.
  Stale,
  /// The job was cancelled before publishing. Nothing was written.
  Cancelled,
  Failed { message: String },
}

impl JobStatus {
  pub fn is_terminal(&self) -> bool {
    !matches!(self, JobStatus::Running { .. })
  }
}

// ─── Job handle ──────────────────────────────────────────────────────────────

/// Handle to a spawned recompute job: status observation and cancellation.
pub struct JobHandle {
  job_id: Uuid,
  status: watch::Receiver<JobStatus>,
  cancel: CancellationToken,
}

impl JobHandle {
  pub fn job_id(&self) -> Uuid {
    self.job_id
  }

  /// The latest status the job has reported.
  pub fn status(&self) -> JobStatus {
    self.status.borrow().clone()
  }

  /// Request cancellation. The job observes the token between outcomes and
  /// before publishing, and ends with [`JobStatus::Cancelled`].
  pub fn cancel(&self) {
    self.cancel.cancel();
  }

  /// Wait until the job reaches a terminal status.
  pub async fn wait(&mut self) -> JobStatus {
    loop {
      let current = self.status.borrow().clone();
      if current.is_terminal() {
        return current;
      }
      if self.status.changed().await.is_err() {
        return self.status.borrow().clone();
      }
    }
  }
}

// ─── Recompute ───────────────────────────────────────────────────────────────

impl<S: EngineStore> Aggregator<S> {
  /// Recompute every outcome in `scope` and publish the batch atomically.
  /// The inline form, for small scopes (one course offering); large scopes
  /// go through [`spawn_recompute`](Self::spawn_recompute).
  pub async fn recompute(
    &self,
    scope: Scope,
    strategy: RollupStrategy,
  ) -> Result<JobStatus, EngineError<S::Err>> {
    self
      .run_recompute(scope, strategy, &CancellationToken::new(), None)
      .await
  }

  /// Spawn a cancellable recompute job and return its handle.
  pub fn spawn_recompute(
    &self,
    scope: Scope,
    strategy: RollupStrategy,
  ) -> JobHandle
  where
    S: Clone + 'static,
  {
    let (tx, rx) = watch::channel(JobStatus::Running {
      completed: 0,
      total:     0,
    });
    let cancel = CancellationToken::new();
    let job_id = Uuid::new_v4();

    let aggregator = self.clone();
    let token = cancel.clone();
    tokio::spawn(async move {
      let terminal = match aggregator
        .run_recompute(scope, strategy, &token, Some(&tx))
        .await
      {
        Ok(status) => status,
        Err(e) => JobStatus::Failed {
          message: e.to_string(),
        },
      };
      tracing::info!(%job_id, ?scope, status = ?terminal, "recompute finished");
      let _ = tx.send(terminal);
    });

    JobHandle {
      job_id,
      status: rx,
      cancel,
    }
  }

  async fn run_recompute(
    &self,
    scope: Scope,
    strategy: RollupStrategy,
    cancel: &CancellationToken,
    progress: Option<&watch::Sender<JobStatus>>,
  ) -> Result<JobStatus, EngineError<S::Err>> {
    let store = self.store();
    let revision = store.revision().await.map_err(EngineError::Store)?;

    // Offering scopes hold CLOs; program scopes hold PLOs and PEOs.
    let outcomes = match scope {
      Scope::Offering(id) => store.list_outcomes(id, Some(Tier::Clo)).await,
      Scope::Program(id) => store.list_outcomes(id, None).await,
    }
    .map_err(EngineError::Store)?;

    let computed_at = Utc::now();
    let cohort = AttainmentSubject::Cohort(scope.id());
    let total = outcomes.len();
    let mut results = Vec::new();

    for (done, outcome) in outcomes.iter().enumerate() {
      if cancel.is_cancelled() {
        return Ok(JobStatus::Cancelled);
      }

      let thresholds = store
        .threshold_for(outcome.outcome_id)
        .await
        .map_err(EngineError::Store)?
        .unwrap_or_default();

      match outcome.tier {
        Tier::Clo => {
          // One evidence snapshot serves the cohort row and every
          // per-student row.
          let evidence =
            self.clo_evidence(cohort, outcome.outcome_id).await?;

          let (attainment, counts) =
            cohort_clo_attainment(&evidence, strategy);
          results.push(result_row(
            cohort, outcome, attainment, counts, &thresholds, computed_at,
          ));

          for student in evidence.students() {
            let (attainment, counts) =
              student_clo_attainment(&evidence, student);
            results.push(result_row(
              AttainmentSubject::Student(student),
              outcome,
              attainment,
              counts,
              &thresholds,
              computed_at,
            ));
          }
        }
        Tier::Plo | Tier::Peo => {
          let (attainment, counts) =
            self.compute(cohort, outcome, strategy).await?;
          results.push(result_row(
            cohort, outcome, attainment, counts, &thresholds, computed_at,
          ));
        }
      }

      if let Some(tx) = progress {
        let _ = tx.send(JobStatus::Running {
          completed: done + 1,
          total,
        });
      }
    }

    if cancel.is_cancelled() {
      return Ok(JobStatus::Cancelled);
    }

    match store
      .publish_results(scope, revision, results)
      .await
      .map_err(EngineError::Store)?
    {
      PublishOutcome::Written(written) => Ok(JobStatus::Completed { written }),
      PublishOutcome::Stale => Ok(JobStatus::Stale),
    }
  }
}

fn result_row(
  subject: AttainmentSubject,
  outcome: &Outcome,
  attainment: Attainment,
  supporting: SupportingCounts,
  thresholds: &ThresholdConfig,
  computed_at: DateTime<Utc>,
) -> AttainmentResult {
  AttainmentResult {
    subject,
    outcome_id: outcome.outcome_id,
    attainment,
    level: classify(attainment, thresholds),
    supporting,
    computed_at,
  }
}
