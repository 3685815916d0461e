//! JSON REST API for Attain.
//!
//! Exposes an axum [`Router`] backed by any store the engine can drive.
//! Auth, TLS, and transport concerns are the caller's responsibility.
//!
//! # Mounting
//!
//! ```rust,ignore
//! .nest("/api", attain_api::api_router(aggregator))
//! ```

pub mod attainment;
pub mod error;
pub mod items;
pub mod mappings;
pub mod outcomes;
pub mod recompute;
pub mod scores;
pub mod summary;

use std::{collections::HashMap, sync::Arc};

use attain_core::store::ScoreSink;
use attain_engine::{Aggregator, EngineStore, JobHandle};
use axum::{
  Router,
  routing::{get, post},
};
use tokio::sync::Mutex;
use uuid::Uuid;

pub use error::ApiError;

/// Store capabilities the API needs: everything the engine consumes plus
/// score ingest, sharing one error type.
pub trait ApiStore:
  EngineStore
  + ScoreSink<Error = <Self as EngineStore>::Err>
  + Clone
  + 'static
{
}

impl<T> ApiStore for T where
  T: EngineStore
    + ScoreSink<Error = <T as EngineStore>::Err>
    + Clone
    + 'static
{
}

/// Shared state threaded through all handlers: the aggregator (which owns
/// the store handle) and the registry of spawned recompute jobs.
#[derive(Clone)]
pub struct ApiState<S> {
  pub aggregator: Aggregator<S>,
  pub jobs:       Arc<Mutex<HashMap<Uuid, JobHandle>>>,
}

/// Build a fully-materialised API router for `aggregator`.
///
/// The returned `Router<()>` can be nested into any parent router regardless
/// of its own state type.
pub fn api_router<S: ApiStore>(aggregator: Aggregator<S>) -> Router<()> {
  let state = ApiState {
    aggregator,
    jobs: Arc::new(Mutex::new(HashMap::new())),
  };

  Router::new()
    // Outcomes and the mapping hierarchy
    .route("/outcomes", get(outcomes::list::<S>).post(outcomes::create::<S>))
    .route(
      "/outcomes/{id}",
      get(outcomes::get_one::<S>).delete(outcomes::delete_one::<S>),
    )
    .route("/outcomes/{id}/children", get(outcomes::children::<S>))
    .route("/outcomes/{id}/parents", get(outcomes::parents::<S>))
    .route(
      "/outcomes/{id}/threshold",
      get(outcomes::get_threshold::<S>).put(outcomes::set_threshold::<S>),
    )
    .route("/mappings", post(mappings::set::<S>))
    // Assessment items and the allocation ledger
    .route("/items", get(items::list::<S>).post(items::create::<S>))
    .route("/items/{id}", get(items::get_one::<S>))
    .route(
      "/items/{id}/allocations",
      get(items::get_allocations::<S>).put(items::set_allocations::<S>),
    )
    // Score ingestion
    .route("/scores", post(scores::ingest::<S>))
    // Attainment
    .route("/attainment", get(attainment::get_one::<S>))
    .route("/attainment/override", post(attainment::override_one::<S>))
    // Dashboard summaries
    .route("/summary", get(summary::chart::<S>))
    .route("/summary/trend", get(summary::trend::<S>))
    .route("/summary/breakdown", get(summary::breakdown::<S>))
    // Batch recompute jobs
    .route("/recompute", post(recompute::start::<S>))
    .route("/recompute/{id}", get(recompute::status::<S>))
    .route("/recompute/{id}/cancel", post(recompute::cancel::<S>))
    .with_state(state)
}

// ─── Integration tests ────────────────────────────────────────────────────────
