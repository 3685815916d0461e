//! Attainment computation over an outcome store and a score source.
//!
//! Everything here is a function of persisted state: an aggregation reads a
//! bulk snapshot, computes, and either returns the result or stages it for
//! one atomic publish. Nothing is derived from previously computed results,
//! so recomputation with unchanged inputs is bit-identical.

pub mod aggregate;
pub mod classify;
pub mod error;
pub mod recompute;
pub mod summary;


use attain_core::store::{OutcomeStore, ScoreSource};

pub use aggregate::Aggregator;
pub use error::EngineError;
pub use recompute::{JobHandle, JobStatus};

/// Backends usable by the engine: hierarchy and allocation storage plus a
/// score source, sharing a single error type.
pub trait EngineStore:
  OutcomeStore<Error = <Self as EngineStore>::Err>
  + ScoreSource<Error = <Self as EngineStore>::Err>
{
  type Err: std::error::Error + Send + Sync + 'static;
}

impl<T, E> EngineStore for T
where
  E: std::error::Error + Send + Sync + 'static,
  T: OutcomeStore<Error = E> + ScoreSource<Error = E>,
{
  type Err = E;
}
