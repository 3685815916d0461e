//! Error type for `attain-engine`.

use thiserror::Error;

/// An engine failure: a domain validation error, or an error surfaced by
/// the backing store implementation.
#[derive(Debug, Error)]
pub enum EngineError<E> {
  #[error("{0}")]
  Core(#[from] attain_core::Error),

  #[error("store error: {0}")]
  Store(#[source] E),
}
