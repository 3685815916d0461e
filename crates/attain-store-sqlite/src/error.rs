//! Error type for `attain-store-sqlite`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  /// Domain validation failure (duplicate code, over-allocation, ...).
  /// Kept as the source so callers can walk the chain back to the core
  /// taxonomy.
  #[error("{0}")]
  Core(#[from] attain_core::Error),

  #[error("database error: {0}")]
  Database(#[from] tokio_rusqlite::Error),

  #[error("database error: {0}")]
  Sqlite(#[from] rusqlite::Error),

  #[error("uuid parse error: {0}")]
  Uuid(#[from] uuid::Error),

  #[error("date/time parse error: {0}")]
  DateParse(String),

  #[error("decimal parse error: {0}")]
  DecimalParse(String),

  #[error("unknown discriminant: {0}")]
  Decode(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
