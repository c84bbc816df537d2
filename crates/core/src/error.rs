use thiserror::Error;

/// Failures surfaced by a repository implementation.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    /// Reads could not be served at all (connection lost, pool closed).
    #[error("Store unavailable: {0}")]
    Unavailable(String),
    /// A single write was rejected.
    #[error("Write failed: {0}")]
    Persistence(String),
}
