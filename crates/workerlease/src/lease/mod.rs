//! Leased worker-id pool.
//!
//! The pool holds a fixed set of [`WORKER_ID_END`] slots. A slot is held while its
//! `expire_at` lies in the future and free otherwise, so an abandoned lease is
//! reclaimed lazily by the next [`LeaseEngine::acquire`] scan.

mod clock;
mod engine;
mod record;

pub use clock::{Clock, ManualClock, SystemClock};
pub use engine::{EngineConfig, LeaseEngine};
pub use record::{LeaseRecord, WORKER_ID_END};

/// Errors returned by lease operations, local or remote.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LeaseError {
    #[error("no available id")]
    PoolExhausted,
    #[error("invalid or expired lease")]
    InvalidLease,
    #[error("transport error: {0}")]
    Transport(String),
}
