//! workerlease: leased worker-id allocation for fleets of id-generating processes.
//!
//! A [`LeaseEngine`] owns the pool of ids 1..1024 (0 is reserved). Processes lease
//! an id, renew it periodically, and release it on exit; an id whose holder
//! disappears is reclaimed once its lease expires. The [`Runner`] binds one
//! command's lifetime to one lease, over any [`Generator`]: the engine itself,
//! or a remote server through [`HttpGenerator`].

pub mod client;
pub mod generator;
pub mod lease;
#[cfg(unix)]
pub mod runner;
pub mod transport;
mod version;

pub use client::HttpGenerator;
pub use generator::Generator;
pub use lease::{
    Clock, EngineConfig, LeaseEngine, LeaseError, LeaseRecord, ManualClock, SystemClock,
    WORKER_ID_END,
};
#[cfg(unix)]
pub use runner::{DEFAULT_PLACEHOLDER, Runner, RunnerConfig, RunnerError, substitute_args};
pub use version::WORKERLEASE_VERSION;
