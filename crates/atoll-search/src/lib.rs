//! atoll-search — coupled multi-population evolutionary engine.
//!
//! Two cooperating island kinds evolve in parallel: expression islands
//! search the space of formulas, predictor islands search for small
//! training-point subsets that rank expressions as the full data would.
//! A coordinator merges reports, holds the global Pareto front on held-out
//! test error, publishes per-point error statistics to the predictor
//! islands and selected subsets back to the expression islands.
//!
//! All islands are OS threads; every exchange rides a bounded channel.
//! Published snapshots (subsets, point statistics) are immutable `Arc`s.

pub mod comm;
pub mod config;
pub mod coordinator;
pub mod eqn_isle;
pub mod error;
pub mod fitness;
pub mod logs;
pub mod problem;
pub mod select;
pub mod sset_isle;

pub use comm::Command;
pub use config::SearchConfig;
pub use coordinator::Coordinator;
pub use error::SearchError;
pub use problem::{ExprReport, PntStats, PntSubset, Problem, ReportVec, SearchKind, SubsetMem};
pub use select::{ReportQueue, SortKind};
