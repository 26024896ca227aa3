//! Single-subsystem placement optimization.
//!
//! [`PlacementProblem`] adapts a snapshot, an environment and a list of
//! objectives to the GA engine; [`GaOptimizer`] drives the engine and
//! returns one decision per call.

mod ga_optimizer;
mod problem;

pub use ga_optimizer::{GaOptimizer, Optimizer, RunSummary};
pub use problem::PlacementProblem;
