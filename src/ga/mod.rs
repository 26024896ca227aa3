//! Random-key genetic optimization.
//!
//! A generic BRKGA engine over any [`GaProblem`], with pluggable ranking:
//! single-objective ([`ScalarRanking`]) or NSGA-II ([`Nsga2Ranking`]) with
//! MGBM adaptive stopping. Fitness evaluation, the only parallel part, runs
//! on a worker pool.
//!
//! # Submodules
//!
//! - [`nsga`]: dominance relations, non-dominated sorting, crowding distance
//! - [`operators`]: biased crossover and mutant generation
//!
//! # Reference
//! - Gonçalves & Resende (2011), "Biased random-key genetic algorithms for
//!   combinatorial optimization"
//! - Deb et al. (2002), "A Fast and Elitist Multiobjective Genetic Algorithm: NSGA-II"

mod engine;
mod evaluation;
mod individual;
pub mod nsga;
pub mod operators;
mod problem;

pub use engine::{Brkga, GaConfig, GaResult, StopReason};
pub use evaluation::{sanitize, Evaluator};
pub use individual::Individual;
pub use nsga::{
    crowding_distance, fast_non_dominated_sort, pareto_dominates, Dominance, Mgbm,
    Nsga2Ranking, Ranking, ScalarRanking, MAX_CROWDING,
};
pub use problem::GaProblem;
