//! GA problem definition.
//!
//! The engine is generic over [`GaProblem`]: a problem fixes the chromosome
//! length, maps individuals to domain solutions, and scores them. Everything
//! evolutionary (selection, crossover, mutants) is handled by the engine.

use super::Individual;

/// A problem solvable by the random-key GA.
///
/// Fitness is a vector with one entry per objective; lower is better for
/// every objective. Implementations are shared read-only between worker
/// threads, so `evaluate` must not rely on interior mutability that
/// another evaluation could observe.
pub trait GaProblem: Send + Sync {
    /// Domain solution produced by decoding.
    type Solution;

    /// Chromosome length (fixed per problem instance).
    fn nb_genes(&self) -> usize;

    /// Decodes an individual into a domain solution.
    fn decode(&self, individual: &Individual) -> Self::Solution;

    /// Computes the fitness vector of an individual.
    fn evaluate(&self, individual: &Individual) -> Vec<f64>;

    /// Heuristic seeds for the first generation. Default: none.
    fn first_population(&self) -> Vec<Individual> {
        Vec::new()
    }

    /// Problem-specific early exit, checked after each generation. Default: never.
    fn should_stop(&self, _population: &[Individual]) -> bool {
        false
    }
}
