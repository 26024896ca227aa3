//! Placement as a GA problem.

use std::sync::Arc;

use crate::decoder::{heuristic_seeds, Decoder};
use crate::ga::{GaProblem, Individual};
use crate::models::{Environment, Solution, SystemState};
use crate::objectives::Objective;

/// GA problem over one immutable (snapshot, environment) pair.
///
/// Fitness is the vector of objective values of the decoded solution.
/// The problem is shared read-only between evaluation workers.
pub struct PlacementProblem {
    system: Arc<SystemState>,
    env: Arc<Environment>,
    objectives: Vec<Objective>,
    decoder: Decoder,
}

impl PlacementProblem {
    /// Creates the problem.
    pub fn new(
        system: Arc<SystemState>,
        env: Arc<Environment>,
        objectives: Vec<Objective>,
        decoder: Decoder,
    ) -> Self {
        Self {
            system,
            env,
            objectives,
            decoder,
        }
    }

    /// The snapshot being optimized.
    pub fn system(&self) -> &SystemState {
        &self.system
    }

    /// The environment being optimized for.
    pub fn environment(&self) -> &Environment {
        &self.env
    }

    /// Objective values of an already decoded solution.
    pub fn objective_values(&self, solution: &Solution) -> Vec<f64> {
        self.objectives
            .iter()
            .map(|o| o.evaluate(&self.system, solution, &self.env))
            .collect()
    }
}

impl GaProblem for PlacementProblem {
    type Solution = Solution;

    fn nb_genes(&self) -> usize {
        self.decoder.nb_genes()
    }

    fn decode(&self, individual: &Individual) -> Solution {
        self.decoder
            .decode(individual.genes(), &self.system, &self.env)
    }

    fn evaluate(&self, individual: &Individual) -> Vec<f64> {
        let solution = self.decode(individual);
        self.objective_values(&solution)
    }

    fn first_population(&self) -> Vec<Individual> {
        heuristic_seeds(&self.system.scenario, &self.env)
            .into_iter()
            .map(Individual::new)
            .collect()
    }
}
