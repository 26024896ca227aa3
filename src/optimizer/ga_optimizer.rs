//! Genetic placement optimizer.
//!
//! # Algorithm
//!
//! 1. Validate the snapshot and environment.
//! 2. Run the BRKGA engine with NSGA-II ranking over a [`PlacementProblem`]
//!    (MGBM adaptive stop when a threshold is configured). The final
//!    population of the previous run seeds the first generation.
//! 3. Decode the first-front individual with the lexicographically smallest
//!    fitness vector.

use std::sync::Arc;
use std::time::Duration;

use log::{info, warn};

use crate::config::OptimizerConfig;
use crate::error::OptimizerError;
use crate::ga::{Brkga, GaProblem, Individual, StopReason};
use crate::models::{Environment, Solution, SystemState};
use crate::objectives::{default_objectives, Objective};
use crate::validation::validate_input;

use super::PlacementProblem;

/// Computes a placement decision for one snapshot.
pub trait Optimizer: Send {
    /// Optimizes the next decision.
    fn solve(&mut self, system: &SystemState, env: &Environment)
        -> Result<Solution, OptimizerError>;

    /// Like [`solve`](Optimizer::solve), but substitutes the all-cloud
    /// decision on error.
    fn solve_or_fallback(&mut self, system: &SystemState, env: &Environment) -> Solution {
        match self.solve(system, env) {
            Ok(solution) => solution,
            Err(e) => {
                warn!("optimizer failed ({e}), falling back to the cloud");
                Solution::all_cloud(&system.scenario, env)
            }
        }
    }
}

/// Summary of the last optimizer run.
#[derive(Debug, Clone, PartialEq)]
pub struct RunSummary {
    /// Objective values of the returned solution.
    pub fitness: Vec<f64>,
    /// Size of the final first front.
    pub front_size: usize,
    /// Generations evolved.
    pub generations: usize,
    /// Why the engine stopped.
    pub stop_reason: StopReason,
    /// Wall-clock duration.
    pub elapsed: Duration,
}

/// BRKGA / NSGA-II placement optimizer.
///
/// Keeps the final population of its last run to warm-start the next one.
///
/// # Example
/// ```no_run
/// use std::sync::Arc;
/// use u_placement::config::OptimizerConfig;
/// use u_placement::models::{Application, Environment, Node, Resource, ScalarFn, Scenario, SystemState};
/// use u_placement::optimizer::{GaOptimizer, Optimizer};
///
/// let scenario = Scenario::new(
///     vec![Resource::cpu()],
///     vec![Application::new("A").with_demand(0, ScalarFn::linear(2.0, 0.0))],
///     vec![Node::cloud("cloud", 1), Node::new("edge").with_capacity(0, 8.0)],
/// );
/// let system = SystemState::new(Arc::new(scenario));
/// let env = Environment::new(1, 2).with_load(0, 1, 6.0);
///
/// let mut optimizer = GaOptimizer::with_default_objectives(OptimizerConfig::default());
/// let solution = optimizer.solve(&system, &env).unwrap();
/// assert!((solution.distribution_sum(0, 1) - 1.0).abs() < 1e-5);
/// ```
pub struct GaOptimizer {
    config: OptimizerConfig,
    objectives: Vec<Objective>,
    warm_start: Vec<Individual>,
    last_run: Option<RunSummary>,
}

impl GaOptimizer {
    /// Creates an optimizer.
    pub fn new(config: OptimizerConfig, objectives: Vec<Objective>) -> Self {
        Self {
            config,
            objectives,
            warm_start: Vec::new(),
            last_run: None,
        }
    }

    /// Creates an optimizer minimizing [`default_objectives`].
    pub fn with_default_objectives(config: OptimizerConfig) -> Self {
        Self::new(config, default_objectives())
    }

    /// Configuration.
    pub fn config(&self) -> &OptimizerConfig {
        &self.config
    }

    /// Objectives, in fitness order.
    pub fn objectives(&self) -> &[Objective] {
        &self.objectives
    }

    /// Individuals kept for the next run.
    pub fn warm_start(&self) -> &[Individual] {
        &self.warm_start
    }

    /// Summary of the last successful run.
    pub fn last_run(&self) -> Option<&RunSummary> {
        self.last_run.as_ref()
    }

    /// Forgets the warm-start population.
    pub fn reset(&mut self) {
        self.warm_start.clear();
        self.last_run = None;
    }
}

impl Optimizer for GaOptimizer {
    fn solve(
        &mut self,
        system: &SystemState,
        env: &Environment,
    ) -> Result<Solution, OptimizerError> {
        self.config.validate()?;
        if self.objectives.is_empty() {
            return Err(OptimizerError::NoObjectives);
        }
        validate_input(system, env).map_err(OptimizerError::InvalidInput)?;

        let scenario = &system.scenario;
        let problem = Arc::new(PlacementProblem::new(
            Arc::new(system.clone()),
            Arc::new(env.clone()),
            self.objectives.clone(),
            self.config.decoder(scenario),
        ));

        let ga_config = self.config.ga_config();
        let population_size = ga_config.population_size;
        let seeds = std::mem::take(&mut self.warm_start);
        let result = Brkga::new(Arc::clone(&problem), ga_config)
            .with_ranking(self.config.ranking())
            .with_seeds(seeds)
            .run();

        let best = result.best().ok_or(OptimizerError::EmptyPopulation)?;
        let solution = problem.decode(best);
        let summary = RunSummary {
            fitness: best.fitness().map(<[f64]>::to_vec).unwrap_or_default(),
            front_size: result.front().len(),
            generations: result.generations,
            stop_reason: result.stop_reason,
            elapsed: result.elapsed,
        };
        info!(
            "optimized {} apps on {} nodes: fitness {:?}, front {}, {} generations ({:?})",
            scenario.nb_apps(),
            scenario.nb_nodes(),
            summary.fitness,
            summary.front_size,
            summary.generations,
            summary.stop_reason
        );

        // The whole ranked population seeds the next run.
        self.warm_start = result
            .population
            .iter()
            .take(population_size)
            .map(Individual::without_fitness)
            .collect();
        self.last_run = Some(summary);
        Ok(solution)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Application, Node, Resource, ScalarFn, Scenario};
    use crate::validation::ValidationErrorKind;

    fn setup() -> (SystemState, Environment) {
        let scenario = Scenario::new(
            vec![Resource::cpu(), Resource::ram()],
            vec![
                Application::new("web")
                    .with_deadline(0.6)
                    .with_work(0.2)
                    .with_request_rate(1.0)
                    .with_demand(0, ScalarFn::linear(0.5, 0.1))
                    .with_demand(1, ScalarFn::Constant(1.0)),
                Application::new("api")
                    .with_deadline(1.0)
                    .with_work(0.4)
                    .with_request_rate(1.0)
                    .with_instances(1, 2)
                    .with_demand(0, ScalarFn::linear(0.8, 0.2))
                    .with_demand(1, ScalarFn::Constant(2.0)),
            ],
            vec![
                Node::cloud("cloud", 2).with_cost(0, ScalarFn::linear(4.0, 0.0)),
                Node::new("e1")
                    .with_capacity(0, 4.0)
                    .with_capacity(1, 4.0)
                    .with_cost(0, ScalarFn::linear(1.0, 0.0)),
                Node::new("e2")
                    .with_capacity(0, 3.0)
                    .with_capacity(1, 4.0)
                    .with_cost(0, ScalarFn::linear(1.0, 0.0)),
            ],
        );
        let env = Environment::new(2, 3)
            .with_load(0, 1, 3.0)
            .with_load(0, 2, 2.0)
            .with_load(1, 1, 2.0)
            .with_symmetric_delay(0, 1, 0.5)
            .with_symmetric_delay(0, 2, 0.5)
            .with_symmetric_delay(1, 2, 0.05);
        (SystemState::new(Arc::new(scenario)), env)
    }

    fn config() -> OptimizerConfig {
        OptimizerConfig::default()
            .with_population_size(30)
            .with_generations(15)
            .with_seed(42)
    }

    #[test]
    fn test_solution_is_valid() {
        let (system, env) = setup();
        let mut optimizer = GaOptimizer::with_default_objectives(config());
        let solution = optimizer.solve(&system, &env).unwrap();
        assert!(solution.check_invariants(&system.scenario, &env).is_empty());

        let summary = optimizer.last_run().unwrap();
        assert_eq!(summary.fitness.len(), 4);
        assert!(summary.front_size >= 1);
        assert_eq!(optimizer.warm_start().len(), 30);
    }

    #[test]
    fn test_same_seed_same_solution() {
        let (system, env) = setup();
        let a = GaOptimizer::with_default_objectives(config())
            .solve(&system, &env)
            .unwrap();
        let b = GaOptimizer::with_default_objectives(config().with_pool_size(4))
            .solve(&system, &env)
            .unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_no_objectives() {
        let (system, env) = setup();
        let mut optimizer = GaOptimizer::new(config(), Vec::new());
        assert!(matches!(
            optimizer.solve(&system, &env),
            Err(OptimizerError::NoObjectives)
        ));
    }

    #[test]
    fn test_invalid_input_falls_back() {
        let (system, _) = setup();
        let env = Environment::new(2, 3).with_load(0, 1, -1.0);
        let mut optimizer = GaOptimizer::with_default_objectives(config());
        match optimizer.solve(&system, &env) {
            Err(OptimizerError::InvalidInput(errors)) => {
                assert!(errors
                    .iter()
                    .any(|e| e.kind == ValidationErrorKind::InvalidValue));
            }
            other => panic!("unexpected result: {other:?}"),
        }
        let fallback = optimizer.solve_or_fallback(&system, &env);
        assert_eq!(fallback, Solution::all_cloud(&system.scenario, &env));
    }

    #[test]
    fn test_single_objective() {
        let (system, env) = setup();
        let mut optimizer = GaOptimizer::new(config(), vec![Objective::cost()]);
        let solution = optimizer.solve(&system, &env).unwrap();
        let cost = crate::objectives::cost(&system, &solution, &env);
        let cloud = crate::objectives::cost(
            &system,
            &Solution::all_cloud(&system.scenario, &env),
            &env,
        );
        assert!(cost <= cloud);
    }

    #[test]
    fn test_warm_start_reused() {
        let (system, env) = setup();
        let mut optimizer = GaOptimizer::with_default_objectives(config());
        optimizer.solve(&system, &env).unwrap();
        let seeds = optimizer.warm_start().to_vec();
        assert!(seeds.iter().all(|s| !s.is_evaluated()));

        let solution = optimizer.solve(&system, &env).unwrap();
        assert!(solution.check_invariants(&system.scenario, &env).is_empty());
        assert_eq!(optimizer.warm_start().len(), seeds.len());

        optimizer.reset();
        assert!(optimizer.warm_start().is_empty());
    }
}
