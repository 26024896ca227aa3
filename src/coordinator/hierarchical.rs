//! Iterative cooperation between cluster optimizers.
//!
//! # Algorithm
//!
//! 1. Build one [`ClusterView`] per cluster and the round-zero
//!    [`ExternalEstimate`]s (from the parent decision when given).
//! 2. Run every cluster's optimizer on its local problem, on a worker pool
//!    when `pool_size > 1`. The round ends when every cluster has answered.
//! 3. Exchange results: each cluster learns the others' instance counts,
//!    the net load they send into it, and how much spare capacity their
//!    instances have left. Repeat from 2 for `max_iteration` more rounds.
//! 4. Assemble the last local solutions into one global decision and repair
//!    it against the global capacities.

use std::panic;
use std::sync::mpsc;

use log::{info, warn};
use threadpool::ThreadPool;

use crate::config::OptimizerConfig;
use crate::error::OptimizerError;
use crate::models::{Environment, Solution, SystemState};
use crate::objectives::{default_objectives, Objective};
use crate::optimizer::{GaOptimizer, Optimizer};
use crate::validation::validate_input;

use super::{assemble, ClusterPartition, ClusterView, ExternalEstimate, ParentDecision};

/// Hierarchical optimizer: one [`GaOptimizer`] per cluster.
///
/// Cluster optimizers keep their warm-start populations across rounds and
/// across calls. Cluster `k` is seeded with `seed + k` when a seed is set.
pub struct HierarchicalCoordinator {
    config: OptimizerConfig,
    objectives: Vec<Objective>,
    partition: ClusterPartition,
    optimizers: Vec<GaOptimizer>,
    history: Vec<Vec<ExternalEstimate>>,
}

impl HierarchicalCoordinator {
    /// Creates a coordinator over `partition`.
    pub fn new(config: OptimizerConfig, objectives: Vec<Objective>, partition: ClusterPartition) -> Self {
        let mut coordinator = Self {
            config,
            objectives,
            partition,
            optimizers: Vec::new(),
            history: Vec::new(),
        };
        coordinator.optimizers = (0..coordinator.partition.nb_clusters())
            .map(|k| coordinator.cluster_optimizer(k))
            .collect();
        coordinator
    }

    /// Creates a coordinator minimizing the default objectives.
    pub fn with_default_objectives(config: OptimizerConfig, partition: ClusterPartition) -> Self {
        Self::new(config, default_objectives(), partition)
    }

    /// Configuration.
    pub fn config(&self) -> &OptimizerConfig {
        &self.config
    }

    /// Cluster partition.
    pub fn partition(&self) -> &ClusterPartition {
        &self.partition
    }

    /// Estimates used by each cluster, per round of the last call.
    pub fn history(&self) -> &[Vec<ExternalEstimate>] {
        &self.history
    }

    /// Whether clusters are optimized concurrently.
    pub fn is_parallel(&self) -> bool {
        self.config.pool_size > 1 && self.partition.nb_clusters() > 1
    }

    /// Configuration of cluster `k`'s optimizer.
    ///
    /// Clusters running concurrently evaluate sequentially themselves.
    pub fn cluster_config(&self, k: usize) -> OptimizerConfig {
        let mut config = self.config.clone();
        if self.is_parallel() {
            config = config.with_pool_size(1);
        }
        if let Some(seed) = self.config.seed {
            config = config.with_seed(seed.wrapping_add(k as u64));
        }
        config
    }

    fn cluster_optimizer(&self, k: usize) -> GaOptimizer {
        GaOptimizer::new(self.cluster_config(k), self.objectives.clone())
    }

    /// Optimizes the next decision, bounded by an optional parent decision.
    pub fn solve_with_parent(
        &mut self,
        system: &SystemState,
        env: &Environment,
        parent: Option<&ParentDecision>,
    ) -> Result<Solution, OptimizerError> {
        self.config.validate()?;
        if self.objectives.is_empty() {
            return Err(OptimizerError::NoObjectives);
        }
        validate_input(system, env).map_err(OptimizerError::InvalidInput)?;

        let scenario = &system.scenario;
        if !self.partition.matches(scenario) {
            return Err(OptimizerError::Partition(
                "partition does not cover the scenario's nodes".into(),
            ));
        }
        let nb_apps = scenario.nb_apps();
        let nb_clusters = self.partition.nb_clusters();
        if let Some(parent) = parent {
            if parent.nb_apps() != nb_apps || parent.nb_clusters() != nb_clusters {
                return Err(OptimizerError::Partition(format!(
                    "parent decision is {}x{}, expected {nb_apps}x{nb_clusters}",
                    parent.nb_apps(),
                    parent.nb_clusters()
                )));
            }
        }

        let views: Vec<ClusterView> = (0..nb_clusters)
            .map(|k| ClusterView::new(scenario, &self.partition, k, parent))
            .collect();
        let mut estimates = vec![ExternalEstimate::initial(nb_apps, nb_clusters, parent); nb_clusters];
        let pool = self.worker_pool();

        self.history.clear();
        let mut locals = Vec::new();
        for round in 0..=self.config.max_iteration {
            self.history.push(estimates.clone());
            let systems: Vec<SystemState> = views
                .iter()
                .zip(&estimates)
                .map(|(view, estimate)| view.system(system, estimate))
                .collect();
            let envs: Vec<Environment> = views
                .iter()
                .zip(&estimates)
                .map(|(view, estimate)| view.environment(env, estimate))
                .collect();

            locals = match &pool {
                Some(pool) => self.run_parallel(pool, &systems, &envs),
                None => self.run_sequential(&systems, &envs),
            };
            info!("round {round}: {nb_clusters} clusters solved");

            if round < self.config.max_iteration {
                estimates = exchange(&views, &envs, &locals, parent, nb_apps);
            }
        }

        let decoder = self.config.decoder(scenario);
        let solution = assemble(&decoder, system, env, &views, &locals);
        info!(
            "coordinated {nb_clusters} clusters over {} rounds",
            self.config.max_iteration + 1
        );
        Ok(solution)
    }

    fn worker_pool(&self) -> Option<ThreadPool> {
        if !self.is_parallel() {
            return None;
        }
        let workers = self.config.pool_size.min(self.partition.nb_clusters());
        match panic::catch_unwind(|| ThreadPool::new(workers)) {
            Ok(pool) => Some(pool),
            Err(_) => {
                warn!("failed to start {workers} cluster workers, optimizing sequentially");
                None
            }
        }
    }

    fn run_sequential(&mut self, systems: &[SystemState], envs: &[Environment]) -> Vec<Solution> {
        self.optimizers
            .iter_mut()
            .zip(systems.iter().zip(envs))
            .map(|(optimizer, (system, env))| optimizer.solve_or_fallback(system, env))
            .collect()
    }

    fn run_parallel(
        &mut self,
        pool: &ThreadPool,
        systems: &[SystemState],
        envs: &[Environment],
    ) -> Vec<Solution> {
        let (tx, rx) = mpsc::channel();
        for (k, optimizer) in std::mem::take(&mut self.optimizers).into_iter().enumerate() {
            let tx = tx.clone();
            let system = systems[k].clone();
            let env = envs[k].clone();
            pool.execute(move || {
                let mut optimizer = optimizer;
                let solution = optimizer.solve_or_fallback(&system, &env);
                // The receiver outlives every job.
                let _ = tx.send((k, optimizer, solution));
            });
        }
        drop(tx);

        let nb_clusters = systems.len();
        let mut optimizers: Vec<Option<GaOptimizer>> = (0..nb_clusters).map(|_| None).collect();
        let mut solutions: Vec<Option<Solution>> = vec![None; nb_clusters];
        for (k, optimizer, solution) in rx.iter() {
            optimizers[k] = Some(optimizer);
            solutions[k] = Some(solution);
        }

        // A panicking job drops its sender without a result.
        self.optimizers = optimizers
            .into_iter()
            .enumerate()
            .map(|(k, optimizer)| optimizer.unwrap_or_else(|| self.cluster_optimizer(k)))
            .collect();
        solutions
            .into_iter()
            .enumerate()
            .map(|(k, solution)| {
                solution.unwrap_or_else(|| {
                    warn!("cluster {k} lost on worker pool, falling back to the cloud");
                    Solution::all_cloud(&systems[k].scenario, &envs[k])
                })
            })
            .collect()
    }
}

impl Optimizer for HierarchicalCoordinator {
    fn solve(
        &mut self,
        system: &SystemState,
        env: &Environment,
    ) -> Result<Solution, OptimizerError> {
        self.solve_with_parent(system, env, None)
    }
}

/// Builds every cluster's estimates for the next round.
///
/// The ceiling toward cluster `j` is the spare capacity of `j`'s instances
/// (capped by the parent ceiling). The load `j` sends into `k` is the net
/// flow from `j` to `k`, bounded by the ceiling `j` now has toward `k`.
fn exchange(
    views: &[ClusterView],
    envs: &[Environment],
    locals: &[Solution],
    parent: Option<&ParentDecision>,
    nb_apps: usize,
) -> Vec<ExternalEstimate> {
    let nb_clusters = views.len();
    let sent = |from: usize, to: usize, a: usize| views[from].sent_load(&envs[from], &locals[from], a, to);

    let mut ceiling = ExternalEstimate::new(nb_apps, nb_clusters).ceiling;
    let mut instances = ExternalEstimate::new(nb_apps, nb_clusters).instances;
    for j in 0..nb_clusters {
        for a in 0..nb_apps {
            let cap = parent.map_or(f64::INFINITY, |p| p.ceiling(a, j));
            ceiling.set(a, j, views[j].spare_load(&locals[j], a).min(cap));
            instances.set(a, j, views[j].instance_count(&locals[j], a));
        }
    }

    (0..nb_clusters)
        .map(|k| {
            let mut estimate = ExternalEstimate::new(nb_apps, nb_clusters);
            estimate.instances = instances.clone();
            estimate.ceiling = ceiling.clone();
            for j in (0..nb_clusters).filter(|&j| j != k) {
                for a in 0..nb_apps {
                    let net = sent(j, k, a) - sent(k, j, a);
                    estimate.load.set(a, j, net.clamp(0.0, ceiling.at(a, k).max(0.0)));
                }
            }
            estimate
        })
        .collect()
}
