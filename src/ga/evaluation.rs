//! Fitness evaluation, sequential or on a worker pool.
//!
//! Each individual is evaluated by an independent job that owns a copy of its
//! genes and a shared handle to the (read-only) problem. Results travel back
//! over a channel tagged with the individual's position, so scheduling order
//! is free while result order is preserved.

use std::panic;
use std::sync::mpsc;
use std::sync::Arc;

use log::warn;
use threadpool::ThreadPool;

use super::{GaProblem, Individual};

/// Evaluates populations, in parallel when a worker pool is available.
pub struct Evaluator {
    pool: Option<ThreadPool>,
}

impl Evaluator {
    /// Creates an evaluator with `workers` threads.
    ///
    /// One worker (or zero) means sequential evaluation. If the pool cannot
    /// be created the evaluator silently runs sequentially.
    pub fn new(workers: usize) -> Self {
        let pool = if workers > 1 {
            match panic::catch_unwind(|| ThreadPool::new(workers)) {
                Ok(pool) => Some(pool),
                Err(_) => {
                    warn!("failed to start {workers} evaluation workers, evaluating sequentially");
                    None
                }
            }
        } else {
            None
        };
        Self { pool }
    }

    /// Sequential evaluator.
    pub fn sequential() -> Self {
        Self { pool: None }
    }

    /// Whether evaluations run on a worker pool.
    pub fn is_parallel(&self) -> bool {
        self.pool.is_some()
    }

    /// Evaluates every individual without a cached fitness.
    pub fn evaluate_all<P>(&self, problem: &Arc<P>, population: &mut [Individual])
    where
        P: GaProblem + 'static,
    {
        let pending: Vec<usize> = population
            .iter()
            .enumerate()
            .filter(|(_, ind)| !ind.is_evaluated())
            .map(|(i, _)| i)
            .collect();

        let pool = match &self.pool {
            Some(pool) if pending.len() > 1 => pool,
            _ => {
                for i in pending {
                    let fitness = sanitize(problem.evaluate(&population[i]));
                    population[i].set_fitness(fitness);
                }
                return;
            }
        };

        let (tx, rx) = mpsc::channel();
        for &i in &pending {
            let tx = tx.clone();
            let problem = Arc::clone(problem);
            let individual = population[i].without_fitness();
            pool.execute(move || {
                let fitness = problem.evaluate(&individual);
                // The receiver outlives every job.
                let _ = tx.send((i, fitness));
            });
        }
        drop(tx);

        for (i, fitness) in rx.iter() {
            population[i].set_fitness(sanitize(fitness));
        }

        // A panicking job drops its sender without a result.
        let lost: Vec<usize> = pending
            .into_iter()
            .filter(|&i| !population[i].is_evaluated())
            .collect();
        if !lost.is_empty() {
            warn!(
                "{} evaluations lost on worker pool, re-evaluating sequentially",
                lost.len()
            );
            for i in lost {
                let fitness = sanitize(problem.evaluate(&population[i]));
                population[i].set_fitness(fitness);
            }
        }
    }
}

/// Maps non-finite objective values (NaN, either infinity) to `f64::INFINITY`.
pub fn sanitize(mut fitness: Vec<f64>) -> Vec<f64> {
    for v in &mut fitness {
        if !v.is_finite() {
            *v = f64::INFINITY;
        }
    }
    fitness
}
