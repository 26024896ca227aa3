//! BRKGA engine.
//!
//! # Algorithm
//!
//! 1. First generation: problem heuristics + warm-start seeds, padded with
//!    random individuals; evaluate and rank.
//! 2. Each generation keeps the elites unchanged, adds fresh mutants, and
//!    fills the rest with biased crossover of one elite and one non-elite
//!    parent; evaluate (elites reuse their cached fitness), rank, truncate.
//! 3. Stop after `nb_generations`, when the timeout elapses (checked before
//!    each generation), or when the problem or the ranking asks to stop.
//!
//! Ranking is pluggable: [`ScalarRanking`] gives the classic BRKGA,
//! [`Nsga2Ranking`](super::Nsga2Ranking) the multi-objective variant.
//!
//! # Reference
//! Gonçalves & Resende (2011), "Biased random-key genetic algorithms for
//! combinatorial optimization"

use std::sync::Arc;
use std::time::{Duration, Instant};

use log::{debug, warn};
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

use super::evaluation::Evaluator;
use super::nsga::{Ranking, ScalarRanking};
use super::operators::{biased_crossover, mutants};
use super::{GaProblem, Individual};

/// Engine parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct GaConfig {
    /// Individuals per generation.
    pub population_size: usize,
    /// Maximum number of generations after the first.
    pub nb_generations: usize,
    /// Share of the population copied unchanged.
    pub elite_proportion: f64,
    /// Share of the population replaced by random individuals.
    pub mutant_proportion: f64,
    /// Probability of inheriting the elite parent's key.
    pub elite_probability: f64,
    /// Wall-clock budget.
    pub timeout: Option<Duration>,
    /// Evaluation worker threads (≤ 1 = sequential).
    pub workers: usize,
    /// RNG seed (OS entropy when `None`).
    pub seed: Option<u64>,
    /// Whether to include the problem's heuristic seeds.
    pub use_heuristic: bool,
}

impl Default for GaConfig {
    fn default() -> Self {
        Self {
            population_size: 100,
            nb_generations: 100,
            elite_proportion: 0.2,
            mutant_proportion: 0.1,
            elite_probability: 0.6,
            timeout: None,
            workers: 1,
            seed: None,
            use_heuristic: true,
        }
    }
}

impl GaConfig {
    /// Sets the population size.
    pub fn with_population_size(mut self, size: usize) -> Self {
        self.population_size = size;
        self
    }

    /// Sets the generation budget.
    pub fn with_generations(mut self, generations: usize) -> Self {
        self.nb_generations = generations;
        self
    }

    /// Sets the elite and mutant proportions.
    pub fn with_proportions(mut self, elite: f64, mutant: f64) -> Self {
        self.elite_proportion = elite.clamp(0.0, 1.0);
        self.mutant_proportion = mutant.clamp(0.0, 1.0);
        self
    }

    /// Sets the elite inheritance probability.
    pub fn with_elite_probability(mut self, probability: f64) -> Self {
        self.elite_probability = probability.clamp(0.0, 1.0);
        self
    }

    /// Sets the wall-clock budget.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Sets the number of evaluation workers.
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    /// Sets the RNG seed.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Enables or disables heuristic seeding.
    pub fn with_heuristic(mut self, enabled: bool) -> Self {
        self.use_heuristic = enabled;
        self
    }

    /// Number of elites for the configured population.
    pub fn elite_count(&self) -> usize {
        let n = self.population_size;
        if n == 0 {
            return 0;
        }
        ((self.elite_proportion * n as f64).round() as usize).clamp(1, n)
    }

    /// Number of mutants for the configured population.
    pub fn mutant_count(&self) -> usize {
        let n = self.population_size;
        ((self.mutant_proportion * n as f64).round() as usize).min(n - self.elite_count())
    }
}

/// Why a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// The generation budget was used up.
    Generations,
    /// The wall-clock budget elapsed.
    Timeout,
    /// The problem's own stop condition fired.
    ProblemStop,
    /// The ranking's adaptive criterion detected stagnation.
    Stagnation,
}

/// Outcome of a run.
#[derive(Debug, Clone)]
pub struct GaResult {
    /// Final population, best first.
    pub population: Vec<Individual>,
    /// Pareto rank of each individual of `population`.
    pub ranks: Vec<usize>,
    /// Generations evolved after the first.
    pub generations: usize,
    /// Wall-clock duration.
    pub elapsed: Duration,
    /// Why the run ended.
    pub stop_reason: StopReason,
}

impl GaResult {
    /// Individuals of the first front.
    pub fn front(&self) -> Vec<&Individual> {
        self.population
            .iter()
            .zip(&self.ranks)
            .filter(|(_, &r)| r == 0)
            .map(|(ind, _)| ind)
            .collect()
    }

    /// The first-front individual with the lexicographically smallest fitness.
    pub fn best(&self) -> Option<&Individual> {
        self.front().into_iter().min_by(|a, b| {
            let fa = a.fitness().unwrap_or(&[]);
            let fb = b.fitness().unwrap_or(&[]);
            fa.iter()
                .zip(fb)
                .map(|(x, y)| x.total_cmp(y))
                .find(|o| o.is_ne())
                .unwrap_or(std::cmp::Ordering::Equal)
        })
    }
}

/// The genetic algorithm engine.
///
/// # Example
/// ```
/// use std::sync::Arc;
/// use u_placement::ga::{Brkga, GaConfig, GaProblem, Individual};
///
/// struct Sphere;
/// impl GaProblem for Sphere {
///     type Solution = f64;
///     fn nb_genes(&self) -> usize { 3 }
///     fn decode(&self, ind: &Individual) -> f64 {
///         ind.genes().iter().map(|g| (g - 0.5).powi(2)).sum()
///     }
///     fn evaluate(&self, ind: &Individual) -> Vec<f64> { vec![self.decode(ind)] }
/// }
///
/// let config = GaConfig::default()
///     .with_population_size(20)
///     .with_generations(10)
///     .with_seed(42);
/// let result = Brkga::new(Arc::new(Sphere), config).run();
/// assert!(result.best().is_some());
/// ```
pub struct Brkga<P: GaProblem + 'static> {
    problem: Arc<P>,
    config: GaConfig,
    ranking: Box<dyn Ranking>,
    evaluator: Evaluator,
    rng: SmallRng,
    seeds: Vec<Individual>,
    population: Vec<Individual>,
    ranks: Vec<usize>,
    generation: usize,
}

impl<P: GaProblem + 'static> Brkga<P> {
    /// Creates an engine with single-objective ranking.
    pub fn new(problem: Arc<P>, config: GaConfig) -> Self {
        let rng = match config.seed {
            Some(seed) => SmallRng::seed_from_u64(seed),
            None => SmallRng::from_os_rng(),
        };
        let evaluator = Evaluator::new(config.workers);
        Self {
            problem,
            config,
            ranking: Box::new(ScalarRanking),
            evaluator,
            rng,
            seeds: Vec::new(),
            population: Vec::new(),
            ranks: Vec::new(),
            generation: 0,
        }
    }

    /// Replaces the ranking strategy.
    pub fn with_ranking<R: Ranking + 'static>(mut self, ranking: R) -> Self {
        self.ranking = Box::new(ranking);
        self
    }

    /// Adds warm-start individuals to the first generation.
    ///
    /// Longer chromosomes are truncated, shorter ones are rejected.
    pub fn with_seeds(mut self, seeds: Vec<Individual>) -> Self {
        let nb_genes = self.problem.nb_genes();
        let mut rejected = 0;
        for mut seed in seeds {
            if seed.len() < nb_genes {
                rejected += 1;
                continue;
            }
            if seed.len() > nb_genes {
                seed.resize(nb_genes);
            }
            self.seeds.push(seed);
        }
        if rejected > 0 {
            warn!("rejected {rejected} warm-start individuals shorter than {nb_genes} genes");
        }
        self
    }

    /// Current population, best first.
    pub fn population(&self) -> &[Individual] {
        &self.population
    }

    /// Generations evolved so far.
    pub fn generation(&self) -> usize {
        self.generation
    }

    /// Builds, evaluates and ranks the first generation.
    pub fn init(&mut self) {
        let size = self.config.population_size;
        let nb_genes = self.problem.nb_genes();

        // Heuristics go first so a full warm-start population cannot crowd them out.
        let mut population: Vec<Individual> = if self.config.use_heuristic {
            self.problem
                .first_population()
                .into_iter()
                .filter(|ind| ind.len() == nb_genes)
                .collect()
        } else {
            Vec::new()
        };
        population.append(&mut self.seeds);
        dedup(&mut population);
        population.truncate(size);
        let missing = size - population.len();
        population.extend(mutants(missing, nb_genes, &mut self.rng));

        self.population = population;
        self.generation = 0;
        self.classify();
    }

    /// Evolves one generation.
    pub fn step(&mut self) {
        let size = self.config.population_size;
        if self.population.is_empty() || size == 0 {
            return;
        }
        let nb_genes = self.problem.nb_genes();
        let nb_elites = self.config.elite_count().min(self.population.len());
        let nb_mutants = self.config.mutant_count();

        let mut next: Vec<Individual> = self.population[..nb_elites].to_vec();
        next.extend(mutants(nb_mutants, nb_genes, &mut self.rng));

        let non_elite_start = if nb_elites < self.population.len() {
            nb_elites
        } else {
            0
        };
        while next.len() < size {
            let elite = &self.population[self.rng.random_range(0..nb_elites)];
            let other =
                &self.population[self.rng.random_range(non_elite_start..self.population.len())];
            let (c1, c2) = biased_crossover(elite, other, self.config.elite_probability, &mut self.rng);
            next.push(c1);
            if next.len() < size {
                next.push(c2);
            }
        }

        self.population = next;
        self.generation += 1;
        self.classify();
    }

    /// Runs until a stop condition holds.
    pub fn run(mut self) -> GaResult {
        let start = Instant::now();
        self.init();

        let stop_reason = loop {
            if self.population.is_empty() {
                break StopReason::Generations;
            }
            if self.problem.should_stop(&self.population) {
                break StopReason::ProblemStop;
            }
            if self.ranking.should_stop(&self.population, &self.ranks) {
                break StopReason::Stagnation;
            }
            if self.generation >= self.config.nb_generations {
                break StopReason::Generations;
            }
            if let Some(timeout) = self.config.timeout {
                if start.elapsed() >= timeout {
                    break StopReason::Timeout;
                }
            }
            self.step();
        };

        debug!(
            "GA stopped after {} generations ({:?}) in {:.2?}",
            self.generation,
            stop_reason,
            start.elapsed()
        );

        GaResult {
            population: self.population,
            ranks: self.ranks,
            generations: self.generation,
            elapsed: start.elapsed(),
            stop_reason,
        }
    }

    fn classify(&mut self) {
        self.evaluator
            .evaluate_all(&self.problem, &mut self.population);
        let mut ranks = self.ranking.rank(&mut self.population);
        self.population.truncate(self.config.population_size);
        ranks.truncate(self.config.population_size);
        self.ranks = ranks;

        if log::log_enabled!(log::Level::Debug) {
            let front = self.ranks.iter().filter(|&&r| r == 0).count();
            let best = self.population.first().and_then(|i| i.fitness());
            debug!(
                "generation {}: front size {}, best fitness {:?}",
                self.generation, front, best
            );
        }
    }
}

/// Removes duplicate chromosomes, keeping the first occurrence.
fn dedup(population: &mut Vec<Individual>) {
    let mut unique: Vec<Individual> = Vec::with_capacity(population.len());
    for ind in population.drain(..) {
        if !unique.contains(&ind) {
            unique.push(ind);
        }
    }
    *population = unique;
}
