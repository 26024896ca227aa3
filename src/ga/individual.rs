//! Random-key individual.
//!
//! # Encoding
//!
//! A fixed-length vector of keys in `[0, 1)`. Gene positions carry stable
//! meaning defined by the problem's decoder; the GA itself never interprets
//! them.
//!
//! # Reference
//! Bean (1994), "Genetic Algorithms and Random Keys for Sequencing and Optimization"

use rand::Rng;
use serde::{Deserialize, Serialize};

/// Chromosome with an optional cached fitness vector.
///
/// Two individuals are equal when their genes are equal; the cache is
/// ignored. Any mutable access to the genes clears the cache.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Individual {
    genes: Vec<f64>,
    fitness: Option<Vec<f64>>,
}

impl Individual {
    /// Creates an unevaluated individual. Keys are clamped to `[0, 1]`.
    pub fn new(genes: Vec<f64>) -> Self {
        let genes = genes
            .into_iter()
            .map(|g| if g.is_nan() { 0.0 } else { g.clamp(0.0, 1.0) })
            .collect();
        Self {
            genes,
            fitness: None,
        }
    }

    /// Creates an individual with uniformly random keys.
    pub fn random<R: Rng>(nb_genes: usize, rng: &mut R) -> Self {
        Self {
            genes: (0..nb_genes).map(|_| rng.random::<f64>()).collect(),
            fitness: None,
        }
    }

    /// Creates an individual with every key set to `value`.
    pub fn filled(nb_genes: usize, value: f64) -> Self {
        Self::new(vec![value; nb_genes])
    }

    /// The keys.
    #[inline]
    pub fn genes(&self) -> &[f64] {
        &self.genes
    }

    /// Mutable keys; clears the cached fitness.
    pub fn genes_mut(&mut self) -> &mut [f64] {
        self.fitness = None;
        &mut self.genes
    }

    /// Chromosome length.
    #[inline]
    pub fn len(&self) -> usize {
        self.genes.len()
    }

    /// Whether the chromosome is empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.genes.is_empty()
    }

    /// Truncates or pads (with `0.5`) to `len` keys; clears the cached fitness.
    pub fn resize(&mut self, len: usize) {
        self.genes.resize(len, 0.5);
        self.fitness = None;
    }

    /// Cached fitness, if evaluated.
    #[inline]
    pub fn fitness(&self) -> Option<&[f64]> {
        self.fitness.as_deref()
    }

    /// Stores the fitness vector.
    pub fn set_fitness(&mut self, fitness: Vec<f64>) {
        self.fitness = Some(fitness);
    }

    /// Whether a fitness is cached.
    #[inline]
    pub fn is_evaluated(&self) -> bool {
        self.fitness.is_some()
    }

    /// Drops the cached fitness.
    pub fn invalidate(&mut self) {
        self.fitness = None;
    }

    /// A copy of the genes without the cache.
    pub fn without_fitness(&self) -> Self {
        Self {
            genes: self.genes.clone(),
            fitness: None,
        }
    }
}

impl PartialEq for Individual {
    fn eq(&self, other: &Self) -> bool {
        self.genes == other.genes
    }
}
