//! Optimizer configuration.
//!
//! All parameters have defaults, so a configuration file only lists what it
//! overrides:
//!
//! ```yaml
//! population_size: 50
//! nb_generations: 200
//! dominance:
//!   kind: prioritized
//!   objective: 0
//! stop_threshold: 0.01
//! timeout: 2.5
//! pool_size: 4
//! ```

use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::decoder::{Decoder, DEFAULT_CHUNK_FRACTION, DEFAULT_MAX_CHUNKS};
use crate::error::ConfigError;
use crate::ga::{Dominance, GaConfig, Nsga2Ranking};
use crate::models::Scenario;

/// Dominance relation used by NSGA-II ranking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DominanceConfig {
    /// Plain Pareto dominance.
    #[default]
    Pareto,
    /// Strictly better on `objective` wins; ties fall back to Pareto.
    Prioritized {
        /// Index of the prioritized objective.
        objective: usize,
    },
}

impl DominanceConfig {
    /// Builds the relation.
    pub fn build(&self) -> Dominance {
        match *self {
            DominanceConfig::Pareto => Dominance::pareto(),
            DominanceConfig::Prioritized { objective } => Dominance::prioritized(objective),
        }
    }
}

/// Parameters of the optimizers and the coordinator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OptimizerConfig {
    /// Individuals per generation.
    pub population_size: usize,
    /// Maximum number of generations.
    pub nb_generations: usize,
    /// Share of elites.
    pub elite_proportion: f64,
    /// Share of mutants.
    pub mutant_proportion: f64,
    /// Probability of inheriting the elite parent's key.
    pub elite_probability: f64,
    /// Dominance relation.
    pub dominance: DominanceConfig,
    /// MGBM stagnation threshold; no adaptive stop when `None`.
    pub stop_threshold: Option<f64>,
    /// Wall-clock budget per optimizer run (s).
    pub timeout: Option<f64>,
    /// Worker threads for fitness evaluation and cluster rounds.
    pub pool_size: usize,
    /// Fraction of a request's load handled per decoder chunk.
    pub chunk_fraction: f64,
    /// Chunk budget per request.
    pub max_chunks: usize,
    /// Cooperation rounds of the hierarchical coordinator.
    pub max_iteration: usize,
    /// Whether heuristic chromosomes seed the first population.
    pub use_heuristic: bool,
    /// Whether the decoder runs global repair.
    pub repair: bool,
    /// RNG seed (OS entropy when `None`).
    pub seed: Option<u64>,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self {
            population_size: 100,
            nb_generations: 100,
            elite_proportion: 0.2,
            mutant_proportion: 0.1,
            elite_probability: 0.6,
            dominance: DominanceConfig::Pareto,
            stop_threshold: None,
            timeout: None,
            pool_size: 1,
            chunk_fraction: DEFAULT_CHUNK_FRACTION,
            max_chunks: DEFAULT_MAX_CHUNKS,
            max_iteration: 1,
            use_heuristic: true,
            repair: true,
            seed: None,
        }
    }
}

impl OptimizerConfig {
    /// Parses a YAML document and validates it.
    pub fn from_yaml_str(yaml: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads and validates a YAML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)?;
        Self::from_yaml_str(&content)
    }

    /// Checks parameter ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        fn unit(name: &str, value: f64) -> Result<(), ConfigError> {
            if (0.0..=1.0).contains(&value) {
                Ok(())
            } else {
                Err(ConfigError::Invalid(format!("{name} must be in [0, 1], got {value}")))
            }
        }

        if self.population_size == 0 {
            return Err(ConfigError::Invalid("population_size must be positive".into()));
        }
        unit("elite_proportion", self.elite_proportion)?;
        unit("mutant_proportion", self.mutant_proportion)?;
        unit("elite_probability", self.elite_probability)?;
        if self.elite_proportion + self.mutant_proportion > 1.0 {
            return Err(ConfigError::Invalid(
                "elite_proportion + mutant_proportion must not exceed 1".into(),
            ));
        }
        if !(self.chunk_fraction > 0.0 && self.chunk_fraction <= 1.0) {
            return Err(ConfigError::Invalid(format!(
                "chunk_fraction must be in (0, 1], got {}",
                self.chunk_fraction
            )));
        }
        if self.max_chunks == 0 {
            return Err(ConfigError::Invalid("max_chunks must be positive".into()));
        }
        if let Some(t) = self.timeout {
            if !(t >= 0.0 && t.is_finite()) {
                return Err(ConfigError::Invalid(format!("timeout must be a finite duration, got {t}")));
            }
        }
        if let Some(threshold) = self.stop_threshold {
            if !threshold.is_finite() {
                return Err(ConfigError::Invalid("stop_threshold must be finite".into()));
            }
        }
        Ok(())
    }

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

    /// Sets the dominance relation.
    pub fn with_dominance(mut self, dominance: DominanceConfig) -> Self {
        self.dominance = dominance;
        self
    }

    /// Enables MGBM adaptive stopping.
    pub fn with_stop_threshold(mut self, threshold: f64) -> Self {
        self.stop_threshold = Some(threshold);
        self
    }

    /// Sets the wall-clock budget in seconds.
    pub fn with_timeout(mut self, seconds: f64) -> Self {
        self.timeout = Some(seconds);
        self
    }

    /// Sets the worker count.
    pub fn with_pool_size(mut self, pool_size: usize) -> Self {
        self.pool_size = pool_size;
        self
    }

    /// Sets the decoder chunking.
    pub fn with_chunks(mut self, fraction: f64, max_chunks: usize) -> Self {
        self.chunk_fraction = fraction;
        self.max_chunks = max_chunks;
        self
    }

    /// Sets the number of cooperation rounds.
    pub fn with_max_iteration(mut self, rounds: usize) -> Self {
        self.max_iteration = rounds;
        self
    }

    /// Enables or disables heuristic seeding.
    pub fn with_heuristic(mut self, enabled: bool) -> Self {
        self.use_heuristic = enabled;
        self
    }

    /// Enables or disables global repair.
    pub fn with_repair(mut self, enabled: bool) -> Self {
        self.repair = enabled;
        self
    }

    /// Sets the RNG seed.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Engine parameters.
    pub fn ga_config(&self) -> GaConfig {
        let mut config = GaConfig::default()
            .with_population_size(self.population_size)
            .with_generations(self.nb_generations)
            .with_proportions(self.elite_proportion, self.mutant_proportion)
            .with_elite_probability(self.elite_probability)
            .with_workers(self.pool_size)
            .with_heuristic(self.use_heuristic);
        if let Some(t) = self.timeout {
            config = config.with_timeout(Duration::from_secs_f64(t.max(0.0)));
        }
        if let Some(seed) = self.seed {
            config = config.with_seed(seed);
        }
        config
    }

    /// NSGA-II ranking with the configured dominance and adaptive stop.
    pub fn ranking(&self) -> Nsga2Ranking {
        let ranking = Nsga2Ranking::new(self.dominance.build());
        match self.stop_threshold {
            Some(threshold) => ranking.with_stop_threshold(threshold),
            None => ranking,
        }
    }

    /// Decoder for `scenario`.
    pub fn decoder(&self, scenario: &Scenario) -> Decoder {
        Decoder::new(scenario)
            .with_chunk_fraction(self.chunk_fraction)
            .with_max_chunks(self.max_chunks)
            .with_repair(self.repair)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = OptimizerConfig::default();
        assert_eq!(config.population_size, 100);
        assert_eq!(config.max_iteration, 1);
        assert!(config.validate().is_ok());

        let ga = config.ga_config();
        assert_eq!(ga.elite_count(), 20);
        assert_eq!(ga.mutant_count(), 10);
        assert!(ga.timeout.is_none());
    }

    #[test]
    fn test_partial_yaml() {
        let yaml = "
population_size: 30
dominance:
  kind: prioritized
  objective: 1
timeout: 0.5
seed: 7
";
        let config = OptimizerConfig::from_yaml_str(yaml).unwrap();
        assert_eq!(config.population_size, 30);
        assert_eq!(config.nb_generations, 100);
        assert_eq!(config.dominance, DominanceConfig::Prioritized { objective: 1 });
        assert_eq!(config.ga_config().timeout, Some(Duration::from_millis(500)));
        assert_eq!(config.ga_config().seed, Some(7));
    }

    #[test]
    fn test_invalid_values() {
        let err = OptimizerConfig::from_yaml_str("elite_proportion: 1.5").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));

        let err = OptimizerConfig::default()
            .with_chunks(0.0, 10)
            .validate()
            .unwrap_err();
        assert!(err.to_string().contains("chunk_fraction"));

        let err = OptimizerConfig::from_yaml_str("population_size: [1, 2]").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_missing_file() {
        let err = OptimizerConfig::from_file("/nonexistent/optimizer.yaml").unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }

    #[test]
    fn test_prioritized_dominance() {
        let dominance = DominanceConfig::Prioritized { objective: 0 }.build();
        assert!(dominance.dominates(&[1.0, 9.0], &[2.0, 0.0]));
        assert!(!DominanceConfig::Pareto.build().dominates(&[1.0, 9.0], &[2.0, 0.0]));
    }
}
