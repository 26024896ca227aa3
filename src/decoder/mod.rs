//! Constraint-aware chromosome decoder.
//!
//! Turns a random-key chromosome into a complete [`Solution`] for a system
//! snapshot and environment. Decoding is a pure function of its inputs:
//! the same genes always produce the same solution.
//!
//! # Stages
//!
//! 1. Candidate selection (instance and node-priority genes)
//! 2. Chunked load distribution by response time (request-priority genes)
//! 3. Local repair: idle instances on unused candidates
//! 4. Global repair: instance bounds, conservative distributions,
//!    composite instance counts (optional, enabled by default)
//!
//! Capacity and dispatch ceilings are checked atomically on every
//! allocation. Load that no node accepts ends up on the cloud.

mod heuristics;
mod layout;
mod repair;
mod stages;
mod state;

use std::borrow::Cow;

use log::trace;

use crate::models::{Environment, Scenario, Solution, SystemState};

pub use heuristics::{all_cloud, heuristic_seeds, highest_load, nearest, steepest_deadline};
pub use layout::ChromosomeLayout;
pub use state::processing_delay;

/// Default fraction of a request's load handled per chunk.
pub const DEFAULT_CHUNK_FRACTION: f64 = 0.25;

/// Default maximum number of chunks per request.
pub const DEFAULT_MAX_CHUNKS: usize = 64;

/// Chromosome decoder for one scenario.
#[derive(Debug, Clone)]
pub struct Decoder {
    layout: ChromosomeLayout,
    chunk_fraction: f64,
    max_chunks: usize,
    repair: bool,
}

impl Decoder {
    /// Creates a decoder with default chunking and global repair enabled.
    pub fn new(scenario: &Scenario) -> Self {
        Self {
            layout: ChromosomeLayout::new(scenario.nb_apps(), scenario.nb_nodes()),
            chunk_fraction: DEFAULT_CHUNK_FRACTION,
            max_chunks: DEFAULT_MAX_CHUNKS,
            repair: true,
        }
    }

    /// Sets the chunk fraction, clamped to `(0, 1]`.
    pub fn with_chunk_fraction(mut self, fraction: f64) -> Self {
        self.chunk_fraction = if fraction > 0.0 { fraction.min(1.0) } else { DEFAULT_CHUNK_FRACTION };
        self
    }

    /// Sets the chunk budget per request (at least one).
    pub fn with_max_chunks(mut self, max_chunks: usize) -> Self {
        self.max_chunks = max_chunks.max(1);
        self
    }

    /// Enables or disables global repair.
    pub fn with_repair(mut self, repair: bool) -> Self {
        self.repair = repair;
        self
    }

    /// The chromosome layout.
    pub fn layout(&self) -> &ChromosomeLayout {
        &self.layout
    }

    /// Number of genes of a chromosome.
    pub fn nb_genes(&self) -> usize {
        self.layout.len()
    }

    /// Decodes `genes` against `system` and `env`.
    ///
    /// Missing trailing genes are read as 0.5, extra genes are ignored.
    pub fn decode(&self, genes: &[f64], system: &SystemState, env: &Environment) -> Solution {
        let genes: Cow<'_, [f64]> = if genes.len() >= self.layout.len() {
            Cow::Borrowed(genes)
        } else {
            let mut padded = genes.to_vec();
            padded.resize(self.layout.len(), 0.5);
            Cow::Owned(padded)
        };

        let mut state = state::DecodeState::new(system, env);
        let candidates = stages::select_candidates(&state, &self.layout, &genes);
        stages::distribute_load(
            &mut state,
            &self.layout,
            &genes,
            &candidates,
            self.chunk_fraction,
            self.max_chunks,
        );
        stages::place_idle_candidates(&mut state, &candidates);
        if self.repair {
            repair::global_repair(&mut state, self.chunk_fraction, self.max_chunks);
        }

        let solution = state.into_solution();
        trace!(
            "decoded {} placements",
            solution.placement.as_slice().iter().filter(|&&p| p > 0).count()
        );
        solution
    }

    /// Repairs a solution that was assembled rather than decoded.
    ///
    /// Distribution rows are completed, overloaded nodes shed load to the
    /// cloud until every capacity and dispatch ceiling holds, and instance
    /// counts are brought back within each application's bounds (missing
    /// instances take load back from the cloud chunk by chunk).
    pub fn make_feasible(&self, system: &SystemState, env: &Environment, solution: Solution) -> Solution {
        let mut state = state::DecodeState::from_solution(system, env, solution);
        repair::make_feasible(&mut state, self.chunk_fraction, self.max_chunks);
        state.into_solution()
    }
}

/// Repairs a solution that was assembled rather than decoded, with the
/// default chunking. See [`Decoder::make_feasible`].
pub fn make_feasible(system: &SystemState, env: &Environment, solution: Solution) -> Solution {
    Decoder::new(&system.scenario).make_feasible(system, env, solution)
}
