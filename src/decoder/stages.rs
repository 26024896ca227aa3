//! Decoding stages I to III.
//!
//! # Algorithm
//!
//! 1. **Candidate selection**: per application, open
//!    `round(gene · min(non-cloud nodes, max_instances))` candidates, taking
//!    the non-cloud nodes with the highest priority genes. The cloud node is
//!    always a candidate.
//! 2. **Load distribution**: requests (app, source) are served in decreasing
//!    request-priority order. Each request's load is cut into chunks that go
//!    to the candidate with the lowest current response time that still
//!    fits; the next chunk sees the updated state.
//! 3. **Local repair**: candidates that received nothing are opened idle
//!    when their zero-load demand fits.
//!
//! # Complexity
//! O(R · K · C log C) for R requests, K chunks per request and C candidates.

use crate::models::LOAD_TOLERANCE;

use super::layout::ChromosomeLayout;
use super::state::DecodeState;

/// Stage I: candidate nodes per application, cloud last.
pub(crate) fn select_candidates(
    state: &DecodeState<'_>,
    layout: &ChromosomeLayout,
    genes: &[f64],
) -> Vec<Vec<usize>> {
    let scenario = state.scenario();
    let cloud = scenario.cloud;
    let edge = scenario.edge_nodes();

    scenario
        .apps
        .iter()
        .enumerate()
        .map(|(a, app)| {
            let budget = edge.len().min(app.max_instances);
            let count = (genes[layout.instances(a)] * budget as f64).round() as usize;
            let priorities = layout.node_priorities(genes, a);

            let mut ranked = edge.clone();
            ranked.sort_by(|&x, &y| priorities[y].total_cmp(&priorities[x]).then(x.cmp(&y)));
            ranked.truncate(count.min(budget));
            ranked.push(cloud);
            ranked
        })
        .collect()
}

/// Stage II: chunked greedy distribution of every request's load.
pub(crate) fn distribute_load(
    state: &mut DecodeState<'_>,
    layout: &ChromosomeLayout,
    genes: &[f64],
    candidates: &[Vec<usize>],
    chunk_fraction: f64,
    max_chunks: usize,
) {
    let scenario = state.scenario();
    let nb_nodes = scenario.nb_nodes();

    let mut requests: Vec<(usize, usize)> = (0..scenario.nb_apps())
        .flat_map(|a| (0..nb_nodes).map(move |src| (a, src)))
        .filter(|&(a, src)| state.env.load(a, src) > 0.0)
        .collect();
    requests.sort_by(|&x, &y| {
        let px = genes[layout.request_priority(x.0, x.1)];
        let py = genes[layout.request_priority(y.0, y.1)];
        py.total_cmp(&px).then(x.cmp(&y))
    });

    for (a, src) in requests {
        let total = state.env.load(a, src);
        let chunk = total * chunk_fraction.clamp(f64::MIN_POSITIVE, 1.0);
        let mut remaining = total;
        let mut chunks = 0;

        while remaining > total * LOAD_TOLERANCE && chunks < max_chunks {
            let amount = chunk.min(remaining);
            let mut order: Vec<(f64, usize)> = candidates[a]
                .iter()
                .map(|&dst| (state.response_time(a, src, dst), dst))
                .collect();
            order.sort_by(|x, y| x.0.total_cmp(&y.0).then(x.1.cmp(&y.1)));

            let accepted = order
                .iter()
                .any(|&(_, dst)| state.try_allocate(a, src, dst, amount));
            if !accepted {
                break;
            }
            remaining -= amount;
            chunks += 1;
        }
    }
}

/// Stage III: open idle instances on unused candidates.
pub(crate) fn place_idle_candidates(state: &mut DecodeState<'_>, candidates: &[Vec<usize>]) {
    let cloud = state.scenario().cloud;
    for (a, nodes) in candidates.iter().enumerate() {
        for &n in nodes {
            if n != cloud && !state.solution.is_placed(a, n) {
                state.try_place(a, n);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Application, Environment, Node, Resource, ScalarFn, Scenario, SystemState};
    use std::sync::Arc;

    fn system(max_instances: usize) -> SystemState {
        let app = Application::new("A")
            .with_work(0.5)
            .with_request_rate(1.0)
            .with_instances(0, max_instances)
            .with_demand(0, ScalarFn::linear(1.0, 0.5));
        let scenario = Scenario::new(
            vec![Resource::cpu()],
            vec![app],
            vec![
                Node::new("e0").with_capacity(0, 4.0),
                Node::cloud("cloud", 1),
                Node::new("e1").with_capacity(0, 4.0),
                Node::new("e2").with_capacity(0, 0.1),
            ],
        );
        SystemState::new(Arc::new(scenario))
    }

    fn env() -> Environment {
        Environment::new(1, 4)
            .with_load(0, 0, 6.0)
            .with_symmetric_delay(0, 1, 0.5)
            .with_symmetric_delay(0, 2, 0.01)
            .with_symmetric_delay(0, 3, 0.01)
    }

    fn genes(layout: &ChromosomeLayout, instances: f64, priorities: [f64; 4]) -> Vec<f64> {
        let mut genes = vec![0.5; layout.len()];
        genes[layout.instances(0)] = instances;
        for (n, p) in priorities.into_iter().enumerate() {
            genes[layout.node_priority(0, n)] = p;
        }
        genes
    }

    #[test]
    fn test_candidate_selection() {
        let system = system(usize::MAX);
        let env = env();
        let state = DecodeState::new(&system, &env);
        let layout = ChromosomeLayout::new(1, 4);

        let all = select_candidates(&state, &layout, &genes(&layout, 1.0, [0.2, 0.9, 0.7, 0.4]));
        assert_eq!(all[0], vec![2, 3, 0, 1]);

        // round(0.4 * 3) = 1
        let one = select_candidates(&state, &layout, &genes(&layout, 0.4, [0.2, 0.9, 0.7, 0.4]));
        assert_eq!(one[0], vec![2, 1]);

        let none = select_candidates(&state, &layout, &genes(&layout, 0.0, [0.2, 0.9, 0.7, 0.4]));
        assert_eq!(none[0], vec![1]);
    }

    #[test]
    fn test_candidates_capped_by_max_instances() {
        let system = system(1);
        let env = env();
        let state = DecodeState::new(&system, &env);
        let layout = ChromosomeLayout::new(1, 4);
        let candidates = select_candidates(&state, &layout, &genes(&layout, 1.0, [0.9, 0.0, 0.1, 0.2]));
        assert_eq!(candidates[0], vec![0, 1]);
    }

    #[test]
    fn test_distribution_prefers_fast_nodes() {
        let system = system(usize::MAX);
        let env = env();
        let mut state = DecodeState::new(&system, &env);
        let layout = ChromosomeLayout::new(1, 4);
        let genes = genes(&layout, 1.0, [0.9, 0.0, 0.8, 0.7]);
        let candidates = select_candidates(&state, &layout, &genes);
        distribute_load(&mut state, &layout, &genes, &candidates, 0.25, 64);

        let solution = &state.solution;
        // Capacity 4 holds 3.5 req/s at most; chunks are 1.5 req/s.
        assert!((solution.received_load.at(0, 0) - 3.0).abs() < 1e-9);
        assert!((solution.received_load.at(0, 2) - 3.0).abs() < 1e-9);
        assert_eq!(solution.received_load.at(0, 1), 0.0);
        assert!(!solution.is_placed(0, 3));
        assert!((solution.distribution_sum(0, 0) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_chunk_budget() {
        let system = system(usize::MAX);
        let env = env();
        let mut state = DecodeState::new(&system, &env);
        let layout = ChromosomeLayout::new(1, 4);
        let genes = genes(&layout, 1.0, [0.9, 0.0, 0.8, 0.7]);
        let candidates = select_candidates(&state, &layout, &genes);
        distribute_load(&mut state, &layout, &genes, &candidates, 0.25, 2);
        assert!((state.solution.distribution_sum(0, 0) - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_idle_candidates() {
        let system = system(usize::MAX);
        let env = Environment::new(1, 4);
        let mut state = DecodeState::new(&system, &env);
        place_idle_candidates(&mut state, &[vec![0, 3, 1]]);
        assert!(state.solution.is_placed(0, 0));
        assert!((state.solution.allocated.at(0, 0, 0) - 0.5).abs() < 1e-12);
        // Zero-load demand of 0.5 does not fit in 0.1
        assert!(!state.solution.is_placed(0, 3));
        assert!(!state.solution.is_placed(0, 1));
    }
}
