//! Stage IV: global repair.
//!
//! Brings a decoded solution back within the application bounds and makes
//! every load distribution conservative:
//!
//! 1. Hosting nodes beyond `max_instances` are closed, least loaded first,
//!    and their load moves to the cloud.
//! 2. Missing instances up to `min_instances` are opened on the nodes with
//!    the lowest load-weighted network delay, taking load back from the
//!    cloud one chunk at a time.
//! 3. Every (app, source) row is renormalized to sum to one: a deficit goes
//!    to the cloud up to its dispatch ceiling, then to the closest hosting
//!    nodes with headroom; an excess is scaled down. Sources without load
//!    send everything to their closest hosting node, or to the cloud.
//! 4. Composite nodes receive an instance count proportional to their CPU
//!    allocation, between one and their member count.

use log::warn;

use crate::models::{NodeKind, LOAD_TOLERANCE};

use super::state::{within, DecodeState};

/// Runs every repair step.
pub(crate) fn global_repair(state: &mut DecodeState<'_>, chunk_fraction: f64, max_chunks: usize) {
    let nb_apps = state.scenario().nb_apps();
    for a in 0..nb_apps {
        enforce_max_instances(state, a);
        enforce_min_instances(state, a, chunk_fraction, max_chunks);
    }
    renormalize(state);
    state.refresh_allocations();
    assign_composite_instances(state);
}

/// Restores capacity, conservation and instance bounds on a solution built
/// outside the decoder: rows are renormalized, every overloaded node sheds
/// load to the cloud, instance counts are brought within bounds, and
/// allocations are resized to the received loads.
pub(crate) fn make_feasible(state: &mut DecodeState<'_>, chunk_fraction: f64, max_chunks: usize) {
    renormalize(state);
    state.refresh_allocations();
    shed_overload(state);
    for a in 0..state.scenario().nb_apps() {
        enforce_max_instances(state, a);
        enforce_min_instances(state, a, chunk_fraction, max_chunks);
    }
    renormalize(state);
    state.refresh_allocations();
    assign_composite_instances(state);
}

/// Largest load `app` may receive on `node` given the other applications there.
fn max_feasible_load(state: &DecodeState<'_>, app: usize, node: usize) -> f64 {
    let scenario = state.scenario();
    let application = &scenario.apps[app];
    let mut keep = state.env.dispatch_ceiling(app, node);
    for r in 0..scenario.nb_resources() {
        let others = state.usage(node, r) - state.solution.allocated.at(app, node, r);
        let spare = scenario.nodes[node].capacity_of(r) - others;
        if spare < 0.0 || !within(application.demand_at(r, 0.0), spare) {
            return 0.0;
        }
        keep = keep.min(application.max_load_for(r, spare));
    }
    keep
}

fn overloaded(state: &DecodeState<'_>, node: usize) -> bool {
    let scenario = state.scenario();
    let capacity = |r| scenario.nodes[node].capacity_of(r);
    (0..scenario.nb_resources()).any(|r| !within(state.usage(node, r), capacity(r)))
        || (0..scenario.nb_apps()).any(|a| {
            !within(
                state.solution.received_load.at(a, node),
                state.env.dispatch_ceiling(a, node),
            )
        })
}

/// Moves load from overloaded nodes to the cloud, heaviest application first.
fn shed_overload(state: &mut DecodeState<'_>) {
    let scenario = state.scenario();
    for n in scenario.edge_nodes() {
        // Every pass shrinks or closes one instance.
        for _ in 0..2 * scenario.nb_apps() {
            if !overloaded(state, n) {
                break;
            }
            let above_ceiling = (0..scenario.nb_apps()).find(|&a| {
                !within(
                    state.solution.received_load.at(a, n),
                    state.env.dispatch_ceiling(a, n),
                )
            });
            let heaviest = || {
                (0..scenario.nb_apps())
                    .filter(|&a| state.solution.is_placed(a, n))
                    .max_by(|&x, &y| {
                        let lx = state.solution.received_load.at(x, n);
                        let ly = state.solution.received_load.at(y, n);
                        lx.total_cmp(&ly).then(y.cmp(&x))
                    })
            };
            let Some(app) = above_ceiling.or_else(heaviest) else {
                break;
            };
            let keep = max_feasible_load(state, app, n);
            if keep > 0.0 && keep < state.solution.received_load.at(app, n) {
                state.shed_to_cloud(app, n, keep);
            } else {
                state.evict_to_cloud(app, n);
            }
        }
    }
}

fn edge_hosts(state: &DecodeState<'_>, app: usize) -> Vec<usize> {
    let cloud = state.scenario().cloud;
    state
        .solution
        .hosting_nodes(app)
        .into_iter()
        .filter(|&n| n != cloud)
        .collect()
}

fn enforce_max_instances(state: &mut DecodeState<'_>, app: usize) {
    let max = state.scenario().apps[app].max_instances;
    let mut hosts = edge_hosts(state, app);
    if hosts.len() <= max {
        return;
    }
    hosts.sort_by(|&x, &y| {
        let lx = state.solution.received_load.at(app, x);
        let ly = state.solution.received_load.at(app, y);
        lx.total_cmp(&ly).then(x.cmp(&y))
    });
    let excess = hosts.len() - max;
    for &n in &hosts[..excess] {
        state.evict_to_cloud(app, n);
    }
}

/// Load-weighted mean network delay from the sources of `app` to `node`.
fn mean_delay(state: &DecodeState<'_>, app: usize, node: usize) -> f64 {
    let nb_nodes = state.scenario().nb_nodes();
    let total = state.env.total_load(app);
    if total > 0.0 {
        (0..nb_nodes)
            .map(|src| state.env.load(app, src) * state.env.delay(app, src, node))
            .sum::<f64>()
            / total
    } else {
        (0..nb_nodes)
            .map(|src| state.env.delay(app, src, node))
            .sum::<f64>()
            / nb_nodes.max(1) as f64
    }
}

fn enforce_min_instances(
    state: &mut DecodeState<'_>,
    app: usize,
    chunk_fraction: f64,
    max_chunks: usize,
) {
    let min = state.scenario().apps[app].min_instances;
    let hosted = edge_hosts(state, app).len();
    if hosted >= min {
        return;
    }

    let scenario = state.scenario();
    let mut free: Vec<(f64, usize)> = scenario
        .edge_nodes()
        .into_iter()
        .filter(|&n| !state.solution.is_placed(app, n))
        .map(|n| (mean_delay(state, app, n), n))
        .collect();
    free.sort_by(|x, y| x.0.total_cmp(&y.0).then(x.1.cmp(&y.1)));

    let mut missing = min - hosted;
    for (_, node) in free {
        if missing == 0 {
            break;
        }
        if !state.try_place(app, node) {
            continue;
        }
        missing -= 1;

        let mut sources: Vec<usize> = (0..scenario.nb_nodes())
            .filter(|&src| {
                state.env.load(app, src) > 0.0
                    && state.solution.load_distribution.at(app, src, scenario.cloud) > 0.0
            })
            .collect();
        sources.sort_by(|&x, &y| {
            let dx = state.env.delay(app, x, node);
            let dy = state.env.delay(app, y, node);
            dx.total_cmp(&dy).then(x.cmp(&y))
        });
        for src in sources {
            let chunk = state.env.load(app, src) * chunk_fraction.clamp(f64::MIN_POSITIVE, 1.0);
            for _ in 0..max_chunks {
                if state.reclaim_from_cloud(app, src, node, chunk) <= 0.0 {
                    break;
                }
            }
        }
    }
}

fn send_to_cloud(state: &mut DecodeState<'_>, app: usize, src: usize, amount: f64) {
    let cloud = state.scenario().cloud;
    let total = state.env.load(app, src);
    *state.solution.load_distribution.get_mut(app, src, cloud) += amount / total;
    *state.solution.received_load.get_mut(app, cloud) += amount;
    state.solution.placement.set(app, cloud, 1);
}

/// Routes the missing `fraction` of `src`'s load: to the cloud up to its
/// dispatch ceiling, then to the closest hosting nodes with headroom. Load
/// nobody can take still goes to the cloud so the row stays conserved.
fn complete_row(state: &mut DecodeState<'_>, app: usize, src: usize, fraction: f64) {
    let cloud = state.scenario().cloud;
    let total = state.env.load(app, src);
    let mut missing = fraction * total;

    let room = (state.env.dispatch_ceiling(app, cloud) - state.solution.received_load.at(app, cloud)).max(0.0);
    let to_cloud = missing.min(room);
    if to_cloud > 0.0 {
        send_to_cloud(state, app, src, to_cloud);
        missing -= to_cloud;
    }
    if missing <= total * LOAD_TOLERANCE {
        if missing > 0.0 {
            send_to_cloud(state, app, src, missing);
        }
        return;
    }

    let mut hosts = edge_hosts(state, app);
    hosts.sort_by(|&x, &y| {
        let dx = state.env.delay(app, src, x);
        let dy = state.env.delay(app, src, y);
        dx.total_cmp(&dy).then(x.cmp(&y))
    });
    for n in hosts {
        let headroom = max_feasible_load(state, app, n) - state.solution.received_load.at(app, n);
        let amount = missing.min(headroom);
        if amount > 0.0 && state.try_allocate(app, src, n, amount) {
            missing -= amount;
        }
        if missing <= total * LOAD_TOLERANCE {
            break;
        }
    }

    if missing > 0.0 {
        if missing > total * LOAD_TOLERANCE {
            warn!("application {app}: {missing} req/s from node {src} exceed every dispatch ceiling, sent to the cloud");
        }
        send_to_cloud(state, app, src, missing);
    }
}

fn renormalize(state: &mut DecodeState<'_>) {
    state.solution.recompute_received_load(state.env);
    let scenario = state.scenario();
    let cloud = scenario.cloud;
    let nb_nodes = scenario.nb_nodes();

    for a in 0..scenario.nb_apps() {
        for src in 0..nb_nodes {
            if state.env.load(a, src) <= 0.0 {
                let target = edge_hosts(state, a)
                    .into_iter()
                    .min_by(|&x, &y| {
                        let dx = state.env.delay(a, src, x);
                        let dy = state.env.delay(a, src, y);
                        dx.total_cmp(&dy).then(x.cmp(&y))
                    })
                    .unwrap_or(cloud);
                let row = state.solution.load_distribution.lane_mut(a, src);
                row.fill(0.0);
                row[target] = 1.0;
                continue;
            }

            let sum = state.solution.distribution_sum(a, src);
            if sum < 1.0 - LOAD_TOLERANCE {
                complete_row(state, a, src, 1.0 - sum);
            } else if sum > 1.0 + LOAD_TOLERANCE {
                let row = state.solution.load_distribution.lane_mut(a, src);
                for f in row.iter_mut() {
                    *f /= sum;
                }
            }
        }
    }
}

fn assign_composite_instances(state: &mut DecodeState<'_>) {
    let scenario = state.scenario();
    let cpu = scenario.cpu_index();
    for (n, node) in scenario.nodes.iter().enumerate() {
        let NodeKind::Composite { members, .. } = &node.kind else {
            continue;
        };
        let members = members.len().max(1);
        let per_member = node.capacity_of(cpu) / members as f64;
        for a in 0..scenario.nb_apps() {
            if !state.solution.is_placed(a, n) {
                continue;
            }
            let demand = state.solution.allocated.at(a, n, cpu);
            let count = if per_member > 0.0 {
                (demand / per_member).ceil()
            } else {
                1.0
            };
            let count = (count as usize).clamp(1, members);
            state.solution.placement.set(a, n, count as u32);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Application, Environment, Node, Resource, ScalarFn, Scenario, SystemState};
    use std::sync::Arc;

    fn system(min: usize, max: usize) -> SystemState {
        let app = Application::new("A")
            .with_work(0.5)
            .with_request_rate(1.0)
            .with_instances(min, max)
            .with_demand(0, ScalarFn::linear(1.0, 0.0));
        let scenario = Scenario::new(
            vec![Resource::cpu()],
            vec![app],
            vec![
                Node::cloud("cloud", 1),
                Node::new("e1").with_capacity(0, 10.0),
                Node::new("e2").with_capacity(0, 10.0),
                Node::new("e3").with_capacity(0, 10.0),
            ],
        );
        SystemState::new(Arc::new(scenario))
    }

    fn env() -> Environment {
        Environment::new(1, 4)
            .with_load(0, 1, 8.0)
            .with_symmetric_delay(1, 0, 1.0)
            .with_symmetric_delay(1, 2, 0.1)
            .with_symmetric_delay(1, 3, 0.2)
    }

    #[test]
    fn test_max_instances_evicts_least_loaded() {
        let system = system(0, 1);
        let env = env();
        let mut state = DecodeState::new(&system, &env);
        assert!(state.try_allocate(0, 1, 1, 6.0));
        assert!(state.try_allocate(0, 1, 2, 2.0));
        global_repair(&mut state, 0.25, 64);

        let solution = state.into_solution();
        assert!(solution.is_placed(0, 1));
        assert!(!solution.is_placed(0, 2));
        assert!((solution.received_load.at(0, 0) - 2.0).abs() < 1e-9);
        assert!((solution.distribution_sum(0, 1) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_min_instances_reclaims_from_cloud() {
        let system = system(2, usize::MAX);
        let env = env();
        let mut state = DecodeState::new(&system, &env);
        assert!(state.try_allocate(0, 1, 0, 8.0));
        global_repair(&mut state, 0.25, 64);

        let solution = state.into_solution();
        // Nodes 1 and 2 are the closest to the only source.
        assert!(solution.is_placed(0, 1));
        assert!(solution.is_placed(0, 2));
        assert!(!solution.is_placed(0, 3));
        assert!((solution.received_load.at(0, 1) - 8.0).abs() < 1e-9);
        assert_eq!(solution.received_load.at(0, 0), 0.0);
        assert!((solution.distribution_sum(0, 1) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_renormalization() {
        let system = system(0, usize::MAX);
        let env = env();
        let mut state = DecodeState::new(&system, &env);
        assert!(state.try_allocate(0, 1, 1, 2.0));
        global_repair(&mut state, 0.25, 64);

        let solution = state.into_solution();
        assert!((solution.load_distribution.at(0, 1, 0) - 0.75).abs() < 1e-9);
        assert!((solution.received_load.at(0, 0) - 6.0).abs() < 1e-9);
        assert!((solution.allocated.at(0, 0, 0) - 6.0).abs() < 1e-9);
        // Sources without load point at their closest hosting node.
        assert_eq!(solution.load_distribution.at(0, 2, 1), 1.0);
        assert_eq!(solution.load_distribution.at(0, 3, 1), 1.0);
        assert!(solution.check_invariants(&system.scenario, &env).is_empty());
    }

    #[test]
    fn test_deficit_respects_cloud_ceiling() {
        let system = system(0, usize::MAX);
        let env = env().with_dispatch_ceiling(0, 0, 2.0);
        let mut state = DecodeState::new(&system, &env);
        assert!(state.try_allocate(0, 1, 1, 2.0));
        make_feasible(&mut state, 0.25, 64);

        let solution = state.into_solution();
        // The cloud takes 2 of the missing 6, the only edge host the rest.
        assert!((solution.received_load.at(0, 0) - 2.0).abs() < 1e-9);
        assert!((solution.received_load.at(0, 1) - 6.0).abs() < 1e-9);
        assert!((solution.distribution_sum(0, 1) - 1.0).abs() < 1e-9);
        assert!(solution.check_invariants(&system.scenario, &env).is_empty());
    }

    #[test]
    fn test_make_feasible_enforces_instance_bounds() {
        let env = env();

        let system_max = system(0, 1);
        let mut state = DecodeState::new(&system_max, &env);
        assert!(state.try_allocate(0, 1, 1, 3.0));
        assert!(state.try_allocate(0, 1, 2, 3.0));
        assert!(state.try_allocate(0, 1, 3, 2.0));
        make_feasible(&mut state, 0.25, 64);
        let solution = state.into_solution();
        assert_eq!(edge_count(&solution), 1);
        assert!(solution.check_invariants(&system_max.scenario, &env).is_empty());

        let system_min = system(3, 3);
        let mut state = DecodeState::new(&system_min, &env);
        assert!(state.try_allocate(0, 1, 0, 8.0));
        make_feasible(&mut state, 0.25, 64);
        let solution = state.into_solution();
        assert_eq!(edge_count(&solution), 3);
        assert!(solution.check_invariants(&system_min.scenario, &env).is_empty());
    }

    fn edge_count(solution: &crate::models::Solution) -> usize {
        solution.hosting_nodes(0).into_iter().filter(|&n| n != 0).count()
    }

    #[test]
    fn test_composite_instance_count() {
        let e1 = Node::new("e1").with_capacity(0, 5.0);
        let e2 = Node::new("e2").with_capacity(0, 5.0);
        let e3 = Node::new("e3").with_capacity(0, 5.0);
        let cluster = Node::composite("c", &[&e1, &e2, &e3], vec![1, 2, 3], 1);
        let scenario = Scenario::new(
            vec![Resource::cpu()],
            vec![Application::new("A")
                .with_work(0.5)
                .with_demand(0, ScalarFn::linear(1.0, 0.0))],
            vec![Node::cloud("cloud", 1), cluster],
        );
        let system = SystemState::new(Arc::new(scenario));
        let env = Environment::new(1, 2).with_load(0, 1, 7.0);
        let mut state = DecodeState::new(&system, &env);
        assert!(state.try_allocate(0, 1, 1, 7.0));
        global_repair(&mut state, 0.25, 64);
        assert_eq!(state.solution.placement.at(0, 1), 2);
    }
}
