//! Assembly of cluster-local solutions into one global decision.

use crate::decoder::Decoder;
use crate::models::{Environment, Solution, SystemState};

use super::{ClusterView, LocalNode};

/// Merges the local solutions of every cluster.
///
/// Placements and allocations of internal nodes are copied. A fraction a
/// cluster sends to another cluster's composite node is spread over that
/// cluster's internal nodes according to how the receiving cluster
/// distributes its incoming external load; whatever it does not keep
/// internally goes to the cloud. Load generated at the cloud stays there.
/// The merged decision is then repaired by `decoder`: global capacities,
/// dispatch ceilings and instance bounds, which no single cluster can see.
pub fn assemble(
    decoder: &Decoder,
    system: &SystemState,
    env: &Environment,
    views: &[ClusterView],
    locals: &[Solution],
) -> Solution {
    let scenario = &system.scenario;
    let cloud = scenario.cloud;
    let mut global = Solution::for_scenario(scenario);

    for (view, local) in views.iter().zip(locals) {
        for a in 0..scenario.nb_apps() {
            for (i, g) in view.internal() {
                global.placement.set(a, g, local.placement.at(a, i));
                for r in 0..scenario.nb_resources() {
                    global.allocated.set(a, g, r, local.allocated.at(a, i, r));
                }

                for (j, node) in view.nodes().iter().enumerate() {
                    let fraction = local.load_distribution.at(a, i, j);
                    if fraction <= 0.0 {
                        continue;
                    }
                    match *node {
                        LocalNode::Cloud => {
                            *global.load_distribution.get_mut(a, g, cloud) += fraction;
                        }
                        LocalNode::Internal(dst) => {
                            *global.load_distribution.get_mut(a, g, dst) += fraction;
                        }
                        LocalNode::External(c) => {
                            forward(&mut global, a, g, fraction, view.cluster(), &views[c], &locals[c], cloud);
                        }
                    }
                }
            }
        }
    }

    for a in 0..scenario.nb_apps() {
        let row = global.load_distribution.lane_mut(a, cloud);
        row.fill(0.0);
        row[cloud] = 1.0;
    }

    decoder.make_feasible(system, env, global)
}

/// Spreads `fraction` of `src`'s load, sent from cluster `from` to the
/// cluster of `receiver`, over the receiver's internal nodes.
#[allow(clippy::too_many_arguments)]
fn forward(
    global: &mut Solution,
    app: usize,
    src: usize,
    fraction: f64,
    from: usize,
    receiver: &ClusterView,
    local: &Solution,
    cloud: usize,
) {
    let Some(entry) = receiver.external_index(from) else {
        *global.load_distribution.get_mut(app, src, cloud) += fraction;
        return;
    };
    let mut kept = 0.0;
    for (j, node) in receiver.nodes().iter().enumerate() {
        if let LocalNode::Internal(dst) = *node {
            let share = local.load_distribution.at(app, entry, j);
            if share > 0.0 {
                *global.load_distribution.get_mut(app, src, dst) += fraction * share;
                kept += share;
            }
        }
    }
    let rest = fraction * (1.0 - kept.min(1.0));
    if rest > 0.0 {
        *global.load_distribution.get_mut(app, src, cloud) += rest;
    }
}
