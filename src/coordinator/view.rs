//! Cluster-local views of the global problem.
//!
//! A cluster sees its own nodes, the cloud, and every other cluster as one
//! composite node. Local node order is: cloud (index 0), internal nodes in
//! partition order, then the other clusters in cluster order.
//!
//! What a cluster knows about the others is its [`ExternalEstimate`]:
//! their instance counts, the load they send into this cluster, and how
//! much load this cluster may send to each of them.

use std::sync::Arc;

use crate::models::{Environment, Grid2, Scenario, Solution, SystemState};

use super::{ClusterPartition, ParentDecision};

/// Role of a local node in the global scenario.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocalNode {
    /// The cloud node.
    Cloud,
    /// A member of the cluster (global node index).
    Internal(usize),
    /// Another cluster (cluster index).
    External(usize),
}

/// What one cluster assumes about the others, per (app, cluster).
#[derive(Debug, Clone, PartialEq)]
pub struct ExternalEstimate {
    /// Instances of each application in each cluster.
    pub instances: Grid2<u32>,
    /// Load each cluster sends into this one, net of the reverse flow.
    pub load: Grid2<f64>,
    /// Maximum load this cluster may send to each cluster.
    pub ceiling: Grid2<f64>,
}

impl ExternalEstimate {
    /// No instances, no load, zero ceilings.
    pub fn new(nb_apps: usize, nb_clusters: usize) -> Self {
        Self {
            instances: Grid2::new(nb_apps, nb_clusters, 0),
            load: Grid2::new(nb_apps, nb_clusters, 0.0),
            ceiling: Grid2::new(nb_apps, nb_clusters, 0.0),
        }
    }

    /// Round-zero assumptions.
    ///
    /// With a parent decision, instance counts and ceilings come from it;
    /// without one, other clusters are closed (zero ceilings). External
    /// load always starts at zero.
    pub fn initial(nb_apps: usize, nb_clusters: usize, parent: Option<&ParentDecision>) -> Self {
        let mut estimate = Self::new(nb_apps, nb_clusters);
        if let Some(parent) = parent {
            estimate.instances = Grid2::from_fn(nb_apps, nb_clusters, |a, c| parent.instances(a, c));
            estimate.ceiling = Grid2::from_fn(nb_apps, nb_clusters, |a, c| parent.ceiling(a, c));
        }
        estimate
    }
}

/// Local problem of one cluster.
#[derive(Debug, Clone)]
pub struct ClusterView {
    cluster: usize,
    scenario: Arc<Scenario>,
    nodes: Vec<LocalNode>,
    representative: Vec<usize>,
    external: Vec<Option<usize>>,
}

impl ClusterView {
    /// Builds the local scenario of `cluster`.
    ///
    /// Applications lose their minimum instance count (it is a global
    /// constraint). With a parent decision, the maximum instance count is
    /// the parent's bound for this cluster plus one per other cluster.
    pub fn new(
        global: &Scenario,
        partition: &ClusterPartition,
        cluster: usize,
        parent: Option<&ParentDecision>,
    ) -> Self {
        let nb_clusters = partition.nb_clusters();
        let mut nodes = vec![LocalNode::Cloud];
        let mut representative = vec![global.cloud];
        let mut local_nodes = vec![global.nodes[global.cloud].clone()];

        for &n in partition.members(cluster) {
            nodes.push(LocalNode::Internal(n));
            representative.push(n);
            local_nodes.push(global.nodes[n].clone());
        }

        let mut external = vec![None; nb_clusters];
        for (c, slot) in external.iter_mut().enumerate() {
            if c == cluster {
                continue;
            }
            *slot = Some(nodes.len());
            nodes.push(LocalNode::External(c));
            representative.push(partition.central(c));
            local_nodes.push(partition.composite_node(global, c));
        }

        let apps = global
            .apps
            .iter()
            .enumerate()
            .map(|(a, app)| {
                let mut app = app.clone();
                app.min_instances = 0;
                if let Some(parent) = parent {
                    let bound = parent.instances(a, cluster) as usize;
                    app.max_instances = app.max_instances.min(bound) + (nb_clusters - 1);
                }
                app
            })
            .collect();

        let scenario = Scenario::new(global.resources.clone(), apps, local_nodes);

        Self {
            cluster,
            scenario: Arc::new(scenario),
            nodes,
            representative,
            external,
        }
    }

    /// Cluster index.
    pub fn cluster(&self) -> usize {
        self.cluster
    }

    /// Local scenario.
    pub fn scenario(&self) -> &Arc<Scenario> {
        &self.scenario
    }

    /// Role of every local node.
    pub fn nodes(&self) -> &[LocalNode] {
        &self.nodes
    }

    /// Local index of the composite node standing for `cluster`.
    pub fn external_index(&self, cluster: usize) -> Option<usize> {
        self.external.get(cluster).copied().flatten()
    }

    /// `(local, global)` indices of the internal nodes.
    pub fn internal(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        self.nodes.iter().enumerate().filter_map(|(i, node)| match node {
            LocalNode::Internal(g) => Some((i, *g)),
            _ => None,
        })
    }

    /// Local snapshot: deployed placement and queues of the internal nodes,
    /// estimated instance counts for the other clusters.
    pub fn system(&self, global: &SystemState, estimate: &ExternalEstimate) -> SystemState {
        let mut local = SystemState::new(Arc::clone(&self.scenario)).with_time(global.time);
        let nb_apps = self.scenario.nb_apps();
        for a in 0..nb_apps {
            for (i, node) in self.nodes.iter().enumerate() {
                let (placed, queue) = match *node {
                    LocalNode::Cloud => {
                        let cloud = global.scenario.cloud;
                        (global.control.placement.at(a, cloud), global.queue_size.at(a, cloud))
                    }
                    LocalNode::Internal(g) => {
                        (global.control.placement.at(a, g), global.queue_size.at(a, g))
                    }
                    LocalNode::External(c) => (estimate.instances.at(a, c), 0.0),
                };
                local.control.placement.set(a, i, placed);
                local.queue_size.set(a, i, queue);
            }
        }
        local
    }

    /// Local environment: internal loads and ceilings from the global
    /// environment, external loads and ceilings from `estimate`, delays
    /// between representative nodes.
    pub fn environment(&self, global: &Environment, estimate: &ExternalEstimate) -> Environment {
        let nb_apps = self.scenario.nb_apps();
        let nb_local = self.nodes.len();
        let mut env = Environment::new(nb_apps, nb_local);
        for a in 0..nb_apps {
            for (i, node) in self.nodes.iter().enumerate() {
                let (load, ceiling) = match *node {
                    LocalNode::Cloud => (0.0, global.dispatch_ceiling(a, self.representative[i])),
                    LocalNode::Internal(g) => (global.load(a, g), global.dispatch_ceiling(a, g)),
                    LocalNode::External(c) => (estimate.load.at(a, c), estimate.ceiling.at(a, c)),
                };
                env.generated_load.set(a, i, load);
                env.max_dispatch.set(a, i, ceiling);
                for j in 0..nb_local {
                    let delay = global.delay(a, self.representative[i], self.representative[j]);
                    env.net_delay.set(a, i, j, delay);
                }
            }
        }
        env
    }

    /// Load of `app` that this cluster's own sources send to `cluster`.
    pub fn sent_load(&self, env: &Environment, solution: &Solution, app: usize, cluster: usize) -> f64 {
        let Some(dst) = self.external_index(cluster) else {
            return 0.0;
        };
        self.internal()
            .map(|(i, _)| env.load(app, i) * solution.load_distribution.at(app, i, dst))
            .sum()
    }

    /// Instances of `app` on the internal nodes.
    pub fn instance_count(&self, solution: &Solution, app: usize) -> u32 {
        self.internal()
            .map(|(i, _)| solution.placement.at(app, i))
            .sum()
    }

    /// Extra load the internal instances of `app` could still receive.
    ///
    /// Per hosting node, the spare capacity left by the other applications
    /// is converted to load through the inverse demand function.
    pub fn spare_load(&self, solution: &Solution, app: usize) -> f64 {
        let scenario = &self.scenario;
        let application = &scenario.apps[app];
        self.internal()
            .filter(|&(i, _)| solution.is_placed(app, i))
            .map(|(i, _)| {
                let node = &scenario.nodes[i];
                let max_load = (0..scenario.nb_resources())
                    .map(|r| {
                        let others = solution.node_usage(i, r) - solution.allocated.at(app, i, r);
                        application.max_load_for(r, (node.capacity_of(r) - others).max(0.0))
                    })
                    .fold(f64::INFINITY, f64::min);
                (max_load - solution.received_load.at(app, i)).max(0.0)
            })
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Application, Node, NodeKind, Resource, ScalarFn};

    fn scenario() -> Scenario {
        let mut nodes = vec![Node::cloud("cloud", 1)];
        for i in 0..4 {
            nodes.push(
                Node::new(format!("n{i}"))
                    .with_capacity(0, 10.0)
                    .with_position(i as f64, 0.0),
            );
        }
        Scenario::new(
            vec![Resource::cpu()],
            vec![Application::new("A")
                .with_instances(1, 3)
                .with_demand(0, ScalarFn::linear(2.0, 1.0))],
            nodes,
        )
    }

    fn partition(scenario: &Scenario) -> ClusterPartition {
        ClusterPartition::new(scenario, vec![vec![1, 2], vec![3, 4]]).unwrap()
    }

    #[test]
    fn test_local_scenario() {
        let scenario = scenario();
        let partition = partition(&scenario);
        let view = ClusterView::new(&scenario, &partition, 1, None);
        assert_eq!(
            view.nodes(),
            &[LocalNode::Cloud, LocalNode::Internal(3), LocalNode::Internal(4), LocalNode::External(0)]
        );
        let local = view.scenario();
        assert_eq!(local.cloud, 0);
        assert_eq!(local.apps[0].min_instances, 0);
        assert_eq!(local.apps[0].max_instances, 3);
        assert!(matches!(local.nodes[3].kind, NodeKind::Composite { .. }));
        assert_eq!(local.nodes[3].capacity, vec![20.0]);
        assert_eq!(view.external_index(0), Some(3));
        assert_eq!(view.external_index(1), None);
    }

    #[test]
    fn test_parent_bounds_instances() {
        let scenario = scenario();
        let partition = partition(&scenario);
        let parent = ParentDecision::new(1, 2).with_instances(0, 0, 1);
        let view = ClusterView::new(&scenario, &partition, 0, Some(&parent));
        assert_eq!(view.scenario().apps[0].max_instances, 2);

        let estimate = ExternalEstimate::initial(1, 2, Some(&parent));
        assert!(estimate.ceiling.at(0, 1).is_infinite());
        assert_eq!(ExternalEstimate::initial(1, 2, None).ceiling.at(0, 1), 0.0);
    }

    #[test]
    fn test_local_environment() {
        let scenario = scenario();
        let partition = partition(&scenario);
        let view = ClusterView::new(&scenario, &partition, 0, None);
        let global = Environment::new(1, 5)
            .with_load(0, 2, 3.0)
            .with_load(0, 4, 7.0)
            .with_symmetric_delay(2, 3, 0.4);

        let mut estimate = ExternalEstimate::new(1, 2);
        estimate.load.set(0, 1, 1.5);
        estimate.ceiling.set(0, 1, 2.0);
        let env = view.environment(&global, &estimate);

        assert_eq!(env.nb_nodes(), 4);
        assert_eq!(env.load(0, 2), 3.0);
        // Node 4 belongs to the other cluster; only the estimate is visible.
        assert_eq!(env.load(0, 3), 1.5);
        assert_eq!(env.dispatch_ceiling(0, 3), 2.0);
        // Cluster 1's central node is 3.
        assert_eq!(env.delay(0, 2, 3), 0.4);
    }

    #[test]
    fn test_sent_and_spare_load() {
        let scenario = scenario();
        let partition = partition(&scenario);
        let view = ClusterView::new(&scenario, &partition, 0, None);
        let env = Environment::new(1, 4).with_load(0, 1, 4.0);

        let mut solution = Solution::for_scenario(view.scenario());
        solution.placement.set(0, 1, 1);
        solution.load_distribution.set(0, 1, 1, 0.75);
        solution.load_distribution.set(0, 1, 3, 0.25);
        solution.recompute_received_load(&env);
        solution.allocated.set(0, 1, 0, 7.0);

        assert_eq!(view.sent_load(&env, &solution, 0, 1), 1.0);
        assert_eq!(view.instance_count(&solution, 0), 1);
        // (10 - 1) / 2 = 4.5 req/s fit, 3 are used.
        assert!((view.spare_load(&solution, 0) - 1.5).abs() < 1e-12);
    }
}
