//! Solution (control input) model.
//!
//! A solution is a complete placement decision: which nodes host each
//! application, how much of every resource is reserved for it, and how the
//! load generated at each source node is split across destinations.
//!
//! # Invariants
//!
//! - `allocated[app][node][res] >= 0`
//! - a node that does not host an application has no allocation and no
//!   received load for it
//! - per node and resource, the allocations of all applications fit the capacity
//! - per (app, src), the distribution fractions sum to 1 (any remainder is
//!   implicitly served by the cloud node)
//! - per (app, node), the received load stays within the dispatch ceiling
//! - per app, the number of non-cloud hosting nodes lies within
//!   `[min_instances, max_instances]`

use serde::{Deserialize, Serialize};

use super::{Environment, Grid2, Grid3, Scenario};

/// Tolerance used when checking that distribution fractions sum to one.
pub const LOAD_TOLERANCE: f64 = 1e-5;

/// Relative tolerance used by capacity checks.
pub const CAPACITY_TOLERANCE: f64 = 1e-9;

/// A placement, allocation and load-distribution decision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Solution {
    /// Instance count per (app, node); zero means not placed.
    pub placement: Grid2<u32>,
    /// Reserved amount per (app, node, resource).
    pub allocated: Grid3<f64>,
    /// Fraction of the load generated at (app, src) sent to dst.
    pub load_distribution: Grid3<f64>,
    /// Load arriving at (app, node), derived from the distribution.
    pub received_load: Grid2<f64>,
}

/// An invariant violated by a solution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Violation {
    /// Type of violation.
    pub violation_type: ViolationType,
    /// Application index.
    pub app: usize,
    /// Node index.
    pub node: usize,
    /// Human-readable description.
    pub message: String,
}

/// Classification of invariant violations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ViolationType {
    /// An allocation is negative or not finite.
    InvalidAllocation,
    /// Resources or load on a node that does not host the application.
    UnplacedAllocation,
    /// Allocations on a node exceed its capacity.
    CapacityExceeded,
    /// Distribution fractions of a source do not sum to one.
    LoadNotConserved,
    /// A node receives more load than its dispatch ceiling allows.
    DispatchCeilingExceeded,
    /// The number of non-cloud hosting nodes is outside the application bounds.
    InstanceBounds,
}

impl Solution {
    /// Creates an empty solution.
    pub fn new(nb_apps: usize, nb_nodes: usize, nb_resources: usize) -> Self {
        Self {
            placement: Grid2::new(nb_apps, nb_nodes, 0),
            allocated: Grid3::new(nb_apps, nb_nodes, nb_resources, 0.0),
            load_distribution: Grid3::new(nb_apps, nb_nodes, nb_nodes, 0.0),
            received_load: Grid2::new(nb_apps, nb_nodes, 0.0),
        }
    }

    /// Creates an empty solution sized for `scenario`.
    pub fn for_scenario(scenario: &Scenario) -> Self {
        Self::new(
            scenario.nb_apps(),
            scenario.nb_nodes(),
            scenario.nb_resources(),
        )
    }

    /// The fallback decision: every request is served by the cloud node.
    pub fn all_cloud(scenario: &Scenario, env: &Environment) -> Self {
        let mut solution = Self::for_scenario(scenario);
        let cloud = scenario.cloud;
        for (a, app) in scenario.apps.iter().enumerate() {
            let mut total = 0.0;
            for src in 0..scenario.nb_nodes() {
                solution.load_distribution.set(a, src, cloud, 1.0);
                total += env.load(a, src);
            }
            solution.received_load.set(a, cloud, total);
            if total > 0.0 {
                solution.placement.set(a, cloud, 1);
                for r in 0..scenario.nb_resources() {
                    solution.allocated.set(a, cloud, r, app.demand_at(r, total));
                }
            }
        }
        solution
    }

    /// Number of applications.
    #[inline]
    pub fn nb_apps(&self) -> usize {
        self.placement.rows()
    }

    /// Number of nodes.
    #[inline]
    pub fn nb_nodes(&self) -> usize {
        self.placement.cols()
    }

    /// Whether `app` runs on `node`.
    #[inline]
    pub fn is_placed(&self, app: usize, node: usize) -> bool {
        self.placement.at(app, node) > 0
    }

    /// Total instance count of `app` over all nodes.
    pub fn instance_count(&self, app: usize) -> u32 {
        self.placement.row(app).iter().sum()
    }

    /// Nodes hosting `app`.
    pub fn hosting_nodes(&self, app: usize) -> Vec<usize> {
        (0..self.nb_nodes())
            .filter(|&n| self.is_placed(app, n))
            .collect()
    }

    /// Sum of the distribution fractions of (app, src).
    pub fn distribution_sum(&self, app: usize, src: usize) -> f64 {
        self.load_distribution.lane(app, src).iter().sum()
    }

    /// Total allocation of `resource` on `node` over all applications.
    pub fn node_usage(&self, node: usize, resource: usize) -> f64 {
        (0..self.nb_apps())
            .map(|a| self.allocated.at(a, node, resource))
            .sum()
    }

    /// Recomputes `received_load` from the distribution and generated loads.
    pub fn recompute_received_load(&mut self, env: &Environment) {
        let nb_nodes = self.nb_nodes();
        self.received_load.fill(0.0);
        for a in 0..self.nb_apps() {
            for src in 0..nb_nodes {
                let load = env.load(a, src);
                if load <= 0.0 {
                    continue;
                }
                for dst in 0..nb_nodes {
                    let f = self.load_distribution.at(a, src, dst);
                    if f > 0.0 {
                        *self.received_load.get_mut(a, dst) += f * load;
                    }
                }
            }
        }
    }

    /// Checks every solution invariant against `scenario`.
    ///
    /// Sources with generated load in `env` must have conserved
    /// distributions; sources without load are not checked.
    pub fn check_invariants(&self, scenario: &Scenario, env: &Environment) -> Vec<Violation> {
        let mut violations = Vec::new();
        let nb_res = scenario.nb_resources();

        for a in 0..self.nb_apps() {
            for n in 0..self.nb_nodes() {
                let placed = self.is_placed(a, n);
                for r in 0..nb_res {
                    let amount = self.allocated.at(a, n, r);
                    if !(amount >= 0.0) || amount.is_infinite() {
                        violations.push(Violation::new(
                            ViolationType::InvalidAllocation,
                            a,
                            n,
                            format!("allocation of resource {r} is {amount}"),
                        ));
                    } else if !placed && amount > 0.0 {
                        violations.push(Violation::new(
                            ViolationType::UnplacedAllocation,
                            a,
                            n,
                            format!("resource {r} allocated without placement"),
                        ));
                    }
                }
                if !placed && self.received_load.at(a, n) > 0.0 {
                    violations.push(Violation::new(
                        ViolationType::UnplacedAllocation,
                        a,
                        n,
                        "load received without placement",
                    ));
                }
                let received = self.received_load.at(a, n);
                let ceiling = env.dispatch_ceiling(a, n);
                if received > ceiling * (1.0 + CAPACITY_TOLERANCE) + CAPACITY_TOLERANCE {
                    violations.push(Violation::new(
                        ViolationType::DispatchCeilingExceeded,
                        a,
                        n,
                        format!("received load {received} exceeds dispatch ceiling {ceiling}"),
                    ));
                }
                if env.load(a, n) > 0.0 {
                    let sum = self.distribution_sum(a, n);
                    if (sum - 1.0).abs() > LOAD_TOLERANCE {
                        violations.push(Violation::new(
                            ViolationType::LoadNotConserved,
                            a,
                            n,
                            format!("distribution sums to {sum}"),
                        ));
                    }
                }
            }
        }

        for (a, app) in scenario.apps.iter().enumerate().take(self.nb_apps()) {
            let hosts = (0..self.nb_nodes())
                .filter(|&n| n != scenario.cloud && self.is_placed(a, n))
                .count();
            if hosts < app.min_instances || hosts > app.max_instances {
                violations.push(Violation::new(
                    ViolationType::InstanceBounds,
                    a,
                    usize::MAX,
                    format!(
                        "{hosts} hosting nodes, expected {}..={}",
                        app.min_instances, app.max_instances
                    ),
                ));
            }
        }

        for (n, node) in scenario.nodes.iter().enumerate() {
            for r in 0..nb_res {
                let capacity = node.capacity_of(r);
                let usage = self.node_usage(n, r);
                if usage > capacity * (1.0 + CAPACITY_TOLERANCE) + CAPACITY_TOLERANCE {
                    violations.push(Violation::new(
                        ViolationType::CapacityExceeded,
                        usize::MAX,
                        n,
                        format!("resource {r} usage {usage} exceeds capacity {capacity}"),
                    ));
                }
            }
        }

        violations
    }
}

impl Violation {
    fn new(
        violation_type: ViolationType,
        app: usize,
        node: usize,
        message: impl Into<String>,
    ) -> Self {
        Self {
            violation_type,
            app,
            node,
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Application, Node, Resource, ScalarFn};

    fn scenario() -> Scenario {
        Scenario::new(
            vec![Resource::cpu()],
            vec![Application::new("A").with_demand(0, ScalarFn::linear(1.0, 0.0))],
            vec![Node::cloud("cloud", 1), Node::new("edge").with_capacity(0, 10.0)],
        )
    }

    #[test]
    fn test_empty_solution() {
        let s = Solution::new(2, 3, 1);
        assert_eq!(s.nb_apps(), 2);
        assert_eq!(s.nb_nodes(), 3);
        assert_eq!(s.instance_count(0), 0);
        assert!(s.hosting_nodes(1).is_empty());
    }

    #[test]
    fn test_all_cloud() {
        let sc = scenario();
        let mut env = Environment::new(1, 2);
        env.generated_load.set(0, 1, 4.0);

        let s = Solution::all_cloud(&sc, &env);
        assert!(s.is_placed(0, 0));
        assert!(!s.is_placed(0, 1));
        assert_eq!(s.received_load.at(0, 0), 4.0);
        assert_eq!(s.allocated.at(0, 0, 0), 4.0);
        assert!((s.distribution_sum(0, 1) - 1.0).abs() < 1e-12);
        assert!(s.check_invariants(&sc, &env).is_empty());
    }

    #[test]
    fn test_check_invariants_detects_violations() {
        let sc = scenario();
        let mut env = Environment::new(1, 2);
        env.generated_load.set(0, 1, 4.0);

        let mut s = Solution::for_scenario(&sc);
        s.allocated.set(0, 1, 0, 20.0);
        let kinds: Vec<ViolationType> = s
            .check_invariants(&sc, &env)
            .into_iter()
            .map(|v| v.violation_type)
            .collect();
        assert!(kinds.contains(&ViolationType::UnplacedAllocation));
        assert!(kinds.contains(&ViolationType::CapacityExceeded));
        assert!(kinds.contains(&ViolationType::LoadNotConserved));
    }

    #[test]
    fn test_check_invariants_ceiling_and_bounds() {
        let mut sc = scenario();
        sc.apps[0] = sc.apps[0].clone().with_instances(1, 1);
        let env = Environment::new(1, 2)
            .with_load(0, 1, 4.0)
            .with_dispatch_ceiling(0, 0, 3.0);

        let cloud_only = Solution::all_cloud(&sc, &env);
        let kinds: Vec<ViolationType> = cloud_only
            .check_invariants(&sc, &env)
            .into_iter()
            .map(|v| v.violation_type)
            .collect();
        assert!(kinds.contains(&ViolationType::DispatchCeilingExceeded));
        assert!(kinds.contains(&ViolationType::InstanceBounds));

        let mut edge = Solution::for_scenario(&sc);
        edge.placement.set(0, 1, 1);
        edge.load_distribution.set(0, 1, 1, 1.0);
        edge.recompute_received_load(&env);
        edge.allocated.set(0, 1, 0, 4.0);
        assert!(edge.check_invariants(&sc, &env).is_empty());
    }

    #[test]
    fn test_recompute_received_load() {
        let sc = scenario();
        let mut env = Environment::new(1, 2);
        env.generated_load.set(0, 1, 10.0);
        let mut s = Solution::for_scenario(&sc);
        s.load_distribution.set(0, 1, 0, 0.3);
        s.load_distribution.set(0, 1, 1, 0.7);
        s.recompute_received_load(&env);
        assert!((s.received_load.at(0, 0) - 3.0).abs() < 1e-12);
        assert!((s.received_load.at(0, 1) - 7.0).abs() < 1e-12);
    }
}
