//! Cluster partition of the non-cloud nodes.
//!
//! # Algorithm (`by_position`)
//!
//! k-means over node positions with farthest-point initialization: the
//! first center is the lowest-index node, each further center the node
//! farthest from every chosen center. Assignment ties go to the lowest
//! cluster index, so the partition is deterministic.
//!
//! # Reference
//! Lloyd (1982), "Least squares quantization in PCM";
//! Gonzalez (1985), "Clustering to minimize the maximum intercluster distance"

use crate::error::OptimizerError;
use crate::models::{Environment, Node, Scenario};

/// Maximum k-means refinement passes.
const MAX_KMEANS_ITERATIONS: usize = 100;

/// Disjoint cover of a scenario's non-cloud nodes.
#[derive(Debug, Clone, PartialEq)]
pub struct ClusterPartition {
    clusters: Vec<Vec<usize>>,
    central: Vec<usize>,
    owner: Vec<Option<usize>>,
}

fn squared_distance(a: (f64, f64), b: (f64, f64)) -> f64 {
    (a.0 - b.0).powi(2) + (a.1 - b.1).powi(2)
}

fn centroid(scenario: &Scenario, members: &[usize]) -> (f64, f64) {
    let count = members.len().max(1) as f64;
    let (x, y) = members.iter().fold((0.0, 0.0), |(x, y), &n| {
        let p = scenario.nodes[n].position;
        (x + p.0, y + p.1)
    });
    (x / count, y / count)
}

impl ClusterPartition {
    /// Creates a partition from explicit member lists.
    ///
    /// Every non-cloud node must belong to exactly one non-empty cluster.
    /// Each cluster's central node is the member closest to the cluster's
    /// centroid.
    pub fn new(scenario: &Scenario, clusters: Vec<Vec<usize>>) -> Result<Self, OptimizerError> {
        let nb_nodes = scenario.nb_nodes();
        let mut owner = vec![None; nb_nodes];

        for (c, members) in clusters.iter().enumerate() {
            if members.is_empty() {
                return Err(OptimizerError::Partition(format!("cluster {c} is empty")));
            }
            for &n in members {
                if n >= nb_nodes {
                    return Err(OptimizerError::Partition(format!(
                        "cluster {c} references unknown node {n}"
                    )));
                }
                if n == scenario.cloud {
                    return Err(OptimizerError::Partition(format!(
                        "cluster {c} contains the cloud node"
                    )));
                }
                if let Some(other) = owner[n] {
                    return Err(OptimizerError::Partition(format!(
                        "node {n} belongs to clusters {other} and {c}"
                    )));
                }
                owner[n] = Some(c);
            }
        }
        if let Some(n) = scenario.edge_nodes().into_iter().find(|&n| owner[n].is_none()) {
            return Err(OptimizerError::Partition(format!(
                "node {n} belongs to no cluster"
            )));
        }

        let central = clusters
            .iter()
            .map(|members| {
                let center = centroid(scenario, members);
                members
                    .iter()
                    .copied()
                    .min_by(|&x, &y| {
                        let dx = squared_distance(scenario.nodes[x].position, center);
                        let dy = squared_distance(scenario.nodes[y].position, center);
                        dx.total_cmp(&dy).then(x.cmp(&y))
                    })
                    .unwrap_or(0)
            })
            .collect();

        Ok(Self {
            clusters,
            central,
            owner,
        })
    }

    /// Groups the non-cloud nodes into at most `k` clusters by position.
    pub fn by_position(scenario: &Scenario, k: usize) -> Result<Self, OptimizerError> {
        let edge = scenario.edge_nodes();
        if edge.is_empty() {
            return Err(OptimizerError::Partition("no node to partition".into()));
        }
        let k = k.clamp(1, edge.len());
        let position = |n: usize| scenario.nodes[n].position;

        let mut centers = vec![position(edge[0])];
        while centers.len() < k {
            let farthest = edge
                .iter()
                .copied()
                .max_by(|&x, &y| {
                    let dx = nearest_center(&centers, position(x)).1;
                    let dy = nearest_center(&centers, position(y)).1;
                    dx.total_cmp(&dy).then(y.cmp(&x))
                })
                .unwrap_or(edge[0]);
            centers.push(position(farthest));
        }

        let mut assignment: Vec<usize> = vec![usize::MAX; edge.len()];
        for _ in 0..MAX_KMEANS_ITERATIONS {
            let next: Vec<usize> = edge
                .iter()
                .map(|&n| nearest_center(&centers, position(n)).0)
                .collect();
            if next == assignment {
                break;
            }
            assignment = next;
            for (c, center) in centers.iter_mut().enumerate() {
                let members: Vec<usize> = edge
                    .iter()
                    .zip(&assignment)
                    .filter(|(_, &a)| a == c)
                    .map(|(&n, _)| n)
                    .collect();
                if !members.is_empty() {
                    *center = centroid(scenario, &members);
                }
            }
        }

        let clusters: Vec<Vec<usize>> = (0..k)
            .map(|c| {
                edge.iter()
                    .zip(&assignment)
                    .filter(|(_, &a)| a == c)
                    .map(|(&n, _)| n)
                    .collect::<Vec<_>>()
            })
            .filter(|members| !members.is_empty())
            .collect();
        Self::new(scenario, clusters)
    }

    /// Number of clusters.
    pub fn nb_clusters(&self) -> usize {
        self.clusters.len()
    }

    /// Member lists.
    pub fn clusters(&self) -> &[Vec<usize>] {
        &self.clusters
    }

    /// Members of `cluster`.
    pub fn members(&self, cluster: usize) -> &[usize] {
        &self.clusters[cluster]
    }

    /// Central node of `cluster`, used for inter-cluster delays.
    pub fn central(&self, cluster: usize) -> usize {
        self.central[cluster]
    }

    /// Cluster owning `node` (`None` for the cloud).
    pub fn cluster_of(&self, node: usize) -> Option<usize> {
        self.owner.get(node).copied().flatten()
    }

    /// Whether the partition was built for `scenario`'s node set.
    pub fn matches(&self, scenario: &Scenario) -> bool {
        self.owner.len() == scenario.nb_nodes()
            && scenario
                .edge_nodes()
                .into_iter()
                .all(|n| self.owner[n].is_some())
            && self.owner[scenario.cloud].is_none()
    }

    /// Composite node standing for `cluster`.
    pub fn composite_node(&self, scenario: &Scenario, cluster: usize) -> Node {
        let members: Vec<&Node> = self.clusters[cluster]
            .iter()
            .map(|&n| &scenario.nodes[n])
            .collect();
        Node::composite(
            format!("cluster-{cluster}"),
            &members,
            self.clusters[cluster].clone(),
            self.central[cluster],
        )
    }

    /// Coarse scenario: the cloud (index 0) followed by one composite node
    /// per cluster (index `cluster + 1`).
    pub fn aggregate_scenario(&self, scenario: &Scenario) -> Scenario {
        let mut nodes = vec![scenario.nodes[scenario.cloud].clone()];
        nodes.extend((0..self.nb_clusters()).map(|c| self.composite_node(scenario, c)));
        Scenario::new(scenario.resources.clone(), scenario.apps.clone(), nodes)
    }

    /// Coarse environment matching [`aggregate_scenario`](Self::aggregate_scenario).
    ///
    /// Loads are summed per cluster; delays are those between central nodes.
    pub fn aggregate_environment(&self, scenario: &Scenario, env: &Environment) -> Environment {
        let nb_apps = scenario.nb_apps();
        let nb = self.nb_clusters() + 1;
        let representative = |i: usize| {
            if i == 0 {
                scenario.cloud
            } else {
                self.central[i - 1]
            }
        };

        let mut coarse = Environment::new(nb_apps, nb);
        for a in 0..nb_apps {
            coarse
                .generated_load
                .set(a, 0, env.load(a, scenario.cloud));
            for (c, members) in self.clusters.iter().enumerate() {
                let load = members.iter().map(|&n| env.load(a, n)).sum();
                coarse.generated_load.set(a, c + 1, load);
            }
            for src in 0..nb {
                for dst in 0..nb {
                    let delay = env.delay(a, representative(src), representative(dst));
                    coarse.net_delay.set(a, src, dst, delay);
                }
            }
        }
        coarse
    }
}

/// Index of the closest center and the squared distance to it.
fn nearest_center(centers: &[(f64, f64)], p: (f64, f64)) -> (usize, f64) {
    centers
        .iter()
        .enumerate()
        .map(|(i, &c)| (i, squared_distance(c, p)))
        .fold((0, f64::INFINITY), |best, cur| if cur.1 < best.1 { cur } else { best })
}
