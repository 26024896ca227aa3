//! Decisions handed down by a coarser controller.

use crate::models::{Grid2, Solution};

use super::ClusterPartition;

/// Per (app, cluster) instance bounds and dispatch ceilings.
#[derive(Debug, Clone, PartialEq)]
pub struct ParentDecision {
    instances: Grid2<u32>,
    ceilings: Grid2<f64>,
}

impl ParentDecision {
    /// No bound: zero instances and unbounded ceilings.
    pub fn new(nb_apps: usize, nb_clusters: usize) -> Self {
        Self {
            instances: Grid2::new(nb_apps, nb_clusters, 0),
            ceilings: Grid2::new(nb_apps, nb_clusters, f64::INFINITY),
        }
    }

    /// Derives the decision from a solution of the partition's aggregate scenario.
    ///
    /// Cluster `c` is node `c + 1` of the coarse solution: its instance count
    /// becomes the bound and its received load the ceiling.
    pub fn from_solution(partition: &ClusterPartition, coarse: &Solution) -> Self {
        let nb_apps = coarse.nb_apps();
        let nb_clusters = partition.nb_clusters();
        let node = |c: usize| c + 1;
        Self {
            instances: Grid2::from_fn(nb_apps, nb_clusters, |a, c| {
                if node(c) < coarse.nb_nodes() {
                    coarse.placement.at(a, node(c))
                } else {
                    0
                }
            }),
            ceilings: Grid2::from_fn(nb_apps, nb_clusters, |a, c| {
                if node(c) < coarse.nb_nodes() {
                    coarse.received_load.at(a, node(c))
                } else {
                    0.0
                }
            }),
        }
    }

    /// Sets the instance bound of (app, cluster).
    pub fn with_instances(mut self, app: usize, cluster: usize, count: u32) -> Self {
        self.instances.set(app, cluster, count);
        self
    }

    /// Sets the dispatch ceiling of (app, cluster).
    pub fn with_ceiling(mut self, app: usize, cluster: usize, ceiling: f64) -> Self {
        self.ceilings.set(app, cluster, ceiling.max(0.0));
        self
    }

    /// Number of applications.
    pub fn nb_apps(&self) -> usize {
        self.instances.rows()
    }

    /// Number of clusters.
    pub fn nb_clusters(&self) -> usize {
        self.instances.cols()
    }

    /// Instance bound of (app, cluster).
    #[inline]
    pub fn instances(&self, app: usize, cluster: usize) -> u32 {
        self.instances.at(app, cluster)
    }

    /// Dispatch ceiling of (app, cluster).
    #[inline]
    pub fn ceiling(&self, app: usize, cluster: usize) -> f64 {
        self.ceilings.at(app, cluster)
    }
}
