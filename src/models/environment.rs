//! Environment input.
//!
//! The environment is produced by external collaborators (coverage, routing,
//! load generation) once per controller update and read-only afterwards.

use serde::{Deserialize, Serialize};

use super::{Grid2, Grid3};

/// Load and network conditions for one optimization call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Environment {
    /// Load generated per (app, node) (req/s).
    pub generated_load: Grid2<f64>,
    /// Network delay per (app, src, dst) (s).
    pub net_delay: Grid3<f64>,
    /// Routing path per (app, src, dst) as a list of node indices.
    pub routes: Grid3<Vec<usize>>,
    /// Maximum load a node may receive per (app, node); ∞ when unconstrained.
    pub max_dispatch: Grid2<f64>,
}

impl Environment {
    /// Creates an environment without load, with zero delays and no ceilings.
    pub fn new(nb_apps: usize, nb_nodes: usize) -> Self {
        Self {
            generated_load: Grid2::new(nb_apps, nb_nodes, 0.0),
            net_delay: Grid3::new(nb_apps, nb_nodes, nb_nodes, 0.0),
            routes: Grid3::new(nb_apps, nb_nodes, nb_nodes, Vec::new()),
            max_dispatch: Grid2::new(nb_apps, nb_nodes, f64::INFINITY),
        }
    }

    /// Number of applications.
    #[inline]
    pub fn nb_apps(&self) -> usize {
        self.generated_load.rows()
    }

    /// Number of nodes.
    #[inline]
    pub fn nb_nodes(&self) -> usize {
        self.generated_load.cols()
    }

    /// Load generated for `app` at `node`.
    #[inline]
    pub fn load(&self, app: usize, node: usize) -> f64 {
        self.generated_load.at(app, node)
    }

    /// Total load generated for `app`.
    pub fn total_load(&self, app: usize) -> f64 {
        self.generated_load.row(app).iter().sum()
    }

    /// Network delay of `app` requests from `src` to `dst`.
    #[inline]
    pub fn delay(&self, app: usize, src: usize, dst: usize) -> f64 {
        self.net_delay.at(app, src, dst)
    }

    /// Routing path of `app` requests from `src` to `dst`.
    pub fn route(&self, app: usize, src: usize, dst: usize) -> &[usize] {
        self.routes.get(app, src, dst)
    }

    /// Dispatch ceiling of `app` at `node`.
    #[inline]
    pub fn dispatch_ceiling(&self, app: usize, node: usize) -> f64 {
        self.max_dispatch.at(app, node)
    }

    /// Sets the generated load.
    pub fn with_load(mut self, app: usize, node: usize, load: f64) -> Self {
        self.generated_load.set(app, node, load);
        self
    }

    /// Sets the delay from `src` to `dst` for every application.
    pub fn with_delay(mut self, src: usize, dst: usize, delay: f64) -> Self {
        for a in 0..self.nb_apps() {
            self.net_delay.set(a, src, dst, delay);
        }
        self
    }

    /// Sets the delay between `a` and `b` in both directions for every application.
    pub fn with_symmetric_delay(self, a: usize, b: usize, delay: f64) -> Self {
        self.with_delay(a, b, delay).with_delay(b, a, delay)
    }

    /// Sets the dispatch ceiling.
    pub fn with_dispatch_ceiling(mut self, app: usize, node: usize, ceiling: f64) -> Self {
        self.max_dispatch.set(app, node, ceiling);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_environment_builder() {
        let env = Environment::new(2, 3)
            .with_load(1, 2, 5.0)
            .with_symmetric_delay(0, 2, 0.1)
            .with_dispatch_ceiling(0, 1, 3.0);

        assert_eq!(env.load(1, 2), 5.0);
        assert_eq!(env.total_load(1), 5.0);
        assert_eq!(env.delay(0, 0, 2), 0.1);
        assert_eq!(env.delay(1, 2, 0), 0.1);
        assert_eq!(env.delay(1, 1, 0), 0.0);
        assert_eq!(env.dispatch_ceiling(0, 1), 3.0);
        assert!(env.dispatch_ceiling(1, 1).is_infinite());
        assert!(env.route(0, 0, 1).is_empty());
    }
}
