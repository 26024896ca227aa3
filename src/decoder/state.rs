//! Mutable decoding state.
//!
//! Holds the solution under construction together with per-node resource
//! usage and the response-time cache. Every mutation goes through an atomic
//! operation that either commits completely or leaves the state untouched.
//!
//! # Response time
//!
//! `network(app, src, dst) + processing(app, dst) + initialization(app, dst)`,
//! evaluated against the solution committed so far. Network delays come
//! straight from the environment and never change during a decode;
//! processing and initialization entries are cached per (app, dst) and
//! invalidated whenever that pair is mutated.

use crate::models::{
    Application, Environment, Grid2, Scenario, Solution, SystemState, CAPACITY_TOLERANCE,
};

/// Processing delay of one instance group.
///
/// The effective arrival rate is `λe = max(received, request_rate)` and the
/// service capacity `c = demand_cpu(λe)`. The delay is `work / (c − λe·work)`
/// plus the time to drain `queue` pending requests, `queue·work / c`.
/// Returns `f64::INFINITY` when the group is unstable.
pub fn processing_delay(app: &Application, cpu: usize, received: f64, queue: f64) -> f64 {
    if app.work <= 0.0 {
        return 0.0;
    }
    let rate = received.max(app.request_rate).max(0.0);
    let capacity = app.demand_at(cpu, rate);
    let spare = capacity - rate * app.work;
    if spare <= 0.0 {
        return f64::INFINITY;
    }
    let backlog = if queue > 0.0 {
        queue * app.work / capacity
    } else {
        0.0
    };
    app.work / spare + backlog
}

/// Whether `amount` fits within `limit` up to the capacity tolerance.
#[inline]
pub(crate) fn within(amount: f64, limit: f64) -> bool {
    amount <= limit * (1.0 + CAPACITY_TOLERANCE) + CAPACITY_TOLERANCE
}

/// Solution under construction.
pub(crate) struct DecodeState<'a> {
    pub(crate) system: &'a SystemState,
    pub(crate) env: &'a Environment,
    pub(crate) solution: Solution,
    /// Total allocation per (node, resource).
    usage: Grid2<f64>,
    processing: Grid2<Option<f64>>,
    initialization: Grid2<Option<f64>>,
}

impl<'a> DecodeState<'a> {
    /// Starts from an empty solution.
    pub(crate) fn new(system: &'a SystemState, env: &'a Environment) -> Self {
        let scenario = &*system.scenario;
        let nb_apps = scenario.nb_apps();
        let nb_nodes = scenario.nb_nodes();
        Self {
            system,
            env,
            solution: Solution::for_scenario(scenario),
            usage: Grid2::new(nb_nodes, scenario.nb_resources(), 0.0),
            processing: Grid2::new(nb_apps, nb_nodes, None),
            initialization: Grid2::new(nb_apps, nb_nodes, None),
        }
    }

    /// Continues from an existing solution.
    pub(crate) fn from_solution(
        system: &'a SystemState,
        env: &'a Environment,
        solution: Solution,
    ) -> Self {
        let mut state = Self::new(system, env);
        let scenario = state.scenario();
        for n in 0..scenario.nb_nodes() {
            for r in 0..scenario.nb_resources() {
                state.usage.set(n, r, solution.node_usage(n, r));
            }
        }
        state.solution = solution;
        state
    }

    #[inline]
    pub(crate) fn scenario(&self) -> &'a Scenario {
        &self.system.scenario
    }

    /// Current response time of `app` requests from `src` served at `dst`.
    pub(crate) fn response_time(&mut self, app: usize, src: usize, dst: usize) -> f64 {
        self.env.delay(app, src, dst) + self.processing_delay(app, dst) + self.init_delay(app, dst)
    }

    fn processing_delay(&mut self, app: usize, dst: usize) -> f64 {
        if let Some(d) = self.processing.at(app, dst) {
            return d;
        }
        let scenario = self.scenario();
        let d = processing_delay(
            &scenario.apps[app],
            scenario.cpu_index(),
            self.solution.received_load.at(app, dst),
            self.system.queue_size.at(app, dst),
        );
        self.processing.set(app, dst, Some(d));
        d
    }

    fn init_delay(&mut self, app: usize, dst: usize) -> f64 {
        if let Some(d) = self.initialization.at(app, dst) {
            return d;
        }
        let d = if self.system.was_placed(app, dst) {
            0.0
        } else {
            self.scenario().apps[app].init_delay
        };
        self.initialization.set(app, dst, Some(d));
        d
    }

    fn invalidate(&mut self, app: usize, dst: usize) {
        self.processing.set(app, dst, None);
        self.initialization.set(app, dst, None);
    }

    /// Whether `app` can run on `dst` with `load` received there.
    pub(crate) fn fits(&self, app: usize, dst: usize, load: f64) -> bool {
        if !within(load, self.env.dispatch_ceiling(app, dst)) {
            return false;
        }
        let scenario = self.scenario();
        let application = &scenario.apps[app];
        let node = &scenario.nodes[dst];
        (0..scenario.nb_resources()).all(|r| {
            let others = self.usage.at(dst, r) - self.solution.allocated.at(app, dst, r);
            within(others + application.demand_at(r, load), node.capacity_of(r))
        })
    }

    /// Resizes the (app, dst) allocation to serve `load`, without checks.
    fn commit_load(&mut self, app: usize, dst: usize, load: f64) {
        let scenario = self.scenario();
        let application = &scenario.apps[app];
        for r in 0..scenario.nb_resources() {
            let amount = application.demand_at(r, load);
            let previous = self.solution.allocated.at(app, dst, r);
            *self.usage.get_mut(dst, r) += amount - previous;
            self.solution.allocated.set(app, dst, r, amount);
        }
        self.solution.received_load.set(app, dst, load);
        if self.solution.placement.at(app, dst) == 0 {
            self.solution.placement.set(app, dst, 1);
        }
        self.invalidate(app, dst);
    }

    /// Sends `amount` of the load generated at (app, src) to `dst`.
    ///
    /// Returns `false` and leaves the state untouched when the resulting
    /// demand exceeds the capacity of `dst` or its dispatch ceiling.
    pub(crate) fn try_allocate(&mut self, app: usize, src: usize, dst: usize, amount: f64) -> bool {
        let total = self.env.load(app, src);
        if total <= 0.0 || amount <= 0.0 {
            return false;
        }
        let load = self.solution.received_load.at(app, dst) + amount;
        if !self.fits(app, dst, load) {
            return false;
        }
        self.commit_load(app, dst, load);
        *self.solution.load_distribution.get_mut(app, src, dst) += amount / total;
        true
    }

    /// Opens an idle instance of `app` on `dst` if its zero-load demand fits.
    pub(crate) fn try_place(&mut self, app: usize, dst: usize) -> bool {
        if self.solution.is_placed(app, dst) {
            return true;
        }
        if !self.fits(app, dst, 0.0) {
            return false;
        }
        self.commit_load(app, dst, 0.0);
        true
    }

    /// Closes the (app, node) instance and frees its resources.
    fn release(&mut self, app: usize, node: usize) {
        for r in 0..self.scenario().nb_resources() {
            let previous = self.solution.allocated.at(app, node, r);
            *self.usage.get_mut(node, r) -= previous;
            self.solution.allocated.set(app, node, r, 0.0);
        }
        self.solution.received_load.set(app, node, 0.0);
        self.solution.placement.set(app, node, 0);
        self.invalidate(app, node);
    }

    /// Moves every fraction sent to `node` onto the cloud and closes the instance.
    pub(crate) fn evict_to_cloud(&mut self, app: usize, node: usize) {
        let cloud = self.scenario().cloud;
        if node == cloud {
            return;
        }
        let mut moved = 0.0;
        for src in 0..self.scenario().nb_nodes() {
            let fraction = self.solution.load_distribution.at(app, src, node);
            if fraction > 0.0 {
                self.solution.load_distribution.set(app, src, node, 0.0);
                *self.solution.load_distribution.get_mut(app, src, cloud) += fraction;
                moved += fraction * self.env.load(app, src);
            }
        }
        self.release(app, node);

        let cloud_load = self.solution.received_load.at(app, cloud) + moved;
        if cloud_load > 0.0 || self.solution.is_placed(app, cloud) {
            self.commit_load(app, cloud, cloud_load);
        }
    }

    /// Moves up to `amount` of (app, src) load from the cloud to `dst`.
    ///
    /// Returns the amount actually moved (zero when `dst` cannot take it).
    pub(crate) fn reclaim_from_cloud(&mut self, app: usize, src: usize, dst: usize, amount: f64) -> f64 {
        let cloud = self.scenario().cloud;
        let total = self.env.load(app, src);
        if total <= 0.0 || dst == cloud {
            return 0.0;
        }
        let available = self.solution.load_distribution.at(app, src, cloud) * total;
        let amount = amount.min(available);
        if amount <= 0.0 || !self.try_allocate(app, src, dst, amount) {
            return 0.0;
        }
        let fraction = self.solution.load_distribution.get_mut(app, src, cloud);
        *fraction = (*fraction - amount / total).max(0.0);
        let cloud_load = (self.solution.received_load.at(app, cloud) - amount).max(0.0);
        self.commit_load(app, cloud, cloud_load);
        amount
    }

    /// Keeps at most `keep` of the load received by (app, node) and moves the
    /// rest of every source's fraction to the cloud.
    pub(crate) fn shed_to_cloud(&mut self, app: usize, node: usize, keep: f64) {
        let cloud = self.scenario().cloud;
        let received = self.solution.received_load.at(app, node);
        if node == cloud || received <= keep {
            return;
        }
        if keep <= 0.0 {
            self.evict_to_cloud(app, node);
            return;
        }
        let factor = keep / received;
        let mut moved = 0.0;
        for src in 0..self.scenario().nb_nodes() {
            let fraction = self.solution.load_distribution.at(app, src, node);
            if fraction > 0.0 {
                let shed = fraction * (1.0 - factor);
                self.solution.load_distribution.set(app, src, node, fraction - shed);
                *self.solution.load_distribution.get_mut(app, src, cloud) += shed;
                moved += shed * self.env.load(app, src);
            }
        }
        self.commit_load(app, node, keep);
        let cloud_load = self.solution.received_load.at(app, cloud) + moved;
        self.commit_load(app, cloud, cloud_load);
    }

    /// Recomputes received loads from the distribution and resizes every
    /// hosting node's allocation accordingly.
    pub(crate) fn refresh_allocations(&mut self) {
        self.solution.recompute_received_load(self.env);
        let scenario = self.scenario();
        let cloud = scenario.cloud;
        for a in 0..scenario.nb_apps() {
            for n in 0..scenario.nb_nodes() {
                let load = self.solution.received_load.at(a, n);
                if n == cloud && load <= 0.0 {
                    self.release(a, n);
                } else if self.solution.is_placed(a, n) || load > 0.0 {
                    self.commit_load(a, n, load);
                }
            }
        }
    }

    /// Total allocation of `resource` on `node`.
    #[inline]
    pub(crate) fn usage(&self, node: usize, resource: usize) -> f64 {
        self.usage.at(node, resource)
    }

    pub(crate) fn into_solution(self) -> Solution {
        self.solution
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Node, Resource, ScalarFn};
    use std::sync::Arc;

    fn system() -> SystemState {
        let scenario = Scenario::new(
            vec![Resource::cpu(), Resource::ram()],
            vec![Application::new("A")
                .with_work(0.5)
                .with_request_rate(1.0)
                .with_demand(0, ScalarFn::linear(1.0, 0.0))
                .with_demand(1, ScalarFn::Constant(2.0))],
            vec![
                Node::cloud("cloud", 2),
                Node::new("edge").with_capacity(0, 10.0).with_capacity(1, 4.0),
            ],
        );
        SystemState::new(Arc::new(scenario))
    }

    fn env() -> Environment {
        Environment::new(1, 2)
            .with_load(0, 1, 20.0)
            .with_symmetric_delay(0, 1, 0.1)
    }

    #[test]
    fn test_processing_delay() {
        let app = Application::new("A")
            .with_work(0.5)
            .with_request_rate(1.0)
            .with_demand(0, ScalarFn::linear(1.0, 0.0));
        // λe = 4, c = 4, spare = 2
        assert!((processing_delay(&app, 0, 4.0, 0.0) - 0.25).abs() < 1e-12);
        // λe floored by the request rate
        assert!((processing_delay(&app, 0, 0.0, 0.0) - 1.0).abs() < 1e-12);
        // backlog of 8 requests at c = 4
        assert!((processing_delay(&app, 0, 4.0, 8.0) - 1.25).abs() < 1e-12);

        let saturated = app.clone().with_demand(0, ScalarFn::linear(0.5, 0.0));
        assert!(processing_delay(&saturated, 0, 4.0, 0.0).is_infinite());
    }

    #[test]
    fn test_allocation_is_atomic() {
        let system = system();
        let env = env();
        let mut state = DecodeState::new(&system, &env);

        assert!(state.try_allocate(0, 1, 1, 6.0));
        assert_eq!(state.usage(1, 0), 6.0);
        assert_eq!(state.usage(1, 1), 2.0);
        assert!((state.solution.load_distribution.at(0, 1, 1) - 0.3).abs() < 1e-12);

        let before = state.solution.clone();
        assert!(!state.try_allocate(0, 1, 1, 6.0));
        assert_eq!(state.solution, before);
        assert_eq!(state.usage(1, 0), 6.0);
    }

    #[test]
    fn test_dispatch_ceiling_rejects() {
        let system = system();
        let env = env().with_dispatch_ceiling(0, 1, 3.0);
        let mut state = DecodeState::new(&system, &env);
        assert!(!state.try_allocate(0, 1, 1, 5.0));
        assert!(state.try_allocate(0, 1, 1, 3.0));
    }

    #[test]
    fn test_cache_invalidation() {
        let system = system();
        let env = env();
        let mut state = DecodeState::new(&system, &env);
        let idle = state.response_time(0, 1, 1);
        assert!(state.try_allocate(0, 1, 1, 4.0));
        let busy = state.response_time(0, 1, 1);
        assert!(busy < idle);
        // Network delay only
        assert!((state.response_time(0, 1, 0) - 0.1 - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_init_delay_for_new_placements() {
        let scenario = Scenario::new(
            vec![Resource::cpu()],
            vec![Application::new("A")
                .with_work(0.5)
                .with_request_rate(1.0)
                .with_init_delay(2.0)
                .with_demand(0, ScalarFn::linear(1.0, 0.0))],
            vec![Node::cloud("cloud", 1), Node::new("edge").with_capacity(0, 10.0)],
        );
        let scenario = Arc::new(scenario);
        let mut control = Solution::for_scenario(&scenario);
        control.placement.set(0, 1, 1);
        let system = SystemState::new(Arc::clone(&scenario)).with_control(control);
        let env = Environment::new(1, 2).with_load(0, 1, 1.0);
        let mut state = DecodeState::new(&system, &env);
        // Edge already deployed, cloud pays the initialization delay
        assert!((state.response_time(0, 1, 1) - 1.0).abs() < 1e-12);
        assert!((state.response_time(0, 1, 0) - 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_evict_and_reclaim() {
        let system = system();
        let env = env();
        let mut state = DecodeState::new(&system, &env);
        assert!(state.try_allocate(0, 1, 1, 8.0));
        state.evict_to_cloud(0, 1);
        assert!(!state.solution.is_placed(0, 1));
        assert_eq!(state.usage(1, 0), 0.0);
        assert!((state.solution.received_load.at(0, 0) - 8.0).abs() < 1e-12);
        assert!((state.solution.load_distribution.at(0, 1, 0) - 0.4).abs() < 1e-12);

        let moved = state.reclaim_from_cloud(0, 1, 1, 5.0);
        assert!((moved - 5.0).abs() < 1e-12);
        assert!((state.solution.received_load.at(0, 0) - 3.0).abs() < 1e-12);
        assert!((state.solution.distribution_sum(0, 1) - 0.4).abs() < 1e-12);
    }
}
