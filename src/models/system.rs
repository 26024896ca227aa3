//! System snapshot.
//!
//! Combines the scenario with the decision currently in force and the
//! per (app, node) queueing state observed at a simulated time. Snapshots are
//! immutable for the duration of one optimization call.

use std::sync::Arc;

use super::{Environment, Grid2, Scenario, Solution};

/// Immutable view of the system at a given time.
#[derive(Debug, Clone)]
pub struct SystemState {
    /// Static problem description.
    pub scenario: Arc<Scenario>,
    /// Simulated time (s).
    pub time: f64,
    /// Decision currently deployed.
    pub control: Solution,
    /// Requests waiting per (app, node).
    pub queue_size: Grid2<f64>,
    /// Observed processing delay per (app, node) (s).
    pub processing_delay: Grid2<f64>,
}

impl SystemState {
    /// Creates a snapshot at time zero with nothing deployed.
    pub fn new(scenario: Arc<Scenario>) -> Self {
        let nb_apps = scenario.nb_apps();
        let nb_nodes = scenario.nb_nodes();
        Self {
            control: Solution::for_scenario(&scenario),
            queue_size: Grid2::new(nb_apps, nb_nodes, 0.0),
            processing_delay: Grid2::new(nb_apps, nb_nodes, 0.0),
            time: 0.0,
            scenario,
        }
    }

    /// Sets the deployed decision.
    pub fn with_control(mut self, control: Solution) -> Self {
        self.control = control;
        self
    }

    /// Sets the simulated time.
    pub fn with_time(mut self, time: f64) -> Self {
        self.time = time;
        self
    }

    /// Sets the queue size of (app, node).
    pub fn with_queue(mut self, app: usize, node: usize, size: f64) -> Self {
        self.queue_size.set(app, node, size.max(0.0));
        self
    }

    /// Whether the deployed decision already runs `app` on `node`.
    #[inline]
    pub fn was_placed(&self, app: usize, node: usize) -> bool {
        self.control.is_placed(app, node)
    }

    /// Estimates the queue sizes after running `solution` for `step` seconds.
    ///
    /// Each (app, node) queue grows by arrivals and drains at the service
    /// rate of the allocated CPU, floored at zero.
    pub fn next_queue_estimate(&self, solution: &Solution, step: f64) -> Grid2<f64> {
        let cpu = self.scenario.cpu_index();
        Grid2::from_fn(self.scenario.nb_apps(), self.scenario.nb_nodes(), |a, n| {
            let work = self.scenario.apps[a].work;
            let service_rate = if work > 0.0 {
                solution.allocated.at(a, n, cpu) / work
            } else {
                f64::INFINITY
            };
            let arrivals = solution.received_load.at(a, n);
            let queue = self.queue_size.at(a, n) + (arrivals - service_rate) * step;
            if queue.is_finite() {
                queue.max(0.0)
            } else {
                0.0
            }
        })
    }

    /// Builds the snapshot that follows deploying `solution` for `step` seconds.
    pub fn advance(&self, solution: &Solution, env: &Environment, step: f64) -> SystemState {
        let queue_size = self.next_queue_estimate(solution, step);
        let cpu = self.scenario.cpu_index();
        let processing_delay =
            Grid2::from_fn(self.scenario.nb_apps(), self.scenario.nb_nodes(), |a, n| {
                let app = &self.scenario.apps[a];
                let capacity = solution.allocated.at(a, n, cpu);
                let spare = capacity - solution.received_load.at(a, n) * app.work;
                if env.load(a, n) <= 0.0 && solution.received_load.at(a, n) <= 0.0 {
                    0.0
                } else if spare > 0.0 {
                    app.work / spare
                } else {
                    f64::INFINITY
                }
            });
        SystemState {
            scenario: Arc::clone(&self.scenario),
            time: self.time + step,
            control: solution.clone(),
            queue_size,
            processing_delay,
        }
    }
}
