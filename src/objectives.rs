//! Objective functions and solution quality metrics.
//!
//! Objectives map a (snapshot, solution, environment) triple to a value to
//! minimize. The optimizer accepts any list of [`Objective`]s; the
//! functions below are the usual ones.
//!
//! # Metrics
//!
//! | Metric | Definition |
//! |--------|-----------|
//! | Deadline violation | Fraction of offered load whose response time exceeds the deadline |
//! | Cost | Sum over nodes and resources of `cost_r(usage_r)` |
//! | Migration | (app, node) pairs whose placement changed, excluding the cloud |
//! | Unavailability | Load-weighted probability that no instance of an application is up |
//! | Cloud share | Fraction of offered load served by the cloud |
//! | Avg utilization | Mean CPU utilization of the non-cloud nodes |

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::decoder::processing_delay;
use crate::models::{Environment, Solution, SystemState};

/// Signature of an objective function.
pub type ObjectiveFn = dyn Fn(&SystemState, &Solution, &Environment) -> f64 + Send + Sync;

/// A named objective (lower is better).
#[derive(Clone)]
pub struct Objective {
    /// Objective name, used in logs.
    pub name: String,
    /// The function.
    pub func: Arc<ObjectiveFn>,
}

impl Objective {
    /// Wraps a function.
    pub fn new<F>(name: impl Into<String>, func: F) -> Self
    where
        F: Fn(&SystemState, &Solution, &Environment) -> f64 + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            func: Arc::new(func),
        }
    }

    /// Evaluates the objective.
    #[inline]
    pub fn evaluate(&self, system: &SystemState, solution: &Solution, env: &Environment) -> f64 {
        (self.func)(system, solution, env)
    }

    /// Deadline violation objective.
    pub fn deadline_violation() -> Self {
        Self::new("deadline_violation", deadline_violation)
    }

    /// Cost objective.
    pub fn cost() -> Self {
        Self::new("cost", cost)
    }

    /// Migration objective.
    pub fn migration() -> Self {
        Self::new("migration", migration)
    }

    /// Unavailability objective.
    pub fn unavailability() -> Self {
        Self::new("unavailability", unavailability)
    }
}

impl fmt::Debug for Objective {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Objective").field("name", &self.name).finish()
    }
}

/// Deadline violation, cost, migration and unavailability, in that order.
pub fn default_objectives() -> Vec<Objective> {
    vec![
        Objective::deadline_violation(),
        Objective::cost(),
        Objective::migration(),
        Objective::unavailability(),
    ]
}

/// Response time of `app` requests from `src` served at `dst` under `solution`.
pub fn response_time(
    system: &SystemState,
    solution: &Solution,
    env: &Environment,
    app: usize,
    src: usize,
    dst: usize,
) -> f64 {
    let scenario = &system.scenario;
    let processing = processing_delay(
        &scenario.apps[app],
        scenario.cpu_index(),
        solution.received_load.at(app, dst),
        system.queue_size.at(app, dst),
    );
    let init = if system.was_placed(app, dst) {
        0.0
    } else {
        scenario.apps[app].init_delay
    };
    env.delay(app, src, dst) + processing + init
}

/// Iterates `(app, src, dst, load)` over every positive flow of `solution`.
fn flows<'a>(
    solution: &'a Solution,
    env: &'a Environment,
) -> impl Iterator<Item = (usize, usize, usize, f64)> + 'a {
    let nb_nodes = solution.nb_nodes();
    (0..solution.nb_apps()).flat_map(move |a| {
        (0..nb_nodes).flat_map(move |src| {
            let load = env.load(a, src);
            (0..nb_nodes).filter_map(move |dst| {
                let flow = load * solution.load_distribution.at(a, src, dst);
                (flow > 0.0).then_some((a, src, dst, flow))
            })
        })
    })
}

/// Fraction of the offered load whose response time exceeds its deadline.
pub fn deadline_violation(system: &SystemState, solution: &Solution, env: &Environment) -> f64 {
    let total: f64 = (0..env.nb_apps()).map(|a| env.total_load(a)).sum();
    if total <= 0.0 {
        return 0.0;
    }
    let violated: f64 = flows(solution, env)
        .filter(|&(a, src, dst, _)| {
            response_time(system, solution, env, a, src, dst) > system.scenario.apps[a].deadline
        })
        .map(|(_, _, _, flow)| flow)
        .sum();
    violated / total
}

/// Total cost of the allocated resources.
pub fn cost(system: &SystemState, solution: &Solution, _env: &Environment) -> f64 {
    let scenario = &system.scenario;
    scenario
        .nodes
        .iter()
        .enumerate()
        .map(|(n, node)| {
            (0..scenario.nb_resources())
                .map(|r| {
                    let usage = solution.node_usage(n, r);
                    if usage > 0.0 {
                        node.cost_of(r, usage)
                    } else {
                        0.0
                    }
                })
                .sum::<f64>()
        })
        .sum()
}

/// Number of (app, node) placements started or stopped relative to the
/// deployed decision. The cloud is not counted.
pub fn migration(system: &SystemState, solution: &Solution, _env: &Environment) -> f64 {
    let cloud = system.scenario.cloud;
    let mut changes = 0usize;
    for a in 0..solution.nb_apps() {
        for n in 0..solution.nb_nodes() {
            if n != cloud && solution.is_placed(a, n) != system.was_placed(a, n) {
                changes += 1;
            }
        }
    }
    changes as f64
}

/// Load-weighted probability that every instance of an application is down.
pub fn unavailability(system: &SystemState, solution: &Solution, env: &Environment) -> f64 {
    let scenario = &system.scenario;
    let mut weighted = 0.0;
    let mut total = 0.0;
    for (a, app) in scenario.apps.iter().enumerate() {
        let load = env.total_load(a);
        if load <= 0.0 {
            continue;
        }
        let all_down: f64 = solution
            .hosting_nodes(a)
            .into_iter()
            .map(|n| 1.0 - app.availability * scenario.nodes[n].availability)
            .product();
        weighted += load * all_down;
        total += load;
    }
    if total > 0.0 {
        weighted / total
    } else {
        0.0
    }
}

/// Placement quality indicators.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SolutionKpi {
    /// Fraction of load missing its deadline (0.0..1.0).
    pub deadline_violation: f64,
    /// Total resource cost.
    pub cost: f64,
    /// Number of placement changes.
    pub migration: f64,
    /// Load-weighted unavailability (0.0..1.0).
    pub unavailability: f64,
    /// Load-weighted mean response time (s).
    pub avg_response_time: f64,
    /// Largest response time of any flow (s).
    pub max_response_time: f64,
    /// Fraction of the offered load served by the cloud (0.0..1.0).
    pub cloud_share: f64,
    /// Mean CPU utilization of the non-cloud nodes (0.0..1.0).
    pub avg_utilization: f64,
    /// CPU utilization per node; zero for the cloud.
    pub utilization_by_node: Vec<f64>,
}

impl SolutionKpi {
    /// Computes the indicators of `solution`.
    pub fn calculate(system: &SystemState, solution: &Solution, env: &Environment) -> Self {
        let scenario = &system.scenario;
        let cpu = scenario.cpu_index();

        let mut total_load = 0.0;
        let mut cloud_load = 0.0;
        let mut weighted_response = 0.0;
        let mut max_response: f64 = 0.0;
        for (a, src, dst, flow) in flows(solution, env) {
            let rt = response_time(system, solution, env, a, src, dst);
            total_load += flow;
            weighted_response += flow * rt;
            max_response = max_response.max(rt);
            if dst == scenario.cloud {
                cloud_load += flow;
            }
        }

        let utilization_by_node: Vec<f64> = scenario
            .nodes
            .iter()
            .enumerate()
            .map(|(n, node)| {
                let capacity = node.capacity_of(cpu);
                if node.is_cloud() || capacity <= 0.0 {
                    0.0
                } else {
                    solution.node_usage(n, cpu) / capacity
                }
            })
            .collect();
        let edge = scenario.edge_nodes();
        let avg_utilization = if edge.is_empty() {
            0.0
        } else {
            edge.iter().map(|&n| utilization_by_node[n]).sum::<f64>() / edge.len() as f64
        };

        let (avg_response_time, cloud_share) = if total_load > 0.0 {
            (weighted_response / total_load, cloud_load / total_load)
        } else {
            (0.0, 0.0)
        };

        Self {
            deadline_violation: deadline_violation(system, solution, env),
            cost: cost(system, solution, env),
            migration: migration(system, solution, env),
            unavailability: unavailability(system, solution, env),
            avg_response_time,
            max_response_time: max_response,
            cloud_share,
            avg_utilization,
            utilization_by_node,
        }
    }

    /// Whether the solution meets the given quality thresholds.
    pub fn meets_thresholds(&self, max_violation: f64, max_cost: f64) -> bool {
        self.deadline_violation <= max_violation && self.cost <= max_cost
    }
}
