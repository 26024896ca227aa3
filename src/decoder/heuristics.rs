//! Heuristic chromosomes used to seed the first population.
//!
//! Each heuristic writes genes that steer the decoder towards a classic
//! placement rule; decoding them still goes through every stage, so seeds
//! are always valid solutions.
//!
//! | Heuristic | Instances | Node priority | Request priority |
//! |-----------|-----------|---------------|------------------|
//! | all-cloud | none | neutral | neutral |
//! | nearest | all | lowest load-weighted delay | neutral |
//! | highest load | all | largest CPU capacity | highest load first |
//! | steepest deadline | all | lowest load-weighted delay | tightest deadline first |

use crate::models::{Environment, Scenario};

use super::layout::ChromosomeLayout;

/// Neutral gene value.
const NEUTRAL: f64 = 0.5;

/// Every heuristic chromosome, in a fixed order.
pub fn heuristic_seeds(scenario: &Scenario, env: &Environment) -> Vec<Vec<f64>> {
    vec![
        all_cloud(scenario),
        nearest(scenario, env),
        highest_load(scenario, env),
        steepest_deadline(scenario, env),
    ]
}

fn layout(scenario: &Scenario) -> ChromosomeLayout {
    ChromosomeLayout::new(scenario.nb_apps(), scenario.nb_nodes())
}

/// Opens no candidate: every request goes to the cloud.
pub fn all_cloud(scenario: &Scenario) -> Vec<f64> {
    let layout = layout(scenario);
    let mut genes = vec![NEUTRAL; layout.len()];
    for a in 0..scenario.nb_apps() {
        genes[layout.instances(a)] = 0.0;
    }
    genes
}

/// Maps `values` linearly onto `[0, 1]`, lowest value first when `ascending`.
fn normalize(values: &[f64], ascending: bool) -> Vec<f64> {
    let finite = values.iter().copied().filter(|v| v.is_finite());
    let min = finite.clone().fold(f64::INFINITY, f64::min);
    let max = finite.fold(f64::NEG_INFINITY, f64::max);
    let range = max - min;
    values
        .iter()
        .map(|&v| {
            let scaled = if !v.is_finite() {
                if v > 0.0 {
                    1.0
                } else {
                    0.0
                }
            } else if range > 0.0 {
                (v - min) / range
            } else {
                NEUTRAL
            };
            if ascending {
                1.0 - scaled
            } else {
                scaled
            }
        })
        .collect()
}

fn open_all(genes: &mut [f64], layout: &ChromosomeLayout, nb_apps: usize) {
    for a in 0..nb_apps {
        genes[layout.instances(a)] = 1.0;
    }
}

fn prefer_close_nodes(genes: &mut [f64], layout: &ChromosomeLayout, scenario: &Scenario, env: &Environment) {
    let nb_nodes = scenario.nb_nodes();
    for a in 0..scenario.nb_apps() {
        let total = env.total_load(a);
        let delays: Vec<f64> = (0..nb_nodes)
            .map(|n| {
                if total > 0.0 {
                    (0..nb_nodes)
                        .map(|src| env.load(a, src) * env.delay(a, src, n))
                        .sum::<f64>()
                        / total
                } else {
                    0.0
                }
            })
            .collect();
        for (n, p) in normalize(&delays, true).into_iter().enumerate() {
            genes[layout.node_priority(a, n)] = p;
        }
    }
}

/// Opens every candidate and prefers the nodes closest to the load.
pub fn nearest(scenario: &Scenario, env: &Environment) -> Vec<f64> {
    let layout = layout(scenario);
    let mut genes = vec![NEUTRAL; layout.len()];
    open_all(&mut genes, &layout, scenario.nb_apps());
    prefer_close_nodes(&mut genes, &layout, scenario, env);
    genes
}

/// Serves the heaviest sources first on the largest nodes.
pub fn highest_load(scenario: &Scenario, env: &Environment) -> Vec<f64> {
    let layout = layout(scenario);
    let mut genes = vec![NEUTRAL; layout.len()];
    open_all(&mut genes, &layout, scenario.nb_apps());

    let cpu = scenario.cpu_index();
    let capacity: Vec<f64> = scenario
        .nodes
        .iter()
        .map(|n| if n.is_cloud() { 0.0 } else { n.capacity_of(cpu) })
        .collect();
    let capacity = normalize(&capacity, false);

    let loads: Vec<f64> = (0..scenario.nb_apps())
        .flat_map(|a| (0..scenario.nb_nodes()).map(move |src| (a, src)))
        .map(|(a, src)| env.load(a, src))
        .collect();
    let loads = normalize(&loads, false);

    for a in 0..scenario.nb_apps() {
        for n in 0..scenario.nb_nodes() {
            genes[layout.node_priority(a, n)] = capacity[n];
            genes[layout.request_priority(a, n)] = loads[a * scenario.nb_nodes() + n];
        }
    }
    genes
}

/// Serves the applications with the tightest deadlines first, close to their load.
pub fn steepest_deadline(scenario: &Scenario, env: &Environment) -> Vec<f64> {
    let layout = layout(scenario);
    let mut genes = vec![NEUTRAL; layout.len()];
    open_all(&mut genes, &layout, scenario.nb_apps());
    prefer_close_nodes(&mut genes, &layout, scenario, env);

    let deadlines: Vec<f64> = scenario.apps.iter().map(|a| a.deadline).collect();
    let urgency = normalize(&deadlines, true);
    for (a, u) in urgency.into_iter().enumerate() {
        for src in 0..scenario.nb_nodes() {
            genes[layout.request_priority(a, src)] = u;
        }
    }
    genes
}
