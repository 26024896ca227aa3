//! End-to-end placement runs.

use std::sync::Arc;

use u_placement::config::{DominanceConfig, OptimizerConfig};
use u_placement::coordinator::{ClusterPartition, HierarchicalCoordinator, ParentDecision};
use u_placement::models::{
    Application, Environment, Node, Resource, ScalarFn, Scenario, Solution, SystemState,
};
use u_placement::objectives::SolutionKpi;
use u_placement::optimizer::{GaOptimizer, Optimizer};

fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Cloud plus two groups of three edge nodes, two applications.
fn city() -> (SystemState, Environment) {
    let apps = vec![
        Application::new("video")
            .with_deadline(0.3)
            .with_work(0.05)
            .with_request_rate(5.0)
            .with_instances(1, 3)
            .with_availability(0.99)
            .with_init_delay(0.5)
            .with_demand(0, ScalarFn::linear(0.05, 0.2))
            .with_demand(1, ScalarFn::Constant(0.5)),
        Application::new("sensor")
            .with_deadline(1.0)
            .with_work(0.02)
            .with_request_rate(10.0)
            .with_instances(0, 4)
            .with_demand(0, ScalarFn::linear(0.02, 0.1))
            .with_demand(1, ScalarFn::Constant(0.25)),
    ];

    let mut nodes = vec![Node::cloud("cloud", 2)
        .with_cost(0, ScalarFn::linear(1.0, 0.0))
        .with_cost(1, ScalarFn::linear(0.5, 0.0))];
    for i in 0..6 {
        let x = if i < 3 { 0.0 } else { 20.0 };
        nodes.push(
            Node::new(format!("edge-{i}"))
                .with_capacity(0, 2.0)
                .with_capacity(1, 2.0)
                .with_cost(0, ScalarFn::linear(0.2, 0.0))
                .with_cost(1, ScalarFn::linear(0.1, 0.0))
                .with_availability(0.98)
                .with_position(x, i as f64),
        );
    }
    let scenario = Scenario::new(vec![Resource::cpu(), Resource::ram()], apps, nodes);

    let mut env = Environment::new(2, 7);
    for n in 1..7 {
        env = env.with_load(0, n, 4.0 + n as f64).with_load(1, n, 2.0);
    }
    for src in 0..7 {
        for dst in 0..7 {
            if src == dst {
                continue;
            }
            let delay = if src == 0 || dst == 0 {
                0.15
            } else if (src <= 3) == (dst <= 3) {
                0.005
            } else {
                0.05
            };
            env = env.with_delay(src, dst, delay);
        }
    }
    (SystemState::new(Arc::new(scenario)), env)
}

fn config() -> OptimizerConfig {
    OptimizerConfig::default()
        .with_population_size(24)
        .with_generations(15)
        .with_seed(42)
}

#[test]
fn test_ga_optimizer_end_to_end() {
    init_logger();
    let (system, env) = city();
    let mut optimizer = GaOptimizer::with_default_objectives(config());
    let solution = optimizer.solve(&system, &env).unwrap();
    assert!(solution.check_invariants(&system.scenario, &env).is_empty());

    let kpi = SolutionKpi::calculate(&system, &solution, &env);
    assert!((0.0..=1.0).contains(&kpi.deadline_violation));
    assert!((0.0..=1.0).contains(&kpi.cloud_share));
    // The first application needs at least one edge instance.
    assert!(kpi.cloud_share < 1.0);
    assert!(optimizer.last_run().is_some());

    let json = serde_json::to_string(&kpi).unwrap();
    let back: SolutionKpi = serde_json::from_str(&json).unwrap();
    assert_eq!(back.utilization_by_node.len(), 7);
}

#[test]
fn test_successive_updates_warm_start() {
    init_logger();
    let (system, env) = city();
    let mut optimizer = GaOptimizer::with_default_objectives(config());
    let first = optimizer.solve(&system, &env).unwrap();
    assert!(!optimizer.warm_start().is_empty());

    let next = system.advance(&first, &env, 1.0);
    let second = optimizer.solve(&next, &env).unwrap();
    assert!(second.check_invariants(&next.scenario, &env).is_empty());
}

#[test]
fn test_prioritized_dominance() {
    init_logger();
    let (system, env) = city();
    let config = config().with_dominance(DominanceConfig::Prioritized { objective: 0 });
    let mut optimizer = GaOptimizer::with_default_objectives(config);
    let solution = optimizer.solve(&system, &env).unwrap();
    assert!(solution.check_invariants(&system.scenario, &env).is_empty());
}

#[test]
fn test_coarse_layer_bounds_clusters() {
    init_logger();
    let (system, env) = city();
    let partition = ClusterPartition::by_position(&system.scenario, 2).unwrap();
    assert_eq!(partition.clusters(), &[vec![1, 2, 3], vec![4, 5, 6]]);

    let coarse_scenario = Arc::new(partition.aggregate_scenario(&system.scenario));
    let coarse_env = partition.aggregate_environment(&system.scenario, &env);
    let coarse_system = SystemState::new(Arc::clone(&coarse_scenario));
    let mut coarse = GaOptimizer::with_default_objectives(config());
    let coarse_solution = coarse.solve(&coarse_system, &coarse_env).unwrap();
    assert!(coarse_solution
        .check_invariants(&coarse_scenario, &coarse_env)
        .is_empty());

    let parent = ParentDecision::from_solution(&partition, &coarse_solution);
    let mut coordinator =
        HierarchicalCoordinator::with_default_objectives(config().with_max_iteration(2), partition);
    let solution = coordinator
        .solve_with_parent(&system, &env, Some(&parent))
        .unwrap();
    assert!(solution.check_invariants(&system.scenario, &env).is_empty());
    assert_eq!(coordinator.history().len(), 3);
}

#[test]
fn test_coordinator_from_yaml() {
    init_logger();
    let yaml = r#"
population_size: 20
nb_generations: 10
pool_size: 2
max_iteration: 1
seed: 7
dominance:
  kind: pareto
"#;
    let config = OptimizerConfig::from_yaml_str(yaml).unwrap();
    assert_eq!(config.pool_size, 2);

    let (system, env) = city();
    let partition = ClusterPartition::by_position(&system.scenario, 2).unwrap();
    let mut coordinator = HierarchicalCoordinator::with_default_objectives(config, partition);
    assert!(coordinator.is_parallel());
    let solution = coordinator.solve_or_fallback(&system, &env);
    assert!(solution.check_invariants(&system.scenario, &env).is_empty());

    let json = serde_json::to_value(&solution).unwrap();
    assert!(json.get("placement").is_some());
}

#[test]
fn test_invalid_input_falls_back_to_cloud() {
    init_logger();
    let (system, env) = city();
    let bad_env = env.clone().with_load(0, 1, -1.0);
    let mut optimizer = GaOptimizer::with_default_objectives(config());
    assert!(optimizer.solve(&system, &bad_env).is_err());

    let solution = optimizer.solve_or_fallback(&system, &bad_env);
    assert_eq!(solution, Solution::all_cloud(&system.scenario, &bad_env));
}
