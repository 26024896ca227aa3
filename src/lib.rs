//! Multi-objective placement optimization for edge-cloud systems.
//!
//! Decides, for every application, which nodes run an instance, how much
//! of each resource every instance receives, and how the load generated at
//! every node is split among the instances. Decisions minimize a vector of
//! objectives (deadline violations, cost, migrations, unavailability) under
//! node capacities and dispatch ceilings.
//!
//! # Modules
//!
//! - **`models`**: Domain types: `Scenario`, `Application`, `Node`,
//!   `SystemState`, `Environment`, `Solution`
//! - **`ga`**: Generic BRKGA engine with NSGA-II ranking and MGBM stopping
//! - **`decoder`**: Random-key chromosome to feasible `Solution`
//! - **`objectives`**: Objective functions and KPIs
//! - **`optimizer`**: One GA run per controller update
//! - **`coordinator`**: Cluster-wise optimization with iterative cooperation
//! - **`config`**: Tunable parameters (YAML)
//! - **`validation`**: Input integrity checks
//!
//! # References
//!
//! - Gonçalves & Resende (2011), "Biased random-key genetic algorithms for
//!   combinatorial optimization"
//! - Deb et al. (2002), "A Fast and Elitist Multiobjective Genetic Algorithm: NSGA-II"
//! - Martí et al. (2016), "A stopping criterion for multi-objective
//!   optimization evolutionary algorithms"

pub mod config;
pub mod coordinator;
pub mod decoder;
pub mod error;
pub mod ga;
pub mod models;
pub mod objectives;
pub mod optimizer;
pub mod validation;
