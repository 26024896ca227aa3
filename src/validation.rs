//! Input validation for placement problems.
//!
//! Checks the structural integrity of a system snapshot and its environment
//! before optimization. Detects:
//! - Duplicate IDs
//! - A missing or misplaced cloud node
//! - Grids whose dimensions do not match the scenario
//! - Negative or non-numeric capacities, loads, delays and work
//! - Contradictory instance bounds
//!
//! All problems are collected; validation never stops at the first one.

use std::collections::HashSet;

use crate::models::{Environment, NodeKind, Scenario, SystemState};

/// Validation result.
pub type ValidationResult = Result<(), Vec<ValidationError>>;

/// A validation error.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationError {
    /// Error category.
    pub kind: ValidationErrorKind,
    /// Human-readable description.
    pub message: String,
}

/// Categories of validation errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationErrorKind {
    /// Two entities share the same ID.
    DuplicateId,
    /// The scenario has no cloud node, or the cloud index points elsewhere.
    MissingCloud,
    /// A grid or per-resource list does not match the scenario size.
    DimensionMismatch,
    /// A quantity that must be a non-negative number is not.
    InvalidValue,
    /// `min_instances` exceeds `max_instances`.
    InvalidInstanceBounds,
}

impl ValidationError {
    pub(crate) fn new(kind: ValidationErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

fn non_negative(value: f64) -> bool {
    value >= 0.0
}

/// Validates a scenario on its own.
///
/// Checks:
/// 1. No duplicate resource, application or node IDs
/// 2. Exactly one cloud node, at the scenario's cloud index
/// 3. Non-negative capacities on every node
/// 4. Non-negative work, data size and request rate per application
/// 5. `min_instances <= max_instances`
pub fn validate_scenario(scenario: &Scenario) -> ValidationResult {
    let mut errors = Vec::new();

    let mut seen = HashSet::new();
    for r in &scenario.resources {
        if !seen.insert(r.name.as_str()) {
            errors.push(ValidationError::new(
                ValidationErrorKind::DuplicateId,
                format!("Duplicate resource ID: {}", r.name),
            ));
        }
    }
    let mut seen = HashSet::new();
    for app in &scenario.apps {
        if !seen.insert(app.id.as_str()) {
            errors.push(ValidationError::new(
                ValidationErrorKind::DuplicateId,
                format!("Duplicate application ID: {}", app.id),
            ));
        }
    }
    let mut seen = HashSet::new();
    for node in &scenario.nodes {
        if !seen.insert(node.id.as_str()) {
            errors.push(ValidationError::new(
                ValidationErrorKind::DuplicateId,
                format!("Duplicate node ID: {}", node.id),
            ));
        }
    }

    let clouds: Vec<usize> = (0..scenario.nb_nodes())
        .filter(|&n| scenario.nodes[n].kind == NodeKind::Cloud)
        .collect();
    match clouds.as_slice() {
        [cloud] if *cloud == scenario.cloud => {}
        [] => errors.push(ValidationError::new(
            ValidationErrorKind::MissingCloud,
            "Scenario has no cloud node",
        )),
        [_] => errors.push(ValidationError::new(
            ValidationErrorKind::MissingCloud,
            format!("Cloud index {} is not the cloud node", scenario.cloud),
        )),
        _ => errors.push(ValidationError::new(
            ValidationErrorKind::MissingCloud,
            format!("Scenario has {} cloud nodes", clouds.len()),
        )),
    }

    for node in &scenario.nodes {
        if node.is_cloud() {
            continue;
        }
        if node.capacity.len() > scenario.nb_resources() {
            errors.push(ValidationError::new(
                ValidationErrorKind::DimensionMismatch,
                format!(
                    "Node '{}' has {} capacities for {} resources",
                    node.id,
                    node.capacity.len(),
                    scenario.nb_resources()
                ),
            ));
        }
        if let Some(cap) = node.capacity.iter().find(|c| !non_negative(**c)) {
            errors.push(ValidationError::new(
                ValidationErrorKind::InvalidValue,
                format!("Node '{}' has capacity {cap}", node.id),
            ));
        }
    }

    for app in &scenario.apps {
        if app.demand.len() > scenario.nb_resources() {
            errors.push(ValidationError::new(
                ValidationErrorKind::DimensionMismatch,
                format!(
                    "Application '{}' has {} demand functions for {} resources",
                    app.id,
                    app.demand.len(),
                    scenario.nb_resources()
                ),
            ));
        }
        for (name, value) in [
            ("work", app.work),
            ("data size", app.data_size),
            ("request rate", app.request_rate),
        ] {
            if !non_negative(value) {
                errors.push(ValidationError::new(
                    ValidationErrorKind::InvalidValue,
                    format!("Application '{}' has {name} {value}", app.id),
                ));
            }
        }
        if app.min_instances > app.max_instances {
            errors.push(ValidationError::new(
                ValidationErrorKind::InvalidInstanceBounds,
                format!(
                    "Application '{}' requires {} instances but allows {}",
                    app.id, app.min_instances, app.max_instances
                ),
            ));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Validates a snapshot and its environment.
///
/// Runs [`validate_scenario`], then checks that every grid matches the
/// scenario size and that loads and delays are non-negative numbers.
pub fn validate_input(system: &SystemState, env: &Environment) -> ValidationResult {
    let scenario = &system.scenario;
    let mut errors = validate_scenario(scenario).err().unwrap_or_default();
    let (nb_apps, nb_nodes) = (scenario.nb_apps(), scenario.nb_nodes());

    let mut dims = |what: &str, actual: (usize, usize), expected: (usize, usize)| {
        if actual != expected {
            errors.push(ValidationError::new(
                ValidationErrorKind::DimensionMismatch,
                format!("{what} is {actual:?}, expected {expected:?}"),
            ));
            false
        } else {
            true
        }
    };
    let env_ok = dims("Environment", (env.nb_apps(), env.nb_nodes()), (nb_apps, nb_nodes))
        & dims(
            "Network delay",
            (env.net_delay.dims().0, env.net_delay.dims().1),
            (nb_apps, nb_nodes),
        )
        & dims(
            "Dispatch ceiling",
            (env.max_dispatch.rows(), env.max_dispatch.cols()),
            (nb_apps, nb_nodes),
        );
    dims(
        "Deployed decision",
        (system.control.nb_apps(), system.control.nb_nodes()),
        (nb_apps, nb_nodes),
    );
    dims(
        "Queue sizes",
        (system.queue_size.rows(), system.queue_size.cols()),
        (nb_apps, nb_nodes),
    );

    if env_ok {
        for a in 0..nb_apps {
            for n in 0..nb_nodes {
                let load = env.load(a, n);
                if !non_negative(load) || load.is_infinite() {
                    errors.push(ValidationError::new(
                        ValidationErrorKind::InvalidValue,
                        format!("Load of application {a} at node {n} is {load}"),
                    ));
                }
                if !non_negative(env.dispatch_ceiling(a, n)) {
                    errors.push(ValidationError::new(
                        ValidationErrorKind::InvalidValue,
                        format!("Dispatch ceiling of application {a} at node {n} is negative"),
                    ));
                }
                for dst in 0..nb_nodes {
                    let delay = env.delay(a, n, dst);
                    if !non_negative(delay) {
                        errors.push(ValidationError::new(
                            ValidationErrorKind::InvalidValue,
                            format!("Delay of application {a} from {n} to {dst} is {delay}"),
                        ));
                    }
                }
            }
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
