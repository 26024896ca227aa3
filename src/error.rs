//! Error types.
//!
//! Infeasible placements are not errors: the decoder always returns a
//! solution and infeasibility shows up in the objectives. The only
//! recoverable failure of an optimizer is [`OptimizerError`]; callers
//! typically substitute a fallback decision (everything on the cloud).

use crate::validation::ValidationError;

/// Failure of an optimizer run.
#[derive(Debug, thiserror::Error)]
pub enum OptimizerError {
    /// The engine produced no individual to decode.
    #[error("optimizer produced an empty population")]
    EmptyPopulation,
    /// No objective function was supplied.
    #[error("no objective function configured")]
    NoObjectives,
    /// The system or environment failed validation.
    #[error("invalid optimizer input: {}", summarize(.0))]
    InvalidInput(Vec<ValidationError>),
    /// The cluster partition is not a disjoint cover of the nodes.
    #[error("invalid cluster partition: {0}")]
    Partition(String),
    /// The configuration is unusable.
    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Failure to load or validate a configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("cannot read configuration: {0}")]
    Io(#[from] std::io::Error),
    /// The configuration is not valid YAML for the expected schema.
    #[error("cannot parse configuration: {0}")]
    Parse(#[from] serde_yaml::Error),
    /// A parameter is out of range.
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

fn summarize(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(|e| e.message.as_str())
        .collect::<Vec<_>>()
        .join("; ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validation::ValidationErrorKind;

    #[test]
    fn test_error_messages() {
        assert_eq!(
            OptimizerError::EmptyPopulation.to_string(),
            "optimizer produced an empty population"
        );
        let err = OptimizerError::InvalidInput(vec![
            ValidationError::new(ValidationErrorKind::DuplicateId, "a"),
            ValidationError::new(ValidationErrorKind::MissingCloud, "b"),
        ]);
        assert_eq!(err.to_string(), "invalid optimizer input: a; b");

        let err: OptimizerError = ConfigError::Invalid("x".into()).into();
        assert_eq!(err.to_string(), "invalid configuration: x");
    }
}
