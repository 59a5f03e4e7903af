//! Typed errors for job setup.

use ringsplit_connectors::ConnectorError;
use ringsplit_core::PlanError;
use thiserror::Error;

use crate::validation::ValidationError;

/// Everything that can stop a job from being configured or initialized.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum JobError {
    #[error(transparent)]
    Connector(#[from] ConnectorError),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Plan(#[from] PlanError),

    /// A setter was called on an initialized configuration.
    #[error("configuration is finalized, cannot set '{0}'")]
    ImmutableConfig(&'static str),

    #[error("bisect factor and split size are mutually exclusive")]
    ConflictingSplitModes,

    #[error("missing required setting '{0}'")]
    MissingField(&'static str),

    #[error("invalid value '{value}' for option '{option}'")]
    InvalidOption { option: String, value: String },
}

impl JobError {
    pub fn invalid_option(option: impl Into<String>, value: impl Into<String>) -> Self {
        JobError::InvalidOption {
            option: option.into(),
            value: value.into(),
        }
    }

    /// Whether calling `initialize` again may succeed without changing the
    /// configuration.
    pub fn is_transient(&self) -> bool {
        matches!(self, JobError::Connector(e) if e.is_transient())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wrapped_errors_display_transparently() {
        let err: JobError = PlanError::InvalidBisectFactor(3).into();
        assert_eq!(
            err.to_string(),
            "bisect factor must be a positive power of two, got 3"
        );
        let err: JobError = ConnectorError::schema_not_found("app", "users").into();
        assert_eq!(err.to_string(), "schema not found: app.users");
    }

    #[test]
    fn test_immutable_config_names_setter() {
        let err = JobError::ImmutableConfig("keyspace");
        assert_eq!(err.to_string(), "configuration is finalized, cannot set 'keyspace'");
    }

    #[test]
    fn test_transient() {
        let err: JobError = ConnectorError::ConnectionFailed("down".into()).into();
        assert!(err.is_transient());
        assert!(!JobError::ConflictingSplitModes.is_transient());
    }
}
