//! Error types for intent extraction
//!
//! Provides error handling for:
//! - Contract violations in extractor output (recoverable, retried once)
//! - Language model transport failures (fail closed)
//! - Extraction timeouts

use parley_schema::{ActionKind, SchemaError};

/// Ways an extractor reply can break the structured-output contract
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ContractViolation {
    /// Reply is not a JSON object of the expected shape
    #[error("malformed extractor output: {0}")]
    Malformed(String),

    /// Reply names no action at all
    #[error("no action identified")]
    NoAction,

    /// Reply names an action outside the registry
    #[error("unknown action '{0}'")]
    UnknownAction(String),

    /// Reply switches action in the middle of a conversation
    #[error("action changed from {expected} to {found}")]
    ActionMismatch {
        /// Action held by the conversation
        expected: ActionKind,
        /// Action named in the reply
        found: ActionKind,
    },

    /// Reply fills a parameter the action does not declare
    #[error("parameter '{parameter}' is not declared for {action}")]
    UndeclaredParameter {
        /// Action named in the reply
        action: ActionKind,
        /// Offending parameter
        parameter: String,
    },

    /// Reply fills a parameter with a value of the wrong kind
    #[error("invalid value for '{parameter}': {reason}")]
    InvalidValue {
        /// Offending parameter
        parameter: String,
        /// Coercion failure
        reason: String,
    },

    /// Reply both fills a parameter and flags it as not found
    #[error("parameter '{0}' is both extracted and flagged as not found")]
    ConflictingNotFound(String),
}

impl From<SchemaError> for ContractViolation {
    fn from(err: SchemaError) -> Self {
        match err {
            SchemaError::UnknownAction(name) => Self::UnknownAction(name),
            SchemaError::UnknownParameter { action, parameter } => {
                Self::UndeclaredParameter { action, parameter }
            }
            SchemaError::InvalidValue { parameter, reason } => {
                Self::InvalidValue { parameter, reason }
            }
            other => Self::Malformed(other.to_string()),
        }
    }
}

/// Intent extraction errors
#[derive(Debug, thiserror::Error)]
pub enum ExtractError {
    /// Output violated the contract; worth one stricter retry
    #[error("recoverable parse error: {0}")]
    Recoverable(#[from] ContractViolation),

    /// Model could not be reached or answered with an error
    #[error("extractor unavailable: {0}")]
    Unavailable(String),

    /// Model did not answer in time
    #[error("extraction timed out after {timeout_ms}ms")]
    Timeout {
        /// Budget that was exceeded
        timeout_ms: u64,
    },
}

impl ExtractError {
    /// Check if a stricter re-prompt may succeed
    #[inline]
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Recoverable(_))
    }
}

/// Language model transport errors
#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    /// HTTP transport failure
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// Endpoint answered with a non-success status
    #[error("model endpoint returned {status}: {body}")]
    Status {
        /// HTTP status code
        status: u16,
        /// Response body, as returned
        body: String,
    },

    /// Endpoint answered without any completion
    #[error("model returned no choices")]
    EmptyResponse,
}

impl From<ModelError> for ExtractError {
    fn from(err: ModelError) -> Self {
        Self::Unavailable(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_contract_violations_are_retryable() {
        assert!(ExtractError::Recoverable(ContractViolation::NoAction).is_retryable());
        assert!(!ExtractError::Unavailable("down".to_string()).is_retryable());
        assert!(!ExtractError::Timeout { timeout_ms: 10 }.is_retryable());
    }

    #[test]
    fn schema_errors_map_to_violations() {
        let violation: ContractViolation =
            SchemaError::unknown_parameter(ActionKind::CreateItems, "colour").into();
        assert!(matches!(
            violation,
            ContractViolation::UndeclaredParameter { parameter, .. } if parameter == "colour"
        ));

        let violation: ContractViolation = SchemaError::UnknownAction("x".to_string()).into();
        assert_eq!(violation, ContractViolation::UnknownAction("x".to_string()));
    }

    #[test]
    fn model_errors_are_unavailable() {
        let err: ExtractError = ModelError::EmptyResponse.into();
        assert!(matches!(err, ExtractError::Unavailable(_)));
    }
}
