//! Error types for the turn engine
//!
//! Provides error handling for:
//! - Malformed turn requests
//! - Tampered, stale or inconsistent contexts
//! - Unknown actions and parameters
//! - Task handoff and suggestion lookups

use parley_dialogue::{FormatError, MergeError, StateError};
use parley_schema::{ActionKind, SchemaError};

/// Errors that abort a turn with a 4xx/5xx response
///
/// Everything else (unparseable utterances, exhausted conversations,
/// downstream task failures) is a well-formed 200 turn.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Request is missing data or violates limits
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Context could not be opened
    #[error("invalid context: {0}")]
    Context(#[from] ContextError),

    /// Action is not registered
    #[error("unknown action: {0}")]
    UnknownAction(String),

    /// Parameter is not declared for the action
    #[error("parameter '{parameter}' is not declared for {action}")]
    UnknownParameter {
        /// Conversation action
        action: ActionKind,
        /// Offending parameter
        parameter: String,
    },

    /// Edited value does not fit the parameter
    #[error("invalid value for '{parameter}': {reason}")]
    InvalidValue {
        /// Parameter being edited
        parameter: String,
        /// Coercion failure
        reason: String,
    },

    /// Question rendering failed
    #[error("formatting failed: {0}")]
    Format(#[from] FormatError),
}

impl EngineError {
    /// HTTP status for this error
    #[must_use]
    pub fn status_code(&self) -> u16 {
        match self {
            Self::Context(ContextError::Encode(_)) | Self::Format(_) => 500,
            _ => 400,
        }
    }

    /// Check if the client caused the error
    #[inline]
    #[must_use]
    pub fn is_client_error(&self) -> bool {
        self.status_code() < 500
    }
}

impl From<SchemaError> for EngineError {
    fn from(err: SchemaError) -> Self {
        match err {
            SchemaError::UnknownAction(name) => Self::UnknownAction(name),
            SchemaError::UnknownParameter { action, parameter } => {
                Self::UnknownParameter { action, parameter }
            }
            SchemaError::InvalidValue { parameter, reason } => {
                Self::InvalidValue { parameter, reason }
            }
            other => Self::InvalidRequest(other.to_string()),
        }
    }
}

impl From<MergeError> for EngineError {
    fn from(err: MergeError) -> Self {
        match err {
            MergeError::Schema(schema) => schema.into(),
            mismatch @ MergeError::ActionMismatch { .. } => Self::InvalidRequest(mismatch.to_string()),
        }
    }
}

/// Errors opening or sealing a client-held context
#[derive(Debug, thiserror::Error)]
pub enum ContextError {
    /// Not a context envelope
    #[error("malformed context: {0}")]
    Malformed(String),

    /// Envelope version is not understood
    #[error("unsupported context version {0}")]
    UnsupportedVersion(u32),

    /// Seal does not match the state
    #[error("context seal does not verify")]
    BadSeal,

    /// State breaks a structural invariant
    #[error("inconsistent context: {0}")]
    Inconsistent(#[from] StateError),

    /// State could not be serialized
    #[error("context encoding failed: {0}")]
    Encode(String),
}

/// Task handoff errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HandoffError {
    /// State still has missing parameters
    #[error("not ready: missing {}", .0.join(", "))]
    NotReady(Vec<String>),

    /// Downstream executor failed; message is passed through verbatim
    #[error("{0}")]
    Execution(String),
}

/// Suggestion source errors (logged, never surfaced)
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SourceError {
    /// Source could not be queried
    #[error("suggestion source unavailable: {0}")]
    Unavailable(String),

    /// Query exceeded its budget
    #[error("suggestion query timed out")]
    Timeout,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes() {
        assert_eq!(EngineError::InvalidRequest("x".into()).status_code(), 400);
        assert_eq!(ContextError::BadSeal.to_string(), "context seal does not verify");
        assert_eq!(EngineError::Context(ContextError::BadSeal).status_code(), 400);
        assert_eq!(
            EngineError::Context(ContextError::Encode("x".into())).status_code(),
            500
        );
        let format = FormatError::UnknownParameter {
            action: ActionKind::CreateItems,
            parameter: "x".into(),
        };
        assert!(!EngineError::Format(format).is_client_error());
    }

    #[test]
    fn merge_errors_map() {
        let err: EngineError =
            MergeError::Schema(SchemaError::unknown_parameter(ActionKind::CreateItems, "colour"))
                .into();
        assert!(matches!(err, EngineError::UnknownParameter { .. }));
        assert_eq!(err.status_code(), 400);
    }

    #[test]
    fn handoff_error_is_verbatim() {
        let err = HandoffError::Execution("container 7 is archived".into());
        assert_eq!(err.to_string(), "container 7 is archived");
        assert_eq!(
            HandoffError::NotReady(vec!["a".into(), "b".into()]).to_string(),
            "not ready: missing a, b"
        );
    }
}
