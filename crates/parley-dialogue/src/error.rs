//! Error types for conversation state handling

use parley_schema::{ActionKind, SchemaError};

/// Errors raised while merging into conversation state
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MergeError {
    /// Schema lookup or coercion failed
    #[error(transparent)]
    Schema(#[from] SchemaError),

    /// Candidate targets a different action than the conversation
    #[error("conversation is about {expected}, not {found}")]
    ActionMismatch {
        /// Conversation action
        expected: ActionKind,
        /// Candidate action
        found: ActionKind,
    },
}

/// Violations found when checking a decoded state
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StateError {
    /// Action is not registered
    #[error(transparent)]
    Schema(#[from] SchemaError),

    /// Tracked parameter list differs from the schema
    #[error("required parameters do not match the schema for {0}")]
    SchemaDrift(ActionKind),

    /// A parameter is both collected and missing
    #[error("parameter '{0}' is both collected and missing")]
    Overlap(String),

    /// A tracked parameter is neither collected nor missing
    #[error("parameter '{0}' is neither collected nor missing")]
    Untracked(String),

    /// Missing list is not in asking priority order
    #[error("missing parameters are out of priority order")]
    OutOfOrder,

    /// Defaulted marker without a collected value
    #[error("parameter '{0}' is marked defaulted but not collected")]
    DanglingDefault(String),
}

/// Clarification rendering errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FormatError {
    /// No template for the parameter (undeclared for the action)
    #[error("no question template for '{parameter}' of {action}")]
    UnknownParameter {
        /// Conversation action
        action: ActionKind,
        /// Parameter asked about
        parameter: String,
    },
}
