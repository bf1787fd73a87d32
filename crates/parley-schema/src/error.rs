//! Error types for the schema registry

use crate::action::ActionKind;

/// Schema lookup and validation errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SchemaError {
    /// Action is not part of the supported enumeration or not registered
    #[error("unknown action: '{0}'")]
    UnknownAction(String),

    /// Parameter is not declared for the action
    #[error("parameter '{parameter}' is not declared for action {action}")]
    UnknownParameter {
        /// Action the lookup was made against
        action: ActionKind,
        /// Offending parameter name
        parameter: String,
    },

    /// Value cannot be coerced to the declared parameter kind
    #[error("invalid value for '{parameter}': {reason}")]
    InvalidValue {
        /// Parameter being assigned
        parameter: String,
        /// Why coercion failed
        reason: String,
    },

    /// Optional parameter registered without a silent default
    #[error("optional parameter '{parameter}' of {action} has no silent default")]
    MissingDefault {
        /// Action being registered
        action: ActionKind,
        /// Offending parameter name
        parameter: String,
    },

    /// Same parameter declared twice for one action
    #[error("parameter '{parameter}' declared twice for {action}")]
    DuplicateParameter {
        /// Action being registered
        action: ActionKind,
        /// Offending parameter name
        parameter: String,
    },
}

impl SchemaError {
    /// Create unknown parameter error
    pub fn unknown_parameter(action: ActionKind, parameter: impl Into<String>) -> Self {
        Self::UnknownParameter {
            action,
            parameter: parameter.into(),
        }
    }

    /// Create invalid value error
    pub fn invalid_value(parameter: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidValue {
            parameter: parameter.into(),
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_parameter_display() {
        let err = SchemaError::unknown_parameter(ActionKind::CreateItems, "colour");
        assert_eq!(
            err.to_string(),
            "parameter 'colour' is not declared for action create_items"
        );
    }

    #[test]
    fn invalid_value_display() {
        let err = SchemaError::invalid_value("count", "expected an integer");
        assert!(err.to_string().contains("count"));
        assert!(err.to_string().contains("expected an integer"));
    }
}
