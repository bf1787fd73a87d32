//! Candidate intents
//!
//! [`CandidateIntent`] is the raw structured output an extractor produces;
//! [`ValidatedIntent`] is the same data after the contract check, with the
//! action resolved and every value coerced to its canonical form.

use parley_schema::{ActionKind, ParamName, ParamValue};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Raw extractor output
///
/// This is the JSON object the language model is instructed to return.
/// Unknown fields are ignored; missing collections default to empty.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct CandidateIntent {
    /// Action name, e.g. `create_items`
    #[serde(default)]
    pub action: String,

    /// Entity the action operates on, e.g. `items`
    #[serde(default)]
    pub entity: Option<String>,

    /// Parameters stated in the utterance, keyed by parameter name
    #[serde(default)]
    pub parameters: BTreeMap<String, Value>,

    /// Declared parameters the utterance did not mention
    #[serde(default)]
    pub not_found: Vec<String>,

    /// Whether the utterance already carries everything required
    #[serde(default)]
    pub expert_mode_detected: bool,

    /// Advisory readiness flag; the engine recomputes readiness itself
    #[serde(default)]
    pub is_ready: bool,
}

impl CandidateIntent {
    /// Create candidate for an action
    #[must_use]
    pub fn new(action: impl Into<String>) -> Self {
        Self {
            action: action.into(),
            ..Self::default()
        }
    }

    /// With parameter
    #[must_use]
    pub fn with_parameter(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.parameters.insert(name.into(), value.into());
        self
    }

    /// With not-found marker
    #[must_use]
    pub fn with_not_found(mut self, name: impl Into<String>) -> Self {
        self.not_found.push(name.into());
        self
    }

    /// With entity
    #[must_use]
    pub fn with_entity(mut self, entity: impl Into<String>) -> Self {
        self.entity = Some(entity.into());
        self
    }

    /// Mark as expert-mode (all required parameters stated)
    #[must_use]
    pub fn expert(mut self) -> Self {
        self.expert_mode_detected = true;
        self.is_ready = true;
        self
    }
}

/// Extractor output that passed the contract check
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedIntent {
    /// Resolved action
    pub action: ActionKind,
    /// Entity hint, if any
    pub entity: Option<String>,
    /// Coerced parameter values
    pub parameters: BTreeMap<ParamName, ParamValue>,
    /// Declared parameters flagged as absent
    pub not_found: Vec<ParamName>,
    /// Extractor's expert-mode flag
    pub expert_mode_detected: bool,
    /// Extractor's advisory readiness flag
    pub is_ready: bool,
}

impl ValidatedIntent {
    /// Intent for an action with no parameters
    #[must_use]
    pub fn empty(action: ActionKind) -> Self {
        Self {
            action,
            entity: None,
            parameters: BTreeMap::new(),
            not_found: Vec::new(),
            expert_mode_detected: false,
            is_ready: false,
        }
    }

    /// With parameter (already canonical)
    #[must_use]
    pub fn with_parameter(mut self, name: &str, value: impl Into<ParamValue>) -> Self {
        self.parameters.insert(ParamName::new(name), value.into());
        self
    }
}
