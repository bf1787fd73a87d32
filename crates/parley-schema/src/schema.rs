//! Per-action schema
//!
//! An [`ActionSchema`] lists the parameters an action needs, in the fixed
//! order missing ones are asked about, plus optional parameters that are
//! always filled silently.

use crate::action::ActionKind;
use crate::error::SchemaError;
use crate::parameter::{ParamName, ParamValue, ParameterSpec, SuggestionPolicy};
use indexmap::IndexMap;
use serde::Serialize;
use serde_json::Value;
use std::collections::{BTreeSet, HashSet};

/// Parameter schema for one action
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionSchema {
    /// Action this schema describes
    pub action: ActionKind,
    /// One-line description (prompt and listing)
    pub description: String,
    /// Phrases that identify the action in free text
    pub keywords: Vec<String>,
    required: Vec<ParameterSpec>,
    optional: Vec<ParameterSpec>,
}

impl ActionSchema {
    /// Create empty schema
    #[must_use]
    pub fn new(action: ActionKind, description: impl Into<String>) -> Self {
        Self {
            action,
            description: description.into(),
            keywords: Vec::new(),
            required: Vec::new(),
            optional: Vec::new(),
        }
    }

    /// With keyword phrases
    #[must_use]
    pub fn with_keywords(mut self, keywords: &[&str]) -> Self {
        self.keywords = keywords.iter().map(|k| k.to_ascii_lowercase()).collect();
        self
    }

    /// Append a required parameter (declaration order is asking priority)
    #[must_use]
    pub fn require(mut self, spec: ParameterSpec) -> Self {
        self.required.push(spec);
        self
    }

    /// Append an optional parameter; it must carry a silent default
    #[must_use]
    pub fn optional(mut self, spec: ParameterSpec) -> Self {
        self.optional.push(spec);
        self
    }

    /// Check declarations: unique names, optional parameters defaulted
    ///
    /// # Errors
    /// `DuplicateParameter` or `MissingDefault`.
    pub fn validate(&self) -> Result<(), SchemaError> {
        let mut seen = HashSet::new();
        for spec in self.required.iter().chain(&self.optional) {
            if !seen.insert(spec.name.as_str()) {
                return Err(SchemaError::DuplicateParameter {
                    action: self.action,
                    parameter: spec.name.to_string(),
                });
            }
        }
        if let Some(spec) = self.optional.iter().find(|s| !s.has_silent_default()) {
            return Err(SchemaError::MissingDefault {
                action: self.action,
                parameter: spec.name.to_string(),
            });
        }
        Ok(())
    }

    /// Required parameters in priority order
    #[inline]
    #[must_use]
    pub fn required(&self) -> &[ParameterSpec] {
        &self.required
    }

    /// Optional (silently defaulted) parameters
    #[inline]
    #[must_use]
    pub fn optional_parameters(&self) -> &[ParameterSpec] {
        &self.optional
    }

    /// Every parameter a resolved state carries, in priority order
    ///
    /// Required parameters come first, then the optional ones.
    #[must_use]
    pub fn tracked_parameters(&self) -> Vec<ParamName> {
        self.required
            .iter()
            .chain(&self.optional)
            .map(|s| s.name.clone())
            .collect()
    }

    /// Look up a declared parameter
    #[must_use]
    pub fn parameter(&self, name: &str) -> Option<&ParameterSpec> {
        self.required
            .iter()
            .chain(&self.optional)
            .find(|s| s.name.as_str() == name)
    }

    /// Look up a declared parameter or fail
    ///
    /// # Errors
    /// `SchemaError::UnknownParameter` if undeclared.
    pub fn expect_parameter(&self, name: &str) -> Result<&ParameterSpec, SchemaError> {
        self.parameter(name)
            .ok_or_else(|| SchemaError::unknown_parameter(self.action, name))
    }

    /// Check whether a parameter is declared
    #[inline]
    #[must_use]
    pub fn declares(&self, name: &str) -> bool {
        self.parameter(name).is_some()
    }

    /// Asking priority (lower asks first)
    #[must_use]
    pub fn priority_of(&self, name: &str) -> Option<usize> {
        self.required
            .iter()
            .chain(&self.optional)
            .position(|s| s.name.as_str() == name)
    }

    /// Parameters that are filled without asking, with their values
    #[must_use]
    pub fn silent_defaults(&self) -> IndexMap<ParamName, ParamValue> {
        self.required
            .iter()
            .chain(&self.optional)
            .filter_map(|s| s.silent_default.clone().map(|v| (s.name.clone(), v)))
            .collect()
    }

    /// Parameters whose suggestions come from an external recency query
    #[must_use]
    pub fn defaults_require_external_suggestion(&self) -> BTreeSet<ParamName> {
        self.required
            .iter()
            .chain(&self.optional)
            .filter(|s| matches!(s.suggestions, SuggestionPolicy::RecentEntities { .. }))
            .map(|s| s.name.clone())
            .collect()
    }

    /// Coerce a value for a declared parameter
    ///
    /// # Errors
    /// `UnknownParameter` for undeclared names, `InvalidValue` for bad literals.
    pub fn coerce(&self, name: &str, value: &Value) -> Result<ParamValue, SchemaError> {
        self.expect_parameter(name)?.coerce(value)
    }
}
