//! Conversation state
//!
//! [`ConversationState`] is the whole memory of a conversation. It travels
//! to the client and back on every turn; nothing is kept server-side.
//!
//! Invariants (checked by [`ConversationState::check`]):
//! - `collected` and `missing` are disjoint
//! - their union equals `required`, which equals the schema's tracked list
//! - `missing` is in the schema's asking priority order
//! - every defaulted parameter is collected

use crate::error::StateError;
use parley_schema::{ActionKind, ActionSchema, ParamName, ParamValue};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Accumulated state of one conversation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ConversationState {
    pub(crate) action: ActionKind,
    pub(crate) required_parameters: Vec<ParamName>,
    pub(crate) collected_parameters: BTreeMap<ParamName, ParamValue>,
    pub(crate) missing_parameters: Vec<ParamName>,
    pub(crate) turn_count: u32,
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub(crate) defaulted_parameters: BTreeSet<ParamName>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) awaiting: Option<ParamName>,
}

impl ConversationState {
    /// Action being resolved
    #[inline]
    #[must_use]
    pub fn action(&self) -> ActionKind {
        self.action
    }

    /// Every parameter tracked for the action, in priority order
    #[inline]
    #[must_use]
    pub fn required_parameters(&self) -> &[ParamName] {
        &self.required_parameters
    }

    /// Values collected so far
    #[inline]
    #[must_use]
    pub fn collected_parameters(&self) -> &BTreeMap<ParamName, ParamValue> {
        &self.collected_parameters
    }

    /// Parameters still needed, in asking order
    #[inline]
    #[must_use]
    pub fn missing_parameters(&self) -> &[ParamName] {
        &self.missing_parameters
    }

    /// Clarification turns consumed
    #[inline]
    #[must_use]
    pub fn turn_count(&self) -> u32 {
        self.turn_count
    }

    /// Parameters filled from silent defaults and not since overridden
    #[inline]
    #[must_use]
    pub fn defaulted_parameters(&self) -> &BTreeSet<ParamName> {
        &self.defaulted_parameters
    }

    /// Parameter the last clarification asked about
    #[inline]
    #[must_use]
    pub fn awaiting(&self) -> Option<&ParamName> {
        self.awaiting.as_ref()
    }

    /// Highest-priority missing parameter
    #[inline]
    #[must_use]
    pub fn next_missing(&self) -> Option<&ParamName> {
        self.missing_parameters.first()
    }

    /// Check if nothing is missing
    #[inline]
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.missing_parameters.is_empty()
    }

    /// Check if a parameter holds a value
    #[inline]
    #[must_use]
    pub fn has(&self, name: &str) -> bool {
        self.collected_parameters.contains_key(name)
    }

    /// Collected values keyed by plain strings, for handoff
    #[must_use]
    pub fn parameter_map(&self) -> BTreeMap<String, ParamValue> {
        self.collected_parameters
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    /// Verify the structural invariants against the action's schema
    ///
    /// # Errors
    /// Returns the first violated invariant.
    pub fn check(&self, schema: &ActionSchema) -> Result<(), StateError> {
        if schema.action != self.action || schema.tracked_parameters() != self.required_parameters {
            return Err(StateError::SchemaDrift(self.action));
        }

        for name in &self.missing_parameters {
            if self.collected_parameters.contains_key(name) {
                return Err(StateError::Overlap(name.to_string()));
            }
        }

        for name in &self.required_parameters {
            let collected = self.collected_parameters.contains_key(name);
            let missing = self.missing_parameters.contains(name);
            if !collected && !missing {
                return Err(StateError::Untracked(name.to_string()));
            }
        }
        let tracked = self.collected_parameters.len() + self.missing_parameters.len();
        if let Some(extra) = self
            .collected_parameters
            .keys()
            .chain(&self.missing_parameters)
            .find(|name| !self.required_parameters.contains(name))
        {
            return Err(StateError::Untracked(extra.to_string()));
        }
        if tracked != self.required_parameters.len() {
            return Err(StateError::OutOfOrder);
        }

        let priorities: Vec<usize> = self
            .missing_parameters
            .iter()
            .filter_map(|name| schema.priority_of(name.as_str()))
            .collect();
        if priorities.windows(2).any(|w| w[0] >= w[1]) {
            return Err(StateError::OutOfOrder);
        }

        if let Some(name) = self
            .defaulted_parameters
            .iter()
            .find(|name| !self.collected_parameters.contains_key(*name))
        {
            return Err(StateError::DanglingDefault(name.to_string()));
        }

        Ok(())
    }

    /// Rebuild `missing` from `required` minus `collected`
    ///
    /// `required` is already in priority order, so filtering keeps it.
    pub(crate) fn recompute_missing(&mut self) {
        self.missing_parameters = self
            .required_parameters
            .iter()
            .filter(|name| !self.collected_parameters.contains_key(*name))
            .cloned()
            .collect();
        if self
            .awaiting
            .as_ref()
            .is_some_and(|name| self.collected_parameters.contains_key(name))
        {
            self.awaiting = None;
        }
    }
}
