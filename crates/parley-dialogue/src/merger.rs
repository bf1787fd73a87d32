//! Context merger
//!
//! Every state transition goes through [`ContextMerger`]:
//! - `initialize` builds the first state from a validated intent
//! - `merge_answer` folds a follow-up answer in (one clarification turn)
//! - `bind_literal` does the same for a bare reply to the awaited question
//! - `apply_edit` overwrites one value without consuming a turn
//! - `apply_default` fills a required parameter from its silent default
//! - `record_unproductive_turn` counts a turn that produced nothing
//!
//! Later values always win; `missing` is recomputed after every change.

use crate::error::MergeError;
use crate::state::ConversationState;
use parley_intent::ValidatedIntent;
use parley_schema::{ActionSchema, ParamName, ParamValue, SchemaRegistry};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Request to overwrite a single collected value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EditInstruction {
    /// Parameter to overwrite
    pub parameter_name: String,
    /// Replacement literal
    pub new_value: ParamValue,
}

impl EditInstruction {
    /// Create edit
    #[must_use]
    pub fn new(parameter_name: impl Into<String>, new_value: impl Into<ParamValue>) -> Self {
        Self {
            parameter_name: parameter_name.into(),
            new_value: new_value.into(),
        }
    }
}

/// Applies extractor output and edits to conversation state
#[derive(Debug, Clone, Copy)]
pub struct ContextMerger<'r> {
    registry: &'r SchemaRegistry,
}

impl<'r> ContextMerger<'r> {
    /// Create merger over a registry
    #[inline]
    #[must_use]
    pub fn new(registry: &'r SchemaRegistry) -> Self {
        Self { registry }
    }

    /// Schema for the state's action
    ///
    /// # Errors
    /// `SchemaError::UnknownAction` if the action is not registered.
    pub fn schema_for(&self, state: &ConversationState) -> Result<&'r ActionSchema, MergeError> {
        Ok(self.registry.get(state.action)?)
    }

    /// Build the initial state for a first utterance
    ///
    /// Optional parameters the utterance did not state get their silent
    /// default and are marked defaulted. `turn_count` starts at 0 when every
    /// required parameter is either stated or silently defaultable (expert
    /// mode) and at 1 otherwise, since a question will follow.
    ///
    /// # Errors
    /// `UnknownAction` if the intent's action is not registered,
    /// `UnknownParameter` if it carries an undeclared parameter.
    pub fn initialize(&self, intent: &ValidatedIntent) -> Result<ConversationState, MergeError> {
        let schema = self.registry.get(intent.action)?;

        let mut collected = std::collections::BTreeMap::new();
        for (name, value) in &intent.parameters {
            schema.expect_parameter(name.as_str())?;
            collected.insert(name.clone(), value.clone());
        }

        let mut defaulted = BTreeSet::new();
        for spec in schema.optional_parameters() {
            if collected.contains_key(&spec.name) {
                continue;
            }
            if let Some(value) = &spec.silent_default {
                collected.insert(spec.name.clone(), value.clone());
                defaulted.insert(spec.name.clone());
            }
        }

        let expert_ready = schema
            .required()
            .iter()
            .all(|spec| collected.contains_key(&spec.name) || spec.has_silent_default());

        let mut state = ConversationState {
            action: intent.action,
            required_parameters: schema.tracked_parameters(),
            collected_parameters: collected,
            missing_parameters: Vec::new(),
            turn_count: u32::from(!expert_ready),
            defaulted_parameters: defaulted,
            awaiting: None,
        };
        state.recompute_missing();

        tracing::debug!(
            action = %state.action,
            collected = state.collected_parameters.len(),
            missing = state.missing_parameters.len(),
            expert = expert_ready,
            "conversation initialized"
        );
        Ok(state)
    }

    /// Fold a follow-up answer into the state
    ///
    /// Consumes one clarification turn even if the answer carried nothing.
    ///
    /// # Errors
    /// `ActionMismatch` if the intent targets another action.
    pub fn merge_answer(
        &self,
        state: &mut ConversationState,
        intent: &ValidatedIntent,
    ) -> Result<(), MergeError> {
        if intent.action != state.action {
            return Err(MergeError::ActionMismatch {
                expected: state.action,
                found: intent.action,
            });
        }
        let schema = self.schema_for(state)?;
        for name in intent.parameters.keys() {
            schema.expect_parameter(name.as_str())?;
        }
        for (name, value) in &intent.parameters {
            set_value(state, name.clone(), value.clone());
        }
        state.recompute_missing();
        state.turn_count = state.turn_count.saturating_add(1);
        Ok(())
    }

    /// Bind a bare literal reply to a parameter
    ///
    /// Counts as one clarification turn.
    ///
    /// # Errors
    /// `UnknownParameter` or `InvalidValue` from the schema.
    pub fn bind_literal(
        &self,
        state: &mut ConversationState,
        name: &str,
        value: &ParamValue,
    ) -> Result<(), MergeError> {
        let spec = self.schema_for(state)?.expect_parameter(name)?;
        let value = spec.coerce(value)?;
        set_value(state, spec.name.clone(), value);
        state.recompute_missing();
        state.turn_count = state.turn_count.saturating_add(1);
        Ok(())
    }

    /// Overwrite one collected value
    ///
    /// Does not consume a turn. Applying the same edit twice is a no-op the
    /// second time.
    ///
    /// # Errors
    /// `UnknownParameter` if the action does not declare the parameter,
    /// `InvalidValue` if the literal does not coerce.
    pub fn apply_edit(
        &self,
        state: &mut ConversationState,
        edit: &EditInstruction,
    ) -> Result<(), MergeError> {
        let spec = self
            .schema_for(state)?
            .expect_parameter(&edit.parameter_name)?;
        let value = spec.coerce(&edit.new_value)?;
        tracing::debug!(parameter = %spec.name, "edit applied");
        set_value(state, spec.name.clone(), value);
        state.recompute_missing();
        Ok(())
    }

    /// Fill a parameter from its silent default
    ///
    /// Returns the injected value, or `None` if the parameter has no default
    /// or already holds a value.
    ///
    /// # Errors
    /// `UnknownParameter` if undeclared.
    pub fn apply_default(
        &self,
        state: &mut ConversationState,
        name: &str,
    ) -> Result<Option<ParamValue>, MergeError> {
        let spec = self.schema_for(state)?.expect_parameter(name)?;
        if state.has(name) {
            return Ok(None);
        }
        let Some(value) = spec.silent_default.clone() else {
            return Ok(None);
        };
        state
            .collected_parameters
            .insert(spec.name.clone(), value.clone());
        state.defaulted_parameters.insert(spec.name.clone());
        state.recompute_missing();
        Ok(Some(value))
    }

    /// Count a clarification turn that produced no usable answer
    pub fn record_unproductive_turn(&self, state: &mut ConversationState) {
        state.turn_count = state.turn_count.saturating_add(1);
    }

    /// Remember which parameter the next question is about
    pub fn await_parameter(&self, state: &mut ConversationState, name: Option<ParamName>) {
        state.awaiting = name;
    }
}

fn set_value(state: &mut ConversationState, name: ParamName, value: ParamValue) {
    state.defaulted_parameters.remove(&name);
    state.collected_parameters.insert(name, value);
}
