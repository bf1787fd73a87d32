//! Structured-output contract
//!
//! Every extractor reply is checked here before it can touch conversation
//! state:
//! - the action must exist in the registry (and match the ongoing one)
//! - every parameter must be declared for that action
//! - every value must coerce to the parameter's kind
//! - `notFound` may only list declared, unfilled parameters
//!
//! Null values are treated as absent, since models commonly emit them for
//! parameters they could not find.

use crate::candidate::{CandidateIntent, ValidatedIntent};
use crate::error::ContractViolation;
use parley_schema::{ActionKind, ParamName, SchemaRegistry};
use std::collections::BTreeMap;

/// Validate a candidate against the registry
///
/// # Arguments
/// * `registry` - Schema table
/// * `candidate` - Raw extractor output
/// * `known_action` - Action of the ongoing conversation, if any
///
/// # Errors
/// Returns the first [`ContractViolation`] found.
pub fn validate(
    registry: &SchemaRegistry,
    candidate: &CandidateIntent,
    known_action: Option<ActionKind>,
) -> Result<ValidatedIntent, ContractViolation> {
    let name = candidate.action.trim();
    if name.is_empty() {
        return Err(ContractViolation::NoAction);
    }

    let action: ActionKind = name.parse()?;
    let schema = registry.get(action)?;

    if let Some(expected) = known_action {
        if expected != action {
            return Err(ContractViolation::ActionMismatch {
                expected,
                found: action,
            });
        }
    }

    let mut parameters = BTreeMap::new();
    for (name, value) in &candidate.parameters {
        if value.is_null() {
            continue;
        }
        let coerced = schema.coerce(name, value)?;
        parameters.insert(ParamName::new(name.as_str()), coerced);
    }

    let mut not_found = Vec::with_capacity(candidate.not_found.len());
    for name in &candidate.not_found {
        schema.expect_parameter(name)?;
        if parameters.contains_key(name.as_str()) {
            return Err(ContractViolation::ConflictingNotFound(name.clone()));
        }
        not_found.push(ParamName::new(name.as_str()));
    }

    Ok(ValidatedIntent {
        action,
        entity: candidate.entity.clone(),
        parameters,
        not_found,
        expert_mode_detected: candidate.expert_mode_detected,
        is_ready: candidate.is_ready,
    })
}
