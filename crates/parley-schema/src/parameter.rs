//! Parameter declarations
//!
//! A parameter is a named, typed slot an action needs filled before it can
//! execute. The [`ParameterKind`] decides how literal values are coerced and
//! which question template is used when the slot is missing.

use crate::error::SchemaError;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::borrow::Borrow;
use std::fmt;
use uuid::Uuid;

/// Literal parameter value as carried on the wire
pub type ParamValue = Value;

/// Parameter name (camelCase on the wire, e.g. `containerId`)
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParamName(String);

impl ParamName {
    /// Create new parameter name
    #[inline]
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Borrow as str
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ParamName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ParamName {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for ParamName {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl Borrow<str> for ParamName {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl PartialEq<str> for ParamName {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl PartialEq<&str> for ParamName {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

/// Kinds of records an entity reference can point at
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    /// Generic item container
    Container,
    /// Compliance project
    Project,
    /// Compliance control
    Control,
}

impl EntityKind {
    /// Wire name
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Container => "container",
            EntityKind::Project => "project",
            EntityKind::Control => "control",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Value domain of a parameter
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ParameterKind {
    /// Reference to an existing record (positive integer id or UUID)
    EntityRef {
        /// Record kind
        entity: EntityKind,
    },
    /// One of a fixed set of options
    Choice {
        /// Canonical option spellings
        options: Vec<String>,
    },
    /// Bounded integer
    Integer {
        /// Inclusive lower bound
        min: i64,
        /// Inclusive upper bound
        max: i64,
    },
    /// Free text
    Text,
}

impl ParameterKind {
    /// Coerce a literal into the canonical form for this kind
    ///
    /// # Errors
    /// `SchemaError::InvalidValue` when the literal does not fit the domain.
    pub fn coerce(&self, parameter: &str, value: &Value) -> Result<Value, SchemaError> {
        let invalid = |reason: &str| SchemaError::invalid_value(parameter, reason);

        match self {
            ParameterKind::EntityRef { entity } => match value {
                Value::Number(n) => n
                    .as_i64()
                    .filter(|id| *id > 0)
                    .map(Value::from)
                    .ok_or_else(|| invalid(&format!("expected a {entity} id"))),
                Value::String(s) => {
                    let token = s.trim().trim_start_matches('#');
                    if let Ok(id) = token.parse::<i64>() {
                        if id > 0 {
                            return Ok(Value::from(id));
                        }
                    }
                    Uuid::parse_str(token)
                        .map(|uuid| Value::String(uuid.hyphenated().to_string()))
                        .map_err(|_| invalid(&format!("'{s}' is not a {entity} id")))
                }
                _ => Err(invalid(&format!("expected a {entity} id"))),
            },
            ParameterKind::Choice { options } => {
                let raw = match value {
                    Value::String(s) => s.clone(),
                    Value::Number(n) => n.to_string(),
                    _ => return Err(invalid("expected one of the listed options")),
                };
                let wanted = normalize_option(&raw);
                options
                    .iter()
                    .find(|option| normalize_option(option) == wanted)
                    .map(|option| Value::String(option.clone()))
                    .ok_or_else(|| {
                        invalid(&format!("'{raw}' is not one of {}", options.join(", ")))
                    })
            }
            ParameterKind::Integer { min, max } => {
                let parsed = match value {
                    Value::Number(n) => n.as_i64(),
                    Value::String(s) => s.trim().parse::<i64>().ok(),
                    _ => None,
                };
                match parsed {
                    Some(n) if (*min..=*max).contains(&n) => Ok(Value::from(n)),
                    Some(n) => Err(invalid(&format!("{n} is outside {min}..={max}"))),
                    None => Err(invalid("expected an integer")),
                }
            }
            ParameterKind::Text => match value {
                Value::String(s) if !s.trim().is_empty() => Ok(Value::String(s.trim().to_string())),
                Value::Number(_) | Value::Bool(_) => Ok(Value::String(value.to_string())),
                _ => Err(invalid("expected non-empty text")),
            },
        }
    }

    /// Interpret a bare reply (e.g. a tapped quick-reply) as a literal
    ///
    /// Only single tokens (or a single quoted string) qualify; anything
    /// longer is left to the intent extractor.
    #[must_use]
    pub fn parse_literal(&self, utterance: &str) -> Option<Value> {
        let trimmed = utterance.trim().trim_end_matches(['.', '!']);
        let token = strip_quotes(trimmed).or_else(|| {
            (!trimmed.is_empty() && !trimmed.contains(char::is_whitespace)).then_some(trimmed)
        })?;
        self.coerce("", &Value::String(token.to_string())).ok()
    }
}

fn normalize_option(raw: &str) -> String {
    raw.trim().to_ascii_lowercase().replace([' ', '-'], "_")
}

fn strip_quotes(s: &str) -> Option<&str> {
    ['"', '\''].into_iter().find_map(|q| {
        s.strip_prefix(q)
            .and_then(|rest| rest.strip_suffix(q))
            .filter(|inner| !inner.trim().is_empty())
    })
}

/// Render a literal the way a user would type it back
#[must_use]
pub fn literal_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Where suggestions for a missing parameter come from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "source", rename_all = "snake_case")]
pub enum SuggestionPolicy {
    /// Nothing to suggest
    None,
    /// The declared options of a choice parameter
    StaticChoices,
    /// Most recently touched records of this kind owned by the caller
    RecentEntities {
        /// Record kind to query
        entity: EntityKind,
    },
}

/// Declaration of a single parameter
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ParameterSpec {
    /// Parameter name
    pub name: ParamName,
    /// Human label used in questions
    pub label: String,
    /// Description handed to the language model
    pub description: String,
    /// Value domain
    pub kind: ParameterKind,
    /// Value injected without asking, if any
    pub silent_default: Option<ParamValue>,
    /// Suggestion source when the value is missing
    pub suggestions: SuggestionPolicy,
}

impl ParameterSpec {
    /// Create new parameter spec
    ///
    /// The suggestion policy follows the kind: entity references query recent
    /// records, choices offer their options, everything else suggests nothing.
    #[must_use]
    pub fn new(name: &str, label: &str, kind: ParameterKind) -> Self {
        let suggestions = match &kind {
            ParameterKind::EntityRef { entity } => SuggestionPolicy::RecentEntities { entity: *entity },
            ParameterKind::Choice { .. } => SuggestionPolicy::StaticChoices,
            ParameterKind::Integer { .. } | ParameterKind::Text => SuggestionPolicy::None,
        };
        Self {
            name: ParamName::new(name),
            label: label.to_string(),
            description: String::new(),
            kind,
            silent_default: None,
            suggestions,
        }
    }

    /// Entity reference parameter
    #[inline]
    #[must_use]
    pub fn entity(name: &str, label: &str, entity: EntityKind) -> Self {
        Self::new(name, label, ParameterKind::EntityRef { entity })
    }

    /// Choice parameter
    #[must_use]
    pub fn choice(name: &str, label: &str, options: &[&str]) -> Self {
        Self::new(
            name,
            label,
            ParameterKind::Choice {
                options: options.iter().map(|o| (*o).to_string()).collect(),
            },
        )
    }

    /// Bounded integer parameter
    #[inline]
    #[must_use]
    pub fn integer(name: &str, label: &str, min: i64, max: i64) -> Self {
        Self::new(name, label, ParameterKind::Integer { min, max })
    }

    /// Free text parameter
    #[inline]
    #[must_use]
    pub fn text(name: &str, label: &str) -> Self {
        Self::new(name, label, ParameterKind::Text)
    }

    /// With description
    #[inline]
    #[must_use]
    pub fn describe(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// With silent default
    #[inline]
    #[must_use]
    pub fn with_default(mut self, value: impl Into<ParamValue>) -> Self {
        self.silent_default = Some(value.into());
        self
    }

    /// With explicit suggestion policy
    #[inline]
    #[must_use]
    pub fn with_suggestions(mut self, policy: SuggestionPolicy) -> Self {
        self.suggestions = policy;
        self
    }

    /// Check whether a silent default is declared
    #[inline]
    #[must_use]
    pub fn has_silent_default(&self) -> bool {
        self.silent_default.is_some()
    }

    /// Coerce a literal for this parameter
    ///
    /// # Errors
    /// `SchemaError::InvalidValue` when the literal does not fit the kind.
    #[inline]
    pub fn coerce(&self, value: &Value) -> Result<Value, SchemaError> {
        self.kind.coerce(self.name.as_str(), value)
    }
}
