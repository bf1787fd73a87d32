//! Suggested values for a missing parameter

use parley_schema::{literal_string, ParamName, ParamValue};
use serde::{Deserialize, Serialize};

/// Most suggestions ever offered for one question
pub const MAX_SUGGESTIONS: usize = 5;

/// One candidate value offered to the user
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Suggestion {
    /// Parameter the value is for
    pub parameter_name: ParamName,
    /// Human-readable label, e.g. the record's name
    pub label: String,
    /// Literal value; replying with its string form binds it
    pub value: ParamValue,
}

impl Suggestion {
    /// Create suggestion
    #[must_use]
    pub fn new(
        parameter_name: impl Into<ParamName>,
        label: impl Into<String>,
        value: impl Into<ParamValue>,
    ) -> Self {
        Self {
            parameter_name: parameter_name.into(),
            label: label.into(),
            value: value.into(),
        }
    }

    /// Reply text that selects this suggestion
    #[inline]
    #[must_use]
    pub fn reply(&self) -> String {
        literal_string(&self.value)
    }
}
