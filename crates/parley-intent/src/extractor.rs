//! Intent extractor abstraction
//!
//! The engine only ever sees [`IntentExtractor`]; the language model adapter
//! and the keyword adapter are interchangeable behind it.

use crate::candidate::CandidateIntent;
use crate::error::ExtractError;
use parley_schema::{ActionKind, ParamName, ParamValue};
use std::collections::BTreeMap;

/// How hard the extractor is pushed to follow the output contract
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Strictness {
    /// First attempt
    #[default]
    Standard,
    /// Re-prompt after a contract violation
    Strict,
}

/// Input to a single extraction
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractionRequest {
    /// Raw user utterance
    pub utterance: String,
    /// Action already settled by earlier turns
    pub known_action: Option<ActionKind>,
    /// Values already collected by earlier turns
    pub known_parameters: BTreeMap<ParamName, ParamValue>,
    /// Prompting strictness
    pub strictness: Strictness,
}

impl ExtractionRequest {
    /// Request for the first turn of a conversation
    #[must_use]
    pub fn initial(utterance: impl Into<String>) -> Self {
        Self {
            utterance: utterance.into(),
            known_action: None,
            known_parameters: BTreeMap::new(),
            strictness: Strictness::Standard,
        }
    }

    /// Request for a follow-up turn
    #[must_use]
    pub fn continuing(
        utterance: impl Into<String>,
        action: ActionKind,
        known_parameters: BTreeMap<ParamName, ParamValue>,
    ) -> Self {
        Self {
            utterance: utterance.into(),
            known_action: Some(action),
            known_parameters,
            strictness: Strictness::Standard,
        }
    }

    /// Same request, stricter
    #[inline]
    #[must_use]
    pub fn strict(mut self) -> Self {
        self.strictness = Strictness::Strict;
        self
    }
}

/// Turns free text into a candidate intent
///
/// Implementations return raw output; contract validation is the caller's
/// job so every adapter is held to the same rules.
#[async_trait::async_trait]
pub trait IntentExtractor: Send + Sync {
    /// Extract a candidate intent
    ///
    /// # Errors
    /// `Recoverable` for unusable output, `Unavailable`/`Timeout` when the
    /// backing service fails.
    async fn extract(&self, request: &ExtractionRequest) -> Result<CandidateIntent, ExtractError>;

    /// Short adapter name for logs
    fn name(&self) -> &'static str;
}
