//! Prompt construction for the language model extractor
//!
//! The system prompt enumerates every registered action with its parameters
//! and embeds the JSON schema of [`CandidateIntent`] so the model has a
//! single output contract to follow.

use crate::candidate::CandidateIntent;
use crate::extractor::{ExtractionRequest, Strictness};
use parley_schema::{literal_string, ParameterKind, ParameterSpec, SchemaRegistry};
use schemars::schema_for;
use std::fmt::Write as _;

const PREAMBLE: &str = "You turn requests typed into a compliance tracking application \
into a single JSON object describing the task the user wants to run.";

const RULES: &str = "Rules:
- \"action\" must be exactly one of the action names listed above.
- Put a parameter in \"parameters\" only if the user stated its value; never guess.
- List every parameter of the chosen action that the user did not state in \"notFound\".
- Set \"expertModeDetected\" to true only when every required parameter was stated.";

const STRICT_RULES: &str = "Your previous reply could not be used.
- Reply with the JSON object only: no prose, no markdown, no code fences.
- Use only the parameter names listed for the chosen action, spelled exactly.
- Use values of the documented kind (numeric ids, listed options).";

/// Builds system and user prompts from the registry
#[derive(Debug, Clone)]
pub struct PromptBuilder {
    catalog: String,
    output_schema: String,
}

impl PromptBuilder {
    /// Create builder for a registry
    #[must_use]
    pub fn new(registry: &SchemaRegistry) -> Self {
        let mut catalog = String::from("Supported actions:\n");
        for schema in registry.schemas() {
            let _ = writeln!(catalog, "- {}: {}", schema.action, schema.description);
            for spec in schema.required() {
                let _ = writeln!(catalog, "    {} (required) {}", spec.name, describe(spec));
            }
            for spec in schema.optional_parameters() {
                let _ = writeln!(catalog, "    {} (optional) {}", spec.name, describe(spec));
            }
        }

        let output_schema = serde_json::to_string_pretty(&schema_for!(CandidateIntent))
            .unwrap_or_else(|_| "{}".to_string());

        Self {
            catalog,
            output_schema,
        }
    }

    /// System prompt for the given strictness
    #[must_use]
    pub fn system_prompt(&self, strictness: Strictness) -> String {
        let mut prompt = format!(
            "{PREAMBLE}\n\n{}\nReply with one JSON object matching this JSON schema:\n{}\n\n{RULES}",
            self.catalog, self.output_schema
        );
        if strictness == Strictness::Strict {
            prompt.push_str("\n\n");
            prompt.push_str(STRICT_RULES);
        }
        prompt
    }

    /// User prompt carrying the utterance and any prior conversation
    #[must_use]
    pub fn user_prompt(&self, request: &ExtractionRequest) -> String {
        match request.known_action {
            None => format!("User message: {}", request.utterance),
            Some(action) => {
                let known = serde_json::to_string(&request.known_parameters)
                    .unwrap_or_else(|_| "{}".to_string());
                format!(
                    "The conversation is about action \"{action}\". \
                     Parameters collected so far: {known}.\n\
                     Return the same action and only the parameters stated in the new message.\n\
                     User message: {}",
                    request.utterance
                )
            }
        }
    }
}

fn describe(spec: &ParameterSpec) -> String {
    let kind = match &spec.kind {
        ParameterKind::EntityRef { entity } => format!("[{entity} id]"),
        ParameterKind::Choice { options } => format!("[one of: {}]", options.join(", ")),
        ParameterKind::Integer { min, max } => format!("[integer {min}..={max}]"),
        ParameterKind::Text => "[text]".to_string(),
    };
    let mut line = format!("{kind} {}", spec.description);
    if let Some(default) = &spec.silent_default {
        let _ = write!(line, " (defaults to {})", literal_string(default));
    }
    line
}
