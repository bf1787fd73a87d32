//! Keyword extractor
//!
//! Deterministic, offline [`IntentExtractor`]. Actions are detected by
//! keyword phrases from the registry; parameters by:
//! - `name=value` / `name: value` / `name is value` pairs
//! - `<label> <id>` for entity references (`container 7`, `project #4`)
//! - bare option words for choice parameters (`soc2`, `critical`)
//!
//! Values that do not coerce are dropped so the parameter is asked for
//! instead.

use crate::candidate::CandidateIntent;
use crate::error::{ContractViolation, ExtractError};
use crate::extractor::{ExtractionRequest, IntentExtractor};
use once_cell::sync::Lazy;
use parley_schema::{ActionSchema, ParameterKind, SchemaRegistry};
use regex::Regex;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;

static PAIR: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)\b([a-z][a-z0-9_]*)\s*(?:=|:|\s+is\s+)\s*("[^"]*"|'[^']*'|[^\s,;]+)"#)
        .expect("pair pattern is valid")
});

/// Keyword-driven extractor
#[derive(Debug, Clone)]
pub struct KeywordIntentExtractor {
    registry: Arc<SchemaRegistry>,
}

impl KeywordIntentExtractor {
    /// Create extractor over a registry
    #[must_use]
    pub fn new(registry: Arc<SchemaRegistry>) -> Self {
        Self { registry }
    }

    fn detect_action<'a>(&'a self, text: &str) -> Option<&'a ActionSchema> {
        let mut best: Option<(&ActionSchema, usize)> = None;
        for schema in self.registry.schemas() {
            let score = schema
                .keywords
                .iter()
                .filter(|k| contains_phrase(text, k))
                .map(|k| k.len())
                .sum::<usize>();
            if score > 0 && best.map_or(true, |(_, top)| score > top) {
                best = Some((schema, score));
            }
        }
        best.map(|(schema, _)| schema)
    }
}

#[async_trait::async_trait]
impl IntentExtractor for KeywordIntentExtractor {
    async fn extract(&self, request: &ExtractionRequest) -> Result<CandidateIntent, ExtractError> {
        let text = request.utterance.to_ascii_lowercase();

        let schema = match request.known_action {
            Some(action) => self.registry.get(action).map_err(ContractViolation::from)?,
            None => self.detect_action(&text).ok_or(ContractViolation::NoAction)?,
        };

        let parameters = extract_parameters(schema, &request.utterance);
        let not_found: Vec<String> = schema
            .tracked_parameters()
            .into_iter()
            .filter(|name| !parameters.contains_key(name.as_str()))
            .map(|name| name.to_string())
            .collect();
        let expert = schema
            .required()
            .iter()
            .all(|spec| parameters.contains_key(spec.name.as_str()));

        tracing::debug!(
            action = %schema.action,
            found = parameters.len(),
            "keyword extraction"
        );

        Ok(CandidateIntent {
            action: schema.action.to_string(),
            entity: None,
            parameters,
            not_found,
            expert_mode_detected: expert,
            is_ready: expert,
        })
    }

    fn name(&self) -> &'static str {
        "keyword"
    }
}

fn extract_parameters(schema: &ActionSchema, utterance: &str) -> BTreeMap<String, Value> {
    let mut found = BTreeMap::new();
    let lowered = utterance.to_ascii_lowercase();

    for caps in PAIR.captures_iter(utterance) {
        let key = compact(&caps[1]);
        let raw = caps[2].trim_matches(['"', '\'']);
        let spec = schema
            .required()
            .iter()
            .chain(schema.optional_parameters())
            .find(|s| compact(s.name.as_str()) == key || compact(&s.label) == key);
        if let Some(spec) = spec {
            if let Ok(value) = spec.coerce(&Value::String(raw.to_string())) {
                found.insert(spec.name.to_string(), value);
            }
        }
    }

    for spec in schema.required().iter().chain(schema.optional_parameters()) {
        if found.contains_key(spec.name.as_str()) {
            continue;
        }
        let value = match &spec.kind {
            ParameterKind::EntityRef { .. } => entity_mention(&spec.label, utterance)
                .and_then(|raw| spec.coerce(&Value::String(raw)).ok()),
            ParameterKind::Choice { options } => options
                .iter()
                .find(|option| {
                    contains_phrase(&lowered, option)
                        || contains_phrase(&lowered, &option.replace('_', " "))
                })
                .map(|option| Value::String(option.clone())),
            ParameterKind::Integer { .. } | ParameterKind::Text => None,
        };
        if let Some(value) = value {
            found.insert(spec.name.to_string(), value);
        }
    }

    found
}

fn entity_mention(label: &str, utterance: &str) -> Option<String> {
    let pattern = format!(r"(?i)\b{}\s+(?:id\s+)?(#?[0-9]+)\b", regex::escape(label));
    let re = Regex::new(&pattern).ok()?;
    re.captures(utterance).map(|caps| caps[1].to_string())
}

fn contains_phrase(text: &str, phrase: &str) -> bool {
    text.match_indices(phrase).any(|(at, _)| {
        let before = text[..at].chars().next_back();
        let after = text[at + phrase.len()..].chars().next();
        !before.is_some_and(char::is_alphanumeric) && !after.is_some_and(char::is_alphanumeric)
    })
}

fn compact(name: &str) -> String {
    name.chars()
        .filter(char::is_ascii_alphanumeric)
        .map(|c| c.to_ascii_lowercase())
        .collect()
}
