//! Clarification formatter
//!
//! Turns the head missing parameter and its suggestions into a question and
//! quick replies. Templates are per [`ParameterKind`]; the wording never
//! depends on anything but its inputs.

use crate::error::FormatError;
use crate::suggestion::{Suggestion, MAX_SUGGESTIONS};
use parley_schema::{literal_string, ActionSchema, ParamName, ParamValue, ParameterKind};
use serde::Serialize;

/// Reply when the utterance could not be interpreted
pub const NOT_UNDERSTOOD: &str = "I didn't understand — could you rephrase?";

/// Reply when the extractor is down or too slow
pub const TRY_AGAIN: &str =
    "I can't process requests right now. Please try again in a moment.";

/// A rendered clarifying question
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Clarification {
    /// Parameter being asked about
    pub parameter: ParamName,
    /// Question text
    pub question: String,
    /// Literal replies the client can offer as buttons
    pub suggested_replies: Vec<String>,
}

/// Renders questions and notices
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClarificationFormatter {
    max_replies: usize,
}

impl Default for ClarificationFormatter {
    fn default() -> Self {
        Self::new(MAX_SUGGESTIONS)
    }
}

impl ClarificationFormatter {
    /// Create formatter; replies are capped at `max_replies` (at most 5)
    #[inline]
    #[must_use]
    pub fn new(max_replies: usize) -> Self {
        Self {
            max_replies: max_replies.min(MAX_SUGGESTIONS),
        }
    }

    /// Ask about one parameter
    ///
    /// # Errors
    /// `FormatError::UnknownParameter` if the schema does not declare it.
    pub fn clarify(
        &self,
        schema: &ActionSchema,
        parameter: &ParamName,
        suggestions: &[Suggestion],
    ) -> Result<Clarification, FormatError> {
        let spec = schema
            .parameter(parameter.as_str())
            .ok_or_else(|| FormatError::UnknownParameter {
                action: schema.action,
                parameter: parameter.to_string(),
            })?;

        let shown = &suggestions[..suggestions.len().min(self.max_replies)];
        let label = &spec.label;
        let question = match &spec.kind {
            ParameterKind::EntityRef { .. } if shown.is_empty() => {
                format!("Which {label} should I use? Please reply with its id.")
            }
            ParameterKind::EntityRef { .. } => {
                let recent = shown
                    .iter()
                    .map(|s| format!("{} ({})", s.reply(), s.label))
                    .collect::<Vec<_>>()
                    .join(", ");
                format!("Which {label} should I use? Reply with its id or pick a recent one: {recent}.")
            }
            ParameterKind::Choice { options } => {
                format!("Which {label} should I use? Options: {}.", options.join(", "))
            }
            ParameterKind::Integer { min, max } => {
                format!("What {label} should I use? Reply with a number from {min} to {max}.")
            }
            ParameterKind::Text => format!("What should the {label} be?"),
        };

        Ok(Clarification {
            parameter: spec.name.clone(),
            question,
            suggested_replies: shown.iter().map(Suggestion::reply).collect(),
        })
    }

    /// Notice listing values that were filled without asking
    ///
    /// Returns `None` when nothing was defaulted.
    #[must_use]
    pub fn defaults_notice(
        &self,
        schema: &ActionSchema,
        defaulted: &[(ParamName, ParamValue)],
    ) -> Option<String> {
        if defaulted.is_empty() {
            return None;
        }
        let listed = defaulted
            .iter()
            .map(|(name, value)| {
                let label = schema
                    .parameter(name.as_str())
                    .map_or(name.as_str(), |spec| spec.label.as_str());
                format!("{label} = {}", literal_string(value))
            })
            .collect::<Vec<_>>();
        Some(format!(
            "I used the default {}. Send an edit to change it.",
            join_natural(&listed)
        ))
    }

    /// Message ending a conversation that ran out of turns
    #[must_use]
    pub fn exhausted(
        &self,
        schema: &ActionSchema,
        missing: &[ParamName],
        max_turns: u32,
        manual_entry_url: Option<&str>,
    ) -> String {
        let labels = missing
            .iter()
            .map(|name| {
                schema
                    .parameter(name.as_str())
                    .map_or_else(|| name.to_string(), |spec| spec.label.clone())
            })
            .collect::<Vec<_>>();
        let mut message = format!(
            "We've reached the limit of {max_turns} questions and I still need the {}.",
            join_natural(&labels)
        );
        match manual_entry_url {
            Some(url) => {
                message.push_str(" Please finish this request in the manual entry form: ");
                message.push_str(url);
            }
            None => message.push_str(" Please finish this request in the manual entry form."),
        }
        message
    }
}

fn join_natural(items: &[String]) -> String {
    match items {
        [] => String::new(),
        [one] => one.clone(),
        [init @ .., last] => format!("{} and {last}", init.join(", ")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parley_schema::{ActionKind, SchemaRegistry};
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn schema(action: ActionKind) -> &'static ActionSchema {
        SchemaRegistry::global().get(action).unwrap()
    }

    #[test]
    fn entity_question_without_suggestions() {
        let c = ClarificationFormatter::default()
            .clarify(schema(ActionKind::CreateItems), &"containerId".into(), &[])
            .unwrap();
        assert_eq!(c.question, "Which container should I use? Please reply with its id.");
        assert!(c.suggested_replies.is_empty());
    }

    #[test]
    fn entity_question_lists_recent() {
        let suggestions = vec![
            Suggestion::new("containerId", "Network gear", 7),
            Suggestion::new("containerId", "Laptops", 3),
        ];
        let c = ClarificationFormatter::default()
            .clarify(schema(ActionKind::CreateItems), &"containerId".into(), &suggestions)
            .unwrap();
        assert!(c.question.contains("7 (Network gear), 3 (Laptops)"));
        assert_eq!(c.suggested_replies, vec!["7", "3"]);
    }

    #[test]
    fn replies_are_capped() {
        let suggestions: Vec<_> = (1..=8)
            .map(|i| Suggestion::new("projectId", format!("p{i}"), i))
            .collect();
        let c = ClarificationFormatter::new(50)
            .clarify(schema(ActionKind::CreateRisks), &"projectId".into(), &suggestions)
            .unwrap();
        assert_eq!(c.suggested_replies.len(), MAX_SUGGESTIONS);
    }

    #[test]
    fn choice_and_text_templates() {
        let f = ClarificationFormatter::default();
        let c = f
            .clarify(schema(ActionKind::CreateRisks), &"severity".into(), &[])
            .unwrap();
        assert_eq!(
            c.question,
            "Which severity should I use? Options: low, medium, high, critical."
        );
        let c = f
            .clarify(schema(ActionKind::CreateRisks), &"title".into(), &[])
            .unwrap();
        assert_eq!(c.question, "What should the risk title be?");
    }

    #[test]
    fn unknown_parameter() {
        let err = ClarificationFormatter::default()
            .clarify(schema(ActionKind::CreateItems), &"colour".into(), &[])
            .unwrap_err();
        assert!(matches!(err, FormatError::UnknownParameter { .. }));
    }

    #[test]
    fn defaults_notice_lists_labels() {
        let f = ClarificationFormatter::default();
        let schema = schema(ActionKind::CreateControls);
        assert_eq!(f.defaults_notice(schema, &[]), None);
        let notice = f
            .defaults_notice(
                schema,
                &[("count".into(), json!(10)), ("status".into(), json!("draft"))],
            )
            .unwrap();
        assert_eq!(
            notice,
            "I used the default number of controls = 10 and initial status = draft. \
             Send an edit to change it."
        );
    }

    #[test]
    fn exhausted_message() {
        let message = ClarificationFormatter::default().exhausted(
            schema(ActionKind::CreateItems),
            &["containerId".into(), "category".into()],
            5,
            Some("https://tracker.example/items/new"),
        );
        assert_eq!(
            message,
            "We've reached the limit of 5 questions and I still need the container and category. \
             Please finish this request in the manual entry form: https://tracker.example/items/new"
        );
    }
}
