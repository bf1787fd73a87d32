//! Default & suggestion resolver
//!
//! For the parameter at the head of the missing list:
//! - a declared silent default is returned as is
//! - choice parameters suggest their options
//! - entity references query a tenant-scoped [`SuggestionSource`] for recent
//!   records under a timeout
//!
//! Suggestion failures never fail the turn; they degrade to no suggestions.

use crate::error::SourceError;
use crate::types::CallerIdentity;
use parley_dialogue::{Suggestion, MAX_SUGGESTIONS};
use parley_schema::{
    ActionSchema, EntityKind, ParamName, ParamValue, ParameterKind, SchemaError, SuggestionPolicy,
};
use std::sync::Arc;
use std::time::Duration;

/// Recency query for one parameter
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RecentQuery {
    /// Tenant scope
    pub tenant_id: String,
    /// Requesting user
    pub user_id: String,
    /// Parameter the suggestions are for
    pub parameter: ParamName,
    /// Record kind to list
    pub entity: EntityKind,
    /// Maximum number of records
    pub limit: usize,
}

/// Read-only, tenant-scoped source of recently used records
#[async_trait::async_trait]
pub trait SuggestionSource: Send + Sync {
    /// Most recently used records first
    ///
    /// # Errors
    /// `SourceError` when the source cannot answer.
    async fn recent(&self, query: &RecentQuery) -> Result<Vec<Suggestion>, SourceError>;
}

/// Resolver output for one parameter
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Resolution {
    /// Value to inject without asking
    pub silent_default: Option<ParamValue>,
    /// Values to offer (at most 5)
    pub suggestions: Vec<Suggestion>,
}

/// Resolves silent defaults and suggestions
#[derive(Clone)]
pub struct SuggestionResolver {
    source: Option<Arc<dyn SuggestionSource>>,
    timeout: Duration,
    limit: usize,
}

impl std::fmt::Debug for SuggestionResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SuggestionResolver")
            .field("has_source", &self.source.is_some())
            .field("timeout", &self.timeout)
            .field("limit", &self.limit)
            .finish()
    }
}

impl SuggestionResolver {
    /// Create resolver
    ///
    /// `limit` is capped at 5.
    #[must_use]
    pub fn new(source: Option<Arc<dyn SuggestionSource>>, timeout: Duration, limit: usize) -> Self {
        Self {
            source,
            timeout,
            limit: limit.min(MAX_SUGGESTIONS),
        }
    }

    /// Silent default for a parameter, if declared
    ///
    /// # Errors
    /// `UnknownParameter` if the schema does not declare it.
    pub fn silent_default(
        &self,
        schema: &ActionSchema,
        parameter: &ParamName,
    ) -> Result<Option<ParamValue>, SchemaError> {
        Ok(schema
            .expect_parameter(parameter.as_str())?
            .silent_default
            .clone())
    }

    /// Resolve a parameter: its silent default, or else suggestions
    ///
    /// # Errors
    /// `UnknownParameter` if the schema does not declare it.
    pub async fn resolve(
        &self,
        schema: &ActionSchema,
        parameter: &ParamName,
        caller: &CallerIdentity,
    ) -> Result<Resolution, SchemaError> {
        if let Some(value) = self.silent_default(schema, parameter)? {
            return Ok(Resolution {
                silent_default: Some(value),
                suggestions: Vec::new(),
            });
        }
        Ok(Resolution {
            silent_default: None,
            suggestions: self.suggestions(schema, parameter, caller).await?,
        })
    }

    /// Suggestions for a parameter, most relevant first
    ///
    /// # Errors
    /// `UnknownParameter` if the schema does not declare it.
    pub async fn suggestions(
        &self,
        schema: &ActionSchema,
        parameter: &ParamName,
        caller: &CallerIdentity,
    ) -> Result<Vec<Suggestion>, SchemaError> {
        let spec = schema.expect_parameter(parameter.as_str())?;

        let suggestions = match (&spec.suggestions, &spec.kind) {
            (SuggestionPolicy::None, _) => Vec::new(),
            (SuggestionPolicy::StaticChoices, ParameterKind::Choice { options }) => options
                .iter()
                .take(self.limit)
                .map(|option| Suggestion::new(spec.name.clone(), option.clone(), option.as_str()))
                .collect(),
            (SuggestionPolicy::StaticChoices, _) => Vec::new(),
            (SuggestionPolicy::RecentEntities { entity }, _) => {
                let query = RecentQuery {
                    tenant_id: caller.tenant_id.clone(),
                    user_id: caller.user_id.clone(),
                    parameter: spec.name.clone(),
                    entity: *entity,
                    limit: self.limit,
                };
                self.query_recent(&query).await
            }
        };

        // Only offer values that bind when sent back
        Ok(suggestions
            .into_iter()
            .filter_map(|s| {
                spec.coerce(&s.value)
                    .ok()
                    .map(|value| Suggestion::new(spec.name.clone(), s.label, value))
            })
            .take(self.limit)
            .collect())
    }

    async fn query_recent(&self, query: &RecentQuery) -> Vec<Suggestion> {
        let Some(source) = &self.source else {
            return Vec::new();
        };
        match tokio::time::timeout(self.timeout, source.recent(query)).await {
            Ok(Ok(found)) => found,
            Ok(Err(err)) => {
                tracing::warn!(parameter = %query.parameter, error = %err, "suggestion lookup failed");
                Vec::new()
            }
            Err(_) => {
                tracing::warn!(
                    parameter = %query.parameter,
                    error = %SourceError::Timeout,
                    "suggestion lookup failed"
                );
                Vec::new()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parley_schema::{ActionKind, SchemaRegistry};
    use serde_json::json;

    struct Fixed(Result<Vec<Suggestion>, SourceError>);

    #[async_trait::async_trait]
    impl SuggestionSource for Fixed {
        async fn recent(&self, _query: &RecentQuery) -> Result<Vec<Suggestion>, SourceError> {
            self.0.clone()
        }
    }

    struct Slow;

    #[async_trait::async_trait]
    impl SuggestionSource for Slow {
        async fn recent(&self, _query: &RecentQuery) -> Result<Vec<Suggestion>, SourceError> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(vec![Suggestion::new("containerId", "late", 1)])
        }
    }

    fn schema(action: ActionKind) -> &'static ActionSchema {
        SchemaRegistry::global().get(action).unwrap()
    }

    fn caller() -> CallerIdentity {
        CallerIdentity::new("acme", "u1")
    }

    #[tokio::test]
    async fn silent_default_short_circuits() {
        let resolver = SuggestionResolver::new(None, Duration::from_millis(50), 5);
        let resolution = resolver
            .resolve(schema(ActionKind::CreateControls), &"count".into(), &caller())
            .await
            .unwrap();
        assert_eq!(resolution.silent_default, Some(json!(10)));
        assert!(resolution.suggestions.is_empty());
    }

    #[tokio::test]
    async fn static_choices_capped() {
        let resolver = SuggestionResolver::new(None, Duration::from_millis(50), 9);
        let resolution = resolver
            .resolve(schema(ActionKind::CreateControls), &"framework".into(), &caller())
            .await
            .unwrap();
        assert_eq!(resolution.suggestions.len(), 5);
        assert_eq!(resolution.suggestions[0].value, json!("iso27001"));
    }

    #[tokio::test]
    async fn recent_entities_are_coerced_and_filtered() {
        let source = Fixed(Ok(vec![
            Suggestion::new("containerId", "Network gear", "7"),
            Suggestion::new("containerId", "Broken", "n/a"),
            Suggestion::new("containerId", "Laptops", 3),
        ]));
        let resolver = SuggestionResolver::new(Some(Arc::new(source)), Duration::from_millis(50), 5);
        let suggestions = resolver
            .suggestions(schema(ActionKind::CreateItems), &"containerId".into(), &caller())
            .await
            .unwrap();
        let values: Vec<_> = suggestions.iter().map(|s| s.value.clone()).collect();
        assert_eq!(values, vec![json!(7), json!(3)]);
    }

    #[tokio::test]
    async fn source_failure_degrades_to_empty() {
        let source = Fixed(Err(SourceError::Unavailable("down".into())));
        let resolver = SuggestionResolver::new(Some(Arc::new(source)), Duration::from_millis(50), 5);
        let suggestions = resolver
            .suggestions(schema(ActionKind::CreateItems), &"containerId".into(), &caller())
            .await
            .unwrap();
        assert!(suggestions.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn source_timeout_degrades_to_empty() {
        let resolver = SuggestionResolver::new(Some(Arc::new(Slow)), Duration::from_millis(50), 5);
        let suggestions = resolver
            .suggestions(schema(ActionKind::CreateItems), &"containerId".into(), &caller())
            .await
            .unwrap();
        assert!(suggestions.is_empty());
    }

    #[tokio::test]
    async fn text_has_no_suggestions() {
        let resolver = SuggestionResolver::new(None, Duration::from_millis(50), 5);
        let suggestions = resolver
            .suggestions(schema(ActionKind::CreateRisks), &"title".into(), &caller())
            .await
            .unwrap();
        assert!(suggestions.is_empty());
    }
}
