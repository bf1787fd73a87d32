//! Engine assembly from configuration

use crate::clients::{HttpSuggestionSource, HttpTaskExecutor};
use crate::config::ServerConfig;
use crate::error::ServerError;
use parley_core::{CachedSuggestionSource, ContextCodec, ResolutionEngine};
use parley_intent::{IntentExtractor, KeywordIntentExtractor, LlmIntentExtractor, OpenAiChatModel};
use parley_schema::SchemaRegistry;
use std::sync::Arc;

/// Build the engine and its collaborators
///
/// Uses the language model when `[llm]` is configured and the keyword
/// extractor otherwise. Recent-record suggestions are cached when a
/// suggestion service is configured.
///
/// # Errors
/// [`ServerError::Invalid`] if the configuration cannot serve traffic, or a
/// client construction error.
pub fn build_engine(config: &ServerConfig) -> Result<ResolutionEngine, ServerError> {
    config.validate()?;
    let collaborators = &config.collaborators;
    let secret = config
        .context_secret
        .as_deref()
        .ok_or_else(|| ServerError::invalid("context_secret is not set"))?;
    let task_url = collaborators
        .task_service_url
        .as_deref()
        .ok_or_else(|| ServerError::invalid("collaborators.task_service_url is not set"))?;

    let registry = Arc::new(SchemaRegistry::builtin());
    let extractor: Arc<dyn IntentExtractor> = match &config.llm {
        Some(llm) => {
            let model = OpenAiChatModel::new(llm.clone())?;
            Arc::new(LlmIntentExtractor::new(
                Arc::new(model),
                &registry,
                llm.timeout_ms,
            ))
        }
        None => Arc::new(KeywordIntentExtractor::new(registry.clone())),
    };
    let executor = HttpTaskExecutor::new(task_url, collaborators.request_timeout())?;

    let mut engine = ResolutionEngine::new(
        config.engine.clone(),
        registry,
        extractor,
        Arc::new(executor),
        ContextCodec::new(secret.as_bytes()),
    );
    if let Some(url) = &collaborators.suggestion_service_url {
        let source = HttpSuggestionSource::new(url, collaborators.request_timeout())?;
        let cached = CachedSuggestionSource::new(
            Arc::new(source),
            collaborators.suggestion_cache_capacity,
            collaborators.suggestion_cache_ttl(),
        );
        engine = engine.with_suggestion_source(Arc::new(cached));
    }

    tracing::debug!(engine = ?engine, "engine assembled");
    Ok(engine)
}
