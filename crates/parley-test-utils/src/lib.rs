//! Testing utilities for the Parley workspace
//!
//! Scripted collaborators and engine fixtures.

#![allow(missing_docs)]

use parley_core::{
    CallerIdentity, ContextCodec, EngineConfig, HandoffError, RecentQuery, ResolutionEngine,
    SourceError, SuggestionSource, TaskAcknowledgement, TaskExecutor, TaskRequest,
};
use parley_dialogue::Suggestion;
use parley_intent::{
    CandidateIntent, ExtractError, ExtractionRequest, IntentExtractor, KeywordIntentExtractor,
};
use parley_schema::{EntityKind, SchemaRegistry};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const TEST_SECRET: &[u8] = b"parley-test-secret";

pub fn caller() -> CallerIdentity {
    CallerIdentity::new("acme", "u-17")
}

pub fn codec() -> ContextCodec {
    ContextCodec::new(TEST_SECRET)
}

pub fn engine(
    config: EngineConfig,
    extractor: Arc<dyn IntentExtractor>,
    executor: Arc<dyn TaskExecutor>,
) -> ResolutionEngine {
    ResolutionEngine::new(
        config,
        Arc::new(SchemaRegistry::builtin()),
        extractor,
        executor,
        codec(),
    )
}

pub fn keyword_engine(config: EngineConfig, executor: Arc<dyn TaskExecutor>) -> ResolutionEngine {
    let registry = Arc::new(SchemaRegistry::builtin());
    ResolutionEngine::new(
        config,
        registry.clone(),
        Arc::new(KeywordIntentExtractor::new(registry)),
        executor,
        codec(),
    )
}

/// Extractor replaying a fixed list of replies
#[derive(Default)]
pub struct ScriptedExtractor {
    replies: Mutex<VecDeque<Result<CandidateIntent, ExtractError>>>,
    requests: Mutex<Vec<ExtractionRequest>>,
}

impl ScriptedExtractor {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn reply(self, candidate: CandidateIntent) -> Self {
        self.push(Ok(candidate))
    }

    #[must_use]
    pub fn fail(self, err: ExtractError) -> Self {
        self.push(Err(err))
    }

    fn push(self, reply: Result<CandidateIntent, ExtractError>) -> Self {
        self.replies.lock().unwrap().push_back(reply);
        self
    }

    pub fn requests(&self) -> Vec<ExtractionRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait::async_trait]
impl IntentExtractor for ScriptedExtractor {
    async fn extract(&self, request: &ExtractionRequest) -> Result<CandidateIntent, ExtractError> {
        self.requests.lock().unwrap().push(request.clone());
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(ExtractError::Unavailable("script exhausted".to_string())))
    }

    fn name(&self) -> &'static str {
        "scripted"
    }
}

/// Extractor that never answers in time
pub struct StalledExtractor {
    pub delay: Duration,
    calls: Mutex<usize>,
}

impl StalledExtractor {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            calls: Mutex::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        *self.calls.lock().unwrap()
    }
}

#[async_trait::async_trait]
impl IntentExtractor for StalledExtractor {
    async fn extract(&self, _request: &ExtractionRequest) -> Result<CandidateIntent, ExtractError> {
        *self.calls.lock().unwrap() += 1;
        tokio::time::sleep(self.delay).await;
        Err(ExtractError::Unavailable("stalled".to_string()))
    }

    fn name(&self) -> &'static str {
        "stalled"
    }
}

/// Executor recording every request
#[derive(Default)]
pub struct RecordingExecutor {
    failure: Option<String>,
    requests: Mutex<Vec<TaskRequest>>,
}

impl RecordingExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            failure: Some(message.into()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn requests(&self) -> Vec<TaskRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl TaskExecutor for RecordingExecutor {
    async fn execute(&self, request: &TaskRequest) -> Result<TaskAcknowledgement, HandoffError> {
        let mut requests = self.requests.lock().unwrap();
        requests.push(request.clone());
        match &self.failure {
            Some(message) => Err(HandoffError::Execution(message.clone())),
            None => Ok(TaskAcknowledgement {
                task_id: format!("task-{}", requests.len()),
                acknowledgement_message: format!("Created {} task.", request.action),
            }),
        }
    }
}

/// Suggestion source serving fixed records per entity kind
#[derive(Default)]
pub struct StaticSuggestionSource {
    records: HashMap<EntityKind, Vec<(String, serde_json::Value)>>,
    queries: Mutex<Vec<RecentQuery>>,
}

impl StaticSuggestionSource {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_record(
        mut self,
        entity: EntityKind,
        label: &str,
        value: impl Into<serde_json::Value>,
    ) -> Self {
        self.records
            .entry(entity)
            .or_default()
            .push((label.to_string(), value.into()));
        self
    }

    pub fn queries(&self) -> Vec<RecentQuery> {
        self.queries.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl SuggestionSource for StaticSuggestionSource {
    async fn recent(&self, query: &RecentQuery) -> Result<Vec<Suggestion>, SourceError> {
        self.queries.lock().unwrap().push(query.clone());
        Ok(self
            .records
            .get(&query.entity)
            .into_iter()
            .flatten()
            .take(query.limit)
            .map(|(label, value)| Suggestion::new(query.parameter.clone(), label.as_str(), value.clone()))
            .collect())
    }
}

/// Suggestion source that always fails
pub struct FailingSuggestionSource;

#[async_trait::async_trait]
impl SuggestionSource for FailingSuggestionSource {
    async fn recent(&self, _query: &RecentQuery) -> Result<Vec<Suggestion>, SourceError> {
        Err(SourceError::Unavailable("connection refused".to_string()))
    }
}
