//! Turn engine
//!
//! [`ResolutionEngine::handle_turn`] runs one stateless conversational turn:
//!
//! 1. Validate the request and open the client's context, if any
//! 2. Edit turns overwrite one value; other turns bind a bare literal (or,
//!    for free text, the whole reply) to the awaited parameter or run the
//!    extractor (one strict retry)
//! 3. Fill silent defaults at the head of the missing list
//! 4. Decide readiness: hand off, end on exhaustion, or ask the next question
//! 5. Seal the state back into the response context

use crate::context::ContextCodec;
use crate::error::EngineError;
use crate::handoff::{TaskExecutor, TaskHandoff};
use crate::resolver::{SuggestionResolver, SuggestionSource};
use crate::types::{
    CallerIdentity, EngineConfig, ExhaustionPolicy, TurnId, TurnOutcome, TurnRequest, TurnResponse,
};
use parley_dialogue::{
    ClarificationFormatter, ContextMerger, ConversationState, EditInstruction, Readiness,
    ReadinessDecider, Suggestion, NOT_UNDERSTOOD, TRY_AGAIN,
};
use parley_intent::{contract, ExtractionRequest, IntentExtractor, ValidatedIntent};
use parley_schema::{ActionSchema, ParamName, ParamValue, ParameterKind, SchemaRegistry};
use std::sync::Arc;
use tracing::Instrument;

/// Why extraction produced no intent
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ExtractionFailure {
    /// Output broke the contract twice
    NotUnderstood,
    /// Extractor down or too slow
    Unavailable,
}

impl ExtractionFailure {
    fn message(self) -> &'static str {
        match self {
            Self::NotUnderstood => NOT_UNDERSTOOD,
            Self::Unavailable => TRY_AGAIN,
        }
    }
}

/// Conversational parameter-resolution engine
///
/// Immutable once built; share it behind an `Arc` across request handlers.
pub struct ResolutionEngine {
    config: EngineConfig,
    registry: Arc<SchemaRegistry>,
    extractor: Arc<dyn IntentExtractor>,
    resolver: SuggestionResolver,
    handoff: TaskHandoff,
    codec: ContextCodec,
    formatter: ClarificationFormatter,
    decider: ReadinessDecider,
}

impl std::fmt::Debug for ResolutionEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResolutionEngine")
            .field("config", &self.config)
            .field("extractor", &self.extractor.name())
            .field("resolver", &self.resolver)
            .finish_non_exhaustive()
    }
}

impl ResolutionEngine {
    /// Create engine
    ///
    /// # Arguments
    /// * `config` - Turn budget, limits, timeouts and exhaustion policy
    /// * `registry` - Action schemas
    /// * `extractor` - Intent extraction adapter
    /// * `executor` - Downstream task service
    /// * `codec` - Context sealing
    #[must_use]
    pub fn new(
        config: EngineConfig,
        registry: Arc<SchemaRegistry>,
        extractor: Arc<dyn IntentExtractor>,
        executor: Arc<dyn TaskExecutor>,
        codec: ContextCodec,
    ) -> Self {
        let resolver =
            SuggestionResolver::new(None, config.suggestion_timeout(), config.max_suggestions);
        Self {
            formatter: ClarificationFormatter::new(config.max_suggestions),
            decider: ReadinessDecider::new(config.max_turns),
            resolver,
            handoff: TaskHandoff::new(executor),
            config,
            registry,
            extractor,
            codec,
        }
    }

    /// With a recency suggestion source
    #[must_use]
    pub fn with_suggestion_source(mut self, source: Arc<dyn SuggestionSource>) -> Self {
        self.resolver = SuggestionResolver::new(
            Some(source),
            self.config.suggestion_timeout(),
            self.config.max_suggestions,
        );
        self
    }

    /// Action schemas served by this engine
    #[inline]
    #[must_use]
    pub fn registry(&self) -> &SchemaRegistry {
        &self.registry
    }

    /// Engine configuration
    #[inline]
    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Handle one conversational turn
    ///
    /// # Errors
    /// Returns [`EngineError`] for malformed requests, tampered or
    /// inconsistent contexts, and edits naming undeclared parameters.
    /// Unparseable utterances, exhaustion and downstream failures are
    /// regular responses.
    pub async fn handle_turn(
        &self,
        caller: &CallerIdentity,
        request: TurnRequest,
    ) -> Result<TurnResponse, EngineError> {
        let turn_id = TurnId::new();
        let span = tracing::info_span!(
            "turn",
            turn_id = %turn_id,
            tenant = %caller.tenant_id,
            action = tracing::field::Empty,
            turn_count = tracing::field::Empty,
        );
        self.run_turn(caller, request).instrument(span).await
    }

    async fn run_turn(
        &self,
        caller: &CallerIdentity,
        request: TurnRequest,
    ) -> Result<TurnResponse, EngineError> {
        let utterance = self.validate_utterance(&request.utterance)?;

        let prior = match &request.context {
            Some(context) if !context.is_null() => {
                Some(self.codec.open(context, &self.registry, &caller.tenant_id)?)
            }
            _ => None,
        };
        let merger = ContextMerger::new(&self.registry);

        match (prior, request.edit) {
            (None, Some(_)) => Err(EngineError::InvalidRequest(
                "an edit needs the context of an ongoing conversation".to_string(),
            )),
            (Some(state), Some(edit)) => self.edit_turn(&merger, caller, state, &edit).await,
            (Some(state), None) => self.answer_turn(&merger, caller, state, utterance).await,
            (None, None) => self.first_turn(&merger, caller, utterance).await,
        }
    }

    fn validate_utterance<'u>(&self, utterance: &'u str) -> Result<&'u str, EngineError> {
        let trimmed = utterance.trim();
        if trimmed.is_empty() {
            return Err(EngineError::InvalidRequest("utterance must not be empty".to_string()));
        }
        if trimmed.chars().count() > self.config.max_utterance_chars {
            return Err(EngineError::InvalidRequest(format!(
                "utterance exceeds {} characters",
                self.config.max_utterance_chars
            )));
        }
        Ok(trimmed)
    }

    async fn first_turn(
        &self,
        merger: &ContextMerger<'_>,
        caller: &CallerIdentity,
        utterance: &str,
    ) -> Result<TurnResponse, EngineError> {
        let intent = match self.extract(ExtractionRequest::initial(utterance)).await {
            Ok(intent) => intent,
            Err(failure) => {
                tracing::info!(outcome = %TurnOutcome::NotUnderstood, "first turn not understood");
                let mut response = TurnResponse::empty(TurnOutcome::NotUnderstood, failure.message());
                response.is_clarifying = true;
                response.clarifying_question = Some(failure.message().to_string());
                response.suggested_replies = Some(Vec::new());
                return Ok(response);
            }
        };

        let state = merger.initialize(&intent)?;
        let schema = self.registry.get(state.action())?;
        // Optional defaults were injected by initialize; announce them too
        let announced: Vec<(ParamName, ParamValue)> = state
            .required_parameters()
            .iter()
            .filter(|name| state.defaulted_parameters().contains(*name))
            .filter_map(|name| {
                state
                    .collected_parameters()
                    .get(name)
                    .map(|v| (name.clone(), v.clone()))
            })
            .collect();
        self.settle(merger, caller, schema, state, announced, None).await
    }

    async fn answer_turn(
        &self,
        merger: &ContextMerger<'_>,
        caller: &CallerIdentity,
        mut state: ConversationState,
        utterance: &str,
    ) -> Result<TurnResponse, EngineError> {
        let schema = self.registry.get(state.action())?;

        if let Some((name, value)) = direct_literal(schema, &state, utterance) {
            tracing::debug!(parameter = %name, "bound reply to awaited parameter");
            merger.bind_literal(&mut state, name.as_str(), &value)?;
            return self.settle(merger, caller, schema, state, Vec::new(), None).await;
        }

        let request = ExtractionRequest::continuing(
            utterance,
            state.action(),
            state.collected_parameters().clone(),
        );
        match self.extract(request).await {
            Ok(intent) => {
                merger.merge_answer(&mut state, &intent)?;
                self.settle(merger, caller, schema, state, Vec::new(), None).await
            }
            Err(ExtractionFailure::NotUnderstood) => {
                merger.record_unproductive_turn(&mut state);
                self.settle(
                    merger,
                    caller,
                    schema,
                    state,
                    Vec::new(),
                    Some(ExtractionFailure::NotUnderstood),
                )
                .await
            }
            Err(ExtractionFailure::Unavailable) => {
                self.settle(
                    merger,
                    caller,
                    schema,
                    state,
                    Vec::new(),
                    Some(ExtractionFailure::Unavailable),
                )
                .await
            }
        }
    }

    async fn edit_turn(
        &self,
        merger: &ContextMerger<'_>,
        caller: &CallerIdentity,
        mut state: ConversationState,
        edit: &EditInstruction,
    ) -> Result<TurnResponse, EngineError> {
        let schema = self.registry.get(state.action())?;
        merger.apply_edit(&mut state, edit)?;
        self.settle(merger, caller, schema, state, Vec::new(), None).await
    }

    /// Run the extractor with one strict retry, validating every reply
    async fn extract(
        &self,
        request: ExtractionRequest,
    ) -> Result<ValidatedIntent, ExtractionFailure> {
        let known_action = request.known_action;
        let attempts = [request.clone(), request.strict()];

        for attempt in &attempts {
            let outcome = tokio::time::timeout(
                self.config.extractor_timeout(),
                self.extractor.extract(attempt),
            )
            .await;

            let candidate = match outcome {
                Err(_) => {
                    tracing::warn!(
                        extractor = self.extractor.name(),
                        timeout_ms = self.config.extractor_timeout_ms,
                        "extractor timed out"
                    );
                    return Err(ExtractionFailure::Unavailable);
                }
                Ok(Err(err)) if err.is_retryable() => {
                    tracing::warn!(
                        extractor = self.extractor.name(),
                        strictness = ?attempt.strictness,
                        error = %err,
                        "unusable extractor output"
                    );
                    continue;
                }
                Ok(Err(err)) => {
                    tracing::warn!(extractor = self.extractor.name(), error = %err, "extractor failed");
                    return Err(ExtractionFailure::Unavailable);
                }
                Ok(Ok(candidate)) => candidate,
            };

            match contract::validate(&self.registry, &candidate, known_action) {
                Ok(intent) => return Ok(intent),
                Err(violation) => {
                    tracing::warn!(
                        extractor = self.extractor.name(),
                        strictness = ?attempt.strictness,
                        error = %violation,
                        "extractor output broke the contract"
                    );
                }
            }
        }

        Err(ExtractionFailure::NotUnderstood)
    }

    /// Fill head defaults, decide readiness and build the response
    async fn settle(
        &self,
        merger: &ContextMerger<'_>,
        caller: &CallerIdentity,
        schema: &ActionSchema,
        mut state: ConversationState,
        mut announced: Vec<(ParamName, ParamValue)>,
        failure: Option<ExtractionFailure>,
    ) -> Result<TurnResponse, EngineError> {
        let mut suggestions = Vec::new();
        while let Some(head) = state.next_missing().cloned() {
            let resolution = self.resolver.resolve(schema, &head, caller).await?;
            let Some(value) = resolution.silent_default else {
                suggestions = resolution.suggestions;
                break;
            };
            merger.apply_default(&mut state, head.as_str())?;
            announced.push((head, value));
        }

        let readiness = self.decider.decide(&state);
        let span = tracing::Span::current();
        span.record("action", tracing::field::display(state.action()));
        span.record("turn_count", state.turn_count());
        let awaiting = if readiness.is_terminal() {
            None
        } else {
            state.next_missing().cloned()
        };
        merger.await_parameter(&mut state, awaiting);

        let outcome = TurnOutcome::from(readiness);
        let response = match readiness {
            Readiness::Ready => self.hand_off(&state, caller, outcome, false).await?,
            Readiness::Exhausted => self.exhausted(merger, caller, schema, state).await?,
            Readiness::Continue => {
                self.ask(caller, schema, state, suggestions, &announced, failure)?
            }
        };

        tracing::info!(
            outcome = %response.outcome,
            task_created = response.task_created,
            missing = response.missing_parameters.len(),
            "turn handled"
        );
        Ok(response)
    }

    fn ask(
        &self,
        caller: &CallerIdentity,
        schema: &ActionSchema,
        state: ConversationState,
        suggestions: Vec<Suggestion>,
        announced: &[(ParamName, ParamValue)],
        failure: Option<ExtractionFailure>,
    ) -> Result<TurnResponse, EngineError> {
        let Some(head) = state.awaiting() else {
            return Err(EngineError::InvalidRequest(
                "nothing left to ask about".to_string(),
            ));
        };
        let clarification = self.formatter.clarify(schema, head, &suggestions)?;

        let mut message = String::new();
        if let Some(failure) = failure {
            message.push_str(failure.message());
            message.push(' ');
        }
        if let Some(notice) = self.formatter.defaults_notice(schema, announced) {
            message.push_str(&notice);
            message.push(' ');
        }
        message.push_str(&clarification.question);

        let outcome = if failure.is_some() {
            TurnOutcome::NotUnderstood
        } else {
            TurnOutcome::Continue
        };
        let mut response = TurnResponse::for_state(&state, outcome, message);
        response.is_clarifying = true;
        response.clarifying_question = Some(clarification.question);
        response.suggested_replies = Some(clarification.suggested_replies);
        response.suggestions = suggestions;
        response.context = Some(self.codec.seal(&state, &caller.tenant_id)?);
        Ok(response)
    }

    async fn exhausted(
        &self,
        merger: &ContextMerger<'_>,
        caller: &CallerIdentity,
        schema: &ActionSchema,
        mut state: ConversationState,
    ) -> Result<TurnResponse, EngineError> {
        match self.config.exhaustion_policy {
            ExhaustionPolicy::RedirectToManualEntry => {
                let message = self.formatter.exhausted(
                    schema,
                    state.missing_parameters(),
                    self.decider.max_turns(),
                    self.config.manual_entry_url.as_deref(),
                );
                tracing::info!(action = %state.action(), "turn budget spent, redirecting");
                Ok(TurnResponse::for_state(&state, TurnOutcome::Exhausted, message))
            }
            ExhaustionPolicy::ExecutePartial => {
                for name in state.missing_parameters().to_vec() {
                    merger.apply_default(&mut state, name.as_str())?;
                }
                tracing::info!(
                    action = %state.action(),
                    missing = state.missing_parameters().len(),
                    "turn budget spent, executing with collected parameters"
                );
                self.hand_off(&state, caller, TurnOutcome::Exhausted, true)
                    .await
            }
        }
    }

    async fn hand_off(
        &self,
        state: &ConversationState,
        caller: &CallerIdentity,
        outcome: TurnOutcome,
        partial: bool,
    ) -> Result<TurnResponse, EngineError> {
        let result = if partial {
            self.handoff.hand_off_partial(state, caller).await
        } else {
            self.handoff.hand_off(state, caller).await
        };

        match result {
            Ok(ack) => {
                let mut response =
                    TurnResponse::for_state(state, outcome, ack.acknowledgement_message);
                response.task_created = true;
                response.task_id = Some(ack.task_id);
                Ok(response)
            }
            Err(err) => {
                let message = err.to_string();
                let mut response = TurnResponse::for_state(state, outcome, message.clone());
                response.task_error = Some(message);
                response.context = Some(self.codec.seal(state, &caller.tenant_id)?);
                Ok(response)
            }
        }
    }
}

/// A bare reply to the awaited question, coerced to that parameter
///
/// A free-text parameter takes the whole reply.
fn direct_literal(
    schema: &ActionSchema,
    state: &ConversationState,
    utterance: &str,
) -> Option<(ParamName, ParamValue)> {
    let awaiting = state.awaiting()?;
    if state.has(awaiting.as_str()) {
        return None;
    }
    let spec = schema.parameter(awaiting.as_str())?;
    let value = match spec.kind {
        ParameterKind::Text => spec
            .kind
            .parse_literal(utterance)
            .or_else(|| spec.coerce(&ParamValue::String(utterance.to_string())).ok())?,
        _ => spec.kind.parse_literal(utterance)?,
    };
    Some((spec.name.clone(), value))
}

