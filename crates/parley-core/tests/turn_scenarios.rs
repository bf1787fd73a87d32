use mockall::mock;
use parley_core::{
    CallerIdentity, ContextError, EngineConfig, EngineError, ExhaustionPolicy, HandoffError,
    TaskAcknowledgement, TaskExecutor, TaskRequest, TurnOutcome, TurnRequest, TurnResponse,
};
use parley_dialogue::{EditInstruction, NOT_UNDERSTOOD, TRY_AGAIN};
use parley_intent::{CandidateIntent, ContractViolation, ExtractError, Strictness};
use parley_schema::EntityKind;
use parley_test_utils::{
    caller, engine, keyword_engine, FailingSuggestionSource, RecordingExecutor, ScriptedExtractor,
    StalledExtractor, StaticSuggestionSource,
};
use pretty_assertions::assert_eq;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

mock! {
    pub Executor {}

    #[async_trait::async_trait]
    impl TaskExecutor for Executor {
        async fn execute(&self, request: &TaskRequest) -> Result<TaskAcknowledgement, HandoffError>;
    }
}

fn next(utterance: &str, previous: &TurnResponse) -> TurnRequest {
    TurnRequest::new(utterance).with_context(previous.context.clone())
}

#[tokio::test]
async fn expert_mode_creates_task_without_questions() {
    let executor = Arc::new(RecordingExecutor::new());
    let engine = keyword_engine(EngineConfig::default(), executor.clone());

    let response = engine
        .handle_turn(
            &caller(),
            TurnRequest::new("Create items with containerId=7 and category=network"),
        )
        .await
        .unwrap();

    assert!(response.task_created);
    assert_eq!(response.outcome, TurnOutcome::Ready);
    assert!(!response.is_clarifying);
    assert!(response.missing_parameters.is_empty());
    assert_eq!(response.turn_count, 0);
    assert_eq!(response.message, "Created create_items task.");

    let requests = executor.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].parameters.get("containerId"), Some(&json!(7)));
    assert_eq!(requests[0].parameters.get("category"), Some(&json!("network")));
    assert_eq!(requests[0].tenant_id, "acme");
}

#[tokio::test]
async fn guided_mode_asks_for_first_parameter_only() {
    let executor = Arc::new(RecordingExecutor::new());
    let engine = keyword_engine(EngineConfig::default(), executor.clone());

    let response = engine
        .handle_turn(&caller(), TurnRequest::new("Create items"))
        .await
        .unwrap();

    assert!(response.is_clarifying);
    assert_eq!(response.outcome, TurnOutcome::Continue);
    assert_eq!(response.missing_parameters, vec!["containerId", "category"]);
    let question = response.clarifying_question.unwrap();
    assert!(question.contains("container"));
    assert!(!question.contains("category"));
    assert_eq!(response.turn_count, 1);
    assert!(response.context.is_some());
    assert!(executor.requests().is_empty());
}

#[tokio::test]
async fn suggestion_round_trip_binds_without_extractor() {
    let extractor = Arc::new(ScriptedExtractor::new().reply(CandidateIntent::new("create_items")));
    let source = StaticSuggestionSource::new()
        .with_record(EntityKind::Container, "Network gear", 7)
        .with_record(EntityKind::Container, "Laptops", 3);
    let engine = engine(
        EngineConfig::default(),
        extractor.clone(),
        Arc::new(RecordingExecutor::new()),
    )
    .with_suggestion_source(Arc::new(source));

    let first = engine
        .handle_turn(&caller(), TurnRequest::new("Create items"))
        .await
        .unwrap();
    assert_eq!(first.suggested_replies.clone().unwrap(), vec!["7", "3"]);
    assert_eq!(first.suggestions[0].value, json!(7));

    let second = engine.handle_turn(&caller(), next("7", &first)).await.unwrap();
    assert_eq!(second.collected_parameters.get("containerId"), Some(&json!(7)));
    assert_eq!(second.missing_parameters, vec!["category"]);
    assert_eq!(second.turn_count, 2);
    assert_eq!(extractor.calls(), 1);
    // category offers its static options
    assert_eq!(second.suggested_replies.as_ref().unwrap()[0], "network");
}

#[tokio::test]
async fn unrelated_answers_exhaust_after_fifth_turn() {
    let executor = Arc::new(RecordingExecutor::new());
    let config = EngineConfig::default().with_manual_entry_url("https://tracker.example/items/new");
    let engine = keyword_engine(config, executor.clone());

    let mut response = engine
        .handle_turn(&caller(), TurnRequest::new("Create items"))
        .await
        .unwrap();
    let mut outcomes = vec![response.outcome];
    for _ in 2..=5 {
        response = engine
            .handle_turn(&caller(), next("no idea", &response))
            .await
            .unwrap();
        outcomes.push(response.outcome);
    }

    assert_eq!(
        outcomes,
        vec![
            TurnOutcome::Continue,
            TurnOutcome::Continue,
            TurnOutcome::Continue,
            TurnOutcome::Continue,
            TurnOutcome::Exhausted
        ]
    );
    assert_eq!(response.turn_count, 5);
    assert!(!response.is_clarifying);
    assert!(response.suggested_replies.is_none());
    assert!(response.context.is_none());
    assert!(response.message.contains("https://tracker.example/items/new"));
    assert!(executor.requests().is_empty());
}

#[tokio::test]
async fn exhaustion_can_execute_partial() {
    let executor = Arc::new(RecordingExecutor::new());
    let config = EngineConfig::default()
        .with_max_turns(2)
        .with_exhaustion_policy(ExhaustionPolicy::ExecutePartial);
    let engine = keyword_engine(config, executor.clone());

    let first = engine
        .handle_turn(&caller(), TurnRequest::new("create controls for project 4"))
        .await
        .unwrap();
    assert_eq!(first.missing_parameters, vec!["framework", "count"]);

    let second = engine
        .handle_turn(&caller(), next("no idea", &first))
        .await
        .unwrap();
    assert_eq!(second.outcome, TurnOutcome::Exhausted);
    assert!(second.task_created);

    let requests = executor.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].parameters.get("projectId"), Some(&json!(4)));
    assert_eq!(requests[0].parameters.get("count"), Some(&json!(10)));
    assert!(requests[0].parameters.get("framework").is_none());
}

#[tokio::test]
async fn free_text_answer_binds_the_whole_reply() {
    let executor = Arc::new(RecordingExecutor::new());
    let engine = keyword_engine(EngineConfig::default(), executor.clone());

    let first = engine
        .handle_turn(&caller(), TurnRequest::new("log a risk for project 4"))
        .await
        .unwrap();
    assert_eq!(first.missing_parameters, vec!["title", "severity"]);

    let second = engine
        .handle_turn(&caller(), next("Data breach in payroll", &first))
        .await
        .unwrap();
    assert_eq!(second.outcome, TurnOutcome::Ready);
    assert!(second.task_created);
    assert_eq!(
        second.collected_parameters.get("title"),
        Some(&json!("Data breach in payroll"))
    );
    assert_eq!(second.defaulted_parameters, vec!["severity"]);

    let requests = executor.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].parameters.get("title"), Some(&json!("Data breach in payroll")));
    assert_eq!(requests[0].parameters.get("severity"), Some(&json!("medium")));
}

#[tokio::test]
async fn edit_overwrites_without_consuming_a_turn() {
    let engine = keyword_engine(EngineConfig::default(), Arc::new(RecordingExecutor::new()));

    let first = engine
        .handle_turn(&caller(), TurnRequest::new("Create items"))
        .await
        .unwrap();
    let second = engine.handle_turn(&caller(), next("2", &first)).await.unwrap();
    assert_eq!(second.collected_parameters.get("containerId"), Some(&json!(2)));
    assert_eq!(second.turn_count, 2);

    let edited = engine
        .handle_turn(
            &caller(),
            next("use container 1 instead", &second)
                .with_edit(EditInstruction::new("containerId", 1)),
        )
        .await
        .unwrap();
    assert_eq!(edited.collected_parameters.get("containerId"), Some(&json!(1)));
    assert_eq!(edited.turn_count, 2);
    assert_eq!(edited.missing_parameters, vec!["category"]);
}

#[tokio::test]
async fn edit_errors_are_client_errors() {
    let engine = keyword_engine(EngineConfig::default(), Arc::new(RecordingExecutor::new()));

    let err = engine
        .handle_turn(
            &caller(),
            TurnRequest::new("fix it").with_edit(EditInstruction::new("containerId", 1)),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::InvalidRequest(_)));
    assert_eq!(err.status_code(), 400);

    let first = engine
        .handle_turn(&caller(), TurnRequest::new("Create items"))
        .await
        .unwrap();
    let err = engine
        .handle_turn(
            &caller(),
            next("fix it", &first).with_edit(EditInstruction::new("colour", "red")),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::UnknownParameter { .. }));
    assert_eq!(err.status_code(), 400);
}

#[tokio::test]
async fn recoverable_parse_error_is_retried_strictly_once() {
    let extractor = Arc::new(
        ScriptedExtractor::new()
            .fail(ExtractError::Recoverable(ContractViolation::Malformed(
                "prose".into(),
            )))
            .reply(CandidateIntent::new("create_items")),
    );
    let engine = engine(
        EngineConfig::default(),
        extractor.clone(),
        Arc::new(RecordingExecutor::new()),
    );

    let response = engine
        .handle_turn(&caller(), TurnRequest::new("Create items"))
        .await
        .unwrap();
    assert_eq!(response.outcome, TurnOutcome::Continue);

    let requests = extractor.requests();
    assert_eq!(requests.len(), 2);
    assert_eq!(requests[0].strictness, Strictness::Standard);
    assert_eq!(requests[1].strictness, Strictness::Strict);
}

#[tokio::test]
async fn two_contract_violations_on_first_turn_create_nothing() {
    let extractor = Arc::new(
        ScriptedExtractor::new()
            .reply(CandidateIntent::new("launch_rocket"))
            .reply(CandidateIntent::new("create_items").with_parameter("colour", "red")),
    );
    let executor = Arc::new(RecordingExecutor::new());
    let engine = engine(EngineConfig::default(), extractor.clone(), executor.clone());

    let response = engine
        .handle_turn(&caller(), TurnRequest::new("do the thing"))
        .await
        .unwrap();

    assert_eq!(response.outcome, TurnOutcome::NotUnderstood);
    assert_eq!(response.message, NOT_UNDERSTOOD);
    assert!(response.is_clarifying);
    assert!(response.context.is_none());
    assert!(!response.task_created);
    assert_eq!(extractor.calls(), 2);
    assert!(executor.requests().is_empty());
}

#[tokio::test]
async fn failed_extraction_on_later_turn_counts_as_a_turn() {
    let extractor = Arc::new(
        ScriptedExtractor::new()
            .reply(CandidateIntent::new("create_items"))
            .fail(ExtractError::Recoverable(ContractViolation::NoAction))
            .fail(ExtractError::Recoverable(ContractViolation::NoAction)),
    );
    let engine = engine(
        EngineConfig::default(),
        extractor,
        Arc::new(RecordingExecutor::new()),
    );

    let first = engine
        .handle_turn(&caller(), TurnRequest::new("Create items"))
        .await
        .unwrap();
    let second = engine
        .handle_turn(&caller(), next("hmm, the usual place", &first))
        .await
        .unwrap();

    assert_eq!(second.outcome, TurnOutcome::NotUnderstood);
    assert!(second.message.starts_with(NOT_UNDERSTOOD));
    assert_eq!(second.turn_count, 2);
    assert!(second.context.is_some());
}

#[tokio::test(start_paused = true)]
async fn extractor_timeout_fails_closed_without_retry() {
    let extractor = Arc::new(StalledExtractor::new(Duration::from_secs(60)));
    let config = EngineConfig::default().with_extractor_timeout(Duration::from_millis(50));
    let executor = Arc::new(RecordingExecutor::new());
    let engine = engine(config, extractor.clone(), executor.clone());

    let response = engine
        .handle_turn(&caller(), TurnRequest::new("Create items"))
        .await
        .unwrap();

    assert_eq!(response.outcome, TurnOutcome::NotUnderstood);
    assert_eq!(response.message, TRY_AGAIN);
    assert!(response.context.is_none());
    assert_eq!(extractor.calls(), 1);
    assert!(executor.requests().is_empty());
}

#[tokio::test]
async fn unavailable_extractor_is_not_retried() {
    let extractor = Arc::new(
        ScriptedExtractor::new().fail(ExtractError::Unavailable("503 overloaded".into())),
    );
    let engine = engine(
        EngineConfig::default(),
        extractor.clone(),
        Arc::new(RecordingExecutor::new()),
    );
    let response = engine
        .handle_turn(&caller(), TurnRequest::new("Create items"))
        .await
        .unwrap();
    assert_eq!(response.message, TRY_AGAIN);
    assert_eq!(extractor.calls(), 1);
}

#[tokio::test]
async fn suggestion_failure_degrades_to_no_suggestions() {
    let engine = keyword_engine(EngineConfig::default(), Arc::new(RecordingExecutor::new()))
        .with_suggestion_source(Arc::new(FailingSuggestionSource));

    let response = engine
        .handle_turn(&caller(), TurnRequest::new("Create items"))
        .await
        .unwrap();
    assert_eq!(response.outcome, TurnOutcome::Continue);
    assert!(response.suggestions.is_empty());
    assert_eq!(response.suggested_replies, Some(Vec::new()));
}

#[tokio::test]
async fn tampered_context_is_rejected() {
    let engine = keyword_engine(EngineConfig::default(), Arc::new(RecordingExecutor::new()));
    let first = engine
        .handle_turn(&caller(), TurnRequest::new("Create items"))
        .await
        .unwrap();

    let mut context = first.context.clone().unwrap();
    context["state"]["collectedParameters"]["containerId"] = json!(99);
    context["state"]["missingParameters"] = json!(["category"]);
    let err = engine
        .handle_turn(&caller(), TurnRequest::new("network").with_context(Some(context)))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Context(ContextError::BadSeal)));
    assert_eq!(err.status_code(), 400);

    let err = engine
        .handle_turn(
            &caller(),
            TurnRequest::new("network").with_context(Some(json!({"version": 1}))),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Context(ContextError::Malformed(_))));
}

#[tokio::test]
async fn context_only_opens_for_its_tenant() {
    let engine = keyword_engine(EngineConfig::default(), Arc::new(RecordingExecutor::new()));
    let first = engine
        .handle_turn(&caller(), TurnRequest::new("Create items"))
        .await
        .unwrap();

    let other = CallerIdentity::new("globex", &caller().user_id);
    let err = engine
        .handle_turn(&other, next("7", &first))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Context(ContextError::BadSeal)));

    let resumed = engine.handle_turn(&caller(), next("7", &first)).await.unwrap();
    assert_eq!(resumed.collected_parameters.get("containerId"), Some(&json!(7)));
}

#[tokio::test]
async fn empty_and_oversized_utterances_are_rejected() {
    let engine = keyword_engine(EngineConfig::default(), Arc::new(RecordingExecutor::new()));
    let err = engine
        .handle_turn(&caller(), TurnRequest::new("   "))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::InvalidRequest(_)));

    let long = "a".repeat(EngineConfig::default().max_utterance_chars + 1);
    assert!(engine.handle_turn(&caller(), TurnRequest::new(long)).await.is_err());
}

#[tokio::test]
async fn downstream_failure_is_passed_through_verbatim() {
    let executor = Arc::new(RecordingExecutor::failing("Container 7 is archived"));
    let engine = keyword_engine(EngineConfig::default(), executor.clone());

    let response = engine
        .handle_turn(&caller(), TurnRequest::new("create items containerId=7 category=data"))
        .await
        .unwrap();

    assert!(!response.task_created);
    assert_eq!(response.outcome, TurnOutcome::Ready);
    assert_eq!(response.task_error.as_deref(), Some("Container 7 is archived"));
    assert_eq!(response.message, "Container 7 is archived");
    assert!(response.context.is_some());
    assert_eq!(executor.requests().len(), 1);
}

#[tokio::test]
async fn silent_defaults_fill_and_are_surfaced() {
    let mut executor = MockExecutor::new();
    executor
        .expect_execute()
        .times(1)
        .withf(|request| {
            request.parameters.get("count") == Some(&json!(10))
                && request.parameters.get("status") == Some(&json!("draft"))
                && request.parameters.get("framework") == Some(&json!("soc2"))
        })
        .returning(|_| {
            Ok(TaskAcknowledgement {
                task_id: "T-42".into(),
                acknowledgement_message: "Created 10 SOC 2 controls.".into(),
            })
        });
    let engine = keyword_engine(EngineConfig::default(), Arc::new(executor));

    let response = engine
        .handle_turn(&caller(), TurnRequest::new("upload controls for project 4, soc2"))
        .await
        .unwrap();

    assert!(response.task_created);
    assert_eq!(response.task_id.as_deref(), Some("T-42"));
    assert_eq!(response.message, "Created 10 SOC 2 controls.");
    assert_eq!(response.defaulted_parameters, vec!["count", "status"]);
    assert_eq!(response.turn_count, 0);
}

#[tokio::test]
async fn guided_controls_mention_defaults() {
    let engine = keyword_engine(EngineConfig::default(), Arc::new(RecordingExecutor::new()));
    let response = engine
        .handle_turn(&caller(), TurnRequest::new("create controls"))
        .await
        .unwrap();
    assert_eq!(response.missing_parameters, vec!["projectId", "framework", "count"]);
    assert!(response.message.contains("initial status = draft"));
    assert!(response.message.ends_with(response.clarifying_question.as_deref().unwrap()));
    assert_eq!(response.defaulted_parameters, vec!["status"]);
}
