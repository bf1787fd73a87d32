//! Core types for the turn engine
//!
//! Defines:
//! - Engine configuration and the exhaustion policy
//! - Caller identity
//! - Turn request and response wire shapes

use parley_dialogue::{ConversationState, EditInstruction, Readiness, Suggestion};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;
use ulid::Ulid;

/// Unique turn identifier (ULID for sortability in logs)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TurnId(pub Ulid);

impl TurnId {
    /// Generate new turn ID
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self(Ulid::new())
    }
}

impl Default for TurnId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TurnId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Authenticated caller, as established in front of the engine
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallerIdentity {
    /// Tenant the caller belongs to
    pub tenant_id: String,
    /// Caller's user id
    pub user_id: String,
}

impl CallerIdentity {
    /// Create identity
    #[must_use]
    pub fn new(tenant_id: impl Into<String>, user_id: impl Into<String>) -> Self {
        Self {
            tenant_id: tenant_id.into(),
            user_id: user_id.into(),
        }
    }
}

/// What to do when the turn budget runs out with parameters missing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExhaustionPolicy {
    /// Hand off whatever was collected, plus silent defaults
    ExecutePartial,
    /// End the conversation and point at the manual entry form
    #[default]
    RedirectToManualEntry,
}

/// Engine configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Clarification turn budget
    pub max_turns: u32,
    /// Suggestions offered per question (at most 5)
    pub max_suggestions: usize,
    /// Longest accepted utterance, in characters
    pub max_utterance_chars: usize,
    /// Budget for one extractor call
    pub extractor_timeout_ms: u64,
    /// Budget for one suggestion query
    pub suggestion_timeout_ms: u64,
    /// Behavior once the budget is spent
    pub exhaustion_policy: ExhaustionPolicy,
    /// Manual entry form linked from exhaustion messages
    pub manual_entry_url: Option<String>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_turns: parley_dialogue::DEFAULT_MAX_TURNS,
            max_suggestions: parley_dialogue::MAX_SUGGESTIONS,
            max_utterance_chars: 2_000,
            extractor_timeout_ms: 10_000,
            suggestion_timeout_ms: 750,
            exhaustion_policy: ExhaustionPolicy::default(),
            manual_entry_url: None,
        }
    }
}

impl EngineConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// With turn budget
    #[inline]
    #[must_use]
    pub fn with_max_turns(mut self, max_turns: u32) -> Self {
        self.max_turns = max_turns;
        self
    }

    /// With exhaustion policy
    #[inline]
    #[must_use]
    pub fn with_exhaustion_policy(mut self, policy: ExhaustionPolicy) -> Self {
        self.exhaustion_policy = policy;
        self
    }

    /// With manual entry URL
    #[inline]
    #[must_use]
    pub fn with_manual_entry_url(mut self, url: impl Into<String>) -> Self {
        self.manual_entry_url = Some(url.into());
        self
    }

    /// With extractor timeout
    #[inline]
    #[must_use]
    pub fn with_extractor_timeout(mut self, timeout: Duration) -> Self {
        self.extractor_timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        self
    }

    /// With suggestion timeout
    #[inline]
    #[must_use]
    pub fn with_suggestion_timeout(mut self, timeout: Duration) -> Self {
        self.suggestion_timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        self
    }

    /// Extractor timeout
    #[inline]
    #[must_use]
    pub fn extractor_timeout(&self) -> Duration {
        Duration::from_millis(self.extractor_timeout_ms)
    }

    /// Suggestion timeout
    #[inline]
    #[must_use]
    pub fn suggestion_timeout(&self) -> Duration {
        Duration::from_millis(self.suggestion_timeout_ms)
    }
}

/// One conversational turn as sent by the client
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TurnRequest {
    /// What the user typed
    #[serde(default)]
    pub utterance: String,
    /// Context returned by the previous turn, echoed unchanged
    #[serde(default)]
    pub context: Option<Value>,
    /// Explicit correction of a collected value
    #[serde(default)]
    pub edit: Option<EditInstruction>,
}

impl TurnRequest {
    /// First turn of a conversation
    #[must_use]
    pub fn new(utterance: impl Into<String>) -> Self {
        Self {
            utterance: utterance.into(),
            context: None,
            edit: None,
        }
    }

    /// With context
    #[must_use]
    pub fn with_context(mut self, context: Option<Value>) -> Self {
        self.context = context;
        self
    }

    /// With edit
    #[must_use]
    pub fn with_edit(mut self, edit: EditInstruction) -> Self {
        self.edit = Some(edit);
        self
    }
}

/// How a turn ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnOutcome {
    /// A clarifying question was asked
    Continue,
    /// Every parameter was resolved and the task handed off
    Ready,
    /// Turn budget spent
    Exhausted,
    /// The utterance could not be interpreted
    NotUnderstood,
}

impl From<Readiness> for TurnOutcome {
    fn from(readiness: Readiness) -> Self {
        match readiness {
            Readiness::Continue => Self::Continue,
            Readiness::Ready => Self::Ready,
            Readiness::Exhausted => Self::Exhausted,
        }
    }
}

impl fmt::Display for TurnOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Continue => "continue",
            Self::Ready => "ready",
            Self::Exhausted => "exhausted",
            Self::NotUnderstood => "not_understood",
        })
    }
}

/// Engine reply to one turn
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TurnResponse {
    /// Natural-language reply
    pub message: String,
    /// Whether the reply asks the user something
    pub is_clarifying: bool,
    /// The question, when clarifying
    pub clarifying_question: Option<String>,
    /// Quick-reply literals; `None` unless clarifying
    pub suggested_replies: Option<Vec<String>>,
    /// Opaque context to echo on the next turn; absent once the
    /// conversation is over
    pub context: Option<Value>,
    /// Values collected so far
    pub collected_parameters: BTreeMap<String, Value>,
    /// Parameters still missing, in asking order
    pub missing_parameters: Vec<String>,
    /// Whether a task was created on this turn
    pub task_created: bool,
    /// Id of the created task
    pub task_id: Option<String>,
    /// How the turn ended
    pub outcome: TurnOutcome,
    /// Parameters currently holding a silent default
    pub defaulted_parameters: Vec<String>,
    /// Structured suggestions behind `suggested_replies`
    pub suggestions: Vec<Suggestion>,
    /// Clarification turns consumed
    pub turn_count: u32,
    /// Downstream failure message, passed through verbatim
    pub task_error: Option<String>,
}

impl TurnResponse {
    /// Response with nothing collected (first-turn failures)
    #[must_use]
    pub fn empty(outcome: TurnOutcome, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            is_clarifying: false,
            clarifying_question: None,
            suggested_replies: None,
            context: None,
            collected_parameters: BTreeMap::new(),
            missing_parameters: Vec::new(),
            task_created: false,
            task_id: None,
            outcome,
            defaulted_parameters: Vec::new(),
            suggestions: Vec::new(),
            turn_count: 0,
            task_error: None,
        }
    }

    /// Response mirroring a state
    #[must_use]
    pub fn for_state(
        state: &ConversationState,
        outcome: TurnOutcome,
        message: impl Into<String>,
    ) -> Self {
        Self {
            collected_parameters: state.parameter_map(),
            missing_parameters: state
                .missing_parameters()
                .iter()
                .map(ToString::to_string)
                .collect(),
            defaulted_parameters: state
                .defaulted_parameters()
                .iter()
                .map(ToString::to_string)
                .collect(),
            turn_count: state.turn_count(),
            ..Self::empty(outcome, message)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn request_accepts_camel_case() {
        let request: TurnRequest = serde_json::from_value(json!({
            "utterance": "fix it",
            "context": null,
            "edit": {"parameterName": "containerId", "newValue": 1}
        }))
        .unwrap();
        assert_eq!(request.edit.unwrap().parameter_name, "containerId");
        assert!(request.context.is_none());
    }

    #[test]
    fn response_uses_wire_names() {
        let response = TurnResponse::empty(TurnOutcome::NotUnderstood, "?");
        let value = serde_json::to_value(&response).unwrap();
        assert_eq!(value["outcome"], json!("not_understood"));
        assert_eq!(value["isClarifying"], json!(false));
        assert_eq!(value["taskCreated"], json!(false));
        assert!(value.get("missingParameters").is_some());
        assert_eq!(value["suggestedReplies"], Value::Null);
    }

    #[test]
    fn readiness_maps_to_outcome() {
        assert_eq!(TurnOutcome::from(Readiness::Continue), TurnOutcome::Continue);
        assert_eq!(TurnOutcome::from(Readiness::Ready), TurnOutcome::Ready);
        assert_eq!(TurnOutcome::from(Readiness::Exhausted), TurnOutcome::Exhausted);
    }

    #[test]
    fn config_defaults_and_builders() {
        let config = EngineConfig::new()
            .with_max_turns(3)
            .with_exhaustion_policy(ExhaustionPolicy::ExecutePartial)
            .with_extractor_timeout(Duration::from_millis(250));
        assert_eq!(config.max_turns, 3);
        assert_eq!(config.extractor_timeout(), Duration::from_millis(250));
        assert_eq!(EngineConfig::default().max_suggestions, 5);
        assert_eq!(
            EngineConfig::default().exhaustion_policy,
            ExhaustionPolicy::RedirectToManualEntry
        );
    }

    #[test]
    fn policy_wire_names() {
        let policy: ExhaustionPolicy = serde_json::from_value(json!("execute_partial")).unwrap();
        assert_eq!(policy, ExhaustionPolicy::ExecutePartial);
    }
}
