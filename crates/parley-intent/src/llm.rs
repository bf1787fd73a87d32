//! Language model extractor
//!
//! [`LlmIntentExtractor`] prompts an OpenAI-compatible chat completions
//! endpoint in JSON mode and parses the reply into a [`CandidateIntent`].
//! The transport sits behind [`LanguageModel`] so tests can script replies.

use crate::candidate::CandidateIntent;
use crate::error::{ContractViolation, ExtractError, ModelError};
use crate::extractor::{ExtractionRequest, IntentExtractor};
use crate::prompt::PromptBuilder;
use parley_schema::SchemaRegistry;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

/// Default chat completions endpoint
pub const DEFAULT_ENDPOINT: &str = "https://api.openai.com/v1/chat/completions";

/// Default model name
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";

/// Language model connection settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    /// Chat completions URL
    pub endpoint: String,
    /// Model name
    pub model: String,
    /// Bearer token; usually supplied through the environment
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    /// Sampling temperature
    pub temperature: f32,
    /// Per-request timeout in milliseconds
    pub timeout_ms: u64,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            model: DEFAULT_MODEL.to_string(),
            api_key: None,
            temperature: 0.0,
            timeout_ms: 8_000,
        }
    }
}

impl ModelConfig {
    /// With API key
    #[inline]
    #[must_use]
    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// Request timeout
    #[inline]
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// Single chat completion call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletionRequest {
    /// System message
    pub system: String,
    /// User message
    pub user: String,
    /// Ask the endpoint for a JSON object response
    pub json_mode: bool,
}

/// Chat model transport
#[async_trait::async_trait]
pub trait LanguageModel: Send + Sync {
    /// Run one completion and return the message content
    ///
    /// # Errors
    /// Returns [`ModelError`] on transport or endpoint failure.
    async fn complete(&self, request: &CompletionRequest) -> Result<String, ModelError>;
}

/// OpenAI-compatible chat completions client
#[derive(Debug, Clone)]
pub struct OpenAiChatModel {
    client: reqwest::Client,
    config: ModelConfig,
}

impl OpenAiChatModel {
    /// Create client from config
    ///
    /// # Errors
    /// Fails if the HTTP client cannot be built.
    pub fn new(config: ModelConfig) -> Result<Self, ModelError> {
        let client = reqwest::Client::builder().timeout(config.timeout()).build()?;
        Ok(Self { client, config })
    }
}

#[derive(Deserialize)]
struct ChatMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[async_trait::async_trait]
impl LanguageModel for OpenAiChatModel {
    async fn complete(&self, request: &CompletionRequest) -> Result<String, ModelError> {
        let mut body = serde_json::json!({
            "model": &self.config.model,
            "messages": [
                {"role": "system", "content": &request.system},
                {"role": "user", "content": &request.user}
            ],
            "temperature": self.config.temperature
        });
        if request.json_mode {
            body["response_format"] = serde_json::json!({"type": "json_object"});
        }

        let mut call = self.client.post(&self.config.endpoint).json(&body);
        if let Some(key) = &self.config.api_key {
            call = call.bearer_auth(key);
        }
        let response = call.send().await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(ModelError::Status { status, body });
        }

        let parsed: ChatResponse = response.json().await?;
        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or(ModelError::EmptyResponse)
    }
}

/// Extractor backed by a language model
pub struct LlmIntentExtractor {
    model: Arc<dyn LanguageModel>,
    prompts: PromptBuilder,
    timeout_ms: u64,
}

impl LlmIntentExtractor {
    /// Create extractor
    ///
    /// # Arguments
    /// * `model` - Chat transport
    /// * `registry` - Schema table the prompt is built from
    /// * `timeout_ms` - Budget reported when the transport times out
    #[must_use]
    pub fn new(model: Arc<dyn LanguageModel>, registry: &SchemaRegistry, timeout_ms: u64) -> Self {
        Self {
            model,
            prompts: PromptBuilder::new(registry),
            timeout_ms,
        }
    }
}

impl std::fmt::Debug for LlmIntentExtractor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LlmIntentExtractor")
            .field("timeout_ms", &self.timeout_ms)
            .finish_non_exhaustive()
    }
}

#[async_trait::async_trait]
impl IntentExtractor for LlmIntentExtractor {
    async fn extract(&self, request: &ExtractionRequest) -> Result<CandidateIntent, ExtractError> {
        let completion = CompletionRequest {
            system: self.prompts.system_prompt(request.strictness),
            user: self.prompts.user_prompt(request),
            json_mode: true,
        };

        let reply = match self.model.complete(&completion).await {
            Ok(reply) => reply,
            Err(ModelError::Transport(e)) if e.is_timeout() => {
                return Err(ExtractError::Timeout {
                    timeout_ms: self.timeout_ms,
                })
            }
            Err(e) => return Err(e.into()),
        };

        tracing::debug!(
            strictness = ?request.strictness,
            reply_len = reply.len(),
            "language model replied"
        );
        parse_reply(&reply).map_err(ExtractError::Recoverable)
    }

    fn name(&self) -> &'static str {
        "llm"
    }
}

/// Parse a model reply into a candidate
///
/// Tolerates markdown code fences and prose around the object.
///
/// # Errors
/// `ContractViolation::Malformed` if no JSON object of the right shape is found.
pub fn parse_reply(reply: &str) -> Result<CandidateIntent, ContractViolation> {
    let start = reply.find('{');
    let end = reply.rfind('}');
    let body = match (start, end) {
        (Some(start), Some(end)) if start < end => &reply[start..=end],
        _ => return Err(ContractViolation::Malformed("no JSON object in reply".to_string())),
    };
    serde_json::from_str(body).map_err(|e| ContractViolation::Malformed(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct ScriptedModel {
        replies: Mutex<Vec<Result<String, ModelError>>>,
        seen: Mutex<Vec<CompletionRequest>>,
    }

    impl ScriptedModel {
        fn new(replies: Vec<Result<String, ModelError>>) -> Self {
            Self {
                replies: Mutex::new(replies),
                seen: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait::async_trait]
    impl LanguageModel for ScriptedModel {
        async fn complete(&self, request: &CompletionRequest) -> Result<String, ModelError> {
            self.seen.lock().unwrap().push(request.clone());
            self.replies.lock().unwrap().remove(0)
        }
    }

    #[test]
    fn parse_reply_strips_fences() {
        let reply = "```json\n{\"action\":\"create_items\",\"parameters\":{\"containerId\":7}}\n```";
        let candidate = parse_reply(reply).unwrap();
        assert_eq!(candidate.action, "create_items");
    }

    #[test]
    fn parse_reply_rejects_prose() {
        assert!(matches!(
            parse_reply("Sure! I will create the items."),
            Err(ContractViolation::Malformed(_))
        ));
        assert!(matches!(
            parse_reply("{\"action\": [1, 2]}"),
            Err(ContractViolation::Malformed(_))
        ));
    }

    #[tokio::test]
    async fn extract_uses_json_mode_and_strict_prompt() {
        let model = Arc::new(ScriptedModel::new(vec![Ok(
            "{\"action\":\"create_risks\"}".to_string()
        )]));
        let extractor = LlmIntentExtractor::new(model.clone(), SchemaRegistry::global(), 100);

        let request = ExtractionRequest::initial("log a risk").strict();
        let candidate = extractor.extract(&request).await.unwrap();
        assert_eq!(candidate.action, "create_risks");

        let seen = model.seen.lock().unwrap();
        assert!(seen[0].json_mode);
        assert!(seen[0].system.contains("previous reply could not be used"));
    }

    #[tokio::test]
    async fn extract_maps_failures() {
        let model = Arc::new(ScriptedModel::new(vec![
            Ok("not json".to_string()),
            Err(ModelError::Status {
                status: 503,
                body: "overloaded".to_string(),
            }),
        ]));
        let extractor = LlmIntentExtractor::new(model, SchemaRegistry::global(), 100);
        let request = ExtractionRequest::initial("hello");

        let first = extractor.extract(&request).await.unwrap_err();
        assert!(first.is_retryable());

        let second = extractor.extract(&request).await.unwrap_err();
        assert!(matches!(second, ExtractError::Unavailable(msg) if msg.contains("503")));
    }

    #[test]
    fn config_defaults() {
        let config = ModelConfig::default();
        assert_eq!(config.model, DEFAULT_MODEL);
        assert_eq!(config.timeout(), Duration::from_millis(8_000));
        assert!(config.api_key.is_none());
    }
}
