//! Server configuration
//!
//! Loaded from a TOML file, then overridden by `PARLEY_*` environment
//! variables and finally by command-line flags. Every section has
//! defaults, so an empty file is a valid configuration for `actions` and
//! `check-config`; `serve` additionally needs a context secret and a task
//! service.

use crate::error::ServerError;
use parley_core::EngineConfig;
use parley_intent::ModelConfig;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

/// Shortest accepted context secret, in bytes
pub const MIN_SECRET_LEN: usize = 16;

/// Top-level configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Socket address to serve on
    pub listen: SocketAddr,
    /// Key material for sealing conversation contexts
    #[serde(skip_serializing)]
    pub context_secret: Option<String>,
    /// Turn engine settings
    pub engine: EngineConfig,
    /// Language model; the keyword extractor is used when absent
    pub llm: Option<ModelConfig>,
    /// Downstream services
    pub collaborators: CollaboratorConfig,
    /// Log output
    pub logging: LoggingConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: SocketAddr::from(([127, 0, 0, 1], 8080)),
            context_secret: None,
            engine: EngineConfig::default(),
            llm: None,
            collaborators: CollaboratorConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

/// Task and suggestion service endpoints
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CollaboratorConfig {
    /// Base URL of the task execution service
    pub task_service_url: Option<String>,
    /// Base URL of the recent-records service; no suggestions when absent
    pub suggestion_service_url: Option<String>,
    /// How long recent-record lookups are cached
    pub suggestion_cache_ttl_secs: u64,
    /// Cached lookups kept at most
    pub suggestion_cache_capacity: u64,
    /// Timeout for calls to either service
    pub request_timeout_ms: u64,
}

impl Default for CollaboratorConfig {
    fn default() -> Self {
        Self {
            task_service_url: None,
            suggestion_service_url: None,
            suggestion_cache_ttl_secs: 30,
            suggestion_cache_capacity: 10_000,
            request_timeout_ms: 5_000,
        }
    }
}

impl CollaboratorConfig {
    /// Request timeout
    #[inline]
    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    /// Suggestion cache TTL
    #[inline]
    #[must_use]
    pub fn suggestion_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.suggestion_cache_ttl_secs)
    }
}

/// Log filter and format
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `EnvFilter` directives used when `RUST_LOG` is unset
    pub filter: String,
    /// Emit JSON lines instead of human-readable output
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "info,parley_core=info".to_string(),
            json: false,
        }
    }
}

impl ServerConfig {
    /// Load from a TOML file, or defaults when no path is given
    ///
    /// # Errors
    /// [`ServerError::Read`] or [`ServerError::Parse`].
    pub fn load(path: Option<&Path>) -> Result<Self, ServerError> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let text = std::fs::read_to_string(path).map_err(|source| ServerError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&text)
    }

    /// Parse TOML text
    ///
    /// # Errors
    /// [`ServerError::Parse`] on syntax or type errors.
    pub fn from_toml(text: &str) -> Result<Self, ServerError> {
        Ok(toml::from_str(text)?)
    }

    /// Apply `PARLEY_*` overrides
    ///
    /// `lookup` is `std::env::var` in the binary and a map in tests.
    /// `PARLEY_LLM_API_KEY` only fills an existing `[llm]` section; without
    /// one the keyword extractor stays in use.
    ///
    /// # Errors
    /// [`ServerError::Invalid`] if `PARLEY_LISTEN` is not a socket address.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ServerError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(listen) = lookup("PARLEY_LISTEN") {
            self.listen = listen
                .parse()
                .map_err(|_| ServerError::invalid(format!("PARLEY_LISTEN={listen} is not an address")))?;
        }
        if let Some(secret) = lookup("PARLEY_CONTEXT_SECRET") {
            self.context_secret = Some(secret);
        }
        if let Some(key) = lookup("PARLEY_LLM_API_KEY") {
            self.llm = self.llm.take().map(|llm| llm.with_api_key(key));
        }
        if let Some(url) = lookup("PARLEY_TASK_SERVICE_URL") {
            self.collaborators.task_service_url = Some(url);
        }
        if let Some(url) = lookup("PARLEY_SUGGESTION_SERVICE_URL") {
            self.collaborators.suggestion_service_url = Some(url);
        }
        Ok(())
    }

    /// Check the settings needed to serve traffic
    ///
    /// # Errors
    /// [`ServerError::Invalid`] naming the first problem found.
    pub fn validate(&self) -> Result<(), ServerError> {
        match &self.context_secret {
            None => return Err(ServerError::invalid("context_secret is not set")),
            Some(secret) if secret.len() < MIN_SECRET_LEN => {
                return Err(ServerError::invalid(format!(
                    "context_secret must be at least {MIN_SECRET_LEN} bytes"
                )))
            }
            Some(_) => {}
        }
        if self.collaborators.task_service_url.is_none() {
            return Err(ServerError::invalid("collaborators.task_service_url is not set"));
        }
        if self.engine.max_turns == 0 {
            return Err(ServerError::invalid("engine.max_turns must be at least 1"));
        }
        if self.engine.max_suggestions > parley_dialogue::MAX_SUGGESTIONS {
            return Err(ServerError::invalid(format!(
                "engine.max_suggestions must be at most {}",
                parley_dialogue::MAX_SUGGESTIONS
            )));
        }
        if self.engine.max_utterance_chars == 0 {
            return Err(ServerError::invalid("engine.max_utterance_chars must be positive"));
        }
        if let Some(llm) = &self.llm {
            if llm.api_key.is_none() {
                return Err(ServerError::invalid(
                    "llm is configured but PARLEY_LLM_API_KEY is not set",
                ));
            }
        }
        Ok(())
    }

    /// Render as TOML, without secrets
    ///
    /// # Errors
    /// [`ServerError::Invalid`] if the value cannot be rendered.
    pub fn to_toml(&self) -> Result<String, ServerError> {
        toml::to_string_pretty(self).map_err(|e| ServerError::invalid(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parley_core::ExhaustionPolicy;
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;
    use std::io::Write;

    const SAMPLE: &str = r#"
listen = "0.0.0.0:9000"

[engine]
max_turns = 4
exhaustion_policy = "execute_partial"
manual_entry_url = "https://tracker.example/new"

[llm]
model = "gpt-4o"
timeout_ms = 5000

[collaborators]
task_service_url = "http://tasks.internal"
suggestion_cache_ttl_secs = 10

[logging]
json = true
"#;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn empty_file_is_all_defaults() {
        let config = ServerConfig::from_toml("").unwrap();
        assert_eq!(config, ServerConfig::default());
        assert!(config.llm.is_none());
    }

    #[test]
    fn loads_sections_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(SAMPLE.as_bytes()).unwrap();

        let config = ServerConfig::load(Some(file.path())).unwrap();
        assert_eq!(config.listen, "0.0.0.0:9000".parse().unwrap());
        assert_eq!(config.engine.max_turns, 4);
        assert_eq!(config.engine.exhaustion_policy, ExhaustionPolicy::ExecutePartial);
        // unspecified engine keys keep their defaults
        assert_eq!(config.engine.max_suggestions, 5);
        let llm = config.llm.unwrap();
        assert_eq!(llm.model, "gpt-4o");
        assert_eq!(llm.endpoint, parley_intent::DEFAULT_ENDPOINT);
        assert_eq!(config.collaborators.suggestion_cache_ttl(), Duration::from_secs(10));
        assert!(config.logging.json);
    }

    #[test]
    fn missing_file_is_a_read_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = ServerConfig::load(Some(&dir.path().join("absent.toml"))).unwrap_err();
        assert!(matches!(err, ServerError::Read { .. }));
    }

    #[test]
    fn unknown_policy_is_a_parse_error() {
        let err = ServerConfig::from_toml("[engine]\nexhaustion_policy = \"shrug\"").unwrap_err();
        assert!(matches!(err, ServerError::Parse(_)));
    }

    #[test]
    fn environment_overrides_file() {
        let mut config = ServerConfig::from_toml(SAMPLE).unwrap();
        config
            .apply_env(env(&[
                ("PARLEY_LISTEN", "127.0.0.1:7000"),
                ("PARLEY_CONTEXT_SECRET", "0123456789abcdef0123"),
                ("PARLEY_LLM_API_KEY", "sk-test"),
                ("PARLEY_TASK_SERVICE_URL", "http://tasks.other"),
            ]))
            .unwrap();

        assert_eq!(config.listen.port(), 7000);
        assert_eq!(config.llm.as_ref().unwrap().model, "gpt-4o");
        assert_eq!(config.llm.as_ref().unwrap().api_key.as_deref(), Some("sk-test"));
        assert_eq!(
            config.collaborators.task_service_url.as_deref(),
            Some("http://tasks.other")
        );
        config.validate().unwrap();
    }

    #[test]
    fn api_key_without_llm_section_stays_offline() {
        let mut config = ServerConfig::default();
        config.apply_env(env(&[("PARLEY_LLM_API_KEY", "sk-test")])).unwrap();
        assert!(config.llm.is_none());

        let mut config = ServerConfig::from_toml("[llm]\nmodel = \"gpt-4o\"").unwrap();
        config.apply_env(env(&[("PARLEY_LLM_API_KEY", "sk-test")])).unwrap();
        assert_eq!(config.llm.unwrap().api_key.as_deref(), Some("sk-test"));
    }

    #[test]
    fn bad_listen_address() {
        let mut config = ServerConfig::default();
        let err = config
            .apply_env(env(&[("PARLEY_LISTEN", "everywhere")]))
            .unwrap_err();
        assert!(matches!(err, ServerError::Invalid(_)));
    }

    #[test]
    fn validation_needs_secret_and_task_service() {
        let mut config = ServerConfig::default();
        assert!(config.validate().is_err());

        config.context_secret = Some("short".into());
        config.collaborators.task_service_url = Some("http://tasks".into());
        assert!(config.validate().is_err());

        config.context_secret = Some("a-long-enough-secret".into());
        config.validate().unwrap();

        config.engine.max_suggestions = 9;
        assert!(config.validate().is_err());
    }

    #[test]
    fn rendered_toml_hides_secrets() {
        let mut config = ServerConfig::from_toml(SAMPLE).unwrap();
        config.context_secret = Some("a-long-enough-secret".into());
        config.llm = config.llm.map(|llm| llm.with_api_key("sk-test"));

        let rendered = config.to_toml().unwrap();
        assert!(!rendered.contains("a-long-enough-secret"));
        assert!(!rendered.contains("sk-test"));
        let reparsed = ServerConfig::from_toml(&rendered).unwrap();
        assert_eq!(reparsed.engine, config.engine);
    }
}
