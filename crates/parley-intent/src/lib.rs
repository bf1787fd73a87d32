//! Parley Intent Extraction
//!
//! Converts a free-text utterance into a candidate action plus whatever
//! parameters it states, and holds that output to a strict contract.
//!
//! # Components
//!
//! - [`IntentExtractor`]: Pluggable extraction seam
//! - [`LlmIntentExtractor`]: OpenAI-compatible chat model in JSON mode
//! - [`KeywordIntentExtractor`]: Deterministic offline adapter
//! - [`contract::validate`]: Action, parameter and value checks against the
//!   registry

#![warn(unreachable_pub)]
#![warn(missing_docs)]

mod candidate;
pub mod contract;
mod error;
mod extractor;
mod keyword;
mod llm;
mod prompt;

pub use candidate::{CandidateIntent, ValidatedIntent};
pub use error::{ContractViolation, ExtractError, ModelError};
pub use extractor::{ExtractionRequest, IntentExtractor, Strictness};
pub use keyword::KeywordIntentExtractor;
pub use llm::{
    parse_reply, CompletionRequest, LanguageModel, LlmIntentExtractor, ModelConfig,
    OpenAiChatModel, DEFAULT_ENDPOINT, DEFAULT_MODEL,
};
pub use prompt::PromptBuilder;

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
