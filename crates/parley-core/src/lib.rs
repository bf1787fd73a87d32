//! Parley Core - conversational turn engine
//!
//! Ties the pieces of a stateless conversation together:
//! - Opens and seals the client-held context
//! - Runs intent extraction with a strict retry and a timeout
//! - Merges answers and edits, fills silent defaults
//! - Offers suggestions for the next missing parameter
//! - Hands resolved tasks to the downstream executor
//!
//! # Example
//!
//! ```rust,ignore
//! use parley_core::prelude::*;
//!
//! # async fn example(engine: ResolutionEngine) -> Result<(), EngineError> {
//! let caller = CallerIdentity::new("acme", "u-17");
//! let response = engine
//!     .handle_turn(&caller, TurnRequest::new("Create items"))
//!     .await?;
//! assert!(response.is_clarifying);
//!
//! let next = TurnRequest::new("7").with_context(response.context);
//! let response = engine.handle_turn(&caller, next).await?;
//! # Ok(())
//! # }
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

pub mod cache;
pub mod context;
pub mod engine;
pub mod error;
pub mod handoff;
pub mod resolver;
pub mod types;

pub use cache::{CacheStats, CachedSuggestionSource};
pub use context::{ContextCodec, CONTEXT_VERSION};
pub use engine::ResolutionEngine;
pub use error::{ContextError, EngineError, HandoffError, SourceError};
pub use handoff::{TaskAcknowledgement, TaskExecutor, TaskHandoff, TaskRequest};
pub use resolver::{RecentQuery, Resolution, SuggestionResolver, SuggestionSource};
pub use types::{
    CallerIdentity, EngineConfig, ExhaustionPolicy, TurnId, TurnOutcome, TurnRequest, TurnResponse,
};

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for embedding the engine
    pub use crate::{
        CallerIdentity, ContextCodec, EngineConfig, EngineError, ExhaustionPolicy,
        ResolutionEngine, TaskExecutor, TurnOutcome, TurnRequest, TurnResponse,
    };
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
