//! Parley Dialogue
//!
//! Deterministic conversation mechanics, free of I/O:
//!
//! - [`ConversationState`]: the client-held memory of a conversation
//! - [`ContextMerger`]: initialize, answer, edit and default transitions
//! - [`ReadinessDecider`]: continue / ready / exhausted
//! - [`ClarificationFormatter`]: question templates and notices

#![warn(unreachable_pub)]
#![warn(missing_docs)]

mod error;
mod formatter;
mod merger;
mod readiness;
mod state;
mod suggestion;

pub use error::{FormatError, MergeError, StateError};
pub use formatter::{Clarification, ClarificationFormatter, NOT_UNDERSTOOD, TRY_AGAIN};
pub use merger::{ContextMerger, EditInstruction};
pub use readiness::{Readiness, ReadinessDecider, DEFAULT_MAX_TURNS};
pub use state::ConversationState;
pub use suggestion::{Suggestion, MAX_SUGGESTIONS};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
