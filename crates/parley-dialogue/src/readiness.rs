//! Readiness decision
//!
//! Pure function of the state: ready when nothing is missing, exhausted when
//! parameters are still missing and the turn budget is spent, otherwise
//! continue asking.

use crate::state::ConversationState;
use serde::Serialize;
use std::fmt;

/// Default clarification turn budget
pub const DEFAULT_MAX_TURNS: u32 = 5;

/// Outcome of a readiness check
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Readiness {
    /// Ask about the next missing parameter
    Continue,
    /// Everything collected; hand off for execution
    Ready,
    /// Turn budget spent with parameters still missing
    Exhausted,
}

impl Readiness {
    /// Check if the conversation ends on this decision
    #[inline]
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Readiness::Continue)
    }
}

impl fmt::Display for Readiness {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Readiness::Continue => "continue",
            Readiness::Ready => "ready",
            Readiness::Exhausted => "exhausted",
        })
    }
}

/// Decides what a turn should do next
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadinessDecider {
    max_turns: u32,
}

impl Default for ReadinessDecider {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_TURNS)
    }
}

impl ReadinessDecider {
    /// Create decider with a turn budget
    #[inline]
    #[must_use]
    pub fn new(max_turns: u32) -> Self {
        Self { max_turns }
    }

    /// Turn budget
    #[inline]
    #[must_use]
    pub fn max_turns(&self) -> u32 {
        self.max_turns
    }

    /// Decide on a state
    #[must_use]
    pub fn decide(&self, state: &ConversationState) -> Readiness {
        if state.is_complete() {
            Readiness::Ready
        } else if state.turn_count() >= self.max_turns {
            Readiness::Exhausted
        } else {
            Readiness::Continue
        }
    }
}
