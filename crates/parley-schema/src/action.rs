//! Supported task kinds
//!
//! The action set is closed: a conversation can only ever resolve parameters
//! for one of these variants.

use crate::error::SchemaError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Task kinds the engine can hand off for execution
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    /// Create a batch of generic items inside a container
    CreateItems,
    /// Create compliance controls for a framework under a project
    CreateControls,
    /// Register a risk against a project
    CreateRisks,
    /// Attach an evidence document to a control
    UploadEvidence,
}

impl ActionKind {
    /// Every supported action, in registry order
    pub const ALL: [ActionKind; 4] = [
        ActionKind::CreateItems,
        ActionKind::CreateControls,
        ActionKind::CreateRisks,
        ActionKind::UploadEvidence,
    ];

    /// Wire name of the action
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionKind::CreateItems => "create_items",
            ActionKind::CreateControls => "create_controls",
            ActionKind::CreateRisks => "create_risks",
            ActionKind::UploadEvidence => "upload_evidence",
        }
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ActionKind {
    type Err = SchemaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace(['-', ' '], "_");
        Self::ALL
            .into_iter()
            .find(|action| action.as_str() == normalized)
            .ok_or_else(|| SchemaError::UnknownAction(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_wire_names() {
        for action in ActionKind::ALL {
            assert_eq!(action.as_str().parse::<ActionKind>().unwrap(), action);
        }
    }

    #[test]
    fn parse_is_lenient_about_separators() {
        assert_eq!(
            "Create-Items".parse::<ActionKind>().unwrap(),
            ActionKind::CreateItems
        );
        assert_eq!(
            "upload evidence".parse::<ActionKind>().unwrap(),
            ActionKind::UploadEvidence
        );
    }

    #[test]
    fn parse_unknown_action() {
        let err = "delete_everything".parse::<ActionKind>().unwrap_err();
        assert!(matches!(err, SchemaError::UnknownAction(name) if name == "delete_everything"));
    }

    #[test]
    fn serde_uses_snake_case() {
        let json = serde_json::to_string(&ActionKind::CreateControls).unwrap();
        assert_eq!(json, "\"create_controls\"");
        let back: ActionKind = serde_json::from_str(&json).unwrap();
        assert_eq!(back, ActionKind::CreateControls);
    }
}
