//! Action schema registry
//!
//! Provides [`SchemaRegistry`], the static table mapping each supported
//! action to its parameter schema.

use crate::action::ActionKind;
use crate::error::SchemaError;
use crate::parameter::{EntityKind, ParameterSpec};
use crate::schema::ActionSchema;
use indexmap::IndexMap;
use once_cell::sync::Lazy;

static BUILTIN: Lazy<SchemaRegistry> = Lazy::new(SchemaRegistry::builtin);

/// Frameworks controls can be created for
pub const FRAMEWORKS: &[&str] = &["iso27001", "soc2", "nist_csf", "gdpr", "hipaa", "pci_dss"];

/// Item categories
pub const ITEM_CATEGORIES: &[&str] = &["network", "access", "data", "physical", "governance"];

/// Risk severities
pub const SEVERITIES: &[&str] = &["low", "medium", "high", "critical"];

/// Read-only lookup from action to schema
#[derive(Debug, Clone, Default)]
pub struct SchemaRegistry {
    schemas: IndexMap<ActionKind, ActionSchema>,
}

impl SchemaRegistry {
    /// Create new empty registry
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self {
            schemas: IndexMap::new(),
        }
    }

    /// Shared built-in registry
    #[inline]
    #[must_use]
    pub fn global() -> &'static SchemaRegistry {
        &BUILTIN
    }

    /// Create registry with the built-in action table
    #[must_use]
    pub fn builtin() -> Self {
        let schemas = [
            ActionSchema::new(ActionKind::CreateItems, "Create items inside a container")
                .with_keywords(&["create items", "add items", "new items", "items"])
                .require(
                    ParameterSpec::entity("containerId", "container", EntityKind::Container)
                        .describe("Numeric id of the container the items go into"),
                )
                .require(
                    ParameterSpec::choice("category", "category", ITEM_CATEGORIES)
                        .describe("Category assigned to every created item"),
                ),
            ActionSchema::new(
                ActionKind::CreateControls,
                "Create compliance controls of a framework under a project",
            )
            .with_keywords(&["controls", "create controls", "upload controls", "add controls"])
            .require(
                ParameterSpec::entity("projectId", "project", EntityKind::Project)
                    .describe("Numeric id of the compliance project"),
            )
            .require(
                ParameterSpec::choice("framework", "framework", FRAMEWORKS)
                    .describe("Compliance framework the controls belong to"),
            )
            .require(
                ParameterSpec::integer("count", "number of controls", 1, 500)
                    .describe("How many controls to create")
                    .with_default(10),
            )
            .optional(
                ParameterSpec::choice("status", "initial status", &["draft", "active"])
                    .describe("Initial lifecycle status of the controls")
                    .with_default("draft"),
            ),
            ActionSchema::new(ActionKind::CreateRisks, "Register a risk against a project")
                .with_keywords(&["risk", "risks", "register risk", "log a risk"])
                .require(
                    ParameterSpec::entity("projectId", "project", EntityKind::Project)
                        .describe("Numeric id of the compliance project"),
                )
                .require(ParameterSpec::text("title", "risk title").describe("Short risk title"))
                .require(
                    ParameterSpec::choice("severity", "severity", SEVERITIES)
                        .describe("Risk severity")
                        .with_default("medium"),
                ),
            ActionSchema::new(ActionKind::UploadEvidence, "Attach an evidence document to a control")
                .with_keywords(&["evidence", "upload evidence", "attach evidence", "attach"])
                .require(
                    ParameterSpec::entity("controlId", "control", EntityKind::Control)
                        .describe("Numeric id of the control the evidence supports"),
                )
                .require(
                    ParameterSpec::text("documentName", "document name")
                        .describe("File name of the already uploaded document"),
                )
                .optional(
                    ParameterSpec::choice(
                        "reviewState",
                        "review state",
                        &["pending", "under_review", "approved", "rejected"],
                    )
                    .describe("Review state the evidence starts in")
                    .with_default("pending"),
                ),
        ];

        let mut registry = Self::new();
        for schema in schemas {
            // Built-in table is validated by the tests below
            registry.schemas.insert(schema.action, schema);
        }
        registry
    }

    /// Register a schema, replacing any previous one for the action
    ///
    /// # Errors
    /// Propagates [`ActionSchema::validate`] failures.
    pub fn register(&mut self, schema: ActionSchema) -> Result<(), SchemaError> {
        schema.validate()?;
        self.schemas.insert(schema.action, schema);
        Ok(())
    }

    /// Look up the schema for an action
    ///
    /// # Errors
    /// `SchemaError::UnknownAction` if the action is not registered.
    pub fn get(&self, action: ActionKind) -> Result<&ActionSchema, SchemaError> {
        self.schemas
            .get(&action)
            .ok_or_else(|| SchemaError::UnknownAction(action.to_string()))
    }

    /// Look up by wire name
    ///
    /// # Errors
    /// `SchemaError::UnknownAction` if the name is unknown or unregistered.
    pub fn lookup(&self, name: &str) -> Result<&ActionSchema, SchemaError> {
        self.get(name.parse()?)
    }

    /// Check if action is registered
    #[inline]
    #[must_use]
    pub fn contains(&self, action: ActionKind) -> bool {
        self.schemas.contains_key(&action)
    }

    /// Iterate schemas in registration order
    pub fn schemas(&self) -> impl Iterator<Item = &ActionSchema> {
        self.schemas.values()
    }

    /// Number of registered actions
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.schemas.len()
    }

    /// Check if registry is empty
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.schemas.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn builtin_covers_every_action() {
        let registry = SchemaRegistry::builtin();
        assert_eq!(registry.len(), ActionKind::ALL.len());
        for action in ActionKind::ALL {
            assert!(registry.contains(action), "{action} missing");
        }
    }

    #[test]
    fn builtin_schemas_validate() {
        for schema in SchemaRegistry::builtin().schemas() {
            schema.validate().unwrap();
        }
    }

    #[test]
    fn create_items_priority() {
        let registry = SchemaRegistry::builtin();
        let schema = registry.get(ActionKind::CreateItems).unwrap();
        assert_eq!(schema.tracked_parameters(), vec!["containerId", "category"]);
        assert!(schema.silent_defaults().is_empty());
    }

    #[test]
    fn create_controls_defaults() {
        let registry = SchemaRegistry::global();
        let schema = registry.lookup("create_controls").unwrap();
        let defaults = schema.silent_defaults();
        assert_eq!(defaults.get("count"), Some(&json!(10)));
        assert_eq!(defaults.get("status"), Some(&json!("draft")));
    }

    #[test]
    fn lookup_unknown() {
        let registry = SchemaRegistry::builtin();
        assert!(matches!(
            registry.lookup("launch_rocket"),
            Err(SchemaError::UnknownAction(_))
        ));
        assert!(matches!(
            SchemaRegistry::new().get(ActionKind::CreateItems),
            Err(SchemaError::UnknownAction(_))
        ));
    }

    #[test]
    fn register_validates() {
        let mut registry = SchemaRegistry::new();
        let bad = ActionSchema::new(ActionKind::CreateItems, "bad")
            .optional(ParameterSpec::text("note", "note"));
        assert!(registry.register(bad).is_err());
        assert!(registry.is_empty());

        let good = ActionSchema::new(ActionKind::CreateItems, "good")
            .require(ParameterSpec::text("note", "note"));
        registry.register(good).unwrap();
        assert_eq!(registry.len(), 1);
    }
}
