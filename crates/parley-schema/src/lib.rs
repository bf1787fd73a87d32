//! Parley Action Schema Registry
//!
//! Static description of every task kind the conversational engine can
//! resolve parameters for.
//!
//! # Core Concepts
//!
//! - [`ActionKind`]: Closed enumeration of supported actions
//! - [`ActionSchema`]: Required parameters (in asking priority), optional
//!   parameters with silent defaults
//! - [`ParameterSpec`] / [`ParameterKind`]: Typed slots and literal coercion
//! - [`SchemaRegistry`]: Read-only action → schema table
//!
//! # Example
//!
//! ```rust
//! use parley_schema::{ActionKind, SchemaRegistry};
//!
//! let registry = SchemaRegistry::global();
//! let schema = registry.get(ActionKind::CreateItems).unwrap();
//! assert_eq!(schema.tracked_parameters()[0].as_str(), "containerId");
//! ```

#![warn(unreachable_pub)]
#![warn(missing_docs)]

mod action;
mod error;
mod parameter;
mod registry;
mod schema;

pub use action::ActionKind;
pub use error::SchemaError;
pub use parameter::{
    literal_string, EntityKind, ParamName, ParamValue, ParameterKind, ParameterSpec,
    SuggestionPolicy,
};
pub use registry::{SchemaRegistry, FRAMEWORKS, ITEM_CATEGORIES, SEVERITIES};
pub use schema::ActionSchema;

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
