//! Parley Server
//!
//! HTTP front end for the conversational engine:
//! - TOML configuration with `PARLEY_*` environment overrides
//! - warp routes for turns, the action registry and health
//! - HTTP clients for the task and recent-records services
//! - tracing subscriber setup

#![warn(unreachable_pub)]
#![warn(missing_docs)]

pub mod app;
pub mod clients;
pub mod config;
pub mod error;
pub mod routes;
pub mod telemetry;

pub use app::build_engine;
pub use clients::{HttpSuggestionSource, HttpTaskExecutor};
pub use config::{CollaboratorConfig, LoggingConfig, ServerConfig};
pub use error::ServerError;
pub use routes::routes;

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
