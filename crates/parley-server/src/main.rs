//! `parley` binary: serve, list actions, check configuration

use anyhow::Context;
use clap::{Parser, Subcommand};
use parley_schema::{literal_string, SchemaRegistry};
use parley_server::{build_engine, routes, telemetry, ServerConfig};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

/// Conversational parameter resolution service
#[derive(Debug, Parser)]
#[command(name = "parley", version, about)]
struct Cli {
    /// TOML configuration file
    #[arg(long, env = "PARLEY_CONFIG", global = true)]
    config: Option<PathBuf>,

    /// Override the listen address
    #[arg(long, global = true)]
    listen: Option<SocketAddr>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Serve the HTTP API (default)
    Serve,
    /// Print the supported actions and their parameters
    Actions {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Validate the configuration and print it without secrets
    CheckConfig,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = ServerConfig::load(cli.config.as_deref()).context("loading configuration")?;
    config.apply_env(|key| std::env::var(key).ok())?;
    if let Some(listen) = cli.listen {
        config.listen = listen;
    }

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(config).await,
        Command::Actions { json } => print_actions(json),
        Command::CheckConfig => {
            config.validate()?;
            println!("{}", config.to_toml()?);
            Ok(())
        }
    }
}

async fn serve(config: ServerConfig) -> anyhow::Result<()> {
    telemetry::init(&config.logging)?;
    let engine = Arc::new(build_engine(&config).context("building engine")?);

    let (addr, server) = warp::serve(routes(engine.clone()))
        .try_bind_with_graceful_shutdown(config.listen, async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "cannot listen for shutdown signal");
            }
        })
        .with_context(|| format!("binding {}", config.listen))?;

    tracing::info!(
        %addr,
        version = parley_server::VERSION,
        actions = engine.registry().len(),
        max_turns = engine.config().max_turns,
        "parley listening"
    );
    server.await;
    tracing::info!("parley stopped");
    Ok(())
}

fn print_actions(json: bool) -> anyhow::Result<()> {
    let registry = SchemaRegistry::global();
    if json {
        let schemas: Vec<_> = registry.schemas().collect();
        println!("{}", serde_json::to_string_pretty(&schemas)?);
        return Ok(());
    }

    for schema in registry.schemas() {
        println!("{} - {}", schema.action, schema.description);
        for spec in schema.required() {
            match &spec.silent_default {
                Some(value) => println!(
                    "  {:<14} required  (default {})",
                    spec.name.as_str(),
                    literal_string(value)
                ),
                None => println!("  {:<14} required", spec.name.as_str()),
            }
        }
        for spec in schema.optional_parameters() {
            let default = spec
                .silent_default
                .as_ref()
                .map(literal_string)
                .unwrap_or_default();
            println!("  {:<14} optional  (default {default})", spec.name.as_str());
        }
    }
    Ok(())
}
