//! keystone - module lifecycle orchestrator CLI
//!
//! Loads simulated modules from a TOML file and drives them through the
//! orchestrator:
//!
//! - `check`: config validation + registry preflight
//! - `plan`: declared start / shutdown order (or what one module brings up)
//! - `run`: start everything, hold, shut everything down

mod config;
mod module;

use std::collections::BTreeSet;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use keystone_core::{
    BulkError, LifecycleConfig, Module, ModuleId, ModuleRegistry, Orchestrator, RegistryError,
};

use crate::config::{ConfigError, KeystoneConfig, load_config};
use crate::module::SimulatedModule;

#[derive(Parser)]
#[command(name = "keystone")]
#[command(about = "Start and stop modules in dependency order", long_about = None)]
struct Cli {
    /// Path to the TOML config file
    #[arg(short, long, default_value = "keystone.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate the config and the module declarations
    Check,
    /// Print the declared start and shutdown order
    Plan {
        /// Only show what starting this module brings up
        #[arg(long)]
        module: Option<String>,
    },
    /// Start every module, hold, then shut everything down
    Run {
        /// How long to keep modules running (Ctrl-C ends the hold early)
        #[arg(long, default_value_t = 1000)]
        hold_ms: u64,
    },
}

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error("failed to render status: {0}")]
    Json(#[from] serde_json::Error),
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "keystone=info,keystone_core=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    match run(cli).await {
        Ok(code) => code,
        Err(err) => {
            tracing::error!(error = %err, "keystone failed");
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<ExitCode, CliError> {
    let config = load_config(&cli.config)?;
    tracing::info!(
        path = %cli.config.display(),
        modules = config.modules.len(),
        "Configuration loaded"
    );

    let registry = build_registry(&config)?;

    match cli.command {
        Commands::Check => Ok(check(&registry)),
        Commands::Plan { module } => Ok(plan(&registry, module.map(ModuleId::from))),
        Commands::Run { hold_ms } => {
            run_modules(registry, config.lifecycle, Duration::from_millis(hold_ms)).await
        }
    }
}

fn build_registry(config: &KeystoneConfig) -> Result<ModuleRegistry, RegistryError> {
    let mut registry = ModuleRegistry::new();
    for module in &config.modules {
        let module: Arc<dyn Module> = Arc::new(SimulatedModule::from_config(module));
        registry.register(module)?;
    }
    Ok(registry)
}

fn check(registry: &ModuleRegistry) -> ExitCode {
    match registry.validate() {
        Ok(()) => {
            println!("ok: {} module(s)", registry.len());
            ExitCode::SUCCESS
        }
        Err(issues) => {
            for issue in &issues {
                println!("error: {issue}");
            }
            ExitCode::FAILURE
        }
    }
}

fn plan(registry: &ModuleRegistry, module: Option<ModuleId>) -> ExitCode {
    let graph = registry.graph();
    let (start, shutdown) = match (graph.topological_order(), graph.shutdown_order()) {
        (Ok(start), Ok(shutdown)) => (start, shutdown),
        (Err(unorderable), _) | (_, Err(unorderable)) => {
            println!(
                "error: cannot order modules involved in a cycle: {}",
                join_ids(unorderable.iter())
            );
            return ExitCode::FAILURE;
        }
    };

    let Some(module) = module else {
        println!("start:    {}", join_ids(start.iter()));
        println!("shutdown: {}", join_ids(shutdown.iter()));
        return ExitCode::SUCCESS;
    };

    if !registry.contains(&module) {
        println!("error: module {module} is not configured");
        return ExitCode::FAILURE;
    }
    let mut needed: BTreeSet<ModuleId> = graph.transitive_dependencies(&module).into_iter().collect();
    needed.insert(module.clone());
    println!(
        "start {module}: {}",
        join_ids(start.iter().filter(|m| needed.contains(*m)))
    );
    ExitCode::SUCCESS
}

fn join_ids<'a>(ids: impl Iterator<Item = &'a ModuleId>) -> String {
    ids.map(ModuleId::as_str).collect::<Vec<_>>().join(" -> ")
}

async fn run_modules(
    registry: ModuleRegistry,
    lifecycle: LifecycleConfig,
    hold: Duration,
) -> Result<ExitCode, CliError> {
    let orchestrator = Orchestrator::new(registry, lifecycle);
    let mut failed = false;
    let mut interrupted = false;

    tokio::select! {
        result = orchestrator.start_all() => {
            if let Err(err) = result {
                report(&err);
                failed = true;
            }
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::warn!("Interrupted while starting; cancelling");
            orchestrator.cancel();
            interrupted = true;
        }
    }

    println!("{}", serde_json::to_string_pretty(&orchestrator.status().await)?);

    if !interrupted {
        tracing::info!(hold_ms = hold.as_millis() as u64, "Modules running");
        tokio::select! {
            _ = tokio::time::sleep(hold) => {}
            _ = tokio::signal::ctrl_c() => tracing::info!("Interrupted; shutting down"),
        }
    }

    if let Err(err) = orchestrator.shutdown_all().await {
        report(&err);
        failed = true;
    }

    println!("{}", serde_json::to_string_pretty(&orchestrator.counts().await)?);

    Ok(if failed || interrupted {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    })
}

fn report(err: &BulkError) {
    tracing::warn!(phase = %err.phase, failed = err.failures.len(), "{err}");
    for (module, cause) in err.root_causes() {
        tracing::error!(%module, error = %cause, "root cause");
    }
    if err.failures.iter().any(|(_, cause)| cause.is_configuration()) {
        tracing::info!("`keystone check` reports configuration problems without running hooks");
    }
}
