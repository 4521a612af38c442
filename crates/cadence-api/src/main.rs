//! Cadence CLI entry point.
//!
//! Binary name: `cadence`
//!
//! Parses CLI arguments, loads configuration, initializes logging and the
//! runtime, then dispatches to the matching command handler.

mod cli;
mod state;

use anyhow::Context;
use clap::Parser;
use clap_complete::generate;

use cadence_infra::config::load_runtime_config;
use cadence_infra::filesystem::resolve_data_dir;
use cli::{Cli, Commands, ConfigAction, MemoryAction, SkillAction};
use state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Shell completions don't need app state
    if let Commands::Completions { shell } = &cli.command {
        let mut cmd = <Cli as clap::CommandFactory>::command();
        generate(*shell, &mut cmd, "cadence", &mut std::io::stdout());
        return Ok(());
    }

    let data_dir = cli.data_dir.clone().unwrap_or_else(resolve_data_dir);
    tokio::fs::create_dir_all(&data_dir)
        .await
        .with_context(|| format!("failed to create {}", data_dir.display()))?;
    let config = load_runtime_config(&data_dir).await?;

    cadence_observe::init_tracing(&config.log, cli.level_override())
        .map_err(|err| anyhow::anyhow!("failed to initialize tracing: {err}"))?;

    // Config commands work on the file alone
    if let Commands::Config { action } = &cli.command {
        let result = match action {
            ConfigAction::Show => cli::config::show(&config, cli.json),
            ConfigAction::Init { force } => cli::config::init(&data_dir, *force, cli.json).await,
            ConfigAction::Path => cli::config::path(&data_dir, cli.json),
        };
        cadence_observe::shutdown_tracing();
        return result;
    }

    let state = AppState::init(data_dir, config).await?;

    let outcome = match cli.command {
        Commands::Run => cli::run::run(&state, cli.quiet, shutdown_signal()).await,

        Commands::Skill { action } => match action {
            SkillAction::List => cli::skill::list_skills(&state, cli.json),
            SkillAction::Exec {
                name,
                input,
                mode,
                params,
                user,
            } => cli::skill::exec_skill(&state, &name, input, mode, params, user, cli.json).await,
            SkillAction::Extra { name, operation } => {
                cli::skill::exec_extra(&state, &name, &operation, cli.json).await
            }
            SkillAction::Schedule {
                name,
                every,
                max_runs,
                input,
            } => {
                cli::skill::schedule_skill(&state, &name, every, max_runs, input, cli.json, shutdown_signal())
                    .await
            }
            SkillAction::Schedules => cli::skill::list_schedules(&state, cli.json),
        },

        Commands::Memory { action } => match action {
            MemoryAction::Add {
                content,
                tags,
                importance,
                source,
            } => cli::memory::add_memory(&state, content, tags, importance, source, cli.json).await,
            MemoryAction::Query {
                keywords,
                tags,
                min_importance,
                since_days,
                limit,
                sort,
            } => cli::memory::query_memories(
                &state,
                keywords,
                tags,
                min_importance,
                since_days,
                limit,
                sort,
                cli.json,
            ),
            MemoryAction::Get { id } => cli::memory::show_memory(&state, &id, cli.json),
            MemoryAction::Update {
                id,
                content,
                tags,
                importance,
            } => cli::memory::update_memory(&state, &id, content, tags, importance, cli.json).await,
            MemoryAction::Delete { id } => cli::memory::delete_memory(&state, &id, cli.json).await,
            MemoryAction::Stats => cli::memory::memory_stats(&state, cli.json),
            MemoryAction::Cleanup => cli::memory::cleanup(&state, cli.json).await,
        },

        Commands::Status => cli::status::status(&state, cli.json),

        Commands::Config { .. } | Commands::Completions { .. } => Ok(()),
    };

    // Persist and stop background work even when the command failed
    let stopped = state.shutdown().await;
    cadence_observe::shutdown_tracing();
    outcome?;
    stopped
}

/// Wait for Ctrl+C or SIGTERM for graceful shutdown.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %err, "failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                tracing::error!(error = %err, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
