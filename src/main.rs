// Copyright (c) 2025-2026 The Legion Project Authors
//
// SPDX-License-Identifier: Apache-2.0
mod cli;

use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tracing_subscriber::{filter::EnvFilter, fmt, prelude::*};

use cli::{Cli, Commands};
use legion_agent_runtime::AgentRuntime;
use legion_bus::{EventBus, LegionError};
use legion_channels::ChannelService;
use legion_memory::MemoryEngine;
use legion_orchestrator::{Orchestrator, OrchestratorSettings};
use legion_persona::PersonaEngine;
use legion_sessions::SessionStore;

const EX_OK: u8 = 0;
const EX_USAGE: u8 = 64;
const EX_SOFTWARE: u8 = 70;
const EX_TEMPFAIL: u8 = 75;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let _ = e.print();
            return ExitCode::from(if e.use_stderr() { EX_USAGE } else { EX_OK });
        }
    };

    init_logging(cli.verbose);

    match run(cli).await {
        Ok(()) => ExitCode::from(EX_OK),
        Err(err) => {
            tracing::error!("{err:?}");
            ExitCode::from(exit_code_for(&err))
        }
    }
}

/// Maps an error escaping to the process boundary onto a sysexits-derived
/// code. `ConcurrencyConflict` and `ModelTransient` are recovered inside
/// the agent runtime and session store respectively — they should never
/// reach here, but are mapped defensively rather than treated as a panic.
fn exit_code_for(err: &anyhow::Error) -> u8 {
    match err.downcast_ref::<LegionError>() {
        Some(LegionError::ModelTransient(_)) => EX_TEMPFAIL,
        Some(_) => EX_SOFTWARE,
        None => EX_SOFTWARE,
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Some(Commands::Completions { shell }) => {
            cli::print_completions(shell);
            Ok(())
        }
        Some(Commands::ShowConfig) => {
            let config = legion_config::load(cli.config.as_deref())?;
            println!("{}", serde_yaml::to_string(&config).unwrap_or_default());
            Ok(())
        }
        Some(Commands::Serve { bind }) => serve(cli.config, bind).await,
        None => serve(cli.config, None).await,
    }
}

async fn serve(config_path: Option<std::path::PathBuf>, bind_override: Option<String>) -> anyhow::Result<()> {
    let config = legion_config::load(config_path.as_deref())?;
    let bind = bind_override.unwrap_or_else(|| config.gateway.bind.clone());
    let bind: std::net::SocketAddr = bind.parse().map_err(|e| anyhow::anyhow!("invalid gateway bind address {bind:?}: {e}"))?;

    let bus = EventBus::new(1024).with_watchdog(Duration::from_secs(config.runtime.handler_watchdog_seconds));
    let channels = Arc::new(ChannelService::new(bus.clone()));
    let personas = Arc::new(PersonaEngine::new(bus.clone(), config.orchestrator.mood_delta_cap, config.orchestrator.opinion_delta_cap));
    let memory = Arc::new(MemoryEngine::new(
        config.memory.working_memory_size,
        config.memory.episodic_salience_threshold,
        config.memory.consolidation_interval,
    ));
    let sessions = Arc::new(SessionStore::new(config.runtime.max_history_per_session));
    let runtime = Arc::new(AgentRuntime::new(
        sessions,
        config.runtime.max_concurrent_invocations,
        config.runtime.max_tool_depth,
        Duration::from_secs(config.runtime.llm_timeout_seconds),
        Duration::from_secs(config.runtime.tool_timeout_seconds),
    ));

    let default_model: Arc<dyn legion_model::ModelProvider> = Arc::from(legion_model::from_config(&config.model)?);

    let orchestrator = Orchestrator::new(
        bus.clone(),
        channels.clone(),
        personas.clone(),
        memory,
        runtime,
        default_model,
        OrchestratorSettings {
            max_consecutive_agent_turns: config.runtime.max_consecutive_agent_turns,
            max_responders_per_message: config.runtime.max_responders_per_message,
            history_cue_window: config.memory.working_memory_size,
            history_cue_retrieved_items: 5,
            auto_subscribe_defaults: config.orchestrator.auto_subscribe_defaults.clone(),
        },
    );

    for (name, provider_cfg) in &config.providers {
        let provider: Arc<dyn legion_model::ModelProvider> = Arc::from(legion_model::from_config(provider_cfg)?);
        orchestrator.register_model(name.clone(), provider);
    }

    let _subscriptions = orchestrator.start();

    legion_gateway::serve(bind, channels, personas, bus).await
}

fn init_logging(verbosity: u8) {
    let level = match verbosity {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let _ = tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .with(filter)
        .try_init();
}
