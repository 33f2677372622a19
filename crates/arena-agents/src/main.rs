//! arena: operator CLI for running red-vs-blue battles.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use tracing::info;

use arena_agents::{Scenario, ScriptedAttacker, ScriptedDefender, ScriptedTwin};
use battle::{
    report, BattleConfig, BattleOrchestrator, BattleStatus, CheckpointStore, CouplingMode,
    HttpTaskMonitor,
};

#[derive(Parser)]
#[command(name = "arena", about = "Round-based red-vs-blue battle orchestrator")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum CouplingArg {
    /// Blue sees only findings from closed rounds (fully concurrent turns)
    PriorRound,
    /// Blue sees Red's findings from the current round (sequential turns)
    SameRound,
}

impl From<CouplingArg> for CouplingMode {
    fn from(arg: CouplingArg) -> Self {
        match arg {
            CouplingArg::PriorRound => Self::PriorRound,
            CouplingArg::SameRound => Self::SameRound,
        }
    }
}

#[derive(Subcommand)]
enum Command {
    /// Run a scripted battle from a scenario file
    Run {
        scenario: PathBuf,
        #[arg(long)]
        max_rounds: Option<u32>,
        #[arg(long, value_enum)]
        coupling: Option<CouplingArg>,
        #[arg(long)]
        checkpoint_dir: Option<PathBuf>,
        /// Long unattended run: 1000-round cap, sparse checkpoints
        #[arg(long)]
        overnight: bool,
        /// Push per-round progress to this HTTP endpoint
        #[arg(long)]
        monitor_url: Option<String>,
    },
    /// Resume a battle from a checkpoint file
    Resume {
        checkpoint: PathBuf,
        scenario: PathBuf,
        #[arg(long)]
        checkpoint_dir: Option<PathBuf>,
        #[arg(long)]
        monitor_url: Option<String>,
    },
    /// Render a report from a checkpoint file
    Report {
        checkpoint: PathBuf,
        /// Print the short summary instead of the full report
        #[arg(long)]
        summary: bool,
    },
}

fn timeout_from_env(var: &str, default_secs: u64) -> Duration {
    let secs = std::env::var(var)
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .filter(|v| *v > 0)
        .unwrap_or(default_secs);
    Duration::from_secs(secs)
}

fn u32_from_env(var: &str, default: u32) -> u32 {
    std::env::var(var)
        .ok()
        .and_then(|v| v.parse::<u32>().ok())
        .filter(|v| *v > 0)
        .unwrap_or(default)
}

/// Defaults, then `ARENA_*` env overrides, then explicit CLI flags.
fn build_config(
    max_rounds: Option<u32>,
    coupling: Option<CouplingArg>,
    overnight: bool,
) -> BattleConfig {
    let mut config = BattleConfig::default();
    if overnight {
        config = config.overnight();
    }

    config.termination.max_rounds =
        u32_from_env("ARENA_MAX_ROUNDS", config.termination.max_rounds);
    config.checkpoint_interval =
        u32_from_env("ARENA_CHECKPOINT_INTERVAL", config.checkpoint_interval);
    config.red_turn_timeout =
        timeout_from_env("ARENA_RED_TIMEOUT_SECS", config.red_turn_timeout.as_secs());
    config.blue_turn_timeout =
        timeout_from_env("ARENA_BLUE_TIMEOUT_SECS", config.blue_turn_timeout.as_secs());
    config.twin_concurrency =
        u32_from_env("ARENA_TWIN_CONCURRENCY", config.twin_concurrency as u32) as usize;

    if let Some(n) = max_rounds {
        config.termination.max_rounds = n;
    }
    if let Some(c) = coupling {
        config.coupling = c.into();
    }
    config
}

/// Wire Ctrl-C to between-round cancellation, run to a terminal status,
/// and print the summary.
async fn drive(mut orchestrator: BattleOrchestrator) -> Result<()> {
    let flag = orchestrator.cancel_flag();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("cancellation requested; stopping after the current round");
            flag.cancel();
        }
    });

    let final_state = orchestrator.run().await;
    print!("{}", report::generate_summary(&final_state));

    if final_state.status == BattleStatus::Failed {
        bail!("battle failed; partial state is preserved in the checkpoint archive");
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let cli = Cli::parse();
    match cli.command {
        Command::Run {
            scenario,
            max_rounds,
            coupling,
            checkpoint_dir,
            overnight,
            monitor_url,
        } => {
            let scenario = Scenario::load(&scenario)?;
            info!(name = %scenario.name, scripted_rounds = scenario.len(), "scenario loaded");

            let config = build_config(max_rounds, coupling, overnight);
            let twin = Arc::new(ScriptedTwin::new(&scenario));
            let mut orchestrator = BattleOrchestrator::new(
                config,
                Arc::new(ScriptedAttacker::new(scenario.clone())),
                Arc::new(ScriptedDefender::new(scenario)),
                twin,
            );
            if let Some(dir) = checkpoint_dir {
                orchestrator = orchestrator.with_checkpoints(CheckpointStore::new(dir));
            }
            if let Some(url) = monitor_url {
                orchestrator = orchestrator.with_monitor(Arc::new(HttpTaskMonitor::new(url)));
            }
            drive(orchestrator).await
        }
        Command::Resume {
            checkpoint,
            scenario,
            checkpoint_dir,
            monitor_url,
        } => {
            let state = CheckpointStore::load_path(&checkpoint)
                .with_context(|| format!("failed to load checkpoint {}", checkpoint.display()))?;
            if state.status.is_terminal() {
                bail!("battle {} is already {}", state.battle_id, state.status);
            }

            let scenario = Scenario::load(&scenario)?;
            let config = build_config(None, None, false);
            let twin = Arc::new(ScriptedTwin::new(&scenario));
            let mut orchestrator = BattleOrchestrator::resume(
                config,
                state,
                Arc::new(ScriptedAttacker::new(scenario.clone())),
                Arc::new(ScriptedDefender::new(scenario)),
                twin,
            );
            if let Some(dir) = checkpoint_dir {
                orchestrator = orchestrator.with_checkpoints(CheckpointStore::new(dir));
            }
            if let Some(url) = monitor_url {
                orchestrator = orchestrator.with_monitor(Arc::new(HttpTaskMonitor::new(url)));
            }
            drive(orchestrator).await
        }
        Command::Report {
            checkpoint,
            summary,
        } => {
            let state = CheckpointStore::load_path(&checkpoint)
                .with_context(|| format!("failed to load checkpoint {}", checkpoint.display()))?;
            if summary {
                print!("{}", report::generate_summary(&state));
            } else {
                print!("{}", report::generate_report(&state));
            }
            Ok(())
        }
    }
}
