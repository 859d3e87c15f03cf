//! Command-line front end for the autonomic evolution core: propose and
//! approve mutation workflows, and drive the entropy reaper.

mod store;

use aec_consensus::ConsensusEngine;
use aec_core::{Clock, Config, OsRandom, SystemClock, TracingNotifier};
use aec_healing::{FrequencyPredictor, HealingDispatcher};
use aec_reaper::{ProtectedPaths, Reaper};
use aec_sandbox::Sandbox;
use aec_token::TokenService;
use aec_workflow::EvolutionWorkflow;
use clap::{Parser, Subcommand};
use ed25519_dalek::VerifyingKey;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

#[derive(Parser)]
#[command(name = "aec")]
#[command(about = "Autonomic Evolution Core: governed self-mutation of running code")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Durable state file backing workflow and reaper state across invocations.
    #[arg(long, global = true, default_value = "./aec-state.json")]
    state_file: PathBuf,

    /// Optional TOML configuration file (defaults < file < environment).
    #[arg(long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Propose and govern a mutation.
    Workflow {
        #[command(subcommand)]
        action: WorkflowAction,
    },
    /// Inspect or drive the entropy reaper.
    Reaper {
        #[command(subcommand)]
        action: ReaperAction,
    },
}

#[derive(Subcommand)]
enum WorkflowAction {
    /// Propose a mutation payload for a target module.
    Propose {
        /// Path to the mutation payload file.
        #[arg(short, long)]
        file: PathBuf,
        /// Target module id the mutation applies to.
        #[arg(short, long)]
        target: String,
        /// Risk score in [0, 1]; above the configured threshold requires approval.
        #[arg(short, long, default_value_t = 0.0)]
        risk: f64,
    },
    /// Submit a signed administrator approval for a workflow awaiting one.
    Approve {
        /// Workflow id returned by `propose`.
        id: String,
        /// Hex-encoded Ed25519 signature over the mutation payload.
        #[arg(long)]
        sig: String,
    },
    /// Show the current stage and history of a workflow.
    Status {
        /// Workflow id returned by `propose`.
        id: String,
    },
    /// Request cancellation of an in-flight workflow.
    Cancel {
        /// Workflow id returned by `propose`.
        id: String,
    },
}

#[derive(Subcommand)]
enum ReaperAction {
    /// Print the live registry and current cycle.
    Status,
    /// Advance the reaper's logical clock by one cycle.
    Pulse,
    /// Run a scan without archiving anything (the default mode).
    Diagnostic,
    /// Run a scan and archive whatever is stale, orphaned, and unprotected.
    Reap,
    /// Switch the reaper into (or out of) live archival mode.
    Live {
        /// Pass `false` to return to dry-run mode.
        #[arg(default_value_t = true)]
        on: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    let config = Config::load(cli.config.as_deref())?;

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let random = Arc::new(OsRandom);
    let kv = Arc::new(store::FileKvStore::open(&cli.state_file)?);
    let notifier = Arc::new(TracingNotifier);

    let tokens = Arc::new(match &config.token_secret {
        Some(secret) => TokenService::new(secret.clone().into_bytes(), clock.clone())?,
        None => TokenService::with_random_secret(random.as_ref(), clock.clone()),
    });

    let sandbox = Arc::new(Sandbox::new(config.sandbox_memory_mb));
    let predictor = Arc::new(FrequencyPredictor::new());
    let healing = Arc::new(HealingDispatcher::new(clock.clone(), predictor, tokens.clone()));
    let consensus = Arc::new(ConsensusEngine::new(
        clock.clone(),
        Duration::from_millis(config.validator_timeout_ms.max(0) as u64),
    ));

    let protected = ProtectedPaths::empty();
    let reaper = Arc::new(Reaper::new(kv.clone(), tokens.clone(), random.clone(), protected)
        .with_stale_threshold(config.stale_threshold_cycles)
        .with_max_archive_bytes(config.max_archive_bytes));
    reaper.load_from_kv()?;

    let mut workflow = EvolutionWorkflow::new(
        sandbox,
        tokens,
        healing,
        consensus,
        kv,
        notifier,
        clock,
    )
    .with_vitality_registrar(reaper.clone())
    .with_high_risk_threshold(config.high_risk_threshold)
    .with_approval_timeout_millis(config.approval_timeout_ms);

    if let Some(hex_key) = &config.admin_public_key {
        match decode_verifying_key(hex_key) {
            Some(key) => workflow = workflow.with_admin_public_key(key),
            None => tracing::warn!("ADMIN_PUBLIC_KEY is not a valid hex-encoded Ed25519 key; ignoring"),
        }
    }
    let workflow = Arc::new(workflow);

    match cli.command {
        Commands::Workflow { action } => run_workflow(&workflow, action).await,
        Commands::Reaper { action } => run_reaper(&reaper, action),
    }
}

async fn run_workflow(workflow: &Arc<EvolutionWorkflow>, action: WorkflowAction) -> anyhow::Result<()> {
    match action {
        WorkflowAction::Propose { file, target, risk } => {
            let payload = std::fs::read(&file)
                .map_err(|e| anyhow::anyhow!("reading {}: {e}", file.display()))?;
            let workflow_id = workflow.propose(target, payload, risk).await?;

            // Give the background pipeline a brief head start so a typically
            // fast low-risk mutation can report its terminal status directly.
            let mut instance = workflow.get(&workflow_id)?;
            for _ in 0..40 {
                if matches!(
                    instance.stage,
                    aec_core::WorkflowStage::Done
                        | aec_core::WorkflowStage::Failed
                        | aec_core::WorkflowStage::AwaitingApproval
                ) {
                    break;
                }
                tokio::time::sleep(Duration::from_millis(50)).await;
                instance = workflow.get(&workflow_id)?;
            }

            print_json(&instance)?;
            std::process::exit(exit_code_for(&instance));
        }
        WorkflowAction::Approve { id, sig } => {
            let outcome = workflow.approve(&id, &sig).await?;
            print_json(&outcome)?;
            let instance = workflow.get(&id)?;
            std::process::exit(exit_code_for(&instance));
        }
        WorkflowAction::Status { id } => {
            let instance = workflow.get(&id)?;
            print_json(&instance)?;
            std::process::exit(exit_code_for(&instance));
        }
        WorkflowAction::Cancel { id } => {
            let cancelled = workflow.cancel(&id)?;
            println!("{}", serde_json::json!({ "cancelled": cancelled }));
            Ok(())
        }
    }
}

fn run_reaper(reaper: &Arc<Reaper>, action: ReaperAction) -> anyhow::Result<()> {
    match action {
        ReaperAction::Status => {
            let snapshot = reaper.entities_snapshot();
            print_json(&serde_json::json!({
                "cycle": reaper.cycle(),
                "dry_run": reaper.is_dry_run(),
                "entities": snapshot,
            }))
        }
        ReaperAction::Pulse => {
            let cycle = reaper.advance_cycle()?;
            println!("{}", serde_json::json!({ "cycle": cycle }));
            Ok(())
        }
        ReaperAction::Diagnostic => {
            reaper.set_live_mode(false);
            print_json(&reaper.reap())
        }
        ReaperAction::Reap => {
            reaper.set_live_mode(true);
            print_json(&reaper.reap())
        }
        ReaperAction::Live { on } => {
            reaper.set_live_mode(on);
            println!("{}", serde_json::json!({ "live": on }));
            Ok(())
        }
    }
}

fn decode_verifying_key(hex_key: &str) -> Option<VerifyingKey> {
    let bytes = hex::decode(hex_key).ok()?;
    let array: [u8; 32] = bytes.try_into().ok()?;
    VerifyingKey::from_bytes(&array).ok()
}

fn print_json<T: serde::Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Maps a workflow's terminal state to a process exit code: 0 on success or
/// a still-pending workflow, 1/2/3 for the stable failure families, 4 for
/// anything unexpected (`spec.md` §7).
fn exit_code_for(instance: &aec_core::WorkflowInstance) -> i32 {
    use aec_core::{WorkflowFailureReason as R, WorkflowStage as S};
    match instance.stage {
        S::Failed => match instance.failure_reason {
            Some(R::StaticForbidden) | Some(R::HealExhausted) => 1,
            Some(R::ConsensusVeto) => 2,
            Some(R::GovernanceTimeout) => 3,
            _ => 4,
        },
        _ => 0,
    }
}
