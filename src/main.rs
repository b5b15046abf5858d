use anyhow::Context;
use clap::{Parser, Subcommand};
use dotenv::dotenv;
use redraft_rs::adk::model::Provider;
use redraft_rs::redraft::config::Settings;
use redraft_rs::redraft::server::{self, AppState};
use redraft_rs::redraft::workflow::checkpoint::CheckpointStore;
use redraft_rs::redraft::workflow::graph::{RunOutcome, RunStatus};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Settings file (defaults to ./redraft.yaml when present)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Model name, overriding the settings file
    #[arg(short, long, global = true)]
    model: Option<String>,

    /// Model provider (openai, groq, anthropic, gemini), inferred from the model name when omitted
    #[arg(long, global = true)]
    provider: Option<Provider>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Write a report for a task
    Run {
        /// What the report should cover
        #[arg(short, long)]
        task: String,

        /// Number of drafts to write before stopping
        #[arg(long)]
        max_revisions: Option<u32>,

        /// Id to store checkpoints under (random when omitted)
        #[arg(long)]
        run_id: Option<String>,
    },
    /// Continue an interrupted run from its last checkpoint
    Resume {
        #[arg(long)]
        run_id: String,
    },
    /// Print the checkpoints of a run
    History {
        #[arg(long)]
        run_id: String,
    },
    /// Serve the HTTP API
    Serve {
        #[arg(short, long, default_value_t = 3000)]
        port: u16,
    },
}

fn print_outcome(outcome: &RunOutcome) {
    match outcome.status {
        RunStatus::Completed => log::info!("Run {} completed", outcome.run_id),
        RunStatus::SafetyValve => log::warn!(
            "Run {} stopped by the safety valve after {} loops",
            outcome.run_id,
            outcome.state.loop_counter
        ),
        RunStatus::Cancelled | RunStatus::Running => log::warn!(
            "Run {} stopped early; resume with --run-id {}",
            outcome.run_id,
            outcome.run_id
        ),
    }
    println!("{}", outcome.draft);
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    env_logger::init();

    let args = Args::parse();

    let mut settings = Settings::load(args.config.as_deref()).context("loading settings")?;
    if let Some(model) = args.model {
        settings.model.name = model;
    }
    if let Some(provider) = args.provider {
        settings.model.provider = Some(provider);
    }

    match args.command {
        Commands::Run {
            task,
            max_revisions,
            run_id,
        } => {
            let engine = settings.build_engine()?;
            let max_revisions = max_revisions.unwrap_or(settings.workflow.max_revisions);
            let outcome = engine.start_run(&task, max_revisions, run_id).await?;
            print_outcome(&outcome);
        }
        Commands::Resume { run_id } => {
            let engine = settings.build_engine()?;
            let outcome = engine.resume(&run_id).await?;
            print_outcome(&outcome);
        }
        Commands::History { run_id } => {
            // Reading checkpoints needs no provider keys
            let store = settings.checkpoint_store();
            let history = store.history(&run_id).await?;
            if history.is_empty() {
                anyhow::bail!("Run not found: {}", run_id);
            }
            for checkpoint in history {
                println!(
                    "{:>4}  {:<20} -> {:<20} {:<12} revision {}/{}  loop {}  evidence {}  {}",
                    checkpoint.sequence,
                    checkpoint
                        .step
                        .map(|s| s.to_string())
                        .unwrap_or_else(|| "(start)".to_string()),
                    checkpoint
                        .next
                        .map(|s| s.to_string())
                        .unwrap_or_else(|| "(end)".to_string()),
                    checkpoint.status.to_string(),
                    checkpoint.state.revision_count,
                    checkpoint.state.max_revisions,
                    checkpoint.state.loop_counter,
                    checkpoint.state.evidence.len(),
                    checkpoint.created_at.to_rfc3339(),
                );
            }
        }
        Commands::Serve { port } => {
            let engine = settings.build_engine()?;
            let state = AppState {
                engine: Arc::new(engine),
                default_max_revisions: settings.workflow.max_revisions,
            };
            server::serve(state, port).await?;
        }
    }

    Ok(())
}
