use anyhow::Context;
use clap::{Parser, Subcommand};
use dotenv::dotenv;
use drafter_rs::drafter::builder::Builder;
use drafter_rs::drafter::checkpoint::{CheckpointKey, Checkpointer};
use drafter_rs::drafter::config::{BackendKind, DrafterConfig};
use drafter_rs::drafter::server;
use drafter_rs::drafter::workflow::{RunEvent, WorkflowState};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to a YAML config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Keep checkpoints in memory instead of Supabase
    #[arg(long, global = true)]
    memory: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Draft an essay on a topic
    Run {
        /// The topic to write about
        #[arg(short, long)]
        task: String,

        #[arg(short, long, default_value_t = 2)]
        max_revisions: u32,

        #[arg(short, long, default_value_t = 1)]
        revision_number: u32,

        /// Checkpoint thread; a new one is generated when omitted
        #[arg(long)]
        thread_id: Option<String>,
    },
    /// Print the last checkpoint of a thread
    Show {
        #[arg(long)]
        thread_id: String,
    },
    /// Start the HTTP API
    Serve {
        #[arg(short, long, default_value_t = 3000)]
        port: u16,
    },
}

fn load_config(args: &Args) -> anyhow::Result<DrafterConfig> {
    let mut config = match &args.config {
        Some(path) => DrafterConfig::load(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => DrafterConfig::default(),
    };
    if args.memory {
        config.checkpoint.backend = BackendKind::Memory;
    }
    Ok(config)
}

/// Text printed for an event: node updates as pretty JSON, then the final draft
fn render_event(event: &RunEvent) -> Option<String> {
    match event {
        RunEvent::Node { .. } => {
            let update = event.update_map()?;
            match serde_json::to_string_pretty(&update) {
                Ok(text) => Some(text),
                Err(e) => {
                    log::warn!("Failed to render update: {}", e);
                    None
                }
            }
        }
        RunEvent::Finished { state, .. } => Some(format!("\nFinal draft:\n\n{}", state.draft)),
        RunEvent::Error { .. } => None,
    }
}

async fn print_events(mut rx: mpsc::Receiver<RunEvent>) {
    while let Some(event) = rx.recv().await {
        if let Some(text) = render_event(&event) {
            println!("{}", text);
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    env_logger::init();

    let args = Args::parse();
    let builder = Builder::new(load_config(&args)?);

    match args.command {
        Commands::Run {
            task,
            max_revisions,
            revision_number,
            thread_id,
        } => {
            let graph = builder.build_graph()?;
            let thread_id = thread_id.unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
            let key = CheckpointKey::from(thread_id.as_str());
            let initial =
                WorkflowState::new(task, max_revisions).with_revision_number(revision_number);

            println!("Thread: {}", thread_id);

            let (tx, rx) = mpsc::channel::<RunEvent>(16);
            let printer = tokio::spawn(print_events(rx));

            let result = graph.run_stream(&key, initial, tx).await;
            let _ = printer.await;
            result.with_context(|| format!("Run '{}' failed", thread_id))?;
        }
        Commands::Show { thread_id } => {
            let store = builder.build_store()?;
            let key = CheckpointKey::from(thread_id.as_str());
            match store.get(&key).await? {
                Some(value) => println!("{}", serde_json::to_string_pretty(&value)?),
                None => anyhow::bail!("No checkpoint for thread '{}'", thread_id),
            }
        }
        Commands::Serve { port } => {
            let graph = Arc::new(builder.build_graph()?);
            server::serve(port, graph)
                .await
                .map_err(|e| anyhow::anyhow!(e))?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use drafter_rs::drafter::workflow::{Phase, StateUpdate};

    #[test]
    fn test_render_node_update() {
        let event = RunEvent::Node {
            node: "planner".to_string(),
            phase: Phase::Planning,
            update: StateUpdate {
                plan: Some("1. Intro".to_string()),
                ..Default::default()
            },
        };
        let text = render_event(&event).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(parsed, serde_json::json!({"planner": {"plan": "1. Intro"}}));
    }

    #[test]
    fn test_render_finished_prints_draft() {
        let mut state = WorkflowState::new("Rust", 1);
        state.draft = "Final text".to_string();
        let event = RunEvent::Finished {
            thread_id: "t".to_string(),
            state,
        };
        assert!(render_event(&event).unwrap().ends_with("Final text"));
        assert!(render_event(&RunEvent::Error {
            message: "x".to_string()
        })
        .is_none());
    }

    #[tokio::test]
    async fn test_print_events_drains_channel() {
        let (tx, rx) = mpsc::channel::<RunEvent>(4);
        let printer = tokio::spawn(print_events(rx));
        tx.send(RunEvent::Error {
            message: "x".to_string(),
        })
        .await
        .unwrap();
        drop(tx);
        printer.await.unwrap();
    }
}
