use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use idlekeeper::config::Config;
use idlekeeper::promises::{PendingMessageSink, PromiseLedger};
use idlekeeper::store::EngagementStore;
use idlekeeper::types::{PendingMessage, PendingMessageRequest};
use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;
use std::sync::Arc;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

#[derive(Parser)]
#[command(name = "idlekeeper", about = "Proactive engagement daemon")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the periodic promise sweep (default).
    Sweep,
    /// List pending promises.
    Pending,
}

/// File-backed stand-in for the application's pending-message queue: one
/// JSON object per line under the workspace.
struct JsonlSink {
    path: PathBuf,
}

impl PendingMessageSink for JsonlSink {
    fn create_pending_message(
        &self,
        request: PendingMessageRequest,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<PendingMessage>> + Send + '_>> {
        Box::pin(async move {
            let message = PendingMessage {
                id: uuid::Uuid::new_v4().to_string(),
                created_at: chrono::Utc::now(),
            };
            let line = serde_json::json!({
                "id": message.id,
                "created_at": message.created_at,
                "message": request,
            });

            if let Some(parent) = self.path.parent() {
                tokio::fs::create_dir_all(parent)
                    .await
                    .context("create pending message directory")?;
            }
            let mut encoded = line.to_string();
            encoded.push('\n');
            let existing = tokio::fs::read_to_string(&self.path)
                .await
                .unwrap_or_default();
            tokio::fs::write(&self.path, format!("{existing}{encoded}"))
                .await
                .context("append pending message")?;

            tracing::info!(message_id = %message.id, "queued pending message");
            Ok(message)
        })
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .finish();
    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");

    let cli = Cli::parse();
    let config = Arc::new(Config::load_or_init()?);

    let store = Arc::new(EngagementStore::new(&config.workspace_dir).await?);
    let sink = Arc::new(JsonlSink {
        path: config.workspace_dir.join("pending_messages.jsonl"),
    });
    let ledger = Arc::new(PromiseLedger::new(store, sink));

    match cli.command.unwrap_or(Command::Sweep) {
        Command::Sweep => {
            tokio::select! {
                result = idlekeeper::sweep::run(config, ledger) => result,
                _ = tokio::signal::ctrl_c() => {
                    tracing::info!("shutting down");
                    Ok(())
                }
            }
        }
        Command::Pending => {
            for promise in ledger.get_pending_promises().await {
                println!(
                    "{}  {}  {}  {}",
                    promise.id,
                    promise.promise_type,
                    promise.estimated_timing.to_rfc3339(),
                    promise.description
                );
            }
            Ok(())
        }
    }
}
