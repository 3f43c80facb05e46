use super::{next_update, pretty};
use crate::config::Config;
use anyhow::{anyhow, Result};
use clap::Args;
use colored::Colorize;
use manualdesk_session::{
    InMemoryJobStore, ProcessingSession, SessionStatus, WebSocketConnector,
};
use serde_json::json;
use std::sync::Arc;

#[derive(Debug, Args)]
pub struct ProcessArgs {
    /// Uploaded video to turn into a manual
    #[arg(long)]
    pub video: String,

    /// Project the generated manual belongs to
    #[arg(long)]
    pub project: Option<String>,
}

pub async fn process(args: ProcessArgs, cwd: &str) -> Result<()> {
    let config = Config::load(cwd)?;
    let jobs = Arc::new(InMemoryJobStore::new());
    let session = ProcessingSession::processing(Arc::new(WebSocketConnector), config.endpoint())
        .with_job_store(jobs.clone());

    println!("{}", "🎬 Processing video...".bright_blue().bold());

    let mut payload = json!({ "video_id": args.video });
    if let Some(project) = &args.project {
        payload["project_id"] = json!(project);
    }

    let mut updates = session.subscribe();
    let job_id = session.start(payload).await?;
    println!("   Job: {}", job_id.cyan());

    let mut last_node: Option<String> = None;
    let mut final_state = session.state();
    while let Some(state) = next_update(&session, &mut updates).await? {
        if state.current_node != last_node {
            if let Some(node) = &state.current_node {
                let step = match (state.node_index, state.total_nodes) {
                    (Some(index), Some(total)) => format!("[{}/{}]", index, total),
                    _ => "[-]".to_string(),
                };
                println!("  {} {} {}", "→".blue(), step.dimmed(), node);
            }
            last_node = state.current_node.clone();
        }

        final_state = state;
        if final_state.is_terminal() {
            break;
        }
    }

    match final_state.status {
        SessionStatus::Complete => {
            println!();
            println!("✨ {} Video processed", "Done".green().bold());
            if let Some(result) = &final_state.result {
                println!("{}", pretty(result));
            }
            if let Some(job) = jobs.get(&job_id) {
                tracing::debug!(job_id = %job.id, status = ?job.status, "Job finished");
            }
            Ok(())
        }
        SessionStatus::Error => Err(anyhow!(
            "Processing failed: {}",
            final_state.error.unwrap_or_default()
        )),
        _ => Err(anyhow!("Connection closed before processing finished")),
    }
}
