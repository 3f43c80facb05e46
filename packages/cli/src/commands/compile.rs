use super::{next_update, pretty};
use crate::config::Config;
use anyhow::{anyhow, Context, Result};
use clap::Args;
use colored::Colorize;
use manualdesk_common::{FileSnapshotStore, SystemClock};
use manualdesk_editor::{
    save_fn, tracking_save, ApplyResult, Autosave, ManualEditor, ProposedChange, SaveError,
    SaveOutcome, SharedEditor,
};
use manualdesk_session::{CompilerSession, SessionState, SessionStatus, WebSocketConnector};
use serde_json::{json, Value};
use std::collections::HashSet;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};

#[derive(Debug, Args)]
pub struct CompileArgs {
    /// Manual to improve
    #[arg(long)]
    pub manual: String,

    /// Instruction for the copilot
    #[arg(long)]
    pub prompt: Option<String>,

    /// Local markdown copy of the manual; accepted changes are applied to it
    #[arg(long)]
    pub file: Option<PathBuf>,

    /// Approve every HITL prompt without asking
    #[arg(long)]
    pub yes: bool,
}

/// Local document the compiler's proposals are applied to
struct LocalManual {
    editor: SharedEditor,
    autosave: Autosave,
}

impl LocalManual {
    fn open(path: PathBuf, manual_id: &str, config: &Config, cwd: &str) -> Result<Self> {
        let original = std::fs::read_to_string(&path)
            .with_context(|| format!("Cannot read {}", path.display()))?;

        let clock = Arc::new(SystemClock);
        let editor = ManualEditor::open(
            manual_id,
            original.as_str(),
            Arc::new(FileSnapshotStore::new(config.get_snapshot_dir(cwd))),
            clock.clone(),
            config.history_options(),
        )
        .into_shared();

        let write_file = save_fn(move |content: String| {
            let path = path.clone();
            async move { tokio::fs::write(&path, content).await.map_err(SaveError::from) }
        });

        let content = lock(&editor).content_cell();
        let autosave = Autosave::start(
            content,
            original,
            config.autosave_options(),
            tracking_save(&editor, write_file),
            clock,
        );

        Ok(Self { editor, autosave })
    }

    fn content(&self) -> String {
        lock(&self.editor).content().to_string()
    }

    fn apply(&self, changes: &[ProposedChange]) {
        let mut editor = lock(&self.editor);
        for change in changes {
            let label = if change.description.is_empty() {
                change.id.as_str()
            } else {
                change.description.as_str()
            };
            match editor.apply_suggestion(change) {
                ApplyResult::Applied => println!("  {} {}", "✓".green(), label),
                ApplyResult::Duplicate => println!("  {} {} (already applied)", "-".dimmed(), label),
                ApplyResult::Unchanged => println!("  {} {} (no change)", "-".dimmed(), label),
                ApplyResult::NotFound => {
                    println!("  {} {} (text no longer present)", "✗".yellow(), label)
                }
            }
        }
    }

    async fn finish(mut self) -> Result<()> {
        let outcome = self.autosave.save_now(false).await;
        self.autosave.shutdown();
        match outcome {
            Ok(SaveOutcome::Saved) => println!("{} Saved", "✓".green()),
            Ok(_) => {}
            Err(e) => return Err(anyhow!("Failed to save manual: {}", e)),
        }
        Ok(())
    }
}

fn lock(editor: &SharedEditor) -> std::sync::MutexGuard<'_, ManualEditor> {
    editor.lock().unwrap_or_else(|e| e.into_inner())
}

pub async fn compile(args: CompileArgs, cwd: &str) -> Result<()> {
    let config = Config::load(cwd)?;
    let local = match args.file.clone() {
        Some(path) => Some(LocalManual::open(path, &args.manual, &config, cwd)?),
        None => None,
    };

    let session = CompilerSession::compiler(Arc::new(WebSocketConnector), config.endpoint());

    let mut payload = json!({ "manual_id": args.manual });
    if let Some(prompt) = &args.prompt {
        payload["prompt"] = json!(prompt);
    }
    if let Some(local) = &local {
        payload["content"] = json!(local.content());
    }

    println!("{}", "🤖 Starting compiler session...".bright_blue().bold());
    let mut updates = session.subscribe();
    let session_id = session.start(payload).await?;
    println!("   Session: {}", session_id.cyan());
    println!();

    let mut stdin = BufReader::new(tokio::io::stdin()).lines();
    let mut printed = 0;
    let mut shown_tools = HashSet::new();
    let mut final_state = session.state();

    while let Some(state) = next_update(&session, &mut updates).await? {
        printed = print_new_text(&state, printed);

        for tool in state.node_details.keys() {
            if shown_tools.insert(tool.clone()) {
                println!();
                println!("  {} {}", "⚙".blue(), tool.dimmed());
            }
        }

        if state.status == SessionStatus::HitlPending {
            let decision = ask_decision(state.pending_hitl.as_ref(), args.yes, &mut stdin).await?;
            session.submit_decision(decision);
        }

        final_state = state;
        if final_state.is_terminal() {
            break;
        }
    }
    println!();

    match final_state.status {
        SessionStatus::Complete => {
            let result = final_state.result.unwrap_or(Value::Null);
            match local {
                Some(local) => {
                    let changes = proposed_changes(&result);
                    println!(
                        "{}",
                        format!("Applying {} proposed change(s)", changes.len()).bold()
                    );
                    local.apply(&changes);
                    local.finish().await?;
                }
                None => println!("{}", pretty(&result)),
            }
            println!("✨ {} Compilation complete", "Done".green().bold());
            Ok(())
        }
        SessionStatus::Error => Err(anyhow!(
            "Compilation failed: {}",
            final_state.error.unwrap_or_default()
        )),
        _ => Err(anyhow!("Connection closed before compilation finished")),
    }
}

/// Print the part of the stream not shown yet; returns the new offset
fn print_new_text(state: &SessionState, printed: usize) -> usize {
    let text = &state.streamed_text;
    let offset = if text.len() < printed { 0 } else { printed };
    if let Some(new_text) = text.get(offset..) {
        if !new_text.is_empty() {
            print!("{}", new_text);
            let _ = std::io::stdout().flush();
        }
    }
    text.len()
}

fn proposed_changes(result: &Value) -> Vec<ProposedChange> {
    let Some(changes) = result.get("changes") else {
        return Vec::new();
    };
    match serde_json::from_value(changes.clone()) {
        Ok(changes) => changes,
        Err(e) => {
            tracing::warn!("Ignoring malformed proposals: {}", e);
            Vec::new()
        }
    }
}

async fn ask_decision(
    prompt: Option<&Value>,
    auto_approve: bool,
    stdin: &mut Lines<BufReader<Stdin>>,
) -> Result<Value> {
    println!();
    println!("{}", "⏸  Review required".yellow().bold());
    if let Some(prompt) = prompt {
        let question = prompt
            .get("question")
            .or_else(|| prompt.get("message"))
            .and_then(Value::as_str);
        match question {
            Some(question) => println!("   {}", question),
            None => println!("{}", pretty(prompt)),
        }
    }

    if auto_approve {
        println!("   {}", "Approved (--yes)".dimmed());
        return Ok(json!({ "approved": true }));
    }

    print!("   Approve? [y/N] ");
    std::io::stdout().flush()?;
    let answer = stdin.next_line().await?.unwrap_or_default();
    let approved = matches!(answer.trim().to_lowercase().as_str(), "y" | "yes");

    let mut decision = json!({ "approved": approved });
    if !approved {
        print!("   Feedback (optional): ");
        std::io::stdout().flush()?;
        let feedback = stdin.next_line().await?.unwrap_or_default();
        if !feedback.trim().is_empty() {
            decision["feedback"] = json!(feedback.trim());
        }
    }
    Ok(decision)
}
