use crate::config::Config;
use anyhow::Result;
use clap::{Args, Subcommand};
use colored::Colorize;
use manualdesk_common::{FileSnapshotStore, SnapshotStore};
use manualdesk_editor::{format_elapsed, load_snapshot, snapshot_key};

#[derive(Debug, Args)]
pub struct HistoryArgs {
    #[command(subcommand)]
    pub command: HistoryCommand,
}

#[derive(Debug, Subcommand)]
pub enum HistoryCommand {
    /// Show the persisted undo history of a manual
    Show { manual_id: String },

    /// Remove the persisted undo history of a manual
    Clear { manual_id: String },
}

pub fn history(args: HistoryArgs, cwd: &str) -> Result<()> {
    let config = Config::load(cwd)?;
    let store = FileSnapshotStore::new(config.get_snapshot_dir(cwd));

    match args.command {
        HistoryCommand::Show { manual_id } => show(&store, &config, &manual_id),
        HistoryCommand::Clear { manual_id } => {
            store.remove(&snapshot_key(&manual_id))?;
            println!("{} Cleared history for manual {}", "✓".green(), manual_id);
            Ok(())
        }
    }
}

fn show(store: &FileSnapshotStore, config: &Config, manual_id: &str) -> Result<()> {
    let Some(snapshot) = load_snapshot(store, manual_id)? else {
        println!("{}", format!("No saved history for manual {}", manual_id).yellow());
        return Ok(());
    };

    let now = chrono::Utc::now();
    let age = format_elapsed((now - snapshot.saved_at).num_seconds());
    let freshness = if snapshot.is_fresh(now, config.history_options().max_age) {
        "fresh".green()
    } else {
        "expired".red()
    };

    println!("{}", format!("📜 Manual {}", manual_id).bright_blue().bold());
    println!("   Saved:   {} ({})", age, freshness);
    println!(
        "   Undo:    {} · Redo: {} · Unsaved changes: {}",
        snapshot.undo_stack.len(),
        snapshot.redo_stack.len(),
        snapshot.unsaved_changes
    );

    if !snapshot.undo_stack.is_empty() {
        println!();
        for command in snapshot.undo_stack.iter().rev() {
            let when = format_elapsed((now - command.timestamp()).num_seconds());
            println!(
                "  {} {} {}",
                "•".blue(),
                command.description(),
                format!("({})", when).dimmed()
            );
        }
    }

    Ok(())
}
