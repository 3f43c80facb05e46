mod commands;
mod config;

use clap::{Parser, Subcommand};
use colored::Colorize;
use commands::{compile, history, process, CompileArgs, HistoryArgs, ProcessArgs};
use tracing_subscriber::EnvFilter;

/// Manualdesk CLI - turn product videos into manuals
#[derive(Parser, Debug)]
#[command(name = "manualdesk")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Show debug logs
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Generate a manual from an uploaded video
    Process(ProcessArgs),

    /// Improve a manual with the AI compiler copilot
    Compile(CompileArgs),

    /// Inspect or clear persisted undo history
    History(HistoryArgs),
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let cwd = std::env::current_dir()?.display().to_string();

    match cli.command {
        Command::Process(args) => process(args, &cwd).await,
        Command::Compile(args) => compile(args, &cwd).await,
        Command::History(args) => history(args, &cwd),
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if let Err(err) = run(cli).await {
        eprintln!();
        eprintln!("{} {}", "Error:".red().bold(), err);
        eprintln!();
        std::process::exit(1);
    }
}
