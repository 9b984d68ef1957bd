//! codeloom CLI: iterative code synthesis from a requirements document.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use clap::{Parser, Subcommand};

use codeloom::exit_codes;
use codeloom::io::session::SessionStore;
use codeloom::run::{RunOptions, RunReport};

#[derive(Debug, Parser)]
#[command(name = "codeloom", version, about = "Iterative code-synthesis orchestrator")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run the synthesis workflow against a requirements document.
    Run {
        /// Path to the requirements document.
        requirements_path: PathBuf,
        /// Session id to create or resume (default: derived from the
        /// requirements name).
        #[arg(long)]
        session_id: Option<String>,
        /// Resume the latest (or named) session instead of creating one.
        #[arg(long)]
        resume: bool,
        /// Restore the snapshot taken when task N completed.
        #[arg(long, value_name = "N")]
        from_checkpoint: Option<usize>,
        /// Base directory for session workspaces.
        #[arg(long, default_value = "workspaces")]
        workspaces: PathBuf,
        /// Path to the orchestrator config file.
        #[arg(long, default_value = "codeloom.toml")]
        config: PathBuf,
    },
    /// List sessions, newest first.
    List {
        /// Only show sessions for this requirements name.
        #[arg(long)]
        filter: Option<String>,
        /// Base directory for session workspaces.
        #[arg(long, default_value = "workspaces")]
        workspaces: PathBuf,
    },
    /// Remove sessions older than the given age, including their workspaces.
    Cleanup {
        /// Age threshold in days.
        #[arg(long, default_value_t = 7)]
        older_than_days: u64,
        /// Base directory for session workspaces.
        #[arg(long, default_value = "workspaces")]
        workspaces: PathBuf,
    },
}

fn main() -> ExitCode {
    codeloom::logging::init();
    match dispatch() {
        Ok(()) => ExitCode::from(exit_codes::OK as u8),
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::from(exit_codes::FAILED as u8)
        }
    }
}

fn dispatch() -> Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Command::Run {
            requirements_path,
            session_id,
            resume,
            from_checkpoint,
            workspaces,
            config,
        } => {
            let report = codeloom::run::run(&RunOptions {
                requirements_path,
                session_id,
                resume,
                from_checkpoint,
                workspaces_dir: workspaces,
                config_path: config,
            })?;
            print_report(&report);
            Ok(())
        }
        Command::List { filter, workspaces } => {
            let sessions = SessionStore::new(workspaces).list(filter.as_deref())?;
            if sessions.is_empty() {
                println!("No sessions found.");
                return Ok(());
            }
            for session in sessions {
                println!(
                    "{}  {}  ({}, {})",
                    session.session_id, session.prd_name, session.status, session.workspace_path
                );
            }
            Ok(())
        }
        Command::Cleanup {
            older_than_days,
            workspaces,
        } => {
            let removed = SessionStore::new(workspaces).cleanup_older_than(older_than_days)?;
            println!(
                "Removed {} session(s) older than {} day(s)",
                removed.len(),
                older_than_days
            );
            Ok(())
        }
    }
}

fn print_report(report: &RunReport) {
    let state = &report.state;
    println!("Session: {}", report.session_id);
    println!("Status:  {}", state.status);
    println!("Tasks:");
    for task in &state.tasks {
        let mark = if task.completed { "x" } else { " " };
        println!("  [{mark}] {} {} - {}", task.id, task.target, task.description);
    }
    println!("Files:");
    for (path, dest) in &state.final_files {
        println!("  {path} -> {dest}");
    }
    println!("Workspace: {}", report.workspace.display());
}
