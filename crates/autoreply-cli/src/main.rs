//! `outlook-autoreply` — schedule Outlook automatic replies from calendar absences.
//!
//! ## Usage
//!
//! ```sh
//! # Sign in once (device code flow) and store the token cache
//! outlook-autoreply --config autoreply.toml init
//!
//! # Reconcile automatic replies with the next absence (e.g. from cron)
//! outlook-autoreply --config autoreply.toml run
//!
//! # Show what would be scheduled without touching the mailbox
//! outlook-autoreply run --dry-run
//! ```

mod auth;
mod cache;
mod commands;
mod config;
mod graph;

use std::path::PathBuf;

use anyhow::{Context, Result};
use autoreply_core::RunOutcome;
use clap::{Parser, Subcommand};

use crate::config::Settings;

#[derive(Parser)]
#[command(
    name = "outlook-autoreply",
    version,
    about = "Schedule Outlook automatic replies from calendar absence events"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file (defaults to ./autoreply.toml if present)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Log debug output
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    verbose: bool,

    /// Log errors only
    #[arg(short, long, global = true)]
    quiet: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Sign in and store the token cache
    Init,
    /// Reconcile automatic replies with the next upcoming absence
    Run {
        /// Compute the schedule but do not update the mailbox
        #[arg(long)]
        dry_run: bool,
    },
}

fn init_tracing(quiet: bool, verbose: bool) -> Result<()> {
    let level = if quiet {
        "error"
    } else if verbose {
        "debug"
    } else {
        "info"
    };

    let filter = tracing_subscriber::EnvFilter::try_from_env("AUTOREPLY_LOG")
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|error| anyhow::anyhow!("failed to initialize tracing subscriber: {error}"))?;

    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.quiet, cli.verbose)?;

    let mut settings = Settings::load(cli.config.as_deref()).context("Failed to load settings")?;

    match cli.command {
        Commands::Init => {
            commands::init(&settings)?;
            println!("Token cache initialized.");
        }
        Commands::Run { dry_run } => {
            settings.dry_run |= dry_run;
            let outcome = commands::run(&settings)?;
            print_outcome(&outcome);
        }
    }

    Ok(())
}

fn print_outcome(outcome: &RunOutcome) {
    const DAY: &str = "%Y-%m-%d %H:%M %Z";
    match outcome {
        RunOutcome::NoAbsence => println!("No upcoming absence."),
        RunOutcome::Unchanged { period } => println!(
            "Absence {} to {}: automatic replies unchanged.",
            period.start().format(DAY),
            period.end().format(DAY)
        ),
        RunOutcome::Updated { reply, .. } => println!(
            "Automatic replies scheduled from {} to {}.",
            reply.start.format(DAY),
            reply.end.format(DAY)
        ),
        RunOutcome::DryRun { reply, .. } => println!(
            "Dry run: would schedule automatic replies from {} to {}.",
            reply.start.format(DAY),
            reply.end.format(DAY)
        ),
    }
}
