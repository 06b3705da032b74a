mod app;
mod commands;

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use uuid::Uuid;

#[derive(Parser)]
#[command(name = "lexis-cli", about = "Lexis vocabulary study CLI", version)]
struct Cli {
    /// Study database (default: <data dir>/lexis/study.db)
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    /// Scheduler config file (TOML)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Act as this user (default: the local user)
    #[arg(long, global = true)]
    user: Option<Uuid>,

    /// Pretend the current time is this RFC 3339 timestamp
    #[arg(long, global = true)]
    at: Option<DateTime<Utc>>,

    /// Output format
    #[arg(long, global = true, default_value = "plain")]
    format: OutputFormat,

    #[command(subcommand)]
    command: Command,
}

#[derive(Clone, Debug, clap::ValueEnum)]
pub enum OutputFormat {
    Plain,
    Json,
}

#[derive(Subcommand)]
enum Command {
    /// Dictionary entries
    #[command(subcommand)]
    Entry(EntryCommand),

    /// Create and delete cards
    #[command(subcommand)]
    Card(CardCommand),

    /// Show today's study queue
    Queue {
        /// Maximum cards to return
        #[arg(long)]
        limit: Option<u32>,
    },

    /// Grade a card (again, hard, good, easy or 1-4)
    Review {
        card: Uuid,
        grade: String,
        /// Time spent answering
        #[arg(long)]
        duration_ms: Option<u32>,
    },

    /// Show where each grade would schedule a card
    Preview { card: Uuid },

    /// Undo the latest review of a card
    Undo { card: Uuid },

    /// Study sessions
    #[command(subcommand)]
    Session(SessionCommand),

    /// Study statistics overview
    Dashboard,

    /// Review history of a card
    History {
        card: Uuid,
        #[arg(long, default_value = "0")]
        limit: u32,
        #[arg(long, default_value = "0")]
        offset: u32,
    },

    /// Statistics for a card
    Stats { card: Uuid },
}

#[derive(Subcommand)]
enum EntryCommand {
    /// Add a dictionary entry
    Add {
        text: String,
        /// Number of senses to attach
        #[arg(long, default_value = "1")]
        senses: u32,
    },
}

#[derive(Subcommand)]
enum CardCommand {
    /// Create a card for an entry
    Create { entry: Uuid },
    /// Create cards for several entries
    Batch {
        #[arg(required = true)]
        entries: Vec<Uuid>,
    },
    /// Delete a card and its history
    Delete { card: Uuid },
}

#[derive(Subcommand)]
enum SessionCommand {
    /// Start a session
    Start,
    /// Finish a session (default: the active one)
    Finish { id: Option<Uuid> },
    /// Abandon the active session
    Abandon,
    /// Show the active session
    Show,
}

fn main() -> anyhow::Result<()> {
    env_logger::init();

    let cli = Cli::parse();
    let app = app::App::new(cli.db, cli.config.as_deref(), cli.user, cli.at)?;
    let format = &cli.format;

    match cli.command {
        Command::Entry(EntryCommand::Add { text, senses }) => {
            commands::cards::run_entry_add(&app, &text, senses, format)?;
        }
        Command::Card(subcmd) => match subcmd {
            CardCommand::Create { entry } => commands::cards::run_create(&app, entry, format)?,
            CardCommand::Batch { entries } => commands::cards::run_batch(&app, entries, format)?,
            CardCommand::Delete { card } => commands::cards::run_delete(&app, card, format)?,
        },
        Command::Queue { limit } => commands::study::run_queue(&app, limit, format)?,
        Command::Review { card, grade, duration_ms } => {
            commands::study::run_review(&app, card, &grade, duration_ms, format)?;
        }
        Command::Preview { card } => commands::study::run_preview(&app, card, format)?,
        Command::Undo { card } => commands::study::run_undo(&app, card, format)?,
        Command::Session(subcmd) => match subcmd {
            SessionCommand::Start => commands::session::run_start(&app, format)?,
            SessionCommand::Finish { id } => commands::session::run_finish(&app, id, format)?,
            SessionCommand::Abandon => commands::session::run_abandon(&app, format)?,
            SessionCommand::Show => commands::session::run_show(&app, format)?,
        },
        Command::Dashboard => commands::stats::run_dashboard(&app, format)?,
        Command::History { card, limit, offset } => {
            commands::stats::run_history(&app, card, limit, offset, format)?;
        }
        Command::Stats { card } => commands::stats::run_stats(&app, card, format)?,
    }

    Ok(())
}
