use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "remindr", about = "To-do list with local reminders", version)]
pub struct Cli {
    /// Path to the SQLite database [default: ~/.remindr/remindr.db]
    #[arg(long, env = "REMINDR_DB", global = true)]
    pub db: Option<PathBuf>,

    /// Reminder tuning overrides (JSON)
    #[arg(long, env = "REMINDR_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Log level written to stderr
    #[arg(long, default_value = "warn", global = true)]
    pub log_level: String,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Check that the core library is linked
    Ping,

    /// Add a task
    Add {
        /// Task title
        title: String,
        /// Longer description shown in the reminder body
        #[arg(short, long, default_value = "")]
        description: String,
        /// high, medium or low
        #[arg(short, long, default_value = "medium")]
        priority: String,
        /// Planned day as YYYY-MM-DD [default: today]
        #[arg(long)]
        date: Option<String>,
        /// Remind after this many minutes
        #[arg(long, conflicts_with = "remind_at")]
        remind_in: Option<u32>,
        /// Remind at a local time, "YYYY-MM-DD HH:MM"
        #[arg(long)]
        remind_at: Option<String>,
    },

    /// List tasks
    List {
        /// Only tasks planned for this day (YYYY-MM-DD)
        #[arg(long)]
        date: Option<String>,
    },

    /// Mark a task done
    Complete {
        id: i64,
        /// Reopen instead
        #[arg(long)]
        undo: bool,
    },

    /// Delete a task
    Delete { id: i64 },

    /// Re-register pending reminders and deliver them until interrupted
    Run,
}
