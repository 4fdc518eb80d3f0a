//! CLI command definitions and subcommands

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// StoryDaemon - topic-to-story generation daemon
#[derive(Parser)]
#[command(
    name = "sd",
    about = "Turns a topic into an AI-generated short story with comprehension questions",
    version = env!("CARGO_PKG_VERSION"),
    after_help = "Logs are written to: ~/.local/share/storydaemon/logs/storydaemon.log"
)]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true, help = "Path to config file")]
    pub config: Option<PathBuf>,

    /// Log level override (trace, debug, info, warn, error)
    #[arg(short, long, global = true, value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Command,
}

/// CLI subcommands
#[derive(Subcommand)]
pub enum Command {
    /// Manage the daemon process
    Daemon {
        #[command(subcommand)]
        command: DaemonCommand,
    },

    /// Internal: Run as daemon process (used by `daemon start`)
    #[command(hide = true)]
    RunDaemon,

    /// Generate a story from a topic
    Generate {
        /// Free-text topic for the story
        topic: String,

        /// Stream body tokens as they are generated
        #[arg(long)]
        stream: bool,
    },

    /// Browse persisted stories
    Stories {
        #[command(subcommand)]
        command: StoriesCommand,
    },
}

/// Daemon management subcommands
#[derive(Subcommand)]
pub enum DaemonCommand {
    /// Start the daemon in the background
    Start {
        /// Don't detach (run in foreground)
        #[arg(long)]
        foreground: bool,
    },

    /// Stop the running daemon
    Stop,

    /// Show daemon status
    Status,

    /// Ping the daemon and print its version
    Ping,
}

/// Story browsing subcommands
#[derive(Subcommand)]
pub enum StoriesCommand {
    /// List stories in creation order
    List {
        /// Number of stories to skip
        #[arg(long, default_value = "0")]
        offset: u32,

        /// Maximum number of stories to show
        #[arg(long, default_value = "20")]
        limit: u32,
    },

    /// Show one story with its questions
    Show {
        /// Story id
        id: String,
    },
}

/// Log file location (alongside the store, under the XDG data dir)
pub fn get_log_path() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("storydaemon")
        .join("logs")
        .join("storydaemon.log")
}
