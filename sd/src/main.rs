//! StoryDaemon - topic-to-story generation daemon
//!
//! CLI entry point for managing the daemon and generating stories.

use std::fs;
use std::io::Write as _;

use clap::Parser;
use colored::Colorize;
use eyre::{Context, Result};
use tracing::info;

use storydaemon::cli::{Cli, Command, DaemonCommand, StoriesCommand, get_log_path};
use storydaemon::config::Config;
use storydaemon::daemon::{DaemonManager, run_daemon};
use storydaemon::ipc::StoryClient;
use storystore::{StoryRecord, StoryStore};

fn setup_logging(cli_level: Option<&str>, config_level: Option<&str>) -> Result<()> {
    // CLI flag wins over config; default INFO
    let level: tracing::Level = cli_level
        .or(config_level)
        .map(|l| l.parse().map_err(|_| eyre::eyre!("Invalid log level: {}", l)))
        .transpose()?
        .unwrap_or(tracing::Level::INFO);

    // Write to a log file, not stdout/stderr - the terminal belongs to
    // the story output
    let log_path = get_log_path();
    if let Some(dir) = log_path.parent() {
        fs::create_dir_all(dir).context("Failed to create log directory")?;
    }
    let log_file = fs::File::options()
        .create(true)
        .append(true)
        .open(&log_path)
        .context("Failed to open log file")?;

    tracing_subscriber::fmt()
        .with_writer(log_file)
        .with_ansi(false)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()))
        .init();

    info!(%level, "Logging initialized");
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = Config::load(cli.config.as_ref()).context("Failed to load configuration")?;

    setup_logging(cli.log_level.as_deref(), config.log_level.as_deref()).context("Failed to setup logging")?;

    match cli.command {
        Command::Daemon { command } => match command {
            DaemonCommand::Start { foreground } => cmd_start(config, foreground).await,
            DaemonCommand::Stop => cmd_stop(),
            DaemonCommand::Status => cmd_status(),
            DaemonCommand::Ping => cmd_ping().await,
        },
        Command::RunDaemon => run_daemon(config).await,
        Command::Generate { topic, stream } => cmd_generate(&topic, stream).await,
        Command::Stories { command } => match command {
            StoriesCommand::List { offset, limit } => cmd_stories_list(&config, offset, limit),
            StoriesCommand::Show { id } => cmd_stories_show(&config, &id),
        },
    }
}

/// Start the daemon
async fn cmd_start(config: Config, foreground: bool) -> Result<()> {
    let daemon = DaemonManager::new();

    if let Some(pid) = daemon.running_pid() {
        println!("StoryDaemon is already running (PID: {})", pid);
        return Ok(());
    }

    // Fail fast before detaching so the error lands in the terminal
    config.validate()?;

    if foreground {
        println!("Starting StoryDaemon in foreground mode...");
        run_daemon(config).await
    } else {
        let pid = daemon.start()?;
        println!("{} (PID: {})", "StoryDaemon started".green(), pid);
        Ok(())
    }
}

/// Stop the daemon
fn cmd_stop() -> Result<()> {
    let daemon = DaemonManager::new();

    let Some(pid) = daemon.running_pid() else {
        println!("StoryDaemon is not running");
        return Ok(());
    };

    daemon.stop()?;
    println!("{} (was PID: {})", "StoryDaemon stopped".green(), pid);
    Ok(())
}

/// Show daemon status
fn cmd_status() -> Result<()> {
    let status = DaemonManager::new().status();

    println!("StoryDaemon Status");
    println!("------------------");
    if status.running {
        println!("Status: {}", "running".green());
        println!("PID: {}", status.pid.unwrap_or_default());
    } else {
        println!("Status: {}", "stopped".red());
    }
    println!("PID file: {}", status.pid_file.display());

    Ok(())
}

/// Ping the daemon
async fn cmd_ping() -> Result<()> {
    let client = StoryClient::new();

    if !client.socket_exists() {
        println!("{}", "StoryDaemon is not running".red());
        return Ok(());
    }

    match client.ping().await {
        Ok(version) => println!("{} (version {})", "StoryDaemon is alive".green(), version),
        Err(e) => println!("{}: {}", "Ping failed".red(), e),
    }
    Ok(())
}

/// Generate a story via the daemon
async fn cmd_generate(topic: &str, stream: bool) -> Result<()> {
    let client = StoryClient::new();

    if !client.socket_exists() {
        return Err(eyre::eyre!("StoryDaemon is not running. Start it with: sd daemon start"));
    }

    let record = if stream {
        let mut stdout = std::io::stdout();
        let record = client
            .generate_stream(topic, |token| {
                print!("{}", token);
                let _ = stdout.flush();
            })
            .await?;
        println!();
        println!();
        record
    } else {
        println!("Generating story, this may take a while...");
        client.generate(topic).await?
    };

    print_story(&record, !stream);
    Ok(())
}

/// List persisted stories
fn cmd_stories_list(config: &Config, offset: u32, limit: u32) -> Result<()> {
    let store = StoryStore::open(config.storage.db_path())?;
    let stories = store.list(offset as usize, limit as usize)?;

    if stories.is_empty() {
        println!("No stories yet. Generate one with: sd generate <topic>");
        return Ok(());
    }

    for story in &stories {
        println!(
            "{}  {}  [{}]",
            story.id.dimmed(),
            story.title.bold(),
            story.created_at.format("%Y-%m-%d %H:%M")
        );
    }
    Ok(())
}

/// Show one persisted story
fn cmd_stories_show(config: &Config, id: &str) -> Result<()> {
    let store = StoryStore::open(config.storage.db_path())?;
    let record = store.get(id)?;
    print_story(&record, true);
    Ok(())
}

/// Print a story with its metadata and questions
///
/// `with_text` is false when the body was already streamed to the
/// terminal.
fn print_story(record: &StoryRecord, with_text: bool) {
    println!("{}", record.title.bold());
    println!(
        "{}",
        format!("id: {}  model: {}  created: {}", record.id, record.llm_model, record.created_at.to_rfc3339()).dimmed()
    );

    if with_text {
        println!();
        println!("{}", record.text);
    }

    println!();
    println!("{}", "Comprehension questions:".bold());
    for (i, qa) in record.questions.iter().enumerate() {
        println!("  {}. {}", i + 1, qa.question);
        println!("     {}", qa.answer.dimmed());
    }
}
