//! Daemon process management and the generation session loop
//!
//! Handles PID file management, process control, and the daemon's
//! accept loop. Sessions are handled one at a time: a single story
//! generation is in flight at any moment.

use std::fs;
use std::io::{Read, Write};
use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::sync::Arc;
use std::time::Duration;

use eyre::{Context, Result};
use tokio::io::BufReader;
use tokio::net::UnixStream;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::ipc::listener::{cleanup_socket, create_listener, read_request, send_event};
use crate::ipc::messages::{ClientRequest, ServerEvent};
use crate::llm::OpenRouterClient;
use crate::story::{GenerationEvent, StoryGenerator};
use storystore::StoryStore;

/// Current version (set at compile time)
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// How long to wait for the client's ack after a terminal event
const ACK_TIMEOUT: Duration = Duration::from_secs(10);

/// Default PID file location
fn default_pid_path() -> PathBuf {
    dirs::runtime_dir()
        .or_else(dirs::data_local_dir)
        .unwrap_or_else(|| PathBuf::from("/tmp"))
        .join("storydaemon")
        .join("storydaemon.pid")
}

/// Daemon process manager
#[derive(Debug)]
pub struct DaemonManager {
    /// Path to the PID file
    pid_file: PathBuf,
}

impl Default for DaemonManager {
    fn default() -> Self {
        Self::new()
    }
}

impl DaemonManager {
    /// Create a new daemon manager with the default PID file location
    pub fn new() -> Self {
        Self {
            pid_file: default_pid_path(),
        }
    }

    /// Create a daemon manager with a custom PID file path
    pub fn with_pid_file(pid_file: PathBuf) -> Self {
        Self { pid_file }
    }

    /// Check if a daemon is running
    pub fn is_running(&self) -> bool {
        self.read_pid().is_some_and(is_process_running)
    }

    /// Get the running daemon's PID
    pub fn running_pid(&self) -> Option<u32> {
        self.read_pid().filter(|&pid| is_process_running(pid))
    }

    /// Read the PID from the PID file
    fn read_pid(&self) -> Option<u32> {
        if !self.pid_file.exists() {
            return None;
        }

        let mut file = fs::File::open(&self.pid_file).ok()?;
        let mut contents = String::new();
        file.read_to_string(&mut contents).ok()?;

        contents.trim().parse().ok()
    }

    /// Write the PID to the PID file
    fn write_pid(&self, pid: u32) -> Result<()> {
        if let Some(parent) = self.pid_file.parent() {
            fs::create_dir_all(parent).context("Failed to create PID file directory")?;
        }

        let mut file = fs::File::create(&self.pid_file).context("Failed to create PID file")?;
        write!(file, "{}", pid).context("Failed to write PID")?;

        debug!(pid, path = ?self.pid_file, "Wrote PID file");
        Ok(())
    }

    /// Remove the PID file
    pub fn remove_pid_file(&self) -> Result<()> {
        if self.pid_file.exists() {
            fs::remove_file(&self.pid_file).context("Failed to remove PID file")?;
            debug!(path = ?self.pid_file, "Removed PID file");
        }
        Ok(())
    }

    /// Start the daemon
    ///
    /// This spawns a detached daemon process and returns immediately.
    pub fn start(&self) -> Result<u32> {
        if let Some(pid) = self.running_pid() {
            return Err(eyre::eyre!("Daemon already running with PID {}", pid));
        }

        info!("Starting daemon...");

        let exe = std::env::current_exe().context("Failed to get current executable")?;

        let child = Command::new(&exe)
            .arg("run-daemon")
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .context("Failed to spawn daemon process")?;

        let pid = child.id();
        self.write_pid(pid)?;

        info!(pid, "Daemon started");
        Ok(pid)
    }

    /// Stop the daemon
    pub fn stop(&self) -> Result<()> {
        let pid = self.running_pid().ok_or_else(|| eyre::eyre!("Daemon is not running"))?;

        info!(pid, "Stopping daemon...");

        {
            use nix::sys::signal::{Signal, kill};
            use nix::unistd::Pid;

            kill(Pid::from_raw(pid as i32), Signal::SIGTERM).context("Failed to send SIGTERM")?;
        }

        // Wait for process to exit (with timeout)
        let mut attempts = 0;
        while is_process_running(pid) && attempts < 50 {
            std::thread::sleep(Duration::from_millis(100));
            attempts += 1;
        }

        if is_process_running(pid) {
            warn!(pid, "Daemon did not stop gracefully, sending SIGKILL");
            use nix::sys::signal::{Signal, kill};
            use nix::unistd::Pid;
            let _ = kill(Pid::from_raw(pid as i32), Signal::SIGKILL);
        }

        self.remove_pid_file()?;
        info!(pid, "Daemon stopped");
        Ok(())
    }

    /// Register the current process as the daemon
    ///
    /// This should be called by the daemon process after spawning.
    pub fn register_self(&self) -> Result<()> {
        let pid = std::process::id();
        self.write_pid(pid)?;
        info!(pid, version = VERSION, "Daemon registered");
        Ok(())
    }

    /// Get the PID file path
    pub fn pid_file(&self) -> &PathBuf {
        &self.pid_file
    }
}

/// Check if a process with the given PID is running
fn is_process_running(pid: u32) -> bool {
    use nix::sys::signal::kill;
    use nix::unistd::Pid;
    // Sending signal 0 checks if the process exists without affecting it
    kill(Pid::from_raw(pid as i32), None).is_ok()
}

/// Daemon status information
#[derive(Debug)]
pub struct DaemonStatus {
    /// Whether the daemon is running
    pub running: bool,
    /// Process ID (if running)
    pub pid: Option<u32>,
    /// PID file path
    pub pid_file: PathBuf,
}

impl DaemonManager {
    /// Get the daemon status
    pub fn status(&self) -> DaemonStatus {
        let pid = self.running_pid();
        DaemonStatus {
            running: pid.is_some(),
            pid,
            pid_file: self.pid_file.clone(),
        }
    }
}

/// Run the daemon in the current process
///
/// Validates configuration, binds the socket, and serves sessions until
/// shutdown is requested.
pub async fn run_daemon(config: Config) -> Result<()> {
    config.validate()?;

    let api_key = config.api_key()?;
    let client = OpenRouterClient::new(api_key, config.llm.base_url.clone())?;
    let generator = Arc::new(StoryGenerator::new(
        Arc::new(client),
        config.llm.clone(),
        config.generation.clone(),
    ));

    let (listener, socket_path) = create_listener()?;

    let manager = DaemonManager::new();
    manager.register_self()?;

    info!(?socket_path, version = VERSION, "Daemon listening");
    let result = serve(listener, generator, &config).await;

    cleanup_socket(&socket_path);
    manager.remove_pid_file()?;
    info!("Daemon exited");
    result
}

/// Accept loop: one session at a time until shutdown
///
/// Public so tests can drive it against a listener on a temp path.
pub async fn serve(listener: tokio::net::UnixListener, generator: Arc<StoryGenerator>, config: &Config) -> Result<()> {
    let mut sigterm =
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()).context("Failed to install SIGTERM handler")?;

    loop {
        let stream = tokio::select! {
            accepted = listener.accept() => accepted.context("Failed to accept connection")?.0,
            _ = sigterm.recv() => {
                info!("SIGTERM received, shutting down");
                return Ok(());
            }
        };

        match handle_connection(stream, &generator, config).await {
            Ok(SessionOutcome::Continue) => {}
            Ok(SessionOutcome::Shutdown) => {
                info!("Shutdown requested, exiting accept loop");
                return Ok(());
            }
            Err(e) => warn!("Session failed: {}", e),
        }
    }
}

enum SessionOutcome {
    Continue,
    Shutdown,
}

/// Handle one client connection
async fn handle_connection(
    stream: UnixStream,
    generator: &Arc<StoryGenerator>,
    config: &Config,
) -> Result<SessionOutcome> {
    let (read_half, mut writer) = stream.into_split();
    let mut reader = BufReader::new(read_half);

    let request = read_request(&mut reader).await?;

    match request {
        ClientRequest::Ping => {
            send_event(
                &mut writer,
                &ServerEvent::Pong {
                    version: VERSION.to_string(),
                },
            )
            .await?;
            Ok(SessionOutcome::Continue)
        }

        ClientRequest::Shutdown => {
            send_event(&mut writer, &ServerEvent::Ok).await?;
            Ok(SessionOutcome::Shutdown)
        }

        ClientRequest::Ack => {
            send_event(
                &mut writer,
                &ServerEvent::Error {
                    payload: "Unexpected ack outside a streaming session".to_string(),
                },
            )
            .await?;
            Ok(SessionOutcome::Continue)
        }

        ClientRequest::Generate { topic } => {
            info!(%topic, "Generation session started");
            let store = StoryStore::open(config.storage.db_path())?;

            let event = match generator.generate(&topic, &store).await {
                Ok(record) => ServerEvent::Complete { payload: record },
                Err(e) => {
                    warn!("Generation failed: {}", e);
                    ServerEvent::Error {
                        payload: e.to_string(),
                    }
                }
            };
            send_event(&mut writer, &event).await?;
            Ok(SessionOutcome::Continue)
        }

        ClientRequest::GenerateStream { topic } => {
            info!(%topic, "Streaming generation session started");
            let store = StoryStore::open(config.storage.db_path())?;

            let (events_tx, mut events_rx) = mpsc::channel::<GenerationEvent>(64);
            let task_generator = Arc::clone(generator);
            let task = tokio::spawn(async move { task_generator.generate_streaming(&topic, &store, events_tx).await });

            // Forward progress events to the socket. Dropping the
            // receiver on a write failure makes the generator abandon
            // the session without persisting.
            let mut client_gone = false;
            while let Some(event) = events_rx.recv().await {
                let wire = match event {
                    GenerationEvent::Token(token) => ServerEvent::Token { payload: token },
                    GenerationEvent::StoryDone => ServerEvent::StoryDone,
                };
                if send_event(&mut writer, &wire).await.is_err() {
                    client_gone = true;
                    break;
                }
            }
            drop(events_rx);

            match task.await {
                Ok(result) if !client_gone => {
                    let event = match result {
                        Ok(record) => ServerEvent::Complete { payload: record },
                        Err(e) => {
                            warn!("Streaming generation failed: {}", e);
                            ServerEvent::Error {
                                payload: e.to_string(),
                            }
                        }
                    };
                    if send_event(&mut writer, &event).await.is_ok() {
                        await_ack(&mut reader).await;
                    }
                }
                Ok(_) => info!("Client disconnected mid-session, generation abandoned"),
                Err(e) => warn!("Generation task failed: {}", e),
            }

            Ok(SessionOutcome::Continue)
        }
    }
}

/// Wait briefly for the client's ack so it reads the terminal event
/// before the daemon drops the connection.
async fn await_ack<R>(reader: &mut R)
where
    R: tokio::io::AsyncBufRead + Unpin,
{
    match tokio::time::timeout(ACK_TIMEOUT, read_request(reader)).await {
        Ok(Ok(ClientRequest::Ack)) => debug!("Client acknowledged session end"),
        Ok(Ok(other)) => debug!(?other, "Expected ack, got another request"),
        Ok(Err(e)) => debug!("Ack read failed: {}", e),
        Err(_) => debug!("Ack wait timed out"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ipc::StoryClient;
    use crate::ipc::listener::create_listener_at;
    use crate::llm::client::mock::{MockCompletionClient, MockResponse};
    use tempfile::TempDir;

    #[test]
    fn test_daemon_manager_with_custom_pid() {
        let temp_dir = TempDir::new().unwrap();
        let pid_file = temp_dir.path().join("test.pid");

        let manager = DaemonManager::with_pid_file(pid_file.clone());
        assert_eq!(manager.pid_file(), &pid_file);
    }

    #[test]
    fn test_is_not_running_when_no_pid_file() {
        let temp_dir = TempDir::new().unwrap();
        let pid_file = temp_dir.path().join("nonexistent.pid");

        let manager = DaemonManager::with_pid_file(pid_file);
        assert!(!manager.is_running());
    }

    #[test]
    fn test_write_and_read_pid() {
        let temp_dir = TempDir::new().unwrap();
        let pid_file = temp_dir.path().join("test.pid");

        let manager = DaemonManager::with_pid_file(pid_file);

        manager.write_pid(12345).unwrap();
        assert_eq!(manager.read_pid(), Some(12345));

        manager.remove_pid_file().unwrap();
        assert_eq!(manager.read_pid(), None);
    }

    #[test]
    fn test_status() {
        let temp_dir = TempDir::new().unwrap();
        let pid_file = temp_dir.path().join("test.pid");

        let manager = DaemonManager::with_pid_file(pid_file.clone());
        let status = manager.status();

        assert!(!status.running);
        assert!(status.pid.is_none());
        assert_eq!(status.pid_file, pid_file);
    }

    fn test_setup(responses: Vec<MockResponse>, temp: &TempDir) -> (Arc<StoryGenerator>, Config) {
        let mut config = Config::default();
        config.llm.models = vec!["m1".to_string(), "m2".to_string()];
        config.generation.retry_delay_ms = 0;
        config.storage.store_dir = temp.path().join("store");

        let client = Arc::new(MockCompletionClient::new(responses));
        let generator = Arc::new(StoryGenerator::new(
            client,
            config.llm.clone(),
            config.generation.clone(),
        ));

        (generator, config)
    }

    fn metadata_json() -> MockResponse {
        MockResponse::Content(
            r#"{"title":"A Flight","questions":[{"question":"Who?","answer":"Whiskers"}]}"#.to_string(),
        )
    }

    #[tokio::test]
    async fn test_session_ping() {
        let temp = TempDir::new().unwrap();
        let socket_path = temp.path().join("daemon.sock");
        let (listener, _) = create_listener_at(&socket_path).unwrap();
        let (generator, config) = test_setup(vec![], &temp);

        let session = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            handle_connection(stream, &generator, &config).await.unwrap();
        });

        tokio::time::sleep(Duration::from_millis(10)).await;
        let version = StoryClient::with_socket_path(socket_path).ping().await.unwrap();
        assert_eq!(version, VERSION);

        session.await.unwrap();
    }

    #[tokio::test]
    async fn test_session_streaming_generation() {
        let temp = TempDir::new().unwrap();
        let socket_path = temp.path().join("daemon.sock");
        let (listener, _) = create_listener_at(&socket_path).unwrap();

        let responses = vec![
            MockResponse::Content("a refined topic".to_string()),
            MockResponse::Tokens(vec!["Once".to_string(), " upon".to_string(), " a time".to_string()]),
            metadata_json(),
        ];
        let (generator, config) = test_setup(responses, &temp);
        let db_path = config.storage.db_path();

        let session = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            handle_connection(stream, &generator, &config).await.unwrap();
        });

        tokio::time::sleep(Duration::from_millis(10)).await;

        let mut seen = String::new();
        let record = StoryClient::with_socket_path(socket_path)
            .generate_stream("a cat who wants to fly", |t| seen.push_str(t))
            .await
            .unwrap();

        assert_eq!(seen, "Once upon a time");
        assert_eq!(record.text, "Once upon a time");
        assert_eq!(record.title, "A Flight");

        // The story survived the session
        let store = StoryStore::open(db_path).unwrap();
        assert_eq!(store.get(&record.id).unwrap().text, "Once upon a time");

        session.await.unwrap();
    }

    #[tokio::test]
    async fn test_session_generation_failure_sends_error() {
        let temp = TempDir::new().unwrap();
        let socket_path = temp.path().join("daemon.sock");
        let (listener, _) = create_listener_at(&socket_path).unwrap();

        // Refine fails (identity), then every body attempt fails
        let responses = std::iter::repeat_with(|| MockResponse::Fail(503, "down".to_string()))
            .take(7)
            .collect();
        let (generator, config) = test_setup(responses, &temp);
        let db_path = config.storage.db_path();

        let session = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            handle_connection(stream, &generator, &config).await.unwrap();
        });

        tokio::time::sleep(Duration::from_millis(10)).await;

        let result = StoryClient::with_socket_path(socket_path).generate("a topic").await;
        assert!(result.is_err());

        // Nothing persisted
        let store = StoryStore::open(db_path).unwrap();
        assert!(store.list(0, 10).unwrap().is_empty());

        session.await.unwrap();
    }

    #[tokio::test]
    async fn test_session_shutdown_outcome() {
        let temp = TempDir::new().unwrap();
        let socket_path = temp.path().join("daemon.sock");
        let (listener, _) = create_listener_at(&socket_path).unwrap();
        let (generator, config) = test_setup(vec![], &temp);

        let session = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            handle_connection(stream, &generator, &config).await.unwrap()
        });

        tokio::time::sleep(Duration::from_millis(10)).await;
        StoryClient::with_socket_path(socket_path).shutdown().await.unwrap();

        assert!(matches!(session.await.unwrap(), SessionOutcome::Shutdown));
    }
}
