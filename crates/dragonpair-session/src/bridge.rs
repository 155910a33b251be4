//! Bridge process running the external messaging client
//!
//! The bridge is any program that drives the messaging library and prints one
//! JSON lifecycle event per line on stdout. Configuration is passed through
//! the environment:
//!
//! | Variable                  | Meaning                                   |
//! |---------------------------|-------------------------------------------|
//! | `DRAGONPAIR_CLIENT_ID`    | session namespace                         |
//! | `DRAGONPAIR_DATA_PATH`    | directory holding `session-<client id>`   |
//! | `DRAGONPAIR_HEADLESS`     | `true` / `false`                          |
//! | `DRAGONPAIR_BROWSER_ARGS` | space separated browser flags             |

use async_trait::async_trait;
use dragonpair_core::{Config, LifecycleEvent};
use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, ChildStdout, Command};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::client::{EventSink, MessagingClient};
use crate::error::{SessionError, SessionResult};

/// How long to wait for the last stderr lines once the bridge has exited
const STDERR_GRACE: Duration = Duration::from_secs(1);

/// How to launch the bridge
#[derive(Debug, Clone)]
pub struct BridgeConfig {
    pub program: String,
    pub args: Vec<String>,
    pub client_id: String,
    pub data_path: PathBuf,
    pub headless: bool,
    pub browser_args: Vec<String>,
}

impl BridgeConfig {
    pub fn from_config(config: &Config) -> Self {
        Self {
            program: config.bridge_program.clone(),
            args: config.bridge_args.clone(),
            client_id: config.client_id.clone(),
            data_path: config.session_root.clone(),
            headless: config.headless,
            browser_args: config.browser_args.clone(),
        }
    }
}

/// A started bridge: the supervisor task owns the child process
struct RunningBridge {
    stop: oneshot::Sender<()>,
    supervisor: JoinHandle<()>,
}

/// Messaging client backed by a child process
pub struct BridgeClient {
    config: BridgeConfig,
    running: Option<RunningBridge>,
}

impl BridgeClient {
    pub fn new(config: BridgeConfig) -> Self {
        Self {
            config,
            running: None,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(BridgeConfig::from_config(config))
    }

    /// Whether a bridge process has been started and not destroyed
    pub fn is_running(&self) -> bool {
        self.running.is_some()
    }

    fn command(&self) -> Command {
        let mut cmd = Command::new(&self.config.program);
        cmd.args(&self.config.args)
            .env("DRAGONPAIR_CLIENT_ID", &self.config.client_id)
            .env("DRAGONPAIR_DATA_PATH", &self.config.data_path)
            .env("DRAGONPAIR_HEADLESS", self.config.headless.to_string())
            .env("DRAGONPAIR_BROWSER_ARGS", self.config.browser_args.join(" "))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        cmd
    }
}

#[async_trait]
impl MessagingClient for BridgeClient {
    async fn initialize(&mut self, events: EventSink) -> SessionResult<()> {
        if self.running.is_some() {
            return Err(SessionError::AlreadyRunning);
        }

        let mut child = self.command().spawn().map_err(|source| SessionError::Spawn {
            program: self.config.program.clone(),
            source,
        })?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| SessionError::Initialize("bridge stdout not captured".to_string()))?;
        let stderr = child.stderr.take().map(|stderr| tokio::spawn(forward_stderr(stderr)));

        info!(
            "Bridge started: {} {} (pid {:?})",
            self.config.program,
            self.config.args.join(" "),
            child.id()
        );

        let (stop, stop_rx) = oneshot::channel();
        let supervisor = tokio::spawn(supervise(child, stdout, stderr, events, stop_rx));
        self.running = Some(RunningBridge { stop, supervisor });
        Ok(())
    }

    async fn destroy(&mut self) -> SessionResult<()> {
        if let Some(running) = self.running.take() {
            // Fails only if the bridge already exited
            if running.stop.send(()).is_err() {
                debug!("Bridge already exited");
            }
            if let Err(e) = running.supervisor.await {
                warn!("Bridge supervisor failed: {}", e);
            }
        }

        Ok(())
    }
}

impl Drop for BridgeClient {
    fn drop(&mut self) {
        if let Some(running) = &self.running {
            running.supervisor.abort();
        }
    }
}

/// Own the child until it exits or is stopped
///
/// Stdout is drained into the sink first, so an exit is always reported after
/// every event the bridge printed.
async fn supervise(
    mut child: Child,
    stdout: ChildStdout,
    stderr: Option<JoinHandle<Option<String>>>,
    events: EventSink,
    mut stop: oneshot::Receiver<()>,
) {
    let exited = tokio::select! {
        status = async {
            forward_events(stdout, &events).await;
            child.wait().await
        } => Some(status),
        _ = &mut stop => None,
    };

    let Some(status) = exited else {
        if let Err(e) = child.kill().await {
            debug!("Bridge already stopped: {}", e);
        }
        if let Some(task) = stderr {
            task.abort();
        }
        info!("Bridge stopped");
        return;
    };

    let last_line = match stderr {
        Some(task) => tokio::time::timeout(STDERR_GRACE, task)
            .await
            .ok()
            .and_then(Result::ok)
            .flatten(),
        None => None,
    };

    let reason = exit_reason(status, last_line);
    warn!("Bridge exited: {}", reason);
    if events.exited(reason).await.is_err() {
        debug!("Nobody is listening for the bridge exit");
    }
}

fn exit_reason(status: std::io::Result<ExitStatus>, last_line: Option<String>) -> String {
    let status = match status {
        Ok(status) => match status.code() {
            Some(code) => format!("exit code {}", code),
            None => "terminated by signal".to_string(),
        },
        Err(e) => format!("wait failed: {}", e),
    };

    match last_line {
        Some(line) => format!("{} ({})", line, status),
        None => status,
    }
}

/// Parse bridge stdout into lifecycle events, in order
async fn forward_events(stdout: ChildStdout, events: &EventSink) {
    let mut lines = BufReader::new(stdout).lines();

    loop {
        match lines.next_line().await {
            Ok(Some(line)) => {
                if line.trim().is_empty() {
                    continue;
                }
                match LifecycleEvent::from_line(&line) {
                    Ok(event) => {
                        debug!("Bridge event: {}", event.name());
                        if events.send(event).await.is_err() {
                            break;
                        }
                    }
                    Err(e) => warn!("Ignoring bridge output: {} ({})", line, e),
                }
            }
            Ok(None) => {
                debug!("Bridge closed its output");
                break;
            }
            Err(e) => {
                warn!("Failed to read bridge output: {}", e);
                break;
            }
        }
    }
}

/// Log bridge stderr; returns the last non-empty line
async fn forward_stderr<R: AsyncRead + Unpin>(stderr: R) -> Option<String> {
    let mut lines = BufReader::new(stderr).lines();
    let mut last = None;
    while let Ok(Some(line)) = lines.next_line().await {
        debug!(target: "bridge", "{}", line);
        if !line.trim().is_empty() {
            last = Some(line.trim().to_string());
        }
    }
    last
}
