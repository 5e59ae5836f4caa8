//! Standard I/O transports.
//!
//! Messages are exchanged as newline-delimited JSON: one envelope per
//! LF-terminated line. Any `\r\n`, `\n`, or `\r` embedded in the
//! serialized JSON is escaped to the two-character sequence `\n` before
//! writing, so the line framing can never be broken by payload content.
//!
//! [`StdioClientTransport`] spawns a server child process and talks to it
//! over the child's stdin/stdout, with the child's stderr drained as
//! out-of-band diagnostics. [`StdioServerTransport`] is the mirror image
//! for a server running as that child, using the current process's own
//! stdin/stdout.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use mcpkit_core::logging::targets;
use mcpkit_protocol::JsonRpcMessage;

use crate::{MessageHandler, Transport, TransportError};

/// Outbound queue capacity for both stdio transports.
const OUTBOUND_CAPACITY: usize = 64;

/// Sink for the child's stderr lines.
pub type StderrSink = Arc<dyn Fn(String) + Send + Sync>;

/// Environment variables inherited by default on Unix-like systems.
#[cfg(not(windows))]
const DEFAULT_INHERITED_ENV_VARS: &[&str] = &["HOME", "LOGNAME", "PATH", "SHELL", "TERM", "USER"];

/// Environment variables inherited by default on Windows.
#[cfg(windows)]
const DEFAULT_INHERITED_ENV_VARS: &[&str] = &[
    "APPDATA",
    "HOMEDRIVE",
    "HOMEPATH",
    "LOCALAPPDATA",
    "PATH",
    "PROCESSOR_ARCHITECTURE",
    "SYSTEMDRIVE",
    "SYSTEMROOT",
    "TEMP",
    "USERNAME",
    "USERPROFILE",
];

/// Keeps only the default-inherited variables, dropping shell function
/// exports (values starting with `()`).
fn filter_inherited<I>(vars: I) -> HashMap<String, String>
where
    I: IntoIterator<Item = (String, String)>,
{
    vars.into_iter()
        .filter(|(key, _)| DEFAULT_INHERITED_ENV_VARS.contains(&key.as_str()))
        .filter(|(_, value)| !value.starts_with("()"))
        .collect()
}

/// Returns the environment a spawned server inherits by default.
#[must_use]
pub fn default_environment() -> HashMap<String, String> {
    filter_inherited(std::env::vars())
}

/// Parameters for spawning a stdio server process.
///
/// The child's environment is the platform default-inheritance set plus
/// any explicit additions; everything else from the parent environment is
/// dropped.
#[derive(Debug, Clone)]
pub struct ServerParameters {
    command: String,
    args: Vec<String>,
    env: HashMap<String, String>,
}

impl ServerParameters {
    /// Starts building parameters for the given command.
    #[must_use]
    pub fn builder(command: impl Into<String>) -> ServerParametersBuilder {
        ServerParametersBuilder {
            command: command.into(),
            args: Vec::new(),
            env: HashMap::new(),
        }
    }

    /// The command to execute.
    #[must_use]
    pub fn command(&self) -> &str {
        &self.command
    }

    /// Command-line arguments.
    #[must_use]
    pub fn args(&self) -> &[String] {
        &self.args
    }

    /// The full child environment (defaults plus additions).
    #[must_use]
    pub fn env(&self) -> &HashMap<String, String> {
        &self.env
    }
}

/// Builder for [`ServerParameters`].
#[derive(Debug)]
pub struct ServerParametersBuilder {
    command: String,
    args: Vec<String>,
    env: HashMap<String, String>,
}

impl ServerParametersBuilder {
    /// Appends a command-line argument.
    #[must_use]
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Replaces the argument list.
    #[must_use]
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    /// Adds an explicit environment variable for the child.
    #[must_use]
    pub fn env_var(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    /// Merges explicit environment variables for the child.
    #[must_use]
    pub fn env(mut self, env: HashMap<String, String>) -> Self {
        self.env.extend(env);
        self
    }

    /// Finalizes the parameters, merging explicit additions over the
    /// default inherited environment.
    #[must_use]
    pub fn build(self) -> ServerParameters {
        let mut env = default_environment();
        env.extend(self.env);
        ServerParameters {
            command: self.command,
            args: self.args,
            env,
        }
    }
}

/// Serializes an envelope into a single framed line.
///
/// Embedded newlines are escaped so the result contains exactly one LF:
/// the terminator.
fn encode_line(message: &JsonRpcMessage) -> Result<String, serde_json::Error> {
    let json = serde_json::to_string(message)?;
    let mut line = escape_embedded_newlines(&json).into_owned();
    line.push('\n');
    Ok(line)
}

/// Escapes `\r\n`, `\n`, and `\r` to the two-character sequence `\n`.
fn escape_embedded_newlines(json: &str) -> std::borrow::Cow<'_, str> {
    if json.contains(['\n', '\r']) {
        std::borrow::Cow::Owned(
            json.replace("\r\n", "\\n")
                .replace('\n', "\\n")
                .replace('\r', "\\n"),
        )
    } else {
        std::borrow::Cow::Borrowed(json)
    }
}

/// Parses one inbound line, logging and skipping malformed input.
fn parse_line(line: &str) -> Option<JsonRpcMessage> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    match JsonRpcMessage::from_str(line) {
        Ok(message) => Some(message),
        Err(err) => {
            warn!(target: targets::TRANSPORT, "Discarding malformed line: {err}");
            None
        }
    }
}

/// Stdio transport that spawns and drives a server child process.
///
/// Three workers run after [`Transport::connect`]: an inbound reader on
/// the child's stdout, an outbound writer on the child's stdin, and a
/// stderr drain feeding the configured sink (default: `tracing` at debug
/// level).
pub struct StdioClientTransport {
    params: ServerParameters,
    outbound: Mutex<Option<mpsc::Sender<JsonRpcMessage>>>,
    child: tokio::sync::Mutex<Option<Child>>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
    connected: AtomicBool,
    closed: AtomicBool,
    stderr_sink: Option<StderrSink>,
}

impl StdioClientTransport {
    /// Creates a transport that will spawn the given server process.
    #[must_use]
    pub fn new(params: ServerParameters) -> Self {
        Self {
            params,
            outbound: Mutex::new(None),
            child: tokio::sync::Mutex::new(None),
            tasks: Mutex::new(Vec::new()),
            connected: AtomicBool::new(false),
            closed: AtomicBool::new(false),
            stderr_sink: None,
        }
    }

    /// Replaces the default stderr sink.
    #[must_use]
    pub fn with_stderr_sink(mut self, sink: StderrSink) -> Self {
        self.stderr_sink = Some(sink);
        self
    }

    fn store_task(&self, task: JoinHandle<()>) {
        self.tasks.lock().expect("tasks lock poisoned").push(task);
    }
}

#[async_trait::async_trait]
impl Transport for StdioClientTransport {
    async fn connect(&self, handler: MessageHandler) -> Result<(), TransportError> {
        if self.connected.swap(true, Ordering::SeqCst) {
            return Err(TransportError::AlreadyConnected);
        }

        let mut command = Command::new(self.params.command());
        command
            .args(self.params.args())
            .env_clear()
            .envs(self.params.env())
            .stdin(std::process::Stdio::piped())
            .stdout(std::process::Stdio::piped())
            .stderr(std::process::Stdio::piped())
            .kill_on_drop(true);

        let mut child = command.spawn().map_err(|e| {
            TransportError::Spawn(format!(
                "failed to spawn '{}': {e}",
                self.params.command()
            ))
        })?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| TransportError::Spawn("child stdin unavailable".to_owned()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| TransportError::Spawn("child stdout unavailable".to_owned()))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| TransportError::Spawn("child stderr unavailable".to_owned()))?;

        let (outbound_tx, mut outbound_rx) = mpsc::channel::<JsonRpcMessage>(OUTBOUND_CAPACITY);

        // Outbound writer: the single place framed lines are produced, so
        // envelopes are never interleaved mid-record.
        self.store_task(tokio::spawn(async move {
            let mut stdin = stdin;
            while let Some(message) = outbound_rx.recv().await {
                let line = match encode_line(&message) {
                    Ok(line) => line,
                    Err(err) => {
                        warn!(target: targets::TRANSPORT, "Failed to encode message: {err}");
                        continue;
                    }
                };
                if stdin.write_all(line.as_bytes()).await.is_err() {
                    break;
                }
                if stdin.flush().await.is_err() {
                    break;
                }
            }
        }));

        // Inbound reader: one envelope at a time, in arrival order.
        self.store_task(tokio::spawn(async move {
            let mut lines = BufReader::new(stdout).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                if let Some(message) = parse_line(&line) {
                    handler(message).await;
                }
            }
            info!(target: targets::TRANSPORT, "Server stdout ended");
        }));

        // Stderr drain: out-of-band diagnostics, never protocol.
        let sink = self.stderr_sink.clone();
        self.store_task(tokio::spawn(async move {
            let mut lines = BufReader::new(stderr).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                match &sink {
                    Some(sink) => sink(line),
                    None => debug!(target: targets::TRANSPORT, "server stderr: {line}"),
                }
            }
        }));

        *self.outbound.lock().expect("outbound lock poisoned") = Some(outbound_tx);
        *self.child.lock().await = Some(child);
        Ok(())
    }

    async fn send_message(&self, message: JsonRpcMessage) -> Result<(), TransportError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(TransportError::Closed);
        }
        let sender = {
            let guard = self.outbound.lock().expect("outbound lock poisoned");
            guard.clone().ok_or(TransportError::NotConnected)?
        };
        sender.try_send(message).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => TransportError::EnqueueFailed,
            mpsc::error::TrySendError::Closed(_) => TransportError::Closed,
        })
    }

    async fn close_gracefully(&self) -> Result<(), TransportError> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }

        // Dropping the sender lets the writer drain, then closes the
        // child's stdin.
        self.outbound.lock().expect("outbound lock poisoned").take();

        if let Some(mut child) = self.child.lock().await.take() {
            info!(target: targets::TRANSPORT, "Sending terminate signal to server process");
            let _ = child.start_kill();
            match child.wait().await {
                Ok(status) if !status.success() => {
                    warn!(target: targets::TRANSPORT, "Server process terminated with {status}");
                }
                Ok(_) => {}
                Err(err) => {
                    warn!(target: targets::TRANSPORT, "Failed to await server process exit: {err}");
                }
            }
        }

        for task in self.tasks.lock().expect("tasks lock poisoned").drain(..) {
            task.abort();
        }
        Ok(())
    }
}

/// Stdio transport for a server running as a child process itself,
/// framing envelopes over the current process's stdin/stdout.
///
/// Stderr is untouched and remains available to the host's logging
/// backend.
pub struct StdioServerTransport {
    outbound: Mutex<Option<mpsc::Sender<JsonRpcMessage>>>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
    connected: AtomicBool,
    closed: AtomicBool,
}

impl StdioServerTransport {
    /// Creates a transport over the current process's stdin/stdout.
    #[must_use]
    pub fn new() -> Self {
        Self {
            outbound: Mutex::new(None),
            tasks: Mutex::new(Vec::new()),
            connected: AtomicBool::new(false),
            closed: AtomicBool::new(false),
        }
    }
}

impl Default for StdioServerTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl Transport for StdioServerTransport {
    async fn connect(&self, handler: MessageHandler) -> Result<(), TransportError> {
        if self.connected.swap(true, Ordering::SeqCst) {
            return Err(TransportError::AlreadyConnected);
        }

        let (outbound_tx, mut outbound_rx) = mpsc::channel::<JsonRpcMessage>(OUTBOUND_CAPACITY);

        let writer = tokio::spawn(async move {
            let mut stdout = tokio::io::stdout();
            while let Some(message) = outbound_rx.recv().await {
                let line = match encode_line(&message) {
                    Ok(line) => line,
                    Err(err) => {
                        warn!(target: targets::TRANSPORT, "Failed to encode message: {err}");
                        continue;
                    }
                };
                if stdout.write_all(line.as_bytes()).await.is_err() {
                    break;
                }
                if stdout.flush().await.is_err() {
                    break;
                }
            }
        });

        let reader = tokio::spawn(async move {
            let mut lines = BufReader::new(tokio::io::stdin()).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                if let Some(message) = parse_line(&line) {
                    handler(message).await;
                }
            }
            info!(target: targets::TRANSPORT, "stdin ended");
        });

        let mut tasks = self.tasks.lock().expect("tasks lock poisoned");
        tasks.push(writer);
        tasks.push(reader);
        drop(tasks);

        *self.outbound.lock().expect("outbound lock poisoned") = Some(outbound_tx);
        Ok(())
    }

    async fn send_message(&self, message: JsonRpcMessage) -> Result<(), TransportError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(TransportError::Closed);
        }
        let sender = {
            let guard = self.outbound.lock().expect("outbound lock poisoned");
            guard.clone().ok_or(TransportError::NotConnected)?
        };
        sender.try_send(message).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => TransportError::EnqueueFailed,
            mpsc::error::TrySendError::Closed(_) => TransportError::Closed,
        })
    }

    async fn close_gracefully(&self) -> Result<(), TransportError> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        self.outbound.lock().expect("outbound lock poisoned").take();
        for task in self.tasks.lock().expect("tasks lock poisoned").drain(..) {
            task.abort();
        }
        Ok(())
    }
}
