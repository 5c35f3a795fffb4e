//! command_runner.rs - Executes one external command and streams its output.
//!
//! Every provisioning step goes through a `CommandRunner`. The production
//! implementation, `SystemRunner`, spawns the process with stdout and stderr piped,
//! forwards each completed line to a `LogSink` while the process is still running,
//! and only reports completion once every buffered line has been delivered.
//!
//! # Output Pipeline
//!
//! ```text
//! child stdout ──reader thread──┐
//!                               ├──> sync_channel(LINE_QUEUE_CAPACITY) ──> caller thread ──> LogSink
//! child stderr ──reader thread──┘
//! ```
//!
//! The queue is bounded, so a slow consumer back-pressures the readers (and, through
//! the pipe, the child) instead of buffering without limit. The caller drains the
//! queue until both readers hang up, then reaps the child.

use std::collections::VecDeque;
use std::fmt;
use std::io::{BufRead, BufReader, Read, Write};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::mpsc::{self, SyncSender};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use thiserror::Error;
use tracing::debug;

/// Lines buffered between the reader threads and the forwarding loop.
pub const LINE_QUEUE_CAPACITY: usize = 256;

/// Lines of output kept for failure diagnostics.
pub const TAIL_LINES: usize = 20;

/// Failure of a single external command.
#[derive(Error, Debug)]
pub enum CommandError {
    /// The process could not be spawned or reaped
    #[error("failed to launch {program}: {source}")]
    Launch {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// The process ran and exited unsuccessfully
    #[error("{program} exited with status {}{}", exit_code_label(.code), tail_summary(.tail))]
    Exit {
        program: String,
        /// Exit code, `None` when terminated by a signal
        code: Option<i32>,
        /// Last `TAIL_LINES` lines of combined output
        tail: Vec<String>,
    },
}

fn exit_code_label(code: &Option<i32>) -> String {
    code.map_or_else(|| "signal".to_string(), |c| c.to_string())
}

fn tail_summary(tail: &[String]) -> String {
    tail.iter()
        .rev()
        .find(|line| !line.trim().is_empty())
        .map(|line| format!(": {}", line.trim()))
        .unwrap_or_default()
}

/// How a command is elevated.
#[derive(Clone, Default, PartialEq, Eq)]
pub enum Elevation {
    /// Run as the invoking user
    #[default]
    None,
    /// Run through `sudo`. With a credential the password is fed on stdin
    /// (`sudo -S`); without one sudo must not prompt (`sudo -n`).
    Sudo { credential: Option<String> },
}

impl Elevation {
    pub fn is_elevated(&self) -> bool {
        matches!(self, Self::Sudo { .. })
    }
}

// Never print the cached credential.
impl fmt::Debug for Elevation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => write!(f, "None"),
            Self::Sudo { credential: Some(_) } => write!(f, "Sudo(cached credential)"),
            Self::Sudo { credential: None } => write!(f, "Sudo(non-interactive)"),
        }
    }
}

/// A fully described external command.
#[derive(Debug, Clone, Default)]
pub struct CommandRequest {
    pub program: String,
    pub args: Vec<String>,
    pub elevation: Elevation,
    pub cwd: Option<PathBuf>,
    pub stdin: Option<String>,
}

impl CommandRequest {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            ..Self::default()
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn current_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.cwd = Some(dir.as_ref().to_path_buf());
        self
    }

    pub fn elevated(mut self, elevation: Elevation) -> Self {
        self.elevation = elevation;
        self
    }

    pub fn stdin(mut self, input: impl Into<String>) -> Self {
        self.stdin = Some(input.into());
        self
    }

    /// The argv actually executed, elevation wrapper included.
    pub fn argv(&self) -> Vec<String> {
        let mut argv = match &self.elevation {
            Elevation::None => Vec::new(),
            Elevation::Sudo { credential: Some(_) } => {
                vec!["sudo".into(), "-S".into(), "-p".into(), String::new()]
            }
            Elevation::Sudo { credential: None } => vec!["sudo".into(), "-n".into()],
        };
        argv.push(self.program.clone());
        argv.extend(self.args.iter().cloned());
        argv
    }

    /// Bytes written to the child's stdin: the sudo password line first, if any.
    pub fn stdin_payload(&self) -> Option<String> {
        match (&self.elevation, &self.stdin) {
            (Elevation::Sudo { credential: Some(secret) }, rest) => {
                Some(format!("{}\n{}", secret, rest.as_deref().unwrap_or_default()))
            }
            (_, rest) => rest.clone(),
        }
    }

    /// Human-readable command line for logs. Never contains the credential.
    pub fn display(&self) -> String {
        let prefix = if self.elevation.is_elevated() { "sudo " } else { "" };
        if self.args.is_empty() {
            format!("{}{}", prefix, self.program)
        } else {
            format!("{}{} {}", prefix, self.program, self.args.join(" "))
        }
    }
}

/// Destination for output lines.
///
/// Cheap to clone. The engine hands one to every step; tests use `collector`.
#[derive(Clone)]
pub struct LogSink {
    inner: Arc<dyn Fn(String) + Send + Sync>,
}

impl LogSink {
    pub fn new(f: impl Fn(String) + Send + Sync + 'static) -> Self {
        Self { inner: Arc::new(f) }
    }

    /// Forward lines into a bounded queue. Blocks while the queue is full; lines
    /// sent after the receiver hung up are dropped.
    pub fn channel(tx: SyncSender<String>) -> Self {
        Self::new(move |line| {
            let _ = tx.send(line);
        })
    }

    pub fn discard() -> Self {
        Self::new(|_| {})
    }

    /// In-memory sink, mostly for tests.
    pub fn collector() -> (Self, Arc<Mutex<Vec<String>>>) {
        let lines = Arc::new(Mutex::new(Vec::new()));
        let store = Arc::clone(&lines);
        let sink = Self::new(move |line| {
            if let Ok(mut guard) = store.lock() {
                guard.push(line);
            }
        });
        (sink, lines)
    }

    pub fn line(&self, line: impl Into<String>) {
        (self.inner)(line.into());
    }
}

impl fmt::Debug for LogSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("LogSink")
    }
}

/// Executes external commands on behalf of provisioning steps.
///
/// `SystemRunner` is the real implementation; tests substitute a recording fake.
pub trait CommandRunner: Send + Sync {
    /// Run `request` to completion, forwarding each output line to `sink` in
    /// arrival order. Returns once all output has been delivered.
    fn run(&self, sink: &LogSink, request: &CommandRequest) -> Result<(), CommandError>;

    /// Locate `program` on the search path.
    fn resolve(&self, program: &str) -> Option<PathBuf>;
}

/// Runs commands as real child processes.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemRunner;

impl SystemRunner {
    pub fn new() -> Self {
        Self
    }
}

impl CommandRunner for SystemRunner {
    fn run(&self, sink: &LogSink, request: &CommandRequest) -> Result<(), CommandError> {
        let argv = request.argv();
        let stdin = request.stdin_payload();
        let launch_error = |source| CommandError::Launch {
            program: request.program.clone(),
            source,
        };

        let mut command = Command::new(&argv[0]);
        command
            .args(&argv[1..])
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .stdin(if stdin.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            });
        if let Some(dir) = &request.cwd {
            command.current_dir(dir);
        }

        debug!(command = %request.display(), "spawning external command");
        let mut child = command.spawn().map_err(launch_error)?;

        if let (Some(input), Some(mut pipe)) = (stdin, child.stdin.take()) {
            // The child may exit without reading; a broken pipe here is not our failure.
            if let Err(e) = pipe.write_all(input.as_bytes()) {
                debug!("stdin for {} closed early: {}", request.program, e);
            }
        }

        let (tx, rx) = mpsc::sync_channel::<String>(LINE_QUEUE_CAPACITY);
        let mut readers = Vec::with_capacity(2);
        if let Some(stdout) = child.stdout.take() {
            readers.push(spawn_line_reader(stdout, tx.clone()));
        }
        if let Some(stderr) = child.stderr.take() {
            readers.push(spawn_line_reader(stderr, tx.clone()));
        }
        drop(tx);

        // Ends when both readers have hit EOF and dropped their senders.
        let mut tail = VecDeque::with_capacity(TAIL_LINES);
        for line in rx {
            if tail.len() == TAIL_LINES {
                tail.pop_front();
            }
            tail.push_back(line.clone());
            sink.line(line);
        }
        for reader in readers {
            let _ = reader.join();
        }

        let status = child.wait().map_err(launch_error)?;
        if status.success() {
            debug!("{} finished successfully", request.program);
            Ok(())
        } else {
            Err(CommandError::Exit {
                program: request.program.clone(),
                code: status.code(),
                tail: tail.into(),
            })
        }
    }

    fn resolve(&self, program: &str) -> Option<PathBuf> {
        which::which(program).ok()
    }
}

/// Forward `stream` line by line into `tx`. Invalid UTF-8 is replaced rather than
/// ending the stream, so the pipe is always drained.
fn spawn_line_reader<R: Read + Send + 'static>(stream: R, tx: SyncSender<String>) -> JoinHandle<()> {
    thread::spawn(move || {
        let mut reader = BufReader::new(stream);
        let mut buf = Vec::new();
        loop {
            buf.clear();
            match reader.read_until(b'\n', &mut buf) {
                Ok(0) => break,
                Ok(_) => {
                    let line = String::from_utf8_lossy(&buf)
                        .trim_end_matches(['\n', '\r'])
                        .to_string();
                    if tx.send(line).is_err() {
                        break;
                    }
                }
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(_) => break,
            }
        }
    })
}
