//! Shared fixtures for the integration tests.
//!
//! `RecordingRunner` stands in for the system: it records every request, answers
//! sudo the way a real sudo with one known password would, and fakes the side
//! effects (cloned checkouts, built packages) that later steps look for.

#![allow(dead_code)]

use dotwizard::blueprint::Blueprint;
use dotwizard::command_runner::{CommandError, CommandRequest, CommandRunner, Elevation, LogSink};
use dotwizard::engine::{event_channels, InstallationEngine, PipelineResult, ProgressEvent};
use dotwizard::privilege::{PrivilegeSession, SessionMode};
use dotwizard::syncer::FileSyncer;
use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::mpsc::RecvTimeoutError;
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const PASSWORD: &str = "correct horse";

type FailurePredicate = Box<dyn Fn(&CommandRequest) -> bool + Send + Sync>;

pub struct RecordingRunner {
    password: String,
    passwordless: bool,
    installed: Mutex<HashSet<String>>,
    failures: Mutex<Vec<FailurePredicate>>,
    /// Files created by `git clone <url> <dest>`, keyed by URL
    checkouts: Mutex<HashMap<String, Vec<(String, String)>>>,
    requests: Mutex<Vec<CommandRequest>>,
}

impl RecordingRunner {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::build(false))
    }

    pub fn passwordless() -> Arc<Self> {
        Arc::new(Self::build(true))
    }

    fn build(passwordless: bool) -> Self {
        Self {
            password: PASSWORD.to_string(),
            passwordless,
            installed: Mutex::new(HashSet::new()),
            failures: Mutex::new(Vec::new()),
            checkouts: Mutex::new(HashMap::new()),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Make `program` resolvable on the fake search path.
    pub fn install(&self, program: &str) {
        self.installed.lock().unwrap().insert(program.to_string());
    }

    /// Fail every request matching `predicate` with exit status 1.
    pub fn fail_when(&self, predicate: impl Fn(&CommandRequest) -> bool + Send + Sync + 'static) {
        self.failures.lock().unwrap().push(Box::new(predicate));
    }

    /// Files (relative path, content) a clone of `url` produces.
    pub fn checkout(&self, url: &str, files: &[(&str, &str)]) {
        self.checkouts.lock().unwrap().insert(
            url.to_string(),
            files
                .iter()
                .map(|(path, content)| (path.to_string(), content.to_string()))
                .collect(),
        );
    }

    pub fn requests(&self) -> Vec<CommandRequest> {
        self.requests.lock().unwrap().clone()
    }

    /// Display form of every request except the session's own sudo bookkeeping.
    pub fn commands(&self) -> Vec<String> {
        self.requests()
            .iter()
            .filter(|r| r.program != "sudo")
            .map(CommandRequest::display)
            .collect()
    }

    pub fn ran(&self, program: &str) -> bool {
        self.requests().iter().any(|r| r.program == program)
    }

    fn exit(program: &str, message: &str) -> CommandError {
        CommandError::Exit {
            program: program.to_string(),
            code: Some(1),
            tail: vec![message.to_string()],
        }
    }

    fn answer_sudo(&self, request: &CommandRequest) -> Result<(), CommandError> {
        let args: Vec<&str> = request.args.iter().map(String::as_str).collect();
        if args.contains(&"-v") {
            let expected = format!("{}\n", self.password);
            return if request.stdin.as_deref() == Some(expected.as_str()) {
                Ok(())
            } else {
                Err(Self::exit("sudo", "Sorry, try again."))
            };
        }
        if args == ["-n", "true"] && !self.passwordless {
            return Err(Self::exit("sudo", "sudo: a password is required"));
        }
        Ok(())
    }

    fn fake_side_effects(&self, request: &CommandRequest) -> Result<(), CommandError> {
        let write_err = |e: std::io::Error| CommandError::Launch {
            program: request.program.clone(),
            source: e,
        };

        if request.program == "git" && request.args.first().map(String::as_str) == Some("clone") {
            let (Some(url), Some(dest)) = (request.args.get(3), request.args.last()) else {
                return Ok(());
            };
            let dest = PathBuf::from(dest);
            fs::create_dir_all(&dest).map_err(write_err)?;
            if let Some(files) = self.checkouts.lock().unwrap().get(url) {
                for (rel, content) in files {
                    let path = dest.join(rel);
                    fs::create_dir_all(path.parent().unwrap()).map_err(write_err)?;
                    fs::write(&path, content).map_err(write_err)?;
                }
            }
        }

        if request.program == "makepkg" {
            if let Some(dir) = &request.cwd {
                let name = dir.file_name().unwrap().to_string_lossy().into_owned();
                fs::write(dir.join(format!("{}-debug-1.0-1-x86_64.pkg.tar.zst", name)), b"")
                    .map_err(write_err)?;
                fs::write(dir.join(format!("{}-1.0-1-x86_64.pkg.tar.zst", name)), b"")
                    .map_err(write_err)?;
            }
        }
        Ok(())
    }
}

impl CommandRunner for RecordingRunner {
    fn run(&self, sink: &LogSink, request: &CommandRequest) -> Result<(), CommandError> {
        self.requests.lock().unwrap().push(request.clone());

        if request.program == "sudo" {
            return self.answer_sudo(request);
        }
        if let Elevation::Sudo { credential } = &request.elevation {
            let accepted = match credential {
                Some(secret) => *secret == self.password,
                None => self.passwordless,
            };
            if !accepted {
                return Err(Self::exit(&request.program, "sudo: authentication failed"));
            }
        }

        sink.line(format!("$ {}", request.display()));
        if self.failures.lock().unwrap().iter().any(|fails| fails(request)) {
            sink.line("simulated failure");
            return Err(Self::exit(&request.program, "simulated failure"));
        }
        self.fake_side_effects(request)
    }

    fn resolve(&self, program: &str) -> Option<PathBuf> {
        self.installed
            .lock()
            .unwrap()
            .contains(program)
            .then(|| PathBuf::from("/usr/bin").join(program))
    }
}

/// Everything a pipeline run emitted.
pub struct RunOutcome {
    pub result: PipelineResult,
    pub progress: Vec<ProgressEvent>,
    pub logs: Vec<String>,
}

impl RunOutcome {
    pub fn logged(&self, needle: &str) -> bool {
        self.logs.iter().any(|line| line.contains(needle))
    }
}

pub fn session(runner: &Arc<RecordingRunner>, mode: SessionMode) -> PrivilegeSession {
    PrivilegeSession::with_refresh_interval(
        Arc::clone(runner) as Arc<dyn CommandRunner>,
        mode,
        Duration::from_secs(3600),
    )
}

/// Run the pipeline on its thread while draining its queues like the UI loop does.
/// Small queues make the engine block on a slow consumer at least once.
pub fn run_engine(
    blueprint: Blueprint,
    runner: &Arc<RecordingRunner>,
    session: PrivilegeSession,
    home: &Path,
    credential: Option<&str>,
) -> RunOutcome {
    let (senders, receivers) = event_channels(4);
    let engine = InstallationEngine::new(
        Arc::new(blueprint),
        session,
        Arc::clone(runner) as Arc<dyn CommandRunner>,
        FileSyncer::with_home(home),
        senders,
    );
    let handle = engine
        .spawn(credential.map(str::to_string))
        .expect("spawn pipeline");

    let mut progress = Vec::new();
    let mut logs = Vec::new();
    let result = loop {
        progress.extend(receivers.progress.try_iter());
        logs.extend(receivers.logs.try_iter());
        match handle.done.recv_timeout(Duration::from_millis(5)) {
            Ok(result) => break result,
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => panic!("pipeline thread vanished"),
        }
    };
    progress.extend(receivers.progress.try_iter());
    logs.extend(receivers.logs.try_iter());

    RunOutcome {
        result,
        progress,
        logs,
    }
}

/// Parse a blueprint, panicking on invalid fixtures.
pub fn blueprint(yaml: &str) -> Blueprint {
    Blueprint::from_yaml_str(yaml).expect("valid blueprint fixture")
}
