//! privilege.rs - Elevated-credential session shared by every privileged step.
//!
//! A `PrivilegeSession` is constructed once by the top-level orchestrator and passed
//! explicitly to whatever needs elevation. Cloning the handle shares the same
//! underlying session.
//!
//! In `Password` mode the session validates a sudo password, caches it, and keeps
//! the sudo timestamp warm with a single background refresher thread. In
//! `Passwordless` mode elevation is assumed to be pre-authorised (for example by
//! the `--root-setup` drop-in) and every elevated command runs with `sudo -n`.

use crate::command_runner::{CommandRequest, CommandRunner, Elevation, LogSink};
use crate::error::{ProvisionError, Result};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Default interval between background `sudo -v` refreshes.
pub const DEFAULT_REFRESH_INTERVAL: Duration = Duration::from_secs(240);

/// How elevation is obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionMode {
    /// Ask for the sudo password and cache it for the run
    #[default]
    Password,
    /// Elevation is pre-authorised; never prompt
    Passwordless,
}

/// Handle to the process-wide privilege session.
#[derive(Clone)]
pub struct PrivilegeSession {
    inner: Arc<SessionInner>,
}

struct SessionInner {
    runner: Arc<dyn CommandRunner>,
    mode: SessionMode,
    refresh_interval: Duration,
    state: Mutex<SessionState>,
    refreshers_spawned: AtomicUsize,
}

#[derive(Default)]
struct SessionState {
    active: bool,
    credential: Option<String>,
    refresher: Option<Refresher>,
}

struct Refresher {
    stop_tx: Sender<()>,
    handle: Option<JoinHandle<()>>,
}

impl PrivilegeSession {
    pub fn new(runner: Arc<dyn CommandRunner>, mode: SessionMode) -> Self {
        Self::with_refresh_interval(runner, mode, DEFAULT_REFRESH_INTERVAL)
    }

    pub fn with_refresh_interval(
        runner: Arc<dyn CommandRunner>,
        mode: SessionMode,
        refresh_interval: Duration,
    ) -> Self {
        Self {
            inner: Arc::new(SessionInner {
                runner,
                mode,
                refresh_interval,
                state: Mutex::new(SessionState::default()),
                refreshers_spawned: AtomicUsize::new(0),
            }),
        }
    }

    pub fn mode(&self) -> SessionMode {
        self.inner.mode
    }

    /// Whether the wizard has to ask for a password before installing.
    pub fn requires_credential(&self) -> bool {
        self.inner.mode == SessionMode::Password
    }

    pub fn is_active(&self) -> bool {
        match self.inner.mode {
            SessionMode::Passwordless => true,
            SessionMode::Password => self.inner.lock_state().active,
        }
    }

    /// Number of refresher threads ever spawned by this session.
    pub fn refreshers_spawned(&self) -> usize {
        self.inner.refreshers_spawned.load(Ordering::SeqCst)
    }

    /// Check a credential without touching session state.
    pub fn verify(&self, credential: &str) -> Result<()> {
        match self.inner.mode {
            SessionMode::Passwordless => self.probe(),
            SessionMode::Password => self.inner.validate(credential),
        }
    }

    /// Verify that `sudo -n` works without a password.
    pub fn probe(&self) -> Result<()> {
        let request = CommandRequest::new("sudo").args(["-n", "true"]);
        self.inner
            .runner
            .run(&LogSink::discard(), &request)
            .map_err(|e| {
                ProvisionError::authentication(format!("passwordless sudo is not available ({})", e))
            })
    }

    /// Validate `credential` and activate the session.
    ///
    /// Calling this while already active re-validates and replaces the cached
    /// credential; the existing refresher keeps running.
    pub fn start(&self, credential: &str) -> Result<()> {
        if self.inner.mode == SessionMode::Passwordless {
            return Ok(());
        }

        self.inner.validate(credential)?;

        let mut state = self.inner.lock_state();
        state.credential = Some(credential.to_string());
        state.active = true;
        if state.refresher.is_none() {
            state.refresher = Some(spawn_refresher(&self.inner));
            self.inner.refreshers_spawned.fetch_add(1, Ordering::SeqCst);
        }
        info!("Privilege session started");
        Ok(())
    }

    /// End the session. Safe to call any number of times.
    pub fn stop(&self) {
        if self.inner.mode == SessionMode::Passwordless {
            return;
        }

        let (refresher, credential) = {
            let mut state = self.inner.lock_state();
            if !state.active {
                return;
            }
            state.active = false;
            (state.refresher.take(), state.credential.take())
        };

        // Lock released: the refresher may be waiting on it.
        if let Some(refresher) = refresher {
            let _ = refresher.stop_tx.send(());
            if let Some(handle) = refresher.handle {
                if handle.join().is_err() {
                    warn!("Privilege refresher thread panicked");
                }
            }
        }
        if let Some(mut secret) = credential {
            scrub(&mut secret);
        }

        let reset = CommandRequest::new("sudo").arg("-k");
        if let Err(e) = self.inner.runner.run(&LogSink::discard(), &reset) {
            debug!("sudo -k failed: {}", e);
        }
        info!("Privilege session stopped");
    }

    /// Run `program args…` with elevation, streaming output to `sink`.
    pub fn run_elevated<I, S>(&self, sink: &LogSink, program: &str, args: I) -> Result<()>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let elevation = match self.inner.mode {
            SessionMode::Passwordless => Elevation::Sudo { credential: None },
            SessionMode::Password => {
                let state = self.inner.lock_state();
                match &state.credential {
                    Some(secret) if state.active => Elevation::Sudo {
                        credential: Some(secret.clone()),
                    },
                    _ => return Err(ProvisionError::SessionNotActive),
                }
            }
        };

        let request = CommandRequest::new(program).args(args).elevated(elevation);
        self.inner.runner.run(sink, &request)?;
        Ok(())
    }

    /// Guard that stops the session when dropped.
    pub fn guard(&self) -> SessionGuard {
        SessionGuard {
            session: self.clone(),
        }
    }
}

impl std::fmt::Debug for PrivilegeSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PrivilegeSession")
            .field("mode", &self.inner.mode)
            .field("active", &self.is_active())
            .finish()
    }
}

impl SessionInner {
    fn lock_state(&self) -> MutexGuard<'_, SessionState> {
        // A poisoned lock only means a panic elsewhere; the state itself is plain data.
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn validate(&self, credential: &str) -> Result<()> {
        let request = CommandRequest::new("sudo")
            .args(["-S", "-p", "", "-k", "-v"])
            .stdin(format!("{}\n", credential));
        self.runner
            .run(&LogSink::discard(), &request)
            .map_err(|e| ProvisionError::authentication(e.to_string()))
    }

    /// One `sudo -v` with the cached credential. The lock is not held while sudo runs.
    fn refresh(&self) {
        let mut request = {
            let state = self.lock_state();
            let Some(secret) = state.credential.as_deref() else {
                return;
            };
            refresh_request(secret)
        };
        match self.runner.run(&LogSink::discard(), &request) {
            Ok(()) => debug!("sudo timestamp refreshed"),
            Err(e) => warn!("sudo refresh failed: {}", e),
        }
        if let Some(payload) = request.stdin.as_mut() {
            scrub(payload);
        }
    }
}

/// Guard that ends the privilege session on every exit path.
pub struct SessionGuard {
    session: PrivilegeSession,
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        self.session.stop();
    }
}

fn spawn_refresher(inner: &Arc<SessionInner>) -> Refresher {
    let (stop_tx, stop_rx) = mpsc::channel::<()>();
    let weak: Weak<SessionInner> = Arc::downgrade(inner);
    let interval = inner.refresh_interval;

    let handle = thread::Builder::new()
        .name("sudo-refresh".into())
        .spawn(move || {
            loop {
                match stop_rx.recv_timeout(interval) {
                    Err(RecvTimeoutError::Timeout) => match weak.upgrade() {
                        Some(inner) => inner.refresh(),
                        None => break,
                    },
                    Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                }
            }
        });

    // Without a refresher the session still works until sudo's own timeout.
    let handle = handle
        .inspect_err(|e| warn!("could not spawn sudo refresher: {}", e))
        .ok();
    Refresher { stop_tx, handle }
}

fn refresh_request(secret: &str) -> CommandRequest {
    CommandRequest::new("sudo")
        .args(["-S", "-p", "", "-v"])
        .stdin(format!("{}\n", secret))
}

/// Overwrite the secret's bytes in place. The allocation is reused, so no copy
/// of the plaintext survives in it.
fn scrub(secret: &mut String) {
    let mut bytes = std::mem::take(secret).into_bytes();
    bytes.fill(0);
    std::hint::black_box(&bytes);
    *secret = String::from_utf8(bytes).unwrap_or_default();
}
