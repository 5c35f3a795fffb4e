//! Engine modules: the pipeline that turns a confirmed blueprint into a provisioned
//! system.
//!
//! `InstallationEngine::run` walks the phases of `install_state::Phase` in order,
//! executing one `ProvisioningStep` per phase and reporting progress and output on
//! bounded queues. The UI owns the receiving ends.
//!
//! # Threads
//!
//! ```text
//! UI loop ──spawn──> "provision" thread ──> CommandRunner (reader threads per command)
//!    ^                      │
//!    └── progress / logs / done queues
//! ```

pub mod dotfiles;
pub mod helper;
pub mod packages;
pub mod scripts;
pub mod steps;
pub mod system;

use crate::blueprint::Blueprint;
use crate::command_runner::{CommandRunner, LogSink};
use crate::error::ProvisionError;
use crate::install_state::{InstallerContext, Phase};
use crate::privilege::PrivilegeSession;
use crate::syncer::FileSyncer;
use std::cell::Cell;
use std::sync::Arc;
use std::sync::mpsc::{self, Receiver, SyncSender};
use std::thread::{self, JoinHandle};
use steps::{ProvisioningStep, StepContext};
use thiserror::Error;
use tracing::{error, info};

pub use steps::ConfigAction;

/// Default capacity of the progress and log queues.
pub const EVENT_QUEUE_CAPACITY: usize = 512;

/// A coarse milestone of a run.
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressEvent {
    /// Fraction complete, in `[0, 1]`
    pub percent: f32,
    pub label: String,
}

/// First fatal failure of a run and the phase it happened in.
#[derive(Error, Debug)]
#[error("{phase}: {source}")]
pub struct PipelineError {
    pub phase: Phase,
    #[source]
    pub source: ProvisionError,
}

pub type PipelineResult = std::result::Result<(), PipelineError>;

/// Sending half of the engine's event queues.
#[derive(Debug, Clone)]
pub struct EventSenders {
    progress: SyncSender<ProgressEvent>,
    logs: SyncSender<String>,
}

/// Receiving half, owned by whoever renders the run.
#[derive(Debug)]
pub struct EventReceivers {
    pub progress: Receiver<ProgressEvent>,
    pub logs: Receiver<String>,
}

/// Bounded progress and log queues. A full queue blocks the pipeline until the
/// consumer catches up.
pub fn event_channels(capacity: usize) -> (EventSenders, EventReceivers) {
    let (progress_tx, progress_rx) = mpsc::sync_channel(capacity);
    let (logs_tx, logs_rx) = mpsc::sync_channel(capacity);
    (
        EventSenders {
            progress: progress_tx,
            logs: logs_tx,
        },
        EventReceivers {
            progress: progress_rx,
            logs: logs_rx,
        },
    )
}

/// A pipeline running on its own thread.
#[derive(Debug)]
pub struct PipelineHandle {
    /// Receives exactly one outcome when the run ends
    pub done: Receiver<PipelineResult>,
    thread: JoinHandle<()>,
}

impl PipelineHandle {
    pub fn is_finished(&self) -> bool {
        self.thread.is_finished()
    }
}

pub struct InstallationEngine {
    blueprint: Arc<Blueprint>,
    session: PrivilegeSession,
    runner: Arc<dyn CommandRunner>,
    syncer: FileSyncer,
    events: EventSenders,
    log: LogSink,
    last_percent: Cell<f32>,
}

impl InstallationEngine {
    pub fn new(
        blueprint: Arc<Blueprint>,
        session: PrivilegeSession,
        runner: Arc<dyn CommandRunner>,
        syncer: FileSyncer,
        events: EventSenders,
    ) -> Self {
        let log = LogSink::channel(events.logs.clone());
        Self {
            blueprint,
            session,
            runner,
            syncer,
            events,
            log,
            last_percent: Cell::new(0.0),
        }
    }

    /// Run the pipeline on a background thread.
    pub fn spawn(self, credential: Option<String>) -> std::io::Result<PipelineHandle> {
        let (done_tx, done_rx) = mpsc::sync_channel(1);
        let thread = thread::Builder::new()
            .name("provision".into())
            .spawn(move || {
                let result = self.run(credential);
                let _ = done_tx.send(result);
            })?;
        Ok(PipelineHandle {
            done: done_rx,
            thread,
        })
    }

    /// Run every phase in order, stopping at the first fatal failure. The privilege
    /// session is torn down before this returns, whatever the outcome.
    pub fn run(&self, credential: Option<String>) -> PipelineResult {
        let mut ctx = InstallerContext::new();
        let _session = self.session.guard();
        self.last_percent.set(0.0);

        info!("Provisioning started");
        self.progress(Phase::Authenticating.checkpoint(), "Authenticating...");
        if let Err(e) = self.authenticate(credential) {
            return Err(self.fail(&mut ctx, e));
        }

        let progress = |percent: f32, label: &str| self.progress(percent, label);
        let step_ctx = StepContext {
            blueprint: &self.blueprint,
            session: &self.session,
            runner: self.runner.as_ref(),
            syncer: &self.syncer,
            log: &self.log,
            progress: &progress,
        };

        for step in ProvisioningStep::plan(&self.blueprint) {
            let phase = step.phase();
            if let Err(e) = ctx.transition_to(phase) {
                return Err(self.fail(&mut ctx, ProvisionError::step(e.to_string())));
            }
            info!("Entering phase: {}", phase);
            self.progress(phase.checkpoint(), &step.label());
            if let Err(e) = step.execute(&step_ctx) {
                return Err(self.fail(&mut ctx, e));
            }
        }

        if let Err(e) = ctx.transition_to(Phase::Complete) {
            return Err(self.fail(&mut ctx, ProvisionError::step(e.to_string())));
        }
        self.progress(Phase::Complete.checkpoint(), "Installation Complete!");
        info!("Provisioning finished");
        Ok(())
    }

    fn authenticate(&self, credential: Option<String>) -> crate::error::Result<()> {
        if !self.session.requires_credential() {
            return self.session.start("");
        }
        match credential {
            Some(secret) => self.session.start(&secret),
            None => Err(ProvisionError::authentication("no password supplied")),
        }
    }

    fn fail(&self, ctx: &mut InstallerContext, source: ProvisionError) -> PipelineError {
        let phase = ctx.fail().unwrap_or(ctx.current_phase());
        error!("Provisioning failed during {}: {}", phase, source);
        PipelineError { phase, source }
    }

    /// Emit a checkpoint. Percentages never go backwards within a run.
    fn progress(&self, percent: f32, label: &str) {
        let percent = percent.clamp(0.0, 1.0).max(self.last_percent.get());
        self.last_percent.set(percent);
        let _ = self.events.progress.send(ProgressEvent {
            percent,
            label: label.to_string(),
        });
    }
}
