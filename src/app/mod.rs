//! Application loop
//!
//! Owns the terminal-facing side of the wizard: reads keys, feeds them to the pure
//! `Wizard`, performs the actions it asks for, and drains the pipeline's queues on
//! every tick.

pub mod state;
pub mod terminal;

use crate::blueprint::Blueprint;
use crate::command_runner::CommandRunner;
use crate::engine::{
    event_channels, EventReceivers, InstallationEngine, PipelineHandle, PipelineResult,
    EVENT_QUEUE_CAPACITY,
};
use crate::error::{ProvisionError, Result};
use crate::input::map_key;
use crate::privilege::PrivilegeSession;
use crate::syncer::FileSyncer;
use crate::ui::UiRenderer;
use crossterm::event::Event;
use state::{Wizard, WizardAction};
use std::sync::mpsc::{self, Receiver, TryRecvError};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use terminal::Tui;
use tracing::{debug, error, info, warn};

/// Input poll interval of the foreground loop.
pub const TICK: Duration = Duration::from_millis(50);

/// Pipeline started from the wizard, with the receiving ends of its queues.
struct RunningPipeline {
    handle: PipelineHandle,
    events: EventReceivers,
}

pub struct App {
    wizard: Wizard,
    session: PrivilegeSession,
    runner: Arc<dyn CommandRunner>,
    syncer: FileSyncer,
    renderer: UiRenderer,
    verification: Option<Receiver<std::result::Result<(), String>>>,
    pipeline: Option<RunningPipeline>,
}

impl App {
    pub fn new(
        blueprint: Blueprint,
        session: PrivilegeSession,
        runner: Arc<dyn CommandRunner>,
        syncer: FileSyncer,
    ) -> Self {
        let wizard = Wizard::new(blueprint, session.requires_credential());
        Self {
            wizard,
            session,
            runner,
            syncer,
            renderer: UiRenderer::new(),
            verification: None,
            pipeline: None,
        }
    }

    pub fn wizard(&self) -> &Wizard {
        &self.wizard
    }

    /// Run the main application loop until the user quits.
    pub fn run(&mut self, terminal: &mut Tui) -> Result<()> {
        info!("Starting main application loop");

        loop {
            self.poll_verification()?;
            self.poll_pipeline();

            terminal
                .draw(|f| self.renderer.render(f, &self.wizard))
                .map_err(|e| ProvisionError::terminal(format!("draw failed: {}", e)))?;

            if crossterm::event::poll(TICK)? {
                match crossterm::event::read()? {
                    Event::Key(key_event) => {
                        let Some(input) = map_key(key_event, &self.wizard.state()) else {
                            continue;
                        };
                        let action = self.wizard.handle(input);
                        if self.apply(action)? {
                            break;
                        }
                    }
                    Event::Resize(width, height) => {
                        debug!("terminal resized to {}x{}", width, height);
                    }
                    _ => {}
                }
            }
        }

        self.shutdown();
        Ok(())
    }

    /// Carry out a wizard action. Returns `true` when the app should exit.
    fn apply(&mut self, action: WizardAction) -> Result<bool> {
        match action {
            WizardAction::None => Ok(false),
            WizardAction::Quit => Ok(true),
            WizardAction::VerifyCredential(credential) => {
                self.spawn_verification(credential)?;
                Ok(false)
            }
            WizardAction::StartPipeline { credential } => {
                self.start_pipeline(credential)?;
                Ok(false)
            }
        }
    }

    /// Check the password on a worker thread so the UI keeps drawing.
    fn spawn_verification(&mut self, credential: String) -> Result<()> {
        let (tx, rx) = mpsc::sync_channel(1);
        let session = self.session.clone();
        thread::Builder::new()
            .name("verify-credential".into())
            .spawn(move || {
                let outcome = session.verify(&credential).map_err(|e| e.to_string());
                let _ = tx.send(outcome);
            })?;
        self.verification = Some(rx);
        Ok(())
    }

    fn poll_verification(&mut self) -> Result<()> {
        let Some(rx) = &self.verification else {
            return Ok(());
        };
        let outcome = match rx.try_recv() {
            Ok(outcome) => outcome,
            Err(TryRecvError::Empty) => return Ok(()),
            Err(TryRecvError::Disconnected) => Err("verification thread exited".to_string()),
        };
        self.verification = None;

        if let Err(e) = &outcome {
            warn!("credential rejected: {}", e);
        }
        let action = self.wizard.on_verification(outcome);
        self.apply(action).map(|_| ())
    }

    fn start_pipeline(&mut self, credential: Option<String>) -> Result<()> {
        let (senders, receivers) = event_channels(EVENT_QUEUE_CAPACITY);
        let engine = InstallationEngine::new(
            self.wizard.frozen_blueprint(),
            self.session.clone(),
            Arc::clone(&self.runner),
            self.syncer.clone(),
            senders,
        );
        let handle = engine.spawn(credential)?;
        info!("pipeline started");
        self.pipeline = Some(RunningPipeline {
            handle,
            events: receivers,
        });
        Ok(())
    }

    fn poll_pipeline(&mut self) {
        let Some(running) = &self.pipeline else {
            return;
        };
        if drain_pipeline(&mut self.wizard, &running.events, &running.handle.done) {
            self.pipeline = None;
        }
    }

    fn shutdown(&mut self) {
        if self.pipeline.as_ref().is_some_and(|p| !p.handle.is_finished()) {
            warn!("exiting while the pipeline is still running");
        }
        self.session.stop();
    }
}

/// Feed queued pipeline events to the wizard: progress, then logs, then the outcome.
/// Both queues are drained again before the outcome is applied so no output is lost
/// behind it. Returns `true` once the pipeline is over.
pub fn drain_pipeline(
    wizard: &mut Wizard,
    events: &EventReceivers,
    done: &Receiver<PipelineResult>,
) -> bool {
    drain_events(wizard, events);

    let outcome = match done.try_recv() {
        Ok(outcome) => outcome,
        Err(TryRecvError::Empty) => return false,
        Err(TryRecvError::Disconnected) => {
            error!("pipeline thread exited without reporting");
            return true;
        }
    };

    drain_events(wizard, events);
    match &outcome {
        Ok(()) => info!("pipeline finished"),
        Err(e) => error!("pipeline failed: {}", e),
    }
    wizard.on_finished(outcome);
    true
}

fn drain_events(wizard: &mut Wizard, events: &EventReceivers) {
    while let Ok(event) = events.progress.try_recv() {
        wizard.on_progress(event);
    }
    while let Ok(line) = events.logs.try_recv() {
        wizard.on_log(line);
    }
}
