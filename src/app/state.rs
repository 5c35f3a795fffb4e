//! Wizard state machine
//!
//! Pure state: no terminal, no threads. `App` feeds it mapped key input and pipeline
//! events and carries out the `WizardAction`s it returns, which keeps every
//! transition testable without a TTY.
//!
//! # State Transitions
//!
//! ```text
//! Welcome -> Selection{0..n} -> Confirmation -> [Authenticating] -> Installing -> Done
//!               ^   |               |
//!               └───┴──── Back ─────┘
//! ```

use crate::blueprint::{Blueprint, StepKind};
use crate::engine::{PipelineResult, ProgressEvent};
use std::sync::Arc;

/// Where the user is in the wizard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WizardState {
    #[default]
    Welcome,
    Selection { step: usize },
    Confirmation,
    /// Masked password entry, only when elevation needs a credential
    Authenticating,
    Installing,
    Done,
}

impl WizardState {
    pub fn title(&self) -> &'static str {
        match self {
            Self::Welcome => "Welcome",
            Self::Selection { .. } => "Configuration",
            Self::Confirmation => "Summary of Changes",
            Self::Authenticating => "Authentication Required",
            Self::Installing => "Installing",
            Self::Done => "Installation Complete",
        }
    }
}

/// Input after key mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WizardInput {
    Up,
    Down,
    Toggle,
    Confirm,
    Back,
    ToggleLogs,
    Char(char),
    Backspace,
    Interrupt,
}

/// Side effect requested by a transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WizardAction {
    None,
    Quit,
    /// Check the password off the UI thread, then call `on_verification`
    VerifyCredential(String),
    /// Freeze the blueprint and start the pipeline
    StartPipeline { credential: Option<String> },
}

pub const HELPER_REQUIRED_NOTICE: &str = "Select an AUR helper to continue";
pub const WRONG_PASSWORD_NOTICE: &str = "Incorrect password, try again";
pub const EMPTY_PASSWORD_NOTICE: &str = "Password cannot be empty";

#[derive(Debug, Clone)]
pub struct Wizard {
    blueprint: Blueprint,
    state: WizardState,
    requires_credential: bool,
    /// Highlighted item of the current selection step
    cursor: usize,
    notice: Option<String>,
    password: String,
    verifying: bool,
    progress: f32,
    status: String,
    logs: Vec<String>,
    show_logs: bool,
    /// Lines scrolled up from the bottom of the log panel
    log_scroll: usize,
    failure: Option<String>,
}

impl Wizard {
    pub fn new(blueprint: Blueprint, requires_credential: bool) -> Self {
        Self {
            blueprint,
            state: WizardState::Welcome,
            requires_credential,
            cursor: 0,
            notice: None,
            password: String::new(),
            verifying: false,
            progress: 0.0,
            status: String::new(),
            logs: Vec::new(),
            show_logs: false,
            log_scroll: 0,
            failure: None,
        }
    }

    pub fn state(&self) -> WizardState {
        self.state
    }

    pub fn blueprint(&self) -> &Blueprint {
        &self.blueprint
    }

    /// Snapshot handed to the pipeline; later edits never reach it.
    pub fn frozen_blueprint(&self) -> Arc<Blueprint> {
        Arc::new(self.blueprint.clone())
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn notice(&self) -> Option<&str> {
        self.notice.as_deref()
    }

    pub fn masked_password(&self) -> String {
        "•".repeat(self.password.chars().count())
    }

    pub fn is_verifying(&self) -> bool {
        self.verifying
    }

    pub fn progress(&self) -> f32 {
        self.progress
    }

    pub fn status(&self) -> &str {
        &self.status
    }

    pub fn logs(&self) -> &[String] {
        &self.logs
    }

    pub fn show_logs(&self) -> bool {
        self.show_logs
    }

    pub fn log_scroll(&self) -> usize {
        self.log_scroll
    }

    pub fn failure(&self) -> Option<&str> {
        self.failure.as_deref()
    }

    /// Helper name followed by every selected item, as listed on the summary screen.
    pub fn summary(&self) -> Vec<String> {
        let mut lines = vec![format!("{} (AUR Helper)", self.blueprint.helper())];
        lines.extend(
            self.blueprint
                .selected_items()
                .filter(|(step, _)| step.kind() != StepKind::Helper)
                .map(|(_, item)| item.name.clone()),
        );
        lines
    }

    pub fn handle(&mut self, input: WizardInput) -> WizardAction {
        if input == WizardInput::Interrupt {
            return WizardAction::Quit;
        }

        match self.state {
            WizardState::Welcome => self.handle_welcome(input),
            WizardState::Selection { step } => self.handle_selection(step, input),
            WizardState::Confirmation => self.handle_confirmation(input),
            WizardState::Authenticating => self.handle_authenticating(input),
            WizardState::Installing => self.handle_installing(input),
            WizardState::Done => match input {
                WizardInput::Confirm => WizardAction::Quit,
                _ => WizardAction::None,
            },
        }
    }

    fn handle_welcome(&mut self, input: WizardInput) -> WizardAction {
        if input == WizardInput::Confirm {
            self.enter_step(0);
        }
        WizardAction::None
    }

    fn handle_selection(&mut self, step: usize, input: WizardInput) -> WizardAction {
        let item_count = self.blueprint.steps.get(step).map_or(0, |s| s.items.len());
        match input {
            WizardInput::Up => {
                self.cursor = self.cursor.saturating_sub(1);
            }
            WizardInput::Down => {
                if self.cursor + 1 < item_count {
                    self.cursor += 1;
                }
            }
            WizardInput::Toggle => {
                if let Some(current) = self.blueprint.steps.get_mut(step) {
                    current.toggle(self.cursor);
                    self.notice = None;
                }
            }
            WizardInput::Confirm => self.advance_from(step),
            WizardInput::Back => {
                self.notice = None;
                if step == 0 {
                    self.state = WizardState::Welcome;
                } else {
                    self.enter_step(step - 1);
                }
            }
            _ => {}
        }
        WizardAction::None
    }

    /// Leave selection step `step`, enforcing the mandatory helper choice.
    fn advance_from(&mut self, step: usize) {
        let Some(current) = self.blueprint.steps.get(step) else {
            self.state = WizardState::Confirmation;
            return;
        };

        if current.kind() == StepKind::Helper {
            let Some(chosen) = current.selected_items().next().map(|item| item.name.clone()) else {
                self.notice = Some(HELPER_REQUIRED_NOTICE.to_string());
                return;
            };
            self.blueprint.settings.helper = chosen;
        }

        self.notice = None;
        self.enter_step(step + 1);
    }

    /// Show selection step `step`, or the summary once past the last one.
    fn enter_step(&mut self, step: usize) {
        self.cursor = 0;
        self.state = if step < self.blueprint.steps.len() {
            WizardState::Selection { step }
        } else {
            WizardState::Confirmation
        };
    }

    fn handle_confirmation(&mut self, input: WizardInput) -> WizardAction {
        match input {
            WizardInput::Confirm if self.requires_credential => {
                self.password.clear();
                self.notice = None;
                self.state = WizardState::Authenticating;
                WizardAction::None
            }
            WizardInput::Confirm => self.begin_installing(None),
            WizardInput::Back => {
                match self.blueprint.steps.len() {
                    0 => self.state = WizardState::Welcome,
                    n => self.enter_step(n - 1),
                }
                WizardAction::None
            }
            _ => WizardAction::None,
        }
    }

    fn handle_authenticating(&mut self, input: WizardInput) -> WizardAction {
        if self.verifying {
            return WizardAction::None;
        }
        match input {
            WizardInput::Char(c) => {
                self.password.push(c);
                WizardAction::None
            }
            WizardInput::Backspace => {
                self.password.pop();
                WizardAction::None
            }
            WizardInput::Confirm if self.password.is_empty() => {
                self.notice = Some(EMPTY_PASSWORD_NOTICE.to_string());
                WizardAction::None
            }
            WizardInput::Confirm => {
                self.verifying = true;
                self.notice = None;
                WizardAction::VerifyCredential(self.password.clone())
            }
            WizardInput::Back => {
                self.password.clear();
                self.notice = None;
                self.state = WizardState::Confirmation;
                WizardAction::None
            }
            _ => WizardAction::None,
        }
    }

    /// Outcome of a `VerifyCredential` request.
    pub fn on_verification(&mut self, result: Result<(), String>) -> WizardAction {
        if self.state != WizardState::Authenticating || !self.verifying {
            return WizardAction::None;
        }
        self.verifying = false;
        match result {
            Ok(()) => {
                let credential = std::mem::take(&mut self.password);
                self.begin_installing(Some(credential))
            }
            Err(_) => {
                self.password.clear();
                self.notice = Some(WRONG_PASSWORD_NOTICE.to_string());
                WizardAction::None
            }
        }
    }

    fn begin_installing(&mut self, credential: Option<String>) -> WizardAction {
        self.state = WizardState::Installing;
        self.notice = None;
        self.progress = 0.0;
        self.status = "Starting...".to_string();
        WizardAction::StartPipeline { credential }
    }

    fn handle_installing(&mut self, input: WizardInput) -> WizardAction {
        match input {
            WizardInput::ToggleLogs => {
                self.show_logs = !self.show_logs;
                self.log_scroll = 0;
            }
            WizardInput::Up if self.show_logs => {
                self.log_scroll = (self.log_scroll + 1).min(self.logs.len().saturating_sub(1));
            }
            WizardInput::Down if self.show_logs => {
                self.log_scroll = self.log_scroll.saturating_sub(1);
            }
            _ => {}
        }
        WizardAction::None
    }

    pub fn on_progress(&mut self, event: ProgressEvent) {
        self.progress = event.percent.clamp(0.0, 1.0).max(self.progress);
        self.status = event.label;
    }

    pub fn on_log(&mut self, line: String) {
        self.logs.push(line);
        // Keep the scrolled view anchored while new lines arrive.
        if self.log_scroll > 0 {
            self.log_scroll += 1;
        }
    }

    /// Terminal outcome of the pipeline. Failures keep the user here with the log open.
    pub fn on_finished(&mut self, result: PipelineResult) {
        match result {
            Ok(()) => {
                self.progress = 1.0;
                self.state = WizardState::Done;
            }
            Err(e) => {
                let message = e.to_string();
                self.logs.push(format!("ERROR: {}", message));
                self.failure = Some(message);
                self.status = "Installation failed".to_string();
                self.show_logs = true;
                self.log_scroll = 0;
            }
        }
    }
}
