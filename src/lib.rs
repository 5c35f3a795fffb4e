//! dotwizard library
//!
//! Core of the desktop provisioning wizard: blueprint loading, the privilege
//! session, the command runner, the installation pipeline and the TUI.

pub mod app;
pub mod blueprint;
pub mod cli;
pub mod command_runner;
pub mod engine;
pub mod error;
pub mod input;
pub mod install_state;
pub mod privilege;
pub mod root_setup;
pub mod syncer;
pub mod theme;
pub mod ui;

pub use app::state::{Wizard, WizardAction, WizardInput, WizardState};
pub use blueprint::{Blueprint, Item, SelectionMode, Settings, Step, StepKind};
pub use command_runner::{CommandError, CommandRequest, CommandRunner, Elevation, LogSink, SystemRunner};
pub use engine::{InstallationEngine, PipelineError, ProgressEvent};
pub use error::ProvisionError;
pub use install_state::{InstallerContext, Phase, PhaseTransitionError};
pub use privilege::{PrivilegeSession, SessionGuard, SessionMode};
pub use syncer::FileSyncer;
