//! Provisioning Phase State Machine
//!
//! The `InstallerContext` is the single source of truth for how far a pipeline run
//! has progressed. It only allows forward transitions to the immediate next phase,
//! so the engine cannot skip a phase or re-enter one by mistake.
//!
//! # Phase Flow
//!
//! ```text
//! Authenticating        0.0
//!     ↓
//! InstallingHelper      0.1
//!     ↓
//! InstallingPackages    0.2
//!     ↓
//! RunningScripts        0.5
//!     ↓
//! ConfiguringSystem     0.6
//!     ↓
//! SyncingDotfiles       0.8
//!     ↓
//! Complete              1.0
//!
//! (Any non-terminal phase can transition to Failed)
//! ```

use std::fmt;
use strum::{EnumIter, IntoEnumIterator};
use thiserror::Error;

/// Pipeline phases in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter)]
#[repr(u8)]
pub enum Phase {
    /// Acquire the privilege session
    Authenticating = 0,

    /// Make sure the AUR helper binary exists, building it if needed
    InstallingHelper = 1,

    /// One batched install of base plus selected packages
    InstallingPackages = 2,

    /// User-supplied shell snippets
    RunningScripts = 3,

    /// Display manager, terminal and shell tweaks (failures are non-fatal)
    ConfiguringSystem = 4,

    /// Copy dotfiles from the configured repository
    SyncingDotfiles = 5,

    /// Run finished successfully (terminal state)
    Complete = 6,

    /// Run aborted (terminal state)
    Failed = 255,
}

impl Phase {
    #[inline]
    pub const fn order(self) -> u8 {
        self as u8
    }

    #[inline]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Complete | Self::Failed)
    }

    /// Failures in this phase abort the run.
    #[inline]
    pub const fn is_fatal(self) -> bool {
        !matches!(self, Self::ConfiguringSystem)
    }

    pub const fn next(self) -> Option<Self> {
        match self {
            Self::Authenticating => Some(Self::InstallingHelper),
            Self::InstallingHelper => Some(Self::InstallingPackages),
            Self::InstallingPackages => Some(Self::RunningScripts),
            Self::RunningScripts => Some(Self::ConfiguringSystem),
            Self::ConfiguringSystem => Some(Self::SyncingDotfiles),
            Self::SyncingDotfiles => Some(Self::Complete),
            Self::Complete | Self::Failed => None,
        }
    }

    pub const fn description(self) -> &'static str {
        match self {
            Self::Authenticating => "Authenticating",
            Self::InstallingHelper => "Installing AUR helper",
            Self::InstallingPackages => "Installing packages",
            Self::RunningScripts => "Running setup scripts",
            Self::ConfiguringSystem => "Configuring system",
            Self::SyncingDotfiles => "Installing dotfiles",
            Self::Complete => "Installation complete",
            Self::Failed => "Installation failed",
        }
    }

    /// Progress fraction emitted when the phase is entered.
    pub const fn checkpoint(self) -> f32 {
        match self {
            Self::Authenticating => 0.0,
            Self::InstallingHelper => 0.1,
            Self::InstallingPackages => 0.2,
            Self::RunningScripts => 0.5,
            Self::ConfiguringSystem => 0.6,
            Self::SyncingDotfiles => 0.8,
            Self::Complete => 1.0,
            Self::Failed => 0.0,
        }
    }

    /// All phases in order (excluding Failed)
    pub fn all_phases() -> impl Iterator<Item = Self> {
        Self::iter().filter(|phase| *phase != Self::Failed)
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.description())
    }
}

/// Errors that can occur during phase transitions
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PhaseTransitionError {
    #[error("Cannot skip from {from} to {to} (phases run in order)")]
    SkippedPhase { from: Phase, to: Phase },

    #[error("Cannot go backwards from {from} to {to} (provisioning is forward-only)")]
    BackwardTransition { from: Phase, to: Phase },

    #[error("Cannot transition from terminal phase {from}")]
    FromTerminalPhase { from: Phase },

    #[error("Already at phase {phase}")]
    AlreadyAtPhase { phase: Phase },
}

/// Tracks the current phase of one pipeline run.
///
/// # Example
///
/// ```
/// use dotwizard::install_state::{InstallerContext, Phase};
///
/// let mut ctx = InstallerContext::new();
/// assert_eq!(ctx.current_phase(), Phase::Authenticating);
///
/// ctx.advance().unwrap();
/// assert_eq!(ctx.current_phase(), Phase::InstallingHelper);
///
/// assert!(ctx.transition_to(Phase::SyncingDotfiles).is_err());
/// ```
#[derive(Debug, Clone)]
pub struct InstallerContext {
    current: Phase,

    /// Phase at which failure occurred (if any)
    failed_at: Option<Phase>,

    /// Entered phases with unix timestamps
    history: Vec<(Phase, u64)>,
}

impl Default for InstallerContext {
    fn default() -> Self {
        Self::new()
    }
}

impl InstallerContext {
    pub fn new() -> Self {
        Self {
            current: Phase::Authenticating,
            failed_at: None,
            history: Vec::with_capacity(8),
        }
    }

    #[inline]
    pub fn current_phase(&self) -> Phase {
        self.current
    }

    #[inline]
    pub fn failed_at(&self) -> Option<Phase> {
        self.failed_at
    }

    #[inline]
    pub fn is_complete(&self) -> bool {
        self.current == Phase::Complete
    }

    #[inline]
    pub fn is_failed(&self) -> bool {
        self.current == Phase::Failed
    }

    pub fn history(&self) -> &[(Phase, u64)] {
        &self.history
    }

    /// Advance to the next phase in sequence.
    pub fn advance(&mut self) -> Result<Phase, PhaseTransitionError> {
        match self.current.next() {
            Some(next) => {
                self.record(next);
                self.current = next;
                Ok(next)
            }
            None => Err(PhaseTransitionError::FromTerminalPhase { from: self.current }),
        }
    }

    /// Transition to `target`, which must be the immediate next phase.
    pub fn transition_to(&mut self, target: Phase) -> Result<Phase, PhaseTransitionError> {
        if self.current.is_terminal() {
            return Err(PhaseTransitionError::FromTerminalPhase { from: self.current });
        }
        if target == self.current {
            return Err(PhaseTransitionError::AlreadyAtPhase { phase: target });
        }
        if target != Phase::Failed && target.order() < self.current.order() {
            return Err(PhaseTransitionError::BackwardTransition {
                from: self.current,
                to: target,
            });
        }
        if self.current.next() != Some(target) {
            return Err(PhaseTransitionError::SkippedPhase {
                from: self.current,
                to: target,
            });
        }

        self.record(target);
        self.current = target;
        Ok(target)
    }

    /// Mark the run as failed, remembering where.
    pub fn fail(&mut self) -> Result<Phase, PhaseTransitionError> {
        if self.current.is_terminal() {
            return Err(PhaseTransitionError::FromTerminalPhase { from: self.current });
        }

        let failed_at = self.current;
        self.failed_at = Some(failed_at);
        self.record(Phase::Failed);
        self.current = Phase::Failed;
        Ok(failed_at)
    }

    fn record(&mut self, phase: Phase) {
        let timestamp = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);
        self.history.push((phase, timestamp));
    }
}
