//! Error handling module for dotwizard
//!
//! Provides centralized error handling with proper error types using thiserror.
//! Fatal pipeline failures, non-fatal configuration hiccups and blueprint problems
//! all flow through `ProvisionError` so the engine can attach the failing phase.

use crate::command_runner::CommandError;
use thiserror::Error;

/// Main error type for provisioning operations
#[derive(Error, Debug)]
pub enum ProvisionError {
    /// The elevation credential was rejected or could not be checked
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// An elevated command was requested before `PrivilegeSession::start`
    #[error("privilege session not active")]
    SessionNotActive,

    /// An external command failed to launch or exited non-zero
    #[error(transparent)]
    Command(#[from] CommandError),

    /// IO errors (file copies, backups, terminal)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Blueprint errors (missing file, malformed document, broken invariants)
    #[error("Configuration error: {0}")]
    Config(String),

    /// A privileged file failed its syntax check
    #[error("Validation error: {0}")]
    Validation(String),

    /// A provisioning step failed for a reason other than a command exit
    #[error("{0}")]
    Step(String),

    /// Terminal/UI errors
    #[error("Terminal error: {0}")]
    Terminal(String),
}

/// Result type alias for provisioning operations
pub type Result<T> = std::result::Result<T, ProvisionError>;

// Convenient error constructors
impl ProvisionError {
    /// Create an authentication error
    pub fn authentication(msg: impl Into<String>) -> Self {
        Self::Authentication(msg.into())
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a validation error
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Create a step error
    pub fn step(msg: impl Into<String>) -> Self {
        Self::Step(msg.into())
    }

    /// Create a terminal error
    pub fn terminal(msg: impl Into<String>) -> Self {
        Self::Terminal(msg.into())
    }

    /// True for errors raised while acquiring elevation
    pub fn is_authentication(&self) -> bool {
        matches!(self, Self::Authentication(_) | Self::SessionNotActive)
    }
}
