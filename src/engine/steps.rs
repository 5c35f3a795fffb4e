//! Provisioning steps and system configuration actions.
//!
//! Both are closed enums planned from a frozen blueprint. Adding a step means adding
//! a variant, and every `match` below has to handle it.

use super::{dotfiles, helper, packages, scripts, system};
use crate::blueprint::{Blueprint, DotfilesConfig, Script, StepKind};
use crate::command_runner::{CommandRequest, CommandRunner, LogSink};
use crate::error::{ProvisionError, Result};
use crate::install_state::Phase;
use crate::privilege::PrivilegeSession;
use crate::syncer::FileSyncer;
use tracing::warn;

/// Sub-checkpoint reported while the display manager theme is installed.
pub const DISPLAY_MANAGER_CHECKPOINT: f32 = 0.65;

/// Everything a step may touch while it runs.
pub struct StepContext<'a> {
    pub blueprint: &'a Blueprint,
    pub session: &'a PrivilegeSession,
    pub runner: &'a dyn CommandRunner,
    pub syncer: &'a FileSyncer,
    pub log: &'a LogSink,
    pub progress: &'a dyn Fn(f32, &str),
}

impl StepContext<'_> {
    /// Run an unprivileged command, streaming into the step log.
    pub fn run(&self, request: CommandRequest) -> Result<()> {
        self.runner.run(self.log, &request)?;
        Ok(())
    }

    pub fn run_elevated<I, S>(&self, program: &str, args: I) -> Result<()>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.session.run_elevated(self.log, program, args)
    }
}

/// One unit of pipeline work. Each variant maps to exactly one phase.
#[derive(Debug, Clone, PartialEq)]
pub enum ProvisioningStep {
    InstallHelper { helper: String },
    InstallPackages { helper: String, packages: Vec<String> },
    RunScripts { scripts: Vec<Script> },
    ConfigureSystem { actions: Vec<ConfigAction> },
    SyncDotfiles { dotfiles: DotfilesConfig },
}

impl ProvisioningStep {
    /// The full, ordered step list for `blueprint`.
    pub fn plan(blueprint: &Blueprint) -> Vec<Self> {
        let helper = blueprint.helper().to_string();
        vec![
            Self::InstallHelper {
                helper: helper.clone(),
            },
            Self::InstallPackages {
                helper,
                packages: packages::package_set(blueprint),
            },
            Self::RunScripts {
                scripts: blueprint.settings.external_scripts.clone(),
            },
            Self::ConfigureSystem {
                actions: ConfigAction::plan(blueprint),
            },
            Self::SyncDotfiles {
                dotfiles: blueprint.settings.dotfiles.clone(),
            },
        ]
    }

    pub fn phase(&self) -> Phase {
        match self {
            Self::InstallHelper { .. } => Phase::InstallingHelper,
            Self::InstallPackages { .. } => Phase::InstallingPackages,
            Self::RunScripts { .. } => Phase::RunningScripts,
            Self::ConfigureSystem { .. } => Phase::ConfiguringSystem,
            Self::SyncDotfiles { .. } => Phase::SyncingDotfiles,
        }
    }

    /// Progress label shown while the step runs.
    pub fn label(&self) -> String {
        match self {
            Self::InstallHelper { helper } => format!("Installing AUR Helper ({})...", helper),
            Self::InstallPackages { .. } => "Installing Packages...".to_string(),
            Self::RunScripts { .. } => "Running Setup Scripts...".to_string(),
            Self::ConfigureSystem { .. } => "Configuring System...".to_string(),
            Self::SyncDotfiles { .. } => "Installing Dotfiles...".to_string(),
        }
    }

    /// Run the step. An error returned here is fatal for the pipeline; failures in a
    /// phase that is not fatal are logged and the step carries on.
    pub fn execute(&self, ctx: &StepContext<'_>) -> Result<()> {
        match self {
            Self::InstallHelper { helper } => helper::install_helper(ctx, helper),
            Self::InstallPackages { helper, packages } => {
                packages::install_packages(ctx, helper, packages)
            }
            Self::RunScripts { scripts } => scripts::run_scripts(ctx, scripts),
            Self::ConfigureSystem { actions } => {
                for action in actions {
                    if let Err(e) = action.apply(ctx) {
                        self.tolerate(ctx, &action.describe(), e)?;
                    }
                }
                Ok(())
            }
            Self::SyncDotfiles { dotfiles } => dotfiles::sync_dotfiles(ctx, dotfiles),
        }
    }

    /// Hand `err` back when this step's phase is fatal, otherwise log it.
    fn tolerate(&self, ctx: &StepContext<'_>, what: &str, err: ProvisionError) -> Result<()> {
        if self.phase().is_fatal() {
            return Err(err);
        }
        warn!("{} failed: {}", what, err);
        ctx.log.line(format!("Error {}: {}", what, err));
        Ok(())
    }
}

/// A system tweak applied during `ConfiguringSystem`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigAction {
    /// Install and activate the SilentSDDM theme
    DisplayManagerTheme,
    /// Make the terminal the compositor's default
    DefaultTerminal(String),
    /// Switch the user's login shell
    LoginShell(String),
}

impl ConfigAction {
    /// Actions for the current selection, in step order.
    pub fn plan(blueprint: &Blueprint) -> Vec<Self> {
        let mut actions = Vec::new();
        for step in &blueprint.steps {
            for item in step.selected_items() {
                match step.kind() {
                    StepKind::DisplayManager if item.name == "sddm" => {
                        actions.push(Self::DisplayManagerTheme);
                    }
                    StepKind::Terminals => actions.push(Self::DefaultTerminal(item.name.clone())),
                    StepKind::Shell if item.name != "bash" => {
                        actions.push(Self::LoginShell(item.name.clone()));
                    }
                    _ => {}
                }
            }
        }
        actions
    }

    pub fn describe(&self) -> String {
        match self {
            Self::DisplayManagerTheme => "configuring SDDM".to_string(),
            Self::DefaultTerminal(name) => format!("patching terminal ({})", name),
            Self::LoginShell(name) => format!("changing shell ({})", name),
        }
    }

    pub fn apply(&self, ctx: &StepContext<'_>) -> Result<()> {
        match self {
            Self::DisplayManagerTheme => {
                (ctx.progress)(DISPLAY_MANAGER_CHECKPOINT, "Configuring SDDM...");
                system::configure_display_manager(ctx)
            }
            Self::DefaultTerminal(name) => system::patch_terminal(ctx, name),
            Self::LoginShell(name) => system::change_shell(ctx, name),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn blueprint() -> Blueprint {
        Blueprint::from_yaml_str(
            r#"
settings: { aur_helper: paru, base_packages: [git] }
steps:
  - { id: dm, type: single, items: [{ name: sddm, selected: true }, { name: gdm }] }
  - { id: terminals, items: [{ name: kitty, selected: true }, { name: foot, selected: true }] }
  - { id: shell, type: single, items: [{ name: bash, selected: true }, { name: zsh }] }
"#,
        )
        .expect("blueprint")
    }

    #[test]
    fn test_plan_covers_every_phase_in_order() {
        let plan = ProvisioningStep::plan(&blueprint());
        let phases: Vec<Phase> = plan.iter().map(ProvisioningStep::phase).collect();
        assert_eq!(
            phases,
            vec![
                Phase::InstallingHelper,
                Phase::InstallingPackages,
                Phase::RunningScripts,
                Phase::ConfiguringSystem,
                Phase::SyncingDotfiles,
            ]
        );
        assert_eq!(plan[0].label(), "Installing AUR Helper (paru)...");
    }

    #[test]
    fn test_config_actions_follow_selection() {
        let actions = ConfigAction::plan(&blueprint());
        assert_eq!(
            actions,
            vec![
                ConfigAction::DisplayManagerTheme,
                ConfigAction::DefaultTerminal("kitty".into()),
                ConfigAction::DefaultTerminal("foot".into()),
            ]
        );
    }

    #[test]
    fn test_non_bash_shell_plans_login_shell() {
        let mut bp = blueprint();
        bp.steps[2].toggle(1);
        assert!(ConfigAction::plan(&bp).contains(&ConfigAction::LoginShell("zsh".into())));
    }

    struct RefusingRunner;

    impl CommandRunner for RefusingRunner {
        fn run(
            &self,
            _sink: &LogSink,
            request: &CommandRequest,
        ) -> std::result::Result<(), crate::command_runner::CommandError> {
            Err(crate::command_runner::CommandError::Exit {
                program: request.program.clone(),
                code: Some(1),
                tail: Vec::new(),
            })
        }

        fn resolve(&self, _program: &str) -> Option<std::path::PathBuf> {
            None
        }
    }

    #[test]
    fn test_configure_failures_are_logged_and_do_not_stop_the_step() {
        let home = tempfile::tempdir().expect("tempdir");
        let mut bp = blueprint();
        bp.settings.terminal_config = "~/.config/missing.conf".into();
        let runner = std::sync::Arc::new(RefusingRunner);
        let session = PrivilegeSession::new(runner.clone(), crate::privilege::SessionMode::Password);
        let syncer = FileSyncer::with_home(home.path());
        let (log, lines) = LogSink::collector();
        let progress = |_: f32, _: &str| {};
        let ctx = StepContext {
            blueprint: &bp,
            session: &session,
            runner: runner.as_ref(),
            syncer: &syncer,
            log: &log,
            progress: &progress,
        };

        let step = ProvisioningStep::ConfigureSystem {
            actions: vec![
                ConfigAction::DefaultTerminal("kitty".into()),
                ConfigAction::LoginShell("zsh".into()),
            ],
        };
        assert!(!step.phase().is_fatal());
        step.execute(&ctx).expect("configuration failures are tolerated");

        let lines = lines.lock().expect("collector poisoned");
        assert!(lines.iter().any(|l| l.starts_with("Error patching terminal (kitty): ")));
        assert!(lines.iter().any(|l| l.starts_with("Error changing shell (zsh): ")));
    }

    #[test]
    fn test_only_configuring_system_tolerates_failures() {
        let fatal: Vec<Phase> = ProvisioningStep::plan(&blueprint())
            .iter()
            .map(ProvisioningStep::phase)
            .filter(|phase| phase.is_fatal())
            .collect();
        assert_eq!(
            fatal,
            vec![
                Phase::InstallingHelper,
                Phase::InstallingPackages,
                Phase::RunningScripts,
                Phase::SyncingDotfiles,
            ]
        );
    }
}
